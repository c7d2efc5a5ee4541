// Copyright (c) The specsplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{error, fmt};

/// An error that occurs while parsing a timing-model document.
#[derive(Debug)]
pub enum TimingModelParseError {
    /// The document declared a version this crate does not understand.
    UnknownVersion {
        /// The version string found in the document.
        version: String,
    },

    /// The document was not valid JSON, or did not match the shape its version requires.
    Json(serde_json::Error),
}

impl fmt::Display for TimingModelParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::UnknownVersion { version } => {
                write!(
                    f,
                    "unknown timing model version `{version}` (known versions: {}, {})",
                    crate::FILE_LEVEL_VERSION,
                    crate::EXAMPLE_LEVEL_VERSION,
                )
            }
            Self::Json(_) => write!(f, "parsing timing model JSON failed"),
        }
    }
}

impl error::Error for TimingModelParseError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::UnknownVersion { .. } => None,
            Self::Json(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for TimingModelParseError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}
