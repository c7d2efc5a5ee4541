// Copyright (c) The specsplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by specsplit.

use crate::{items::Granularity, report::SampleGranularity};
use camino::Utf8PathBuf;
use config::ConfigError;
use specsplit_metadata::TimingModelParseError;
use std::{borrow::Cow, fmt};
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse specsplit config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a config.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),

    /// A value was syntactically valid but out of range.
    #[error("invalid value for `{key}`: {message}")]
    InvalidValue {
        /// The config key, e.g. `hybrid.split-ratio`.
        key: &'static str,

        /// Why the value was rejected.
        message: Cow<'static, str>,
    },
}

/// Error returned while parsing a [`Granularity`] value from a string.
#[derive(Clone, Debug, Error)]
#[error(
    "unrecognized value for granularity: {input}\n(known values: {})",
    Granularity::variants().join(", "),
)]
pub struct GranularityParseError {
    input: String,
}

impl GranularityParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// An error that occurs while validating a
/// [`ChunkRequest`](crate::partition::ChunkRequest).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChunkRequestError {
    expected_format: Option<&'static str>,
    message: Cow<'static, str>,
}

impl ChunkRequestError {
    pub(crate) fn new(
        expected_format: Option<&'static str>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            expected_format,
            message: message.into(),
        }
    }
}

impl fmt::Display for ChunkRequestError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.expected_format {
            Some(format) => {
                write!(
                    f,
                    "chunk must be in the format \"{}\":\n{}",
                    format, self.message
                )
            }
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ChunkRequestError {}

/// An error that occurs while computing or reading a chunk assignment.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum PartitionError {
    /// There was nothing to partition.
    #[error("no test items to partition")]
    NoItems,

    /// A chunk outside the assignment was requested.
    #[error("chunk index {index} is out of range (there are {total_chunks} chunks)")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,

        /// The number of chunks in the assignment.
        total_chunks: usize,
    },
}

/// An error that occurs while merging timing samples.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum MergeError {
    /// No samples were provided.
    #[error("no timing samples to merge")]
    NoSamples,

    /// A sample had a different granularity from the one requested.
    #[error("sample {index} has {actual} granularity, but {expected} was requested")]
    GranularityMismatch {
        /// The position of the offending sample.
        index: usize,

        /// The granularity the merge was requested at.
        expected: SampleGranularity,

        /// The granularity of the offending sample.
        actual: SampleGranularity,
    },
}

/// An error that occurs while loading a timing model from disk.
///
/// Callers are expected to treat this as a degradation rather than a failure: without a timing
/// model, spec files are weighted statically.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TimingModelLoadError {
    /// The file could not be read.
    #[error("failed to read timing model at `{path}`")]
    Read {
        /// The path that was read.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The file could not be parsed.
    #[error("failed to parse timing model at `{path}`")]
    Parse {
        /// The path that was read.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: TimingModelParseError,
    },
}

/// An error that occurs while writing a timing model to disk.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TimingModelWriteError {
    /// The model could not be serialized.
    #[error("failed to serialize timing model")]
    Serialize(#[source] serde_json::Error),

    /// The model could not be written.
    #[error("failed to write timing model to `{path}`")]
    Write {
        /// The destination path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: atomicwrites::Error<std::io::Error>,
    },
}
