// Copyright (c) The specsplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use camino::Utf8PathBuf;
use owo_colors::OwoColorize;
use specsplit_metadata::SpecsplitExitCode;
use specsplit_runner::errors::*;
use std::error::Error;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// Note that the #[error()] strings are mostly placeholder messages -- the expected way to print out
// errors is with the display_to_stderr method, which colorizes errors.

/// An expected failure, with a documented exit code.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("project root is invalid")]
    ProjectRootInvalid { project_root: Utf8PathBuf },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("invalid chunk request")]
    InvalidChunkRequest {
        #[from]
        err: ChunkRequestError,
    },
    #[error("failed to scan for spec files")]
    DiscoverFailed {
        test_root: Utf8PathBuf,
        #[source]
        err: walkdir::Error,
    },
    #[error("no spec files found")]
    NoSpecFiles { test_root: Utf8PathBuf, suffix: String },
    #[error("partition error")]
    PartitionError {
        #[from]
        err: PartitionError,
    },
    #[error("failed to read report")]
    ReportReadFailed {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("failed to merge timing samples")]
    MergeError {
        #[from]
        err: MergeError,
    },
    #[error("failed to write timing model")]
    TimingsWriteFailed {
        #[from]
        err: TimingModelWriteError,
    },
    #[error("error writing output")]
    WriteOutputError {
        #[source]
        err: std::io::Error,
    },
}

impl ExpectedError {
    pub(crate) fn report_read_failed(path: impl Into<Utf8PathBuf>, err: std::io::Error) -> Self {
        Self::ReportReadFailed {
            path: path.into(),
            err,
        }
    }

    pub(crate) fn write_output(err: std::io::Error) -> Self {
        Self::WriteOutputError { err }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::ProjectRootInvalid { .. }
            | Self::ConfigParseError { .. }
            | Self::DiscoverFailed { .. }
            | Self::MergeError { .. } => SpecsplitExitCode::SETUP_ERROR,
            Self::InvalidChunkRequest { .. } => SpecsplitExitCode::INVALID_CHUNK_REQUEST,
            Self::NoSpecFiles { .. } => SpecsplitExitCode::NO_SPEC_FILES,
            Self::PartitionError { err } => match err {
                PartitionError::NoItems => SpecsplitExitCode::NO_SPEC_FILES,
                PartitionError::IndexOutOfRange { .. } => SpecsplitExitCode::INVALID_CHUNK_REQUEST,
                _ => SpecsplitExitCode::SETUP_ERROR,
            },
            Self::ReportReadFailed { .. } => SpecsplitExitCode::REPORT_READ_FAILED,
            Self::TimingsWriteFailed { .. } => SpecsplitExitCode::TIMINGS_WRITE_FAILED,
            Self::WriteOutputError { .. } => SpecsplitExitCode::WRITE_OUTPUT_ERROR,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match &self {
            Self::ProjectRootInvalid { project_root } => {
                error!(
                    "project root `{}` is not a directory",
                    project_root.style(styles.bold)
                );
                None
            }
            Self::ConfigParseError { err } => match err.kind() {
                ConfigParseErrorKind::DeserializeError(error) => {
                    error!(
                        "failed to parse specsplit config at `{}`: at `{}`, {}",
                        err.config_file().style(styles.bold),
                        error.path().style(styles.bold),
                        error.inner(),
                    );
                    None
                }
                kind => {
                    error!(
                        "failed to parse specsplit config at `{}`",
                        err.config_file().style(styles.bold)
                    );
                    Some(kind as &dyn Error)
                }
            },
            Self::InvalidChunkRequest { err } => {
                error!("{err}");
                None
            }
            Self::DiscoverFailed { test_root, err } => {
                error!(
                    "failed to scan `{}` for spec files",
                    test_root.style(styles.bold)
                );
                Some(err as &dyn Error)
            }
            Self::NoSpecFiles { test_root, suffix } => {
                error!(
                    "no spec files ending in `{}` found under `{}`",
                    suffix.style(styles.bold),
                    test_root.style(styles.bold),
                );
                None
            }
            Self::PartitionError { err } => {
                error!("{err}");
                None
            }
            Self::ReportReadFailed { path, err } => {
                error!("failed to read report `{}`", path.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::MergeError { err } => {
                error!("{err}");
                None
            }
            Self::TimingsWriteFailed { err } => {
                error!("{err}");
                err.source()
            }
            Self::WriteOutputError { err } => {
                error!("error writing output");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
