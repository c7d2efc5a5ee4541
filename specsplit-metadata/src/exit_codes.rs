// Copyright (c) The specsplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `specsplit` failures.
///
/// `specsplit` invocations may fail for a variety of reasons. This structure documents the exit
/// codes that may occur in case of expected failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum SpecsplitExitCode {}

impl SpecsplitExitCode {
    /// No errors occurred and specsplit exited normally.
    pub const OK: i32 = 0;

    /// No spec files were found, so there was nothing to partition.
    pub const NO_SPEC_FILES: i32 = 4;

    /// The requested chunk count or chunk index was invalid.
    pub const INVALID_CHUNK_REQUEST: i32 = 94;

    /// A user issue happened while setting up a specsplit invocation.
    pub const SETUP_ERROR: i32 = 96;

    /// A test report passed to `specsplit merge` could not be read.
    pub const REPORT_READ_FAILED: i32 = 97;

    /// The merged timing model could not be written out.
    pub const TIMINGS_WRITE_FAILED: i32 = 98;

    /// Writing data to stdout or stderr produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}
