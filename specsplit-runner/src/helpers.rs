// Copyright (c) The specsplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! General support code for specsplit-runner.

/// Utilities for pluralizing various words based on count or plurality.
pub mod plural {
    /// Returns "file" if `count` is 1, otherwise "files".
    pub fn files_str(count: usize) -> &'static str {
        if count == 1 { "file" } else { "files" }
    }

    /// Returns "item" if `count` is 1, otherwise "items".
    pub fn items_str(count: usize) -> &'static str {
        if count == 1 { "item" } else { "items" }
    }

    /// Returns "example" if `count` is 1, otherwise "examples".
    pub fn examples_str(count: usize) -> &'static str {
        if count == 1 { "example" } else { "examples" }
    }

    /// Returns "report" if `count` is 1, otherwise "reports".
    pub fn reports_str(count: usize) -> &'static str {
        if count == 1 { "report" } else { "reports" }
    }
}

/// Parses a duration in seconds, as found in a report's `time` attribute.
///
/// Anything that isn't a finite, non-negative number is treated as zero.
pub(crate) fn parse_seconds(input: Option<&str>) -> f64 {
    match input.map(|s| s.trim().parse::<f64>()) {
        Some(Ok(seconds)) if seconds.is_finite() && seconds >= 0.0 => seconds,
        _ => 0.0,
    }
}

/// Splits a trailing `:<line>` off `input`, if present.
pub(crate) fn split_line_suffix(input: &str) -> (&str, Option<u32>) {
    if let Some((path, line)) = input.rsplit_once(':') {
        if let Ok(line) = line.parse() {
            return (path, Some(line));
        }
    }
    (input, None)
}
