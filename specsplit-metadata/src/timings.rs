// Copyright (c) The specsplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The persisted timing model.
//!
//! A timing model records how long spec files (and, at version 2.0, the individual examples within
//! them) took to run historically. It is written by `specsplit merge` and read at the start of
//! every `specsplit chunk` invocation.

use crate::TimingModelParseError;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{collections::BTreeMap, fmt, num::ParseIntError, str::FromStr};

/// The version tag for file-level timing models.
pub const FILE_LEVEL_VERSION: &str = "1.0";

/// The version tag for example-level timing models.
pub const EXAMPLE_LEVEL_VERSION: &str = "2.0";

/// Average duration in seconds, keyed by normalized spec file.
pub type FileTimings = BTreeMap<String, f64>;

/// Per-example durations, keyed by normalized spec file.
pub type ExampleTimings = BTreeMap<String, FileExampleTimings>;

/// A timing model, discriminated by the document's version tag.
#[derive(Clone, Debug, PartialEq)]
pub enum TimingModel {
    /// Version 1.0: one average duration per spec file.
    FileLevel(FileTimings),

    /// Version 2.0: per-example durations, with per-file totals.
    ExampleLevel(ExampleTimings),
}

impl TimingModel {
    /// Parses a timing model from a JSON document.
    ///
    /// Documents without a `version` field are treated as version 1.0, and documents without a
    /// `timings` field are treated as empty.
    pub fn from_json_str(input: &str) -> Result<Self, TimingModelParseError> {
        // The version is read first, then the timings are deserialized straight into the map
        // for that version so example order matches the document.
        let header: TimingDocumentHeader = serde_json::from_str(input)?;
        match header.version.as_deref() {
            None | Some(FILE_LEVEL_VERSION) => {
                let document: TimingDocumentDeserialize<FileTimings> =
                    serde_json::from_str(input)?;
                Ok(Self::FileLevel(document.timings.unwrap_or_default()))
            }
            Some(EXAMPLE_LEVEL_VERSION) => {
                let document: TimingDocumentDeserialize<ExampleTimings> =
                    serde_json::from_str(input)?;
                Ok(Self::ExampleLevel(document.timings.unwrap_or_default()))
            }
            Some(other) => Err(TimingModelParseError::UnknownVersion {
                version: other.to_owned(),
            }),
        }
    }

    /// Serializes this model to a pretty-printed JSON document.
    pub fn to_json_string_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Returns the version tag this model is serialized with.
    pub fn version(&self) -> &'static str {
        match self {
            Self::FileLevel(_) => FILE_LEVEL_VERSION,
            Self::ExampleLevel(_) => EXAMPLE_LEVEL_VERSION,
        }
    }

    /// Returns the number of spec files this model has data for.
    pub fn file_count(&self) -> usize {
        match self {
            Self::FileLevel(timings) => timings.len(),
            Self::ExampleLevel(timings) => timings.len(),
        }
    }

    /// Returns the recorded whole-file duration for `spec_file`, if any.
    ///
    /// For example-level models this is the file's total.
    pub fn file_duration(&self, spec_file: &str) -> Option<f64> {
        match self {
            Self::FileLevel(timings) => timings.get(spec_file).copied(),
            Self::ExampleLevel(timings) => timings.get(spec_file).map(|file| file.total),
        }
    }

    /// Returns the per-example data for `spec_file`.
    ///
    /// Always `None` for file-level models.
    pub fn examples(&self, spec_file: &str) -> Option<&FileExampleTimings> {
        match self {
            Self::FileLevel(_) => None,
            Self::ExampleLevel(timings) => timings.get(spec_file),
        }
    }
}

impl Serialize for TimingModel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::FileLevel(timings) => TimingDocumentSerialize {
                version: FILE_LEVEL_VERSION,
                timings,
            }
            .serialize(serializer),
            Self::ExampleLevel(timings) => TimingDocumentSerialize {
                version: EXAMPLE_LEVEL_VERSION,
                timings,
            }
            .serialize(serializer),
        }
    }
}

#[derive(Serialize)]
struct TimingDocumentSerialize<'a, T> {
    version: &'static str,
    timings: &'a T,
}

#[derive(Deserialize)]
struct TimingDocumentHeader {
    #[serde(default)]
    version: Option<String>,
}

#[derive(Deserialize)]
struct TimingDocumentDeserialize<T> {
    timings: Option<T>,
}

/// Example-level data for a single spec file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FileExampleTimings {
    /// The sum of all example durations, in seconds.
    pub total: f64,

    /// Examples in the order they were first observed.
    #[serde(default)]
    pub examples: IndexMap<ExampleId, ExampleTiming>,
}

impl FileExampleTimings {
    /// Creates a new instance from the given examples, computing the total.
    pub fn from_examples(examples: IndexMap<ExampleId, ExampleTiming>) -> Self {
        let total = examples.values().map(|example| example.time).sum();
        Self { total, examples }
    }
}

/// Timing data for a single example.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExampleTiming {
    /// The example's duration in seconds.
    pub time: f64,

    /// The example's display name, as reported by the test runner.
    #[serde(default)]
    pub name: String,

    /// The line the example starts on, if the report carried it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

/// A positional identifier for an example within a spec file: `@1`, `@2`, and so on.
///
/// Example IDs are assigned in the order examples appear within one parsed report. They are stable
/// across parses of the same report, but carry no meaning beyond that.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ExampleId(u32);

impl ExampleId {
    /// Creates a new example ID from its 1-based position.
    pub fn new(position: u32) -> Self {
        Self(position)
    }

    /// Returns the 1-based position.
    pub fn position(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ExampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// An error returned while parsing an [`ExampleId`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExampleIdParseError {
    input: String,
    reason: Option<ParseIntError>,
}

impl fmt::Display for ExampleIdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "invalid example ID `{}`: {reason}", self.input),
            None => write!(f, "example ID `{}` must look like `@N`", self.input),
        }
    }
}

impl std::error::Error for ExampleIdParseError {}

impl FromStr for ExampleId {
    type Err = ExampleIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix('@').ok_or_else(|| ExampleIdParseError {
            input: s.to_owned(),
            reason: None,
        })?;
        let position = digits.parse().map_err(|err| ExampleIdParseError {
            input: s.to_owned(),
            reason: Some(err),
        })?;
        Ok(Self(position))
    }
}

impl Serialize for ExampleId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ExampleId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
