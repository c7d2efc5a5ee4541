// Copyright (c) The specsplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Building weighted, schedulable test items.
//!
//! Every candidate spec file turns into one or more [`TestItem`]s. Weights come from the timing
//! model where possible, and from a crude static estimate of the spec file's size otherwise.

use crate::{
    errors::GranularityParseError, helpers::plural, spec_path::SpecLayout,
    timings::normalize_timing_model,
};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use specsplit_metadata::{ExampleId, FileExampleTimings, TimingModel};
use std::{fmt, io, num::NonZeroUsize, str::FromStr};
use tracing::{debug, warn};

/// The unit of scheduling.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Granularity {
    /// Schedule whole spec files.
    #[default]
    File,

    /// Schedule individual examples, where example timings exist.
    Example,

    /// Schedule whole spec files, except that files heavy enough to monopolize a chunk are split
    /// into their examples.
    Hybrid,
}

impl Granularity {
    /// Returns the string representations of all variants.
    pub fn variants() -> &'static [&'static str] {
        &["file", "example", "hybrid"]
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Example => write!(f, "example"),
            Self::Hybrid => write!(f, "hybrid"),
        }
    }
}

impl FromStr for Granularity {
    type Err = GranularityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(Self::File),
            "example" => Ok(Self::Example),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(GranularityParseError::new(other)),
        }
    }
}

/// A schedulable unit: either a whole spec file or a single example within one.
#[derive(Clone, Debug, PartialEq)]
pub struct TestItem {
    spec_file: String,
    example: Option<ExampleId>,
    weight: f64,
}

impl TestItem {
    /// Creates an item representing a whole spec file.
    pub fn whole_file(spec_file: impl Into<String>, weight: f64) -> Self {
        Self {
            spec_file: spec_file.into(),
            example: None,
            weight,
        }
    }

    /// Creates an item representing a single example.
    pub fn example(spec_file: impl Into<String>, example: ExampleId, weight: f64) -> Self {
        Self {
            spec_file: spec_file.into(),
            example: Some(example),
            weight,
        }
    }

    /// Returns the spec file this item belongs to.
    pub fn spec_file(&self) -> &str {
        &self.spec_file
    }

    /// Returns the example this item represents, if it isn't a whole file.
    pub fn example_id(&self) -> Option<ExampleId> {
        self.example
    }

    /// Returns true if this item is a single example.
    pub fn is_example(&self) -> bool {
        self.example.is_some()
    }

    /// Returns the estimated duration of this item, in seconds.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Returns the identifier the test runner understands: `spec_file` or `spec_file:@N`.
    pub fn identifier(&self) -> String {
        match self.example {
            Some(example) => format!("{}:{example}", self.spec_file),
            None => self.spec_file.clone(),
        }
    }
}

/// Provides the contents of spec files for static weight estimation.
pub trait SpecSource {
    /// Reads the spec file at the given normalized path.
    fn read_spec(&self, spec_file: &str) -> io::Result<String>;
}

/// A [`SpecSource`] that reads spec files relative to a project root.
#[derive(Clone, Debug)]
pub struct FsSpecSource {
    project_root: Utf8PathBuf,
}

impl FsSpecSource {
    /// Creates a new source rooted at `project_root`.
    pub fn new(project_root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }

    /// Returns the project root.
    pub fn project_root(&self) -> &Utf8Path {
        &self.project_root
    }
}

impl SpecSource for FsSpecSource {
    fn read_spec(&self, spec_file: &str) -> io::Result<String> {
        std::fs::read_to_string(self.project_root.join(spec_file))
    }
}

/// Estimates the weight of spec files that have no timing history.
///
/// The estimate is `lines + block_weight * blocks`, where `blocks` counts lines that open a test
/// group or test case. It is only meant to keep untimed files from being scheduled as free.
#[derive(Clone, Debug, PartialEq)]
pub struct StaticWeigher {
    structural_keywords: Vec<String>,
    block_weight: f64,
    default_weight: f64,
}

impl StaticWeigher {
    /// The keywords that open a test group or test case.
    pub const DEFAULT_STRUCTURAL_KEYWORDS: &'static [&'static str] = &["Describe", "Context", "It"];

    /// The extra weight each structural block contributes.
    pub const DEFAULT_BLOCK_WEIGHT: f64 = 10.0;

    /// The weight of a spec file that cannot be read.
    pub const DEFAULT_WEIGHT: f64 = 100.0;

    /// The smallest weight an estimate can produce.
    pub const MIN_STATIC_WEIGHT: f64 = 1.0;

    /// Creates a new weigher.
    pub fn new(
        structural_keywords: impl IntoIterator<Item = impl Into<String>>,
        block_weight: f64,
        default_weight: f64,
    ) -> Self {
        Self {
            structural_keywords: structural_keywords.into_iter().map(Into::into).collect(),
            block_weight,
            default_weight,
        }
    }

    /// Returns the weight of `content`.
    pub fn weigh_content(&self, content: &str) -> f64 {
        let mut lines = 0usize;
        let mut blocks = 0usize;
        for line in content.lines() {
            lines += 1;
            if self.opens_block(line) {
                blocks += 1;
            }
        }

        let weight = lines as f64 + self.block_weight * blocks as f64;
        weight.max(Self::MIN_STATIC_WEIGHT)
    }

    /// Returns the weight of `spec_file`, read through `source`.
    pub fn weigh(&self, source: &dyn SpecSource, spec_file: &str) -> f64 {
        match source.read_spec(spec_file) {
            Ok(content) => self.weigh_content(&content),
            Err(error) => {
                warn!(
                    "failed to read {spec_file} for static weighting ({error}), \
                     using default weight {}",
                    self.default_weight,
                );
                self.default_weight.max(Self::MIN_STATIC_WEIGHT)
            }
        }
    }

    fn opens_block(&self, line: &str) -> bool {
        let line = line.trim_start();
        self.structural_keywords.iter().any(|keyword| {
            line.strip_prefix(keyword.as_str())
                .is_some_and(|rest| rest.starts_with(char::is_whitespace))
        })
    }
}

impl Default for StaticWeigher {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_STRUCTURAL_KEYWORDS.iter().copied(),
            Self::DEFAULT_BLOCK_WEIGHT,
            Self::DEFAULT_WEIGHT,
        )
    }
}

/// The fraction of the per-chunk target a file must exceed before hybrid granularity splits it
/// into examples.
///
/// This is a tuned policy value rather than a derived one.
pub const DEFAULT_HYBRID_SPLIT_RATIO: f64 = 0.5;

/// The result of [`ItemBuilder::build`].
#[derive(Clone, Debug)]
pub struct ItemSet {
    /// The items to schedule, in candidate order.
    pub items: Vec<TestItem>,

    /// Spec files weighted with the static estimate because they had no timing data.
    pub estimated: Vec<String>,

    /// Spec files that were split into examples.
    pub split_files: Vec<String>,

    /// The granularity that was actually used.
    ///
    /// This differs from the requested granularity if the timing model had no example data.
    pub effective: Granularity,
}

impl ItemSet {
    /// Returns the sum of all item weights.
    pub fn total_weight(&self) -> f64 {
        self.items.iter().map(TestItem::weight).sum()
    }
}

/// Builds [`TestItem`]s from candidate spec files and an optional timing model.
#[derive(Debug)]
pub struct ItemBuilder<'a, S> {
    layout: &'a SpecLayout,
    weigher: &'a StaticWeigher,
    source: &'a S,
    split_ratio: f64,
}

impl<'a, S: SpecSource> ItemBuilder<'a, S> {
    /// Creates a new builder.
    pub fn new(layout: &'a SpecLayout, weigher: &'a StaticWeigher, source: &'a S) -> Self {
        Self {
            layout,
            weigher,
            source,
            split_ratio: DEFAULT_HYBRID_SPLIT_RATIO,
        }
    }

    /// Overrides the hybrid split ratio.
    pub fn with_split_ratio(mut self, split_ratio: f64) -> Self {
        self.split_ratio = split_ratio;
        self
    }

    /// Builds items for `candidates` at the requested granularity.
    ///
    /// `total_chunks` is used by hybrid granularity to decide which files to split.
    pub fn build<'c>(
        &self,
        candidates: impl IntoIterator<Item = &'c str>,
        model: Option<&TimingModel>,
        granularity: Granularity,
        total_chunks: NonZeroUsize,
    ) -> ItemSet {
        let candidates: Vec<String> = candidates
            .into_iter()
            .map(|candidate| self.layout.normalize(candidate))
            .collect();
        let model = model.map(|model| normalize_timing_model(model, self.layout));
        let model = model.as_deref();

        match (granularity, model) {
            (Granularity::File, _) => self.build_files(&candidates, model),
            (Granularity::Example, Some(model @ TimingModel::ExampleLevel(_))) => {
                self.build_examples(&candidates, model)
            }
            (Granularity::Hybrid, Some(model @ TimingModel::ExampleLevel(_))) => {
                self.build_hybrid(&candidates, model, total_chunks)
            }
            (Granularity::Example | Granularity::Hybrid, Some(TimingModel::FileLevel(_))) => {
                warn!(
                    "{granularity} granularity requested, but the timing model has no \
                     example-level data: falling back to file granularity"
                );
                self.build_files(&candidates, model)
            }
            (Granularity::Example | Granularity::Hybrid, None) => {
                warn!(
                    "{granularity} granularity requested, but no timing model is available: \
                     falling back to file granularity"
                );
                self.build_files(&candidates, None)
            }
        }
    }

    fn build_files(&self, candidates: &[String], model: Option<&TimingModel>) -> ItemSet {
        let mut items = Vec::with_capacity(candidates.len());
        let mut estimated = Vec::new();
        for spec_file in candidates {
            let weight = self.file_weight(spec_file, model, &mut estimated);
            items.push(TestItem::whole_file(spec_file, weight));
        }

        ItemSet {
            items,
            estimated,
            split_files: Vec::new(),
            effective: Granularity::File,
        }
    }

    fn build_examples(&self, candidates: &[String], model: &TimingModel) -> ItemSet {
        let mut items = Vec::new();
        let mut estimated = Vec::new();
        let mut split_files = Vec::new();
        for spec_file in candidates {
            match example_data(model, spec_file) {
                Some(file) => {
                    push_examples(&mut items, spec_file, file);
                    split_files.push(spec_file.clone());
                }
                None => {
                    let weight = self.file_weight(spec_file, Some(model), &mut estimated);
                    items.push(TestItem::whole_file(spec_file, weight));
                }
            }
        }

        ItemSet {
            items,
            estimated,
            split_files,
            effective: Granularity::Example,
        }
    }

    fn build_hybrid(
        &self,
        candidates: &[String],
        model: &TimingModel,
        total_chunks: NonZeroUsize,
    ) -> ItemSet {
        let mut estimated = Vec::new();
        let weights: Vec<f64> = candidates
            .iter()
            .map(|spec_file| self.file_weight(spec_file, Some(model), &mut estimated))
            .collect();

        let total: f64 = weights.iter().sum();
        let target_per_chunk = total / total_chunks.get() as f64;
        let threshold = self.split_ratio * target_per_chunk;
        debug!(
            "hybrid: total weight {total:.1}, target per chunk {target_per_chunk:.1}, \
             split threshold {threshold:.1}"
        );

        let mut items = Vec::new();
        let mut split_files = Vec::new();
        for (spec_file, weight) in candidates.iter().zip(weights) {
            match example_data(model, spec_file) {
                Some(file) if weight > threshold => {
                    debug!(
                        "splitting {spec_file} ({weight:.1}) into {} {}",
                        file.examples.len(),
                        plural::examples_str(file.examples.len()),
                    );
                    push_examples(&mut items, spec_file, file);
                    split_files.push(spec_file.clone());
                }
                _ => items.push(TestItem::whole_file(spec_file, weight)),
            }
        }
        // Split files are scheduled by their examples, not by the estimate.
        estimated.retain(|spec_file| !split_files.contains(spec_file));

        ItemSet {
            items,
            estimated,
            split_files,
            effective: Granularity::Hybrid,
        }
    }

    /// Returns the best available whole-file weight, recording files that needed an estimate.
    fn file_weight(
        &self,
        spec_file: &str,
        model: Option<&TimingModel>,
        estimated: &mut Vec<String>,
    ) -> f64 {
        match model.and_then(|model| model.file_duration(spec_file)) {
            Some(seconds) if seconds > 0.0 => seconds,
            _ => {
                estimated.push(spec_file.to_owned());
                self.weigher.weigh(self.source, spec_file)
            }
        }
    }
}

fn example_data<'m>(model: &'m TimingModel, spec_file: &str) -> Option<&'m FileExampleTimings> {
    model
        .examples(spec_file)
        .filter(|file| !file.examples.is_empty())
}

fn push_examples(items: &mut Vec<TestItem>, spec_file: &str, file: &FileExampleTimings) {
    items.extend(
        file.examples
            .iter()
            .map(|(example, timing)| TestItem::example(spec_file, *example, timing.time.max(0.0))),
    );
}
