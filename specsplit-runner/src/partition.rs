// Copyright (c) The specsplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Support for partitioning a test run across several CI workers.
//!
//! Items are assigned with the longest-processing-time-first heuristic: heaviest items first,
//! each to whichever chunk is currently lightest. This isn't guaranteed to minimize the heaviest
//! chunk, but it is fast and deterministic. Determinism matters: every worker computes the full
//! assignment independently and must arrive at the same answer to know which items are its own.

use crate::{
    errors::{ChunkRequestError, PartitionError},
    items::TestItem,
};
use indexmap::IndexMap;
use specsplit_metadata::ExampleId;
use std::{num::NonZeroUsize, str::FromStr};
use swrite::{SWrite, swrite};

/// A validated request for one chunk out of several.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ChunkRequest {
    index: usize,
    total_chunks: NonZeroUsize,
}

impl ChunkRequest {
    /// Creates a new request for chunk `index` (counting up from 0) out of `total_chunks`.
    pub fn new(index: usize, total_chunks: usize) -> Result<Self, ChunkRequestError> {
        let Some(total_chunks) = NonZeroUsize::new(total_chunks) else {
            return Err(ChunkRequestError::new(
                None,
                "the number of chunks must be at least 1",
            ));
        };

        if index >= total_chunks.get() {
            return Err(ChunkRequestError::new(
                None,
                format!(
                    "chunk index {index} must be between 0 and {}, inclusive",
                    total_chunks.get() - 1
                ),
            ));
        }

        Ok(Self {
            index,
            total_chunks,
        })
    }

    /// Returns the requested chunk, counting up from 0.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the total number of chunks.
    pub fn total_chunks(&self) -> NonZeroUsize {
        self.total_chunks
    }
}

impl FromStr for ChunkRequest {
    type Err = ChunkRequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Parse the string: it looks like "<index>/<total_chunks>".
        const EXPECTED_FORMAT: &str = "I/N";

        let mut split = s.splitn(2, '/');
        // First "next" always returns a value.
        let index_str = split.next().unwrap_or_default();
        // Second "next" may or may not return a value.
        let total_str = split.next().ok_or_else(|| {
            ChunkRequestError::new(
                Some(EXPECTED_FORMAT),
                format!("expected input '{s}' to be in the format I/N"),
            )
        })?;

        let index: usize = index_str.parse().map_err(|err| {
            ChunkRequestError::new(
                Some(EXPECTED_FORMAT),
                format!("failed to parse chunk index '{index_str}' as usize: {err}"),
            )
        })?;

        let total_chunks: usize = total_str.parse().map_err(|err| {
            ChunkRequestError::new(
                Some(EXPECTED_FORMAT),
                format!("failed to parse total chunks '{total_str}' as usize: {err}"),
            )
        })?;

        Self::new(index, total_chunks)
    }
}

/// Assigns test items to chunks.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoadBalancer;

impl LoadBalancer {
    /// Partitions `items` into exactly `total_chunks` chunks.
    ///
    /// Items are placed heaviest first (ties in input order), each into the currently lightest
    /// chunk (ties to the lowest index).
    pub fn balance(
        items: Vec<TestItem>,
        total_chunks: NonZeroUsize,
    ) -> Result<ChunkAssignment, PartitionError> {
        if items.is_empty() {
            return Err(PartitionError::NoItems);
        }

        let mut sorted = items;
        // sort_by is stable, so equal weights keep their input order.
        sorted.sort_by(|a, b| b.weight().total_cmp(&a.weight()));

        let mut bins = vec![Vec::new(); total_chunks.get()];
        let mut weights = vec![0.0; total_chunks.get()];
        for item in sorted {
            let lightest = lightest_bin(&weights);
            weights[lightest] += item.weight();
            bins[lightest].push(item);
        }

        Ok(ChunkAssignment { bins, weights })
    }
}

fn lightest_bin(weights: &[f64]) -> usize {
    let mut lightest = 0;
    for (idx, weight) in weights.iter().enumerate().skip(1) {
        if *weight < weights[lightest] {
            lightest = idx;
        }
    }
    lightest
}

/// The result of [`LoadBalancer::balance`]: every item, in exactly one chunk.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkAssignment {
    bins: Vec<Vec<TestItem>>,
    weights: Vec<f64>,
}

impl ChunkAssignment {
    /// Returns the number of chunks.
    pub fn total_chunks(&self) -> usize {
        self.bins.len()
    }

    /// Returns the items in each chunk, in placement order.
    pub fn bins(&self) -> &[Vec<TestItem>] {
        &self.bins
    }

    /// Returns the total weight of each chunk.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Returns the items in chunk `index`.
    pub fn bin(&self, index: usize) -> Result<&[TestItem], PartitionError> {
        self.bins
            .get(index)
            .map(Vec::as_slice)
            .ok_or(PartitionError::IndexOutOfRange {
                index,
                total_chunks: self.bins.len(),
            })
    }

    /// Returns the sum of all chunk weights.
    pub fn total_weight(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Returns the weight of the heaviest chunk.
    pub fn makespan(&self) -> f64 {
        self.weights.iter().copied().fold(0.0, f64::max)
    }

    /// Renders chunk `index` as identifiers for the test runner.
    ///
    /// Whole-file items render as the bare spec file. All example items from the same spec file
    /// are combined into a single `spec_file:@1:@2` identifier, in placement order. Identifiers
    /// appear in the order their spec file was first encountered in the chunk.
    pub fn render(&self, index: usize) -> Result<Vec<String>, PartitionError> {
        let mut groups: IndexMap<(&str, bool), Vec<ExampleId>> = IndexMap::new();
        for item in self.bin(index)? {
            let group = groups
                .entry((item.spec_file(), item.is_example()))
                .or_default();
            if let Some(example) = item.example_id() {
                group.push(example);
            }
        }

        Ok(groups
            .into_iter()
            .map(|((spec_file, _), examples)| {
                let mut identifier = spec_file.to_owned();
                for example in examples {
                    swrite!(identifier, ":{example}");
                }
                identifier
            })
            .collect())
    }

    /// Returns a summary of each chunk, for diagnostics.
    pub fn summaries(&self) -> Vec<ChunkSummary> {
        let average = self.total_weight() / self.bins.len() as f64;
        self.bins
            .iter()
            .zip(&self.weights)
            .enumerate()
            .map(|(index, (bin, weight))| ChunkSummary {
                index,
                weight: *weight,
                item_count: bin.len(),
                deviation_percent: if average > 0.0 {
                    (weight - average) / average * 100.0
                } else {
                    0.0
                },
            })
            .collect()
    }
}

/// Diagnostic information about a single chunk.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChunkSummary {
    /// The chunk's index.
    pub index: usize,

    /// The chunk's total weight.
    pub weight: f64,

    /// The number of items in the chunk.
    pub item_count: usize,

    /// How far this chunk's weight is from the average, as a signed percentage.
    pub deviation_percent: f64,
}
