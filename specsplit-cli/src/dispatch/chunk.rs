// Copyright (c) The specsplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `chunk` and `plan` commands.

use super::discover::discover_spec_files;
use crate::{
    ExpectedError, Result,
    output::{OutputContext, OutputWriter},
};
use camino::Utf8PathBuf;
use clap::Args;
use itertools::Itertools;
use specsplit_metadata::TimingModel;
use specsplit_runner::{
    config::SpecsplitConfig,
    errors::TimingModelLoadError,
    helpers::plural,
    items::{FsSpecSource, Granularity, ItemBuilder},
    partition::{ChunkAssignment, ChunkRequest, LoadBalancer},
    timings::load_timing_model,
};
use std::{io::Write, num::NonZeroUsize};
use tracing::{info, warn};

/// Options that determine how the suite is partitioned.
#[derive(Debug, Args)]
#[command(next_help_heading = "Partition options")]
pub(crate) struct PartitionOpts {
    /// The total number of chunks
    #[arg(long, short = 'n', value_name = "N", env = "SPECSPLIT_CHUNKS")]
    chunks: usize,

    /// The timing model to read [default: from the config]
    #[arg(long, value_name = "PATH")]
    timings: Option<Utf8PathBuf>,

    /// The unit of scheduling: file, example or hybrid [default: from the config]
    #[arg(long, short, value_name = "GRANULARITY")]
    granularity: Option<Granularity>,

    /// Spec files to partition, instead of scanning the test root
    #[arg(value_name = "SPEC_FILE")]
    spec_files: Vec<String>,
}

impl PartitionOpts {
    /// Computes the full partition.
    fn compute(
        &self,
        config: &SpecsplitConfig,
        total_chunks: NonZeroUsize,
        output: OutputContext,
    ) -> Result<ChunkAssignment> {
        let layout = config.layout();
        let candidates = if self.spec_files.is_empty() {
            discover_spec_files(config.project_root(), layout)?
        } else {
            self.spec_files
                .iter()
                .map(|spec_file| layout.normalize(spec_file))
                .unique()
                .collect()
        };
        if candidates.is_empty() {
            return Err(ExpectedError::NoSpecFiles {
                test_root: config.project_root().join(layout.test_root()),
                suffix: layout.suffix().to_owned(),
            });
        }

        let model = self.load_model(config);
        let granularity = self.granularity.unwrap_or_else(|| config.granularity());
        let source = FsSpecSource::new(config.project_root());
        let set = ItemBuilder::new(layout, config.static_weigher(), &source)
            .with_split_ratio(config.hybrid_split_ratio())
            .build(
                candidates.iter().map(String::as_str),
                model.as_ref(),
                granularity,
                total_chunks,
            );

        if !set.split_files.is_empty() {
            info!(
                "split {} spec {} into examples ({} granularity)",
                set.split_files.len(),
                plural::files_str(set.split_files.len()),
                set.effective,
            );
        }
        if !set.estimated.is_empty() {
            info!(
                "{} spec {} had no timing data and were weighted statically",
                set.estimated.len(),
                plural::files_str(set.estimated.len()),
            );
            if output.verbose {
                info!("statically weighted: {}", set.estimated.iter().join(", "));
            }
        }

        let item_count = set.items.len();
        let assignment = LoadBalancer::balance(set.items, total_chunks)?;
        info!(
            "distributed {item_count} {} ({:.1}s) across {} chunks (makespan {:.1}s)",
            plural::items_str(item_count),
            assignment.total_weight(),
            total_chunks,
            assignment.makespan(),
        );
        for summary in assignment.summaries() {
            info!(
                "chunk {}: {:.1}s across {} {} ({:+.1}%)",
                summary.index,
                summary.weight,
                summary.item_count,
                plural::items_str(summary.item_count),
                summary.deviation_percent,
            );
        }

        Ok(assignment)
    }

    /// Loads the timing model. Failures are logged and produce `None`.
    fn load_model(&self, config: &SpecsplitConfig) -> Option<TimingModel> {
        let path = self
            .timings
            .clone()
            .unwrap_or_else(|| config.timings_path());
        match load_timing_model(&path) {
            Ok(model) => Some(model),
            Err(TimingModelLoadError::Read { error, .. })
                if error.kind() == std::io::ErrorKind::NotFound =>
            {
                info!("no timing model at {path}: all spec files will be weighted statically");
                None
            }
            Err(error) => {
                warn!("{error}: all spec files will be weighted statically");
                None
            }
        }
    }
}

/// Options for the `chunk` command.
#[derive(Debug, Args)]
pub(crate) struct ChunkOpts {
    /// The chunk to print, counting up from 0
    #[arg(long, short, value_name = "I", env = "SPECSPLIT_INDEX")]
    index: usize,

    /// Print one identifier per line instead of separating them with spaces
    #[arg(long)]
    one_per_line: bool,

    #[clap(flatten)]
    partition: PartitionOpts,
}

impl ChunkOpts {
    pub(crate) fn exec(
        self,
        config: &SpecsplitConfig,
        output: OutputContext,
        output_writer: &mut OutputWriter,
    ) -> Result<i32> {
        // Validate the request before doing any work.
        let request = ChunkRequest::new(self.index, self.partition.chunks)?;
        let assignment = self
            .partition
            .compute(config, request.total_chunks(), output)?;

        let identifiers = assignment.render(request.index())?;
        if identifiers.is_empty() {
            warn!(
                "chunk {} of {} is empty: there are fewer items than chunks",
                request.index(),
                request.total_chunks(),
            );
        }

        let separator = if self.one_per_line { "\n" } else { " " };
        let mut writer = output_writer.stdout_writer();
        writeln!(writer, "{}", identifiers.iter().join(separator))
            .and_then(|()| writer.flush())
            .map_err(ExpectedError::write_output)?;

        Ok(0)
    }
}

/// Options for the `plan` command.
#[derive(Debug, Args)]
pub(crate) struct PlanOpts {
    #[clap(flatten)]
    partition: PartitionOpts,
}

impl PlanOpts {
    pub(crate) fn exec(
        self,
        config: &SpecsplitConfig,
        output: OutputContext,
        output_writer: &mut OutputWriter,
    ) -> Result<i32> {
        let total_chunks = ChunkRequest::new(0, self.partition.chunks)?.total_chunks();
        let assignment = self.partition.compute(config, total_chunks, output)?;

        let mut writer = output_writer.stdout_writer();
        for index in 0..assignment.total_chunks() {
            let identifiers = assignment.render(index)?;
            writeln!(writer, "{index}\t{}", identifiers.iter().join(" "))
                .map_err(ExpectedError::write_output)?;
        }
        writer.flush().map_err(ExpectedError::write_output)?;

        Ok(0)
    }
}
