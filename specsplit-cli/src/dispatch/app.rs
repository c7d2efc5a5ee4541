// Copyright (c) The specsplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Top-level application and command routing.

use super::{
    chunk::{ChunkOpts, PlanOpts},
    common::CommonOpts,
    merge::MergeOpts,
};
use crate::{
    Result,
    output::{OutputContext, OutputWriter},
};
use clap::Subcommand;

/// Split a shell spec suite into balanced chunks for parallel CI workers.
///
/// Historical timings come from JUnit reports of earlier runs (see `specsplit merge`). Spec files
/// without history are weighted by a static estimate of their size.
#[derive(Debug, clap::Parser)]
#[command(
    version,
    bin_name = "specsplit",
    styles = crate::output::clap_styles::style(),
    max_term_width = 100,
)]
pub struct SpecsplitApp {
    #[clap(flatten)]
    common: CommonOpts,

    #[clap(subcommand)]
    command: Command,
}

impl SpecsplitApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.common.output.init()
    }

    /// Executes the app.
    ///
    /// Returns the exit code.
    pub fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        let config = self.common.make_config()?;
        match self.command {
            Command::Chunk(opts) => opts.exec(&config, output, output_writer),
            Command::Plan(opts) => opts.exec(&config, output, output_writer),
            Command::Merge(opts) => opts.exec(&config),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the spec files (or examples) one chunk should run
    ///
    /// The full partition is computed from the timing model and the spec files found under the
    /// test root, and the identifiers for the requested chunk are printed to stdout. Every worker
    /// computes the same partition, so each only needs to know its own index.
    Chunk(ChunkOpts),

    /// Print every chunk, for inspecting how a suite would be split
    Plan(PlanOpts),

    /// Merge JUnit reports into a timing model
    ///
    /// Each report is sampled independently. Durations are then averaged across the reports that
    /// observed each spec file (or example), and the result is written out atomically.
    Merge(MergeOpts),
}
