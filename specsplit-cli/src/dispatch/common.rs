// Copyright (c) The specsplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Options shared between subcommands.

use crate::{ExpectedError, Result};
use camino::Utf8PathBuf;
use clap::Args;
use specsplit_runner::config::{DefaultConfigWarnings, SpecsplitConfig};

/// Options shared between all subcommands.
#[derive(Debug, Args)]
pub(crate) struct CommonOpts {
    /// The project root, containing the test root and `.config/specsplit.toml`.
    #[arg(
        long,
        global = true,
        value_name = "DIR",
        default_value = ".",
        env = "SPECSPLIT_PROJECT_ROOT"
    )]
    pub(crate) project_root: Utf8PathBuf,

    /// Config file [default: project-root/.config/specsplit.toml].
    #[arg(long, global = true, value_name = "PATH", help_heading = "Config options")]
    pub(crate) config_file: Option<Utf8PathBuf>,

    #[clap(flatten)]
    pub(crate) output: crate::output::OutputOpts,
}

impl CommonOpts {
    /// Reads the specsplit config for the project root.
    pub(crate) fn make_config(&self) -> Result<SpecsplitConfig> {
        if !self.project_root.is_dir() {
            return Err(ExpectedError::ProjectRootInvalid {
                project_root: self.project_root.clone(),
            });
        }

        Ok(SpecsplitConfig::from_sources(
            &self.project_root,
            self.config_file.as_deref(),
            &mut DefaultConfigWarnings,
        )?)
    }
}
