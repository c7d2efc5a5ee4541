// Copyright (c) The specsplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `merge` command.

use crate::{ExpectedError, Result};
use camino::Utf8PathBuf;
use clap::{Args, ValueEnum};
use specsplit_runner::{
    config::SpecsplitConfig,
    helpers::plural,
    merge::merge_samples,
    report::{ReportParser, SampleGranularity, TimingSample},
    timings::write_timing_model,
};
use tracing::{debug, info, warn};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
enum MergeGranularity {
    /// Per-file totals (writes a version 1.0 model)
    #[default]
    File,

    /// Per-example durations (writes a version 2.0 model)
    Example,
}

impl From<MergeGranularity> for SampleGranularity {
    fn from(granularity: MergeGranularity) -> Self {
        match granularity {
            MergeGranularity::File => SampleGranularity::File,
            MergeGranularity::Example => SampleGranularity::Example,
        }
    }
}

/// Options for the `merge` command.
#[derive(Debug, Args)]
pub(crate) struct MergeOpts {
    /// The granularity to sample reports at
    #[arg(long, short, value_enum, default_value_t)]
    granularity: MergeGranularity,

    /// Where to write the timing model [default: from the config]
    #[arg(long, short, value_name = "PATH")]
    output: Option<Utf8PathBuf>,

    /// JUnit XML reports to merge
    #[arg(value_name = "REPORT", required = true)]
    reports: Vec<Utf8PathBuf>,
}

impl MergeOpts {
    pub(crate) fn exec(self, config: &SpecsplitConfig) -> Result<i32> {
        let granularity = SampleGranularity::from(self.granularity);
        let parser = ReportParser::new(config.layout());

        let mut samples = Vec::with_capacity(self.reports.len());
        for path in &self.reports {
            let xml = std::fs::read_to_string(path)
                .map_err(|err| ExpectedError::report_read_failed(path, err))?;
            let sample = parser.parse(&xml, granularity);
            let is_empty = match &sample {
                TimingSample::Files(sample) => sample.is_empty(),
                TimingSample::Examples(sample) => sample.is_empty(),
            };
            if is_empty {
                warn!("report {path} contained no spec file timings");
            } else {
                debug!("sampled report {path}");
            }
            samples.push(sample);
        }

        let model = merge_samples(granularity, &samples)?;
        let output = self.output.unwrap_or_else(|| config.timings_path());
        write_timing_model(&model, &output)?;

        info!(
            "wrote version {} timing model for {} spec {} from {} {} to {output}",
            model.version(),
            model.file_count(),
            plural::files_str(model.file_count()),
            self.reports.len(),
            plural::reports_str(self.reports.len()),
        );
        Ok(0)
    }
}
