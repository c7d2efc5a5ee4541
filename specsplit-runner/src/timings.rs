// Copyright (c) The specsplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reading and writing timing models on disk.

use crate::{
    errors::{TimingModelLoadError, TimingModelWriteError},
    spec_path::SpecLayout,
};
use camino::Utf8Path;
use specsplit_metadata::{FileExampleTimings, TimingModel};
use std::{borrow::Cow, collections::BTreeMap, io::Write};
use tracing::debug;

/// Loads the timing model at `path`.
///
/// A failure here is not fatal to scheduling. Callers are expected to log it and carry on
/// without a model.
pub fn load_timing_model(path: &Utf8Path) -> Result<TimingModel, TimingModelLoadError> {
    let contents = std::fs::read_to_string(path).map_err(|error| TimingModelLoadError::Read {
        path: path.to_owned(),
        error,
    })?;
    let model =
        TimingModel::from_json_str(&contents).map_err(|error| TimingModelLoadError::Parse {
            path: path.to_owned(),
            error,
        })?;

    debug!(
        "loaded version {} timing model with {} entries from {path}",
        model.version(),
        model.file_count(),
    );
    Ok(model)
}

/// Rewrites the keys of `model` into normalized spec-file paths.
///
/// Models produced by other tools may key files as `./spec/a_spec.sh` or by absolute path.
/// Entries whose keys normalize to the same path are combined: durations and totals are summed,
/// and examples are appended in order, summing the times of any that share an ID.
///
/// Returns the model unchanged if every key is already normalized.
pub fn normalize_timing_model<'m>(
    model: &'m TimingModel,
    layout: &SpecLayout,
) -> Cow<'m, TimingModel> {
    let already_normalized = match model {
        TimingModel::FileLevel(timings) => timings.keys().all(|key| layout.normalize(key) == *key),
        TimingModel::ExampleLevel(timings) => {
            timings.keys().all(|key| layout.normalize(key) == *key)
        }
    };
    if already_normalized {
        return Cow::Borrowed(model);
    }

    let normalized = match model {
        TimingModel::FileLevel(timings) => {
            let mut out = BTreeMap::new();
            for (key, seconds) in timings {
                *out.entry(layout.normalize(key)).or_insert(0.0) += *seconds;
            }
            TimingModel::FileLevel(out)
        }
        TimingModel::ExampleLevel(timings) => {
            let mut out: BTreeMap<String, FileExampleTimings> = BTreeMap::new();
            for (key, file) in timings {
                let entry = out.entry(layout.normalize(key)).or_default();
                entry.total += file.total;
                for (id, timing) in &file.examples {
                    entry
                        .examples
                        .entry(*id)
                        .and_modify(|existing| existing.time += timing.time)
                        .or_insert_with(|| timing.clone());
                }
            }
            TimingModel::ExampleLevel(out)
        }
    };
    debug!(
        "normalized timing model keys: {} entries became {}",
        model.file_count(),
        normalized.file_count(),
    );
    Cow::Owned(normalized)
}

/// Writes `model` to `path`, replacing any existing file atomically.
pub fn write_timing_model(
    model: &TimingModel,
    path: &Utf8Path,
) -> Result<(), TimingModelWriteError> {
    let mut json = model
        .to_json_string_pretty()
        .map_err(TimingModelWriteError::Serialize)?;
    json.push('\n');

    atomicwrites::AtomicFile::new(path, atomicwrites::AllowOverwrite)
        .write(|file| file.write_all(json.as_bytes()))
        .map_err(|error| TimingModelWriteError::Write {
            path: path.to_owned(),
            error,
        })
}
