// Copyright (c) The specsplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Merging timing samples from several reports into a single timing model.
//!
//! A spec file or example that a report never observed does not count as a zero-second
//! observation: averages are only taken over the samples that actually contain the key.

use crate::{
    errors::MergeError,
    report::{ExampleSample, FileSample, SampleGranularity, TimingSample},
};
use indexmap::IndexMap;
use specsplit_metadata::{
    ExampleId, ExampleTiming, ExampleTimings, FileExampleTimings, FileTimings, TimingModel,
};
use std::collections::BTreeMap;

/// Merges samples of the same granularity into a timing model.
///
/// File samples produce a version 1.0 model and example samples a version 2.0 model.
pub fn merge_samples(
    granularity: SampleGranularity,
    samples: &[TimingSample],
) -> Result<TimingModel, MergeError> {
    if samples.is_empty() {
        return Err(MergeError::NoSamples);
    }

    match granularity {
        SampleGranularity::File => {
            let files = samples
                .iter()
                .enumerate()
                .map(|(index, sample)| match sample {
                    TimingSample::Files(sample) => Ok(sample),
                    TimingSample::Examples(_) => Err(mismatch(index, granularity, sample)),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(TimingModel::FileLevel(merge_file_samples(files)))
        }
        SampleGranularity::Example => {
            let examples = samples
                .iter()
                .enumerate()
                .map(|(index, sample)| match sample {
                    TimingSample::Examples(sample) => Ok(sample),
                    TimingSample::Files(_) => Err(mismatch(index, granularity, sample)),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(TimingModel::ExampleLevel(merge_example_samples(examples)))
        }
    }
}

fn mismatch(index: usize, expected: SampleGranularity, sample: &TimingSample) -> MergeError {
    MergeError::GranularityMismatch {
        index,
        expected,
        actual: sample.granularity(),
    }
}

/// Averages file-level samples, per spec file.
pub fn merge_file_samples<'a>(samples: impl IntoIterator<Item = &'a FileSample>) -> FileTimings {
    let mut accumulated: BTreeMap<&str, Mean> = BTreeMap::new();
    for sample in samples {
        for (spec_file, seconds) in sample.iter() {
            accumulated.entry(spec_file).or_default().add(seconds);
        }
    }

    accumulated
        .into_iter()
        .map(|(spec_file, mean)| (spec_file.to_owned(), mean.value()))
        .collect()
}

/// Averages example-level samples, per `(spec file, example)` pair.
///
/// Names and line numbers are taken from the first sample that observed each example.
pub fn merge_example_samples<'a>(
    samples: impl IntoIterator<Item = &'a ExampleSample>,
) -> ExampleTimings {
    let mut accumulated: BTreeMap<&str, IndexMap<ExampleId, ExampleAccumulator<'a>>> =
        BTreeMap::new();
    for sample in samples {
        for record in sample.records() {
            accumulated
                .entry(record.spec_file.as_str())
                .or_default()
                .entry(record.example_id)
                .or_insert_with(|| ExampleAccumulator {
                    mean: Mean::default(),
                    name: record.name.as_str(),
                    line: record.line,
                })
                .mean
                .add(record.duration);
        }
    }

    accumulated
        .into_iter()
        .map(|(spec_file, examples)| {
            let examples = examples
                .into_iter()
                .map(|(example_id, acc)| {
                    let timing = ExampleTiming {
                        time: acc.mean.value(),
                        name: acc.name.to_owned(),
                        line: acc.line,
                    };
                    (example_id, timing)
                })
                .collect();
            (
                spec_file.to_owned(),
                FileExampleTimings::from_examples(examples),
            )
        })
        .collect()
}

struct ExampleAccumulator<'a> {
    mean: Mean,
    name: &'a str,
    line: Option<u32>,
}

#[derive(Clone, Copy, Debug, Default)]
struct Mean {
    sum: f64,
    count: u32,
}

impl Mean {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn value(self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / f64::from(self.count)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ExampleRecord;
    use maplit::btreemap;
    use pretty_assertions::assert_eq;

    fn file_sample(entries: &[(&str, f64)]) -> FileSample {
        FileSample::new(
            entries
                .iter()
                .map(|(spec_file, seconds)| ((*spec_file).to_owned(), *seconds))
                .collect(),
        )
    }

    fn record(spec_file: &str, position: u32, duration: f64, name: &str) -> ExampleRecord {
        ExampleRecord {
            spec_file: spec_file.to_owned(),
            example_id: ExampleId::new(position),
            duration,
            name: name.to_owned(),
            line: None,
        }
    }

    #[test]
    fn disjoint_keys_are_kept() {
        let merged = merge_file_samples(&[file_sample(&[("a", 5.0)]), file_sample(&[("b", 3.0)])]);
        assert_eq!(
            merged,
            btreemap! { "a".to_owned() => 5.0, "b".to_owned() => 3.0 }
        );
    }

    #[test]
    fn shared_keys_are_averaged() {
        let merged = merge_file_samples(&[file_sample(&[("a", 2.0)]), file_sample(&[("a", 4.0)])]);
        assert_eq!(merged, btreemap! { "a".to_owned() => 3.0 });
    }

    #[test]
    fn absent_is_not_zero() {
        let merged = merge_file_samples(&[
            file_sample(&[("a", 6.0), ("b", 1.0)]),
            file_sample(&[("b", 3.0)]),
            file_sample(&[("a", 0.0)]),
        ]);
        // `a` is present (as zero) in the third sample, but absent from the second.
        assert_eq!(
            merged,
            btreemap! { "a".to_owned() => 3.0, "b".to_owned() => 2.0 }
        );
    }

    #[test]
    fn examples_are_averaged_and_totalled() {
        let first = ExampleSample::new(vec![
            record("spec/a_spec.sh", 1, 1.0, "one"),
            record("spec/a_spec.sh", 2, 4.0, "two"),
        ]);
        let second = ExampleSample::new(vec![
            record("spec/a_spec.sh", 1, 3.0, "one (renamed)"),
            record("spec/b_spec.sh", 1, 0.5, "b one"),
        ]);

        let merged = merge_example_samples(&[first, second]);

        let a = &merged["spec/a_spec.sh"];
        assert_eq!(a.total, 6.0);
        assert_eq!(a.examples[&ExampleId::new(1)].time, 2.0);
        assert_eq!(a.examples[&ExampleId::new(1)].name, "one");
        assert_eq!(a.examples[&ExampleId::new(2)].time, 4.0);

        let b = &merged["spec/b_spec.sh"];
        assert_eq!(b.total, 0.5);
        assert_eq!(b.examples.len(), 1);
    }

    #[test]
    fn merge_samples_checks_granularity() {
        assert_eq!(
            merge_samples(SampleGranularity::File, &[]),
            Err(MergeError::NoSamples)
        );

        let samples = [
            TimingSample::Files(file_sample(&[("a", 1.0)])),
            TimingSample::Examples(ExampleSample::default()),
        ];
        assert_eq!(
            merge_samples(SampleGranularity::File, &samples),
            Err(MergeError::GranularityMismatch {
                index: 1,
                expected: SampleGranularity::File,
                actual: SampleGranularity::Example,
            })
        );

        let model = merge_samples(SampleGranularity::File, &samples[..1]).expect("merge succeeds");
        assert_eq!(
            model,
            TimingModel::FileLevel(btreemap! { "a".to_owned() => 1.0 })
        );
    }
}
