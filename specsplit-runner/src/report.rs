// Copyright (c) The specsplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Extraction of timing samples from JUnit XML reports.
//!
//! The parser is deliberately forgiving. A report with malformed records, or one that stops
//! halfway through, still contributes whatever could be read from it: a CI scheduler must never
//! block a build on imperfect historical data.

use crate::{
    helpers::{parse_seconds, split_line_suffix},
    spec_path::SpecLayout,
};
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};
use specsplit_metadata::ExampleId;
use std::{
    collections::{BTreeMap, HashMap},
    fmt,
};
use tracing::{debug, warn};

/// The granularity a report is sampled at.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SampleGranularity {
    /// One aggregate duration per spec file.
    File,

    /// One duration per example.
    Example,
}

impl fmt::Display for SampleGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Example => write!(f, "example"),
        }
    }
}

/// Durations observed in a single report, per spec file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FileSample {
    timings: BTreeMap<String, f64>,
}

impl FileSample {
    /// Creates a new sample from the given durations, which must already be keyed by normalized
    /// spec file.
    pub fn new(timings: BTreeMap<String, f64>) -> Self {
        Self { timings }
    }

    /// Returns the duration observed for `spec_file`.
    pub fn get(&self, spec_file: &str) -> Option<f64> {
        self.timings.get(spec_file).copied()
    }

    /// Iterates over `(spec_file, seconds)` pairs in spec file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.timings
            .iter()
            .map(|(spec_file, seconds)| (spec_file.as_str(), *seconds))
    }

    /// Returns the number of spec files in this sample.
    pub fn len(&self) -> usize {
        self.timings.len()
    }

    /// Returns true if nothing was observed.
    pub fn is_empty(&self) -> bool {
        self.timings.is_empty()
    }
}

/// A single example observed in a report.
#[derive(Clone, Debug, PartialEq)]
pub struct ExampleRecord {
    /// The normalized spec file the example belongs to.
    pub spec_file: String,

    /// The example's position within the spec file, in report order.
    pub example_id: ExampleId,

    /// The example's duration in seconds.
    pub duration: f64,

    /// The example's display name.
    pub name: String,

    /// The line the example starts on, if the report carried it.
    pub line: Option<u32>,
}

/// Examples observed in a single report, in report order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExampleSample {
    records: Vec<ExampleRecord>,
}

impl ExampleSample {
    /// Creates a new sample from the given records.
    pub fn new(records: Vec<ExampleRecord>) -> Self {
        Self { records }
    }

    /// Returns the records in report order.
    pub fn records(&self) -> &[ExampleRecord] {
        &self.records
    }

    /// Returns true if nothing was observed.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A timing sample at either granularity.
#[derive(Clone, Debug, PartialEq)]
pub enum TimingSample {
    /// A file-level sample.
    Files(FileSample),

    /// An example-level sample.
    Examples(ExampleSample),
}

impl TimingSample {
    /// Returns the granularity of this sample.
    pub fn granularity(&self) -> SampleGranularity {
        match self {
            Self::Files(_) => SampleGranularity::File,
            Self::Examples(_) => SampleGranularity::Example,
        }
    }
}

/// Converts JUnit XML reports into timing samples.
#[derive(Clone, Copy, Debug)]
pub struct ReportParser<'a> {
    layout: &'a SpecLayout,
}

impl<'a> ReportParser<'a> {
    /// Creates a new parser for spec files laid out according to `layout`.
    pub fn new(layout: &'a SpecLayout) -> Self {
        Self { layout }
    }

    /// Parses `xml` at the requested granularity.
    pub fn parse(&self, xml: &str, granularity: SampleGranularity) -> TimingSample {
        match granularity {
            SampleGranularity::File => TimingSample::Files(self.file_sample(xml)),
            SampleGranularity::Example => TimingSample::Examples(self.example_sample(xml)),
        }
    }

    /// Parses `xml` into per-file durations.
    ///
    /// Testcase durations are summed per spec file. Suite-level durations are only used for files
    /// whose testcases contributed nothing.
    pub fn file_sample(&self, xml: &str) -> FileSample {
        let mut timings = BTreeMap::new();
        let mut suite_totals = BTreeMap::new();

        for record in scan_records(xml) {
            match record {
                RawRecord::Testcase(case) => {
                    if let Some(key) = self.testcase_key(&case) {
                        *timings.entry(key.spec_file).or_insert(0.0) +=
                            parse_seconds(case.time.as_deref());
                    }
                }
                RawRecord::Testsuite(suite) => {
                    if let Some(spec_file) = self.testsuite_key(&suite) {
                        *suite_totals.entry(spec_file).or_insert(0.0) +=
                            parse_seconds(suite.time.as_deref());
                    }
                }
            }
        }

        for (spec_file, total) in suite_totals {
            let seconds = timings.entry(spec_file).or_insert(0.0);
            if *seconds == 0.0 {
                *seconds = total;
            }
        }

        FileSample::new(timings)
    }

    /// Parses `xml` into per-example durations.
    pub fn example_sample(&self, xml: &str) -> ExampleSample {
        let mut counters = HashMap::new();
        let records = scan_records(xml)
            .into_iter()
            .filter_map(|record| match record {
                RawRecord::Testcase(case) => Some(case),
                RawRecord::Testsuite(_) => None,
            })
            .filter_map(|case| {
                let key = self.testcase_key(&case)?;
                let example_id = next_example_id(&mut counters, &key.spec_file);
                Some(ExampleRecord {
                    example_id,
                    duration: parse_seconds(case.time.as_deref()),
                    name: case.name,
                    line: key.line,
                    spec_file: key.spec_file,
                })
            })
            .collect();

        ExampleSample::new(records)
    }

    fn testcase_key(&self, case: &RawTestcase) -> Option<CaseKey> {
        let suffix = self.layout.suffix();
        let candidates = [
            case.classname.as_deref().map(split_line_suffix),
            case.file.as_deref().map(split_line_suffix),
            find_spec_token(&case.name, suffix),
        ];

        let Some((raw, embedded_line)) = candidates
            .into_iter()
            .flatten()
            .find(|(raw, _)| self.layout.is_spec_file(raw))
        else {
            debug!(name = %case.name, "ignoring testcase without a spec file");
            return None;
        };

        let line = case
            .line
            .as_deref()
            .and_then(|line| line.trim().parse().ok())
            .or(embedded_line);

        Some(CaseKey {
            spec_file: self.layout.normalize(raw),
            line,
        })
    }

    fn testsuite_key(&self, suite: &RawTestsuite) -> Option<String> {
        [suite.file.as_deref(), suite.name.as_deref()]
            .into_iter()
            .flatten()
            .map(|raw| split_line_suffix(raw).0)
            .find(|raw| self.layout.is_spec_file(raw))
            .map(|raw| self.layout.normalize(raw))
    }
}

struct CaseKey {
    spec_file: String,
    line: Option<u32>,
}

fn next_example_id(counters: &mut HashMap<String, u32>, spec_file: &str) -> ExampleId {
    let counter = counters.entry(spec_file.to_owned()).or_insert(0);
    *counter += 1;
    ExampleId::new(*counter)
}

/// Finds the first whitespace-separated token in `name` that looks like a spec file.
fn find_spec_token<'a>(name: &'a str, suffix: &str) -> Option<(&'a str, Option<u32>)> {
    name.split_whitespace().find_map(|token| {
        let token = token.trim_matches(|c: char| {
            matches!(
                c,
                '"' | '\'' | '`' | '(' | ')' | '[' | ']' | '<' | '>' | ',' | ';' | ':'
            )
        });
        let (path, line) = split_line_suffix(token);
        path.ends_with(suffix).then_some((path, line))
    })
}

enum RawRecord {
    Testcase(RawTestcase),
    Testsuite(RawTestsuite),
}

#[derive(Default)]
struct RawTestcase {
    name: String,
    classname: Option<String>,
    file: Option<String>,
    line: Option<String>,
    time: Option<String>,
}

#[derive(Default)]
struct RawTestsuite {
    name: Option<String>,
    file: Option<String>,
    time: Option<String>,
}

/// Reads all testcase and testsuite records from `xml`, in document order.
///
/// If the document turns out to be malformed, the records read so far are returned.
fn scan_records(xml: &str) -> Vec<RawRecord> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().check_end_names = false;

    let mut records = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) | Ok(Event::Empty(start)) => {
                match start.local_name().as_ref() {
                    b"testcase" => records.push(RawRecord::Testcase(read_testcase(&start))),
                    b"testsuite" => records.push(RawRecord::Testsuite(read_testsuite(&start))),
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(error) => {
                warn!(
                    "stopped reading malformed report at byte {}: {error}",
                    reader.buffer_position(),
                );
                break;
            }
        }
    }

    records
}

fn read_testcase(start: &BytesStart<'_>) -> RawTestcase {
    let mut case = RawTestcase::default();
    for (key, value) in read_attributes(start) {
        match key.as_str() {
            "name" => case.name = value,
            "classname" => case.classname = non_empty(value),
            "file" => case.file = non_empty(value),
            "line" => case.line = non_empty(value),
            "time" => case.time = Some(value),
            _ => {}
        }
    }
    case
}

fn read_testsuite(start: &BytesStart<'_>) -> RawTestsuite {
    let mut suite = RawTestsuite::default();
    for (key, value) in read_attributes(start) {
        match key.as_str() {
            "name" => suite.name = non_empty(value),
            "file" => suite.file = non_empty(value),
            "time" => suite.time = Some(value),
            _ => {}
        }
    }
    suite
}

/// Returns the attributes of `start` as `(local name, unescaped value)` pairs.
///
/// Malformed attributes are skipped, and values that fail to unescape are used verbatim.
fn read_attributes(start: &BytesStart<'_>) -> Vec<(String, String)> {
    start
        .attributes()
        .flatten()
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = match attr.unescape_value() {
                Ok(value) => value.into_owned(),
                Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
            };
            (key, value)
        })
        .collect()
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use maplit::btreemap;
    use pretty_assertions::assert_eq;
    use quick_junit::{Report, TestCase, TestCaseStatus, TestSuite};
    use std::time::Duration;

    const SHELLSPEC_REPORT: &str = indoc! {r#"
        <?xml version="1.0" encoding="UTF-8"?>
        <testsuites tests="5" time="4.5">
          <testsuite name="spec/a_spec.sh" tests="3" time="3.5">
            <testcase classname="spec/a_spec.sh" name="a adds numbers" time="1.0"/>
            <testcase classname="./spec/a_spec.sh" name="a subtracts numbers" time="2.5">
              <failure message="expected 1, got 2"/>
            </testcase>
            <testcase classname="spec/a_spec.sh" name="a is broken" time="oops"/>
          </testsuite>
          <testsuite name="spec/b_spec.sh" tests="1" time="0.25">
            <testcase classname="/home/ci/project/spec/b_spec.sh" name="b &amp; friends" time="0.25"/>
          </testsuite>
          <testsuite name="helpers" tests="1" time="9">
            <testcase classname="helpers" name="not a spec file" time="9"/>
          </testsuite>
        </testsuites>
    "#};

    fn parser_test(f: impl FnOnce(ReportParser<'_>)) {
        let layout = SpecLayout::default();
        f(ReportParser::new(&layout));
    }

    #[test]
    fn file_sample_sums_testcases() {
        parser_test(|parser| {
            let sample = parser.file_sample(SHELLSPEC_REPORT);
            assert_eq!(
                sample,
                FileSample::new(btreemap! {
                    "spec/a_spec.sh".to_owned() => 3.5,
                    "spec/b_spec.sh".to_owned() => 0.25,
                })
            );
        });
    }

    #[test]
    fn example_sample_numbers_per_file() {
        parser_test(|parser| {
            let sample = parser.example_sample(SHELLSPEC_REPORT);
            let summary: Vec<_> = sample
                .records()
                .iter()
                .map(|record| {
                    (
                        record.spec_file.as_str(),
                        record.example_id.to_string(),
                        record.duration,
                        record.name.as_str(),
                    )
                })
                .collect();
            assert_eq!(
                summary,
                vec![
                    ("spec/a_spec.sh", "@1".to_owned(), 1.0, "a adds numbers"),
                    ("spec/a_spec.sh", "@2".to_owned(), 2.5, "a subtracts numbers"),
                    ("spec/a_spec.sh", "@3".to_owned(), 0.0, "a is broken"),
                    ("spec/b_spec.sh", "@1".to_owned(), 0.25, "b & friends"),
                ]
            );

            // Parsing is referentially transparent: a second parse assigns the same IDs.
            assert_eq!(parser.example_sample(SHELLSPEC_REPORT), sample);
        });
    }

    #[test]
    fn suite_fallback_only_for_zero_files() {
        let xml = indoc! {r#"
            <testsuites>
              <testsuite name="spec/a_spec.sh" time="10">
                <testcase classname="spec/a_spec.sh" name="timed" time="1.5"/>
              </testsuite>
              <testsuite name="spec/b_spec.sh" time="7">
                <testcase classname="spec/b_spec.sh" name="untimed"/>
              </testsuite>
              <testsuite name="suite" file="./spec/c_spec.sh" time="4"/>
            </testsuites>
        "#};

        parser_test(|parser| {
            assert_eq!(
                parser.file_sample(xml),
                FileSample::new(btreemap! {
                    "spec/a_spec.sh".to_owned() => 1.5,
                    "spec/b_spec.sh".to_owned() => 7.0,
                    "spec/c_spec.sh".to_owned() => 4.0,
                })
            );
        });
    }

    #[test]
    fn key_derived_from_name_and_file() {
        let xml = indoc! {r#"
            <testsuite name="shellspec">
              <testcase name="(spec/x_spec.sh:12) does things" time="1"/>
              <testcase name="other" file="spec/y_spec.sh:30" time="2"/>
              <testcase name="explicit line" classname="spec/y_spec.sh" line="44" time="3"/>
            </testsuite>
        "#};

        parser_test(|parser| {
            let sample = parser.example_sample(xml);
            let keys: Vec<_> = sample
                .records()
                .iter()
                .map(|record| (record.spec_file.as_str(), record.line))
                .collect();
            assert_eq!(
                keys,
                vec![
                    ("spec/x_spec.sh", Some(12)),
                    ("spec/y_spec.sh", Some(30)),
                    ("spec/y_spec.sh", Some(44)),
                ]
            );
        });
    }

    #[test]
    fn degenerate_documents() {
        parser_test(|parser| {
            for xml in ["", "not xml at all", "<testsuites/>", "<html><body/></html>"] {
                assert!(parser.file_sample(xml).is_empty(), "{xml:?} is empty");
                assert!(parser.example_sample(xml).is_empty(), "{xml:?} is empty");
            }
        });
    }

    #[test]
    fn truncated_document_keeps_records_read_so_far() {
        let xml = indoc! {r#"
            <testsuites>
              <testsuite name="spec/a_spec.sh">
                <testcase classname="spec/a_spec.sh" name="one" time="1"/>
                <testcase classname="spec/a_spec.sh" name="two" time=
        "#};

        parser_test(|parser| {
            assert_eq!(parser.file_sample(xml).get("spec/a_spec.sh"), Some(1.0));
        });
    }

    #[test]
    fn quick_junit_report() {
        let mut report = Report::new("ci-run");
        let mut testsuite = TestSuite::new("spec/lib_spec.sh");
        for (name, millis) in [("first", 1500), ("second", 250)] {
            let mut testcase = TestCase::new(name, TestCaseStatus::success());
            testcase
                .set_classname("spec/lib_spec.sh")
                .set_time(Duration::from_millis(millis));
            testsuite.add_test_case(testcase);
        }
        report.add_test_suite(testsuite);
        let xml = report.to_string().expect("serializing report succeeds");

        parser_test(|parser| {
            assert_eq!(
                parser.parse(&xml, SampleGranularity::File),
                TimingSample::Files(FileSample::new(btreemap! {
                    "spec/lib_spec.sh".to_owned() => 1.75,
                }))
            );
            let TimingSample::Examples(examples) = parser.parse(&xml, SampleGranularity::Example)
            else {
                panic!("example granularity produces an example sample");
            };
            assert_eq!(examples.records().len(), 2);
            assert_eq!(examples.records()[1].example_id, ExampleId::new(2));
        });
    }
}
