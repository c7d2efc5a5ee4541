// Copyright (c) The specsplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8Path;
use camino_tempfile::Utf8TempDir;
use color_eyre::eyre::Result;
use quick_junit::{Report, TestCase, TestCaseStatus, TestSuite};
use std::time::Duration;

/// Spec files in the fixture project, with their contents.
///
/// `c_spec.sh` never shows up in a report, so it is always weighted statically: 5 lines and
/// 2 blocks give it a weight of 25.
pub(crate) const SPEC_FILES: &[(&str, &str)] = &[
    (
        "spec/a_spec.sh",
        "Describe 'a'\n  It 'adds'\n  End\n  It 'subtracts'\n  End\nEnd\n",
    ),
    ("spec/b_spec.sh", "Describe 'b'\n  It 'works'\n  End\nEnd\n"),
    (
        "spec/nested/c_spec.sh",
        "Describe 'c'\n  It 'works'\n    When call true\n  End\nEnd\n",
    ),
];

/// A project directory laid out the way specsplit expects.
pub(crate) struct FixtureProject {
    dir: Utf8TempDir,
}

impl FixtureProject {
    pub(crate) fn new() -> Result<Self> {
        let dir = camino_tempfile::tempdir()?;
        for (spec_file, contents) in SPEC_FILES {
            let path = dir.path().join(spec_file);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, contents)?;
        }
        Ok(Self { dir })
    }

    pub(crate) fn root(&self) -> &Utf8Path {
        self.dir.path()
    }

    pub(crate) fn candidates(&self) -> Vec<&'static str> {
        SPEC_FILES.iter().map(|(spec_file, _)| *spec_file).collect()
    }
}

/// Builds a JUnit report the way a CI run would produce one: classnames are absolute paths on
/// the CI machine.
pub(crate) fn junit_report(name: &str, cases: &[(&str, &str, u64)]) -> Result<String> {
    let mut report = Report::new(name);
    let mut testsuite = TestSuite::new("specsplit fixture");
    for (spec_file, example, millis) in cases {
        let mut testcase = TestCase::new(*example, TestCaseStatus::success());
        testcase
            .set_classname(format!("/builds/ci/project/{spec_file}"))
            .set_time(Duration::from_millis(*millis));
        testsuite.add_test_case(testcase);
    }
    report.add_test_suite(testsuite);
    Ok(report.to_string()?)
}

/// The first of two CI runs.
pub(crate) fn first_run() -> Result<String> {
    junit_report(
        "run-1",
        &[
            ("spec/a_spec.sh", "a adds", 6000),
            ("spec/a_spec.sh", "a subtracts", 4000),
            ("spec/b_spec.sh", "b works", 3000),
        ],
    )
}

/// The second of two CI runs. It didn't run `b_spec.sh` at all.
pub(crate) fn second_run() -> Result<String> {
    junit_report(
        "run-2",
        &[
            ("spec/a_spec.sh", "a adds", 8000),
            ("spec/a_spec.sh", "a subtracts", 2000),
        ],
    )
}
