// Copyright (c) The specsplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{ExpectedError, Result};
use camino::Utf8Path;
use specsplit_runner::spec_path::SpecLayout;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Finds all spec files under the test root, as sorted project-relative paths.
///
/// A missing test root produces an empty list.
pub(crate) fn discover_spec_files(
    project_root: &Utf8Path,
    layout: &SpecLayout,
) -> Result<Vec<String>> {
    let test_root = project_root.join(layout.test_root());
    if !test_root.is_dir() {
        debug!("test root {test_root} does not exist");
        return Ok(Vec::new());
    }

    let mut spec_files = Vec::new();
    for entry in WalkDir::new(&test_root).follow_links(true) {
        let entry = entry.map_err(|err| ExpectedError::DiscoverFailed {
            test_root: test_root.clone(),
            err,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let Some(path) = Utf8Path::from_path(entry.path()) else {
            warn!("skipping non-UTF-8 path {}", entry.path().display());
            continue;
        };
        if !layout.is_spec_file(path.as_str()) {
            continue;
        }

        let relative = path.strip_prefix(project_root).unwrap_or(path);
        spec_files.push(layout.normalize(relative.as_str()));
    }

    spec_files.sort();
    debug!("found {} spec files under {test_root}", spec_files.len());
    Ok(spec_files)
}
