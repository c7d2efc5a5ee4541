// Copyright (c) The specsplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Spec file naming and path normalization.
//!
//! Reports, timing models and directory scans all refer to spec files, but not always in the same
//! way: a report may contain `./spec/a_spec.sh` or an absolute path from the CI machine, while a
//! directory scan produces `spec/a_spec.sh`. Everything is funneled through
//! [`SpecLayout::normalize`] so that these all refer to the same entity.

/// Describes where spec files live and how they are named.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SpecLayout {
    test_root: String,
    suffix: String,
}

impl SpecLayout {
    /// The default test root.
    pub const DEFAULT_TEST_ROOT: &'static str = "spec";

    /// The default spec file suffix.
    pub const DEFAULT_SUFFIX: &'static str = "_spec.sh";

    /// Creates a new layout.
    ///
    /// Surrounding slashes are stripped from `test_root`.
    pub fn new(test_root: impl Into<String>, suffix: impl Into<String>) -> Self {
        let test_root = test_root.into();
        Self {
            test_root: test_root.trim_matches('/').to_owned(),
            suffix: suffix.into(),
        }
    }

    /// Returns the directory, relative to the project root, that spec files live under.
    pub fn test_root(&self) -> &str {
        &self.test_root
    }

    /// Returns the suffix spec file names end with.
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Returns true if `path` names a spec file.
    pub fn is_spec_file(&self, path: &str) -> bool {
        path.ends_with(&self.suffix)
    }

    /// Normalizes a spec file path.
    ///
    /// The result never starts with `./`, and always starts with the test root. Absolute paths are
    /// reduced to the portion starting at the test root; if the test root doesn't appear in the
    /// path, the file name is placed directly under it. This operation is idempotent.
    pub fn normalize(&self, raw: &str) -> String {
        let unified = raw.trim().replace('\\', "/");
        let mut path = unified.as_str();
        while let Some(rest) = path.strip_prefix("./") {
            path = rest;
        }

        let root_prefix = format!("{}/", self.test_root);
        if path.starts_with(&root_prefix) {
            return path.to_owned();
        }

        let marker = format!("/{}/", self.test_root);
        if let Some(idx) = path.find(&marker) {
            return path[idx + 1..].to_owned();
        }

        if path.starts_with('/') {
            let file_name = path.rsplit('/').next().unwrap_or(path);
            return format!("{root_prefix}{file_name}");
        }

        format!("{root_prefix}{path}")
    }
}

impl Default for SpecLayout {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TEST_ROOT, Self::DEFAULT_SUFFIX)
    }
}
