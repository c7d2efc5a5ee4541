// Copyright (c) The specsplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for specsplit.
//!
//! The built-in defaults (see `default-config.toml`) are layered under an optional repository
//! config file, `.config/specsplit.toml`.

use crate::{
    errors::{ConfigParseError, ConfigParseErrorKind},
    items::{Granularity, StaticWeigher},
    spec_path::SpecLayout,
};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::warn;

/// Trait for handling configuration warnings.
///
/// Warnings are logged by default; tests collect them instead.
pub trait ConfigWarnings {
    /// Handle unknown configuration keys found in a config file.
    fn unknown_config_keys(
        &mut self,
        config_file: &Utf8Path,
        project_root: &Utf8Path,
        unknown: &BTreeSet<String>,
    );
}

/// Default implementation of [`ConfigWarnings`] that logs warnings using the tracing crate.
pub struct DefaultConfigWarnings;

impl ConfigWarnings for DefaultConfigWarnings {
    fn unknown_config_keys(
        &mut self,
        config_file: &Utf8Path,
        project_root: &Utf8Path,
        unknown: &BTreeSet<String>,
    ) {
        let mut unknown_str = String::new();
        if let (1, Some(ignored_key)) = (unknown.len(), unknown.first()) {
            // Print this on the same line.
            unknown_str.push_str("key: ");
            unknown_str.push_str(ignored_key);
        } else {
            unknown_str.push_str("keys:\n");
            for ignored_key in unknown {
                unknown_str.push('\n');
                unknown_str.push_str("  - ");
                unknown_str.push_str(ignored_key);
            }
        }

        warn!(
            "in config file {}, ignoring unknown configuration {unknown_str}",
            config_file
                .strip_prefix(project_root)
                .unwrap_or(config_file),
        )
    }
}

/// Overall configuration for specsplit.
#[derive(Clone, Debug)]
pub struct SpecsplitConfig {
    project_root: Utf8PathBuf,
    layout: SpecLayout,
    timings_path: Utf8PathBuf,
    static_weigher: StaticWeigher,
    hybrid_split_ratio: f64,
    granularity: Granularity,
}

impl SpecsplitConfig {
    /// The default location of the config within the project root: `.config/specsplit.toml`.
    pub const CONFIG_PATH: &'static str = ".config/specsplit.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Reads the specsplit config from the given file, or if not specified from
    /// `.config/specsplit.toml` in the project root.
    ///
    /// A config file passed in explicitly must exist; the default location is optional.
    pub fn from_sources(
        project_root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
        warnings: &mut impl ConfigWarnings,
    ) -> Result<Self, ConfigParseError> {
        let project_root = project_root.into();

        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = project_root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        let (deserialized, unknown) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;

        if !unknown.is_empty() {
            warnings.unknown_config_keys(&config_file, &project_root, &unknown);
        }

        deserialized
            .into_config(project_root)
            .map_err(|kind| ConfigParseError::new(&config_file, kind))
    }

    /// Returns the default config, rooted at `project_root`.
    pub fn default_config(project_root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            layout: SpecLayout::default(),
            timings_path: Utf8PathBuf::from(".test-timings.json"),
            static_weigher: StaticWeigher::default(),
            hybrid_split_ratio: crate::items::DEFAULT_HYBRID_SPLIT_RATIO,
            granularity: Granularity::File,
        }
    }

    /// Returns the project root.
    pub fn project_root(&self) -> &Utf8Path {
        &self.project_root
    }

    /// Returns the spec file layout.
    pub fn layout(&self) -> &SpecLayout {
        &self.layout
    }

    /// Returns the path to the timing model.
    ///
    /// Relative paths in the config are resolved against the project root.
    pub fn timings_path(&self) -> Utf8PathBuf {
        self.project_root.join(&self.timings_path)
    }

    /// Returns the static weight estimator.
    pub fn static_weigher(&self) -> &StaticWeigher {
        &self.static_weigher
    }

    /// Returns the hybrid split ratio.
    pub fn hybrid_split_ratio(&self) -> f64 {
        self.hybrid_split_ratio
    }

    /// Returns the default granularity.
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    // ---
    // Helper methods
    // ---

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// This returns a tuple of (config, ignored paths).
    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(SpecsplitConfigDeserialize, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config: SpecsplitConfigDeserialize = serde_path_to_error::deserialize(ignored_de)
            .map_err(|error| {
                // serde_path_to_error reports the key, so drop it from the config error.
                let path = error.path().clone();
                let config_error = error.into_inner();
                let error = match config_error {
                    ConfigError::At { error, .. } => *error,
                    other => other,
                };
                ConfigParseErrorKind::DeserializeError(Box::new(serde_path_to_error::Error::new(
                    path, error,
                )))
            })?;

        Ok((config, ignored))
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct SpecsplitConfigDeserialize {
    layout: LayoutDeserialize,
    timings: TimingsDeserialize,
    static_weight: StaticWeightDeserialize,
    hybrid: HybridDeserialize,
    chunk: ChunkDeserialize,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct LayoutDeserialize {
    test_root: String,
    suffix: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct TimingsDeserialize {
    path: Utf8PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct StaticWeightDeserialize {
    structural_keywords: Vec<String>,
    block_weight: f64,
    default_weight: f64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct HybridDeserialize {
    split_ratio: f64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ChunkDeserialize {
    granularity: Granularity,
}

impl SpecsplitConfigDeserialize {
    fn into_config(
        self,
        project_root: Utf8PathBuf,
    ) -> Result<SpecsplitConfig, ConfigParseErrorKind> {
        if self.layout.test_root.trim_matches('/').is_empty() {
            return Err(invalid("layout.test-root", "must not be empty"));
        }
        if self.layout.suffix.is_empty() {
            return Err(invalid("layout.suffix", "must not be empty"));
        }
        if !(self.static_weight.block_weight.is_finite() && self.static_weight.block_weight >= 0.0)
        {
            return Err(invalid(
                "static-weight.block-weight",
                "must be a non-negative number",
            ));
        }
        if !(self.static_weight.default_weight.is_finite()
            && self.static_weight.default_weight > 0.0)
        {
            return Err(invalid(
                "static-weight.default-weight",
                "must be a positive number",
            ));
        }
        if !(self.hybrid.split_ratio.is_finite() && self.hybrid.split_ratio > 0.0) {
            return Err(invalid("hybrid.split-ratio", "must be a positive number"));
        }

        Ok(SpecsplitConfig {
            project_root,
            layout: SpecLayout::new(self.layout.test_root, self.layout.suffix),
            timings_path: self.timings.path,
            static_weigher: StaticWeigher::new(
                self.static_weight.structural_keywords,
                self.static_weight.block_weight,
                self.static_weight.default_weight,
            ),
            hybrid_split_ratio: self.hybrid.split_ratio,
            granularity: self.chunk.granularity,
        })
    }
}

fn invalid(key: &'static str, message: &'static str) -> ConfigParseErrorKind {
    ConfigParseErrorKind::InvalidValue {
        key,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[derive(Default)]
    struct TestConfigWarnings {
        unknown: Vec<BTreeSet<String>>,
    }

    impl ConfigWarnings for TestConfigWarnings {
        fn unknown_config_keys(
            &mut self,
            _config_file: &Utf8Path,
            _project_root: &Utf8Path,
            unknown: &BTreeSet<String>,
        ) {
            self.unknown.push(unknown.clone());
        }
    }

    fn temp_project(config: Option<&str>) -> Utf8TempDir {
        let dir = camino_tempfile::tempdir().expect("created temp dir");
        if let Some(config) = config {
            let config_path = dir.path().join(SpecsplitConfig::CONFIG_PATH);
            std::fs::create_dir_all(config_path.parent().expect("has parent"))
                .expect("created .config");
            std::fs::write(&config_path, config).expect("wrote config");
        }
        dir
    }

    #[test]
    fn default_config_matches_embedded_file() {
        let dir = temp_project(None);
        let mut warnings = TestConfigWarnings::default();
        let config = SpecsplitConfig::from_sources(dir.path(), None, &mut warnings)
            .expect("default config is valid");

        // The embedded default config must not contain unknown keys.
        assert!(warnings.unknown.is_empty());

        let expected = SpecsplitConfig::default_config(dir.path());
        assert_eq!(config.layout(), expected.layout());
        assert_eq!(config.timings_path(), expected.timings_path());
        assert_eq!(config.static_weigher(), expected.static_weigher());
        assert_eq!(config.hybrid_split_ratio(), expected.hybrid_split_ratio());
        assert_eq!(config.granularity(), Granularity::File);
    }

    #[test]
    fn repository_config_overrides_defaults() {
        let dir = temp_project(Some(indoc! {r#"
            [layout]
            test-root = "/tests/"
            suffix = "_test.sh"

            [timings]
            path = "ci/timings.json"

            [static-weight]
            structural-keywords = ["Describe", "It", "Example"]

            [hybrid]
            split-ratio = 0.75

            [chunk]
            granularity = "hybrid"
        "#}));
        let mut warnings = TestConfigWarnings::default();
        let config = SpecsplitConfig::from_sources(dir.path(), None, &mut warnings)
            .expect("config is valid");

        assert_eq!(config.layout(), &SpecLayout::new("tests", "_test.sh"));
        assert_eq!(config.timings_path(), dir.path().join("ci/timings.json"));
        assert_eq!(
            config.static_weigher(),
            &StaticWeigher::new(
                ["Describe", "It", "Example"],
                StaticWeigher::DEFAULT_BLOCK_WEIGHT,
                StaticWeigher::DEFAULT_WEIGHT,
            )
        );
        assert_eq!(config.hybrid_split_ratio(), 0.75);
        assert_eq!(config.granularity(), Granularity::Hybrid);
        assert!(warnings.unknown.is_empty());
    }

    #[test]
    fn unknown_keys_are_reported() {
        let dir = temp_project(Some(indoc! {r#"
            [layout]
            suffix = "_spec.sh"
            extra = 1

            [unknown-section]
            foo = "bar"
        "#}));
        let mut warnings = TestConfigWarnings::default();
        SpecsplitConfig::from_sources(dir.path(), None, &mut warnings).expect("config is valid");

        assert_eq!(warnings.unknown.len(), 1);
        assert_eq!(
            warnings.unknown[0],
            BTreeSet::from(["layout.extra".to_owned(), "unknown-section".to_owned()])
        );
    }

    #[test]
    fn explicit_config_file_must_exist() {
        let dir = temp_project(None);
        let missing = dir.path().join("missing.toml");
        let error = SpecsplitConfig::from_sources(
            dir.path(),
            Some(&missing),
            &mut TestConfigWarnings::default(),
        )
        .expect_err("missing explicit config file is an error");
        assert_eq!(error.config_file(), &missing);
        assert!(matches!(error.kind(), ConfigParseErrorKind::BuildError(_)));
    }

    #[test]
    fn type_errors_carry_the_key_path() {
        let dir = temp_project(Some(indoc! {r#"
            [chunk]
            granularity = "per-test"
        "#}));
        let error =
            SpecsplitConfig::from_sources(dir.path(), None, &mut TestConfigWarnings::default())
                .expect_err("unknown granularity is an error");
        let ConfigParseErrorKind::DeserializeError(error) = error.kind() else {
            panic!("expected a deserialize error, got {:?}", error.kind());
        };
        assert_eq!(error.path().to_string(), "chunk.granularity");
    }

    #[test_case("[hybrid]\nsplit-ratio = 0.0\n", "hybrid.split-ratio" ; "zero split ratio")]
    #[test_case("[hybrid]\nsplit-ratio = -1.5\n", "hybrid.split-ratio" ; "negative split ratio")]
    #[test_case("[static-weight]\ndefault-weight = 0\n", "static-weight.default-weight" ; "zero default weight")]
    #[test_case("[static-weight]\nblock-weight = -1\n", "static-weight.block-weight" ; "negative block weight")]
    #[test_case("[layout]\nsuffix = \"\"\n", "layout.suffix" ; "empty suffix")]
    #[test_case("[layout]\ntest-root = \"/\"\n", "layout.test-root" ; "empty test root")]
    fn invalid_values(config: &str, expected_key: &str) {
        let dir = temp_project(Some(config));
        let error =
            SpecsplitConfig::from_sources(dir.path(), None, &mut TestConfigWarnings::default())
                .expect_err("invalid value is an error");
        match error.kind() {
            ConfigParseErrorKind::InvalidValue { key, .. } => assert_eq!(*key, expected_key),
            other => panic!("expected an invalid value error, got {other:?}"),
        }
    }
}
