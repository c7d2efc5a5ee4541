// Copyright (c) The specsplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Logging and terminal output.
//!
//! Everything except the chunk listing goes to stderr through `tracing`, so stdout can be
//! handed straight to the test runner.

use clap::{Args, ValueEnum};
use owo_colors::{OwoColorize, Style, style};
use std::{
    fmt,
    io::{self, BufWriter, Write},
};
use tracing::{
    Event, Level, Subscriber,
    field::{Field, Visit},
    level_filters::LevelFilter,
};
use tracing_subscriber::{
    Layer,
    filter::Targets,
    fmt::{FmtContext, FormatEvent, FormatFields, format},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

/// Log events with this target are printed without an `error:`/`warning:` heading.
pub(crate) const NO_HEADING_TARGET: &str = "specsplit::no_heading";

/// The environment variable holding a per-target log filter, e.g. `specsplit_runner=debug`.
const LOG_ENV: &str = "SPECSPLIT_LOG";

pub(crate) mod clap_styles {
    use clap::builder::{
        Styles,
        styling::{AnsiColor, Effects, Style},
    };

    const HEADER: Style = AnsiColor::Green.on_default().effects(Effects::BOLD);
    const USAGE: Style = AnsiColor::Green.on_default().effects(Effects::BOLD);
    const LITERAL: Style = AnsiColor::Cyan.on_default().effects(Effects::BOLD);
    const PLACEHOLDER: Style = AnsiColor::Cyan.on_default();
    const ERROR: Style = AnsiColor::Red.on_default().effects(Effects::BOLD);
    const VALID: Style = AnsiColor::Cyan.on_default().effects(Effects::BOLD);
    const INVALID: Style = AnsiColor::Yellow.on_default().effects(Effects::BOLD);

    pub(crate) const fn style() -> Styles {
        Styles::styled()
            .header(HEADER)
            .usage(USAGE)
            .literal(LITERAL)
            .placeholder(PLACEHOLDER)
            .error(ERROR)
            .valid(VALID)
            .invalid(INVALID)
    }
}

#[derive(Copy, Clone, Debug, Args)]
#[must_use]
pub(crate) struct OutputOpts {
    /// Verbose output
    #[arg(long, short, global = true, env = "SPECSPLIT_VERBOSE")]
    pub(crate) verbose: bool,

    /// Produce color output: auto, always, never
    #[arg(
        long,
        value_enum,
        default_value_t,
        hide_possible_values = true,
        global = true,
        value_name = "WHEN",
        env = "SPECSPLIT_COLOR"
    )]
    pub(crate) color: Color,
}

impl OutputOpts {
    pub(crate) fn init(self) -> OutputContext {
        let OutputOpts { verbose, color } = self;

        color.init(verbose);

        OutputContext { verbose, color }
    }
}

/// Output settings for a single invocation.
#[derive(Copy, Clone, Debug)]
#[must_use]
pub struct OutputContext {
    pub(crate) verbose: bool,
    pub(crate) color: Color,
}

impl OutputContext {
    /// Returns general stderr styles for the current output context.
    pub fn stderr_styles(&self) -> StderrStyles {
        let mut styles = StderrStyles::default();

        if self.color.should_colorize(supports_color::Stream::Stderr) {
            styles.colorize();
        }

        styles
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
#[must_use]
pub(crate) enum Color {
    #[default]
    Auto,
    Always,
    Never,
}

impl Color {
    pub(crate) fn init(self, verbose: bool) {
        let headings = if self.should_colorize(supports_color::Stream::Stderr) {
            HeadingStyles::colorized()
        } else {
            HeadingStyles::default()
        };

        INIT_LOGGER.call_once(|| {
            let env_filter = std::env::var(LOG_ENV).ok();
            let targets = log_filter(env_filter.as_deref(), verbose);

            let layer = tracing_subscriber::fmt::layer()
                .event_format(DiagnosticFormatter { headings })
                .with_writer(io::stderr)
                .with_filter(targets);

            tracing_subscriber::registry().with(layer).init();
        });
    }

    pub(crate) fn should_colorize(self, stream: supports_color::Stream) -> bool {
        match self {
            Color::Auto => supports_color::on_cached(stream).is_some(),
            Color::Always => true,
            Color::Never => false,
        }
    }
}

static INIT_LOGGER: std::sync::Once = std::sync::Once::new();

/// Builds the log filter from the value of `SPECSPLIT_LOG`, if set.
///
/// Without a filter, `--verbose` lowers the level from info to debug. An unparseable filter is
/// reported and ignored.
fn log_filter(env_filter: Option<&str>, verbose: bool) -> Targets {
    let default_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    match env_filter.filter(|filter| !filter.is_empty()) {
        None => Targets::new().with_default(default_level),
        Some(filter) => filter.parse().unwrap_or_else(|error| {
            eprintln!("ignoring invalid {LOG_ENV} value `{filter}`: {error}");
            Targets::new().with_default(default_level)
        }),
    }
}

/// Formats diagnostics for CI logs.
///
/// Errors and warnings get a heading. Everything else (chunk summaries, which files were weighted
/// statically) is printed bare.
struct DiagnosticFormatter {
    headings: HeadingStyles,
}

impl<S, N> FormatEvent<S, N> for DiagnosticFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        if metadata.target() != NO_HEADING_TARGET {
            if let Some((heading, style)) = self.headings.for_level(*metadata.level()) {
                write!(writer, "{}: ", heading.style(style))?;
            }
        }

        let mut visitor = MessageVisitor {
            writer: &mut writer,
            result: Ok(()),
        };
        event.record(&mut visitor);
        visitor.result?;

        writeln!(writer)
    }
}

struct MessageVisitor<'writer, 'a> {
    writer: &'a mut format::Writer<'writer>,
    result: fmt::Result,
}

impl Visit for MessageVisitor<'_, '_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" && self.result.is_ok() {
            self.result = write!(self.writer, "{value:?}");
        }
    }
}

#[derive(Debug, Default)]
struct HeadingStyles {
    error: Style,
    warning: Style,
}

impl HeadingStyles {
    fn colorized() -> Self {
        Self {
            error: style().red().bold(),
            warning: style().yellow().bold(),
        }
    }

    fn for_level(&self, level: Level) -> Option<(&'static str, Style)> {
        match level {
            Level::ERROR => Some(("error", self.error)),
            Level::WARN => Some(("warning", self.warning)),
            _ => None,
        }
    }
}

/// Styles for messages written to stderr.
#[derive(Debug, Default)]
pub struct StderrStyles {
    pub(crate) bold: Style,
}

impl StderrStyles {
    fn colorize(&mut self) {
        self.bold = style().bold();
    }
}

/// Where chunk listings are written.
///
/// Tests capture stdout in memory instead.
#[derive(Default)]
pub enum OutputWriter {
    /// Write to the process's stdout.
    #[default]
    Normal,
    /// Capture output.
    #[cfg(test)]
    Test {
        /// Captured stdout.
        stdout: Vec<u8>,
    },
}

impl OutputWriter {
    pub(crate) fn stdout_writer(&mut self) -> Box<dyn Write + '_> {
        match self {
            Self::Normal => Box::new(BufWriter::new(io::stdout().lock())),
            #[cfg(test)]
            Self::Test { stdout } => Box::new(stdout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(None, false, Level::INFO, Level::DEBUG ; "default")]
    #[test_case(None, true, Level::DEBUG, Level::TRACE ; "verbose")]
    #[test_case(Some(""), true, Level::DEBUG, Level::TRACE ; "empty filter is ignored")]
    #[test_case(Some("debug"), false, Level::DEBUG, Level::TRACE ; "explicit level")]
    #[test_case(Some("specsplit=loud"), false, Level::INFO, Level::DEBUG ; "invalid filter falls back")]
    fn log_filter_levels(env_filter: Option<&str>, verbose: bool, enabled: Level, disabled: Level) {
        let targets = log_filter(env_filter, verbose);
        assert!(targets.would_enable("specsplit_runner::items", &enabled));
        assert!(!targets.would_enable("specsplit_runner::items", &disabled));
    }

    #[test]
    fn headings_only_for_problems() {
        let headings = HeadingStyles::default();
        assert_eq!(headings.for_level(Level::ERROR).map(|(h, _)| h), Some("error"));
        assert_eq!(headings.for_level(Level::WARN).map(|(h, _)| h), Some("warning"));
        assert_eq!(headings.for_level(Level::INFO).map(|(h, _)| h), None);
    }
}
