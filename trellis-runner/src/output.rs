// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Terminal output: color detection and logging setup.

use clap::ValueEnum;
use owo_colors::{OwoColorize, Style};
use std::fmt;
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

/// The environment variable read for the log level filter, in `tracing` targets syntax.
pub const LOG_ENV: &str = "TRELLIS_LOG";

/// Log events with this target are printed without a level heading.
pub const NO_HEADING_TARGET: &str = "trellis::no_heading";

/// When to produce colored output.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
#[must_use]
pub enum Color {
    /// Color if the stream supports it.
    #[default]
    Auto,

    /// Always color.
    Always,

    /// Never color.
    Never,
}

impl Color {
    /// Returns true if output to `stream` should be colored.
    pub fn should_colorize(self, stream: supports_color::Stream) -> bool {
        match self {
            Color::Auto => supports_color::on_cached(stream).is_some(),
            Color::Always => true,
            Color::Never => false,
        }
    }

    /// The command-line form of this setting, for passing on to a child process.
    pub fn to_arg(self) -> &'static str {
        match self {
            Color::Auto => "--color=auto",
            Color::Always => "--color=always",
            Color::Never => "--color=never",
        }
    }
}

/// The output settings for a process.
#[derive(Copy, Clone, Debug)]
#[must_use]
pub struct OutputContext {
    /// The color setting.
    pub color: Color,
}

impl OutputContext {
    /// Initializes logging and returns the context.
    pub fn init(color: Color) -> Self {
        init_logging(color);
        Self { color }
    }

    /// Returns styles for writing to stderr.
    pub fn stderr_styles(&self) -> StderrStyles {
        let mut styles = StderrStyles::default();
        if self.color.should_colorize(supports_color::Stream::Stderr) {
            styles.colorize();
        }
        styles
    }

    /// Returns true if stdout should be colored.
    pub fn colorize_stdout(&self) -> bool {
        self.color.should_colorize(supports_color::Stream::Stdout)
    }
}

/// Styles for messages written directly to stderr.
#[derive(Clone, Debug, Default)]
pub struct StderrStyles {
    /// Style for fatal errors.
    pub fatal: Style,

    /// Style for the bold parts of messages.
    pub bold: Style,
}

impl StderrStyles {
    fn colorize(&mut self) {
        self.fatal = Style::new().red().bold();
        self.bold = Style::new().bold();
    }
}

static INIT_LOGGER: std::sync::Once = std::sync::Once::new();

/// Initializes the global `tracing` subscriber. Only the first call has any effect.
///
/// The level filter is read from [`LOG_ENV`], defaulting to `info`.
pub fn init_logging(color: Color) {
    let mut log_styles = LogStyles::default();
    if color.should_colorize(supports_color::Stream::Stderr) {
        log_styles.colorize();
    }

    INIT_LOGGER.call_once(|| {
        let level_str = std::env::var_os(LOG_ENV).unwrap_or_default();
        let level_str = level_str
            .into_string()
            .unwrap_or_else(|_| panic!("{LOG_ENV} is not UTF-8"));

        // If the level string is empty, use the standard level filter instead.
        let targets = if level_str.is_empty() {
            Targets::new().with_default(LevelFilter::INFO)
        } else {
            level_str
                .parse()
                .unwrap_or_else(|err| panic!("unable to parse {LOG_ENV}: {err}"))
        };

        let layer = tracing_subscriber::fmt::layer()
            .event_format(SimpleFormatter { styles: log_styles })
            .with_writer(std::io::stderr)
            .with_filter(targets);

        // Another subscriber may already be installed, for example by a test harness.
        let _ = tracing_subscriber::registry().with(layer).try_init();
    });
}

#[derive(Debug, Default)]
struct LogStyles {
    error: Style,
    warning: Style,
    info: Style,
    debug: Style,
    trace: Style,
}

impl LogStyles {
    fn colorize(&mut self) {
        self.error = Style::new().red().bold();
        self.warning = Style::new().yellow().bold();
        self.info = Style::new().bold();
        self.debug = Style::new().bold();
        self.trace = Style::new().dimmed();
    }
}

struct SimpleFormatter {
    styles: LogStyles,
}

impl<S, N> FormatEvent<S, N> for SimpleFormatter
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
            let (heading, style) = match *metadata.level() {
                Level::ERROR => ("error", self.styles.error),
                Level::WARN => ("warning", self.styles.warning),
                Level::INFO => ("info", self.styles.info),
                Level::DEBUG => ("debug", self.styles.debug),
                Level::TRACE => ("trace", self.styles.trace),
            };
            write!(writer, "{}: ", heading.style(style))?;
        }

        let mut visitor = FieldVisitor {
            writer: &mut writer,
            error: None,
        };
        event.record(&mut visitor);
        if let Some(error) = visitor.error {
            return Err(error);
        }

        writeln!(writer)
    }
}

static MESSAGE_FIELD: &str = "message";

/// Writes the message, followed by any structured fields as `key=value`.
struct FieldVisitor<'writer, 'a> {
    writer: &'a mut format::Writer<'writer>,
    error: Option<fmt::Error>,
}

impl Visit for FieldVisitor<'_, '_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let res = if field.name() == MESSAGE_FIELD {
            write!(self.writer, "{value:?}")
        } else {
            write!(self.writer, " {}={value:?}", field.name())
        };
        if let Err(error) = res {
            self.error = Some(error);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        let res = if field.name() == MESSAGE_FIELD {
            write!(self.writer, "{value}")
        } else {
            write!(self.writer, " {}={value}", field.name())
        };
        if let Err(error) = res {
            self.error = Some(error);
        }
    }
}
