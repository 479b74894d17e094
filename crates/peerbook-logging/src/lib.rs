//! Logging setup for peerbook
//!
//! Installs a global `tracing` subscriber with console output (pretty or
//! JSONL) and optional rotated JSONL files. `RUST_LOG` overrides the
//! configured default level.
//!
//! # Quick Start
//!
//! ```ignore
//! use peerbook_logging::{LogConfig, PeerbookSubscriberBuilder};
//!
//! // JSONL to console
//! let _guard = PeerbookSubscriberBuilder::new().init()?;
//!
//! // Human-readable output while developing
//! let _guard = PeerbookSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init()?;
//! ```
//!
//! Keep the returned guard alive for as long as file output should flush.

pub mod config;

pub use config::{ConsoleConfig, FileConfig, JsonlConfig, LogConfig, RotationStrategy};

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::fmt::TestWriter;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LogInitError {
    /// The default level is not a valid filter directive
    #[error("Invalid log filter: {0}")]
    Filter(#[from] ParseError),

    /// The log directory or file could not be created
    #[error("Failed to create log file appender: {0}")]
    Appender(#[from] InitError),

    /// Another global subscriber is already installed
    #[error("Subscriber already installed: {0}")]
    AlreadyInstalled(#[from] TryInitError),
}

/// Builder for configuring and installing the peerbook subscriber
///
/// By default console output is JSONL. Use [`LogConfig::development`] for
/// human-readable output.
#[derive(Debug, Default)]
pub struct PeerbookSubscriberBuilder {
    config: LogConfig,
    test_writer: bool,
}

impl PeerbookSubscriberBuilder {
    /// Create a builder with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// Send console output through the test harness capture
    pub fn with_test_writer(mut self, enabled: bool) -> Self {
        self.test_writer = enabled;
        self
    }

    fn filter(&self) -> Result<EnvFilter, LogInitError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => Ok(EnvFilter::try_new(&self.config.default_level)?),
        }
    }

    fn console_layer(&self) -> Option<BoxedLayer> {
        let console = &self.config.console;
        if !console.enabled {
            return None;
        }

        let jsonl = &self.config.jsonl;
        let layer = match (console.pretty, self.test_writer) {
            (true, true) => tracing_subscriber::fmt::layer()
                .with_ansi(console.ansi)
                .with_target(true)
                .with_writer(TestWriter::new())
                .boxed(),
            (true, false) => tracing_subscriber::fmt::layer()
                .with_ansi(console.ansi)
                .with_target(true)
                .boxed(),
            (false, true) => tracing_subscriber::fmt::layer()
                .json()
                .with_span_list(jsonl.include_spans)
                .flatten_event(jsonl.flatten_events)
                .with_file(jsonl.include_location)
                .with_line_number(jsonl.include_location)
                .with_writer(TestWriter::new())
                .boxed(),
            (false, false) => tracing_subscriber::fmt::layer()
                .json()
                .with_span_list(jsonl.include_spans)
                .flatten_event(jsonl.flatten_events)
                .with_file(jsonl.include_location)
                .with_line_number(jsonl.include_location)
                .boxed(),
        };
        Some(layer)
    }

    fn file_layer(&self) -> Result<Option<(BoxedLayer, WorkerGuard)>, LogInitError> {
        let Some(file) = &self.config.file else {
            return Ok(None);
        };

        let rotation = match file.rotation {
            RotationStrategy::Daily => Rotation::DAILY,
            RotationStrategy::Hourly => Rotation::HOURLY,
            RotationStrategy::Never => Rotation::NEVER,
        };

        let mut appender = RollingFileAppender::builder()
            .rotation(rotation)
            .filename_prefix(&file.prefix)
            .filename_suffix("log");
        if let Some(max_files) = file.max_files {
            appender = appender.max_log_files(max_files);
        }
        let appender = appender.build(&file.directory)?;
        let (writer, guard) = tracing_appender::non_blocking(appender);

        let jsonl = &self.config.jsonl;
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_span_list(jsonl.include_spans)
            .flatten_event(jsonl.flatten_events)
            .with_file(jsonl.include_location)
            .with_line_number(jsonl.include_location)
            .with_writer(writer)
            .boxed();

        Ok(Some((layer, guard)))
    }

    /// Install the subscriber globally
    ///
    /// Returns the file writer guard when file output is configured; drop it
    /// only when logging is finished.
    pub fn init(self) -> Result<Option<WorkerGuard>, LogInitError> {
        let filter = self.filter()?;

        let mut layers: Vec<BoxedLayer> = Vec::new();
        layers.extend(self.console_layer());

        let guard = match self.file_layer()? {
            Some((layer, guard)) => {
                layers.push(layer);
                Some(guard)
            }
            None => None,
        };

        tracing_subscriber::registry()
            .with(layers)
            .with(filter)
            .try_init()?;

        Ok(guard)
    }
}

/// Install the default subscriber (JSONL to console)
pub fn init_default() -> Result<(), LogInitError> {
    PeerbookSubscriberBuilder::new().init().map(|_| ())
}

/// Install a verbose, human-readable subscriber
pub fn init_development() -> Result<(), LogInitError> {
    PeerbookSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init()
        .map(|_| ())
}

/// Install a quiet subscriber captured by the test harness
///
/// Safe to call from every test; only the first call installs anything.
pub fn try_init_for_tests() {
    let _ = PeerbookSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .with_test_writer(true)
        .init();
}
