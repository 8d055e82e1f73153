//! # Logging Component
//!
//! Owns the named loggers of the service. Every logger writes through `tracing`
//! with its own name and level threshold, so one subscriber serves them all.
//!
//! ```toml
//! [logging]
//! level = "info"
//!
//! [logging.loggers.access]
//! level = "warning"
//! ```

use async_trait::async_trait;
use component_framework::{BoxError, Component, NamedComponent};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};
use tracing_subscriber::filter::LevelFilter;

pub const DEFAULT_LOGGER: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    None,
}

impl From<Level> for LevelFilter {
    fn from(level: Level) -> Self {
        match level {
            Level::Trace => LevelFilter::TRACE,
            Level::Debug => LevelFilter::DEBUG,
            Level::Info => LevelFilter::INFO,
            Level::Warning => LevelFilter::WARN,
            Level::Error => LevelFilter::ERROR,
            Level::None => LevelFilter::OFF,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggerConfig {
    pub level: Level,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Level of the default logger.
    pub level: Level,
    pub loggers: BTreeMap<String, LoggerConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("logger '{0}' is not registered")]
    UnknownLogger(String),
}

/// A named sink with its own level threshold.
#[derive(Debug)]
pub struct Logger {
    name: String,
    level: LevelFilter,
    written: AtomicU64,
}

impl Logger {
    pub fn new(name: impl Into<String>, level: impl Into<LevelFilter>) -> Self {
        Self {
            name: name.into(),
            level: level.into(),
            written: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }

    pub fn should_log(&self, level: tracing::Level) -> bool {
        level <= self.level
    }

    /// Number of messages that passed the threshold.
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn log(&self, level: tracing::Level, message: &str) {
        if !self.should_log(level) {
            return;
        }
        self.written.fetch_add(1, Ordering::Relaxed);
        let logger = &self.name;
        // Event levels must be constants.
        if level == tracing::Level::ERROR {
            error!(logger = %logger, "{message}");
        } else if level == tracing::Level::WARN {
            warn!(logger = %logger, "{message}");
        } else if level == tracing::Level::INFO {
            info!(logger = %logger, "{message}");
        } else if level == tracing::Level::DEBUG {
            debug!(logger = %logger, "{message}");
        } else {
            trace!(logger = %logger, "{message}");
        }
    }
}

#[derive(Debug)]
pub struct Logging {
    loggers: RwLock<HashMap<String, Arc<Logger>>>,
    flushes: AtomicU64,
}

impl Logging {
    pub fn new(config: &LoggingConfig) -> Self {
        let mut loggers = HashMap::new();
        loggers.insert(
            DEFAULT_LOGGER.to_string(),
            Arc::new(Logger::new(DEFAULT_LOGGER, config.level)),
        );
        for (name, logger) in &config.loggers {
            loggers.insert(name.clone(), Arc::new(Logger::new(name.clone(), logger.level)));
        }
        Self {
            loggers: RwLock::new(loggers),
            flushes: AtomicU64::new(0),
        }
    }

    pub fn logger(&self, name: &str) -> Result<Arc<Logger>, LoggingError> {
        self.logger_optional(name)
            .ok_or_else(|| LoggingError::UnknownLogger(name.to_string()))
    }

    pub fn logger_optional(&self, name: &str) -> Option<Arc<Logger>> {
        self.loggers.read().get(name).cloned()
    }

    pub fn default_logger(&self) -> Arc<Logger> {
        self.logger_optional(DEFAULT_LOGGER)
            .unwrap_or_else(|| Arc::new(Logger::new(DEFAULT_LOGGER, Level::default())))
    }

    /// Registers or replaces a logger.
    pub fn set_logger(&self, name: impl Into<String>, logger: Arc<Logger>) {
        self.loggers.write().insert(name.into(), logger);
    }

    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    fn flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        debug!(loggers = self.loggers.read().len(), "Flushed loggers");
    }
}

#[async_trait]
impl Component for Logging {
    async fn on_all_components_are_stopping(&self) -> Result<(), BoxError> {
        self.flush();
        Ok(())
    }

    async fn stop(&self) -> Result<(), BoxError> {
        self.flush();
        Ok(())
    }
}

impl NamedComponent for Logging {
    const NAME: &'static str = "logging";
}
