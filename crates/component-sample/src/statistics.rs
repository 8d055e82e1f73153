//! # Statistics Storage
//!
//! Components register their metrics under unique dotted paths while the
//! service is being constructed. Registration closes once every component is
//! loaded; from then on the set of paths is fixed and
//! [`MetricsStorage::dump_metrics`] renders all of them as one JSON object:
//!
//! ```json
//! { "grpc.client-factory.clients-created": 3, "http.connections": 12 }
//! ```

use crate::logging::{Logger, Logging};
use async_trait::async_trait;
use component_framework::{BoxError, Component, ComponentContext, NamedComponent};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// A thread-safe value that can be rendered to JSON.
pub trait Metric: Send + Sync + 'static {
    fn dump(&self) -> Value;
}

/// Monotonically growing count.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn inc(&self) {
        self.add(1);
    }

    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Metric for Counter {
    fn dump(&self) -> Value {
        Value::from(self.get())
    }
}

/// Last value set.
#[derive(Debug, Default)]
pub struct Gauge(AtomicI64);

impl Gauge {
    pub fn set(&self, value: i64) {
        self.0.store(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Metric for Gauge {
    fn dump(&self) -> Value {
        Value::from(self.get())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("two metrics with the same path are registered: {0}")]
    DuplicatePath(String),

    #[error("metric '{0}' registered after registration was closed")]
    RegistrationFinished(String),
}

#[derive(Default)]
pub struct MetricsStorage {
    metrics: RwLock<BTreeMap<String, Arc<dyn Metric>>>,
    registration_finished: AtomicBool,
}

impl MetricsStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `metric` under `path` and returns the shared handle to update it.
    pub fn register<M: Metric>(
        &self,
        path: impl Into<String>,
        metric: M,
    ) -> Result<Arc<M>, MetricsError> {
        let path = path.into();
        let mut metrics = self.metrics.write();
        if self.is_registration_finished() {
            return Err(MetricsError::RegistrationFinished(path));
        }
        if metrics.contains_key(&path) {
            return Err(MetricsError::DuplicatePath(path));
        }
        let metric = Arc::new(metric);
        metrics.insert(path, metric.clone());
        Ok(metric)
    }

    /// Once this returns no further metric gets in. The flag flips under the
    /// write lock, so a `register` already holding it finishes first.
    pub fn finish_registration(&self) {
        let _metrics = self.metrics.write();
        self.registration_finished.store(true, Ordering::Release);
    }

    pub fn is_registration_finished(&self) -> bool {
        self.registration_finished.load(Ordering::Acquire)
    }

    pub fn paths(&self) -> Vec<String> {
        self.metrics.read().keys().cloned().collect()
    }

    /// Renders every metric keyed by its path. Closes registration.
    pub fn dump_metrics(&self) -> Value {
        self.finish_registration();
        let metrics = self.metrics.read();
        let mut dump = Map::with_capacity(metrics.len());
        for (path, metric) in metrics.iter() {
            debug!(path = %path, "Dumping metric");
            dump.insert(path.clone(), metric.dump());
        }
        Value::Object(dump)
    }
}

impl std::fmt::Debug for MetricsStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsStorage")
            .field("paths", &self.paths())
            .field("registration_finished", &self.is_registration_finished())
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatisticsConfig {
    /// Log every metric through the default logger on shutdown.
    pub log_on_stop: bool,
}

#[derive(Debug)]
pub struct StatisticsStorage {
    metrics: MetricsStorage,
    config: StatisticsConfig,
    logger: Option<Arc<Logger>>,
}

impl StatisticsStorage {
    pub fn new(config: StatisticsConfig, logger: Option<Arc<Logger>>) -> Self {
        Self {
            metrics: MetricsStorage::new(),
            config,
            logger,
        }
    }

    /// Factory for a [`ComponentList`](component_framework::ComponentList).
    /// Uses the `logging` component when the service has one.
    pub async fn create(ctx: ComponentContext, config: StatisticsConfig) -> Result<Self, BoxError> {
        let logger = ctx
            .find_component_optional::<Logging>(Logging::NAME)
            .await?
            .map(|logging| logging.default_logger());
        Ok(Self::new(config, logger))
    }

    pub fn metrics(&self) -> &MetricsStorage {
        &self.metrics
    }

    fn log(&self, level: tracing::Level, message: &str) {
        if let Some(logger) = &self.logger {
            logger.log(level, message);
        }
    }
}

#[async_trait]
impl Component for StatisticsStorage {
    async fn on_all_components_loaded(&self) -> Result<(), BoxError> {
        self.metrics.finish_registration();
        self.log(
            tracing::Level::INFO,
            &format!("{} metrics registered", self.metrics.paths().len()),
        );
        Ok(())
    }

    async fn stop(&self) -> Result<(), BoxError> {
        if self.config.log_on_stop {
            let dump = self.metrics.dump_metrics();
            self.log(tracing::Level::INFO, &dump.to_string());
        }
        Ok(())
    }
}

impl NamedComponent for StatisticsStorage {
    const NAME: &'static str = "statistics-storage";
}
