//! # Component Sample Library
//!
//! A small service built on [`component_framework`]: three components that
//! depend on each other, a TOML configuration and the function that turns the
//! one into a [`ComponentList`](component_framework::ComponentList).
//!
//! ```text
//! grpc-client-factory ──> statistics-storage ──> logging (optional)
//!          └───────────────────────────────────> logging (optional)
//! ```

pub mod config;
pub mod grpc;
pub mod logging;
pub mod service;
pub mod statistics;

pub use config::{ConfigError, ServiceConfig};
pub use grpc::{ClientFactorySettings, GrpcClient, GrpcClientFactory};
pub use logging::{Logger, Logging};
pub use statistics::{Counter, Gauge, MetricsStorage, StatisticsStorage};
