//! # Observability & Tracing
//!
//! The framework logs through the `tracing` crate and never installs a
//! subscriber itself: without one (as in unit tests) every span and event is a
//! no-op. Binaries call [`setup_tracing`] once at startup.
//!
//! ## What Gets Traced
//!
//! - **Construction**: each factory runs inside a `component_load` span.
//! - **Stage switches**: `info` when all components reach a stage.
//! - **Stopping**: each `on_all_components_are_stopping` hook runs inside an
//!   `on_all_components_are_stopping` span; each teardown inside
//!   `component_stop`. Both carry a `component_name` field.
//! - **Failures**: hook failures at `error` with `component_name` and `error`.
//! - **Dependency graph**: at `debug` after a successful load, at `error` when
//!   loading fails, so a stuck or cyclic startup can be diagnosed from logs.
//!
//! ## Usage Examples
//!
//! ```bash
//! # Compact logs (default)
//! RUST_LOG=info cargo run
//!
//! # Teardown and dependency waits
//! RUST_LOG=component_framework=debug cargo run
//! ```
//!
//! **With `RUST_LOG=debug`**:
//!
//! ```text
//! INFO  Loading components count=3
//! DEBUG component_load: Waiting for dependency component_name="grpc-client-factory" dependency="statistics-storage"
//! DEBUG Components loaded graph="grpc-client-factory" -> "statistics-storage" ...
//! INFO  Stage reached stage=running
//! DEBUG component_stop: Stopping component component_name="grpc-client-factory"
//! DEBUG component_stop: Stopped component component_name="grpc-client-factory"
//! ```

/// Installs a compact formatter filtered by `RUST_LOG`.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false) // component_name identifies the source
        .compact()
        .init();
}
