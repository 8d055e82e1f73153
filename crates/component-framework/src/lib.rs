//! # Component Framework
//!
//! This crate starts and stops the long-lived components of a service (loggers,
//! metric storages, client factories, caches, ...) in dependency order, without
//! anyone writing that order down.
//!
//! ## How It Works
//!
//! A service is described by a [`ComponentList`]: names paired with async
//! factories. [`ComponentManager::start`] runs all factories **concurrently**.
//! A factory that needs another component asks its [`ComponentContext`] for it
//! and suspends until that component exists. The lookup also records a
//! dependency edge, so by the end of loading the manager knows the full graph
//! and uses it for everything that follows:
//!
//! ```text
//!             ┌──────────────┐
//!  start() ──>│ construction │ factories run concurrently, lookups suspend
//!             └──────┬───────┘
//!                    v
//!             ┌──────────────┐
//!             │   Running    │ on_all_components_loaded, dependencies first
//!             └──────┬───────┘
//!  stop() ───────────v
//!             ┌──────────────┐
//!             │ StoppingAll  │ on_all_components_are_stopping, dependents first
//!             └──────┬───────┘
//!                    v
//!             ┌──────────────┐
//!             │   Stopped    │ stop + drop, dependents first
//!             └──────────────┘
//! ```
//!
//! ## Failure Handling
//!
//! - A failing factory, a cyclic lookup, a lookup of an unknown component, a
//!   load timeout or an external cancellation **cancels loading everywhere**:
//!   pending lookups fail, components already built get
//!   [`Component::on_loading_cancelled`] exactly once, and `start` returns the
//!   root cause rather than one of the follow-up cancellations.
//! - A failing `on_all_components_loaded` fails `start` and names the component.
//! - Shutdown never fails. Errors from stopping hooks are logged and the
//!   remaining components are still stopped.
//!
//! ## Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use component_framework::{
//!     BoxError, Component, ComponentList, ComponentManager, ManagerSettings, NamedComponent,
//! };
//! use std::sync::Arc;
//!
//! struct Config {
//!     greeting: String,
//! }
//! impl Component for Config {}
//! impl NamedComponent for Config {
//!     const NAME: &'static str = "config";
//! }
//!
//! struct Greeter {
//!     config: Arc<Config>,
//! }
//!
//! #[async_trait]
//! impl Component for Greeter {
//!     async fn on_all_components_loaded(&self) -> Result<(), BoxError> {
//!         println!("{}", self.config.greeting);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let list = ComponentList::new()
//!         // Declared first, constructed after "config" all the same.
//!         .append("greeter", |ctx| async move {
//!             let config = ctx.find::<Config>().await?;
//!             Ok::<_, BoxError>(Greeter { config })
//!         })
//!         .append_named(|_ctx| async move {
//!             Ok(Config { greeting: "hello".into() })
//!         });
//!
//!     let mut manager = ComponentManager::new(list, ManagerSettings::default()).unwrap();
//!     manager.start().await.unwrap();
//!     assert_eq!(manager.dependency_graph(), "\"greeter\" -> \"config\" \n");
//!     manager.stop().await;
//! }
//! ```
//!
//! ## Testing
//!
//! The [`mock`] module provides a [`mock::MockComponent`] that records every hook
//! call in a shared [`mock::HookLog`], for asserting ordering and exactly-once
//! guarantees without real components.

pub mod component;
pub mod context;
pub mod dependencies;
pub mod error;
pub mod list;
pub mod manager;
pub mod mock;
pub mod registry;
pub mod settings;
pub mod slot;
pub mod stage;
pub mod tracing;

pub use component::{Component, ComponentHandle, NamedComponent};
pub use context::ComponentContext;
pub use dependencies::DependencyEdges;
pub use error::{BoxError, ComponentError};
pub use list::{ComponentFactory, ComponentFuture, ComponentList};
pub use manager::ComponentManager;
pub use registry::ComponentRegistry;
pub use settings::ManagerSettings;
pub use slot::ComponentSlot;
pub use stage::{ComponentLifetimeStage, StageState, Staged};
