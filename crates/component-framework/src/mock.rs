//! # Mock Components & Testing Guide
//!
//! [`MockComponent`] implements every [`Component`] hook by appending an entry to
//! a shared [`HookLog`]. Share one log between all mocks of a test and you get a
//! single, totally ordered record of what the orchestrator did, which makes
//! ordering guarantees ("C stopped before B") and exactly-once guarantees
//! ("`on_loading_cancelled` fired once") easy to assert.
//!
//! ## When to use mocks vs real components
//!
//! | Feature | MockComponent | Real component |
//! |---------|---------------|----------------|
//! | **Speed** | Instant | Depends on the component |
//! | **Observability** | Every hook recorded | Whatever it logs |
//! | **Error injection** | `fail_on(hook)` | Hard |
//! | **Use case** | Testing the orchestrator | Testing the component |
//!
//! ## Example
//!
//! ```rust
//! use component_framework::mock::{Hook, HookLog, MockComponent};
//! use component_framework::{BoxError, ComponentList, ComponentManager, ManagerSettings};
//!
//! #[tokio::main]
//! async fn main() {
//!     let log = HookLog::default();
//!     let a_log = log.clone();
//!     let b_log = log.clone();
//!
//!     let list = ComponentList::new()
//!         .append("a", move |_ctx| async move { Ok(MockComponent::new("a", a_log)) })
//!         .append("b", move |ctx| async move {
//!             ctx.find_component::<MockComponent>("a").await?;
//!             Ok::<_, BoxError>(MockComponent::new("b", b_log).fail_on(Hook::AllComponentsAreStopping))
//!         });
//!
//!     let mut manager = ComponentManager::new(list, ManagerSettings::default()).unwrap();
//!     manager.start().await.unwrap();
//!     manager.stop().await;
//!
//!     // Dependents stop first, and a failing stopping hook does not get in the way.
//!     assert_eq!(log.order_of(Hook::Stop), ["b", "a"]);
//! }
//! ```

use crate::component::{Component, NamedComponent};
use crate::error::BoxError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// The hooks a [`MockComponent`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    AllComponentsLoaded,
    AllComponentsAreStopping,
    LoadingCancelled,
    Stop,
}

/// Error returned by a hook that was told to fail.
#[derive(Debug, thiserror::Error)]
#[error("mock component '{component}' failed in {hook:?}")]
pub struct MockFailure {
    pub component: String,
    pub hook: Hook,
}

/// Shared, ordered record of hook calls.
#[derive(Debug, Clone, Default)]
pub struct HookLog {
    events: Arc<Mutex<Vec<(String, Hook)>>>,
}

impl HookLog {
    pub fn record(&self, component: &str, hook: Hook) {
        self.events.lock().push((component.to_string(), hook));
    }

    pub fn events(&self) -> Vec<(String, Hook)> {
        self.events.lock().clone()
    }

    pub fn count(&self, component: &str, hook: Hook) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|(name, h)| name == component && *h == hook)
            .count()
    }

    /// Components that ran `hook`, in call order.
    pub fn order_of(&self, hook: Hook) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|(_, h)| *h == hook)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// A component that only records its hooks.
#[derive(Debug)]
pub struct MockComponent {
    name: String,
    log: HookLog,
    failing: HashSet<Hook>,
}

impl MockComponent {
    pub fn new(name: impl Into<String>, log: HookLog) -> Self {
        Self {
            name: name.into(),
            log,
            failing: HashSet::new(),
        }
    }

    /// Makes `hook` return an error after recording the call.
    /// `Hook::LoadingCancelled` cannot fail and is ignored here.
    pub fn fail_on(mut self, hook: Hook) -> Self {
        self.failing.insert(hook);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, hook: Hook) -> Result<(), BoxError> {
        self.log.record(&self.name, hook);
        if self.failing.contains(&hook) {
            return Err(Box::new(MockFailure {
                component: self.name.clone(),
                hook,
            }));
        }
        Ok(())
    }
}

#[async_trait]
impl Component for MockComponent {
    async fn on_all_components_loaded(&self) -> Result<(), BoxError> {
        self.call(Hook::AllComponentsLoaded)
    }

    async fn on_all_components_are_stopping(&self) -> Result<(), BoxError> {
        self.call(Hook::AllComponentsAreStopping)
    }

    fn on_loading_cancelled(&self) {
        self.log.record(&self.name, Hook::LoadingCancelled);
    }

    async fn stop(&self) -> Result<(), BoxError> {
        self.call(Hook::Stop)
    }
}

/// A named mock, for exercising typed lookups.
#[derive(Debug)]
pub struct NamedMock(pub MockComponent);

#[async_trait]
impl Component for NamedMock {
    async fn on_all_components_loaded(&self) -> Result<(), BoxError> {
        self.0.on_all_components_loaded().await
    }

    async fn on_all_components_are_stopping(&self) -> Result<(), BoxError> {
        self.0.on_all_components_are_stopping().await
    }

    fn on_loading_cancelled(&self) {
        self.0.on_loading_cancelled();
    }

    async fn stop(&self) -> Result<(), BoxError> {
        self.0.stop().await
    }
}

impl NamedComponent for NamedMock {
    const NAME: &'static str = "named-mock";
}
