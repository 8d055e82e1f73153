//! # Component Context
//!
//! What a component factory sees of the rest of the service. Every lookup
//! records a dependency edge in both slots, checks that the edge does not close
//! a cycle, and then suspends until the dependency is constructed.
//!
//! ```rust,ignore
//! async fn make_client_factory(ctx: ComponentContext) -> Result<ClientFactory, BoxError> {
//!     // Suspends until "statistics-storage" is constructed.
//!     let statistics = ctx.find::<StatisticsStorage>().await?;
//!     Ok(ClientFactory::new(statistics))
//! }
//! ```
//!
//! Lookups are only valid while the requesting component is being constructed.
//! Keeping a context around and using it later fails with
//! [`ComponentError::LateDependencyRegistration`].

use crate::component::{Component, ComponentHandle, NamedComponent};
use crate::error::ComponentError;
use crate::registry::ComponentRegistry;
use crate::slot::ComponentSlot;
use std::any::type_name;
use std::sync::Arc;
use tracing::{debug, error};

#[derive(Clone)]
pub struct ComponentContext {
    registry: Arc<ComponentRegistry>,
    component_name: String,
}

impl ComponentContext {
    pub(crate) fn new(registry: Arc<ComponentRegistry>, component_name: impl Into<String>) -> Self {
        Self {
            registry,
            component_name: component_name.into(),
        }
    }

    /// Name of the component being constructed.
    pub fn component_name(&self) -> &str {
        &self.component_name
    }

    pub fn is_loading_cancelled(&self) -> bool {
        self.own_slot().is_ok_and(ComponentSlot::is_cancelled)
    }

    /// Looks up `name` and waits for its instance.
    pub async fn find_handle(&self, name: &str) -> Result<ComponentHandle, ComponentError> {
        if name == self.component_name {
            return Err(self.cycle_error(vec![name.to_string()]));
        }
        let dependency = self
            .registry
            .slot(name)
            .ok_or_else(|| ComponentError::UnknownComponent {
                requester: self.component_name.clone(),
                component: name.to_string(),
            })?;
        self.register_dependency(dependency)?;

        debug!(component_name = %self.component_name, dependency = name, "Waiting for dependency");
        dependency.wait_and_get_component().await
    }

    /// Looks up `name` and downcasts it to `C`.
    pub async fn find_component<C: Component>(&self, name: &str) -> Result<Arc<C>, ComponentError> {
        let handle = self.find_handle(name).await?;
        handle
            .downcast::<C>()
            .ok_or_else(|| ComponentError::TypeMismatch {
                component: name.to_string(),
                expected: type_name::<C>(),
            })
    }

    /// Looks up `C` by its canonical name.
    pub async fn find<C: NamedComponent>(&self) -> Result<Arc<C>, ComponentError> {
        self.find_component(C::NAME).await
    }

    /// Like [`find_component`](Self::find_component), but a component missing
    /// from the list yields `Ok(None)` and records no edge.
    pub async fn find_component_optional<C: Component>(
        &self,
        name: &str,
    ) -> Result<Option<Arc<C>>, ComponentError> {
        if self.registry.slot(name).is_none() {
            return Ok(None);
        }
        self.find_component(name).await.map(Some)
    }

    fn own_slot(&self) -> Result<&ComponentSlot, ComponentError> {
        self.registry
            .slot(&self.component_name)
            .ok_or_else(|| ComponentError::UnknownComponent {
                requester: self.component_name.clone(),
                component: self.component_name.clone(),
            })
    }

    fn register_dependency(&self, dependency: &ComponentSlot) -> Result<(), ComponentError> {
        self.own_slot()?.add_it_depends_on(dependency.name())?;
        dependency.add_depends_on_it(&self.component_name)?;

        // Both edges are recorded before the check, so of two lookups closing
        // the same cycle concurrently at least one sees it. A rejected lookup
        // takes its edges back, otherwise shutdown would wait around the cycle.
        if let Some(path) = self
            .registry
            .find_dependency_path(dependency.name(), &self.component_name)
        {
            self.own_slot()?.remove_it_depends_on(dependency.name());
            dependency.remove_depends_on_it(&self.component_name);
            let mut cycle = vec![self.component_name.clone()];
            cycle.extend(path);
            return Err(self.cycle_error(cycle));
        }
        Ok(())
    }

    fn cycle_error(&self, mut cycle: Vec<String>) -> ComponentError {
        if cycle.len() == 1 {
            cycle.push(self.component_name.clone());
        }
        let err = ComponentError::DependencyCycle {
            cycle: cycle.join(" -> "),
        };
        error!(
            component_name = %self.component_name,
            error = %err,
            graph = %self.registry.dependency_graph(),
            "Cyclic component dependency"
        );
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{HookLog, MockComponent, NamedMock};
    use crate::stage::ComponentLifetimeStage;
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn registry(names: &[&str]) -> Arc<ComponentRegistry> {
        Arc::new(ComponentRegistry::new(names.iter().copied()).unwrap())
    }

    #[tokio::test]
    async fn lookup_records_both_edges_and_returns_instance() {
        let registry = registry(&["a", "b"]);
        let log = HookLog::default();
        let handle = ComponentHandle::new(MockComponent::new("a", log));
        registry.slot("a").unwrap().set_component(handle).unwrap();

        let ctx = ComponentContext::new(registry.clone(), "b");
        let a = timeout(WAIT, ctx.find_component::<MockComponent>("a"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(a.name(), "a");
        assert!(registry.slot("b").unwrap().check_it_depends_on("a"));
        assert!(registry.slot("a").unwrap().check_depends_on_it("b"));
    }

    #[tokio::test]
    async fn unknown_and_self_lookups_fail() {
        let ctx = ComponentContext::new(registry(&["a"]), "a");
        assert!(matches!(
            ctx.find_handle("missing").await.unwrap_err(),
            ComponentError::UnknownComponent { .. }
        ));
        let err = ctx.find_handle("a").await.unwrap_err();
        assert_eq!(err.to_string(), "dependency cycle detected: a -> a");
    }

    #[tokio::test]
    async fn optional_lookup_of_absent_component_is_none() {
        let registry = registry(&["a"]);
        let ctx = ComponentContext::new(registry.clone(), "a");
        let found = ctx
            .find_component_optional::<MockComponent>("metrics")
            .await
            .unwrap();
        assert!(found.is_none());
        assert!(registry.slot("a").unwrap().dependencies().is_empty());
    }

    #[tokio::test]
    async fn wrong_type_is_reported() {
        let registry = registry(&[NamedMock::NAME, "b"]);
        registry
            .slot(NamedMock::NAME)
            .unwrap()
            .set_component(ComponentHandle::new(NamedMock(MockComponent::new(
                NamedMock::NAME,
                HookLog::default(),
            ))))
            .unwrap();
        let ctx = ComponentContext::new(registry, "b");
        assert!(ctx.find::<NamedMock>().await.is_ok());
        assert!(matches!(
            ctx.find_component::<MockComponent>(NamedMock::NAME).await,
            Err(ComponentError::TypeMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn closing_a_cycle_is_rejected() {
        let registry = registry(&["a", "b", "c"]);
        registry.slot("a").unwrap().add_it_depends_on("b").unwrap();
        registry.slot("b").unwrap().add_it_depends_on("c").unwrap();

        let ctx = ComponentContext::new(registry.clone(), "c");
        let err = timeout(WAIT, ctx.find_handle("a")).await.unwrap().unwrap_err();
        assert_eq!(err.to_string(), "dependency cycle detected: c -> a -> b -> c");

        // The closing edge is taken back, the rest of the chain stays.
        assert!(!registry.slot("c").unwrap().check_it_depends_on("a"));
        assert!(!registry.slot("a").unwrap().check_depends_on_it("c"));
        assert!(registry.slot("a").unwrap().check_it_depends_on("b"));
        assert!(registry.find_dependency_path("a", "c").is_some());
        assert!(registry.find_dependency_path("c", "a").is_none());
    }

    #[tokio::test]
    async fn lookup_after_construction_is_a_usage_error() {
        let registry = registry(&["a", "b"]);
        registry
            .slot("b")
            .unwrap()
            .set_stage(ComponentLifetimeStage::Created);
        let ctx = ComponentContext::new(registry, "b");
        assert!(matches!(
            ctx.find_handle("a").await.unwrap_err(),
            ComponentError::LateDependencyRegistration { .. }
        ));
    }
}
