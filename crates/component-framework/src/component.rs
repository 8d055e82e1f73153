//! # Component Trait
//!
//! The `Component` trait is the capability set the orchestrator needs from any
//! service object it manages (a logger, a metrics storage, an RPC client
//! factory, ...). Construction itself is not part of the trait: it is the async
//! factory registered in a [`ComponentList`](crate::ComponentList), which
//! receives a [`ComponentContext`](crate::ComponentContext) to look up its
//! dependencies.
//!
//! # Provided Methods (Hooks)
//! Every hook has a default no-op implementation:
//! - [`Component::on_all_components_loaded`]: every component is constructed
//!   and every dependency of this one already ran this hook.
//! - [`Component::on_all_components_are_stopping`]: shutdown has begun; every
//!   component depending on this one already ran this hook.
//! - [`Component::on_loading_cancelled`]: startup was abandoned after this
//!   component was constructed. Called at most once.
//! - [`Component::stop`]: teardown, run once right before the instance is
//!   dropped by the framework.

use crate::error::BoxError;
use async_trait::async_trait;
use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

/// A service object whose lifetime is managed by a
/// [`ComponentManager`](crate::ComponentManager).
///
/// # Failure policy
/// A failing `on_all_components_loaded` aborts startup. Failures of
/// `on_all_components_are_stopping` and `stop` are logged and shutdown carries
/// on with the other components.
#[async_trait]
pub trait Component: Send + Sync + 'static {
    async fn on_all_components_loaded(&self) -> Result<(), BoxError> {
        Ok(())
    }

    async fn on_all_components_are_stopping(&self) -> Result<(), BoxError> {
        Ok(())
    }

    /// Must not block: it runs on the task that cancelled loading, while the
    /// component's slot is locked. Never delivered after `stop`.
    fn on_loading_cancelled(&self) {}

    async fn stop(&self) -> Result<(), BoxError> {
        Ok(())
    }
}

/// A component with a canonical name, for typed lookups such as
/// [`ComponentContext::find`](crate::ComponentContext::find).
pub trait NamedComponent: Component {
    const NAME: &'static str;
}

/// Type-erased, cheaply cloneable handle to a constructed component.
///
/// The slot keeps the owning handle; dependents get clones through lookups.
#[derive(Clone)]
pub struct ComponentHandle {
    component: Arc<dyn Component>,
    any: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl ComponentHandle {
    pub fn new<C: Component>(component: C) -> Self {
        Self::from_arc(Arc::new(component))
    }

    pub fn from_arc<C: Component>(component: Arc<C>) -> Self {
        let any: Arc<dyn Any + Send + Sync> = component.clone();
        Self {
            component,
            any,
            type_name: type_name::<C>(),
        }
    }

    pub fn component(&self) -> &dyn Component {
        self.component.as_ref()
    }

    /// Recovers the concrete type, or `None` if the component is of another type.
    pub fn downcast<C: Component>(&self) -> Option<Arc<C>> {
        self.any.clone().downcast::<C>().ok()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether both handles refer to the same instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.any, &other.any)
    }
}

impl fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentHandle")
            .field("type_name", &self.type_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain(u32);
    impl Component for Plain {}

    struct Other;
    impl Component for Other {}

    #[test]
    fn downcast_recovers_concrete_type() {
        let handle = ComponentHandle::new(Plain(7));
        assert_eq!(handle.downcast::<Plain>().unwrap().0, 7);
        assert!(handle.downcast::<Other>().is_none());
        assert!(handle.type_name().ends_with("Plain"));
    }

    #[test]
    fn clones_share_identity() {
        let handle = ComponentHandle::new(Plain(1));
        let clone = handle.clone();
        assert!(handle.ptr_eq(&clone));
        assert!(!handle.ptr_eq(&ComponentHandle::new(Plain(1))));
    }
}
