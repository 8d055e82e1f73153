//! # Component List
//!
//! The declaration of what a service is made of: an ordered list of component
//! names, each paired with an async factory. Factories run concurrently during
//! [`ComponentManager::start`](crate::ComponentManager::start); the order of the
//! list only decides the order of diagnostics, never the order of construction.

use crate::component::{Component, ComponentHandle, NamedComponent};
use crate::context::ComponentContext;
use crate::error::BoxError;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by a type-erased factory.
pub type ComponentFuture = Pin<Box<dyn Future<Output = Result<ComponentHandle, BoxError>> + Send>>;

/// Type-erased async constructor of one component.
pub type ComponentFactory = Box<dyn FnOnce(ComponentContext) -> ComponentFuture + Send>;

#[derive(Default)]
pub struct ComponentList {
    entries: Vec<(String, ComponentFactory)>,
}

impl ComponentList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a component named `name` built by `factory`.
    ///
    /// The factory may look up other components through the context it gets;
    /// a lookup suspends until that component is constructed.
    pub fn append<C, F, Fut>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        C: Component,
        F: FnOnce(ComponentContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<C, BoxError>> + Send + 'static,
    {
        let factory: ComponentFactory =
            Box::new(move |ctx| Box::pin(async move { factory(ctx).await.map(ComponentHandle::new) }));
        self.entries.push((name.into(), factory));
        self
    }

    /// Adds `C` under its canonical [`NamedComponent::NAME`].
    pub fn append_named<C, F, Fut>(self, factory: F) -> Self
    where
        C: NamedComponent,
        F: FnOnce(ComponentContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<C, BoxError>> + Send + 'static,
    {
        self.append(C::NAME, factory)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<(String, ComponentFactory)> {
        self.entries
    }
}

impl fmt::Debug for ComponentList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{HookLog, MockComponent};

    #[test]
    fn keeps_declaration_order() {
        let log = HookLog::default();
        let (a, b) = (log.clone(), log.clone());
        let list = ComponentList::new()
            .append("b", move |_| async move { Ok(MockComponent::new("b", b)) })
            .append("a", move |_| async move { Ok(MockComponent::new("a", a)) });
        assert_eq!(list.names().collect::<Vec<_>>(), ["b", "a"]);
        assert!(list.contains("a"));
        assert!(!list.contains("c"));
        assert_eq!(list.len(), 2);
        assert_eq!(format!("{list:?}"), r#"["b", "a"]"#);
    }
}
