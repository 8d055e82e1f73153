//! Dependency edges of one component slot.
//!
//! Both directions of every edge are recorded: `it_depends_on` on the requesting
//! side and `depends_on_it` on the dependency's side. Each set is writable only
//! during an early stage of the *owning* slot and frozen afterwards.

use crate::error::ComponentError;
use crate::stage::ComponentLifetimeStage;
use std::collections::BTreeSet;
use std::fmt::Write as _;

#[derive(Debug, Default, Clone)]
pub struct DependencyEdges {
    it_depends_on: BTreeSet<String>,
    depends_on_it: BTreeSet<String>,
}

impl DependencyEdges {
    /// Records that `owner` depends on `dependency`. Allowed only while the
    /// owner is still `Null`, i.e. from inside its constructor.
    pub fn add_it_depends_on(
        &mut self,
        owner: &str,
        owner_stage: ComponentLifetimeStage,
        dependency: &str,
    ) -> Result<(), ComponentError> {
        if owner_stage != ComponentLifetimeStage::Null {
            return Err(ComponentError::LateDependencyRegistration {
                component: owner.to_string(),
                other: dependency.to_string(),
                stage: owner_stage,
            });
        }
        self.it_depends_on.insert(dependency.to_string());
        Ok(())
    }

    /// Records that `dependent` depends on `owner`. Allowed while the owner is
    /// `Null` or `Created`: a dependent may finish its lookup after the owner
    /// has already been installed.
    pub fn add_depends_on_it(
        &mut self,
        owner: &str,
        owner_stage: ComponentLifetimeStage,
        dependent: &str,
    ) -> Result<(), ComponentError> {
        if !matches!(
            owner_stage,
            ComponentLifetimeStage::Null | ComponentLifetimeStage::Created
        ) {
            return Err(ComponentError::LateDependencyRegistration {
                component: owner.to_string(),
                other: dependent.to_string(),
                stage: owner_stage,
            });
        }
        self.depends_on_it.insert(dependent.to_string());
        Ok(())
    }

    /// Drops an edge recorded by [`add_it_depends_on`](Self::add_it_depends_on).
    /// Used to roll back a lookup that would close a cycle.
    pub fn remove_it_depends_on(&mut self, dependency: &str) -> bool {
        self.it_depends_on.remove(dependency)
    }

    pub fn remove_depends_on_it(&mut self, dependent: &str) -> bool {
        self.depends_on_it.remove(dependent)
    }

    pub fn it_depends_on(&self, component: &str) -> bool {
        self.it_depends_on.contains(component)
    }

    pub fn depends_on_it(&self, component: &str) -> bool {
        self.depends_on_it.contains(component)
    }

    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.it_depends_on.iter().map(String::as_str)
    }

    pub fn dependents(&self) -> impl Iterator<Item = &str> {
        self.depends_on_it.iter().map(String::as_str)
    }

    /// Renders the `it_depends_on` side as `"owner" -> "dep"` pairs, e.g.
    /// `"b" -> "a"; "b" -> "c" `. Empty when nothing is depended on.
    pub fn render(&self, owner: &str) -> String {
        let mut out = String::new();
        for (i, dependency) in self.it_depends_on.iter().enumerate() {
            if i > 0 {
                out.push_str("; ");
            }
            let _ = write!(out, "\"{owner}\" -> \"{dependency}\"");
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out
    }
}
