//! # Framework Errors
//!
//! This module defines the error type shared by every layer of the framework.
//! Variants fall into four groups:
//!
//! - **Usage errors**: a component used the framework incorrectly (looked up a
//!   dependency outside of its constructor, was installed twice, asked for an
//!   unknown name). These abort startup and are never retried.
//! - **Cancellation conditions**: a wait was cut short because loading was
//!   cancelled. They unwind a waiting task and are not bugs; see
//!   [`ComponentError::is_cancellation`].
//! - **Fatal startup failures**: a constructor or an
//!   `on_all_components_loaded` hook failed.
//! - Shutdown failures never show up here: they are logged and swallowed.

use crate::stage::ComponentLifetimeStage;
use std::time::Duration;

/// Boxed error returned by component constructors and hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while orchestrating components.
#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    #[error("{method} cancelled")]
    StageWaitCancelled { method: String },

    #[error("components load cancelled while waiting for component '{component}'")]
    ConstructionCancelled { component: String },

    #[error("component '{component}' is already constructed")]
    AlreadyConstructed { component: String },

    #[error(
        "component '{component}' cannot register dependency edge with '{other}' at stage {stage}; \
         components may only be looked up from within a component constructor"
    )]
    LateDependencyRegistration {
        component: String,
        other: String,
        stage: ComponentLifetimeStage,
    },

    #[error("component '{requester}' requested unknown component '{component}'")]
    UnknownComponent { requester: String, component: String },

    #[error("component '{component}' is not of the requested type {expected}")]
    TypeMismatch {
        component: String,
        expected: &'static str,
    },

    #[error("component '{0}' is registered more than once")]
    DuplicateComponent(String),

    #[error("dependency cycle detected: {cycle}")]
    DependencyCycle { cycle: String },

    #[error("component manager was already started")]
    AlreadyStarted,

    #[error("cannot start component '{component}': {source}")]
    Construction {
        component: String,
        #[source]
        source: BoxError,
    },

    #[error("on_all_components_loaded() failed for component {component}: {source}")]
    AllComponentsLoaded {
        component: String,
        #[source]
        source: BoxError,
    },

    #[error("components load timed out after {0:?}")]
    LoadTimeout(Duration),

    #[error("components load aborted")]
    LoadAborted,

    #[error("component task failed: {0}")]
    TaskFailed(String),
}

impl ComponentError {
    /// Returns `true` for errors that only signal "stop what you are doing"
    /// because somebody else cancelled loading.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            Self::StageWaitCancelled { .. } | Self::ConstructionCancelled { .. }
        )
    }

    /// Like [`is_cancellation`](Self::is_cancellation), but looks through a
    /// constructor failure whose source is itself a cancellation. Constructors
    /// usually propagate lookup errors with `?`, which boxes them.
    pub fn is_secondary(&self) -> bool {
        match self {
            Self::Construction { source, .. } => source
                .downcast_ref::<ComponentError>()
                .is_some_and(ComponentError::is_secondary),
            other => other.is_cancellation(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boxed_cancellation_is_secondary() {
        let err = ComponentError::Construction {
            component: "b".into(),
            source: Box::new(ComponentError::ConstructionCancelled {
                component: "a".into(),
            }),
        };
        assert!(!err.is_cancellation());
        assert!(err.is_secondary());
    }

    #[test]
    fn construction_failure_names_component() {
        let err = ComponentError::Construction {
            component: "postgres".into(),
            source: "connection refused".into(),
        };
        assert!(!err.is_secondary());
        assert_eq!(
            err.to_string(),
            "cannot start component 'postgres': connection refused"
        );
    }
}
