//! # Lifetime Stages
//!
//! A component moves through the stages of [`ComponentLifetimeStage`] strictly
//! forward. [`StageState`] is the synchronisation primitive behind that: a stage
//! value plus a cancellation flag (and an arbitrary payload) guarded by one
//! mutex, with a [`Notify`] acting as the condition variable.
//!
//! ## Waiting without missed wake-ups
//!
//! Every waiter registers interest in the next notification *before* it samples
//! the state:
//!
//! ```text
//! loop {
//!     enable notified()      <- registered as a waiter
//!     lock, check predicate  <- sees every change made before this point
//!     await notified()       <- wakes on every change made after it
//! }
//! ```
//!
//! Any modification that lands between the check and the await still finds the
//! waiter registered, so the wake-up cannot be lost.

use crate::error::ComponentError;
use parking_lot::Mutex;
use std::fmt;
use tokio::sync::Notify;

/// The lifecycle milestones of a single component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComponentLifetimeStage {
    /// Not constructed yet (or construction in progress).
    Null,
    /// Constructed and installed into its slot.
    Created,
    /// `on_all_components_loaded` has completed.
    Running,
    /// `on_all_components_are_stopping` has completed.
    StoppingAll,
    /// The instance has been torn down.
    Stopped,
}

impl fmt::Display for ComponentLifetimeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Created => "created",
            Self::Running => "running",
            Self::StoppingAll => "stopping-all",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Everything guarded by the [`StageState`] mutex.
#[derive(Debug)]
pub struct Staged<T> {
    pub stage: ComponentLifetimeStage,
    pub cancelled: bool,
    pub value: T,
}

/// A staged value with waiters.
///
/// `T` is extra state that must change atomically with the stage; use `()` when
/// there is none.
#[derive(Debug)]
pub struct StageState<T = ()> {
    state: Mutex<Staged<T>>,
    changed: Notify,
}

impl<T: Default> Default for StageState<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> StageState<T> {
    pub fn new(value: T) -> Self {
        Self {
            state: Mutex::new(Staged {
                stage: ComponentLifetimeStage::Null,
                cancelled: false,
                value,
            }),
            changed: Notify::new(),
        }
    }

    /// Stores `stage` and wakes every waiter.
    pub fn set_stage(&self, stage: ComponentLifetimeStage) {
        self.modify(|state| state.stage = stage);
    }

    pub fn stage(&self) -> ComponentLifetimeStage {
        self.state.lock().stage
    }

    /// Sets the cancellation flag and wakes every waiter, whatever the stage.
    pub fn set_cancelled(&self, cancelled: bool) {
        self.modify(|state| state.cancelled = cancelled);
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }

    /// Runs `f` under the lock.
    pub fn read<R>(&self, f: impl FnOnce(&Staged<T>) -> R) -> R {
        f(&self.state.lock())
    }

    /// Runs `f` under the lock, then wakes every waiter.
    pub fn modify<R>(&self, f: impl FnOnce(&mut Staged<T>) -> R) -> R {
        let result = f(&mut self.state.lock());
        self.changed.notify_waiters();
        result
    }

    /// Suspends until `ready` holds, then maps the state with `then` while still
    /// holding the lock.
    pub async fn wait_for<R>(
        &self,
        mut ready: impl FnMut(&Staged<T>) -> bool,
        then: impl FnOnce(&Staged<T>) -> R,
    ) -> R {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let state = self.state.lock();
                if ready(&state) {
                    return then(&state);
                }
            }
            notified.await;
        }
    }

    /// Suspends until the stage equals `target` or cancellation is observed.
    ///
    /// Reaching the target wins over a simultaneous cancellation. On
    /// cancellation fails with [`ComponentError::StageWaitCancelled`] naming
    /// `method`.
    pub async fn wait_until(
        &self,
        target: ComponentLifetimeStage,
        method: &str,
    ) -> Result<(), ComponentError> {
        let reached = self
            .wait_for(
                |state| state.cancelled || state.stage == target,
                |state| state.stage == target,
            )
            .await;
        if reached {
            Ok(())
        } else {
            Err(ComponentError::StageWaitCancelled {
                method: method.to_string(),
            })
        }
    }
}
