//! # Component Manager
//!
//! This module defines the `ComponentManager`, which owns every slot of a service
//! and drives them through their lifetime:
//!
//! ```text
//! start():  load ──────────────> Running (dependencies first)
//! stop():   StoppingAll (dependents first) ──> Stopped (dependents first)
//! ```

use crate::component::{Component, ComponentHandle, NamedComponent};
use crate::context::ComponentContext;
use crate::error::ComponentError;
use crate::list::{ComponentFactory, ComponentList};
use crate::registry::ComponentRegistry;
use crate::settings::ManagerSettings;
use crate::slot::ComponentSlot;
use crate::stage::ComponentLifetimeStage;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::{Id, JoinError, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Owns the slots of one service and runs its startup and shutdown.
///
/// # Startup
///
/// [`start`](Self::start) spawns every factory as its own task. Factories look
/// up their dependencies through a [`ComponentContext`] and suspend until those
/// are constructed, so construction order follows the dependency graph
/// without anyone computing it upfront. The first failure cancels every slot:
/// pending lookups fail with [`ComponentError::ConstructionCancelled`], already
/// constructed components get `on_loading_cancelled`, and the failure is
/// returned once every task has finished.
///
/// Once everything is constructed, each component runs
/// `on_all_components_loaded` after all of its dependencies did. A failure
/// there is fatal too.
///
/// # Shutdown
///
/// [`stop`](Self::stop) always runs to completion: every component runs
/// `on_all_components_are_stopping` and is then torn down, each only after all
/// components depending on it. Failures are logged and skipped.
///
/// A failed `start` keeps the components that were constructed; call `stop` to
/// tear them down.
///
/// ```rust
/// use component_framework::mock::{HookLog, MockComponent};
/// use component_framework::{ComponentList, ComponentManager, ManagerSettings};
///
/// #[tokio::main]
/// async fn main() {
///     let log = HookLog::default();
///     let list = ComponentList::new()
///         .append("logging", move |_ctx| async move { Ok(MockComponent::new("logging", log)) });
///
///     let mut manager = ComponentManager::new(list, ManagerSettings::default()).unwrap();
///     manager.start().await.unwrap();
///     assert!(manager.find_component::<MockComponent>("logging").is_some());
///     manager.stop().await;
/// }
/// ```
pub struct ComponentManager {
    registry: Arc<ComponentRegistry>,
    settings: ManagerSettings,
    factories: Option<Vec<(String, ComponentFactory)>>,
    cancellation: CancellationToken,
    stopped: bool,
}

impl ComponentManager {
    /// Creates one empty slot per listed component. Fails on duplicate names.
    pub fn new(list: ComponentList, settings: ManagerSettings) -> Result<Self, ComponentError> {
        let factories = list.into_entries();
        let registry = ComponentRegistry::new(factories.iter().map(|(name, _)| name.clone()))?;
        Ok(Self {
            registry: Arc::new(registry),
            settings,
            factories: Some(factories),
            cancellation: CancellationToken::new(),
            stopped: false,
        })
    }

    /// Cancelling this token aborts an in-flight [`start`](Self::start) with
    /// [`ComponentError::LoadAborted`].
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    /// Constructs every component, then runs `on_all_components_loaded`.
    pub async fn start(&mut self) -> Result<(), ComponentError> {
        let factories = self.factories.take().ok_or(ComponentError::AlreadyStarted)?;
        info!(count = factories.len(), "Loading components");
        self.load_components(factories).await?;
        self.switch_stage(StageSwitch::Running).await?;
        info!("All components started");
        Ok(())
    }

    /// Stops and tears down every component in reverse dependency order.
    /// Idempotent; never fails.
    pub async fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.factories = None;

        info!("Stopping components");
        self.registry.set_stage_switching_cancelled(false);
        for switch in [StageSwitch::StoppingAll, StageSwitch::Stopped] {
            if let Err(e) = self.switch_stage(switch).await {
                error!(error = %e, stage = %switch.stage(), "Stage switch failed");
            }
        }
        info!("All components stopped");
    }

    // --- Accessors ---

    pub fn slot(&self, name: &str) -> Option<&ComponentSlot> {
        self.registry.slot(name)
    }

    pub fn component(&self, name: &str) -> Option<ComponentHandle> {
        self.registry.slot(name)?.component()
    }

    pub fn find_component<C: Component>(&self, name: &str) -> Option<Arc<C>> {
        self.component(name)?.downcast::<C>()
    }

    pub fn find<C: NamedComponent>(&self) -> Option<Arc<C>> {
        self.find_component(C::NAME)
    }

    pub fn has_component(&self, name: &str) -> bool {
        self.registry
            .slot(name)
            .is_some_and(ComponentSlot::has_component)
    }

    pub fn stage(&self, name: &str) -> Option<ComponentLifetimeStage> {
        self.registry.slot(name).map(ComponentSlot::stage)
    }

    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.registry.names()
    }

    /// Every recorded dependency edge, for visualising the graph.
    pub fn dependency_graph(&self) -> String {
        self.registry.dependency_graph()
    }

    // --- Loading ---

    async fn load_components(
        &self,
        factories: Vec<(String, ComponentFactory)>,
    ) -> Result<(), ComponentError> {
        let mut tasks = JoinSet::new();
        for (name, factory) in factories {
            let ctx = ComponentContext::new(self.registry.clone(), name.clone());
            let registry = self.registry.clone();
            let span = info_span!("component_load", component_name = %name);
            tasks.spawn(
                async move {
                    let created = factory(ctx).await;
                    let Some(slot) = registry.slot(&name) else {
                        return Err(ComponentError::UnknownComponent {
                            requester: name.clone(),
                            component: name,
                        });
                    };
                    match created {
                        Ok(component) => {
                            slot.set_component(component)?;
                            debug!("Component created");
                            Ok(())
                        }
                        Err(source) => Err(ComponentError::Construction {
                            component: name,
                            source,
                        }),
                    }
                }
                .instrument(span),
            );
        }

        let deadline = self
            .settings
            .load_timeout()
            .map(|timeout| (Instant::now() + timeout, timeout));
        let timer = async {
            match deadline {
                Some((at, _)) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(timer);

        let mut failure = None;
        loop {
            let joined = tokio::select! {
                joined = tasks.join_next() => joined,
                () = &mut timer, if failure.is_none() => {
                    let timeout = deadline.map(|(_, timeout)| timeout).unwrap_or_default();
                    self.fail_loading(&mut failure, ComponentError::LoadTimeout(timeout));
                    continue;
                }
                () = self.cancellation.cancelled(), if failure.is_none() => {
                    self.fail_loading(&mut failure, ComponentError::LoadAborted);
                    continue;
                }
            };
            let Some(joined) = joined else {
                break;
            };
            if let Err(err) = flatten(joined) {
                self.fail_loading(&mut failure, err);
            }
        }

        if let Some(err) = failure {
            error!(
                error = %err,
                graph = %self.registry.dependency_graph(),
                "Failed to load components"
            );
            return Err(err);
        }

        let graph = self.registry.dependency_graph();
        if self.settings.log_dependency_graph {
            info!(%graph, "Components loaded");
        } else {
            debug!(%graph, "Components loaded");
        }
        Ok(())
    }

    /// Records `err` and, on the first failure, cancels loading everywhere.
    fn fail_loading(&self, failure: &mut Option<ComponentError>, err: ComponentError) {
        if failure.is_none() {
            warn!(error = %err, "Cancelling components load");
            self.registry.cancel_components_load();
        }
        record_failure(failure, err);
    }

    // --- Stage switching ---

    async fn switch_stage(&self, switch: StageSwitch) -> Result<(), ComponentError> {
        let mut tasks = JoinSet::new();
        let mut slots_by_task: HashMap<Id, usize> = HashMap::new();
        for index in 0..self.registry.len() {
            let handle = tasks.spawn(switch_component_stage(self.registry.clone(), index, switch));
            slots_by_task.insert(handle.id(), index);
        }

        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            let result = match joined {
                Ok(result) => result,
                Err(join_error) => {
                    // Let anyone waiting on the crashed slot move on.
                    if let Some(&index) = slots_by_task.get(&join_error.id()) {
                        self.registry.slots()[index].set_stage(switch.stage());
                    }
                    Err(task_failed(join_error))
                }
            };
            if let Err(err) = result {
                if switch.is_fatal() && failure.is_none() {
                    self.registry.set_stage_switching_cancelled(true);
                }
                record_failure(&mut failure, err);
            }
        }

        match failure {
            Some(err) => Err(err),
            None => {
                info!(stage = %switch.stage(), "Stage reached");
                Ok(())
            }
        }
    }
}

impl Drop for ComponentManager {
    fn drop(&mut self) {
        if !self.stopped && self.registry.slots().iter().any(ComponentSlot::has_component) {
            warn!("ComponentManager dropped without stop(); components are released without teardown");
        }
    }
}

/// One transition applied to every slot.
#[derive(Debug, Clone, Copy)]
enum StageSwitch {
    Running,
    StoppingAll,
    Stopped,
}

impl StageSwitch {
    fn stage(self) -> ComponentLifetimeStage {
        match self {
            Self::Running => ComponentLifetimeStage::Running,
            Self::StoppingAll => ComponentLifetimeStage::StoppingAll,
            Self::Stopped => ComponentLifetimeStage::Stopped,
        }
    }

    fn method(self) -> &'static str {
        match self {
            Self::Running => "on_all_components_loaded",
            Self::StoppingAll => "on_all_components_are_stopping",
            Self::Stopped => "clear_component",
        }
    }

    fn is_fatal(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Starting waits for dependencies, stopping waits for dependents.
    fn awaited(self, slot: &ComponentSlot) -> Vec<String> {
        match self {
            Self::Running => slot.dependencies(),
            Self::StoppingAll | Self::Stopped => slot.dependents(),
        }
    }

    async fn apply(self, slot: &ComponentSlot) -> Result<(), ComponentError> {
        match self {
            Self::Running => slot.on_all_components_loaded().await,
            Self::StoppingAll => {
                slot.on_all_components_are_stopping().await;
                Ok(())
            }
            Self::Stopped => {
                slot.clear_component().await;
                Ok(())
            }
        }
    }
}

async fn switch_component_stage(
    registry: Arc<ComponentRegistry>,
    index: usize,
    switch: StageSwitch,
) -> Result<(), ComponentError> {
    let slot = &registry.slots()[index];
    for name in switch.awaited(slot) {
        if let Some(other) = registry.slot(&name) {
            other.wait_stage(switch.stage(), switch.method()).await?;
        }
    }
    switch.apply(slot).await?;
    slot.set_stage(switch.stage());
    Ok(())
}

/// Keeps the first root-cause error; cancellations only fill an empty spot.
fn record_failure(failure: &mut Option<ComponentError>, err: ComponentError) {
    let replace = match failure {
        None => true,
        Some(current) => current.is_secondary() && !err.is_secondary(),
    };
    if replace {
        *failure = Some(err);
    } else {
        debug!(error = %err, "Suppressed follow-up failure");
    }
}

fn flatten(joined: Result<Result<(), ComponentError>, JoinError>) -> Result<(), ComponentError> {
    joined.map_err(task_failed).and_then(|result| result)
}

fn task_failed(err: JoinError) -> ComponentError {
    ComponentError::TaskFailed(err.to_string())
}
