//! # Component Slot
//!
//! A [`ComponentSlot`] is the orchestration record for one named component: the
//! installed instance (if any), its lifetime stage, its cancellation flag and
//! both directions of its dependency edges. All of it lives inside a single
//! [`StageState`], so an edge registration can never interleave with a stage
//! change and every waiter sees a consistent snapshot.
//!
//! ```text
//! Null ──install──> Created ──loaded──> Running ──stopping──> StoppingAll ──teardown──> Stopped
//!   \____________________ cancellation may be flagged at any point ____________________/
//! ```
//!
//! Cancellation never changes the stage. It only wakes waiters and fires the
//! component's `on_loading_cancelled` hook once an instance exists.

use crate::component::ComponentHandle;
use crate::dependencies::DependencyEdges;
use crate::error::ComponentError;
use crate::stage::{ComponentLifetimeStage, StageState};
use tracing::{debug, error, info_span, warn, Instrument};

#[derive(Debug, Default)]
struct SlotState {
    component: Option<ComponentHandle>,
    edges: DependencyEdges,
    loading_cancelled_fired: bool,
}

#[derive(Debug)]
pub struct ComponentSlot {
    name: String,
    state: StageState<SlotState>,
}

impl ComponentSlot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: StageState::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // --- Instance ---

    /// Installs the constructed instance and moves the slot to `Created`.
    /// A slot takes an instance once per lifetime: any install after the slot
    /// has left `Null` is rejected, including one after teardown.
    ///
    /// If loading was cancelled before construction finished, the fresh
    /// instance gets its `on_loading_cancelled` hook right away.
    pub fn set_component(&self, component: ComponentHandle) -> Result<(), ComponentError> {
        let cancelled = self.state.modify(|state| {
            if state.value.component.is_some() || state.stage != ComponentLifetimeStage::Null {
                return Err(ComponentError::AlreadyConstructed {
                    component: self.name.clone(),
                });
            }
            state.value.component = Some(component);
            state.stage = ComponentLifetimeStage::Created;
            Ok(state.cancelled)
        });
        match cancelled {
            Ok(true) => {
                self.fire_loading_cancelled();
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(err) => {
                error!(component_name = %self.name, error = %err, "Component installed twice");
                Err(err)
            }
        }
    }

    pub fn component(&self) -> Option<ComponentHandle> {
        self.state.read(|state| state.value.component.clone())
    }

    pub fn has_component(&self) -> bool {
        self.state.read(|state| state.value.component.is_some())
    }

    /// Waits until the instance is installed and returns a handle to it.
    ///
    /// Fails with [`ComponentError::ConstructionCancelled`] once loading is
    /// cancelled, even if the instance shows up later.
    pub async fn wait_and_get_component(&self) -> Result<ComponentHandle, ComponentError> {
        self.state
            .wait_for(
                |state| state.cancelled || state.value.component.is_some(),
                |state| match &state.value.component {
                    Some(component) if !state.cancelled => Ok(component.clone()),
                    _ => Err(ComponentError::ConstructionCancelled {
                        component: self.name.clone(),
                    }),
                },
            )
            .await
    }

    /// Detaches the instance from the slot and tears it down. A no-op when no
    /// instance is present, so concurrent or repeated calls stop it only once.
    pub async fn clear_component(&self) {
        let Some(component) = self.extract_component() else {
            return;
        };
        let span = info_span!("component_stop", component_name = %self.name);
        async move {
            debug!("Stopping component");
            if let Err(e) = component.component().stop().await {
                warn!(error = %e, "Component stop failed");
            }
            drop(component);
            debug!("Stopped component");
        }
        .instrument(span)
        .await;
    }

    /// Also closes the `on_loading_cancelled` window: a detached instance never
    /// receives the hook.
    fn extract_component(&self) -> Option<ComponentHandle> {
        self.state.modify(|state| {
            let component = state.value.component.take();
            if component.is_some() {
                state.value.loading_cancelled_fired = true;
            }
            component
        })
    }

    // --- Cancellation ---

    pub fn set_stage_switching_cancelled(&self, cancelled: bool) {
        self.state.set_cancelled(cancelled);
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    /// Flags the slot as cancelled, wakes every waiter and, if an instance is
    /// present, delivers `on_loading_cancelled` exactly once.
    pub fn notify_loading_cancelled(&self) {
        self.state.set_cancelled(true);
        self.fire_loading_cancelled();
    }

    // The hook runs under the slot lock so it cannot interleave with
    // `extract_component`. It must not call back into the slot.
    fn fire_loading_cancelled(&self) {
        self.state.modify(|state| {
            if state.value.loading_cancelled_fired {
                return;
            }
            let Some(component) = &state.value.component else {
                return;
            };
            state.value.loading_cancelled_fired = true;
            debug!(component_name = %self.name, "Component loading cancelled");
            component.component().on_loading_cancelled();
        });
    }

    // --- Hooks ---

    /// Fatal on failure: the error names this component and startup aborts.
    pub async fn on_all_components_loaded(&self) -> Result<(), ComponentError> {
        let Some(component) = self.component() else {
            return Ok(());
        };
        component
            .component()
            .on_all_components_loaded()
            .await
            .map_err(|source| {
                let err = ComponentError::AllComponentsLoaded {
                    component: self.name.clone(),
                    source,
                };
                error!(component_name = %self.name, error = %err, "Component failed to start");
                err
            })
    }

    /// Best effort: a failure is logged and swallowed.
    pub async fn on_all_components_are_stopping(&self) {
        let Some(component) = self.component() else {
            return;
        };
        let span = info_span!("on_all_components_are_stopping", component_name = %self.name);
        let result = component
            .component()
            .on_all_components_are_stopping()
            .instrument(span)
            .await;
        if let Err(e) = result {
            error!(
                component_name = %self.name,
                error = %e,
                "on_all_components_are_stopping() failed"
            );
        }
    }

    // --- Stage ---

    pub fn set_stage(&self, stage: ComponentLifetimeStage) {
        self.state.set_stage(stage);
    }

    pub fn stage(&self) -> ComponentLifetimeStage {
        self.state.stage()
    }

    pub async fn wait_stage(
        &self,
        stage: ComponentLifetimeStage,
        method: &str,
    ) -> Result<(), ComponentError> {
        self.state.wait_until(stage, method).await
    }

    // --- Dependency edges ---

    /// Records that this component depends on `dependency`.
    pub fn add_it_depends_on(&self, dependency: &str) -> Result<(), ComponentError> {
        self.state
            .modify(|state| {
                state
                    .value
                    .edges
                    .add_it_depends_on(&self.name, state.stage, dependency)
            })
            .inspect_err(|e| error!(error = %e, "Dependency registered outside of constructor"))
    }

    /// Records that `dependent` depends on this component.
    pub fn add_depends_on_it(&self, dependent: &str) -> Result<(), ComponentError> {
        self.state
            .modify(|state| {
                state
                    .value
                    .edges
                    .add_depends_on_it(&self.name, state.stage, dependent)
            })
            .inspect_err(|e| error!(error = %e, "Dependency registered outside of constructor"))
    }

    /// Drops the edge pair half owned by this slot. Removal ignores the stage
    /// freeze since it only ever undoes a registration made moments before.
    pub fn remove_it_depends_on(&self, dependency: &str) {
        self.state
            .modify(|state| state.value.edges.remove_it_depends_on(dependency));
    }

    pub fn remove_depends_on_it(&self, dependent: &str) {
        self.state
            .modify(|state| state.value.edges.remove_depends_on_it(dependent));
    }

    pub fn check_it_depends_on(&self, component: &str) -> bool {
        self.state
            .read(|state| state.value.edges.it_depends_on(component))
    }

    pub fn check_depends_on_it(&self, component: &str) -> bool {
        self.state
            .read(|state| state.value.edges.depends_on_it(component))
    }

    /// Names this component depends on, sorted.
    pub fn dependencies(&self) -> Vec<String> {
        self.state.read(|state| {
            state
                .value
                .edges
                .dependencies()
                .map(str::to_string)
                .collect()
        })
    }

    /// Names that depend on this component, sorted.
    pub fn dependents(&self) -> Vec<String> {
        self.state.read(|state| {
            state
                .value
                .edges
                .dependents()
                .map(str::to_string)
                .collect()
        })
    }

    /// `"name" -> "dependency"` pairs for a graph description.
    pub fn render_dependencies(&self) -> String {
        self.state
            .read(|state| state.value.edges.render(&self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Hook, HookLog, MockComponent};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn mock(name: &str, log: &HookLog) -> ComponentHandle {
        ComponentHandle::new(MockComponent::new(name, log.clone()))
    }

    #[tokio::test]
    async fn waiter_receives_the_installed_instance() {
        let log = HookLog::default();
        let slot = Arc::new(ComponentSlot::new("a"));
        let waiter = {
            let slot = slot.clone();
            tokio::spawn(async move { slot.wait_and_get_component().await })
        };
        tokio::task::yield_now().await;
        assert!(!slot.has_component());

        let handle = mock("a", &log);
        slot.set_component(handle.clone()).unwrap();

        let got = timeout(WAIT, waiter).await.unwrap().unwrap().unwrap();
        assert!(got.ptr_eq(&handle));
        assert_eq!(slot.stage(), ComponentLifetimeStage::Created);
    }

    #[tokio::test]
    async fn installing_twice_is_rejected() {
        let log = HookLog::default();
        let slot = ComponentSlot::new("a");
        let first = mock("a", &log);
        slot.set_component(first.clone()).unwrap();
        let err = slot.set_component(mock("a", &log)).unwrap_err();
        assert!(matches!(err, ComponentError::AlreadyConstructed { .. }));
        assert!(slot.component().unwrap().ptr_eq(&first));
    }

    #[tokio::test]
    async fn install_after_teardown_is_rejected() {
        let log = HookLog::default();
        let slot = ComponentSlot::new("a");
        slot.set_component(mock("a", &log)).unwrap();
        slot.set_stage(ComponentLifetimeStage::StoppingAll);
        slot.clear_component().await;
        slot.set_stage(ComponentLifetimeStage::Stopped);

        let err = slot.set_component(mock("a", &log)).unwrap_err();
        assert!(matches!(err, ComponentError::AlreadyConstructed { component } if component == "a"));
        assert!(!slot.has_component());
        assert_eq!(slot.stage(), ComponentLifetimeStage::Stopped);
    }

    #[tokio::test]
    async fn cancellation_unblocks_instance_waiters() {
        let slot = Arc::new(ComponentSlot::new("a"));
        let waiter = {
            let slot = slot.clone();
            tokio::spawn(async move { slot.wait_and_get_component().await })
        };
        tokio::task::yield_now().await;
        slot.notify_loading_cancelled();
        let err = timeout(WAIT, waiter).await.unwrap().unwrap().unwrap_err();
        assert!(matches!(err, ComponentError::ConstructionCancelled { component } if component == "a"));
    }

    #[tokio::test]
    async fn cancel_before_install_fires_hook_on_install() {
        let log = HookLog::default();
        let slot = ComponentSlot::new("a");
        slot.notify_loading_cancelled();
        assert_eq!(log.count("a", Hook::LoadingCancelled), 0);

        slot.set_component(mock("a", &log)).unwrap();
        slot.notify_loading_cancelled();
        assert_eq!(log.count("a", Hook::LoadingCancelled), 1);
    }

    #[tokio::test]
    async fn cancel_without_instance_never_fires_hook() {
        let log = HookLog::default();
        let slot = ComponentSlot::new("a");
        for _ in 0..3 {
            slot.notify_loading_cancelled();
        }
        assert!(log.events().is_empty());
    }

    #[tokio::test]
    async fn cancel_after_teardown_never_fires_hook() {
        let log = HookLog::default();
        let slot = ComponentSlot::new("a");
        slot.set_component(mock("a", &log)).unwrap();
        slot.clear_component().await;

        slot.notify_loading_cancelled();
        assert_eq!(log.count("a", Hook::LoadingCancelled), 0);
        assert_eq!(log.count("a", Hook::Stop), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn cancellation_racing_teardown_never_follows_stop() {
        for _ in 0..50 {
            let log = HookLog::default();
            let slot = Arc::new(ComponentSlot::new("a"));
            slot.set_component(mock("a", &log)).unwrap();
            let cancel = {
                let slot = slot.clone();
                tokio::spawn(async move { slot.notify_loading_cancelled() })
            };
            slot.clear_component().await;
            cancel.await.unwrap();

            let events = log.events();
            let stop = events.iter().position(|(_, hook)| *hook == Hook::Stop);
            let cancelled = events
                .iter()
                .position(|(_, hook)| *hook == Hook::LoadingCancelled);
            if let (Some(stop), Some(cancelled)) = (stop, cancelled) {
                assert!(cancelled < stop, "hook fired after stop: {events:?}");
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_cancellation_fires_hook_once() {
        for _ in 0..50 {
            let log = HookLog::default();
            let slot = Arc::new(ComponentSlot::new("a"));
            let mut tasks = Vec::new();
            for _ in 0..8 {
                let slot = slot.clone();
                tasks.push(tokio::spawn(async move { slot.notify_loading_cancelled() }));
            }
            slot.set_component(mock("a", &log)).unwrap();
            for task in tasks {
                task.await.unwrap();
            }
            assert_eq!(log.count("a", Hook::LoadingCancelled), 1);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_teardown_stops_once() {
        let log = HookLog::default();
        let slot = Arc::new(ComponentSlot::new("a"));
        slot.set_component(mock("a", &log)).unwrap();

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let slot = slot.clone();
                tokio::spawn(async move { slot.clear_component().await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
        slot.clear_component().await;

        assert_eq!(log.count("a", Hook::Stop), 1);
        assert!(!slot.has_component());
    }

    #[tokio::test]
    async fn edges_freeze_after_early_stages() {
        let slot = ComponentSlot::new("b");
        slot.add_it_depends_on("a").unwrap();
        slot.add_depends_on_it("c").unwrap();

        slot.set_stage(ComponentLifetimeStage::Created);
        assert!(slot.add_it_depends_on("d").is_err());
        slot.add_depends_on_it("e").unwrap();

        slot.set_stage(ComponentLifetimeStage::Running);
        assert!(slot.add_depends_on_it("f").is_err());

        assert!(slot.check_it_depends_on("a"));
        assert!(!slot.check_it_depends_on("d"));
        assert!(slot.check_depends_on_it("e"));
        assert_eq!(slot.dependents(), ["c", "e"]);
        assert_eq!(slot.render_dependencies(), r#""b" -> "a" "#);
    }

    #[tokio::test]
    async fn edges_are_visible_to_stage_waiters() {
        let slot = Arc::new(ComponentSlot::new("b"));
        let reader = {
            let slot = slot.clone();
            tokio::spawn(async move {
                slot.wait_stage(ComponentLifetimeStage::Created, "reader")
                    .await
                    .unwrap();
                slot.dependencies()
            })
        };
        slot.add_it_depends_on("a").unwrap();
        slot.set_stage(ComponentLifetimeStage::Created);
        assert_eq!(timeout(WAIT, reader).await.unwrap().unwrap(), ["a"]);
    }

    #[tokio::test]
    async fn loaded_hook_failure_names_component() {
        let log = HookLog::default();
        let slot = ComponentSlot::new("db");
        slot.set_component(ComponentHandle::new(
            MockComponent::new("db", log.clone()).fail_on(Hook::AllComponentsLoaded),
        ))
        .unwrap();
        let err = slot.on_all_components_loaded().await.unwrap_err();
        assert!(err.to_string().contains("component db"));
    }

    #[tokio::test]
    async fn stopping_hook_failure_is_swallowed() {
        let log = HookLog::default();
        let slot = ComponentSlot::new("db");
        slot.set_component(ComponentHandle::new(
            MockComponent::new("db", log.clone()).fail_on(Hook::AllComponentsAreStopping),
        ))
        .unwrap();
        slot.on_all_components_are_stopping().await;
        assert_eq!(log.count("db", Hook::AllComponentsAreStopping), 1);
    }

    #[tokio::test]
    async fn hooks_without_instance_are_noops() {
        let slot = ComponentSlot::new("empty");
        slot.on_all_components_loaded().await.unwrap();
        slot.on_all_components_are_stopping().await;
        slot.clear_component().await;
    }
}
