//! [`Mind`] owns every codelet and memory object and drives their loops
//! as a unit.

use std::collections::BTreeMap;
use std::fmt;

use tokio::runtime::{Builder, Runtime};
use tokio::sync::watch;
use uuid::Uuid;

use super::inspect::{CodeletHandle, Inspector};
use super::mount::{self, Declarations};
use super::{runner, MindState};
use crate::codelets::{
    ActionFromPerceptionCodelet, ActionFromPlanningCodelet, BehaviorCodelet, Codelet,
    MotivationalCodelet, MotorCodelet, PerceptualCodelet, SensoryCodelet, SensoryInput,
};
use crate::config::MindConfig;
use crate::error::{MemoryError, MindError};
use crate::memory::{names, MemoryRegistry, MemorySnapshot};
use crate::models::ActionSequencePlan;

/// A complete cognitive pipeline.
///
/// Client code hands role-partitioned codelet declarations to the mind,
/// then calls [`mount`](Self::mount), [`start`](Self::start) and finally
/// [`shut_down`](Self::shut_down). Dropping a mind shuts it down.
///
/// `start` builds a dedicated multi-threaded tokio runtime and
/// `shut_down` (and therefore `drop`) stops it, so a mind must be
/// started and dropped outside of an async context.
pub struct Mind {
    id: Uuid,
    config: MindConfig,
    state: MindState,
    declarations: Declarations,
    registry: MemoryRegistry,
    handles: Vec<CodeletHandle>,
    /// Bound codelets waiting for `start`.
    pending: Vec<Box<dyn Codelet>>,
    sensory_inputs: BTreeMap<String, SensoryInput>,
    runtime: Option<Runtime>,
    shutdown: Option<watch::Sender<bool>>,
}

impl Default for Mind {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Mind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mind")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("codelets", &self.codelet_ids())
            .field("memories", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl Mind {
    pub fn new() -> Self {
        Self::with_config(MindConfig::default())
    }

    pub fn with_config(config: MindConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            state: MindState::Unmounted,
            declarations: Declarations::default(),
            registry: MemoryRegistry::new(),
            handles: Vec::new(),
            pending: Vec::new(),
            sensory_inputs: BTreeMap::new(),
            runtime: None,
            shutdown: None,
        }
    }

    // -----------------------------------------------------------------------
    // Declarations
    // -----------------------------------------------------------------------

    fn declarations_mut(&mut self) -> Result<&mut Declarations, MindError> {
        self.expect_state(MindState::Unmounted, "configure")?;
        Ok(&mut self.declarations)
    }

    pub fn set_sensory_codelets(&mut self, codelets: Vec<SensoryCodelet>) -> Result<(), MindError> {
        self.declarations_mut()?.sensory = codelets;
        Ok(())
    }

    pub fn set_perceptual_codelets(
        &mut self,
        codelets: Vec<PerceptualCodelet>,
    ) -> Result<(), MindError> {
        self.declarations_mut()?.perceptual = codelets;
        Ok(())
    }

    pub fn set_motivational_codelets(
        &mut self,
        codelets: Vec<MotivationalCodelet>,
    ) -> Result<(), MindError> {
        self.declarations_mut()?.motivational = codelets;
        Ok(())
    }

    pub fn set_action_from_perception_codelets(
        &mut self,
        codelets: Vec<ActionFromPerceptionCodelet>,
    ) -> Result<(), MindError> {
        self.declarations_mut()?.action_from_perception = codelets;
        Ok(())
    }

    pub fn set_action_from_planning_codelets(
        &mut self,
        codelets: Vec<ActionFromPlanningCodelet>,
    ) -> Result<(), MindError> {
        self.declarations_mut()?.action_from_planning = codelets;
        Ok(())
    }

    pub fn set_behavior_codelets(&mut self, codelets: Vec<BehaviorCodelet>) -> Result<(), MindError> {
        self.declarations_mut()?.behavior = codelets;
        Ok(())
    }

    pub fn set_motor_codelets(&mut self, codelets: Vec<MotorCodelet>) -> Result<(), MindError> {
        self.declarations_mut()?.motor = codelets;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    fn expect_state(&self, expected: MindState, operation: &'static str) -> Result<(), MindError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(MindError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    /// Resolve every declared dependency and build the memory registry.
    ///
    /// All or nothing: on error the mind stays `Unmounted` with its
    /// declarations intact.
    pub fn mount(&mut self) -> Result<(), MindError> {
        self.expect_state(MindState::Unmounted, "mount")?;

        let plan = mount::plan(&self.declarations, &self.config).inspect_err(|e| {
            tracing::warn!(mind = %self.id, error = %e, "mount failed");
        })?;
        let mounted = plan.bind(std::mem::take(&mut self.declarations));

        self.handles = mounted
            .codelets
            .iter()
            .map(|codelet| CodeletHandle::of(codelet.as_ref()))
            .collect();
        self.pending = mounted.codelets;
        self.registry = mounted.registry;
        self.sensory_inputs = mounted.sensory_inputs;
        self.state = MindState::Mounted;

        tracing::info!(
            mind = %self.id,
            codelets = self.handles.len(),
            memories = self.registry.len(),
            "mind mounted"
        );
        Ok(())
    }

    /// Launch one loop per codelet. Loops share the async workers; each
    /// tick runs on the blocking pool.
    pub fn start(&mut self) -> Result<(), MindError> {
        self.expect_state(MindState::Mounted, "start")?;

        let mut builder = Builder::new_multi_thread();
        builder.thread_name("meca-codelet").enable_all();
        if let Some(threads) = self.config.worker_threads {
            builder.worker_threads(threads);
        }
        let runtime = builder.build()?;

        let (tx, rx) = watch::channel(false);
        let span = tracing::info_span!("mind", run = %self.id);
        for codelet in self.pending.drain(..) {
            runtime.spawn(runner::run(codelet, rx.clone(), span.clone()));
        }

        self.runtime = Some(runtime);
        self.shutdown = Some(tx);
        self.state = MindState::Running;
        tracing::info!(mind = %self.id, codelets = self.handles.len(), "mind started");
        Ok(())
    }

    /// Stop every loop and close every memory object.
    ///
    /// Once this returns no memory object accepts a write. Valid in any
    /// state; calling it again is a no-op.
    pub fn shut_down(&mut self) -> Result<(), MindError> {
        if self.state == MindState::ShutDown {
            tracing::debug!(mind = %self.id, "mind already shut down");
            return Ok(());
        }

        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(true);
        }
        self.registry.close_all();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(self.config.shutdown_grace());
        }
        self.pending.clear();

        let previous = std::mem::replace(&mut self.state, MindState::ShutDown);
        tracing::info!(mind = %self.id, from = %previous, "mind shut down");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> MindState {
        self.state
    }

    pub fn config(&self) -> &MindConfig {
        &self.config
    }

    /// Empty until mounted.
    pub fn registry(&self) -> &MemoryRegistry {
        &self.registry
    }

    pub fn memory(&self, name: &str) -> Option<MemorySnapshot> {
        self.registry.read(name)
    }

    /// Push handle of a sensory codelet, available before and after mounting.
    pub fn sensory_input(&self, id: &str) -> Option<SensoryInput> {
        self.sensory_inputs.get(id).cloned().or_else(|| {
            self.declarations
                .sensory
                .iter()
                .find(|codelet| codelet.id() == id)
                .map(SensoryCodelet::input)
        })
    }

    /// Declared ids before mounting, mounted ids afterwards.
    pub fn codelet_ids(&self) -> Vec<&str> {
        if self.handles.is_empty() {
            self.declarations.ids().collect()
        } else {
            self.handles.iter().map(CodeletHandle::id).collect()
        }
    }

    pub fn codelet(&self, id: &str) -> Option<&CodeletHandle> {
        self.handles.iter().find(|handle| handle.id() == id)
    }

    /// Replace the shared plan followed by ActionFromPlanning codelets.
    pub fn submit_plan(&self, plan: &ActionSequencePlan) -> Result<(), MindError> {
        let Some(memory) = self.registry.get(names::ACTION_PLAN) else {
            return Err(MindError::InvalidState {
                operation: "submit a plan to",
                state: self.state,
            });
        };
        let value = serde_json::to_value(plan).map_err(|source| MemoryError::Decode {
            name: memory.name().to_string(),
            source,
        })?;
        memory.write(value)?;
        tracing::info!(mind = %self.id, steps = ?plan.steps(), "plan submitted");
        Ok(())
    }

    /// Read-only view over the listed codelets.
    pub fn inspector(&self, ids: &[&str]) -> Result<Inspector<'_>, MindError> {
        let handles = ids
            .iter()
            .map(|id| {
                self.codelet(id)
                    .ok_or_else(|| MindError::UnknownCodelet(id.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Inspector::new(self, handles))
    }
}

impl Drop for Mind {
    fn drop(&mut self) {
        let _ = self.shut_down();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use serde_json::{json, Value};

    use super::*;
    use crate::codelets::{ActionContext, Inputs, NoopEffector};
    use crate::models::ActionHistory;

    const SENSORY: &str = "TestSensoryCodelet";
    const PERCEPTUAL: &str = "TestPerceptualCodelet";
    const MOTIVATIONAL: &str = "TestMotivationalCodelet";
    const FROM_PERCEPTION: &str = "Test1ActionFromPerceptionCodelet";
    const PLAN_STEP_1: &str = "Test1ActionFromPlanningCodelet";
    const PLAN_STEP_2: &str = "Test2ActionFromPlanningCodelets";
    const BEHAVIOR: &str = "Test1AndTest2BehaviorCodelet";
    const MOTOR: &str = "TestMotorCodelet";

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    fn black_dog(context: &ActionContext) -> anyhow::Result<Option<Value>> {
        Ok(context
            .percepts
            .latest()
            .map(|_| json!("Test1ActionFromPerception - A black dog")))
    }

    fn say(text: &'static str) -> impl FnMut(&ActionContext) -> anyhow::Result<Option<Value>> + Send {
        move |_: &ActionContext| -> anyhow::Result<Option<Value>> { Ok(Some(json!(text))) }
    }

    fn fast() -> MindConfig {
        MindConfig {
            default_cadence_ms: 5,
            worker_threads: Some(2),
            ..MindConfig::default()
        }
    }

    fn test_mind() -> Mind {
        let mut mind = Mind::with_config(fast());
        mind.set_sensory_codelets(vec![SensoryCodelet::pass_through(SENSORY)])
            .unwrap();
        mind.set_perceptual_codelets(vec![PerceptualCodelet::pass_through(
            PERCEPTUAL,
            ids(&[SENSORY]),
        )])
        .unwrap();
        mind.set_motivational_codelets(vec![MotivationalCodelet::new(
            MOTIVATIONAL,
            0.0,
            0.5,
            0.9,
            ids(&[SENSORY]),
            |_: &Inputs, current: f64| -> anyhow::Result<f64> { Ok(current) },
        )
        .unwrap()])
        .unwrap();
        mind.set_action_from_perception_codelets(vec![ActionFromPerceptionCodelet::new(
            FROM_PERCEPTION,
            ids(&[PERCEPTUAL]),
            ids(&[MOTIVATIONAL]),
            MOTOR,
            black_dog,
        )
        .with_label("Test1")])
        .unwrap();
        mind.set_action_from_planning_codelets(vec![
            ActionFromPlanningCodelet::new(PLAN_STEP_1, ids(&[PERCEPTUAL]), MOTOR, say("plan step 1"))
                .with_label("Test1"),
            ActionFromPlanningCodelet::new(PLAN_STEP_2, ids(&[PERCEPTUAL]), MOTOR, say("plan step 2"))
                .with_label("Test2"),
        ])
        .unwrap();
        mind.set_behavior_codelets(vec![BehaviorCodelet::new(
            BEHAVIOR,
            ids(&[PERCEPTUAL]),
            ids(&[MOTIVATIONAL]),
            None,
            ActionSequencePlan::new(["Test1", "Test2"]),
            say("Test1 then Test2 observed"),
        )])
        .unwrap();
        mind.set_motor_codelets(vec![MotorCodelet::new(MOTOR, NoopEffector)])
            .unwrap();
        mind
    }

    #[test]
    fn test_end_to_end_action_from_perception() {
        let mut mind = test_mind();
        mind.mount().unwrap();
        mind.start().unwrap();
        assert_eq!(mind.state(), MindState::Running);

        mind.sensory_input(SENSORY).unwrap().push("Something");

        let slot = names::motor_input(MOTOR, FROM_PERCEPTION);
        let reached = wait_until(Duration::from_secs(5), || {
            mind.memory(&slot)
                .and_then(|s| s.as_str().map(str::to_owned))
                .is_some_and(|text| text == "Test1ActionFromPerception - A black dog")
        });
        assert!(reached, "motor input never received the command");
        assert!(wait_until(Duration::from_secs(5), || {
            mind.memory(&names::effector(MOTOR))
                .is_some_and(|s| s.as_str() == Some("Test1ActionFromPerception - A black dog"))
        }));

        mind.shut_down().unwrap();
        assert_eq!(mind.state(), MindState::ShutDown);

        let memory = mind.registry().get(&slot).unwrap();
        assert!(memory.write(json!("late")).is_err());
        let frozen: Vec<MemorySnapshot> = mind.registry().snapshot();
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(mind.registry().snapshot(), frozen);
    }

    #[test]
    fn test_planning_path_feeds_behavior() {
        let mut mind = test_mind();
        mind.mount().unwrap();
        mind.start().unwrap();
        mind.sensory_input(SENSORY).unwrap().push("Something");

        // Let the perception-driven command land in the history first.
        assert!(wait_until(Duration::from_secs(5), || {
            mind.memory(&names::effector(MOTOR))
                .is_some_and(|s| s.is_written())
        }));
        mind.submit_plan(&ActionSequencePlan::new(["Test1", "Test2"]))
            .unwrap();

        let behavior = names::behavior(BEHAVIOR);
        assert!(wait_until(Duration::from_secs(5), || {
            mind.memory(&behavior)
                .is_some_and(|s| s.as_str() == Some("Test1 then Test2 observed"))
        }));

        let history: ActionHistory = mind.memory(names::ACTION_HISTORY).unwrap().decode().unwrap();
        let labels = history.labels();
        assert_eq!(labels[labels.len() - 2..], ["Test1", "Test2"]);
        let plan: ActionSequencePlan = mind.memory(names::ACTION_PLAN).unwrap().decode().unwrap();
        assert!(plan.is_complete());

        let snapshot = mind.inspector(&[BEHAVIOR, MOTOR]).unwrap().snapshot();
        assert_eq!(snapshot[0].outputs[0].name, behavior);
        assert!(snapshot[1].ticks > 0);
        mind.shut_down().unwrap();
    }

    #[test]
    fn test_hung_codelet_stalls_only_its_own_branch() {
        let released = Arc::new(AtomicBool::new(false));
        let mut mind = Mind::with_config(MindConfig {
            default_cadence_ms: 5,
            worker_threads: Some(1),
            shutdown_grace_ms: 50,
            ..MindConfig::default()
        });

        let stuck = {
            let released = Arc::clone(&released);
            SensoryCodelet::new("stuck", move |_: Option<&Value>| -> anyhow::Result<Option<Value>> {
                while !released.load(Ordering::SeqCst) {
                    std::thread::sleep(Duration::from_millis(5));
                }
                Ok(None)
            })
        };
        mind.set_sensory_codelets(vec![stuck, SensoryCodelet::pass_through("eye")])
            .unwrap();
        mind.set_perceptual_codelets(vec![PerceptualCodelet::pass_through("scene", ids(&["eye"]))])
            .unwrap();
        mind.set_action_from_perception_codelets(vec![ActionFromPerceptionCodelet::new(
            "act",
            ids(&["scene"]),
            vec![],
            "arm",
            say("go"),
        )])
        .unwrap();
        mind.set_motor_codelets(vec![MotorCodelet::new("arm", NoopEffector)])
            .unwrap();
        mind.mount().unwrap();
        mind.start().unwrap();

        mind.sensory_input("eye").unwrap().push("light");
        let reached = wait_until(Duration::from_secs(5), || {
            mind.memory(&names::effector("arm"))
                .is_some_and(|s| s.as_str() == Some("go"))
        });
        released.store(true, Ordering::SeqCst);
        mind.shut_down().unwrap();

        assert!(reached, "healthy branch never reached its effector");
    }

    #[test]
    fn test_unresolved_dependency_leaves_mind_unmounted() {
        let mut mind = test_mind();
        mind.set_perceptual_codelets(vec![PerceptualCodelet::pass_through(
            PERCEPTUAL,
            ids(&["MissingSensoryCodelet"]),
        )])
        .unwrap();

        let err = mind.mount().unwrap_err();
        assert!(matches!(
            err,
            MindError::UnresolvedDependency { ref codelet, ref dependency }
                if codelet == PERCEPTUAL && dependency == "MissingSensoryCodelet"
        ));
        assert_eq!(mind.state(), MindState::Unmounted);
        assert!(mind.registry().is_empty());
        assert_eq!(mind.codelet_ids().len(), 8);
        assert!(matches!(mind.start(), Err(MindError::InvalidState { .. })));

        // Fixing the declaration makes the same mind mountable.
        mind.set_perceptual_codelets(vec![PerceptualCodelet::pass_through(
            PERCEPTUAL,
            ids(&[SENSORY]),
        )])
        .unwrap();
        mind.mount().unwrap();
        assert_eq!(mind.state(), MindState::Mounted);
    }

    #[test]
    fn test_mount_binds_every_input() {
        let mut mind = test_mind();
        mind.mount().unwrap();
        assert_eq!(mind.state(), MindState::Mounted);
        assert_eq!(mind.codelet_ids().len(), 8);

        let motor = mind.codelet(MOTOR).unwrap();
        let inputs: Vec<&str> = motor.wiring().inputs.iter().map(|m| m.name()).collect();
        assert_eq!(
            inputs,
            vec![
                "motor:TestMotorCodelet/Test1ActionFromPerceptionCodelet",
                "motor:TestMotorCodelet/Test1ActionFromPlanningCodelet",
                "motor:TestMotorCodelet/Test2ActionFromPlanningCodelets",
            ]
        );

        let action = mind.codelet(FROM_PERCEPTION).unwrap();
        let bound: Vec<&str> = action.wiring().inputs.iter().map(|m| m.name()).collect();
        assert_eq!(bound, vec!["percept:TestPerceptualCodelet", "drive:TestMotivationalCodelet"]);
        for name in bound {
            assert!(mind.registry().contains(name));
        }

        let drive = mind.memory("drive:TestMotivationalCodelet").unwrap();
        assert_eq!(drive.activation, 0.5);
        assert!(!drive.is_written());

        let json = mind.inspector(&[FROM_PERCEPTION]).unwrap().to_json().unwrap();
        assert!(json.contains("\"state\": \"mounted\""));
        assert!(matches!(
            mind.inspector(&["Nobody"]),
            Err(MindError::UnknownCodelet(ref id)) if id == "Nobody"
        ));
    }

    #[test]
    fn test_lifecycle_guards() {
        let mut mind = test_mind();
        assert!(matches!(
            mind.start(),
            Err(MindError::InvalidState { operation: "start", state: MindState::Unmounted })
        ));
        assert!(mind.submit_plan(&ActionSequencePlan::new(["Test1"])).is_err());

        mind.mount().unwrap();
        assert!(matches!(mind.mount(), Err(MindError::InvalidState { .. })));
        assert!(mind.set_motor_codelets(vec![]).is_err());

        mind.start().unwrap();
        assert!(matches!(mind.start(), Err(MindError::InvalidState { .. })));

        mind.shut_down().unwrap();
        mind.shut_down().unwrap();
        assert_eq!(mind.state(), MindState::ShutDown);
        assert!(matches!(mind.start(), Err(MindError::InvalidState { .. })));
        assert!(matches!(
            mind.submit_plan(&ActionSequencePlan::new(["Test1"])),
            Err(MindError::Memory(MemoryError::MemoryClosed { .. }))
        ));
    }

    #[test]
    fn test_duplicate_codelet_id_is_rejected() {
        let mut mind = test_mind();
        mind.set_motor_codelets(vec![
            MotorCodelet::new(MOTOR, NoopEffector),
            MotorCodelet::new(MOTOR, NoopEffector),
        ])
        .unwrap();
        assert!(matches!(
            mind.mount(),
            Err(MindError::DuplicateCodeletId(ref id)) if id == MOTOR
        ));
        assert_eq!(mind.state(), MindState::Unmounted);
    }

    #[test]
    fn test_shut_down_without_start() {
        let mut mind = test_mind();
        mind.mount().unwrap();
        mind.shut_down().unwrap();
        assert_eq!(mind.state(), MindState::ShutDown);
        assert!(mind
            .registry()
            .get(names::ACTION_HISTORY)
            .unwrap()
            .write(json!(null))
            .is_err());
    }
}
