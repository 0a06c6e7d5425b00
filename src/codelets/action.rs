//! Action codelets propose motor commands from perception or from the
//! shared plan.
//!
//! Both roles write into the input slot their target motor exposes for
//! them. A proposal's activation is the strongest bound drive (full
//! strength when the codelet has no motivational inputs). Returning no
//! command retracts the previous proposal, so a motor never acts on an
//! intent its producer has dropped.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::inputs::BoundInput;
use super::{publish, Codelet, CodeletCore, CodeletHeader, CodeletRole, Inputs, Wiring};
use crate::activation::CodeletStatus;
use crate::error::{CodeletError, MemoryError};
use crate::memory::MemoryObject;
use crate::models::{ActionHistory, ActionSequencePlan};

/// Everything an action-producing codelet sees on one tick.
#[derive(Debug, Clone, Default)]
pub struct ActionContext {
    pub percepts: Inputs,
    pub drives: Inputs,
    /// Shared plan, for codelets on the planning path.
    pub plan: Option<ActionSequencePlan>,
    /// Trailing action history, for behavior codelets.
    pub history: Option<ActionHistory>,
}

/// Produces a motor command. Shared by ActionFromPerception,
/// ActionFromPlanning and Behavior codelets.
pub trait ActionLogic: Send + 'static {
    fn propose(&mut self, context: &ActionContext) -> anyhow::Result<Option<Value>>;
}

impl<F> ActionLogic for F
where
    F: FnMut(&ActionContext) -> anyhow::Result<Option<Value>> + Send + 'static,
{
    fn propose(&mut self, context: &ActionContext) -> anyhow::Result<Option<Value>> {
        self(context)
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// The exclusive slot a producer writes its proposals into.
#[derive(Debug, Clone)]
pub(crate) struct ProposalSlot {
    memory: Arc<MemoryObject>,
}

impl ProposalSlot {
    pub fn new(memory: Arc<MemoryObject>) -> Self {
        Self { memory }
    }

    pub fn memory(&self) -> &Arc<MemoryObject> {
        &self.memory
    }

    pub fn propose(&self, command: Value, activation: f64) -> Result<bool, MemoryError> {
        let activation = self.memory.bounds().clamp(activation);
        publish(&self.memory, command, Some(activation))
    }

    /// Clear a pending proposal. No-op when the slot is already empty.
    pub fn retract(&self) -> Result<bool, MemoryError> {
        if self.memory.read().is_null() {
            return Ok(false);
        }
        self.memory
            .write_with_activation(Value::Null, self.memory.bounds().min)?;
        Ok(true)
    }
}

/// Strongest bound drive; full strength when nothing motivates the codelet.
pub(crate) fn drive_level(drives: &Inputs) -> f64 {
    drives.max_activation().unwrap_or(1.0)
}

pub(crate) fn read_plan(memory: &MemoryObject) -> Result<Option<ActionSequencePlan>, MemoryError> {
    let snapshot = memory.read();
    if snapshot.is_null() {
        return Ok(None);
    }
    snapshot.decode().map(Some)
}

pub(crate) fn read_history(memory: &MemoryObject) -> Result<ActionHistory, MemoryError> {
    let snapshot = memory.read();
    if snapshot.is_null() {
        return Ok(ActionHistory::default());
    }
    snapshot.decode()
}

/// Fields shared by both action declarations.
struct ActionDeclaration {
    header: CodeletHeader,
    label: String,
    perceptual_ids: Vec<String>,
    motivational_ids: Vec<String>,
    target_motor_id: String,
    logic: Box<dyn ActionLogic>,
}

impl ActionDeclaration {
    fn new(
        id: String,
        perceptual_ids: Vec<String>,
        motivational_ids: Vec<String>,
        target_motor_id: String,
        logic: Box<dyn ActionLogic>,
    ) -> Self {
        Self {
            label: id.clone(),
            header: CodeletHeader::new(id, 0.0),
            perceptual_ids,
            motivational_ids,
            target_motor_id,
            logic,
        }
    }

    fn bind(
        self,
        role: CodeletRole,
        percepts: Vec<BoundInput>,
        drives: Vec<BoundInput>,
        plan: Option<Arc<MemoryObject>>,
        slot: Arc<MemoryObject>,
        default_cadence: Duration,
    ) -> BoundAction {
        BoundAction {
            core: self.header.bind(default_cadence),
            role,
            label: self.label,
            percepts,
            drives,
            plan,
            slot: ProposalSlot::new(slot),
            logic: self.logic,
        }
    }
}

impl std::fmt::Debug for ActionDeclaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDeclaration")
            .field("header", &self.header)
            .field("label", &self.label)
            .field("perceptual_ids", &self.perceptual_ids)
            .field("motivational_ids", &self.motivational_ids)
            .field("target_motor_id", &self.target_motor_id)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// ActionFromPerception
// ---------------------------------------------------------------------------

/// Proposes a command directly from percepts and drives.
#[derive(Debug)]
pub struct ActionFromPerceptionCodelet {
    decl: ActionDeclaration,
}

impl ActionFromPerceptionCodelet {
    pub fn new(
        id: impl Into<String>,
        perceptual_ids: Vec<String>,
        motivational_ids: Vec<String>,
        target_motor_id: impl Into<String>,
        logic: impl ActionLogic,
    ) -> Self {
        Self {
            decl: ActionDeclaration::new(
                id.into(),
                perceptual_ids,
                motivational_ids,
                target_motor_id.into(),
                Box::new(logic),
            ),
        }
    }

    /// Label recorded in the action history when this codelet's command is
    /// effected. Defaults to the id.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.decl.label = label.into();
        self
    }

    pub fn with_cadence(mut self, cadence: Duration) -> Self {
        self.decl.header.cadence = Some(cadence);
        self
    }

    pub fn id(&self) -> &str {
        &self.decl.header.id
    }

    pub fn label(&self) -> &str {
        &self.decl.label
    }

    pub fn target_motor_id(&self) -> &str {
        &self.decl.target_motor_id
    }

    pub fn perceptual_ids(&self) -> &[String] {
        &self.decl.perceptual_ids
    }

    pub fn motivational_ids(&self) -> &[String] {
        &self.decl.motivational_ids
    }

    pub(crate) fn bind(
        self,
        percepts: Vec<BoundInput>,
        drives: Vec<BoundInput>,
        slot: Arc<MemoryObject>,
        default_cadence: Duration,
    ) -> BoundAction {
        self.decl.bind(
            CodeletRole::ActionFromPerception,
            percepts,
            drives,
            None,
            slot,
            default_cadence,
        )
    }
}

// ---------------------------------------------------------------------------
// ActionFromPlanning
// ---------------------------------------------------------------------------

/// Proposes a command while the shared plan's current step is this
/// codelet's label.
#[derive(Debug)]
pub struct ActionFromPlanningCodelet {
    decl: ActionDeclaration,
}

impl ActionFromPlanningCodelet {
    pub fn new(
        id: impl Into<String>,
        perceptual_ids: Vec<String>,
        target_motor_id: impl Into<String>,
        logic: impl ActionLogic,
    ) -> Self {
        Self {
            decl: ActionDeclaration::new(
                id.into(),
                perceptual_ids,
                Vec::new(),
                target_motor_id.into(),
                Box::new(logic),
            ),
        }
    }

    pub fn with_motivational_ids(mut self, motivational_ids: Vec<String>) -> Self {
        self.decl.motivational_ids = motivational_ids;
        self
    }

    /// Plan step this codelet executes. Defaults to the id.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.decl.label = label.into();
        self
    }

    pub fn with_cadence(mut self, cadence: Duration) -> Self {
        self.decl.header.cadence = Some(cadence);
        self
    }

    pub fn id(&self) -> &str {
        &self.decl.header.id
    }

    pub fn label(&self) -> &str {
        &self.decl.label
    }

    pub fn target_motor_id(&self) -> &str {
        &self.decl.target_motor_id
    }

    pub fn perceptual_ids(&self) -> &[String] {
        &self.decl.perceptual_ids
    }

    pub fn motivational_ids(&self) -> &[String] {
        &self.decl.motivational_ids
    }

    pub(crate) fn bind(
        self,
        percepts: Vec<BoundInput>,
        drives: Vec<BoundInput>,
        plan: Arc<MemoryObject>,
        slot: Arc<MemoryObject>,
        default_cadence: Duration,
    ) -> BoundAction {
        self.decl.bind(
            CodeletRole::ActionFromPlanning,
            percepts,
            drives,
            Some(plan),
            slot,
            default_cadence,
        )
    }
}

// ---------------------------------------------------------------------------
// Bound action codelet
// ---------------------------------------------------------------------------

pub(crate) struct BoundAction {
    core: CodeletCore,
    role: CodeletRole,
    label: String,
    percepts: Vec<BoundInput>,
    drives: Vec<BoundInput>,
    plan: Option<Arc<MemoryObject>>,
    slot: ProposalSlot,
    logic: Box<dyn ActionLogic>,
}

impl BoundAction {
    fn stand_down(&self) -> Result<(), CodeletError> {
        if self.slot.retract()? {
            tracing::debug!(codelet = %self.core.id, "proposal retracted");
        }
        self.core.status.set_activation(0.0);
        Ok(())
    }
}

impl Codelet for BoundAction {
    fn id(&self) -> &str {
        &self.core.id
    }

    fn role(&self) -> CodeletRole {
        self.role
    }

    fn cadence(&self) -> Duration {
        self.core.cadence
    }

    fn status(&self) -> &Arc<CodeletStatus> {
        &self.core.status
    }

    fn wiring(&self) -> Wiring {
        Wiring {
            inputs: self
                .percepts
                .iter()
                .chain(&self.drives)
                .map(|i| Arc::clone(&i.memory))
                .collect(),
            broadcasts: self.plan.iter().cloned().collect(),
            outputs: vec![Arc::clone(self.slot.memory())],
        }
    }

    fn tick(&mut self) -> Result<(), CodeletError> {
        let percepts = Inputs::read(&self.percepts);
        let drives = Inputs::read(&self.drives);
        if !percepts.ready() || !drives.ready() {
            return Ok(());
        }

        let plan = match &self.plan {
            Some(memory) => {
                let plan = read_plan(memory)?;
                let my_turn = plan
                    .as_ref()
                    .and_then(ActionSequencePlan::current_step)
                    .is_some_and(|step| step == self.label);
                if !my_turn {
                    return self.stand_down();
                }
                plan
            }
            None => None,
        };

        let level = drive_level(&drives);
        let context = ActionContext {
            percepts,
            drives,
            plan,
            history: None,
        };
        let proposal = self
            .logic
            .propose(&context)
            .map_err(|e| CodeletError::logic(&self.core.id, e))?;

        match proposal {
            Some(command) => {
                if self.slot.propose(command, level)? {
                    tracing::debug!(codelet = %self.core.id, activation = level, "command proposed");
                }
                self.core.status.set_activation(level);
                Ok(())
            }
            None => self.stand_down(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::activation::ActivationBounds;

    fn memory(name: &str) -> Arc<MemoryObject> {
        Arc::new(MemoryObject::new(name, ActivationBounds::UNIT))
    }

    fn describe_dog(context: &ActionContext) -> anyhow::Result<Option<Value>> {
        Ok(context
            .percepts
            .latest()
            .map(|_| json!("Test1ActionFromPerception - A black dog")))
    }

    #[test]
    fn test_action_from_perception_proposes_with_drive_activation() {
        let percept = memory("percept:p");
        let drive = Arc::new(MemoryObject::new(
            "drive:m",
            ActivationBounds::new(0.0, 0.5, 0.9).unwrap(),
        ));
        let slot = memory("motor:arm/act");

        let declaration = ActionFromPerceptionCodelet::new(
            "act",
            vec!["p".into()],
            vec!["m".into()],
            "arm",
            describe_dog,
        );
        assert_eq!(declaration.label(), "act");
        assert_eq!(declaration.target_motor_id(), "arm");
        let mut codelet = declaration.bind(
            vec![BoundInput::new("p", Arc::clone(&percept))],
            vec![BoundInput::new("m", Arc::clone(&drive))],
            Arc::clone(&slot),
            Duration::from_millis(10),
        );

        codelet.tick().unwrap();
        assert!(!slot.read().is_written());

        percept.write(json!("Something")).unwrap();
        drive.write_with_activation(json!(0.6), 0.6).unwrap();
        codelet.tick().unwrap();

        let proposal = slot.read();
        assert_eq!(proposal.as_str(), Some("Test1ActionFromPerception - A black dog"));
        assert_eq!(proposal.activation, 0.6);
        assert_eq!(codelet.status().activation(), 0.6);
    }

    #[test]
    fn test_action_retracts_when_logic_declines() {
        let percept = memory("percept:p");
        let slot = memory("motor:arm/act");
        let mut codelet = ActionFromPerceptionCodelet::new(
            "act",
            vec!["p".into()],
            vec![],
            "arm",
            |context: &ActionContext| -> anyhow::Result<Option<Value>> {
                Ok(context
                    .percepts
                    .get("p")
                    .and_then(|s| s.as_str())
                    .filter(|text| *text == "dog")
                    .map(|_| json!("bark")))
            },
        )
        .bind(
            vec![BoundInput::new("p", Arc::clone(&percept))],
            vec![],
            Arc::clone(&slot),
            Duration::from_millis(10),
        );

        percept.write(json!("dog")).unwrap();
        codelet.tick().unwrap();
        assert_eq!(slot.read().as_str(), Some("bark"));
        assert_eq!(slot.activation(), 1.0);

        percept.write(json!("cat")).unwrap();
        codelet.tick().unwrap();
        assert!(slot.read().is_null());
        assert_eq!(slot.activation(), 0.0);
    }

    #[test]
    fn test_action_from_planning_waits_for_its_step() {
        let plan = memory("mind:action_plan");
        let slot = memory("motor:arm/step2");
        let mut codelet = ActionFromPlanningCodelet::new(
            "step2",
            vec![],
            "arm",
            |context: &ActionContext| -> anyhow::Result<Option<Value>> {
                let step = context.plan.as_ref().and_then(|p| p.current_step()).unwrap_or("?");
                Ok(Some(json!(format!("execute {step}"))))
            },
        )
        .with_label("Test2")
        .bind(vec![], vec![], Arc::clone(&plan), Arc::clone(&slot), Duration::from_millis(10));

        // No plan at all.
        codelet.tick().unwrap();
        assert!(slot.read().is_null());

        let mut sequence = ActionSequencePlan::new(["Test1", "Test2"]);
        plan.write(serde_json::to_value(&sequence).unwrap()).unwrap();
        codelet.tick().unwrap();
        assert!(slot.read().is_null());

        sequence.advance();
        plan.write(serde_json::to_value(&sequence).unwrap()).unwrap();
        codelet.tick().unwrap();
        assert_eq!(slot.read().as_str(), Some("execute Test2"));

        sequence.advance();
        plan.write(serde_json::to_value(&sequence).unwrap()).unwrap();
        codelet.tick().unwrap();
        assert!(slot.read().is_null());
        assert_eq!(codelet.wiring().broadcasts.len(), 1);
    }

    #[test]
    fn test_logic_error_is_reported() {
        let slot = memory("motor:arm/act");
        let mut codelet = ActionFromPerceptionCodelet::new(
            "act",
            vec![],
            vec![],
            "arm",
            |_: &ActionContext| -> anyhow::Result<Option<Value>> {
                anyhow::bail!("no effector model")
            },
        )
        .bind(vec![], vec![], Arc::clone(&slot), Duration::from_millis(10));

        let err = codelet.tick().unwrap_err();
        assert!(err.to_string().contains("no effector model"));
        assert!(!slot.read().is_written());
    }
}
