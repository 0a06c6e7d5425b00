//! Behavior codelets fire when the recent actions match a learned plan.
//!
//! A behavior watches the action history broadcast. When the trailing
//! labels equal its plan and its drives reach the threshold, it proposes a
//! command, either to its target motor or, without one, to its own
//! `behavior:<id>` output. It fires at most once per history state.

use std::sync::Arc;
use std::time::Duration;

use super::action::{drive_level, read_history, ActionContext, ActionLogic, ProposalSlot};
use super::inputs::BoundInput;
use super::{Codelet, CodeletCore, CodeletHeader, CodeletRole, Inputs, Wiring};
use crate::activation::CodeletStatus;
use crate::error::CodeletError;
use crate::memory::MemoryObject;
use crate::models::ActionSequencePlan;

pub struct BehaviorCodelet {
    pub(crate) header: CodeletHeader,
    label: String,
    perceptual_ids: Vec<String>,
    motivational_ids: Vec<String>,
    target_motor_id: Option<String>,
    plan: ActionSequencePlan,
    drive_threshold: f64,
    logic: Box<dyn ActionLogic>,
}

impl BehaviorCodelet {
    pub fn new(
        id: impl Into<String>,
        perceptual_ids: Vec<String>,
        motivational_ids: Vec<String>,
        target_motor_id: Option<String>,
        plan: ActionSequencePlan,
        logic: impl ActionLogic,
    ) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            header: CodeletHeader::new(id, 0.0),
            perceptual_ids,
            motivational_ids,
            target_motor_id,
            plan,
            drive_threshold: 0.0,
            logic: Box::new(logic),
        }
    }

    /// Minimum drive level required to fire.
    pub fn with_drive_threshold(mut self, threshold: f64) -> Self {
        self.drive_threshold = threshold;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_cadence(mut self, cadence: Duration) -> Self {
        self.header.cadence = Some(cadence);
        self
    }

    pub fn id(&self) -> &str {
        &self.header.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn perceptual_ids(&self) -> &[String] {
        &self.perceptual_ids
    }

    pub fn motivational_ids(&self) -> &[String] {
        &self.motivational_ids
    }

    pub fn plan(&self) -> &ActionSequencePlan {
        &self.plan
    }

    pub fn target_motor_id(&self) -> Option<&str> {
        self.target_motor_id.as_deref()
    }

    pub(crate) fn bind(
        self,
        percepts: Vec<BoundInput>,
        drives: Vec<BoundInput>,
        history: Arc<MemoryObject>,
        slot: Arc<MemoryObject>,
        default_cadence: Duration,
    ) -> BoundBehavior {
        BoundBehavior {
            core: self.header.bind(default_cadence),
            percepts,
            drives,
            history,
            slot: ProposalSlot::new(slot),
            plan: self.plan,
            drive_threshold: self.drive_threshold,
            fired_at: None,
            logic: self.logic,
        }
    }
}

impl std::fmt::Debug for BehaviorCodelet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviorCodelet")
            .field("header", &self.header)
            .field("label", &self.label)
            .field("plan", &self.plan)
            .field("target_motor_id", &self.target_motor_id)
            .field("drive_threshold", &self.drive_threshold)
            .finish_non_exhaustive()
    }
}

pub(crate) struct BoundBehavior {
    core: CodeletCore,
    percepts: Vec<BoundInput>,
    drives: Vec<BoundInput>,
    history: Arc<MemoryObject>,
    slot: ProposalSlot,
    plan: ActionSequencePlan,
    drive_threshold: f64,
    /// History sequence the behavior last fired on.
    fired_at: Option<u64>,
    logic: Box<dyn ActionLogic>,
}

impl Codelet for BoundBehavior {
    fn id(&self) -> &str {
        &self.core.id
    }

    fn role(&self) -> CodeletRole {
        CodeletRole::Behavior
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
            broadcasts: vec![Arc::clone(&self.history)],
            outputs: vec![Arc::clone(self.slot.memory())],
        }
    }

    fn tick(&mut self) -> Result<(), CodeletError> {
        let percepts = Inputs::read(&self.percepts);
        let drives = Inputs::read(&self.drives);
        if !percepts.ready() || !drives.ready() {
            return Ok(());
        }

        let history = read_history(&self.history)?;
        if !self.plan.matches_tail(&history.labels()) {
            if self.slot.retract()? {
                tracing::debug!(codelet = %self.core.id, "plan no longer matches, proposal retracted");
            }
            self.core.status.set_activation(0.0);
            return Ok(());
        }
        if self.fired_at == Some(history.last_seq()) {
            return Ok(());
        }

        let level = drive_level(&drives);
        if level < self.drive_threshold {
            tracing::debug!(
                codelet = %self.core.id,
                level,
                threshold = self.drive_threshold,
                "plan matched below drive threshold"
            );
            return Ok(());
        }

        let context = ActionContext {
            percepts,
            drives,
            plan: Some(self.plan.clone()),
            history: Some(history.clone()),
        };
        let proposal = self
            .logic
            .propose(&context)
            .map_err(|e| CodeletError::logic(&self.core.id, e))?;

        self.fired_at = Some(history.last_seq());
        match proposal {
            Some(command) => {
                self.slot.propose(command, level)?;
                self.core.status.set_activation(level);
                tracing::info!(
                    codelet = %self.core.id,
                    plan = ?self.plan.steps(),
                    activation = level,
                    "behavior fired"
                );
            }
            None => {
                self.slot.retract()?;
                self.core.status.set_activation(0.0);
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::activation::ActivationBounds;
    use crate::models::ActionHistory;

    fn memory(name: &str) -> Arc<MemoryObject> {
        Arc::new(MemoryObject::new(name, ActivationBounds::UNIT))
    }

    fn record(history: &MemoryObject, labels: &[&str]) {
        let mut actions = ActionHistory::new(8);
        for label in labels {
            actions.push(*label, "test");
        }
        history.write(serde_json::to_value(&actions).unwrap()).unwrap();
    }

    fn greeting(context: &ActionContext) -> anyhow::Result<Option<Value>> {
        let tail = context.history.as_ref().map(|h| h.labels().join(",")).unwrap_or_default();
        Ok(Some(json!(format!("after {tail}"))))
    }

    fn behavior(history: &Arc<MemoryObject>, slot: &Arc<MemoryObject>, drives: Vec<BoundInput>) -> BoundBehavior {
        BehaviorCodelet::new(
            "Test1AndTest2Behavior",
            vec![],
            vec![],
            None,
            ActionSequencePlan::new(["Test1", "Test2"]),
            greeting,
        )
        .with_drive_threshold(0.5)
        .bind(vec![], drives, Arc::clone(history), Arc::clone(slot), Duration::from_millis(10))
    }

    #[test]
    fn test_fires_on_matching_tail_only() {
        let history = memory("mind:action_history");
        let slot = memory("behavior:b");
        let mut codelet = behavior(&history, &slot, vec![]);

        codelet.tick().unwrap();
        assert!(!slot.read().is_written());

        record(&history, &["Test2", "Test1"]);
        codelet.tick().unwrap();
        assert!(!slot.read().is_written());

        record(&history, &["Test0", "Test1", "Test2"]);
        codelet.tick().unwrap();
        assert_eq!(slot.read().as_str(), Some("after Test0,Test1,Test2"));
        assert_eq!(codelet.status().activation(), 1.0);
    }

    #[test]
    fn test_fires_once_per_history_state() {
        let history = memory("mind:action_history");
        let slot = memory("behavior:b");
        let mut codelet = behavior(&history, &slot, vec![]);

        record(&history, &["Test1", "Test2"]);
        codelet.tick().unwrap();
        let first = slot.version();
        slot.write(json!("consumed")).unwrap();
        codelet.tick().unwrap();
        assert_eq!(slot.read().as_str(), Some("consumed"));
        assert_eq!(slot.version(), first + 1);

        // History moves on: the tail no longer matches and the slot is cleared.
        record(&history, &["Test1", "Test2", "Other"]);
        codelet.tick().unwrap();
        assert!(slot.read().is_null());
    }

    #[test]
    fn test_drive_threshold_blocks_firing() {
        let history = memory("mind:action_history");
        let slot = memory("behavior:b");
        let drive = memory("drive:m");
        let mut codelet = behavior(&history, &slot, vec![BoundInput::new("m", Arc::clone(&drive))]);

        record(&history, &["Test1", "Test2"]);
        drive.write_with_activation(json!(0.2), 0.2).unwrap();
        codelet.tick().unwrap();
        assert!(!slot.read().is_written());

        drive.write_with_activation(json!(0.7), 0.7).unwrap();
        codelet.tick().unwrap();
        assert_eq!(slot.read().activation, 0.7);
        assert_eq!(codelet.wiring().broadcasts.len(), 1);
    }
}
