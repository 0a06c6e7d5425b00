//! Motor codelets arbitrate proposals and drive an effector.
//!
//! A motor owns one input slot per producer that targets it. Each tick it
//! arbitrates the non-empty slots. A winning proposal not yet effected is
//! handed to the [`MotorLogic`] and mirrored into `effector:<id>`; its label
//! is appended to the action history, and the shared plan advances when the
//! label is the plan's current step.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::arbitration::{ArbitrationPolicy, Proposal};
use super::{Codelet, CodeletCore, CodeletHeader, CodeletRole, Wiring};
use crate::activation::CodeletStatus;
use crate::error::{CodeletError, MemoryError};
use crate::memory::MemoryObject;
use crate::models::{ActionHistory, ActionSequencePlan};

/// Applies a command to the outside world.
pub trait MotorLogic: Send + 'static {
    fn actuate(&mut self, command: &Value) -> anyhow::Result<()>;
}

impl<F> MotorLogic for F
where
    F: FnMut(&Value) -> anyhow::Result<()> + Send + 'static,
{
    fn actuate(&mut self, command: &Value) -> anyhow::Result<()> {
        self(command)
    }
}

/// Effector that does nothing; the command is still visible through the
/// motor's effector memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEffector;

impl MotorLogic for NoopEffector {
    fn actuate(&mut self, _command: &Value) -> anyhow::Result<()> {
        Ok(())
    }
}

pub struct MotorCodelet {
    pub(crate) header: CodeletHeader,
    arbitration: Option<ArbitrationPolicy>,
    logic: Box<dyn MotorLogic>,
}

impl MotorCodelet {
    pub fn new(id: impl Into<String>, logic: impl MotorLogic) -> Self {
        Self {
            header: CodeletHeader::new(id, 0.0),
            arbitration: None,
            logic: Box::new(logic),
        }
    }

    /// Override the mind-wide arbitration policy for this motor.
    pub fn with_arbitration(mut self, policy: ArbitrationPolicy) -> Self {
        self.arbitration = Some(policy);
        self
    }

    pub fn with_cadence(mut self, cadence: Duration) -> Self {
        self.header.cadence = Some(cadence);
        self
    }

    pub fn id(&self) -> &str {
        &self.header.id
    }

    pub(crate) fn bind(self, bindings: MotorBindings, default_cadence: Duration) -> BoundMotor {
        BoundMotor {
            core: self.header.bind(default_cadence),
            policy: self.arbitration.unwrap_or(bindings.default_policy),
            inputs: bindings.inputs,
            effector: bindings.effector,
            history: bindings.history,
            plan: bindings.plan,
            history_capacity: bindings.history_capacity,
            effected: HashMap::new(),
            logic: self.logic,
        }
    }
}

impl std::fmt::Debug for MotorCodelet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotorCodelet")
            .field("header", &self.header)
            .field("arbitration", &self.arbitration)
            .finish_non_exhaustive()
    }
}

/// One producer's slot on a motor.
#[derive(Debug, Clone)]
pub(crate) struct MotorInput {
    pub producer: String,
    pub role: CodeletRole,
    /// Label recorded in the history when this producer's command is effected.
    pub label: String,
    pub memory: Arc<MemoryObject>,
}

/// Memory objects and settings resolved for a motor at mount time.
#[derive(Debug)]
pub(crate) struct MotorBindings {
    pub inputs: Vec<MotorInput>,
    pub effector: Arc<MemoryObject>,
    pub history: Arc<MemoryObject>,
    pub plan: Arc<MemoryObject>,
    pub default_policy: ArbitrationPolicy,
    pub history_capacity: usize,
}

pub(crate) struct BoundMotor {
    core: CodeletCore,
    policy: ArbitrationPolicy,
    inputs: Vec<MotorInput>,
    effector: Arc<MemoryObject>,
    history: Arc<MemoryObject>,
    plan: Arc<MemoryObject>,
    history_capacity: usize,
    /// Write sequence of the last proposal effected, per producer.
    effected: HashMap<String, u64>,
    logic: Box<dyn MotorLogic>,
}

impl BoundMotor {
    /// Live proposals that have not been effected yet.
    fn proposals(&self) -> Vec<Proposal> {
        self.inputs
            .iter()
            .filter_map(|input| {
                let snapshot = input.memory.read();
                let spent = self.effected.get(&input.producer) == Some(&snapshot.sequence);
                (!snapshot.is_null() && !spent).then(|| Proposal {
                    producer: input.producer.clone(),
                    role: input.role,
                    label: input.label.clone(),
                    command: snapshot.value,
                    activation: snapshot.activation,
                    sequence: snapshot.sequence,
                })
            })
            .collect()
    }

    fn record_action(&self, label: &str, producer: &str) -> Result<u64, MemoryError> {
        let capacity = self.history_capacity;
        self.history
            .update(|value| -> Result<u64, serde_json::Error> {
                let mut history = if value.is_null() {
                    ActionHistory::new(capacity)
                } else {
                    serde_json::from_value::<ActionHistory>(value.clone())?
                };
                let seq = history.push(label, producer);
                *value = serde_json::to_value(&history)?;
                Ok(seq)
            })?
            .map_err(|source| MemoryError::Decode {
                name: self.history.name().to_string(),
                source,
            })
    }

    /// Advance the shared plan when `label` is its current step.
    fn advance_plan(&self, label: &str) -> Result<bool, MemoryError> {
        if self.plan.read().is_null() {
            return Ok(false);
        }
        self.plan
            .update(|value| -> Result<bool, serde_json::Error> {
                let mut plan = serde_json::from_value::<ActionSequencePlan>(value.clone())?;
                if plan.current_step() != Some(label) {
                    return Ok(false);
                }
                plan.advance();
                *value = serde_json::to_value(&plan)?;
                Ok(true)
            })?
            .map_err(|source| MemoryError::Decode {
                name: self.plan.name().to_string(),
                source,
            })
    }
}

impl Codelet for BoundMotor {
    fn id(&self) -> &str {
        &self.core.id
    }

    fn role(&self) -> CodeletRole {
        CodeletRole::Motor
    }

    fn cadence(&self) -> Duration {
        self.core.cadence
    }

    fn status(&self) -> &Arc<CodeletStatus> {
        &self.core.status
    }

    fn wiring(&self) -> Wiring {
        Wiring {
            inputs: self.inputs.iter().map(|i| Arc::clone(&i.memory)).collect(),
            broadcasts: vec![Arc::clone(&self.history), Arc::clone(&self.plan)],
            outputs: vec![Arc::clone(&self.effector)],
        }
    }

    fn tick(&mut self) -> Result<(), CodeletError> {
        let proposals = self.proposals();
        let Some(winner) = self.policy.select(&self.core.id, &proposals)? else {
            return Ok(());
        };

        self.logic
            .actuate(&winner.command)
            .map_err(|e| CodeletError::logic(&self.core.id, e))?;

        let activation = self.effector.bounds().clamp(winner.activation);
        self.effector
            .write_with_activation(winner.command.clone(), activation)?;
        let seq = self.record_action(&winner.label, &winner.producer)?;
        let advanced = self.advance_plan(&winner.label)?;

        tracing::info!(
            motor = %self.core.id,
            producer = %winner.producer,
            label = %winner.label,
            history_seq = seq,
            plan_advanced = advanced,
            "command effected"
        );
        self.effected
            .insert(winner.producer.clone(), winner.sequence);
        self.core.status.set_activation(activation);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
