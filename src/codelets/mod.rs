//! Autonomous units that talk only through shared memory.
//!
//! Each role comes in two shapes. The *declaration* (`SensoryCodelet`,
//! `PerceptualCodelet`, ...) is what client code builds: an identifier,
//! role parameters, the plain-string identifiers of the codelets it
//! depends on, and the role logic. Mounting turns every declaration into a
//! *bound* codelet holding the live memory objects, which the mind then runs
//! through the uniform [`Codelet`] trait.
//!
//! Role logic is plugged in through four traits:
//!
//! | Role | Logic |
//! |---|---|
//! | Sensory | [`SensoryLogic`] |
//! | Perceptual | [`PerceptualLogic`] |
//! | Motivational | [`MotivationalLogic`] |
//! | ActionFromPerception, ActionFromPlanning, Behavior | [`ActionLogic`] |
//! | Motor | [`MotorLogic`] |

pub mod action;
pub mod arbitration;
pub mod behavior;
pub mod inputs;
pub mod motivational;
pub mod motor;
pub mod perceptual;
pub mod sensory;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::activation::CodeletStatus;
use crate::error::{CodeletError, MemoryError};
use crate::memory::MemoryObject;

pub use action::{ActionContext, ActionFromPerceptionCodelet, ActionFromPlanningCodelet, ActionLogic};
pub use arbitration::{ArbitrationPolicy, Proposal};
pub use behavior::BehaviorCodelet;
pub use inputs::{Inputs, Reading};
pub use motivational::{MotivationalCodelet, MotivationalLogic};
pub use motor::{MotorCodelet, MotorLogic, NoopEffector};
pub use perceptual::{PerceptualCodelet, PerceptualLogic};
pub use sensory::{PassThrough, SensoryCodelet, SensoryInput, SensoryLogic};

/// The seven roles of the reference architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeletRole {
    Sensory,
    Perceptual,
    Motivational,
    ActionFromPerception,
    ActionFromPlanning,
    Behavior,
    Motor,
}

impl fmt::Display for CodeletRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sensory => "sensory",
            Self::Perceptual => "perceptual",
            Self::Motivational => "motivational",
            Self::ActionFromPerception => "action_from_perception",
            Self::ActionFromPlanning => "action_from_planning",
            Self::Behavior => "behavior",
            Self::Motor => "motor",
        };
        f.write_str(name)
    }
}

/// Memory objects a bound codelet touches.
#[derive(Debug, Clone, Default)]
pub struct Wiring {
    /// Read-only inputs, one per resolved dependency.
    pub inputs: Vec<Arc<MemoryObject>>,
    /// Shared memories read by many codelets.
    pub broadcasts: Vec<Arc<MemoryObject>>,
    /// Exclusive write targets.
    pub outputs: Vec<Arc<MemoryObject>>,
}

/// A mounted codelet, ready to run.
///
/// `tick` reads the bound inputs, runs the role logic and writes the
/// outputs. It never blocks on another codelet.
pub trait Codelet: Send {
    fn id(&self) -> &str;

    fn role(&self) -> CodeletRole;

    /// Period between two ticks.
    fn cadence(&self) -> Duration;

    fn status(&self) -> &Arc<CodeletStatus>;

    fn wiring(&self) -> Wiring;

    /// Run one step.
    fn tick(&mut self) -> Result<(), CodeletError>;
}

// ---------------------------------------------------------------------------
// Shared plumbing for declarations and bound codelets
// ---------------------------------------------------------------------------

/// Identity and scheduling fields every declaration carries.
#[derive(Debug)]
pub(crate) struct CodeletHeader {
    pub id: String,
    pub cadence: Option<Duration>,
    pub status: Arc<CodeletStatus>,
}

impl CodeletHeader {
    pub fn new(id: impl Into<String>, activation: f64) -> Self {
        Self {
            id: id.into(),
            cadence: None,
            status: Arc::new(CodeletStatus::new(activation)),
        }
    }

    pub fn bind(self, default_cadence: Duration) -> CodeletCore {
        let cadence = self.cadence.unwrap_or(default_cadence);
        CodeletCore {
            id: self.id,
            cadence: cadence.max(Duration::from_millis(1)),
            status: self.status,
        }
    }
}

/// Header fields of a bound codelet.
#[derive(Debug)]
pub(crate) struct CodeletCore {
    pub id: String,
    pub cadence: Duration,
    pub status: Arc<CodeletStatus>,
}

/// Write to an exclusive output only when value or activation changed, so
/// the write sequence reflects real changes rather than tick frequency.
/// Returns whether a write happened.
pub(crate) fn publish(
    memory: &MemoryObject,
    value: Value,
    activation: Option<f64>,
) -> Result<bool, MemoryError> {
    let current = memory.read();
    let same_activation = activation.map_or(true, |a| a == current.activation);
    if current.is_written() && current.value == value && same_activation {
        return Ok(false);
    }
    match activation {
        Some(activation) => memory.write_with_activation(value, activation)?,
        None => memory.write(value)?,
    };
    Ok(true)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::activation::ActivationBounds;

    #[test]
    fn test_publish_skips_unchanged_values() {
        let memory = MemoryObject::new("out", ActivationBounds::UNIT);
        assert!(publish(&memory, json!("a"), Some(0.5)).unwrap());
        assert!(!publish(&memory, json!("a"), Some(0.5)).unwrap());
        assert!(publish(&memory, json!("a"), Some(0.6)).unwrap());
        assert!(publish(&memory, json!("b"), None).unwrap());
        assert_eq!(memory.version(), 3);
    }

    #[test]
    fn test_publish_writes_first_null() {
        let memory = MemoryObject::new("out", ActivationBounds::UNIT);
        assert!(publish(&memory, Value::Null, None).unwrap());
        assert_eq!(memory.version(), 1);
    }

    #[test]
    fn test_role_display() {
        assert_eq!(CodeletRole::ActionFromPlanning.to_string(), "action_from_planning");
        assert_eq!(
            serde_json::to_value(CodeletRole::Motor).unwrap(),
            json!("motor")
        );
    }
}
