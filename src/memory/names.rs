//! Deterministic memory names.
//!
//! Every memory object created during mounting is named from the owning
//! codelet's identifier and the role of the slot, so the same declarations
//! always produce the same registry.

/// Shared trailing window of effected actions.
pub const ACTION_HISTORY: &str = "mind:action_history";

/// Shared action sequence plan consumed by the planning path.
pub const ACTION_PLAN: &str = "mind:action_plan";

pub fn sensory(id: &str) -> String {
    format!("sensory:{id}")
}

pub fn percept(id: &str) -> String {
    format!("percept:{id}")
}

pub fn drive(id: &str) -> String {
    format!("drive:{id}")
}

/// The input a motor exposes for one producer.
pub fn motor_input(motor_id: &str, producer_id: &str) -> String {
    format!("motor:{motor_id}/{producer_id}")
}

/// Output of a behavior codelet that targets no motor.
pub fn behavior(id: &str) -> String {
    format!("behavior:{id}")
}

/// The command a motor last effected.
pub fn effector(id: &str) -> String {
    format!("effector:{id}")
}
