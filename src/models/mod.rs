//! Value types stored in the shared broadcast memories.

pub mod action_history;
pub mod action_sequence_plan;

pub use action_history::{ActionHistory, ActionRecord};
pub use action_sequence_plan::ActionSequencePlan;
