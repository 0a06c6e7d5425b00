//! Read view over a codelet's bound inputs for one tick.

use std::sync::Arc;

use serde_json::Value;

use crate::memory::{MemoryObject, MemorySnapshot};

/// An input slot resolved at mount time, tagged with the identifier of the
/// codelet that produces it.
#[derive(Debug, Clone)]
pub(crate) struct BoundInput {
    pub source: String,
    pub memory: Arc<MemoryObject>,
}

impl BoundInput {
    pub fn new(source: impl Into<String>, memory: Arc<MemoryObject>) -> Self {
        Self {
            source: source.into(),
            memory,
        }
    }
}

/// One input as seen at the start of a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    /// Identifier of the producing codelet.
    pub source: String,
    pub snapshot: MemorySnapshot,
}

/// Snapshots of a group of inputs, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inputs {
    readings: Vec<Reading>,
}

impl Inputs {
    pub(crate) fn read(bound: &[BoundInput]) -> Self {
        Self {
            readings: bound
                .iter()
                .map(|input| Reading {
                    source: input.source.clone(),
                    snapshot: input.memory.read(),
                })
                .collect(),
        }
    }

    /// Build a view directly from readings, e.g. to exercise role logic in
    /// isolation.
    pub fn from_readings(readings: Vec<Reading>) -> Self {
        Self { readings }
    }

    /// Snapshot produced by the codelet `source`.
    pub fn get(&self, source: &str) -> Option<&MemorySnapshot> {
        self.readings
            .iter()
            .find(|r| r.source == source)
            .map(|r| &r.snapshot)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.readings.iter()
    }

    /// Payloads of the inputs that hold something.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.readings
            .iter()
            .filter(|r| r.snapshot.is_written() && !r.snapshot.is_null())
            .map(|r| &r.snapshot.value)
    }

    /// The most recently written non-null input.
    pub fn latest(&self) -> Option<&MemorySnapshot> {
        self.readings
            .iter()
            .map(|r| &r.snapshot)
            .filter(|s| s.is_written() && !s.is_null())
            .max_by_key(|s| s.sequence)
    }

    pub fn any_written(&self) -> bool {
        self.readings.iter().any(|r| r.snapshot.is_written())
    }

    /// False while every input of a non-empty group is still unwritten.
    pub fn ready(&self) -> bool {
        self.readings.is_empty() || self.any_written()
    }

    /// Strongest activation in the group.
    pub fn max_activation(&self) -> Option<f64> {
        self.readings
            .iter()
            .map(|r| r.snapshot.activation)
            .max_by(f64::total_cmp)
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::activation::ActivationBounds;

    fn bound(source: &str) -> BoundInput {
        BoundInput::new(source, Arc::new(MemoryObject::new(source, ActivationBounds::UNIT)))
    }

    #[test]
    fn test_inputs_ready_and_latest() {
        let inputs = vec![bound("a"), bound("b")];
        assert!(!Inputs::read(&inputs).ready());

        inputs[1].memory.write_with_activation(json!("from b"), 0.3).unwrap();
        inputs[0].memory.write_with_activation(json!("from a"), 0.7).unwrap();

        let view = Inputs::read(&inputs);
        assert!(view.ready());
        assert_eq!(view.latest().unwrap().as_str(), Some("from a"));
        assert_eq!(view.get("b").unwrap().as_str(), Some("from b"));
        assert_eq!(view.max_activation(), Some(0.7));
        assert_eq!(view.values().count(), 2);
    }

    #[test]
    fn test_empty_inputs_are_ready() {
        let view = Inputs::read(&[]);
        assert!(view.ready());
        assert!(view.max_activation().is_none());
        assert!(view.latest().is_none());
    }
}
