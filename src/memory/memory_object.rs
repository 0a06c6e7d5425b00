//! A single named shared cell on the blackboard.
//!
//! Every object carries its own lock, so contention stays local to the
//! slot being touched. Reads copy the whole cell out under the read lock;
//! a reader racing a writer sees either the complete previous value or the
//! complete new one.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::activation::ActivationBounds;
use crate::error::MemoryError;

/// Process-wide write counter, giving a strict recency order across objects.
static WRITE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_sequence() -> u64 {
    WRITE_SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

/// A consistent copy of a memory object's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    /// Name of the object this snapshot was taken from.
    pub name: String,
    /// Payload.
    pub value: Value,
    /// Activation at the time of the read.
    pub activation: f64,
    /// Number of writes applied so far (0 = never written).
    pub version: u64,
    /// Global write sequence of the last write (0 = never written).
    pub sequence: u64,
    /// Epoch millis of the last write, or of creation.
    pub timestamp: i64,
}

impl MemorySnapshot {
    /// Whether any codelet or collaborator has written the object yet.
    pub fn is_written(&self) -> bool {
        self.version > 0
    }

    /// Whether the payload is `null` (nothing proposed, or retracted).
    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    /// Payload as a string slice, if it is a JSON string.
    pub fn as_str(&self) -> Option<&str> {
        self.value.as_str()
    }

    /// Decode the payload into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, MemoryError> {
        serde_json::from_value(self.value.clone()).map_err(|source| MemoryError::Decode {
            name: self.name.clone(),
            source,
        })
    }
}

#[derive(Debug)]
struct MemoryCell {
    value: Value,
    activation: f64,
    version: u64,
    sequence: u64,
    timestamp: i64,
}

impl MemoryCell {
    fn stamp(&mut self) -> u64 {
        self.version += 1;
        self.sequence = next_sequence();
        self.timestamp = chrono::Utc::now().timestamp_millis();
        self.version
    }
}

/// A named, bounded-activation shared cell.
///
/// # Example
///
/// ```
/// use meca::memory::MemoryObject;
/// use meca::ActivationBounds;
///
/// let memory = MemoryObject::new("percept:vision", ActivationBounds::UNIT);
/// memory.write_with_activation(serde_json::json!("a dog"), 0.8).unwrap();
///
/// let snapshot = memory.read();
/// assert_eq!(snapshot.as_str(), Some("a dog"));
/// assert_eq!(snapshot.activation, 0.8);
/// assert!(memory.write_with_activation(serde_json::json!("a cat"), 1.2).is_err());
/// ```
#[derive(Debug)]
pub struct MemoryObject {
    name: String,
    bounds: ActivationBounds,
    cell: RwLock<MemoryCell>,
    closed: AtomicBool,
}

impl MemoryObject {
    /// Create an object holding `null` at the bounds' default activation.
    pub fn new(name: impl Into<String>, bounds: ActivationBounds) -> Self {
        Self::with_value(name, bounds, Value::Null)
    }

    /// Create an object with an initial payload. The initial payload does
    /// not count as a write.
    pub fn with_value(name: impl Into<String>, bounds: ActivationBounds, value: Value) -> Self {
        Self {
            name: name.into(),
            bounds,
            cell: RwLock::new(MemoryCell {
                value,
                activation: bounds.default,
                version: 0,
                sequence: 0,
                timestamp: chrono::Utc::now().timestamp_millis(),
            }),
            closed: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bounds(&self) -> ActivationBounds {
        self.bounds
    }

    // --- Read operations ---

    /// Take a consistent snapshot of value and activation.
    pub fn read(&self) -> MemorySnapshot {
        let cell = self.cell.read();
        MemorySnapshot {
            name: self.name.clone(),
            value: cell.value.clone(),
            activation: cell.activation,
            version: cell.version,
            sequence: cell.sequence,
            timestamp: cell.timestamp,
        }
    }

    pub fn value(&self) -> Value {
        self.cell.read().value.clone()
    }

    pub fn activation(&self) -> f64 {
        self.cell.read().activation
    }

    pub fn version(&self) -> u64 {
        self.cell.read().version
    }

    // --- Write operations ---

    /// Replace the payload, keeping the current activation.
    /// Returns the new version.
    pub fn write(&self, value: Value) -> Result<u64, MemoryError> {
        let mut cell = self.cell.write();
        self.ensure_open()?;
        cell.value = value;
        Ok(cell.stamp())
    }

    /// Replace payload and activation together. Fails, leaving the object
    /// untouched, when `activation` is outside the bounds.
    pub fn write_with_activation(&self, value: Value, activation: f64) -> Result<u64, MemoryError> {
        self.check_bounds(activation)?;
        let mut cell = self.cell.write();
        self.ensure_open()?;
        cell.value = value;
        cell.activation = activation;
        Ok(cell.stamp())
    }

    /// Change only the activation.
    pub fn set_activation(&self, activation: f64) -> Result<u64, MemoryError> {
        self.check_bounds(activation)?;
        let mut cell = self.cell.write();
        self.ensure_open()?;
        cell.activation = activation;
        Ok(cell.stamp())
    }

    /// Atomic read-modify-write of the payload.
    ///
    /// Objects written by several codelets go through this method only, so
    /// concurrent writers never lose each other's updates. Version and
    /// sequence move only when `f` actually changes the payload.
    pub fn update<R>(&self, f: impl FnOnce(&mut Value) -> R) -> Result<R, MemoryError> {
        let mut cell = self.cell.write();
        self.ensure_open()?;
        let before = cell.value.clone();
        let result = f(&mut cell.value);
        if cell.value != before {
            cell.stamp();
        }
        Ok(result)
    }

    // --- Lifecycle ---

    /// Reject every later write. Returns once any write already holding
    /// the lock has finished.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        drop(self.cell.write());
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), MemoryError> {
        if self.is_closed() {
            return Err(MemoryError::MemoryClosed {
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    fn check_bounds(&self, activation: f64) -> Result<(), MemoryError> {
        if self.bounds.contains(activation) {
            Ok(())
        } else {
            Err(MemoryError::ActivationOutOfBounds {
                name: self.name.clone(),
                activation,
                min: self.bounds.min,
                max: self.bounds.max,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
