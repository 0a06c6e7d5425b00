//! Read-only inspection of mounted codelets.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::{Mind, MindState};
use crate::activation::CodeletStatus;
use crate::codelets::{Codelet, CodeletRole, Wiring};
use crate::memory::{MemoryObject, MemorySnapshot};

/// What the mind keeps about a codelet once its bound form has moved into
/// its loop: identity, live status and the memory it touches.
#[derive(Debug, Clone)]
pub struct CodeletHandle {
    id: String,
    role: CodeletRole,
    cadence: Duration,
    status: Arc<CodeletStatus>,
    wiring: Wiring,
}

impl CodeletHandle {
    pub(crate) fn of(codelet: &dyn Codelet) -> Self {
        Self {
            id: codelet.id().to_string(),
            role: codelet.role(),
            cadence: codelet.cadence(),
            status: Arc::clone(codelet.status()),
            wiring: codelet.wiring(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> CodeletRole {
        self.role
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    pub fn status(&self) -> &CodeletStatus {
        &self.status
    }

    pub fn wiring(&self) -> &Wiring {
        &self.wiring
    }

    pub fn snapshot(&self) -> CodeletSnapshot {
        fn read_all(memories: &[Arc<MemoryObject>]) -> Vec<MemorySnapshot> {
            memories.iter().map(|m| m.read()).collect()
        }

        CodeletSnapshot {
            id: self.id.clone(),
            role: self.role,
            activation: self.status.activation(),
            ticks: self.status.ticks(),
            failures: self.status.failures(),
            cadence_ms: u64::try_from(self.cadence.as_millis()).unwrap_or(u64::MAX),
            inputs: read_all(&self.wiring.inputs),
            broadcasts: read_all(&self.wiring.broadcasts),
            outputs: read_all(&self.wiring.outputs),
        }
    }
}

/// Point-in-time view of one codelet.
#[derive(Debug, Clone, Serialize)]
pub struct CodeletSnapshot {
    pub id: String,
    pub role: CodeletRole,
    pub activation: f64,
    pub ticks: u64,
    pub failures: u64,
    pub cadence_ms: u64,
    pub inputs: Vec<MemorySnapshot>,
    pub broadcasts: Vec<MemorySnapshot>,
    pub outputs: Vec<MemorySnapshot>,
}

/// A mind plus the codelets a monitoring tool asked to watch.
///
/// Only takes per-object read locks, so it can be polled while the mind
/// runs.
#[derive(Debug)]
pub struct Inspector<'a> {
    mind: &'a Mind,
    handles: Vec<&'a CodeletHandle>,
}

#[derive(Serialize)]
struct Report<'a> {
    mind: String,
    state: MindState,
    codelets: &'a [CodeletSnapshot],
}

impl<'a> Inspector<'a> {
    pub(crate) fn new(mind: &'a Mind, handles: Vec<&'a CodeletHandle>) -> Self {
        Self { mind, handles }
    }

    pub fn codelet_ids(&self) -> impl Iterator<Item = &str> {
        self.handles.iter().map(|h| h.id())
    }

    pub fn snapshot(&self) -> Vec<CodeletSnapshot> {
        self.handles.iter().map(|h| h.snapshot()).collect()
    }

    /// Snapshot of every watched codelet as a JSON report.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let codelets = self.snapshot();
        serde_json::to_string_pretty(&Report {
            mind: self.mind.id().to_string(),
            state: self.mind.state(),
            codelets: &codelets,
        })
    }
}
