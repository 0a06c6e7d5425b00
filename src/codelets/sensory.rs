//! Sensory codelets: the entry point for externally observed content.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;

use super::{publish, Codelet, CodeletCore, CodeletHeader, CodeletRole, Wiring};
use crate::activation::CodeletStatus;
use crate::error::CodeletError;
use crate::memory::MemoryObject;

/// Turns the latest raw content into the sensory output.
pub trait SensoryLogic: Send + 'static {
    /// `raw` is the latest value pushed through the codelet's
    /// [`SensoryInput`], if any. Returning `None` leaves the output as is.
    fn sense(&mut self, raw: Option<&Value>) -> anyhow::Result<Option<Value>>;
}

impl<F> SensoryLogic for F
where
    F: FnMut(Option<&Value>) -> anyhow::Result<Option<Value>> + Send + 'static,
{
    fn sense(&mut self, raw: Option<&Value>) -> anyhow::Result<Option<Value>> {
        self(raw)
    }
}

/// Forwards the pushed content unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl SensoryLogic for PassThrough {
    fn sense(&mut self, raw: Option<&Value>) -> anyhow::Result<Option<Value>> {
        Ok(raw.cloned())
    }
}

/// Handle external callers use to push content into a sensory codelet.
///
/// Pushes may happen at any time; the codelet's next tick sees the latest
/// one. Cloning is cheap and every clone feeds the same codelet.
#[derive(Debug, Clone)]
pub struct SensoryInput {
    codelet: Arc<str>,
    latest: Arc<Mutex<Option<Value>>>,
}

impl SensoryInput {
    fn new(codelet: &str) -> Self {
        Self {
            codelet: Arc::from(codelet),
            latest: Arc::new(Mutex::new(None)),
        }
    }

    /// Id of the sensory codelet this handle feeds.
    pub fn codelet_id(&self) -> &str {
        &self.codelet
    }

    pub fn push(&self, content: impl Into<Value>) {
        *self.latest.lock() = Some(content.into());
    }

    pub fn latest(&self) -> Option<Value> {
        self.latest.lock().clone()
    }

    pub fn clear(&self) {
        *self.latest.lock() = None;
    }
}

/// Declaration of a sensory codelet. Sensory codelets have no inputs.
pub struct SensoryCodelet {
    pub(crate) header: CodeletHeader,
    input: SensoryInput,
    logic: Box<dyn SensoryLogic>,
}

impl SensoryCodelet {
    pub fn new(id: impl Into<String>, logic: impl SensoryLogic) -> Self {
        let header = CodeletHeader::new(id, 0.0);
        let input = SensoryInput::new(&header.id);
        Self {
            header,
            input,
            logic: Box::new(logic),
        }
    }

    /// A sensory codelet that forwards whatever is pushed to it.
    pub fn pass_through(id: impl Into<String>) -> Self {
        Self::new(id, PassThrough)
    }

    pub fn with_cadence(mut self, cadence: Duration) -> Self {
        self.header.cadence = Some(cadence);
        self
    }

    pub fn id(&self) -> &str {
        &self.header.id
    }

    /// The push handle for this codelet.
    pub fn input(&self) -> SensoryInput {
        self.input.clone()
    }

    pub(crate) fn bind(self, output: Arc<MemoryObject>, default_cadence: Duration) -> BoundSensory {
        BoundSensory {
            core: self.header.bind(default_cadence),
            input: self.input,
            output,
            logic: self.logic,
        }
    }
}

impl std::fmt::Debug for SensoryCodelet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensoryCodelet")
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

pub(crate) struct BoundSensory {
    core: CodeletCore,
    input: SensoryInput,
    output: Arc<MemoryObject>,
    logic: Box<dyn SensoryLogic>,
}

impl Codelet for BoundSensory {
    fn id(&self) -> &str {
        &self.core.id
    }

    fn role(&self) -> CodeletRole {
        CodeletRole::Sensory
    }

    fn cadence(&self) -> Duration {
        self.core.cadence
    }

    fn status(&self) -> &Arc<CodeletStatus> {
        &self.core.status
    }

    fn wiring(&self) -> Wiring {
        Wiring {
            outputs: vec![Arc::clone(&self.output)],
            ..Wiring::default()
        }
    }

    fn tick(&mut self) -> Result<(), CodeletError> {
        let raw = self.input.latest();
        let sensed = self
            .logic
            .sense(raw.as_ref())
            .map_err(|e| CodeletError::logic(&self.core.id, e))?;

        if let Some(content) = sensed {
            let activation = self.output.bounds().max;
            if publish(&self.output, content, Some(activation))? {
                tracing::debug!(codelet = %self.core.id, "sensory content updated");
            }
            self.core.status.set_activation(activation);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
