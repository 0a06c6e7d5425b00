//! Aggregation of sensory outputs into percepts.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::inputs::BoundInput;
use super::sensory::PassThrough;
use super::{publish, Codelet, CodeletCore, CodeletHeader, CodeletRole, Inputs, Wiring};
use crate::activation::CodeletStatus;
use crate::error::CodeletError;
use crate::memory::MemoryObject;

/// Builds a percept from the bound sensory readings.
pub trait PerceptualLogic: Send + 'static {
    /// Returning `None` leaves the previous percept in place.
    fn perceive(&mut self, sensory: &Inputs) -> anyhow::Result<Option<Value>>;
}

impl<F> PerceptualLogic for F
where
    F: FnMut(&Inputs) -> anyhow::Result<Option<Value>> + Send + 'static,
{
    fn perceive(&mut self, sensory: &Inputs) -> anyhow::Result<Option<Value>> {
        self(sensory)
    }
}

/// The most recently written sensory value becomes the percept.
impl PerceptualLogic for PassThrough {
    fn perceive(&mut self, sensory: &Inputs) -> anyhow::Result<Option<Value>> {
        Ok(sensory.latest().map(|s| s.value.clone()))
    }
}

/// Declaration of a perceptual codelet, listing the sensory codelets it
/// reads by id.
pub struct PerceptualCodelet {
    pub(crate) header: CodeletHeader,
    pub(crate) sensory_ids: Vec<String>,
    logic: Box<dyn PerceptualLogic>,
}

impl PerceptualCodelet {
    pub fn new(
        id: impl Into<String>,
        sensory_ids: Vec<String>,
        logic: impl PerceptualLogic,
    ) -> Self {
        Self {
            header: CodeletHeader::new(id, 0.0),
            sensory_ids,
            logic: Box::new(logic),
        }
    }

    pub fn pass_through(id: impl Into<String>, sensory_ids: Vec<String>) -> Self {
        Self::new(id, sensory_ids, PassThrough)
    }

    pub fn with_cadence(mut self, cadence: Duration) -> Self {
        self.header.cadence = Some(cadence);
        self
    }

    pub fn id(&self) -> &str {
        &self.header.id
    }

    pub fn sensory_ids(&self) -> &[String] {
        &self.sensory_ids
    }

    pub(crate) fn bind(
        self,
        sensory: Vec<BoundInput>,
        output: Arc<MemoryObject>,
        default_cadence: Duration,
    ) -> BoundPerceptual {
        BoundPerceptual {
            core: self.header.bind(default_cadence),
            sensory,
            output,
            logic: self.logic,
        }
    }
}

impl std::fmt::Debug for PerceptualCodelet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerceptualCodelet")
            .field("header", &self.header)
            .field("sensory_ids", &self.sensory_ids)
            .finish_non_exhaustive()
    }
}

pub(crate) struct BoundPerceptual {
    core: CodeletCore,
    sensory: Vec<BoundInput>,
    output: Arc<MemoryObject>,
    logic: Box<dyn PerceptualLogic>,
}

impl Codelet for BoundPerceptual {
    fn id(&self) -> &str {
        &self.core.id
    }

    fn role(&self) -> CodeletRole {
        CodeletRole::Perceptual
    }

    fn cadence(&self) -> Duration {
        self.core.cadence
    }

    fn status(&self) -> &Arc<CodeletStatus> {
        &self.core.status
    }

    fn wiring(&self) -> Wiring {
        Wiring {
            inputs: self.sensory.iter().map(|i| Arc::clone(&i.memory)).collect(),
            outputs: vec![Arc::clone(&self.output)],
            ..Wiring::default()
        }
    }

    fn tick(&mut self) -> Result<(), CodeletError> {
        let sensory = Inputs::read(&self.sensory);
        if !sensory.ready() {
            return Ok(());
        }

        let percept = self
            .logic
            .perceive(&sensory)
            .map_err(|e| CodeletError::logic(&self.core.id, e))?;

        if let Some(percept) = percept {
            let bounds = self.output.bounds();
            let activation = bounds.clamp(sensory.max_activation().unwrap_or(bounds.max));
            if publish(&self.output, percept, Some(activation))? {
                tracing::debug!(codelet = %self.core.id, activation, "percept updated");
            }
            self.core.status.set_activation(activation);
        }
        Ok(())
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

    #[test]
    fn test_skips_until_sensory_written() {
        let eye = memory("sensory:eye");
        let output = memory("percept:p");
        let mut codelet = PerceptualCodelet::pass_through("p", vec!["eye".into()]).bind(
            vec![BoundInput::new("eye", Arc::clone(&eye))],
            Arc::clone(&output),
            Duration::from_millis(10),
        );

        codelet.tick().unwrap();
        assert!(!output.read().is_written());

        eye.write_with_activation(json!("Something"), 1.0).unwrap();
        codelet.tick().unwrap();
        assert_eq!(output.read().as_str(), Some("Something"));
        assert_eq!(output.activation(), 1.0);
    }

    #[test]
    fn test_aggregates_several_sensors() {
        let eye = memory("sensory:eye");
        let ear = memory("sensory:ear");
        let output = memory("percept:scene");
        let declaration = PerceptualCodelet::new(
            "scene",
            vec!["eye".into(), "ear".into()],
            |sensory: &Inputs| -> anyhow::Result<Option<Value>> {
                let seen = sensory.get("eye").and_then(|s| s.as_str()).unwrap_or("nothing");
                let heard = sensory.get("ear").and_then(|s| s.as_str()).unwrap_or("silence");
                Ok(Some(json!(format!("{seen} / {heard}"))))
            },
        );
        assert_eq!(declaration.sensory_ids(), ["eye", "ear"]);
        let mut codelet = declaration.bind(
            vec![
                BoundInput::new("eye", Arc::clone(&eye)),
                BoundInput::new("ear", Arc::clone(&ear)),
            ],
            Arc::clone(&output),
            Duration::from_millis(10),
        );

        ear.write_with_activation(json!("bark"), 0.4).unwrap();
        codelet.tick().unwrap();
        assert_eq!(output.read().as_str(), Some("nothing / bark"));
        assert_eq!(output.activation(), 0.4);
        assert_eq!(codelet.wiring().inputs.len(), 2);
    }
}
