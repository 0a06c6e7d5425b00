//! Motivational codelets maintain a bounded drive level.
//!
//! A motivational codelet declares `[min, default, max]` bounds at
//! construction and rejects a default outside them. Its drive memory
//! carries the same bounds; computed levels are clamped into them before
//! being written.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use super::inputs::BoundInput;
use super::{publish, Codelet, CodeletCore, CodeletHeader, CodeletRole, Inputs, Wiring};
use crate::activation::{ActivationBounds, CodeletStatus};
use crate::error::CodeletError;
use crate::memory::MemoryObject;

/// Computes the next drive level.
pub trait MotivationalLogic: Send + 'static {
    /// `readings` are the bound sensory/perceptual inputs, `current` the
    /// level written on the previous tick (the default before the first).
    fn drive(&mut self, readings: &Inputs, current: f64) -> anyhow::Result<f64>;
}

impl<F> MotivationalLogic for F
where
    F: FnMut(&Inputs, f64) -> anyhow::Result<f64> + Send + 'static,
{
    fn drive(&mut self, readings: &Inputs, current: f64) -> anyhow::Result<f64> {
        self(readings, current)
    }
}

/// Declaration of a motivational codelet.
///
/// Dependencies may name sensory or perceptual codelets.
pub struct MotivationalCodelet {
    pub(crate) header: CodeletHeader,
    pub(crate) bounds: ActivationBounds,
    pub(crate) dependency_ids: Vec<String>,
    logic: Box<dyn MotivationalLogic>,
}

impl MotivationalCodelet {
    /// Fails with [`CodeletError::ActivationOutOfBounds`] unless
    /// `min <= default <= max`.
    pub fn new(
        id: impl Into<String>,
        min: f64,
        default: f64,
        max: f64,
        dependency_ids: Vec<String>,
        logic: impl MotivationalLogic,
    ) -> Result<Self, CodeletError> {
        let id = id.into();
        let bounds = ActivationBounds::new(min, default, max).ok_or_else(|| {
            CodeletError::ActivationOutOfBounds {
                codelet: id.clone(),
                min,
                default,
                max,
            }
        })?;
        Ok(Self {
            header: CodeletHeader::new(id, default),
            bounds,
            dependency_ids,
            logic: Box::new(logic),
        })
    }

    pub fn with_cadence(mut self, cadence: Duration) -> Self {
        self.header.cadence = Some(cadence);
        self
    }

    pub fn id(&self) -> &str {
        &self.header.id
    }

    pub fn bounds(&self) -> ActivationBounds {
        self.bounds
    }

    pub fn dependency_ids(&self) -> &[String] {
        &self.dependency_ids
    }

    pub(crate) fn bind(
        self,
        readings: Vec<BoundInput>,
        output: Arc<MemoryObject>,
        default_cadence: Duration,
    ) -> BoundMotivational {
        BoundMotivational {
            core: self.header.bind(default_cadence),
            bounds: self.bounds,
            level: self.bounds.default,
            readings,
            output,
            logic: self.logic,
        }
    }
}

impl std::fmt::Debug for MotivationalCodelet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotivationalCodelet")
            .field("header", &self.header)
            .field("bounds", &self.bounds)
            .field("dependency_ids", &self.dependency_ids)
            .finish_non_exhaustive()
    }
}

pub(crate) struct BoundMotivational {
    core: CodeletCore,
    bounds: ActivationBounds,
    level: f64,
    readings: Vec<BoundInput>,
    output: Arc<MemoryObject>,
    logic: Box<dyn MotivationalLogic>,
}

impl Codelet for BoundMotivational {
    fn id(&self) -> &str {
        &self.core.id
    }

    fn role(&self) -> CodeletRole {
        CodeletRole::Motivational
    }

    fn cadence(&self) -> Duration {
        self.core.cadence
    }

    fn status(&self) -> &Arc<CodeletStatus> {
        &self.core.status
    }

    fn wiring(&self) -> Wiring {
        Wiring {
            inputs: self.readings.iter().map(|i| Arc::clone(&i.memory)).collect(),
            outputs: vec![Arc::clone(&self.output)],
            ..Wiring::default()
        }
    }

    fn tick(&mut self) -> Result<(), CodeletError> {
        let readings = Inputs::read(&self.readings);
        if !readings.ready() {
            return Ok(());
        }

        let computed = self
            .logic
            .drive(&readings, self.level)
            .map_err(|e| CodeletError::logic(&self.core.id, e))?;
        let level = self.bounds.clamp(computed);
        if level != computed {
            tracing::debug!(codelet = %self.core.id, computed, level, "drive clamped into bounds");
        }

        publish(&self.output, json!(level), Some(level))?;
        self.level = level;
        self.core.status.set_activation(level);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
