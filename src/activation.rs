//! Bounded activation: the strength/urgency signal carried by memory
//! objects and codelets.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Inclusive activation bounds with a starting value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivationBounds {
    pub min: f64,
    pub default: f64,
    pub max: f64,
}

impl ActivationBounds {
    /// `[0.0, 1.0]`, starting at `0.0`.
    pub const UNIT: Self = Self {
        min: 0.0,
        default: 0.0,
        max: 1.0,
    };

    /// Build bounds, returning `None` unless `min <= default <= max` and all
    /// three values are finite.
    pub fn new(min: f64, default: f64, max: f64) -> Option<Self> {
        let finite = min.is_finite() && default.is_finite() && max.is_finite();
        if finite && min <= default && default <= max {
            Some(Self { min, default, max })
        } else {
            None
        }
    }

    pub fn contains(&self, activation: f64) -> bool {
        activation >= self.min && activation <= self.max
    }

    /// Clamp into `[min, max]`. NaN maps to the default.
    pub fn clamp(&self, activation: f64) -> f64 {
        if activation.is_nan() {
            self.default
        } else {
            activation.clamp(self.min, self.max)
        }
    }
}

impl Default for ActivationBounds {
    fn default() -> Self {
        Self::UNIT
    }
}

/// Lock-free, inspectable activation level plus tick counters for one
/// codelet. Shared between the running loop and inspectors.
#[derive(Debug)]
pub struct CodeletStatus {
    activation: AtomicU64,
    ticks: AtomicU64,
    failures: AtomicU64,
}

impl CodeletStatus {
    pub fn new(activation: f64) -> Self {
        Self {
            activation: AtomicU64::new(activation.to_bits()),
            ticks: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub fn activation(&self) -> f64 {
        f64::from_bits(self.activation.load(Ordering::Acquire))
    }

    pub fn set_activation(&self, activation: f64) {
        self.activation.store(activation.to_bits(), Ordering::Release);
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub(crate) fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
