//! The mind supervisor: owns declarations, memory and the codelet runtime.
//!
//! ```text
//!  Unmounted ──mount()──▶ Mounted ──start()──▶ Running
//!      │                     │                    │
//!      └─────────────── shut_down() ──────────────┴──▶ ShutDown
//! ```

mod inspect;
mod mount;
mod runner;
mod supervisor;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use inspect::{CodeletHandle, CodeletSnapshot, Inspector};
pub use supervisor::Mind;

/// Lifecycle state of a [`Mind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MindState {
    Unmounted,
    Mounted,
    Running,
    /// Terminal.
    ShutDown,
}

impl fmt::Display for MindState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unmounted => "unmounted",
            Self::Mounted => "mounted",
            Self::Running => "running",
            Self::ShutDown => "shut_down",
        };
        f.write_str(name)
    }
}
