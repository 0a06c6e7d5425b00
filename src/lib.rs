//! # meca
//!
//! A blackboard cognitive pipeline. Autonomous codelets run at their own
//! cadence and exchange information only through shared, named memory
//! objects. A one-time mounting phase wires producers to consumers along a
//! fixed layered architecture:
//!
//! ```text
//! sensory ─▶ perceptual ─▶ motivational ─┐
//!                   │                    ├─▶ action / behavior ─▶ motor
//!                   └────────────────────┘
//!            shared plan ─▶ action from planning ─┘
//! ```
//!
//! ```
//! use meca::codelets::{
//!     ActionContext, ActionFromPerceptionCodelet, MotorCodelet, NoopEffector,
//!     PerceptualCodelet, SensoryCodelet,
//! };
//! use meca::{Mind, MindState};
//! use serde_json::{json, Value};
//!
//! let mut mind = Mind::new();
//! mind.set_sensory_codelets(vec![SensoryCodelet::pass_through("eye")])?;
//! mind.set_perceptual_codelets(vec![PerceptualCodelet::pass_through("scene", vec!["eye".into()])])?;
//! mind.set_action_from_perception_codelets(vec![ActionFromPerceptionCodelet::new(
//!     "describe",
//!     vec!["scene".into()],
//!     vec![],
//!     "voice",
//!     |ctx: &ActionContext| -> anyhow::Result<Option<Value>> {
//!         Ok(ctx.percepts.latest().map(|p| json!(format!("I see {}", p.value))))
//!     },
//! )])?;
//! mind.set_motor_codelets(vec![MotorCodelet::new("voice", NoopEffector)])?;
//!
//! mind.mount()?;
//! mind.start()?;
//! mind.sensory_input("eye").unwrap().push("a dog");
//! mind.shut_down()?;
//! assert_eq!(mind.state(), MindState::ShutDown);
//! # Ok::<(), meca::MindError>(())
//! ```

pub mod activation;
pub mod codelets;
pub mod config;
pub mod error;
pub mod logging;
pub mod memory;
pub mod mind;
pub mod models;

pub use activation::{ActivationBounds, CodeletStatus};
pub use codelets::{ArbitrationPolicy, Codelet, CodeletRole};
pub use config::MindConfig;
pub use error::{CodeletError, MemoryError, MindError};
pub use memory::{MemoryObject, MemoryRegistry, MemorySnapshot};
pub use mind::{CodeletSnapshot, Inspector, Mind, MindState};
pub use models::{ActionHistory, ActionSequencePlan};
