//! Resolve declared dependency ids into live memory bindings.
//!
//! Layers are resolved in reference-architecture order, each against the
//! outputs created by the layers before it:
//!
//! ```text
//! sensory ─▶ perceptual ─▶ motivational ─▶ action / behavior ─▶ motor
//! ```
//!
//! Every fallible step runs in [`plan`], which only borrows the
//! declarations. [`Plan::bind`] then consumes them and cannot fail, so a
//! failed mount leaves the declarations untouched.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::activation::ActivationBounds;
use crate::codelets::inputs::BoundInput;
use crate::codelets::motor::{MotorBindings, MotorInput};
use crate::codelets::{
    ActionFromPerceptionCodelet, ActionFromPlanningCodelet, ArbitrationPolicy, BehaviorCodelet,
    Codelet, CodeletRole, MotivationalCodelet, MotorCodelet, PerceptualCodelet, SensoryCodelet,
    SensoryInput,
};
use crate::config::MindConfig;
use crate::error::MindError;
use crate::memory::{names, MemoryObject, MemoryRegistry};

/// Role-partitioned codelet declarations, as handed to a mind.
#[derive(Debug, Default)]
pub(crate) struct Declarations {
    pub sensory: Vec<SensoryCodelet>,
    pub perceptual: Vec<PerceptualCodelet>,
    pub motivational: Vec<MotivationalCodelet>,
    pub action_from_perception: Vec<ActionFromPerceptionCodelet>,
    pub action_from_planning: Vec<ActionFromPlanningCodelet>,
    pub behavior: Vec<BehaviorCodelet>,
    pub motor: Vec<MotorCodelet>,
}

impl Declarations {
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sensory
            .iter()
            .map(SensoryCodelet::id)
            .chain(self.perceptual.iter().map(PerceptualCodelet::id))
            .chain(self.motivational.iter().map(MotivationalCodelet::id))
            .chain(self.action_from_perception.iter().map(ActionFromPerceptionCodelet::id))
            .chain(self.action_from_planning.iter().map(ActionFromPlanningCodelet::id))
            .chain(self.behavior.iter().map(BehaviorCodelet::id))
            .chain(self.motor.iter().map(MotorCodelet::id))
    }

    pub fn len(&self) -> usize {
        self.ids().count()
    }
}

/// Result of a successful mount.
pub(crate) struct Mounted {
    pub registry: MemoryRegistry,
    pub codelets: Vec<Box<dyn Codelet>>,
    pub sensory_inputs: BTreeMap<String, SensoryInput>,
}

struct ActionPlan {
    percepts: Vec<BoundInput>,
    drives: Vec<BoundInput>,
    slot: Arc<MemoryObject>,
}

struct MotorPlan {
    inputs: Vec<MotorInput>,
    effector: Arc<MemoryObject>,
}

/// Everything resolved for a set of declarations, index-aligned with them.
pub(crate) struct Plan {
    registry: MemoryRegistry,
    history: Arc<MemoryObject>,
    shared_plan: Arc<MemoryObject>,
    sensory: Vec<Arc<MemoryObject>>,
    perceptual: Vec<(Vec<BoundInput>, Arc<MemoryObject>)>,
    motivational: Vec<(Vec<BoundInput>, Arc<MemoryObject>)>,
    action_from_perception: Vec<ActionPlan>,
    action_from_planning: Vec<ActionPlan>,
    behavior: Vec<ActionPlan>,
    motor: Vec<MotorPlan>,
    default_cadence: Duration,
    default_policy: ArbitrationPolicy,
    history_capacity: usize,
}

/// Outputs visible to the next layer, keyed by producing codelet id.
type Layer = HashMap<String, Arc<MemoryObject>>;

fn resolve(
    codelet: &str,
    ids: &[String],
    layers: &[&Layer],
) -> Result<Vec<BoundInput>, MindError> {
    ids.iter()
        .map(|dependency| {
            layers
                .iter()
                .find_map(|layer| layer.get(dependency))
                .map(|memory| BoundInput::new(dependency.clone(), Arc::clone(memory)))
                .ok_or_else(|| MindError::UnresolvedDependency {
                    codelet: codelet.to_string(),
                    dependency: dependency.clone(),
                })
        })
        .collect()
}

/// Resolve a producer's target motor and create its slot on that motor.
fn motor_slot(
    registry: &mut MemoryRegistry,
    motors: &HashSet<&str>,
    motor_inputs: &mut HashMap<String, Vec<MotorInput>>,
    producer: &str,
    role: CodeletRole,
    label: &str,
    motor: &str,
) -> Result<Arc<MemoryObject>, MindError> {
    if !motors.contains(motor) {
        return Err(MindError::UnresolvedDependency {
            codelet: producer.to_string(),
            dependency: motor.to_string(),
        });
    }
    let slot = registry.create(names::motor_input(motor, producer), ActivationBounds::UNIT)?;
    motor_inputs
        .entry(motor.to_string())
        .or_default()
        .push(MotorInput {
            producer: producer.to_string(),
            role,
            label: label.to_string(),
            memory: Arc::clone(&slot),
        });
    Ok(slot)
}

/// Validate the declarations and build every memory object they need.
pub(crate) fn plan(decls: &Declarations, config: &MindConfig) -> Result<Plan, MindError> {
    let mut seen = HashSet::new();
    for id in decls.ids() {
        if !seen.insert(id) {
            return Err(MindError::DuplicateCodeletId(id.to_string()));
        }
    }

    let mut registry = MemoryRegistry::new();
    let history = registry.create(names::ACTION_HISTORY, ActivationBounds::UNIT)?;
    let shared_plan = registry.create(names::ACTION_PLAN, ActivationBounds::UNIT)?;

    // Sensory
    let mut sensory_layer = Layer::new();
    let mut sensory = Vec::with_capacity(decls.sensory.len());
    for codelet in &decls.sensory {
        let output = registry.create(names::sensory(codelet.id()), ActivationBounds::UNIT)?;
        sensory_layer.insert(codelet.id().to_string(), Arc::clone(&output));
        sensory.push(output);
    }

    // Perceptual
    let mut percept_layer = Layer::new();
    let mut perceptual = Vec::with_capacity(decls.perceptual.len());
    for codelet in &decls.perceptual {
        let inputs = resolve(codelet.id(), codelet.sensory_ids(), &[&sensory_layer])?;
        let output = registry.create(names::percept(codelet.id()), ActivationBounds::UNIT)?;
        percept_layer.insert(codelet.id().to_string(), Arc::clone(&output));
        perceptual.push((inputs, output));
    }

    // Motivational
    let mut drive_layer = Layer::new();
    let mut motivational = Vec::with_capacity(decls.motivational.len());
    for codelet in &decls.motivational {
        let inputs = resolve(
            codelet.id(),
            codelet.dependency_ids(),
            &[&sensory_layer, &percept_layer],
        )?;
        let output = registry.create(names::drive(codelet.id()), codelet.bounds())?;
        drive_layer.insert(codelet.id().to_string(), Arc::clone(&output));
        motivational.push((inputs, output));
    }

    // Action and behavior
    let motors: HashSet<&str> = decls.motor.iter().map(MotorCodelet::id).collect();
    let mut motor_inputs: HashMap<String, Vec<MotorInput>> = HashMap::new();

    let mut action_from_perception = Vec::with_capacity(decls.action_from_perception.len());
    for codelet in &decls.action_from_perception {
        let percepts = resolve(codelet.id(), codelet.perceptual_ids(), &[&percept_layer])?;
        let drives = resolve(codelet.id(), codelet.motivational_ids(), &[&drive_layer])?;
        let slot = motor_slot(
            &mut registry,
            &motors,
            &mut motor_inputs,
            codelet.id(),
            CodeletRole::ActionFromPerception,
            codelet.label(),
            codelet.target_motor_id(),
        )?;
        action_from_perception.push(ActionPlan { percepts, drives, slot });
    }

    let mut action_from_planning = Vec::with_capacity(decls.action_from_planning.len());
    for codelet in &decls.action_from_planning {
        let percepts = resolve(codelet.id(), codelet.perceptual_ids(), &[&percept_layer])?;
        let drives = resolve(codelet.id(), codelet.motivational_ids(), &[&drive_layer])?;
        let slot = motor_slot(
            &mut registry,
            &motors,
            &mut motor_inputs,
            codelet.id(),
            CodeletRole::ActionFromPlanning,
            codelet.label(),
            codelet.target_motor_id(),
        )?;
        action_from_planning.push(ActionPlan { percepts, drives, slot });
    }

    let mut behavior = Vec::with_capacity(decls.behavior.len());
    for codelet in &decls.behavior {
        let percepts = resolve(codelet.id(), codelet.perceptual_ids(), &[&percept_layer])?;
        let drives = resolve(codelet.id(), codelet.motivational_ids(), &[&drive_layer])?;
        let slot = match codelet.target_motor_id() {
            Some(motor) => motor_slot(
                &mut registry,
                &motors,
                &mut motor_inputs,
                codelet.id(),
                CodeletRole::Behavior,
                codelet.label(),
                motor,
            )?,
            None => registry.create(names::behavior(codelet.id()), ActivationBounds::UNIT)?,
        };
        behavior.push(ActionPlan { percepts, drives, slot });
    }

    // Motor
    let mut motor = Vec::with_capacity(decls.motor.len());
    for codelet in &decls.motor {
        let effector = registry.create(names::effector(codelet.id()), ActivationBounds::UNIT)?;
        let inputs = motor_inputs.remove(codelet.id()).unwrap_or_default();
        if inputs.is_empty() {
            tracing::warn!(motor = %codelet.id(), "motor has no producers");
        }
        motor.push(MotorPlan { inputs, effector });
    }

    Ok(Plan {
        registry,
        history,
        shared_plan,
        sensory,
        perceptual,
        motivational,
        action_from_perception,
        action_from_planning,
        behavior,
        motor,
        default_cadence: config.default_cadence(),
        default_policy: config.arbitration,
        history_capacity: config.history_capacity,
    })
}

impl Plan {
    /// Consume the declarations into bound codelets.
    pub fn bind(self, decls: Declarations) -> Mounted {
        let cadence = self.default_cadence;
        let mut codelets: Vec<Box<dyn Codelet>> = Vec::with_capacity(decls.len());
        let mut sensory_inputs = BTreeMap::new();

        for (codelet, output) in decls.sensory.into_iter().zip(self.sensory) {
            sensory_inputs.insert(codelet.id().to_string(), codelet.input());
            codelets.push(Box::new(codelet.bind(output, cadence)));
        }
        for (codelet, (inputs, output)) in decls.perceptual.into_iter().zip(self.perceptual) {
            codelets.push(Box::new(codelet.bind(inputs, output, cadence)));
        }
        for (codelet, (inputs, output)) in decls.motivational.into_iter().zip(self.motivational) {
            codelets.push(Box::new(codelet.bind(inputs, output, cadence)));
        }
        for (codelet, plan) in decls
            .action_from_perception
            .into_iter()
            .zip(self.action_from_perception)
        {
            codelets.push(Box::new(codelet.bind(
                plan.percepts,
                plan.drives,
                plan.slot,
                cadence,
            )));
        }
        for (codelet, plan) in decls
            .action_from_planning
            .into_iter()
            .zip(self.action_from_planning)
        {
            codelets.push(Box::new(codelet.bind(
                plan.percepts,
                plan.drives,
                Arc::clone(&self.shared_plan),
                plan.slot,
                cadence,
            )));
        }
        for (codelet, plan) in decls.behavior.into_iter().zip(self.behavior) {
            codelets.push(Box::new(codelet.bind(
                plan.percepts,
                plan.drives,
                Arc::clone(&self.history),
                plan.slot,
                cadence,
            )));
        }
        for (codelet, plan) in decls.motor.into_iter().zip(self.motor) {
            let bindings = MotorBindings {
                inputs: plan.inputs,
                effector: plan.effector,
                history: Arc::clone(&self.history),
                plan: Arc::clone(&self.shared_plan),
                default_policy: self.default_policy,
                history_capacity: self.history_capacity,
            };
            codelets.push(Box::new(codelet.bind(bindings, cadence)));
        }

        Mounted {
            registry: self.registry,
            codelets,
            sensory_inputs,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
