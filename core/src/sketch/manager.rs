//! Constraint lifecycle and solve orchestration for one drawing.
//!
//! The manager owns the constraint set and its own view of the geometry.
//! The external drawing store pushes snapshots in with `update_entities`
//! and, when injected as a [`GeometryStore`], receives the merged updates
//! of every solve pass.

use super::auto_constraints::{heuristic_label, suggest_constraint};
use super::config::{AutoConstraintConfig, ConfigError, ManagerConfig};
use super::solver::{degrees_of_freedom, panic_message, ConstraintSolution, ConstraintSolver, DofReport, SolveReport};
use super::types::{
    same_entity_set, Constraint, ConstraintCreationParams, ConstraintMetadata, ConstraintType, ParameterKey,
    ParameterValue, Priority,
};
use super::validator::{validate, ValidationError};
use crate::geometry::{EntityMap, EntityUpdate};
use crate::ids::{ConstraintId, EntityId, IdGenerator};
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Canonical geometry owner. Receives the partial updates of each solve pass
/// and is responsible for merging, undo recording and re-rendering.
pub trait GeometryStore {
    fn apply_updates(&mut self, updates: &HashMap<EntityId, EntityUpdate>);
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ListenerError {
    #[error("Listener failed: {0}")]
    Failed(String),

    #[error("Listener panicked: {0}")]
    Panicked(String),
}

/// Receives the full constraint list after every mutating operation.
/// Must not call back into the manager.
pub type ChangeListener = Box<dyn Fn(&[Constraint]) -> Result<(), ListenerError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

pub struct ConstraintManager {
    constraints: Vec<Constraint>,
    entities: EntityMap,
    solver: ConstraintSolver,
    auto_config: AutoConstraintConfig,
    ids: IdGenerator,
    listeners: Vec<(ListenerId, ChangeListener)>,
    next_listener_id: u64,
    store: Option<Box<dyn GeometryStore>>,
    last_report: Option<SolveReport>,
}

impl ConstraintManager {
    /// Detached manager: solve results update only its own snapshot.
    ///
    /// Fails if `config` is out of range.
    pub fn new(config: ManagerConfig) -> Result<Self, ConfigError> {
        let solver = ConstraintSolver::new(config.solver)?;
        config.auto_constraints.validate()?;
        Ok(Self::from_parts(solver, config.auto_constraints))
    }

    pub fn with_store(config: ManagerConfig, store: Box<dyn GeometryStore>) -> Result<Self, ConfigError> {
        let mut manager = Self::new(config)?;
        manager.store = Some(store);
        Ok(manager)
    }

    fn from_parts(solver: ConstraintSolver, auto_config: AutoConstraintConfig) -> Self {
        Self {
            constraints: Vec::new(),
            entities: EntityMap::new(),
            solver,
            auto_config,
            ids: IdGenerator::random(),
            listeners: Vec::new(),
            next_listener_id: 0,
            store: None,
            last_report: None,
        }
    }

    /// Derive constraint ids deterministically from `seed`.
    pub fn with_id_seed(mut self, seed: &str) -> Self {
        self.ids = IdGenerator::new(seed);
        self
    }

    // =========================================================================
    // Geometry
    // =========================================================================

    /// Replace the manager's view of the geometry.
    pub fn update_entities(&mut self, snapshot: EntityMap) {
        debug!("Entity snapshot replaced ({} entities)", snapshot.len());
        self.entities = snapshot;
    }

    pub fn entities(&self) -> &EntityMap {
        &self.entities
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Validate and store a new constraint. Nothing is stored on failure.
    pub fn create_constraint(&mut self, request: ConstraintCreationParams) -> Result<ConstraintId, ValidationError> {
        let mut parameters = request.parameters();
        if let Err(e) = validate(request.constraint_type, &request.entity_ids, &parameters, &self.entities) {
            debug!("Rejected {} constraint: {}", request.constraint_type, e);
            return Err(e);
        }

        // FIX without an explicit point pins the entity where it is now
        if request.constraint_type == ConstraintType::Fix && !parameters.contains(ParameterKey::Point) {
            if let Some(entity) = request.entity_ids.first().and_then(|id| self.entities.get(id)) {
                parameters.insert(ParameterKey::Point, ParameterValue::Point(entity.reference_point()));
            }
        }

        let id = self.ids.next_id();
        let mut constraint = Constraint::new(id, request.constraint_type, request.entity_ids, parameters)
            .with_priority(request.priority.unwrap_or_default());
        constraint.metadata = ConstraintMetadata::new(request.description);

        info!(
            "Created {} constraint {} on {} entities",
            constraint.constraint_type,
            id,
            constraint.entity_ids.len()
        );
        self.constraints.push(constraint);
        self.notify();
        Ok(id)
    }

    /// Returns true if the constraint existed and was removed.
    pub fn remove_constraint(&mut self, id: &ConstraintId) -> bool {
        let Some(index) = self.constraints.iter().position(|c| c.id == *id) else {
            return false;
        };
        let removed = self.constraints.remove(index);
        info!("Removed {} constraint {}", removed.constraint_type, id);
        self.notify();
        true
    }

    /// Flip `active`, or set it when `active` is given. Does not solve.
    /// Returns false if the constraint does not exist.
    pub fn toggle_constraint(&mut self, id: &ConstraintId, active: Option<bool>) -> bool {
        let Some(constraint) = self.constraints.iter_mut().find(|c| c.id == *id) else {
            return false;
        };
        constraint.active = active.unwrap_or(!constraint.active);
        constraint.metadata.touch();
        info!("Constraint {} active: {}", id, constraint.active);
        self.notify();
        true
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn get_all_constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn get_constraint(&self, id: &ConstraintId) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.id == *id)
    }

    pub fn get_constraints_for_entity(&self, entity_id: &EntityId) -> Vec<&Constraint> {
        self.constraints.iter().filter(|c| c.references(entity_id)).collect()
    }

    pub fn get_active_constraints(&self) -> Vec<&Constraint> {
        self.constraints.iter().filter(|c| c.active).collect()
    }

    pub fn last_report(&self) -> Option<&SolveReport> {
        self.last_report.as_ref()
    }

    pub fn degrees_of_freedom(&self) -> DofReport {
        degrees_of_freedom(&self.constraints, &self.entities)
    }

    // =========================================================================
    // Solving
    // =========================================================================

    /// Run one pass over the active constraints and apply the results.
    ///
    /// Inactive constraints keep their last verdict and get no solution.
    pub fn solve_constraints(&mut self) -> Vec<ConstraintSolution> {
        let pass = self.solver.run(&self.constraints, &self.entities);

        let verdicts: HashMap<ConstraintId, bool> =
            pass.solutions.iter().map(|s| (s.constraint_id, s.satisfied)).collect();
        for constraint in &mut self.constraints {
            if let Some(&satisfied) = verdicts.get(&constraint.id) {
                if constraint.satisfied != satisfied {
                    constraint.satisfied = satisfied;
                    constraint.metadata.touch();
                }
            }
        }

        let merged: HashMap<EntityId, EntityUpdate> = pass
            .entities
            .iter()
            .filter_map(|(id, new)| {
                let old = self.entities.get(id)?;
                old.diff(new).map(|update| (*id, update))
            })
            .collect();

        if !merged.is_empty() {
            match self.store.as_mut() {
                Some(store) => {
                    debug!("Forwarding updates for {} entities to the geometry store", merged.len());
                    store.apply_updates(&merged);
                }
                None => debug!("No geometry store attached; {} entity updates kept locally", merged.len()),
            }
        }

        self.entities = pass.entities;
        self.last_report = Some(pass.report);
        self.notify();
        pass.solutions
    }

    /// Create the constraints suggested for every unordered pair of `entity_ids`.
    ///
    /// Pairs with a missing entity, no suggestion, or an equivalent existing
    /// constraint are skipped.
    pub fn create_auto_constraints(&mut self, entity_ids: &[EntityId]) -> Vec<ConstraintId> {
        let mut created = Vec::new();

        for (i, first) in entity_ids.iter().enumerate() {
            for second in &entity_ids[i + 1..] {
                let (Some(a), Some(b)) = (self.entities.get(first), self.entities.get(second)) else {
                    debug!("Skipping auto-constraint pair {} / {}: entity missing", first, second);
                    continue;
                };
                let Some(constraint_type) = suggest_constraint(a, b, &self.auto_config) else {
                    continue;
                };

                let pair = [*first, *second];
                let exists = self
                    .constraints
                    .iter()
                    .any(|c| c.constraint_type == constraint_type && same_entity_set(&c.entity_ids, &pair));
                if exists {
                    debug!("{} already constrains {} / {}", constraint_type, first, second);
                    continue;
                }

                let request = ConstraintCreationParams::new(constraint_type, pair.to_vec())
                    .with_priority(Priority::LOW)
                    .with_description(heuristic_label(constraint_type));
                match self.create_constraint(request) {
                    Ok(id) => created.push(id),
                    Err(e) => warn!("Auto-constraint {} rejected: {}", constraint_type, e),
                }
            }
        }

        created
    }

    // =========================================================================
    // Change notification
    // =========================================================================

    pub fn add_change_listener<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&[Constraint]) -> Result<(), ListenerError> + 'static,
    {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn remove_change_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    /// Listener failures are logged and swallowed.
    fn notify(&self) {
        for (id, listener) in &self.listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(&self.constraints))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Change {} failed: {}", id, e),
                Err(panic) => {
                    let e = ListenerError::Panicked(panic_message(panic.as_ref()));
                    warn!("Change {} failed: {}", id, e);
                }
            }
        }
    }
}

impl Default for ConstraintManager {
    fn default() -> Self {
        Self::from_parts(ConstraintSolver::default(), AutoConstraintConfig::default())
    }
}
