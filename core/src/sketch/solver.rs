use super::config::{ConfigError, SolverConfig};
use super::corrections::{correct, residual};
use super::types::{Constraint, ConstraintType, ParameterKey};
use crate::geometry::{Entity, EntityKind, EntityMap, EntityUpdate};
use crate::ids::{ConstraintId, EntityId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a single constraint could not be resolved in a pass.
///
/// Isolated to that constraint's solution; the rest of the batch still solves.
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
pub enum SolveError {
    #[error("Entity {id} is missing from the current snapshot")]
    EntityNotFound { id: EntityId },

    #[error("Entity {id} is a {actual}, expected a {expected}")]
    WrongEntityType {
        id: EntityId,
        expected: String,
        actual: EntityKind,
    },

    #[error("Degenerate geometry on entity {id}: {reason}")]
    DegenerateGeometry { id: EntityId, reason: String },

    #[error("{constraint_type} is missing its {key} parameter")]
    MissingParameter {
        constraint_type: ConstraintType,
        key: ParameterKey,
    },

    #[error("Malformed constraint: {0}")]
    Malformed(String),

    #[error("Internal solver error: {0}")]
    Internal(String),
}

/// Outcome of one constraint in a solve pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSolution {
    pub constraint_id: ConstraintId,
    pub satisfied: bool,
    /// Partial updates for the entities this constraint moved
    pub entity_updates: HashMap<EntityId, EntityUpdate>,
    /// Corrective steps applied (0 when already satisfied)
    pub iterations: u32,
    /// Residual against the geometry at the end of the pass
    pub residual: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SolveError>,
}

/// Information about a constraint that repeats an earlier one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedundantConstraintInfo {
    pub constraint_id: ConstraintId,
    /// The earlier constraint it duplicates
    pub duplicates: ConstraintId,
    pub reason: String,
}

/// Summary of a solve pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveReport {
    pub constraint_count: usize,
    pub satisfied_count: usize,
    pub unsatisfied_count: usize,
    pub total_iterations: u32,
    /// Largest final residual among constraints that solved without error
    pub max_residual: f64,
    pub status_message: String,
    pub redundant_constraints: Vec<RedundantConstraintInfo>,
}

impl SolveReport {
    pub fn all_satisfied(&self) -> bool {
        self.unsatisfied_count == 0
    }
}

/// Degrees of freedom estimate.
/// Negative `remaining` = over-constrained, 0 = fully constrained, positive = under-constrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DofReport {
    pub entity_dof: i32,
    pub constrained_dof: i32,
    pub remaining: i32,
}

impl DofReport {
    pub fn is_fully_constrained(&self) -> bool {
        self.remaining == 0
    }

    pub fn is_under_constrained(&self) -> bool {
        self.remaining > 0
    }

    pub fn is_over_constrained(&self) -> bool {
        self.remaining < 0
    }
}

/// Everything a solve pass produces: per-constraint solutions, the final
/// geometry and the summary.
#[derive(Debug, Clone)]
pub struct SolvePass {
    pub solutions: Vec<ConstraintSolution>,
    pub entities: EntityMap,
    pub report: SolveReport,
}

/// Per-constraint result before the final verification sweep.
pub(super) struct Attempt {
    pub(super) updates: HashMap<EntityId, EntityUpdate>,
    pub(super) iterations: u32,
    pub(super) error: Option<SolveError>,
}

/// Values of the entities `constraint` references, as they are now.
fn referenced_entities(constraint: &Constraint, working: &EntityMap) -> HashMap<EntityId, Entity> {
    constraint
        .entity_ids
        .iter()
        .filter_map(|id| working.get(id).map(|e| (*id, e.clone())))
        .collect()
}

fn restore(before: &HashMap<EntityId, Entity>, working: &mut EntityMap) {
    for (id, entity) in before {
        working.insert(*id, entity.clone());
    }
}

/// Run `step` with panic isolation. A panic restores `before` and is
/// reported as [`SolveError::Internal`].
pub(super) fn isolate<F>(
    constraint: &Constraint,
    before: &HashMap<EntityId, Entity>,
    working: &mut EntityMap,
    step: F,
) -> Attempt
where
    F: FnOnce(&mut EntityMap) -> Attempt,
{
    match catch_unwind(AssertUnwindSafe(|| step(working))) {
        Ok(attempt) => attempt,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            warn!("Constraint {} panicked during solve: {}", constraint.id, message);
            restore(before, working);
            Attempt {
                updates: HashMap::new(),
                iterations: 0,
                error: Some(SolveError::Internal(message)),
            }
        }
    }
}

/// Greedy, priority-ordered constraint solver.
///
/// Each active constraint is solved against the geometry as left by the
/// constraints before it, so results depend on order. Higher priority runs
/// first; ties keep their input order.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSolver {
    config: SolverConfig,
}

impl ConstraintSolver {
    /// Fails if `config` is out of range.
    pub fn new(config: SolverConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// One solution per active constraint, in solve order.
    pub fn solve(&self, constraints: &[Constraint], entities: &EntityMap) -> Vec<ConstraintSolution> {
        self.run(constraints, entities).solutions
    }

    pub fn solve_with_report(
        &self,
        constraints: &[Constraint],
        entities: &EntityMap,
    ) -> (Vec<ConstraintSolution>, SolveReport) {
        let pass = self.run(constraints, entities);
        (pass.solutions, pass.report)
    }

    /// Run a full pass. `entities` is never mutated; the final geometry is
    /// returned in the pass.
    pub fn run(&self, constraints: &[Constraint], entities: &EntityMap) -> SolvePass {
        let mut working = entities.clone();

        let mut order: Vec<&Constraint> = constraints.iter().filter(|c| c.active).collect();
        order.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut attempts = Vec::with_capacity(order.len());
        for constraint in &order {
            let before = referenced_entities(constraint, &working);
            let attempt = isolate(constraint, &before, &mut working, |working| {
                self.solve_one(constraint, &before, working)
            });
            attempts.push(attempt);
        }

        // Verdicts reflect the geometry at the end of the pass, not at the
        // moment each constraint was handled.
        let mut solutions = Vec::with_capacity(order.len());
        for (constraint, attempt) in order.iter().zip(attempts) {
            let (satisfied, final_residual, error) = match attempt.error {
                Some(e) => (false, f64::INFINITY, Some(e)),
                None => match residual(constraint, &working) {
                    Ok(r) => (r < self.config.tolerance, r, None),
                    Err(e) => (false, f64::INFINITY, Some(e)),
                },
            };
            solutions.push(ConstraintSolution {
                constraint_id: constraint.id,
                satisfied,
                entity_updates: attempt.updates,
                iterations: attempt.iterations,
                residual: final_residual,
                error,
            });
        }

        let report = self.build_report(&order, &solutions);
        info!(
            "Solve pass: {}/{} constraints satisfied in {} iterations",
            report.satisfied_count, report.constraint_count, report.total_iterations
        );

        SolvePass { solutions, entities: working, report }
    }

    /// Iterate one constraint to tolerance, bounded by `max_iterations`.
    ///
    /// On error, every entity the constraint touched is restored.
    fn solve_one(&self, constraint: &Constraint, before: &HashMap<EntityId, Entity>, working: &mut EntityMap) -> Attempt {
        let mut iterations = 0;
        let result = self.iterate(constraint, working, &mut iterations);

        if let Err(e) = result {
            warn!("Constraint {} ({}) failed: {}", constraint.id, constraint.constraint_type, e);
            restore(before, working);
            return Attempt { updates: HashMap::new(), iterations, error: Some(e) };
        }

        let updates = before
            .iter()
            .filter_map(|(id, old)| {
                let new = working.get(id)?;
                old.diff(new).map(|update| (*id, update))
            })
            .collect();

        Attempt { updates, iterations, error: None }
    }

    fn iterate(&self, constraint: &Constraint, working: &mut EntityMap, iterations: &mut u32) -> Result<(), SolveError> {
        let tolerance = self.config.tolerance;
        let mut current = residual(constraint, working)?;

        while current >= tolerance && *iterations < self.config.max_iterations {
            for (id, entity) in correct(constraint, working, &self.config)? {
                working.insert(id, entity);
            }
            *iterations += 1;

            let next = residual(constraint, working)?;
            if next >= current {
                debug!(
                    "Constraint {} made no progress at iteration {} (residual {:.3e})",
                    constraint.id, iterations, next
                );
                break;
            }
            current = next;
        }

        debug!(
            "Constraint {} ({}) settled after {} iterations, residual {:.3e}",
            constraint.id, constraint.constraint_type, iterations, current
        );
        Ok(())
    }

    fn build_report(&self, order: &[&Constraint], solutions: &[ConstraintSolution]) -> SolveReport {
        let satisfied_count = solutions.iter().filter(|s| s.satisfied).count();
        let unsatisfied_count = solutions.len() - satisfied_count;
        let total_iterations = solutions.iter().map(|s| s.iterations).sum();
        let max_residual = solutions
            .iter()
            .filter(|s| s.error.is_none())
            .map(|s| s.residual)
            .fold(0.0, f64::max);

        let status_message = if solutions.is_empty() {
            "No active constraints".to_string()
        } else if unsatisfied_count == 0 {
            "All constraints satisfied".to_string()
        } else {
            format!("{} of {} constraints unsatisfied", unsatisfied_count, solutions.len())
        };

        SolveReport {
            constraint_count: solutions.len(),
            satisfied_count,
            unsatisfied_count,
            total_iterations,
            max_residual,
            status_message,
            redundant_constraints: detect_redundant_constraints(order),
        }
    }
}

/// Exact duplicates: same type, same unordered entity set, equal parameters.
fn detect_redundant_constraints(constraints: &[&Constraint]) -> Vec<RedundantConstraintInfo> {
    let mut redundant = Vec::new();
    for (j, later) in constraints.iter().enumerate() {
        if let Some(earlier) = constraints[..j].iter().find(|c| c.duplicates(later)) {
            redundant.push(RedundantConstraintInfo {
                constraint_id: later.id,
                duplicates: earlier.id,
                reason: format!("Exact duplicate of {} constraint {}", earlier.constraint_type, earlier.id),
            });
        }
    }
    redundant
}

/// DOF of all entities in the snapshot minus the equations of active constraints.
pub fn degrees_of_freedom(constraints: &[Constraint], entities: &EntityMap) -> DofReport {
    let entity_dof = entities.values().map(|e| e.degrees_of_freedom()).sum();
    let constrained_dof = constraints
        .iter()
        .filter(|c| c.active)
        .map(|c| c.constraint_type.equation_count(c.entity_ids.len()))
        .sum();
    DofReport {
        entity_dof,
        constrained_dof,
        remaining: entity_dof - constrained_dof,
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
