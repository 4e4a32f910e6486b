//! Parametric constraints over sketch entities.
//!
//! - [`types`]: the constraint model and creation requests
//! - [`validator`]: admission checks run before a constraint is stored
//! - [`solver`]: greedy, priority-ordered solve passes
//! - [`manager`]: lifecycle, change notification and solve orchestration
//! - [`auto_constraints`]: suggestions for near-satisfied pairs

pub mod types;
pub mod config;
pub mod validator;
mod corrections;
pub mod solver;
pub mod manager;
pub mod auto_constraints;

pub use config::{AutoConstraintConfig, ConfigError, DistanceMode, ManagerConfig, SolverConfig};
pub use manager::{ChangeListener, ConstraintManager, GeometryStore, ListenerError, ListenerId};
pub use solver::{ConstraintSolution, ConstraintSolver, DofReport, SolveError, SolveReport};
pub use types::{
    Arity, Constraint, ConstraintCreationParams, ConstraintMetadata, ConstraintParameters, ConstraintType,
    ParameterKey, ParameterValue, Priority,
};
pub use validator::{validate, EntityLookup, ValidationError};

#[cfg(test)]
mod tests_validator;
#[cfg(test)]
mod tests_corrections;
