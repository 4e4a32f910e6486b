//! Tunables for the solver, the auto-constraint heuristics and the manager.
//!
//! All structs deserialize with per-field defaults, so a partial JSON
//! document only overrides what it names.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {field}: {reason}")]
    OutOfRange { field: &'static str, reason: String },
}

/// Which entities a DISTANCE correction may move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMode {
    /// The first entity is the anchor, only the second moves
    #[default]
    MoveSecond,
    /// Both entities move by half the correction
    Symmetric,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Residual below which a constraint counts as satisfied
    pub tolerance: f64,
    /// Upper bound on corrective steps per constraint per pass
    pub max_iterations: u32,
    /// Fraction of the full correction applied per step by iterated families
    pub damping_factor: f64,
    pub distance_mode: DistanceMode,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 100,
            damping_factor: 0.8,
            distance_mode: DistanceMode::MoveSecond,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "tolerance",
                reason: format!("must be a positive number, got {}", self.tolerance),
            });
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::OutOfRange {
                field: "max_iterations",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.damping_factor > 0.0 && self.damping_factor <= 1.0) {
            return Err(ConfigError::OutOfRange {
                field: "damping_factor",
                reason: format!("must be in (0, 1], got {}", self.damping_factor),
            });
        }
        Ok(())
    }
}

/// Thresholds used when proposing constraints for near-satisfied pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoConstraintConfig {
    /// Max angle between two lines (degrees) to suggest PARALLEL
    pub parallel_threshold_deg: f64,
    /// Max deviation from 90° (degrees) to suggest PERPENDICULAR
    pub perpendicular_threshold_deg: f64,
    /// Max center distance to suggest CONCENTRIC
    pub concentric_distance: f64,
    /// Max radius delta to suggest EQUAL_RADIUS
    pub equal_radius_delta: f64,
}

impl Default for AutoConstraintConfig {
    fn default() -> Self {
        Self {
            parallel_threshold_deg: 15.0,
            perpendicular_threshold_deg: 15.0,
            concentric_distance: 10.0,
            equal_radius_delta: 2.0,
        }
    }
}

impl AutoConstraintConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("parallel_threshold_deg", self.parallel_threshold_deg),
            ("perpendicular_threshold_deg", self.perpendicular_threshold_deg),
            ("concentric_distance", self.concentric_distance),
            ("equal_radius_delta", self.equal_radius_delta),
        ];
        for (field, value) in fields {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::OutOfRange {
                    field,
                    reason: format!("must be a non-negative number, got {}", value),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    pub solver: SolverConfig,
    pub auto_constraints: AutoConstraintConfig,
}

impl ManagerConfig {
    /// Parse and validate a JSON config document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: ManagerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.solver.validate()?;
        self.auto_constraints.validate()
    }
}
