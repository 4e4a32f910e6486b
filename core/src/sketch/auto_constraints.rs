//! Constraint suggestions for near-satisfied entity pairs.
//!
//! Line pairs: nearly parallel or nearly perpendicular.
//! Circle/arc pairs: nearly concentric, otherwise nearly equal radius.
//! Thresholds come from [`AutoConstraintConfig`].

use super::config::AutoConstraintConfig;
use super::types::ConstraintType;
use crate::geometry::utils_2d::segment_angle;
use crate::geometry::{dist, Entity, EPSILON};
use std::f64::consts::FRAC_PI_2;

pub use crate::geometry::utils_2d::angular_difference_mod_pi;

/// Suggest a constraint for a pair of entities, if any heuristic fires.
///
/// PARALLEL is tested before PERPENDICULAR. Pairs of any other kinds (or a
/// degenerate line) get no suggestion.
pub fn suggest_constraint(a: &Entity, b: &Entity, config: &AutoConstraintConfig) -> Option<ConstraintType> {
    if let (Some((s1, e1)), Some((s2, e2))) = (a.as_line(), b.as_line()) {
        if dist(&s1, &e1) < EPSILON || dist(&s2, &e2) < EPSILON {
            return None;
        }
        let delta = angular_difference_mod_pi(segment_angle(&s1, &e1), segment_angle(&s2, &e2));

        if delta < config.parallel_threshold_deg.to_radians() {
            return Some(ConstraintType::Parallel);
        }
        if (delta - FRAC_PI_2).abs() < config.perpendicular_threshold_deg.to_radians() {
            return Some(ConstraintType::Perpendicular);
        }
        return None;
    }

    if let (Some((c1, r1)), Some((c2, r2))) = (a.as_circular(), b.as_circular()) {
        if dist(&c1, &c2) < config.concentric_distance {
            return Some(ConstraintType::Concentric);
        }
        if (r1 - r2).abs() < config.equal_radius_delta {
            return Some(ConstraintType::EqualRadius);
        }
    }

    None
}

/// Short label for the heuristic behind a suggestion, used in descriptions.
pub fn heuristic_label(constraint_type: ConstraintType) -> &'static str {
    match constraint_type {
        ConstraintType::Parallel => "auto: near-parallel lines",
        ConstraintType::Perpendicular => "auto: near-perpendicular lines",
        ConstraintType::Concentric => "auto: near-concentric circles",
        ConstraintType::EqualRadius => "auto: near-equal radii",
        _ => "auto",
    }
}
