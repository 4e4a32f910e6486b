//! 2D geometry utilities for constraint measurement and correction.
//!
//! Pure functions over nalgebra points and vectors. Nothing in here knows
//! about entities or constraints; `sketch::corrections` builds on top.

use super::{Point2, Vector2, EPSILON};
use std::f64::consts::{FRAC_PI_2, PI, TAU};

// =============================================================================
// Point Operations
// =============================================================================

/// Midpoint between two 2D points.
#[inline]
pub fn midpoint(p1: &Point2, p2: &Point2) -> Point2 {
    nalgebra::center(p1, p2)
}

// =============================================================================
// Vector Operations
// =============================================================================

/// 2D cross product (z-component of 3D cross product).
/// Positive if v2 is counter-clockwise from v1.
#[inline]
pub fn cross_2d(v1: &Vector2, v2: &Vector2) -> f64 {
    v1.x * v2.y - v1.y * v2.x
}

/// Perpendicular vector (90° counter-clockwise rotation).
#[inline]
pub fn perpendicular_ccw(v: &Vector2) -> Vector2 {
    Vector2::new(-v.y, v.x)
}

/// Unit vector pointing at `angle` radians from +x.
#[inline]
pub fn direction(angle: f64) -> Vector2 {
    Vector2::new(angle.cos(), angle.sin())
}

// =============================================================================
// Angles
// =============================================================================

/// Direction angle of the segment start -> end, in (-π, π].
#[inline]
pub fn segment_angle(start: &Point2, end: &Point2) -> f64 {
    let d = end - start;
    d.y.atan2(d.x)
}

/// Wrap an angle into (-π, π].
pub fn normalize_angle(angle: f64) -> f64 {
    let mut a = angle % TAU;
    if a <= -PI {
        a += TAU;
    } else if a > PI {
        a -= TAU;
    }
    a
}

/// Smallest angle between two undirected lines, in [0, π/2].
pub fn angular_difference_mod_pi(a1: f64, a2: f64) -> f64 {
    let delta = (a1 - a2).rem_euclid(PI);
    delta.min(PI - delta)
}

/// Of the two headings `target` and `target + π`, pick the one closer to `current`.
pub fn nearest_orientation(target: f64, current: f64) -> f64 {
    let flipped = target + PI;
    if normalize_angle(current - target).abs() <= normalize_angle(current - flipped).abs() {
        target
    } else {
        flipped
    }
}

/// Of `reference + π/2` and `reference - π/2`, pick the one closer to `current`.
pub fn nearest_perpendicular(reference: f64, current: f64) -> f64 {
    nearest_orientation(reference + FRAC_PI_2, current)
}

// =============================================================================
// Line Operations
// =============================================================================

/// Signed perpendicular distance from `point` to the infinite line through
/// start/end. Positive on the left (counter-clockwise) side.
/// Returns `None` for a degenerate line.
pub fn signed_distance_to_line(start: &Point2, end: &Point2, point: &Point2) -> Option<f64> {
    let d = end - start;
    let len = d.norm();
    if len < EPSILON {
        return None;
    }
    Some(cross_2d(&d, &(point - start)) / len)
}

/// Unit normal (left-hand) of the line start -> end.
pub fn line_normal(start: &Point2, end: &Point2) -> Option<Vector2> {
    let d = end - start;
    let len = d.norm();
    if len < EPSILON {
        return None;
    }
    Some(perpendicular_ccw(&(d / len)))
}

/// Reflect `point` across the infinite line through start/end.
pub fn reflect_across_line(start: &Point2, end: &Point2, point: &Point2) -> Option<Point2> {
    let d = end - start;
    let len_sq = d.norm_squared();
    if len_sq < EPSILON * EPSILON {
        return None;
    }
    let t = (point - start).dot(&d) / len_sq;
    let foot = start + d * t;
    Some(foot + (foot - point))
}

/// Endpoint of a segment that starts at `start`, points at `angle` and has `length`.
pub fn endpoint_at(start: &Point2, angle: f64, length: f64) -> Point2 {
    start + direction(angle) * length
}
