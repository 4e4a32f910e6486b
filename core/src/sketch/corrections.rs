//! Per-type residuals and corrective steps.
//!
//! `residual` measures how far a constraint is from holding (0 = exact).
//! `correct` computes the new values of the entities the constraint moves,
//! treating the other referenced entities as fixed. Neither touches the
//! geometry map; the solver decides what to keep.

use super::config::{DistanceMode, SolverConfig};
use super::solver::SolveError;
use super::types::{Constraint, ConstraintType, ParameterKey};
use crate::geometry::utils_2d::{
    angular_difference_mod_pi, endpoint_at, line_normal, midpoint, nearest_orientation,
    nearest_perpendicular, normalize_angle, reflect_across_line, segment_angle,
    signed_distance_to_line,
};
use crate::geometry::{dist, Entity, EntityMap, Point2, Vector2, EPSILON};
use crate::ids::EntityId;
use std::f64::consts::FRAC_PI_2;

/// New entity values produced by one corrective step.
pub(crate) type Changes = Vec<(EntityId, Entity)>;

const LINE: &str = "line";
const CIRCULAR: &str = "circle or arc";

struct Line {
    id: EntityId,
    start: Point2,
    end: Point2,
}

impl Line {
    fn length(&self) -> f64 {
        dist(&self.start, &self.end)
    }

    /// Direction angle; fails for a zero-length line.
    fn angle(&self) -> Result<f64, SolveError> {
        if self.length() < EPSILON {
            return Err(SolveError::DegenerateGeometry {
                id: self.id,
                reason: "line has zero length".to_string(),
            });
        }
        Ok(segment_angle(&self.start, &self.end))
    }

    fn normal(&self) -> Result<Vector2, SolveError> {
        line_normal(&self.start, &self.end).ok_or_else(|| SolveError::DegenerateGeometry {
            id: self.id,
            reason: "line has zero length".to_string(),
        })
    }

    fn signed_distance(&self, point: &Point2) -> Result<f64, SolveError> {
        signed_distance_to_line(&self.start, &self.end, point).ok_or_else(|| {
            SolveError::DegenerateGeometry {
                id: self.id,
                reason: "line has zero length".to_string(),
            }
        })
    }

    /// Same start and length, new heading.
    fn rotated_to(&self, angle: f64) -> (Point2, Point2) {
        (self.start, endpoint_at(&self.start, angle, self.length()))
    }

    /// Same start and heading, new length. A zero-length line grows along +x.
    fn resized_to(&self, length: f64) -> (Point2, Point2) {
        let angle = if self.length() < EPSILON {
            0.0
        } else {
            segment_angle(&self.start, &self.end)
        };
        (self.start, endpoint_at(&self.start, angle, length))
    }
}

fn entity_id(c: &Constraint, index: usize) -> Result<EntityId, SolveError> {
    c.entity_ids.get(index).copied().ok_or_else(|| {
        SolveError::Malformed(format!(
            "{} has {} entities, needs index {}",
            c.constraint_type,
            c.entity_ids.len(),
            index
        ))
    })
}

fn entity<'a>(c: &Constraint, entities: &'a EntityMap, index: usize) -> Result<&'a Entity, SolveError> {
    let id = entity_id(c, index)?;
    entities.get(&id).ok_or(SolveError::EntityNotFound { id })
}

fn line(c: &Constraint, entities: &EntityMap, index: usize) -> Result<Line, SolveError> {
    let id = entity_id(c, index)?;
    let e = entity(c, entities, index)?;
    match e.as_line() {
        Some((start, end)) => Ok(Line { id, start, end }),
        None => Err(SolveError::WrongEntityType {
            id,
            expected: LINE.to_string(),
            actual: e.kind(),
        }),
    }
}

fn circular(c: &Constraint, entities: &EntityMap, index: usize) -> Result<(Point2, f64), SolveError> {
    let id = entity_id(c, index)?;
    let e = entity(c, entities, index)?;
    e.as_circular().ok_or_else(|| SolveError::WrongEntityType {
        id,
        expected: CIRCULAR.to_string(),
        actual: e.kind(),
    })
}

fn float_param(c: &Constraint, key: ParameterKey) -> Result<f64, SolveError> {
    c.parameters.float(key).ok_or(SolveError::MissingParameter {
        constraint_type: c.constraint_type,
        key,
    })
}

fn point_param(c: &Constraint, key: ParameterKey) -> Result<Point2, SolveError> {
    c.parameters.point(key).ok_or(SolveError::MissingParameter {
        constraint_type: c.constraint_type,
        key,
    })
}

fn offset_param(c: &Constraint) -> Result<Vector2, SolveError> {
    c.parameters.vector(ParameterKey::Offset).ok_or(SolveError::MissingParameter {
        constraint_type: c.constraint_type,
        key: ParameterKey::Offset,
    })
}

/// Tangent constraints accept (circle, line), (line, circle) and (circle, circle).
enum TangentPair {
    CircleLine { center: Point2, radius: f64, line: Line },
    CircleCircle { c1: Point2, r1: f64, c2: Point2, r2: f64, moved: EntityId },
}

fn tangent_pair(c: &Constraint, entities: &EntityMap) -> Result<TangentPair, SolveError> {
    let first = entity(c, entities, 0)?;
    let second = entity(c, entities, 1)?;
    match (first.as_circular(), second.as_circular()) {
        (Some((c1, r1)), Some((c2, r2))) => Ok(TangentPair::CircleCircle {
            c1,
            r1,
            c2,
            r2,
            moved: entity_id(c, 1)?,
        }),
        (Some((center, radius)), None) => Ok(TangentPair::CircleLine {
            center,
            radius,
            line: line(c, entities, 1)?,
        }),
        (None, Some((center, radius))) => Ok(TangentPair::CircleLine {
            center,
            radius,
            line: line(c, entities, 0)?,
        }),
        (None, None) => Err(SolveError::WrongEntityType {
            id: entity_id(c, 0)?,
            expected: CIRCULAR.to_string(),
            actual: first.kind(),
        }),
    }
}

/// Circle-circle tangency distance nearest to the current center distance.
/// Equal radii always touch externally.
fn tangent_target(d: f64, r1: f64, r2: f64) -> f64 {
    let external = r1 + r2;
    let internal = (r1 - r2).abs();
    if internal < EPSILON || (d - external).abs() <= (d - internal).abs() {
        external
    } else {
        internal
    }
}

/// Unit vector from `from` to `to`, +x when they coincide.
fn unit_towards(from: &Point2, to: &Point2) -> (Vector2, f64) {
    let v = to - from;
    let len = v.norm();
    if len < EPSILON {
        (Vector2::new(1.0, 0.0), len)
    } else {
        (v / len, len)
    }
}

/// Current and target signed distance of a circle center from a tangent line.
///
/// A touch point puts the line on that side of the center; otherwise the
/// line stays on its current side.
fn line_tangent_offsets(c: &Constraint, center: &Point2, radius: f64, line: &Line) -> Result<(f64, f64), SolveError> {
    let s = line.signed_distance(center)?;
    let side = match c.parameters.point(ParameterKey::Point) {
        Some(touch) => (touch - center).dot(&line.normal()?),
        None => 0.0,
    };
    let target = if side.abs() < EPSILON {
        side_target(s, radius)
    } else if side > 0.0 {
        -radius
    } else {
        radius
    };
    Ok((s, target))
}

/// Signed distance target that keeps `current` on its side of the line.
fn side_target(current: f64, magnitude: f64) -> f64 {
    if current >= 0.0 {
        magnitude
    } else {
        -magnitude
    }
}

fn pattern_target(origin: &Point2, offset: &Vector2, index: usize) -> Point2 {
    origin + offset * index as f64
}

/// How far `c` is from holding on `entities`.
pub(crate) fn residual(c: &Constraint, entities: &EntityMap) -> Result<f64, SolveError> {
    match c.constraint_type {
        ConstraintType::Parallel => {
            let (l1, l2) = (line(c, entities, 0)?, line(c, entities, 1)?);
            Ok(angular_difference_mod_pi(l1.angle()?, l2.angle()?))
        }
        ConstraintType::Perpendicular => {
            let (l1, l2) = (line(c, entities, 0)?, line(c, entities, 1)?);
            Ok((angular_difference_mod_pi(l1.angle()?, l2.angle()?) - FRAC_PI_2).abs())
        }
        ConstraintType::Horizontal => {
            let l = line(c, entities, 0)?;
            Ok((l.end.y - l.start.y).abs())
        }
        ConstraintType::Vertical => {
            let l = line(c, entities, 0)?;
            Ok((l.end.x - l.start.x).abs())
        }
        ConstraintType::Tangent => match tangent_pair(c, entities)? {
            TangentPair::CircleLine { center, radius, line } => {
                let (s, target) = line_tangent_offsets(c, &center, radius, &line)?;
                Ok((s - target).abs())
            }
            TangentPair::CircleCircle { c1, r1, c2, r2, .. } => {
                let d = dist(&c1, &c2);
                Ok((d - tangent_target(d, r1, r2)).abs())
            }
        },
        ConstraintType::Concentric => {
            let ((c1, _), (c2, _)) = (circular(c, entities, 0)?, circular(c, entities, 1)?);
            Ok(dist(&c1, &c2))
        }
        ConstraintType::Coincident => {
            let anchor = entity(c, entities, 0)?.reference_point();
            let mut worst: f64 = 0.0;
            for i in 1..c.entity_ids.len() {
                worst = worst.max(dist(&anchor, &entity(c, entities, i)?.reference_point()));
            }
            Ok(worst)
        }
        ConstraintType::Collinear => {
            let (l1, l2) = (line(c, entities, 0)?, line(c, entities, 1)?);
            let d_start = l1.signed_distance(&l2.start)?.abs();
            let d_end = l1.signed_distance(&l2.end)?.abs();
            Ok(d_start.max(d_end))
        }
        ConstraintType::EqualLength => {
            let (l1, l2) = (line(c, entities, 0)?, line(c, entities, 1)?);
            Ok((l1.length() - l2.length()).abs())
        }
        ConstraintType::EqualRadius => {
            let ((_, r1), (_, r2)) = (circular(c, entities, 0)?, circular(c, entities, 1)?);
            Ok((r1 - r2).abs())
        }
        ConstraintType::Symmetric => {
            let p1 = entity(c, entities, 0)?.reference_point();
            let p2 = entity(c, entities, 1)?.reference_point();
            let axis = line(c, entities, 2)?;
            let mirrored = mirror(&axis, &p1)?;
            Ok(dist(&p2, &mirrored))
        }
        ConstraintType::Midpoint => {
            let p = entity(c, entities, 0)?.reference_point();
            let l = line(c, entities, 1)?;
            Ok(dist(&p, &midpoint(&l.start, &l.end)))
        }
        ConstraintType::Distance => {
            let target = float_param(c, ParameterKey::Distance)?;
            let p1 = entity(c, entities, 0)?.reference_point();
            let p2 = entity(c, entities, 1)?.reference_point();
            Ok((dist(&p1, &p2) - target).abs())
        }
        ConstraintType::Angle => {
            let target = float_param(c, ParameterKey::Angle)?;
            let (l1, l2) = (line(c, entities, 0)?, line(c, entities, 1)?);
            Ok(normalize_angle(l2.angle()? - l1.angle()? - target).abs())
        }
        ConstraintType::Radius => {
            let target = float_param(c, ParameterKey::Radius)?;
            let (_, r) = circular(c, entities, 0)?;
            Ok((r - target).abs())
        }
        ConstraintType::Diameter => {
            let target = float_param(c, ParameterKey::Diameter)?;
            let (_, r) = circular(c, entities, 0)?;
            Ok((2.0 * r - target).abs())
        }
        ConstraintType::Length => {
            let target = float_param(c, ParameterKey::Length)?;
            Ok((line(c, entities, 0)?.length() - target).abs())
        }
        ConstraintType::Fix => {
            let target = point_param(c, ParameterKey::Point)?;
            Ok(dist(&entity(c, entities, 0)?.reference_point(), &target))
        }
        ConstraintType::Pattern => {
            let offset = offset_param(c)?;
            let origin = entity(c, entities, 0)?.reference_point();
            let mut worst: f64 = 0.0;
            for i in 1..c.entity_ids.len() {
                let p = entity(c, entities, i)?.reference_point();
                worst = worst.max(dist(&p, &pattern_target(&origin, &offset, i)));
            }
            Ok(worst)
        }
        ConstraintType::OffsetDistance => {
            let target = float_param(c, ParameterKey::Distance)?;
            let (l1, l2) = (line(c, entities, 0)?, line(c, entities, 1)?);
            let s_start = l1.signed_distance(&l2.start)?;
            let s_end = l1.signed_distance(&l2.end)?;
            let side = side_target(s_start, target);
            Ok((s_start - side).abs().max((s_end - side).abs()))
        }
    }
}

fn mirror(axis: &Line, point: &Point2) -> Result<Point2, SolveError> {
    reflect_across_line(&axis.start, &axis.end, point).ok_or_else(|| SolveError::DegenerateGeometry {
        id: axis.id,
        reason: "symmetry axis has zero length".to_string(),
    })
}

/// One corrective step for `c`. Iterated families scale their translation
/// by `config.damping_factor`; everything else applies the exact fix.
pub(crate) fn correct(c: &Constraint, entities: &EntityMap, config: &SolverConfig) -> Result<Changes, SolveError> {
    let line_change = |l: &Line, (start, end): (Point2, Point2)| (l.id, Entity::Line { start, end });
    let damping = if c.constraint_type.is_iterative() { config.damping_factor } else { 1.0 };

    match c.constraint_type {
        ConstraintType::Parallel => {
            let (l1, l2) = (line(c, entities, 0)?, line(c, entities, 1)?);
            let target = nearest_orientation(l1.angle()?, l2.angle()?);
            Ok(vec![line_change(&l2, l2.rotated_to(target))])
        }
        ConstraintType::Perpendicular => {
            let (l1, l2) = (line(c, entities, 0)?, line(c, entities, 1)?);
            let target = nearest_perpendicular(l1.angle()?, l2.angle()?);
            Ok(vec![line_change(&l2, l2.rotated_to(target))])
        }
        ConstraintType::Horizontal => {
            let l = line(c, entities, 0)?;
            let end = Point2::new(l.end.x, l.start.y);
            Ok(vec![line_change(&l, (l.start, end))])
        }
        ConstraintType::Vertical => {
            let l = line(c, entities, 0)?;
            let end = Point2::new(l.start.x, l.end.y);
            Ok(vec![line_change(&l, (l.start, end))])
        }
        ConstraintType::Tangent => match tangent_pair(c, entities)? {
            TangentPair::CircleLine { center, radius, line } => {
                let (s, target) = line_tangent_offsets(c, &center, radius, &line)?;
                let shift = line.normal()? * (s - target);
                Ok(vec![line_change(&line, (line.start + shift, line.end + shift))])
            }
            TangentPair::CircleCircle { c1, r1, c2, r2, moved } => {
                let (dir, d) = unit_towards(&c1, &c2);
                let target = c1 + dir * tangent_target(d, r1, r2);
                let e = entities.get(&moved).ok_or(SolveError::EntityNotFound { id: moved })?;
                Ok(vec![(moved, e.translated(&(target - c2)))])
            }
        },
        ConstraintType::Concentric => {
            let (c1, _) = circular(c, entities, 0)?;
            let id = entity_id(c, 1)?;
            Ok(vec![(id, entity(c, entities, 1)?.moved_to(&c1))])
        }
        ConstraintType::Coincident => {
            let anchor = entity(c, entities, 0)?.reference_point();
            let mut changes = Vec::with_capacity(c.entity_ids.len() - 1);
            for i in 1..c.entity_ids.len() {
                changes.push((entity_id(c, i)?, entity(c, entities, i)?.moved_to(&anchor)));
            }
            Ok(changes)
        }
        ConstraintType::Collinear => {
            let (l1, l2) = (line(c, entities, 0)?, line(c, entities, 1)?);
            let target = nearest_orientation(l1.angle()?, l2.angle()?);
            let (start, end) = l2.rotated_to(target);
            let shift = l1.normal()? * -l1.signed_distance(&start)?;
            Ok(vec![line_change(&l2, (start + shift, end + shift))])
        }
        ConstraintType::EqualLength => {
            let (l1, l2) = (line(c, entities, 0)?, line(c, entities, 1)?);
            Ok(vec![line_change(&l2, l2.resized_to(l1.length()))])
        }
        ConstraintType::EqualRadius => {
            let (_, r1) = circular(c, entities, 0)?;
            let id = entity_id(c, 1)?;
            Ok(vec![(id, entity(c, entities, 1)?.with_radius(r1))])
        }
        ConstraintType::Symmetric => {
            let p1 = entity(c, entities, 0)?.reference_point();
            let axis = line(c, entities, 2)?;
            let target = mirror(&axis, &p1)?;
            Ok(vec![(entity_id(c, 1)?, entity(c, entities, 1)?.moved_to(&target))])
        }
        ConstraintType::Midpoint => {
            let l = line(c, entities, 1)?;
            let target = midpoint(&l.start, &l.end);
            Ok(vec![(entity_id(c, 0)?, entity(c, entities, 0)?.moved_to(&target))])
        }
        ConstraintType::Distance => {
            let target = float_param(c, ParameterKey::Distance)?;
            let (id1, id2) = (entity_id(c, 0)?, entity_id(c, 1)?);
            let (e1, e2) = (entity(c, entities, 0)?, entity(c, entities, 1)?);
            let (dir, current) = unit_towards(&e1.reference_point(), &e2.reference_point());
            let delta = dir * ((target - current) * damping);
            match config.distance_mode {
                DistanceMode::MoveSecond => Ok(vec![(id2, e2.translated(&delta))]),
                DistanceMode::Symmetric => {
                    let half = delta * 0.5;
                    Ok(vec![(id1, e1.translated(&-half)), (id2, e2.translated(&half))])
                }
            }
        }
        ConstraintType::Angle => {
            let target = float_param(c, ParameterKey::Angle)?;
            let (l1, l2) = (line(c, entities, 0)?, line(c, entities, 1)?);
            Ok(vec![line_change(&l2, l2.rotated_to(l1.angle()? + target))])
        }
        ConstraintType::Radius => {
            let target = float_param(c, ParameterKey::Radius)?;
            circular(c, entities, 0)?;
            Ok(vec![(entity_id(c, 0)?, entity(c, entities, 0)?.with_radius(target))])
        }
        ConstraintType::Diameter => {
            let target = float_param(c, ParameterKey::Diameter)?;
            circular(c, entities, 0)?;
            Ok(vec![(entity_id(c, 0)?, entity(c, entities, 0)?.with_radius(target / 2.0))])
        }
        ConstraintType::Length => {
            let target = float_param(c, ParameterKey::Length)?;
            let l = line(c, entities, 0)?;
            Ok(vec![line_change(&l, l.resized_to(target))])
        }
        ConstraintType::Fix => {
            let target = point_param(c, ParameterKey::Point)?;
            Ok(vec![(entity_id(c, 0)?, entity(c, entities, 0)?.moved_to(&target))])
        }
        ConstraintType::Pattern => {
            let offset = offset_param(c)?;
            let origin = entity(c, entities, 0)?.reference_point();
            let mut changes = Vec::with_capacity(c.entity_ids.len() - 1);
            for i in 1..c.entity_ids.len() {
                let target = pattern_target(&origin, &offset, i);
                changes.push((entity_id(c, i)?, entity(c, entities, i)?.moved_to(&target)));
            }
            Ok(changes)
        }
        ConstraintType::OffsetDistance => {
            let target = float_param(c, ParameterKey::Distance)?;
            let (l1, l2) = (line(c, entities, 0)?, line(c, entities, 1)?);
            let heading = nearest_orientation(l1.angle()?, l2.angle()?);
            let (start, end) = l2.rotated_to(heading);
            let s = l1.signed_distance(&start)?;
            let shift = l1.normal()? * ((side_target(s, target) - s) * damping);
            Ok(vec![line_change(&l2, (start + shift, end + shift))])
        }
    }
}
