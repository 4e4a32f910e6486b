//! Drawable primitives as seen by the constraint core.
//!
//! Entities are immutable values owned by the external drawing store. The
//! solver produces new values and reports the difference as an
//! [`EntityUpdate`]; nothing here mutates in place.

use super::{Point2, Vector2};
use crate::ids::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Snapshot of the drawing geometry for one solve pass.
pub type EntityMap = HashMap<EntityId, Entity>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Entity {
    Point { position: Point2 },
    Line { start: Point2, end: Point2 },
    Circle { center: Point2, radius: f64 },
    Arc { center: Point2, radius: f64, start_angle: f64, end_angle: f64 },
    /// Axis-aligned rectangle anchored at its lower-left corner
    Rectangle { position: Point2, width: f64, height: f64 },
    Polyline { points: Vec<Point2>, closed: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Point,
    Line,
    Circle,
    Arc,
    Rectangle,
    Polyline,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Point => "point",
            Self::Line => "line",
            Self::Circle => "circle",
            Self::Arc => "arc",
            Self::Rectangle => "rectangle",
            Self::Polyline => "polyline",
        };
        write!(f, "{}", name)
    }
}

impl EntityKind {
    /// Circles and arcs both carry a center and a radius.
    pub fn is_circular(&self) -> bool {
        matches!(self, Self::Circle | Self::Arc)
    }
}

impl Entity {
    pub fn line(start: Point2, end: Point2) -> Self {
        Self::Line { start, end }
    }

    pub fn circle(center: Point2, radius: f64) -> Self {
        Self::Circle { center, radius }
    }

    pub fn point(position: Point2) -> Self {
        Self::Point { position }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Point { .. } => EntityKind::Point,
            Self::Line { .. } => EntityKind::Line,
            Self::Circle { .. } => EntityKind::Circle,
            Self::Arc { .. } => EntityKind::Arc,
            Self::Rectangle { .. } => EntityKind::Rectangle,
            Self::Polyline { .. } => EntityKind::Polyline,
        }
    }

    /// The point used by positional constraints (coincident, distance, fix...).
    ///
    /// Point: its position. Line: its start. Circle/Arc: the center.
    /// Rectangle: the anchor corner. Polyline: the first vertex (origin if empty).
    pub fn reference_point(&self) -> Point2 {
        match self {
            Self::Point { position } => *position,
            Self::Line { start, .. } => *start,
            Self::Circle { center, .. } | Self::Arc { center, .. } => *center,
            Self::Rectangle { position, .. } => *position,
            Self::Polyline { points, .. } => points.first().copied().unwrap_or_else(Point2::origin),
        }
    }

    /// Returns (start, end) for a line.
    pub fn as_line(&self) -> Option<(Point2, Point2)> {
        match self {
            Self::Line { start, end } => Some((*start, *end)),
            _ => None,
        }
    }

    /// Returns (center, radius) for a circle or arc.
    pub fn as_circular(&self) -> Option<(Point2, f64)> {
        match self {
            Self::Circle { center, radius } | Self::Arc { center, radius, .. } => Some((*center, *radius)),
            _ => None,
        }
    }

    /// Rigid translation by `delta`.
    pub fn translated(&self, delta: &Vector2) -> Entity {
        match self {
            Self::Point { position } => Self::Point { position: position + delta },
            Self::Line { start, end } => Self::Line { start: start + delta, end: end + delta },
            Self::Circle { center, radius } => Self::Circle { center: center + delta, radius: *radius },
            Self::Arc { center, radius, start_angle, end_angle } => Self::Arc {
                center: center + delta,
                radius: *radius,
                start_angle: *start_angle,
                end_angle: *end_angle,
            },
            Self::Rectangle { position, width, height } => Self::Rectangle {
                position: position + delta,
                width: *width,
                height: *height,
            },
            Self::Polyline { points, closed } => Self::Polyline {
                points: points.iter().map(|p| p + delta).collect(),
                closed: *closed,
            },
        }
    }

    /// Translate so the reference point lands on `target`.
    pub fn moved_to(&self, target: &Point2) -> Entity {
        self.translated(&(target - self.reference_point()))
    }

    /// Same entity with a new radius. Non-circular entities are returned unchanged.
    pub fn with_radius(&self, new_radius: f64) -> Entity {
        match self {
            Self::Circle { center, .. } => Self::Circle { center: *center, radius: new_radius },
            Self::Arc { center, start_angle, end_angle, .. } => Self::Arc {
                center: *center,
                radius: new_radius,
                start_angle: *start_angle,
                end_angle: *end_angle,
            },
            other => other.clone(),
        }
    }

    /// Degrees of freedom this entity contributes to a sketch.
    pub fn degrees_of_freedom(&self) -> i32 {
        match self {
            Self::Point { .. } => 2,
            Self::Line { .. } => 4,
            Self::Circle { .. } => 3,
            Self::Arc { .. } => 5,
            Self::Rectangle { .. } => 4,
            Self::Polyline { points, .. } => 2 * points.len() as i32,
        }
    }

    /// Minimal partial update that turns `self` into `new`.
    ///
    /// Returns `None` when nothing changed. A change of variant cannot be
    /// expressed as a partial update and also returns `None`.
    pub fn diff(&self, new: &Entity) -> Option<EntityUpdate> {
        let update = match (self, new) {
            (Self::Point { position: a }, Self::Point { position: b }) => EntityUpdate::Point {
                position: changed(a, b),
            },
            (Self::Line { start: s1, end: e1 }, Self::Line { start: s2, end: e2 }) => EntityUpdate::Line {
                start: changed(s1, s2),
                end: changed(e1, e2),
            },
            (Self::Circle { center: c1, radius: r1 }, Self::Circle { center: c2, radius: r2 }) => {
                EntityUpdate::Circle {
                    center: changed(c1, c2),
                    radius: changed(r1, r2),
                }
            }
            (
                Self::Arc { center: c1, radius: r1, start_angle: s1, end_angle: e1 },
                Self::Arc { center: c2, radius: r2, start_angle: s2, end_angle: e2 },
            ) => EntityUpdate::Arc {
                center: changed(c1, c2),
                radius: changed(r1, r2),
                start_angle: changed(s1, s2),
                end_angle: changed(e1, e2),
            },
            (
                Self::Rectangle { position: p1, width: w1, height: h1 },
                Self::Rectangle { position: p2, width: w2, height: h2 },
            ) => EntityUpdate::Rectangle {
                position: changed(p1, p2),
                width: changed(w1, w2),
                height: changed(h1, h2),
            },
            (Self::Polyline { points: p1, closed: c1 }, Self::Polyline { points: p2, closed: c2 }) => {
                EntityUpdate::Polyline {
                    points: changed(p1, p2),
                    closed: changed(c1, c2),
                }
            }
            _ => return None,
        };
        if update.is_empty() {
            None
        } else {
            Some(update)
        }
    }

    /// Merge a partial update. A mismatched variant leaves the entity unchanged.
    pub fn apply(&self, update: &EntityUpdate) -> Entity {
        match (self, update) {
            (Self::Point { position }, EntityUpdate::Point { position: p }) => Self::Point {
                position: p.unwrap_or(*position),
            },
            (Self::Line { start, end }, EntityUpdate::Line { start: s, end: e }) => Self::Line {
                start: s.unwrap_or(*start),
                end: e.unwrap_or(*end),
            },
            (Self::Circle { center, radius }, EntityUpdate::Circle { center: c, radius: r }) => Self::Circle {
                center: c.unwrap_or(*center),
                radius: r.unwrap_or(*radius),
            },
            (
                Self::Arc { center, radius, start_angle, end_angle },
                EntityUpdate::Arc { center: c, radius: r, start_angle: s, end_angle: e },
            ) => Self::Arc {
                center: c.unwrap_or(*center),
                radius: r.unwrap_or(*radius),
                start_angle: s.unwrap_or(*start_angle),
                end_angle: e.unwrap_or(*end_angle),
            },
            (
                Self::Rectangle { position, width, height },
                EntityUpdate::Rectangle { position: p, width: w, height: h },
            ) => Self::Rectangle {
                position: p.unwrap_or(*position),
                width: w.unwrap_or(*width),
                height: h.unwrap_or(*height),
            },
            (Self::Polyline { points, closed }, EntityUpdate::Polyline { points: p, closed: c }) => {
                Self::Polyline {
                    points: p.clone().unwrap_or_else(|| points.clone()),
                    closed: c.unwrap_or(*closed),
                }
            }
            _ => self.clone(),
        }
    }
}

fn changed<T: PartialEq + Clone>(old: &T, new: &T) -> Option<T> {
    if old == new {
        None
    } else {
        Some(new.clone())
    }
}

/// Partial entity: only the fields a solve pass changed are `Some`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntityUpdate {
    Point {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<Point2>,
    },
    Line {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start: Option<Point2>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end: Option<Point2>,
    },
    Circle {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        center: Option<Point2>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        radius: Option<f64>,
    },
    Arc {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        center: Option<Point2>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        radius: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start_angle: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end_angle: Option<f64>,
    },
    Rectangle {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<Point2>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        width: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        height: Option<f64>,
    },
    Polyline {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        points: Option<Vec<Point2>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        closed: Option<bool>,
    },
}

impl EntityUpdate {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Point { position } => position.is_none(),
            Self::Line { start, end } => start.is_none() && end.is_none(),
            Self::Circle { center, radius } => center.is_none() && radius.is_none(),
            Self::Arc { center, radius, start_angle, end_angle } => {
                center.is_none() && radius.is_none() && start_angle.is_none() && end_angle.is_none()
            }
            Self::Rectangle { position, width, height } => {
                position.is_none() && width.is_none() && height.is_none()
            }
            Self::Polyline { points, closed } => points.is_none() && closed.is_none(),
        }
    }
}
