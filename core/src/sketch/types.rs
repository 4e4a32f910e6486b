use crate::geometry::{Point2, Vector2};
use crate::ids::{ConstraintId, EntityId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintType {
    Parallel,
    Perpendicular,
    Horizontal,
    Vertical,
    Tangent,
    Concentric,
    Coincident,
    Collinear,
    EqualLength,
    EqualRadius,
    /// e1 and e2 mirrored across an axis line (third entity)
    Symmetric,
    Midpoint,
    Distance,
    Angle,
    Radius,
    Diameter,
    Length,
    Fix,
    /// Linear pattern: entity i sits at ref(e0) + i * offset
    Pattern,
    /// Perpendicular distance between two parallel lines
    OffsetDistance,
}

/// How many entities a constraint type governs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            Self::Exactly(n) => count == *n,
            Self::AtLeast(n) => count >= *n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exactly(n) => write!(f, "exactly {}", n),
            Self::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

impl ConstraintType {
    pub const ALL: [ConstraintType; 20] = [
        Self::Parallel,
        Self::Perpendicular,
        Self::Horizontal,
        Self::Vertical,
        Self::Tangent,
        Self::Concentric,
        Self::Coincident,
        Self::Collinear,
        Self::EqualLength,
        Self::EqualRadius,
        Self::Symmetric,
        Self::Midpoint,
        Self::Distance,
        Self::Angle,
        Self::Radius,
        Self::Diameter,
        Self::Length,
        Self::Fix,
        Self::Pattern,
        Self::OffsetDistance,
    ];

    pub fn arity(&self) -> Arity {
        match self {
            Self::Horizontal | Self::Vertical | Self::Radius | Self::Diameter | Self::Length | Self::Fix => {
                Arity::Exactly(1)
            }
            Self::Parallel
            | Self::Perpendicular
            | Self::Tangent
            | Self::Concentric
            | Self::Collinear
            | Self::EqualLength
            | Self::EqualRadius
            | Self::Midpoint
            | Self::Distance
            | Self::Angle
            | Self::OffsetDistance => Arity::Exactly(2),
            Self::Symmetric => Arity::Exactly(3),
            Self::Coincident | Self::Pattern => Arity::AtLeast(2),
        }
    }

    /// Parameter key that a creation request's `value` is stored under.
    pub fn value_key(&self) -> Option<ParameterKey> {
        match self {
            Self::Distance | Self::OffsetDistance => Some(ParameterKey::Distance),
            Self::Angle => Some(ParameterKey::Angle),
            Self::Radius => Some(ParameterKey::Radius),
            Self::Length => Some(ParameterKey::Length),
            Self::Diameter => Some(ParameterKey::Diameter),
            _ => None,
        }
    }

    /// Parameter key that a creation request's `point` is stored under.
    pub fn point_key(&self) -> Option<ParameterKey> {
        match self {
            Self::Fix | Self::Tangent => Some(ParameterKey::Point),
            Self::Pattern => Some(ParameterKey::Offset),
            _ => None,
        }
    }

    /// Iterated families apply damped corrective steps; all others are closed-form.
    pub fn is_iterative(&self) -> bool {
        matches!(self, Self::Distance | Self::OffsetDistance)
    }

    /// Number of scalar equations the constraint removes from the sketch DOF.
    pub fn equation_count(&self, entity_count: usize) -> i32 {
        match self {
            Self::Fix
            | Self::Concentric
            | Self::Collinear
            | Self::Symmetric
            | Self::Midpoint
            | Self::OffsetDistance => 2,
            Self::Coincident | Self::Pattern => 2 * entity_count.saturating_sub(1) as i32,
            _ => 1,
        }
    }
}

impl fmt::Display for ConstraintType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Parallel => "PARALLEL",
            Self::Perpendicular => "PERPENDICULAR",
            Self::Horizontal => "HORIZONTAL",
            Self::Vertical => "VERTICAL",
            Self::Tangent => "TANGENT",
            Self::Concentric => "CONCENTRIC",
            Self::Coincident => "COINCIDENT",
            Self::Collinear => "COLLINEAR",
            Self::EqualLength => "EQUAL_LENGTH",
            Self::EqualRadius => "EQUAL_RADIUS",
            Self::Symmetric => "SYMMETRIC",
            Self::Midpoint => "MIDPOINT",
            Self::Distance => "DISTANCE",
            Self::Angle => "ANGLE",
            Self::Radius => "RADIUS",
            Self::Diameter => "DIAMETER",
            Self::Length => "LENGTH",
            Self::Fix => "FIX",
            Self::Pattern => "PATTERN",
            Self::OffsetDistance => "OFFSET_DISTANCE",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKey {
    Distance,
    /// Radians
    Angle,
    Radius,
    Length,
    Diameter,
    Point,
    Offset,
}

impl fmt::Display for ParameterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Distance => "distance",
            Self::Angle => "angle",
            Self::Radius => "radius",
            Self::Length => "length",
            Self::Diameter => "diameter",
            Self::Point => "point",
            Self::Offset => "offset",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    Float(f64),
    Point(Point2),
    Vector(Vector2),
}

/// Type-specific payload of a constraint, keyed by parameter name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstraintParameters(HashMap<ParameterKey, ParameterValue>);

impl ConstraintParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: ParameterKey, value: ParameterValue) -> Self {
        self.0.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: ParameterKey, value: ParameterValue) {
        self.0.insert(key, value);
    }

    pub fn get(&self, key: ParameterKey) -> Option<&ParameterValue> {
        self.0.get(&key)
    }

    pub fn contains(&self, key: ParameterKey) -> bool {
        self.0.contains_key(&key)
    }

    pub fn float(&self, key: ParameterKey) -> Option<f64> {
        match self.0.get(&key) {
            Some(ParameterValue::Float(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn point(&self, key: ParameterKey) -> Option<Point2> {
        match self.0.get(&key) {
            Some(ParameterValue::Point(p)) => Some(*p),
            _ => None,
        }
    }

    pub fn vector(&self, key: ParameterKey) -> Option<Vector2> {
        match self.0.get(&key) {
            Some(ParameterValue::Vector(v)) => Some(*v),
            _ => None,
        }
    }
}

/// Solve priority. Higher values solve first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(pub i32);

impl Priority {
    pub const LOW: Priority = Priority(0);
    pub const NORMAL: Priority = Priority(100);
    pub const HIGH: Priority = Priority(200);
    pub const REQUIRED: Priority = Priority(1000);
}

impl Default for Priority {
    fn default() -> Self {
        Self::NORMAL
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintMetadata {
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ConstraintMetadata {
    pub fn new(description: Option<String>) -> Self {
        let now = Utc::now();
        Self { created_at: now, modified_at: now, description }
    }

    pub fn touch(&mut self) {
        self.modified_at = Utc::now();
    }
}

impl Default for ConstraintMetadata {
    fn default() -> Self {
        Self::new(None)
    }
}

/// A declared relationship among one or more entities.
///
/// `satisfied` is derived by the solver and can only be read from outside
/// the crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub id: ConstraintId,
    pub constraint_type: ConstraintType,
    pub entity_ids: Vec<EntityId>,
    #[serde(default)]
    pub parameters: ConstraintParameters,
    pub active: bool,
    #[serde(default)]
    pub(crate) satisfied: bool,
    #[serde(default)]
    pub priority: Priority,
    pub metadata: ConstraintMetadata,
}

impl Constraint {
    pub fn new(
        id: ConstraintId,
        constraint_type: ConstraintType,
        entity_ids: Vec<EntityId>,
        parameters: ConstraintParameters,
    ) -> Self {
        Self {
            id,
            constraint_type,
            entity_ids,
            parameters,
            active: true,
            satisfied: false,
            priority: Priority::NORMAL,
            metadata: ConstraintMetadata::default(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn is_satisfied(&self) -> bool {
        self.satisfied
    }

    pub fn references(&self, entity_id: &EntityId) -> bool {
        self.entity_ids.contains(entity_id)
    }

    /// Same type over the same unordered entity set with equal parameters.
    pub fn duplicates(&self, other: &Constraint) -> bool {
        self.constraint_type == other.constraint_type
            && self.parameters == other.parameters
            && same_entity_set(&self.entity_ids, &other.entity_ids)
    }
}

pub(crate) fn same_entity_set(a: &[EntityId], b: &[EntityId]) -> bool {
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort();
    b.sort();
    a == b
}

/// Request surface used by the UI to create a constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintCreationParams {
    pub constraint_type: ConstraintType,
    pub entity_ids: Vec<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point: Option<Point2>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ConstraintCreationParams {
    pub fn new(constraint_type: ConstraintType, entity_ids: Vec<EntityId>) -> Self {
        Self {
            constraint_type,
            entity_ids,
            value: None,
            point: None,
            priority: None,
            description: None,
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_point(mut self, point: Point2) -> Self {
        self.point = Some(point);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Map `value`/`point` onto the type's parameter keys.
    ///
    /// A value or point the type has no slot for is dropped.
    pub fn parameters(&self) -> ConstraintParameters {
        let mut params = ConstraintParameters::new();
        if let (Some(key), Some(value)) = (self.constraint_type.value_key(), self.value) {
            params.insert(key, ParameterValue::Float(value));
        }
        if let (Some(key), Some(point)) = (self.constraint_type.point_key(), self.point) {
            let value = match key {
                ParameterKey::Offset => ParameterValue::Vector(point.coords),
                _ => ParameterValue::Point(point),
            };
            params.insert(key, value);
        }
        params
    }
}
