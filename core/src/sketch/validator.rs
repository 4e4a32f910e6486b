//! Admission checks for constraint requests.
//!
//! Runs before a constraint is stored: entity resolution, cardinality,
//! entity kinds, then numeric parameters. The first failure wins. Once a
//! constraint passes, the solver treats it as structurally valid.

use super::types::{Arity, ConstraintParameters, ConstraintType, ParameterKey, ParameterValue};
use crate::geometry::{Entity, EntityKind, EntityMap, EPSILON};
use crate::ids::EntityId;
use thiserror::Error;

/// Resolves entity ids against the current geometry snapshot.
pub trait EntityLookup {
    fn lookup(&self, id: &EntityId) -> Option<&Entity>;
}

impl EntityLookup for EntityMap {
    fn lookup(&self, id: &EntityId) -> Option<&Entity> {
        self.get(id)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Entity {id} does not exist in the current drawing")]
    EntityNotFound { id: EntityId },

    #[error("{constraint_type} requires {expected} entities, got {actual}")]
    WrongArity {
        constraint_type: ConstraintType,
        expected: Arity,
        actual: usize,
    },

    #[error("{constraint_type} references entity {id} more than once")]
    DuplicateEntity { constraint_type: ConstraintType, id: EntityId },

    #[error("{constraint_type} expects a {expected} at position {position}, got a {actual}")]
    WrongEntityType {
        constraint_type: ConstraintType,
        id: EntityId,
        position: usize,
        expected: &'static str,
        actual: EntityKind,
    },

    #[error("{constraint_type} requires a {key} parameter")]
    MissingParameter { constraint_type: ConstraintType, key: ParameterKey },

    #[error("Invalid {key} for {constraint_type}: {reason}")]
    InvalidParameter {
        constraint_type: ConstraintType,
        key: ParameterKey,
        reason: String,
    },
}

impl ValidationError {
    /// A hint the UI can show next to the error.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::EntityNotFound { .. } => {
                Some("Refresh the entity snapshot before creating constraints".to_string())
            }
            Self::WrongArity { constraint_type, expected, .. } => {
                Some(format!("Select {} entities for {}", expected, constraint_type))
            }
            Self::DuplicateEntity { .. } => Some("Select distinct entities".to_string()),
            Self::WrongEntityType { expected, position, .. } => {
                Some(format!("Select a {} as entity #{}", expected, position + 1))
            }
            Self::MissingParameter { key, .. } => Some(format!("Enter a value for {}", key)),
            Self::InvalidParameter { key, .. } => match key {
                ParameterKey::Angle | ParameterKey::Point | ParameterKey::Offset => None,
                _ => Some(format!("Enter a {} greater than zero", key)),
            },
        }
    }
}

const LINE: &str = "line";
const CIRCULAR: &str = "circle or arc";
const CIRCULAR_OR_LINE: &str = "circle, arc or line";

/// Check a proposed constraint against the geometry in `entities`.
pub fn validate(
    constraint_type: ConstraintType,
    entity_ids: &[EntityId],
    parameters: &ConstraintParameters,
    entities: &impl EntityLookup,
) -> Result<(), ValidationError> {
    let mut kinds = Vec::with_capacity(entity_ids.len());
    for id in entity_ids {
        match entities.lookup(id) {
            Some(entity) => kinds.push(entity.kind()),
            None => return Err(ValidationError::EntityNotFound { id: *id }),
        }
    }

    let arity = constraint_type.arity();
    if !arity.accepts(entity_ids.len()) {
        return Err(ValidationError::WrongArity {
            constraint_type,
            expected: arity,
            actual: entity_ids.len(),
        });
    }

    for (i, id) in entity_ids.iter().enumerate() {
        if entity_ids[..i].contains(id) {
            return Err(ValidationError::DuplicateEntity { constraint_type, id: *id });
        }
    }

    if let Err((position, expected)) = check_kinds(constraint_type, &kinds) {
        return Err(ValidationError::WrongEntityType {
            constraint_type,
            id: entity_ids[position],
            position,
            expected,
            actual: kinds[position],
        });
    }

    check_parameters(constraint_type, parameters)
}

/// Returns the first offending position and what was expected there.
fn check_kinds(constraint_type: ConstraintType, kinds: &[EntityKind]) -> Result<(), (usize, &'static str)> {
    let require = |position: usize, ok: bool, expected: &'static str| {
        if ok {
            Ok(())
        } else {
            Err((position, expected))
        }
    };
    let is_line = |k: &EntityKind| *k == EntityKind::Line;

    match constraint_type {
        ConstraintType::Horizontal | ConstraintType::Vertical | ConstraintType::Length => {
            require(0, is_line(&kinds[0]), LINE)
        }
        ConstraintType::Radius | ConstraintType::Diameter => require(0, kinds[0].is_circular(), CIRCULAR),
        ConstraintType::Parallel
        | ConstraintType::Perpendicular
        | ConstraintType::Collinear
        | ConstraintType::EqualLength
        | ConstraintType::Angle
        | ConstraintType::OffsetDistance => {
            require(0, is_line(&kinds[0]), LINE)?;
            require(1, is_line(&kinds[1]), LINE)
        }
        ConstraintType::Concentric | ConstraintType::EqualRadius => {
            require(0, kinds[0].is_circular(), CIRCULAR)?;
            require(1, kinds[1].is_circular(), CIRCULAR)
        }
        ConstraintType::Tangent => {
            if is_line(&kinds[0]) {
                require(1, kinds[1].is_circular(), CIRCULAR)
            } else {
                require(0, kinds[0].is_circular(), CIRCULAR_OR_LINE)?;
                require(1, kinds[1].is_circular() || is_line(&kinds[1]), CIRCULAR_OR_LINE)
            }
        }
        ConstraintType::Midpoint => require(1, is_line(&kinds[1]), LINE),
        ConstraintType::Symmetric => require(2, is_line(&kinds[2]), LINE),
        ConstraintType::Coincident
        | ConstraintType::Distance
        | ConstraintType::Fix
        | ConstraintType::Pattern => Ok(()),
    }
}

fn check_parameters(
    constraint_type: ConstraintType,
    parameters: &ConstraintParameters,
) -> Result<(), ValidationError> {
    let invalid = |key: ParameterKey, reason: String| ValidationError::InvalidParameter {
        constraint_type,
        key,
        reason,
    };

    // Required scalar: positive for dimensions, merely finite for angles
    if let Some(key) = constraint_type.value_key() {
        let value = match parameters.get(key) {
            None => return Err(ValidationError::MissingParameter { constraint_type, key }),
            Some(ParameterValue::Float(v)) => *v,
            Some(other) => return Err(invalid(key, format!("expected a number, got {:?}", other))),
        };
        if !value.is_finite() {
            return Err(invalid(key, format!("{} is not a finite number", value)));
        }
        if key != ParameterKey::Angle && value <= 0.0 {
            return Err(invalid(key, format!("must be greater than zero, got {}", value)));
        }
    }

    match constraint_type {
        ConstraintType::Pattern => match parameters.get(ParameterKey::Offset) {
            None => Err(ValidationError::MissingParameter {
                constraint_type,
                key: ParameterKey::Offset,
            }),
            Some(ParameterValue::Vector(v)) => {
                if !(v.x.is_finite() && v.y.is_finite()) {
                    Err(invalid(ParameterKey::Offset, "offset is not finite".to_string()))
                } else if v.norm() < EPSILON {
                    Err(invalid(ParameterKey::Offset, "offset must be non-zero".to_string()))
                } else {
                    Ok(())
                }
            }
            Some(other) => Err(invalid(
                ParameterKey::Offset,
                format!("expected a vector, got {:?}", other),
            )),
        },
        ConstraintType::Fix | ConstraintType::Tangent => match parameters.get(ParameterKey::Point) {
            None => Ok(()),
            Some(ParameterValue::Point(p)) if p.x.is_finite() && p.y.is_finite() => Ok(()),
            Some(ParameterValue::Point(_)) => {
                Err(invalid(ParameterKey::Point, "point is not finite".to_string()))
            }
            Some(other) => Err(invalid(
                ParameterKey::Point,
                format!("expected a point, got {:?}", other),
            )),
        },
        _ => Ok(()),
    }
}
