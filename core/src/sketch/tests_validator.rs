use super::types::{Arity, ConstraintParameters, ConstraintType, ParameterKey, ParameterValue};
use super::validator::{validate, ValidationError};
use crate::geometry::{Entity, EntityKind, EntityMap, Point2, Vector2};
use crate::ids::EntityId;

struct Fixture {
    entities: EntityMap,
    lines: Vec<EntityId>,
    circle1: EntityId,
    circle2: EntityId,
    arc: EntityId,
    point1: EntityId,
    point2: EntityId,
}

fn fixture() -> Fixture {
    let mut entities = EntityMap::new();
    let mut add = |e: Entity| {
        let id = EntityId::new();
        entities.insert(id, e);
        id
    };

    let lines = (0..4)
        .map(|i| {
            let y = i as f64;
            add(Entity::line(Point2::new(0.0, y), Point2::new(10.0, y + 1.0)))
        })
        .collect();
    let circle1 = add(Entity::circle(Point2::new(0.0, 0.0), 5.0));
    let circle2 = add(Entity::circle(Point2::new(20.0, 0.0), 3.0));
    let arc = add(Entity::Arc {
        center: Point2::new(5.0, 5.0),
        radius: 2.0,
        start_angle: 0.0,
        end_angle: 1.5,
    });
    let point1 = add(Entity::point(Point2::new(1.0, 1.0)));
    let point2 = add(Entity::point(Point2::new(2.0, 2.0)));

    Fixture { entities, lines, circle1, circle2, arc, point1, point2 }
}

/// Parameters that satisfy the type's numeric requirements.
fn valid_params(constraint_type: ConstraintType) -> ConstraintParameters {
    let mut params = ConstraintParameters::new();
    if let Some(key) = constraint_type.value_key() {
        params.insert(key, ParameterValue::Float(5.0));
    }
    if constraint_type == ConstraintType::Pattern {
        params.insert(ParameterKey::Offset, ParameterValue::Vector(Vector2::new(10.0, 0.0)));
    }
    params
}

#[test]
fn test_valid_requests_pass() {
    let f = fixture();
    let l = &f.lines;
    let cases = vec![
        (ConstraintType::Horizontal, vec![l[0]]),
        (ConstraintType::Vertical, vec![l[0]]),
        (ConstraintType::Length, vec![l[0]]),
        (ConstraintType::Radius, vec![f.circle1]),
        (ConstraintType::Diameter, vec![f.arc]),
        (ConstraintType::Fix, vec![f.point1]),
        (ConstraintType::Parallel, vec![l[0], l[1]]),
        (ConstraintType::Perpendicular, vec![l[0], l[1]]),
        (ConstraintType::Collinear, vec![l[0], l[1]]),
        (ConstraintType::EqualLength, vec![l[0], l[1]]),
        (ConstraintType::Angle, vec![l[0], l[1]]),
        (ConstraintType::OffsetDistance, vec![l[0], l[1]]),
        (ConstraintType::Tangent, vec![f.circle1, l[0]]),
        (ConstraintType::Tangent, vec![l[0], f.arc]),
        (ConstraintType::Tangent, vec![f.circle1, f.circle2]),
        (ConstraintType::Concentric, vec![f.circle1, f.arc]),
        (ConstraintType::EqualRadius, vec![f.circle1, f.circle2]),
        (ConstraintType::Distance, vec![f.point1, f.circle2]),
        (ConstraintType::Midpoint, vec![f.point1, l[0]]),
        (ConstraintType::Symmetric, vec![f.point1, f.point2, l[0]]),
        (ConstraintType::Coincident, vec![f.point1, f.point2, f.circle1]),
        (ConstraintType::Pattern, vec![f.circle1, f.circle2]),
    ];

    for (constraint_type, ids) in cases {
        let result = validate(constraint_type, &ids, &valid_params(constraint_type), &f.entities);
        assert_eq!(result, Ok(()), "{} should accept {:?}", constraint_type, ids);
    }
}

#[test]
fn test_wrong_cardinality_rejected_for_every_type() {
    let f = fixture();
    for constraint_type in ConstraintType::ALL {
        let count = match constraint_type.arity() {
            Arity::Exactly(n) => n + 1,
            Arity::AtLeast(n) => n - 1,
        };
        let ids: Vec<EntityId> = f.lines.iter().copied().take(count).collect();
        let result = validate(constraint_type, &ids, &valid_params(constraint_type), &f.entities);
        assert!(
            matches!(result, Err(ValidationError::WrongArity { actual, .. }) if actual == count),
            "{} with {} entities should fail arity, got {:?}",
            constraint_type,
            count,
            result
        );
    }
}

#[test]
fn test_wrong_entity_type_rejected() {
    let f = fixture();
    let l = &f.lines;
    let cases = vec![
        (ConstraintType::Horizontal, vec![f.circle1], 0),
        (ConstraintType::Vertical, vec![f.point1], 0),
        (ConstraintType::Length, vec![f.arc], 0),
        (ConstraintType::Radius, vec![l[0]], 0),
        (ConstraintType::Diameter, vec![f.point1], 0),
        (ConstraintType::Parallel, vec![l[0], f.circle1], 1),
        (ConstraintType::Perpendicular, vec![f.circle1, l[0]], 0),
        (ConstraintType::Collinear, vec![l[0], f.point1], 1),
        (ConstraintType::EqualLength, vec![f.arc, l[1]], 0),
        (ConstraintType::Angle, vec![l[0], f.circle2], 1),
        (ConstraintType::OffsetDistance, vec![f.point1, l[1]], 0),
        (ConstraintType::Tangent, vec![l[0], l[1]], 1),
        (ConstraintType::Tangent, vec![f.point1, f.circle1], 0),
        (ConstraintType::Concentric, vec![f.circle1, l[0]], 1),
        (ConstraintType::EqualRadius, vec![f.point1, f.circle1], 0),
        (ConstraintType::Midpoint, vec![f.point1, f.circle1], 1),
        (ConstraintType::Symmetric, vec![f.point1, f.point2, f.circle1], 2),
    ];

    for (constraint_type, ids, bad_position) in cases {
        let result = validate(constraint_type, &ids, &valid_params(constraint_type), &f.entities);
        match result {
            Err(ValidationError::WrongEntityType { position, id, .. }) => {
                assert_eq!(position, bad_position, "{} flagged the wrong position", constraint_type);
                assert_eq!(id, ids[bad_position]);
            }
            other => panic!("{} should reject {:?}, got {:?}", constraint_type, ids, other),
        }
    }
}

#[test]
fn test_dangling_entity_checked_first() {
    let f = fixture();
    let ghost = EntityId::new();
    // Wrong arity too, but entity resolution runs first
    let result = validate(
        ConstraintType::Horizontal,
        &[f.lines[0], ghost],
        &ConstraintParameters::new(),
        &f.entities,
    );
    assert_eq!(result, Err(ValidationError::EntityNotFound { id: ghost }));
}

#[test]
fn test_duplicate_entity_rejected() {
    let f = fixture();
    let result = validate(
        ConstraintType::Parallel,
        &[f.lines[0], f.lines[0]],
        &ConstraintParameters::new(),
        &f.entities,
    );
    assert!(matches!(result, Err(ValidationError::DuplicateEntity { .. })));
}

#[test]
fn test_missing_and_non_positive_parameters() {
    let f = fixture();

    let missing = validate(ConstraintType::Radius, &[f.circle1], &ConstraintParameters::new(), &f.entities);
    assert_eq!(
        missing,
        Err(ValidationError::MissingParameter {
            constraint_type: ConstraintType::Radius,
            key: ParameterKey::Radius,
        })
    );

    for bad in [0.0, -3.0, f64::NAN, f64::INFINITY] {
        let params = ConstraintParameters::new().with(ParameterKey::Distance, ParameterValue::Float(bad));
        let result = validate(ConstraintType::Distance, &[f.point1, f.point2], &params, &f.entities);
        assert!(
            matches!(result, Err(ValidationError::InvalidParameter { key: ParameterKey::Distance, .. })),
            "distance {} should be rejected, got {:?}",
            bad,
            result
        );
    }
}

#[test]
fn test_angle_may_be_negative_but_not_missing() {
    let f = fixture();
    let ids = [f.lines[0], f.lines[1]];

    let negative = ConstraintParameters::new().with(ParameterKey::Angle, ParameterValue::Float(-0.5));
    assert_eq!(validate(ConstraintType::Angle, &ids, &negative, &f.entities), Ok(()));

    let missing = validate(ConstraintType::Angle, &ids, &ConstraintParameters::new(), &f.entities);
    assert!(matches!(missing, Err(ValidationError::MissingParameter { key: ParameterKey::Angle, .. })));
}

#[test]
fn test_pattern_offset_required_and_non_zero() {
    let f = fixture();
    let ids = [f.point1, f.point2];

    let missing = validate(ConstraintType::Pattern, &ids, &ConstraintParameters::new(), &f.entities);
    assert!(matches!(missing, Err(ValidationError::MissingParameter { key: ParameterKey::Offset, .. })));

    let zero = ConstraintParameters::new().with(ParameterKey::Offset, ParameterValue::Vector(Vector2::zeros()));
    let result = validate(ConstraintType::Pattern, &ids, &zero, &f.entities);
    assert!(matches!(result, Err(ValidationError::InvalidParameter { key: ParameterKey::Offset, .. })));
}

#[test]
fn test_parameter_of_wrong_shape_rejected() {
    let f = fixture();
    let params = ConstraintParameters::new().with(ParameterKey::Length, ParameterValue::Point(Point2::origin()));
    let result = validate(ConstraintType::Length, &[f.lines[0]], &params, &f.entities);
    assert!(matches!(result, Err(ValidationError::InvalidParameter { key: ParameterKey::Length, .. })));
}

#[test]
fn test_errors_carry_suggestions() {
    let err = ValidationError::WrongEntityType {
        constraint_type: ConstraintType::Parallel,
        id: EntityId::new(),
        position: 1,
        expected: "line",
        actual: EntityKind::Circle,
    };
    assert_eq!(err.suggestion().as_deref(), Some("Select a line as entity #2"));
    assert_eq!(
        err.to_string(),
        "PARALLEL expects a line at position 1, got a circle"
    );
}
