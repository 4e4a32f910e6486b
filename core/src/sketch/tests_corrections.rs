use super::config::{DistanceMode, SolverConfig};
use super::corrections::{correct, residual};
use super::solver::{ConstraintSolution, ConstraintSolver, SolveError};
use super::types::{Constraint, ConstraintParameters, ConstraintType, ParameterKey, ParameterValue};
use crate::geometry::{dist, Entity, EntityMap, Point2, Vector2};
use crate::ids::{EntityId, IdGenerator};
use std::f64::consts::{FRAC_PI_2, FRAC_PI_3};

fn add(entities: &mut EntityMap, entity: Entity) -> EntityId {
    let id = EntityId::new();
    entities.insert(id, entity);
    id
}

fn constraint(constraint_type: ConstraintType, ids: &[EntityId], params: ConstraintParameters) -> Constraint {
    Constraint::new(IdGenerator::new("corrections").next_id(), constraint_type, ids.to_vec(), params)
}

fn value(key: ParameterKey, v: f64) -> ConstraintParameters {
    ConstraintParameters::new().with(key, ParameterValue::Float(v))
}

/// Solve a single constraint with default settings.
fn solve_single(entities: &EntityMap, c: Constraint) -> (ConstraintSolution, EntityMap) {
    let mut pass = ConstraintSolver::default().run(&[c], entities);
    assert_eq!(pass.solutions.len(), 1);
    (pass.solutions.remove(0), pass.entities)
}

fn line_of(entities: &EntityMap, id: &EntityId) -> (Point2, Point2) {
    entities[id].as_line().expect("not a line")
}

fn circle_of(entities: &EntityMap, id: &EntityId) -> (Point2, f64) {
    entities[id].as_circular().expect("not circular")
}

fn assert_point(actual: Point2, x: f64, y: f64) {
    assert!(
        (actual.x - x).abs() < 1e-5 && (actual.y - y).abs() < 1e-5,
        "expected ({}, {}), got ({}, {})",
        x,
        y,
        actual.x,
        actual.y
    );
}

#[test]
fn test_parallel_rotates_second_line_about_its_start() {
    let mut entities = EntityMap::new();
    let l1 = add(&mut entities, Entity::line(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0)));
    let l2 = add(&mut entities, Entity::line(Point2::new(0.0, 5.0), Point2::new(10.0, 7.0)));
    let original_length = 104f64.sqrt();

    let (solution, result) = solve_single(&entities, constraint(ConstraintType::Parallel, &[l1, l2], ConstraintParameters::new()));

    assert!(solution.satisfied);
    assert!(!solution.entity_updates.contains_key(&l1), "reference line must not move");
    let (start, end) = line_of(&result, &l2);
    assert_point(start, 0.0, 5.0);
    assert!((end.y - 5.0).abs() < 1e-5);
    assert!((dist(&start, &end) - original_length).abs() < 1e-5, "length must be preserved");
    assert!(end.x > 0.0, "heading should stay close to the original");
}

#[test]
fn test_perpendicular() {
    let mut entities = EntityMap::new();
    let l1 = add(&mut entities, Entity::line(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0)));
    let l2 = add(&mut entities, Entity::line(Point2::new(0.0, 0.0), Point2::new(1.0, 10.0)));

    let (solution, result) = solve_single(&entities, constraint(ConstraintType::Perpendicular, &[l1, l2], ConstraintParameters::new()));

    assert!(solution.satisfied);
    let (start, end) = line_of(&result, &l2);
    assert!((end.x - start.x).abs() < 1e-5);
    assert!(end.y > 0.0);
    assert!((dist(&start, &end) - 101f64.sqrt()).abs() < 1e-5);
}

#[test]
fn test_horizontal_and_vertical_keep_start() {
    let mut entities = EntityMap::new();
    let h = add(&mut entities, Entity::line(Point2::new(0.0, 0.0), Point2::new(10.0, 5.0)));
    let v = add(&mut entities, Entity::line(Point2::new(1.0, 1.0), Point2::new(4.0, 11.0)));

    let (_, result) = solve_single(&entities, constraint(ConstraintType::Horizontal, &[h], ConstraintParameters::new()));
    let (start, end) = line_of(&result, &h);
    assert_point(start, 0.0, 0.0);
    assert_point(end, 10.0, 0.0);

    let (_, result) = solve_single(&entities, constraint(ConstraintType::Vertical, &[v], ConstraintParameters::new()));
    let (start, end) = line_of(&result, &v);
    assert_point(start, 1.0, 1.0);
    assert_point(end, 1.0, 11.0);
}

#[test]
fn test_tangent_line_shifts_to_circle() {
    let mut entities = EntityMap::new();
    let c = add(&mut entities, Entity::circle(Point2::new(0.0, 0.0), 5.0));
    let l = add(&mut entities, Entity::line(Point2::new(-10.0, 3.0), Point2::new(10.0, 3.0)));

    // Either order of (circle, line) is accepted
    for ids in [[c, l], [l, c]] {
        let (solution, result) = solve_single(&entities, constraint(ConstraintType::Tangent, &ids, ConstraintParameters::new()));
        assert!(solution.satisfied);
        let (start, end) = line_of(&result, &l);
        assert_point(start, -10.0, 5.0);
        assert_point(end, 10.0, 5.0);
        assert_eq!(circle_of(&result, &c), (Point2::new(0.0, 0.0), 5.0));
    }
}

#[test]
fn test_tangent_circles_pick_nearest_contact() {
    let mut entities = EntityMap::new();
    let c1 = add(&mut entities, Entity::circle(Point2::new(0.0, 0.0), 3.0));
    let far = add(&mut entities, Entity::circle(Point2::new(10.0, 0.0), 2.0));
    let near = add(&mut entities, Entity::circle(Point2::new(0.0, 2.0), 2.0));

    let (_, result) = solve_single(&entities, constraint(ConstraintType::Tangent, &[c1, far], ConstraintParameters::new()));
    let (center, radius) = circle_of(&result, &far);
    assert_point(center, 5.0, 0.0);
    assert_eq!(radius, 2.0);

    // Center distance 2 is closer to internal tangency (1) than external (5)
    let (_, result) = solve_single(&entities, constraint(ConstraintType::Tangent, &[c1, near], ConstraintParameters::new()));
    let (center, _) = circle_of(&result, &near);
    assert_point(center, 0.0, 1.0);
}

#[test]
fn test_tangent_touch_point_picks_line_side() {
    let mut entities = EntityMap::new();
    let c = add(&mut entities, Entity::circle(Point2::new(0.0, 0.0), 5.0));
    let above = add(&mut entities, Entity::line(Point2::new(-10.0, 3.0), Point2::new(10.0, 3.0)));
    let touching = add(&mut entities, Entity::line(Point2::new(-10.0, 5.0), Point2::new(10.0, 5.0)));
    let below = ConstraintParameters::new().with(ParameterKey::Point, ParameterValue::Point(Point2::new(0.0, -5.0)));

    let (solution, result) = solve_single(&entities, constraint(ConstraintType::Tangent, &[c, above], below.clone()));
    assert!(solution.satisfied);
    let (start, end) = line_of(&result, &above);
    assert_point(start, -10.0, -5.0);
    assert_point(end, 10.0, -5.0);

    // Tangent on the wrong side is not satisfied
    let wrong_side = constraint(ConstraintType::Tangent, &[touching, c], below);
    assert!((residual(&wrong_side, &entities).expect("residual") - 10.0).abs() < 1e-9);
    let (solution, result) = solve_single(&entities, wrong_side);
    assert!(solution.satisfied);
    assert_eq!(solution.iterations, 1);
    let (start, _) = line_of(&result, &touching);
    assert_point(start, -10.0, -5.0);
}

#[test]
fn test_tangent_equal_radii_touch_externally() {
    let mut entities = EntityMap::new();
    let c1 = add(&mut entities, Entity::circle(Point2::new(0.0, 0.0), 2.0));
    let c2 = add(&mut entities, Entity::circle(Point2::new(0.0, 0.5), 2.0));

    let (solution, result) = solve_single(&entities, constraint(ConstraintType::Tangent, &[c1, c2], ConstraintParameters::new()));

    assert!(solution.satisfied);
    let (center, radius) = circle_of(&result, &c2);
    assert_point(center, 0.0, 4.0);
    assert_eq!(radius, 2.0);
}

#[test]
fn test_concentric_moves_second_center() {
    let mut entities = EntityMap::new();
    let c1 = add(&mut entities, Entity::circle(Point2::new(2.0, 3.0), 5.0));
    let arc = add(
        &mut entities,
        Entity::Arc { center: Point2::new(4.0, 4.0), radius: 1.0, start_angle: 0.5, end_angle: 2.0 },
    );

    let (solution, result) = solve_single(&entities, constraint(ConstraintType::Concentric, &[c1, arc], ConstraintParameters::new()));

    assert!(solution.satisfied);
    match &result[&arc] {
        Entity::Arc { center, radius, start_angle, end_angle } => {
            assert_point(*center, 2.0, 3.0);
            assert_eq!((*radius, *start_angle, *end_angle), (1.0, 0.5, 2.0));
        }
        other => panic!("arc changed variant: {:?}", other),
    }
}

#[test]
fn test_coincident_snaps_all_to_first() {
    let mut entities = EntityMap::new();
    let p1 = add(&mut entities, Entity::point(Point2::new(1.0, 1.0)));
    let p2 = add(&mut entities, Entity::point(Point2::new(5.0, 5.0)));
    let l = add(&mut entities, Entity::line(Point2::new(-3.0, 0.0), Point2::new(0.0, 4.0)));

    let (solution, result) = solve_single(&entities, constraint(ConstraintType::Coincident, &[p1, p2, l], ConstraintParameters::new()));

    assert!(solution.satisfied);
    assert_eq!(result[&p2].reference_point(), Point2::new(1.0, 1.0));
    let (start, end) = line_of(&result, &l);
    assert_point(start, 1.0, 1.0);
    assert_point(end, 4.0, 5.0);
}

#[test]
fn test_collinear_aligns_onto_first_line() {
    let mut entities = EntityMap::new();
    let l1 = add(&mut entities, Entity::line(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0)));
    let l2 = add(&mut entities, Entity::line(Point2::new(2.0, 3.0), Point2::new(8.0, 4.0)));

    let (solution, result) = solve_single(&entities, constraint(ConstraintType::Collinear, &[l1, l2], ConstraintParameters::new()));

    assert!(solution.satisfied);
    let (start, end) = line_of(&result, &l2);
    assert!(start.y.abs() < 1e-5);
    assert!(end.y.abs() < 1e-5);
    assert!((dist(&start, &end) - 37f64.sqrt()).abs() < 1e-5);
}

#[test]
fn test_equal_length_keeps_direction() {
    let mut entities = EntityMap::new();
    let l1 = add(&mut entities, Entity::line(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0)));
    let l2 = add(&mut entities, Entity::line(Point2::new(0.0, 5.0), Point2::new(3.0, 9.0)));

    let (_, result) = solve_single(&entities, constraint(ConstraintType::EqualLength, &[l1, l2], ConstraintParameters::new()));

    let (start, end) = line_of(&result, &l2);
    assert_point(start, 0.0, 5.0);
    assert_point(end, 6.0, 13.0);
}

#[test]
fn test_equal_radius() {
    let mut entities = EntityMap::new();
    let c1 = add(&mut entities, Entity::circle(Point2::new(0.0, 0.0), 10.0));
    let c2 = add(&mut entities, Entity::circle(Point2::new(30.0, 0.0), 8.0));

    let (solution, result) = solve_single(&entities, constraint(ConstraintType::EqualRadius, &[c1, c2], ConstraintParameters::new()));

    assert!(solution.satisfied);
    assert_eq!(circle_of(&result, &c2), (Point2::new(30.0, 0.0), 10.0));
    assert_eq!(circle_of(&result, &c1), (Point2::new(0.0, 0.0), 10.0));
}

#[test]
fn test_symmetric_mirrors_first_onto_second() {
    let mut entities = EntityMap::new();
    let p1 = add(&mut entities, Entity::point(Point2::new(-3.0, 2.0)));
    let p2 = add(&mut entities, Entity::point(Point2::new(5.0, 5.0)));
    let axis = add(&mut entities, Entity::line(Point2::new(0.0, -10.0), Point2::new(0.0, 10.0)));

    let (solution, result) = solve_single(&entities, constraint(ConstraintType::Symmetric, &[p1, p2, axis], ConstraintParameters::new()));

    assert!(solution.satisfied);
    assert_point(result[&p2].reference_point(), 3.0, 2.0);
    assert_point(result[&p1].reference_point(), -3.0, 2.0);
}

#[test]
fn test_midpoint() {
    let mut entities = EntityMap::new();
    let p = add(&mut entities, Entity::point(Point2::new(7.0, 7.0)));
    let l = add(&mut entities, Entity::line(Point2::new(0.0, 0.0), Point2::new(10.0, 4.0)));

    let (_, result) = solve_single(&entities, constraint(ConstraintType::Midpoint, &[p, l], ConstraintParameters::new()));

    assert_point(result[&p].reference_point(), 5.0, 2.0);
}

#[test]
fn test_distance_converges_with_damping() {
    let mut entities = EntityMap::new();
    let p1 = add(&mut entities, Entity::point(Point2::new(0.0, 0.0)));
    let p2 = add(&mut entities, Entity::point(Point2::new(3.0, 4.0)));

    let (solution, result) = solve_single(&entities, constraint(ConstraintType::Distance, &[p1, p2], value(ParameterKey::Distance, 10.0)));

    assert!(solution.satisfied, "residual {}", solution.residual);
    assert!(solution.iterations > 1, "damped steps need more than one iteration");
    assert!(solution.iterations <= SolverConfig::default().max_iterations);
    assert_point(result[&p1].reference_point(), 0.0, 0.0);
    assert_point(result[&p2].reference_point(), 6.0, 8.0);
}

#[test]
fn test_distance_symmetric_mode_moves_both() {
    let mut entities = EntityMap::new();
    let p1 = add(&mut entities, Entity::point(Point2::new(0.0, 0.0)));
    let p2 = add(&mut entities, Entity::point(Point2::new(4.0, 0.0)));
    let c = constraint(ConstraintType::Distance, &[p1, p2], value(ParameterKey::Distance, 8.0));

    let config = SolverConfig { distance_mode: DistanceMode::Symmetric, ..Default::default() };
    let pass = ConstraintSolver::new(config).expect("valid config").run(&[c], &entities);

    assert!(pass.solutions[0].satisfied);
    assert_point(pass.entities[&p1].reference_point(), -2.0, 0.0);
    assert_point(pass.entities[&p2].reference_point(), 6.0, 0.0);
}

#[test]
fn test_single_damped_step() {
    let mut entities = EntityMap::new();
    let p1 = add(&mut entities, Entity::point(Point2::new(0.0, 0.0)));
    let p2 = add(&mut entities, Entity::point(Point2::new(5.0, 0.0)));
    let c = constraint(ConstraintType::Distance, &[p1, p2], value(ParameterKey::Distance, 10.0));

    let changes = correct(&c, &entities, &SolverConfig::default()).expect("correction");
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].0, p2);
    // 0.8 of the 5-unit gap
    assert_point(changes[0].1.reference_point(), 9.0, 0.0);
}

#[test]
fn test_angle_measured_from_first_line() {
    let mut entities = EntityMap::new();
    let l1 = add(&mut entities, Entity::line(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0)));
    let l2 = add(&mut entities, Entity::line(Point2::new(1.0, 1.0), Point2::new(3.0, 1.0)));

    let (solution, result) = solve_single(&entities, constraint(ConstraintType::Angle, &[l1, l2], value(ParameterKey::Angle, FRAC_PI_3)));

    assert!(solution.satisfied);
    let (start, end) = line_of(&result, &l2);
    assert_point(start, 1.0, 1.0);
    assert_point(end, 1.0 + 2.0 * FRAC_PI_3.cos(), 1.0 + 2.0 * FRAC_PI_3.sin());
}

#[test]
fn test_radius_and_diameter() {
    let mut entities = EntityMap::new();
    let c = add(&mut entities, Entity::circle(Point2::new(0.0, 0.0), 10.0));
    let arc = add(
        &mut entities,
        Entity::Arc { center: Point2::new(0.0, 0.0), radius: 10.0, start_angle: 0.0, end_angle: FRAC_PI_2 },
    );

    let (_, result) = solve_single(&entities, constraint(ConstraintType::Radius, &[arc], value(ParameterKey::Radius, 15.0)));
    assert_eq!(circle_of(&result, &arc).1, 15.0);

    let (solution, result) = solve_single(&entities, constraint(ConstraintType::Diameter, &[c], value(ParameterKey::Diameter, 12.0)));
    assert!(solution.satisfied);
    assert_eq!(circle_of(&result, &c).1, 6.0);
}

#[test]
fn test_length_keeps_start_and_heading() {
    let mut entities = EntityMap::new();
    let l = add(&mut entities, Entity::line(Point2::new(0.0, 0.0), Point2::new(3.0, 4.0)));

    let (_, result) = solve_single(&entities, constraint(ConstraintType::Length, &[l], value(ParameterKey::Length, 10.0)));

    let (start, end) = line_of(&result, &l);
    assert_point(start, 0.0, 0.0);
    assert_point(end, 6.0, 8.0);
}

#[test]
fn test_fix_translates_whole_entity() {
    let mut entities = EntityMap::new();
    let l = add(&mut entities, Entity::line(Point2::new(1.0, 1.0), Point2::new(4.0, 5.0)));
    let params = ConstraintParameters::new().with(ParameterKey::Point, ParameterValue::Point(Point2::new(0.0, 0.0)));

    let (solution, result) = solve_single(&entities, constraint(ConstraintType::Fix, &[l], params));

    assert!(solution.satisfied);
    let (start, end) = line_of(&result, &l);
    assert_point(start, 0.0, 0.0);
    assert_point(end, 3.0, 4.0);
}

#[test]
fn test_pattern_spaces_by_offset() {
    let mut entities = EntityMap::new();
    let c0 = add(&mut entities, Entity::circle(Point2::new(0.0, 0.0), 2.0));
    let c1 = add(&mut entities, Entity::circle(Point2::new(12.0, 1.0), 2.0));
    let c2 = add(&mut entities, Entity::circle(Point2::new(18.0, -3.0), 2.0));
    let params = ConstraintParameters::new().with(ParameterKey::Offset, ParameterValue::Vector(Vector2::new(10.0, 0.0)));

    let (solution, result) = solve_single(&entities, constraint(ConstraintType::Pattern, &[c0, c1, c2], params));

    assert!(solution.satisfied);
    assert_point(result[&c1].reference_point(), 10.0, 0.0);
    assert_point(result[&c2].reference_point(), 20.0, 0.0);
}

#[test]
fn test_offset_distance_keeps_side() {
    let mut entities = EntityMap::new();
    let l1 = add(&mut entities, Entity::line(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0)));
    let above = add(&mut entities, Entity::line(Point2::new(0.0, 2.0), Point2::new(10.0, 3.0)));
    let below = add(&mut entities, Entity::line(Point2::new(0.0, -1.0), Point2::new(10.0, -1.0)));

    let (solution, result) = solve_single(&entities, constraint(ConstraintType::OffsetDistance, &[l1, above], value(ParameterKey::Distance, 5.0)));
    assert!(solution.satisfied, "residual {}", solution.residual);
    let (start, end) = line_of(&result, &above);
    assert!((start.y - 5.0).abs() < 1e-5);
    assert!((end.y - 5.0).abs() < 1e-5);

    let (_, result) = solve_single(&entities, constraint(ConstraintType::OffsetDistance, &[l1, below], value(ParameterKey::Distance, 5.0)));
    let (start, end) = line_of(&result, &below);
    assert!((start.y + 5.0).abs() < 1e-5);
    assert!((end.y + 5.0).abs() < 1e-5);
}

#[test]
fn test_residual_zero_when_satisfied() {
    let mut entities = EntityMap::new();
    let l1 = add(&mut entities, Entity::line(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0)));
    let l2 = add(&mut entities, Entity::line(Point2::new(5.0, 3.0), Point2::new(-5.0, 3.0)));

    // Opposite headings are still parallel
    let c = constraint(ConstraintType::Parallel, &[l1, l2], ConstraintParameters::new());
    assert!(residual(&c, &entities).expect("residual") < 1e-12);

    let c = constraint(ConstraintType::OffsetDistance, &[l1, l2], value(ParameterKey::Distance, 3.0));
    assert!(residual(&c, &entities).expect("residual") < 1e-12);
}

#[test]
fn test_zero_length_line_is_degenerate() {
    let mut entities = EntityMap::new();
    let l1 = add(&mut entities, Entity::line(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0)));
    let l2 = add(&mut entities, Entity::line(Point2::new(3.0, 3.0), Point2::new(3.0, 3.0)));

    let (solution, result) = solve_single(&entities, constraint(ConstraintType::Parallel, &[l1, l2], ConstraintParameters::new()));

    assert!(!solution.satisfied);
    assert!(matches!(solution.error, Some(SolveError::DegenerateGeometry { id, .. }) if id == l2));
    assert!(solution.entity_updates.is_empty());
    assert_eq!(result, entities);
}

#[test]
fn test_missing_parameter_reported() {
    let mut entities = EntityMap::new();
    let c = add(&mut entities, Entity::circle(Point2::new(0.0, 0.0), 1.0));

    // Bypasses validation, as a deserialized constraint could
    let (solution, _) = solve_single(&entities, constraint(ConstraintType::Radius, &[c], ConstraintParameters::new()));

    assert_eq!(
        solution.error,
        Some(SolveError::MissingParameter { constraint_type: ConstraintType::Radius, key: ParameterKey::Radius })
    );
}
