use constraint_core::sketch::{ConstraintCreationParams, ConstraintManager, ConstraintType, ManagerConfig};
use constraint_core::{Entity, EntityId, EntityMap, Point2};

fn main() {
    tracing_subscriber::fmt::init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {}: {}", path, e));
            ManagerConfig::from_json_str(&text).unwrap_or_else(|e| panic!("bad config {}: {}", path, e))
        }
        None => ManagerConfig::default(),
    };

    let base = EntityId::new_deterministic("base");
    let wall = EntityId::new_deterministic("wall");
    let hole = EntityId::new_deterministic("hole");
    let boss = EntityId::new_deterministic("boss");

    let entities: EntityMap = [
        (base, Entity::line(Point2::new(0.0, 0.0), Point2::new(40.0, 3.0))),
        (wall, Entity::line(Point2::new(40.0, 0.0), Point2::new(42.0, 25.0))),
        (hole, Entity::circle(Point2::new(20.0, 10.0), 4.0)),
        (boss, Entity::circle(Point2::new(21.0, 11.0), 5.5)),
    ]
    .into_iter()
    .collect();

    let mut manager = match ConstraintManager::new(config) {
        Ok(manager) => manager.with_id_seed("demo"),
        Err(e) => {
            eprintln!("invalid config: {}", e);
            std::process::exit(1);
        }
    };
    manager.update_entities(entities);
    manager.add_change_listener(|constraints| {
        println!("  [listener] {} constraints", constraints.len());
        Ok(())
    });

    let requests = [
        ConstraintCreationParams::new(ConstraintType::Horizontal, vec![base]),
        ConstraintCreationParams::new(ConstraintType::Length, vec![base]).with_value(50.0),
        ConstraintCreationParams::new(ConstraintType::Radius, vec![hole]).with_value(3.0),
        // Rejected: a circle has no direction
        ConstraintCreationParams::new(ConstraintType::Vertical, vec![hole]),
    ];
    for request in requests {
        let constraint_type = request.constraint_type;
        match manager.create_constraint(request) {
            Ok(id) => println!("created {} {}", constraint_type, id),
            Err(e) => println!("rejected {}: {} ({})", constraint_type, e, e.suggestion().unwrap_or_default()),
        }
    }

    let auto = manager.create_auto_constraints(&[base, wall, hole, boss]);
    println!("auto-constraints: {}", auto.len());

    for solution in manager.solve_constraints() {
        println!(
            "{} satisfied={} iterations={} residual={:.2e}",
            solution.constraint_id, solution.satisfied, solution.iterations, solution.residual
        );
    }
    if let Some(report) = manager.last_report() {
        println!("{}", report.status_message);
    }
    let dof = manager.degrees_of_freedom();
    println!("remaining DOF: {}", dof.remaining);

    for id in [base, wall, hole, boss] {
        println!("{:?}", manager.entities()[&id]);
    }
}
