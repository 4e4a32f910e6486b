pub mod geometry;
pub mod ids;
pub mod sketch;

pub use geometry::{Entity, EntityKind, EntityMap, EntityUpdate, Point2, Vector2};
pub use ids::{ConstraintId, EntityId};
