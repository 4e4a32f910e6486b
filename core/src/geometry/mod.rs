use nalgebra as na;

pub type Point2 = na::Point2<f64>;
pub type Vector2 = na::Vector2<f64>;

pub const EPSILON: f64 = 1e-6;

pub mod entity;
pub use entity::*;

pub mod utils_2d;

pub fn dist(p1: &Point2, p2: &Point2) -> f64 {
    na::distance(p1, p2)
}
