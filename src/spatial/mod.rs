pub mod geometry;
pub mod index;
pub mod ops;

pub use geometry::{Geometry, Polygon};
pub use ops::RefFeature;
