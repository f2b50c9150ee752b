//! Geometry and frame helpers shared by association, tracking and pruning

mod geometry;
mod transform;

pub use geometry::*;
pub use transform::*;
