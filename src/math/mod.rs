//! Mathematical utilities: order statistics, dihedral geometry, and
//! symmetric eigenproblems.

pub mod geometry;
pub mod linalg;
pub mod stats;

pub use geometry::*;
pub use linalg::*;
pub use stats::*;
