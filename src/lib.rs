//! Static linear-elastic analysis of plane stress structures meshed with
//! constant strain triangles.
//!
//! The pipeline is driven by [`solver::Solver`]: load a keyword mesh,
//! assemble the global stiffness matrix, apply the edge load and the
//! symmetry constraints, solve, and recover element stresses.

pub mod boundary;
pub mod datatypes;
pub mod element;
pub mod error;
pub mod input;
pub mod mesher;
pub mod post_processor;
pub mod solver;

pub use datatypes::{ElementStress, ModelMetadata};
pub use error::{Result, TristressError};
pub use mesher::Geometry;
pub use solver::{Solver, Stage};
