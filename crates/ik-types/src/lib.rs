//! Kinematic data model shared by the IK solvers.
//!
//! A [`Chain`] is a flat arena of [`Joint`]s plus a parallel array of parent
//! indices; there are no owning back-references, and world transforms are
//! composed by walking indices. [`Target`] and [`ChainTargets`] describe the
//! poses a solver drives the chain toward.

pub mod chain;
pub mod joint;
pub mod target;

pub use chain::{Chain, Mode, SegmentStats};
pub use joint::Joint;
pub use target::{ChainTargets, Target};
