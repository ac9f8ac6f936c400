//! Joint table and traversal order

pub mod presets;
mod topology;

pub use topology::{Joint, JointSpec, Topology, ROOT};
