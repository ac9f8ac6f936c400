//! Forward kinematics and joint angles
//!
//! - [`forward_kinematics`] turns per-joint rotations into positions
//! - [`relative_angles`] expresses a joint's rotation against its reference
//! - [`AngleProbe`] measures angles between segment vectors of a pose

mod angles;
mod forward;

pub use angles::{
    relative_angles, relative_rotation, AngleProbe, AngleSample, DerivedAngle, EulerAngles,
    EulerSequence, SegmentVector,
};
pub use forward::{forward_kinematics, Anchor, PoseFrame};
