//! Relative joint angles and position-derived angle probes

use serde::{Deserialize, Serialize};

use super::forward::PoseFrame;
use crate::math::{angle_between, Quaternion, Vector3};

/// Euler decomposition convention for relative angles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EulerSequence {
    /// X, then Y about the new Y, then Z about the newest Z
    #[default]
    IntrinsicXyz,
    /// X, Y, Z about the fixed world axes
    ExtrinsicXyz,
}

/// Roll / pitch / yaw in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EulerAngles {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl EulerAngles {
    pub const fn new(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self { roll, pitch, yaw }
    }

    /// Decompose a rotation with the given sequence
    pub fn from_rotation(q: &Quaternion, sequence: EulerSequence) -> Self {
        let (roll, pitch, yaw) = match sequence {
            EulerSequence::IntrinsicXyz => q.to_euler_xyz(),
            EulerSequence::ExtrinsicXyz => q.to_euler_extrinsic_xyz(),
        };
        Self { roll, pitch, yaw }
    }

    pub const fn to_array(&self) -> [f64; 3] {
        [self.roll, self.pitch, self.yaw]
    }
}

/// Rotation from the reference orientation to the current one, in the
/// reference's frame: `reference⁻¹ ∘ current`
#[inline]
pub fn relative_rotation(reference: &Quaternion, current: &Quaternion) -> Quaternion {
    reference.invert() * current
}

/// Euler angles of `current` relative to `reference`
pub fn relative_angles(
    reference: &Quaternion,
    current: &Quaternion,
    sequence: EulerSequence,
) -> EulerAngles {
    EulerAngles::from_rotation(&relative_rotation(reference, current), sequence)
}

/// One joint's relative angles for a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AngleSample {
    pub joint: String,
    pub angles: EulerAngles,
}

/// Direction from one joint (or `ROOT`) to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentVector {
    pub from: String,
    pub to: String,
}

impl SegmentVector {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// `pos[to] - pos[from]`, if both are in the pose
    pub fn resolve(&self, pose: &PoseFrame<'_>) -> Option<Vector3> {
        Some(pose.get(&self.to)? - pose.get(&self.from)?)
    }

    pub fn joints(&self) -> [&str; 2] {
        [&self.from, &self.to]
    }
}

/// Named angle between two segment vectors of the pose
///
/// Anatomical angles (shoulder elevation, elbow flexion, ...) are expressed
/// as probes; the engine itself has no notion of what a joint is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AngleProbe {
    pub name: String,
    pub first: SegmentVector,
    pub second: SegmentVector,
}

impl AngleProbe {
    pub fn new(name: impl Into<String>, first: SegmentVector, second: SegmentVector) -> Self {
        Self {
            name: name.into(),
            first,
            second,
        }
    }

    /// Angle in degrees, or `None` when any endpoint is missing this frame
    pub fn evaluate(&self, pose: &PoseFrame<'_>) -> Option<f64> {
        let v1 = self.first.resolve(pose)?;
        let v2 = self.second.resolve(pose)?;
        Some(angle_between(&v1, &v2))
    }

    /// All joint ids this probe reads
    pub fn joints(&self) -> impl Iterator<Item = &str> + '_ {
        self.first.joints().into_iter().chain(self.second.joints())
    }
}

/// Value of one probe for a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedAngle {
    pub name: String,
    pub degrees: Option<f64>,
}
