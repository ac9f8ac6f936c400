//! Reference (zero-angle) pose resolution
//!
//! Each joint's relative angles are measured against a reference orientation
//! captured from the start of its stream, optionally corrected by a fixed
//! sensor-mounting rotation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::math::Quaternion;
use crate::skeleton::Topology;
use crate::stream::{OrientationSample, StreamSet};
use crate::{Error, Result};

/// How a joint's reference orientation is captured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CalibrationMode {
    /// Reference = first sample
    #[default]
    FirstSample,

    /// Reference = normalized component-wise mean of the first `window` samples
    ///
    /// Fewer samples are used when the stream is shorter. Component-wise
    /// averaging is not the spherical mean of the rotations: it is accurate
    /// only for tightly clustered samples in the same hemisphere, which is
    /// what a short window of a sensor held still produces. Its job is to damp
    /// noise in the starting pose.
    AveragedWindow {
        /// Number of leading samples to average (must be > 0)
        window: usize,
    },
}

/// Side on which a mounting offset is composed with the captured reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetSide {
    /// `reference ∘ offset`: offset expressed in the sensor's own frame
    #[default]
    Right,
    /// `offset ∘ reference`: offset expressed in the world frame
    Left,
}

impl OffsetSide {
    /// Compose `offset` into `reference` on this side
    #[inline]
    pub fn apply(self, reference: &Quaternion, offset: &Quaternion) -> Quaternion {
        match self {
            Self::Right => reference.compose(offset),
            Self::Left => offset.compose(reference),
        }
    }
}

/// Fixed rotation compensating a known sensor-mounting misalignment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MountingOffset {
    /// Rotation of `degrees` about `axis`
    AxisAngle { axis: [f64; 3], degrees: f64 },
    /// Intrinsic X→Y→Z Euler angles in degrees
    Euler { roll: f64, pitch: f64, yaw: f64 },
    /// Explicit scalar-first quaternion (normalized on use)
    Quaternion { w: f64, x: f64, y: f64, z: f64 },
}

impl MountingOffset {
    /// Offset as a unit quaternion
    pub fn rotation(&self) -> Result<Quaternion> {
        match *self {
            Self::AxisAngle { axis, degrees } => Quaternion::from_axis_angle_deg(axis, degrees),
            Self::Euler { roll, pitch, yaw } => Ok(Quaternion::from_euler_xyz(roll, pitch, yaw)),
            Self::Quaternion { w, x, y, z } => Quaternion::new(w, x, y, z).normalize(),
        }
    }
}

/// Per-joint calibration override
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JointCalibration {
    /// Capture mode, `None` to use the configured default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<CalibrationMode>,
    /// Mounting correction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<MountingOffset>,
}

/// Calibration configuration for a whole skeleton
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Mode for joints without an override
    #[serde(default)]
    pub default_mode: CalibrationMode,
    /// Composition side for every mounting offset
    #[serde(default)]
    pub offset_side: OffsetSide,
    /// Overrides keyed by joint id
    #[serde(default)]
    pub joints: BTreeMap<String, JointCalibration>,
}

impl CalibrationConfig {
    /// First-sample capture for every joint
    pub fn first_sample() -> Self {
        Self::default()
    }

    /// Averaged-window capture for every joint
    pub fn averaged(window: usize) -> Self {
        Self {
            default_mode: CalibrationMode::AveragedWindow { window },
            ..Default::default()
        }
    }

    /// Set the composition side for mounting offsets
    pub fn with_offset_side(mut self, side: OffsetSide) -> Self {
        self.offset_side = side;
        self
    }

    /// Override the capture mode of one joint
    pub fn with_joint_mode(mut self, joint: impl Into<String>, mode: CalibrationMode) -> Self {
        self.joints.entry(joint.into()).or_default().mode = Some(mode);
        self
    }

    /// Attach a mounting offset to one joint
    pub fn with_offset(mut self, joint: impl Into<String>, offset: MountingOffset) -> Self {
        self.joints.entry(joint.into()).or_default().offset = Some(offset);
        self
    }

    /// Effective capture mode for a joint
    pub fn mode_for(&self, joint: &str) -> CalibrationMode {
        self.joints
            .get(joint)
            .and_then(|j| j.mode)
            .unwrap_or(self.default_mode)
    }

    /// Mounting offset for a joint, if any
    pub fn offset_for(&self, joint: &str) -> Option<&MountingOffset> {
        self.joints.get(joint).and_then(|j| j.offset.as_ref())
    }

    /// Check window sizes, offsets and that every override names a known joint
    pub fn validate(&self, topology: &Topology) -> Result<()> {
        let check_mode = |mode: CalibrationMode, owner: &str| match mode {
            CalibrationMode::AveragedWindow { window: 0 } => Err(Error::Config(format!(
                "averaged-window calibration for {owner} needs a window > 0"
            ))),
            _ => Ok(()),
        };

        check_mode(self.default_mode, "the default mode")?;
        for (joint, cal) in &self.joints {
            topology.require(joint, "calibration config")?;
            if let Some(mode) = cal.mode {
                check_mode(mode, &format!("joint '{joint}'"))?;
            }
            if let Some(offset) = &cal.offset {
                offset.rotation().map_err(|e| {
                    Error::Config(format!("invalid mounting offset for joint '{joint}': {e}"))
                })?;
            }
        }
        Ok(())
    }
}

/// Compute one joint's reference orientation
///
/// Fails with [`Error::InsufficientSamples`] when `samples` is empty and with
/// [`Error::DegenerateRotation`] when an averaged window cancels out (e.g.
/// samples alternating between `q` and `-q`).
pub fn resolve_reference(
    joint: &str,
    samples: &[OrientationSample],
    mode: CalibrationMode,
    offset: Option<&Quaternion>,
    side: OffsetSide,
) -> Result<Quaternion> {
    let first = samples.first().ok_or_else(|| Error::InsufficientSamples {
        joint: joint.to_string(),
    })?;

    let captured = match mode {
        CalibrationMode::FirstSample => first.rotation.normalize()?,
        CalibrationMode::AveragedWindow { window } => {
            let used = &samples[..window.clamp(1, samples.len())];
            let sum = used.iter().fold([0.0; 4], |mut acc, s| {
                acc[0] += s.rotation.w;
                acc[1] += s.rotation.x;
                acc[2] += s.rotation.y;
                acc[3] += s.rotation.z;
                acc
            });
            let n = used.len() as f64;
            Quaternion::new(sum[0] / n, sum[1] / n, sum[2] / n, sum[3] / n).normalize()?
        }
    };

    Ok(match offset {
        Some(offset) => side.apply(&captured, offset).normalize()?,
        None => captured,
    })
}

/// A joint whose reference could not be resolved
#[derive(Debug)]
pub struct CalibrationFailure {
    pub joint: String,
    pub error: Error,
}

/// Reference orientation per joint, fixed for a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferencePose {
    references: BTreeMap<String, Quaternion>,
}

impl ReferencePose {
    /// Use externally captured references (normalized here)
    pub fn from_references<I, S>(references: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Quaternion)>,
        S: Into<String>,
    {
        let references = references
            .into_iter()
            .map(|(id, q)| -> Result<(String, Quaternion)> { Ok((id.into(), q.normalize()?)) })
            .collect::<Result<_>>()?;
        Ok(Self { references })
    }

    /// Resolve every joint of `topology` from the start of its stream
    ///
    /// A joint that cannot be calibrated is reported in the returned failures
    /// and left out of the pose; the others are unaffected.
    pub fn resolve(
        topology: &Topology,
        streams: &StreamSet,
        config: &CalibrationConfig,
    ) -> (Self, Vec<CalibrationFailure>) {
        let mut references = BTreeMap::new();
        let mut failures = Vec::new();

        for joint in topology.ids() {
            let mode = config.mode_for(joint);
            let samples = streams.get(joint).map_or(&[][..], |s| s.samples());
            let result = config
                .offset_for(joint)
                .map(MountingOffset::rotation)
                .transpose()
                .and_then(|offset| {
                    resolve_reference(joint, samples, mode, offset.as_ref(), config.offset_side)
                });

            match result {
                Ok(reference) => {
                    tracing::info!(joint, ?mode, samples = samples.len(), "Reference captured");
                    references.insert(joint.to_string(), reference);
                }
                Err(error) => {
                    tracing::warn!(joint, "Calibration failed: {}", error);
                    failures.push(CalibrationFailure {
                        joint: joint.to_string(),
                        error,
                    });
                }
            }
        }

        (Self { references }, failures)
    }

    /// Reference orientation of a joint
    #[inline]
    pub fn get(&self, joint: &str) -> Option<&Quaternion> {
        self.references.get(joint)
    }

    pub fn contains(&self, joint: &str) -> bool {
        self.references.contains_key(joint)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Quaternion)> + '_ {
        self.references.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }
}
