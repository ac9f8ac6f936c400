//! Per-frame evaluation

use crate::calibration::{CalibrationFailure, ReferencePose};
use crate::kinematics::{
    forward_kinematics, relative_angles, AngleSample, DerivedAngle, EulerAngles, PoseFrame,
};
use crate::math::{Quaternion, Vector3};
use crate::skeleton::Topology;
use crate::stream::StreamSet;
use crate::{Error, Result};

use super::EngineConfig;

/// Everything computed for one frame
#[derive(Debug, Clone)]
pub struct FrameOutput<'e> {
    pub frame: usize,
    pub pose: PoseFrame<'e>,
    /// Relative angles of every calibrated joint with a sample, in traversal order
    pub angles: Vec<AngleSample>,
    /// One entry per configured probe, in config order
    pub derived: Vec<DerivedAngle>,
}

impl FrameOutput<'_> {
    /// Relative angles of one joint
    pub fn angles_of(&self, joint: &str) -> Option<EulerAngles> {
        self.angles
            .iter()
            .find(|s| s.joint == joint)
            .map(|s| s.angles)
    }

    /// Value of one probe
    pub fn derived(&self, name: &str) -> Option<f64> {
        self.derived
            .iter()
            .find(|d| d.name == name)
            .and_then(|d| d.degrees)
    }
}

/// Kinematic chain evaluator over a recorded stream set
///
/// Construction validates the configuration, aligns frames and captures the
/// reference pose. Afterwards the engine is read-only: every query is a pure
/// function of its arguments and may be called from any thread, in any frame
/// order, any number of times.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    topology: Topology,
    streams: StreamSet,
    reference: ReferencePose,
    failures: Vec<CalibrationFailure>,
    frame_count: usize,
}

impl Engine {
    /// Build an engine for `streams`
    ///
    /// Fails on an invalid configuration or when some joint of the topology
    /// has no samples at all. A joint whose reference cannot be captured is
    /// not fatal: it is listed in [`Engine::calibration_failures`], produces no
    /// angles, and still contributes positions.
    pub fn new(config: EngineConfig, streams: StreamSet) -> Result<Self> {
        let topology = config.build_topology()?;
        let frame_count = streams.usable_frame_count(&topology)?;
        let (reference, failures) = ReferencePose::resolve(&topology, &streams, &config.calibration);

        tracing::info!(
            joints = topology.len(),
            frames = frame_count,
            calibrated = reference.len(),
            failed = failures.len(),
            "Engine ready"
        );

        Ok(Self {
            config,
            topology,
            streams,
            reference,
            failures,
            frame_count,
        })
    }

    /// Number of frames for which every joint has a sample
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn streams(&self) -> &StreamSet {
        &self.streams
    }

    pub fn reference_pose(&self) -> &ReferencePose {
        &self.reference
    }

    /// Joints whose reference could not be captured
    pub fn calibration_failures(&self) -> &[CalibrationFailure] {
        &self.failures
    }

    /// Absolute orientation of a joint at `frame`
    #[inline]
    pub fn rotation(&self, joint: &str, frame: usize) -> Option<Quaternion> {
        self.streams.sample(joint, frame).map(|s| s.rotation)
    }

    /// Joint positions at `frame` from the configured anchor
    ///
    /// Frames past [`Engine::frame_count`] are allowed; joints whose stream
    /// has ended are omitted with their subtrees.
    pub fn pose(&self, frame: usize) -> PoseFrame<'_> {
        self.pose_with_anchor(frame, self.config.anchor.position())
    }

    /// Joint positions at `frame` from an externally tracked anchor
    pub fn pose_with_anchor(&self, frame: usize, anchor: Vector3) -> PoseFrame<'_> {
        forward_kinematics(&self.topology, frame, anchor, |joint| {
            self.rotation(&joint.id, frame)
        })
    }

    /// Angles of `joint` at `frame` relative to its reference
    ///
    /// `Ok(None)` when the stream has no sample for `frame`. Fails with
    /// [`Error::UnknownJoint`] for an undeclared joint and with
    /// the joint's calibration error when it has no reference orientation.
    pub fn relative_angles(&self, joint: &str, frame: usize) -> Result<Option<EulerAngles>> {
        self.topology.require(joint, "angle query")?;
        let reference = self.reference.get(joint).ok_or_else(|| self.calibration_error(joint))?;
        Ok(self
            .rotation(joint, frame)
            .map(|current| relative_angles(reference, &current, self.config.euler_sequence)))
    }

    /// Error recorded when `joint`'s reference could not be resolved
    fn calibration_error(&self, joint: &str) -> Error {
        self.failures
            .iter()
            .find(|f| f.joint == joint)
            .map(|f| f.error.clone())
            .unwrap_or_else(|| Error::InsufficientSamples {
                joint: joint.to_string(),
            })
    }

    /// Pose, relative angles and probe values for one frame
    pub fn frame(&self, frame: usize) -> FrameOutput<'_> {
        let pose = self.pose(frame);

        let angles = self
            .topology
            .ids()
            .filter_map(|joint| {
                let reference = self.reference.get(joint)?;
                let current = self.rotation(joint, frame)?;
                Some(AngleSample {
                    joint: joint.to_string(),
                    angles: relative_angles(reference, &current, self.config.euler_sequence),
                })
            })
            .collect();

        let derived = self
            .config
            .probes
            .iter()
            .map(|probe| DerivedAngle {
                name: probe.name.clone(),
                degrees: probe.evaluate(&pose),
            })
            .collect();

        FrameOutput {
            frame,
            pose,
            angles,
            derived,
        }
    }

    /// All usable frames in order
    pub fn frames(&self) -> impl Iterator<Item = FrameOutput<'_>> + '_ {
        (0..self.frame_count).map(move |i| self.frame(i))
    }
}
