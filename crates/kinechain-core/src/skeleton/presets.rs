//! Ready-made skeleton configurations

use crate::calibration::{CalibrationConfig, MountingOffset};
use crate::engine::EngineConfig;
use crate::kinematics::{AngleProbe, SegmentVector};

use super::{JointSpec, ROOT};

/// Sensor ids of the six-sensor arm rig, torso to hand
pub mod upper_limb_ids {
    pub const TORSO: &str = "IMU-6";
    pub const CHEST_BACK: &str = "IMU-5";
    pub const SHOULDER: &str = "IMU-4";
    pub const UPPER_ARM: &str = "IMU-3";
    pub const FOREARM: &str = "IMU-2";
    pub const HAND: &str = "IMU-1";
}

/// Six-sensor right arm: torso, chest-back, shoulder, upper arm, forearm, hand
///
/// Segment lengths are in metres. The forearm sensor is mounted rotated by
/// 90° about its Z axis, which its calibration offset compensates. Probes:
///
/// - `shoulder`: chest-back→torso against shoulder→upper arm
/// - `elbow`: upper arm→shoulder against upper arm→forearm
pub fn upper_limb() -> EngineConfig {
    use upper_limb_ids::*;

    let topology = vec![
        JointSpec::new(TORSO, ROOT, [-1.0, 0.0, 0.0], 0.1),
        JointSpec::new(CHEST_BACK, TORSO, [-1.0, 0.0, 0.0], 0.3),
        JointSpec::new(SHOULDER, CHEST_BACK, [1.0, 0.0, 0.0], 0.15),
        JointSpec::new(UPPER_ARM, SHOULDER, [1.0, 0.0, 0.0], 0.18),
        JointSpec::new(FOREARM, UPPER_ARM, [1.0, 0.0, 0.0], 0.15),
        JointSpec::new(HAND, FOREARM, [1.0, 0.0, 0.0], 0.09),
    ];

    let calibration = CalibrationConfig::first_sample().with_offset(
        FOREARM,
        MountingOffset::AxisAngle {
            axis: [0.0, 0.0, 1.0],
            degrees: 90.0,
        },
    );

    EngineConfig::new(topology)
        .with_calibration(calibration)
        .with_probe(AngleProbe::new(
            "shoulder",
            SegmentVector::new(CHEST_BACK, TORSO),
            SegmentVector::new(SHOULDER, UPPER_ARM),
        ))
        .with_probe(AngleProbe::new(
            "elbow",
            SegmentVector::new(UPPER_ARM, SHOULDER),
            SegmentVector::new(UPPER_ARM, FOREARM),
        ))
}
