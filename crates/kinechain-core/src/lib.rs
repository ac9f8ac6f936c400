//! kinechain-core: orientation engine for sensor-driven kinematic chains
//!
//! Reconstructs the pose of an articulated body (arm, torso, ...) from one
//! orientation sensor per rigid segment, and derives joint angles from it.
//!
//! # Modules
//!
//! - [`math`] - Quaternion rotations, Euler decomposition, vector angles
//! - [`skeleton`] - Joint table, parent-before-child traversal, presets
//! - [`stream`] - Per-joint sample streams, frame alignment, message ingestion
//! - [`calibration`] - Reference (zero-angle) pose resolution
//! - [`kinematics`] - Forward kinematics and relative/derived joint angles
//! - [`engine`] - Configuration, the per-frame query facade, history buffers
//!
//! # Data flow
//!
//! ```text
//! transport / log files
//!        │  (timestamp, quaternion) per joint
//!        ▼
//! ┌──────────────┐   frame count   ┌──────────────┐
//! │  StreamSet   │────────────────►│    Engine    │──► PoseFrame + AngleSample
//! └──────────────┘                 └──────────────┘
//!                                  Topology + ReferencePose (read-only)
//! ```
//!
//! The engine performs no I/O and holds no per-frame state: every query is a
//! pure function of the streams, the topology and the resolved reference pose.

#![warn(unused_must_use)]

pub mod calibration;
pub mod engine;
pub mod kinematics;
pub mod math;
pub mod skeleton;
pub mod stream;

// Re-exports for convenience
pub use calibration::{CalibrationConfig, CalibrationMode, MountingOffset, OffsetSide, ReferencePose};
pub use engine::{Engine, EngineConfig, FrameOutput, HistoryBuffer};
pub use kinematics::{
    AngleProbe, AngleSample, Anchor, DerivedAngle, EulerAngles, EulerSequence, PoseFrame,
    SegmentVector,
};
pub use math::{angle_between, Quaternion, Vector3};
pub use skeleton::{JointSpec, Topology, ROOT};
pub use stream::{ComponentOrder, JointStream, OrientationSample, SensorMessage, StreamSet};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error types for kinechain-core
///
/// Construction-time errors (topology, configuration, frame alignment) are
/// fatal for the engine. Calibration errors are reported per joint so the
/// rest of the skeleton can proceed.
#[derive(Debug, Clone, thiserror::Error)]
#[must_use = "errors must be handled or explicitly ignored with let _ = ..."]
#[non_exhaustive]
pub enum Error {
    /// Quaternion norm too small to represent a rotation.
    /// Handle by: dropping the sample upstream, checking the sensor's fusion output.
    #[error("Degenerate rotation: quaternion norm {norm:e} is below threshold")]
    DegenerateRotation { norm: f64 },

    /// A stored sample could not be converted to a rotation.
    /// Handle by: cleaning the log, or filtering zero rows before building streams.
    #[error("Degenerate sample {index} for joint '{joint}': quaternion norm {norm:e}")]
    DegenerateSample {
        joint: String,
        index: usize,
        norm: f64,
    },

    /// A joint id was referenced but not declared in the topology.
    /// Handle by: fixing the joint table or the reference to it.
    #[error("Unknown joint '{joint}' referenced by {referenced_by}")]
    UnknownJoint { joint: String, referenced_by: String },

    /// The same joint id was declared twice.
    /// Handle by: giving every sensor a unique id.
    #[error("Duplicate joint '{0}' in topology")]
    DuplicateJoint(String),

    /// The parent links contain a cycle, so no traversal order exists.
    /// Handle by: making sure every chain ends at a root joint.
    #[error("Cycle detected in topology among joints {joints:?}")]
    Cycle { joints: Vec<String> },

    /// Local axis or segment length is unusable.
    /// Handle by: using a non-zero finite axis and a finite, non-negative length.
    #[error("Invalid geometry for joint '{joint}': {reason}")]
    InvalidGeometry { joint: String, reason: String },

    /// No samples are available to compute a joint's reference orientation.
    /// Handle by: skipping that joint's angles; positions are unaffected.
    #[error("Insufficient samples to calibrate joint '{joint}'")]
    InsufficientSamples { joint: String },

    /// A required joint has no samples, so not a single frame can be evaluated.
    /// Handle by: checking the recording for the named sensor.
    #[error("No usable frames: joint '{joint}' has no samples")]
    NoUsableFrames { joint: String },

    /// Invalid or unreadable configuration.
    /// Handle by: validating the config document against the expected schema.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Sample ingestion channel was closed unexpectedly.
    /// Handle by: checking that the transport thread is still alive.
    #[error("Channel closed")]
    ChannelClosed,

    /// Sample ingestion channel is full (backpressure).
    /// Handle by: draining the receiver more often or increasing capacity.
    #[error("Channel full")]
    ChannelFull,
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(format!("JSON error: {}", e))
    }
}

/// Result type alias for kinechain-core operations
pub type Result<T> = std::result::Result<T, Error>;
