//! Orientation sample streams
//!
//! Boundary between the sensor transport / log readers and the engine:
//! quaternions arrive in a declared component order, are normalized once,
//! and are addressed by frame (sample index) from then on.

mod ingest;
mod samples;

pub use ingest::{channel, ChannelKind, Receiver, Sender, SensorMessage, StreamRecorder};
pub use samples::{usable_frame_count, ComponentOrder, JointStream, OrientationSample, StreamSet};
