//! Engine facade
//!
//! [`EngineConfig`] describes a skeleton and how to read it, [`Engine`]
//! evaluates frames of a recorded [`StreamSet`](crate::stream::StreamSet),
//! and [`HistoryBuffer`] collects the results on the caller's side.

mod config;
mod frame;
mod history;

pub use config::EngineConfig;
pub use frame::{Engine, FrameOutput};
pub use history::{HistoryBuffer, MovementRecord};
