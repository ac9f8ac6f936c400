//! Sample ingestion from a sensor transport
//!
//! The transport thread turns device callbacks into [`SensorMessage`] values
//! and sends them over a crossbeam channel; a [`StreamRecorder`] on the
//! consuming side keeps the orientation channel per joint and tallies the rest.

use std::collections::BTreeMap;

use crossbeam_channel::{self as cc, TryRecvError, TrySendError};
use serde::{Deserialize, Serialize};

use super::samples::{ComponentOrder, StreamSet};
use crate::{Error, Result};

/// One reading from one sensor, tagged by channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "snake_case")]
pub enum SensorMessage {
    /// Fused orientation, components in the recorder's declared order
    Quaternion {
        joint: String,
        timestamp: f64,
        components: [f64; 4],
    },
    /// Gyroscope (deg/s) and accelerometer (g)
    Inertial {
        joint: String,
        timestamp: f64,
        gyroscope: [f64; 3],
        accelerometer: [f64; 3],
    },
    Magnetometer {
        joint: String,
        timestamp: f64,
        field: [f64; 3],
    },
    /// Orientation as a row-major rotation matrix
    RotationMatrix {
        joint: String,
        timestamp: f64,
        matrix: [[f64; 3]; 3],
    },
    /// Vendor Euler channel (degrees)
    EulerAngles {
        joint: String,
        timestamp: f64,
        roll: f64,
        pitch: f64,
        yaw: f64,
    },
    /// Acceleration with gravity removed, sensor or earth frame
    LinearAcceleration {
        joint: String,
        timestamp: f64,
        acceleration: [f64; 3],
        earth_frame: bool,
    },
    HighGAccelerometer {
        joint: String,
        timestamp: f64,
        acceleration: [f64; 3],
    },
    Temperature {
        joint: String,
        timestamp: f64,
        celsius: f64,
    },
    Battery {
        joint: String,
        timestamp: f64,
        percentage: f64,
        voltage: f64,
    },
    Rssi {
        joint: String,
        timestamp: f64,
        percentage: f64,
        power_dbm: f64,
    },
    Notification {
        joint: String,
        timestamp: f64,
        message: String,
    },
    Error {
        joint: String,
        timestamp: f64,
        message: String,
    },
}

/// Channel kind of a [`SensorMessage`], for tallies
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Quaternion,
    Inertial,
    Magnetometer,
    RotationMatrix,
    EulerAngles,
    LinearAcceleration,
    HighGAccelerometer,
    Temperature,
    Battery,
    Rssi,
    Notification,
    Error,
}

impl SensorMessage {
    pub fn kind(&self) -> ChannelKind {
        match self {
            Self::Quaternion { .. } => ChannelKind::Quaternion,
            Self::Inertial { .. } => ChannelKind::Inertial,
            Self::Magnetometer { .. } => ChannelKind::Magnetometer,
            Self::RotationMatrix { .. } => ChannelKind::RotationMatrix,
            Self::EulerAngles { .. } => ChannelKind::EulerAngles,
            Self::LinearAcceleration { .. } => ChannelKind::LinearAcceleration,
            Self::HighGAccelerometer { .. } => ChannelKind::HighGAccelerometer,
            Self::Temperature { .. } => ChannelKind::Temperature,
            Self::Battery { .. } => ChannelKind::Battery,
            Self::Rssi { .. } => ChannelKind::Rssi,
            Self::Notification { .. } => ChannelKind::Notification,
            Self::Error { .. } => ChannelKind::Error,
        }
    }

    /// Sensor the message came from
    pub fn joint(&self) -> &str {
        match self {
            Self::Quaternion { joint, .. }
            | Self::Inertial { joint, .. }
            | Self::Magnetometer { joint, .. }
            | Self::RotationMatrix { joint, .. }
            | Self::EulerAngles { joint, .. }
            | Self::LinearAcceleration { joint, .. }
            | Self::HighGAccelerometer { joint, .. }
            | Self::Temperature { joint, .. }
            | Self::Battery { joint, .. }
            | Self::Rssi { joint, .. }
            | Self::Notification { joint, .. }
            | Self::Error { joint, .. } => joint,
        }
    }
}

/// Transport end of an ingestion channel
///
/// Cloned once per sensor thread; the channel closes when the last clone
/// is dropped.
#[derive(Debug, Clone)]
pub struct Sender {
    inner: cc::Sender<SensorMessage>,
}

impl Sender {
    /// Queue a message, waiting while the channel is at capacity
    pub fn send(&self, message: SensorMessage) -> Result<()> {
        self.inner.send(message).map_err(|_| Error::ChannelClosed)
    }

    /// Queue a message, or fail with [`Error::ChannelFull`] at capacity
    pub fn try_send(&self, message: SensorMessage) -> Result<()> {
        self.inner.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => Error::ChannelFull,
            TrySendError::Disconnected(_) => Error::ChannelClosed,
        })
    }
}

/// Recorder end of an ingestion channel
#[derive(Debug)]
pub struct Receiver {
    inner: cc::Receiver<SensorMessage>,
}

impl Receiver {
    /// Next message; [`Error::ChannelClosed`] once every sender is gone and
    /// the queue is empty
    pub fn recv(&self) -> Result<SensorMessage> {
        self.inner.recv().map_err(|_| Error::ChannelClosed)
    }

    /// Next queued message without waiting, `Ok(None)` if nothing is queued
    pub fn try_recv(&self) -> Result<Option<SensorMessage>> {
        match self.inner.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(Error::ChannelClosed),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Ingestion channel queueing at most `capacity` messages
///
/// A transport that outpaces the recorder blocks in [`Sender::send`] or
/// sees [`Error::ChannelFull`] from [`Sender::try_send`].
pub fn channel(capacity: usize) -> (Sender, Receiver) {
    let (tx, rx) = cc::bounded(capacity);
    (Sender { inner: tx }, Receiver { inner: rx })
}

/// Collects quaternion messages into a [`StreamSet`]
///
/// All other channels are counted and dropped; this engine only consumes
/// orientation.
#[derive(Debug)]
pub struct StreamRecorder {
    order: ComponentOrder,
    streams: StreamSet,
    counts: BTreeMap<ChannelKind, usize>,
    rejected: usize,
}

impl StreamRecorder {
    /// Create a recorder for quaternions stored in `order`
    pub fn new(order: ComponentOrder) -> Self {
        Self {
            order,
            streams: StreamSet::new(),
            counts: BTreeMap::new(),
            rejected: 0,
        }
    }

    /// Handle one message
    ///
    /// Degenerate quaternions are dropped with a warning rather than
    /// aborting the recording.
    pub fn handle(&mut self, message: SensorMessage) {
        *self.counts.entry(message.kind()).or_insert(0) += 1;
        match message {
            SensorMessage::Quaternion {
                joint,
                timestamp,
                components,
            } => {
                let order = self.order;
                if let Err(e) = self
                    .streams
                    .stream_mut(&joint)
                    .push_storage(timestamp, components, order)
                {
                    self.rejected += 1;
                    tracing::warn!(joint = %joint, "Dropping sample: {}", e);
                }
            }
            SensorMessage::Notification { joint, message, .. } => {
                tracing::info!(joint = %joint, "Sensor notification: {}", message);
            }
            SensorMessage::Error { joint, message, .. } => {
                tracing::warn!(joint = %joint, "Sensor error: {}", message);
            }
            SensorMessage::Inertial { .. }
            | SensorMessage::Magnetometer { .. }
            | SensorMessage::RotationMatrix { .. }
            | SensorMessage::EulerAngles { .. }
            | SensorMessage::LinearAcceleration { .. }
            | SensorMessage::HighGAccelerometer { .. }
            | SensorMessage::Temperature { .. }
            | SensorMessage::Battery { .. }
            | SensorMessage::Rssi { .. } => {}
        }
    }

    /// Handle everything currently queued, without blocking
    ///
    /// Returns the number of messages handled. Messages queued before the
    /// senders were dropped are still delivered.
    pub fn drain(&mut self, rx: &Receiver) -> usize {
        let mut n = 0;
        while let Ok(Some(message)) = rx.try_recv() {
            self.handle(message);
            n += 1;
        }
        n
    }

    /// Block until every sender is dropped, handling each message
    pub fn record_until_closed(&mut self, rx: &Receiver) -> usize {
        let mut n = 0;
        while let Ok(message) = rx.recv() {
            self.handle(message);
            n += 1;
        }
        tracing::debug!(messages = n, "Ingestion channel closed");
        n
    }

    /// Messages seen per channel
    pub fn counts(&self) -> &BTreeMap<ChannelKind, usize> {
        &self.counts
    }

    /// Quaternion messages dropped as degenerate
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub fn streams(&self) -> &StreamSet {
        &self.streams
    }

    /// Stop recording and hand over the collected streams
    pub fn finish(self) -> StreamSet {
        self.streams
    }
}
