//! Caller-owned record of evaluated frames

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::io;

use serde::Serialize;

use super::FrameOutput;
use crate::kinematics::{AngleSample, DerivedAngle, EulerAngles};

/// One row of the movement-angle table
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MovementRecord<'h> {
    pub frame: usize,
    pub joint: &'h str,
    pub angles: EulerAngles,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct FrameEntry {
    angles: Vec<AngleSample>,
    derived: Vec<DerivedAngle>,
}

/// Angle history keyed by frame index
///
/// Appending a frame that is already present replaces it, so replaying a
/// range twice leaves the buffer unchanged.
#[derive(Debug, Clone, Default)]
pub struct HistoryBuffer {
    frames: BTreeMap<usize, FrameEntry>,
}

impl HistoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the angles and probe values of one frame
    pub fn append(&mut self, output: &FrameOutput<'_>) {
        let entry = FrameEntry {
            angles: output.angles.clone(),
            derived: output.derived.clone(),
        };
        if self.frames.insert(output.frame, entry).is_some() {
            tracing::trace!(frame = output.frame, "History entry replaced");
        }
    }

    /// Recorded frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn contains(&self, frame: usize) -> bool {
        self.frames.contains_key(&frame)
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Movement rows ordered by frame, then joint traversal order
    pub fn records(&self) -> impl Iterator<Item = MovementRecord<'_>> + '_ {
        self.frames.iter().flat_map(|(&frame, entry)| {
            entry.angles.iter().map(move |s| MovementRecord {
                frame,
                joint: &s.joint,
                angles: s.angles,
            })
        })
    }

    /// Angles of one joint over time
    pub fn series(&self, joint: &str) -> Vec<(usize, EulerAngles)> {
        self.records()
            .filter(|r| r.joint == joint)
            .map(|r| (r.frame, r.angles))
            .collect()
    }

    /// Values of one probe over time; `None` where it could not be evaluated
    pub fn derived_series(&self, name: &str) -> Vec<(usize, Option<f64>)> {
        self.frames
            .iter()
            .filter_map(|(&frame, entry)| {
                entry
                    .derived
                    .iter()
                    .find(|d| d.name == name)
                    .map(|d| (frame, d.degrees))
            })
            .collect()
    }

    /// Write the movement-angle table as CSV
    ///
    /// Columns: `frame,IMU_ID,roll_deg,pitch_deg,yaw_deg`. Joint ids are
    /// quoted when they contain a separator, quote or line break.
    pub fn write_csv<W: io::Write>(&self, mut out: W) -> io::Result<()> {
        writeln!(out, "frame,IMU_ID,roll_deg,pitch_deg,yaw_deg")?;
        for r in self.records() {
            writeln!(
                out,
                "{},{},{},{},{}",
                r.frame,
                csv_field(r.joint),
                r.angles.roll,
                r.angles.pitch,
                r.angles.yaw
            )?;
        }
        out.flush()
    }

    /// Write probe values as CSV, one column per probe
    ///
    /// Columns: `frame,<probe>...`; unavailable values are left empty.
    pub fn write_derived_csv<W: io::Write>(&self, mut out: W, probes: &[&str]) -> io::Result<()> {
        write!(out, "frame")?;
        for name in probes {
            write!(out, ",{}", csv_field(name))?;
        }
        writeln!(out)?;

        for (frame, entry) in &self.frames {
            write!(out, "{frame}")?;
            for name in probes {
                match entry.derived.iter().find(|d| d.name == *name).and_then(|d| d.degrees) {
                    Some(v) => write!(out, ",{v}")?,
                    None => write!(out, ",")?,
                }
            }
            writeln!(out)?;
        }
        out.flush()
    }
}

/// RFC 4180 field: quoted, with inner quotes doubled, only when needed
fn csv_field(raw: &str) -> Cow<'_, str> {
    if raw.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", raw.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(raw)
    }
}
