//! Quaternion log loading
//!
//! A recording directory holds one quaternion CSV per sensor, named
//! `<joint>_<anything>quaternion<anything>.csv` (e.g. `IMU-3_Quaternion.csv`).
//! Each file has a header row with a `timestamp` (or `Time`) column and the
//! four components in `q0,q1,q2,q3` columns, stored in the declared order.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use kinechain_core::{ComponentOrder, JointStream, StreamSet};

const TIMESTAMP_COLUMNS: [&str; 2] = ["timestamp", "Time"];
const COMPONENT_COLUMNS: [&str; 4] = ["q0", "q1", "q2", "q3"];

/// Quaternion log file found in a recording directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    pub joint: String,
    pub path: PathBuf,
}

/// Joint id for a log file name, `None` if it is not a quaternion log
pub fn joint_for_file(name: &str) -> Option<&str> {
    let stem = name.strip_suffix(".csv")?;
    if !stem.to_ascii_lowercase().contains("quaternion") {
        return None;
    }
    let joint = stem.split('_').next()?;
    (!joint.is_empty() && joint.len() < stem.len()).then_some(joint)
}

/// Quaternion logs in `dir`, sorted by file name
pub fn find_logs(dir: &Path) -> Result<Vec<LogFile>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("cannot list recording dir {}", dir.display()))?;

    let mut logs = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(joint) = joint_for_file(name) {
            logs.push(LogFile {
                joint: joint.to_string(),
                path: path.clone(),
            });
        }
    }
    logs.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(logs)
}

/// Column positions of a quaternion log header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Columns {
    timestamp: usize,
    components: [usize; 4],
}

impl Columns {
    fn from_header(header: &str) -> Option<Self> {
        let names: Vec<&str> = header.split(',').map(str::trim).collect();
        let find = |wanted: &str| names.iter().position(|n| *n == wanted);

        let timestamp = TIMESTAMP_COLUMNS.iter().find_map(|c| find(*c))?;
        let mut components = [0; 4];
        for (slot, name) in components.iter_mut().zip(COMPONENT_COLUMNS) {
            *slot = find(name)?;
        }
        Some(Self {
            timestamp,
            components,
        })
    }
}

/// Row counts for one log
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReadStats {
    pub rows: usize,
    pub degenerate: usize,
}

/// Parse one quaternion log into `stream`
///
/// Degenerate (zero-norm) rows are skipped and counted; unparsable rows are
/// an error. Returns `Ok(None)` when the header lacks the required columns.
pub fn read_log(
    text: &str,
    order: ComponentOrder,
    stream: &mut JointStream,
) -> Result<Option<ReadStats>> {
    let mut lines = text.lines().enumerate();
    let Some((_, header)) = lines.next() else {
        return Ok(None);
    };
    let Some(columns) = Columns::from_header(header) else {
        return Ok(None);
    };

    let mut stats = ReadStats::default();
    for (i, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let field = |idx: usize| -> Result<f64> {
            let raw = fields
                .get(idx)
                .with_context(|| format!("line {}: missing column {}", i + 1, idx + 1))?;
            raw.parse::<f64>()
                .with_context(|| format!("line {}: invalid number '{}'", i + 1, raw))
        };

        let timestamp = field(columns.timestamp)?;
        let mut components = [0.0; 4];
        for (c, &idx) in components.iter_mut().zip(&columns.components) {
            *c = field(idx)?;
        }

        match stream.push_storage(timestamp, components, order) {
            Ok(()) => stats.rows += 1,
            Err(kinechain_core::Error::DegenerateSample { index, norm, .. }) => {
                tracing::warn!(joint = stream.joint(), line = i + 1, index, norm, "Skipping degenerate sample");
                stats.degenerate += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(Some(stats))
}

/// Load every quaternion log of a recording directory
///
/// Files without the expected columns are skipped with a warning. Streams
/// are sorted by timestamp.
pub fn load_recording(dir: &Path, order: ComponentOrder) -> Result<StreamSet> {
    let logs = find_logs(dir)?;
    if logs.is_empty() {
        bail!("no quaternion logs found in {}", dir.display());
    }

    let mut streams = StreamSet::new();
    for log in &logs {
        let text = fs::read_to_string(&log.path)
            .with_context(|| format!("cannot read {}", log.path.display()))?;
        let stream = streams.stream_mut(&log.joint);
        match read_log(&text, order, stream)
            .with_context(|| format!("in {}", log.path.display()))?
        {
            Some(stats) => tracing::info!(
                joint = %log.joint,
                file = %log.path.display(),
                rows = stats.rows,
                skipped = stats.degenerate,
                "Loaded quaternion log"
            ),
            None => tracing::warn!(
                file = %log.path.display(),
                "Missing timestamp/q0..q3 columns, skipping"
            ),
        }
    }

    streams.sort_by_timestamp();
    Ok(streams)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_joint_for_file() {
        assert_eq!(joint_for_file("IMU-3_Quaternion.csv"), Some("IMU-3"));
        assert_eq!(joint_for_file("IMU-1_2025_quaternion_log.csv"), Some("IMU-1"));
        assert_eq!(joint_for_file("IMU-1_Inertial.csv"), None);
        assert_eq!(joint_for_file("Quaternion.csv"), None);
        assert_eq!(joint_for_file("IMU-2_Quaternion.txt"), None);
    }

    #[test]
    fn test_read_log_time_alias_and_order() {
        let text = "Time,q0,q1,q2,q3\n0.02,0,0,0,2\n0.01,1,0,0,0\n\n";
        let mut stream = JointStream::new("IMU-1");
        let stats = read_log(text, ComponentOrder::ScalarFirst, &mut stream)
            .unwrap()
            .unwrap();
        assert_eq!(stats.rows, 2);
        assert_eq!(stream.len(), 2);
        // normalized, scalar-first
        assert_relative_eq!(stream.samples()[0].rotation.z, 1.0);

        stream.sort_by_timestamp();
        assert_relative_eq!(stream.samples()[0].rotation.w, 1.0);
    }

    #[test]
    fn test_read_log_scalar_last() {
        let text = "timestamp,q0,q1,q2,q3\n0,0,0,0,1\n";
        let mut stream = JointStream::new("a");
        read_log(text, ComponentOrder::ScalarLast, &mut stream).unwrap();
        assert_relative_eq!(stream.samples()[0].rotation.w, 1.0);
    }

    #[test]
    fn test_read_log_skips_degenerate() {
        let text = "timestamp,q0,q1,q2,q3\n0,0,0,0,0\n1,1,0,0,0\n";
        let mut stream = JointStream::new("a");
        let stats = read_log(text, ComponentOrder::ScalarFirst, &mut stream)
            .unwrap()
            .unwrap();
        assert_eq!(stats, ReadStats { rows: 1, degenerate: 1 });
        assert_eq!(stream.len(), 1);
    }

    #[test]
    fn test_read_log_bad_rows() {
        let mut stream = JointStream::new("a");
        assert!(read_log("timestamp,q0,q1,q2,q3\n0,1,x,0,0\n", ComponentOrder::ScalarFirst, &mut stream).is_err());
        assert!(read_log("timestamp,q0,q1,q2,q3\n0,1,0\n", ComponentOrder::ScalarFirst, &mut stream).is_err());
        assert!(read_log("stamp,w,x,y,z\n0,1,0,0,0\n", ComponentOrder::ScalarFirst, &mut stream)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_load_recording_dir() {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, text: &str| fs::write(dir.path().join(name), text).unwrap();
        // out of order on purpose
        write("IMU-3_Quaternion.csv", "timestamp,q0,q1,q2,q3\n0.02,0,0,0,1\n0.01,1,0,0,0\n");
        write("IMU-3_Inertial.csv", "timestamp,gx,gy,gz\n0.01,0,0,0\n");
        write("IMU-1_Quaternion.csv", "Time,q0,q1,q2,q3\n0.01,1,0,0,0\n");
        write("IMU-2_Quaternion.csv", "timestamp,w,x,y,z\n0.01,1,0,0,0\n");
        write("notes.txt", "not a log");

        let logs = find_logs(dir.path()).unwrap();
        let joints: Vec<&str> = logs.iter().map(|l| l.joint.as_str()).collect();
        assert_eq!(joints, ["IMU-1", "IMU-2", "IMU-3"]);

        let streams = load_recording(dir.path(), ComponentOrder::ScalarFirst).unwrap();
        let imu3 = streams.get("IMU-3").unwrap();
        assert_eq!(imu3.len(), 2);
        assert_relative_eq!(imu3.samples()[0].timestamp, 0.01);
        assert_relative_eq!(imu3.samples()[0].rotation.w, 1.0);
        assert_relative_eq!(imu3.samples()[1].rotation.z, 1.0);
        assert_eq!(streams.get("IMU-1").unwrap().len(), 1);
        // header without q0..q3: file skipped, nothing recorded for it
        assert!(streams.get("IMU-2").map_or(true, |s| s.is_empty()));
    }

    #[test]
    fn test_load_recording_without_logs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("IMU-1_Inertial.csv"), "timestamp\n").unwrap();
        let err = load_recording(dir.path(), ComponentOrder::ScalarFirst).unwrap_err();
        assert!(err.to_string().contains("no quaternion logs"));

        assert!(find_logs(&dir.path().join("missing")).is_err());
    }
}
