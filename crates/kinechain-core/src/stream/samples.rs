//! Per-joint orientation sample streams and frame alignment

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::math::Quaternion;
use crate::skeleton::Topology;
use crate::{Error, Result};

/// Component order of quaternions as delivered by a sensor or log file
///
/// Declared once per input source and applied at the boundary; everything
/// past [`StreamSet`] is scalar-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentOrder {
    /// `[w, x, y, z]` (x-io `q0..q3` columns)
    #[default]
    ScalarFirst,
    /// `[x, y, z, w]` (SciPy, Unity, ROS)
    ScalarLast,
}

impl ComponentOrder {
    /// Reorder stored components into a (not yet normalized) quaternion
    #[inline]
    pub fn to_quaternion(self, c: [f64; 4]) -> Quaternion {
        match self {
            Self::ScalarFirst => Quaternion::new(c[0], c[1], c[2], c[3]),
            Self::ScalarLast => Quaternion::new(c[3], c[0], c[1], c[2]),
        }
    }

    /// Components of `q` in this storage order
    #[inline]
    pub fn to_components(self, q: &Quaternion) -> [f64; 4] {
        match self {
            Self::ScalarFirst => [q.w, q.x, q.y, q.z],
            Self::ScalarLast => [q.x, q.y, q.z, q.w],
        }
    }
}

impl std::fmt::Display for ComponentOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ScalarFirst => write!(f, "scalar_first"),
            Self::ScalarLast => write!(f, "scalar_last"),
        }
    }
}

impl std::str::FromStr for ComponentOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "scalar_first" | "wxyz" => Ok(Self::ScalarFirst),
            "scalar_last" | "xyzw" => Ok(Self::ScalarLast),
            other => Err(Error::Config(format!("unknown component order '{other}'"))),
        }
    }
}

/// One orientation reading, normalized
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrientationSample {
    /// Sensor timestamp (units are the transport's; only ordering matters)
    pub timestamp: f64,
    /// Unit rotation, scalar-first
    pub rotation: Quaternion,
}

/// Ordered samples for one joint
///
/// Frames are addressed by sample index, not by timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JointStream {
    joint: String,
    samples: Vec<OrientationSample>,
}

impl JointStream {
    /// Create an empty stream
    pub fn new(joint: impl Into<String>) -> Self {
        Self {
            joint: joint.into(),
            samples: Vec::new(),
        }
    }

    /// Build from stored `(timestamp, components)` rows
    ///
    /// Every row is converted from `order` and normalized; a zero-norm row
    /// fails with [`Error::DegenerateSample`].
    pub fn from_storage<I>(joint: impl Into<String>, order: ComponentOrder, rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = (f64, [f64; 4])>,
    {
        let mut stream = Self::new(joint);
        for (timestamp, components) in rows {
            stream.push_storage(timestamp, components, order)?;
        }
        Ok(stream)
    }

    /// Append a stored row
    pub fn push_storage(
        &mut self,
        timestamp: f64,
        components: [f64; 4],
        order: ComponentOrder,
    ) -> Result<()> {
        let rotation = order
            .to_quaternion(components)
            .normalize()
            .map_err(|e| match e {
                Error::DegenerateRotation { norm } => Error::DegenerateSample {
                    joint: self.joint.clone(),
                    index: self.samples.len(),
                    norm,
                },
                other => other,
            })?;
        self.samples.push(OrientationSample {
            timestamp,
            rotation,
        });
        Ok(())
    }

    /// Append a rotation, normalizing it
    pub fn push(&mut self, timestamp: f64, rotation: Quaternion) -> Result<()> {
        self.push_storage(timestamp, rotation.to_array(), ComponentOrder::ScalarFirst)
    }

    /// Stable sort by timestamp
    ///
    /// For sources that do not guarantee ordering (e.g. merged log files).
    pub fn sort_by_timestamp(&mut self) {
        self.samples
            .sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    }

    pub fn joint(&self) -> &str {
        &self.joint
    }

    pub fn samples(&self) -> &[OrientationSample] {
        &self.samples
    }

    /// Sample at a frame index
    #[inline]
    pub fn get(&self, frame: usize) -> Option<&OrientationSample> {
        self.samples.get(frame)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Sample streams for every joint of a recording
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamSet {
    streams: BTreeMap<String, JointStream>,
}

impl StreamSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a joint's stream
    pub fn insert(&mut self, stream: JointStream) -> Option<JointStream> {
        self.streams.insert(stream.joint.clone(), stream)
    }

    /// Stream for a joint, created empty on first use
    pub fn stream_mut(&mut self, joint: &str) -> &mut JointStream {
        self.streams
            .entry(joint.to_string())
            .or_insert_with(|| JointStream::new(joint))
    }

    pub fn get(&self, joint: &str) -> Option<&JointStream> {
        self.streams.get(joint)
    }

    /// Sample for a joint at a frame index
    #[inline]
    pub fn sample(&self, joint: &str, frame: usize) -> Option<&OrientationSample> {
        self.streams.get(joint).and_then(|s| s.get(frame))
    }

    pub fn iter(&self) -> impl Iterator<Item = &JointStream> + '_ {
        self.streams.values()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Sort every stream by timestamp
    pub fn sort_by_timestamp(&mut self) {
        self.streams
            .values_mut()
            .for_each(JointStream::sort_by_timestamp);
    }

    /// Frames for which every joint of `topology` has a sample
    pub fn usable_frame_count(&self, topology: &Topology) -> Result<usize> {
        usable_frame_count(topology.ids(), self)
    }
}

impl FromIterator<JointStream> for StreamSet {
    fn from_iter<I: IntoIterator<Item = JointStream>>(iter: I) -> Self {
        let mut set = StreamSet::new();
        for stream in iter {
            set.insert(stream);
        }
        set
    }
}

/// Minimum sample count over the `required` joints' streams
///
/// A required joint without a stream counts as zero samples. Fails with
/// [`Error::NoUsableFrames`] naming the first joint found empty, and with
/// [`Error::Config`] when nothing is required.
pub fn usable_frame_count<'a, I>(required: I, streams: &StreamSet) -> Result<usize>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut min: Option<(usize, &str)> = None;
    for joint in required {
        let count = streams.get(joint).map_or(0, JointStream::len);
        if min.map_or(true, |(m, _)| count < m) {
            min = Some((count, joint));
        }
    }

    match min {
        None => Err(Error::Config("no joints required for frame alignment".into())),
        Some((0, joint)) => Err(Error::NoUsableFrames {
            joint: joint.to_string(),
        }),
        Some((count, joint)) => {
            tracing::debug!(frames = count, limited_by = joint, "Frame alignment");
            Ok(count)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn stream_of_len(joint: &str, n: usize) -> JointStream {
        JointStream::from_storage(
            joint,
            ComponentOrder::ScalarFirst,
            (0..n).map(|i| (i as f64 * 0.01, [1.0, 0.0, 0.0, 0.0])),
        )
        .unwrap()
    }

    #[test]
    fn test_component_order_conversion() {
        let stored = [0.1, 0.2, 0.3, 0.9];
        let q = ComponentOrder::ScalarLast.to_quaternion(stored);
        assert_eq!(q.w, 0.9);
        assert_eq!(q.x, 0.1);
        assert_eq!(ComponentOrder::ScalarLast.to_components(&q), stored);

        let q = ComponentOrder::ScalarFirst.to_quaternion(stored);
        assert_eq!(q.w, 0.1);
        assert_eq!(ComponentOrder::ScalarFirst.to_components(&q), stored);
    }

    #[test]
    fn test_component_order_parse() {
        assert_eq!("scalar-first".parse::<ComponentOrder>().unwrap(), ComponentOrder::ScalarFirst);
        assert_eq!("xyzw".parse::<ComponentOrder>().unwrap(), ComponentOrder::ScalarLast);
        assert!("zyxw".parse::<ComponentOrder>().is_err());
    }

    #[test]
    fn test_from_storage_normalizes() {
        let stream = JointStream::from_storage(
            "a",
            ComponentOrder::ScalarLast,
            [(0.0, [0.0, 0.0, 0.0, 2.0]), (0.1, [0.0, 0.0, 3.0, 4.0])],
        )
        .unwrap();
        assert_eq!(stream.len(), 2);
        let q = stream.get(1).unwrap().rotation;
        assert_relative_eq!(q.norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(q.w, 0.8, epsilon = 1e-12);
        assert_relative_eq!(q.z, 0.6, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_sample_reports_position() {
        let err = JointStream::from_storage(
            "wrist",
            ComponentOrder::ScalarFirst,
            [(0.0, [1.0, 0.0, 0.0, 0.0]), (0.1, [0.0, 0.0, 0.0, 0.0])],
        )
        .unwrap_err();
        match err {
            Error::DegenerateSample { joint, index, .. } => {
                assert_eq!(joint, "wrist");
                assert_eq!(index, 1);
            }
            other => panic!("expected DegenerateSample, got {other:?}"),
        }
    }

    #[test]
    fn test_sort_by_timestamp() {
        let mut stream = JointStream::from_storage(
            "a",
            ComponentOrder::ScalarFirst,
            [(0.2, [1.0, 0.0, 0.0, 0.0]), (0.1, [0.0, 1.0, 0.0, 0.0])],
        )
        .unwrap();
        stream.sort_by_timestamp();
        assert_eq!(stream.get(0).unwrap().timestamp, 0.1);
        assert_eq!(stream.get(0).unwrap().rotation.x, 1.0);
    }

    #[test]
    fn test_usable_frame_count_minimum() {
        let streams: StreamSet = [
            stream_of_len("a", 10),
            stream_of_len("b", 7),
            stream_of_len("c", 12),
        ]
        .into_iter()
        .collect();
        assert_eq!(usable_frame_count(["a", "b", "c"], &streams).unwrap(), 7);
        assert_eq!(usable_frame_count(["a", "c"], &streams).unwrap(), 10);
    }

    #[test]
    fn test_usable_frame_count_missing_joint() {
        let streams: StreamSet = [stream_of_len("a", 5), stream_of_len("b", 0)]
            .into_iter()
            .collect();
        match usable_frame_count(["a", "b"], &streams) {
            Err(Error::NoUsableFrames { joint }) => assert_eq!(joint, "b"),
            other => panic!("expected NoUsableFrames, got {other:?}"),
        }
        match usable_frame_count(["a", "ghost"], &streams) {
            Err(Error::NoUsableFrames { joint }) => assert_eq!(joint, "ghost"),
            other => panic!("expected NoUsableFrames, got {other:?}"),
        }
        assert!(matches!(
            usable_frame_count(std::iter::empty(), &streams),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_stream_mut_creates() {
        let mut set = StreamSet::new();
        set.stream_mut("a").push(0.0, Quaternion::identity()).unwrap();
        set.stream_mut("a").push(0.1, Quaternion::identity()).unwrap();
        assert_eq!(set.get("a").unwrap().len(), 2);
        assert!(set.sample("a", 1).is_some());
        assert!(set.sample("a", 2).is_none());
    }
}
