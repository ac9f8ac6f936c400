//! Engine configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationConfig;
use crate::kinematics::{AngleProbe, Anchor, EulerSequence};
use crate::skeleton::{JointSpec, Topology, ROOT};
use crate::stream::ComponentOrder;
use crate::{Error, Result};

/// Everything needed to evaluate a recording
///
/// Serialized as JSON; every field except `topology` may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Joint table
    pub topology: Vec<JointSpec>,
    /// Reference capture per joint
    #[serde(default)]
    pub calibration: CalibrationConfig,
    /// Quaternion component order of the input streams
    #[serde(default)]
    pub component_order: ComponentOrder,
    /// Where root joints attach
    #[serde(default)]
    pub anchor: Anchor,
    /// Decomposition of relative rotations
    #[serde(default)]
    pub euler_sequence: EulerSequence,
    /// Position-derived angles evaluated each frame
    #[serde(default)]
    pub probes: Vec<AngleProbe>,
}

impl EngineConfig {
    /// Create a config for a joint table with default settings
    pub fn new(topology: Vec<JointSpec>) -> Self {
        Self {
            topology,
            ..Default::default()
        }
    }

    /// Parse a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config = Self::from_json_str(&text)?;
        tracing::debug!(path = %path.display(), joints = config.topology.len(), "Loaded engine config");
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Set the calibration configuration
    pub fn with_calibration(mut self, calibration: CalibrationConfig) -> Self {
        self.calibration = calibration;
        self
    }

    /// Set the input component order
    pub fn with_component_order(mut self, order: ComponentOrder) -> Self {
        self.component_order = order;
        self
    }

    /// Set the anchor
    pub fn with_anchor(mut self, anchor: Anchor) -> Self {
        self.anchor = anchor;
        self
    }

    /// Set the Euler decomposition
    pub fn with_euler_sequence(mut self, sequence: EulerSequence) -> Self {
        self.euler_sequence = sequence;
        self
    }

    /// Add a derived angle probe
    pub fn with_probe(mut self, probe: AngleProbe) -> Self {
        self.probes.push(probe);
        self
    }

    /// Build the topology and check the rest of the config against it
    pub fn build_topology(&self) -> Result<Topology> {
        let topology = Topology::new(&self.topology)?;
        self.calibration.validate(&topology)?;

        for (i, probe) in self.probes.iter().enumerate() {
            if self.probes[..i].iter().any(|p| p.name == probe.name) {
                return Err(Error::Config(format!("duplicate probe name '{}'", probe.name)));
            }
            let owner = format!("probe '{}'", probe.name);
            for joint in probe.joints().filter(|j| *j != ROOT) {
                topology.require(joint, &owner)?;
            }
        }

        if let Anchor::Fixed { position } = self.anchor {
            if position.iter().any(|c| !c.is_finite()) {
                return Err(Error::Config(format!("anchor position {position:?} is not finite")));
            }
        }

        Ok(topology)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationMode;
    use crate::kinematics::SegmentVector;

    fn arm() -> Vec<JointSpec> {
        vec![
            JointSpec::root("upper", [1.0, 0.0, 0.0], 0.3),
            JointSpec::new("fore", "upper", [1.0, 0.0, 0.0], 0.25),
        ]
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let json = r#"{
            "topology": [
                { "id": "upper", "parent": "ROOT", "local_axis": [1, 0, 0], "segment_length": 0.3 },
                { "id": "fore", "parent": "upper", "local_axis": [1, 0, 0], "segment_length": 0.25 }
            ]
        }"#;
        let config = EngineConfig::from_json_str(json).unwrap();
        assert_eq!(config.topology.len(), 2);
        assert_eq!(config.component_order, ComponentOrder::ScalarFirst);
        assert_eq!(config.anchor, Anchor::Origin);
        assert_eq!(config.euler_sequence, EulerSequence::IntrinsicXyz);
        assert_eq!(config.calibration.default_mode, CalibrationMode::FirstSample);
        assert!(config.probes.is_empty());
        assert_eq!(config.build_topology().unwrap().len(), 2);
    }

    #[test]
    fn test_full_json() {
        let json = r#"{
            "topology": [
                { "id": "upper", "local_axis": [1, 0, 0], "segment_length": 0.3 }
            ],
            "calibration": {
                "default_mode": { "mode": "averaged_window", "window": 20 },
                "offset_side": "left",
                "joints": {
                    "upper": { "offset": { "kind": "axis_angle", "axis": [0, 0, 1], "degrees": 90 } }
                }
            },
            "component_order": "scalar_last",
            "anchor": { "kind": "fixed", "position": [0, 0, 1.2] },
            "euler_sequence": "extrinsic_xyz"
        }"#;
        let config = EngineConfig::from_json_str(json).unwrap();
        assert_eq!(
            config.calibration.default_mode,
            CalibrationMode::AveragedWindow { window: 20 }
        );
        assert_eq!(config.component_order, ComponentOrder::ScalarLast);
        assert_eq!(config.euler_sequence, EulerSequence::ExtrinsicXyz);
        assert!(config.calibration.offset_for("upper").is_some());
        config.build_topology().unwrap();
    }

    #[test]
    fn test_json_roundtrip() {
        let config = EngineConfig::new(arm())
            .with_component_order(ComponentOrder::ScalarLast)
            .with_probe(AngleProbe::new(
                "elbow",
                SegmentVector::new("upper", "ROOT"),
                SegmentVector::new("upper", "fore"),
            ));
        let text = config.to_json_pretty().unwrap();
        assert_eq!(EngineConfig::from_json_str(&text).unwrap(), config);
    }

    #[test]
    fn test_probe_unknown_joint() {
        let config = EngineConfig::new(arm()).with_probe(AngleProbe::new(
            "wrist",
            SegmentVector::new("fore", "hand"),
            SegmentVector::new("upper", "fore"),
        ));
        match config.build_topology() {
            Err(Error::UnknownJoint { joint, referenced_by }) => {
                assert_eq!(joint, "hand");
                assert_eq!(referenced_by, "probe 'wrist'");
            }
            other => panic!("expected UnknownJoint, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_probe_name() {
        let probe = AngleProbe::new(
            "elbow",
            SegmentVector::new("upper", "ROOT"),
            SegmentVector::new("upper", "fore"),
        );
        let config = EngineConfig::new(arm())
            .with_probe(probe.clone())
            .with_probe(probe);
        assert!(matches!(config.build_topology(), Err(Error::Config(_))));
    }

    #[test]
    fn test_calibration_for_unknown_joint() {
        let config = EngineConfig::new(arm())
            .with_calibration(CalibrationConfig::first_sample().with_joint_mode(
                "hand",
                CalibrationMode::FirstSample,
            ));
        assert!(matches!(config.build_topology(), Err(Error::UnknownJoint { .. })));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            EngineConfig::from_json_str("{ \"topology\": 3 }"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            EngineConfig::load("/nonexistent/kinechain.json"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_load_error_names_file() {
        match EngineConfig::load("/nonexistent/kinechain.json") {
            Err(Error::Config(msg)) => {
                assert!(msg.starts_with("cannot read /nonexistent/kinechain.json"), "{msg}");
            }
            other => panic!("unexpected result {:?}", other.map(|c| c.topology.len())),
        }
    }
}
