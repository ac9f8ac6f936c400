//! Forward kinematics over the joint topology

use serde::{Deserialize, Serialize};

use crate::math::{centroid, Quaternion, Vector3};
use crate::skeleton::{Joint, Topology, ROOT};

/// Where the chain's root joints attach
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anchor {
    /// World origin
    #[default]
    Origin,
    /// Fixed world position
    Fixed { position: [f64; 3] },
}

impl Anchor {
    pub fn position(&self) -> Vector3 {
        match self {
            Self::Origin => Vector3::zeros(),
            Self::Fixed { position } => Vector3::new(position[0], position[1], position[2]),
        }
    }
}

/// Joint positions for one frame
///
/// Holds the anchor plus every joint whose own sample and whole ancestry
/// were available. Borrowed from the topology it was computed over.
#[derive(Debug, Clone)]
pub struct PoseFrame<'t> {
    topology: &'t Topology,
    frame: usize,
    anchor: Vector3,
    positions: Vec<Option<Vector3>>,
}

impl<'t> PoseFrame<'t> {
    /// Frame index this pose was computed for
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// Anchor position
    pub fn anchor(&self) -> Vector3 {
        self.anchor
    }

    /// Position of a joint, or of the anchor for [`ROOT`]
    pub fn get(&self, id: &str) -> Option<Vector3> {
        if id == ROOT {
            return Some(self.anchor);
        }
        self.topology
            .index_of(id)
            .and_then(|i| self.positions[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Present joints in traversal order (anchor excluded)
    pub fn iter(&self) -> impl Iterator<Item = (&'t str, Vector3)> + '_ {
        self.topology
            .joints()
            .iter()
            .zip(&self.positions)
            .filter_map(|(j, p)| p.map(|p| (j.id.as_str(), p)))
    }

    /// Number of positioned joints (anchor excluded)
    pub fn len(&self) -> usize {
        self.positions.iter().filter(|p| p.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when every joint of the topology was positioned
    pub fn is_complete(&self) -> bool {
        self.positions.iter().all(Option::is_some)
    }

    /// Virtual marker at the mean position of `ids`
    ///
    /// `None` unless every listed joint is present.
    pub fn centroid(&self, ids: &[&str]) -> Option<Vector3> {
        let points = ids
            .iter()
            .map(|id| self.get(id))
            .collect::<Option<Vec<_>>>()?;
        centroid(&points)
    }

    /// Drawable segments `(joint, start, end)`: parent (or anchor) to joint
    pub fn segments(&self) -> impl Iterator<Item = (&'t str, Vector3, Vector3)> + '_ {
        let joints = self.topology.joints();
        joints.iter().enumerate().filter_map(move |(i, joint)| {
            let end = self.positions[i]?;
            let start = match joint.parent {
                Some(pi) => self.positions[pi]?,
                None => self.anchor,
            };
            Some((joint.id.as_str(), start, end))
        })
    }
}

/// Propagate rotations from the anchor down the topology
///
/// `position[j] = position[parent] + rotation[j] · (local_axis[j] · length[j])`.
/// `rotation_of` returns the joint's current orientation, or `None` when its
/// stream has no sample for this frame; such a joint is omitted together with
/// its entire subtree.
pub fn forward_kinematics<'t, F>(
    topology: &'t Topology,
    frame: usize,
    anchor: Vector3,
    mut rotation_of: F,
) -> PoseFrame<'t>
where
    F: FnMut(&Joint) -> Option<Quaternion>,
{
    let mut positions: Vec<Option<Vector3>> = vec![None; topology.len()];

    for (i, joint) in topology.joints().iter().enumerate() {
        let base = match joint.parent {
            None => Some(anchor),
            Some(pi) => positions[pi],
        };
        positions[i] = base.and_then(|base| {
            let rotation = rotation_of(joint)?;
            Some(base + rotation.apply(&joint.rest_offset()))
        });
        if positions[i].is_none() {
            tracing::trace!(frame, joint = %joint.id, "Joint omitted from pose");
        }
    }

    PoseFrame {
        topology,
        frame,
        anchor,
        positions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::JointSpec;
    use approx::assert_relative_eq;

    fn two_joint(length: f64) -> Topology {
        Topology::new(&[
            JointSpec::root("root", [1.0, 0.0, 0.0], 0.0),
            JointSpec::new("child", "root", [1.0, 0.0, 0.0], length),
        ])
        .unwrap()
    }

    fn arm() -> Topology {
        Topology::new(&[
            JointSpec::root("torso", [-1.0, 0.0, 0.0], 0.1),
            JointSpec::new("upper", "torso", [1.0, 0.0, 0.0], 0.3),
            JointSpec::new("forearm", "upper", [0.0, 1.0, 0.0], 0.25),
            JointSpec::new("hand", "forearm", [0.0, 0.0, 1.0], 0.09),
            JointSpec::new("head", "torso", [0.0, 0.0, 1.0], 0.2),
        ])
        .unwrap()
    }

    #[test]
    fn test_identity_two_joint_chain() {
        let topo = two_joint(0.7);
        let pose = forward_kinematics(&topo, 0, Vector3::zeros(), |_| Some(Quaternion::identity()));
        assert_eq!(pose.get("root").unwrap(), Vector3::zeros());
        assert_eq!(pose.get("child").unwrap(), Vector3::new(0.7, 0.0, 0.0));
        assert_eq!(pose.get(ROOT).unwrap(), Vector3::zeros());
        assert!(pose.is_complete());
    }

    #[test]
    fn test_rotation_applied_to_segment() {
        let topo = two_joint(2.0);
        let rz = Quaternion::from_axis_angle_deg([0.0, 0.0, 1.0], 90.0).unwrap();
        let pose = forward_kinematics(&topo, 0, Vector3::zeros(), |_| Some(rz));
        assert_relative_eq!(pose.get("child").unwrap(), Vector3::new(0.0, 2.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_segment_length_preserved_under_rotation() {
        let topo = arm();
        let rotations = [
            Quaternion::from_euler_xyz(10.0, 20.0, 30.0),
            Quaternion::from_euler_xyz(-80.0, 45.0, 170.0),
            Quaternion::from_euler_xyz(5.0, 89.9, -60.0),
            Quaternion::from_euler_xyz(120.0, -10.0, 0.0),
            Quaternion::from_euler_xyz(0.0, 0.0, -135.0),
        ];
        let pose = forward_kinematics(&topo, 0, Vector3::new(1.0, -2.0, 0.5), |j| {
            Some(rotations[topo.index_of(&j.id).unwrap()])
        });
        for joint in topo.joints() {
            let parent = match joint.parent {
                Some(pi) => pose.get(&topo.joints()[pi].id).unwrap(),
                None => pose.anchor(),
            };
            let child = pose.get(&joint.id).unwrap();
            assert_relative_eq!((child - parent).norm(), joint.segment_length, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_missing_sample_omits_subtree() {
        let topo = arm();
        let pose = forward_kinematics(&topo, 3, Vector3::zeros(), |j| {
            (j.id != "upper").then(Quaternion::identity)
        });
        assert!(pose.contains("torso"));
        assert!(pose.contains("head"));
        assert!(!pose.contains("upper"));
        assert!(!pose.contains("forearm"));
        assert!(!pose.contains("hand"));
        assert_eq!(pose.len(), 2);
        assert!(!pose.is_complete());
        assert_eq!(pose.frame(), 3);
    }

    #[test]
    fn test_anchor_offsets_everything() {
        let topo = two_joint(1.0);
        let anchor = Anchor::Fixed {
            position: [0.0, 0.0, 1.5],
        };
        let pose = forward_kinematics(&topo, 0, anchor.position(), |_| Some(Quaternion::identity()));
        assert_eq!(pose.get("child").unwrap(), Vector3::new(1.0, 0.0, 1.5));
        assert_eq!(Anchor::Origin.position(), Vector3::zeros());
    }

    #[test]
    fn test_segments() {
        let topo = two_joint(1.0);
        let pose = forward_kinematics(&topo, 0, Vector3::zeros(), |_| Some(Quaternion::identity()));
        let segments: Vec<_> = pose.segments().collect();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].0, "child");
        assert_eq!(segments[1].1, Vector3::zeros());
        assert_eq!(segments[1].2, Vector3::new(1.0, 0.0, 0.0));

        let ids: Vec<&str> = pose.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, ["root", "child"]);
    }

    #[test]
    fn test_centroid_marker() {
        let topo = arm();
        let pose = forward_kinematics(&topo, 0, Vector3::zeros(), |j| {
            (j.id != "head").then(Quaternion::identity)
        });
        let wrist = pose.centroid(&["forearm", "hand"]).unwrap();
        assert_relative_eq!(wrist, Vector3::new(0.2, 0.25, 0.045), epsilon = 1e-12);
        assert_eq!(pose.centroid(&["hand", "head"]), None);
        assert_eq!(pose.centroid(&[]), None);
    }
}
