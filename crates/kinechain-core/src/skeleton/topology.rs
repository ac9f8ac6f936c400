//! Joint table and parent-before-child traversal

use std::collections::{HashMap, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::math::Vector3;
use crate::{Error, Result};

/// Parent id marking a joint as attached to the chain's anchor.
pub const ROOT: &str = "ROOT";

/// One row of the joint table, as configured
///
/// `parent` may be omitted, `null`, or [`ROOT`] for joints hanging off the
/// anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointSpec {
    /// Unique joint / sensor id
    pub id: String,
    /// Parent joint id, `None` or [`ROOT`] for root joints
    #[serde(default)]
    pub parent: Option<String>,
    /// Direction from this joint toward its child, in the sensor's rest frame
    pub local_axis: [f64; 3],
    /// Length of the segment this joint drives
    pub segment_length: f64,
}

impl JointSpec {
    /// Create a joint attached to `parent`
    pub fn new(
        id: impl Into<String>,
        parent: impl Into<String>,
        local_axis: [f64; 3],
        segment_length: f64,
    ) -> Self {
        Self {
            id: id.into(),
            parent: Some(parent.into()),
            local_axis,
            segment_length,
        }
    }

    /// Create a joint attached to the anchor
    pub fn root(id: impl Into<String>, local_axis: [f64; 3], segment_length: f64) -> Self {
        Self {
            id: id.into(),
            parent: None,
            local_axis,
            segment_length,
        }
    }

    /// Parent id with the root sentinel folded into `None`
    pub fn parent_id(&self) -> Option<&str> {
        self.parent.as_deref().filter(|p| *p != ROOT)
    }
}

/// A validated joint in traversal order
#[derive(Debug, Clone)]
pub struct Joint {
    pub id: String,
    /// Index of the parent in [`Topology::joints`], `None` for root joints
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Unit rest direction
    pub local_axis: Vector3,
    pub segment_length: f64,
}

impl Joint {
    /// Rest-pose segment vector: `local_axis * segment_length`
    #[inline]
    pub fn rest_offset(&self) -> Vector3 {
        self.local_axis * self.segment_length
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Immutable skeleton description
///
/// Joints are stored so that every parent precedes its children; iterating
/// [`Topology::joints`] is a valid forward-kinematics order.
#[derive(Debug, Clone)]
pub struct Topology {
    joints: Vec<Joint>,
    index: HashMap<String, usize>,
}

impl Topology {
    /// Validate a joint table and compute its traversal order
    ///
    /// Roots are visited in declaration order and children breadth-first,
    /// also in declaration order.
    pub fn new(specs: &[JointSpec]) -> Result<Self> {
        if specs.is_empty() {
            return Err(Error::Config("topology has no joints".into()));
        }

        let mut declared: HashMap<&str, usize> = HashMap::with_capacity(specs.len());
        for (i, spec) in specs.iter().enumerate() {
            if spec.id == ROOT {
                return Err(Error::Config(format!(
                    "'{ROOT}' is reserved for the anchor and cannot be a joint id"
                )));
            }
            if declared.insert(spec.id.as_str(), i).is_some() {
                return Err(Error::DuplicateJoint(spec.id.clone()));
            }
        }

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); specs.len()];
        let mut queue = VecDeque::new();
        for (i, spec) in specs.iter().enumerate() {
            validate_geometry(spec)?;
            match spec.parent_id() {
                None => queue.push_back(i),
                Some(parent) => {
                    let pi = *declared.get(parent).ok_or_else(|| Error::UnknownJoint {
                        joint: parent.to_string(),
                        referenced_by: format!("joint '{}'", spec.id),
                    })?;
                    children[pi].push(i);
                }
            }
        }

        // Breadth-first from the roots; anything not reached sits on a cycle.
        let mut order = Vec::with_capacity(specs.len());
        while let Some(i) = queue.pop_front() {
            order.push(i);
            queue.extend(children[i].iter().copied());
        }

        if order.len() != specs.len() {
            let mut reached = vec![false; specs.len()];
            for &i in &order {
                reached[i] = true;
            }
            let joints = specs
                .iter()
                .zip(reached)
                .filter(|(_, r)| !r)
                .map(|(s, _)| s.id.clone())
                .collect();
            return Err(Error::Cycle { joints });
        }

        let mut position = vec![0usize; specs.len()];
        for (slot, &i) in order.iter().enumerate() {
            position[i] = slot;
        }

        let joints: Vec<Joint> = order
            .iter()
            .map(|&i| {
                let spec = &specs[i];
                let axis = Vector3::new(spec.local_axis[0], spec.local_axis[1], spec.local_axis[2]);
                Joint {
                    id: spec.id.clone(),
                    parent: spec.parent_id().map(|p| position[declared[p]]),
                    children: children[i].iter().map(|&c| position[c]).collect(),
                    local_axis: axis.normalize(),
                    segment_length: spec.segment_length,
                }
            })
            .collect();

        let index = joints
            .iter()
            .enumerate()
            .map(|(i, j)| (j.id.clone(), i))
            .collect();

        tracing::debug!(joints = joints.len(), "Topology built");

        Ok(Self { joints, index })
    }

    /// Joints in parent-before-child order
    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    /// Number of joints
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    /// Always false for a constructed topology
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Traversal-order index of a joint
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Look up a joint by id
    pub fn get(&self, id: &str) -> Option<&Joint> {
        self.index_of(id).map(|i| &self.joints[i])
    }

    /// Look up a joint by id, failing with [`Error::UnknownJoint`]
    pub fn require(&self, id: &str, referenced_by: &str) -> Result<&Joint> {
        self.get(id).ok_or_else(|| Error::UnknownJoint {
            joint: id.to_string(),
            referenced_by: referenced_by.to_string(),
        })
    }

    /// Parent of a joint, `None` for roots and unknown ids
    pub fn parent_of(&self, id: &str) -> Option<&Joint> {
        self.get(id)
            .and_then(|j| j.parent)
            .map(|pi| &self.joints[pi])
    }

    /// Root joints (attached to the anchor)
    pub fn roots(&self) -> impl Iterator<Item = &Joint> + '_ {
        self.joints.iter().filter(|j| j.is_root())
    }

    /// Joint ids in traversal order
    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.joints.iter().map(|j| j.id.as_str())
    }

    fn fmt_subtree(&self, f: &mut fmt::Formatter<'_>, idx: usize, depth: usize) -> fmt::Result {
        let joint = &self.joints[idx];
        let a = joint.local_axis;
        writeln!(
            f,
            "{}{} len={:.3} axis=({:.2}, {:.2}, {:.2})",
            "  ".repeat(depth),
            joint.id,
            joint.segment_length,
            a.x,
            a.y,
            a.z
        )?;
        for &child in &joint.children {
            self.fmt_subtree(f, child, depth + 1)?;
        }
        Ok(())
    }
}

/// Indented tree, one joint per line
impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{ROOT}")?;
        for (i, joint) in self.joints.iter().enumerate() {
            if joint.is_root() {
                self.fmt_subtree(f, i, 1)?;
            }
        }
        Ok(())
    }
}

fn validate_geometry(spec: &JointSpec) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidGeometry {
        joint: spec.id.clone(),
        reason: reason.to_string(),
    };
    if !spec.segment_length.is_finite() || spec.segment_length < 0.0 {
        return Err(invalid("segment length must be finite and non-negative"));
    }
    let axis = Vector3::new(spec.local_axis[0], spec.local_axis[1], spec.local_axis[2]);
    if !axis.iter().all(|c| c.is_finite()) || axis.norm() < crate::math::DEGENERATE_LENGTH {
        return Err(invalid("local axis must be a finite, non-zero vector"));
    }
    Ok(())
}
