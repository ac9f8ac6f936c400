//! Math utilities for kinematic chains: quaternions and vector angles
//!
//! Built on top of nalgebra for performance and correctness.

mod quaternion;

pub use quaternion::{Quaternion, DEGENERATE_NORM};

/// Type alias for 3D vectors and positions
pub type Vector3 = nalgebra::Vector3<f64>;

/// Vector magnitudes below this make [`angle_between`] return 0°.
pub const DEGENERATE_LENGTH: f64 = 1e-12;

/// Undirected angle between two vectors in degrees, in [0, 180]
///
/// Returns `0.0` when either vector is shorter than [`DEGENERATE_LENGTH`].
/// That is a clamped policy for degenerate input (e.g. two coincident joints),
/// not a meaningful angle: it keeps per-frame series continuous for consumers
/// such as live plots.
#[inline]
pub fn angle_between(v1: &Vector3, v2: &Vector3) -> f64 {
    let n1 = v1.norm();
    let n2 = v2.norm();
    if n1 < DEGENERATE_LENGTH || n2 < DEGENERATE_LENGTH {
        return 0.0;
    }
    let cos_theta = (v1.dot(v2) / (n1 * n2)).clamp(-1.0, 1.0);
    cos_theta.acos().to_degrees()
}

/// Mean position of a set of points
///
/// Used to place a virtual marker (e.g. a wrist centre between two wrist
/// markers) or an externally derived anchor. Returns `None` for an empty set.
pub fn centroid<'a, I>(points: I) -> Option<Vector3>
where
    I: IntoIterator<Item = &'a Vector3>,
{
    let (sum, count) = points
        .into_iter()
        .fold((Vector3::zeros(), 0usize), |(sum, n), p| (sum + p, n + 1));
    (count > 0).then(|| sum / count as f64)
}
