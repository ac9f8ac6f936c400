//! Quaternion rotations for sensor orientations
//!
//! Wrapper around nalgebra's UnitQuaternion with the handful of operations the
//! kinematic chain needs: validated normalization, composition, vector
//! rotation and Euler decomposition.

use nalgebra::{Unit, UnitQuaternion};
use serde::{Deserialize, Serialize};

use super::Vector3;
use crate::{Error, Result};

/// Norms below this are rejected by [`Quaternion::normalize`].
pub const DEGENERATE_NORM: f64 = 1e-12;

/// `|sin(pitch)|` above which the intrinsic XYZ split is treated as gimbal-locked.
const GIMBAL_THRESHOLD: f64 = 1.0 - 1e-12;

/// A quaternion representing a 3D rotation
///
/// Stored scalar-first (w, x, y, z) regardless of how the sensor or log file
/// orders its components; see [`crate::stream::ComponentOrder`] for the
/// conversion at the input boundary. Values produced by [`Quaternion::normalize`]
/// are unit length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    /// Scalar component (w)
    pub w: f64,
    /// X component
    pub x: f64,
    /// Y component
    pub y: f64,
    /// Z component
    pub z: f64,
}

impl Quaternion {
    /// Create a quaternion from raw components (no normalization)
    pub const fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    /// Identity quaternion (no rotation)
    pub const fn identity() -> Self {
        Self {
            w: 1.0,
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }

    /// Create from an axis and an angle in degrees
    ///
    /// Fails when the axis has (near) zero length.
    pub fn from_axis_angle_deg(axis: [f64; 3], degrees: f64) -> Result<Self> {
        let axis_vec = Vector3::new(axis[0], axis[1], axis[2]);
        let unit_axis = Unit::try_new(axis_vec, DEGENERATE_NORM).ok_or(Error::DegenerateRotation {
            norm: axis_vec.norm(),
        })?;
        let uq = UnitQuaternion::from_axis_angle(&unit_axis, degrees.to_radians());
        Ok(Self::from_nalgebra(uq))
    }

    /// Create from intrinsic X→Y→Z Euler angles in degrees
    ///
    /// Inverse of [`Quaternion::to_euler_xyz`]: rotate about X by `roll`, then
    /// about the rotated Y by `pitch`, then about the twice-rotated Z by `yaw`.
    pub fn from_euler_xyz(roll: f64, pitch: f64, yaw: f64) -> Self {
        let rx = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), roll.to_radians());
        let ry = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), pitch.to_radians());
        let rz = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), yaw.to_radians());
        Self::from_nalgebra(rx * ry * rz)
    }

    /// Convert from nalgebra's UnitQuaternion
    pub fn from_nalgebra(uq: UnitQuaternion<f64>) -> Self {
        Self {
            w: uq.w,
            x: uq.i,
            y: uq.j,
            z: uq.k,
        }
    }

    /// Convert to nalgebra's UnitQuaternion
    pub fn to_nalgebra(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(self.w, self.x, self.y, self.z))
    }

    /// Components in scalar-first order
    #[inline]
    pub const fn to_array(&self) -> [f64; 4] {
        [self.w, self.x, self.y, self.z]
    }

    /// Euclidean norm of the component vector
    #[inline]
    pub fn norm(&self) -> f64 {
        self.norm_squared().sqrt()
    }

    /// Squared magnitude
    #[inline]
    pub fn norm_squared(&self) -> f64 {
        self.w.mul_add(
            self.w,
            self.x
                .mul_add(self.x, self.y.mul_add(self.y, self.z * self.z)),
        )
    }

    /// Scale to unit length
    ///
    /// Returns [`Error::DegenerateRotation`] when the norm is below
    /// [`DEGENERATE_NORM`]. Normalizing a unit quaternion returns it unchanged
    /// up to rounding.
    pub fn normalize(&self) -> Result<Quaternion> {
        let norm = self.norm();
        if !norm.is_finite() || norm < DEGENERATE_NORM {
            return Err(Error::DegenerateRotation { norm });
        }
        let inv_norm = 1.0 / norm;
        Ok(Self {
            w: self.w * inv_norm,
            x: self.x * inv_norm,
            y: self.y * inv_norm,
            z: self.z * inv_norm,
        })
    }

    /// Compose two rotations: `self * other`
    ///
    /// The result applies `other` first, then `self`. Uses the Hamilton
    /// product directly, avoiding nalgebra conversion.
    #[inline]
    pub fn compose(&self, other: &Quaternion) -> Quaternion {
        Self {
            w: self.w.mul_add(
                other.w,
                (-self.x).mul_add(other.x, (-self.y).mul_add(other.y, -self.z * other.z)),
            ),
            x: self.w.mul_add(
                other.x,
                self.x
                    .mul_add(other.w, self.y.mul_add(other.z, -self.z * other.y)),
            ),
            y: self.w.mul_add(
                other.y,
                (-self.x).mul_add(other.z, self.y.mul_add(other.w, self.z * other.x)),
            ),
            z: self.w.mul_add(
                other.z,
                self.x
                    .mul_add(other.y, (-self.y).mul_add(other.x, self.z * other.w)),
            ),
        }
    }

    /// Inverse of a unit quaternion (its conjugate)
    #[inline]
    pub fn invert(&self) -> Quaternion {
        Self {
            w: self.w,
            x: -self.x,
            y: -self.y,
            z: -self.z,
        }
    }

    /// Rotate a 3D vector
    ///
    /// v' = v + 2w(q x v) + 2(q x (q x v)) where q = (x, y, z) is the vector part.
    #[inline]
    pub fn apply(&self, v: &Vector3) -> Vector3 {
        let qv = Vector3::new(self.x, self.y, self.z);
        let uv = qv.cross(v);
        let uuv = qv.cross(&uv);
        v + (uv * self.w + uuv) * 2.0
    }

    /// Dot product between two quaternions
    #[inline]
    pub fn dot(&self, other: &Quaternion) -> f64 {
        self.w.mul_add(
            other.w,
            self.x
                .mul_add(other.x, self.y.mul_add(other.y, self.z * other.z)),
        )
    }

    /// Angular distance between two rotations in degrees
    #[inline]
    pub fn angular_distance_deg(&self, other: &Quaternion) -> f64 {
        let dot = self.dot(other).abs().min(1.0);
        (2.0 * dot.acos()).to_degrees()
    }

    /// Intrinsic X→Y→Z Euler angles `(roll, pitch, yaw)` in degrees
    ///
    /// `self == Rx(roll) * Ry(pitch) * Rz(yaw)`, with pitch in [-90, 90].
    /// Near pitch = ±90° roll and yaw rotate about the same axis and only
    /// their sum is observable; yaw is then reported as 0 and the whole
    /// rotation folded into roll. Those splits are valid but less stable
    /// numerically than away from the singularity.
    pub fn to_euler_xyz(&self) -> (f64, f64, f64) {
        let rot = self.to_nalgebra().to_rotation_matrix();
        let m = rot.matrix();
        let sin_pitch = m[(0, 2)].clamp(-1.0, 1.0);
        let pitch = sin_pitch.asin();

        let (roll, yaw) = if sin_pitch.abs() > GIMBAL_THRESHOLD {
            (m[(2, 1)].atan2(m[(1, 1)]), 0.0)
        } else {
            (
                (-m[(1, 2)]).atan2(m[(2, 2)]),
                (-m[(0, 1)]).atan2(m[(0, 0)]),
            )
        };

        (roll.to_degrees(), pitch.to_degrees(), yaw.to_degrees())
    }

    /// Extrinsic (fixed-axis) X→Y→Z Euler angles `(roll, pitch, yaw)` in degrees
    ///
    /// `self == Rz(yaw) * Ry(pitch) * Rx(roll)`, the convention most IMU
    /// vendors log their Euler channel in.
    pub fn to_euler_extrinsic_xyz(&self) -> (f64, f64, f64) {
        let (roll, pitch, yaw) = self.to_nalgebra().euler_angles();
        (roll.to_degrees(), pitch.to_degrees(), yaw.to_degrees())
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::ops::Mul for Quaternion {
    type Output = Quaternion;

    fn mul(self, rhs: Self) -> Self::Output {
        self.compose(&rhs)
    }
}

impl std::ops::Mul<&Quaternion> for Quaternion {
    type Output = Quaternion;

    fn mul(self, rhs: &Self) -> Self::Output {
        self.compose(rhs)
    }
}
