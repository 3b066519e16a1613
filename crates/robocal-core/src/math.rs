//! Mathematical utilities and type definitions.
//!
//! This module provides fundamental types used throughout the workspace
//! and the single Euler-angle convention used for attitude reporting.
//!
//! # Euler convention
//!
//! Attitudes are decomposed as intrinsic Z-Y'-X'' (yaw, pitch, roll):
//!
//! ```text
//! R = Rz(yaw) * Ry(pitch) * Rx(roll)
//! ```
//!
//! This matches URDF `rpy` attributes and nalgebra's
//! `Rotation3::from_euler_angles(roll, pitch, yaw)`.

use nalgebra::{Isometry3, Matrix3, Point3, Rotation3, Translation3, Vector3};
use serde::{Deserialize, Serialize};

/// Scalar type used throughout the library (currently `f64`).
pub type Real = f64;

/// 3D vector with [`Real`] components.
pub type Vec3 = Vector3<Real>;
/// 3D point with [`Real`] coordinates.
pub type Pt3 = Point3<Real>;
/// 3×3 matrix with [`Real`] entries.
pub type Mat3 = Matrix3<Real>;
/// 3D rigid transform (SE(3)) using [`Real`].
pub type Iso3 = Isometry3<Real>;

/// Roll, pitch and yaw of a rotation, in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rpy {
    pub roll: Real,
    pub pitch: Real,
    pub yaw: Real,
}

impl Rpy {
    pub fn new(roll: Real, pitch: Real, yaw: Real) -> Self {
        Self { roll, pitch, yaw }
    }

    /// Decompose the rotational part of `iso`.
    pub fn from_iso(iso: &Iso3) -> Self {
        let (roll, pitch, yaw) = iso.rotation.euler_angles();
        Self { roll, pitch, yaw }
    }

    pub fn to_rotation(&self) -> Rotation3<Real> {
        Rotation3::from_euler_angles(self.roll, self.pitch, self.yaw)
    }
}

/// Build a rigid transform from a translation and roll/pitch/yaw angles.
pub fn iso_from_xyz_rpy(xyz: [Real; 3], rpy: Rpy) -> Iso3 {
    Iso3::from_parts(
        Translation3::new(xyz[0], xyz[1], xyz[2]),
        rpy.to_rotation().into(),
    )
}

/// Heading of a pose: the yaw of its [`Rpy`] decomposition.
pub fn heading(iso: &Iso3) -> Real {
    Rpy::from_iso(iso).yaw
}

/// Planar pose `(x, y, yaw)` lifted to SE(3) (z = 0, no roll/pitch).
pub fn planar_iso(x: Real, y: Real, yaw: Real) -> Iso3 {
    iso_from_xyz_rpy([x, y, 0.0], Rpy::new(0.0, 0.0, yaw))
}

/// Translation and rotation-angle distance between two poses.
pub fn pose_error(a: &Iso3, b: &Iso3) -> (Real, Real) {
    let dt = (a.translation.vector - b.translation.vector).norm();
    let angle = a.rotation.angle_to(&b.rotation);
    (dt, angle)
}
