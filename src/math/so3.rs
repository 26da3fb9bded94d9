// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Lie algebra/group functions for 3D rotations.
//!
//! Interesting reads:
//! - Sophus c++ library: <https://github.com/strasdat/Sophus>
//! - Ethan Eade course on Lie Groups for 2D and 3D transformations:
//!     - details: <http://ethaneade.com/lie.pdf>
//!     - summary: <http://ethaneade.com/lie_groups.pdf>

use nalgebra::{Quaternion, UnitQuaternion};

use crate::misc::type_aliases::{Float, Mat3, Vec3};

/// Below this angle, trigonometric coefficients use their Taylor expansion.
const EPSILON_TAYLOR_SERIES: Float = 1e-2;
const EPSILON_TAYLOR_SERIES_2: Float = EPSILON_TAYLOR_SERIES * EPSILON_TAYLOR_SERIES;

/// Hat operator.
/// Goes from so3 parameterization to so3 element (skew-symmetric matrix).
#[rustfmt::skip]
pub fn hat(w: Vec3) -> Mat3 {
    Mat3::new(
         0.0,  -w.z,   w.y,
         w.z,   0.0,  -w.x,
        -w.y,   w.x,   0.0,
    )
}

/// Vee operator. Inverse of hat operator.
/// Warning! does not check that the given matrix is skew-symmetric.
pub fn vee(mat: Mat3) -> Vec3 {
    Vec3::new(mat.m32, mat.m13, mat.m21)
}

/// Exponential map, from an axis-angle vector to a rotation.
pub fn exp(w: Vec3) -> UnitQuaternion<Float> {
    let theta_2 = w.norm_squared();
    let (real, imag) = if theta_2 < EPSILON_TAYLOR_SERIES_2 {
        (1.0 - theta_2 / 8.0, 0.5 - theta_2 / 48.0)
    } else {
        let theta = theta_2.sqrt();
        let (sin, cos) = (0.5 * theta).sin_cos();
        (cos, sin / theta)
    };
    UnitQuaternion::from_quaternion(Quaternion::from_parts(real, imag * w))
}

/// Logarithm map, from a rotation to an axis-angle vector of norm in `[0, pi]`.
pub fn log(rotation: UnitQuaternion<Float>) -> Vec3 {
    // q and -q are the same rotation, pick the one with the smallest angle.
    let q = rotation.into_inner();
    let q = if q.w < 0.0 { -q } else { q };
    let imag = q.imag();
    let imag_norm_2 = imag.norm_squared();
    if imag_norm_2 < EPSILON_TAYLOR_SERIES_2 {
        (2.0 / q.w) * imag
    } else {
        let imag_norm = imag_norm_2.sqrt();
        let theta = 2.0 * imag_norm.atan2(q.w);
        (theta / imag_norm) * imag
    }
}

/// Left jacobian of SO3, also the `V` matrix linking
/// the translation part of a twist to the translation of the rigid motion.
pub fn left_jacobian(w: Vec3) -> Mat3 {
    let theta_2 = w.norm_squared();
    let omega = hat(w);
    let (a, b) = if theta_2 < EPSILON_TAYLOR_SERIES_2 {
        (0.5 - theta_2 / 24.0, 1.0 / 6.0 - theta_2 / 120.0)
    } else {
        let theta = theta_2.sqrt();
        (
            (1.0 - theta.cos()) / theta_2,
            (theta - theta.sin()) / (theta * theta_2),
        )
    };
    Mat3::identity() + a * omega + b * omega * omega
}

/// Inverse of `left_jacobian`.
pub fn left_jacobian_inverse(w: Vec3) -> Mat3 {
    let theta_2 = w.norm_squared();
    let omega = hat(w);
    let c = if theta_2 < EPSILON_TAYLOR_SERIES_2 {
        1.0 / 12.0 + theta_2 / 720.0
    } else {
        let theta = theta_2.sqrt();
        let half_theta = 0.5 * theta;
        (1.0 - half_theta / half_theta.tan()) / theta_2
    };
    Mat3::identity() - 0.5 * omega + c * omega * omega
}

// TESTS #############################################################

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn exp_of_zero_is_identity() {
        assert_eq!(UnitQuaternion::identity(), exp(Vec3::zeros()));
        assert_eq!(Vec3::zeros(), log(UnitQuaternion::identity()));
    }

    #[test]
    fn exp_matches_axis_angle() {
        let w = Vec3::new(0.0, 0.0, 1.2);
        let expected = UnitQuaternion::from_axis_angle(&Vec3::z_axis(), 1.2);
        assert_relative_eq!(expected, exp(w), epsilon = 1e-6);
    }

    #[test]
    fn left_jacobian_inverse_is_inverse() {
        for w in &[Vec3::new(1e-3, -2e-3, 5e-4), Vec3::new(0.3, -1.1, 0.7)] {
            let prod = left_jacobian(*w) * left_jacobian_inverse(*w);
            assert_relative_eq!(Mat3::identity(), prod, epsilon = 1e-5);
        }
    }

    // PROPERTY TESTS ################################################

    #[quickcheck_macros::quickcheck]
    fn hat_vee_roundtrip(x: i16, y: i16, z: i16) -> bool {
        let w = Vec3::new(Float::from(x), Float::from(y), Float::from(z));
        w == vee(hat(w))
    }

    #[quickcheck_macros::quickcheck]
    fn log_exp_round_trip(roll: i16, pitch: i16, yaw: i16) -> bool {
        // Angles in [-3.2767, 3.2767].
        let angle = |a: i16| Float::from(a) * 1e-4;
        let rotation = UnitQuaternion::from_euler_angles(angle(roll), angle(pitch), angle(yaw));
        approx::relative_eq!(rotation, exp(log(rotation)), epsilon = 1e-5)
    }
}
