// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Lie algebra/group functions for 3D rigid body motion.
//!
//! A twist is parameterized as `(v1, v2, v3, w1, w2, w3)`,
//! linear velocity first, then angular velocity.

use nalgebra::Translation3;

use crate::math::so3;
use crate::misc::type_aliases::{Iso3, Vec3, Vec6};

/// Parameterization of a twist (element of se3).
pub type Twist = Vec6;

/// Linear velocity part of a twist.
pub fn linear_velocity(xi: &Twist) -> Vec3 {
    xi.fixed_rows::<3>(0).into_owned()
}

/// Angular velocity part of a twist.
pub fn angular_velocity(xi: &Twist) -> Vec3 {
    xi.fixed_rows::<3>(3).into_owned()
}

/// Exponential map from se3 to SE3.
pub fn exp(xi: &Twist) -> Iso3 {
    let w = angular_velocity(xi);
    let t = so3::left_jacobian(w) * linear_velocity(xi);
    Iso3::from_parts(Translation3::from(t), so3::exp(w))
}

/// Logarithm map from SE3 to se3. Inverse of `exp`.
pub fn log(motion: &Iso3) -> Twist {
    let w = so3::log(motion.rotation);
    let v = so3::left_jacobian_inverse(w) * motion.translation.vector;
    Vec6::new(v.x, v.y, v.z, w.x, w.y, w.z)
}

// TESTS #############################################################

#[cfg(test)]
mod tests {
    use super::*;
    use crate::misc::type_aliases::Float;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;

    #[test]
    fn pure_translation() {
        let xi = Vec6::new(0.1, -0.2, 0.3, 0.0, 0.0, 0.0);
        let motion = exp(&xi);
        assert_eq!(Vec3::new(0.1, -0.2, 0.3), motion.translation.vector);
        assert_eq!(UnitQuaternion::identity(), motion.rotation);
        assert_eq!(xi, log(&motion));
    }

    #[test]
    fn exp_is_a_group_morphism_on_a_single_axis() {
        let xi = Vec6::new(0.2, 0.0, -0.1, 0.0, 0.4, 0.0);
        let twice = exp(&(2.0 * xi));
        assert_relative_eq!(twice, exp(&xi) * exp(&xi), epsilon = 1e-5);
    }

    // PROPERTY TESTS ################################################

    #[quickcheck_macros::quickcheck]
    fn log_exp_round_trip(t1: i16, t2: i16, t3: i16, a1: i16, a2: i16, a3: i16) -> bool {
        // Translations in [-3.3, 3.3], angles in [-1.6, 1.6].
        let (t, a) = (|x: i16| Float::from(x) * 1e-4, |x: i16| Float::from(x) * 5e-5);
        let motion = Iso3::from_parts(
            Translation3::new(t(t1), t(t2), t(t3)),
            UnitQuaternion::from_euler_angles(a(a1), a(a2), a(a3)),
        );
        approx::relative_eq!(motion, exp(&log(&motion)), epsilon = 1e-4)
    }
}
