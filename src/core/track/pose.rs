// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Bookkeeping of the rigid motions anchoring the keyframe and the current frame.
//!
//! Naming follows `a_to_b`: the motion transforming coordinates
//! expressed in frame `a` into coordinates expressed in frame `b`.

use crate::misc::type_aliases::Iso3;

/// Composition "apply `a`, then `b`".
pub fn concat(a: &Iso3, b: &Iso3) -> Iso3 {
    b * a
}

/// Owner of the three long-lived rigid motions of the odometry.
///
/// Invariant: `world_to_current == concat(world_to_key, key_to_current)`
/// after every `commit` and `fold_keyframe`.
#[derive(Clone, PartialEq, Debug)]
pub struct PoseComposer {
    world_to_key: Iso3,
    key_to_current: Iso3,
    world_to_current: Iso3,
}

impl Default for PoseComposer {
    fn default() -> Self {
        Self {
            world_to_key: Iso3::identity(),
            key_to_current: Iso3::identity(),
            world_to_current: Iso3::identity(),
        }
    }
}

impl PoseComposer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a newly estimated keyframe to current frame motion.
    pub fn commit(&mut self, key_to_current: Iso3) {
        self.key_to_current = key_to_current;
        self.world_to_current = concat(&self.world_to_key, &self.key_to_current);
    }

    /// Make the current frame the new keyframe.
    ///
    /// The motion since the previous keyframe is folded into `world_to_key`,
    /// so `world_to_current` does not change.
    pub fn fold_keyframe(&mut self) {
        self.world_to_key = concat(&self.world_to_key, &self.key_to_current);
        self.key_to_current = Iso3::identity();
    }

    /// Forget the current tracking: the current frame is back to the world origin.
    ///
    /// The world anchor is reset too, so that the next keyframe becomes the new origin
    /// and `world_to_current` stays the composition of the two other motions.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn world_to_key(&self) -> &Iso3 {
        &self.world_to_key
    }

    pub fn key_to_current(&self) -> &Iso3 {
        &self.key_to_current
    }

    pub fn world_to_current(&self) -> &Iso3 {
        &self.world_to_current
    }

    /// Pose of the current camera in the world, i.e. the inverse of `world_to_current`.
    pub fn current_to_world(&self) -> Iso3 {
        self.world_to_current.inverse()
    }
}

// TESTS #############################################################

#[cfg(test)]
mod tests {
    use super::*;
    use crate::misc::type_aliases::{Float, Point3, Vec3};
    use approx::assert_relative_eq;
    use nalgebra::{Translation3, UnitQuaternion};

    fn motion(t: (Float, Float, Float), angles: (Float, Float, Float)) -> Iso3 {
        Iso3::from_parts(
            Translation3::new(t.0, t.1, t.2),
            UnitQuaternion::from_euler_angles(angles.0, angles.1, angles.2),
        )
    }

    #[test]
    fn concat_applies_first_argument_first() {
        let a = Iso3::translation(1.0, 0.0, 0.0);
        let b = Iso3::rotation(Vec3::new(0.0, 0.0, std::f32::consts::FRAC_PI_2));
        let p = concat(&a, &b) * Point3::origin();
        // Translated to (1, 0, 0), then rotated to (0, 1, 0).
        assert_relative_eq!(Point3::new(0.0, 1.0, 0.0), p, epsilon = 1e-6);
    }

    #[test]
    fn commit_keeps_composition_invariant() {
        let mut poses = PoseComposer::new();
        poses.commit(motion((0.1, 0.0, 0.2), (0.0, 0.1, 0.0)));
        poses.fold_keyframe();
        let key_to_current = motion((-0.3, 0.2, 0.0), (0.05, 0.0, -0.2));
        poses.commit(key_to_current);
        assert_eq!(&key_to_current, poses.key_to_current());
        assert_relative_eq!(
            *poses.world_to_current(),
            concat(poses.world_to_key(), poses.key_to_current()),
            epsilon = 1e-6
        );
    }

    #[test]
    fn fold_keyframe_keeps_world_to_current() {
        let mut poses = PoseComposer::new();
        let first = motion((0.5, -0.1, 0.3), (0.2, -0.1, 0.3));
        poses.commit(first);
        let before = *poses.world_to_current();
        poses.fold_keyframe();
        assert_eq!(&Iso3::identity(), poses.key_to_current());
        assert_relative_eq!(first, *poses.world_to_key(), epsilon = 1e-6);
        assert_eq!(&before, poses.world_to_current());
        assert_relative_eq!(
            *poses.world_to_current(),
            concat(poses.world_to_key(), poses.key_to_current()),
            epsilon = 1e-6
        );
    }

    #[test]
    fn reset_goes_back_to_identity() {
        let mut poses = PoseComposer::new();
        poses.commit(motion((1.0, 2.0, 3.0), (0.0, 0.0, 0.1)));
        poses.fold_keyframe();
        poses.commit(motion((0.1, 0.0, 0.0), (0.0, 0.0, 0.0)));
        poses.reset();
        assert_eq!(&Iso3::identity(), poses.key_to_current());
        assert_eq!(&Iso3::identity(), poses.world_to_current());
        assert_eq!(&Iso3::identity(), poses.world_to_key());
    }

    #[test]
    fn current_to_world_is_inverse() {
        let mut poses = PoseComposer::new();
        poses.commit(motion((0.2, 0.4, -0.6), (0.3, 0.2, 0.1)));
        let round_trip = poses.current_to_world() * poses.world_to_current();
        assert_relative_eq!(Iso3::identity(), round_trip, epsilon = 1e-6);
    }

    // PROPERTY TESTS ################################################

    #[quickcheck_macros::quickcheck]
    fn chained_frames_keep_invariant(steps: Vec<(i8, i8, i8, i8, bool)>) -> bool {
        let mut poses = PoseComposer::new();
        let small = |x: i8| Float::from(x) * 1e-3;
        steps.iter().all(|&(tx, ty, a, b, rekey)| {
            let key_to_current = concat(
                poses.key_to_current(),
                &motion((small(tx), small(ty), 0.0), (small(a), small(b), 0.0)),
            );
            poses.commit(key_to_current);
            if rekey {
                poses.fold_keyframe();
            }
            approx::relative_eq!(
                *poses.world_to_current(),
                concat(poses.world_to_key(), poses.key_to_current()),
                epsilon = 1e-4
            )
        })
    }
}
