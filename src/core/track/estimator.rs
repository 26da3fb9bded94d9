// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Contract of the motion estimator running on a single pyramid layer.

use crate::core::camera::Intrinsics;
use crate::core::image::Planar;
use crate::core::pixel_to_3d::PixelTo3D;
use crate::misc::type_aliases::Iso3;

/// Direct motion estimator for one resolution layer.
///
/// One instance lives for each pyramid layer during the whole life
/// of the odometry. It owns its keyframe reference (appearance and geometry).
pub trait LayerEstimator {
    /// Intrinsics and size of the images of this layer.
    fn set_camera_parameters(&mut self, intrinsics: &Intrinsics, width: usize, height: usize);

    /// Replace the keyframe reference.
    /// `depth` is queried in the coordinates of this layer.
    fn set_keyframe(&mut self, image: &Planar, depth: &mut dyn PixelTo3D);

    /// Refine the keyframe to current frame motion, starting from `initial_guess`.
    ///
    /// Returns `false` if the estimate cannot be trusted.
    /// In that case, nothing observable through the getters has changed.
    fn estimate_motion(&mut self, image: &Planar, initial_guess: &Iso3) -> bool;

    /// Motion estimated by the last successful `estimate_motion`.
    fn key_to_current(&self) -> Iso3;

    /// Keyframe pixels still inside the current image after the last successful estimation.
    fn inbounds_pixels(&self) -> usize;

    /// Keyframe pixels usable for estimation.
    fn keyframe_pixels(&self) -> usize;
}
