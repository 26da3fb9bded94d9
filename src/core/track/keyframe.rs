// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Keyframe management: visibility measure and refresh of the layer estimators.

use crate::core::image::Planar;
use crate::core::multires::{ImagePyramid, PyramidError};
use crate::core::pixel_to_3d::{LayerTo3D, PixelTo3D};
use crate::core::track::estimator::LayerEstimator;

/// Default visibility ratio under which the keyframe is replaced.
pub const DEFAULT_KEYFRAME_FRACTION: f64 = 0.25;

/// How much of the keyframe is still seen by the current frame.
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Visibility {
    /// No keyframe yet.
    Uninitialized,
    /// Fraction of keyframe pixels inside the current frame, in `[0, 1]`.
    Measured(f64),
}

impl Visibility {
    /// Visibility ratio `inbounds / keyframe`.
    /// An empty keyframe is considered not visible at all.
    #[allow(clippy::cast_precision_loss)]
    pub fn ratio(inbounds_pixels: usize, keyframe_pixels: usize) -> Self {
        if keyframe_pixels == 0 {
            Visibility::Measured(0.0)
        } else {
            Visibility::Measured(inbounds_pixels as f64 / keyframe_pixels as f64)
        }
    }

    pub fn is_initialized(self) -> bool {
        self != Visibility::Uninitialized
    }

    /// True if a measured visibility is strictly below `fraction`.
    pub fn is_below(self, fraction: f64) -> bool {
        match self {
            Visibility::Uninitialized => false,
            Visibility::Measured(ratio) => ratio < fraction,
        }
    }
}

/// Hand every layer of an already processed pyramid to its estimator as new keyframe.
///
/// A single adapter wraps the full resolution oracle,
/// its scale is changed for each layer.
pub fn refresh_layers<E, P>(pyramid: &P, estimators: &mut [E], depth: &mut dyn PixelTo3D)
where
    E: LayerEstimator,
    P: ImagePyramid,
{
    let mut layer_to_3d = LayerTo3D::wrap(depth, 1.0);
    for (lvl, estimator) in estimators.iter_mut().enumerate() {
        layer_to_3d.set_scale(pyramid.scale(lvl));
        estimator.set_keyframe(pyramid.layer(lvl), &mut layer_to_3d);
    }
}

/// Shortcut used when the pyramid still has to be computed.
pub fn process_and_refresh<E, P>(
    pyramid: &mut P,
    estimators: &mut [E],
    frame: &Planar,
    depth: &mut dyn PixelTo3D,
) -> Result<(), PyramidError>
where
    E: LayerEstimator,
    P: ImagePyramid,
{
    pyramid.process(frame)?;
    refresh_layers(pyramid, estimators, depth);
    Ok(())
}

// TESTS #############################################################

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_of_empty_keyframe_is_zero() {
        assert_eq!(Visibility::Measured(0.0), Visibility::ratio(0, 0));
        assert_eq!(Visibility::Measured(0.5), Visibility::ratio(50, 100));
    }

    #[test]
    fn threshold_comparison() {
        assert!(Visibility::Measured(0.2).is_below(0.25));
        assert!(!Visibility::Measured(0.25).is_below(0.25));
        assert!(!Visibility::Uninitialized.is_below(0.25));
        // A measured zero is a real measure, not a missing keyframe.
        assert!(Visibility::Measured(0.0).is_initialized());
        assert!(!Visibility::Uninitialized.is_initialized());
    }
}
