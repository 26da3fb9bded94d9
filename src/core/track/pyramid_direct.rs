// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Multi-resolution direct visual odometry.
//!
//! Each frame is tracked against a keyframe with one estimator per pyramid layer,
//! from the coarsest layer to the finest one.
//! The keyframe is replaced when too little of it is still visible.

use tracing::{debug, info, warn};

use crate::core::camera::CameraParameters;
use crate::core::image::{ImageType, Planar};
use crate::core::multires::{ImagePyramid, PyramidError};
use crate::core::pixel_to_3d::PixelTo3D;
use crate::core::track::estimator::LayerEstimator;
use crate::core::track::keyframe::{self, Visibility, DEFAULT_KEYFRAME_FRACTION};
use crate::core::track::pose::PoseComposer;
use crate::misc::type_aliases::{Iso3, Levels};

/// Configuration of the tracker.
#[derive(Clone, Debug)]
pub struct Config {
    /// Visibility ratio under which the keyframe is replaced.
    pub keyframe_fraction: f64,
    /// Number of consecutive failed frames after which the tracking is considered lost.
    /// `None` means never.
    pub max_consecutive_failures: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            keyframe_fraction: DEFAULT_KEYFRAME_FRACTION,
            max_consecutive_failures: None,
        }
    }
}

/// Coarse to fine tracker of a color + depth camera.
pub struct PyramidDirect<E, P> {
    config: Config,
    pyramid: P,
    estimators: Levels<E>,
    poses: PoseComposer,
    visibility: Visibility,
    consecutive_failures: usize,
}

impl<E: LayerEstimator, P: ImagePyramid> PyramidDirect<E, P> {
    /// Build the tracker, with one estimator per layer of `pyramid`.
    /// `make_estimator` receives the layer index, 0 being the finest layer.
    pub fn new<F>(pyramid: P, make_estimator: F, config: Config) -> Self
    where
        F: FnMut(usize) -> E,
    {
        let estimators = (0..pyramid.nb_layers()).map(make_estimator).collect();
        Self {
            config,
            pyramid,
            estimators,
            poses: PoseComposer::new(),
            visibility: Visibility::Uninitialized,
            consecutive_failures: 0,
        }
    }

    /// Set the full resolution camera.
    /// Must be called before the first frame, and again if the camera changes.
    pub fn set_camera_parameters(&mut self, camera: &CameraParameters) -> Result<(), PyramidError> {
        self.pyramid.initialize(camera.width, camera.height)?;
        for (lvl, estimator) in self.estimators.iter_mut().enumerate() {
            let intrinsics = camera.intrinsics.scaled(self.pyramid.scale(lvl));
            estimator.set_camera_parameters(
                &intrinsics,
                self.pyramid.width(lvl),
                self.pyramid.height(lvl),
            );
        }
        debug!(
            width = camera.width,
            height = camera.height,
            nb_layers = self.nb_layers(),
            "camera parameters set"
        );
        Ok(())
    }

    pub fn set_keyframe_fraction(&mut self, fraction: f64) {
        self.config.keyframe_fraction = fraction;
    }

    /// Track a new frame.
    ///
    /// The first frame after construction or `reset` becomes the keyframe.
    /// Returns `false` if the motion could not be estimated,
    /// in which case the poses and the visibility are left untouched.
    pub fn process(&mut self, frame: &Planar, depth: &mut dyn PixelTo3D) -> bool {
        if !self.visibility.is_initialized() {
            return self.bootstrap(frame, depth);
        }
        match self.estimate_motion(frame) {
            Some((key_to_current, visibility)) => {
                self.poses.commit(key_to_current);
                self.visibility = visibility;
                self.consecutive_failures = 0;
                if visibility.is_below(self.config.keyframe_fraction) {
                    info!(?visibility, "changing keyframe");
                    // The pyramid already holds the current frame.
                    keyframe::refresh_layers(&self.pyramid, &mut self.estimators, depth);
                    self.poses.fold_keyframe();
                }
                true
            }
            None => {
                self.consecutive_failures += 1;
                warn!(
                    consecutive_failures = self.consecutive_failures,
                    "motion estimation failed"
                );
                false
            }
        }
    }

    /// Make `frame` the new keyframe.
    ///
    /// The motion since the previous keyframe is folded into `world_to_key`,
    /// so `world_to_current` is unchanged.
    pub fn set_keyframe(
        &mut self,
        frame: &Planar,
        depth: &mut dyn PixelTo3D,
    ) -> Result<(), PyramidError> {
        keyframe::process_and_refresh(&mut self.pyramid, &mut self.estimators, frame, depth)?;
        self.poses.fold_keyframe();
        Ok(())
    }

    /// Restart the tracking from scratch at the next frame.
    pub fn reset(&mut self) {
        self.poses.reset();
        self.visibility = Visibility::Uninitialized;
        self.consecutive_failures = 0;
    }

    fn bootstrap(&mut self, frame: &Planar, depth: &mut dyn PixelTo3D) -> bool {
        match self.set_keyframe(frame, depth) {
            Ok(()) => {
                info!("first keyframe");
                self.visibility = Visibility::Measured(1.0);
                self.consecutive_failures = 0;
                true
            }
            Err(err) => {
                self.consecutive_failures += 1;
                warn!(
                    %err,
                    consecutive_failures = self.consecutive_failures,
                    "cannot use frame as keyframe"
                );
                false
            }
        }
    }

    /// Coarse to fine estimation of the keyframe to current frame motion,
    /// starting from the previous one.
    /// Stops at the first layer failing.
    /// Does not modify the poses.
    fn estimate_motion(&mut self, frame: &Planar) -> Option<(Iso3, Visibility)> {
        if let Err(err) = self.pyramid.process(frame) {
            warn!(%err, "cannot build the pyramid of the frame");
            return None;
        }
        let mut motion = *self.poses.key_to_current();
        let mut visibility = None;
        for lvl in (0..self.estimators.len()).rev() {
            let estimator = &mut self.estimators[lvl];
            if !estimator.estimate_motion(self.pyramid.layer(lvl), &motion) {
                debug!(layer = lvl, "layer failed, skipping finer layers");
                break;
            }
            motion = estimator.key_to_current();
            let ratio = Visibility::ratio(estimator.inbounds_pixels(), estimator.keyframe_pixels());
            debug!(layer = lvl, ?ratio, "layer tracked");
            visibility = Some(ratio);
        }
        visibility.map(|ratio| (motion, ratio))
    }

    /// Pose of the world origin in the current camera frame.
    pub fn world_to_current(&self) -> &Iso3 {
        self.poses.world_to_current()
    }

    /// Pose of the current camera in the world, as written in trajectory files.
    pub fn current_to_world(&self) -> Iso3 {
        self.poses.current_to_world()
    }

    pub fn world_to_key(&self) -> &Iso3 {
        self.poses.world_to_key()
    }

    pub fn key_to_current(&self) -> &Iso3 {
        self.poses.key_to_current()
    }

    /// Visibility of the keyframe measured at the last successful frame.
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Type of the frames expected by `process`.
    pub fn input_type(&self) -> ImageType {
        self.pyramid.image_type()
    }

    /// True when too many frames failed in a row, see `Config::max_consecutive_failures`.
    pub fn is_fatal_error(&self) -> bool {
        self.config
            .max_consecutive_failures
            .map_or(false, |max| self.consecutive_failures >= max.max(1))
    }

    pub fn nb_layers(&self) -> usize {
        self.estimators.len()
    }

    pub fn estimators(&self) -> &[E] {
        &self.estimators
    }

    pub fn estimators_mut(&mut self) -> &mut [E] {
        &mut self.estimators
    }
}

// TESTS #############################################################
