// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Dense photometric motion estimation on a single layer.
//!
//! Implementation of "Lucas-kanade 20 years on: A unifying framework"
//! in the inverse compositional case, applied to every band of a color image
//! with the geometry of the keyframe given by a depth oracle.
//! The warping function is parameterized by the Lie Algebra of twists se(3).

use tracing::debug;

use crate::core::camera::Intrinsics;
use crate::core::gradient;
use crate::core::image::Planar;
use crate::core::pixel_to_3d::{self, PixelTo3D};
use crate::core::track::estimator::LayerEstimator;
use crate::core::track::lm_optimizer::{self, LMOptimizerState};
use crate::math::optimizer::OptimizerState as _;
use crate::misc::helper;
use crate::misc::type_aliases::{Float, Iso3, Point3, Vec6};

/// Configuration of the direct estimator.
#[derive(Clone, Debug)]
pub struct DirectConfig {
    /// Maximum number of Levenberg-Marquardt iterations.
    pub max_iterations: usize,
    /// Minimum number of keyframe points, and of points inside the current image,
    /// for an estimation to be trusted.
    pub min_points: usize,
    /// Iterations stop when the mean squared residual decreases by less than this.
    pub energy_tolerance: Float,
}

impl Default for DirectConfig {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            min_points: 20,
            energy_tolerance: 0.01,
        }
    }
}

/// Keyframe data precomputed once per keyframe.
#[derive(Default)]
struct Keyframe {
    nb_bands: usize,
    points: Vec<Point3>,
    templates: Vec<Float>,
    jacobians: Vec<Vec6>,
}

/// Direct estimator of the motion between a color + depth keyframe and a color frame.
pub struct DirectColorDepth {
    config: DirectConfig,
    intrinsics: Intrinsics,
    size: (usize, usize),
    keyframe: Keyframe,
    key_to_current: Iso3,
    inbounds_pixels: usize,
}

impl DirectColorDepth {
    pub fn new(config: DirectConfig) -> Self {
        Self {
            config,
            intrinsics: Intrinsics::new(1.0, 1.0, 0.0, 0.0),
            size: (0, 0),
            keyframe: Keyframe::default(),
            key_to_current: Iso3::identity(),
            inbounds_pixels: 0,
        }
    }

    /// Sample a keyframe point: reference intensity and jacobian of each band
    /// at the projection of the point. `None` if it projects outside the image.
    fn sample(
        &self,
        image: &Planar,
        gradients: &[(nalgebra::DMatrix<Float>, nalgebra::DMatrix<Float>)],
        point: &Point3,
    ) -> Option<(Vec<Float>, Vec<Vec6>)> {
        let (u, v) = lm_optimizer::warp(&Iso3::identity(), point, &self.intrinsics)?;
        let mut templates = Vec::with_capacity(image.nb_bands());
        let mut jacobians = Vec::with_capacity(image.nb_bands());
        for (band, (gx, gy)) in image.bands().iter().zip(gradients) {
            templates.push(helper::interpolate(u, v, band)?);
            let gu = helper::interpolate(u, v, gx)?;
            let gv = helper::interpolate(u, v, gy)?;
            jacobians.push(lm_optimizer::warp_jacobian(gu, gv, point, &self.intrinsics));
        }
        Some((templates, jacobians))
    }
}

impl Default for DirectColorDepth {
    fn default() -> Self {
        Self::new(DirectConfig::default())
    }
}

impl LayerEstimator for DirectColorDepth {
    fn set_camera_parameters(&mut self, intrinsics: &Intrinsics, width: usize, height: usize) {
        self.intrinsics = intrinsics.clone();
        self.size = (width, height);
    }

    #[allow(clippy::cast_precision_loss)]
    fn set_keyframe(&mut self, image: &Planar, depth: &mut dyn PixelTo3D) {
        let gradients: Vec<_> = image.bands().iter().map(gradient::centered).collect();
        let mut keyframe = Keyframe {
            nb_bands: image.nb_bands(),
            ..Keyframe::default()
        };
        for y in 0..image.height() {
            for x in 0..image.width() {
                if !depth.process(x as Float, y as Float) {
                    continue;
                }
                let point = match pixel_to_3d::homogeneous_point(&*depth) {
                    Some(p) => p,
                    None => continue,
                };
                if let Some((templates, jacobians)) = self.sample(image, &gradients, &point) {
                    keyframe.points.push(point);
                    keyframe.templates.extend(templates);
                    keyframe.jacobians.extend(jacobians);
                }
            }
        }
        debug!(
            nb_points = keyframe.points.len(),
            width = image.width(),
            height = image.height(),
            "new layer keyframe"
        );
        self.inbounds_pixels = keyframe.points.len();
        self.keyframe = keyframe;
        self.key_to_current = Iso3::identity();
    }

    fn estimate_motion(&mut self, image: &Planar, initial_guess: &Iso3) -> bool {
        let nb_points = self.keyframe.points.len();
        if nb_points < self.config.min_points.max(1) {
            debug!(nb_points, "not enough keyframe points");
            return false;
        }
        if image.nb_bands() != self.keyframe.nb_bands {
            debug!(
                expected = self.keyframe.nb_bands,
                found = image.nb_bands(),
                "band count differs from keyframe"
            );
            return false;
        }
        if (image.width(), image.height()) != self.size {
            debug!(size = ?self.size, "image size differs from camera parameters");
            return false;
        }
        let obs = lm_optimizer::Obs {
            intrinsics: &self.intrinsics,
            points: &self.keyframe.points,
            templates: &self.keyframe.templates,
            jacobians: &self.keyframe.jacobians,
            image,
            max_iterations: self.config.max_iterations,
            energy_tolerance: self.config.energy_tolerance,
        };
        match LMOptimizerState::iterative_solve(&obs, *initial_guess) {
            Ok((lm_state, nb_iter)) => {
                let eval_data = lm_state.eval_data;
                if eval_data.nb_inside < self.config.min_points || !eval_data.energy.is_finite() {
                    debug!(
                        nb_inside = eval_data.nb_inside,
                        energy = eval_data.energy,
                        "untrustworthy alignment"
                    );
                    return false;
                }
                debug!(nb_iter, energy = eval_data.energy, "alignment converged");
                self.key_to_current = eval_data.model;
                self.inbounds_pixels = eval_data.nb_inside;
                true
            }
            Err(err) => {
                debug!("alignment failed: {}", err);
                false
            }
        }
    }

    fn key_to_current(&self) -> Iso3 {
        self.key_to_current
    }

    fn inbounds_pixels(&self) -> usize {
        self.inbounds_pixels
    }

    fn keyframe_pixels(&self) -> usize {
        self.keyframe.points.len()
    }
}

// TESTS #############################################################
