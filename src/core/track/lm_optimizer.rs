// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Levenberg-Marquardt implementation of the `optimizer::OptimizerState` trait
//! for the inverse compositional, multi-band photometric alignment.

use itertools::izip;
use nalgebra::UnitQuaternion;

use crate::core::camera::Intrinsics;
use crate::core::image::Planar;
use crate::math::optimizer::{Continue, OptimizerState};
use crate::math::se3;
use crate::misc::helper;
use crate::misc::type_aliases::{Float, Iso3, Mat6, Point3, Vec6};

/// State of the Levenberg-Marquardt optimizer.
pub struct LMOptimizerState {
    /// Levenberg-Marquardt hessian diagonal coefficient.
    pub lm_coef: Float,
    /// Data resulting of the last accepted model evaluation.
    pub eval_data: EvalData,
    max_iterations: usize,
    energy_tolerance: Float,
}

/// Either a successfully constructed `EvalData`
/// or the (higher) energy of a rejected model.
pub type EvalState = Result<EvalData, Float>;

/// Data resulting of a successful model evaluation.
pub struct EvalData {
    /// The hessian matrix of the system.
    pub hessian: Mat6,
    /// The gradient of the system.
    pub gradient: Vec6,
    /// Mean squared residual over the samples inside the image.
    pub energy: Float,
    /// Estimated motion at the current state of iterations.
    pub model: Iso3,
    /// Number of keyframe points warped inside the current image.
    pub nb_inside: usize,
}

/// Precomputed data available for the optimizer iterations.
///
/// Per band values of a keyframe point `i` are stored at `i * nb_bands + band`.
pub struct Obs<'a> {
    /// Intrinsic parameters of the layer.
    pub intrinsics: &'a Intrinsics,
    /// 3D points of the keyframe, in keyframe coordinates.
    pub points: &'a [Point3],
    /// Reference intensities of the keyframe.
    pub templates: &'a [Float],
    /// Jacobians of the intensities relative to a twist of the keyframe points.
    pub jacobians: &'a [Vec6],
    /// Current image to track.
    pub image: &'a Planar,
    pub max_iterations: usize,
    /// Iterations stop when the energy decreases by less than this.
    pub energy_tolerance: Float,
}

/// `(energy, inside_indices, residuals)`, residuals being indexed like `templates`.
type Precomputed = (Float, Vec<usize>, Vec<Float>);

impl LMOptimizerState {
    /// Precompute the energy of a model.
    /// Also return the residuals and the indices of the points warped inside the image.
    #[allow(clippy::cast_precision_loss)]
    fn eval_energy(obs: &Obs, model: &Iso3) -> Precomputed {
        let nb_bands = obs.image.nb_bands();
        let mut inside_indices = Vec::new();
        let mut residuals = Vec::new();
        let mut energy_sum = 0.0;
        'points: for (idx, point) in obs.points.iter().enumerate() {
            let (u, v) = match warp(model, point, obs.intrinsics) {
                Some(uv) => uv,
                None => continue,
            };
            let first = residuals.len();
            let templates = &obs.templates[idx * nb_bands..(idx + 1) * nb_bands];
            for (band, &tmp) in obs.image.bands().iter().zip(templates) {
                match helper::interpolate(u, v, band) {
                    Some(im) => residuals.push(im - tmp),
                    None => {
                        residuals.truncate(first);
                        continue 'points;
                    }
                }
            }
            energy_sum += residuals[first..].iter().map(|r| r * r).sum::<Float>();
            inside_indices.push(idx);
        }
        let energy = if residuals.is_empty() {
            Float::INFINITY
        } else {
            energy_sum / residuals.len() as Float
        };
        (energy, inside_indices, residuals)
    }

    /// Fully evaluate a model.
    fn compute_eval_data(obs: &Obs, model: Iso3, pre: Precomputed) -> EvalData {
        let nb_bands = obs.image.nb_bands();
        let (energy, inside_indices, residuals) = pre;
        let mut gradient = Vec6::zeros();
        let mut hessian = Mat6::zeros();
        for (i, idx) in inside_indices.iter().enumerate() {
            let jacobians = &obs.jacobians[idx * nb_bands..(idx + 1) * nb_bands];
            let point_residuals = &residuals[i * nb_bands..(i + 1) * nb_bands];
            for (jac, &r) in izip!(jacobians, point_residuals) {
                gradient += jac * r;
                hessian += jac * jac.transpose();
            }
        }
        EvalData {
            hessian,
            gradient,
            energy,
            model,
            nb_inside: inside_indices.len(),
        }
    }
}

impl<'a> OptimizerState<Obs<'a>> for LMOptimizerState {
    type Model = Iso3;
    type EvalState = EvalState;
    type Error = String;

    /// Initialize the optimizer state.
    /// Fails if no keyframe point is visible with the initial model.
    fn init(obs: &Obs, model: Iso3) -> Result<Self, String> {
        let pre = Self::eval_energy(obs, &model);
        if pre.1.is_empty() {
            return Err("No keyframe point is visible in the current image".to_string());
        }
        Ok(Self {
            lm_coef: 0.1,
            eval_data: Self::compute_eval_data(obs, model, pre),
            max_iterations: obs.max_iterations,
            energy_tolerance: obs.energy_tolerance,
        })
    }

    /// Compute the step using Levenberg-Marquardt.
    /// Apply the step in an inverse compositional approach to compute the next motion estimation.
    /// May return an error at the Cholesky decomposition of the hessian.
    fn step(&self) -> Result<Iso3, String> {
        let mut hessian = self.eval_data.hessian;
        for i in 0..6 {
            hessian[(i, i)] *= 1.0 + self.lm_coef;
        }
        let cholesky = hessian
            .cholesky()
            .ok_or("Error at Cholesky decomposition of hessian")?;
        let delta_warp = se3::exp(&cholesky.solve(&self.eval_data.gradient));
        Ok(renormalize(self.eval_data.model * delta_warp.inverse()))
    }

    /// Compute residuals and energy of the new model.
    /// Then, evaluate the new hessian and gradient if the energy has decreased.
    fn eval(&self, obs: &Obs, model: Iso3) -> EvalState {
        let pre = Self::eval_energy(obs, &model);
        let energy = pre.0;
        if energy.is_nan() || energy > self.eval_data.energy {
            Err(energy)
        } else {
            Ok(Self::compute_eval_data(obs, model, pre))
        }
    }

    /// Stop after too many iterations,
    /// or if the energy variation is too low.
    ///
    /// Also update the Levenberg-Marquardt coefficient
    /// depending on if the energy increased or decreased.
    fn stop_criterion(self, nb_iter: usize, eval_state: EvalState) -> (Self, Continue) {
        let too_many_iterations = nb_iter >= self.max_iterations;
        match (eval_state, too_many_iterations) {
            (Err(_), true) => (self, Continue::Stop),
            (Ok(eval_data), true) => (Self { eval_data, ..self }, Continue::Stop),
            (Err(_energy), false) => {
                let lm_coef = 10.0 * self.lm_coef;
                (Self { lm_coef, ..self }, Continue::Forward)
            }
            (Ok(eval_data), false) => {
                let d_energy = self.eval_data.energy - eval_data.energy;
                let continuation = if d_energy > self.energy_tolerance {
                    Continue::Forward
                } else {
                    Continue::Stop
                };
                let lm_coef = 0.1 * self.lm_coef;
                (
                    Self {
                        lm_coef,
                        eval_data,
                        ..self
                    },
                    continuation,
                )
            }
        }
    }
}

// Helper ######################################################################

/// First order Taylor approximation for renormalization of rotation part of motion.
fn renormalize(motion: Iso3) -> Iso3 {
    let mut motion = motion;
    let q = motion.rotation.into_inner();
    let sq_norm = q.norm_squared();
    motion.rotation = UnitQuaternion::new_unchecked(0.5 * (3.0 - sq_norm) * q);
    motion
}

/// Pixel coordinates of a keyframe point moved by `model`.
/// `None` if the point ends up behind the camera.
pub fn warp(model: &Iso3, point: &Point3, intrinsics: &Intrinsics) -> Option<(Float, Float)> {
    let moved = model * point;
    if moved.z <= 0.0 {
        return None;
    }
    let uvz = intrinsics.project(moved);
    Some((uvz.x / uvz.z, uvz.y / uvz.z))
}

/// Jacobian of the pixel position of a projected point
/// relative to a twist applied to that point, premultiplied by the image gradient.
#[allow(clippy::many_single_char_names)]
#[allow(clippy::similar_names)]
pub fn warp_jacobian(gu: Float, gv: Float, point: &Point3, intrinsics: &Intrinsics) -> Vec6 {
    let (fu, fv) = intrinsics.focal;
    let (x, y) = (point.x, point.y);
    let _z = 1.0 / point.z;
    let (xz, yz) = (x * _z, y * _z);

    // du/dxi and dv/dxi, without skew.
    let du = [
        fu * _z,
        0.0,
        -fu * xz * _z,
        -fu * xz * yz,
        fu * (1.0 + xz * xz),
        -fu * yz,
    ];
    let dv = [
        0.0,
        fv * _z,
        -fv * yz * _z,
        -fv * (1.0 + yz * yz),
        fv * xz * yz,
        fv * xz,
    ];
    Vec6::from_fn(|i, _| gu * du[i] + gv * dv[i])
}

// TESTS #############################################################
