// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Camera intrinsic parameters, projection and back projection.

use crate::misc::type_aliases::{Float, Point2, Point3, Vec3};

/// Intrinsic parameters of a pinhole camera model.
#[derive(PartialEq, Debug, Clone)]
pub struct Intrinsics {
    /// Principal point `(cx, cy)` in pixels.
    pub principal_point: (Float, Float),
    /// Focal lengths `(fx, fy)` in pixels.
    pub focal: (Float, Float),
    /// Skew coefficient, usually 0.
    pub skew: Float,
}

/// Full resolution camera, as given to the odometry.
#[derive(PartialEq, Debug, Clone)]
pub struct CameraParameters {
    pub intrinsics: Intrinsics,
    pub width: usize,
    pub height: usize,
}

impl Intrinsics {
    /// Build intrinsics without skew.
    pub fn new(fx: Float, fy: Float, cx: Float, cy: Float) -> Self {
        Self {
            principal_point: (cx, cy),
            focal: (fx, fy),
            skew: 0.0,
        }
    }

    /// Intrinsics of an image downscaled by `scale`.
    ///
    /// All parameters are simply divided by the scale,
    /// so that projections are expressed in the downscaled pixel units.
    pub fn scaled(&self, scale: Float) -> Self {
        let (cx, cy) = self.principal_point;
        let (fx, fy) = self.focal;
        Self {
            principal_point: (cx / scale, cy / scale),
            focal: (fx / scale, fy / scale),
            skew: self.skew / scale,
        }
    }

    /// Project a 3D point into homogeneous pixel coordinates `(u*z, v*z, z)`.
    pub fn project(&self, point: Point3) -> Vec3 {
        Vec3::new(
            self.focal.0 * point[0] + self.skew * point[1] + self.principal_point.0 * point[2],
            self.focal.1 * point[1] + self.principal_point.1 * point[2],
            point[2],
        )
    }

    /// Back project a pixel at a given depth.
    pub fn back_project(&self, point: Point2, depth: Float) -> Point3 {
        let z = depth;
        let y = (point[1] - self.principal_point.1) * z / self.focal.1;
        let x = ((point[0] - self.principal_point.0) * z - self.skew * y) / self.focal.0;
        Point3::new(x, y, z)
    }
}

// TESTS #############################################################
