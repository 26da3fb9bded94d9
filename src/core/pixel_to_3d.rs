// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Conversion of image pixels into 3D points.
//!
//! A `PixelTo3D` is a stateful oracle: each successful call to `process`
//! computes one homogeneous 3D point, which is then read with the getters.
//! Getters always refer to the last `process` call only.

use nalgebra::DMatrix;

use crate::core::camera::Intrinsics;
use crate::misc::type_aliases::{Float, Point2, Point3};

/// Stateful pixel to 3D point oracle, queried in its own pixel coordinates.
pub trait PixelTo3D {
    /// Compute the 3D point seen at pixel `(x, y)`.
    /// Returns `false` if no point is known there.
    fn process(&mut self, x: Float, y: Float) -> bool;
    fn x(&self) -> Float;
    fn y(&self) -> Float;
    fn z(&self) -> Float;
    fn w(&self) -> Float;
}

/// Euclidean point of the last successful query of an oracle.
///
/// Returns `None` for points at infinity (`w == 0`) or behind the camera.
pub fn homogeneous_point(oracle: &dyn PixelTo3D) -> Option<Point3> {
    let w = oracle.w();
    if w == 0.0 {
        return None;
    }
    let point = Point3::new(oracle.x() / w, oracle.y() / w, oracle.z() / w);
    if point.z > 0.0 && point.coords.iter().all(|c| c.is_finite()) {
        Some(point)
    } else {
        None
    }
}

/// Adapter letting a pyramid layer query a full resolution oracle.
///
/// Queries are given in layer coordinates and mapped to full resolution
/// with a pixel center convention. Returned 3D points are not rescaled.
pub struct LayerTo3D<'a> {
    orig: &'a mut dyn PixelTo3D,
    scale: Float,
}

impl<'a> LayerTo3D<'a> {
    /// Wrap a full resolution oracle for a layer with the given downscale factor.
    pub fn wrap(orig: &'a mut dyn PixelTo3D, scale: Float) -> Self {
        Self { orig, scale }
    }

    pub fn set_scale(&mut self, scale: Float) {
        self.scale = scale;
    }

    /// Full resolution coordinates of a layer pixel.
    pub fn to_full_resolution(&self, x: Float, y: Float) -> (Float, Float) {
        ((x + 0.5) * self.scale, (y + 0.5) * self.scale)
    }
}

impl<'a> PixelTo3D for LayerTo3D<'a> {
    fn process(&mut self, x: Float, y: Float) -> bool {
        let (x_full, y_full) = self.to_full_resolution(x, y);
        self.orig.process(x_full, y_full)
    }
    fn x(&self) -> Float {
        self.orig.x()
    }
    fn y(&self) -> Float {
        self.orig.y()
    }
    fn z(&self) -> Float {
        self.orig.z()
    }
    fn w(&self) -> Float {
        self.orig.w()
    }
}

/// Oracle backed by a 16 bits depth map and the full resolution intrinsics.
///
/// A depth of 0 means unknown.
pub struct DepthMapTo3D {
    depth_map: DMatrix<u16>,
    depth_scale: Float,
    intrinsics: Intrinsics,
    point: Point3,
}

impl DepthMapTo3D {
    /// `depth_scale` is the depth value corresponding to 1 unit of distance
    /// (5000 for TUM RGB-D).
    pub fn new(depth_map: DMatrix<u16>, depth_scale: Float, intrinsics: Intrinsics) -> Self {
        Self {
            depth_map,
            depth_scale,
            intrinsics,
            point: Point3::origin(),
        }
    }

    /// Replace the depth map, for example with the one of a new frame.
    pub fn set_depth_map(&mut self, depth_map: DMatrix<u16>) {
        self.depth_map = depth_map;
    }
}

impl PixelTo3D for DepthMapTo3D {
    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_sign_loss)]
    #[allow(clippy::cast_precision_loss)]
    fn process(&mut self, x: Float, y: Float) -> bool {
        let (nb_rows, nb_cols) = self.depth_map.shape();
        let (u, v) = (x.floor(), y.floor());
        if !(u >= 0.0 && v >= 0.0 && u < nb_cols as Float && v < nb_rows as Float) {
            return false;
        }
        let depth = self.depth_map[(v as usize, u as usize)];
        if depth == 0 {
            return false;
        }
        let z = Float::from(depth) / self.depth_scale;
        self.point = self.intrinsics.back_project(Point2::new(u, v), z);
        true
    }
    fn x(&self) -> Float {
        self.point.x
    }
    fn y(&self) -> Float {
        self.point.y
    }
    fn z(&self) -> Float {
        self.point.z
    }
    fn w(&self) -> Float {
        1.0
    }
}

// TESTS #############################################################

#[cfg(test)]
mod tests {
    use super::*;

    /// Records queried coordinates and answers with a fixed point.
    struct Recorder {
        queries: Vec<(Float, Float)>,
        answer: bool,
    }

    impl PixelTo3D for Recorder {
        fn process(&mut self, x: Float, y: Float) -> bool {
            self.queries.push((x, y));
            self.answer
        }
        fn x(&self) -> Float {
            1.0
        }
        fn y(&self) -> Float {
            -2.0
        }
        fn z(&self) -> Float {
            3.0
        }
        fn w(&self) -> Float {
            0.5
        }
    }

    #[test]
    fn layer_query_uses_pixel_centers() {
        let mut recorder = Recorder {
            queries: Vec::new(),
            answer: true,
        };
        {
            let mut layer = LayerTo3D::wrap(&mut recorder, 4.0);
            assert!(layer.process(10.0, 20.0));
            // The 3D point is passed through without rescaling.
            assert_eq!((1.0, -2.0, 3.0, 0.5), (layer.x(), layer.y(), layer.z(), layer.w()));
            layer.set_scale(1.0);
            assert!(layer.process(0.0, 0.0));
        }
        assert_eq!(vec![(42.0, 82.0), (0.5, 0.5)], recorder.queries);
    }

    #[test]
    fn layer_forwards_failures() {
        let mut recorder = Recorder {
            queries: Vec::new(),
            answer: false,
        };
        let mut layer = LayerTo3D::wrap(&mut recorder, 2.0);
        assert!(!layer.process(3.0, 3.0));
    }

    #[quickcheck_macros::quickcheck]
    fn layer_scale_mapping(x: u16, y: u16, log_scale: u8) -> bool {
        let scale = Float::from(1_u16 << (log_scale % 4));
        let (x, y) = (Float::from(x % 1000), Float::from(y % 1000));
        let mut recorder = Recorder {
            queries: Vec::new(),
            answer: true,
        };
        LayerTo3D::wrap(&mut recorder, scale).process(x, y);
        recorder.queries == vec![((x + 0.5) * scale, (y + 0.5) * scale)]
    }

    #[test]
    fn homogeneous_point_divides_by_w() {
        let recorder = Recorder {
            queries: Vec::new(),
            answer: true,
        };
        assert_eq!(Some(Point3::new(2.0, -4.0, 6.0)), homogeneous_point(&recorder));
    }

    #[test]
    fn depth_map_back_projects_pixels() {
        let intrinsics = Intrinsics::new(500.0, 500.0, 2.0, 1.0);
        let mut depth_map = DMatrix::zeros(3, 5);
        depth_map[(1, 4)] = 10_000;
        let mut oracle = DepthMapTo3D::new(depth_map, 5000.0, intrinsics);
        // Unknown depth.
        assert!(!oracle.process(0.5, 0.5));
        // Outside of the image.
        assert!(!oracle.process(5.2, 1.0));
        assert!(!oracle.process(-0.1, 1.0));
        // (4.7, 1.2) falls in pixel (4, 1).
        assert!(oracle.process(4.7, 1.2));
        assert_eq!(Some(Point3::new(2.0 * 2.0 / 500.0, 0.0, 2.0)), homogeneous_point(&oracle));
    }
}
