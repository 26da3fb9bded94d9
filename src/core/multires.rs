// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Multi-resolution image pyramids.
//!
//! Layer 0 is the full resolution image (scale 1).
//! Each following layer has a bigger scale factor, and so a lower resolution.

use std::convert::TryFrom;

use nalgebra::DMatrix;
use thiserror::Error;

use crate::core::image::{ImageType, Planar};
use crate::misc::type_aliases::{Float, Levels};

/// Errors related to the construction of a pyramid.
#[derive(Error, Debug, PartialEq)]
pub enum PyramidError {
    #[error("a pyramid needs at least one layer")]
    NoLayer,
    #[error("the finest layer must have scale 1, got {0}")]
    FirstScale(usize),
    #[error("scale {scale} of layer {layer} is not a multiple of the previous scale {previous}")]
    BadScale {
        layer: usize,
        scale: usize,
        previous: usize,
    },
    #[error("{0} halving layers overflow the scale factor")]
    TooManyLayers(usize),
    #[error("a pyramid needs at least one band")]
    NoBand,
    #[error("layer {layer} (scale {scale}) of a {width}x{height} image would be empty")]
    TooSmall {
        layer: usize,
        scale: usize,
        width: usize,
        height: usize,
    },
    /// Input shape given as `(width, height, bands)`.
    #[error("input image is {found:?} (width, height, bands) but the pyramid expects {expected:?}")]
    InputShape {
        expected: (usize, usize, usize),
        found: (usize, usize, usize),
    },
}

/// A multi-resolution representation of the current frame.
///
/// It is initialized once for a given resolution,
/// then refilled with every processed image.
pub trait ImagePyramid {
    /// Declare the full resolution of the images that will be processed.
    fn initialize(&mut self, width: usize, height: usize) -> Result<(), PyramidError>;

    /// Recompute all layers from a full resolution image.
    fn process(&mut self, image: &Planar) -> Result<(), PyramidError>;

    /// Number of layers, including the full resolution one.
    fn nb_layers(&self) -> usize;

    /// Image of a layer, as computed by the last call to `process`.
    fn layer(&self, lvl: usize) -> &Planar;

    /// Downscale factor of a layer relative to full resolution.
    fn scale(&self, lvl: usize) -> Float;

    fn width(&self, lvl: usize) -> usize;

    fn height(&self, lvl: usize) -> usize;

    /// Pixel format expected by `process`.
    fn image_type(&self) -> ImageType;
}

/// Pyramid where each layer is the block mean of the previous one.
///
/// Scales are integers, each one a multiple of the previous one.
/// If a size is not divisible by the scale ratio, the last lines/columns are dropped.
pub struct MeanPyramid {
    scales: Levels<usize>,
    nb_bands: usize,
    layers: Levels<Planar>,
}

impl MeanPyramid {
    /// Create a pyramid with the given scales, finest first.
    /// Layers are empty until `initialize` is called.
    pub fn new(scales: &[usize], nb_bands: usize) -> Result<Self, PyramidError> {
        check_scales(scales)?;
        if nb_bands == 0 {
            return Err(PyramidError::NoBand);
        }
        Ok(Self {
            scales: scales.to_vec(),
            nb_bands,
            layers: Vec::new(),
        })
    }

    /// Pyramid with scales `1, 2, 4, ...` and `nb_levels` layers.
    pub fn halving(nb_levels: usize, nb_bands: usize) -> Result<Self, PyramidError> {
        let scales: Option<Vec<usize>> = (0..nb_levels)
            .map(|lvl| u32::try_from(lvl).ok().and_then(|lvl| 1_usize.checked_shl(lvl)))
            .collect();
        let scales = scales.ok_or(PyramidError::TooManyLayers(nb_levels))?;
        Self::new(&scales, nb_bands)
    }

    pub fn scales(&self) -> &[usize] {
        &self.scales
    }

    fn expected_shape(&self) -> Option<(usize, usize, usize)> {
        self.layers
            .first()
            .map(|l| (l.width(), l.height(), l.nb_bands()))
    }
}

fn check_scales(scales: &[usize]) -> Result<(), PyramidError> {
    match scales.first() {
        None => return Err(PyramidError::NoLayer),
        Some(&s) if s != 1 => return Err(PyramidError::FirstScale(s)),
        _ => (),
    }
    for (layer, pair) in scales.windows(2).enumerate() {
        let (previous, scale) = (pair[0], pair[1]);
        if scale <= previous || scale % previous != 0 {
            return Err(PyramidError::BadScale {
                layer: layer + 1,
                scale,
                previous,
            });
        }
    }
    Ok(())
}

impl ImagePyramid for MeanPyramid {
    fn initialize(&mut self, width: usize, height: usize) -> Result<(), PyramidError> {
        let mut layers = Vec::with_capacity(self.scales.len());
        for (layer, &scale) in self.scales.iter().enumerate() {
            let (w, h) = (width / scale, height / scale);
            if w == 0 || h == 0 {
                return Err(PyramidError::TooSmall {
                    layer,
                    scale,
                    width,
                    height,
                });
            }
            layers.push(Planar::repeat(self.nb_bands, w, h, 0));
        }
        self.layers = layers;
        Ok(())
    }

    fn process(&mut self, image: &Planar) -> Result<(), PyramidError> {
        let found = (image.width(), image.height(), image.nb_bands());
        match self.expected_shape() {
            Some(expected) if expected == found => (),
            expected => {
                return Err(PyramidError::InputShape {
                    expected: expected.unwrap_or((0, 0, self.nb_bands)),
                    found,
                })
            }
        }
        for (dst, src) in self.layers[0].bands_mut().iter_mut().zip(image.bands()) {
            dst.copy_from(src);
        }
        for lvl in 1..self.layers.len() {
            let factor = self.scales[lvl] / self.scales[lvl - 1];
            let (finer, coarser) = self.layers.split_at_mut(lvl);
            let src = &finer[lvl - 1];
            for (b, dst) in coarser[0].bands_mut().iter_mut().enumerate() {
                downsample_mean_into(src.band(b), factor, dst);
            }
        }
        Ok(())
    }

    fn nb_layers(&self) -> usize {
        self.scales.len()
    }

    fn layer(&self, lvl: usize) -> &Planar {
        &self.layers[lvl]
    }

    #[allow(clippy::cast_precision_loss)]
    fn scale(&self, lvl: usize) -> Float {
        self.scales[lvl] as Float
    }

    fn width(&self, lvl: usize) -> usize {
        self.layers[lvl].width()
    }

    fn height(&self, lvl: usize) -> usize {
        self.layers[lvl].height()
    }

    fn image_type(&self) -> ImageType {
        ImageType {
            nb_bands: self.nb_bands,
        }
    }
}

// Downsampling ################################################################

/// Reduce the resolution of a matrix by `factor`, writing into `out`.
/// Each pixel of `out` is the (truncated) mean of a `factor x factor` block,
/// the shape of `out` decides which blocks are used.
pub fn downsample_mean_into(mat: &DMatrix<u8>, factor: usize, out: &mut DMatrix<u8>) {
    let factor = factor.max(1);
    let area = (factor * factor) as u32;
    let (out_r, out_c) = out.shape();
    debug_assert!(out_r * factor <= mat.nrows() && out_c * factor <= mat.ncols());
    for j in 0..out_c {
        for i in 0..out_r {
            let mut sum = 0_u32;
            for bj in 0..factor {
                for bi in 0..factor {
                    sum += u32::from(mat[(factor * i + bi, factor * j + bj)]);
                }
            }
            #[allow(clippy::cast_possible_truncation)]
            let mean = (sum / area) as u8;
            out[(i, j)] = mean;
        }
    }
}

// TESTS #############################################################

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_scales_are_rejected() {
        assert_eq!(Err(PyramidError::NoLayer), MeanPyramid::new(&[], 1).map(|_| ()));
        assert_eq!(
            Err(PyramidError::FirstScale(2)),
            MeanPyramid::new(&[2, 4], 1).map(|_| ())
        );
        assert_eq!(
            Err(PyramidError::BadScale {
                layer: 2,
                scale: 3,
                previous: 2
            }),
            MeanPyramid::new(&[1, 2, 3], 1).map(|_| ())
        );
        assert_eq!(Err(PyramidError::NoBand), MeanPyramid::new(&[1], 0).map(|_| ()));
    }

    #[test]
    fn layer_sizes_follow_scales() {
        let mut pyramid = MeanPyramid::new(&[1, 2, 4], 3).unwrap();
        pyramid.initialize(33, 18).unwrap();
        assert_eq!(3, pyramid.nb_layers());
        assert_eq!((33, 18), (pyramid.width(0), pyramid.height(0)));
        assert_eq!((16, 9), (pyramid.width(1), pyramid.height(1)));
        assert_eq!((8, 4), (pyramid.width(2), pyramid.height(2)));
        assert_eq!(4.0, pyramid.scale(2));
        assert_eq!(ImageType { nb_bands: 3 }, pyramid.image_type());
    }

    #[test]
    fn too_small_images_are_rejected() {
        let mut pyramid = MeanPyramid::halving(4, 1).unwrap();
        assert_eq!(
            Err(PyramidError::TooSmall {
                layer: 3,
                scale: 8,
                width: 20,
                height: 7
            }),
            pyramid.initialize(20, 7)
        );
    }

    #[test]
    fn process_computes_block_means() {
        let mut pyramid = MeanPyramid::new(&[1, 2, 4], 1).unwrap();
        pyramid.initialize(4, 4).unwrap();
        #[allow(clippy::cast_possible_truncation)]
        let img = DMatrix::from_fn(4, 4, |i, j| (4 * i + j) as u8);
        pyramid.process(&Planar::from_gray(img)).unwrap();
        // Block (0,0) holds 0, 1, 4, 5.
        assert_eq!(2, pyramid.layer(1).band(0)[(0, 0)]);
        // Block (1,1) holds 10, 11, 14, 15.
        assert_eq!(12, pyramid.layer(1).band(0)[(1, 1)]);
        // Mean of 0..16, truncated twice: (2 + 4 + 10 + 12) / 4.
        assert_eq!(7, pyramid.layer(2).band(0)[(0, 0)]);
    }

    #[test]
    fn process_rejects_unexpected_shapes() {
        let mut pyramid = MeanPyramid::new(&[1, 2], 3).unwrap();
        pyramid.initialize(8, 8).unwrap();
        let gray = Planar::from_gray(DMatrix::zeros(8, 8));
        assert_eq!(
            Err(PyramidError::InputShape {
                expected: (8, 8, 3),
                found: (8, 8, 1)
            }),
            pyramid.process(&gray)
        );
    }

    #[test]
    fn downsample_drops_incomplete_blocks() {
        let mat = DMatrix::from_fn(7, 10, |i, j| if i < 6 && j < 9 { 30 } else { 255 });
        let mut out = DMatrix::zeros(2, 3);
        downsample_mean_into(&mat, 3, &mut out);
        assert_eq!(DMatrix::repeat(2, 3, 30), out);
    }

    #[test]
    fn halving_rejects_too_many_levels() {
        assert_eq!(
            Err(PyramidError::TooManyLayers(65)),
            MeanPyramid::halving(65, 1).map(|_| ())
        );
        assert_eq!(Err(PyramidError::NoLayer), MeanPyramid::halving(0, 1).map(|_| ()));
        assert_eq!(&[1, 2, 4, 8], MeanPyramid::halving(4, 1).unwrap().scales());
    }
}
