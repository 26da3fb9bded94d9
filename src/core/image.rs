// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Multi-band images stored band by band ("planar" layout).
//!
//! Each band is a `DMatrix<u8>` where rows are image lines,
//! so pixel `(x, y)` of band `b` is `bands[b][(y, x)]`.

use image::RgbImage;
use nalgebra::DMatrix;
use thiserror::Error;

/// Errors raised when assembling a planar image.
#[derive(Error, Debug, PartialEq)]
pub enum ImageError {
    /// A planar image needs at least one band.
    #[error("a planar image needs at least one band")]
    NoBand,
    /// All bands must have the same number of rows and columns.
    #[error("band {band} has shape {found:?} but band 0 has shape {expected:?}")]
    ShapeMismatch {
        /// Index of the offending band.
        band: usize,
        /// Shape of band 0, `(rows, columns)`.
        expected: (usize, usize),
        /// Shape of the offending band.
        found: (usize, usize),
    },
}

/// Pixel format expected by a component: planar bands of `u8` values.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ImageType {
    /// Number of bands (3 for a color image).
    pub nb_bands: usize,
}

/// Multi-band image with the same shape in every band.
#[derive(Clone, PartialEq, Debug)]
pub struct Planar {
    bands: Vec<DMatrix<u8>>,
}

impl Planar {
    /// Assemble a planar image, checking that all bands have the same shape.
    pub fn new(bands: Vec<DMatrix<u8>>) -> Result<Self, ImageError> {
        let expected = bands.first().ok_or(ImageError::NoBand)?.shape();
        for (band, mat) in bands.iter().enumerate() {
            if mat.shape() != expected {
                return Err(ImageError::ShapeMismatch {
                    band,
                    expected,
                    found: mat.shape(),
                });
            }
        }
        Ok(Self { bands })
    }

    /// Single band image.
    pub fn from_gray(mat: DMatrix<u8>) -> Self {
        Self { bands: vec![mat] }
    }

    /// Split an RGB image into its three bands.
    pub fn from_rgb(img: &RgbImage) -> Self {
        let (width, height) = img.dimensions();
        let (nb_rows, nb_cols) = (height as usize, width as usize);
        let bands = (0..3)
            .map(|b| DMatrix::from_fn(nb_rows, nb_cols, |y, x| img.get_pixel(x as u32, y as u32)[b]))
            .collect();
        Self { bands }
    }

    /// Image with every pixel of every band set to `value`.
    pub fn repeat(nb_bands: usize, width: usize, height: usize, value: u8) -> Self {
        Self {
            bands: vec![DMatrix::repeat(height, width, value); nb_bands.max(1)],
        }
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.bands[0].ncols()
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.bands[0].nrows()
    }

    pub fn nb_bands(&self) -> usize {
        self.bands.len()
    }

    pub fn band(&self, b: usize) -> &DMatrix<u8> {
        &self.bands[b]
    }

    pub fn bands(&self) -> &[DMatrix<u8>] {
        &self.bands
    }

    /// Bands are mutable in place but cannot be resized from outside the crate.
    pub(crate) fn bands_mut(&mut self) -> &mut [DMatrix<u8>] {
        &mut self.bands
    }

    /// Pixel format of this image.
    pub fn image_type(&self) -> ImageType {
        ImageType {
            nb_bands: self.nb_bands(),
        }
    }
}

// TESTS #############################################################

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn empty_band_list_is_rejected() {
        assert_eq!(Err(ImageError::NoBand), Planar::new(Vec::new()));
    }

    #[test]
    fn bands_of_different_shapes_are_rejected() {
        let bands = vec![DMatrix::repeat(4, 6, 0), DMatrix::repeat(4, 5, 0)];
        assert_eq!(
            Err(ImageError::ShapeMismatch {
                band: 1,
                expected: (4, 6),
                found: (4, 5)
            }),
            Planar::new(bands)
        );
    }

    #[test]
    fn rgb_split_keeps_row_major_layout() {
        let mut img = RgbImage::new(3, 2);
        img.put_pixel(2, 1, Rgb([10, 20, 30]));
        let planar = Planar::from_rgb(&img);
        assert_eq!(3, planar.width());
        assert_eq!(2, planar.height());
        assert_eq!(ImageType { nb_bands: 3 }, planar.image_type());
        assert_eq!(10, planar.band(0)[(1, 2)]);
        assert_eq!(20, planar.band(1)[(1, 2)]);
        assert_eq!(30, planar.band(2)[(1, 2)]);
        assert_eq!(0, planar.band(0)[(0, 0)]);
    }
}
