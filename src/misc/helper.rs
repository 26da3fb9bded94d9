// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Miscellaneous helper functions that didn't fit elsewhere.

use byteorder::{BigEndian, ReadBytesExt};
use nalgebra::{DMatrix, Scalar};
use std::{fs::File, io, io::Cursor, path::Path};
use thiserror::Error;

use crate::misc::type_aliases::Float;

/// Errors when reading a 16 bits depth image.
#[derive(Error, Debug)]
pub enum DepthImageError {
    #[error("cannot read depth image: {0}")]
    Io(#[from] io::Error),
    #[error("cannot decode depth png: {0}")]
    Png(#[from] png::DecodingError),
    #[error("depth png must be 16 bits grayscale, got {color:?} with {depth:?}")]
    NotGray16 {
        color: png::ColorType,
        depth: png::BitDepth,
    },
}

/// Read a 16 bit gray png image from a file.
/// Returns `(width, height, row_major_buffer)`.
pub fn read_png_16bits<P: AsRef<Path>>(
    file_path: P,
) -> Result<(usize, usize, Vec<u16>), DepthImageError> {
    let mut decoder = png::Decoder::new(File::open(file_path)?);
    // The default transformations would strip the png to 8 bits.
    decoder.set_transformations(png::Transformations::IDENTITY);
    let mut reader = decoder.read_info()?;
    let mut buffer = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buffer)?;
    if info.color_type != png::ColorType::Grayscale || info.bit_depth != png::BitDepth::Sixteen {
        return Err(DepthImageError::NotGray16 {
            color: info.color_type,
            depth: info.bit_depth,
        });
    }

    // Png data is big endian.
    let (width, height) = (info.width as usize, info.height as usize);
    let mut buffer_u16 = vec![0; width * height];
    Cursor::new(buffer).read_u16_into::<BigEndian>(&mut buffer_u16)?;
    Ok((width, height, buffer_u16))
}

/// Read a 16 bits depth png into a matrix (rows are image lines).
pub fn read_depth_map<P: AsRef<Path>>(file_path: P) -> Result<DMatrix<u16>, DepthImageError> {
    let (w, h, buffer) = read_png_16bits(file_path)?;
    Ok(DMatrix::from_row_slice(h, w, &buffer))
}

/// Bilinear interpolation of a pixel with floating point coordinates.
/// Return `None` if the 2x2 neighborhood is not entirely inside the image.
#[allow(clippy::many_single_char_names)]
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_precision_loss)]
pub fn interpolate<T>(x: Float, y: Float, image: &DMatrix<T>) -> Option<Float>
where
    T: Scalar + Copy + Into<Float>,
{
    let (height, width) = image.shape();
    let u = x.floor();
    let v = y.floor();
    if u >= 0.0 && v >= 0.0 && u + 1.0 < width as Float && v + 1.0 < height as Float {
        let (u_0, v_0) = (u as usize, v as usize);
        let vu_00: Float = image[(v_0, u_0)].into();
        let vu_10: Float = image[(v_0 + 1, u_0)].into();
        let vu_01: Float = image[(v_0, u_0 + 1)].into();
        let vu_11: Float = image[(v_0 + 1, u_0 + 1)].into();
        let a = x - u;
        let b = y - v;
        Some(
            (1.0 - b) * (1.0 - a) * vu_00
                + b * (1.0 - a) * vu_10
                + (1.0 - b) * a * vu_01
                + b * a * vu_11,
        )
    } else {
        None
    }
}

// TESTS #############################################################

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolate_at_pixel_and_between() {
        let img = DMatrix::from_row_slice(2, 3, &[0_u8, 10, 20, 100, 110, 120]);
        assert_eq!(Some(10.0), interpolate(1.0, 0.0, &img));
        assert_eq!(Some(60.0), interpolate(1.0, 0.5, &img));
        assert_eq!(Some(65.0), interpolate(1.5, 0.5, &img));
    }

    #[test]
    fn interpolate_outside_is_none() {
        let img: DMatrix<Float> = DMatrix::repeat(4, 4, 1.0);
        assert_eq!(None, interpolate(-0.1, 1.0, &img));
        assert_eq!(None, interpolate(3.0, 1.0, &img));
        assert_eq!(None, interpolate(1.0, 3.2, &img));
        let inside = interpolate(2.9, 2.9, &img).unwrap();
        approx::assert_relative_eq!(1.0, inside, epsilon = 1e-6);
    }

    #[test]
    fn missing_depth_file_is_an_io_error() {
        match read_png_16bits("this/file/does/not/exist.png") {
            Err(DepthImageError::Io(_)) => (),
            other => panic!("unexpected result: {:?}", other.map(|(w, h, _)| (w, h))),
        }
    }
}
