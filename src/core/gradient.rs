// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Image gradients.

use nalgebra::DMatrix;

use crate::misc::type_aliases::Float;

/// Centered gradients `(gx, gy)` of an image.
///
/// `gx = (right - left) / 2` and `gy = (bottom - top) / 2`.
/// Border pixels, where the centered difference is undefined, get a 0 gradient.
pub fn centered(img: &DMatrix<u8>) -> (DMatrix<Float>, DMatrix<Float>) {
    let (nb_rows, nb_cols) = img.shape();
    let at = |i: usize, j: usize| Float::from(img[(i, j)]);
    let grad_x = DMatrix::from_fn(nb_rows, nb_cols, |i, j| {
        if j == 0 || j + 1 >= nb_cols {
            0.0
        } else {
            0.5 * (at(i, j + 1) - at(i, j - 1))
        }
    });
    let grad_y = DMatrix::from_fn(nb_rows, nb_cols, |i, j| {
        if i == 0 || i + 1 >= nb_rows {
            0.0
        } else {
            0.5 * (at(i + 1, j) - at(i - 1, j))
        }
    });
    (grad_x, grad_y)
}

// TESTS #############################################################

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizontal_ramp() {
        #[allow(clippy::cast_possible_truncation)]
        let img = DMatrix::from_fn(3, 4, |_, j| (10 * j) as u8);
        let (gx, gy) = centered(&img);
        assert_eq!(DMatrix::from_row_slice(3, 4, &[[0.0, 10.0, 10.0, 0.0]; 3].concat()), gx);
        assert_eq!(DMatrix::<Float>::zeros(3, 4), gy);
    }
}
