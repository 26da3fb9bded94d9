// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Direct visual odometry for color + depth cameras.
//!
//! A frame is tracked against a keyframe by photometric alignment
//! on every layer of an image pyramid, from coarse to fine.
//! See [`core::track::pyramid_direct::PyramidDirect`].

pub mod core;
pub mod dataset;
pub mod math;
pub mod misc;
