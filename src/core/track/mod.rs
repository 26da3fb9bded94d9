// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Useful types and functions for tracking a camera.

pub mod direct_color_depth;
pub mod estimator;
pub mod keyframe;
pub mod lm_optimizer;
pub mod pose;
pub mod pyramid_direct;
