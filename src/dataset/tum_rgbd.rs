// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helper functions to handle datasets compatible with TUM RGB-D.

use nalgebra as na;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::core::camera::Intrinsics;
use crate::misc::type_aliases::{Float, Iso3};

/// U16 depth values are scaled for better precision.
/// So 5000 in the 16 bits gray png corresponds to 1 meter.
pub const DEPTH_SCALE: Float = 5000.0;

/// Intrinsics parameters of the ICL-NUIM dataset.
pub const INTRINSICS_ICL_NUIM: Intrinsics = Intrinsics {
    principal_point: (319.5, 239.5),
    focal: (481.20, -480.00),
    skew: 0.0,
};

/// Intrinsics parameters of freiburg 1 (fr1) scenes in the TUM RGB-D dataset.
#[allow(clippy::excessive_precision)]
pub const INTRINSICS_FR1: Intrinsics = Intrinsics {
    principal_point: (318.643_040, 255.313_989),
    focal: (517.306_408, 516.469_215),
    skew: 0.0,
};

/// Intrinsics parameters of freiburg 2 (fr2) scenes in the TUM RGB-D dataset.
#[allow(clippy::excessive_precision)]
pub const INTRINSICS_FR2: Intrinsics = Intrinsics {
    principal_point: (325.141_442, 249.701_764),
    focal: (520.908_620, 521.007_327),
    skew: 0.0,
};

/// Intrinsics parameters of freiburg 3 (fr3) scenes in the TUM RGB-D dataset.
#[allow(clippy::excessive_precision)]
pub const INTRINSICS_FR3: Intrinsics = Intrinsics {
    principal_point: (320.106_653, 247.632_132),
    focal: (535.433_105, 539.212_524),
    skew: 0.0,
};

/// Timestamp and 3D camera pose of a frame.
#[derive(Debug)]
pub struct Frame {
    /// Timestamp of the frame.
    pub timestamp: f64,
    /// Pose (rigid body motion / direct isometry) of the frame.
    pub pose: Iso3,
}

/// Association of two related depth and color timestamps and images file paths.
#[derive(Debug, PartialEq)]
pub struct Association {
    /// Timestamp of the depth image.
    pub depth_timestamp: f64,
    /// File path of the depth image.
    pub depth_file_path: PathBuf,
    /// Timestamp of the color image.
    pub color_timestamp: f64,
    /// File path of the color image.
    pub color_file_path: PathBuf,
}

/// Write Frame data in the TUM RGB-D format for trajectories:
/// `timestamp tx ty tz qx qy qz qw`.
impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let t = self.pose.translation.vector;
        let q = self.pose.rotation.into_inner().coords;
        write!(
            f,
            "{} {} {} {} {} {} {} {}",
            self.timestamp, t.x, t.y, t.z, q.x, q.y, q.z, q.w
        )
    }
}

/// Line of a dataset file that could not be parsed.
#[derive(Error, Debug, PartialEq)]
#[error("parsing error at line {line}: {content:?}")]
pub struct ParseError {
    /// Line number, starting at 1.
    pub line: usize,
    pub content: String,
}

/// Parse useful files (trajectories, associations, ...) in a dataset using the TUM RGB-D format.
pub mod parse {
    use super::*;
    use nom::{
        branch::alt,
        bytes::complete::{is_not, tag},
        character::complete::{space0, space1},
        combinator::{all_consuming, map, rest, value},
        number::complete::{double, float},
        sequence::{pair, terminated, tuple},
        IResult,
    };

    /// Parse an association file into a vector of `Association`.
    pub fn associations(file_content: &str) -> Result<Vec<Association>, ParseError> {
        multi_line(association_line, file_content)
    }

    /// Parse a trajectory file into a vector of `Frame`.
    pub fn trajectory(file_content: &str) -> Result<Vec<Frame>, ParseError> {
        multi_line(trajectory_line, file_content)
    }

    /// Blank lines are skipped.
    fn multi_line<F, T>(mut line_parser: F, file_content: &str) -> Result<Vec<T>, ParseError>
    where
        F: FnMut(&str) -> IResult<&str, Option<T>>,
    {
        let mut vec_data = Vec::new();
        for (idx, line) in file_content.lines().enumerate() {
            let line = line.trim_start();
            if line.is_empty() {
                continue;
            }
            match all_consuming(terminated(&mut line_parser, space0))(line) {
                Ok((_, Some(data))) => vec_data.push(data),
                Ok(_) => (),
                Err(_) => {
                    return Err(ParseError {
                        line: idx + 1,
                        content: line.to_string(),
                    })
                }
            }
        }
        Ok(vec_data)
    }

    // nom parsers #############################################################

    // Associations --------------------

    /// Association line is either a comment or two timestamps and file paths.
    fn association_line(input: &str) -> IResult<&str, Option<Association>> {
        alt((map(comment, |_| None), map(association, Some)))(input)
    }

    fn association(input: &str) -> IResult<&str, Association> {
        let fields = tuple((double, space1, path, space1, double, space1, path));
        map(fields, |(depth_timestamp, _, depth_file_path, _, color_timestamp, _, color_file_path)| {
            Association {
                depth_timestamp,
                depth_file_path,
                color_timestamp,
                color_file_path,
            }
        })(input)
    }

    fn path(input: &str) -> IResult<&str, PathBuf> {
        map(is_not(" \t\r\n"), PathBuf::from)(input)
    }

    // Trajectory ----------------------

    /// Trajectory line is either a comment or a frame timestamp and pose.
    fn trajectory_line(input: &str) -> IResult<&str, Option<Frame>> {
        alt((map(comment, |_| None), map(frame, Some)))(input)
    }

    fn comment(input: &str) -> IResult<&str, ()> {
        value((), pair(tag("#"), rest))(input)
    }

    fn frame(input: &str) -> IResult<&str, Frame> {
        map(tuple((double, space1, pose)), |(timestamp, _, pose)| Frame {
            timestamp,
            pose,
        })(input)
    }

    /// Extrinsics camera parameters, translation then rotation.
    fn pose(input: &str) -> IResult<&str, Iso3> {
        map(tuple((translation, space1, rotation)), |(t, _, r)| {
            Iso3::from_parts(t, r)
        })(input)
    }

    fn translation(input: &str) -> IResult<&str, na::Translation3<Float>> {
        map(
            tuple((float, space1, float, space1, float)),
            |(x, _, y, _, z)| na::Translation3::new(x, y, z),
        )(input)
    }

    /// Unit quaternion in the `qx qy qz qw` order.
    fn rotation(input: &str) -> IResult<&str, na::UnitQuaternion<Float>> {
        let components = tuple((float, space1, float, space1, float, space1, float));
        map(components, |(qx, _, qy, _, qz, _, qw)| {
            na::UnitQuaternion::from_quaternion(na::Quaternion::new(qw, qx, qy, qz))
        })(input)
    }
} // pub mod parse

// TESTS #############################################################

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn associations_skip_comments() {
        let content = "# depth rgb\n\
                       1305031102.160407 depth/1305031102.160407.png 1305031102.175304 rgb/1305031102.175304.png\n\
                       \n\
                       1305031102.194330 depth/1305031102.194330.png\t1305031102.211214 rgb/1305031102.211214.png \n";
        let assocs = parse::associations(content).unwrap();
        assert_eq!(2, assocs.len());
        assert_eq!(PathBuf::from("depth/1305031102.160407.png"), assocs[0].depth_file_path);
        assert_eq!(PathBuf::from("rgb/1305031102.211214.png"), assocs[1].color_file_path);
        assert_relative_eq!(1305031102.175304, assocs[0].color_timestamp);
    }

    #[test]
    fn bad_line_is_reported() {
        let content = "# comment\n1.0 depth/1.png 1.1\n";
        let err = parse::associations(content).unwrap_err();
        assert_eq!(2, err.line);
    }

    #[test]
    fn trajectory_line_is_parsed_and_written_back() {
        let content = "# timestamp tx ty tz qx qy qz qw\n1.5 0.1 -0.2 0.3 0 0 0.6 0.8\n";
        let frames = parse::trajectory(content).unwrap();
        assert_eq!(1, frames.len());
        let frame = &frames[0];
        assert_relative_eq!(1.5, frame.timestamp);
        assert_relative_eq!(-0.2, frame.pose.translation.vector.y);
        assert_relative_eq!(0.8, frame.pose.rotation.into_inner().coords.w, epsilon = 1e-6);

        let reparsed = parse::trajectory(&frame.to_string()).unwrap();
        assert_relative_eq!(frame.pose, reparsed[0].pose, epsilon = 1e-6);
    }
}
