// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use clap::{Parser, ValueEnum};
use std::{error::Error, fs, path::Path, path::PathBuf};
use tracing::{info, warn};

use direct_odometry_rs::core::camera::{CameraParameters, Intrinsics};
use direct_odometry_rs::core::image::Planar;
use direct_odometry_rs::core::multires::MeanPyramid;
use direct_odometry_rs::core::pixel_to_3d::DepthMapTo3D;
use direct_odometry_rs::core::track::direct_color_depth::DirectColorDepth;
use direct_odometry_rs::core::track::pyramid_direct::{Config, PyramidDirect};
use direct_odometry_rs::dataset::tum_rgbd;
use direct_odometry_rs::misc::helper;

/// Track a TUM RGB-D sequence and print the camera trajectory on stdout.
#[derive(Parser)]
#[command(name = "dors_track")]
#[command(version)]
struct Cli {
    /// Camera of the sequence.
    #[arg(value_enum)]
    camera: Camera,

    /// Association file of depth and color images.
    associations: PathBuf,

    /// Number of pyramid layers, with scales 1, 2, 4, ...
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u8).range(1..=16))]
    levels: u8,

    /// Visibility ratio under which the keyframe is replaced.
    #[arg(long, default_value_t = 0.25)]
    keyframe_fraction: f64,
}

#[derive(Copy, Clone, ValueEnum)]
enum Camera {
    Fr1,
    Fr2,
    Fr3,
    Icl,
}

impl Camera {
    fn intrinsics(self) -> Intrinsics {
        match self {
            Camera::Fr1 => tum_rgbd::INTRINSICS_FR1,
            Camera::Fr2 => tum_rgbd::INTRINSICS_FR2,
            Camera::Fr3 => tum_rgbd::INTRINSICS_FR3,
            Camera::Icl => tum_rgbd::INTRINSICS_ICL_NUIM,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    run(&cli)
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    // Build a vector containing timestamps and full paths of images.
    let associations = parse_associations(&cli.associations)?;
    let first = match associations.first() {
        Some(assoc) => assoc,
        None => return Err("The association file is empty".into()),
    };

    // Camera size is given by the first color image.
    let (first_depth, first_frame) = read_images(first)?;
    let intrinsics = cli.camera.intrinsics();
    let camera = CameraParameters {
        intrinsics: intrinsics.clone(),
        width: first_frame.width(),
        height: first_frame.height(),
    };

    let pyramid = MeanPyramid::halving(usize::from(cli.levels), first_frame.nb_bands())?;
    let config = Config {
        keyframe_fraction: cli.keyframe_fraction,
        ..Config::default()
    };
    let mut tracker = PyramidDirect::new(pyramid, |_| DirectColorDepth::default(), config);
    tracker.set_camera_parameters(&camera)?;
    info!(
        frames = associations.len(),
        levels = tracker.nb_layers(),
        "tracking sequence"
    );

    let mut depth = DepthMapTo3D::new(first_depth, tum_rgbd::DEPTH_SCALE, intrinsics);
    let mut frame = first_frame;
    for (idx, assoc) in associations.iter().enumerate() {
        if idx > 0 {
            let (depth_map, img) = read_images(assoc)?;
            depth.set_depth_map(depth_map);
            frame = img;
        }
        if !tracker.process(&frame, &mut depth) {
            warn!(timestamp = assoc.color_timestamp, "frame not tracked, keeping last pose");
        }

        // Print to stdout the frame pose.
        let pose = tracker.current_to_world();
        let timestamp = assoc.color_timestamp;
        println!("{}", tum_rgbd::Frame { timestamp, pose });
    }
    Ok(())
}

/// Open an association file and parse it into a vector of Association
/// with absolute images paths.
fn parse_associations(file_path: &Path) -> Result<Vec<tum_rgbd::Association>, Box<dyn Error>> {
    let content = fs::read_to_string(file_path)?;
    let parent = file_path.parent().unwrap_or_else(|| Path::new("."));
    let associations = tum_rgbd::parse::associations(&content)?;
    Ok(associations
        .into_iter()
        .map(|assoc| tum_rgbd::Association {
            depth_file_path: parent.join(&assoc.depth_file_path),
            color_file_path: parent.join(&assoc.color_file_path),
            ..assoc
        })
        .collect())
}

/// Read a depth and color image given by an association.
fn read_images(
    assoc: &tum_rgbd::Association,
) -> Result<(nalgebra::DMatrix<u16>, Planar), Box<dyn Error>> {
    let depth_map = helper::read_depth_map(&assoc.depth_file_path)?;
    let img = image::open(&assoc.color_file_path)?.to_rgb8();
    Ok((depth_map, Planar::from_rgb(&img)))
}
