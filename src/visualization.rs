use image::DynamicImage;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rerun::RecordingStream;
use std::io::Cursor;

use crate::camera_model::CameraModel;
use crate::detected_points::FrameFeature;
use crate::projection::project_points;
use crate::types::RvecTvec;

/// Length of the projected coordinate axes in board units.
pub const AXIS_LENGTH: f32 = 10.0;

/// Vertices of the overlay polyhedron (a triforce in the x = 0 plane).
pub const TRIFORCE_VERTICES: [glam::Vec3; 6] = [
    glam::Vec3::new(0.0, 1.0, 1.0),
    glam::Vec3::new(0.0, 2.0, 1.0),
    glam::Vec3::new(0.0, 3.0, 1.0),
    glam::Vec3::new(0.0, 1.5, 1.866025),
    glam::Vec3::new(0.0, 2.5, 1.866025),
    glam::Vec3::new(0.0, 2.0, 2.732051),
];

pub const TRIFORCE_EDGES: [(usize, usize); 9] = [
    (0, 1),
    (1, 2),
    (0, 3),
    (1, 3),
    (1, 4),
    (2, 4),
    (3, 4),
    (3, 5),
    (4, 5),
];

const AXIS_COLORS: [(u8, u8, u8, u8); 3] = [
    (0, 0, 255, 255),
    (0, 255, 0, 255),
    (255, 0, 0, 255),
];
const TRIFORCE_COLOR: (u8, u8, u8, u8) = (255, 234, 0, 255);

/// One projected overlay segment chain with its draw color.
#[derive(Debug, Clone)]
pub struct OverlayPolyline {
    pub points: Vec<glam::Vec2>,
    pub color: (u8, u8, u8, u8),
}

/// Project the axis triad through the camera for one pose: origin plus an
/// endpoint per axis, one polyline each.
pub fn axis_polylines(pose: &RvecTvec, camera: &CameraModel) -> Vec<OverlayPolyline> {
    let p3ds = [
        glam::Vec3::ZERO,
        glam::Vec3::new(AXIS_LENGTH, 0.0, 0.0),
        glam::Vec3::new(0.0, AXIS_LENGTH, 0.0),
        glam::Vec3::new(0.0, 0.0, AXIS_LENGTH),
    ];
    let p2ds = project_points(&p3ds, pose, camera);
    (0..3)
        .map(|axis| OverlayPolyline {
            points: vec![p2ds[0], p2ds[axis + 1]],
            color: AXIS_COLORS[axis],
        })
        .collect()
}

/// Project the triforce edges through the camera for one pose.
pub fn triforce_polylines(pose: &RvecTvec, camera: &CameraModel) -> Vec<OverlayPolyline> {
    let p2ds = project_points(&TRIFORCE_VERTICES, pose, camera);
    TRIFORCE_EDGES
        .iter()
        .map(|&(a, b)| OverlayPolyline {
            points: vec![p2ds[a], p2ds[b]],
            color: TRIFORCE_COLOR,
        })
        .collect()
}

/// The full overlay for one frame: axes plus the solid shape.
pub fn overlay_polylines(pose: &RvecTvec, camera: &CameraModel) -> Vec<OverlayPolyline> {
    let mut lines = axis_polylines(pose, camera);
    lines.extend(triforce_polylines(pose, camera));
    lines
}

pub fn log_image_as_compressed(
    recording: &RecordingStream,
    topic: &str,
    img: &DynamicImage,
    format: image::ImageFormat,
) {
    let mut bytes: Vec<u8> = Vec::new();
    if img
        .to_luma8()
        .write_to(&mut Cursor::new(&mut bytes), format)
        .is_err()
    {
        return;
    }
    let rr_img = rerun::Image::from_file_contents(bytes, None);
    let _ = recording.log(format!("{}/image", topic), &rr_img);
}

/// Stable pseudo-random color per corner id.
pub fn id_to_color(id: usize) -> (u8, u8, u8, u8) {
    let mut rng = ChaCha8Rng::seed_from_u64(id as u64);
    let color_num = rng.random_range(0..2u32.pow(24));
    (
        ((color_num >> 16) % 256) as u8,
        ((color_num >> 8) % 256) as u8,
        (color_num % 256) as u8,
        255,
    )
}

/// Smooth color ramp along the detected grid, first corner to last.
pub fn corner_color(idx: usize, total: usize) -> (u8, u8, u8, u8) {
    let t = if total <= 1 {
        0.0
    } else {
        idx as f64 / (total - 1) as f64
    };
    let c = colorous::TURBO.eval_continuous(t);
    (c.r, c.g, c.b, 255)
}

/// rerun uses the top left pixel corner as (0, 0).
pub fn rerun_shift(p2ds: &[(f32, f32)]) -> Vec<(f32, f32)> {
    p2ds.iter().map(|(x, y)| (*x + 0.5, *y + 0.5)).collect()
}

/// Log the detected grid as labeled colored points.
pub fn log_detection(recording: &RecordingStream, topic: &str, frame: &FrameFeature) {
    let total = frame.len();
    let (pts, colors): (Vec<_>, Vec<_>) = frame
        .features
        .iter()
        .enumerate()
        .map(|(i, p)| ((p.p2d.x, p.p2d.y), corner_color(i, total)))
        .unzip();
    let pts = rerun_shift(&pts);
    let _ = recording.log(
        format!("{}/corners", topic),
        &rerun::Points2D::new(pts)
            .with_colors(colors)
            .with_radii([rerun::Radius::new_ui_points(4.0)]),
    );
}

/// Log overlay polylines as 2D line strips.
pub fn log_overlay(recording: &RecordingStream, topic: &str, polylines: &[OverlayPolyline]) {
    let strips: Vec<Vec<(f32, f32)>> = polylines
        .iter()
        .map(|l| rerun_shift(&l.points.iter().map(|p| (p.x, p.y)).collect::<Vec<_>>()))
        .collect();
    let colors: Vec<(u8, u8, u8, u8)> = polylines.iter().map(|l| l.color).collect();
    let _ = recording.log(
        format!("{}/overlay", topic),
        &rerun::LineStrips2D::new(strips)
            .with_colors(colors)
            .with_radii([rerun::Radius::new_ui_points(2.0)]),
    );
}

/// Log one line of status text (corner counts, pose readouts).
pub fn log_status(recording: &RecordingStream, topic: &str, text: &str) {
    let _ = recording.log(format!("{}/status", topic), &rerun::TextLog::new(text));
}
