use std::path::PathBuf;
use std::time::Instant;

use camera_pose_ar::board::Board;
use camera_pose_ar::data_loader::ImageFolderSource;
use camera_pose_ar::detection::harris_corners;
use camera_pose_ar::session::{
    ArSession, FrameSource, InputSource, KeyAction, ScriptedInput, SessionOptions,
    MIN_CALIBRATION_VIEWS,
};
use camera_pose_ar::visualization::{
    log_detection, log_image_as_compressed, log_overlay, log_status, rerun_shift,
};
use clap::Parser;
use indicatif::ProgressBar;
use log::info;

#[derive(Parser)]
#[command(version, about, author)]
struct ArCli {
    /// path to image folder
    path: String,

    /// inner corner rows of the chessboard target
    #[arg(long, default_value_t = 9)]
    rows: usize,

    /// inner corner columns of the chessboard target
    #[arg(long, default_value_t = 6)]
    cols: usize,

    /// physical square size (board units)
    #[arg(long, default_value_t = 1.0)]
    square_size: f32,

    /// labeled-row parameter store for intrinsics
    #[arg(long, default_value = "iparams.csv")]
    params_file: PathBuf,

    /// accept every Nth frame's detection for calibration
    #[arg(long, default_value_t = 4)]
    accept_every: usize,

    /// views required before the first solve
    #[arg(long, default_value_t = MIN_CALIBRATION_VIEWS)]
    min_views: usize,

    /// persist the camera model after the run
    #[arg(long)]
    save: bool,

    /// only detect and log strongest corners, no calibration pipeline
    #[arg(long)]
    corners_only: bool,

    /// rerun recording output path
    #[arg(long, default_value = "ar_overlay.rrd")]
    output: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = ArCli::parse();

    let recording = rerun::RecordingStreamBuilder::new("ar_overlay").save(&cli.output)?;
    let mut source = ImageFolderSource::new(&cli.path)?;
    let total_frames = source.len() as u64;
    let now = Instant::now();

    if cli.corners_only {
        let pb = ProgressBar::new(total_frames);
        while let Some(frame) = source.next_frame() {
            recording.set_time_nanos("stable", frame.time_ns);
            log_image_as_compressed(&recording, "/cam0", &frame.image, image::ImageFormat::Jpeg);
            let corners = harris_corners(&frame.image, 15);
            let pts: Vec<(f32, f32)> = corners.iter().map(|(p, _)| (p.x, p.y)).collect();
            recording.log(
                "/cam0/corners",
                &rerun::Points2D::new(rerun_shift(&pts))
                    .with_radii([rerun::Radius::new_ui_points(8.0)]),
            )?;
            pb.inc(1);
        }
        pb.finish();
        info!("corner preview took {:.3} sec", now.elapsed().as_secs_f64());
        return Ok(());
    }

    let board = Board::new(cli.rows, cli.cols, cli.square_size);
    // Peek the first frame for the frame size the default model needs.
    let Some(first) = source.next_frame() else {
        return Err("image folder is empty".into());
    };
    let frame_size = (first.image.width(), first.image.height());

    let opts = SessionOptions {
        min_views: cli.min_views,
        params_path: cli.params_file.clone(),
        ..SessionOptions::default()
    };
    let mut session = ArSession::new(board, frame_size, opts)?;
    let mut input = ScriptedInput::accept_every(cli.accept_every);
    let pb = ProgressBar::new(total_frames);

    let mut frame_opt = Some(first);
    while let Some(frame) = frame_opt {
        let action = input.poll();
        if action == Some(KeyAction::Quit) {
            break;
        }
        let summary = session.process_frame(&frame.image, frame.time_ns, action);

        recording.set_time_nanos("stable", frame.time_ns);
        log_image_as_compressed(&recording, "/cam0", &frame.image, image::ImageFormat::Jpeg);
        log_status(
            &recording,
            "/cam0",
            &format!("corners found: {}", summary.corner_count()),
        );
        if let Some(first_corner) = summary.first_corner() {
            log_status(
                &recording,
                "/cam0",
                &format!(
                    "first corner: ({:.2}, {:.2})",
                    first_corner.x, first_corner.y
                ),
            );
        }
        if let Some(rms) = summary.rms_error {
            log_status(
                &recording,
                "/cam0",
                &format!(
                    "recalibrated over {} views, rms {:.4} px",
                    summary.accepted_views, rms
                ),
            );
        }
        if let Some(pose) = &summary.pose {
            let r = pose.rvec();
            let t = pose.tvec();
            log_status(
                &recording,
                "/cam0",
                &format!(
                    "rotation: [{:.2}, {:.2}, {:.2}] translation: [{:.2}, {:.2}, {:.2}]",
                    r.x, r.y, r.z, t.x, t.y, t.z
                ),
            );
        }
        if let Some(detection) = &summary.detection {
            log_detection(&recording, "/cam0", detection);
        }
        if !summary.overlay.is_empty() {
            log_overlay(&recording, "/cam0", &summary.overlay);
        }

        pb.inc(1);
        frame_opt = source.next_frame();
    }
    pb.finish();

    let duration_sec = now.elapsed().as_secs_f64();
    info!("processed stream in {:.3} sec", duration_sec);
    println!(
        "views accepted: {}, calibrated: {}",
        session.dataset().len(),
        session.camera().is_calibrated()
    );

    if cli.save {
        session.save_params()?;
        println!("camera parameters written to {:?}", cli.params_file);

        if session.camera().is_calibrated() {
            let total_points: usize =
                session.dataset().views().iter().map(|v| v.len()).sum();
            camera_pose_ar::io::write_report(
                "calibration_report.json",
                session.camera(),
                session.dataset().len(),
                total_points,
                session.last_rms().unwrap_or(0.0),
            )?;
        }
    }
    Ok(())
}
