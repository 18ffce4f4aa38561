use std::path::Path;

use camera_pose_ar::board::{Board, BoardConfig};
use camera_pose_ar::camera_model::CameraModel;
use camera_pose_ar::projection::project_points;
use camera_pose_ar::types::RvecTvec;
use clap::{Parser, Subcommand};
use nalgebra as na;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a synthetic calibration dataset from a known camera
    Generate {
        /// Output directory
        #[arg(short, long)]
        output: String,

        /// Board configuration JSON (rows, cols, square_size)
        #[arg(short, long)]
        board_config: Option<String>,

        /// Number of frames to generate
        #[arg(short, long, default_value = "20")]
        num_frames: usize,

        /// Image width
        #[arg(long, default_value = "640")]
        width: u32,

        /// Image height
        #[arg(long, default_value = "480")]
        height: u32,

        /// Ground-truth focal length in pixels
        #[arg(long, default_value = "500.0")]
        focal: f64,

        /// Gaussian pixel noise sigma
        #[arg(long, default_value = "0.0")]
        noise_sigma: f64,

        /// RNG seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

fn gaussian(rng: &mut impl Rng, sigma: f64) -> f64 {
    // Box-Muller transform.
    let u1: f64 = rng.random_range(1e-12..1.0);
    let u2: f64 = rng.random_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos() * sigma
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Commands::Generate {
            output,
            board_config,
            num_frames,
            width,
            height,
            focal,
            noise_sigma,
            seed,
        } => generate_dataset(
            &output,
            board_config.as_deref(),
            num_frames,
            width,
            height,
            focal,
            noise_sigma,
            seed,
        ),
    }
}

#[allow(clippy::too_many_arguments)]
fn generate_dataset(
    output_dir: &str,
    board_config_path: Option<&str>,
    num_frames: usize,
    width: u32,
    height: u32,
    focal: f64,
    noise_sigma: f64,
    seed: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    use std::fs;

    let board_config: BoardConfig = match board_config_path {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => BoardConfig::default(),
    };
    let board = Board::from_config(&board_config);

    let kmtx = na::Matrix3::new(
        focal,
        0.0,
        width as f64 / 2.0,
        0.0,
        focal,
        height as f64 / 2.0,
        0.0,
        0.0,
        1.0,
    );
    let camera = CameraModel::calibrated(kmtx, na::DVector::zeros(5), (width, height));

    fs::create_dir_all(output_dir)?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    for frame_idx in 0..num_frames {
        // Board roughly centered in view, varying distance and tilt.
        let distance = rng.random_range(15.0..30.0);
        let angle_x = rng.random_range(-0.3..0.3);
        let angle_y = rng.random_range(-0.3..0.3);
        let angle_z = rng.random_range(-0.3..0.3);
        let center_x = -(board.cols as f64 - 1.0) / 2.0 * board.square_size as f64;
        let center_y = (board.rows as f64 - 1.0) / 2.0 * board.square_size as f64;

        let pose = RvecTvec::from_vec3(
            na::Vector3::new(angle_x, angle_y, angle_z),
            na::Vector3::new(center_x, center_y, distance),
        );

        let mut projected = project_points(&board.points, &pose, &camera);
        if noise_sigma > 0.0 {
            for p in &mut projected {
                p.x += gaussian(&mut rng, noise_sigma) as f32;
                p.y += gaussian(&mut rng, noise_sigma) as f32;
            }
        }

        let in_frame = projected
            .iter()
            .all(|p| p.x >= 0.0 && p.x < width as f32 && p.y >= 0.0 && p.y < height as f32);

        let frame = serde_json::json!({
            "time_ns": frame_idx as i64 * 100_000_000,
            "width": width,
            "height": height,
            "fully_visible": in_frame,
            "rvec": [pose.rvec().x, pose.rvec().y, pose.rvec().z],
            "tvec": [pose.tvec().x, pose.tvec().y, pose.tvec().z],
            "points": projected
                .iter()
                .zip(board.points.iter())
                .map(|(p2, p3)| vec![
                    p2.x as f64, p2.y as f64,
                    p3.x as f64, p3.y as f64, p3.z as f64
                ])
                .collect::<Vec<_>>(),
        });

        let filename = format!("{:06}.json", frame_idx);
        fs::write(
            Path::new(output_dir).join(filename),
            serde_json::to_string_pretty(&frame)?,
        )?;
    }

    fs::write(
        Path::new(output_dir).join("board.json"),
        serde_json::to_string_pretty(&board_config)?,
    )?;
    fs::write(
        Path::new(output_dir).join("camera.json"),
        serde_json::to_string_pretty(&serde_json::json!({
            "intrinsics": [focal, 0.0, width as f64 / 2.0,
                           0.0, focal, height as f64 / 2.0,
                           0.0, 0.0, 1.0],
            "distortion": [0.0, 0.0, 0.0, 0.0, 0.0],
        }))?,
    )?;

    println!("Generated {} frames in {}", num_frames, output_dir);
    Ok(())
}
