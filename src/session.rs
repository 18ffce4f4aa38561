use std::path::PathBuf;

use image::DynamicImage;
use log::{debug, info};

use crate::board::Board;
use crate::camera_model::io::{load_camera_params, save_camera_params};
use crate::camera_model::CameraModel;
use crate::detected_points::FrameFeature;
use crate::detection::ChessboardDetector;
use crate::optimization::calibrate::{calibrate_camera, CalibrationOptions};
use crate::optimization::linear::solve_pnp;
use crate::types::RvecTvec;
use crate::visualization::{overlay_polylines, OverlayPolyline};

/// Views required before the first solve is attempted.
pub const MIN_CALIBRATION_VIEWS: usize = 5;

/// Semantic actions the pipeline reacts to, one per loop iteration at most.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Keep the current detection for calibration.
    AcceptDetection,
    /// Persist the current camera model.
    SaveParams,
    /// End the processing loop.
    Quit,
}

/// A timestamped frame from the acquisition collaborator.
pub struct Frame {
    pub time_ns: i64,
    pub image: DynamicImage,
}

/// Frame acquisition collaborator; `None` means end of stream and is
/// terminal for the loop.
pub trait FrameSource {
    fn next_frame(&mut self) -> Option<Frame>;
}

/// Input collaborator: the most recent action for this loop iteration.
pub trait InputSource {
    fn poll(&mut self) -> Option<KeyAction>;
}

/// Headless stand-in for the keyboard: accepts every Nth frame.
pub struct ScriptedInput {
    accept_every: usize,
    frame_idx: usize,
}

impl ScriptedInput {
    pub fn accept_every(n: usize) -> ScriptedInput {
        ScriptedInput {
            accept_every: n.max(1),
            frame_idx: 0,
        }
    }
}

impl InputSource for ScriptedInput {
    fn poll(&mut self) -> Option<KeyAction> {
        let idx = self.frame_idx;
        self.frame_idx += 1;
        if idx % self.accept_every == self.accept_every - 1 {
            Some(KeyAction::AcceptDetection)
        } else {
            None
        }
    }
}

/// Append-only collection of accepted correspondence sets, plus the
/// readiness policy for (re)calibration.
pub struct CalibrationDataset {
    views: Vec<FrameFeature>,
    min_views: usize,
}

impl Default for CalibrationDataset {
    fn default() -> Self {
        Self::new()
    }
}

impl CalibrationDataset {
    pub fn new() -> CalibrationDataset {
        CalibrationDataset {
            views: Vec::new(),
            min_views: MIN_CALIBRATION_VIEWS,
        }
    }

    pub fn with_min_views(min_views: usize) -> CalibrationDataset {
        CalibrationDataset {
            views: Vec::new(),
            min_views,
        }
    }

    pub fn accept(&mut self, view: FrameFeature) {
        self.views.push(view);
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn ready_to_calibrate(&self) -> bool {
        self.views.len() >= self.min_views
    }

    pub fn views(&self) -> &[FrameFeature] {
        &self.views
    }
}

/// What one pass through the pipeline produced, for display and logging.
#[derive(Debug, Default)]
pub struct FrameSummary {
    pub time_ns: i64,
    /// The frame's correspondence set when the target was found.
    pub detection: Option<FrameFeature>,
    pub accepted_views: usize,
    /// RMS of a solve that ran this frame, if one did.
    pub rms_error: Option<f64>,
    pub pose: Option<RvecTvec>,
    pub overlay: Vec<OverlayPolyline>,
    pub saved: bool,
}

impl FrameSummary {
    pub fn corner_count(&self) -> usize {
        self.detection.as_ref().map_or(0, |d| d.len())
    }

    pub fn first_corner(&self) -> Option<glam::Vec2> {
        self.detection
            .as_ref()
            .and_then(|d| d.features.first())
            .map(|f| f.p2d)
    }
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub calibration: CalibrationOptions,
    pub min_views: usize,
    pub params_path: PathBuf,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            calibration: CalibrationOptions::default(),
            min_views: MIN_CALIBRATION_VIEWS,
            params_path: PathBuf::from("iparams.csv"),
        }
    }
}

/// Top-level pipeline context: target model, detector, accumulated views,
/// and the camera model, driven one frame at a time by the outer loop.
/// Single execution context; the solver's update and the pose estimator's
/// reads are naturally serialized.
pub struct ArSession {
    board: Board,
    detector: ChessboardDetector,
    dataset: CalibrationDataset,
    camera: CameraModel,
    opts: SessionOptions,
    last_rms: Option<f64>,
}

impl ArSession {
    /// Build the session and try to reload persisted parameters; a missing
    /// or malformed store leaves the model uncalibrated (normal outcome).
    pub fn new(board: Board, frame_size: (u32, u32), opts: SessionOptions) -> std::io::Result<ArSession> {
        let detector = ChessboardDetector::new(board.rows, board.cols);
        let camera = match load_camera_params(&opts.params_path, frame_size)? {
            Some(camera) => camera,
            None => {
                info!("no stored parameters, starting uncalibrated");
                CameraModel::uncalibrated(frame_size.0, frame_size.1)
            }
        };
        Ok(ArSession {
            board,
            detector,
            dataset: CalibrationDataset::with_min_views(opts.min_views),
            camera,
            opts,
            last_rms: None,
        })
    }

    pub fn camera(&self) -> &CameraModel {
        &self.camera
    }

    pub fn dataset(&self) -> &CalibrationDataset {
        &self.dataset
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// RMS reprojection error of the most recent solve, if any ran.
    pub fn last_rms(&self) -> Option<f64> {
        self.last_rms
    }

    /// Persist the current model to the parameter store.
    pub fn save_params(&self) -> std::io::Result<()> {
        save_camera_params(&self.opts.params_path, &self.camera)
    }

    /// Run one frame through detect -> accumulate/solve -> pose -> overlay.
    ///
    /// A miss skips every downstream stage. An accepted detection is
    /// appended forever; once enough views are in, every further accept
    /// re-solves over the full dataset and overwrites the model.
    pub fn process_frame(
        &mut self,
        image: &DynamicImage,
        time_ns: i64,
        action: Option<KeyAction>,
    ) -> FrameSummary {
        let mut summary = FrameSummary {
            time_ns,
            accepted_views: self.dataset.len(),
            ..FrameSummary::default()
        };

        let detection = self.detector.detect(image, &self.board, time_ns);
        if detection.is_none() {
            debug!("no target in frame at {}", time_ns);
        }

        if action == Some(KeyAction::AcceptDetection) {
            if let Some(frame) = &detection {
                self.dataset.accept(frame.clone());
                summary.accepted_views = self.dataset.len();
                info!("accepted view {} for calibration", self.dataset.len());

                if self.dataset.ready_to_calibrate() {
                    if let Some(result) = calibrate_camera(
                        self.dataset.views(),
                        &self.camera,
                        &self.opts.calibration,
                    ) {
                        self.camera.update_from(&result);
                        self.last_rms = Some(result.rms_error);
                        summary.rms_error = Some(result.rms_error);
                    }
                }
            } else {
                debug!("accept requested but no detection this frame");
            }
        }

        if action == Some(KeyAction::SaveParams) {
            if let Err(e) = self.save_params() {
                log::warn!("failed to persist camera parameters: {}", e);
            } else {
                summary.saved = true;
            }
        }

        if self.camera.is_calibrated() {
            if let Some(frame) = &detection {
                if let Some(pose) = solve_pnp(frame, &self.camera) {
                    summary.overlay = overlay_polylines(&pose, &self.camera);
                    summary.pose = Some(pose);
                }
            }
        }

        summary.detection = detection;
        summary
    }
}
