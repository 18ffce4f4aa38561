use image::DynamicImage;
use log::debug;
use rayon::prelude::*;

use crate::board::Board;
use crate::detected_points::FrameFeature;
use crate::optimization::homography::{apply_homography, dlt_homography};

#[derive(Debug, Clone)]
pub struct DetectorParams {
    /// Harris corner response constant.
    pub harris_k: f32,
    /// Keep responses above this fraction of the strongest one.
    pub response_rel_threshold: f32,
    /// Non-maximum suppression radius in pixels.
    pub nms_radius: usize,
    /// Diagonal sampling radius for the saddle (x-corner) test.
    pub saddle_radius: usize,
    /// Keep saddle scores above this fraction of the strongest one.
    pub saddle_rel_threshold: f32,
    /// Snap radius for grid nodes, as a fraction of the local grid spacing.
    pub snap_tolerance: f32,
    /// Half size of the sub-pixel refinement window (5 -> 11x11).
    pub subpix_half_window: usize,
    pub subpix_max_iters: usize,
    /// Stop refining once the corner moves less than this many pixels.
    pub subpix_eps: f32,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            harris_k: 0.04,
            response_rel_threshold: 0.01,
            nms_radius: 4,
            saddle_radius: 3,
            saddle_rel_threshold: 0.6,
            snap_tolerance: 0.35,
            subpix_half_window: 5,
            subpix_max_iters: 30,
            subpix_eps: 0.1,
        }
    }
}

/// Grayscale f32 view with clamped and bilinear access.
struct GrayF32 {
    w: usize,
    h: usize,
    data: Vec<f32>,
}

impl GrayF32 {
    fn from_image(img: &DynamicImage) -> GrayF32 {
        let gray = img.to_luma32f();
        GrayF32 {
            w: gray.width() as usize,
            h: gray.height() as usize,
            data: gray.into_raw(),
        }
    }

    #[inline]
    fn at(&self, x: i64, y: i64) -> f32 {
        let x = x.clamp(0, self.w as i64 - 1) as usize;
        let y = y.clamp(0, self.h as i64 - 1) as usize;
        self.data[y * self.w + x]
    }

    fn bilinear(&self, x: f32, y: f32) -> f32 {
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);
        let v00 = self.at(x0, y0);
        let v10 = self.at(x0 + 1, y0);
        let v01 = self.at(x0, y0 + 1);
        let v11 = self.at(x0 + 1, y0 + 1);
        v00 * (1.0 - fx) * (1.0 - fy)
            + v10 * fx * (1.0 - fy)
            + v01 * (1.0 - fx) * fy
            + v11 * fx * fy
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    pos: glam::Vec2,
    response: f32,
}

fn box_blur(src: &[f32], w: usize, h: usize, radius: usize) -> Vec<f32> {
    let r = radius as i64;
    let norm = 1.0 / (2 * radius + 1) as f32;
    let mut tmp = vec![0.0f32; w * h];
    // horizontal pass
    tmp.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        for x in 0..w {
            let mut acc = 0.0;
            for dx in -r..=r {
                let xx = (x as i64 + dx).clamp(0, w as i64 - 1) as usize;
                acc += src[y * w + xx];
            }
            row[x] = acc * norm;
        }
    });
    // vertical pass
    let mut out = vec![0.0f32; w * h];
    out.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        for (x, v) in row.iter_mut().enumerate() {
            let mut acc = 0.0;
            for dy in -r..=r {
                let yy = (y as i64 + dy).clamp(0, h as i64 - 1) as usize;
                acc += tmp[yy * w + x];
            }
            *v = acc * norm;
        }
    });
    out
}

/// Harris response over the whole image (Sobel gradients, box-filtered
/// structure tensor).
fn harris_response(gray: &GrayF32, k: f32) -> Vec<f32> {
    let (w, h) = (gray.w, gray.h);
    let mut ixx = vec![0.0f32; w * h];
    let mut ixy = vec![0.0f32; w * h];
    let mut iyy = vec![0.0f32; w * h];

    for y in 0..h as i64 {
        for x in 0..w as i64 {
            let gx = (gray.at(x + 1, y - 1) + 2.0 * gray.at(x + 1, y) + gray.at(x + 1, y + 1))
                - (gray.at(x - 1, y - 1) + 2.0 * gray.at(x - 1, y) + gray.at(x - 1, y + 1));
            let gy = (gray.at(x - 1, y + 1) + 2.0 * gray.at(x, y + 1) + gray.at(x + 1, y + 1))
                - (gray.at(x - 1, y - 1) + 2.0 * gray.at(x, y - 1) + gray.at(x + 1, y - 1));
            let idx = y as usize * w + x as usize;
            ixx[idx] = gx * gx;
            ixy[idx] = gx * gy;
            iyy[idx] = gy * gy;
        }
    }

    let sxx = box_blur(&ixx, w, h, 2);
    let sxy = box_blur(&ixy, w, h, 2);
    let syy = box_blur(&iyy, w, h, 2);

    (0..w * h)
        .into_par_iter()
        .map(|i| {
            let det = sxx[i] * syy[i] - sxy[i] * sxy[i];
            let trace = sxx[i] + syy[i];
            det - k * trace * trace
        })
        .collect()
}

/// Non-maximum suppression over the response map; returns surviving pixels
/// sorted strongest first.
fn local_maxima(
    response: &[f32],
    w: usize,
    h: usize,
    radius: usize,
    rel_threshold: f32,
) -> Vec<Candidate> {
    let max_r = response.iter().cloned().fold(0.0f32, f32::max);
    if max_r <= 0.0 {
        return Vec::new();
    }
    let threshold = max_r * rel_threshold;
    let r = radius as i64;

    let mut candidates: Vec<Candidate> = (radius..h.saturating_sub(radius))
        .into_par_iter()
        .flat_map_iter(|y| {
            let mut row = Vec::new();
            for x in radius..w.saturating_sub(radius) {
                let v = response[y * w + x];
                if v < threshold {
                    continue;
                }
                let mut is_max = true;
                'outer: for dy in -r..=r {
                    for dx in -r..=r {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let nx = (x as i64 + dx) as usize;
                        let ny = (y as i64 + dy) as usize;
                        let nv = response[ny * w + nx];
                        // Ties break lexicographically so a flat peak yields
                        // exactly one candidate.
                        if nv > v || (nv == v && (ny, nx) < (y, x)) {
                            is_max = false;
                            break 'outer;
                        }
                    }
                }
                if is_max {
                    row.push(Candidate {
                        pos: glam::Vec2::new(x as f32, y as f32),
                        response: v,
                    });
                }
            }
            row
        })
        .collect();

    candidates.sort_by(|a, b| b.response.total_cmp(&a.response));
    candidates
}

/// X-corner evidence: at a chessboard corner the two diagonal sample pairs
/// disagree by the full black/white contrast, while edge and border
/// corners only reach half of it.
fn saddle_score(gray: &GrayF32, pos: glam::Vec2, radius: usize) -> f32 {
    let r = radius as i64;
    let (x, y) = (pos.x as i64, pos.y as i64);
    let d1 = gray.at(x - r, y - r) + gray.at(x + r, y + r);
    let d2 = gray.at(x + r, y - r) + gray.at(x - r, y + r);
    (d1 - d2).abs() * 0.5
}

/// Strongest Harris corners of an image, for the standalone corner preview.
pub fn harris_corners(img: &DynamicImage, max_corners: usize) -> Vec<(glam::Vec2, f32)> {
    let params = DetectorParams::default();
    let gray = GrayF32::from_image(img);
    if gray.w < 16 || gray.h < 16 {
        return Vec::new();
    }
    let response = harris_response(&gray, params.harris_k);
    local_maxima(
        &response,
        gray.w,
        gray.h,
        params.nms_radius,
        params.response_rel_threshold,
    )
    .into_iter()
    .take(max_corners)
    .map(|c| (c.pos, c.response))
    .collect()
}

/// Locates the full inner-corner grid of a chessboard target in one frame
/// and refines each corner to sub-pixel accuracy.
pub struct ChessboardDetector {
    pub rows: usize,
    pub cols: usize,
    pub params: DetectorParams,
}

impl ChessboardDetector {
    pub fn new(rows: usize, cols: usize) -> ChessboardDetector {
        ChessboardDetector {
            rows,
            cols,
            params: DetectorParams::default(),
        }
    }

    pub fn with_params(mut self, params: DetectorParams) -> ChessboardDetector {
        self.params = params;
        self
    }

    /// Detect the target. `None` is the normal miss outcome (target not
    /// visible, occluded, or the grid cannot be completed); the caller
    /// skips the frame. Pure function of the image.
    pub fn detect(
        &self,
        img: &DynamicImage,
        board: &Board,
        time_ns: i64,
    ) -> Option<FrameFeature> {
        assert_eq!(
            (board.rows, board.cols),
            (self.rows, self.cols),
            "detector and board grid dimensions must agree"
        );
        let gray = GrayF32::from_image(img);
        if gray.w < 32 || gray.h < 32 {
            return None;
        }
        let n = self.rows * self.cols;

        let response = harris_response(&gray, self.params.harris_k);
        let raw = local_maxima(
            &response,
            gray.w,
            gray.h,
            self.params.nms_radius,
            self.params.response_rel_threshold,
        );
        if raw.len() < n {
            debug!("only {} corner candidates for a {} node grid", raw.len(), n);
            return None;
        }

        // Keep x-corners, drop board-edge and background corners.
        let scored: Vec<(Candidate, f32)> = raw
            .into_iter()
            .take(6 * n)
            .map(|c| {
                let s = saddle_score(&gray, c.pos, self.params.saddle_radius)
                    + saddle_score(&gray, c.pos, 2 * self.params.saddle_radius);
                (c, s)
            })
            .collect();
        let max_saddle = scored.iter().map(|(_, s)| *s).fold(0.0f32, f32::max);
        if max_saddle <= 0.0 {
            return None;
        }
        let mut candidates: Vec<Candidate> = scored
            .into_iter()
            .filter(|(_, s)| *s >= self.params.saddle_rel_threshold * max_saddle)
            .map(|(c, _)| c)
            .collect();
        candidates.truncate(3 * n);
        if candidates.len() < n {
            debug!(
                "{} x-corner candidates left, need {}",
                candidates.len(),
                n
            );
            return None;
        }

        let coarse = self.recover_grid(&candidates)?;

        let refined: Vec<glam::Vec2> = coarse
            .iter()
            .map(|&p| self.refine_corner(&gray, p))
            .collect();

        Some(FrameFeature::from_detection(
            time_ns,
            (gray.w as u32, gray.h as u32),
            refined,
            board,
        ))
    }

    /// Order candidates into the full row-major grid by anchoring a
    /// homography on the four extreme corners and snapping every predicted
    /// node. All eight dihedral orientations of the grid are tried; the
    /// complete match with the lowest snap error wins.
    fn recover_grid(&self, candidates: &[Candidate]) -> Option<Vec<glam::Vec2>> {
        let (rows, cols) = (self.rows, self.cols);
        let positions: Vec<glam::Vec2> = candidates.iter().map(|c| c.pos).collect();

        let tl = *positions
            .iter()
            .min_by(|a, b| (a.x + a.y).total_cmp(&(b.x + b.y)))?;
        let br = *positions
            .iter()
            .max_by(|a, b| (a.x + a.y).total_cmp(&(b.x + b.y)))?;
        let tr = *positions
            .iter()
            .max_by(|a, b| (a.x - a.y).total_cmp(&(b.x - b.y)))?;
        let bl = *positions
            .iter()
            .min_by(|a, b| (a.x - a.y).total_cmp(&(b.x - b.y)))?;
        let quad = [tl, tr, br, bl];

        let grid_ring = [
            glam::Vec2::new(0.0, 0.0),
            glam::Vec2::new(cols as f32 - 1.0, 0.0),
            glam::Vec2::new(cols as f32 - 1.0, rows as f32 - 1.0),
            glam::Vec2::new(0.0, rows as f32 - 1.0),
        ];

        let mut best: Option<(f32, Vec<glam::Vec2>)> = None;
        for flip in [false, true] {
            for rot in 0..4 {
                let image_ring: Vec<glam::Vec2> = (0..4)
                    .map(|i| {
                        let idx = if flip { (4 + rot - i) % 4 } else { (rot + i) % 4 };
                        quad[idx]
                    })
                    .collect();
                let Some(h) = dlt_homography(&grid_ring, &image_ring) else {
                    continue;
                };
                if let Some((err, grid)) = self.snap_grid(&h, &positions) {
                    if best.as_ref().map_or(true, |(e, _)| err < *e) {
                        best = Some((err, grid));
                    }
                }
            }
        }

        if best.is_none() {
            debug!("no grid orientation produced a complete match");
        }
        best.map(|(_, grid)| grid)
    }

    /// Snap every predicted grid node to a distinct candidate within a
    /// spacing-relative radius. Fails unless the whole grid matches.
    fn snap_grid(
        &self,
        h: &nalgebra::Matrix3<f64>,
        positions: &[glam::Vec2],
    ) -> Option<(f32, Vec<glam::Vec2>)> {
        let (rows, cols) = (self.rows, self.cols);
        let mut used = vec![false; positions.len()];
        let mut grid = Vec::with_capacity(rows * cols);
        let mut total_err = 0.0f32;

        for r in 0..rows {
            for c in 0..cols {
                let node = glam::Vec2::new(c as f32, r as f32);
                let predicted = apply_homography(h, node);
                let neighbor = if c + 1 < cols {
                    glam::Vec2::new(c as f32 + 1.0, r as f32)
                } else {
                    glam::Vec2::new(c as f32 - 1.0, r as f32)
                };
                let spacing = (apply_homography(h, neighbor) - predicted).length();
                let tol = self.params.snap_tolerance * spacing;

                let mut best_idx = None;
                let mut best_dist = tol;
                for (i, p) in positions.iter().enumerate() {
                    if used[i] {
                        continue;
                    }
                    let d = (*p - predicted).length();
                    if d < best_dist {
                        best_dist = d;
                        best_idx = Some(i);
                    }
                }
                let idx = best_idx?;
                used[idx] = true;
                total_err += best_dist;
                grid.push(positions[idx]);
            }
        }
        Some((total_err, grid))
    }

    /// Iterative sub-pixel corner refinement: within the window every image
    /// gradient should be orthogonal to its offset from the true corner.
    /// Terminates after `subpix_max_iters` rounds or once the update falls
    /// below `subpix_eps` pixels.
    fn refine_corner(&self, gray: &GrayF32, start: glam::Vec2) -> glam::Vec2 {
        let half = self.params.subpix_half_window as i64;
        let sigma = self.params.subpix_half_window as f32 * 0.5;
        let mut cur = start;

        for _ in 0..self.params.subpix_max_iters {
            let mut sxx = 0.0f64;
            let mut sxy = 0.0f64;
            let mut syy = 0.0f64;
            let mut bx = 0.0f64;
            let mut by = 0.0f64;

            for wy in -half..=half {
                for wx in -half..=half {
                    let sx = cur.x + wx as f32;
                    let sy = cur.y + wy as f32;
                    let gx = (gray.bilinear(sx + 1.0, sy) - gray.bilinear(sx - 1.0, sy)) * 0.5;
                    let gy = (gray.bilinear(sx, sy + 1.0) - gray.bilinear(sx, sy - 1.0)) * 0.5;
                    let wgt = (-((wx * wx + wy * wy) as f32) / (2.0 * sigma * sigma)).exp();

                    let gxx = (wgt * gx * gx) as f64;
                    let gxy = (wgt * gx * gy) as f64;
                    let gyy = (wgt * gy * gy) as f64;
                    sxx += gxx;
                    sxy += gxy;
                    syy += gyy;
                    bx += gxx * sx as f64 + gxy * sy as f64;
                    by += gxy * sx as f64 + gyy * sy as f64;
                }
            }

            let det = sxx * syy - sxy * sxy;
            if det.abs() < 1e-12 {
                break;
            }
            let qx = ((syy * bx - sxy * by) / det) as f32;
            let qy = ((sxx * by - sxy * bx) / det) as f32;
            let next = glam::Vec2::new(qx, qy);
            let shift = (next - cur).length();
            cur = next;
            if shift < self.params.subpix_eps {
                break;
            }
        }
        cur
    }
}
