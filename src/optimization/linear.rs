use log::debug;
use nalgebra as na;

use crate::camera_model::CameraModel;
use crate::detected_points::FrameFeature;
use crate::types::RvecTvec;

/// The 6-vector v_ij(H) from Zhang's closed-form intrinsics estimate.
fn v_ij(hmtx: &na::Matrix3<f64>, i: usize, j: usize) -> na::SVector<f64, 6> {
    let hi = hmtx.column(i);
    let hj = hmtx.column(j);
    na::SVector::<f64, 6>::from_row_slice(&[
        hi[0] * hj[0],
        hi[0] * hj[1] + hi[1] * hj[0],
        hi[1] * hj[1],
        hi[2] * hj[0] + hi[0] * hj[2],
        hi[2] * hj[1] + hi[1] * hj[2],
        hi[2] * hj[2],
    ])
}

/// Closed-form intrinsics from plane homographies (Zhang). Skew is forced
/// to zero after the solve since the camera model assumes none. Returns
/// `None` for degenerate view geometry (e.g. all views fronto-parallel).
pub fn estimate_intrinsics_from_homographies(
    hmtxs: &[na::Matrix3<f64>],
) -> Option<na::Matrix3<f64>> {
    if hmtxs.len() < 3 {
        debug!("need at least 3 homographies, got {}", hmtxs.len());
        return None;
    }

    let m = hmtxs.len();
    let mut vmtx = na::DMatrix::<f64>::zeros(2 * m, 6);
    for (k, hmtx) in hmtxs.iter().enumerate() {
        let v11 = v_ij(hmtx, 0, 0);
        let v22 = v_ij(hmtx, 1, 1);
        let v12 = v_ij(hmtx, 0, 1);
        vmtx.row_mut(2 * k).copy_from(&v12.transpose());
        vmtx.row_mut(2 * k + 1).copy_from(&(v11 - v22).transpose());
    }

    let b = crate::optimization::homography::smallest_eigenvector(
        &(vmtx.transpose() * &vmtx),
    )?;

    let (b11, b12, b22, b13, b23, b33) = (b[0], b[1], b[2], b[3], b[4], b[5]);

    let denom = b11 * b22 - b12 * b12;
    let denom_norm = b11 * b11 + b22 * b22;
    if denom_norm <= 0.0 || denom.abs() / denom_norm < 1e-9 {
        debug!("degenerate configuration in intrinsics estimation");
        return None;
    }

    let v0 = (b12 * b13 - b11 * b23) / denom;
    let lambda = b33 - (b13 * b13 + v0 * (b12 * b13 - b11 * b23)) / b11;
    if lambda.signum() != b11.signum() {
        debug!("invalid sign for lambda in intrinsics estimation");
        return None;
    }

    let alpha = (lambda / b11).sqrt();
    let beta = (lambda * b11 / denom).sqrt();
    let gamma = -b12 * alpha * alpha * beta / lambda;
    let u0 = gamma * v0 / beta - b13 * alpha * alpha / lambda;

    if !alpha.is_finite() || !beta.is_finite() || alpha <= 0.0 || beta <= 0.0 {
        return None;
    }

    Some(na::Matrix3::new(
        alpha, 0.0, u0, 0.0, beta, v0, 0.0, 0.0, 1.0,
    ))
}

/// Decompose a plane-induced homography into a board-to-camera pose given
/// intrinsics K, assuming the board lies on its own z = 0 plane. The
/// rotation is projected onto SO(3) and the sign is chosen so the board
/// sits in front of the camera.
pub fn pose_from_homography(kmtx: &na::Matrix3<f64>, hmtx: &na::Matrix3<f64>) -> Option<RvecTvec> {
    let k_inv = kmtx.try_inverse()?;

    let h1 = hmtx.column(0);
    let h2 = hmtx.column(1);
    let h3 = hmtx.column(2).into_owned();

    let k_inv_h1 = k_inv * h1;
    let k_inv_h2 = k_inv * h2;

    let norm1 = k_inv_h1.norm();
    let norm2 = k_inv_h2.norm();
    if norm1 < f64::EPSILON || norm2 < f64::EPSILON {
        return None;
    }
    let mut lambda = 1.0 / ((norm1 + norm2) * 0.5);

    // H and -H induce the same plane map; pick the sign that puts the
    // target in front of the camera.
    if (lambda * (k_inv * h3)).z < 0.0 {
        lambda = -lambda;
    }

    let r1 = (lambda * k_inv_h1).into_owned();
    let r2 = (lambda * k_inv_h2).into_owned();
    let r3 = r1.cross(&r2);

    let mut r_mat = na::Matrix3::<f64>::zeros();
    r_mat.set_column(0, &r1);
    r_mat.set_column(1, &r2);
    r_mat.set_column(2, &r3);

    // Project onto SO(3) via SVD.
    let svd = r_mat.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let mut r_orth = u * v_t;
    if r_orth.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        r_orth = u_flipped * v_t;
    }

    let tvec: na::Vector3<f64> = lambda * (k_inv * h3);
    let rotation =
        na::UnitQuaternion::from_rotation_matrix(&na::Rotation3::from_matrix_unchecked(r_orth));

    Some(RvecTvec::from_vec3(rotation.scaled_axis(), tvec))
}

/// Recover the single-view extrinsics of one correspondence set from a
/// calibrated model: undistort the observations to normalized coordinates,
/// then run SQPnP. Stateless; called once per frame.
///
/// Callers gate on `camera.is_calibrated()` and a full-grid detection; the
/// solve panics on a degenerate point set.
pub fn solve_pnp(frame: &FrameFeature, camera: &CameraModel) -> Option<RvecTvec> {
    if frame.len() < 4 {
        debug!("pnp needs at least 4 points, got {}", frame.len());
        return None;
    }
    let pinhole = camera.pinhole();
    let (p3ds, p2ds_z): (Vec<glam::Vec3>, Vec<glam::Vec2>) = frame
        .features
        .iter()
        .map(|f| {
            let n = pinhole.undistort_pixel(&na::Vector2::new(f.p2d.x as f64, f.p2d.y as f64));
            (f.p3d, glam::Vec2::new(n.x as f32, n.y as f32))
        })
        .unzip();

    let (r, t) = sqpnp_simple::sqpnp_solve_glam(&p3ds, &p2ds_z).unwrap();
    Some(RvecTvec::from_vec3(
        na::Vector3::new(r.0, r.1, r.2),
        na::Vector3::new(t.0, t.1, t.2),
    ))
}
