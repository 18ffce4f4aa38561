use log::debug;
use nalgebra as na;

/// Similarity transform that centers the points and scales their mean
/// distance from the origin to sqrt(2) (Hartley conditioning).
fn normalization_transform(points: &[glam::Vec2]) -> Option<na::Matrix3<f64>> {
    let n = points.len() as f64;
    let (mut mx, mut my) = (0.0, 0.0);
    for p in points {
        mx += p.x as f64;
        my += p.y as f64;
    }
    mx /= n;
    my /= n;

    let mut mean_dist = 0.0;
    for p in points {
        let dx = p.x as f64 - mx;
        let dy = p.y as f64 - my;
        mean_dist += (dx * dx + dy * dy).sqrt();
    }
    mean_dist /= n;
    if mean_dist < f64::EPSILON {
        return None;
    }
    let s = std::f64::consts::SQRT_2 / mean_dist;
    Some(na::Matrix3::new(
        s,
        0.0,
        -s * mx,
        0.0,
        s,
        -s * my,
        0.0,
        0.0,
        1.0,
    ))
}

/// Eigenvector of a symmetric matrix belonging to its smallest eigenvalue.
pub(crate) fn smallest_eigenvector(sym: &na::DMatrix<f64>) -> Option<na::DVector<f64>> {
    let eigen = sym.clone().symmetric_eigen();
    let mut min_idx = 0;
    for (i, v) in eigen.eigenvalues.iter().enumerate() {
        if !v.is_finite() {
            return None;
        }
        if *v < eigen.eigenvalues[min_idx] {
            min_idx = i;
        }
    }
    Some(eigen.eigenvectors.column(min_idx).into_owned())
}

/// Estimate the plane homography H with image ~ H * world using a
/// normalized DLT. Needs at least 4 correspondences; degenerate input
/// (coincident points, rank-deficient system) yields `None`.
pub fn dlt_homography(world: &[glam::Vec2], image: &[glam::Vec2]) -> Option<na::Matrix3<f64>> {
    let n = world.len();
    if n < 4 || image.len() != n {
        debug!("homography needs >= 4 matched points, got {}", n);
        return None;
    }

    let t_world = normalization_transform(world)?;
    let t_image = normalization_transform(image)?;

    let mut a = na::DMatrix::<f64>::zeros(2 * n, 9);
    for (i, (pw, pi)) in world.iter().zip(image.iter()).enumerate() {
        let w = t_world * na::Vector3::new(pw.x as f64, pw.y as f64, 1.0);
        let m = t_image * na::Vector3::new(pi.x as f64, pi.y as f64, 1.0);
        let (x, y) = (w.x, w.y);
        let (u, v) = (m.x, m.y);

        let r0 = 2 * i;
        let r1 = 2 * i + 1;

        a[(r0, 0)] = -x;
        a[(r0, 1)] = -y;
        a[(r0, 2)] = -1.0;
        a[(r0, 6)] = u * x;
        a[(r0, 7)] = u * y;
        a[(r0, 8)] = u;

        a[(r1, 3)] = -x;
        a[(r1, 4)] = -y;
        a[(r1, 5)] = -1.0;
        a[(r1, 6)] = v * x;
        a[(r1, 7)] = v * y;
        a[(r1, 8)] = v;
    }

    // Nullspace of A via the eigenvector of A^T A with the smallest
    // eigenvalue (robust for the minimal 4-point system, where a thin SVD
    // of the 8x9 matrix would not expose the nullspace at all).
    let h = smallest_eigenvector(&(a.transpose() * &a))?;

    let mut h_norm = na::Matrix3::zeros();
    for r in 0..3 {
        for c in 0..3 {
            h_norm[(r, c)] = h[3 * r + c];
        }
    }

    let t_image_inv = t_image.try_inverse()?;
    let mut h_mat = t_image_inv * h_norm * t_world;

    let scale = h_mat[(2, 2)];
    if scale.abs() < f64::EPSILON {
        debug!("homography scale entry is degenerate");
        return None;
    }
    h_mat /= scale;
    Some(h_mat)
}

/// Map a world-plane point through a homography.
pub fn apply_homography(h: &na::Matrix3<f64>, p: glam::Vec2) -> glam::Vec2 {
    let v = h * na::Vector3::new(p.x as f64, p.y as f64, 1.0);
    glam::Vec2::new((v.x / v.z) as f32, (v.y / v.z) as f32)
}
