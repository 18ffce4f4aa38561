use nalgebra as na;

/// Number of distortion coefficients the projection math consumes:
/// k1 k2 p1 p2 k3 k4 k5 k6 in OpenCV order. Stored vectors may be shorter
/// (missing terms are zero) or longer (extra terms are carried but inert).
pub const MAX_ACTIVE_DIST: usize = 8;

fn coeff<T: na::RealField>(dist: &[T], idx: usize) -> T {
    dist.get(idx).cloned().unwrap_or_else(T::zero)
}

/// Apply radial + tangential distortion to normalized image coordinates.
pub fn distort_normalized<T: na::RealField>(x: T, y: T, dist: &[T]) -> (T, T) {
    let k1 = coeff(dist, 0);
    let k2 = coeff(dist, 1);
    let p1 = coeff(dist, 2);
    let p2 = coeff(dist, 3);
    let k3 = coeff(dist, 4);
    let k4 = coeff(dist, 5);
    let k5 = coeff(dist, 6);
    let k6 = coeff(dist, 7);

    let two = T::one() + T::one();
    let r2 = x.clone() * x.clone() + y.clone() * y.clone();
    let r4 = r2.clone() * r2.clone();
    let r6 = r4.clone() * r2.clone();

    let num = T::one() + k1 * r2.clone() + k2 * r4.clone() + k3 * r6.clone();
    let den = T::one() + k4 * r2.clone() + k5 * r4 + k6 * r6;
    let radial = num / den;

    let xy = x.clone() * y.clone();
    let x_tan = two.clone() * p1.clone() * xy.clone()
        + p2.clone() * (r2.clone() + two.clone() * x.clone() * x.clone());
    let y_tan = p1 * (r2 + two.clone() * y.clone() * y.clone()) + two * p2 * xy;

    (x.clone() * radial.clone() + x_tan, y * radial + y_tan)
}

/// Project a camera-frame point through distortion and the intrinsic
/// mapping. No visibility or depth filtering; callers that care check z.
pub fn project_point<T: na::RealField>(
    fx: &T,
    fy: &T,
    cx: &T,
    cy: &T,
    dist: &[T],
    p: &na::Vector3<T>,
) -> na::Vector2<T> {
    let x = p[0].clone() / p[2].clone();
    let y = p[1].clone() / p[2].clone();
    let (xd, yd) = distort_normalized(x, y, dist);
    na::Vector2::new(
        fx.clone() * xd + cx.clone(),
        fy.clone() * yd + cy.clone(),
    )
}

/// Brown-Conrady pinhole with parameter vector [fx, fy, cx, cy, dist...].
#[derive(Debug, Clone)]
pub struct BrownConradyPinhole<T: na::RealField> {
    pub params: na::DVector<T>,
    pub width: u32,
    pub height: u32,
}

impl<T: na::RealField> BrownConradyPinhole<T> {
    pub fn new(params: &na::DVector<T>, width: u32, height: u32) -> BrownConradyPinhole<T> {
        assert!(params.len() >= 4, "need at least fx, fy, cx, cy");
        BrownConradyPinhole {
            params: params.clone(),
            width,
            height,
        }
    }

    pub fn fx(&self) -> T {
        self.params[0].clone()
    }

    pub fn fy(&self) -> T {
        self.params[1].clone()
    }

    pub fn cx(&self) -> T {
        self.params[2].clone()
    }

    pub fn cy(&self) -> T {
        self.params[3].clone()
    }

    pub fn distortion(&self) -> Vec<T> {
        self.params.iter().skip(4).cloned().collect()
    }

    pub fn project_one(&self, p: &na::Vector3<T>) -> na::Vector2<T> {
        project_point(
            &self.fx(),
            &self.fy(),
            &self.cx(),
            &self.cy(),
            &self.distortion(),
            p,
        )
    }

    /// Undistorted normalized coordinates for a pixel, via fixed-point
    /// iteration on the distortion model (8 rounds, same scheme as the
    /// forward model's inverse everywhere in the pack).
    pub fn undistort_pixel(&self, p2d: &na::Vector2<T>) -> na::Vector2<T> {
        let dist = self.distortion();
        let xd = (p2d[0].clone() - self.cx()) / self.fx();
        let yd = (p2d[1].clone() - self.cy()) / self.fy();
        let mut x = xd.clone();
        let mut y = yd.clone();
        for _ in 0..8 {
            let (xp, yp) = distort_normalized(x.clone(), y.clone(), &dist);
            x = x - (xp - xd.clone());
            y = y - (yp - yd.clone());
        }
        na::Vector2::new(x, y)
    }
}
