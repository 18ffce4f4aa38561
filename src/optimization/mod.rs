pub mod calibrate;
pub mod factors;
pub mod homography;
pub mod linear;

pub use calibrate::*;
pub use homography::*;
pub use linear::*;
