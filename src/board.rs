use glam;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    pub rows: usize,
    pub cols: usize,
    pub square_size: f32,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            rows: 9,
            cols: 6,
            square_size: 1.0,
        }
    }
}

/// The planar calibration target: inner chessboard corners as 3D points.
///
/// Points live on the z = 0 plane in board coordinates, ordered row-major.
/// Row `r`, column `c` sits at `(c * s, -r * s, 0)`, so x grows to the
/// right along a row and y grows upward when rows are walked top to bottom.
pub struct Board {
    pub points: Vec<glam::Vec3>,
    pub rows: usize,
    pub cols: usize,
    pub square_size: f32,
}

impl Board {
    pub fn from_config(config: &BoardConfig) -> Board {
        Self::new(config.rows, config.cols, config.square_size)
    }

    pub fn new(rows: usize, cols: usize, square_size: f32) -> Board {
        Board {
            points: board_grid(rows, cols, square_size),
            rows,
            cols,
            square_size,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Deterministic row-major grid of `rows * cols` corner positions.
pub fn board_grid(rows: usize, cols: usize, square_size: f32) -> Vec<glam::Vec3> {
    let mut points = Vec::with_capacity(rows * cols);
    for r in 0..rows {
        for c in 0..cols {
            points.push(glam::Vec3 {
                x: c as f32 * square_size,
                y: -(r as f32) * square_size,
                z: 0.0,
            });
        }
    }
    points
}

pub fn create_default_9x6_board() -> Board {
    Board::new(9, 6, 1.0)
}
