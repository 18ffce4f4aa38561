use camera_pose_ar::board::{board_grid, create_default_9x6_board, Board, BoardConfig};

#[test]
fn test_board_grid_shape_and_order() {
    let rows = 9;
    let cols = 6;
    let grid = board_grid(rows, cols, 1.0);
    assert_eq!(grid.len(), rows * cols);

    // Row-major: row r, column c at (c, -r, 0).
    for r in 0..rows {
        for c in 0..cols {
            let p = grid[r * cols + c];
            assert!((p.x - c as f32).abs() < 1e-6);
            assert!((p.y + r as f32).abs() < 1e-6);
            assert_eq!(p.z, 0.0);
        }
    }
}

#[test]
fn test_board_grid_deterministic() {
    let a = board_grid(7, 5, 0.03);
    let b = board_grid(7, 5, 0.03);
    assert_eq!(a.len(), b.len());
    for (pa, pb) in a.iter().zip(b.iter()) {
        assert_eq!(pa, pb);
    }
}

#[test]
fn test_board_grid_square_size_scales() {
    let s = 0.025;
    let grid = board_grid(4, 3, s);
    let p = grid[1 * 3 + 2];
    assert!((p.x - 2.0 * s).abs() < 1e-6);
    assert!((p.y + s).abs() < 1e-6);
}

#[test]
fn test_board_from_config_default() {
    let board = Board::from_config(&BoardConfig::default());
    assert_eq!(board.rows, 9);
    assert_eq!(board.cols, 6);
    assert_eq!(board.len(), 54);
    assert!(board.points.iter().all(|p| p.z == 0.0));
}

#[test]
fn test_default_board_matches_default_config() {
    let a = create_default_9x6_board();
    let b = Board::from_config(&BoardConfig::default());
    assert_eq!(a.points, b.points);
}

#[test]
fn test_board_empty_dims() {
    let board = Board::new(0, 6, 1.0);
    assert!(board.is_empty());
}
