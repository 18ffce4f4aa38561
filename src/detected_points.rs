use glam;

use crate::board::Board;

/// One 2D detection paired with the board point it corresponds to.
#[derive(Debug, Clone, Copy)]
pub struct FeaturePoint {
    pub p2d: glam::Vec2,
    pub p3d: glam::Vec3,
}

/// All correspondences from a single frame, ordered row-major to match the
/// board grid. Immutable once built; the calibration dataset owns accepted
/// instances.
#[derive(Debug, Clone)]
pub struct FrameFeature {
    pub time_ns: i64,
    pub img_w_h: (u32, u32),
    pub features: Vec<FeaturePoint>,
}

impl FrameFeature {
    /// Pair ordered detections with the board grid. The detector guarantees
    /// one point per grid node in board order; anything else is a caller bug.
    pub fn from_detection(
        time_ns: i64,
        img_w_h: (u32, u32),
        p2ds: Vec<glam::Vec2>,
        board: &Board,
    ) -> FrameFeature {
        assert_eq!(
            p2ds.len(),
            board.points.len(),
            "detected point count must match the board grid"
        );
        let features = p2ds
            .into_iter()
            .zip(board.points.iter())
            .map(|(p2d, &p3d)| FeaturePoint { p2d, p3d })
            .collect();
        FrameFeature {
            time_ns,
            img_w_h,
            features,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn p2ds(&self) -> Vec<glam::Vec2> {
        self.features.iter().map(|f| f.p2d).collect()
    }

    pub fn p3ds(&self) -> Vec<glam::Vec3> {
        self.features.iter().map(|f| f.p3d).collect()
    }
}
