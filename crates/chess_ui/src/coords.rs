use bevy::math::Vec3;
use chess_core::Square;

/// Scene position of every square centre.
///
/// Built once from two calibration points: the centre of a1 and the centre
/// of h8. Files run along x and ranks along z, interpolated linearly; every
/// square shares the average elevation of the two anchors.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardAnchorGrid {
    anchors: [Vec3; 64],
    elevation: f32,
}

impl BoardAnchorGrid {
    pub fn from_calibration(a1: Vec3, h8: Vec3) -> Self {
        let elevation = (a1.y + h8.y) / 2.0;
        let mut anchors = [Vec3::ZERO; 64];
        for square in Square::all() {
            let file_t = square.file() as f32 / 7.0;
            let rank_t = square.rank() as f32 / 7.0;
            anchors[square.index()] = Vec3::new(
                a1.x + (h8.x - a1.x) * file_t,
                elevation,
                a1.z + (h8.z - a1.z) * rank_t,
            );
        }
        Self { anchors, elevation }
    }

    pub fn square_to_position(&self, square: Square) -> Vec3 {
        self.anchors[square.index()]
    }

    /// Nearest square centre to `point` in the board plane.
    ///
    /// Elevation is ignored. Every point resolves to some square, even one
    /// far off the board, so callers treat the answer as approximate. Equal
    /// distances go to the square found first, scanning a1, b1, ... h8.
    pub fn position_to_square(&self, point: Vec3) -> Square {
        let mut best = Square::from_index(0);
        let mut best_distance = f32::INFINITY;
        for square in Square::all() {
            let anchor = self.anchors[square.index()];
            let dx = anchor.x - point.x;
            let dz = anchor.z - point.z;
            let distance = dx * dx + dz * dz;
            if distance < best_distance {
                best = square;
                best_distance = distance;
            }
        }
        best
    }

    pub fn elevation(&self) -> f32 {
        self.elevation
    }

    /// Centre-to-centre distance between neighbouring files and ranks.
    pub fn square_size(&self) -> (f32, f32) {
        let a1 = self.anchors[0];
        let b2 = self.anchors[9];
        ((b2.x - a1.x).abs(), (b2.z - a1.z).abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> BoardAnchorGrid {
        BoardAnchorGrid::from_calibration(Vec3::new(-3.5, 0.2, 3.5), Vec3::new(3.5, 0.4, -3.5))
    }

    fn sq(name: &str) -> Square {
        Square::from_algebraic(name).unwrap()
    }

    #[test]
    fn every_square_maps_back_to_itself() {
        let grid = grid();
        for square in Square::all() {
            assert_eq!(grid.position_to_square(grid.square_to_position(square)), square);
        }
    }

    #[test]
    fn interpolates_between_the_anchors() {
        let grid = grid();
        assert!(grid
            .square_to_position(sq("a1"))
            .abs_diff_eq(Vec3::new(-3.5, 0.3, 3.5), 1e-5));
        assert!(grid
            .square_to_position(sq("h8"))
            .abs_diff_eq(Vec3::new(3.5, 0.3, -3.5), 1e-5));

        let e2 = grid.square_to_position(sq("e2"));
        assert!((e2.x - 0.5).abs() < 1e-5);
        assert!((e2.z - 2.5).abs() < 1e-5);
        assert!((grid.elevation() - 0.3).abs() < 1e-6);

        let (file_step, rank_step) = grid.square_size();
        assert!((file_step - 1.0).abs() < 1e-5 && (rank_step - 1.0).abs() < 1e-5);
    }

    #[test]
    fn elevation_does_not_change_the_square() {
        let grid = grid();
        let d4 = grid.square_to_position(sq("d4"));
        assert_eq!(grid.position_to_square(d4 + Vec3::new(0.3, 12.0, -0.2)), sq("d4"));
    }

    #[test]
    fn off_board_points_still_resolve() {
        let grid = grid();
        assert_eq!(grid.position_to_square(Vec3::new(-40.0, 0.0, 40.0)), sq("a1"));
        assert_eq!(grid.position_to_square(Vec3::new(40.0, 0.0, -40.0)), sq("h8"));
    }

    #[test]
    fn ties_go_to_the_first_square_scanned() {
        let grid = grid();
        // Exactly between a1 and b1.
        assert_eq!(grid.position_to_square(Vec3::new(-3.0, 0.0, 3.5)), sq("a1"));
        // Exactly between a1 and a2.
        assert_eq!(grid.position_to_square(Vec3::new(-3.5, 0.0, 3.0)), sq("a1"));
    }
}
