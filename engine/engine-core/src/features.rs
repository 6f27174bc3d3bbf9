//! Neural-net input layout.
//!
//! Spatial features are stored plane-major: `[feature][y][x]` over the net's
//! `nn_x_len * nn_y_len` grid. Boards smaller than the net occupy the
//! top-left corner and the `ON_BOARD` plane marks which points are real.

use crate::types::Player;

/// Number of spatial feature planes.
pub const NUM_SPATIAL_FEATURES: usize = 8;

/// Number of global (non-spatial) features.
pub const NUM_GLOBAL_FEATURES: usize = 5;

/// Indices of the spatial planes.
pub mod spatial {
    pub const ON_BOARD: usize = 0;
    pub const OWN_STONES: usize = 1;
    pub const OPP_STONES: usize = 2;
    pub const LIBERTIES_1: usize = 3;
    pub const LIBERTIES_2: usize = 4;
    pub const LIBERTIES_3: usize = 5;
    pub const KO_BAN: usize = 6;
    pub const LAST_MOVE: usize = 7;
}

/// Indices of the global features.
pub mod global {
    /// Komi from the perspective of the player to move, divided by 20.
    pub const KOMI: usize = 0;
    pub const AREA_SCORING: usize = 1;
    pub const SUICIDE_LEGAL: usize = 2;
    pub const LAST_MOVE_PASS: usize = 3;
    /// Draw value for the player to move, centered on zero.
    pub const DRAW_EQUIVALENCE: usize = 4;
}

/// Parameters that change how a position is encoded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NnInputParams {
    /// Perspective the inputs are encoded from.
    pub next_player: Player,
    /// How many wins a draw is worth to white, in `[0, 1]`.
    pub draw_equivalent_wins_for_white: f64,
}

/// Encoded inputs for one position.
#[derive(Debug, Clone, PartialEq)]
pub struct NnInputs {
    pub nn_x_len: usize,
    pub nn_y_len: usize,
    /// `NUM_SPATIAL_FEATURES * nn_y_len * nn_x_len` values.
    pub spatial: Vec<f32>,
    /// `NUM_GLOBAL_FEATURES` values.
    pub global: Vec<f32>,
    /// Legal moves in policy order (`nn_x_len * nn_y_len + 1` slots, pass last).
    pub legal: Vec<bool>,
}

impl NnInputs {
    /// All-zero inputs with nothing legal.
    pub fn new(nn_x_len: usize, nn_y_len: usize) -> Self {
        let area = nn_x_len * nn_y_len;
        Self {
            nn_x_len,
            nn_y_len,
            spatial: vec![0.0; NUM_SPATIAL_FEATURES * area],
            global: vec![0.0; NUM_GLOBAL_FEATURES],
            legal: vec![false; area + 1],
        }
    }

    /// Number of policy slots, including pass.
    #[inline]
    pub fn policy_len(&self) -> usize {
        self.nn_x_len * self.nn_y_len + 1
    }

    #[inline]
    fn spatial_index(&self, feature: usize, x: usize, y: usize) -> usize {
        debug_assert!(feature < NUM_SPATIAL_FEATURES);
        debug_assert!(x < self.nn_x_len && y < self.nn_y_len);
        (feature * self.nn_y_len + y) * self.nn_x_len + x
    }

    #[inline]
    pub fn set_spatial(&mut self, feature: usize, x: usize, y: usize, value: f32) {
        let idx = self.spatial_index(feature, x, y);
        self.spatial[idx] = value;
    }

    #[inline]
    pub fn spatial_at(&self, feature: usize, x: usize, y: usize) -> f32 {
        self.spatial[self.spatial_index(feature, x, y)]
    }

    /// The plane for one feature as a slice.
    pub fn plane(&self, feature: usize) -> &[f32] {
        let area = self.nn_x_len * self.nn_y_len;
        &self.spatial[feature * area..(feature + 1) * area]
    }

    pub fn num_legal(&self) -> usize {
        self.legal.iter().filter(|&&l| l).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_inputs_shape() {
        let inputs = NnInputs::new(9, 7);
        assert_eq!(inputs.spatial.len(), NUM_SPATIAL_FEATURES * 63);
        assert_eq!(inputs.global.len(), NUM_GLOBAL_FEATURES);
        assert_eq!(inputs.policy_len(), 64);
        assert_eq!(inputs.num_legal(), 0);
    }

    #[test]
    fn test_spatial_layout_is_plane_major() {
        let mut inputs = NnInputs::new(5, 5);
        inputs.set_spatial(spatial::OWN_STONES, 2, 3, 1.0);

        assert_eq!(inputs.spatial_at(spatial::OWN_STONES, 2, 3), 1.0);
        assert_eq!(inputs.plane(spatial::OWN_STONES)[3 * 5 + 2], 1.0);
        assert_eq!(inputs.spatial[25 + 3 * 5 + 2], 1.0);
        assert!(inputs.plane(spatial::OPP_STONES).iter().all(|&v| v == 0.0));
    }
}
