//! Utility of search values.
//!
//! A node's utility mixes its win/loss average, its no-result rate and two
//! saturating score terms. The score terms take the expectation of
//! `2/pi * atan((s - center) / (scale * sqrt(area)))` over a normal
//! distribution fitted to the node's score mean and mean square.

use std::f64::consts::{FRAC_2_PI, FRAC_2_SQRT_PI, SQRT_2};

use crate::config::SearchParams;
use crate::node::NodeStats;

/// Scale of the score term centered on zero.
pub const STATIC_SCORE_SCALE: f64 = 2.0;
/// Scale of the score term centered on the current expected score.
pub const DYNAMIC_SCORE_SCALE: f64 = 0.75;

// Gauss-Hermite nodes and weights, n = 10, positive half.
const GAUSS_HERMITE: [(f64, f64); 5] = [
    (0.342_901_327_223_704_6, 0.610_862_633_735_325_8),
    (1.036_610_829_789_513_7, 0.240_138_611_082_314_7),
    (1.756_683_649_299_881_8, 0.033_874_394_455_481_06),
    (2.532_731_674_232_789_7, 0.001_343_645_746_781_232_7),
    (3.436_159_118_837_737_6, 7.640_432_855_232_621e-6),
];

/// Saturating value of a single score.
#[inline]
pub fn score_value(score: f64, center: f64, scale: f64, sqrt_area: f64) -> f64 {
    FRAC_2_PI * ((score - center) / (scale * sqrt_area)).atan()
}

/// Expectation of [`score_value`] over `N(mean, stdev^2)`.
pub fn expected_score_value(mean: f64, stdev: f64, center: f64, scale: f64, sqrt_area: f64) -> f64 {
    if stdev <= 1e-9 {
        return score_value(mean, center, scale, sqrt_area);
    }
    let spread = SQRT_2 * stdev;
    let total: f64 = GAUSS_HERMITE
        .iter()
        .map(|&(x, w)| {
            w * (score_value(mean + spread * x, center, scale, sqrt_area)
                + score_value(mean - spread * x, center, scale, sqrt_area))
        })
        .sum();
    total * FRAC_2_SQRT_PI * 0.5
}

/// Everything needed to turn statistics into utilities for one search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Utility {
    pub win_loss_factor: f64,
    pub no_result_utility_for_white: f64,
    pub static_factor: f64,
    pub dynamic_factor: f64,
    /// Center of the dynamic score term, white's perspective.
    pub dynamic_center: f64,
    pub sqrt_area: f64,
}

impl Utility {
    pub fn new(params: &SearchParams, dynamic_center: f64, x_size: usize, y_size: usize) -> Self {
        Self {
            win_loss_factor: params.win_loss_utility_factor,
            no_result_utility_for_white: params.no_result_utility_for_white,
            static_factor: params.static_score_utility_factor,
            dynamic_factor: params.dynamic_score_utility_factor,
            dynamic_center,
            sqrt_area: ((x_size * y_size) as f64).sqrt(),
        }
    }

    /// Largest magnitude a utility can reach. Virtual losses count as this
    /// much against the player exploring.
    #[inline]
    pub fn max_abs(&self) -> f64 {
        self.win_loss_factor.abs()
            + self.no_result_utility_for_white.abs()
            + self.static_factor.abs()
            + self.dynamic_factor.abs()
    }

    /// White's utility given averaged values.
    pub fn white_utility(
        &self,
        win_loss: f64,
        no_result: f64,
        score_mean: f64,
        score_mean_sq: f64,
    ) -> f64 {
        let stdev = (score_mean_sq - score_mean * score_mean).max(0.0).sqrt();
        let mut utility =
            win_loss * self.win_loss_factor + no_result * self.no_result_utility_for_white;
        if self.static_factor != 0.0 {
            utility += self.static_factor
                * expected_score_value(score_mean, stdev, 0.0, STATIC_SCORE_SCALE, self.sqrt_area);
        }
        if self.dynamic_factor != 0.0 {
            utility += self.dynamic_factor
                * expected_score_value(
                    score_mean,
                    stdev,
                    self.dynamic_center,
                    DYNAMIC_SCORE_SCALE,
                    self.sqrt_area,
                );
        }
        utility
    }

    /// White's utility of a node's averages, with `white_score_bonus` points
    /// added to its score distribution.
    pub fn white_utility_of(&self, stats: &NodeStats, white_score_bonus: f64) -> f64 {
        let mean = stats.score_mean_avg();
        let mean_sq = stats.score_mean_sq_avg();
        let shifted = mean + white_score_bonus;
        // Shifting keeps the variance: E[(s+b)^2] = E[s^2] + 2bE[s] + b^2
        let shifted_sq =
            mean_sq + 2.0 * white_score_bonus * mean + white_score_bonus * white_score_bonus;
        self.white_utility(stats.win_loss_avg(), stats.no_result_avg(), shifted, shifted_sq)
    }
}

/// Dynamic score center for a root whose expected white score is `root_score_mean`.
///
/// Pulled towards zero by `zero_weight`, but never more than
/// `0.75 * sqrt(area)` points away from the expectation.
pub fn dynamic_score_center(
    root_score_mean: f64,
    zero_weight: f64,
    x_size: usize,
    y_size: usize,
) -> f64 {
    let cap = ((x_size * y_size) as f64).sqrt() * DYNAMIC_SCORE_SCALE;
    let center = root_score_mean * (1.0 - zero_weight);
    center.clamp(root_score_mean - cap, root_score_mean + cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ValueSample;

    #[test]
    fn test_score_value_is_odd_and_bounded() {
        let sqrt_area = 9.0;
        assert_eq!(score_value(0.0, 0.0, 2.0, sqrt_area), 0.0);
        let v = score_value(5.0, 0.0, 2.0, sqrt_area);
        assert!(v > 0.0 && v < 1.0);
        assert!((score_value(-5.0, 0.0, 2.0, sqrt_area) + v).abs() < 1e-12);
        assert!(score_value(1e9, 0.0, 2.0, sqrt_area) < 1.0);
    }

    #[test]
    fn test_expected_score_value_quadrature() {
        let sqrt_area = 19.0;
        // Zero variance collapses to the point value
        let point = score_value(3.0, 0.0, 2.0, sqrt_area);
        assert!((expected_score_value(3.0, 0.0, 0.0, 2.0, sqrt_area) - point).abs() < 1e-12);

        // Symmetric around the center
        assert!(expected_score_value(0.0, 10.0, 0.0, 2.0, sqrt_area).abs() < 1e-12);

        // Spreading mass into the flat tails lowers the value of a positive mean
        let narrow = expected_score_value(20.0, 1.0, 0.0, 2.0, sqrt_area);
        let wide = expected_score_value(20.0, 30.0, 0.0, 2.0, sqrt_area);
        assert!(wide < narrow);
    }

    #[test]
    fn test_white_utility_components() {
        let params = SearchParams {
            static_score_utility_factor: 0.0,
            no_result_utility_for_white: -0.5,
            ..SearchParams::default()
        };
        let util = Utility::new(&params, 0.0, 9, 9);
        assert!((util.white_utility(0.5, 0.2, 10.0, 100.0) - 0.4).abs() < 1e-12);
        assert!((util.max_abs() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_score_bonus_shifts_utility() {
        let params = SearchParams::default();
        let util = Utility::new(&params, 0.0, 9, 9);
        let stats = NodeStats::from_sample(&ValueSample {
            win_loss: 0.0,
            no_result: 0.0,
            score_mean: 1.0,
            score_mean_sq: 5.0,
            lead: 1.0,
        });
        let base = util.white_utility_of(&stats, 0.0);
        assert!(util.white_utility_of(&stats, 2.0) > base);
        assert!(util.white_utility_of(&stats, -2.0) < base);
    }

    #[test]
    fn test_dynamic_center_is_capped() {
        // 9x9: cap is 9 * 0.75 = 6.75 points from the mean
        assert!((dynamic_score_center(4.0, 0.2, 9, 9) - 3.2).abs() < 1e-12);
        assert!((dynamic_score_center(40.0, 0.5, 9, 9) - 33.25).abs() < 1e-12);
        assert!((dynamic_score_center(-40.0, 0.5, 9, 9) + 33.25).abs() < 1e-12);
        assert_eq!(dynamic_score_center(0.0, 0.2, 19, 19), 0.0);
    }
}
