//! Search parameters.

use engine_config::SearchConfig;

use crate::search::SearchError;

/// Parameters for one search.
///
/// A search holds these behind an `Arc` and workers read that snapshot, so
/// changing parameters means handing a new value to
/// [`crate::Search::set_params`] between searches.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    /// Stop once the root has this many visits.
    pub max_visits: u64,
    /// Stop after this many playouts in one search call.
    pub max_playouts: u64,
    /// Wall-clock limit per search call, in seconds. Infinite by default.
    pub max_time_secs: f64,
    /// Playout worker threads per search call.
    pub num_threads: usize,

    /// Weight of the win/loss term in the utility.
    pub win_loss_utility_factor: f64,
    /// Weight of the score term centered on zero.
    pub static_score_utility_factor: f64,
    /// Weight of the score term centered on the current expected score.
    pub dynamic_score_utility_factor: f64,
    /// How far the dynamic center is pulled towards zero.
    pub dynamic_score_center_zero_weight: f64,
    pub no_result_utility_for_white: f64,
    /// How many wins a draw is worth to white, in `[0, 1]`.
    pub draw_equivalent_wins_for_white: f64,

    pub cpuct_exploration: f64,
    /// Growth of the exploration constant with the log of parent visits.
    pub cpuct_exploration_log: f64,
    pub cpuct_exploration_base: f64,
    /// First-play urgency reduction below the root.
    pub fpu_reduction_max: f64,
    /// First-play urgency reduction at the root.
    pub root_fpu_reduction_max: f64,
    pub num_virtual_losses_per_thread: u32,

    /// Pick the final move by lower confidence bound instead of raw visits.
    /// Playout descent ignores this and always uses plain means.
    pub use_lcb_for_selection: bool,
    pub lcb_stdevs: f64,
    /// Children need this fraction of the top visit count to be LCB candidates.
    pub min_visit_prop_for_lcb: f64,

    pub root_policy_temperature: f64,
    pub root_noise_enabled: bool,
    pub root_dirichlet_noise_total_concentration: f64,
    pub root_dirichlet_noise_weight: f64,
    /// Root children with fewer than `sqrt(prior * total * coeff)` visits
    /// are searched first. Zero disables this.
    pub root_desired_per_child_visits_coeff: f64,
    /// Keep suicides and moves inside pass-alive areas out of the root.
    pub root_prune_useless_moves: bool,
    /// Score adjustment, in points, for root moves that end or clean up the game.
    pub root_ending_bonus_points: f64,

    pub chosen_move_temperature: f64,
    pub chosen_move_temperature_early: f64,
    /// Plies for the early temperature to decay halfway, on a 19x19 board.
    pub chosen_move_temperature_halflife: f64,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            max_visits: 800,
            max_playouts: u64::MAX,
            max_time_secs: f64::INFINITY,
            num_threads: 1,
            win_loss_utility_factor: 1.0,
            static_score_utility_factor: 0.1,
            dynamic_score_utility_factor: 0.0,
            dynamic_score_center_zero_weight: 0.2,
            no_result_utility_for_white: 0.0,
            draw_equivalent_wins_for_white: 0.5,
            cpuct_exploration: 1.0,
            cpuct_exploration_log: 0.0,
            cpuct_exploration_base: 500.0,
            fpu_reduction_max: 0.2,
            root_fpu_reduction_max: 0.1,
            num_virtual_losses_per_thread: 3,
            use_lcb_for_selection: false,
            lcb_stdevs: 4.0,
            min_visit_prop_for_lcb: 0.05,
            root_policy_temperature: 1.0,
            root_noise_enabled: false,
            root_dirichlet_noise_total_concentration: 10.83,
            root_dirichlet_noise_weight: 0.25,
            root_desired_per_child_visits_coeff: 0.0,
            root_prune_useless_moves: false,
            root_ending_bonus_points: 0.0,
            chosen_move_temperature: 0.1,
            chosen_move_temperature_early: 0.5,
            chosen_move_temperature_halflife: 19.0,
        }
    }
}

impl SearchParams {
    /// Create a fast, deterministic config for testing.
    pub fn for_testing() -> Self {
        Self {
            max_visits: 100,
            chosen_move_temperature: 0.0,
            chosen_move_temperature_early: 0.0,
            ..Self::default()
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            max_visits: config.max_visits,
            max_playouts: config.max_playouts,
            max_time_secs: config.max_time_secs,
            num_threads: config.num_threads,
            win_loss_utility_factor: config.win_loss_utility_factor,
            static_score_utility_factor: config.static_score_utility_factor,
            dynamic_score_utility_factor: config.dynamic_score_utility_factor,
            dynamic_score_center_zero_weight: config.dynamic_score_center_zero_weight,
            no_result_utility_for_white: config.no_result_utility_for_white,
            draw_equivalent_wins_for_white: config.draw_equivalent_wins_for_white,
            cpuct_exploration: config.cpuct_exploration,
            cpuct_exploration_log: config.cpuct_exploration_log,
            cpuct_exploration_base: config.cpuct_exploration_base,
            fpu_reduction_max: config.fpu_reduction_max,
            root_fpu_reduction_max: config.root_fpu_reduction_max,
            num_virtual_losses_per_thread: config.num_virtual_losses_per_thread,
            use_lcb_for_selection: config.use_lcb_for_selection,
            lcb_stdevs: config.lcb_stdevs,
            min_visit_prop_for_lcb: config.min_visit_prop_for_lcb,
            root_policy_temperature: config.root_policy_temperature,
            root_noise_enabled: config.root_noise_enabled,
            root_dirichlet_noise_total_concentration: config
                .root_dirichlet_noise_total_concentration,
            root_dirichlet_noise_weight: config.root_dirichlet_noise_weight,
            root_desired_per_child_visits_coeff: config.root_desired_per_child_visits_coeff,
            root_prune_useless_moves: config.root_prune_useless_moves,
            root_ending_bonus_points: config.root_ending_bonus_points,
            chosen_move_temperature: config.chosen_move_temperature,
            chosen_move_temperature_early: config.chosen_move_temperature_early,
            chosen_move_temperature_halflife: config.chosen_move_temperature_halflife,
        }
    }

    /// Builder pattern: set the visit limit.
    pub fn with_max_visits(mut self, n: u64) -> Self {
        self.max_visits = n;
        self
    }

    pub fn with_max_playouts(mut self, n: u64) -> Self {
        self.max_playouts = n;
        self
    }

    pub fn with_max_time_secs(mut self, secs: f64) -> Self {
        self.max_time_secs = secs;
        self
    }

    pub fn with_num_threads(mut self, n: usize) -> Self {
        self.num_threads = n;
        self
    }

    pub fn with_cpuct(mut self, c: f64) -> Self {
        self.cpuct_exploration = c;
        self
    }

    /// Builder pattern: set both first-play urgency reductions.
    pub fn with_fpu_reduction(mut self, root: f64, non_root: f64) -> Self {
        self.root_fpu_reduction_max = root;
        self.fpu_reduction_max = non_root;
        self
    }

    pub fn with_root_noise(mut self, enabled: bool) -> Self {
        self.root_noise_enabled = enabled;
        self
    }

    pub fn with_root_desired_per_child_visits_coeff(mut self, coeff: f64) -> Self {
        self.root_desired_per_child_visits_coeff = coeff;
        self
    }

    pub fn with_root_prune_useless_moves(mut self, prune: bool) -> Self {
        self.root_prune_useless_moves = prune;
        self
    }

    pub fn with_root_policy_temperature(mut self, t: f64) -> Self {
        self.root_policy_temperature = t;
        self
    }

    pub fn with_lcb(mut self, enabled: bool) -> Self {
        self.use_lcb_for_selection = enabled;
        self
    }

    pub fn with_score_utility(mut self, static_factor: f64, dynamic_factor: f64) -> Self {
        self.static_score_utility_factor = static_factor;
        self.dynamic_score_utility_factor = dynamic_factor;
        self
    }

    /// Builder pattern: set the base and early move temperatures.
    pub fn with_chosen_move_temperature(mut self, base: f64, early: f64) -> Self {
        self.chosen_move_temperature = base;
        self.chosen_move_temperature_early = early;
        self
    }

    pub fn with_root_ending_bonus_points(mut self, points: f64) -> Self {
        self.root_ending_bonus_points = points;
        self
    }

    /// Exploration constant at a node whose children have `total_child_visits`.
    #[inline]
    pub fn cpuct(&self, total_child_visits: f64) -> f64 {
        let base = self.cpuct_exploration_base;
        let growth = (total_child_visits + base) / base;
        self.cpuct_exploration + self.cpuct_exploration_log * growth.ln()
    }

    /// Reject parameter combinations the search cannot run with.
    pub fn validate(&self) -> Result<(), SearchError> {
        fn check(ok: bool, what: &str) -> Result<(), SearchError> {
            if ok {
                Ok(())
            } else {
                Err(SearchError::InvalidConfig(what.to_string()))
            }
        }
        let unit = |v: f64| (0.0..=1.0).contains(&v);

        check(self.max_visits >= 1, "max_visits must be at least 1")?;
        check(self.max_playouts >= 1, "max_playouts must be at least 1")?;
        check(self.max_time_secs > 0.0, "max_time_secs must be positive")?;
        check(self.num_threads >= 1, "num_threads must be at least 1")?;
        check(
            unit(self.draw_equivalent_wins_for_white),
            "draw_equivalent_wins_for_white must be in [0, 1]",
        )?;
        check(
            unit(self.dynamic_score_center_zero_weight),
            "dynamic_score_center_zero_weight must be in [0, 1]",
        )?;
        check(self.cpuct_exploration >= 0.0, "cpuct_exploration must be non-negative")?;
        check(self.cpuct_exploration_base > 0.0, "cpuct_exploration_base must be positive")?;
        check(
            self.fpu_reduction_max >= 0.0 && self.root_fpu_reduction_max >= 0.0,
            "fpu reductions must be non-negative",
        )?;
        check(self.lcb_stdevs >= 0.0, "lcb_stdevs must be non-negative")?;
        check(unit(self.min_visit_prop_for_lcb), "min_visit_prop_for_lcb must be in [0, 1]")?;
        check(
            self.root_policy_temperature > 0.0 && self.root_policy_temperature.is_finite(),
            "root_policy_temperature must be positive",
        )?;
        check(
            self.root_dirichlet_noise_total_concentration > 0.0,
            "root_dirichlet_noise_total_concentration must be positive",
        )?;
        check(
            unit(self.root_dirichlet_noise_weight),
            "root_dirichlet_noise_weight must be in [0, 1]",
        )?;
        check(
            self.root_desired_per_child_visits_coeff >= 0.0,
            "root_desired_per_child_visits_coeff must be non-negative",
        )?;
        check(
            self.chosen_move_temperature >= 0.0 && self.chosen_move_temperature_early >= 0.0,
            "chosen move temperatures must be non-negative",
        )?;
        check(
            self.chosen_move_temperature_halflife > 0.0,
            "chosen_move_temperature_halflife must be positive",
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let params = SearchParams::default();
        assert_eq!(params.max_visits, 800);
        assert_eq!(params.num_threads, 1);
        assert!(params.max_time_secs.is_infinite());
        assert!(!params.root_prune_useless_moves);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let params = SearchParams::default()
            .with_max_visits(100)
            .with_fpu_reduction(0.0, 0.3)
            .with_chosen_move_temperature(0.0, 0.0);

        assert_eq!(params.max_visits, 100);
        assert_eq!(params.root_fpu_reduction_max, 0.0);
        assert!((params.fpu_reduction_max - 0.3).abs() < 1e-12);
        assert_eq!(params.chosen_move_temperature, 0.0);
    }

    #[test]
    fn test_matches_config_defaults() {
        let from_config = SearchParams::from_config(&SearchConfig::default());
        assert_eq!(from_config, SearchParams::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(SearchParams::default().with_max_visits(0).validate().is_err());
        assert!(SearchParams::default().with_num_threads(0).validate().is_err());
        assert!(SearchParams::default()
            .with_root_policy_temperature(0.0)
            .validate()
            .is_err());
        let params = SearchParams {
            draw_equivalent_wins_for_white: 1.5,
            ..SearchParams::default()
        };
        assert!(matches!(params.validate(), Err(SearchError::InvalidConfig(_))));
    }

    #[test]
    fn test_cpuct_log_growth() {
        let flat = SearchParams::default();
        assert_eq!(flat.cpuct(1000.0), 1.0);

        let growing = SearchParams {
            cpuct_exploration_log: 0.5,
            ..SearchParams::default()
        };
        assert_eq!(growing.cpuct(0.0), 1.0);
        assert!(growing.cpuct(1000.0) > 1.5);
    }
}
