//! Default configuration values loaded from config.defaults.toml.
//!
//! This module loads defaults from the shared TOML file at compile time,
//! so the documented defaults and the built-in ones cannot drift apart.

use once_cell::sync::Lazy;
use serde::Deserialize;

/// The embedded defaults TOML file (loaded at compile time)
const DEFAULTS_TOML: &str = include_str!("../../../config.defaults.toml");

/// Parsed defaults structure (parsed once at first use)
static DEFAULTS: Lazy<DefaultsConfig> = Lazy::new(|| {
    toml::from_str(DEFAULTS_TOML).expect("config.defaults.toml should be valid TOML")
});

// ============================================================================
// Internal structs for parsing config.defaults.toml
// ============================================================================

#[derive(Debug, Deserialize)]
struct DefaultsConfig {
    common: CommonDefaults,
    search: SearchDefaults,
    nn: NnDefaults,
}

#[derive(Debug, Deserialize)]
struct CommonDefaults {
    log_level: String,
}

#[derive(Debug, Deserialize)]
struct SearchDefaults {
    max_visits: u64,
    max_playouts: u64,
    max_time_secs: f64,
    num_threads: usize,

    win_loss_utility_factor: f64,
    static_score_utility_factor: f64,
    dynamic_score_utility_factor: f64,
    dynamic_score_center_zero_weight: f64,
    no_result_utility_for_white: f64,
    draw_equivalent_wins_for_white: f64,

    cpuct_exploration: f64,
    cpuct_exploration_log: f64,
    cpuct_exploration_base: f64,
    fpu_reduction_max: f64,
    root_fpu_reduction_max: f64,
    num_virtual_losses_per_thread: u32,

    use_lcb_for_selection: bool,
    lcb_stdevs: f64,
    min_visit_prop_for_lcb: f64,

    root_policy_temperature: f64,
    root_noise_enabled: bool,
    root_dirichlet_noise_total_concentration: f64,
    root_dirichlet_noise_weight: f64,
    root_desired_per_child_visits_coeff: f64,
    root_prune_useless_moves: bool,
    root_ending_bonus_points: f64,

    chosen_move_temperature: f64,
    chosen_move_temperature_early: f64,
    chosen_move_temperature_halflife: f64,
}

#[derive(Debug, Deserialize)]
struct NnDefaults {
    nn_x_len: usize,
    nn_y_len: usize,
    max_batch_size: usize,
    num_server_threads: usize,
    batch_wait_micros: u64,
    cache_size_power_of_two: u32,
    mutex_pool_size_power_of_two: u32,
    policy_temperature: f32,
    always_include_ownership: bool,
    default_symmetry: u8,
    randomize_symmetry: bool,
}

// ============================================================================
// Public accessor functions
// ============================================================================

// Common
pub fn log_level() -> &'static str {
    &DEFAULTS.common.log_level
}

// Search budget
pub fn max_visits() -> u64 {
    DEFAULTS.search.max_visits
}
pub fn max_playouts() -> u64 {
    DEFAULTS.search.max_playouts
}
pub fn max_time_secs() -> f64 {
    DEFAULTS.search.max_time_secs
}
pub fn num_threads() -> usize {
    DEFAULTS.search.num_threads
}

// Search utility
pub fn win_loss_utility_factor() -> f64 {
    DEFAULTS.search.win_loss_utility_factor
}
pub fn static_score_utility_factor() -> f64 {
    DEFAULTS.search.static_score_utility_factor
}
pub fn dynamic_score_utility_factor() -> f64 {
    DEFAULTS.search.dynamic_score_utility_factor
}
pub fn dynamic_score_center_zero_weight() -> f64 {
    DEFAULTS.search.dynamic_score_center_zero_weight
}
pub fn no_result_utility_for_white() -> f64 {
    DEFAULTS.search.no_result_utility_for_white
}
pub fn draw_equivalent_wins_for_white() -> f64 {
    DEFAULTS.search.draw_equivalent_wins_for_white
}

// Search exploration
pub fn cpuct_exploration() -> f64 {
    DEFAULTS.search.cpuct_exploration
}
pub fn cpuct_exploration_log() -> f64 {
    DEFAULTS.search.cpuct_exploration_log
}
pub fn cpuct_exploration_base() -> f64 {
    DEFAULTS.search.cpuct_exploration_base
}
pub fn fpu_reduction_max() -> f64 {
    DEFAULTS.search.fpu_reduction_max
}
pub fn root_fpu_reduction_max() -> f64 {
    DEFAULTS.search.root_fpu_reduction_max
}
pub fn num_virtual_losses_per_thread() -> u32 {
    DEFAULTS.search.num_virtual_losses_per_thread
}

// Lower confidence bound
pub fn use_lcb_for_selection() -> bool {
    DEFAULTS.search.use_lcb_for_selection
}
pub fn lcb_stdevs() -> f64 {
    DEFAULTS.search.lcb_stdevs
}
pub fn min_visit_prop_for_lcb() -> f64 {
    DEFAULTS.search.min_visit_prop_for_lcb
}

// Root
pub fn root_policy_temperature() -> f64 {
    DEFAULTS.search.root_policy_temperature
}
pub fn root_noise_enabled() -> bool {
    DEFAULTS.search.root_noise_enabled
}
pub fn root_dirichlet_noise_total_concentration() -> f64 {
    DEFAULTS.search.root_dirichlet_noise_total_concentration
}
pub fn root_dirichlet_noise_weight() -> f64 {
    DEFAULTS.search.root_dirichlet_noise_weight
}
pub fn root_desired_per_child_visits_coeff() -> f64 {
    DEFAULTS.search.root_desired_per_child_visits_coeff
}
pub fn root_prune_useless_moves() -> bool {
    DEFAULTS.search.root_prune_useless_moves
}
pub fn root_ending_bonus_points() -> f64 {
    DEFAULTS.search.root_ending_bonus_points
}

// Move choice
pub fn chosen_move_temperature() -> f64 {
    DEFAULTS.search.chosen_move_temperature
}
pub fn chosen_move_temperature_early() -> f64 {
    DEFAULTS.search.chosen_move_temperature_early
}
pub fn chosen_move_temperature_halflife() -> f64 {
    DEFAULTS.search.chosen_move_temperature_halflife
}

// Inference service
pub fn nn_x_len() -> usize {
    DEFAULTS.nn.nn_x_len
}
pub fn nn_y_len() -> usize {
    DEFAULTS.nn.nn_y_len
}
pub fn max_batch_size() -> usize {
    DEFAULTS.nn.max_batch_size
}
pub fn num_server_threads() -> usize {
    DEFAULTS.nn.num_server_threads
}
pub fn batch_wait_micros() -> u64 {
    DEFAULTS.nn.batch_wait_micros
}
pub fn cache_size_power_of_two() -> u32 {
    DEFAULTS.nn.cache_size_power_of_two
}
pub fn mutex_pool_size_power_of_two() -> u32 {
    DEFAULTS.nn.mutex_pool_size_power_of_two
}
pub fn policy_temperature() -> f32 {
    DEFAULTS.nn.policy_temperature
}
pub fn always_include_ownership() -> bool {
    DEFAULTS.nn.always_include_ownership
}
pub fn default_symmetry() -> u8 {
    DEFAULTS.nn.default_symmetry
}
pub fn randomize_symmetry() -> bool {
    DEFAULTS.nn.randomize_symmetry
}
