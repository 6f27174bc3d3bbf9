//! Configuration struct definitions.
//!
//! All config structs with serde deserialization support and default values.

use crate::defaults;
use serde::Deserialize;

// ============================================================================
// Serde default functions (required for #[serde(default = "...")])
// These call the accessor functions from defaults module
// ============================================================================

fn d_log_level() -> String {
    defaults::log_level().into()
}
fn d_max_visits() -> u64 {
    defaults::max_visits()
}
fn d_max_playouts() -> u64 {
    defaults::max_playouts()
}
fn d_max_time_secs() -> f64 {
    defaults::max_time_secs()
}
fn d_num_threads() -> usize {
    defaults::num_threads()
}
fn d_win_loss_utility_factor() -> f64 {
    defaults::win_loss_utility_factor()
}
fn d_static_score_utility_factor() -> f64 {
    defaults::static_score_utility_factor()
}
fn d_dynamic_score_utility_factor() -> f64 {
    defaults::dynamic_score_utility_factor()
}
fn d_dynamic_score_center_zero_weight() -> f64 {
    defaults::dynamic_score_center_zero_weight()
}
fn d_no_result_utility_for_white() -> f64 {
    defaults::no_result_utility_for_white()
}
fn d_draw_equivalent_wins_for_white() -> f64 {
    defaults::draw_equivalent_wins_for_white()
}
fn d_cpuct_exploration() -> f64 {
    defaults::cpuct_exploration()
}
fn d_cpuct_exploration_log() -> f64 {
    defaults::cpuct_exploration_log()
}
fn d_cpuct_exploration_base() -> f64 {
    defaults::cpuct_exploration_base()
}
fn d_fpu_reduction_max() -> f64 {
    defaults::fpu_reduction_max()
}
fn d_root_fpu_reduction_max() -> f64 {
    defaults::root_fpu_reduction_max()
}
fn d_num_virtual_losses_per_thread() -> u32 {
    defaults::num_virtual_losses_per_thread()
}
fn d_use_lcb_for_selection() -> bool {
    defaults::use_lcb_for_selection()
}
fn d_lcb_stdevs() -> f64 {
    defaults::lcb_stdevs()
}
fn d_min_visit_prop_for_lcb() -> f64 {
    defaults::min_visit_prop_for_lcb()
}
fn d_root_policy_temperature() -> f64 {
    defaults::root_policy_temperature()
}
fn d_root_noise_enabled() -> bool {
    defaults::root_noise_enabled()
}
fn d_root_dirichlet_noise_total_concentration() -> f64 {
    defaults::root_dirichlet_noise_total_concentration()
}
fn d_root_dirichlet_noise_weight() -> f64 {
    defaults::root_dirichlet_noise_weight()
}
fn d_root_desired_per_child_visits_coeff() -> f64 {
    defaults::root_desired_per_child_visits_coeff()
}
fn d_root_prune_useless_moves() -> bool {
    defaults::root_prune_useless_moves()
}
fn d_root_ending_bonus_points() -> f64 {
    defaults::root_ending_bonus_points()
}
fn d_chosen_move_temperature() -> f64 {
    defaults::chosen_move_temperature()
}
fn d_chosen_move_temperature_early() -> f64 {
    defaults::chosen_move_temperature_early()
}
fn d_chosen_move_temperature_halflife() -> f64 {
    defaults::chosen_move_temperature_halflife()
}
fn d_nn_x_len() -> usize {
    defaults::nn_x_len()
}
fn d_nn_y_len() -> usize {
    defaults::nn_y_len()
}
fn d_max_batch_size() -> usize {
    defaults::max_batch_size()
}
fn d_num_server_threads() -> usize {
    defaults::num_server_threads()
}
fn d_batch_wait_micros() -> u64 {
    defaults::batch_wait_micros()
}
fn d_cache_size_power_of_two() -> u32 {
    defaults::cache_size_power_of_two()
}
fn d_mutex_pool_size_power_of_two() -> u32 {
    defaults::mutex_pool_size_power_of_two()
}
fn d_policy_temperature() -> f32 {
    defaults::policy_temperature()
}
fn d_always_include_ownership() -> bool {
    defaults::always_include_ownership()
}
fn d_default_symmetry() -> u8 {
    defaults::default_symmetry()
}
fn d_randomize_symmetry() -> bool {
    defaults::randomize_symmetry()
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Root configuration structure matching config.toml
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct CentralConfig {
    #[serde(default)]
    pub common: CommonConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub nn: NnConfig,
}

/// Common configuration shared by all components
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CommonConfig {
    #[serde(default = "d_log_level")]
    pub log_level: String,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            log_level: defaults::log_level().into(),
        }
    }
}

/// Search engine configuration (one `[search]` section)
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    /// Root visits after which the search stops
    #[serde(default = "d_max_visits")]
    pub max_visits: u64,
    /// Playouts after which the search stops
    #[serde(default = "d_max_playouts")]
    pub max_playouts: u64,
    /// Wall-clock limit in seconds (inf = none)
    #[serde(default = "d_max_time_secs")]
    pub max_time_secs: f64,
    #[serde(default = "d_num_threads")]
    pub num_threads: usize,
    #[serde(default = "d_win_loss_utility_factor")]
    pub win_loss_utility_factor: f64,
    #[serde(default = "d_static_score_utility_factor")]
    pub static_score_utility_factor: f64,
    #[serde(default = "d_dynamic_score_utility_factor")]
    pub dynamic_score_utility_factor: f64,
    #[serde(default = "d_dynamic_score_center_zero_weight")]
    pub dynamic_score_center_zero_weight: f64,
    #[serde(default = "d_no_result_utility_for_white")]
    pub no_result_utility_for_white: f64,
    #[serde(default = "d_draw_equivalent_wins_for_white")]
    pub draw_equivalent_wins_for_white: f64,
    #[serde(default = "d_cpuct_exploration")]
    pub cpuct_exploration: f64,
    #[serde(default = "d_cpuct_exploration_log")]
    pub cpuct_exploration_log: f64,
    #[serde(default = "d_cpuct_exploration_base")]
    pub cpuct_exploration_base: f64,
    #[serde(default = "d_fpu_reduction_max")]
    pub fpu_reduction_max: f64,
    #[serde(default = "d_root_fpu_reduction_max")]
    pub root_fpu_reduction_max: f64,
    #[serde(default = "d_num_virtual_losses_per_thread")]
    pub num_virtual_losses_per_thread: u32,
    #[serde(default = "d_use_lcb_for_selection")]
    pub use_lcb_for_selection: bool,
    #[serde(default = "d_lcb_stdevs")]
    pub lcb_stdevs: f64,
    #[serde(default = "d_min_visit_prop_for_lcb")]
    pub min_visit_prop_for_lcb: f64,
    #[serde(default = "d_root_policy_temperature")]
    pub root_policy_temperature: f64,
    #[serde(default = "d_root_noise_enabled")]
    pub root_noise_enabled: bool,
    #[serde(default = "d_root_dirichlet_noise_total_concentration")]
    pub root_dirichlet_noise_total_concentration: f64,
    #[serde(default = "d_root_dirichlet_noise_weight")]
    pub root_dirichlet_noise_weight: f64,
    #[serde(default = "d_root_desired_per_child_visits_coeff")]
    pub root_desired_per_child_visits_coeff: f64,
    /// Drop root moves that only fill the player's own pass-alive area
    #[serde(default = "d_root_prune_useless_moves")]
    pub root_prune_useless_moves: bool,
    #[serde(default = "d_root_ending_bonus_points")]
    pub root_ending_bonus_points: f64,
    #[serde(default = "d_chosen_move_temperature")]
    pub chosen_move_temperature: f64,
    #[serde(default = "d_chosen_move_temperature_early")]
    pub chosen_move_temperature_early: f64,
    /// Half-life in plies on a 19x19 board
    #[serde(default = "d_chosen_move_temperature_halflife")]
    pub chosen_move_temperature_halflife: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_visits: defaults::max_visits(),
            max_playouts: defaults::max_playouts(),
            max_time_secs: defaults::max_time_secs(),
            num_threads: defaults::num_threads(),
            win_loss_utility_factor: defaults::win_loss_utility_factor(),
            static_score_utility_factor: defaults::static_score_utility_factor(),
            dynamic_score_utility_factor: defaults::dynamic_score_utility_factor(),
            dynamic_score_center_zero_weight: defaults::dynamic_score_center_zero_weight(),
            no_result_utility_for_white: defaults::no_result_utility_for_white(),
            draw_equivalent_wins_for_white: defaults::draw_equivalent_wins_for_white(),
            cpuct_exploration: defaults::cpuct_exploration(),
            cpuct_exploration_log: defaults::cpuct_exploration_log(),
            cpuct_exploration_base: defaults::cpuct_exploration_base(),
            fpu_reduction_max: defaults::fpu_reduction_max(),
            root_fpu_reduction_max: defaults::root_fpu_reduction_max(),
            num_virtual_losses_per_thread: defaults::num_virtual_losses_per_thread(),
            use_lcb_for_selection: defaults::use_lcb_for_selection(),
            lcb_stdevs: defaults::lcb_stdevs(),
            min_visit_prop_for_lcb: defaults::min_visit_prop_for_lcb(),
            root_policy_temperature: defaults::root_policy_temperature(),
            root_noise_enabled: defaults::root_noise_enabled(),
            root_dirichlet_noise_total_concentration:
                defaults::root_dirichlet_noise_total_concentration(),
            root_dirichlet_noise_weight: defaults::root_dirichlet_noise_weight(),
            root_desired_per_child_visits_coeff: defaults::root_desired_per_child_visits_coeff(),
            root_prune_useless_moves: defaults::root_prune_useless_moves(),
            root_ending_bonus_points: defaults::root_ending_bonus_points(),
            chosen_move_temperature: defaults::chosen_move_temperature(),
            chosen_move_temperature_early: defaults::chosen_move_temperature_early(),
            chosen_move_temperature_halflife: defaults::chosen_move_temperature_halflife(),
        }
    }
}

/// Inference service configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct NnConfig {
    #[serde(default = "d_nn_x_len")]
    pub nn_x_len: usize,
    #[serde(default = "d_nn_y_len")]
    pub nn_y_len: usize,
    #[serde(default = "d_max_batch_size")]
    pub max_batch_size: usize,
    #[serde(default = "d_num_server_threads")]
    pub num_server_threads: usize,
    /// How long a partial batch may wait for more rows
    #[serde(default = "d_batch_wait_micros")]
    pub batch_wait_micros: u64,
    #[serde(default = "d_cache_size_power_of_two")]
    pub cache_size_power_of_two: u32,
    #[serde(default = "d_mutex_pool_size_power_of_two")]
    pub mutex_pool_size_power_of_two: u32,
    #[serde(default = "d_policy_temperature")]
    pub policy_temperature: f32,
    #[serde(default = "d_always_include_ownership")]
    pub always_include_ownership: bool,
    /// Symmetry used when randomize_symmetry is false
    #[serde(default = "d_default_symmetry")]
    pub default_symmetry: u8,
    #[serde(default = "d_randomize_symmetry")]
    pub randomize_symmetry: bool,
}

impl Default for NnConfig {
    fn default() -> Self {
        Self {
            nn_x_len: defaults::nn_x_len(),
            nn_y_len: defaults::nn_y_len(),
            max_batch_size: defaults::max_batch_size(),
            num_server_threads: defaults::num_server_threads(),
            batch_wait_micros: defaults::batch_wait_micros(),
            cache_size_power_of_two: defaults::cache_size_power_of_two(),
            mutex_pool_size_power_of_two: defaults::mutex_pool_size_power_of_two(),
            policy_temperature: defaults::policy_temperature(),
            always_include_ownership: defaults::always_include_ownership(),
            default_symmetry: defaults::default_symmetry(),
            randomize_symmetry: defaults::randomize_symmetry(),
        }
    }
}
