//! Configuration loading logic.
//!
//! Handles loading config from files and applying environment variable overrides.

use crate::CentralConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Standard locations to search for config.toml
pub const CONFIG_SEARCH_PATHS: &[&str] = &[
    "config.toml",      // Current directory
    "../config.toml",   // Parent directory (when running from subdirectory)
    "/app/config.toml", // Docker container
];

/// Errors from reading an explicit configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Load the central configuration from config.toml.
///
/// Searches for config.toml in the following order:
/// 1. Path specified by GOBAN_CONFIG environment variable
/// 2. Current directory (config.toml)
/// 3. Parent directory (../config.toml)
/// 4. Docker container path (/app/config.toml)
///
/// After loading, environment variable overrides are applied.
pub fn load_config() -> CentralConfig {
    // Check for explicit config path
    if let Ok(path) = std::env::var("GOBAN_CONFIG") {
        let path = PathBuf::from(&path);
        if path.exists() {
            info!("Loading config from GOBAN_CONFIG: {}", path.display());
            return load_from_path(&path);
        }
        warn!(
            "GOBAN_CONFIG={} not found, searching defaults",
            path.display()
        );
    }

    // Search default locations
    for path_str in CONFIG_SEARCH_PATHS {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading config from {}", path.display());
            return load_from_path(&path);
        }
    }

    // Fall back to defaults
    debug!("No config.toml found, using built-in defaults");
    apply_env_overrides(CentralConfig::default())
}

/// Load configuration from a specific path, falling back to defaults when
/// the file cannot be read or parsed.
pub fn load_from_path(path: &Path) -> CentralConfig {
    match try_load_from_path(path) {
        Ok(config) => config,
        Err(e) => {
            warn!("{}, using defaults", e);
            apply_env_overrides(CentralConfig::default())
        }
    }
}

/// Load configuration from a specific path, reporting read and parse errors.
pub fn try_load_from_path(path: &Path) -> Result<CentralConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(apply_env_overrides(config))
}

/// Macro to reduce env override boilerplate
macro_rules! env_override {
    // String field
    ($config:expr, $section:ident . $field:ident, $key:expr) => {
        if let Ok(v) = std::env::var($key) {
            $config.$section.$field = v;
        }
    };
    // Parseable field (u64, f64, bool, etc.)
    ($config:expr, $section:ident . $field:ident, $key:expr, parse) => {
        match std::env::var($key).map(|s| s.parse()) {
            Ok(Ok(v)) => $config.$section.$field = v,
            Ok(Err(_)) => warn!("Ignoring unparseable {}", $key),
            Err(_) => {}
        }
    };
}

/// Apply environment variable overrides to a configuration.
///
/// Environment variables follow the pattern: GOBAN_<SECTION>_<KEY>
pub fn apply_env_overrides(mut config: CentralConfig) -> CentralConfig {
    // Common
    env_override!(config, common.log_level, "GOBAN_COMMON_LOG_LEVEL");

    // Search
    env_override!(config, search.max_visits, "GOBAN_SEARCH_MAX_VISITS", parse);
    env_override!(config, search.max_playouts, "GOBAN_SEARCH_MAX_PLAYOUTS", parse);
    env_override!(config, search.max_time_secs, "GOBAN_SEARCH_MAX_TIME_SECS", parse);
    env_override!(config, search.num_threads, "GOBAN_SEARCH_NUM_THREADS", parse);
    env_override!(
        config,
        search.win_loss_utility_factor,
        "GOBAN_SEARCH_WIN_LOSS_UTILITY_FACTOR",
        parse
    );
    env_override!(
        config,
        search.static_score_utility_factor,
        "GOBAN_SEARCH_STATIC_SCORE_UTILITY_FACTOR",
        parse
    );
    env_override!(
        config,
        search.dynamic_score_utility_factor,
        "GOBAN_SEARCH_DYNAMIC_SCORE_UTILITY_FACTOR",
        parse
    );
    env_override!(
        config,
        search.dynamic_score_center_zero_weight,
        "GOBAN_SEARCH_DYNAMIC_SCORE_CENTER_ZERO_WEIGHT",
        parse
    );
    env_override!(
        config,
        search.no_result_utility_for_white,
        "GOBAN_SEARCH_NO_RESULT_UTILITY_FOR_WHITE",
        parse
    );
    env_override!(
        config,
        search.draw_equivalent_wins_for_white,
        "GOBAN_SEARCH_DRAW_EQUIVALENT_WINS_FOR_WHITE",
        parse
    );
    env_override!(config, search.cpuct_exploration, "GOBAN_SEARCH_CPUCT_EXPLORATION", parse);
    env_override!(
        config,
        search.cpuct_exploration_log,
        "GOBAN_SEARCH_CPUCT_EXPLORATION_LOG",
        parse
    );
    env_override!(
        config,
        search.cpuct_exploration_base,
        "GOBAN_SEARCH_CPUCT_EXPLORATION_BASE",
        parse
    );
    env_override!(config, search.fpu_reduction_max, "GOBAN_SEARCH_FPU_REDUCTION_MAX", parse);
    env_override!(
        config,
        search.root_fpu_reduction_max,
        "GOBAN_SEARCH_ROOT_FPU_REDUCTION_MAX",
        parse
    );
    env_override!(
        config,
        search.num_virtual_losses_per_thread,
        "GOBAN_SEARCH_NUM_VIRTUAL_LOSSES_PER_THREAD",
        parse
    );
    env_override!(
        config,
        search.use_lcb_for_selection,
        "GOBAN_SEARCH_USE_LCB_FOR_SELECTION",
        parse
    );
    env_override!(config, search.lcb_stdevs, "GOBAN_SEARCH_LCB_STDEVS", parse);
    env_override!(
        config,
        search.min_visit_prop_for_lcb,
        "GOBAN_SEARCH_MIN_VISIT_PROP_FOR_LCB",
        parse
    );
    env_override!(
        config,
        search.root_policy_temperature,
        "GOBAN_SEARCH_ROOT_POLICY_TEMPERATURE",
        parse
    );
    env_override!(config, search.root_noise_enabled, "GOBAN_SEARCH_ROOT_NOISE_ENABLED", parse);
    env_override!(
        config,
        search.root_dirichlet_noise_total_concentration,
        "GOBAN_SEARCH_ROOT_DIRICHLET_NOISE_TOTAL_CONCENTRATION",
        parse
    );
    env_override!(
        config,
        search.root_dirichlet_noise_weight,
        "GOBAN_SEARCH_ROOT_DIRICHLET_NOISE_WEIGHT",
        parse
    );
    env_override!(
        config,
        search.root_desired_per_child_visits_coeff,
        "GOBAN_SEARCH_ROOT_DESIRED_PER_CHILD_VISITS_COEFF",
        parse
    );
    env_override!(
        config,
        search.root_prune_useless_moves,
        "GOBAN_SEARCH_ROOT_PRUNE_USELESS_MOVES",
        parse
    );
    env_override!(
        config,
        search.root_ending_bonus_points,
        "GOBAN_SEARCH_ROOT_ENDING_BONUS_POINTS",
        parse
    );
    env_override!(
        config,
        search.chosen_move_temperature,
        "GOBAN_SEARCH_CHOSEN_MOVE_TEMPERATURE",
        parse
    );
    env_override!(
        config,
        search.chosen_move_temperature_early,
        "GOBAN_SEARCH_CHOSEN_MOVE_TEMPERATURE_EARLY",
        parse
    );
    env_override!(
        config,
        search.chosen_move_temperature_halflife,
        "GOBAN_SEARCH_CHOSEN_MOVE_TEMPERATURE_HALFLIFE",
        parse
    );

    // Inference service
    env_override!(config, nn.nn_x_len, "GOBAN_NN_NN_X_LEN", parse);
    env_override!(config, nn.nn_y_len, "GOBAN_NN_NN_Y_LEN", parse);
    env_override!(config, nn.max_batch_size, "GOBAN_NN_MAX_BATCH_SIZE", parse);
    env_override!(config, nn.num_server_threads, "GOBAN_NN_NUM_SERVER_THREADS", parse);
    env_override!(config, nn.batch_wait_micros, "GOBAN_NN_BATCH_WAIT_MICROS", parse);
    env_override!(config, nn.cache_size_power_of_two, "GOBAN_NN_CACHE_SIZE_POWER_OF_TWO", parse);
    env_override!(
        config,
        nn.mutex_pool_size_power_of_two,
        "GOBAN_NN_MUTEX_POOL_SIZE_POWER_OF_TWO",
        parse
    );
    env_override!(config, nn.policy_temperature, "GOBAN_NN_POLICY_TEMPERATURE", parse);
    env_override!(config, nn.always_include_ownership, "GOBAN_NN_ALWAYS_INCLUDE_OWNERSHIP", parse);
    env_override!(config, nn.default_symmetry, "GOBAN_NN_DEFAULT_SYMMETRY", parse);
    env_override!(config, nn.randomize_symmetry, "GOBAN_NN_RANDOMIZE_SYMMETRY", parse);

    config
}
