//! Centralized configuration loading from config.toml.
//!
//! This crate provides configuration structs and loading logic shared by the
//! search engine (`[search]`) and the inference service (`[nn]`).
//!
//! # Configuration Priority
//!
//! Settings are loaded with the following priority (highest to lowest):
//! 1. Environment variables (`GOBAN_<SECTION>_<KEY>`)
//! 2. config.toml file
//! 3. Built-in defaults (config.defaults.toml, embedded at compile time)
//!
//! # Environment Variable Override Pattern
//!
//! ```text
//! GOBAN_<SECTION>_<KEY>=value
//!
//! Examples:
//!     GOBAN_COMMON_LOG_LEVEL=debug
//!     GOBAN_SEARCH_MAX_VISITS=1600
//!     GOBAN_SEARCH_NUM_THREADS=8
//!     GOBAN_NN_MAX_BATCH_SIZE=32
//!     GOBAN_NN_RANDOMIZE_SYMMETRY=true
//! ```

mod defaults;
mod loader;
mod structs;

pub use defaults::*;
pub use loader::{
    apply_env_overrides, load_config, load_from_path, try_load_from_path, ConfigError,
    CONFIG_SEARCH_PATHS,
};
pub use structs::*;
