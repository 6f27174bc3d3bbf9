//! Core types and traits at the boundary between the search and a rules engine
//!
//! This crate provides the fundamental abstractions the search is written against:
//! - `Player`, `Loc`, `Rules`: small value types shared by every crate
//! - `Position`: the narrow interface a rules engine implements (legal moves,
//!   successor positions, pass-alive areas, terminal outcome, hashing)
//! - `NnInputs`: the feature layout handed to the inference service
//!
//! The search never inspects board internals; everything it needs flows
//! through `Position`.

pub mod features;
pub mod position;
pub mod types;

// Re-export main types for convenience
pub use features::{NnInputParams, NnInputs, NUM_GLOBAL_FEATURES, NUM_SPATIAL_FEATURES};
pub use position::{GameOutcome, Position, RulesError};
pub use types::{Loc, Player, Rules, ScoringRule};
