//! Parallel Monte Carlo tree search for Go-like board games.
//!
//! This crate grows a statistics tree over move sequences from a root
//! position, guided by policy and value estimates from an
//! [`nn_eval::NnEvaluator`], and picks a move under a visit, playout or time
//! budget. It works with any rules engine implementing
//! [`engine_core::Position`].
//!
//! # Overview
//!
//! Each playout:
//!
//! 1. **Selection**: descend from the root by PUCT, treating moves without a
//!    node yet through first-play urgency
//! 2. **Expansion**: create the chosen child, exactly once per move
//! 3. **Evaluation**: score the new leaf with the inference service, or
//!    exactly if the game is over
//! 4. **Backup**: add the leaf's value to every node on the path
//!
//! Playouts run on scoped worker threads that share the tree. Virtual losses
//! spread them over different lines and a node being evaluated by one worker
//! makes the others wait instead of evaluating it twice.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use engine_core::Rules;
//! use games_go::Board;
//! use mcts::{Bot, SearchParams};
//! use nn_eval::{NnEvalOptions, NnEvaluator, SymmetryPolicy, UniformBackend};
//!
//! let nn_eval = NnEvaluator::new(Arc::new(UniformBackend::new()), NnEvalOptions::for_testing())?;
//! nn_eval.spawn_server_threads(1, SymmetryPolicy::Fixed(0), 42)?;
//!
//! let bot = Bot::new(SearchParams::for_testing(), Arc::new(nn_eval), 42)?;
//! bot.set_position(Board::new(9, 9, Rules::tromp_taylor())?)?;
//! let mv = bot.gen_move_synchronous(None)?;
//! bot.make_move(mv)?;
//! ```
//!
//! # Values
//!
//! All statistics are stored from white's perspective and flipped to the
//! player to move during selection. A node's utility combines its win/loss
//! average with saturating score terms (see [`utility`]).
//!
//! # Tree reuse
//!
//! [`Search::make_move`] keeps the subtree under the played move and drops
//! the rest. The next [`Search::begin_search`] re-evaluates the new root with
//! ownership if needed and re-applies root pruning.

pub mod analysis;
pub mod bot;
pub mod config;
pub mod node;
mod playout;
pub mod search;
pub mod tree;
pub mod utility;

// Re-export main types for convenience
pub use analysis::{Perspective, PrintTreeOptions};
pub use bot::Bot;
pub use config::SearchParams;
pub use node::{NodeId, NodeStats};
pub use search::{Search, SearchError, SearchStats};
