//! The `Position` trait implemented by rules engines.
//!
//! A position is an immutable snapshot: making a move returns a new value.
//! The search clones positions along each playout, so implementations should
//! keep them compact.

use std::fmt;

use thiserror::Error;

use crate::features::{NnInputParams, NnInputs};
use crate::types::{Loc, Player, Rules};

/// Errors raised by a rules engine when an operation is not allowed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RulesError {
    #[error("Location {0:?} is off the board")]
    OffBoard(Loc),

    #[error("Location {0:?} is already occupied")]
    Occupied(Loc),

    #[error("Move at {0:?} retakes a ko")]
    KoBanned(Loc),

    #[error("Move at {0:?} is suicide")]
    Suicide(Loc),

    #[error("The game is already over")]
    GameOver,

    #[error("Invalid board: {0}")]
    InvalidBoard(String),
}

/// Final result of a finished game.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GameOutcome {
    /// `None` for a draw.
    pub winner: Option<Player>,
    /// White's final score minus black's, komi included.
    pub white_score: f64,
}

impl GameOutcome {
    pub fn from_white_score(white_score: f64) -> Self {
        let winner = if white_score > 0.0 {
            Some(Player::White)
        } else if white_score < 0.0 {
            Some(Player::Black)
        } else {
            None
        };
        Self {
            winner,
            white_score,
        }
    }
}

/// Interface between the search and a rules engine.
///
/// Points are indexed `y * x_size() + x` wherever a per-point vector is
/// returned.
pub trait Position: Clone + Send + Sync + fmt::Debug + 'static {
    fn x_size(&self) -> usize;

    fn y_size(&self) -> usize;

    /// Player whose turn it is.
    fn next_player(&self) -> Player;

    fn rules(&self) -> &Rules;

    /// Number of moves played since the game began.
    fn ply(&self) -> usize;

    /// All legal moves for the player to move. Contains `Loc::Pass` whenever
    /// the game is not over; empty once it is.
    fn legal_moves(&self) -> Vec<Loc>;

    /// Return the position after the player to move plays `loc`.
    fn play(&self, loc: Loc) -> Result<Self, RulesError>;

    fn is_legal(&self, loc: Loc) -> bool {
        self.play(loc).is_ok()
    }

    /// True when `player` playing `loc` would leave its own chain with no
    /// liberties without capturing anything.
    fn is_suicide(&self, loc: Loc, player: Player) -> bool;

    /// For every point, the player whose pass-alive area it belongs to, if any.
    fn safe_area(&self) -> Vec<Option<Player>>;

    /// `Some` once the game has ended.
    fn outcome(&self) -> Option<GameOutcome>;

    /// Hash covering everything [`Position::fill_nn_inputs`] reads, used as
    /// the inference cache key.
    fn nn_hash(&self) -> u64;

    /// Encode this position for a net with the given spatial dimensions.
    /// The board occupies the top-left `x_size() * y_size()` corner.
    fn fill_nn_inputs(&self, params: &NnInputParams, nn_x_len: usize, nn_y_len: usize)
        -> NnInputs;

    /// Human-readable move text.
    fn loc_to_string(&self, loc: Loc) -> String {
        loc.to_gtp(self.y_size())
    }
}
