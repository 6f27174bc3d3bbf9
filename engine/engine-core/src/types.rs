//! Value types shared by the rules engine, the inference service and the search.

use std::fmt;

/// One of the two sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Player {
    Black,
    White,
}

impl Player {
    /// The other side.
    #[inline]
    pub fn opp(self) -> Player {
        match self {
            Player::Black => Player::White,
            Player::White => Player::Black,
        }
    }

    /// +1.0 for white, -1.0 for black. Multiplying a white-perspective value
    /// by this converts it to this player's perspective.
    #[inline]
    pub fn white_sign(self) -> f64 {
        match self {
            Player::White => 1.0,
            Player::Black => -1.0,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Player::Black => 'B',
            Player::White => 'W',
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Player::Black => write!(f, "Black"),
            Player::White => write!(f, "White"),
        }
    }
}

/// A move location: a point on the board or a pass.
///
/// Coordinates are zero-based with `y = 0` at the top row, matching the
/// order boards are written in text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Loc {
    Point { x: u8, y: u8 },
    Pass,
}

/// Letters used for GTP columns (no `I`).
const COLUMN_LETTERS: &[u8] = b"ABCDEFGHJKLMNOPQRSTUVWXYZ";

impl Loc {
    pub fn point(x: usize, y: usize) -> Loc {
        Loc::Point {
            x: x as u8,
            y: y as u8,
        }
    }

    #[inline]
    pub fn is_pass(self) -> bool {
        matches!(self, Loc::Pass)
    }

    /// Position of this move in a policy vector for a net of the given
    /// dimensions. Pass is the last slot.
    #[inline]
    pub fn policy_index(self, nn_x_len: usize, nn_y_len: usize) -> usize {
        match self {
            Loc::Point { x, y } => y as usize * nn_x_len + x as usize,
            Loc::Pass => nn_x_len * nn_y_len,
        }
    }

    /// Inverse of [`Loc::policy_index`].
    pub fn from_policy_index(pos: usize, nn_x_len: usize, nn_y_len: usize) -> Loc {
        if pos >= nn_x_len * nn_y_len {
            Loc::Pass
        } else {
            Loc::point(pos % nn_x_len, pos / nn_x_len)
        }
    }

    /// GTP-style text, e.g. `C3` or `pass`. Rows count up from the bottom.
    pub fn to_gtp(self, y_size: usize) -> String {
        match self {
            Loc::Pass => "pass".to_string(),
            Loc::Point { x, y } => {
                let col = COLUMN_LETTERS
                    .get(x as usize)
                    .map(|&c| c as char)
                    .unwrap_or('?');
                format!("{}{}", col, y_size - y as usize)
            }
        }
    }

    /// Parse GTP-style text. Returns `None` for malformed or off-board input.
    pub fn parse_gtp(s: &str, x_size: usize, y_size: usize) -> Option<Loc> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("pass") {
            return Some(Loc::Pass);
        }
        let mut chars = s.chars();
        let col = chars.next()?.to_ascii_uppercase();
        let x = COLUMN_LETTERS.iter().position(|&c| c as char == col)?;
        let row: usize = chars.as_str().parse().ok()?;
        if x >= x_size || row == 0 || row > y_size {
            return None;
        }
        Some(Loc::point(x, y_size - row))
    }
}

/// How the final score is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoringRule {
    /// Stones plus surrounded empty points.
    Area,
    /// Surrounded empty points plus prisoners.
    Territory,
}

/// Rule parameters that influence legality, scoring and the net inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct Rules {
    pub komi: f32,
    pub scoring: ScoringRule,
    /// Whether a move that removes its own chain of two or more stones is legal.
    /// Single-stone suicide is never legal.
    pub multi_stone_suicide_legal: bool,
}

impl Rules {
    /// Area scoring with multi-stone suicide allowed, komi 7.5.
    pub fn tromp_taylor() -> Self {
        Self {
            komi: 7.5,
            scoring: ScoringRule::Area,
            multi_stone_suicide_legal: true,
        }
    }

    /// Territory scoring without suicide, komi 6.5.
    pub fn simple_territory() -> Self {
        Self {
            komi: 6.5,
            scoring: ScoringRule::Territory,
            multi_stone_suicide_legal: false,
        }
    }

    pub fn with_komi(mut self, komi: f32) -> Self {
        self.komi = komi;
        self
    }
}

impl Default for Rules {
    fn default() -> Self {
        Self::tromp_taylor()
    }
}
