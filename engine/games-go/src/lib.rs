//! Go rules implementation for the goban search engine
//!
//! This crate provides a compact reference implementation of the
//! [`engine_core::Position`] trait: captures, simple ko, configurable
//! multi-stone suicide, area or territory scoring, Benson pass-alive analysis
//! and the neural-net feature encoder.
//!
//! # Usage
//!
//! ```rust
//! use engine_core::{Loc, Position, Rules};
//! use games_go::Board;
//!
//! let board = Board::parse(Rules::tromp_taylor(), "
//!     .....
//!     ..x..
//!     .....
//!     ..o..
//!     .....
//! ").expect("valid board");
//!
//! let next = board.play(Loc::point(1, 1)).expect("legal move");
//! assert_eq!(next.ply(), 1);
//! ```

mod area;

use std::fmt;

use engine_core::features::{global, spatial};
use engine_core::{
    GameOutcome, Loc, NnInputParams, NnInputs, Player, Position, Rules, RulesError, ScoringRule,
};
use once_cell::sync::Lazy;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Largest supported board edge.
pub const MAX_BOARD_LEN: usize = 19;

const MAX_AREA: usize = MAX_BOARD_LEN * MAX_BOARD_LEN;

/// Random keys for incremental position hashing.
struct Zobrist {
    stones: [[u64; MAX_AREA]; 2],
    ko: [u64; MAX_AREA],
    last_move: [u64; MAX_AREA + 1],
    white_to_move: u64,
    passes: [u64; 3],
    size: [[u64; MAX_BOARD_LEN + 1]; 2],
}

static ZOBRIST: Lazy<Zobrist> = Lazy::new(|| {
    let mut rng = ChaCha8Rng::seed_from_u64(0x676f_6261_6e5f_7a6f);
    let mut table = Zobrist {
        stones: [[0; MAX_AREA]; 2],
        ko: [0; MAX_AREA],
        last_move: [0; MAX_AREA + 1],
        white_to_move: rng.gen(),
        passes: [0; 3],
        size: [[0; MAX_BOARD_LEN + 1]; 2],
    };
    for plane in table.stones.iter_mut() {
        plane.iter_mut().for_each(|k| *k = rng.gen());
    }
    table.ko.iter_mut().for_each(|k| *k = rng.gen());
    table.last_move.iter_mut().for_each(|k| *k = rng.gen());
    table.passes.iter_mut().for_each(|k| *k = rng.gen());
    for axis in table.size.iter_mut() {
        axis.iter_mut().for_each(|k| *k = rng.gen());
    }
    table
});

#[inline]
fn player_index(p: Player) -> usize {
    match p {
        Player::Black => 0,
        Player::White => 1,
    }
}

/// splitmix64 finalizer, used to fold rule parameters into the hash.
#[inline]
fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// A Go position with enough history to apply ko and end-of-game rules.
#[derive(Clone, PartialEq)]
pub struct Board {
    x_size: usize,
    y_size: usize,
    stones: Vec<Option<Player>>,
    next_player: Player,
    rules: Rules,
    /// Point the player to move may not play because it would retake a ko.
    ko_point: Option<usize>,
    consecutive_passes: u8,
    ply: usize,
    last_move: Option<Loc>,
    /// Prisoners taken by black and white.
    captures: [u32; 2],
    stone_hash: u64,
}

impl Board {
    /// An empty board with black to move.
    pub fn new(x_size: usize, y_size: usize, rules: Rules) -> Result<Self, RulesError> {
        if x_size == 0 || y_size == 0 || x_size > MAX_BOARD_LEN || y_size > MAX_BOARD_LEN {
            return Err(RulesError::InvalidBoard(format!(
                "board size {}x{} not in 1..={}",
                x_size, y_size, MAX_BOARD_LEN
            )));
        }
        Ok(Self {
            x_size,
            y_size,
            stones: vec![None; x_size * y_size],
            next_player: Player::Black,
            rules,
            ko_point: None,
            consecutive_passes: 0,
            ply: 0,
            last_move: None,
            captures: [0, 0],
            stone_hash: 0,
        })
    }

    /// Parse a board from rows of `x` (black), `o` (white) and `.` (empty).
    /// Blank lines and spaces are ignored. Black is to move.
    pub fn parse(rules: Rules, text: &str) -> Result<Self, RulesError> {
        let rows: Vec<Vec<char>> = text
            .lines()
            .map(|line| line.chars().filter(|c| !c.is_whitespace()).collect::<Vec<_>>())
            .filter(|row| !row.is_empty())
            .collect();
        let y_size = rows.len();
        let x_size = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut board = Board::new(x_size, y_size, rules)?;

        for (y, row) in rows.iter().enumerate() {
            if row.len() != x_size {
                return Err(RulesError::InvalidBoard(format!(
                    "row {} has {} points, expected {}",
                    y,
                    row.len(),
                    x_size
                )));
            }
            for (x, c) in row.iter().enumerate() {
                let stone = match c {
                    'x' | 'X' => Some(Player::Black),
                    'o' | 'O' => Some(Player::White),
                    '.' | '+' => None,
                    other => {
                        return Err(RulesError::InvalidBoard(format!(
                            "unexpected character {:?}",
                            other
                        )))
                    }
                };
                if let Some(p) = stone {
                    board.set_stone(y * x_size + x, Some(p));
                }
            }
        }

        for idx in 0..board.stones.len() {
            if board.stones[idx].is_some() && board.chain_liberties(idx) == 0 {
                return Err(RulesError::InvalidBoard(format!(
                    "chain at {} has no liberties",
                    board.idx_to_loc(idx).to_gtp(y_size)
                )));
            }
        }
        Ok(board)
    }

    /// Same position with a different player to move. Clears any ko ban.
    pub fn with_next_player(mut self, player: Player) -> Self {
        self.next_player = player;
        self.ko_point = None;
        self
    }

    pub fn stone_at(&self, x: usize, y: usize) -> Option<Player> {
        self.stones[y * self.x_size + x]
    }

    /// Prisoners captured by `player` so far.
    pub fn captures_by(&self, player: Player) -> u32 {
        self.captures[player_index(player)]
    }

    pub fn ko_point(&self) -> Option<Loc> {
        self.ko_point.map(|idx| self.idx_to_loc(idx))
    }

    pub fn last_move(&self) -> Option<Loc> {
        self.last_move
    }

    pub fn consecutive_passes(&self) -> u8 {
        self.consecutive_passes
    }

    #[inline]
    fn idx_to_loc(&self, idx: usize) -> Loc {
        Loc::point(idx % self.x_size, idx / self.x_size)
    }

    fn loc_to_idx(&self, loc: Loc) -> Result<usize, RulesError> {
        match loc {
            Loc::Point { x, y } if (x as usize) < self.x_size && (y as usize) < self.y_size => {
                Ok(y as usize * self.x_size + x as usize)
            }
            _ => Err(RulesError::OffBoard(loc)),
        }
    }

    /// Orthogonal neighbors of a point.
    fn neighbors(&self, idx: usize) -> impl Iterator<Item = usize> {
        let (x, y) = (idx % self.x_size, idx / self.x_size);
        let (w, h) = (self.x_size, self.y_size);
        [
            (x > 0).then(|| idx - 1),
            (x + 1 < w).then(|| idx + 1),
            (y > 0).then(|| idx - w),
            (y + 1 < h).then(|| idx + w),
        ]
        .into_iter()
        .flatten()
    }

    fn set_stone(&mut self, idx: usize, stone: Option<Player>) {
        if let Some(old) = self.stones[idx] {
            self.stone_hash ^= ZOBRIST.stones[player_index(old)][idx];
        }
        if let Some(new) = stone {
            self.stone_hash ^= ZOBRIST.stones[player_index(new)][idx];
        }
        self.stones[idx] = stone;
    }

    /// Points of the chain containing `idx` and its number of liberties.
    fn chain(&self, idx: usize) -> (Vec<usize>, usize) {
        let Some(color) = self.stones[idx] else {
            return (Vec::new(), 0);
        };
        let mut seen = vec![false; self.stones.len()];
        let mut liberty_seen = vec![false; self.stones.len()];
        let mut stack = vec![idx];
        let mut points = Vec::new();
        let mut liberties = 0;
        seen[idx] = true;

        while let Some(p) = stack.pop() {
            points.push(p);
            for n in self.neighbors(p) {
                match self.stones[n] {
                    None if !liberty_seen[n] => {
                        liberty_seen[n] = true;
                        liberties += 1;
                    }
                    Some(c) if c == color && !seen[n] => {
                        seen[n] = true;
                        stack.push(n);
                    }
                    _ => {}
                }
            }
        }
        (points, liberties)
    }

    fn chain_liberties(&self, idx: usize) -> usize {
        self.chain(idx).1
    }

    /// Whether playing at empty `idx` captures at least one opposing chain.
    fn would_capture(&self, idx: usize, player: Player) -> bool {
        self.neighbors(idx)
            .any(|n| self.stones[n] == Some(player.opp()) && self.chain_liberties(n) == 1)
    }

    fn suicide_at(&self, idx: usize, player: Player) -> bool {
        if self.would_capture(idx, player) {
            return false;
        }
        for n in self.neighbors(idx) {
            match self.stones[n] {
                None => return false,
                Some(c) if c == player && self.chain_liberties(n) > 1 => return false,
                _ => {}
            }
        }
        true
    }

    /// Legality of a point move for the player to move, without building
    /// the successor.
    fn point_is_legal(&self, idx: usize) -> bool {
        if self.stones[idx].is_some() || self.ko_point == Some(idx) {
            return false;
        }
        if !self.suicide_at(idx, self.next_player) {
            return true;
        }
        // Suicide is only ever legal when it takes an existing chain with it.
        self.rules.multi_stone_suicide_legal
            && self
                .neighbors(idx)
                .any(|n| self.stones[n] == Some(self.next_player))
    }

    fn play_point(&self, idx: usize) -> Result<Board, RulesError> {
        let loc = self.idx_to_loc(idx);
        if self.stones[idx].is_some() {
            return Err(RulesError::Occupied(loc));
        }
        if self.ko_point == Some(idx) {
            return Err(RulesError::KoBanned(loc));
        }

        let player = self.next_player;
        let mut next = self.clone();
        next.set_stone(idx, Some(player));

        let mut captured: Vec<usize> = Vec::new();
        let neighbors: Vec<usize> = next.neighbors(idx).collect();
        for n in neighbors {
            if next.stones[n] == Some(player.opp()) {
                let (points, liberties) = next.chain(n);
                if liberties == 0 {
                    for p in points {
                        next.set_stone(p, None);
                        captured.push(p);
                    }
                }
            }
        }

        let (own_chain, own_liberties) = next.chain(idx);
        next.ko_point = None;
        if own_liberties == 0 {
            if own_chain.len() == 1 || !self.rules.multi_stone_suicide_legal {
                return Err(RulesError::Suicide(loc));
            }
            for &p in &own_chain {
                next.set_stone(p, None);
            }
            next.captures[player_index(player.opp())] += own_chain.len() as u32;
        } else {
            next.captures[player_index(player)] += captured.len() as u32;
            if captured.len() == 1 && own_chain.len() == 1 && own_liberties == 1 {
                next.ko_point = Some(captured[0]);
            }
        }

        next.next_player = player.opp();
        next.consecutive_passes = 0;
        next.ply += 1;
        next.last_move = Some(loc);
        Ok(next)
    }

    /// Area or territory score, white minus black, including komi.
    pub fn final_white_score(&self) -> f64 {
        let counts = area::score_counts(self);
        let (black, white) = match self.rules.scoring {
            ScoringRule::Area => (
                counts.black_stones + counts.black_territory,
                counts.white_stones + counts.white_territory,
            ),
            ScoringRule::Territory => (
                counts.black_territory + self.captures[0] as usize,
                counts.white_territory + self.captures[1] as usize,
            ),
        };
        white as f64 - black as f64 + self.rules.komi as f64
    }

    fn rules_hash(&self) -> u64 {
        let scoring = match self.rules.scoring {
            ScoringRule::Area => 1u64,
            ScoringRule::Territory => 2u64,
        };
        mix64(
            (self.rules.komi.to_bits() as u64) << 8
                | scoring << 1
                | self.rules.multi_stone_suicide_legal as u64,
        )
    }
}

impl Position for Board {
    fn x_size(&self) -> usize {
        self.x_size
    }

    fn y_size(&self) -> usize {
        self.y_size
    }

    fn next_player(&self) -> Player {
        self.next_player
    }

    fn rules(&self) -> &Rules {
        &self.rules
    }

    fn ply(&self) -> usize {
        self.ply
    }

    fn legal_moves(&self) -> Vec<Loc> {
        if self.outcome().is_some() {
            return Vec::new();
        }
        let mut moves: Vec<Loc> = (0..self.stones.len())
            .filter(|&idx| self.point_is_legal(idx))
            .map(|idx| self.idx_to_loc(idx))
            .collect();
        moves.push(Loc::Pass);
        moves
    }

    fn play(&self, loc: Loc) -> Result<Self, RulesError> {
        if self.outcome().is_some() {
            return Err(RulesError::GameOver);
        }
        match loc {
            Loc::Pass => {
                let mut next = self.clone();
                next.next_player = self.next_player.opp();
                next.ko_point = None;
                next.consecutive_passes = self.consecutive_passes.saturating_add(1);
                next.ply += 1;
                next.last_move = Some(Loc::Pass);
                Ok(next)
            }
            Loc::Point { .. } => {
                let idx = self.loc_to_idx(loc)?;
                self.play_point(idx)
            }
        }
    }

    fn is_legal(&self, loc: Loc) -> bool {
        if self.outcome().is_some() {
            return false;
        }
        match loc {
            Loc::Pass => true,
            Loc::Point { .. } => self
                .loc_to_idx(loc)
                .map(|idx| self.point_is_legal(idx))
                .unwrap_or(false),
        }
    }

    fn is_suicide(&self, loc: Loc, player: Player) -> bool {
        match self.loc_to_idx(loc) {
            Ok(idx) => self.stones[idx].is_none() && self.suicide_at(idx, player),
            Err(_) => false,
        }
    }

    fn safe_area(&self) -> Vec<Option<Player>> {
        area::pass_alive_area(self)
    }

    fn outcome(&self) -> Option<GameOutcome> {
        (self.consecutive_passes >= 2)
            .then(|| GameOutcome::from_white_score(self.final_white_score()))
    }

    fn nn_hash(&self) -> u64 {
        let z = &*ZOBRIST;
        let mut h = self.stone_hash;
        if self.next_player == Player::White {
            h ^= z.white_to_move;
        }
        if let Some(ko) = self.ko_point {
            h ^= z.ko[ko];
        }
        h ^= z.passes[self.consecutive_passes.min(2) as usize];
        if let Some(last) = self.last_move {
            h ^= z.last_move[match last {
                Loc::Pass => MAX_AREA,
                Loc::Point { .. } => self.loc_to_idx(last).unwrap_or(MAX_AREA),
            }];
        }
        h ^= z.size[0][self.x_size] ^ z.size[1][self.y_size];
        h ^ self.rules_hash()
    }

    fn fill_nn_inputs(
        &self,
        params: &NnInputParams,
        nn_x_len: usize,
        nn_y_len: usize,
    ) -> NnInputs {
        let mut inputs = NnInputs::new(nn_x_len, nn_y_len);
        let pla = params.next_player;

        for y in 0..self.y_size {
            for x in 0..self.x_size {
                inputs.set_spatial(spatial::ON_BOARD, x, y, 1.0);
                let idx = y * self.x_size + x;
                if let Some(stone) = self.stones[idx] {
                    let plane = if stone == pla {
                        spatial::OWN_STONES
                    } else {
                        spatial::OPP_STONES
                    };
                    inputs.set_spatial(plane, x, y, 1.0);
                    match self.chain_liberties(idx) {
                        1 => inputs.set_spatial(spatial::LIBERTIES_1, x, y, 1.0),
                        2 => inputs.set_spatial(spatial::LIBERTIES_2, x, y, 1.0),
                        3 => inputs.set_spatial(spatial::LIBERTIES_3, x, y, 1.0),
                        _ => {}
                    }
                }
            }
        }

        if pla == self.next_player {
            if let Some(ko) = self.ko_point {
                inputs.set_spatial(spatial::KO_BAN, ko % self.x_size, ko / self.x_size, 1.0);
            }
        }
        if let Some(Loc::Point { x, y }) = self.last_move {
            inputs.set_spatial(spatial::LAST_MOVE, x as usize, y as usize, 1.0);
        }

        let sign = pla.white_sign();
        inputs.global[global::KOMI] = (sign * self.rules.komi as f64 / 20.0) as f32;
        inputs.global[global::AREA_SCORING] =
            (self.rules.scoring == ScoringRule::Area) as u8 as f32;
        inputs.global[global::SUICIDE_LEGAL] = self.rules.multi_stone_suicide_legal as u8 as f32;
        inputs.global[global::LAST_MOVE_PASS] = (self.last_move == Some(Loc::Pass)) as u8 as f32;
        inputs.global[global::DRAW_EQUIVALENCE] =
            (sign * (params.draw_equivalent_wins_for_white - 0.5)) as f32;

        for loc in self.legal_moves() {
            inputs.legal[loc.policy_index(nn_x_len, nn_y_len)] = true;
        }
        inputs
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in 0..self.y_size {
            for x in 0..self.x_size {
                let c = match self.stone_at(x, y) {
                    Some(Player::Black) => 'x',
                    Some(Player::White) => 'o',
                    None => '.',
                };
                write!(f, "{}", c)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Board {}x{} next={} ply={} passes={}",
            self.x_size, self.y_size, self.next_player, self.ply, self.consecutive_passes
        )?;
        write!(f, "{}", self)
    }
}

#[cfg(test)]
mod tests;
