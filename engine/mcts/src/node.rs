//! Search tree node representation.
//!
//! Nodes are shared between playout threads, so every mutable field is
//! either atomic or behind a lock. A node does not store its position;
//! playouts replay moves from the root position instead.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use engine_core::{GameOutcome, Loc, Player};
use nn_eval::NnOutput;

/// Index into the node arena. Using a newtype for type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Evaluation progress of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeState {
    Unvisited = 0,
    /// One thread owns the evaluation; others wait instead of duplicating it.
    InFlight = 1,
    Evaluated = 2,
}

impl NodeState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => NodeState::InFlight,
            2 => NodeState::Evaluated,
            _ => NodeState::Unvisited,
        }
    }
}

/// What a node was evaluated as.
#[derive(Debug, Clone)]
pub enum Evaluation {
    Net(Arc<NnOutput>),
    Terminal(GameOutcome),
}

/// One leaf value, from white's perspective.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ValueSample {
    /// Win probability minus loss probability, in `[-1, 1]`.
    pub win_loss: f64,
    pub no_result: f64,
    pub score_mean: f64,
    pub score_mean_sq: f64,
    pub lead: f64,
}

impl ValueSample {
    pub fn from_output(out: &NnOutput) -> Self {
        Self {
            win_loss: out.white_win_prob as f64 - out.white_loss_prob as f64,
            no_result: out.white_no_result_prob as f64,
            score_mean: out.white_score_mean as f64,
            score_mean_sq: out.white_score_mean_sq as f64,
            lead: out.white_lead as f64,
        }
    }

    /// Exact value of a finished game. A draw is worth
    /// `draw_equivalent_wins_for_white` wins to white.
    pub fn from_outcome(outcome: &GameOutcome, draw_equivalent_wins_for_white: f64) -> Self {
        let win_loss = match outcome.winner {
            Some(Player::White) => 1.0,
            Some(Player::Black) => -1.0,
            None => 2.0 * draw_equivalent_wins_for_white - 1.0,
        };
        Self {
            win_loss,
            no_result: 0.0,
            score_mean: outcome.white_score,
            score_mean_sq: outcome.white_score * outcome.white_score,
            lead: outcome.white_score,
        }
    }

    pub fn from_evaluation(eval: &Evaluation, draw_equivalent_wins_for_white: f64) -> Self {
        match eval {
            Evaluation::Net(out) => Self::from_output(out),
            Evaluation::Terminal(outcome) => {
                Self::from_outcome(outcome, draw_equivalent_wins_for_white)
            }
        }
    }
}

/// Snapshot of a node's accumulated statistics. All sums are white's
/// perspective.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NodeStats {
    pub visits: u64,
    pub win_loss_sum: f64,
    pub win_loss_sq_sum: f64,
    pub no_result_sum: f64,
    pub score_mean_sum: f64,
    pub score_mean_sq_sum: f64,
    pub lead_sum: f64,
}

impl NodeStats {
    pub fn from_sample(sample: &ValueSample) -> Self {
        let mut stats = Self::default();
        stats.add(sample);
        stats
    }

    pub fn add(&mut self, s: &ValueSample) {
        self.visits += 1;
        self.win_loss_sum += s.win_loss;
        self.win_loss_sq_sum += s.win_loss * s.win_loss;
        self.no_result_sum += s.no_result;
        self.score_mean_sum += s.score_mean;
        self.score_mean_sq_sum += s.score_mean_sq;
        self.lead_sum += s.lead;
    }

    pub fn merge(&mut self, other: &NodeStats) {
        self.visits += other.visits;
        self.win_loss_sum += other.win_loss_sum;
        self.win_loss_sq_sum += other.win_loss_sq_sum;
        self.no_result_sum += other.no_result_sum;
        self.score_mean_sum += other.score_mean_sum;
        self.score_mean_sq_sum += other.score_mean_sq_sum;
        self.lead_sum += other.lead_sum;
    }

    #[inline]
    fn avg(&self, sum: f64) -> f64 {
        if self.visits == 0 {
            0.0
        } else {
            sum / self.visits as f64
        }
    }

    pub fn win_loss_avg(&self) -> f64 {
        self.avg(self.win_loss_sum)
    }

    pub fn win_loss_sq_avg(&self) -> f64 {
        self.avg(self.win_loss_sq_sum)
    }

    pub fn no_result_avg(&self) -> f64 {
        self.avg(self.no_result_sum)
    }

    pub fn score_mean_avg(&self) -> f64 {
        self.avg(self.score_mean_sum)
    }

    pub fn score_mean_sq_avg(&self) -> f64 {
        self.avg(self.score_mean_sq_sum)
    }

    pub fn lead_avg(&self) -> f64 {
        self.avg(self.lead_sum)
    }
}

/// An `f64` stored as bits so it can live in an atomic.
#[derive(Debug, Default)]
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn new(v: f64) -> Self {
        Self(AtomicU64::new(v.to_bits()))
    }

    #[inline]
    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    #[inline]
    fn store(&self, v: f64) {
        self.0.store(v.to_bits(), Ordering::Release)
    }
}

/// A node in the search tree.
#[derive(Debug)]
pub struct Node {
    /// Move that led here from the parent. `None` only for the root.
    pub prev_move: Option<Loc>,

    /// Non-owning back reference, `None` for the root.
    pub parent: Option<NodeId>,

    /// Player to move at this node.
    pub next_player: Player,

    state: AtomicU8,
    evaluation: OnceLock<Evaluation>,
    children: RwLock<Vec<NodeId>>,

    // Read lock-free; written only under the tree's stat lock for this node.
    visits: AtomicU64,
    win_loss_sum: AtomicF64,
    win_loss_sq_sum: AtomicF64,
    no_result_sum: AtomicF64,
    score_mean_sum: AtomicF64,
    score_mean_sq_sum: AtomicF64,
    lead_sum: AtomicF64,

    virtual_losses: AtomicU32,
}

impl Node {
    pub fn new(prev_move: Option<Loc>, parent: Option<NodeId>, next_player: Player) -> Self {
        Self {
            prev_move,
            parent,
            next_player,
            state: AtomicU8::new(NodeState::Unvisited as u8),
            evaluation: OnceLock::new(),
            children: RwLock::new(Vec::new()),
            visits: AtomicU64::new(0),
            win_loss_sum: AtomicF64::default(),
            win_loss_sq_sum: AtomicF64::default(),
            no_result_sum: AtomicF64::default(),
            score_mean_sum: AtomicF64::default(),
            score_mean_sq_sum: AtomicF64::default(),
            lead_sum: AtomicF64::default(),
            virtual_losses: AtomicU32::new(0),
        }
    }

    /// Copy of this node with a new parent link and no children, for moving
    /// a subtree into a fresh arena.
    pub(crate) fn detached_copy(&self, parent: Option<NodeId>) -> Self {
        let stats = self.stats();
        let evaluation = OnceLock::new();
        let state = match self.evaluation.get() {
            Some(eval) => {
                let _ = evaluation.set(eval.clone());
                NodeState::Evaluated
            }
            None => NodeState::Unvisited,
        };
        Self {
            prev_move: self.prev_move,
            parent,
            next_player: self.next_player,
            state: AtomicU8::new(state as u8),
            evaluation,
            children: RwLock::new(Vec::new()),
            visits: AtomicU64::new(stats.visits),
            win_loss_sum: AtomicF64::new(stats.win_loss_sum),
            win_loss_sq_sum: AtomicF64::new(stats.win_loss_sq_sum),
            no_result_sum: AtomicF64::new(stats.no_result_sum),
            score_mean_sum: AtomicF64::new(stats.score_mean_sum),
            score_mean_sq_sum: AtomicF64::new(stats.score_mean_sq_sum),
            lead_sum: AtomicF64::new(stats.lead_sum),
            virtual_losses: AtomicU32::new(0),
        }
    }

    #[inline]
    pub fn state(&self) -> NodeState {
        NodeState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Claim the evaluation of an unvisited node. Only one caller wins.
    pub(crate) fn try_begin_eval(&self) -> bool {
        self.state
            .compare_exchange(
                NodeState::Unvisited as u8,
                NodeState::InFlight as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Store the evaluation. Does not publish it; see [`Node::mark_evaluated`].
    pub(crate) fn set_evaluation(&self, eval: Evaluation) {
        let _ = self.evaluation.set(eval);
    }

    pub(crate) fn mark_evaluated(&self) {
        self.state
            .store(NodeState::Evaluated as u8, Ordering::Release);
    }

    /// Give up an in-flight evaluation so a later playout can retry.
    pub(crate) fn abort_eval(&self) {
        self.state
            .store(NodeState::Unvisited as u8, Ordering::Release);
    }

    /// Swap in a new evaluation. Requires exclusive access.
    pub(crate) fn replace_evaluation(&mut self, eval: Evaluation) {
        self.evaluation = OnceLock::from(eval);
        *self.state.get_mut() = NodeState::Evaluated as u8;
    }

    pub fn evaluation(&self) -> Option<&Evaluation> {
        self.evaluation.get()
    }

    pub fn nn_output(&self) -> Option<&Arc<NnOutput>> {
        match self.evaluation.get() {
            Some(Evaluation::Net(out)) => Some(out),
            _ => None,
        }
    }

    pub fn terminal_outcome(&self) -> Option<&GameOutcome> {
        match self.evaluation.get() {
            Some(Evaluation::Terminal(outcome)) => Some(outcome),
            _ => None,
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.terminal_outcome().is_some()
    }

    pub fn children(&self) -> RwLockReadGuard<'_, Vec<NodeId>> {
        self.children.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn children_mut(&self) -> RwLockWriteGuard<'_, Vec<NodeId>> {
        self.children.write().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    pub fn visits(&self) -> u64 {
        self.visits.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> NodeStats {
        NodeStats {
            visits: self.visits(),
            win_loss_sum: self.win_loss_sum.load(),
            win_loss_sq_sum: self.win_loss_sq_sum.load(),
            no_result_sum: self.no_result_sum.load(),
            score_mean_sum: self.score_mean_sum.load(),
            score_mean_sq_sum: self.score_mean_sq_sum.load(),
            lead_sum: self.lead_sum.load(),
        }
    }

    /// Overwrite the statistics. Callers serialize writers through the
    /// tree's stat lock for this node.
    pub(crate) fn store_stats(&self, stats: &NodeStats) {
        self.win_loss_sum.store(stats.win_loss_sum);
        self.win_loss_sq_sum.store(stats.win_loss_sq_sum);
        self.no_result_sum.store(stats.no_result_sum);
        self.score_mean_sum.store(stats.score_mean_sum);
        self.score_mean_sq_sum.store(stats.score_mean_sq_sum);
        self.lead_sum.store(stats.lead_sum);
        // Visits last so a reader that sees the new count sees the new sums
        self.visits.store(stats.visits, Ordering::Release);
    }

    /// Add one sample. Same locking rule as [`Node::store_stats`].
    pub(crate) fn add_sample(&self, sample: &ValueSample) {
        let mut stats = self.stats();
        stats.add(sample);
        self.store_stats(&stats);
    }

    #[inline]
    pub fn virtual_losses(&self) -> u32 {
        self.virtual_losses.load(Ordering::Acquire)
    }

    pub(crate) fn add_virtual_losses(&self, n: u32) {
        self.virtual_losses.fetch_add(n, Ordering::AcqRel);
    }

    pub(crate) fn remove_virtual_losses(&self, n: u32) {
        self.virtual_losses.fetch_sub(n, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(win_loss: f64, score: f64) -> ValueSample {
        ValueSample {
            win_loss,
            no_result: 0.0,
            score_mean: score,
            score_mean_sq: score * score + 1.0,
            lead: score,
        }
    }

    #[test]
    fn test_new_node_is_unvisited() {
        let node = Node::new(None, None, Player::Black);
        assert_eq!(node.state(), NodeState::Unvisited);
        assert_eq!(node.visits(), 0);
        assert!(node.evaluation().is_none());
        assert!(node.children().is_empty());
        assert_eq!(node.stats(), NodeStats::default());
    }

    #[test]
    fn test_eval_claim_is_exclusive() {
        let node = Node::new(None, None, Player::Black);
        assert!(node.try_begin_eval());
        assert!(!node.try_begin_eval());
        assert_eq!(node.state(), NodeState::InFlight);

        node.abort_eval();
        assert_eq!(node.state(), NodeState::Unvisited);
        assert!(node.try_begin_eval());
    }

    #[test]
    fn test_stats_accumulate() {
        let node = Node::new(Some(Loc::Pass), Some(NodeId(0)), Player::White);
        node.add_sample(&sample(1.0, 4.0));
        node.add_sample(&sample(-0.5, -2.0));

        let stats = node.stats();
        assert_eq!(stats.visits, 2);
        assert!((stats.win_loss_avg() - 0.25).abs() < 1e-12);
        assert!((stats.win_loss_sq_avg() - 0.625).abs() < 1e-12);
        assert!((stats.score_mean_avg() - 1.0).abs() < 1e-12);
        assert!((stats.score_mean_sq_avg() - 11.0).abs() < 1e-12);
    }

    #[test]
    fn test_terminal_sample() {
        let white_win = GameOutcome::from_white_score(3.5);
        let s = ValueSample::from_outcome(&white_win, 0.5);
        assert_eq!(s.win_loss, 1.0);
        assert_eq!(s.score_mean_sq, 12.25);

        let draw = GameOutcome::from_white_score(0.0);
        assert_eq!(ValueSample::from_outcome(&draw, 0.5).win_loss, 0.0);
        assert_eq!(ValueSample::from_outcome(&draw, 1.0).win_loss, 1.0);
    }

    #[test]
    fn test_detached_copy_keeps_stats_and_evaluation() {
        let node = Node::new(Some(Loc::point(1, 1)), Some(NodeId(3)), Player::White);
        assert!(node.try_begin_eval());
        node.set_evaluation(Evaluation::Terminal(GameOutcome::from_white_score(-1.0)));
        node.add_sample(&sample(-1.0, -1.0));
        node.mark_evaluated();
        node.add_virtual_losses(3);

        let copy = node.detached_copy(None);
        assert_eq!(copy.parent, None);
        assert_eq!(copy.prev_move, Some(Loc::point(1, 1)));
        assert_eq!(copy.state(), NodeState::Evaluated);
        assert!(copy.is_terminal());
        assert_eq!(copy.stats(), node.stats());
        assert_eq!(copy.virtual_losses(), 0);
    }

    #[test]
    fn test_virtual_losses() {
        let node = Node::new(None, None, Player::Black);
        node.add_virtual_losses(3);
        node.add_virtual_losses(3);
        assert_eq!(node.virtual_losses(), 6);
        node.remove_virtual_losses(3);
        assert_eq!(node.virtual_losses(), 3);
    }
}
