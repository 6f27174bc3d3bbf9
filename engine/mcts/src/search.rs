//! The search engine.
//!
//! [`Search`] owns a tree rooted at the current position and grows it with
//! parallel playouts. Lifecycle:
//! 1. `set_position` installs a root position and clears the tree
//! 2. `begin_search` evaluates the root and prepares root-only data
//! 3. `run_whole_search` runs playouts until a budget or deadline is hit
//! 4. `get_chosen_move_loc` picks a move from the root statistics
//! 5. `make_move` advances the root, keeping the subtree under that move

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use engine_core::{Loc, Player, Position, RulesError, ScoringRule};
use nn_eval::{NnEvalError, NnEvaluator, NnOutput};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use thiserror::Error;
use tracing::{debug, trace};

use crate::config::SearchParams;
use crate::node::{Evaluation, NodeId, NodeState, NodeStats, ValueSample};
use crate::playout::PlayoutContext;
use crate::tree::{SearchTree, TreeFull, DEFAULT_MAX_NODES};
use crate::utility::{dynamic_score_center, Utility};

/// Errors that can occur during search.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("No position has been set")]
    NoPosition,

    #[error("Rules error: {0}")]
    Rules(#[from] RulesError),

    #[error("Evaluation error: {0}")]
    Evaluation(#[from] NnEvalError),

    #[error("Search tree is full")]
    TreeFull,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No legal moves available")]
    NoLegalMoves,
}

impl From<TreeFull> for SearchError {
    fn from(_: TreeFull) -> Self {
        SearchError::TreeFull
    }
}

/// Summary of one `run_whole_search` call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SearchStats {
    /// Playouts completed during this call.
    pub playouts: u64,
    pub root_visits: u64,
    /// Nodes in the tree afterwards.
    pub nodes: usize,
    /// Times a playout reached a node another worker was evaluating.
    pub collisions: u64,
    pub elapsed: Duration,
}

/// Root-only data prepared by `begin_search`.
#[derive(Debug, Clone, Default)]
pub(crate) struct RootInfo {
    /// Priors after root temperature and noise, in policy order.
    pub policy: Vec<f32>,
    /// Moves the root may search, in policy order.
    pub allowed: Vec<bool>,
    /// White score bonus per move, in policy order.
    pub ending_bonus: Vec<f64>,
    pub dynamic_center: f64,
    /// `begin_search` generation the policy was computed for.
    epoch: u64,
}

#[derive(Default)]
struct WorkerTally {
    playouts: u64,
    collisions: u64,
}

/// Tree search over positions of type `P`.
pub struct Search<P: Position> {
    params: Arc<SearchParams>,
    nn_eval: Arc<NnEvaluator>,
    root_position: Option<P>,
    tree: SearchTree,
    max_tree_nodes: usize,
    root_info: RootInfo,
    /// Bumped whenever root-only data must be rebuilt.
    epoch: u64,
    rng: ChaCha20Rng,
}

impl<P: Position> std::fmt::Debug for Search<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Search")
            .field("params", &self.params)
            .field("root_position", &self.root_position)
            .field("tree", &self.tree)
            .finish()
    }
}

impl<P: Position> Search<P> {
    /// Create a search with no position. `seed` drives root noise and
    /// move sampling.
    pub fn new(
        params: SearchParams,
        nn_eval: Arc<NnEvaluator>,
        seed: u64,
    ) -> Result<Self, SearchError> {
        params.validate()?;
        Ok(Self {
            params: Arc::new(params),
            nn_eval,
            root_position: None,
            tree: SearchTree::new(DEFAULT_MAX_NODES),
            max_tree_nodes: DEFAULT_MAX_NODES,
            root_info: RootInfo::default(),
            epoch: 1,
            rng: ChaCha20Rng::seed_from_u64(seed),
        })
    }

    pub fn params(&self) -> &SearchParams {
        &self.params
    }

    /// Replace the parameters. The tree is kept.
    pub fn set_params(&mut self, params: SearchParams) -> Result<(), SearchError> {
        params.validate()?;
        self.params = Arc::new(params);
        self.epoch += 1;
        Ok(())
    }

    pub fn nn_evaluator(&self) -> &Arc<NnEvaluator> {
        &self.nn_eval
    }

    pub fn root_position(&self) -> Option<&P> {
        self.root_position.as_ref()
    }

    /// Limit the tree to `max_nodes` nodes. Clears the tree.
    pub fn set_max_tree_nodes(&mut self, max_nodes: usize) {
        self.max_tree_nodes = max_nodes.max(1);
        self.clear_search();
    }

    /// Install a new root position and clear the tree.
    ///
    /// Fails without changing anything if the backend does not support the
    /// position's rules or the board does not fit the net.
    pub fn set_position(&mut self, position: P) -> Result<(), SearchError> {
        self.nn_eval.check_rules_supported(position.rules())?;
        let (nx, ny) = (self.nn_eval.nn_x_len(), self.nn_eval.nn_y_len());
        if position.x_size() > nx || position.y_size() > ny {
            return Err(NnEvalError::BoardTooLarge {
                x_size: position.x_size(),
                y_size: position.y_size(),
                nn_x_len: nx,
                nn_y_len: ny,
            }
            .into());
        }
        self.root_position = Some(position);
        self.clear_search();
        Ok(())
    }

    /// Drop the tree, keeping the position.
    pub fn clear_search(&mut self) {
        self.tree.clear(self.max_tree_nodes);
        self.root_info = RootInfo::default();
        self.epoch += 1;
    }

    /// Play `loc` at the root, keeping the subtree under it.
    ///
    /// An illegal move is rejected before anything changes.
    pub fn make_move(&mut self, loc: Loc) -> Result<(), SearchError> {
        let position = self.root_position.as_ref().ok_or(SearchError::NoPosition)?;
        let next = position.play(loc)?;

        let kept = self.tree.root().and_then(|root| self.tree.find_child(root, loc));
        match kept {
            Some(child) => {
                if self.tree.compact_to(child).is_err() {
                    self.tree.clear(self.max_tree_nodes);
                }
            }
            None => self.tree.clear(self.max_tree_nodes),
        }
        trace!(mv = %next.loc_to_string(loc), nodes = self.tree.len(), "Advanced root");

        self.root_position = Some(next);
        self.root_info = RootInfo::default();
        self.epoch += 1;
        Ok(())
    }

    /// Prepare the root for searching.
    ///
    /// Evaluates the root (with ownership) if needed, then rebuilds the root
    /// policy, pruning and ending bonuses when the root or parameters have
    /// changed since the last call. Pruned children are detached. Calling it
    /// again without changes leaves the tree exactly as it was.
    pub fn begin_search(&mut self) -> Result<(), SearchError> {
        let position = self.root_position.clone().ok_or(SearchError::NoPosition)?;
        let root_id = self.tree.ensure_root(position.next_player())?;
        self.ensure_root_evaluated(&position, root_id)?;

        if self.root_info.epoch != self.epoch {
            self.prepare_root_info(&position, root_id)?;
        }
        if self.detach_disallowed_root_children(root_id) {
            self.recompute_root_stats(root_id);
        }

        let root_score = self.tree.node(root_id).stats().score_mean_avg();
        self.root_info.dynamic_center = dynamic_score_center(
            root_score,
            self.params.dynamic_score_center_zero_weight,
            position.x_size(),
            position.y_size(),
        );
        Ok(())
    }

    fn ensure_root_evaluated(&mut self, position: &P, root_id: NodeId) -> Result<(), SearchError> {
        let draw_value = self.params.draw_equivalent_wins_for_white;
        let node = self.tree.node(root_id);
        let needs_refresh = match node.state() {
            NodeState::Evaluated => {
                if node.is_terminal() || node.nn_output().is_some_and(|o| o.has_ownership()) {
                    return Ok(());
                }
                true
            }
            NodeState::Unvisited | NodeState::InFlight => false,
        };

        let eval = match position.outcome() {
            Some(outcome) => Evaluation::Terminal(outcome),
            None => Evaluation::Net(self.nn_eval.evaluate(
                position,
                position.next_player(),
                draw_value,
                true,
                false,
            )?),
        };
        let sample = ValueSample::from_evaluation(&eval, draw_value);
        self.tree.node_mut(root_id).replace_evaluation(eval);

        if needs_refresh {
            // Kept from an earlier search without ownership
            self.recompute_root_stats(root_id);
        } else {
            self.tree
                .node(root_id)
                .store_stats(&NodeStats::from_sample(&sample));
        }
        self.epoch += 1;
        Ok(())
    }

    /// Root statistics from its own evaluation plus its children.
    fn recompute_root_stats(&mut self, root_id: NodeId) {
        let draw_value = self.params.draw_equivalent_wins_for_white;
        let node = self.tree.node(root_id);
        let Some(eval) = node.evaluation() else {
            return;
        };
        if node.is_terminal() {
            return;
        }
        let mut stats = NodeStats::from_sample(&ValueSample::from_evaluation(eval, draw_value));
        for &child in node.children().iter() {
            stats.merge(&self.tree.node(child).stats());
        }
        node.store_stats(&stats);
    }

    fn prepare_root_info(&mut self, position: &P, root_id: NodeId) -> Result<(), SearchError> {
        let output = match self.tree.node(root_id).nn_output() {
            Some(output) => Arc::clone(output),
            None => {
                // Terminal root: nothing to search
                self.root_info = RootInfo {
                    epoch: self.epoch,
                    ..RootInfo::default()
                };
                return Ok(());
            }
        };

        let policy = self.root_policy(&output)?;
        let allowed = self.allowed_root_moves(position, &policy, &output);
        let ending_bonus = self.ending_bonus(position, &policy, &output);
        self.root_info = RootInfo {
            policy,
            allowed,
            ending_bonus,
            dynamic_center: self.root_info.dynamic_center,
            epoch: self.epoch,
        };
        Ok(())
    }

    /// Net policy sharpened or flattened by the root temperature, with
    /// Dirichlet noise mixed in when enabled.
    fn root_policy(&mut self, output: &NnOutput) -> Result<Vec<f32>, SearchError> {
        let mut policy = output.policy_probs.clone();
        let temperature = self.params.root_policy_temperature;
        if temperature != 1.0 {
            let max = policy.iter().copied().fold(0.0f32, f32::max) as f64;
            if max > 0.0 {
                let mut sum = 0.0;
                for p in policy.iter_mut().filter(|p| **p >= 0.0) {
                    let v = (*p as f64 / max).powf(1.0 / temperature);
                    *p = v as f32;
                    sum += v;
                }
                if sum > 0.0 {
                    for p in policy.iter_mut().filter(|p| **p >= 0.0) {
                        *p = (*p as f64 / sum) as f32;
                    }
                }
            }
        }

        if self.params.root_noise_enabled {
            let legal: Vec<usize> = (0..policy.len()).filter(|&i| policy[i] >= 0.0).collect();
            if !legal.is_empty() {
                let concentration = self.params.root_dirichlet_noise_total_concentration;
                let alpha = concentration / legal.len() as f64;
                let noise = dirichlet_noise(legal.len(), alpha, &mut self.rng)?;
                let weight = self.params.root_dirichlet_noise_weight;
                for (&idx, &n) in legal.iter().zip(&noise) {
                    policy[idx] = ((1.0 - weight) * policy[idx] as f64 + weight * n) as f32;
                }
            }
        }
        Ok(policy)
    }

    /// Legal root moves, minus suicides and moves inside pass-alive areas
    /// when pruning is on. Pass is always allowed.
    fn allowed_root_moves(&self, position: &P, policy: &[f32], output: &NnOutput) -> Vec<bool> {
        let prune = self.params.root_prune_useless_moves;
        let safe_area = if prune { position.safe_area() } else { Vec::new() };
        let pla = position.next_player();
        let x_size = position.x_size();

        policy
            .iter()
            .enumerate()
            .map(|(idx, &p)| {
                if p < 0.0 {
                    return false;
                }
                match Loc::from_policy_index(idx, output.nn_x_len, output.nn_y_len) {
                    Loc::Pass => true,
                    loc @ Loc::Point { x, y } => {
                        !prune
                            || !(position.is_suicide(loc, pla)
                                || safe_area
                                    .get(y as usize * x_size + x as usize)
                                    .is_some_and(|owner| owner.is_some()))
                    }
                }
            })
            .collect()
    }

    /// White score bonus per root move for cleaning up the game under area
    /// scoring: a game-ending pass gains, a move into a point already
    /// settled for either side loses.
    fn ending_bonus(&self, position: &P, policy: &[f32], output: &NnOutput) -> Vec<f64> {
        let bonus = self.params.root_ending_bonus_points;
        let mut result = vec![0.0; policy.len()];
        if bonus == 0.0 || position.rules().scoring != ScoringRule::Area {
            return result;
        }
        let Some(owner_map) = output.white_owner_map.as_ref() else {
            return result;
        };
        let sign = position.next_player().white_sign();
        for (idx, &p) in policy.iter().enumerate() {
            if p < 0.0 {
                continue;
            }
            let pla_bonus = match Loc::from_policy_index(idx, output.nn_x_len, output.nn_y_len) {
                Loc::Pass => {
                    let ends_game = position
                        .play(Loc::Pass)
                        .is_ok_and(|next| next.outcome().is_some());
                    if ends_game {
                        2.0 * bonus
                    } else {
                        0.0
                    }
                }
                Loc::Point { x, y } => {
                    let own = sign * owner_map[y as usize * output.nn_x_len + x as usize] as f64;
                    if own.abs() >= 0.95 {
                        -bonus * (own.abs() - 0.95) / 0.05
                    } else {
                        0.0
                    }
                }
            };
            result[idx] = sign * pla_bonus;
        }
        result
    }

    /// Detach root children whose move is not allowed. Returns whether any were.
    fn detach_disallowed_root_children(&mut self, root_id: NodeId) -> bool {
        if self.root_info.allowed.is_empty() {
            return false;
        }
        let (nx, ny) = (self.nn_eval.nn_x_len(), self.nn_eval.nn_y_len());
        let tree = &self.tree;
        let allowed = &self.root_info.allowed;
        let mut children = tree.node(root_id).children_mut();
        let before = children.len();
        children.retain(|&child| {
            tree.node(child)
                .prev_move
                .is_some_and(|loc| allowed.get(loc.policy_index(nx, ny)).copied().unwrap_or(false))
        });
        children.len() != before
    }

    pub(crate) fn utility(&self) -> Utility {
        let (x_size, y_size) = self
            .root_position
            .as_ref()
            .map_or((19, 19), |p| (p.x_size(), p.y_size()));
        Utility::new(&self.params, self.root_info.dynamic_center, x_size, y_size)
    }

    pub(crate) fn tree(&self) -> &SearchTree {
        &self.tree
    }

    pub(crate) fn root_info(&self) -> &RootInfo {
        &self.root_info
    }

    /// Run a full search from the root position.
    ///
    /// Stops at the first of: `max_visits` root visits, `max_playouts`
    /// playouts in this call, `max_time_secs`, or `deadline`. Deadlines only
    /// stop new playouts; evaluations already in flight are awaited. If a
    /// playout fails the search stops and that error is returned.
    pub fn run_whole_search(
        &mut self,
        deadline: Option<Instant>,
    ) -> Result<SearchStats, SearchError> {
        self.begin_search()?;
        let start = Instant::now();
        let time_limit = Duration::try_from_secs_f64(self.params.max_time_secs)
            .ok()
            .and_then(|limit| start.checked_add(limit));
        let deadline = match (deadline, time_limit) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        let root_id = self.tree.root().ok_or(SearchError::NoPosition)?;
        let root_position = self.root_position.as_ref().ok_or(SearchError::NoPosition)?;
        let root_visits = self.tree.node(root_id).visits();
        let budget = self
            .params
            .max_playouts
            .min(self.params.max_visits.saturating_sub(root_visits));

        let ctx = PlayoutContext {
            params: &self.params,
            tree: &self.tree,
            nn_eval: &self.nn_eval,
            root_position,
            root_info: &self.root_info,
            root_id,
            utility: self.utility(),
        };
        debug!(
            budget,
            root_visits,
            threads = self.params.num_threads,
            "Starting search"
        );

        let reserved = AtomicU64::new(0);
        let abort = AtomicBool::new(false);
        let first_error: Mutex<Option<SearchError>> = Mutex::new(None);

        let worker = || {
            let mut tally = WorkerTally::default();
            while !abort.load(Ordering::Acquire) {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    break;
                }
                let reservation = reserved.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                    (n < budget).then_some(n + 1)
                });
                if reservation.is_err() {
                    break;
                }
                match ctx.run_playout() {
                    Ok(collisions) => {
                        tally.playouts += 1;
                        tally.collisions += collisions;
                    }
                    Err(e) => {
                        abort.store(true, Ordering::Release);
                        first_error
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .get_or_insert(e);
                        break;
                    }
                }
            }
            tally
        };

        let tally = std::thread::scope(|s| {
            let handles: Vec<_> = (1..self.params.num_threads)
                .map(|_| s.spawn(&worker))
                .collect();
            let mut total = worker();
            for handle in handles {
                match handle.join() {
                    Ok(t) => {
                        total.playouts += t.playouts;
                        total.collisions += t.collisions;
                    }
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
            total
        });

        let stats = SearchStats {
            playouts: tally.playouts,
            root_visits: self.tree.node(root_id).visits(),
            nodes: self.tree.len(),
            collisions: tally.collisions,
            elapsed: start.elapsed(),
        };
        debug!(
            playouts = stats.playouts,
            root_visits = stats.root_visits,
            nodes = stats.nodes,
            collisions = stats.collisions,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "Search finished"
        );

        if let Some(e) = first_error.into_inner().unwrap_or_else(PoisonError::into_inner) {
            debug!(error = %e, "Search aborted");
            return Err(e);
        }
        Ok(stats)
    }

    pub fn run_whole_search_and_get_move(
        &mut self,
        deadline: Option<Instant>,
    ) -> Result<Loc, SearchError> {
        self.run_whole_search(deadline)?;
        self.get_chosen_move_loc()
    }

    /// Move-choice temperature at the current root ply.
    ///
    /// Decays from the early temperature towards the base one with a
    /// half-life that shrinks with the board.
    pub fn chosen_move_temperature(&self) -> f64 {
        let p = &self.params;
        let Some(position) = self.root_position.as_ref() else {
            return p.chosen_move_temperature;
        };
        let area = (position.x_size() * position.y_size()) as f64;
        let halflife = p.chosen_move_temperature_halflife * area.sqrt() / 19.0;
        p.chosen_move_temperature
            + (p.chosen_move_temperature_early - p.chosen_move_temperature)
                * 0.5f64.powf(position.ply() as f64 / halflife)
    }

    /// Pick the move to play from the current root statistics.
    pub fn get_chosen_move_loc(&mut self) -> Result<Loc, SearchError> {
        let values = self.play_selection_values(0.0);
        let temperature = self.chosen_move_temperature();
        let (nx, ny) = (self.nn_eval.nn_x_len(), self.nn_eval.nn_y_len());
        choose_move(&values, temperature, nx, ny, &mut self.rng).ok_or(SearchError::NoLegalMoves)
    }

    /// Per-child values the final move is chosen from.
    ///
    /// Visit counts of root children that have visits. With LCB enabled the
    /// child with the best lower confidence bound among those with enough
    /// visits is raised above all others. Values are then scaled so the
    /// largest is at least `scale_max_to_at_least`.
    pub fn play_selection_values(&self, scale_max_to_at_least: f64) -> Vec<(Loc, f64)> {
        let Some(root_id) = self.tree.root() else {
            return Vec::new();
        };
        let root = self.tree.node(root_id);
        let (nx, ny) = (self.nn_eval.nn_x_len(), self.nn_eval.nn_y_len());
        let children: Vec<(Loc, NodeStats)> = root
            .children()
            .iter()
            .filter_map(|&id| {
                let child = self.tree.node(id);
                let stats = child.stats();
                (stats.visits > 0).then_some((child.prev_move?, stats))
            })
            .collect();
        let mut values: Vec<(Loc, f64)> = children
            .iter()
            .map(|(loc, stats)| (*loc, stats.visits as f64))
            .collect();
        let max_value = values.iter().map(|v| v.1).fold(0.0, f64::max);

        if self.params.use_lcb_for_selection && children.len() > 1 {
            let utility = self.utility();
            let sign = root.next_player.white_sign();
            let min_visits = self.params.min_visit_prop_for_lcb * max_value;
            let mut best: Option<(usize, f64)> = None;
            for (i, (loc, stats)) in children.iter().enumerate() {
                if stats.visits < 2 || (stats.visits as f64) < min_visits {
                    continue;
                }
                let bonus = self
                    .root_info
                    .ending_bonus
                    .get(loc.policy_index(nx, ny))
                    .copied()
                    .unwrap_or(0.0);
                let mean = sign * utility.white_utility_of(stats, bonus);
                let wl_mean = stats.win_loss_avg();
                let variance = (stats.win_loss_sq_avg() - wl_mean * wl_mean).max(0.0)
                    * utility.win_loss_factor * utility.win_loss_factor;
                let lcb = mean - self.params.lcb_stdevs * (variance / stats.visits as f64).sqrt();
                if best.map_or(true, |(_, b)| lcb > b) {
                    best = Some((i, lcb));
                }
            }
            if let Some((i, _)) = best {
                values[i].1 = max_value + 1.0;
            }
        }

        let max_value = values.iter().map(|v| v.1).fold(0.0, f64::max);
        if max_value > 0.0 && max_value < scale_max_to_at_least {
            let scale = scale_max_to_at_least / max_value;
            for v in &mut values {
                v.1 *= scale;
            }
        }
        values
    }

    pub(crate) fn root_player(&self) -> Player {
        self.root_position
            .as_ref()
            .map_or(Player::Black, |p| p.next_player())
    }
}

/// Choose from `(move, value)` pairs.
///
/// At a temperature of at most `1e-4` the largest value wins, ties going to
/// the lowest policy index. Otherwise moves are sampled with weight
/// `value^(1/T)`, computed in log space.
fn choose_move<R: Rng>(
    values: &[(Loc, f64)],
    temperature: f64,
    nn_x_len: usize,
    nn_y_len: usize,
    rng: &mut R,
) -> Option<Loc> {
    let candidates: Vec<(Loc, f64)> = values.iter().copied().filter(|v| v.1 > 0.0).collect();
    if candidates.is_empty() {
        return None;
    }

    if temperature <= 1e-4 {
        return candidates
            .iter()
            .min_by(|a, b| {
                b.1.total_cmp(&a.1).then_with(|| {
                    a.0.policy_index(nn_x_len, nn_y_len)
                        .cmp(&b.0.policy_index(nn_x_len, nn_y_len))
                })
            })
            .map(|v| v.0);
    }

    let max_log = candidates.iter().map(|v| v.1.ln()).fold(f64::NEG_INFINITY, f64::max);
    let weights: Vec<f64> = candidates
        .iter()
        .map(|v| ((v.1.ln() - max_log) / temperature).exp())
        .collect();
    let total: f64 = weights.iter().sum();
    let mut r = rng.gen::<f64>() * total;
    for (candidate, w) in candidates.iter().zip(&weights) {
        if r < *w {
            return Some(candidate.0);
        }
        r -= w;
    }
    candidates.last().map(|v| v.0)
}

/// Generate Dirichlet-distributed noise using Gamma variates.
fn dirichlet_noise<R: Rng>(n: usize, alpha: f64, rng: &mut R) -> Result<Vec<f64>, SearchError> {
    use rand_distr::{Distribution, Gamma};

    let gamma = Gamma::new(alpha, 1.0)
        .map_err(|e| SearchError::InvalidConfig(format!("dirichlet alpha {}: {}", alpha, e)))?;
    let mut samples: Vec<f64> = (0..n).map(|_| gamma.sample(rng)).collect();

    let sum: f64 = samples.iter().sum();
    if sum > 0.0 {
        for s in &mut samples {
            *s /= sum;
        }
    } else {
        samples.fill(1.0 / n as f64);
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choose_move_argmax_ties_to_lowest_index() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let values = vec![
            (Loc::Pass, 10.0),
            (Loc::point(4, 4), 10.0),
            (Loc::point(2, 0), 10.0),
            (Loc::point(0, 0), 3.0),
        ];
        assert_eq!(choose_move(&values, 0.0, 9, 9, &mut rng), Some(Loc::point(2, 0)));
        assert_eq!(choose_move(&values, 1e-5, 9, 9, &mut rng), Some(Loc::point(2, 0)));
    }

    #[test]
    fn test_choose_move_sampling_follows_weights() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let values = vec![(Loc::point(0, 0), 30.0), (Loc::point(1, 0), 10.0), (Loc::Pass, 0.0)];

        let mut counts = [0u32; 2];
        for _ in 0..2000 {
            match choose_move(&values, 1.0, 9, 9, &mut rng) {
                Some(Loc::Point { x: 0, .. }) => counts[0] += 1,
                Some(Loc::Point { x: 1, .. }) => counts[1] += 1,
                other => panic!("unexpected choice {:?}", other),
            }
        }
        // Roughly 3:1
        assert!(counts[0] > 2 * counts[1]);
        assert!(counts[1] > 300);
    }

    #[test]
    fn test_low_temperature_sharpens() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let values = vec![(Loc::point(0, 0), 30.0), (Loc::point(1, 0), 10.0)];
        let picks_best = (0..500)
            .filter(|_| choose_move(&values, 0.1, 9, 9, &mut rng) == Some(Loc::point(0, 0)))
            .count();
        assert_eq!(picks_best, 500);
    }

    #[test]
    fn test_choose_move_empty() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        assert_eq!(choose_move(&[], 0.0, 9, 9, &mut rng), None);
    }

    #[test]
    fn test_dirichlet_noise() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let noise = dirichlet_noise(5, 0.3, &mut rng).unwrap();

        // Should sum to 1.0
        let sum: f64 = noise.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);

        // All values should be non-negative
        for &n in &noise {
            assert!(n >= 0.0);
        }
        assert!(dirichlet_noise(3, 0.0, &mut rng).is_err());
    }
}
