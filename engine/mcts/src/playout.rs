//! Playouts: descent by PUCT, leaf evaluation and backup.
//!
//! One playout walks from the root to an unvisited or terminal node,
//! evaluates it and adds the resulting sample to every node on the path.
//! Nodes are shared between workers:
//! - the worker that moves a node from `Unvisited` to `InFlight` owns its
//!   evaluation, and others that reach it back off and wait
//! - virtual losses on the path push concurrent workers towards other lines
//! - a failed evaluation restores the node and leaves all statistics as
//!   they were

use engine_core::{Loc, Position};
use nn_eval::NnEvaluator;

use crate::config::SearchParams;
use crate::node::{Evaluation, Node, NodeId, NodeState, NodeStats, ValueSample};
use crate::search::{RootInfo, SearchError};
use crate::tree::SearchTree;
use crate::utility::Utility;

/// Score that forces a root child to be searched next.
const FORCED_SCORE: f64 = 1e20;

/// Read-only view of a search shared by its playout workers.
pub(crate) struct PlayoutContext<'a, P: Position> {
    pub params: &'a SearchParams,
    pub tree: &'a SearchTree,
    pub nn_eval: &'a NnEvaluator,
    pub root_position: &'a P,
    pub root_info: &'a RootInfo,
    pub root_id: NodeId,
    pub utility: Utility,
}

enum Outcome {
    Completed,
    /// Reached a node another worker is evaluating.
    Collided(NodeId),
}

struct ChildView {
    loc: Loc,
    id: NodeId,
    prior: f64,
    stats: NodeStats,
    virtual_losses: f64,
    bonus: f64,
}

impl<'a, P: Position> PlayoutContext<'a, P> {
    /// Run one playout to completion, waiting out collisions.
    /// Returns how many collisions it hit.
    pub fn run_playout(&self) -> Result<u64, SearchError> {
        let mut collisions = 0;
        loop {
            match self.try_playout()? {
                Outcome::Completed => return Ok(collisions),
                Outcome::Collided(id) => {
                    collisions += 1;
                    self.tree.wait_while_in_flight(id);
                }
            }
        }
    }

    fn try_playout(&self) -> Result<Outcome, SearchError> {
        let mut path = vec![self.root_id];
        let result = self.descend(&mut path);
        // Completed playouts removed their virtual losses during backup
        if !matches!(result, Ok(Outcome::Completed)) {
            self.remove_virtual_losses(&path);
        }
        result
    }

    fn descend(&self, path: &mut Vec<NodeId>) -> Result<Outcome, SearchError> {
        let mut position = self.root_position.clone();
        let mut node_id = self.root_id;
        loop {
            let node = self.tree.node(node_id);
            match node.state() {
                NodeState::InFlight => return Ok(Outcome::Collided(node_id)),
                NodeState::Unvisited => {
                    if !node.try_begin_eval() {
                        continue;
                    }
                    let sample = match self.evaluate_leaf(node, &position) {
                        Ok(sample) => sample,
                        Err(e) => {
                            node.abort_eval();
                            self.tree.notify_resolved(node_id);
                            return Err(e);
                        }
                    };
                    self.backup(path, &sample);
                    node.mark_evaluated();
                    self.tree.notify_resolved(node_id);
                    return Ok(Outcome::Completed);
                }
                NodeState::Evaluated => {}
            }

            if let Some(outcome) = node.terminal_outcome() {
                let draw_value = self.params.draw_equivalent_wins_for_white;
                let sample = ValueSample::from_outcome(outcome, draw_value);
                self.backup(path, &sample);
                return Ok(Outcome::Completed);
            }

            let (loc, existing) = self.select_move(node_id).ok_or(SearchError::NoLegalMoves)?;
            let next_position = position.play(loc)?;
            let child_id = match existing {
                Some(id) => id,
                None => self.tree.get_or_create_child(node_id, loc)?,
            };
            self.tree
                .node(child_id)
                .add_virtual_losses(self.params.num_virtual_losses_per_thread);
            path.push(child_id);
            position = next_position;
            node_id = child_id;
        }
    }

    fn evaluate_leaf(&self, node: &Node, position: &P) -> Result<ValueSample, SearchError> {
        let draw_value = self.params.draw_equivalent_wins_for_white;
        let eval = match position.outcome() {
            Some(outcome) => Evaluation::Terminal(outcome),
            None => Evaluation::Net(self.nn_eval.evaluate(
                position,
                position.next_player(),
                draw_value,
                false,
                false,
            )?),
        };
        let sample = ValueSample::from_evaluation(&eval, draw_value);
        node.set_evaluation(eval);
        Ok(sample)
    }

    /// Add `sample` to every node on `path`, leaf first.
    fn backup(&self, path: &[NodeId], sample: &ValueSample) {
        let n = self.params.num_virtual_losses_per_thread;
        for (depth, &id) in path.iter().enumerate().rev() {
            self.tree.with_stat_lock(id, |node| node.add_sample(sample));
            if depth > 0 {
                self.tree.node(id).remove_virtual_losses(n);
            }
        }
    }

    fn remove_virtual_losses(&self, path: &[NodeId]) {
        let n = self.params.num_virtual_losses_per_thread;
        for &id in path.iter().skip(1) {
            self.tree.node(id).remove_virtual_losses(n);
        }
    }

    /// Pick the move to descend into from an evaluated, non-terminal node.
    ///
    /// Existing children are scored first in insertion order, then moves
    /// without a child in policy order; the first best score wins.
    fn select_move(&self, node_id: NodeId) -> Option<(Loc, Option<NodeId>)> {
        let node = self.tree.node(node_id);
        let output = node.nn_output()?;
        let is_root = node_id == self.root_id;
        let policy: &[f32] = if is_root && !self.root_info.policy.is_empty() {
            &self.root_info.policy
        } else {
            &output.policy_probs
        };
        let (nx, ny) = (output.nn_x_len, output.nn_y_len);
        let sign = node.next_player.white_sign();

        let mut has_child = vec![false; policy.len()];
        let mut children = Vec::new();
        let mut total_visits = 0.0;
        let mut explored_mass = 0.0;
        for &id in node.children().iter() {
            let child = self.tree.node(id);
            let Some(loc) = child.prev_move else { continue };
            let idx = loc.policy_index(nx, ny);
            if let Some(flag) = has_child.get_mut(idx) {
                *flag = true;
            }
            let stats = child.stats();
            let prior = policy.get(idx).copied().unwrap_or(0.0).max(0.0) as f64;
            let virtual_losses = child.virtual_losses() as f64;
            total_visits += stats.visits as f64 + virtual_losses;
            if stats.visits > 0 {
                explored_mass += prior;
            }
            let bonus = if is_root {
                self.root_info.ending_bonus.get(idx).copied().unwrap_or(0.0)
            } else {
                0.0
            };
            children.push(ChildView {
                loc,
                id,
                prior,
                stats,
                virtual_losses,
                bonus,
            });
        }

        let parent_utility = sign * self.utility.white_utility_of(&node.stats(), 0.0);
        let reduction = if is_root {
            self.params.root_fpu_reduction_max
        } else {
            self.params.fpu_reduction_max
        };
        let fpu_value = parent_utility - reduction * explored_mass.sqrt();
        let explore_scale = self.params.cpuct(total_visits) * (total_visits + 0.01).sqrt();
        let desired_coeff = if is_root {
            self.params.root_desired_per_child_visits_coeff
        } else {
            0.0
        };
        let loss_utility = self.utility.max_abs();

        let score = |prior: f64, visits: u64, virtual_losses: f64, utility_sum: f64| -> f64 {
            let weight = visits as f64 + virtual_losses;
            let desired = (prior * total_visits * desired_coeff).sqrt();
            if desired_coeff > 0.0 && prior > 0.0 && weight < desired {
                return FORCED_SCORE;
            }
            let (sum, n) = if visits == 0 {
                (fpu_value, 1.0)
            } else {
                (utility_sum, visits as f64)
            };
            let q = (sum - virtual_losses * loss_utility) / (n + virtual_losses);
            q + explore_scale * prior / (1.0 + weight)
        };

        let mut best: Option<(f64, Loc, Option<NodeId>)> = None;
        let mut consider = |value: f64, loc: Loc, id: Option<NodeId>| {
            if best.as_ref().map_or(true, |(b, _, _)| value > *b) {
                best = Some((value, loc, id));
            }
        };

        for child in &children {
            let utility_sum = if child.stats.visits > 0 {
                let utility = self.utility.white_utility_of(&child.stats, child.bonus);
                sign * utility * child.stats.visits as f64
            } else {
                0.0
            };
            let value = score(child.prior, child.stats.visits, child.virtual_losses, utility_sum);
            consider(value, child.loc, Some(child.id));
        }

        for (idx, &p) in policy.iter().enumerate() {
            if p < 0.0 || has_child[idx] {
                continue;
            }
            if is_root && !self.root_info.allowed.get(idx).copied().unwrap_or(true) {
                continue;
            }
            let loc = Loc::from_policy_index(idx, nx, ny);
            consider(score(p as f64, 0, 0.0, 0.0), loc, None);
        }

        best.map(|(_, loc, id)| (loc, id))
    }
}
