//! Read-only views of a search: root statistics, maps and text dumps.

use std::fmt::Write as _;

use engine_core::{Loc, Player, Position};

use crate::node::{NodeId, NodeState, NodeStats};
use crate::search::Search;

/// Whose point of view reported values take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Perspective {
    #[default]
    White,
    /// The player to move at the root.
    RootPlayer,
}

/// Options for [`Search::print_tree`].
#[derive(Debug, Clone, PartialEq)]
pub struct PrintTreeOptions {
    /// Depth below the starting node to print. Zero prints only that node.
    pub max_depth: usize,
    /// Start from the node reached by these moves from the root.
    pub only_branch: Vec<Loc>,
    pub perspective: Perspective,
    /// Children with fewer visits are left out.
    pub min_visits: u64,
}

impl Default for PrintTreeOptions {
    fn default() -> Self {
        Self {
            max_depth: 1,
            only_branch: Vec::new(),
            perspective: Perspective::White,
            min_visits: 1,
        }
    }
}

impl PrintTreeOptions {
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_only_branch(mut self, moves: Vec<Loc>) -> Self {
        self.only_branch = moves;
        self
    }

    pub fn with_perspective(mut self, perspective: Perspective) -> Self {
        self.perspective = perspective;
        self
    }

    pub fn with_min_visits(mut self, visits: u64) -> Self {
        self.min_visits = visits;
        self
    }
}

impl<P: Position> Search<P> {
    /// Visits of the root, zero if there is no tree.
    pub fn num_root_visits(&self) -> u64 {
        self.tree().root().map_or(0, |root| self.tree().node(root).visits())
    }

    /// Number of nodes currently allocated in the tree.
    pub fn root_node_count(&self) -> usize {
        self.tree().len()
    }

    pub fn root_stats(&self) -> Option<NodeStats> {
        self.tree().root().map(|root| self.tree().node(root).stats())
    }

    /// Root children in creation order, with their visit counts.
    pub fn root_children(&self) -> Vec<(Loc, u64)> {
        let Some(root) = self.tree().root() else {
            return Vec::new();
        };
        self.tree()
            .node(root)
            .children()
            .iter()
            .filter_map(|&id| {
                let child = self.tree().node(id);
                Some((child.prev_move?, child.visits()))
            })
            .collect()
    }

    fn perspective_sign(&self, perspective: Perspective) -> f64 {
        match perspective {
            Perspective::White => 1.0,
            Perspective::RootPlayer => self.root_player().white_sign(),
        }
    }

    /// Root priors the search uses, row by row over the board, pass last.
    /// Illegal moves hold `-1`.
    pub fn root_policy_map(&self) -> Option<Vec<f32>> {
        let position = self.root_position()?;
        let root = self.tree().root()?;
        let output = self.tree().node(root).nn_output()?;
        let policy = if self.root_info().policy.is_empty() {
            &output.policy_probs
        } else {
            &self.root_info().policy
        };
        let mut map = Vec::with_capacity(position.x_size() * position.y_size() + 1);
        for y in 0..position.y_size() {
            for x in 0..position.x_size() {
                map.push(policy[y * output.nn_x_len + x]);
            }
        }
        map.push(policy[Loc::Pass.policy_index(output.nn_x_len, output.nn_y_len)]);
        Some(map)
    }

    /// Root ownership row by row over the board, if the root was evaluated
    /// with ownership.
    pub fn root_ownership_map(&self, perspective: Perspective) -> Option<Vec<f32>> {
        let position = self.root_position()?;
        let root = self.tree().root()?;
        let output = self.tree().node(root).nn_output()?;
        let sign = self.perspective_sign(perspective) as f32;
        let mut map = Vec::with_capacity(position.x_size() * position.y_size());
        for y in 0..position.y_size() {
            for x in 0..position.x_size() {
                map.push(sign * output.white_ownership_at(x, y)?);
            }
        }
        Some(map)
    }

    /// Score bonus, in points for the root player, applied to each root child.
    pub fn root_ending_score_value_bonus(&self) -> Vec<(Loc, f64)> {
        let Some(output) = self
            .tree()
            .root()
            .and_then(|root| self.tree().node(root).nn_output())
        else {
            return Vec::new();
        };
        let sign = self.root_player().white_sign();
        let bonus = &self.root_info().ending_bonus;
        self.root_children()
            .into_iter()
            .map(|(loc, _)| {
                let idx = loc.policy_index(output.nn_x_len, output.nn_y_len);
                (loc, sign * bonus.get(idx).copied().unwrap_or(0.0))
            })
            .collect()
    }

    /// Every node whose statistics disagree with its children.
    ///
    /// Between playouts an evaluated non-terminal node has exactly one more
    /// visit than its children together, and nothing is in flight.
    pub fn visit_invariant_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        let Some(root) = self.tree().root() else {
            return violations;
        };
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = self.tree().node(id);
            let children = node.children().clone();
            let child_visits: u64 = children.iter().map(|&c| self.tree().node(c).visits()).sum();
            let visits = node.visits();
            match node.state() {
                NodeState::InFlight => violations.push(format!("node {} is still in flight", id.0)),
                NodeState::Unvisited if visits > 0 || !children.is_empty() => {
                    violations.push(format!(
                        "unvisited node {} has {} visits and {} children",
                        id.0,
                        visits,
                        children.len()
                    ))
                }
                NodeState::Evaluated if node.is_terminal() && !children.is_empty() => {
                    violations.push(format!("terminal node {} has children", id.0))
                }
                NodeState::Evaluated if !node.is_terminal() && visits != 1 + child_visits => {
                    violations.push(format!(
                        "node {} has {} visits but its children have {}",
                        id.0, visits, child_visits
                    ))
                }
                _ => {}
            }
            if node.virtual_losses() != 0 {
                violations.push(format!(
                    "node {} keeps {} virtual losses",
                    id.0,
                    node.virtual_losses()
                ));
            }
            stack.extend(children);
        }
        violations
    }

    /// Text dump of the tree, one node per line.
    ///
    /// Each line shows the move, visits (`N`), win-loss (`WL`), utility
    /// (`U`), score mean (`S`), lead (`L`) and the prior the parent gave the
    /// move (`P`). Children are sorted by visits, ties in creation order.
    pub fn print_tree(&self, options: &PrintTreeOptions) -> String {
        let mut out = String::new();
        let Some(mut id) = self.tree().root() else {
            return out;
        };
        let mut prior = None;
        for &loc in &options.only_branch {
            match self.tree().find_child(id, loc) {
                Some(child) => {
                    prior = self.prior_of(id, loc);
                    id = child;
                }
                None => return out,
            }
        }
        let sign = self.perspective_sign(options.perspective);
        self.write_node(&mut out, id, 0, prior, sign, options);
        out
    }

    fn write_node(
        &self,
        out: &mut String,
        id: NodeId,
        depth: usize,
        prior: Option<f32>,
        sign: f64,
        options: &PrintTreeOptions,
    ) {
        let node = self.tree().node(id);
        let stats = node.stats();
        let label = match node.prev_move {
            Some(loc) => self.loc_text(loc),
            None => "root".to_string(),
        };
        let utility = self.utility().white_utility_of(&stats, 0.0);
        let prior_text = prior.map_or_else(|| "-".to_string(), |p| format!("{:.4}", p));
        let _ = writeln!(
            out,
            "{:indent$}{} N {} WL {:+.5} U {:+.5} S {:+.3} L {:+.3} P {}",
            "",
            label,
            stats.visits,
            sign * stats.win_loss_avg(),
            sign * utility,
            sign * stats.score_mean_avg(),
            sign * stats.lead_avg(),
            prior_text,
            indent = depth * 2
        );

        if depth >= options.max_depth {
            return;
        }
        let mut children: Vec<(NodeId, u64)> = node
            .children()
            .iter()
            .map(|&c| (c, self.tree().node(c).visits()))
            .filter(|&(_, visits)| visits >= options.min_visits)
            .collect();
        children.sort_by(|a, b| b.1.cmp(&a.1));
        for (child, _) in children {
            let child_prior = self
                .tree()
                .node(child)
                .prev_move
                .and_then(|loc| self.prior_of(id, loc));
            self.write_node(out, child, depth + 1, child_prior, sign, options);
        }
    }

    /// Principal variation: most-visited child at each step, as move text.
    pub fn print_pv(&self, max_len: usize) -> String {
        let mut moves = Vec::new();
        let mut id = match self.tree().root() {
            Some(root) => root,
            None => return String::new(),
        };
        while moves.len() < max_len {
            let best = self
                .tree()
                .node(id)
                .children()
                .iter()
                .copied()
                .filter(|&c| self.tree().node(c).visits() > 0)
                // Earliest child wins ties
                .fold(None, |best: Option<NodeId>, c| {
                    let visits = self.tree().node(c).visits();
                    match best {
                        Some(b) if self.tree().node(b).visits() >= visits => Some(b),
                        _ => Some(c),
                    }
                });
            let Some(child) = best else { break };
            if let Some(loc) = self.tree().node(child).prev_move {
                moves.push(self.loc_text(loc));
            }
            id = child;
        }
        moves.join(" ")
    }

    /// Prior the node `parent` assigns to `loc`.
    fn prior_of(&self, parent: NodeId, loc: Loc) -> Option<f32> {
        let output = self.tree().node(parent).nn_output()?;
        let idx = loc.policy_index(output.nn_x_len, output.nn_y_len);
        let root_policy = &self.root_info().policy;
        if Some(parent) == self.tree().root() && !root_policy.is_empty() {
            return root_policy.get(idx).copied();
        }
        output.policy_probs.get(idx).copied()
    }

    fn loc_text(&self, loc: Loc) -> String {
        match self.root_position() {
            Some(position) => position.loc_to_string(loc),
            None => format!("{:?}", loc),
        }
    }

    /// Owner of the root's pass-alive areas, row by row over the board.
    pub fn root_safe_area(&self) -> Option<Vec<Option<Player>>> {
        self.root_position().map(|p| p.safe_area())
    }
}
