//! Search tree with chunked arena allocation.
//!
//! Nodes live in fixed-size chunks that are allocated on first use and never
//! move, so playout threads can hold `&Node` while others append. Nodes are
//! referenced by [`NodeId`] indices and only freed when the whole arena is
//! dropped, which happens when the tree is cleared or compacted after a move.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Condvar, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use engine_core::{Loc, Player};

use crate::node::{Node, NodeId, NodeState};

const CHUNK_BITS: u32 = 10;
const CHUNK_SIZE: usize = 1 << CHUNK_BITS;

/// Default node limit for one tree.
pub const DEFAULT_MAX_NODES: usize = 1 << 22;

const STAT_LOCK_POOL: usize = 1 << 10;
const WAIT_POOL: usize = 1 << 6;

/// The arena is out of node slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeFull;

/// Append-only node storage.
struct Arena {
    chunks: Box<[OnceLock<Box<[OnceLock<Node>]>>]>,
    next: AtomicU32,
    max_nodes: usize,
}

impl Arena {
    fn new(max_nodes: usize) -> Self {
        let max_nodes = max_nodes.clamp(1, u32::MAX as usize);
        let num_chunks = max_nodes.div_ceil(CHUNK_SIZE);
        Self {
            chunks: (0..num_chunks).map(|_| OnceLock::new()).collect(),
            next: AtomicU32::new(0),
            max_nodes,
        }
    }

    fn alloc(&self, node: Node) -> Result<NodeId, TreeFull> {
        let idx = self
            .next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                ((n as usize) < self.max_nodes).then_some(n + 1)
            })
            .map_err(|_| TreeFull)?;
        let chunk = self.chunks[(idx >> CHUNK_BITS) as usize]
            .get_or_init(|| (0..CHUNK_SIZE).map(|_| OnceLock::new()).collect());
        let _ = chunk[idx as usize & (CHUNK_SIZE - 1)].set(node);
        Ok(NodeId(idx))
    }

    #[inline]
    fn get(&self, id: NodeId) -> Option<&Node> {
        self.chunks
            .get((id.0 >> CHUNK_BITS) as usize)?
            .get()?
            .get(id.0 as usize & (CHUNK_SIZE - 1))?
            .get()
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.chunks
            .get_mut((id.0 >> CHUNK_BITS) as usize)?
            .get_mut()?
            .get_mut(id.0 as usize & (CHUNK_SIZE - 1))?
            .get_mut()
    }

    fn len(&self) -> usize {
        (self.next.load(Ordering::Acquire) as usize).min(self.max_nodes)
    }
}

/// The search tree: arena, root, and the lock pools shared by its nodes.
pub struct SearchTree {
    arena: Arena,
    root: Option<NodeId>,
    stat_locks: Box<[Mutex<()>]>,
    waiters: Box<[(Mutex<()>, Condvar)]>,
}

impl std::fmt::Debug for SearchTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchTree")
            .field("root", &self.root)
            .field("len", &self.len())
            .field("max_nodes", &self.arena.max_nodes)
            .finish()
    }
}

#[inline]
fn pool_slot(id: NodeId, pool_size: usize) -> usize {
    // Fibonacci hashing spreads sibling ids across the pool
    ((id.0 as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15) >> 32) as usize & (pool_size - 1)
}

impl SearchTree {
    /// Create an empty tree with room for `max_nodes` nodes.
    pub fn new(max_nodes: usize) -> Self {
        Self {
            arena: Arena::new(max_nodes),
            root: None,
            stat_locks: (0..STAT_LOCK_POOL).map(|_| Mutex::new(())).collect(),
            waiters: (0..WAIT_POOL)
                .map(|_| (Mutex::new(()), Condvar::new()))
                .collect(),
        }
    }

    pub fn max_nodes(&self) -> usize {
        self.arena.max_nodes
    }

    /// Drop every node. Keeps the lock pools.
    pub fn clear(&mut self, max_nodes: usize) {
        self.arena = Arena::new(max_nodes);
        self.root = None;
    }

    #[inline]
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Root id, creating an unvisited root for `next_player` if the tree is empty.
    pub fn ensure_root(&mut self, next_player: Player) -> Result<NodeId, TreeFull> {
        if let Some(root) = self.root {
            return Ok(root);
        }
        let id = self.arena.alloc(Node::new(None, None, next_player))?;
        self.root = Some(id);
        Ok(id)
    }

    /// Get a node by ID.
    ///
    /// Ids are only handed out by this tree's arena, so a miss is a bug.
    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        self.arena
            .get(id)
            .expect("node ids always refer to allocated arena slots")
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.arena
            .get_mut(id)
            .expect("node ids always refer to allocated arena slots")
    }

    /// Number of allocated nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the child of `parent` reached by `loc`, creating it if needed.
    pub fn get_or_create_child(&self, parent: NodeId, loc: Loc) -> Result<NodeId, TreeFull> {
        let parent_node = self.node(parent);
        if let Some(id) = self.find_child(parent, loc) {
            return Ok(id);
        }
        let mut children = parent_node.children_mut();
        // Someone may have created it between the read and the write lock
        if let Some(&id) = children
            .iter()
            .find(|&&c| self.node(c).prev_move == Some(loc))
        {
            return Ok(id);
        }
        let id = self.arena.alloc(Node::new(
            Some(loc),
            Some(parent),
            parent_node.next_player.opp(),
        ))?;
        children.push(id);
        Ok(id)
    }

    pub fn find_child(&self, parent: NodeId, loc: Loc) -> Option<NodeId> {
        self.node(parent)
            .children()
            .iter()
            .copied()
            .find(|&c| self.node(c).prev_move == Some(loc))
    }

    /// Run `f` holding the statistics lock for `id`.
    pub(crate) fn with_stat_lock<R>(&self, id: NodeId, f: impl FnOnce(&Node) -> R) -> R {
        let _guard = self.stat_locks[pool_slot(id, STAT_LOCK_POOL)]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(self.node(id))
    }

    /// Block until `id` is no longer being evaluated.
    pub(crate) fn wait_while_in_flight(&self, id: NodeId) {
        let (lock, cvar) = &self.waiters[pool_slot(id, WAIT_POOL)];
        let mut guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        while self.node(id).state() == NodeState::InFlight {
            // Timeout only bounds the cost of an unrelated wakeup storm
            guard = cvar
                .wait_timeout(guard, Duration::from_millis(10))
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Wake threads waiting on `id`. Call after its state has left `InFlight`.
    pub(crate) fn notify_resolved(&self, id: NodeId) {
        let (lock, cvar) = &self.waiters[pool_slot(id, WAIT_POOL)];
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        cvar.notify_all();
    }

    /// Make `new_root`'s subtree the whole tree, copying it into a fresh
    /// arena and dropping everything else.
    pub fn compact_to(&mut self, new_root: NodeId) -> Result<(), TreeFull> {
        let mut arena = Arena::new(self.arena.max_nodes);
        let root_copy = arena.alloc(self.node(new_root).detached_copy(None))?;

        let mut queue = VecDeque::from([(new_root, root_copy)]);
        while let Some((old_id, new_id)) = queue.pop_front() {
            let old_children: Vec<NodeId> = self.node(old_id).children().clone();
            let mut new_children = Vec::with_capacity(old_children.len());
            for child in old_children {
                let copy = arena.alloc(self.node(child).detached_copy(Some(new_id)))?;
                new_children.push(copy);
                queue.push_back((child, copy));
            }
            if let Some(node) = arena.get_mut(new_id) {
                *node.children_mut() = new_children;
            }
        }

        self.arena = arena;
        self.root = Some(root_copy);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeStats, ValueSample};

    fn sample() -> ValueSample {
        ValueSample {
            win_loss: 0.5,
            ..ValueSample::default()
        }
    }

    #[test]
    fn test_root_creation() {
        let mut tree = SearchTree::new(16);
        assert!(tree.is_empty());
        let root = tree.ensure_root(Player::Black).unwrap();
        assert_eq!(tree.ensure_root(Player::White).unwrap(), root);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.node(root).next_player, Player::Black);
        assert_eq!(tree.node(root).parent, None);
    }

    #[test]
    fn test_child_creation_is_idempotent() {
        let mut tree = SearchTree::new(16);
        let root = tree.ensure_root(Player::Black).unwrap();

        let a = tree.get_or_create_child(root, Loc::point(2, 3)).unwrap();
        let b = tree.get_or_create_child(root, Loc::point(2, 3)).unwrap();
        let pass = tree.get_or_create_child(root, Loc::Pass).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, pass);
        assert_eq!(tree.len(), 3);
        assert_eq!(*tree.node(root).children(), vec![a, pass]);
        assert_eq!(tree.node(a).next_player, Player::White);
        assert_eq!(tree.node(a).parent, Some(root));
        assert_eq!(tree.find_child(root, Loc::Pass), Some(pass));
        assert_eq!(tree.find_child(root, Loc::point(0, 0)), None);
    }

    #[test]
    fn test_tree_full() {
        let mut tree = SearchTree::new(2);
        let root = tree.ensure_root(Player::Black).unwrap();
        tree.get_or_create_child(root, Loc::Pass).unwrap();
        assert_eq!(
            tree.get_or_create_child(root, Loc::point(0, 0)),
            Err(TreeFull)
        );
        assert_eq!(tree.node(root).children().len(), 1);
    }

    #[test]
    fn test_arena_spans_chunks() {
        let mut tree = SearchTree::new(CHUNK_SIZE * 2 + 5);
        let root = tree.ensure_root(Player::Black).unwrap();
        let mut parent = root;
        for _ in 0..CHUNK_SIZE + 10 {
            parent = tree.get_or_create_child(parent, Loc::Pass).unwrap();
        }
        assert_eq!(tree.len(), CHUNK_SIZE + 11);
        assert_eq!(tree.node(parent).prev_move, Some(Loc::Pass));
    }

    #[test]
    fn test_compact_keeps_subtree_only() {
        let mut tree = SearchTree::new(64);
        let root = tree.ensure_root(Player::Black).unwrap();
        let keep = tree.get_or_create_child(root, Loc::point(1, 1)).unwrap();
        let _drop = tree.get_or_create_child(root, Loc::point(2, 2)).unwrap();
        let grandchild = tree.get_or_create_child(keep, Loc::Pass).unwrap();
        tree.with_stat_lock(grandchild, |n| n.add_sample(&sample()));
        tree.with_stat_lock(keep, |n| n.add_sample(&sample()));

        tree.compact_to(keep).unwrap();

        let new_root = tree.root().unwrap();
        assert_eq!(tree.len(), 2);
        let root_node = tree.node(new_root);
        assert_eq!(root_node.parent, None);
        assert_eq!(root_node.prev_move, Some(Loc::point(1, 1)));
        assert_eq!(root_node.stats().visits, 1);

        let children = root_node.children().clone();
        assert_eq!(children.len(), 1);
        let child = tree.node(children[0]);
        assert_eq!(child.parent, Some(new_root));
        assert_eq!(child.stats(), NodeStats::from_sample(&sample()));
    }

    #[test]
    fn test_wait_returns_once_resolved() {
        let mut tree = SearchTree::new(4);
        let root = tree.ensure_root(Player::Black).unwrap();
        assert!(tree.node(root).try_begin_eval());

        std::thread::scope(|s| {
            let tree = &tree;
            let waiter = s.spawn(move || {
                tree.wait_while_in_flight(root);
                tree.node(root).state()
            });
            std::thread::sleep(Duration::from_millis(20));
            tree.node(root).mark_evaluated();
            tree.notify_resolved(root);
            assert_eq!(waiter.join().unwrap(), NodeState::Evaluated);
        });
    }
}
