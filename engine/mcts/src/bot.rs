//! Synchronous facade over a search.
//!
//! A [`Bot`] can be shared between threads. Every operation takes the
//! search lock for its whole duration, so calls never interleave.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use engine_core::{Loc, Position};
use nn_eval::NnEvaluator;
use tracing::{info, warn};

use crate::config::SearchParams;
use crate::search::{Search, SearchError};

pub struct Bot<P: Position> {
    search: Mutex<Search<P>>,
}

impl<P: Position> Bot<P> {
    pub fn new(
        params: SearchParams,
        nn_eval: Arc<NnEvaluator>,
        seed: u64,
    ) -> Result<Self, SearchError> {
        Ok(Self {
            search: Mutex::new(Search::new(params, nn_eval, seed)?),
        })
    }

    /// Exclusive access to the underlying search, for introspection.
    ///
    /// A panic in another caller does not wedge the bot. Its tree may hold
    /// nodes still marked in flight, so the search is cleared before it is
    /// handed out again. The position and params are kept.
    pub fn search(&self) -> MutexGuard<'_, Search<P>> {
        match self.search.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("search lock poisoned by a panicking caller, clearing the tree");
                let mut guard = poisoned.into_inner();
                guard.clear_search();
                self.search.clear_poison();
                guard
            }
        }
    }

    pub fn set_position(&self, position: P) -> Result<(), SearchError> {
        self.search().set_position(position)
    }

    pub fn set_params(&self, params: SearchParams) -> Result<(), SearchError> {
        self.search().set_params(params)
    }

    pub fn clear_search(&self) {
        self.search().clear_search()
    }

    pub fn make_move(&self, loc: Loc) -> Result<(), SearchError> {
        self.search().make_move(loc)
    }

    /// Search the current position and return the move to play.
    ///
    /// `time_limit` counts from the call, including any wait for the lock.
    pub fn gen_move_synchronous(&self, time_limit: Option<Duration>) -> Result<Loc, SearchError> {
        let start = Instant::now();
        let deadline = time_limit.and_then(|limit| start.checked_add(limit));
        let mut search = self.search();
        let stats = search.run_whole_search(deadline)?;
        let loc = search.get_chosen_move_loc()?;

        let mv = search
            .root_position()
            .map_or_else(|| format!("{:?}", loc), |p| p.loc_to_string(loc));
        info!(
            mv = %mv,
            visits = stats.root_visits,
            playouts = stats.playouts,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Generated move"
        );
        Ok(loc)
    }
}
