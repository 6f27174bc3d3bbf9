//! Batched, cached inference service.
//!
//! Callers on any thread submit one position at a time through
//! [`NnEvaluator::evaluate`] and block until the result is ready. Server
//! threads pull requests off a shared queue, group them into batches, run
//! the backend and hand each caller its output through a one-shot channel.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, SyncSender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use engine_config::NnConfig;
use engine_core::{NnInputParams, NnInputs, Player, Position, Rules};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace, warn};

use crate::backend::{Backend, InputBatch, RawOutput};
use crate::cache::NnCache;
use crate::error::NnEvalError;
use crate::output::NnOutput;
use crate::symmetry::{self, num_symmetries, SymmetryPolicy, NUM_SYMMETRIES};

/// Options for the inference service.
#[derive(Debug, Clone, PartialEq)]
pub struct NnEvalOptions {
    /// Spatial width of the net. Boards must fit inside it.
    pub nn_x_len: usize,
    pub nn_y_len: usize,
    /// Largest batch handed to the backend (further capped by the backend).
    pub max_batch_size: usize,
    pub cache_size_power_of_two: u32,
    pub mutex_pool_size_power_of_two: u32,
    /// How long a partial batch waits for more rows before it is flushed.
    pub batch_wait: Duration,
    /// Softmax temperature applied to policy logits.
    pub policy_temperature: f32,
    /// Compute ownership for every row, not just rows that ask for it.
    pub always_include_ownership: bool,
}

impl Default for NnEvalOptions {
    fn default() -> Self {
        Self {
            nn_x_len: 19,
            nn_y_len: 19,
            max_batch_size: 16,
            cache_size_power_of_two: 16,
            mutex_pool_size_power_of_two: 12,
            batch_wait: Duration::from_micros(500),
            policy_temperature: 1.0,
            always_include_ownership: false,
        }
    }
}

impl NnEvalOptions {
    /// Small net and cache, suitable for tests.
    pub fn for_testing() -> Self {
        Self {
            nn_x_len: 9,
            nn_y_len: 9,
            max_batch_size: 8,
            cache_size_power_of_two: 12,
            mutex_pool_size_power_of_two: 4,
            batch_wait: Duration::from_micros(200),
            ..Default::default()
        }
    }

    pub fn from_config(config: &NnConfig) -> Self {
        Self {
            nn_x_len: config.nn_x_len,
            nn_y_len: config.nn_y_len,
            max_batch_size: config.max_batch_size,
            cache_size_power_of_two: config.cache_size_power_of_two,
            mutex_pool_size_power_of_two: config.mutex_pool_size_power_of_two,
            batch_wait: Duration::from_micros(config.batch_wait_micros),
            policy_temperature: config.policy_temperature,
            always_include_ownership: config.always_include_ownership,
        }
    }

    pub fn with_nn_len(mut self, nn_x_len: usize, nn_y_len: usize) -> Self {
        self.nn_x_len = nn_x_len;
        self.nn_y_len = nn_y_len;
        self
    }

    pub fn with_max_batch_size(mut self, n: usize) -> Self {
        self.max_batch_size = n;
        self
    }

    pub fn with_batch_wait(mut self, wait: Duration) -> Self {
        self.batch_wait = wait;
        self
    }

    pub fn with_cache_size_power_of_two(mut self, pow: u32) -> Self {
        self.cache_size_power_of_two = pow;
        self
    }

    pub fn with_policy_temperature(mut self, t: f32) -> Self {
        self.policy_temperature = t;
        self
    }

    pub fn with_always_include_ownership(mut self, on: bool) -> Self {
        self.always_include_ownership = on;
        self
    }

    pub fn validate(&self) -> Result<(), NnEvalError> {
        if self.nn_x_len == 0 || self.nn_y_len == 0 {
            return Err(NnEvalError::InvalidConfig("net dimensions must be positive".into()));
        }
        if self.nn_x_len > u8::MAX as usize || self.nn_y_len > u8::MAX as usize {
            return Err(NnEvalError::InvalidConfig(format!(
                "net {}x{} is too large",
                self.nn_x_len, self.nn_y_len
            )));
        }
        if self.max_batch_size == 0 {
            return Err(NnEvalError::InvalidConfig("max_batch_size must be positive".into()));
        }
        if self.cache_size_power_of_two > 40 {
            return Err(NnEvalError::InvalidConfig(format!(
                "cache_size_power_of_two {} is out of range",
                self.cache_size_power_of_two
            )));
        }
        if self.mutex_pool_size_power_of_two > 24 {
            return Err(NnEvalError::InvalidConfig(format!(
                "mutex_pool_size_power_of_two {} is out of range",
                self.mutex_pool_size_power_of_two
            )));
        }
        if !(self.policy_temperature > 0.0 && self.policy_temperature.is_finite()) {
            return Err(NnEvalError::InvalidConfig("policy_temperature must be positive".into()));
        }
        Ok(())
    }
}

impl SymmetryPolicy {
    pub fn from_config(config: &NnConfig) -> Self {
        if config.randomize_symmetry {
            SymmetryPolicy::Random
        } else {
            SymmetryPolicy::Fixed(config.default_symmetry % NUM_SYMMETRIES)
        }
    }
}

type Reply = Result<Arc<NnOutput>, NnEvalError>;

struct PendingRequest {
    inputs: NnInputs,
    nn_hash: u64,
    next_player: Player,
    include_ownership: bool,
    skip_cache: bool,
    generation: u64,
    reply: SyncSender<Reply>,
}

#[derive(Default)]
struct Queue {
    pending: VecDeque<PendingRequest>,
    shutdown: bool,
}

struct Shared {
    backend: Arc<dyn Backend>,
    options: NnEvalOptions,
    max_batch_size: usize,
    queue: Mutex<Queue>,
    work_ready: Condvar,
    cache: NnCache,
    num_workers: AtomicUsize,
    rows_processed: AtomicU64,
    batches_processed: AtomicU64,
    cache_hits: AtomicU64,
}

impl Shared {
    fn lock_queue(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Multi-threaded front end to a [`Backend`].
///
/// `evaluate` may be called concurrently from any number of threads and
/// searches. Dropping the evaluator stops its server threads; requests that
/// were still queued are answered first.
pub struct NnEvaluator {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl NnEvaluator {
    pub fn new(backend: Arc<dyn Backend>, options: NnEvalOptions) -> Result<Self, NnEvalError> {
        options.validate()?;
        let max_batch_size = options.max_batch_size.min(backend.max_batch_size()).max(1);
        let cache = NnCache::new(
            options.cache_size_power_of_two,
            options.mutex_pool_size_power_of_two,
        )?;
        debug!(
            backend = backend.name(),
            nn_x_len = options.nn_x_len,
            nn_y_len = options.nn_y_len,
            max_batch_size,
            cache_slots = cache.capacity(),
            "Created inference service"
        );
        Ok(Self {
            shared: Arc::new(Shared {
                backend,
                options,
                max_batch_size,
                queue: Mutex::new(Queue::default()),
                work_ready: Condvar::new(),
                cache,
                num_workers: AtomicUsize::new(0),
                rows_processed: AtomicU64::new(0),
                batches_processed: AtomicU64::new(0),
                cache_hits: AtomicU64::new(0),
            }),
            workers: Mutex::new(Vec::new()),
        })
    }

    /// Build an evaluator from the `[nn]` config section and start its
    /// server threads.
    pub fn from_config(
        backend: Arc<dyn Backend>,
        config: &NnConfig,
        seed: u64,
    ) -> Result<Self, NnEvalError> {
        let evaluator = Self::new(backend, NnEvalOptions::from_config(config))?;
        evaluator.spawn_server_threads(
            config.num_server_threads,
            SymmetryPolicy::from_config(config),
            seed,
        )?;
        Ok(evaluator)
    }

    /// Start `num_threads` more server threads. Each thread draws random
    /// symmetries from its own generator derived from `seed`.
    pub fn spawn_server_threads(
        &self,
        num_threads: usize,
        symmetry_policy: SymmetryPolicy,
        seed: u64,
    ) -> Result<(), NnEvalError> {
        if num_threads == 0 {
            return Err(NnEvalError::InvalidConfig("num_server_threads must be positive".into()));
        }
        if let SymmetryPolicy::Fixed(s) = symmetry_policy {
            if s >= num_symmetries(self.nn_x_len(), self.nn_y_len()) {
                return Err(NnEvalError::InvalidConfig(format!(
                    "symmetry {} is not available on a {}x{} net",
                    s,
                    self.nn_x_len(),
                    self.nn_y_len()
                )));
            }
        }

        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        for _ in 0..num_threads {
            let thread_idx = workers.len();
            let shared = Arc::clone(&self.shared);
            let rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(thread_idx as u64));
            let handle = std::thread::Builder::new()
                .name(format!("nn-server-{}", thread_idx))
                .spawn(move || server_loop(shared, thread_idx, symmetry_policy, rng))
                .map_err(|e| {
                    NnEvalError::ResourceExhausted(format!("spawn server thread: {}", e))
                })?;
            self.shared.num_workers.fetch_add(1, Ordering::AcqRel);
            workers.push(handle);
        }
        Ok(())
    }

    pub fn nn_x_len(&self) -> usize {
        self.shared.options.nn_x_len
    }

    pub fn nn_y_len(&self) -> usize {
        self.shared.options.nn_y_len
    }

    pub fn max_batch_size(&self) -> usize {
        self.shared.max_batch_size
    }

    pub fn num_server_threads(&self) -> usize {
        self.shared.num_workers.load(Ordering::Acquire)
    }

    pub fn options(&self) -> &NnEvalOptions {
        &self.shared.options
    }

    /// Ask the backend whether it can play under `rules`.
    pub fn check_rules_supported(&self, rules: &Rules) -> Result<(), NnEvalError> {
        self.shared
            .backend
            .supported_rules(rules)
            .map_err(NnEvalError::UnsupportedRules)
    }

    /// Evaluate `position` with `next_player` to move.
    ///
    /// Returns a shared output; cache hits return the very same `Arc` that
    /// was stored. Blocks until a server thread has processed the request.
    pub fn evaluate<P: Position>(
        &self,
        position: &P,
        next_player: Player,
        draw_equivalent_wins_for_white: f64,
        include_ownership: bool,
        skip_cache: bool,
    ) -> Result<Arc<NnOutput>, NnEvalError> {
        let (nx, ny) = (self.nn_x_len(), self.nn_y_len());
        if position.x_size() > nx || position.y_size() > ny {
            return Err(NnEvalError::BoardTooLarge {
                x_size: position.x_size(),
                y_size: position.y_size(),
                nn_x_len: nx,
                nn_y_len: ny,
            });
        }

        let include_ownership = include_ownership || self.shared.options.always_include_ownership;
        let nn_hash = request_hash(
            position.nn_hash(),
            next_player,
            draw_equivalent_wins_for_white,
            nx,
            ny,
        );

        if !skip_cache {
            if let Some(hit) = self.shared.cache.get(nn_hash) {
                if hit.has_ownership() || !include_ownership {
                    self.shared.cache_hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(hit);
                }
            }
        }

        if self.num_server_threads() == 0 {
            return Err(NnEvalError::NoServerThreads);
        }

        let params = NnInputParams {
            next_player,
            draw_equivalent_wins_for_white,
        };
        let inputs = position.fill_nn_inputs(&params, nx, ny);
        let (reply, receiver) = mpsc::sync_channel(1);
        let request = PendingRequest {
            inputs,
            nn_hash,
            next_player,
            include_ownership,
            skip_cache,
            generation: self.shared.cache.generation(),
            reply,
        };

        {
            let mut queue = self.shared.lock_queue();
            if queue.shutdown {
                return Err(NnEvalError::ServiceStopped);
            }
            queue
                .pending
                .try_reserve(1)
                .map_err(|e| NnEvalError::ResourceExhausted(format!("request queue: {}", e)))?;
            queue.pending.push_back(request);
        }
        self.shared.work_ready.notify_one();

        receiver.recv().map_err(|_| NnEvalError::ServiceStopped)?
    }

    /// Drop every cached output. Results of requests submitted before the
    /// clear are still returned to their callers but not cached.
    pub fn clear_cache(&self) {
        self.shared.cache.clear();
    }

    pub fn clear_stats(&self) {
        self.shared.rows_processed.store(0, Ordering::Relaxed);
        self.shared.batches_processed.store(0, Ordering::Relaxed);
        self.shared.cache_hits.store(0, Ordering::Relaxed);
    }

    pub fn num_rows_processed(&self) -> u64 {
        self.shared.rows_processed.load(Ordering::Relaxed)
    }

    pub fn num_batches_processed(&self) -> u64 {
        self.shared.batches_processed.load(Ordering::Relaxed)
    }

    pub fn average_processed_batch_size(&self) -> f64 {
        let batches = self.num_batches_processed();
        if batches == 0 {
            return 0.0;
        }
        self.num_rows_processed() as f64 / batches as f64
    }

    pub fn num_cache_hits(&self) -> u64 {
        self.shared.cache_hits.load(Ordering::Relaxed)
    }
}

impl Drop for NnEvaluator {
    fn drop(&mut self) {
        self.shared.lock_queue().shutdown = true;
        self.shared.work_ready.notify_all();

        let workers = self.workers.get_mut().unwrap_or_else(PoisonError::into_inner);
        let workers = std::mem::take(workers);
        for handle in workers {
            if handle.join().is_err() {
                warn!("Inference server thread panicked");
            }
        }

        // Anything left (only possible if every worker died) gets an error.
        let mut queue = self.shared.lock_queue();
        for request in queue.pending.drain(..) {
            let _ = request.reply.send(Err(NnEvalError::ServiceStopped));
        }
    }
}

fn mix64(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

/// Cache key: the position's own hash plus everything else that changes the
/// encoded inputs.
fn request_hash(
    position_hash: u64,
    next_player: Player,
    draw_equivalent_wins_for_white: f64,
    nx: usize,
    ny: usize,
) -> u64 {
    let mut h = mix64(position_hash);
    h = mix64(h ^ (next_player as u64 + 1));
    h = mix64(h ^ draw_equivalent_wins_for_white.to_bits());
    mix64(h ^ ((nx as u64) << 32 | ny as u64))
}

fn server_loop(
    shared: Arc<Shared>,
    thread_idx: usize,
    symmetry_policy: SymmetryPolicy,
    mut rng: ChaCha8Rng,
) {
    debug!(thread_idx, ?symmetry_policy, "Inference server thread started");
    let max_batch = shared.max_batch_size;
    let wait = shared.options.batch_wait;

    loop {
        let batch: Vec<PendingRequest> = {
            let mut queue = shared.lock_queue();
            while queue.pending.is_empty() && !queue.shutdown {
                queue = shared
                    .work_ready
                    .wait(queue)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            if queue.pending.is_empty() {
                break;
            }

            // Let the batch grow while requests keep arriving.
            let mut last_len = queue.pending.len();
            while last_len < max_batch && !queue.shutdown {
                let (guard, _) = shared
                    .work_ready
                    .wait_timeout(queue, wait)
                    .unwrap_or_else(PoisonError::into_inner);
                queue = guard;
                let len = queue.pending.len();
                if len <= last_len {
                    break;
                }
                last_len = len;
            }

            let n = queue.pending.len().min(max_batch);
            let batch = queue.pending.drain(..n).collect();
            if !queue.pending.is_empty() {
                shared.work_ready.notify_one();
            }
            batch
        };
        if batch.is_empty() {
            continue;
        }
        process_batch(&shared, batch, symmetry_policy, &mut rng);
    }

    shared.num_workers.fetch_sub(1, Ordering::AcqRel);
    debug!(thread_idx, "Inference server thread stopped");
}

fn process_batch(
    shared: &Shared,
    batch: Vec<PendingRequest>,
    symmetry_policy: SymmetryPolicy,
    rng: &mut ChaCha8Rng,
) {
    let (nx, ny) = (shared.options.nn_x_len, shared.options.nn_y_len);
    let nsym = num_symmetries(nx, ny);
    let symmetries: Vec<u8> = batch
        .iter()
        .map(|_| match symmetry_policy {
            SymmetryPolicy::Fixed(s) => s % nsym,
            SymmetryPolicy::Random => rng.gen_range(0..nsym),
        })
        .collect();
    let want_ownership = batch.iter().any(|r| r.include_ownership);

    let input = InputBatch {
        nn_x_len: nx,
        nn_y_len: ny,
        rows: batch
            .iter()
            .zip(&symmetries)
            .map(|(r, &s)| symmetry::apply_to_inputs(s, &r.inputs))
            .collect(),
        symmetries: symmetries.clone(),
        want_ownership,
    };

    let batch_num = shared.batches_processed.fetch_add(1, Ordering::Relaxed) + 1;
    let outputs = shared
        .backend
        .evaluate_batch(&input)
        .map_err(NnEvalError::from)
        .and_then(|raw| finish_rows(shared, &batch, &symmetries, raw));

    match outputs {
        Ok(outputs) => {
            shared.rows_processed.fetch_add(batch.len() as u64, Ordering::Relaxed);
            trace!(batch_size = batch.len(), "Processed batch");
            if batch_num % 1000 == 0 {
                let rows = shared.rows_processed.load(Ordering::Relaxed);
                debug!(
                    batches = batch_num,
                    avg_batch_size = rows as f64 / batch_num as f64,
                    cache_hits = shared.cache_hits.load(Ordering::Relaxed),
                    "Inference stats"
                );
            }
            for (request, output) in batch.into_iter().zip(outputs) {
                if !request.skip_cache {
                    shared.cache.insert(Arc::clone(&output), request.generation);
                }
                let _ = request.reply.send(Ok(output));
            }
        }
        Err(e) => {
            warn!(batch_size = batch.len(), error = %e, "Backend failed on batch");
            for request in batch {
                let _ = request.reply.send(Err(e.clone()));
            }
        }
    }
}

/// Convert every raw row; any malformed row fails the whole batch.
fn finish_rows(
    shared: &Shared,
    batch: &[PendingRequest],
    symmetries: &[u8],
    raw: Vec<RawOutput>,
) -> Result<Vec<Arc<NnOutput>>, NnEvalError> {
    if raw.len() != batch.len() {
        return Err(NnEvalError::Backend(format!(
            "backend returned {} rows for a batch of {}",
            raw.len(),
            batch.len()
        )));
    }
    batch
        .iter()
        .zip(symmetries)
        .zip(raw)
        .map(|((request, &sym), raw)| {
            NnOutput::from_raw(
                raw,
                &request.inputs,
                sym,
                request.next_player,
                shared.options.policy_temperature,
                request.nn_hash,
                request.include_ownership,
            )
            .map(Arc::new)
        })
        .collect()
}
