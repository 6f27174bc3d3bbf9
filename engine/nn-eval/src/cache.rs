//! Direct-mapped output cache sharded over a pool of mutexes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::NnEvalError;
use crate::output::NnOutput;

type Shard = Vec<Option<Arc<NnOutput>>>;

/// Fixed-size cache keyed by the output's `nn_hash`.
///
/// Each key maps to exactly one slot; a colliding insert evicts whatever
/// was there. Slots are split into contiguous shards, one mutex each.
pub struct NnCache {
    shards: Vec<Mutex<Shard>>,
    slot_bits: u32,
    shard_bits: u32,
    generation: AtomicU64,
}

impl NnCache {
    /// A cache with `2^size_power_of_two` slots behind
    /// `2^mutex_pool_power_of_two` mutexes (capped at one per slot).
    pub fn new(size_power_of_two: u32, mutex_pool_power_of_two: u32) -> Result<Self, NnEvalError> {
        if size_power_of_two > 40 {
            return Err(NnEvalError::InvalidConfig(format!(
                "cache size 2^{} is too large",
                size_power_of_two
            )));
        }
        let shard_bits = mutex_pool_power_of_two.min(size_power_of_two);
        let per_shard = 1usize << (size_power_of_two - shard_bits);

        let mut shards = Vec::new();
        shards
            .try_reserve_exact(1usize << shard_bits)
            .map_err(|e| NnEvalError::ResourceExhausted(format!("cache shards: {}", e)))?;
        for _ in 0..(1usize << shard_bits) {
            let mut slots: Shard = Vec::new();
            slots
                .try_reserve_exact(per_shard)
                .map_err(|e| NnEvalError::ResourceExhausted(format!("cache slots: {}", e)))?;
            slots.resize(per_shard, None);
            shards.push(Mutex::new(slots));
        }

        Ok(Self {
            shards,
            slot_bits: size_power_of_two,
            shard_bits,
            generation: AtomicU64::new(0),
        })
    }

    pub fn capacity(&self) -> usize {
        1usize << self.slot_bits
    }

    /// Current generation. Bumped by every [`NnCache::clear`].
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn locate(&self, hash: u64) -> (usize, usize) {
        let slot = (hash & ((1u64 << self.slot_bits) - 1)) as usize;
        let per_shard_bits = self.slot_bits - self.shard_bits;
        (slot >> per_shard_bits, slot & ((1usize << per_shard_bits) - 1))
    }

    fn lock_shard(&self, shard: usize) -> MutexGuard<'_, Shard> {
        self.shards[shard]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, hash: u64) -> Option<Arc<NnOutput>> {
        let (shard, idx) = self.locate(hash);
        let slots = self.lock_shard(shard);
        slots[idx]
            .as_ref()
            .filter(|out| out.nn_hash == hash)
            .cloned()
    }

    /// Store `output` unless the cache was cleared since `generation` was
    /// read. Returns whether it was stored.
    pub fn insert(&self, output: Arc<NnOutput>, generation: u64) -> bool {
        let (shard, idx) = self.locate(output.nn_hash);
        let mut slots = self.lock_shard(shard);
        if self.generation() != generation {
            return false;
        }
        slots[idx] = Some(output);
        true
    }

    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        for shard in 0..self.shards.len() {
            self.lock_shard(shard).iter_mut().for_each(|s| *s = None);
        }
    }

    /// Number of occupied slots. Takes every lock, so only for tests and
    /// diagnostics.
    pub fn len(&self) -> usize {
        (0..self.shards.len())
            .map(|s| self.lock_shard(s).iter().filter(|e| e.is_some()).count())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
