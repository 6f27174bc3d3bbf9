//! Backend trait for batched forward passes.
//!
//! A backend turns a batch of encoded positions into raw network outputs.
//! Everything above the forward pass (batching, symmetries, softmax,
//! perspective conversion, caching) is handled by [`crate::NnEvaluator`].
//! For testing, two backends that need no model are provided.

use engine_core::{NnInputs, Rules};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

/// Errors a backend can report for a batch.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error("Model error: {0}")]
    ModelError(String),
}

/// One batch of inputs at fixed spatial dimensions.
#[derive(Debug, Clone)]
pub struct InputBatch {
    pub nn_x_len: usize,
    pub nn_y_len: usize,
    /// Encoded rows, already transformed by their symmetry.
    pub rows: Vec<NnInputs>,
    /// Symmetry applied to each row. Informational: outputs are expected in
    /// the transformed orientation and are mapped back by the caller.
    pub symmetries: Vec<u8>,
    /// Whether ownership maps are wanted for this batch.
    pub want_ownership: bool,
}

impl InputBatch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Raw outputs for one row, from the perspective of the player to move.
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutput {
    /// `nn_x_len * nn_y_len + 1` logits, pass last.
    pub policy_logits: Vec<f32>,
    /// Logits for win, loss and no result.
    pub value_logits: [f32; 3],
    pub score_mean: f32,
    pub score_stdev: f32,
    pub lead: f32,
    /// Per-point ownership in `[-1, 1]`, positive for the player to move.
    pub ownership: Option<Vec<f32>>,
}

/// Trait for inference backends.
///
/// Implementations could be:
/// - UniformBackend: flat policy and neutral value (for testing)
/// - RandomBackend: deterministic pseudo-random outputs (for search testing)
/// - a real network running on some accelerator
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;

    /// Largest batch the backend accepts.
    fn max_batch_size(&self) -> usize {
        usize::MAX
    }

    /// Reject rule variants the loaded model cannot handle.
    fn supported_rules(&self, _rules: &Rules) -> Result<(), String> {
        Ok(())
    }

    /// Run a forward pass over every row. Must return exactly one output per
    /// row, in order.
    fn evaluate_batch(&self, batch: &InputBatch) -> Result<Vec<RawOutput>, BackendError>;
}

/// Backend that assigns equal logits to every move and a neutral value.
/// Useful for testing the search without a model.
#[derive(Debug, Clone, Default)]
pub struct UniformBackend;

impl UniformBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for UniformBackend {
    fn name(&self) -> &str {
        "uniform"
    }

    fn evaluate_batch(&self, batch: &InputBatch) -> Result<Vec<RawOutput>, BackendError> {
        let policy_len = batch.nn_x_len * batch.nn_y_len + 1;
        let area = batch.nn_x_len * batch.nn_y_len;
        Ok(batch
            .rows
            .iter()
            .map(|_| RawOutput {
                policy_logits: vec![0.0; policy_len],
                value_logits: [0.0, 0.0, -20.0],
                score_mean: 0.0,
                score_stdev: 0.0,
                lead: 0.0,
                ownership: batch.want_ownership.then(|| vec![0.0; area]),
            })
            .collect())
    }
}

/// Backend that produces pseudo-random but reproducible outputs.
///
/// Each row's outputs are drawn from a generator seeded by the row's input
/// contents, so identical inputs always produce identical outputs and the
/// ownership request does not perturb the other outputs.
#[derive(Debug, Clone)]
pub struct RandomBackend {
    seed: u64,
}

impl RandomBackend {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    fn row_seed(&self, row: &NnInputs) -> u64 {
        let mut h = self.seed ^ 0x9e37_79b9_7f4a_7c15;
        for v in row.spatial.iter().chain(row.global.iter()) {
            h = (h ^ v.to_bits() as u64).wrapping_mul(0x0000_0100_0000_01b3);
            h ^= h >> 29;
        }
        h
    }
}

impl Default for RandomBackend {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Backend for RandomBackend {
    fn name(&self) -> &str {
        "random"
    }

    fn evaluate_batch(&self, batch: &InputBatch) -> Result<Vec<RawOutput>, BackendError> {
        let policy_len = batch.nn_x_len * batch.nn_y_len + 1;
        let area = batch.nn_x_len * batch.nn_y_len;
        Ok(batch
            .rows
            .iter()
            .map(|row| {
                let mut rng = ChaCha8Rng::seed_from_u64(self.row_seed(row));
                let policy_logits = (0..policy_len).map(|_| rng.gen_range(-2.0..2.0)).collect();
                let value_logits = [rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), -8.0];
                let score_mean = rng.gen_range(-10.0..10.0);
                let score_stdev = rng.gen_range(2.0..12.0);
                let lead = score_mean * 0.8;
                let ownership = batch
                    .want_ownership
                    .then(|| (0..area).map(|_| rng.gen_range(-1.0..1.0)).collect());
                RawOutput {
                    policy_logits,
                    value_logits,
                    score_mean,
                    score_stdev,
                    lead,
                    ownership,
                }
            })
            .collect())
    }
}
