//! Shared helpers for the search integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use engine_core::features::spatial;
use engine_core::{Rules, ScoringRule};
use games_go::Board;
use nn_eval::{
    Backend, BackendError, InputBatch, NnEvalOptions, NnEvaluator, RawOutput, SymmetryPolicy,
};

/// Install a test subscriber once. Later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// An evaluator for a 9x9 net with two server threads.
pub fn evaluator(backend: impl Backend + 'static) -> Arc<NnEvaluator> {
    evaluator_with(Arc::new(backend), NnEvalOptions::for_testing(), 2)
}

pub fn evaluator_with(
    backend: Arc<dyn Backend>,
    options: NnEvalOptions,
    threads: usize,
) -> Arc<NnEvaluator> {
    init_tracing();
    let eval = NnEvaluator::new(backend, options).unwrap();
    eval.spawn_server_threads(threads, SymmetryPolicy::Fixed(0), 1234).unwrap();
    Arc::new(eval)
}

pub fn board(rules: Rules, text: &str) -> Board {
    Board::parse(rules, text).unwrap()
}

pub fn tromp_taylor(text: &str) -> Board {
    board(Rules::tromp_taylor(), text)
}

fn count(plane: &[f32]) -> f32 {
    plane.iter().filter(|&&v| v > 0.5).count() as f32
}

/// Flat policy, value and score driven by the stone count difference of the
/// player to move.
#[derive(Debug, Default)]
pub struct MaterialBackend;

impl Backend for MaterialBackend {
    fn name(&self) -> &str {
        "material"
    }

    fn evaluate_batch(&self, batch: &InputBatch) -> Result<Vec<RawOutput>, BackendError> {
        let area = batch.nn_x_len * batch.nn_y_len;
        Ok(batch
            .rows
            .iter()
            .map(|row| {
                let own = count(row.plane(spatial::OWN_STONES));
                let diff = own - count(row.plane(spatial::OPP_STONES));
                RawOutput {
                    policy_logits: vec![0.0; area + 1],
                    value_logits: [0.1 * diff, 0.0, -20.0],
                    score_mean: diff,
                    score_stdev: 1.0,
                    lead: diff,
                    ownership: batch.want_ownership.then(|| vec![0.0; area]),
                }
            })
            .collect())
    }
}

/// Neutral outputs with a strong preference for passing.
#[derive(Debug, Default)]
pub struct PassHeavyBackend;

impl Backend for PassHeavyBackend {
    fn name(&self) -> &str {
        "pass-heavy"
    }

    fn evaluate_batch(&self, batch: &InputBatch) -> Result<Vec<RawOutput>, BackendError> {
        let area = batch.nn_x_len * batch.nn_y_len;
        Ok(batch
            .rows
            .iter()
            .map(|_| {
                let mut policy_logits = vec![0.0; area + 1];
                policy_logits[area] = 5.0;
                RawOutput {
                    policy_logits,
                    value_logits: [0.0, 0.0, -20.0],
                    score_mean: 0.0,
                    score_stdev: 0.0,
                    lead: 0.0,
                    ownership: batch.want_ownership.then(|| vec![0.0; area]),
                }
            })
            .collect())
    }
}

/// Serves `ok_batches` batches with neutral outputs, then fails every batch.
#[derive(Debug)]
pub struct FailAfterBackend {
    remaining: AtomicUsize,
}

impl FailAfterBackend {
    pub fn new(ok_batches: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(ok_batches),
        }
    }
}

impl Backend for FailAfterBackend {
    fn name(&self) -> &str {
        "fail-after"
    }

    fn evaluate_batch(&self, batch: &InputBatch) -> Result<Vec<RawOutput>, BackendError> {
        let left = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if left.is_err() {
            return Err(BackendError::EvaluationFailed("device lost".to_string()));
        }
        let area = batch.nn_x_len * batch.nn_y_len;
        Ok(batch
            .rows
            .iter()
            .map(|_| RawOutput {
                policy_logits: vec![0.0; area + 1],
                value_logits: [0.0, 0.0, -20.0],
                score_mean: 0.0,
                score_stdev: 1.0,
                lead: 0.0,
                ownership: batch.want_ownership.then(|| vec![0.0; area]),
            })
            .collect())
    }
}

/// Uniform outputs, but only under area scoring.
#[derive(Debug, Default)]
pub struct AreaOnlyBackend;

impl Backend for AreaOnlyBackend {
    fn name(&self) -> &str {
        "area-only"
    }

    fn supported_rules(&self, rules: &Rules) -> Result<(), String> {
        match rules.scoring {
            ScoringRule::Area => Ok(()),
            ScoringRule::Territory => Err("model was trained on area scoring only".to_string()),
        }
    }

    fn evaluate_batch(&self, batch: &InputBatch) -> Result<Vec<RawOutput>, BackendError> {
        nn_eval::UniformBackend::new().evaluate_batch(batch)
    }
}
