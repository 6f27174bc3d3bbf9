//! Tests for the inference service.

use super::*;
use engine_core::features::spatial;
use engine_core::{Loc, Player, Position, Rules, ScoringRule};
use games_go::Board;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::{Duration, Instant};

fn service(backend: Arc<dyn Backend>, options: NnEvalOptions) -> NnEvaluator {
    let eval = NnEvaluator::new(backend, options).unwrap();
    eval.spawn_server_threads(2, SymmetryPolicy::Fixed(0), 1).unwrap();
    eval
}

fn board_9x9() -> Board {
    Board::new(9, 9, Rules::tromp_taylor()).unwrap()
}

/// Puts a large logit on every point holding a stone of the player to move.
struct OwnStoneBackend;

impl Backend for OwnStoneBackend {
    fn name(&self) -> &str {
        "own-stone"
    }

    fn evaluate_batch(&self, batch: &InputBatch) -> Result<Vec<RawOutput>, BackendError> {
        let area = batch.nn_x_len * batch.nn_y_len;
        Ok(batch
            .rows
            .iter()
            .map(|row| {
                let mut policy_logits: Vec<f32> =
                    row.plane(spatial::OWN_STONES).iter().map(|v| v * 10.0).collect();
                policy_logits.push(0.0);
                RawOutput {
                    policy_logits,
                    value_logits: [0.0, 0.0, -20.0],
                    score_mean: 0.0,
                    score_stdev: 1.0,
                    lead: 0.0,
                    ownership: batch
                        .want_ownership
                        .then(|| row.plane(spatial::OWN_STONES)[..area].to_vec()),
                }
            })
            .collect())
    }
}

struct FailingBackend;

impl Backend for FailingBackend {
    fn name(&self) -> &str {
        "failing"
    }

    fn evaluate_batch(&self, _batch: &InputBatch) -> Result<Vec<RawOutput>, BackendError> {
        Err(BackendError::EvaluationFailed("device lost".into()))
    }
}

struct AreaOnlyBackend;

impl Backend for AreaOnlyBackend {
    fn name(&self) -> &str {
        "area-only"
    }

    fn supported_rules(&self, rules: &Rules) -> Result<(), String> {
        match rules.scoring {
            ScoringRule::Area => Ok(()),
            ScoringRule::Territory => Err("territory scoring".into()),
        }
    }

    fn evaluate_batch(&self, batch: &InputBatch) -> Result<Vec<RawOutput>, BackendError> {
        UniformBackend.evaluate_batch(batch)
    }
}

/// Uniform outputs, recording the size of every batch it sees.
#[derive(Default)]
struct CountingBackend {
    max_seen: AtomicUsize,
}

impl Backend for CountingBackend {
    fn name(&self) -> &str {
        "counting"
    }

    fn evaluate_batch(&self, batch: &InputBatch) -> Result<Vec<RawOutput>, BackendError> {
        self.max_seen.fetch_max(batch.len(), Ordering::SeqCst);
        UniformBackend.evaluate_batch(batch)
    }
}

#[test]
fn test_options_validation() {
    assert!(NnEvalOptions::default().validate().is_ok());
    assert!(NnEvalOptions::for_testing().validate().is_ok());
    assert!(matches!(
        NnEvalOptions::default().with_max_batch_size(0).validate(),
        Err(NnEvalError::InvalidConfig(_))
    ));
    assert!(NnEvalOptions::default().with_cache_size_power_of_two(63).validate().is_err());
    assert!(NnEvalOptions::default().with_policy_temperature(0.0).validate().is_err());
    assert!(NnEvaluator::new(
        Arc::new(UniformBackend),
        NnEvalOptions::default().with_nn_len(0, 9)
    )
    .is_err());
}

#[test]
fn test_options_from_config() {
    let config = engine_config::NnConfig {
        nn_x_len: 9,
        nn_y_len: 7,
        batch_wait_micros: 1234,
        randomize_symmetry: true,
        ..Default::default()
    };
    let options = NnEvalOptions::from_config(&config);
    assert_eq!(options.nn_x_len, 9);
    assert_eq!(options.nn_y_len, 7);
    assert_eq!(options.batch_wait, Duration::from_micros(1234));
    assert_eq!(SymmetryPolicy::from_config(&config), SymmetryPolicy::Random);
}

#[test]
fn test_cache_hit_returns_same_output() {
    let eval = service(Arc::new(UniformBackend), NnEvalOptions::for_testing());
    let b = board_9x9();

    let first = eval.evaluate(&b, Player::Black, 0.5, false, false).unwrap();
    let second = eval.evaluate(&b, Player::Black, 0.5, false, false).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(eval.num_rows_processed(), 1);
    assert_eq!(eval.num_batches_processed(), 1);
    assert_eq!(eval.num_cache_hits(), 1);

    // Different perspective is a different key
    let other = eval.evaluate(&b, Player::White, 0.5, false, false).unwrap();
    assert!(!Arc::ptr_eq(&first, &other));
    assert_eq!(eval.num_rows_processed(), 2);
}

#[test]
fn test_skip_cache_always_recomputes() {
    let eval = service(Arc::new(UniformBackend), NnEvalOptions::for_testing());
    let b = board_9x9();

    let first = eval.evaluate(&b, Player::Black, 0.5, false, true).unwrap();
    let second = eval.evaluate(&b, Player::Black, 0.5, false, true).unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(*first, *second);
    assert_eq!(eval.num_rows_processed(), 2);
    assert_eq!(eval.num_batches_processed(), 2);
    assert_eq!(eval.num_cache_hits(), 0);
}

#[test]
fn test_entry_without_ownership_misses_ownership_request() {
    let eval = service(Arc::new(UniformBackend), NnEvalOptions::for_testing());
    let b = board_9x9();

    let plain = eval.evaluate(&b, Player::Black, 0.5, false, false).unwrap();
    assert!(!plain.has_ownership());

    let owned = eval.evaluate(&b, Player::Black, 0.5, true, false).unwrap();
    assert!(owned.has_ownership());
    assert_eq!(eval.num_rows_processed(), 2);

    // Now cached with ownership, which also serves plain requests
    let again = eval.evaluate(&b, Player::Black, 0.5, false, false).unwrap();
    assert!(Arc::ptr_eq(&owned, &again));
}

#[test]
fn test_clear_cache_and_stats() {
    let eval = service(Arc::new(UniformBackend), NnEvalOptions::for_testing());
    let b = board_9x9();

    eval.evaluate(&b, Player::Black, 0.5, false, false).unwrap();
    eval.clear_cache();
    eval.evaluate(&b, Player::Black, 0.5, false, false).unwrap();
    assert_eq!(eval.num_rows_processed(), 2);
    assert_eq!(eval.num_cache_hits(), 0);
    assert!(eval.average_processed_batch_size() >= 1.0);

    eval.clear_stats();
    assert_eq!(eval.num_rows_processed(), 0);
    assert_eq!(eval.num_batches_processed(), 0);
    assert_eq!(eval.average_processed_batch_size(), 0.0);
}

#[test]
fn test_no_server_threads() {
    let eval = NnEvaluator::new(Arc::new(UniformBackend), NnEvalOptions::for_testing()).unwrap();
    assert_eq!(
        eval.evaluate(&board_9x9(), Player::Black, 0.5, false, false),
        Err(NnEvalError::NoServerThreads)
    );
    assert!(eval
        .spawn_server_threads(0, SymmetryPolicy::Random, 0)
        .is_err());
}

#[test]
fn test_board_too_large() {
    let eval = service(Arc::new(UniformBackend), NnEvalOptions::for_testing());
    let big = Board::new(13, 13, Rules::tromp_taylor()).unwrap();
    assert!(matches!(
        eval.evaluate(&big, Player::Black, 0.5, false, false),
        Err(NnEvalError::BoardTooLarge { x_size: 13, .. })
    ));
}

#[test]
fn test_smaller_board_fits_net() {
    let eval = service(Arc::new(UniformBackend), NnEvalOptions::for_testing());
    let small = Board::new(5, 5, Rules::tromp_taylor()).unwrap();
    let out = eval.evaluate(&small, Player::Black, 0.5, false, false).unwrap();

    // 25 points plus pass are legal, off-board slots are not
    let legal = out.policy_probs.iter().filter(|&&p| p >= 0.0).count();
    assert_eq!(legal, 26);
    assert!(out.policy_prob(Loc::point(6, 6)).is_none());
    assert!((out.policy_prob(Loc::Pass).unwrap() - 1.0 / 26.0).abs() < 1e-6);
}

#[test]
fn test_unsupported_rules() {
    let eval = service(Arc::new(AreaOnlyBackend), NnEvalOptions::for_testing());
    assert!(eval.check_rules_supported(&Rules::tromp_taylor()).is_ok());
    assert!(matches!(
        eval.check_rules_supported(&Rules::simple_territory()),
        Err(NnEvalError::UnsupportedRules(_))
    ));
}

#[test]
fn test_backend_failure_reaches_caller() {
    let eval = service(Arc::new(FailingBackend), NnEvalOptions::for_testing());
    let result = eval.evaluate(&board_9x9(), Player::Black, 0.5, false, false);

    assert!(matches!(result, Err(NnEvalError::Backend(ref m)) if m.contains("device lost")));
    assert_eq!(eval.num_rows_processed(), 0);
    assert_eq!(eval.num_batches_processed(), 1);
}

#[test]
fn test_outputs_are_mapped_back_from_every_symmetry() {
    let b = Board::parse(
        Rules::tromp_taylor(),
        "
        .........
        .......x.
        .........
        .........
        .........
        .........
        .........
        .........
        .........
        ",
    )
    .unwrap()
    .with_next_player(Player::Black);

    for policy in (0..8).map(SymmetryPolicy::Fixed).chain([SymmetryPolicy::Random]) {
        let eval =
            NnEvaluator::new(Arc::new(OwnStoneBackend), NnEvalOptions::for_testing()).unwrap();
        eval.spawn_server_threads(1, policy, 3).unwrap();
        let out = eval.evaluate(&b, Player::Black, 0.5, true, true).unwrap();

        // The stone's own point is illegal, so its ownership is what moves
        assert_eq!(out.policy_prob(Loc::point(7, 1)), None);
        let own = out.white_ownership_at(7, 1).unwrap();
        assert_eq!(own, -1.0, "symmetry policy {:?}", policy);
        assert_eq!(out.white_ownership_at(1, 7), Some(0.0));
    }
}

#[test]
fn test_rectangular_net_rejects_transposing_symmetry() {
    let eval = NnEvaluator::new(
        Arc::new(UniformBackend),
        NnEvalOptions::for_testing().with_nn_len(9, 7),
    )
    .unwrap();
    assert!(eval.spawn_server_threads(1, SymmetryPolicy::Fixed(4), 0).is_err());
    assert!(eval.spawn_server_threads(1, SymmetryPolicy::Fixed(3), 0).is_ok());
}

#[test]
fn test_concurrent_requests_are_batched() {
    let backend = Arc::new(CountingBackend::default());
    let options = NnEvalOptions::for_testing()
        .with_max_batch_size(8)
        .with_batch_wait(Duration::from_millis(50));
    let eval = NnEvaluator::new(backend.clone(), options).unwrap();
    eval.spawn_server_threads(1, SymmetryPolicy::Fixed(0), 0).unwrap();

    let barrier = Barrier::new(8);
    std::thread::scope(|s| {
        for i in 0..8 {
            let eval = &eval;
            let barrier = &barrier;
            s.spawn(move || {
                let b = board_9x9().play(Loc::point(i, 0)).unwrap();
                barrier.wait();
                eval.evaluate(&b, Player::White, 0.5, false, true).unwrap();
            });
        }
    });

    assert_eq!(eval.num_rows_processed(), 8);
    assert!(eval.num_batches_processed() < 8);
    assert!(backend.max_seen.load(Ordering::SeqCst) > 1);
}

#[test]
fn test_lone_request_is_served_after_one_stall() {
    let options = NnEvalOptions::for_testing().with_batch_wait(Duration::from_millis(100));
    let eval = service(Arc::new(UniformBackend), options);

    let start = Instant::now();
    eval.evaluate(&board_9x9(), Player::Black, 0.5, false, false).unwrap();
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(eval.num_batches_processed(), 1);
}

#[test]
fn test_drop_joins_server_threads() {
    let eval = service(Arc::new(RandomBackend::new(1)), NnEvalOptions::for_testing());
    let out = eval.evaluate(&board_9x9(), Player::Black, 0.5, true, false).unwrap();
    drop(eval);
    // Outputs outlive the service
    assert!(out.has_ownership());
}

#[test]
fn test_always_include_ownership() {
    let eval = service(
        Arc::new(UniformBackend),
        NnEvalOptions::for_testing().with_always_include_ownership(true),
    );
    let out = eval.evaluate(&board_9x9(), Player::Black, 0.5, false, false).unwrap();
    assert!(out.has_ownership());
}
