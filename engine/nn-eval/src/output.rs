//! Post-processed network outputs.

use engine_core::{Loc, NnInputs, Player};

use crate::backend::RawOutput;
use crate::error::NnEvalError;
use crate::symmetry;

/// Network output for one position, converted to white's perspective.
///
/// Shared between the cache and every search node that used it, so it is
/// immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct NnOutput {
    /// Cache key this output was computed for.
    pub nn_hash: u64,
    pub nn_x_len: usize,
    pub nn_y_len: usize,
    pub white_win_prob: f32,
    pub white_loss_prob: f32,
    pub white_no_result_prob: f32,
    pub white_score_mean: f32,
    /// `mean^2 + stdev^2` of the score distribution.
    pub white_score_mean_sq: f32,
    pub white_lead: f32,
    /// Move probabilities in policy order. Illegal moves hold `-1.0`.
    pub policy_probs: Vec<f32>,
    /// Per-point ownership in `[-1, 1]`, positive for white.
    pub white_owner_map: Option<Vec<f32>>,
}

impl NnOutput {
    /// Probability of `loc`, or `None` when it is illegal or off the net.
    pub fn policy_prob(&self, loc: Loc) -> Option<f32> {
        let idx = loc.policy_index(self.nn_x_len, self.nn_y_len);
        self.policy_probs.get(idx).copied().filter(|&p| p >= 0.0)
    }

    pub fn has_ownership(&self) -> bool {
        self.white_owner_map.is_some()
    }

    /// White's ownership of `(x, y)`, if ownership was computed.
    pub fn white_ownership_at(&self, x: usize, y: usize) -> Option<f32> {
        self.white_owner_map
            .as_ref()
            .map(|m| m[y * self.nn_x_len + x])
    }

    /// Turn a raw row into a finished output.
    ///
    /// `raw` is in the orientation given by `symmetry`; `inputs` is the
    /// untransformed encoding whose legal mask drives the softmax.
    pub(crate) fn from_raw(
        raw: RawOutput,
        inputs: &NnInputs,
        symmetry: u8,
        next_player: Player,
        policy_temperature: f32,
        nn_hash: u64,
        keep_ownership: bool,
    ) -> Result<Self, NnEvalError> {
        let (nx, ny) = (inputs.nn_x_len, inputs.nn_y_len);
        validate_raw(&raw, nx, ny)?;

        let logits = symmetry::unapply_to_values(symmetry, &raw.policy_logits, nx, ny);
        let policy_probs = masked_softmax(&logits, &inputs.legal, policy_temperature);

        let [win, loss, no_result] = softmax3(raw.value_logits);
        let sign = next_player.white_sign() as f32;
        let (white_win_prob, white_loss_prob) = match next_player {
            Player::White => (win, loss),
            Player::Black => (loss, win),
        };
        let stdev = raw.score_stdev.max(0.0);
        let white_score_mean = sign * raw.score_mean;

        let white_owner_map = match raw.ownership {
            Some(own) if keep_ownership => Some(
                symmetry::unapply_to_values(symmetry, &own, nx, ny)
                    .into_iter()
                    .map(|v| (sign * v).clamp(-1.0, 1.0))
                    .collect(),
            ),
            _ => None,
        };

        Ok(Self {
            nn_hash,
            nn_x_len: nx,
            nn_y_len: ny,
            white_win_prob,
            white_loss_prob,
            white_no_result_prob: no_result,
            white_score_mean,
            white_score_mean_sq: raw.score_mean * raw.score_mean + stdev * stdev,
            white_lead: sign * raw.lead,
            policy_probs,
            white_owner_map,
        })
    }
}

fn validate_raw(raw: &RawOutput, nx: usize, ny: usize) -> Result<(), NnEvalError> {
    let area = nx * ny;
    if raw.policy_logits.len() != area + 1 {
        return Err(NnEvalError::Backend(format!(
            "policy has {} entries, expected {}",
            raw.policy_logits.len(),
            area + 1
        )));
    }
    if let Some(own) = &raw.ownership {
        if own.len() != area {
            return Err(NnEvalError::Backend(format!(
                "ownership has {} entries, expected {}",
                own.len(),
                area
            )));
        }
    }
    let scalars = [raw.score_mean, raw.score_stdev, raw.lead];
    if raw.value_logits.iter().chain(scalars.iter()).any(|v| !v.is_finite()) {
        return Err(NnEvalError::Backend("non-finite value output".to_string()));
    }
    Ok(())
}

fn softmax3(logits: [f32; 3]) -> [f32; 3] {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let e = logits.map(|l| (l - max).exp());
    let sum: f32 = e.iter().sum();
    e.map(|v| v / sum)
}

/// Softmax over legal entries only, with logits divided by `temperature`.
/// Illegal entries are set to `-1.0`. Non-finite logits on legal moves are
/// treated as zero probability mass.
pub fn masked_softmax(logits: &[f32], legal: &[bool], temperature: f32) -> Vec<f32> {
    debug_assert_eq!(logits.len(), legal.len());
    let temperature = temperature.max(1e-6);
    let max = logits
        .iter()
        .zip(legal)
        .filter(|(l, &ok)| ok && l.is_finite())
        .map(|(&l, _)| l)
        .fold(f32::NEG_INFINITY, f32::max);

    let mut out: Vec<f32> = logits
        .iter()
        .zip(legal)
        .map(|(&l, &ok)| match ok {
            true if l.is_finite() && max.is_finite() => ((l - max) / temperature).exp(),
            true => 0.0,
            false => -1.0,
        })
        .collect();

    let sum: f32 = out.iter().filter(|&&p| p >= 0.0).sum();
    if sum > 0.0 {
        for p in out.iter_mut().filter(|p| **p >= 0.0) {
            *p /= sum;
        }
    } else {
        let n = legal.iter().filter(|&&ok| ok).count();
        for (p, &ok) in out.iter_mut().zip(legal) {
            if ok {
                *p = 1.0 / n as f32;
            }
        }
    }
    out
}
