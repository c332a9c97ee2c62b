//! Policy shaping around the raw forward pass.

use gz_core::{Move, Position, Vertex, NUM_VERTICES, POLICY_LEN};
use gz_features::{gather_planes, symmetry_vertex, NUM_SYMMETRIES};
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

use crate::network::{NetError, Network};

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("network error: {0}")]
    Net(#[from] NetError),
    #[error("policy head returned {got} entries, expected {expected}")]
    WeightsMismatch { got: usize, expected: usize },
}

/// Which symmetry to feed the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ensemble {
    /// A fixed symmetry in `0..8`.
    Direct(u8),
    /// Draw one of the 8 symmetries uniformly per call.
    RandomRotation,
}

/// Per-parent priors: `(move, probability)` for pass plus every legal
/// vertex, indices referring to the unrotated board.
pub type ScoredMoves = Vec<(Move, f32)>;

/// The seam the search consumes. The scalar is the win probability of
/// the side to move in the evaluated position.
pub trait Evaluate<P: Position>: Send + Sync {
    fn evaluate(&self, pos: &P, ensemble: Ensemble) -> Result<(ScoredMoves, f32), EvalError>;
}

/// Evaluator front-end: symmetry ensemble, temperature softmax, value
/// squashing, legality filter, renormalization.
pub struct Evaluator<N> {
    net: N,
    softmax_temp: f32,
    rng: Mutex<ChaCha8Rng>,
}

impl<N: Network> Evaluator<N> {
    pub fn new(net: N, softmax_temp: f32, seed: u64) -> Self {
        Self {
            net,
            softmax_temp,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    pub fn network(&self) -> &N {
        &self.net
    }
}

impl<P: Position, N: Network> Evaluate<P> for Evaluator<N> {
    fn evaluate(&self, pos: &P, ensemble: Ensemble) -> Result<(ScoredMoves, f32), EvalError> {
        let sym = match ensemble {
            Ensemble::Direct(s) => {
                debug_assert!((s as usize) < NUM_SYMMETRIES);
                s as usize
            }
            Ensemble::RandomRotation => self.rng.lock().gen_range(0..NUM_SYMMETRIES),
        };

        let planes = gather_planes(pos);
        let input = planes.to_input(sym);
        let out = self.net.forward(&input)?;
        if out.policy.len() != POLICY_LEN {
            return Err(EvalError::WeightsMismatch {
                got: out.policy.len(),
                expected: POLICY_LEN,
            });
        }

        let probs = softmax(&out.policy, self.softmax_temp);
        let value = (1.0 + out.value.tanh()) / 2.0;

        // Keep pass plus legal vertices, mapping net indices back to
        // the unrotated board through the same symmetry.
        let to_move = pos.to_move();
        let mut moves: ScoredMoves = Vec::new();
        let mut legal_sum = 0.0f32;
        for (idx, &p) in probs.iter().enumerate() {
            if idx < NUM_VERTICES {
                let v = symmetry_vertex(idx as Vertex, sym);
                if pos.is_legal(to_move, Move::Play(v)) {
                    moves.push((Move::Play(v), p));
                    legal_sum += p;
                }
            } else {
                moves.push((Move::Pass, p));
                legal_sum += p;
            }
        }

        // If the legal mass is subnormal, hand the raw entries back.
        if legal_sum >= f32::MIN_POSITIVE {
            for (_, p) in &mut moves {
                *p /= legal_sum;
            }
        }

        Ok((moves, value))
    }
}

/// Softmax with temperature, max-logit normalized.
pub(crate) fn softmax(logits: &[f32], temperature: f32) -> Vec<f32> {
    let mut alpha = f32::NEG_INFINITY;
    for &l in logits {
        alpha = alpha.max(l);
    }
    alpha /= temperature;

    let mut out = Vec::with_capacity(logits.len());
    let mut denom = 0.0f32;
    for &l in logits {
        let val = (l / temperature - alpha).exp();
        out.push(val);
        denom += val;
    }
    for v in &mut out {
        *v /= denom;
    }
    out
}
