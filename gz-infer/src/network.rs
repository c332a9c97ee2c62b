//! Raw network contract.
//!
//! The convolutional tower lives outside this workspace. The search
//! only needs a blocking forward pass over an already-rotated input;
//! everything about symmetries, temperature, and legality is handled
//! by [`crate::Evaluator`].

use gz_core::POLICY_LEN;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetError {
    #[error("forward pass failed: {msg}")]
    Forward { msg: String },
}

/// Raw forward-pass output: 362 policy logits and a pre-tanh value.
#[derive(Debug, Clone)]
pub struct NetOutput {
    pub policy: Vec<f32>,
    pub value: f32,
}

/// A blocking, thread-safe forward pass.
///
/// `input` is plane-major, `18 * 361` floats, symmetry already
/// applied. Implementations may serialize or batch calls internally;
/// each call must return an output consistent with its input. Weights
/// are constant for the lifetime of a search.
pub trait Network: Send + Sync {
    fn forward(&self, input: &[f32]) -> Result<NetOutput, NetError>;
}

/// Flat policy and neutral value (baseline stub).
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformNetwork;

impl Network for UniformNetwork {
    fn forward(&self, _input: &[f32]) -> Result<NetOutput, NetError> {
        Ok(NetOutput {
            policy: vec![0.0; POLICY_LEN],
            value: 0.0,
        })
    }
}
