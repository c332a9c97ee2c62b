//! gz-infer: Evaluator front-end over a raw policy/value network.

pub mod evaluate;
pub mod network;

pub use evaluate::{Ensemble, EvalError, Evaluate, Evaluator, ScoredMoves};
pub use network::{NetError, NetOutput, Network, UniformNetwork};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_nonempty() {
        assert!(!VERSION.is_empty());
    }
}
