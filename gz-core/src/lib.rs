//! gz-core: Board vocabulary, position contracts, and configuration.

pub mod board;
pub mod config;
pub mod position;

pub use board::{
    move_to_text, vertex, vertex_to_text, vertex_x, vertex_y, Color, Move, Vertex, BOARD_SIZE,
    NUM_VERTICES, POLICY_LEN,
};
pub use config::{Config, ConfigError, NetworkSettings, SearchSettings};
pub use position::{KoState, Position};

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
