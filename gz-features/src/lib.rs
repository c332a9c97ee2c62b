//! gz-features: Input-plane schema, canonical encoding, and board symmetries.

pub mod encode;
pub mod schema;
pub mod symmetry;

pub use encode::{gather_planes, Planes};
pub use schema::{FEATURE_SCHEMA_ID, HISTORY_PLANES, INPUT_CHANNELS, INPUT_LEN};
pub use symmetry::{symmetry_vertex, NUM_SYMMETRIES};

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
