//! Input-plane schema v1.
//!
//! The evaluator consumes 18 binary planes of 361 intersections each,
//! encoded from the point of view of the side to move:
//!
//! - planes 0..8   : side-to-move stones, history plies 0..8 (0 = now)
//! - planes 8..16  : opponent stones at the same plies
//! - plane 16      : all ones if Black is to move
//! - plane 17      : all ones if White is to move
//!
//! When fewer than 8 positions of history exist, the remaining history
//! planes stay zero.

use gz_core::NUM_VERTICES;

/// Increment this whenever the plane layout changes.
pub const FEATURE_SCHEMA_ID: u32 = 1;

/// History depth per side.
pub const HISTORY_PLANES: usize = 8;

/// Total input planes.
pub const INPUT_CHANNELS: usize = 2 * HISTORY_PLANES + 2;

/// Flattened input length, plane-major.
pub const INPUT_LEN: usize = INPUT_CHANNELS * NUM_VERTICES;

/// Plane index of side-to-move stones at history ply `h`.
pub const fn own_plane(h: usize) -> usize {
    h
}

/// Plane index of opponent stones at history ply `h`.
pub const fn opponent_plane(h: usize) -> usize {
    HISTORY_PLANES + h
}

/// Plane set to all ones when Black is to move.
pub const BLACK_TO_MOVE_PLANE: usize = 2 * HISTORY_PLANES;

/// Plane set to all ones when White is to move.
pub const WHITE_TO_MOVE_PLANE: usize = 2 * HISTORY_PLANES + 1;
