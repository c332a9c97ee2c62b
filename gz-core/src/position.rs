//! Position contracts consumed by the search.
//!
//! The board implementation lives outside this workspace; the search
//! only needs the small surface below. `history(0)` is the position
//! itself, `history(k)` the position `k` plies earlier.

use crate::board::{Color, Move, Vertex};

pub trait Position: Clone + Send + Sync {
    fn to_move(&self) -> Color;

    /// Consecutive passes so far. Two passes end the game.
    fn passes(&self) -> u8;

    fn stone(&self, v: Vertex) -> Option<Color>;

    fn is_legal(&self, color: Color, mv: Move) -> bool;

    /// True if `v` is an eye of `color`. Used only to avoid pass-like
    /// eye fills when a caller forbids passing.
    fn is_eye(&self, color: Color, v: Vertex) -> bool;

    fn play(&mut self, mv: Move);

    fn history(&self, ply: usize) -> Option<&Self>;

    /// Final score margin, positive when Black is ahead. Only
    /// meaningful once `passes() >= 2`.
    fn final_score(&self) -> f32;
}

/// A position that can check whole-board repetition.
pub trait KoState: Position {
    /// Would playing `v` for the side to move repeat a prior
    /// whole-board position?
    fn superko_after(&self, v: Vertex) -> bool;
}
