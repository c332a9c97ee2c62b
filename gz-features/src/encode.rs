//! Plane encoding for schema v1.

use gz_core::{Color, Position, Vertex, NUM_VERTICES};

use crate::schema::{
    opponent_plane, own_plane, BLACK_TO_MOVE_PLANE, HISTORY_PLANES, INPUT_CHANNELS, INPUT_LEN,
    WHITE_TO_MOVE_PLANE,
};
use crate::symmetry::symmetry_vertex;

/// 18 binary occupancy planes, plane-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Planes {
    bits: Vec<bool>,
}

impl Planes {
    fn empty() -> Self {
        Self {
            bits: vec![false; INPUT_LEN],
        }
    }

    pub fn get(&self, plane: usize, v: Vertex) -> bool {
        self.bits[plane * NUM_VERTICES + v as usize]
    }

    fn set(&mut self, plane: usize, v: Vertex) {
        self.bits[plane * NUM_VERTICES + v as usize] = true;
    }

    fn fill(&mut self, plane: usize) {
        for b in &mut self.bits[plane * NUM_VERTICES..(plane + 1) * NUM_VERTICES] {
            *b = true;
        }
    }

    /// Flatten to evaluator input with symmetry `sym` applied.
    ///
    /// Entry `c * 361 + i` of the output reads the unrotated plane at
    /// `symmetry_vertex(i, sym)`, matching the policy-index mapping in
    /// the evaluator front-end.
    pub fn to_input(&self, sym: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(INPUT_LEN);
        for c in 0..INPUT_CHANNELS {
            for i in 0..NUM_VERTICES as Vertex {
                let src = symmetry_vertex(i, sym);
                out.push(if self.get(c, src) { 1.0 } else { 0.0 });
            }
        }
        out
    }
}

/// Encode a position and its history into schema-v1 planes, from the
/// point of view of the side to move.
pub fn gather_planes<P: Position>(pos: &P) -> Planes {
    let mut planes = Planes::empty();

    let to_move = pos.to_move();
    match to_move {
        Color::Black => planes.fill(BLACK_TO_MOVE_PLANE),
        Color::White => planes.fill(WHITE_TO_MOVE_PLANE),
    }

    for h in 0..HISTORY_PLANES {
        let Some(hpos) = pos.history(h) else {
            break;
        };
        for v in 0..NUM_VERTICES as Vertex {
            match hpos.stone(v) {
                Some(c) if c == to_move => planes.set(own_plane(h), v),
                Some(_) => planes.set(opponent_plane(h), v),
                None => {}
            }
        }
    }

    planes
}
