use criterion::{black_box, criterion_group, criterion_main, Criterion};

use gz_core::{Color, KoState, Move, Position, Vertex};
use gz_infer::{Evaluator, UniformNetwork};
use gz_mcts::{Search, SearchConfig};

/// Bare board for benchmarking: stones accumulate, nothing captures.
#[derive(Clone)]
struct BenchPos {
    to_move: Color,
    passes: u8,
    stones: Vec<(Vertex, Color)>,
}

impl BenchPos {
    fn new() -> Self {
        Self {
            to_move: Color::Black,
            passes: 0,
            stones: Vec::new(),
        }
    }
}

impl Position for BenchPos {
    fn to_move(&self) -> Color {
        self.to_move
    }
    fn passes(&self) -> u8 {
        self.passes
    }
    fn stone(&self, v: Vertex) -> Option<Color> {
        self.stones.iter().find(|(sv, _)| *sv == v).map(|(_, c)| *c)
    }
    fn is_legal(&self, _color: Color, mv: Move) -> bool {
        match mv {
            Move::Play(v) => self.stone(v).is_none(),
            Move::Pass => true,
        }
    }
    fn is_eye(&self, _color: Color, _v: Vertex) -> bool {
        false
    }
    fn play(&mut self, mv: Move) {
        match mv {
            Move::Play(v) => {
                self.stones.push((v, self.to_move));
                self.passes = 0;
            }
            Move::Pass => self.passes += 1,
        }
        self.to_move = self.to_move.opponent();
    }
    fn history(&self, ply: usize) -> Option<&Self> {
        (ply == 0).then_some(self)
    }
    fn final_score(&self) -> f32 {
        0.0
    }
}

impl KoState for BenchPos {
    fn superko_after(&self, _v: Vertex) -> bool {
        false
    }
}

fn bench_simulate(c: &mut Criterion) {
    let mut g = c.benchmark_group("gz_mcts_search");
    g.sample_size(10);

    for &threads in &[1usize, 4] {
        g.bench_function(format!("simulate_256_threads_{}", threads), |b| {
            b.iter(|| {
                let eval = Evaluator::new(UniformNetwork, 1.0, 0);
                let cfg = SearchConfig {
                    num_threads: threads,
                    ..Default::default()
                };
                let search = Search::new(BenchPos::new(), eval, cfg).unwrap();
                search.simulate(black_box(256)).unwrap();
                black_box(search.root().visits())
            })
        });
    }
    g.finish();
}

criterion_group!(benches, bench_simulate);
criterion_main!(benches);
