//! Parallel search driver: worker threads, budgets, root policy.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

use gz_core::{move_to_text, Color, KoState, Move, Position, SearchSettings};
use gz_infer::{EvalError, Evaluate};
use gz_logging::{PiSummaryV1, SearchRootEventV1};

use crate::node::Node;

#[derive(Debug, Clone, Copy)]
pub struct SearchConfig {
    /// Worker pool size.
    pub num_threads: usize,
    /// PUCT exploration constant.
    pub c_puct: f32,
    /// Virtual loss added per in-flight descent.
    pub virtual_loss: i32,
    /// Root Dirichlet alpha (self-play only).
    pub noise_alpha: f32,
    /// Root Dirichlet mix-in fraction (self-play only).
    pub noise_epsilon: f32,
    /// Seed for noise and proportional sampling.
    pub random_seed: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            num_threads: 1,
            c_puct: 0.85,
            virtual_loss: 3,
            noise_alpha: 0.03,
            noise_epsilon: 0.25,
            random_seed: 0,
        }
    }
}

impl From<&SearchSettings> for SearchConfig {
    fn from(s: &SearchSettings) -> Self {
        Self {
            num_threads: s.num_threads,
            c_puct: s.c_puct,
            virtual_loss: s.virtual_loss,
            noise_alpha: s.noise_alpha,
            noise_epsilon: s.noise_epsilon,
            random_seed: s.random_seed,
        }
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid config: {msg}")]
    InvalidConfig { msg: &'static str },
    #[error("evaluator failed: {0}")]
    Eval(#[from] EvalError),
    #[error("search cancelled")]
    Cancelled,
}

/// Simulation budget for one run.
enum Budget {
    Simulations(u64),
    Deadline(Instant),
}

/// A search rooted at one position. Owns its tree; dropping the search
/// (or advancing past a subtree) frees nodes recursively.
#[derive(Debug)]
pub struct Search<P, E> {
    cfg: SearchConfig,
    evaluator: E,
    root: Arc<Node>,
    root_pos: P,
    node_count: AtomicUsize,
    stop: AtomicBool,
    // Noise and sampling only; never touched on the descent path.
    rng: Mutex<ChaCha8Rng>,
}

impl<P, E> Search<P, E>
where
    P: KoState,
    E: Evaluate<P>,
{
    /// Build a search and expand the root so its priors are available
    /// for noise, pruning, and selection. A finished position yields a
    /// rootless-but-valid search: simulating is a no-op and the best
    /// move is pass.
    pub fn new(root_pos: P, evaluator: E, cfg: SearchConfig) -> Result<Self, SearchError> {
        if !(cfg.c_puct.is_finite() && cfg.c_puct >= 0.0) {
            return Err(SearchError::InvalidConfig {
                msg: "c_puct must be finite and >= 0",
            });
        }
        if cfg.num_threads == 0 {
            return Err(SearchError::InvalidConfig {
                msg: "num_threads must be >= 1",
            });
        }
        if cfg.virtual_loss < 0 {
            return Err(SearchError::InvalidConfig {
                msg: "virtual_loss must be >= 0",
            });
        }
        if !(0.0..=1.0).contains(&cfg.noise_epsilon) {
            return Err(SearchError::InvalidConfig {
                msg: "noise_epsilon must be in [0, 1]",
            });
        }

        let search = Self {
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(cfg.random_seed)),
            cfg,
            evaluator,
            root: Arc::new(Node::new(Move::Pass, 0.0, 0.5)),
            root_pos,
            node_count: AtomicUsize::new(0),
            stop: AtomicBool::new(false),
        };
        search.ensure_root_expanded()?;
        Ok(search)
    }

    /// Expand the root synchronously. The evaluator value is discarded;
    /// only descents credit visits.
    fn ensure_root_expanded(&self) -> Result<(), SearchError> {
        if self.root_pos.passes() >= 2 || self.root.has_children() {
            return Ok(());
        }
        self.root
            .create_children(&self.node_count, &self.root_pos, &self.evaluator)?;
        Ok(())
    }

    /// Mix Dirichlet noise into the root priors. Must precede any
    /// simulation.
    pub fn apply_root_noise(&self, epsilon: f32, alpha: f32) {
        let mut rng = self.rng.lock();
        self.root.dirichlet_noise(epsilon, alpha, &mut *rng);
    }

    /// Drop root moves that would repeat a prior whole-board position.
    /// Must precede any simulation.
    pub fn prune_superkos(&self, state: &P) {
        self.root.kill_superkos(state);
    }

    /// Run until `n` descents have completed (may overshoot by up to
    /// one per worker).
    pub fn simulate(&self, n: u64) -> Result<(), SearchError> {
        self.run(Budget::Simulations(n))
    }

    /// Run until the deadline passes.
    pub fn run_until(&self, deadline: Instant) -> Result<(), SearchError> {
        self.run(Budget::Deadline(deadline))
    }

    /// Raise the stop flag. Workers finish the descent in flight and
    /// return; the blocked budget call reports `Cancelled`.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    fn run(&self, budget: Budget) -> Result<(), SearchError> {
        // A finished root position has nothing to search.
        if self.root_pos.passes() >= 2 {
            return Ok(());
        }

        self.stop.store(false, Ordering::Relaxed);
        let completed = AtomicU64::new(0);
        let failure: Mutex<Option<SearchError>> = Mutex::new(None);

        std::thread::scope(|s| {
            for _ in 0..self.cfg.num_threads {
                s.spawn(|| self.worker(&budget, &completed, &failure));
            }
        });

        if let Some(err) = failure.lock().take() {
            return Err(err);
        }
        if self.stop.load(Ordering::Relaxed) {
            return Err(SearchError::Cancelled);
        }
        Ok(())
    }

    fn worker(&self, budget: &Budget, completed: &AtomicU64, failure: &Mutex<Option<SearchError>>) {
        loop {
            if self.stop.load(Ordering::Relaxed) {
                break;
            }
            let exhausted = match budget {
                Budget::Simulations(n) => completed.load(Ordering::Relaxed) >= *n,
                Budget::Deadline(deadline) => Instant::now() >= *deadline,
            };
            if exhausted {
                break;
            }

            match self.play_simulation() {
                // A dead end (contended expansion) backs off quietly.
                Ok(false) => {}
                Ok(true) => {
                    completed.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    let mut f = failure.lock();
                    if f.is_none() {
                        *f = Some(e);
                    }
                    self.stop.store(true, Ordering::Relaxed);
                    break;
                }
            }
        }
    }

    /// One descent: walk down with virtual loss, expand or score the
    /// leaf, and back the value up the recorded path. Returns whether
    /// a value was backed up.
    fn play_simulation(&self) -> Result<bool, SearchError> {
        let vl = self.cfg.virtual_loss;
        let mut pos = self.root_pos.clone();
        let mut path: Vec<Arc<Node>> = Vec::new();

        self.root.enter(0, 0.0, vl);
        path.push(Arc::clone(&self.root));

        let mut leaf_value: Option<f32> = None;
        loop {
            let node = Arc::clone(path.last().expect("descent path is never empty"));

            if !node.has_children() {
                if pos.passes() >= 2 {
                    leaf_value = Some(terminal_value(&pos));
                    break;
                }
                match node.create_children(&self.node_count, &pos, &self.evaluator) {
                    Ok(Some(eval)) => {
                        leaf_value = Some(eval);
                        break;
                    }
                    // Someone else owns this expansion; give up on the
                    // descent and take the virtual losses back off.
                    Ok(None) => break,
                    Err(e) => {
                        for n in path.iter().rev() {
                            n.leave(0, 0.0, vl);
                        }
                        return Err(e.into());
                    }
                }
            }

            let child = node.uct_select_child(pos.to_move(), self.cfg.c_puct);
            child.enter(0, 0.0, vl);
            pos.play(child.mv());
            path.push(child);
        }

        match leaf_value {
            Some(v) => {
                for n in path.iter().rev() {
                    n.leave(1, v as f64, vl);
                }
                Ok(true)
            }
            None => {
                for n in path.iter().rev() {
                    n.leave(0, 0.0, vl);
                }
                Ok(false)
            }
        }
    }

    /// Most-visited root move; ties break on winrate, then prior.
    pub fn best_move(&self, color: Color) -> Move {
        if self.root_pos.passes() >= 2 {
            return Move::Pass;
        }
        self.root
            .best_root_child(color)
            .map_or(Move::Pass, |child| child.mv())
    }

    /// Root move sampled proportionally to visits (self-play early
    /// moves).
    pub fn sampled_move(&self) -> Move {
        {
            let mut rng = self.rng.lock();
            self.root.randomize_first_proportionally(&mut *rng);
        }
        self.root.first_child().map_or(Move::Pass, |child| child.mv())
    }

    /// Best move excluding pass and own-eye fills. `None` when only
    /// unreasonable moves remain.
    pub fn nopass_move(&self, color: Color) -> Option<Move> {
        self.root
            .nopass_child(&self.root_pos, color)
            .map(|child| child.mv())
    }

    /// Visit fractions over the root children.
    pub fn visit_distribution(&self) -> Vec<(Move, f32)> {
        self.root.visit_distribution()
    }

    /// Play `mv`: the matching materialized subtree becomes the new
    /// root, otherwise the tree is discarded and a fresh root is
    /// expanded.
    pub fn advance(&mut self, mv: Move) -> Result<(), SearchError> {
        let kept = self.root.take_child(mv);
        self.root_pos.play(mv);
        self.root = kept.unwrap_or_else(|| Arc::new(Node::new(Move::Pass, 0.0, 0.5)));
        self.ensure_root_expanded()
    }

    pub fn root(&self) -> &Arc<Node> {
        &self.root
    }

    pub fn root_position(&self) -> &P {
        &self.root_pos
    }

    pub fn node_count(&self) -> usize {
        self.node_count.load(Ordering::Relaxed)
    }

    pub fn summary(&self) -> SearchSummary {
        let color = self.root_pos.to_move();
        let pi = self.visit_distribution();

        let mut entropy = 0.0f32;
        let mut max_p = 0.0f32;
        let mut argmax = Move::Pass;
        for &(mv, p) in &pi {
            if p > 0.0 {
                entropy -= p * p.ln();
            }
            if p > max_p {
                max_p = p;
                argmax = mv;
            }
        }

        SearchSummary {
            to_move: color,
            chosen: self.best_move(color),
            root_visits: self.root.visits(),
            root_winrate: self.root.get_eval(color),
            node_count: self.node_count(),
            pi_entropy: entropy,
            pi_max: max_p,
            pi_argmax: argmax,
        }
    }
}

/// Score a finished position from Black's point of view.
fn terminal_value<P: Position>(pos: &P) -> f32 {
    let score = pos.final_score();
    if score > 0.0 {
        1.0
    } else if score < 0.0 {
        0.0
    } else {
        0.5
    }
}

/// What one finished search looked like at the root.
#[derive(Debug, Clone)]
pub struct SearchSummary {
    pub to_move: Color,
    pub chosen: Move,
    pub root_visits: u32,
    pub root_winrate: f32,
    pub node_count: usize,
    pub pi_entropy: f32,
    pub pi_max: f32,
    pub pi_argmax: Move,
}

impl SearchSummary {
    pub fn to_event(&self, run_id: &str, ply: u32) -> SearchRootEventV1 {
        let ts_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        SearchRootEventV1 {
            event: "search_root",
            ts_ms,
            run_id: run_id.to_string(),
            ply,
            to_move: match self.to_move {
                Color::Black => 'b',
                Color::White => 'w',
            },
            chosen: move_to_text(self.chosen),
            root_visits: self.root_visits,
            root_winrate: self.root_winrate,
            node_count: self.node_count,
            pi: PiSummaryV1 {
                entropy: self.pi_entropy,
                max_p: self.pi_max,
                argmax: move_to_text(self.pi_argmax),
            },
        }
    }
}
