//! Tree node: expansion under contention, PUCT selection, virtual
//! loss, and root-only policy shaping.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;
use rand_distr::{Distribution, Gamma};

use gz_core::{Color, KoState, Move, Position};
use gz_infer::{Ensemble, EvalError, Evaluate};

/// One logical tree node.
///
/// The child list holds `(move, prior)` pairs sorted best-first; the
/// first `expanded.len()` entries are additionally materialized as
/// nodes. Selection swaps entries so the materialized children always
/// occupy a prefix.
#[derive(Debug)]
pub struct Node {
    mv: Move,
    prior: f32,
    // First-play urgency installed by the parent at materialization.
    init_eval: f32,
    // Node alive (not killed at the root).
    valid: AtomicBool,
    // Set once the child list is installed. Never unset.
    has_children: AtomicBool,
    state: Mutex<NodeState>,
}

#[derive(Debug)]
struct NodeState {
    visits: u32,
    // Always from Black's point of view.
    black_evals: f64,
    virtual_loss: i32,
    // First-play urgency handed to children of this node.
    child_init_eval: f32,
    children: Vec<(Move, f32)>,
    expanded: Vec<Arc<Node>>,
    // Someone claimed the expansion of this node. Left set once
    // `has_children` is installed (the flag then dominates); cleared
    // only when the evaluator fails, so a later descent can retry.
    is_expanding: bool,
}

/// A copy of one node's statistics, taken under its mutex.
#[derive(Debug, Clone, Copy)]
pub struct NodeStats {
    pub visits: u32,
    pub black_evals: f64,
    pub prior: f32,
    pub init_eval: f32,
    pub virtual_loss: i32,
}

impl NodeStats {
    /// Winrate from `color`'s point of view.
    ///
    /// Unvisited nodes fall back to the first-play urgency. In-flight
    /// virtual losses read as losses for Black and as wins for White,
    /// which pushes concurrent descents apart symmetrically because
    /// `black_evals` is Black-relative.
    pub fn get_eval(&self, color: Color) -> f32 {
        let total_visits = self.visits as i64 + self.virtual_loss as i64;

        let mut score = self.init_eval;
        if total_visits > 0 {
            let mut black_eval = self.black_evals;
            if color == Color::White {
                black_eval += self.virtual_loss as f64;
            }
            score = (black_eval / total_visits as f64) as f32;
        }
        if color == Color::White {
            score = 1.0 - score;
        }
        score
    }
}

impl Node {
    pub fn new(mv: Move, prior: f32, init_eval: f32) -> Self {
        Self {
            mv,
            prior,
            init_eval,
            valid: AtomicBool::new(true),
            has_children: AtomicBool::new(false),
            state: Mutex::new(NodeState {
                visits: 0,
                black_evals: 0.0,
                virtual_loss: 0,
                child_init_eval: 0.0,
                children: Vec::new(),
                expanded: Vec::new(),
                is_expanding: false,
            }),
        }
    }

    pub fn mv(&self) -> Move {
        self.mv
    }

    pub fn prior(&self) -> f32 {
        self.prior
    }

    pub fn has_children(&self) -> bool {
        self.has_children.load(Ordering::Relaxed)
    }

    pub fn valid(&self) -> bool {
        self.valid.load(Ordering::Relaxed)
    }

    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Relaxed);
    }

    pub fn stats(&self) -> NodeStats {
        let st = self.state.lock();
        self.stats_locked(&st)
    }

    fn stats_locked(&self, st: &NodeState) -> NodeStats {
        NodeStats {
            visits: st.visits,
            black_evals: st.black_evals,
            prior: self.prior,
            init_eval: self.init_eval,
            virtual_loss: st.virtual_loss,
        }
    }

    pub fn visits(&self) -> u32 {
        self.stats().visits
    }

    pub fn first_visit(&self) -> bool {
        self.visits() == 0
    }

    pub fn get_eval(&self, color: Color) -> f32 {
        self.stats().get_eval(color)
    }

    /// Expand this node: at most one thread runs the evaluator, the
    /// rest return quickly without duplicating work.
    ///
    /// Returns `Ok(Some(v))` with the evaluator value normalized to
    /// Black's point of view when this call performed the expansion,
    /// `Ok(None)` when somebody beat us to it or the game is over.
    pub fn create_children<P, E>(
        &self,
        node_count: &AtomicUsize,
        pos: &P,
        evaluator: &E,
    ) -> Result<Option<f32>, EvalError>
    where
        P: Position,
        E: Evaluate<P>,
    {
        // Check whether somebody beat us to it (no lock).
        if self.has_children() {
            return Ok(None);
        }
        {
            let mut st = self.state.lock();
            // Re-check after taking the lock.
            if self.has_children() {
                return Ok(None);
            }
            // No successors in a final state.
            if pos.passes() >= 2 {
                return Ok(None);
            }
            // Someone else is running the expansion.
            if st.is_expanding {
                return Ok(None);
            }
            st.is_expanding = true;
        }

        let (raw_moves, net_eval) = match evaluator.evaluate(pos, Ensemble::RandomRotation) {
            Ok(out) => out,
            Err(e) => {
                // Give the expansion claim back; the node stays
                // expandable and the error still reaches the caller.
                self.state.lock().is_expanding = false;
                return Err(e);
            }
        };

        // The evaluator scores the side to move; the tree accounts
        // from Black's point of view.
        let to_move = pos.to_move();
        let eval = if to_move == Color::White {
            1.0 - net_eval
        } else {
            net_eval
        };

        let mut nodelist: Vec<(Move, f32)> = Vec::with_capacity(raw_moves.len());
        let mut legal_sum = 0.0f32;
        for (mv, p) in raw_moves {
            if pos.is_legal(to_move, mv) {
                nodelist.push((mv, p));
                legal_sum += p;
            }
        }

        // If the sum is zero or subnormal, don't try to normalize.
        if legal_sum >= f32::MIN_POSITIVE {
            for (_, p) in &mut nodelist {
                *p /= legal_sum;
            }
        }

        self.link_children(node_count, nodelist, eval);
        Ok(Some(eval))
    }

    fn link_children(
        &self,
        node_count: &AtomicUsize,
        mut nodelist: Vec<(Move, f32)>,
        init_eval: f32,
    ) {
        if nodelist.is_empty() {
            return;
        }

        // Best to worst, stable so equal priors keep evaluator order.
        nodelist.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut st = self.state.lock();
        node_count.fetch_add(nodelist.len(), Ordering::Relaxed);
        st.children = nodelist;
        st.child_init_eval = init_eval;
        self.has_children.store(true, Ordering::Relaxed);
    }

    /// Drop children whose move would repeat a prior whole-board
    /// position. Pass is never dropped.
    ///
    /// Only safe to call before any child is materialized.
    pub fn kill_superkos<K: KoState>(&self, state: &K) {
        let mut st = self.state.lock();
        assert!(st.expanded.is_empty());

        st.children.retain(|&(mv, _)| match mv {
            Move::Pass => true,
            Move::Play(v) => !state.superko_after(v),
        });
    }

    /// Mix root priors with a normalized Gamma(alpha, 1) draw.
    ///
    /// Only safe to call before any child is materialized.
    pub fn dirichlet_noise(&self, epsilon: f32, alpha: f32, rng: &mut impl Rng) {
        let mut st = self.state.lock();
        assert!(st.expanded.is_empty());

        let gamma = Gamma::new(alpha, 1.0).expect("alpha > 0");
        let mut dirichlet: Vec<f32> = st.children.iter().map(|_| gamma.sample(rng)).collect();

        let sample_sum: f32 = dirichlet.iter().sum();
        // If the noise vector sums to zero or a subnormal, don't try
        // to normalize.
        if sample_sum < f32::MIN_POSITIVE {
            return;
        }
        for v in &mut dirichlet {
            *v /= sample_sum;
        }

        for ((_, p), eta) in st.children.iter_mut().zip(dirichlet) {
            *p = *p * (1.0 - epsilon) + epsilon * eta;
        }
    }

    /// Swap a child into slot 0 with probability proportional to its
    /// visits. No-op when the draw lands on the current first child.
    pub fn randomize_first_proportionally(&self, rng: &mut impl Rng) {
        let mut st = self.state.lock();

        let mut accum = 0u64;
        let mut accum_vector = Vec::with_capacity(st.expanded.len());
        for child in &st.expanded {
            accum += child.visits() as u64;
            accum_vector.push(accum);
        }
        if accum == 0 {
            return;
        }

        let pick = rng.gen_range(0..accum);
        let mut index = 0usize;
        for (i, &bound) in accum_vector.iter().enumerate() {
            if pick < bound {
                index = i;
                break;
            }
        }

        // Take the early out.
        if index == 0 {
            return;
        }

        // Swap both vectors so moves and priors stay aligned with the
        // materialized prefix.
        st.expanded.swap(0, index);
        st.children.swap(0, index);
    }

    /// Start walking down this node: add virtual loss and install the
    /// passed counters if they are larger than what we have (used when
    /// restoring a reused subtree; normal descents pass zeros).
    pub fn enter(&self, initial_visits: u32, initial_eval_sum: f64, vl: i32) -> NodeStats {
        let mut st = self.state.lock();
        if initial_visits > st.visits {
            st.visits = initial_visits;
            st.black_evals = initial_eval_sum;
        }
        st.virtual_loss += vl;
        self.stats_locked(&st)
    }

    /// Finish walking this node: accumulate the visit and eval sum and
    /// take the virtual loss back off.
    pub fn leave(&self, added_visits: u32, added_eval_sum: f64, vl: i32) -> NodeStats {
        let mut st = self.state.lock();
        st.visits += added_visits;
        st.black_evals += added_eval_sum;
        st.virtual_loss -= vl;
        debug_assert!(st.virtual_loss >= 0);
        self.stats_locked(&st)
    }

    /// PUCT child selection. Materializes the chosen child if needed
    /// (the one allocation on the descent path).
    pub fn uct_select_child(&self, color: Color, c_puct: f32) -> Arc<Node> {
        let mut st = self.state.lock();

        // Count parent visits over the children directly so the score
        // stays correct under subtree transpositions.
        let mut parentvisits = 0u64;
        for child in &st.expanded {
            if !child.valid() {
                continue;
            }
            parentvisits += child.visits() as u64;
        }
        let numerator = (parentvisits as f64).sqrt();

        let mut best: Option<usize> = None;
        let mut best_value = f64::NEG_INFINITY;
        for i in 0..st.children.len() {
            if i < st.expanded.len() && !st.expanded[i].valid() {
                continue;
            }

            let stats = if i < st.expanded.len() {
                st.expanded[i].stats()
            } else {
                // Not yet materialized: zero stats, parent-side
                // first-play urgency.
                NodeStats {
                    visits: 0,
                    black_evals: 0.0,
                    prior: st.children[i].1,
                    init_eval: st.child_init_eval,
                    virtual_loss: 0,
                }
            };

            // First-play urgency comes out of get_eval automatically.
            let winrate = stats.get_eval(color) as f64;
            let psa = stats.prior as f64;
            let denom = 1.0 + stats.visits as f64;
            let puct = c_puct as f64 * psa * (numerator / denom);
            let value = winrate + puct;

            if value > best_value {
                best_value = value;
                best = Some(i);
            }
        }

        let best = best.expect("select called on a node with at least one valid child");
        self.materialize_locked(&mut st, best)
    }

    fn materialize_locked(&self, st: &mut NodeState, child: usize) -> Arc<Node> {
        debug_assert!(child < st.children.len());

        // Already materialized.
        if child < st.expanded.len() {
            return Arc::clone(&st.expanded[child]);
        }

        // Swap the entry into the materialized prefix.
        let dest = st.expanded.len();
        st.children.swap(dest, child);

        let (mv, prior) = st.children[dest];
        let node = Arc::new(Node::new(mv, prior, st.child_init_eval));
        st.expanded.push(Arc::clone(&node));
        node
    }

    fn expand_all_locked(&self, st: &mut NodeState) {
        for i in 0..st.children.len() {
            self.materialize_locked(st, i);
        }
    }

    /// Best root child: most visits, then winrate, then prior.
    pub fn best_root_child(&self, color: Color) -> Option<Arc<Node>> {
        let mut st = self.state.lock();
        self.expand_all_locked(&mut st);

        st.expanded
            .iter()
            .max_by(|a, b| root_child_order(a, b, color))
            .cloned()
    }

    /// Best non-pass root child that does not fill one of the mover's
    /// own eyes. `None` when only unreasonable moves remain.
    pub fn nopass_child<P: Position>(&self, pos: &P, color: Color) -> Option<Arc<Node>> {
        let mut st = self.state.lock();
        self.expand_all_locked(&mut st);

        st.expanded
            .iter()
            .filter(|child| match child.mv() {
                Move::Pass => false,
                Move::Play(v) => !pos.is_eye(color, v),
            })
            .max_by(|a, b| root_child_order(a, b, color))
            .cloned()
    }

    pub fn first_child(&self) -> Option<Arc<Node>> {
        self.state.lock().expanded.first().cloned()
    }

    /// Visit fractions over the logical children, normalized by the
    /// total child visits. Latent children report zero.
    pub fn visit_distribution(&self) -> Vec<(Move, f32)> {
        let st = self.state.lock();

        let counts: Vec<u32> = (0..st.children.len())
            .map(|i| st.expanded.get(i).map_or(0, |c| c.visits()))
            .collect();
        let total: u64 = counts.iter().map(|&c| c as u64).sum();
        if total == 0 {
            return Vec::new();
        }

        st.children
            .iter()
            .zip(counts)
            .map(|(&(mv, _), c)| (mv, c as f32 / total as f32))
            .collect()
    }

    /// Snapshot of the logical child list.
    pub fn child_priors(&self) -> Vec<(Move, f32)> {
        self.state.lock().children.clone()
    }

    /// Snapshot of the materialized prefix.
    pub fn materialized_children(&self) -> Vec<Arc<Node>> {
        self.state.lock().expanded.clone()
    }

    /// Detach the materialized child playing `mv`, if any. The caller
    /// becomes its owner; used when a move is played and the chosen
    /// subtree survives as the new root.
    pub fn take_child(&self, mv: Move) -> Option<Arc<Node>> {
        let mut st = self.state.lock();
        let i = st.expanded.iter().position(|c| c.mv() == mv)?;
        Some(st.expanded.swap_remove(i))
    }
}

fn root_child_order(a: &Arc<Node>, b: &Arc<Node>, color: Color) -> std::cmp::Ordering {
    let (va, vb) = (a.visits(), b.visits());
    // If visits are not the same, sort on visits.
    if va != vb {
        return va.cmp(&vb);
    }
    // Neither has visits, sort on prior.
    if va == 0 {
        return a
            .prior()
            .partial_cmp(&b.prior())
            .unwrap_or(std::cmp::Ordering::Equal);
    }
    // Same non-zero number of visits: sort on winrate, then prior.
    a.get_eval(color)
        .partial_cmp(&b.get_eval(color))
        .unwrap_or(std::cmp::Ordering::Equal)
        .then_with(|| {
            a.prior()
                .partial_cmp(&b.prior())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}
