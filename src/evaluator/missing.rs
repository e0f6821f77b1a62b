//! Defines the missing-data evaluators.
//!
//! CPD counting needs a concrete value in every cell, so a dataset with
//! holes is scored by integrating over the unknown values: by Gibbs
//! sampling (`MissingDataNetworkEvaluator`), by exhaustive enumeration
//! (`MissingDataExactNetworkEvaluator`), or by marginal-preserving pairwise
//! swaps (`MissingDataMaximumEntropyNetworkEvaluator`). Each evaluator owns
//! a private copy of the dataset and is its sole mutator.
//!
//! None of these check acyclicity; a caller hands them committed DAGs.

use cpd::{Cpd, CpdKind, LnFactorialCache};
use dataset::Dataset;
use network::{Edge, Network};
use prior::Prior;
use util::{logscale_probwheel, logsumexp, Result};
use super::{apply_delta, revert_delta, Checkpoint, NetworkEvaluator};

use itertools::Itertools;
use rand;
use rand::Rng;
use rand::distributions::{IndependentSample, Range};

use std::collections::HashMap;
use std::rc::Rc;


/// When to stop a sampling run, as a function of the number of missing
/// cells. A typed value, chosen explicitly by the caller.
pub enum StoppingPolicy {

    /// Stop after exactly this many cell visits.
    Fixed(usize),

    /// Stop after `n * n` cell visits for `n` missing cells.
    SweepsSquared,

    /// Stop after `f(n)` cell visits.
    Custom(Box<dyn Fn(usize) -> usize>)

}

impl StoppingPolicy {

    /// The number of cell visits to perform for `missing` missing cells.
    pub fn max_iterations(&self, missing: usize) -> usize {
        match self {
            &StoppingPolicy::Fixed(count) => count,
            &StoppingPolicy::SweepsSquared => missing * missing,
            &StoppingPolicy::Custom(ref f) => f(missing)
        }
    }
}


/// Everything needed to resume a sampling run: the running log-space
/// average, how many samples it covers, and the value last committed to
/// every missing cell (in the dataset's row-major missing-cell order).
#[derive(Clone, Debug)]
pub struct GibbsSamplerState {
    pub avgscore: f64,
    pub numscores: usize,
    pub assignedvals: Vec<usize>
}

impl GibbsSamplerState {

    /// The log-space sum of all samples folded into `avgscore`.
    pub fn scoresum(&self) -> f64 {
        self.avgscore + (self.numscores as f64).ln()
    }
}


/// The shared imputation machinery: a privately owned dataset with every
/// missing cell assigned some concrete value, one CPD per node, and the
/// bookkeeping to swap a single cell's value through `replace_data` on
/// exactly the CPDs that read that column.
struct ImputationEngine {
    data: Dataset,
    network: Network,
    prior: Box<dyn Prior>,
    cpd_kind: CpdKind,
    lnfact: Rc<LnFactorialCache>,

    cpds: Vec<Box<dyn Cpd>>,
    localscores: Vec<f64>
}

impl ImputationEngine {

    fn new(
        data: &Dataset,
        network: Network,
        prior: Box<dyn Prior>,
        cpd_kind: CpdKind,
    ) -> ImputationEngine {
        let n = data.num_variables();
        let lnfact = Rc::new(LnFactorialCache::new(data.num_samples() + data.max_arity()));

        ImputationEngine {
            data: data.clone(),
            network,
            prior,
            cpd_kind,
            lnfact,
            cpds: Vec::new(),
            localscores: vec![0.0; n]
        }
    }

    /// `[child, parents...]` values of `node`'s family in `row`.
    fn family_values(&self, node: usize, row: usize) -> Vec<usize> {
        let mut values = Vec::with_capacity(self.network.edges().incoming(node).len() + 1);
        values.push(self.data.value(row, node));
        for &parent in self.network.edges().incoming(node) {
            values.push(self.data.value(row, parent));
        }
        values
    }

    /// Build one CPD per node against the currently assigned data.
    fn rebuild_cpds(&mut self) {
        let n = self.data.num_variables();
        let mut cpds = Vec::with_capacity(n);
        for node in 0..n {
            let parents = self.network.edges().incoming(node).to_vec();
            cpds.push(self.cpd_kind.build(&self.data, node, &parents, self.lnfact.clone()));
        }
        self.cpds = cpds;
        self.localscores = self.cpds.iter().map(|cpd| cpd.loglikelihood()).collect();
    }

    /// Write `value` into cell `(row, col)` and patch every affected CPD:
    /// `col`'s own, plus each CPD holding `col` in its parent set - that
    /// is, `col`'s children in the network. Nothing further downstream
    /// reads this column, so nothing further is touched. Rows where the
    /// affected child was intervened upon were never counted and are
    /// skipped here too.
    fn set_cell(&mut self, row: usize, col: usize, value: usize) {
        if self.data.value(row, col) == value {
            return;
        }

        let mut affected = vec![col];
        affected.extend_from_slice(self.network.edges().outgoing(col));

        let old_families: Vec<Option<Vec<usize>>> = affected.iter()
            .map(|&node| {
                if self.data.is_intervention(row, node) {
                    None
                } else {
                    Some(self.family_values(node, row))
                }
            })
            .collect();

        self.data.set_value(row, col, value);

        for (&node, old) in affected.iter().zip(old_families) {
            if let Some(old) = old {
                let new = self.family_values(node, row);
                self.cpds[node].replace_data(&old, &new);
                self.localscores[node] = self.cpds[node].loglikelihood();
            }
        }
    }

    /// The total score of the current assignment.
    fn score(&self) -> f64 {
        self.localscores.iter().sum::<f64>() + self.prior.loglikelihood(&self.network)
    }

    /// Seed every missing cell: from a prior run's assignments when
    /// resuming, otherwise with uniform random draws.
    fn assign_missing<R: Rng>(
        &mut self,
        missing: &[(usize, usize)],
        resume: Option<&GibbsSamplerState>,
        rng: &mut R,
    ) {
        match resume {
            Some(state) => {
                debug_assert_eq!(state.assignedvals.len(), missing.len());
                for (&(row, col), &value) in missing.iter().zip(state.assignedvals.iter()) {
                    self.data.set_value(row, col, value);
                }
            },
            None => {
                for &(row, col) in missing {
                    let value = Range::new(0, self.data.arity(col)).ind_sample(rng);
                    self.data.set_value(row, col, value);
                }
            }
        }
    }

    /// Seed missing cells so each variable's marginal distribution ends up
    /// as close to uniform across its arities as the observed cells allow.
    fn assign_max_entropy<R: Rng>(&mut self, missing: &[(usize, usize)], rng: &mut R) {
        let mut by_col: HashMap<usize, Vec<usize>> = HashMap::new();
        for (i, &(_, col)) in missing.iter().enumerate() {
            by_col.entry(col).or_insert_with(Vec::new).push(i);
        }

        for (&col, cells) in by_col.iter() {
            // counts over the observed cells of this column
            let mut counts = vec![0usize; self.data.arity(col)];
            for row in 0..self.data.num_samples() {
                if !self.data.is_missing(row, col) {
                    counts[self.data.value(row, col)] += 1;
                }
            }

            // repeatedly hand the rarest value another slot
            let mut fill = Vec::with_capacity(cells.len());
            for _ in 0..cells.len() {
                let value = counts.iter()
                                  .enumerate()
                                  .min_by_key(|&(_, c)| *c)
                                  .map(|(v, _)| v)
                                  .unwrap();
                counts[value] += 1;
                fill.push(value);
            }
            rng.shuffle(&mut fill);

            for (&i, &value) in cells.iter().zip(fill.iter()) {
                let (row, col) = missing[i];
                self.data.set_value(row, col, value);
            }
        }
    }

    /// The values currently assigned to the missing cells, in order.
    fn assigned_values(&self, missing: &[(usize, usize)]) -> Vec<usize> {
        missing.iter().map(|&(row, col)| self.data.value(row, col)).collect()
    }
}


/// Fold a run's recorded scores into a final estimate.
///
/// A fresh run discards the burn-in prefix and averages the rest in log
/// space; if the run was shorter than the burn-in, the last sample alone
/// stands in (the explicit degenerate case). A resumed run discards
/// nothing and folds everything into the previous running average.
fn finalize_scores(
    scores: &[f64],
    burnin: usize,
    resume: Option<&GibbsSamplerState>,
) -> (f64, usize) {
    match resume {
        Some(state) => {
            let count = state.numscores + scores.len();
            let total = logsumexp(&[state.scoresum(), logsumexp(scores)]);
            (total - (count as f64).ln(), count)
        },
        None => {
            if scores.len() <= burnin {
                (*scores.last().expect("sampler records at least one score"), 1)
            } else {
                let tail = &scores[burnin..];
                (logsumexp(tail) - (tail.len() as f64).ln(), tail.len())
            }
        }
    }
}


/// Scores a network against missing data by Gibbs sampling over the
/// unknown cells.
///
/// Each cell visit tries every candidate value, scores the network under
/// each, commits one drawn from the log-space probability wheel, and
/// records the committed score. The final estimate is the log-space
/// average of the post-burn-in samples.
pub struct MissingDataNetworkEvaluator {
    engine: ImputationEngine,
    stopping: StoppingPolicy,
    burnin_sweeps: usize,

    state: Option<GibbsSamplerState>,
    last_score: f64,
    saved_state: Option<Checkpoint>
}

impl MissingDataNetworkEvaluator {

    /// Construct with the defaults: `n²` cell visits, a 10-sweep burn-in,
    /// and the fused CPD implementation.
    pub fn new(data: &Dataset, network: Network, prior: Box<dyn Prior>) -> Self {
        MissingDataNetworkEvaluator::with_config(
            data, network, prior, CpdKind::Fused, StoppingPolicy::SweepsSquared, 10
        )
    }

    pub fn with_config(
        data: &Dataset,
        network: Network,
        prior: Box<dyn Prior>,
        cpd_kind: CpdKind,
        stopping: StoppingPolicy,
        burnin_sweeps: usize,
    ) -> Self {
        MissingDataNetworkEvaluator {
            engine: ImputationEngine::new(data, network, prior, cpd_kind),
            stopping,
            burnin_sweeps,
            state: None,
            last_score: 0.0,
            saved_state: None
        }
    }

    /// The resumable sampler state from the most recent run, if any.
    pub fn gibbs_state(&self) -> Option<&GibbsSamplerState> {
        self.state.as_ref()
    }

    /// Seed the next run with a previously captured state instead of a
    /// fresh random assignment.
    pub fn set_gibbs_state(&mut self, state: Option<GibbsSamplerState>) {
        self.state = state;
    }

    fn run_sampler(&mut self) -> f64 {
        let mut rng = rand::thread_rng();
        let engine = &mut self.engine;

        let missing = engine.data.missing_indices();
        if missing.is_empty() {
            engine.rebuild_cpds();
            self.last_score = engine.score();
            return self.last_score;
        }
        let n = missing.len();

        ///////////////////////////////////////////////////////////////////
        // 1) assign every missing cell and build CPDs over the result
        let resume = self.state.take();
        engine.assign_missing(&missing, resume.as_ref(), &mut rng);
        engine.rebuild_cpds();

        ///////////////////////////////////////////////////////////////////
        // 2) sweep the cells in fixed order; for each, score every
        //    candidate value and commit one by probability wheel
        let max_iterations = self.stopping.max_iterations(n);
        let mut scores = Vec::with_capacity(max_iterations);

        'sweeps: while scores.len() < max_iterations {
            for &(row, col) in &missing {
                let arity = engine.data.arity(col);

                let mut candidates = Vec::with_capacity(arity);
                for value in 0..arity {
                    engine.set_cell(row, col, value);
                    candidates.push(engine.score());
                }

                let choice = logscale_probwheel(&candidates, &mut rng);
                engine.set_cell(row, col, choice);
                scores.push(candidates[choice]);

                if scores.len() >= max_iterations {
                    break 'sweeps;
                }
            }
        }
        if scores.is_empty() {
            scores.push(engine.score());
        }

        ///////////////////////////////////////////////////////////////////
        // 3) average past the burn-in and persist the resumable state
        let burnin = self.burnin_sweeps * n;
        let (avgscore, numscores) = finalize_scores(&scores, burnin, resume.as_ref());

        self.state = Some(GibbsSamplerState {
            avgscore,
            numscores,
            assignedvals: engine.assigned_values(&missing)
        });
        self.last_score = avgscore;
        avgscore
    }
}

impl NetworkEvaluator for MissingDataNetworkEvaluator {

    fn network(&self) -> &Network {
        &self.engine.network
    }

    fn score_network(&mut self, net: Option<&Network>) -> Result<f64> {
        if let Some(net) = net {
            // the stored assignments condition on the old structure
            self.engine.network = net.clone();
            self.state = None;
        }
        Ok(self.run_sampler())
    }

    fn alter_network(&mut self, add: &[Edge], remove: &[Edge]) -> Result<f64> {
        let (added, removed) = apply_delta(self.engine.network.edges_mut(), add, remove);
        self.state = None;
        self.saved_state = Some(Checkpoint {
            score: self.last_score,
            localscores: Vec::new(),
            added,
            removed
        });
        Ok(self.run_sampler())
    }

    fn restore_network(&mut self) -> f64 {
        match self.saved_state.take() {
            Some(cp) => {
                revert_delta(self.engine.network.edges_mut(), &cp.added, &cp.removed);
                self.state = None;
                self.last_score = cp.score;
                self.last_score
            },
            None => self.last_score
        }
    }
}


/// Scores a network against missing data by enumerating every possible
/// assignment to the missing cells and averaging all of them in log space.
///
/// No sampling error and no burn-in, but only tractable while the product
/// of the missing cells' arities stays small.
pub struct MissingDataExactNetworkEvaluator {
    engine: ImputationEngine,
    last_score: f64,
    saved_state: Option<Checkpoint>
}

impl MissingDataExactNetworkEvaluator {

    pub fn new(data: &Dataset, network: Network, prior: Box<dyn Prior>) -> Self {
        MissingDataExactNetworkEvaluator::with_config(data, network, prior, CpdKind::Fused)
    }

    pub fn with_config(
        data: &Dataset,
        network: Network,
        prior: Box<dyn Prior>,
        cpd_kind: CpdKind,
    ) -> Self {
        MissingDataExactNetworkEvaluator {
            engine: ImputationEngine::new(data, network, prior, cpd_kind),
            last_score: 0.0,
            saved_state: None
        }
    }

    fn run(&mut self) -> f64 {
        let engine = &mut self.engine;

        let missing = engine.data.missing_indices();
        if missing.is_empty() {
            engine.rebuild_cpds();
            self.last_score = engine.score();
            return self.last_score;
        }

        // start from the all-zeros assignment, then walk the full
        // Cartesian product; consecutive assignments share most cells, so
        // set_cell's no-op skip keeps the walk cheap
        for &(row, col) in &missing {
            engine.data.set_value(row, col, 0);
        }
        engine.rebuild_cpds();

        let ranges: Vec<_> = missing.iter()
                                    .map(|&(_, col)| 0..engine.data.arity(col))
                                    .collect();

        let mut scores = Vec::new();
        for assignment in ranges.into_iter().multi_cartesian_product() {
            for (&(row, col), &value) in missing.iter().zip(assignment.iter()) {
                engine.set_cell(row, col, value);
            }
            scores.push(engine.score());
        }

        self.last_score = logsumexp(&scores) - (scores.len() as f64).ln();
        self.last_score
    }
}

impl NetworkEvaluator for MissingDataExactNetworkEvaluator {

    fn network(&self) -> &Network {
        &self.engine.network
    }

    fn score_network(&mut self, net: Option<&Network>) -> Result<f64> {
        if let Some(net) = net {
            self.engine.network = net.clone();
        }
        Ok(self.run())
    }

    fn alter_network(&mut self, add: &[Edge], remove: &[Edge]) -> Result<f64> {
        let (added, removed) = apply_delta(self.engine.network.edges_mut(), add, remove);
        self.saved_state = Some(Checkpoint {
            score: self.last_score,
            localscores: Vec::new(),
            added,
            removed
        });
        Ok(self.run())
    }

    fn restore_network(&mut self) -> f64 {
        match self.saved_state.take() {
            Some(cp) => {
                revert_delta(self.engine.network.edges_mut(), &cp.added, &cp.removed);
                self.last_score = cp.score;
                self.last_score
            },
            None => self.last_score
        }
    }
}


/// Gibbs-samples missing data while holding every variable's marginal
/// distribution fixed.
///
/// Missing cells are first filled so each variable's marginal is as close
/// to uniform as the observed cells allow, then the sampler proposes
/// pairwise value swaps between two missing cells of the same variable -
/// a move that preserves the marginal exactly - accepting each through
/// the same two-candidate log-space wheel used everywhere else. For
/// downstream consumers that assume equal-frequency discretization, the
/// assumption survives imputation.
pub struct MissingDataMaximumEntropyNetworkEvaluator {
    engine: ImputationEngine,
    stopping: StoppingPolicy,
    burnin_sweeps: usize,

    state: Option<GibbsSamplerState>,
    last_score: f64,
    saved_state: Option<Checkpoint>
}

impl MissingDataMaximumEntropyNetworkEvaluator {

    pub fn new(data: &Dataset, network: Network, prior: Box<dyn Prior>) -> Self {
        MissingDataMaximumEntropyNetworkEvaluator::with_config(
            data, network, prior, CpdKind::Fused, StoppingPolicy::SweepsSquared, 10
        )
    }

    pub fn with_config(
        data: &Dataset,
        network: Network,
        prior: Box<dyn Prior>,
        cpd_kind: CpdKind,
        stopping: StoppingPolicy,
        burnin_sweeps: usize,
    ) -> Self {
        MissingDataMaximumEntropyNetworkEvaluator {
            engine: ImputationEngine::new(data, network, prior, cpd_kind),
            stopping,
            burnin_sweeps,
            state: None,
            last_score: 0.0,
            saved_state: None
        }
    }

    /// The resumable sampler state from the most recent run, if any.
    pub fn gibbs_state(&self) -> Option<&GibbsSamplerState> {
        self.state.as_ref()
    }

    fn run_sampler(&mut self) -> f64 {
        let mut rng = rand::thread_rng();
        let engine = &mut self.engine;

        let missing = engine.data.missing_indices();
        if missing.is_empty() {
            engine.rebuild_cpds();
            self.last_score = engine.score();
            return self.last_score;
        }
        let n = missing.len();

        ///////////////////////////////////////////////////////////////////
        // 1) fill cells (uniform-marginal fill, or the resumed values,
        //    which carry the same marginals) and build CPDs
        let resume = self.state.take();
        match resume.as_ref() {
            Some(_) => engine.assign_missing(&missing, resume.as_ref(), &mut rng),
            None => engine.assign_max_entropy(&missing, &mut rng)
        }
        engine.rebuild_cpds();

        // swap partners live in the same column
        let mut by_col: HashMap<usize, Vec<usize>> = HashMap::new();
        for (i, &(_, col)) in missing.iter().enumerate() {
            by_col.entry(col).or_insert_with(Vec::new).push(i);
        }

        ///////////////////////////////////////////////////////////////////
        // 2) sweep the cells; propose swapping each against a random peer
        let max_iterations = self.stopping.max_iterations(n);
        let mut scores = Vec::with_capacity(max_iterations);

        'sweeps: while scores.len() < max_iterations {
            for (i, &(row, col)) in missing.iter().enumerate() {
                let peers = &by_col[&col];

                let partner = if peers.len() < 2 {
                    None
                } else {
                    loop {
                        let j = peers[Range::new(0, peers.len()).ind_sample(&mut rng)];
                        if j != i {
                            break Some(j);
                        }
                    }
                };

                let recorded = match partner {
                    None => engine.score(),
                    Some(j) => {
                        let (prow, pcol) = missing[j];
                        let mine = engine.data.value(row, col);
                        let theirs = engine.data.value(prow, pcol);

                        if mine == theirs {
                            engine.score()
                        } else {
                            let current = engine.score();
                            engine.set_cell(row, col, theirs);
                            engine.set_cell(prow, pcol, mine);
                            let swapped = engine.score();

                            if logscale_probwheel(&[current, swapped], &mut rng) == 0 {
                                engine.set_cell(row, col, mine);
                                engine.set_cell(prow, pcol, theirs);
                                current
                            } else {
                                swapped
                            }
                        }
                    }
                };

                scores.push(recorded);
                if scores.len() >= max_iterations {
                    break 'sweeps;
                }
            }
        }
        if scores.is_empty() {
            scores.push(engine.score());
        }

        ///////////////////////////////////////////////////////////////////
        // 3) average and persist, exactly as the plain Gibbs sampler does
        let burnin = self.burnin_sweeps * n;
        let (avgscore, numscores) = finalize_scores(&scores, burnin, resume.as_ref());

        self.state = Some(GibbsSamplerState {
            avgscore,
            numscores,
            assignedvals: engine.assigned_values(&missing)
        });
        self.last_score = avgscore;
        avgscore
    }
}

impl NetworkEvaluator for MissingDataMaximumEntropyNetworkEvaluator {

    fn network(&self) -> &Network {
        &self.engine.network
    }

    fn score_network(&mut self, net: Option<&Network>) -> Result<f64> {
        if let Some(net) = net {
            self.engine.network = net.clone();
            self.state = None;
        }
        Ok(self.run_sampler())
    }

    fn alter_network(&mut self, add: &[Edge], remove: &[Edge]) -> Result<f64> {
        let (added, removed) = apply_delta(self.engine.network.edges_mut(), add, remove);
        self.state = None;
        self.saved_state = Some(Checkpoint {
            score: self.last_score,
            localscores: Vec::new(),
            added,
            removed
        });
        Ok(self.run_sampler())
    }

    fn restore_network(&mut self) -> f64 {
        match self.saved_state.take() {
            Some(cp) => {
                revert_delta(self.engine.network.edges_mut(), &cp.added, &cp.removed);
                self.state = None;
                self.last_score = cp.score;
                self.last_score
            },
            None => self.last_score
        }
    }
}
