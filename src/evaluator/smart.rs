//! Defines the `SmartNetworkEvaluator` - incremental scoring with dirty
//! tracking and one-step undo.
//!
//! A node's local score depends only on its own column and its direct
//! parents' columns, so an edge edit invalidates exactly the scores of the
//! edited edges' destinations - never anything further downstream. The
//! evaluator tracks those dirty nodes, recomputes only them on the next
//! score request, and keeps a one-slot checkpoint so a rejected search
//! move can be reverted exactly.

use cache::LocalscoreCache;
use cpd::{CpdKind, LnFactorialCache};
use dataset::Dataset;
use network::{Edge, Network};
use prior::Prior;
use util::{GideonError, Result};
use super::{apply_delta, edge_delta, revert_delta, Checkpoint, NetworkEvaluator};

use indexmap::IndexSet;

use std::rc::Rc;


pub struct SmartNetworkEvaluator {
    data: Rc<Dataset>,
    network: Network,
    prior: Box<dyn Prior>,
    cache: LocalscoreCache,
    cpd_kind: CpdKind,
    lnfact: Rc<LnFactorialCache>,

    /// Per-node local scores; valid only for nodes not in `dirtynodes`.
    localscores: Vec<f64>,

    /// Nodes whose local score is stale. Starts as every node: a fresh
    /// network has never been scored.
    dirtynodes: IndexSet<usize>,

    score: f64,
    saved_state: Option<Checkpoint>
}

impl SmartNetworkEvaluator {

    /// Construct an evaluator with an unbounded cache and the fused CPD
    /// implementation.
    ///
    /// # Panics
    /// if `data` has missing cells; use the missing-data evaluators for
    /// datasets with holes.
    pub fn new(data: Rc<Dataset>, network: Network, prior: Box<dyn Prior>) -> Self {
        SmartNetworkEvaluator::with_config(
            data, network, prior, CpdKind::Fused, LocalscoreCache::new()
        )
    }

    /// Construct an evaluator with an explicit CPD implementation and
    /// cache.
    pub fn with_config(
        data: Rc<Dataset>,
        network: Network,
        prior: Box<dyn Prior>,
        cpd_kind: CpdKind,
        cache: LocalscoreCache,
    ) -> Self {
        assert!(
            !data.has_missing(),
            "SmartNetworkEvaluator requires fully observed data"
        );

        let n = data.num_variables();
        let lnfact = Rc::new(LnFactorialCache::new(data.num_samples() + data.max_arity()));

        SmartNetworkEvaluator {
            data,
            network,
            prior,
            cache,
            cpd_kind,
            lnfact,
            localscores: vec![0.0; n],
            dirtynodes: (0..n).collect(),
            score: 0.0,
            saved_state: None
        }
    }

    /// Cache diagnostics.
    pub fn cache(&self) -> &LocalscoreCache {
        &self.cache
    }

    /// Recompute the stale local scores, if any, and refresh the total.
    fn refresh(&mut self) {
        if self.dirtynodes.is_empty() {
            return;
        }

        let dirty: Vec<usize> = self.dirtynodes.iter().cloned().collect();
        self.dirtynodes.clear();

        for node in dirty {
            let parents = self.network.edges().incoming(node).to_vec();
            self.localscores[node] = self.cache.get_or_compute(
                &self.data, self.cpd_kind, &self.lnfact, node, &parents
            );
        }

        self.score = self.localscores.iter().sum::<f64>()
            + self.prior.loglikelihood(&self.network);
    }
}

impl NetworkEvaluator for SmartNetworkEvaluator {

    fn network(&self) -> &Network {
        &self.network
    }

    fn score_network(&mut self, net: Option<&Network>) -> Result<f64> {
        match net {
            Some(net) => {
                debug_assert_eq!(self.network.num_nodes(), net.num_nodes());
                let (add, remove) = edge_delta(self.network.edges(), net.edges());
                if add.is_empty() && remove.is_empty() {
                    return self.score_network(None);
                }
                self.alter_network(&add, &remove)
            },
            None => {
                self.refresh();
                Ok(self.score)
            }
        }
    }

    fn alter_network(&mut self, add: &[Edge], remove: &[Edge]) -> Result<f64> {
        ///////////////////////////////////////////////////////////////////
        // 1) settle any pending recomputation, so the checkpoint below
        //    snapshots a consistent (score, localscores) pair
        self.refresh();

        ///////////////////////////////////////////////////////////////////
        // 2) apply the edit: removal before addition, so an edge present
        //    in both lists nets to present
        let (added, removed) = apply_delta(self.network.edges_mut(), add, remove);

        ///////////////////////////////////////////////////////////////////
        // 3) check acyclicity from the added destinations only; a new
        //    cycle must pass through one of them. On failure, roll back
        //    and leave no trace.
        if !added.is_empty() {
            let roots: Vec<usize> = added.iter().map(|&(_, dst)| dst).collect();
            if !self.network.is_acyclic(Some(&roots)) {
                revert_delta(self.network.edges_mut(), &added, &removed);
                return Err(GideonError::CyclicNetwork);
            }
        }

        ///////////////////////////////////////////////////////////////////
        // 4) only an edge's destination gains or loses a parent, so only
        //    destinations go stale
        for &(_, dst) in added.iter().chain(removed.iter()) {
            self.dirtynodes.insert(dst);
        }

        ///////////////////////////////////////////////////////////////////
        // 5) snapshot the displaced state for undo, then recompute
        self.saved_state = Some(Checkpoint {
            score: self.score,
            localscores: self.localscores.clone(),
            added,
            removed
        });

        self.refresh();
        Ok(self.score)
    }

    fn restore_network(&mut self) -> f64 {
        match self.saved_state.take() {
            Some(cp) => {
                revert_delta(self.network.edges_mut(), &cp.added, &cp.removed);
                self.localscores = cp.localscores;
                self.score = cp.score;
                self.dirtynodes.clear();
                self.score
            },
            None => self.score
        }
    }
}


#[cfg(test)]
mod tests {

    use super::*;
    use dataset::Variable;
    use evaluator::standard::StandardNetworkEvaluator;
    use prior::{ConstraintPrior, NullPrior};

    use std::f64;

    fn fixture() -> Rc<Dataset> {
        let obs = array![
            [0, 1, 1, 0],
            [1, 0, 0, 1],
            [1, 1, 1, 0],
            [1, 1, 1, 0],
            [0, 0, 1, 1]
        ];
        let vars = (0..4).map(|i| Variable::binary(&format!("v{}", i))).collect();
        Rc::new(Dataset::from_observations(obs, vars).unwrap())
    }

    fn evaluator(edges: &[Edge]) -> SmartNetworkEvaluator {
        let data = fixture();
        let net = Network::with_edges(data.variables().clone(), edges);
        SmartNetworkEvaluator::new(data, net, Box::new(NullPrior))
    }

    #[test]
    fn end_to_end_worked_fixture() {
        let mut eval = evaluator(&[(1, 0), (2, 0), (3, 0)]);

        let score = eval.score_network(None).unwrap();
        assert!((score - (-15.4610875173)).abs() < 1e-9);

        let score = eval.alter_network(&[(2, 3)], &[]).unwrap();
        assert!((score - (-15.0556224089)).abs() < 1e-9);

        let score = eval.alter_network(&[(1, 2)], &[(1, 0)]).unwrap();
        assert!((score - (-14.8324788576)).abs() < 1e-9);

        let score = eval.restore_network();
        assert!((score - (-15.0556224089)).abs() < 1e-9);
    }

    #[test]
    fn rejects_cycles_with_no_side_effects() {
        let mut eval = evaluator(&[(1, 0), (2, 0), (3, 0)]);
        let before = eval.score_network(None).unwrap();
        let hits = eval.cache().hits();
        let misses = eval.cache().misses();

        match eval.alter_network(&[(0, 1)], &[]) {
            Err(GideonError::CyclicNetwork) => (),
            _ => panic!("expected CyclicNetwork")
        };

        // edges, score and cache counters all exactly as before
        assert_eq!(vec![(1, 0), (2, 0), (3, 0)], eval.network().edges().edges());
        assert_eq!(before, eval.score_network(None).unwrap());
        assert_eq!(hits, eval.cache().hits());
        assert_eq!(misses, eval.cache().misses());
    }

    #[test]
    fn undo_restores_score_and_edges_exactly() {
        let mut eval = evaluator(&[(1, 0)]);
        let s0 = eval.score_network(None).unwrap();

        let s1 = eval.alter_network(&[(2, 0), (2, 3)], &[(1, 0)]).unwrap();
        assert!(s0 != s1);

        assert_eq!(s0, eval.restore_network());
        assert_eq!(vec![(1, 0)], eval.network().edges().edges());
        assert_eq!(s0, eval.score_network(None).unwrap());
    }

    #[test]
    fn second_restore_does_not_roll_back_further() {
        let mut eval = evaluator(&[]);
        eval.score_network(None).unwrap();

        let s1 = eval.alter_network(&[(1, 0)], &[]).unwrap();
        let s2 = eval.alter_network(&[(2, 0)], &[]).unwrap();
        assert!(s1 != s2);

        // one level of history: back to s1, then stuck there
        assert_eq!(s1, eval.restore_network());
        assert_eq!(s1, eval.restore_network());
        assert_eq!(vec![(1, 0)], eval.network().edges().edges());
    }

    #[test]
    fn incremental_matches_from_scratch() {
        let mut eval = evaluator(&[]);
        eval.score_network(None).unwrap();

        let edits: Vec<(Vec<Edge>, Vec<Edge>)> = vec![
            (vec![(1, 0)], vec![]),
            (vec![(2, 0), (2, 3)], vec![]),
            (vec![(1, 2)], vec![(1, 0)]),
            (vec![(3, 0)], vec![(2, 3)]),
            (vec![(1, 0)], vec![(1, 2)])
        ];

        for (add, remove) in edits {
            let incremental = eval.alter_network(&add, &remove).unwrap();

            let data = fixture();
            let net = Network::with_edges(
                data.variables().clone(),
                &eval.network().edges().edges()
            );
            let mut scratch = StandardNetworkEvaluator::new(data, net, Box::new(NullPrior));
            let expected = scratch.score_network(None).unwrap();

            assert!((incremental - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn only_direct_destinations_are_rescored() {
        // chain 0 → 1 → 2 (node 3 isolated): editing the (0, 1) edge must
        // rescore node 1 only, not its descendant 2
        let mut eval = evaluator(&[(0, 1), (1, 2)]);
        eval.score_network(None).unwrap();
        assert_eq!(4, eval.cache().misses());

        eval.alter_network(&[], &[(0, 1)]).unwrap();
        // exactly one new parent-set was computed: (1, {})
        assert_eq!(5, eval.cache().misses());
        assert_eq!(0, eval.cache().hits());

        eval.alter_network(&[(0, 1)], &[]).unwrap();
        // (1, {0}) is already cached; still nothing else rescored
        assert_eq!(5, eval.cache().misses());
        assert_eq!(1, eval.cache().hits());
    }

    #[test]
    fn score_network_with_replacement_net() {
        let mut eval = evaluator(&[(1, 0), (2, 0), (3, 0)]);
        eval.score_network(None).unwrap();

        let data = fixture();
        let target = Network::with_edges(
            data.variables().clone(),
            &[(1, 0), (2, 0), (3, 0), (2, 3)]
        );
        let score = eval.score_network(Some(&target)).unwrap();
        assert!((score - (-15.0556224089)).abs() < 1e-9);
        assert_eq!(target.edges().edges(), eval.network().edges().edges());
    }

    #[test]
    fn clear_network_drops_all_edges() {
        let mut eval = evaluator(&[(1, 0), (2, 0), (3, 0)]);
        eval.score_network(None).unwrap();

        let cleared = eval.clear_network().unwrap();
        assert!(eval.network().edges().is_empty());

        // four independent marginals
        let mut empty = evaluator(&[]);
        let expected = empty.score_network(None).unwrap();
        assert!((cleared - expected).abs() < 1e-9);
    }

    #[test]
    fn randomize_network_yields_scored_dag() {
        let mut eval = evaluator(&[(1, 0)]);
        eval.score_network(None).unwrap();

        let score = eval.randomize_network().unwrap();
        assert!(score.is_finite());
        assert!(eval.network().is_acyclic(None));
    }

    #[test]
    fn neg_inf_prior_propagates_as_score() {
        let data = fixture();
        let net = Network::new(data.variables().clone());
        let prior = ConstraintPrior::new(vec![(1, 0)], vec![], 0.0);
        let mut eval = SmartNetworkEvaluator::new(data, net, Box::new(prior));

        // required edge absent: -inf, as a value rather than an error
        assert_eq!(f64::NEG_INFINITY, eval.score_network(None).unwrap());

        let score = eval.alter_network(&[(1, 0)], &[]).unwrap();
        assert!(score.is_finite());
    }
}
