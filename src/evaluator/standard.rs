//! Defines the `StandardNetworkEvaluator` - the from-scratch baseline.
//!
//! Every score request walks every node and asks the cache for its local
//! score. No dirty tracking: correctness is easy to see, and the smart
//! evaluator is differentially tested against it. Requires fully observed
//! data.

use cache::LocalscoreCache;
use cpd::{CpdKind, LnFactorialCache};
use dataset::Dataset;
use network::{Edge, Network};
use prior::Prior;
use util::{GideonError, Result};
use super::{apply_delta, edge_delta, revert_delta, Checkpoint, NetworkEvaluator};

use std::rc::Rc;


pub struct StandardNetworkEvaluator {
    data: Rc<Dataset>,
    network: Network,
    prior: Box<dyn Prior>,
    cache: LocalscoreCache,
    cpd_kind: CpdKind,
    lnfact: Rc<LnFactorialCache>,

    localscores: Vec<f64>,
    score: f64,
    saved_state: Option<Checkpoint>
}

impl StandardNetworkEvaluator {

    /// Construct an evaluator with an unbounded cache and the fused CPD
    /// implementation.
    ///
    /// # Panics
    /// if `data` has missing cells; use the missing-data evaluators for
    /// datasets with holes.
    pub fn new(data: Rc<Dataset>, network: Network, prior: Box<dyn Prior>) -> Self {
        StandardNetworkEvaluator::with_config(
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
            "StandardNetworkEvaluator requires fully observed data"
        );

        let n = data.num_variables();
        let lnfact = Rc::new(LnFactorialCache::new(data.num_samples() + data.max_arity()));

        StandardNetworkEvaluator {
            data,
            network,
            prior,
            cache,
            cpd_kind,
            lnfact,
            localscores: vec![0.0; n],
            score: 0.0,
            saved_state: None
        }
    }

    /// Cache diagnostics.
    pub fn cache(&self) -> &LocalscoreCache {
        &self.cache
    }

    /// Recompute every local score and the total.
    fn rescore(&mut self) -> f64 {
        for node in 0..self.network.num_nodes() {
            let parents = self.network.edges().incoming(node).to_vec();
            self.localscores[node] = self.cache.get_or_compute(
                &self.data, self.cpd_kind, &self.lnfact, node, &parents
            );
        }
        self.score = self.localscores.iter().sum::<f64>()
            + self.prior.loglikelihood(&self.network);
        self.score
    }
}

impl NetworkEvaluator for StandardNetworkEvaluator {

    fn network(&self) -> &Network {
        &self.network
    }

    fn score_network(&mut self, net: Option<&Network>) -> Result<f64> {
        match net {
            Some(net) => {
                let (add, remove) = edge_delta(self.network.edges(), net.edges());
                if add.is_empty() && remove.is_empty() {
                    return Ok(self.rescore());
                }
                self.alter_network(&add, &remove)
            },
            None => Ok(self.rescore())
        }
    }

    fn alter_network(&mut self, add: &[Edge], remove: &[Edge]) -> Result<f64> {
        let previous = self.rescore();

        let (added, removed) = apply_delta(self.network.edges_mut(), add, remove);

        if !added.is_empty() {
            let roots: Vec<usize> = added.iter().map(|&(_, dst)| dst).collect();
            if !self.network.is_acyclic(Some(&roots)) {
                revert_delta(self.network.edges_mut(), &added, &removed);
                return Err(GideonError::CyclicNetwork);
            }
        }

        self.saved_state = Some(Checkpoint {
            score: previous,
            localscores: self.localscores.clone(),
            added,
            removed
        });

        Ok(self.rescore())
    }

    fn restore_network(&mut self) -> f64 {
        match self.saved_state.take() {
            Some(cp) => {
                revert_delta(self.network.edges_mut(), &cp.added, &cp.removed);
                self.localscores = cp.localscores;
                self.score = cp.score;
                self.score
            },
            None => self.score
        }
    }
}
