//! Defines the `NetworkEvaluator` trait - the scoring surface a structure
//! search drives.
//!
//! Search loops use `alter_network`/`restore_network` as a transactional
//! try/rollback pair: apply a candidate edit, read the new score, and
//! either keep it or revert to exactly the previous state. One level of
//! undo is supported; availability is explicit (`Option<Checkpoint>`), not
//! inferred.

use network::{Edge, EdgeSet, Network};
use util::Result;

pub mod missing;
pub mod smart;
pub mod standard;

pub use self::missing::{
    GibbsSamplerState,
    MissingDataExactNetworkEvaluator,
    MissingDataMaximumEntropyNetworkEvaluator,
    MissingDataNetworkEvaluator,
    StoppingPolicy
};
pub use self::smart::SmartNetworkEvaluator;
pub use self::standard::StandardNetworkEvaluator;


pub trait NetworkEvaluator {

    /// The network currently held by the evaluator.
    fn network(&self) -> &Network;

    /// Score the current network, or — given a replacement — apply the
    /// symmetric-difference edit and score that.
    fn score_network(&mut self, net: Option<&Network>) -> Result<f64>;

    /// Remove `remove`, then add `add`, and return the new total score.
    ///
    /// # Errors
    /// * `GideonError::CyclicNetwork` from the acyclicity-enforcing
    ///   evaluators, in which case no observable state has changed.
    fn alter_network(&mut self, add: &[Edge], remove: &[Edge]) -> Result<f64>;

    /// Revert the most recent successful `alter_network`, returning the
    /// score it displaced. Without a pending checkpoint this is a no-op
    /// returning the current score; only one level of history is kept.
    fn restore_network(&mut self) -> f64;

    /// Drop every edge and return the empty network's score.
    fn clear_network(&mut self) -> Result<f64> {
        let all = self.network().edges().edges();
        self.alter_network(&[], &all)
    }

    /// Replace the current structure with a freshly generated random DAG
    /// and return its score.
    fn randomize_network(&mut self) -> Result<f64> {
        let net = Network::random(self.network().nodes().clone(), None);
        self.score_network(Some(&net))
    }

}


/// A one-slot snapshot for undo: the displaced score and per-node scores,
/// plus the effective edge delta that produced the current state.
#[derive(Clone, Debug)]
pub struct Checkpoint {
    pub score: f64,
    pub localscores: Vec<f64>,
    pub added: Vec<Edge>,
    pub removed: Vec<Edge>
}


/// Apply `remove` then `add` to `edges`, returning the edges that were
/// actually added and removed. Filtering to the effective delta is what
/// keeps rollback and undo honest when a caller passes edges that were
/// already present or already absent.
pub(crate) fn apply_delta(
    edges: &mut EdgeSet,
    add: &[Edge],
    remove: &[Edge],
) -> (Vec<Edge>, Vec<Edge>) {
    let removed: Vec<Edge> = remove.iter().filter(|e| edges.contains(e)).cloned().collect();
    edges.remove_many(&removed);

    let added: Vec<Edge> = add.iter().filter(|e| !edges.contains(e)).cloned().collect();
    edges.add_many(&added);

    (added, removed)
}

/// Undo a delta produced by `apply_delta`.
pub(crate) fn revert_delta(edges: &mut EdgeSet, added: &[Edge], removed: &[Edge]) {
    edges.remove_many(added);
    edges.add_many(removed);
}

/// The edge edit turning the current edge set into `target`.
pub(crate) fn edge_delta(current: &EdgeSet, target: &EdgeSet) -> (Vec<Edge>, Vec<Edge>) {
    let add: Vec<Edge> = target.edges().into_iter()
                               .filter(|e| !current.contains(e))
                               .collect();
    let remove: Vec<Edge> = current.edges().into_iter()
                                   .filter(|e| !target.contains(e))
                                   .collect();
    (add, remove)
}
