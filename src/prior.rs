//! Definition of the prior module.
//!
//! A `Prior` contributes a single structural log-likelihood term, added
//! once per full score computation on top of the per-node local scores.
//! Returning `-inf` expresses a hard constraint violation; evaluators
//! propagate it as a score, never as an error.

use network::{Edge, Network};

use std::f64;


pub trait Prior {

    /// The total structural log-likelihood adjustment for `network`.
    fn loglikelihood(&self, network: &Network) -> f64;

}


/// The indifferent prior: every structure scores 0.
pub struct NullPrior;

impl Prior for NullPrior {

    fn loglikelihood(&self, _network: &Network) -> f64 {
        0.0
    }

}


/// A structural prior combining hard edge constraints with a soft
/// per-edge penalty.
///
/// A network missing a required edge, or containing a prohibited one,
/// scores `-inf`. Otherwise the score is `-edge_penalty * |edges|`, which
/// biases a search toward sparse structures.
pub struct ConstraintPrior {
    required: Vec<Edge>,
    prohibited: Vec<Edge>,
    edge_penalty: f64
}

impl ConstraintPrior {

    pub fn new(required: Vec<Edge>, prohibited: Vec<Edge>, edge_penalty: f64) -> ConstraintPrior {
        ConstraintPrior { required, prohibited, edge_penalty }
    }

}

impl Prior for ConstraintPrior {

    fn loglikelihood(&self, network: &Network) -> f64 {
        let edges = network.edges();

        if self.required.iter().any(|e| !edges.contains(e)) {
            return f64::NEG_INFINITY;
        }
        if self.prohibited.iter().any(|e| edges.contains(e)) {
            return f64::NEG_INFINITY;
        }

        -self.edge_penalty * edges.len() as f64
    }

}


#[cfg(test)]
mod tests {

    use super::*;
    use dataset::Variable;

    use std::rc::Rc;

    fn net(edges: &[Edge]) -> Network {
        let nodes = Rc::new(
            (0..4).map(|i| Variable::binary(&format!("v{}", i))).collect::<Vec<_>>()
        );
        Network::with_edges(nodes, edges)
    }

    #[test]
    fn null_prior_is_zero() {
        assert_eq!(0.0, NullPrior.loglikelihood(&net(&[(0, 1)])));
    }

    #[test]
    fn missing_required_edge_is_neg_inf() {
        let prior = ConstraintPrior::new(vec![(0, 1)], vec![], 0.0);
        assert_eq!(f64::NEG_INFINITY, prior.loglikelihood(&net(&[])));
        assert_eq!(0.0, prior.loglikelihood(&net(&[(0, 1)])));
    }

    #[test]
    fn prohibited_edge_is_neg_inf() {
        let prior = ConstraintPrior::new(vec![], vec![(1, 2)], 0.0);
        assert_eq!(f64::NEG_INFINITY, prior.loglikelihood(&net(&[(1, 2)])));
        assert_eq!(0.0, prior.loglikelihood(&net(&[(2, 1)])));
    }

    #[test]
    fn edge_penalty_scales_with_count() {
        let prior = ConstraintPrior::new(vec![], vec![], 0.5);
        assert_eq!(-1.5, prior.loglikelihood(&net(&[(0, 1), (1, 2), (2, 3)])));
    }
}
