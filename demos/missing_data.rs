//! Provides an example of scoring a network against data with holes.
//!
//! The same structure is scored three ways: by Gibbs sampling, by a second
//! Gibbs run resumed from the first one's state, and exactly, by
//! enumerating every completion of the missing cells.

extern crate gideon;
#[macro_use]
extern crate ndarray;

use gideon as g;
use g::NetworkEvaluator;

fn main() -> g::Result<()> {

    ///////////////////////////////////////////////////
    // Step 1: a five-sample dataset with two unobserved cells
    let obs = array![
        [0, 1, 1, 0],
        [1, 0, 0, 1],
        [1, 1, 1, 0],
        [1, 1, 1, 0],
        [0, 0, 1, 1]
    ];
    let mut missing = ndarray::Array2::from_elem((5, 4), false);
    missing[[0, 0]] = true;
    missing[[3, 2]] = true;
    let interventions = ndarray::Array2::from_elem((5, 4), false);

    let variables = vec![
        g::Variable::binary("w"),
        g::Variable::binary("x"),
        g::Variable::binary("y"),
        g::Variable::binary("z")
    ];
    let data = g::Dataset::new(obs, missing, interventions, variables)?;

    let net = g::Network::with_edges(
        data.variables().clone(),
        &[(1, 0), (2, 0), (3, 0)]
    );

    ///////////////////////////////////////////////////
    // Step 2: Gibbs estimate, then resume for more samples
    let mut gibbs = g::MissingDataNetworkEvaluator::new(
        &data, net.clone(), Box::new(g::NullPrior)
    );
    let estimate = gibbs.score_network(None)?;
    println!("gibbs estimate:   {:.6}", estimate);

    let refined = gibbs.score_network(None)?;
    let state = gibbs.gibbs_state().unwrap();
    println!("resumed estimate: {:.6} over {} samples", refined, state.numscores);

    ///////////////////////////////////////////////////
    // Step 3: the exact answer, for comparison
    let mut exact = g::MissingDataExactNetworkEvaluator::new(
        &data, net, Box::new(g::NullPrior)
    );
    println!("exact average:    {:.6}", exact.score_network(None)?);

    Ok(())
}
