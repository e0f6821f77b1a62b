//! Provides an example of using gideon to search over network structures.
//!
//! A small greedy hill-climb with random restarts: propose a random edge
//! flip, keep it if the score improves, and lean on the evaluator's
//! alter/restore pair to roll rejected moves back. Cycle-creating moves
//! cost nothing: the evaluator rejects them with its state untouched.

extern crate gideon;
extern crate ndarray;
extern crate rand;

use gideon as g;
use g::NetworkEvaluator;

use rand::Rng;
use rand::distributions::{IndependentSample, Range};

use std::rc::Rc;

fn main() -> g::Result<()> {

    ///////////////////////////////////////////////////
    // Step 1: a small synthetic dataset: b and c both follow a
    let mut rng = rand::thread_rng();
    let rows = 200;
    let mut obs = ndarray::Array2::from_elem((rows, 3), 0usize);
    for row in 0..rows {
        let a = rng.gen::<bool>() as usize;
        obs[[row, 0]] = a;
        obs[[row, 1]] = if rng.gen::<f64>() < 0.9 { a } else { 1 - a };
        obs[[row, 2]] = if rng.gen::<f64>() < 0.8 { a } else { 1 - a };
    }

    let variables = vec![
        g::Variable::binary("a"),
        g::Variable::binary("b"),
        g::Variable::binary("c")
    ];
    let data = Rc::new(g::Dataset::from_observations(obs, variables)?);
    let n = data.num_variables();

    ///////////////////////////////////////////////////
    // Step 2: hill-climb from a few random starting structures
    let mut best_score = std::f64::NEG_INFINITY;
    let mut best_edges: Vec<g::Edge> = Vec::new();

    for restart in 0..5 {
        let net = g::Network::new(data.variables().clone());
        let mut eval = g::SmartNetworkEvaluator::new(
            data.clone(), net, Box::new(g::NullPrior)
        );

        let mut score = eval.randomize_network()?;
        let node = Range::new(0, n);

        for _ in 0..200 {
            let src = node.ind_sample(&mut rng);
            let dst = node.ind_sample(&mut rng);
            if src == dst {
                continue;
            }

            // flip the edge: remove it if present, add it otherwise
            let edge = (src, dst);
            let present = eval.network().edges().contains(&edge);
            let attempt = if present {
                eval.alter_network(&[], &[edge])
            } else {
                eval.alter_network(&[edge], &[])
            };

            match attempt {
                Ok(candidate) => {
                    if candidate > score {
                        score = candidate;
                    } else {
                        eval.restore_network();
                    }
                },
                // the move would have created a cycle; try another
                Err(g::GideonError::CyclicNetwork) => continue,
                Err(e) => return Err(e)
            }
        }

        println!("restart {}: score {:.6}", restart, score);
        if score > best_score {
            best_score = score;
            best_edges = eval.network().edges().edges();
        }
    }

    ///////////////////////////////////////////////////
    // Step 3: report the winner
    println!("best score {:.6}", best_score);
    for (src, dst) in best_edges {
        println!(
            "  {} -> {}",
            data.variable_name(src).unwrap(),
            data.variable_name(dst).unwrap()
        );
    }

    Ok(())
}
