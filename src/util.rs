//! Defines the `Error` type for the gideon library, along with the small
//! log-space numeric helpers shared by every scoring and sampling call site.

use rand::Rng;
use rand::distributions::{IndependentSample, Range};

use std::error::Error;
use std::f64;
use std::fmt;
use std::result;

pub type Result<T> = result::Result<T, GideonError>;

#[derive(Clone, Debug)]
pub enum GideonError {

    /// A tentative edge edit would have introduced a directed cycle.
    /// The evaluator that raised this is left exactly as it was before
    /// the edit was attempted.
    CyclicNetwork,

    /// A dataset failed construction-time validation (mismatched shapes,
    /// or an observed value outside its variable's arity).
    InvalidDataset(String),

    /// A general error with the given description
    General(String)

}

impl fmt::Display for GideonError {

    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            &GideonError::CyclicNetwork => {
                write!(f, "The requested edit would create a directed cycle")
            },
            &GideonError::InvalidDataset(ref err) => write!(f, "Invalid dataset: {}", err),
            &GideonError::General(ref err) => write!(f, "{}", err)
        }
    }

}

impl Error for GideonError {}


/// Numerically stable log-space sum: `ln(sum(exp(scores)))`.
///
/// An empty slice, or a slice containing only `-inf`, yields `-inf` rather
/// than an error; degenerate candidate lists are a value, not a failure.
pub fn logsumexp(scores: &[f64]) -> f64 {
    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    } else if max == f64::INFINITY {
        return f64::INFINITY;
    }

    let sum: f64 = scores.iter().map(|s| (s - max).exp()).sum();
    max + sum.ln()
}


/// Draw an index from a categorical distribution given in log space.
///
/// Candidates are weighted proportionally to `exp(score - max(scores))`,
/// so very negative scores are handled without underflow. This is the one
/// sampler used everywhere a choice is made from a small set of candidate
/// log-scores (Gibbs value selection, swap acceptance).
///
/// # Returns
/// an index into `scores`. If every candidate is `-inf` the draw falls
/// back to a uniform choice.
pub fn logscale_probwheel<R: Rng>(scores: &[f64], rng: &mut R) -> usize {
    if scores.len() < 2 {
        return 0;
    }

    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return Range::new(0, scores.len()).ind_sample(rng);
    }

    let weights: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f64 = weights.iter().sum();

    let draw = Range::new(0.0, 1.0).ind_sample(rng) * total;
    let mut upper = 0.0;
    for (i, w) in weights.iter().enumerate() {
        upper += w;
        if draw < upper {
            return i;
        }
    }

    scores.len() - 1
}


#[cfg(test)]
mod tests {

    use super::*;
    use rand::{SeedableRng, StdRng};

    #[test]
    fn logsumexp_simple() {
        // ln(e^0 + e^0) = ln(2)
        let v = vec![0.0, 0.0];
        assert!((logsumexp(&v) - 2.0_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn logsumexp_shifted() {
        // shifting all inputs by c shifts the result by c
        let v = vec![-1000.0, -1000.0 + 2.0_f64.ln()];
        let expected = -1000.0 + 3.0_f64.ln();
        assert!((logsumexp(&v) - expected).abs() < 1e-9);
    }

    #[test]
    fn logsumexp_degenerate() {
        use std::f64;
        assert_eq!(logsumexp(&[]), f64::NEG_INFINITY);
        assert_eq!(logsumexp(&[f64::NEG_INFINITY, f64::NEG_INFINITY]), f64::NEG_INFINITY);
    }

    #[test]
    fn probwheel_deterministic() {
        // one candidate overwhelmingly outweighs the other
        let mut rng: StdRng = SeedableRng::from_seed(&[7, 11, 13][..]);
        let scores = vec![0.0, -1000.0];
        for _ in 0..100 {
            assert_eq!(0, logscale_probwheel(&scores, &mut rng));
        }
    }

    #[test]
    fn probwheel_single() {
        let mut rng: StdRng = SeedableRng::from_seed(&[1][..]);
        assert_eq!(0, logscale_probwheel(&[-5.0], &mut rng));
    }

    #[test]
    fn probwheel_covers_candidates() {
        // with equal weights, every candidate should show up eventually
        let mut rng: StdRng = SeedableRng::from_seed(&[3, 1, 4][..]);
        let scores = vec![-2.0, -2.0, -2.0];
        let mut seen = [false; 3];
        for _ in 0..1000 {
            seen[logscale_probwheel(&scores, &mut rng)] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn probwheel_all_neg_inf() {
        use std::f64;
        let mut rng: StdRng = SeedableRng::from_seed(&[9][..]);
        let scores = vec![f64::NEG_INFINITY, f64::NEG_INFINITY];
        let i = logscale_probwheel(&scores, &mut rng);
        assert!(i < 2);
    }
}
