//! Definition of the cpd module.
//!
//! A `Cpd` holds the sufficient statistics for one node given a fixed
//! parent set: a count table indexed by `[parent configuration][child
//! value]` with a per-configuration total column, and the closed-form
//! Bayesian log-likelihood of Cooper & Herskovits (1992) computed from it:
//!
//! ```text
//! LL = sum over configurations c of
//!        ln((ri - 1)!) - ln((N_c + ri - 1)!) + sum over values k of ln(N_ck!)
//! ```
//!
//! Two implementations are provided behind one trait: `TabularCpd`, the
//! straightforward rendition over an ndarray count table, and `FusedCpd`,
//! which keeps the counts in a flat vector and caches the per-configuration
//! score terms so `replace_data` stays cheap inside a sampling loop. Which
//! one an evaluator builds is an explicit constructor parameter (`CpdKind`),
//! never a runtime-detected fallback.

use dataset::Dataset;

use ndarray::prelude as nd;

use std::cell::RefCell;
use std::rc::Rc;


/// A lazily grown table of `ln(n!)` values.
///
/// Shared by reference among every CPD one evaluator builds; each
/// evaluator owns its own instance, so no synchronization is needed.
/// `ln(0!)` is 0, not `-inf`.
#[derive(Debug)]
pub struct LnFactorialCache {
    table: RefCell<Vec<f64>>
}

impl LnFactorialCache {

    /// Construct a cache pre-sized for counts up to `max_count`. The right
    /// size for scoring a dataset is `num_samples + max_arity`.
    pub fn new(max_count: usize) -> LnFactorialCache {
        let cache = LnFactorialCache { table: RefCell::new(vec![0.0]) };
        cache.grow(max_count);
        cache
    }

    /// `ln(n!)`, extending the table if `n` exceeds what has been computed.
    pub fn ln_factorial(&self, n: usize) -> f64 {
        if n >= self.table.borrow().len() {
            self.grow(n);
        }
        self.table.borrow()[n]
    }

    fn grow(&self, n: usize) {
        let mut table = self.table.borrow_mut();
        while table.len() <= n {
            let k = table.len();
            let prev = table[k - 1];
            table.push(prev + (k as f64).ln());
        }
    }
}


/// Selects which `Cpd` implementation an evaluator builds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CpdKind {
    /// `TabularCpd`: ndarray count table, log-likelihood recomputed from
    /// the table on each request.
    Tabular,
    /// `FusedCpd`: flat counts with cached per-configuration terms; the
    /// choice for sampling loops that score after every cell edit.
    Fused
}

impl CpdKind {

    /// Build a CPD of this kind for `child` given `parents`.
    pub fn build(
        &self,
        data: &Dataset,
        child: usize,
        parents: &[usize],
        lnfact: Rc<LnFactorialCache>,
    ) -> Box<dyn Cpd> {
        match *self {
            CpdKind::Tabular => Box::new(TabularCpd::new(data, child, parents, lnfact)),
            CpdKind::Fused => Box::new(FusedCpd::new(data, child, parents, lnfact))
        }
    }
}


/// Sufficient statistics and log-likelihood for one node and parent set.
///
/// `replace_data` swaps a single previously counted row's contribution for
/// new values without touching the dataset: a pure arithmetic adjustment,
/// which is what lets the missing-data samplers perturb one cell at a time
/// without O(N) rework. Row vectors are ordered `[child, parents...]` with
/// parents in the order given at construction.
pub trait Cpd {

    /// The current log-likelihood.
    fn loglikelihood(&self) -> f64;

    /// Replace one row's contribution: decrement the counts for
    /// `old_values`, increment them for `new_values`.
    fn replace_data(&mut self, old_values: &[usize], new_values: &[usize]);

}


/// Shared layout computation: family arities and mixed-radix offsets.
///
/// `offsets[0]` is 0 (the child indexes within a configuration row, not
/// across rows); parent `k` contributes `value * offsets[k]` to the
/// flattened configuration index.
struct Family {
    child_arity: usize,
    num_configurations: usize,
    offsets: Vec<usize>
}

impl Family {

    fn new(data: &Dataset, child: usize, parents: &[usize]) -> Family {
        let child_arity = data.arity(child);
        let qi: usize = parents.iter().map(|&p| data.arity(p)).product();

        let mut offsets = Vec::with_capacity(parents.len() + 1);
        offsets.push(0);
        let mut stride = 1;
        for &p in parents {
            offsets.push(stride);
            stride *= data.arity(p);
        }

        Family { child_arity, num_configurations: qi, offsets }
    }

    fn configuration(&self, values: &[usize]) -> usize {
        values.iter().zip(self.offsets.iter()).map(|(v, o)| v * o).sum()
    }
}

/// Visit each countable row as `(configuration, child value)`. Rows in
/// which the child was intervened upon are skipped: the intervention
/// severed the child from its parents for that sample.
fn count_rows<F: FnMut(usize, usize)>(
    data: &Dataset,
    child: usize,
    parents: &[usize],
    family: &Family,
    mut tally: F,
) {
    let mut values = vec![0; parents.len() + 1];
    for row in 0..data.num_samples() {
        if data.is_intervention(row, child) {
            continue;
        }

        values[0] = data.value(row, child);
        for (slot, &p) in values[1..].iter_mut().zip(parents) {
            *slot = data.value(row, p);
        }
        tally(family.configuration(&values), values[0]);
    }
}


/// The reference CPD: a `qi × (ri + 1)` ndarray count table, column `ri`
/// holding the per-configuration total, with the log-likelihood recomputed
/// from the table on demand.
pub struct TabularCpd {
    family: Family,
    counts: nd::Array2<usize>,
    lnfact: Rc<LnFactorialCache>
}

impl TabularCpd {

    pub fn new(
        data: &Dataset,
        child: usize,
        parents: &[usize],
        lnfact: Rc<LnFactorialCache>,
    ) -> TabularCpd {
        let family = Family::new(data, child, parents);
        let ri = family.child_arity;
        let mut counts = nd::Array2::zeros((family.num_configurations, ri + 1));

        count_rows(data, child, parents, &family, |config, value| {
            counts[[config, value]] += 1;
            counts[[config, ri]] += 1;
        });

        TabularCpd { family, counts, lnfact }
    }

    /// The count table, exposed for inspection.
    pub fn counts(&self) -> &nd::Array2<usize> {
        &self.counts
    }
}

impl Cpd for TabularCpd {

    fn loglikelihood(&self) -> f64 {
        let ri = self.family.child_arity;
        let lnfac = |n| self.lnfact.ln_factorial(n);

        let mut total = 0.0;
        for config in 0..self.family.num_configurations {
            total += lnfac(ri - 1) - lnfac(self.counts[[config, ri]] + ri - 1);
            for value in 0..ri {
                total += lnfac(self.counts[[config, value]]);
            }
        }
        total
    }

    fn replace_data(&mut self, old_values: &[usize], new_values: &[usize]) {
        let ri = self.family.child_arity;

        let config = self.family.configuration(old_values);
        self.counts[[config, old_values[0]]] -= 1;
        self.counts[[config, ri]] -= 1;

        let config = self.family.configuration(new_values);
        self.counts[[config, new_values[0]]] += 1;
        self.counts[[config, ri]] += 1;
    }
}


/// The performance rendition: counts in one flat vector (row stride
/// `ri + 1`), with each configuration's score term cached and refreshed
/// only when that configuration's counts change. The log-likelihood is the
/// sum of the cached terms, so a `replace_data` round trip restores it
/// bit-for-bit — every term is a pure function of integer counts.
pub struct FusedCpd {
    family: Family,
    counts: Vec<u32>,
    terms: Vec<f64>,
    lnfact: Rc<LnFactorialCache>
}

impl FusedCpd {

    pub fn new(
        data: &Dataset,
        child: usize,
        parents: &[usize],
        lnfact: Rc<LnFactorialCache>,
    ) -> FusedCpd {
        let family = Family::new(data, child, parents);
        let ri = family.child_arity;
        let stride = ri + 1;
        let mut counts = vec![0u32; family.num_configurations * stride];

        count_rows(data, child, parents, &family, |config, value| {
            counts[config * stride + value] += 1;
            counts[config * stride + ri] += 1;
        });

        let mut cpd = FusedCpd {
            terms: vec![0.0; family.num_configurations],
            family,
            counts,
            lnfact
        };
        for config in 0..cpd.family.num_configurations {
            let term = cpd.term(config);
            cpd.terms[config] = term;
        }
        cpd
    }

    /// The score contribution of one configuration row.
    fn term(&self, config: usize) -> f64 {
        let ri = self.family.child_arity;
        let row = &self.counts[config * (ri + 1)..(config + 1) * (ri + 1)];

        let mut term = self.lnfact.ln_factorial(ri - 1)
            - self.lnfact.ln_factorial(row[ri] as usize + ri - 1);
        for &count in &row[..ri] {
            term += self.lnfact.ln_factorial(count as usize);
        }
        term
    }
}

impl Cpd for FusedCpd {

    fn loglikelihood(&self) -> f64 {
        self.terms.iter().sum()
    }

    fn replace_data(&mut self, old_values: &[usize], new_values: &[usize]) {
        let ri = self.family.child_arity;
        let stride = ri + 1;

        let config = self.family.configuration(old_values);
        self.counts[config * stride + old_values[0]] -= 1;
        self.counts[config * stride + ri] -= 1;
        let term = self.term(config);
        self.terms[config] = term;

        let config = self.family.configuration(new_values);
        self.counts[config * stride + new_values[0]] += 1;
        self.counts[config * stride + ri] += 1;
        let term = self.term(config);
        self.terms[config] = term;
    }
}


#[cfg(test)]
mod tests {

    use super::*;
    use dataset::Variable;

    /// The standard five-sample, four-binary-variable fixture.
    fn fixture() -> Dataset {
        let obs = array![
            [0, 1, 1, 0],
            [1, 0, 0, 1],
            [1, 1, 1, 0],
            [1, 1, 1, 0],
            [0, 0, 1, 1]
        ];
        let vars = (0..4).map(|i| Variable::binary(&format!("v{}", i))).collect();
        Dataset::from_observations(obs, vars).unwrap()
    }

    fn lnfact_for(data: &Dataset) -> Rc<LnFactorialCache> {
        Rc::new(LnFactorialCache::new(data.num_samples() + data.max_arity()))
    }

    fn build(data: &Dataset, kind: CpdKind, child: usize, parents: &[usize]) -> Box<dyn Cpd> {
        kind.build(data, child, parents, lnfact_for(data))
    }

    #[test]
    fn ln_factorial_values() {
        let cache = LnFactorialCache::new(4);
        assert_eq!(0.0, cache.ln_factorial(0));
        assert_eq!(0.0, cache.ln_factorial(1));
        assert!((cache.ln_factorial(4) - 24.0_f64.ln()).abs() < 1e-12);
        // growth past the initial size
        assert!((cache.ln_factorial(10) - 3628800.0_f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn three_parent_loglikelihood() {
        // closed form for the fixture with child 0, parents {1, 2, 3}:
        // ln(1/48)
        let data = fixture();
        let expected = (1.0 / 48.0_f64).ln();

        for &kind in &[CpdKind::Tabular, CpdKind::Fused] {
            let cpd = build(&data, kind, 0, &[1, 2, 3]);
            assert!((cpd.loglikelihood() - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn no_parent_loglikelihood() {
        // column 1 of the fixture is [1, 0, 1, 1, 0]: ln(1/60)
        let data = fixture();
        let expected = (1.0 / 60.0_f64).ln();

        for &kind in &[CpdKind::Tabular, CpdKind::Fused] {
            let cpd = build(&data, kind, 1, &[]);
            assert!((cpd.loglikelihood() - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn total_column_invariant() {
        let data = fixture();
        let mut cpd = TabularCpd::new(&data, 0, &[1, 2], lnfact_for(&data));

        let check = |cpd: &TabularCpd| {
            let counts = cpd.counts();
            for config in 0..counts.dim().0 {
                let sum: usize = (0..2).map(|v| counts[[config, v]]).sum();
                assert_eq!(sum, counts[[config, 2]]);
            }
        };

        check(&cpd);
        cpd.replace_data(&[0, 1, 1], &[1, 0, 1]);
        check(&cpd);
        cpd.replace_data(&[1, 1, 1], &[0, 0, 0]);
        check(&cpd);
    }

    #[test]
    fn replace_data_round_trip_is_exact() {
        let data = fixture();

        for &kind in &[CpdKind::Tabular, CpdKind::Fused] {
            let mut cpd = build(&data, kind, 0, &[1, 2, 3]);
            let before = cpd.loglikelihood();

            // row 0 is [0, 1, 1, 0]; move it and move it back
            cpd.replace_data(&[0, 1, 1, 0], &[1, 0, 0, 1]);
            cpd.replace_data(&[1, 0, 0, 1], &[0, 1, 1, 0]);

            // integer counts round-trip, so the score must be identical
            assert_eq!(before, cpd.loglikelihood());
        }
    }

    #[test]
    fn replace_data_matches_rebuild() {
        // editing one cell through replace_data must equal rebuilding the
        // CPD over the edited dataset
        let mut data = fixture();

        for &kind in &[CpdKind::Tabular, CpdKind::Fused] {
            let mut cpd = build(&data, kind, 0, &[1, 2, 3]);

            let old = vec![
                data.value(4, 0), data.value(4, 1), data.value(4, 2), data.value(4, 3)
            ];
            data.set_value(4, 0, 1);
            let new = vec![1, data.value(4, 1), data.value(4, 2), data.value(4, 3)];

            cpd.replace_data(&old, &new);

            let fresh = build(&data, kind, 0, &[1, 2, 3]);
            assert!((cpd.loglikelihood() - fresh.loglikelihood()).abs() < 1e-12);

            data.set_value(4, 0, old[0]);
        }
    }

    #[test]
    fn implementations_agree() {
        let data = fixture();
        for child in 0..4 {
            let parents: Vec<usize> = (0..4).filter(|&p| p != child).take(2).collect();
            let tabular = build(&data, CpdKind::Tabular, child, &parents);
            let fused = build(&data, CpdKind::Fused, child, &parents);
            assert!((tabular.loglikelihood() - fused.loglikelihood()).abs() < 1e-12);
        }
    }

    #[test]
    fn intervened_rows_are_excluded() {
        // intervening on the child in row 0 must score like a dataset
        // without that row
        let obs = array![
            [0, 1, 1, 0],
            [1, 0, 0, 1],
            [1, 1, 1, 0],
            [1, 1, 1, 0],
            [0, 0, 1, 1]
        ];
        let vars: Vec<Variable> =
            (0..4).map(|i| Variable::binary(&format!("v{}", i))).collect();

        let missing = nd::Array2::from_elem((5, 4), false);
        let mut interventions = nd::Array2::from_elem((5, 4), false);
        interventions[[0, 0]] = true;
        let data = Dataset::new(obs, missing, interventions, vars.clone()).unwrap();

        let shorter = array![
            [1, 0, 0, 1],
            [1, 1, 1, 0],
            [1, 1, 1, 0],
            [0, 0, 1, 1]
        ];
        let reference = Dataset::from_observations(shorter, vars).unwrap();

        let cpd = build(&data, CpdKind::Fused, 0, &[1, 2]);
        let expected = build(&reference, CpdKind::Fused, 0, &[1, 2]);
        assert!((cpd.loglikelihood() - expected.loglikelihood()).abs() < 1e-12);

        // other children still count row 0
        let cpd = build(&data, CpdKind::Fused, 1, &[]);
        let full = fixture();
        let expected = build(&full, CpdKind::Fused, 1, &[]);
        assert!((cpd.loglikelihood() - expected.loglikelihood()).abs() < 1e-12);
    }

    #[test]
    fn mixed_arity_offsets() {
        // a three-level parent: configurations enumerate correctly
        let obs = array![
            [0, 2],
            [1, 0],
            [0, 1],
            [1, 2],
            [0, 0],
            [1, 1]
        ];
        let vars = vec![Variable::binary("x"), Variable::new("y", 3)];
        let data = Dataset::from_observations(obs, vars).unwrap();

        let cpd = TabularCpd::new(&data, 0, &[1], lnfact_for(&data));
        let counts = cpd.counts();
        assert_eq!((3, 3), counts.dim());
        // each y value appears twice, once with x=0 and once with x=1
        for config in 0..3 {
            assert_eq!(1, counts[[config, 0]]);
            assert_eq!(1, counts[[config, 1]]);
            assert_eq!(2, counts[[config, 2]]);
        }
    }
}
