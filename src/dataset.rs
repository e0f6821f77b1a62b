//! Definition of the dataset module.
//!
//! A `Dataset` is the tabular input to every scorer in this crate: an
//! observation matrix (rows = samples, columns = variables) together with a
//! missing-value mask, an intervention mask, and per-column `Variable`
//! metadata. Validation happens once here, at construction time; the
//! scoring hot path assumes values are in range and never re-checks.

use util::{GideonError, Result};

use bidir_map::BidirMap;
use ndarray::prelude as nd;

use std::rc::Rc;


/// A discrete random variable: a name and an arity (number of levels).
/// Observed values for the variable are integer codes in `0..arity`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Variable {
    name: String,
    arity: usize
}

impl Variable {

    /// Construct a new discrete `Variable` with the given number of levels.
    pub fn new(name: &str, arity: usize) -> Variable {
        if arity == 0 {
            panic!("Variable {} must have an arity of at least 1", name);
        }

        Variable { name: String::from(name), arity: arity }
    }

    /// Construct a new binary `Variable`.
    pub fn binary(name: &str) -> Variable {
        Variable::new(name, 2)
    }

    /// Get the name of the `Variable`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of discrete levels the `Variable` can take.
    pub fn arity(&self) -> usize {
        self.arity
    }
}


/// An immutable-during-scoring table of discrete observations.
///
/// The one mutation point is [`set_value`], used by the missing-data
/// samplers to impute cells; those samplers own a private `Dataset` copy,
/// so sharing a `Dataset` read-only across evaluators is safe.
///
/// [`set_value`]: #method.set_value
#[derive(Clone, Debug)]
pub struct Dataset {

    /// The observation matrix. Values at missing cells are placeholders
    /// until a sampler assigns them.
    observations: nd::Array2<usize>,

    /// `missing[[r, c]]` marks cell `(r, c)` as unobserved.
    missing: nd::Array2<bool>,

    /// `interventions[[r, c]]` marks variable `c` as intervened upon (set
    /// by experiment rather than observed) in sample `r`.
    interventions: nd::Array2<bool>,

    /// Per-column variable metadata, shared read-only with `Network`s.
    variables: Rc<Vec<Variable>>,

    /// Two-way lookup between variable names and column indices.
    names: BidirMap<String, usize>

}

impl Dataset {

    /// Construct a `Dataset` from an observation matrix and both masks.
    ///
    /// # Errors
    /// * `GideonError::InvalidDataset` if the mask shapes disagree with the
    ///   observation shape, the column count does not match the variable
    ///   list, or any non-missing value falls outside its column's arity.
    pub fn new(
        observations: nd::Array2<usize>,
        missing: nd::Array2<bool>,
        interventions: nd::Array2<bool>,
        variables: Vec<Variable>,
    ) -> Result<Dataset> {
        let dim = observations.dim();

        if missing.dim() != dim || interventions.dim() != dim {
            return Err(GideonError::InvalidDataset(
                String::from("Observation and mask shapes do not agree")
            ));
        }

        if variables.len() != dim.1 {
            return Err(GideonError::InvalidDataset(
                format!("{} variables given for {} columns", variables.len(), dim.1)
            ));
        }

        for row in 0..dim.0 {
            for col in 0..dim.1 {
                let val = observations[[row, col]];
                if !missing[[row, col]] && val >= variables[col].arity() {
                    return Err(GideonError::InvalidDataset(
                        format!(
                            "Value {} at ({}, {}) exceeds the arity of {}",
                            val, row, col, variables[col].name()
                        )
                    ));
                }
            }
        }

        let mut names = BidirMap::new();
        for (i, v) in variables.iter().enumerate() {
            names.insert(String::from(v.name()), i);
        }

        Ok(Dataset {
            observations,
            missing,
            interventions,
            variables: Rc::new(variables),
            names
        })
    }

    /// Construct a fully observed, non-interventional `Dataset`.
    pub fn from_observations(
        observations: nd::Array2<usize>,
        variables: Vec<Variable>,
    ) -> Result<Dataset> {
        let dim = observations.dim();
        let missing = nd::Array2::from_elem(dim, false);
        let interventions = nd::Array2::from_elem(dim, false);
        Dataset::new(observations, missing, interventions, variables)
    }

    /// The number of samples (rows).
    pub fn num_samples(&self) -> usize {
        self.observations.dim().0
    }

    /// The number of variables (columns).
    pub fn num_variables(&self) -> usize {
        self.observations.dim().1
    }

    /// The per-column variable metadata, shared read-only.
    pub fn variables(&self) -> &Rc<Vec<Variable>> {
        &self.variables
    }

    /// The arity of column `col`.
    pub fn arity(&self, col: usize) -> usize {
        self.variables[col].arity()
    }

    /// The largest arity across all columns.
    pub fn max_arity(&self) -> usize {
        self.variables.iter().map(|v| v.arity()).max().unwrap_or(1)
    }

    /// The observation matrix.
    pub fn observations(&self) -> &nd::Array2<usize> {
        &self.observations
    }

    /// The observed value at `(row, col)`.
    pub fn value(&self, row: usize, col: usize) -> usize {
        self.observations[[row, col]]
    }

    /// Overwrite the value at `(row, col)`.
    ///
    /// This is the imputation hook for the missing-data samplers; it does
    /// not clear the missing flag, since the cell remains conceptually
    /// unobserved.
    pub fn set_value(&mut self, row: usize, col: usize, value: usize) {
        debug_assert!(value < self.arity(col));
        self.observations[[row, col]] = value;
    }

    /// Whether cell `(row, col)` is missing.
    pub fn is_missing(&self, row: usize, col: usize) -> bool {
        self.missing[[row, col]]
    }

    /// Whether variable `col` was intervened upon in sample `row`.
    pub fn is_intervention(&self, row: usize, col: usize) -> bool {
        self.interventions[[row, col]]
    }

    /// Whether the dataset contains any missing cells.
    pub fn has_missing(&self) -> bool {
        self.missing.iter().any(|&m| m)
    }

    /// All missing cells as `(row, col)` pairs in row-major order. This
    /// order is the fixed enumeration order the samplers sweep in, and the
    /// order of `GibbsSamplerState::assignedvals`.
    pub fn missing_indices(&self) -> Vec<(usize, usize)> {
        let (rows, cols) = self.missing.dim();
        let mut indices = Vec::new();
        for row in 0..rows {
            for col in 0..cols {
                if self.missing[[row, col]] {
                    indices.push((row, col));
                }
            }
        }
        indices
    }

    /// Lookup a column index by variable name.
    pub fn variable_index(&self, name: &str) -> Option<usize> {
        self.names.get_by_first(&String::from(name)).cloned()
    }

    /// Lookup a variable name by column index.
    pub fn variable_name(&self, col: usize) -> Option<&String> {
        self.names.get_by_second(&col)
    }
}
