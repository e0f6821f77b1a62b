extern crate bidir_map;
extern crate indexmap;
extern crate itertools;
#[macro_use]
extern crate ndarray;
extern crate ndarray_rand;
extern crate rand;

pub mod cache;
pub mod cpd;
pub mod dataset;
pub mod evaluator;
pub mod network;
pub mod prior;
pub mod util;

pub use cache::LocalscoreCache;
pub use cpd::{Cpd, CpdKind, FusedCpd, LnFactorialCache, TabularCpd};
pub use dataset::{Dataset, Variable};
pub use evaluator::{
    GibbsSamplerState,
    MissingDataExactNetworkEvaluator,
    MissingDataMaximumEntropyNetworkEvaluator,
    MissingDataNetworkEvaluator,
    NetworkEvaluator,
    SmartNetworkEvaluator,
    StandardNetworkEvaluator,
    StoppingPolicy
};
pub use network::{Edge, EdgeSet, Network};
pub use prior::{ConstraintPrior, NullPrior, Prior};
pub use util::{GideonError, Result};
