pub mod cov;
pub mod data;
pub mod error;
pub mod flag;
pub mod generator;
pub mod grid;
pub mod io;
pub mod kriging;
pub mod params;
pub mod rng;

mod assemble;
mod mh;
mod sequential;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use assemble::AttemptContext;
use data::{ConditioningData, ConditioningSet};
use error::Result;
use flag::TruncationRule;
use grid::GridGeometry;
use kriging::KrigingSystem;
use params::{FieldSpec, MhSchedule, ResolvedField, RetryPolicy};

pub use assemble::{ConditioningReport, Realization};

/// Full simulation inputs minus the truncation rule and the data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub grid: GridGeometry,
    pub t1: FieldSpec,
    pub t2: FieldSpec,
    #[serde(default)]
    pub schedule: MhSchedule,
    #[serde(default)]
    pub retry: RetryPolicy,
    pub nreal: usize,
    pub seed: u64,
}

/// Outcome of a simulation call.
#[derive(Clone, Debug)]
pub struct SimOutput {
    /// Realization count that was asked for; `realizations` may be shorter
    /// when attempts exhausted their retry budget.
    pub requested: usize,
    pub realizations: Vec<Realization>,
}

/// Simulate `nreal` categorical fields `Z = rule(T1, T2)`.
///
/// With conditioning data, each realization first fixes the latent values at
/// the data points (sequential kriging initialization, then Metropolis-
/// Hastings resampling until the rule maps every point to its required
/// category), generates each latent field over the grid conditioned on those
/// values, and truncates. Structural problems abort the whole call;
/// numerical trouble inside an attempt only consumes its retry budget.
pub fn simulate(
    config: &SimulationConfig,
    rule: &dyn TruncationRule,
    data: Option<&ConditioningData>,
) -> Result<SimOutput> {
    config.grid.validate()?;
    config.schedule.validate()?;
    config.retry.validate()?;
    let t1 = config.t1.resolve(&config.grid, "T1")?;
    let t2 = config.t2.resolve(&config.grid, "T2")?;

    let set = match data {
        Some(data) => {
            let set = ConditioningSet::index(&config.grid, data)?;
            (!set.is_empty()).then_some(set)
        }
        None => None,
    };

    let mut point_means = [Vec::new(), Vec::new()];
    let mut systems: [Option<KrigingSystem>; 2] = [None, None];
    if let Some(set) = &set {
        for (f, field) in [&t1, &t2].into_iter().enumerate() {
            let (means, variances) = point_lookup(field, set);
            if let Some(cov) = &field.cov {
                systems[f] = Some(KrigingSystem::build(&set.coords, cov, variances.as_deref()));
            }
            point_means[f] = means;
        }
    }

    let context = AttemptContext {
        grid: &config.grid,
        fields: [&t1, &t2],
        systems: [systems[0].as_ref(), systems[1].as_ref()],
        point_means,
        set: set.as_ref(),
        schedule: &config.schedule,
        retry: &config.retry,
    };

    let mut realizations = Vec::with_capacity(config.nreal);
    for ireal in 0..config.nreal {
        debug!(ireal, nreal = config.nreal, "simulating realization");
        let mut stream = rng::stream(config.seed, "realization", ireal as u64);
        match assemble::realize(&context, rule, &mut stream) {
            Some(realization) => realizations.push(realization),
            None => debug!(ireal, "realization abandoned after all tries"),
        }
    }
    if realizations.len() < config.nreal {
        warn!(
            produced = realizations.len(),
            requested = config.nreal,
            "some realizations are missing"
        );
    }
    Ok(SimOutput {
        requested: config.nreal,
        realizations,
    })
}

/// Unconditional composition: two independent latent fields through the
/// rule, no conditioning machinery involved.
pub fn simulate_unconditional(
    config: &SimulationConfig,
    rule: &dyn TruncationRule,
) -> Result<SimOutput> {
    simulate(config, rule, None)
}

fn point_lookup(field: &ResolvedField, set: &ConditioningSet) -> (Vec<f64>, Option<Vec<f64>>) {
    let means = set.cells.iter().map(|&c| field.mean[c]).collect();
    let variances = field
        .variance
        .as_ref()
        .map(|v| set.cells.iter().map(|&c| v[c]).collect());
    (means, variances)
}
