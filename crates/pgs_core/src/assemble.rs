//! Per-realization attempt loop and final field assembly.

use rand_chacha::ChaCha12Rng;
use serde::Serialize;
use tracing::{debug, warn};

use crate::data::ConditioningSet;
use crate::flag::TruncationRule;
use crate::generator::{self, PointConditioning};
use crate::grid::GridGeometry;
use crate::kriging::KrigingSystem;
use crate::mh;
use crate::params::{MhSchedule, ResolvedField, RetryPolicy};
use crate::sequential::{self, PointField};

/// Diagnostics of the conditioning loop for one realization.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ConditioningReport {
    /// Honored-point count per conditioning iteration. Empty for
    /// unconditional runs.
    pub honored_history: Vec<usize>,
    pub n_points: usize,
    pub fully_honored: bool,
    /// Attempts consumed, including the successful one.
    pub tries: usize,
}

/// One accepted realization.
#[derive(Clone, Debug)]
pub struct Realization {
    /// Categorical field, flattened like the grid.
    pub z: Vec<i64>,
    pub t1: Vec<f64>,
    pub t2: Vec<f64>,
    pub report: ConditioningReport,
}

/// Everything one realization attempt needs, shared read-only across tries.
pub(crate) struct AttemptContext<'a> {
    pub grid: &'a GridGeometry,
    pub fields: [&'a ResolvedField; 2],
    pub systems: [Option<&'a KrigingSystem>; 2],
    /// Per-point means per field; empty vectors for unconditional runs.
    pub point_means: [Vec<f64>; 2],
    pub set: Option<&'a ConditioningSet>,
    pub schedule: &'a MhSchedule,
    pub retry: &'a RetryPolicy,
}

/// Produce one realization, retrying up to the policy's budget.
///
/// `None` means every try was abandoned; the caller omits the realization.
pub(crate) fn realize(
    context: &AttemptContext<'_>,
    rule: &dyn TruncationRule,
    rng: &mut ChaCha12Rng,
) -> Option<Realization> {
    for ntry in 0..context.retry.ntry_max {
        if ntry > 0 {
            debug!(ntry, "retrying realization");
        }
        let last_try = ntry + 1 == context.retry.ntry_max;
        if let Some(mut realization) = one_try(context, rule, rng, last_try) {
            realization.report.tries = ntry + 1;
            return Some(realization);
        }
    }
    None
}

fn one_try(
    context: &AttemptContext<'_>,
    rule: &dyn TruncationRule,
    rng: &mut ChaCha12Rng,
    last_try: bool,
) -> Option<Realization> {
    let mut report = ConditioningReport::default();
    let mut conditioning: [Option<PointConditioning>; 2] = [None, None];

    if let Some(set) = context.set {
        let fields = [
            PointField {
                means: context.point_means[0].clone(),
                system: context.systems[0],
            },
            PointField {
                means: context.point_means[1].clone(),
                system: context.systems[1],
            },
        ];
        let mut values = [Vec::new(), Vec::new()];
        for (f, field) in fields.iter().enumerate() {
            match sequential::initial_values(field, rng) {
                Ok(drawn) => values[f] = drawn,
                Err(_) => {
                    debug!(field = f, "initialization kriging system is singular");
                    return None;
                }
            }
        }

        let outcome = match mh::condition(
            &fields,
            &mut values,
            &set.values,
            rule,
            context.schedule,
            rng,
        ) {
            Ok(outcome) => outcome,
            Err(_) => {
                debug!("leave-one-out kriging system is singular");
                return None;
            }
        };
        if !outcome.fully_honored {
            debug!(
                honored = outcome.honored_history.last().copied().unwrap_or(0),
                total = set.len(),
                "conditioning failed"
            );
            if !last_try || !context.retry.retrieve_anyway {
                return None;
            }
            warn!("realization does not honor all conditioning data, retrieved anyway");
        }
        report.honored_history = outcome.honored_history;
        report.n_points = set.len();
        report.fully_honored = outcome.fully_honored;

        let [t1_values, t2_values] = values;
        conditioning = [
            Some(PointConditioning {
                cells: set.cells.clone(),
                values: t1_values,
            }),
            Some(PointConditioning {
                cells: set.cells.clone(),
                values: t2_values,
            }),
        ];
    } else {
        report.fully_honored = true;
    }

    let mut grids: [Vec<f64>; 2] = [Vec::new(), Vec::new()];
    for f in 0..2 {
        let generator = generator::for_algorithm(&context.fields[f].algorithm);
        match generator.generate(
            context.grid,
            context.fields[f],
            conditioning[f].as_ref(),
            rng,
        ) {
            Ok(values) => grids[f] = values,
            Err(failure) => {
                debug!(field = f, reason = failure.0.as_str(), "field generation failed");
                return None;
            }
        }
    }
    let [t1, t2] = grids;
    let z = t1
        .iter()
        .zip(&t2)
        .map(|(&a, &b)| rule.category(a, b))
        .collect();
    Some(Realization {
        z,
        t1,
        t2,
        report,
    })
}
