//! Metropolis-Hastings conditioning of the latent values at data points.
//!
//! The truncation rule is not invertible, so the sequential initialization
//! rarely honors every data point. This loop resamples the latent pair at
//! each point conditionally on all the others (leave-one-out simple kriging)
//! and keeps candidates that honor their point. Early iterations also keep
//! violating candidates with a decaying probability, so the chain can escape
//! a poor initialization; from `iter_min` on only unhonored points are
//! resampled and wrong candidates are never kept, which makes the honored
//! count non-decreasing until termination.

use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::StandardNormal;
use tracing::trace;

use crate::flag::TruncationRule;
use crate::kriging::SingularSystem;
use crate::params::MhSchedule;
use crate::sequential::PointField;

pub(crate) struct MhOutcome {
    /// Honored-point count recorded at the start of every iteration, plus a
    /// final entry when the loop exhausts its budget.
    pub honored_history: Vec<usize>,
    pub fully_honored: bool,
}

pub(crate) fn condition<R: Rng>(
    fields: &[PointField<'_>; 2],
    values: &mut [Vec<f64>; 2],
    targets: &[i64],
    rule: &dyn TruncationRule,
    schedule: &MhSchedule,
    rng: &mut R,
) -> Result<MhOutcome, SingularSystem> {
    let n = targets.len();
    let mut history = Vec::new();
    let mut honored = vec![false; n];
    let mut order: Vec<usize> = (0..n).collect();
    let mut stopped = false;

    for nit in 0..schedule.iter_max {
        for k in 0..n {
            honored[k] = rule.category(values[0][k], values[1][k]) == targets[k];
        }
        let count = honored.iter().filter(|&&h| h).count();
        history.push(count);
        let past_min = nit >= schedule.iter_min;
        if past_min && count == n {
            stopped = true;
            break;
        }
        let p_accept = if past_min {
            0.0
        } else {
            schedule.accept_probability(nit)
        };
        trace!(iteration = nit, honored = count, total = n, "resampling sweep");

        order.shuffle(rng);
        for &k in &order {
            if past_min && honored[k] {
                continue;
            }
            let others: Vec<usize> = (0..n).filter(|&i| i != k).collect();
            let mut candidate = [0.0f64; 2];
            for (f, field) in fields.iter().enumerate() {
                candidate[f] = match field.system {
                    Some(system) => {
                        let (weights, variance) = system.solve(&others, k)?;
                        let mean = field.kriged_mean(&weights, &others, k, &values[f]);
                        let z: f64 = rng.sample(StandardNormal);
                        mean + variance.sqrt() * z
                    }
                    None => field.means[k],
                };
            }
            let accept = rule.category(candidate[0], candidate[1]) == targets[k]
                || (!past_min && rng.gen::<f64>() < p_accept);
            if accept {
                values[0][k] = candidate[0];
                values[1][k] = candidate[1];
            }
        }
    }

    if !stopped {
        let count = (0..n)
            .filter(|&k| rule.category(values[0][k], values[1][k]) == targets[k])
            .count();
        history.push(count);
    }
    let fully_honored = history.last().copied() == Some(n);
    Ok(MhOutcome {
        honored_history: history,
        fully_honored,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cov::{CovModel, CovStructure};
    use crate::kriging::KrigingSystem;
    use crate::rng;

    fn cov() -> CovModel {
        CovModel::new(
            1,
            vec![CovStructure::Gaussian {
                sill: 1.0,
                range: 2.0,
            }],
        )
        .unwrap()
    }

    fn sign_rule(t1: f64, _t2: f64) -> i64 {
        if t1 > 0.0 {
            1
        } else {
            2
        }
    }

    #[test]
    fn honors_a_single_point() {
        let coords = vec![vec![0.0]];
        let system = KrigingSystem::build(&coords, &cov(), None);
        let fields = [
            PointField {
                means: vec![0.0],
                system: Some(&system),
            },
            PointField {
                means: vec![0.0],
                system: None,
            },
        ];
        let mut values = [vec![-0.7], vec![0.0]];
        let schedule = MhSchedule {
            iter_min: 0,
            iter_max: 50,
            ..MhSchedule::default()
        };
        let outcome = condition(
            &fields,
            &mut values,
            &[1],
            &(sign_rule as fn(f64, f64) -> i64),
            &schedule,
            &mut rng::stream(3, "mh", 0),
        )
        .unwrap();
        assert!(outcome.fully_honored);
        assert!(values[0][0] > 0.0);
    }

    #[test]
    fn deterministic_fields_never_move() {
        let fields = [
            PointField {
                means: vec![0.4, -0.4],
                system: None,
            },
            PointField {
                means: vec![0.0, 0.0],
                system: None,
            },
        ];
        let mut values = [vec![0.4, -0.4], vec![0.0, 0.0]];
        let schedule = MhSchedule {
            iter_min: 0,
            iter_max: 10,
            ..MhSchedule::default()
        };
        // First point wants category 1 (honored by its mean), second wants 1
        // but its mean maps to 2: no randomness exists to fix it.
        let outcome = condition(
            &fields,
            &mut values,
            &[1, 1],
            &(sign_rule as fn(f64, f64) -> i64),
            &schedule,
            &mut rng::stream(4, "mh", 0),
        )
        .unwrap();
        assert!(!outcome.fully_honored);
        assert!(outcome.honored_history.iter().all(|&c| c == 1));
        assert_eq!(values[0], vec![0.4, -0.4]);
    }

    #[test]
    fn honored_count_never_drops_past_iter_min() {
        let coords: Vec<Vec<f64>> = (0..6).map(|i| vec![i as f64 * 1.5]).collect();
        let system = KrigingSystem::build(&coords, &cov(), None);
        let fields = [
            PointField {
                means: vec![0.0; 6],
                system: Some(&system),
            },
            PointField {
                means: vec![0.0; 6],
                system: None,
            },
        ];
        let mut values = [vec![-0.5, 0.5, -0.5, 0.5, -0.5, 0.5], vec![0.0; 6]];
        let targets = vec![1, 1, 1, 1, 1, 1];
        let schedule = MhSchedule {
            iter_min: 4,
            iter_max: 200,
            ..MhSchedule::default()
        };
        let outcome = condition(
            &fields,
            &mut values,
            &targets,
            &(sign_rule as fn(f64, f64) -> i64),
            &schedule,
            &mut rng::stream(11, "mh", 0),
        )
        .unwrap();
        let history = &outcome.honored_history;
        for pair in history[schedule.iter_min.min(history.len() - 1)..].windows(2) {
            assert!(pair[1] >= pair[0], "history not monotone: {:?}", history);
        }
    }

    #[test]
    fn coincident_points_surface_as_singular() {
        let coords = vec![vec![0.0], vec![0.0], vec![4.0]];
        let system = KrigingSystem::build(&coords, &cov(), None);
        let fields = [
            PointField {
                means: vec![0.0; 3],
                system: Some(&system),
            },
            PointField {
                means: vec![0.0; 3],
                system: None,
            },
        ];
        // Leave-one-out around the third point always conditions on the two
        // coincident ones.
        let mut values = [vec![-1.0; 3], vec![0.0; 3]];
        let schedule = MhSchedule {
            iter_min: 0,
            iter_max: 5,
            ..MhSchedule::default()
        };
        let result = condition(
            &fields,
            &mut values,
            &[1, 1, 1],
            &(sign_rule as fn(f64, f64) -> i64),
            &schedule,
            &mut rng::stream(5, "mh", 0),
        );
        assert_eq!(result.err(), Some(SingularSystem));
    }
}
