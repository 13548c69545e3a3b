use serde::{Deserialize, Serialize};

use crate::cov::CovModel;
use crate::error::{Result, SimError};
use crate::grid::GridGeometry;

/// Mean or variance parameter of a latent field: one value for the whole
/// grid, or one value per cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueSpec {
    Constant(f64),
    PerCell(Vec<f64>),
}

impl Default for ValueSpec {
    fn default() -> Self {
        Self::Constant(0.0)
    }
}

impl ValueSpec {
    /// Evaluate a function of the cell center over the whole grid.
    ///
    /// This is the lazy-callable form of the parameter; it is evaluated once,
    /// here, so later lookups are plain indexing.
    pub fn from_fn<F>(grid: &GridGeometry, f: F) -> Self
    where
        F: Fn(&[f64]) -> f64,
    {
        Self::PerCell((0..grid.len()).map(|i| f(&grid.cell_center(i))).collect())
    }

    /// Resolve into a concrete per-cell array for `grid`.
    pub fn resolve(&self, grid: &GridGeometry, what: &str) -> Result<Vec<f64>> {
        match self {
            Self::Constant(value) => Ok(vec![*value; grid.len()]),
            Self::PerCell(values) if values.len() == grid.len() => Ok(values.clone()),
            Self::PerCell(values) => Err(SimError::Validation(format!(
                "{} array has {} entries for a grid of {} cells",
                what,
                values.len(),
                grid.len()
            ))),
        }
    }
}

/// Grid-level generation algorithm for one latent field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Sequential simulation, simple kriging on a capped search neighborhood.
    Sequential {
        #[serde(default = "default_max_neighbors")]
        max_neighbors: usize,
    },
    /// No randomness: the resolved mean field itself.
    Deterministic,
}

fn default_max_neighbors() -> usize {
    16
}

impl Default for Algorithm {
    fn default() -> Self {
        Self::Sequential {
            max_neighbors: default_max_neighbors(),
        }
    }
}

/// Description of one latent field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Covariance model; `None` requires the deterministic algorithm.
    #[serde(default)]
    pub cov: Option<CovModel>,
    #[serde(default)]
    pub mean: ValueSpec,
    #[serde(default)]
    pub variance: Option<ValueSpec>,
    #[serde(default)]
    pub algorithm: Algorithm,
}

impl Default for FieldSpec {
    fn default() -> Self {
        Self {
            cov: None,
            mean: ValueSpec::default(),
            variance: None,
            algorithm: Algorithm::Deterministic,
        }
    }
}

/// Per-cell parameters of one latent field after resolution.
#[derive(Clone, Debug)]
pub struct ResolvedField {
    pub cov: Option<CovModel>,
    pub mean: Vec<f64>,
    pub variance: Option<Vec<f64>>,
    pub algorithm: Algorithm,
}

impl FieldSpec {
    pub fn resolve(&self, grid: &GridGeometry, label: &str) -> Result<ResolvedField> {
        // The deterministic algorithm ignores any covariance model.
        let cov = match self.algorithm {
            Algorithm::Deterministic => None,
            _ => self.cov.clone(),
        };
        if cov.is_none() && !matches!(self.algorithm, Algorithm::Deterministic) {
            return Err(SimError::Validation(format!(
                "{}: a covariance model is required unless the algorithm is deterministic",
                label
            )));
        }
        if matches!(self.algorithm, Algorithm::Sequential { max_neighbors: 0 }) {
            return Err(SimError::Validation(format!(
                "{}: max_neighbors must be >= 1",
                label
            )));
        }
        if let Some(cov) = &cov {
            if cov.ndim != grid.ndim() {
                return Err(SimError::Validation(format!(
                    "{}: covariance model is {}D but the grid is {}D",
                    label,
                    cov.ndim,
                    grid.ndim()
                )));
            }
            if cov.sill() <= 0.0 {
                return Err(SimError::Validation(format!(
                    "{}: covariance model has zero sill",
                    label
                )));
            }
        }
        let mean = self.mean.resolve(grid, &format!("{} mean", label))?;
        let variance = match &self.variance {
            Some(spec) => {
                let values = spec.resolve(grid, &format!("{} variance", label))?;
                if values.iter().any(|&v| !(v > 0.0) || !v.is_finite()) {
                    return Err(SimError::Validation(format!(
                        "{} variance must be positive everywhere",
                        label
                    )));
                }
                Some(values)
            }
            None => None,
        };
        Ok(ResolvedField {
            cov,
            mean,
            variance,
            algorithm: self.algorithm.clone(),
        })
    }
}

/// Acceptance schedule and iteration budget of the conditioning loop.
///
/// While `nit < iter_min`, a candidate that violates its category is still
/// accepted with probability `accept_init * (1 - nit/iter_min)^accept_pow`;
/// from `iter_min` on, only honoring candidates are kept.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MhSchedule {
    pub accept_init: f64,
    pub accept_pow: f64,
    pub iter_min: usize,
    pub iter_max: usize,
}

impl Default for MhSchedule {
    fn default() -> Self {
        Self {
            accept_init: 0.25,
            accept_pow: 2.0,
            iter_min: 100,
            iter_max: 200,
        }
    }
}

impl MhSchedule {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.accept_init) {
            return Err(SimError::Validation(
                "accept_init must lie in [0, 1]".into(),
            ));
        }
        if !(self.accept_pow >= 0.0) {
            return Err(SimError::Validation("accept_pow must be >= 0".into()));
        }
        if self.iter_max < self.iter_min {
            return Err(SimError::Validation(
                "iter_max must be >= iter_min".into(),
            ));
        }
        Ok(())
    }

    /// Acceptance probability for a violating candidate at iteration `nit`.
    ///
    /// Only meaningful for `nit < iter_min`.
    pub fn accept_probability(&self, nit: usize) -> f64 {
        let ratio = nit as f64 / self.iter_min as f64;
        self.accept_init * (1.0 - ratio).powf(self.accept_pow)
    }
}

/// Retry policy for one realization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts per realization before giving up.
    pub ntry_max: usize,
    /// Keep the last attempt even when conditioning data remains unhonored.
    #[serde(default)]
    pub retrieve_anyway: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            ntry_max: 1,
            retrieve_anyway: false,
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.ntry_max == 0 {
            return Err(SimError::Validation("ntry_max must be >= 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cov::CovStructure;

    fn grid() -> GridGeometry {
        GridGeometry::regular(vec![4]).unwrap()
    }

    #[test]
    fn constant_resolves_to_full_array() {
        let values = ValueSpec::Constant(1.5).resolve(&grid(), "mean").unwrap();
        assert_eq!(values, vec![1.5; 4]);
    }

    #[test]
    fn per_cell_must_match_grid_size() {
        assert!(ValueSpec::PerCell(vec![1.0; 4]).resolve(&grid(), "mean").is_ok());
        assert!(ValueSpec::PerCell(vec![1.0; 3]).resolve(&grid(), "mean").is_err());
    }

    #[test]
    fn from_fn_evaluates_cell_centers() {
        let spec = ValueSpec::from_fn(&grid(), |center| center[0] * 10.0);
        let values = spec.resolve(&grid(), "mean").unwrap();
        assert_eq!(values, vec![5.0, 15.0, 25.0, 35.0]);
    }

    #[test]
    fn missing_covariance_requires_deterministic() {
        let spec = FieldSpec {
            cov: None,
            mean: ValueSpec::Constant(0.0),
            variance: None,
            algorithm: Algorithm::default(),
        };
        assert!(spec.resolve(&grid(), "T1").is_err());
        let spec = FieldSpec {
            algorithm: Algorithm::Deterministic,
            ..spec
        };
        assert!(spec.resolve(&grid(), "T1").is_ok());
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let spec = FieldSpec {
            cov: Some(
                CovModel::new(
                    2,
                    vec![CovStructure::Exponential {
                        sill: 1.0,
                        range: 2.0,
                    }],
                )
                .unwrap(),
            ),
            mean: ValueSpec::default(),
            variance: None,
            algorithm: Algorithm::default(),
        };
        assert!(spec.resolve(&grid(), "T1").is_err());
    }

    #[test]
    fn schedule_probability_decays_to_zero() {
        let schedule = MhSchedule::default();
        schedule.validate().unwrap();
        assert!((schedule.accept_probability(0) - 0.25).abs() < 1e-12);
        let mut last = f64::INFINITY;
        for nit in 0..schedule.iter_min {
            let p = schedule.accept_probability(nit);
            assert!(p <= last);
            last = p;
        }
        assert!(schedule.accept_probability(schedule.iter_min - 1) < 0.25 / 100.0);
    }

    #[test]
    fn schedule_validation() {
        let schedule = MhSchedule {
            iter_min: 10,
            iter_max: 5,
            ..MhSchedule::default()
        };
        assert!(schedule.validate().is_err());
        let schedule = MhSchedule {
            accept_init: 1.5,
            ..MhSchedule::default()
        };
        assert!(schedule.validate().is_err());
    }
}
