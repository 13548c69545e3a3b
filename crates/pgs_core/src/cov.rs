use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// One elementary isotropic covariance structure.
///
/// `range` is the practical range: the distance at which the correlation has
/// decayed to about 5% for the asymptotic models, and to exactly zero for the
/// spherical one.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum CovStructure {
    Nugget { sill: f64 },
    Gaussian { sill: f64, range: f64 },
    Exponential { sill: f64, range: f64 },
    Spherical { sill: f64, range: f64 },
}

impl CovStructure {
    fn covariance(&self, h: f64) -> f64 {
        match *self {
            Self::Nugget { sill } => {
                if h == 0.0 {
                    sill
                } else {
                    0.0
                }
            }
            Self::Gaussian { sill, range } => {
                let r = h / range;
                sill * (-3.0 * r * r).exp()
            }
            Self::Exponential { sill, range } => sill * (-3.0 * h / range).exp(),
            Self::Spherical { sill, range } => {
                if h < range {
                    let r = h / range;
                    sill * (1.0 - 1.5 * r + 0.5 * r * r * r)
                } else {
                    0.0
                }
            }
        }
    }

    fn sill(&self) -> f64 {
        match *self {
            Self::Nugget { sill }
            | Self::Gaussian { sill, .. }
            | Self::Exponential { sill, .. }
            | Self::Spherical { sill, .. } => sill,
        }
    }

    fn validate(&self) -> Result<()> {
        let (sill, range) = match *self {
            Self::Nugget { sill } => (sill, None),
            Self::Gaussian { sill, range }
            | Self::Exponential { sill, range }
            | Self::Spherical { sill, range } => (sill, Some(range)),
        };
        if !(sill >= 0.0) || !sill.is_finite() {
            return Err(SimError::Validation("covariance sill must be >= 0".into()));
        }
        if let Some(range) = range {
            if !(range > 0.0) || !range.is_finite() {
                return Err(SimError::Validation(
                    "covariance range must be positive".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Isotropic covariance model: a sum of elementary structures, tagged with
/// the spatial dimension it is declared for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CovModel {
    pub ndim: usize,
    pub structures: Vec<CovStructure>,
}

impl CovModel {
    pub fn new(ndim: usize, structures: Vec<CovStructure>) -> Result<Self> {
        if !(1..=3).contains(&ndim) {
            return Err(SimError::Validation(format!(
                "covariance model dimension must be 1 to 3, got {}",
                ndim
            )));
        }
        if structures.is_empty() {
            return Err(SimError::Validation(
                "covariance model needs at least one structure".into(),
            ));
        }
        for structure in &structures {
            structure.validate()?;
        }
        Ok(Self { ndim, structures })
    }

    /// Covariance at the given lag vector.
    pub fn covariance(&self, lag: &[f64]) -> f64 {
        let h = lag.iter().map(|x| x * x).sum::<f64>().sqrt();
        self.structures.iter().map(|s| s.covariance(h)).sum()
    }

    /// Covariance at lag zero (total sill, the marginal variance).
    pub fn sill(&self) -> f64 {
        self.structures.iter().map(|s| s.sill()).sum()
    }

    /// All supported structures are stationary.
    pub fn is_stationary(&self) -> bool {
        true
    }
}
