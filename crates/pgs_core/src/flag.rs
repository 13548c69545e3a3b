use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Deterministic rule mapping a pair of latent values to a category.
///
/// Implementations must be pure: the same `(t1, t2)` pair always yields the
/// same category.
pub trait TruncationRule {
    fn category(&self, t1: f64, t2: f64) -> i64;
}

impl<F> TruncationRule for F
where
    F: Fn(f64, f64) -> i64,
{
    fn category(&self, t1: f64, t2: f64) -> i64 {
        self(t1, t2)
    }
}

/// Truncation diagram given as a threshold grid.
///
/// `t1_thresholds` split the T1 axis into `len + 1` bands (likewise for T2);
/// `categories` is the row-major band table, T1 bands × T2 bands. A value
/// equal to a threshold belongs to the upper band.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlagGrid {
    pub t1_thresholds: Vec<f64>,
    pub t2_thresholds: Vec<f64>,
    pub categories: Vec<i64>,
}

impl FlagGrid {
    pub fn new(
        t1_thresholds: Vec<f64>,
        t2_thresholds: Vec<f64>,
        categories: Vec<i64>,
    ) -> Result<Self> {
        for thresholds in [&t1_thresholds, &t2_thresholds] {
            if thresholds.windows(2).any(|w| w[0] >= w[1]) {
                return Err(SimError::Validation(
                    "flag thresholds must be strictly increasing".into(),
                ));
            }
        }
        let expected = (t1_thresholds.len() + 1) * (t2_thresholds.len() + 1);
        if categories.len() != expected {
            return Err(SimError::Validation(format!(
                "flag category table has {} entries, expected {}",
                categories.len(),
                expected
            )));
        }
        Ok(Self {
            t1_thresholds,
            t2_thresholds,
            categories,
        })
    }

    fn band(thresholds: &[f64], value: f64) -> usize {
        thresholds.iter().take_while(|&&t| value >= t).count()
    }
}

impl TruncationRule for FlagGrid {
    fn category(&self, t1: f64, t2: f64) -> i64 {
        let row = Self::band(&self.t1_thresholds, t1);
        let col = Self::band(&self.t2_thresholds, t2);
        self.categories[row * (self.t2_thresholds.len() + 1) + col]
    }
}
