use nalgebra::{DMatrix, DVector};

use crate::cov::CovModel;

/// Marker for a kriging system that could not be solved. Retryable: the
/// attempt is abandoned and a fresh one may be started.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SingularSystem;

/// Dense simple-kriging covariance system over the conditioning points of
/// one latent field.
///
/// Built once per simulation call (it depends only on the point locations
/// and the covariance model) and read-only afterwards; every attempt solves
/// sub-systems of it.
#[derive(Clone, Debug)]
pub struct KrigingSystem {
    mat: DMatrix<f64>,
    sill: f64,
}

impl KrigingSystem {
    /// Build the point-to-point covariance matrix.
    ///
    /// With `point_variance` given, row i and column i are rescaled by
    /// `sqrt(v_i / sill)` so the diagonal becomes `v_i` while off-diagonals
    /// stay geometric-mean consistent.
    pub fn build(coords: &[Vec<f64>], cov: &CovModel, point_variance: Option<&[f64]>) -> Self {
        let n = coords.len();
        let sill = cov.sill();
        let mut mat = DMatrix::from_fn(n, n, |i, j| {
            if i == j {
                sill
            } else {
                let lag: Vec<f64> = coords[i]
                    .iter()
                    .zip(&coords[j])
                    .map(|(a, b)| a - b)
                    .collect();
                cov.covariance(&lag)
            }
        });
        if let Some(variance) = point_variance {
            let scale: Vec<f64> = variance.iter().map(|v| (v / sill).sqrt()).collect();
            for i in 0..n {
                for j in 0..n {
                    mat[(i, j)] *= scale[i] * scale[j];
                }
            }
        }
        Self { mat, sill }
    }

    pub fn len(&self) -> usize {
        self.mat.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stationary variance used as the prior term of the kriging variance.
    pub fn sill(&self) -> f64 {
        self.sill
    }

    /// Simple-kriging weights and variance for `target` conditioned on the
    /// points listed in `active`.
    ///
    /// The kriging variance is clamped to `>= 0` against round-off. An empty
    /// `active` set degenerates to the unconditional draw: no weights, full
    /// sill variance.
    pub fn solve(
        &self,
        active: &[usize],
        target: usize,
    ) -> Result<(DVector<f64>, f64), SingularSystem> {
        let m = active.len();
        if m == 0 {
            return Ok((DVector::zeros(0), self.sill));
        }
        let lhs = DMatrix::from_fn(m, m, |r, c| self.mat[(active[r], active[c])]);
        let rhs = DVector::from_fn(m, |r, _| self.mat[(active[r], target)]);
        let weights = lhs.lu().solve(&rhs).ok_or(SingularSystem)?;
        let variance = (self.sill - weights.dot(&rhs)).max(0.0);
        Ok((weights, variance))
    }
}
