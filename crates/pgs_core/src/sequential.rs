//! Sequential simple-kriging draws at the conditioning points.

use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::kriging::{KrigingSystem, SingularSystem};

/// One latent field restricted to the conditioning points.
pub(crate) struct PointField<'a> {
    /// Mean at each conditioning point (grid-cell lookup already applied).
    pub means: Vec<f64>,
    /// `None` for a deterministic field (no covariance model).
    pub system: Option<&'a KrigingSystem>,
}

impl PointField<'_> {
    /// Kriged mean of point `target` given current `values` at `active`.
    pub(crate) fn kriged_mean(
        &self,
        weights: &nalgebra::DVector<f64>,
        active: &[usize],
        target: usize,
        values: &[f64],
    ) -> f64 {
        let mut mean = self.means[target];
        for (a, &idx) in active.iter().enumerate() {
            mean += weights[a] * (values[idx] - self.means[idx]);
        }
        mean
    }
}

/// Draw initial values at every conditioning point.
///
/// Points are visited in a uniformly random order; each is simple-kriged
/// from the already-visited ones and drawn from the resulting normal. A
/// deterministic field degenerates to its configured means, with no
/// randomness consumed.
pub(crate) fn initial_values<R: Rng>(
    field: &PointField<'_>,
    rng: &mut R,
) -> Result<Vec<f64>, SingularSystem> {
    let n = field.means.len();
    let Some(system) = field.system else {
        return Ok(field.means.clone());
    };
    let mut values = vec![0.0; n];
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);
    for j in 0..n {
        let target = order[j];
        let (weights, variance) = system.solve(&order[..j], target)?;
        let mean = field.kriged_mean(&weights, &order[..j], target, &values);
        let z: f64 = rng.sample(StandardNormal);
        values[target] = mean + variance.sqrt() * z;
    }
    Ok(values)
}
