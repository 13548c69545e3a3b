//! Full-grid latent field generation.
//!
//! The conditioning engine only needs "one realization of this field over
//! the grid, honoring these point values" — the [`LatentFieldGenerator`]
//! trait is that seam. Two generators ship with the crate: a sequential
//! simulation with a capped search neighborhood (the classic algorithm) and
//! the degenerate deterministic one. A spectral generator can be plugged in
//! through the same trait.

use nalgebra::{DMatrix, DVector};
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use rand_distr::StandardNormal;

use crate::grid::GridGeometry;
use crate::params::{Algorithm, ResolvedField};

/// A generation attempt that failed for numerical reasons. Retryable: the
/// caller may start over with fresh randomness.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationFailure(pub String);

/// Point data a generated field must honor.
#[derive(Clone, Debug)]
pub struct PointConditioning {
    pub cells: Vec<usize>,
    pub values: Vec<f64>,
}

pub trait LatentFieldGenerator {
    /// One full-grid realization of the field, flattened like the grid.
    fn generate(
        &self,
        grid: &GridGeometry,
        field: &ResolvedField,
        conditioning: Option<&PointConditioning>,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<f64>, GenerationFailure>;
}

/// Generator for the algorithm selected on a field.
pub fn for_algorithm(algorithm: &Algorithm) -> Box<dyn LatentFieldGenerator> {
    match algorithm {
        Algorithm::Sequential { max_neighbors } => Box::new(SequentialGenerator {
            max_neighbors: *max_neighbors,
        }),
        Algorithm::Deterministic => Box::new(DeterministicGenerator),
    }
}

/// The resolved mean field itself, replicated for every realization. With no
/// randomness there is nothing to condition; point values are ignored.
pub struct DeterministicGenerator;

impl LatentFieldGenerator for DeterministicGenerator {
    fn generate(
        &self,
        _grid: &GridGeometry,
        field: &ResolvedField,
        _conditioning: Option<&PointConditioning>,
        _rng: &mut dyn RngCore,
    ) -> Result<Vec<f64>, GenerationFailure> {
        Ok(field.mean.clone())
    }
}

/// Sequential Gaussian simulation, cell by cell in random order, simple
/// kriging on the nearest previously known values.
pub struct SequentialGenerator {
    /// Cap on the search neighborhood; closer cells win.
    pub max_neighbors: usize,
}

impl LatentFieldGenerator for SequentialGenerator {
    fn generate(
        &self,
        grid: &GridGeometry,
        field: &ResolvedField,
        conditioning: Option<&PointConditioning>,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<f64>, GenerationFailure> {
        let cov = field.cov.as_ref().ok_or_else(|| {
            GenerationFailure("sequential generation requires a covariance model".into())
        })?;
        let sill = cov.sill();
        let ncell = grid.len();
        let centers: Vec<Vec<f64>> = (0..ncell).map(|i| grid.cell_center(i)).collect();
        let scale: Vec<f64> = match &field.variance {
            Some(variance) => variance.iter().map(|v| (v / sill).sqrt()).collect(),
            None => vec![1.0; ncell],
        };

        let mut values = vec![0.0f64; ncell];
        let mut simulated = vec![false; ncell];
        let mut known: Vec<usize> = Vec::new();
        if let Some(cond) = conditioning {
            for (&cell, &value) in cond.cells.iter().zip(&cond.values) {
                values[cell] = value;
                simulated[cell] = true;
                known.push(cell);
            }
        }

        let mut order: Vec<usize> = (0..ncell).filter(|&c| !simulated[c]).collect();
        order.shuffle(rng);

        for &cell in &order {
            let neighbors = nearest_known(&centers, &known, cell, self.max_neighbors);
            let (mean, variance) = if neighbors.is_empty() {
                (field.mean[cell], sill * scale[cell] * scale[cell])
            } else {
                krige_cell(cov, &centers, &scale, field, &values, &neighbors, cell)?
            };
            let z: f64 = rng.sample(StandardNormal);
            values[cell] = mean + variance.sqrt() * z;
            simulated[cell] = true;
            known.push(cell);
        }
        Ok(values)
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn nearest_known(
    centers: &[Vec<f64>],
    known: &[usize],
    cell: usize,
    max_neighbors: usize,
) -> Vec<usize> {
    let mut ranked: Vec<(f64, usize)> = known
        .iter()
        .map(|&k| (squared_distance(&centers[k], &centers[cell]), k))
        .collect();
    if ranked.len() > max_neighbors {
        ranked.select_nth_unstable_by(max_neighbors - 1, |a, b| a.0.total_cmp(&b.0));
        ranked.truncate(max_neighbors);
    }
    ranked.into_iter().map(|(_, k)| k).collect()
}

fn krige_cell(
    cov: &crate::cov::CovModel,
    centers: &[Vec<f64>],
    scale: &[f64],
    field: &ResolvedField,
    values: &[f64],
    neighbors: &[usize],
    cell: usize,
) -> Result<(f64, f64), GenerationFailure> {
    let m = neighbors.len();
    let pair_cov = |a: usize, b: usize| -> f64 {
        if a == b {
            cov.sill() * scale[a] * scale[a]
        } else {
            let lag: Vec<f64> = centers[a]
                .iter()
                .zip(&centers[b])
                .map(|(x, y)| x - y)
                .collect();
            cov.covariance(&lag) * scale[a] * scale[b]
        }
    };
    let lhs = DMatrix::from_fn(m, m, |r, c| pair_cov(neighbors[r], neighbors[c]));
    let rhs = DVector::from_fn(m, |r, _| pair_cov(neighbors[r], cell));
    let weights = lhs
        .lu()
        .solve(&rhs)
        .ok_or_else(|| GenerationFailure("singular kriging neighborhood".into()))?;
    let mut mean = field.mean[cell];
    for (a, &k) in neighbors.iter().enumerate() {
        mean += weights[a] * (values[k] - field.mean[k]);
    }
    let base = cov.sill() * scale[cell] * scale[cell];
    let variance = (base - weights.dot(&rhs)).max(0.0);
    Ok((mean, variance))
}
