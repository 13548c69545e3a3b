use serde::Serialize;

use crate::error::Result;
use crate::Realization;

/// Serializable view of one realization, written as one NDJSON line.
#[derive(Debug, Serialize)]
pub struct RealizationRecord<'a> {
    pub real: usize,
    pub z: &'a [i64],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t1: Option<&'a [f64]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t2: Option<&'a [f64]>,
    pub honored_history: &'a [usize],
    pub n_points: usize,
    pub fully_honored: bool,
    pub tries: usize,
}

impl<'a> RealizationRecord<'a> {
    pub fn new(real: usize, realization: &'a Realization, with_latent: bool) -> Self {
        Self {
            real,
            z: &realization.z,
            t1: with_latent.then_some(realization.t1.as_slice()),
            t2: with_latent.then_some(realization.t2.as_slice()),
            honored_history: &realization.report.honored_history,
            n_points: realization.report.n_points,
            fully_honored: realization.report.fully_honored,
            tries: realization.report.tries,
        }
    }

    pub fn to_ndjson(&self) -> Result<String> {
        Ok(format!("{}\n", serde_json::to_string(self)?))
    }
}

/// Run summary emitted after the realization records.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub scenario: String,
    pub seed: u64,
    pub requested: usize,
    pub produced: usize,
}

impl RunSummary {
    pub fn to_ndjson(&self) -> Result<String> {
        Ok(format!("{}\n", serde_json::to_string(self)?))
    }
}
