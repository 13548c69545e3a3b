use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::ConditioningData;
use crate::error::Result;
use crate::flag::FlagGrid;
use crate::SimulationConfig;

/// Parsed scenario document describing one simulation run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(flatten)]
    pub config: SimulationConfig,
    pub flag: FlagGrid,
    #[serde(default)]
    pub data: Option<ConditioningData>,
}

impl Scenario {
    /// Load a scenario JSON document from disk.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Deserialize a scenario document from an arbitrary reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO_JSON: &str = r#"{
        "name": "channel-belt",
        "grid": {"dimension": [10], "spacing": [1.0], "origin": [0.0]},
        "t1": {
            "cov": {"ndim": 1, "structures": [{"model": "exponential", "sill": 1.0, "range": 3.0}]},
            "mean": 0.0,
            "algorithm": {"sequential": {"max_neighbors": 8}}
        },
        "t2": {"mean": 0.5, "algorithm": "deterministic"},
        "schedule": {"accept_init": 0.25, "accept_pow": 2.0, "iter_min": 20, "iter_max": 50},
        "retry": {"ntry_max": 3, "retrieve_anyway": true},
        "nreal": 4,
        "seed": 99,
        "flag": {"t1_thresholds": [0.0], "t2_thresholds": [], "categories": [2, 1]},
        "data": {"coords": [[0.5]], "values": [1]}
    }"#;

    #[test]
    fn scenario_round_trips() {
        let scenario: Scenario = serde_json::from_str(SCENARIO_JSON).expect("scenario parses");
        assert_eq!(scenario.name, "channel-belt");
        assert_eq!(scenario.config.nreal, 4);
        assert_eq!(scenario.config.grid.dimension, vec![10]);
        assert!(scenario.config.t1.cov.is_some());
        assert!(scenario.config.t2.cov.is_none());
        assert_eq!(scenario.flag.categories, vec![2, 1]);
        assert_eq!(scenario.data.as_ref().unwrap().values, vec![1]);

        let text = serde_json::to_string(&scenario).expect("scenario serializes");
        let again: Scenario = serde_json::from_str(&text).expect("round trip parses");
        assert_eq!(again.config, scenario.config);
    }

    #[test]
    fn repository_scenarios_deserialize() {
        use std::path::PathBuf;

        let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        let scenarios_dir = manifest_dir.join("../../testdata/scenarios");
        for name in ["binary_1d.json", "three_facies_2d.json"] {
            let path = scenarios_dir.join(name);
            let scenario = Scenario::load_from_path(&path)
                .unwrap_or_else(|err| panic!("failed to load {:?}: {}", path, err));
            assert!(
                scenario.config.nreal > 0,
                "scenario {:?} must request realizations",
                path
            );
            scenario.config.grid.validate().expect("grid is valid");
        }
    }

    #[test]
    fn defaults_fill_in_schedule_and_retry() {
        let minimal = r#"{
            "name": "minimal",
            "grid": {"dimension": [4], "spacing": [1.0], "origin": [0.0]},
            "t1": {"mean": 1.0, "algorithm": "deterministic"},
            "t2": {"mean": -1.0, "algorithm": "deterministic"},
            "nreal": 1,
            "seed": 7,
            "flag": {"t1_thresholds": [], "t2_thresholds": [], "categories": [3]}
        }"#;
        let scenario: Scenario = serde_json::from_str(minimal).expect("scenario parses");
        assert_eq!(scenario.config.schedule.iter_min, 100);
        assert_eq!(scenario.config.retry.ntry_max, 1);
        assert!(scenario.data.is_none());
    }
}
