use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, SimError};
use crate::grid::GridGeometry;

/// Raw conditioning data as supplied by the caller: one world coordinate and
/// one required category per point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConditioningData {
    pub coords: Vec<Vec<f64>>,
    pub values: Vec<i64>,
}

/// Conditioning data after cell mapping and deduplication.
///
/// Invariant: `cells` holds pairwise-distinct grid indices; `coords[k]` is
/// the representative coordinate of everything that collapsed into
/// `cells[k]`, and all collapsed points agreed on `values[k]`.
#[derive(Clone, Debug)]
pub struct ConditioningSet {
    pub coords: Vec<Vec<f64>>,
    pub values: Vec<i64>,
    pub cells: Vec<usize>,
}

impl ConditioningSet {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Map raw points onto grid cells and collapse coincident points.
    ///
    /// Points sharing a cell must share a value; the first occurrence becomes
    /// the representative. Disagreeing collisions fail the whole call.
    pub fn index(grid: &GridGeometry, data: &ConditioningData) -> Result<Self> {
        if data.coords.len() != data.values.len() {
            return Err(SimError::Validation(format!(
                "{} conditioning coordinates but {} values",
                data.coords.len(),
                data.values.len()
            )));
        }
        let mut coords = Vec::with_capacity(data.coords.len());
        let mut values = Vec::with_capacity(data.values.len());
        let mut cells: Vec<usize> = Vec::with_capacity(data.coords.len());
        let mut duplicates = 0usize;
        for (coord, &value) in data.coords.iter().zip(&data.values) {
            let cell = grid.cell_index(coord)?;
            match cells.iter().position(|&c| c == cell) {
                Some(at) => {
                    if values[at] != value {
                        return Err(SimError::InconsistentData(format!(
                            "points {:?} and {:?} fall in grid cell {} with values {} and {}",
                            coords[at], coord, cell, values[at], value
                        )));
                    }
                    duplicates += 1;
                }
                None => {
                    coords.push(coord.clone());
                    values.push(value);
                    cells.push(cell);
                }
            }
        }
        if duplicates > 0 {
            warn!(
                duplicates,
                "coincident conditioning points collapsed (values consistent)"
            );
        }
        Ok(Self {
            coords,
            values,
            cells,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;

    fn grid() -> GridGeometry {
        GridGeometry::regular(vec![10]).unwrap()
    }

    #[test]
    fn maps_points_to_cells() {
        let data = ConditioningData {
            coords: vec![vec![0.5], vec![7.2]],
            values: vec![1, 2],
        };
        let set = ConditioningSet::index(&grid(), &data).unwrap();
        assert_eq!(set.cells, vec![0, 7]);
        assert_eq!(set.values, vec![1, 2]);
    }

    #[test]
    fn consistent_duplicates_collapse_to_one() {
        let data = ConditioningData {
            coords: vec![vec![3.1], vec![3.9]],
            values: vec![5, 5],
        };
        let set = ConditioningSet::index(&grid(), &data).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.cells, vec![3]);
        assert_eq!(set.coords[0], vec![3.1]);
    }

    #[test]
    fn conflicting_duplicates_fail() {
        let data = ConditioningData {
            coords: vec![vec![3.1], vec![3.9]],
            values: vec![5, 6],
        };
        let err = ConditioningSet::index(&grid(), &data).unwrap_err();
        assert!(matches!(err, SimError::InconsistentData(_)));
    }

    #[test]
    fn out_of_grid_point_is_rejected() {
        let data = ConditioningData {
            coords: vec![vec![11.0]],
            values: vec![1],
        };
        assert!(matches!(
            ConditioningSet::index(&grid(), &data),
            Err(SimError::Validation(_))
        ));
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let data = ConditioningData {
            coords: vec![vec![1.0]],
            values: vec![1, 2],
        };
        assert!(matches!(
            ConditioningSet::index(&grid(), &data),
            Err(SimError::Validation(_))
        ));
    }
}
