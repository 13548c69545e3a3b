use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Regular rectilinear simulation grid in 1, 2 or 3 dimensions.
///
/// Cell `i` along an axis covers `[origin + i*spacing, origin + (i+1)*spacing)`
/// and cells are flattened x-fastest: `flat = ix + nx*(iy + ny*iz)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    pub dimension: Vec<usize>,
    pub spacing: Vec<f64>,
    pub origin: Vec<f64>,
}

impl GridGeometry {
    pub fn new(dimension: Vec<usize>, spacing: Vec<f64>, origin: Vec<f64>) -> Result<Self> {
        let grid = Self {
            dimension,
            spacing,
            origin,
        };
        grid.validate()?;
        Ok(grid)
    }

    /// Structural checks, also applied to deserialized geometries.
    pub fn validate(&self) -> Result<()> {
        let d = self.dimension.len();
        if !(1..=3).contains(&d) {
            return Err(SimError::Validation(format!(
                "grid must have 1 to 3 axes, got {}",
                d
            )));
        }
        if self.spacing.len() != d || self.origin.len() != d {
            return Err(SimError::Validation(format!(
                "dimension/spacing/origin arity mismatch: {}/{}/{}",
                d,
                self.spacing.len(),
                self.origin.len()
            )));
        }
        if self.dimension.iter().any(|&n| n == 0) {
            return Err(SimError::Validation("grid axis of zero cells".into()));
        }
        if self.spacing.iter().any(|&s| !(s > 0.0) || !s.is_finite()) {
            return Err(SimError::Validation("grid spacing must be positive".into()));
        }
        Ok(())
    }

    /// Unit-spacing grid anchored at the coordinate origin.
    pub fn regular(dimension: Vec<usize>) -> Result<Self> {
        let d = dimension.len();
        Self::new(dimension, vec![1.0; d], vec![0.0; d])
    }

    pub fn ndim(&self) -> usize {
        self.dimension.len()
    }

    /// Total number of grid cells.
    pub fn len(&self) -> usize {
        self.dimension.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flattened cell index of a world coordinate.
    ///
    /// Boundary policy: a coordinate landing exactly on a cell edge resolves
    /// to the LOWER cell whenever that leaves a valid index, so cells behave
    /// as half-open boxes except the last one, which is closed on its upper
    /// edge. Coordinates outside the grid are rejected.
    pub fn cell_index(&self, coord: &[f64]) -> Result<usize> {
        if coord.len() != self.ndim() {
            return Err(SimError::Validation(format!(
                "coordinate arity {} does not match grid arity {}",
                coord.len(),
                self.ndim()
            )));
        }
        let mut flat = 0usize;
        let mut stride = 1usize;
        for axis in 0..self.ndim() {
            let t = (coord[axis] - self.origin[axis]) / self.spacing[axis];
            if !t.is_finite() || t < 0.0 || t > self.dimension[axis] as f64 {
                return Err(SimError::Validation(format!(
                    "coordinate {:?} outside the grid on axis {}",
                    coord, axis
                )));
            }
            let mut cell = t as usize;
            if cell as f64 == t && cell > 0 {
                cell -= 1;
            }
            flat += cell * stride;
            stride *= self.dimension[axis];
        }
        Ok(flat)
    }

    /// World coordinate of the center of cell `index`.
    pub fn cell_center(&self, index: usize) -> Vec<f64> {
        let mut rest = index;
        let mut center = Vec::with_capacity(self.ndim());
        for axis in 0..self.ndim() {
            let cell = rest % self.dimension[axis];
            rest /= self.dimension[axis];
            center.push(self.origin[axis] + self.spacing[axis] * (cell as f64 + 0.5));
        }
        center
    }
}
