//! Crossbar routing matrix
//!
//! `matrix[i][j]` is the gain from input `i` to output `j`, stored in the
//! plugin as `xbar_{i}_to_{j}`.

use serde::{Deserialize, Serialize};

use super::eq::CROSSBAR_RANGE;
use crate::error::{ControlError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CrossbarMatrix(pub Vec<Vec<f32>>);

impl CrossbarMatrix {
    /// Straight-through routing; off-diagonal cells are zero
    pub fn identity(inputs: usize, outputs: usize) -> Self {
        Self(
            (0..inputs)
                .map(|i| (0..outputs).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
                .collect(),
        )
    }

    pub fn rows(&self) -> &[Vec<f32>] {
        &self.0
    }

    pub fn get(&self, input: usize, output: usize) -> Option<f32> {
        self.0.get(input).and_then(|row| row.get(output)).copied()
    }

    /// Check shape and every cell; the first violation rejects the matrix
    pub fn validate(&self, inputs: usize, outputs: usize) -> Result<()> {
        if self.0.len() != inputs {
            return Err(ControlError::validation(format!(
                "crossbar must have {} rows, got {}",
                inputs,
                self.0.len()
            )));
        }
        for (i, row) in self.0.iter().enumerate() {
            if row.len() != outputs {
                return Err(ControlError::validation(format!(
                    "crossbar row {} must have {} columns, got {}",
                    i,
                    outputs,
                    row.len()
                )));
            }
            for (j, &value) in row.iter().enumerate() {
                CROSSBAR_RANGE.check(&format!("crossbar[{}][{}]", i, j), value)?;
            }
        }
        Ok(())
    }

    /// `(input, output, value)` for every cell
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, f32)> + '_ {
        self.0
            .iter()
            .enumerate()
            .flat_map(|(i, row)| row.iter().enumerate().map(move |(j, &v)| (i, j, v)))
    }
}

/// Plugin property name (without prefix) of one cell
pub fn cell_key(input: usize, output: usize) -> String {
    format!("xbar_{}_to_{}", input, output)
}
