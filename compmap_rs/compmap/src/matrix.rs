use ndarray::Array2;

use crate::{CompmapError, CourseRecord, OBJECTIVE_COUNT};

pub const MATRIX_ROWS: usize = 3;
pub const MATRIX_COLS: usize = 5;

/// A course's objectives laid out row-major on a 3×5 grid: cell (r, c) holds
/// objective `5r + c + 1`.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectiveMatrix {
    code: String,
    values: Array2<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatrixCell {
    pub row: usize,
    pub col: usize,
    pub objective: usize,
    pub value: f64,
}

/// Reshape a validated course record into its objective matrix.
pub fn build(record: &CourseRecord) -> ObjectiveMatrix {
    let values = Array2::from_shape_fn((MATRIX_ROWS, MATRIX_COLS), |(r, c)| {
        record.objectives[objective_index(r, c)]
    });
    ObjectiveMatrix {
        code: record.code.clone(),
        values,
    }
}

fn objective_index(row: usize, col: usize) -> usize {
    row * MATRIX_COLS + col
}

impl ObjectiveMatrix {
    /// Build from a flat row-major slice; anything but fifteen values is a
    /// programmer error.
    pub fn from_values(code: impl Into<String>, values: &[f64]) -> Result<Self, CompmapError> {
        let values = Array2::from_shape_vec((MATRIX_ROWS, MATRIX_COLS), values.to_vec())
            .map_err(|e| {
                CompmapError::Configuration(format!(
                    "objective matrix needs {} values: {}",
                    OBJECTIVE_COUNT, e
                ))
            })?;
        Ok(Self {
            code: code.into(),
            values,
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn value(&self, row: usize, col: usize) -> Option<f64> {
        self.values.get((row, col)).copied()
    }

    pub fn row(&self, row: usize) -> Vec<f64> {
        self.values.row(row).to_vec()
    }

    /// Value of a 1-based objective number.
    pub fn objective(&self, number: usize) -> Option<f64> {
        let idx = number.checked_sub(1)?;
        self.value(idx / MATRIX_COLS, idx % MATRIX_COLS)
    }

    pub fn flatten(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }

    pub fn cells(&self) -> impl Iterator<Item = MatrixCell> + '_ {
        self.values
            .indexed_iter()
            .map(|((row, col), &value)| MatrixCell {
                row,
                col,
                objective: objective_index(row, col) + 1,
                value,
            })
    }

    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vm101() -> CourseRecord {
        let mut objectives = [0.0; OBJECTIVE_COUNT];
        for (idx, slot) in objectives.iter_mut().enumerate() {
            *slot = 5.0 * (idx as f64 + 1.0);
        }
        CourseRecord {
            code: "VM101".into(),
            name: "Intro".into(),
            category_a: "Y1".into(),
            category_b: "Fall".into(),
            objectives,
        }
    }

    #[test]
    fn rows_follow_objective_order() {
        let matrix = build(&vm101());
        assert_eq!(matrix.shape(), (3, 5));
        assert_eq!(matrix.row(0), vec![5.0, 10.0, 15.0, 20.0, 25.0]);
        assert_eq!(matrix.row(1), vec![30.0, 35.0, 40.0, 45.0, 50.0]);
        assert_eq!(matrix.row(2), vec![55.0, 60.0, 65.0, 70.0, 75.0]);
        assert_eq!(matrix.objective(7), Some(35.0));
        assert_eq!(matrix.objective(16), None);
    }

    #[test]
    fn flatten_restores_record_objectives() {
        let record = vm101();
        assert_eq!(build(&record).flatten(), record.objectives.to_vec());

        let mut uneven = record.clone();
        uneven.objectives = [
            0.0, 100.0, 12.5, 99.9, 3.0, 47.0, 8.0, 61.2, 0.1, 73.0, 22.0, 5.5, 88.0, 34.0, 19.0,
        ];
        assert_eq!(build(&uneven).flatten(), uneven.objectives.to_vec());
    }

    #[test]
    fn cells_carry_objective_numbers() {
        let matrix = build(&vm101());
        let cells: Vec<MatrixCell> = matrix.cells().collect();
        assert_eq!(cells.len(), OBJECTIVE_COUNT);
        for (idx, cell) in cells.iter().enumerate() {
            assert_eq!(cell.objective, idx + 1);
            assert_eq!(cell.objective, 5 * cell.row + cell.col + 1);
            assert_eq!(cell.value, 5.0 * (idx as f64 + 1.0));
        }
    }

    #[test]
    fn wrong_length_is_a_configuration_error() {
        assert!(matches!(
            ObjectiveMatrix::from_values("X", &[1.0; 14]),
            Err(CompmapError::Configuration(_))
        ));
        let ok = ObjectiveMatrix::from_values("X", &[1.0; 15]).unwrap();
        assert_eq!(ok.code(), "X");
    }
}
