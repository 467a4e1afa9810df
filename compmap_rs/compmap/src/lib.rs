//! Core competency objective mapping library: course table loading, filtering,
//! 3×5 objective matrices and heatmap/treemap rendering.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod config;
pub mod dashboard;
pub mod filter;
mod glyph;
pub mod loader;
pub mod matrix;
pub mod palette;
pub mod render;
pub mod treemap;

pub use config::{CategoryAxis, ObjectiveCatalog, ObjectiveColumns, SchemaConfig};
pub use dashboard::{Dashboard, RenderOutcome};
pub use filter::{apply, FilterCriteria, ALL_SENTINEL};
pub use loader::{load, CourseTable};
pub use matrix::{build, MatrixCell, ObjectiveMatrix, MATRIX_COLS, MATRIX_ROWS};
pub use palette::Palette;
pub use render::{render, CellRegion, ImageArtifact, LegendEntry, RenderMode};

/// Number of competency objectives every course is scored against.
pub const OBJECTIVE_COUNT: usize = 15;

#[derive(Error, Debug)]
pub enum CompmapError {
    #[error("data format error{}: {message}", location(.line, .column))]
    DataFormat {
        line: Option<usize>,
        column: Option<String>,
        message: String,
    },
    #[error("course not found: {0}")]
    Lookup(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("rendering failed: {0}")]
    Render(String),
    #[error("failed to export {}: {source}", .path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn location(line: &Option<usize>, column: &Option<String>) -> String {
    let mut out = String::new();
    if let Some(line) = line {
        out.push_str(&format!(" at line {}", line));
    }
    if let Some(name) = column {
        out.push_str(&format!(" (column '{}')", name));
    }
    out
}

impl CompmapError {
    pub(crate) fn data(line: usize, column: Option<&str>, message: impl Into<String>) -> Self {
        CompmapError::DataFormat {
            line: Some(line),
            column: column.map(str::to_string),
            message: message.into(),
        }
    }
}

/// One row of the course table. Objectives hold percent attainment of
/// objective `i + 1`, already range-checked to [0, 100].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CourseRecord {
    pub code: String,
    pub name: String,
    pub category_a: String,
    pub category_b: String,
    pub objectives: [f64; OBJECTIVE_COUNT],
}

impl CourseRecord {
    /// "CODE - Name", the label used by course pickers and the list view.
    pub fn label(&self) -> String {
        format!("{} - {}", self.code, self.name)
    }

    pub fn category(&self, axis: CategoryAxis) -> &str {
        match axis {
            CategoryAxis::A => &self.category_a,
            CategoryAxis::B => &self.category_b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_format_message_names_line_and_column() {
        let err = CompmapError::data(4, Some("7"), "not a number: 'N/A'");
        assert_eq!(
            err.to_string(),
            "data format error at line 4 (column '7'): not a number: 'N/A'"
        );
        let err = CompmapError::data(1, None, "missing header");
        assert_eq!(err.to_string(), "data format error at line 1: missing header");
        let err = CompmapError::DataFormat {
            line: None,
            column: None,
            message: "courses.csv: file not found".into(),
        };
        assert_eq!(err.to_string(), "data format error: courses.csv: file not found");
    }
}
