//! Loader → filter → selection → matrix → renderer, over a read-only table.

use std::path::Path;

use tracing::{debug, info};

use crate::config::{ObjectiveCatalog, SchemaConfig};
use crate::filter::{self, FilterCriteria};
use crate::loader::{self, CourseTable};
use crate::matrix::{self, ObjectiveMatrix};
use crate::palette::Palette;
use crate::render::{self, ImageArtifact, RenderMode};
use crate::{CompmapError, CourseRecord};

/// Result of rendering a filtered view.
#[derive(Debug)]
pub enum RenderOutcome {
    /// Nothing matched, nothing was rendered.
    NoMatches,
    Rendered(Vec<ImageArtifact>),
}

impl RenderOutcome {
    pub fn artifacts(&self) -> &[ImageArtifact] {
        match self {
            RenderOutcome::NoMatches => &[],
            RenderOutcome::Rendered(artifacts) => artifacts,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts().is_empty()
    }
}

#[derive(Debug)]
pub struct Dashboard {
    table: CourseTable,
    catalog: ObjectiveCatalog,
}

impl Dashboard {
    pub fn new(table: CourseTable, catalog: ObjectiveCatalog) -> Self {
        Self { table, catalog }
    }

    /// Load the course table from `path` and pair it with `catalog`.
    pub fn open(
        path: &Path,
        schema: &SchemaConfig,
        catalog: ObjectiveCatalog,
    ) -> Result<Self, CompmapError> {
        let table = loader::load(path, schema)?;
        info!("Loaded {} courses from {}", table.len(), path.display());
        Ok(Self::new(table, catalog))
    }

    pub fn table(&self) -> &CourseTable {
        &self.table
    }

    pub fn catalog(&self) -> &ObjectiveCatalog {
        &self.catalog
    }

    pub fn view(&self, criteria: &FilterCriteria) -> Vec<&CourseRecord> {
        filter::apply(&self.table, criteria)
    }

    pub fn matrix_for(&self, code: &str) -> Result<ObjectiveMatrix, CompmapError> {
        self.table.find(code).map(matrix::build)
    }

    pub fn render_course(
        &self,
        code: &str,
        palette: Palette,
        mode: RenderMode,
    ) -> Result<ImageArtifact, CompmapError> {
        let matrix = self.matrix_for(code)?;
        render::render(&matrix, &self.catalog, palette, mode)
    }

    /// Courses a render of this view would draw. An empty `selection` means the
    /// first match only. Selected codes must exist in the table; ones the
    /// filter excludes are dropped.
    pub fn selected<'a>(
        &'a self,
        criteria: &FilterCriteria,
        selection: &[String],
    ) -> Result<Vec<&'a CourseRecord>, CompmapError> {
        let view = self.view(criteria);
        if selection.is_empty() {
            return Ok(view.into_iter().take(1).collect());
        }

        let mut picked: Vec<&CourseRecord> = Vec::with_capacity(selection.len());
        for code in selection {
            let record = self.table.find(code)?;
            if picked.iter().any(|r| r.code == record.code) {
                continue;
            }
            if view.iter().any(|r| r.code == record.code) {
                picked.push(record);
            } else {
                debug!("Course {} is outside the current filter", record.code);
            }
        }
        Ok(picked)
    }

    pub fn render_view(
        &self,
        criteria: &FilterCriteria,
        selection: &[String],
        palette: Palette,
        mode: RenderMode,
    ) -> Result<RenderOutcome, CompmapError> {
        let records = self.selected(criteria, selection)?;
        if records.is_empty() {
            return Ok(RenderOutcome::NoMatches);
        }
        let artifacts = records
            .into_iter()
            .map(|record| render::render(&matrix::build(record), &self.catalog, palette, mode))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RenderOutcome::Rendered(artifacts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OBJECTIVE_COUNT;

    fn record(code: &str, name: &str, year: &str, semester: &str, base: f64) -> CourseRecord {
        let mut objectives = [0.0; OBJECTIVE_COUNT];
        for (idx, slot) in objectives.iter_mut().enumerate() {
            *slot = (base + idx as f64 * 5.0).min(100.0);
        }
        CourseRecord {
            code: code.into(),
            name: name.into(),
            category_a: year.into(),
            category_b: semester.into(),
            objectives,
        }
    }

    fn dashboard() -> Dashboard {
        let table = CourseTable::from_records(
            SchemaConfig::default(),
            vec![
                record("VM101", "Intro to Anatomy", "Y1", "Fall", 5.0),
                record("VM102", "Physiology", "Y1", "Spring", 10.0),
                record("VM201", "Surgery Basics", "Y2", "Fall", 20.0),
            ],
        )
        .unwrap();
        Dashboard::new(table, ObjectiveCatalog::standard())
    }

    #[test]
    fn empty_view_is_no_matches() {
        let dash = dashboard();
        let criteria = FilterCriteria::new().with_category_a("Y3");
        assert!(dash.view(&criteria).is_empty());
        let outcome = dash
            .render_view(&criteria, &[], Palette::Light, RenderMode::Heatmap)
            .unwrap();
        assert!(matches!(outcome, RenderOutcome::NoMatches));
        assert!(outcome.is_empty());
    }

    #[test]
    fn default_selection_renders_first_match() {
        let dash = dashboard();
        let criteria = FilterCriteria::new().with_category_b("Fall");
        let outcome = dash
            .render_view(&criteria, &[], Palette::Light, RenderMode::Heatmap)
            .unwrap();
        let artifacts = outcome.artifacts();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].course_code(), "VM101");
    }

    #[test]
    fn explicit_selection_keeps_order_and_respects_filter() {
        let dash = dashboard();
        let selection = vec!["VM201".to_string(), "VM102".to_string(), " VM201 ".to_string()];

        let all = dash
            .selected(&FilterCriteria::new(), &selection)
            .unwrap()
            .iter()
            .map(|r| r.code.as_str())
            .collect::<Vec<_>>();
        assert_eq!(all, vec!["VM201", "VM102"]);

        let fall = FilterCriteria::new().with_category_b("Fall");
        let outcome = dash
            .render_view(&fall, &selection[1..2], Palette::Dark, RenderMode::Treemap)
            .unwrap();
        assert!(matches!(outcome, RenderOutcome::NoMatches));
    }

    #[test]
    fn unknown_codes_are_lookup_errors() {
        let dash = dashboard();
        assert!(matches!(
            dash.matrix_for("VM999"),
            Err(CompmapError::Lookup(_))
        ));
        assert!(matches!(
            dash.render_view(
                &FilterCriteria::new(),
                &["VM999".to_string()],
                Palette::Light,
                RenderMode::Heatmap
            ),
            Err(CompmapError::Lookup(_))
        ));
    }

    #[test]
    fn render_course_matches_direct_render() {
        let dash = dashboard();
        let artifact = dash
            .render_course("VM102", Palette::Light, RenderMode::Heatmap)
            .unwrap();
        let matrix = dash.matrix_for("VM102").unwrap();
        let direct =
            render::render(&matrix, dash.catalog(), Palette::Light, RenderMode::Heatmap).unwrap();
        assert_eq!(artifact.fingerprint(), direct.fingerprint());
        assert_eq!(matrix.row(0), vec![10.0, 15.0, 20.0, 25.0, 30.0]);
    }
}
