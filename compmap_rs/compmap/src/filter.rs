use serde::{Deserialize, Serialize};

use crate::loader::CourseTable;
use crate::CourseRecord;

/// Category selector value meaning "do not filter on this axis".
pub const ALL_SENTINEL: &str = "All";

/// Per-interaction filter state. Unset fields match everything.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub text: Option<String>,
    pub category_a: Option<String>,
    pub category_b: Option<String>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_category_a(mut self, value: impl Into<String>) -> Self {
        self.category_a = Some(value.into());
        self
    }

    pub fn with_category_b(mut self, value: impl Into<String>) -> Self {
        self.category_b = Some(value.into());
        self
    }

    pub fn matches(&self, record: &CourseRecord) -> bool {
        if let Some(needle) = active_text(self.text.as_deref()) {
            let needle = needle.to_lowercase();
            let hit = record.code.to_lowercase().contains(&needle)
                || record.name.to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }
        category_matches(self.category_a.as_deref(), &record.category_a)
            && category_matches(self.category_b.as_deref(), &record.category_b)
    }
}

fn active_text(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|t| !t.is_empty())
}

fn category_matches(wanted: Option<&str>, actual: &str) -> bool {
    match active_text(wanted) {
        None => true,
        Some(ALL_SENTINEL) => true,
        Some(value) => value == actual,
    }
}

/// Stable filter over the table; an empty result is a valid view.
pub fn apply<'a>(table: &'a CourseTable, criteria: &FilterCriteria) -> Vec<&'a CourseRecord> {
    table
        .records()
        .iter()
        .filter(|record| criteria.matches(record))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemaConfig;

    fn record(code: &str, name: &str, a: &str, b: &str) -> CourseRecord {
        CourseRecord {
            code: code.into(),
            name: name.into(),
            category_a: a.into(),
            category_b: b.into(),
            objectives: [50.0; crate::OBJECTIVE_COUNT],
        }
    }

    fn table() -> CourseTable {
        CourseTable::from_records(
            SchemaConfig::default(),
            vec![
                record("VM501", "Small Animal Surgery", "Y3", "Fall"),
                record("VM310", "Pharmacology", "Y2", "Spring"),
                record("VM520", "Large Animal Medicine", "Y3", "Spring"),
                record("VM110", "Anatomy I", "Y1", "Fall"),
            ],
        )
        .unwrap()
    }

    fn codes(view: &[&CourseRecord]) -> Vec<String> {
        view.iter().map(|r| r.code.clone()).collect()
    }

    #[test]
    fn empty_criteria_keeps_table_order() {
        let table = table();
        let view = apply(&table, &FilterCriteria::new());
        assert_eq!(codes(&view), vec!["VM501", "VM310", "VM520", "VM110"]);
    }

    #[test]
    fn text_matches_code_or_name_case_insensitively() {
        let table = table();
        let view = apply(&table, &FilterCriteria::new().with_text("animal"));
        assert_eq!(codes(&view), vec!["VM501", "VM520"]);
        let view = apply(&table, &FilterCriteria::new().with_text("vm3"));
        assert_eq!(codes(&view), vec!["VM310"]);
        // substring, not prefix
        let view = apply(&table, &FilterCriteria::new().with_text("macol"));
        assert_eq!(codes(&view), vec!["VM310"]);
    }

    #[test]
    fn categories_compose_with_and_and_all_sentinel() {
        let table = table();
        let criteria = FilterCriteria::new().with_category_a("Y3").with_category_b("Spring");
        assert_eq!(codes(&apply(&table, &criteria)), vec!["VM520"]);

        let criteria = FilterCriteria::new().with_category_a(ALL_SENTINEL).with_category_b("Fall");
        assert_eq!(codes(&apply(&table, &criteria)), vec!["VM501", "VM110"]);

        let criteria = FilterCriteria::new().with_category_a(" Y3 ");
        assert_eq!(codes(&apply(&table, &criteria)), vec!["VM501", "VM520"]);
    }

    #[test]
    fn unknown_category_yields_empty_view() {
        let table = table();
        let view = apply(&table, &FilterCriteria::new().with_category_a("Y9"));
        assert!(view.is_empty());
    }

    #[test]
    fn stricter_criteria_narrow_the_result() {
        let table = table();
        let ladder = [
            FilterCriteria::new(),
            FilterCriteria::new().with_category_b("Spring"),
            FilterCriteria::new().with_category_b("Spring").with_category_a("Y3"),
            FilterCriteria::new()
                .with_category_b("Spring")
                .with_category_a("Y3")
                .with_text("surgery"),
        ];
        let mut previous = codes(&apply(&table, &ladder[0]));
        assert_eq!(previous.len(), table.len());
        for criteria in &ladder[1..] {
            let current = codes(&apply(&table, criteria));
            assert!(current.iter().all(|code| previous.contains(code)));
            previous = current;
        }
        assert!(previous.is_empty());
    }
}
