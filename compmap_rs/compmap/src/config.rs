//! Column identification and objective catalog configuration.
//!
//! The course CSV schema is not stable across data sources: category columns
//! are called "Year"/"Semester" in one export and "VM Term"/"Course Type" in
//! another, and objective values live either in columns named "1".."15" or in
//! the fifteen columns after a fixed offset. Everything here is plain data
//! loadable from JSON so the rest of the crate stays generic over names.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{CompmapError, OBJECTIVE_COUNT};

/// Selects one of the two filterable category columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CategoryAxis {
    A,
    B,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveColumns {
    /// Header names of the objective columns, in objective order.
    Named(Vec<String>),
    /// Zero-based index of the first of fifteen consecutive objective columns.
    Offset(usize),
}

impl Default for ObjectiveColumns {
    fn default() -> Self {
        ObjectiveColumns::Named((1..=OBJECTIVE_COUNT).map(|i| i.to_string()).collect())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub code_column: String,
    pub name_column: String,
    pub category_a: String,
    pub category_b: String,
    pub objectives: ObjectiveColumns,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self::year_semester()
    }
}

impl SchemaConfig {
    pub fn year_semester() -> Self {
        Self {
            code_column: "Course".to_string(),
            name_column: "Course Name".to_string(),
            category_a: "Year".to_string(),
            category_b: "Semester".to_string(),
            objectives: ObjectiveColumns::default(),
        }
    }

    pub fn term_type() -> Self {
        Self {
            category_a: "VM Term".to_string(),
            category_b: "Course Type".to_string(),
            ..Self::year_semester()
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, CompmapError> {
        let text = fs::read_to_string(path).map_err(|e| {
            CompmapError::Configuration(format!("failed to read schema {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, CompmapError> {
        let schema: SchemaConfig = serde_json::from_str(text)
            .map_err(|e| CompmapError::Configuration(format!("invalid schema JSON: {}", e)))?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn category_column(&self, axis: CategoryAxis) -> &str {
        match axis {
            CategoryAxis::A => &self.category_a,
            CategoryAxis::B => &self.category_b,
        }
    }

    pub fn validate(&self) -> Result<(), CompmapError> {
        let fixed = [
            &self.code_column,
            &self.name_column,
            &self.category_a,
            &self.category_b,
        ];
        let mut seen = HashSet::new();
        for name in fixed {
            let name = name.trim();
            if name.is_empty() {
                return Err(CompmapError::Configuration(
                    "schema column names must not be empty".into(),
                ));
            }
            if !seen.insert(name) {
                return Err(CompmapError::Configuration(format!(
                    "schema column '{}' is assigned twice",
                    name
                )));
            }
        }
        if let ObjectiveColumns::Named(names) = &self.objectives {
            if names.len() != OBJECTIVE_COUNT {
                return Err(CompmapError::Configuration(format!(
                    "expected {} objective columns, schema names {}",
                    OBJECTIVE_COUNT,
                    names.len()
                )));
            }
            for name in names {
                let name = name.trim();
                if name.is_empty() || !seen.insert(name) {
                    return Err(CompmapError::Configuration(format!(
                        "objective column '{}' is empty or reused",
                        name
                    )));
                }
            }
        }
        Ok(())
    }
}

const STANDARD_OBJECTIVES: [&str; OBJECTIVE_COUNT] = [
    "Communicate effectively with clients and co-workers",
    "Handle patients safely and effectively",
    "Manage common medical cases, clinical procedures, referrals",
    "Seek and apply research to practice",
    "Master disease mechanisms and history",
    "Ensure animal welfare in all practice areas",
    "Diagnose diseases in animals using appropriate tools",
    "Create appropriate treatment plans",
    "Function as ethical, respectful professionals",
    "Perform anesthesia and manage pain effectively",
    "Use health promotion and food safety strategies",
    "Manage emergency and intensive care cases",
    "Handle financial/business functions for success",
    "Plan and perform surgical procedures",
    "Manage records with legal/professional standards",
];

/// Objective number (1..=15) to description. Built once, never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ObjectiveCatalog {
    descriptions: Vec<String>,
}

impl Default for ObjectiveCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl ObjectiveCatalog {
    pub fn standard() -> Self {
        Self {
            descriptions: STANDARD_OBJECTIVES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Load a catalog from a JSON object keyed by objective number:
    /// `{"1": "...", ..., "15": "..."}`.
    pub fn from_path(path: &Path) -> Result<Self, CompmapError> {
        let text = fs::read_to_string(path).map_err(|e| {
            CompmapError::Configuration(format!("failed to read catalog {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, CompmapError> {
        let raw: BTreeMap<String, String> = serde_json::from_str(text)
            .map_err(|e| CompmapError::Configuration(format!("invalid catalog JSON: {}", e)))?;
        let mut slots: Vec<Option<String>> = vec![None; OBJECTIVE_COUNT];
        for (key, description) in raw {
            let number: usize = key.trim().parse().map_err(|_| {
                CompmapError::Configuration(format!("catalog key '{}' is not an objective number", key))
            })?;
            if !(1..=OBJECTIVE_COUNT).contains(&number) {
                return Err(CompmapError::Configuration(format!(
                    "catalog objective {} outside 1..={}",
                    number, OBJECTIVE_COUNT
                )));
            }
            let description = description.trim();
            if description.is_empty() {
                return Err(CompmapError::Configuration(format!(
                    "catalog objective {} has an empty description",
                    number
                )));
            }
            slots[number - 1] = Some(description.to_string());
        }
        let descriptions = slots
            .into_iter()
            .enumerate()
            .map(|(idx, slot)| {
                slot.ok_or_else(|| {
                    CompmapError::Configuration(format!("catalog is missing objective {}", idx + 1))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { descriptions })
    }

    pub fn description(&self, number: usize) -> Option<&str> {
        number
            .checked_sub(1)
            .and_then(|idx| self.descriptions.get(idx))
            .map(String::as_str)
    }

    /// Entries in catalog order, numbered from 1.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.descriptions
            .iter()
            .enumerate()
            .map(|(idx, text)| (idx + 1, text.as_str()))
    }

    pub fn len(&self) -> usize {
        self.descriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_is_numbered_from_one() {
        let catalog = ObjectiveCatalog::standard();
        assert_eq!(catalog.len(), OBJECTIVE_COUNT);
        assert_eq!(
            catalog.description(1),
            Some("Communicate effectively with clients and co-workers")
        );
        assert_eq!(
            catalog.description(15),
            Some("Manage records with legal/professional standards")
        );
        assert_eq!(catalog.description(0), None);
        assert_eq!(catalog.description(16), None);
        let numbers: Vec<usize> = catalog.iter().map(|(n, _)| n).collect();
        assert_eq!(numbers, (1..=15).collect::<Vec<_>>());
    }

    #[test]
    fn catalog_json_requires_all_fifteen_objectives() {
        let mut entries: Vec<String> = (1..=15).map(|i| format!("\"{}\": \"Objective {}\"", i, i)).collect();
        let full = format!("{{{}}}", entries.join(","));
        let catalog = ObjectiveCatalog::from_json(&full).unwrap();
        assert_eq!(catalog.description(7), Some("Objective 7"));

        entries.pop();
        let partial = format!("{{{}}}", entries.join(","));
        let err = ObjectiveCatalog::from_json(&partial).unwrap_err();
        assert!(matches!(err, CompmapError::Configuration(msg) if msg.contains("objective 15")));

        let out_of_range = r#"{"16": "extra"}"#;
        assert!(ObjectiveCatalog::from_json(out_of_range).is_err());
    }

    #[test]
    fn schema_presets_and_json_overrides() {
        let term = SchemaConfig::term_type();
        assert_eq!(term.category_column(CategoryAxis::A), "VM Term");
        assert_eq!(term.category_column(CategoryAxis::B), "Course Type");
        assert_eq!(term.code_column, "Course");

        let schema =
            SchemaConfig::from_json(r#"{"category_a": "Term", "objectives": {"offset": 5}}"#)
                .unwrap();
        assert_eq!(schema.category_a, "Term");
        assert_eq!(schema.category_b, "Semester");
        assert_eq!(schema.objectives, ObjectiveColumns::Offset(5));
    }

    #[test]
    fn schema_rejects_reused_or_short_columns() {
        let dup = r#"{"category_a": "Course"}"#;
        assert!(matches!(
            SchemaConfig::from_json(dup),
            Err(CompmapError::Configuration(_))
        ));
        let short = r#"{"objectives": {"named": ["1", "2"]}}"#;
        assert!(matches!(
            SchemaConfig::from_json(short),
            Err(CompmapError::Configuration(_))
        ));
    }
}
