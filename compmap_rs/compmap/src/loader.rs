//! Course table loading and validation.

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::debug;

use crate::config::{CategoryAxis, ObjectiveColumns, SchemaConfig};
use crate::{CompmapError, CourseRecord, OBJECTIVE_COUNT};

/// The loaded, read-only course table.
#[derive(Clone, Debug, PartialEq)]
pub struct CourseTable {
    schema: SchemaConfig,
    records: Vec<CourseRecord>,
    index: HashMap<String, usize>,
}

impl CourseTable {
    /// Build a table from already-parsed records, enforcing the same
    /// invariants as the CSV loader (string fields are trimmed). Errors count
    /// the first record as line 2, as if a header preceded it.
    pub fn from_records(
        schema: SchemaConfig,
        records: Vec<CourseRecord>,
    ) -> Result<Self, CompmapError> {
        let lines: Vec<usize> = (2..records.len() + 2).collect();
        Self::assemble(schema, records, &lines)
    }

    fn assemble(
        schema: SchemaConfig,
        mut records: Vec<CourseRecord>,
        lines: &[usize],
    ) -> Result<Self, CompmapError> {
        for record in records.iter_mut() {
            trim_in_place(&mut record.code);
            trim_in_place(&mut record.name);
            trim_in_place(&mut record.category_a);
            trim_in_place(&mut record.category_b);
        }

        let mut index = HashMap::with_capacity(records.len());
        for (pos, (record, &line)) in records.iter().zip(lines).enumerate() {
            if record.code.is_empty() {
                return Err(CompmapError::data(line, Some(&schema.code_column), "empty course code"));
            }
            for (idx, value) in record.objectives.iter().enumerate() {
                check_range(*value, line, &(idx + 1).to_string())?;
            }
            if index.insert(record.code.clone(), pos).is_some() {
                return Err(CompmapError::data(
                    line,
                    Some(&schema.code_column),
                    format!("duplicate course code '{}'", record.code),
                ));
            }
        }
        Ok(Self {
            schema,
            records,
            index,
        })
    }

    pub fn schema(&self) -> &SchemaConfig {
        &self.schema
    }

    pub fn records(&self) -> &[CourseRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, code: &str) -> Option<&CourseRecord> {
        self.index.get(code.trim()).map(|&pos| &self.records[pos])
    }

    pub fn find(&self, code: &str) -> Result<&CourseRecord, CompmapError> {
        self.get(code)
            .ok_or_else(|| CompmapError::Lookup(code.trim().to_string()))
    }

    /// Sorted distinct values of one category axis, the options offered next
    /// to the "All" sentinel.
    pub fn category_values(&self, axis: CategoryAxis) -> Vec<&str> {
        self.records
            .iter()
            .map(|r| r.category(axis))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

fn trim_in_place(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}

/// Load the course table from a CSV file.
pub fn load(path: &Path, schema: &SchemaConfig) -> Result<CourseTable, CompmapError> {
    let file = File::open(path).map_err(|e| CompmapError::DataFormat {
        line: None,
        column: None,
        message: format!("cannot open {}: {}", path.display(), e),
    })?;
    let table = from_reader(file, schema)?;
    debug!("Loaded {} courses from {}", table.len(), path.display());
    Ok(table)
}

/// Load the course table from any CSV byte source.
pub fn from_reader<R: Read>(reader: R, schema: &SchemaConfig) -> Result<CourseTable, CompmapError> {
    schema.validate()?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers = reader.headers().map_err(csv_error)?.clone();
    let layout = ColumnLayout::resolve(&headers, schema)?;

    let mut records = Vec::new();
    let mut lines = Vec::new();
    for result in reader.records() {
        let row = result.map_err(csv_error)?;
        let line = row
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(records.len() + 2);
        records.push(layout.parse_row(&row, &headers, line)?);
        lines.push(line);
    }

    CourseTable::assemble(schema.clone(), records, &lines)
}

struct ColumnLayout {
    code: usize,
    name: usize,
    category_a: usize,
    category_b: usize,
    objectives: Vec<usize>,
}

impl ColumnLayout {
    fn resolve(headers: &StringRecord, schema: &SchemaConfig) -> Result<Self, CompmapError> {
        // Only the configured columns must be unique; unused headers may repeat.
        let column = |name: &str| -> Result<usize, CompmapError> {
            let name = name.trim();
            let mut hits = headers
                .iter()
                .enumerate()
                .filter(|(_, header)| *header == name)
                .map(|(idx, _)| idx);
            match (hits.next(), hits.next()) {
                (Some(idx), None) => Ok(idx),
                (Some(_), Some(_)) => {
                    Err(CompmapError::data(1, Some(name), "duplicate column header"))
                }
                (None, _) => Err(CompmapError::data(1, Some(name), "required column missing")),
            }
        };

        let code = column(&schema.code_column)?;
        let name = column(&schema.name_column)?;
        let category_a = column(&schema.category_a)?;
        let category_b = column(&schema.category_b)?;

        let objectives = match &schema.objectives {
            ObjectiveColumns::Named(names) => names
                .iter()
                .map(|n| column(n))
                .collect::<Result<Vec<_>, _>>()?,
            ObjectiveColumns::Offset(start) => {
                let available = headers.len().saturating_sub(*start);
                if available != OBJECTIVE_COUNT {
                    return Err(CompmapError::data(
                        1,
                        None,
                        format!(
                            "expected {} objective columns from column {}, found {}",
                            OBJECTIVE_COUNT,
                            start + 1,
                            available
                        ),
                    ));
                }
                (*start..headers.len()).collect()
            }
        };

        let fixed = [code, name, category_a, category_b];
        if let Some(&clash) = objectives.iter().find(|idx| fixed.contains(*idx)) {
            return Err(CompmapError::data(
                1,
                headers.get(clash),
                "objective column overlaps a course column",
            ));
        }

        Ok(Self {
            code,
            name,
            category_a,
            category_b,
            objectives,
        })
    }

    fn parse_row(
        &self,
        row: &StringRecord,
        headers: &StringRecord,
        line: usize,
    ) -> Result<CourseRecord, CompmapError> {
        let field = |idx: usize| -> Result<&str, CompmapError> {
            row.get(idx)
                .ok_or_else(|| CompmapError::data(line, headers.get(idx), "missing field"))
        };

        let code = field(self.code)?;
        if code.is_empty() {
            return Err(CompmapError::data(line, headers.get(self.code), "empty course code"));
        }

        let mut objectives = [0.0_f64; OBJECTIVE_COUNT];
        for (slot, &idx) in objectives.iter_mut().zip(self.objectives.iter()) {
            let column = headers.get(idx).unwrap_or("?");
            let raw = field(idx)?;
            if raw.is_empty() {
                return Err(CompmapError::data(line, Some(column), "missing objective value"));
            }
            let value: f64 = raw.parse().map_err(|_| {
                CompmapError::data(line, Some(column), format!("not a number: '{}'", raw))
            })?;
            *slot = check_range(value, line, column)?;
        }

        Ok(CourseRecord {
            code: code.to_string(),
            name: field(self.name)?.to_string(),
            category_a: field(self.category_a)?.to_string(),
            category_b: field(self.category_b)?.to_string(),
            objectives,
        })
    }
}

fn check_range(value: f64, line: usize, column: &str) -> Result<f64, CompmapError> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(CompmapError::data(
            line,
            Some(column),
            format!("objective value {} outside [0, 100]", value),
        ));
    }
    Ok(value)
}

fn csv_error(err: csv::Error) -> CompmapError {
    let line = err.position().map(|p| p.line() as usize);
    let message = match err.kind() {
        csv::ErrorKind::UnequalLengths {
            expected_len, len, ..
        } => format!("expected {} fields, found {}", expected_len, len),
        _ => err.to_string(),
    };
    CompmapError::DataFormat {
        line,
        column: None,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Course,Course Name,Year,Semester,1,2,3,4,5,6,7,8,9,10,11,12,13,14,15";

    fn csv_with_rows(rows: &[&str]) -> String {
        let mut text = String::from(HEADER);
        for row in rows {
            text.push('\n');
            text.push_str(row);
        }
        text.push('\n');
        text
    }

    fn load_str(text: &str) -> Result<CourseTable, CompmapError> {
        from_reader(text.as_bytes(), &SchemaConfig::default())
    }

    #[test]
    fn loads_and_trims_fields() {
        let text = csv_with_rows(&[
            " VM101 , Intro ,  Y1 , Fall ,5,10,15,20,25,30,35,40,45,50,55,60,65,70,75",
            "VM102,Anatomy,Y1,Spring,0,0,0,0,0,0,0,0,0,0,0,0,0,0,100",
        ]);
        let table = load_str(&text).unwrap();
        assert_eq!(table.len(), 2);
        let intro = table.find("VM101").unwrap();
        assert_eq!(intro.name, "Intro");
        assert_eq!(intro.category_a, "Y1");
        assert_eq!(intro.category_b, "Fall");
        assert_eq!(intro.objectives[14], 75.0);
        assert_eq!(table.category_values(CategoryAxis::B), vec!["Fall", "Spring"]);
    }

    #[test]
    fn non_numeric_objective_is_rejected_with_row_and_column() {
        let text = csv_with_rows(&[
            "VM101,Intro,Y1,Fall,5,10,15,20,25,30,35,40,45,50,55,60,65,70,75",
            "VM102,Anatomy,Y1,Fall,5,10,15,20,25,30,N/A,40,45,50,55,60,65,70,75",
        ]);
        match load_str(&text) {
            Err(CompmapError::DataFormat { line, column, message }) => {
                assert_eq!(line, Some(3));
                assert_eq!(column.as_deref(), Some("7"));
                assert!(message.contains("N/A"));
            }
            other => panic!("expected data format error, got {:?}", other),
        }
    }

    #[test]
    fn out_of_range_and_empty_values_are_rejected() {
        for bad in ["101", "-0.5", "NaN", ""] {
            let row = format!("VM101,Intro,Y1,Fall,5,10,{},20,25,30,35,40,45,50,55,60,65,70,75", bad);
            let text = csv_with_rows(&[&row]);
            assert!(
                matches!(load_str(&text), Err(CompmapError::DataFormat { .. })),
                "value '{}' should be rejected",
                bad
            );
        }
    }

    #[test]
    fn short_rows_and_missing_columns_fail() {
        let text = csv_with_rows(&["VM101,Intro,Y1,Fall,5,10,15"]);
        assert!(matches!(load_str(&text), Err(CompmapError::DataFormat { .. })));

        let text = "Course,Course Name,Year,Semester,1,2,3\nVM101,Intro,Y1,Fall,1,2,3\n";
        match load_str(text) {
            Err(CompmapError::DataFormat { line, column, .. }) => {
                assert_eq!(line, Some(1));
                assert_eq!(column.as_deref(), Some("4"));
            }
            other => panic!("expected missing column error, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_course_codes_fail() {
        let text = csv_with_rows(&[
            "VM101,Intro,Y1,Fall,5,10,15,20,25,30,35,40,45,50,55,60,65,70,75",
            "VM101,Intro again,Y2,Fall,5,10,15,20,25,30,35,40,45,50,55,60,65,70,75",
        ]);
        match load_str(&text) {
            Err(CompmapError::DataFormat { message, .. }) => assert!(message.contains("duplicate")),
            other => panic!("expected duplicate error, got {:?}", other),
        }
    }

    #[test]
    fn offset_schema_reads_trailing_columns() {
        let schema = SchemaConfig {
            objectives: ObjectiveColumns::Offset(5),
            ..SchemaConfig::term_type()
        };
        let mut text = String::from("Course,Course Name,VM Term,Course Type,Credits");
        for i in 1..=15 {
            text.push_str(&format!(",Obj {}", i));
        }
        text.push_str("\nVM201,Surgery,Term 3,Core,4");
        for i in 1..=15 {
            text.push_str(&format!(",{}", i * 2));
        }
        text.push('\n');
        let table = from_reader(text.as_bytes(), &schema).unwrap();
        let record = table.find("VM201").unwrap();
        assert_eq!(record.category_a, "Term 3");
        assert_eq!(record.objectives[0], 2.0);
        assert_eq!(record.objectives[14], 30.0);
    }

    #[test]
    fn from_records_trims_like_the_csv_loader() {
        let mut record = load_str(&csv_with_rows(&[
            "VM101,Intro,Y1,Fall,5,10,15,20,25,30,35,40,45,50,55,60,65,70,75",
        ]))
        .unwrap()
        .records()[0]
            .clone();
        record.code = " VM1 ".into();
        record.name = " Intro ".into();
        record.category_a = " Y3 ".into();
        record.category_b = "Fall ".into();

        let table = CourseTable::from_records(SchemaConfig::default(), vec![record]).unwrap();
        let found = table.find(" VM1 ").unwrap();
        assert_eq!(found.code, "VM1");
        assert_eq!(found.name, "Intro");
        assert_eq!(table.category_values(CategoryAxis::A), vec!["Y3"]);
        assert_eq!(table.category_values(CategoryAxis::B), vec!["Fall"]);

        let blank = CourseRecord {
            code: "   ".into(),
            ..found.clone()
        };
        assert!(matches!(
            CourseTable::from_records(SchemaConfig::default(), vec![blank]),
            Err(CompmapError::DataFormat { line: Some(2), .. })
        ));
    }

    #[test]
    fn repeated_unused_headers_are_ignored() {
        let text = format!(
            "{},,\nVM101,Intro,Y1,Fall,5,10,15,20,25,30,35,40,45,50,55,60,65,70,75,,\n",
            HEADER
        );
        let table = load_str(&text).unwrap();
        assert_eq!(table.find("VM101").unwrap().objectives[0], 5.0);

        let text = format!(
            "{},Year\nVM101,Intro,Y1,Fall,5,10,15,20,25,30,35,40,45,50,55,60,65,70,75,Y2\n",
            HEADER
        );
        match load_str(&text) {
            Err(CompmapError::DataFormat { line, column, message }) => {
                assert_eq!(line, Some(1));
                assert_eq!(column.as_deref(), Some("Year"));
                assert!(message.contains("duplicate"));
            }
            other => panic!("expected duplicate header error, got {:?}", other),
        }
    }

    #[test]
    fn missing_file_is_a_data_format_error() {
        let err = load(Path::new("/definitely/not/here/courses.csv"), &SchemaConfig::default())
            .unwrap_err();
        assert!(matches!(err, CompmapError::DataFormat { line: None, .. }));
    }

    #[test]
    fn lookup_reports_unknown_code() {
        let text = csv_with_rows(&["VM101,Intro,Y1,Fall,5,10,15,20,25,30,35,40,45,50,55,60,65,70,75"]);
        let table = load_str(&text).unwrap();
        assert!(matches!(table.find("VM999"), Err(CompmapError::Lookup(code)) if code == "VM999"));
        assert!(table.find(" VM101 ").is_ok());
    }
}
