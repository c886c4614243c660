//! Per-language feature table
//!
//! One row per successfully processed clip. Identifying columns come first
//! (`path`, `gender`, `age`), followed by the selected extractors' keys in
//! registry order. Vector keys are flattened to 1-based indexed columns.

use crate::error::PipelineResult;
use crate::models::Gender;
use crate::types::{FeatureKey, FeatureMap, FeatureValue};
use std::path::Path;
use tracing::debug;

/// Identifying columns written before any feature column
pub const ID_COLUMNS: [&str; 3] = ["path", "gender", "age"];

/// Features computed for one clip
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub path: String,
    pub gender: Gender,
    pub age: Option<String>,
    pub features: FeatureMap,
    /// Extractors that failed for this clip; their columns are left empty
    pub failed_extractors: Vec<&'static str>,
}

impl FeatureRow {
    /// True when every selected extractor succeeded
    pub fn is_complete(&self) -> bool {
        self.failed_extractors.is_empty()
    }
}

/// All rows for one language with a fixed column schema
#[derive(Debug, Clone)]
pub struct FeatureTable {
    language: String,
    schema: Vec<FeatureKey>,
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    /// Empty table for `language` with the given feature keys
    pub fn new(language: impl Into<String>, schema: Vec<FeatureKey>) -> Self {
        Self {
            language: language.into(),
            schema,
            rows: Vec::new(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn schema(&self) -> &[FeatureKey] {
        &self.schema
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push(&mut self, row: FeatureRow) {
        self.rows.push(row);
    }

    /// Full header: identifying columns then flattened feature columns
    pub fn columns(&self) -> Vec<String> {
        ID_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(self.schema.iter().flat_map(|k| k.columns()))
            .collect()
    }

    /// Order rows by clip path so output does not depend on completion order
    pub fn sort_by_path(&mut self) {
        self.rows.sort_by(|a, b| a.path.cmp(&b.path));
    }

    /// Cells for one row, aligned with [`columns`](Self::columns)
    pub fn record(&self, row: &FeatureRow) -> Vec<String> {
        let mut cells = Vec::with_capacity(ID_COLUMNS.len() + self.schema.len());
        cells.push(row.path.clone());
        cells.push(row.gender.as_str().to_string());
        cells.push(row.age.clone().unwrap_or_default());

        for key in &self.schema {
            let width = key.width.unwrap_or(1);
            match row.features.get(key.name) {
                Some(value) if key.accepts(value) => match value {
                    FeatureValue::Scalar(x) => cells.push(format_cell(*x)),
                    FeatureValue::Vector(v) => cells.extend(v.iter().map(|x| format_cell(*x))),
                },
                _ => cells.extend(std::iter::repeat(String::new()).take(width)),
            }
        }
        cells
    }

    /// Write the table as comma-separated text
    ///
    /// Data goes to a sibling temp file first and is renamed into place, so a
    /// crashed run never leaves a truncated table behind.
    pub fn write_csv(&self, dest: &Path) -> PipelineResult<()> {
        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp = dest.with_extension("csv.partial");
        {
            let mut writer = csv::Writer::from_path(&tmp)?;
            writer.write_record(self.columns())?;
            for row in &self.rows {
                writer.write_record(self.record(row))?;
            }
            writer.flush()?;
        }
        std::fs::rename(&tmp, dest)?;

        debug!(
            language = %self.language,
            rows = self.rows.len(),
            path = %dest.display(),
            "Wrote feature table"
        );
        Ok(())
    }

    /// Split into one table per gender, preserving row order
    ///
    /// Genders with no rows are omitted.
    pub fn partition_by_gender(&self) -> Vec<(Gender, FeatureTable)> {
        Gender::ALL
            .iter()
            .filter_map(|&gender| {
                let rows: Vec<FeatureRow> = self
                    .rows
                    .iter()
                    .filter(|r| r.gender == gender)
                    .cloned()
                    .collect();
                if rows.is_empty() {
                    return None;
                }
                Some((
                    gender,
                    FeatureTable {
                        language: self.language.clone(),
                        schema: self.schema.clone(),
                        rows,
                    },
                ))
            })
            .collect()
    }
}

/// Non-finite values become empty cells
fn format_cell(x: f64) -> String {
    if x.is_finite() {
        x.to_string()
    } else {
        String::new()
    }
}
