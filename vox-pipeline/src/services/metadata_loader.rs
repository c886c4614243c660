//! Per-language metadata table loader
//!
//! Reads a tab-delimited clip table (`validated.tsv` layout) and keeps the
//! rows that can enter processing: a non-empty path with an accepted audio
//! extension and a gender that maps onto the closed vocabulary. Columns are
//! located by header name, so extra or reordered columns are harmless.

use crate::error::{PipelineError, PipelineResult};
use crate::models::{Gender, MetadataRow};
use std::collections::HashSet;
use std::path::{Component, Path};
use tracing::{debug, info};

/// File name of the per-language metadata table
pub const METADATA_FILE_NAME: &str = "validated.tsv";

/// Row counts from one load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Data rows read (header excluded)
    pub total_rows: usize,
    /// Rows kept
    pub kept: usize,
    /// Dropped: empty, missing or unmapped gender
    pub excluded_gender: usize,
    /// Dropped: empty path or unaccepted extension
    pub excluded_path: usize,
    /// Dropped: path (ignoring extension and case) already seen earlier in the table
    pub duplicates: usize,
}

/// Metadata table loader
#[derive(Debug, Clone)]
pub struct MetadataLoader {
    /// Accepted clip extensions, lower-case, without the dot
    extensions: Vec<String>,
}

impl Default for MetadataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataLoader {
    /// Loader accepting `.mp3` clips only
    pub fn new() -> Self {
        Self {
            extensions: vec!["mp3".to_string()],
        }
    }

    /// Replace the accepted extension list
    ///
    /// Leading dots are stripped and comparison is case-insensitive.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Load valid rows from `path`
    ///
    /// # Errors
    /// * `MetadataNotFound` if the table file is absent
    /// * `Table` on malformed delimited data
    /// * `Common(InvalidInput)` if the `path` or `gender` header is missing
    pub fn load(&self, path: &Path) -> PipelineResult<Vec<MetadataRow>> {
        self.load_with_stats(path).map(|(rows, _)| rows)
    }

    /// Load valid rows plus counts of what was dropped
    pub fn load_with_stats(&self, path: &Path) -> PipelineResult<(Vec<MetadataRow>, LoadStats)> {
        if !path.is_file() {
            return Err(PipelineError::MetadataNotFound(path.to_path_buf()));
        }

        // Sentences contain bare quotes; the corpus never quotes fields
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .quoting(false)
            .flexible(true)
            .from_path(path)?;

        let headers = reader.headers()?.clone();
        let column = |name: &str| headers.iter().position(|h| h.trim() == name);
        let path_idx = column("path").ok_or_else(|| missing_column(path, "path"))?;
        let gender_idx = column("gender").ok_or_else(|| missing_column(path, "gender"))?;
        let age_idx = column("age");
        let locale_idx = column("locale");

        let mut stats = LoadStats::default();
        let mut seen = HashSet::new();
        let mut rows = Vec::new();

        for record in reader.records() {
            let record = record?;
            stats.total_rows += 1;

            let clip = record.get(path_idx).map(str::trim).unwrap_or_default();
            if clip.is_empty() || !self.accepts(clip) {
                stats.excluded_path += 1;
                continue;
            }

            let Some(gender) = record.get(gender_idx).and_then(Gender::normalize) else {
                stats.excluded_gender += 1;
                continue;
            };

            // `a.mp3`, `a.MP3` and `a.wav` all preprocess to `a.wav`
            if !seen.insert(output_key(clip)) {
                stats.duplicates += 1;
                continue;
            }

            rows.push(MetadataRow {
                path: clip.to_string(),
                gender,
                age: optional_field(&record, age_idx),
                locale: optional_field(&record, locale_idx),
            });
        }

        stats.kept = rows.len();
        debug!(
            table = %path.display(),
            total = stats.total_rows,
            excluded_gender = stats.excluded_gender,
            excluded_path = stats.excluded_path,
            duplicates = stats.duplicates,
            "Metadata row filtering"
        );
        info!(table = %path.display(), kept = stats.kept, "Loaded metadata");

        Ok((rows, stats))
    }

    fn accepts(&self, clip: &str) -> bool {
        let clip_path = Path::new(clip);
        // Clips must stay inside `<lang>/clips/`
        if !clip_path.components().all(|c| matches!(c, Component::Normal(_))) {
            return false;
        }
        clip_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                let e = e.to_lowercase();
                self.extensions.iter().any(|accepted| *accepted == e)
            })
            .unwrap_or(false)
    }
}

fn optional_field(record: &csv::StringRecord, idx: Option<usize>) -> Option<String> {
    idx.and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Identity of a clip's preprocessed output: path without extension, case-folded
fn output_key(clip: &str) -> String {
    Path::new(clip).with_extension("").to_string_lossy().to_lowercase()
}

fn missing_column(table: &Path, name: &str) -> PipelineError {
    PipelineError::Common(vox_common::Error::InvalidInput(format!(
        "{}: missing required column '{}'",
        table.display(),
        name
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HEADER: &str = "client_id\tpath\tsentence\tup_votes\tdown_votes\tage\tgender\taccents\tlocale\tsegment";

    fn write_table(dir: &Path, lines: &[&str]) -> std::path::PathBuf {
        let path = dir.join(METADATA_FILE_NAME);
        let mut body = String::from(HEADER);
        for line in lines {
            body.push('\n');
            body.push_str(line);
        }
        body.push('\n');
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_missing_table_is_metadata_not_found() {
        let dir = TempDir::new().unwrap();
        let result = MetadataLoader::new().load(&dir.path().join(METADATA_FILE_NAME));
        assert!(matches!(result, Err(PipelineError::MetadataNotFound(_))));
    }

    #[test]
    fn test_unmapped_gender_rows_dropped() {
        let dir = TempDir::new().unwrap();
        let table = write_table(
            dir.path(),
            &[
                "c1\ta.mp3\tHello \"there\"\t2\t0\ttwenties\tmale_masculine\t\txx\t",
                "c2\tb.mp3\tHi\t2\t0\t\tfemale\t\txx\t",
                "c3\tc.mp3\tHi\t2\t0\tthirties\tother\t\txx\t",
                "c4\td.mp3\tHi\t2\t0\tforties\t\t\txx\t",
            ],
        );

        let (rows, stats) = MetadataLoader::new().load_with_stats(&table).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(stats.total_rows, 4);
        assert_eq!(stats.excluded_gender, 2);
        assert_eq!(rows[0].path, "a.mp3");
        assert_eq!(rows[0].gender, Gender::Male);
        assert_eq!(rows[0].age.as_deref(), Some("twenties"));
        assert_eq!(rows[0].locale.as_deref(), Some("xx"));
        assert_eq!(rows[1].age, None);
    }

    #[test]
    fn test_extension_filter_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let table = write_table(
            dir.path(),
            &[
                "c1\ta.MP3\tx\t1\t0\t\tmale\t\txx\t",
                "c2\tb.wav\tx\t1\t0\t\tmale\t\txx\t",
                "c3\tc\tx\t1\t0\t\tmale\t\txx\t",
            ],
        );

        let rows = MetadataLoader::new().load(&table).unwrap();
        assert_eq!(rows.len(), 1);

        let rows = MetadataLoader::new()
            .with_extensions([".WAV", "mp3"])
            .load(&table)
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_escaping_paths_excluded() {
        let dir = TempDir::new().unwrap();
        let table = write_table(
            dir.path(),
            &[
                "c1\t../secret.mp3\tx\t1\t0\t\tmale\t\txx\t",
                "c2\t/abs/a.mp3\tx\t1\t0\t\tmale\t\txx\t",
                "c3\tsub/ok.mp3\tx\t1\t0\t\tmale\t\txx\t",
            ],
        );
        let (rows, stats) = MetadataLoader::new().load_with_stats(&table).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].path, "sub/ok.mp3");
        assert_eq!(stats.excluded_path, 2);
    }

    #[test]
    fn test_duplicate_paths_kept_once() {
        let dir = TempDir::new().unwrap();
        let table = write_table(
            dir.path(),
            &[
                "c1\ta.mp3\tx\t1\t0\t\tmale\t\txx\t",
                "c1\ta.mp3\tx\t1\t0\t\tmale\t\txx\t",
            ],
        );
        let (rows, stats) = MetadataLoader::new().load_with_stats(&table).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(stats.duplicates, 1);
    }

    #[test]
    fn test_rows_sharing_an_output_path_kept_once() {
        let dir = TempDir::new().unwrap();
        let table = write_table(
            dir.path(),
            &[
                "c1\ta.mp3\tx\t1\t0\t\tmale\t\txx\t",
                "c2\ta.MP3\tx\t1\t0\t\tmale\t\txx\t",
                "c3\tb.mp3\tx\t1\t0\t\tfemale\t\txx\t",
                "c4\tb.wav\tx\t1\t0\t\tfemale\t\txx\t",
                "c5\tsub/B.Wav\tx\t1\t0\t\tfemale\t\txx\t",
            ],
        );
        let (rows, stats) = MetadataLoader::new()
            .with_extensions(["mp3", "wav"])
            .load_with_stats(&table)
            .unwrap();
        let paths: Vec<&str> = rows.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["a.mp3", "b.mp3", "sub/B.Wav"]);
        assert_eq!(stats.duplicates, 2);
    }

    #[test]
    fn test_short_rows_tolerated() {
        let dir = TempDir::new().unwrap();
        let table = write_table(dir.path(), &["c1\ta.mp3\tx", "c2\tb.mp3\tx\t1\t0\t\tfemale"]);
        let rows = MetadataLoader::new().load(&table).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].path, "b.mp3");
        assert_eq!(rows[0].locale, None);
    }

    #[test]
    fn test_missing_gender_column_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(METADATA_FILE_NAME);
        std::fs::write(&path, "path\tsentence\na.mp3\thi\n").unwrap();
        let result = MetadataLoader::new().load(&path);
        assert!(matches!(result, Err(PipelineError::Common(_))));
    }
}
