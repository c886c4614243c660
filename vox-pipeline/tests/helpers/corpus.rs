//! Temporary Common Voice corpora
//!
//! Builds `<root>/<lang>/validated.tsv` plus `<root>/<lang>/clips/` in a
//! temp directory, and reads feature tables back.

use super::audio_generator::{generate_test_wav, ClipConfig};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const HEADER: &str = "client_id\tpath\tsentence\tup_votes\tdown_votes\tage\tgender\taccents\tlocale\tsegment";

struct Row {
    path: String,
    gender: String,
    age: String,
}

/// Builder for one language of a synthetic corpus
pub struct CorpusBuilder {
    language: String,
    rows: Vec<Row>,
    clips: Vec<(String, ClipConfig)>,
}

impl CorpusBuilder {
    pub fn new(language: &str) -> Self {
        Self {
            language: language.to_string(),
            rows: Vec::new(),
            clips: Vec::new(),
        }
    }

    /// Metadata row with a generated clip on disk
    pub fn clip(mut self, path: &str, gender: &str, config: ClipConfig) -> Self {
        self.clips.push((path.to_string(), config));
        self.row(path, gender)
    }

    /// Metadata row with no clip on disk
    pub fn row(mut self, path: &str, gender: &str) -> Self {
        self.rows.push(Row {
            path: path.to_string(),
            gender: gender.to_string(),
            age: String::new(),
        });
        self
    }

    /// Set the age of the most recent row
    pub fn age(mut self, age: &str) -> Self {
        if let Some(row) = self.rows.last_mut() {
            row.age = age.to_string();
        }
        self
    }

    /// Write into `root/<lang>/`; returns the language directory
    pub fn write_to(&self, root: &Path) -> anyhow::Result<PathBuf> {
        let lang_dir = root.join(&self.language);
        std::fs::create_dir_all(lang_dir.join("clips"))?;

        let mut body = String::from(HEADER);
        for (i, row) in self.rows.iter().enumerate() {
            body.push_str(&format!(
                "\nclient{}\t{}\tUna frase \"de prueba\".\t2\t0\t{}\t{}\t\t{}\t",
                i, row.path, row.age, row.gender, self.language
            ));
        }
        body.push('\n');
        std::fs::write(lang_dir.join("validated.tsv"), body)?;

        for (path, config) in &self.clips {
            generate_test_wav(&lang_dir.join("clips").join(path), config)?;
        }
        Ok(lang_dir)
    }

    /// Write into a fresh temp dir; returns (temp dir, language dir)
    pub fn build(&self) -> anyhow::Result<(TempDir, PathBuf)> {
        let dir = TempDir::new()?;
        let lang_dir = self.write_to(dir.path())?;
        Ok((dir, lang_dir))
    }
}

/// A feature table read back from disk
#[derive(Debug, Clone, PartialEq)]
pub struct TableContents {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableContents {
    /// Rows keyed by column name
    pub fn records(&self) -> Vec<HashMap<String, String>> {
        self.rows
            .iter()
            .map(|r| self.headers.iter().cloned().zip(r.iter().cloned()).collect())
            .collect()
    }

    /// Rows sorted by their first cell (clip path)
    pub fn sorted(mut self) -> Self {
        self.rows.sort();
        self
    }
}

pub fn read_table(path: &Path) -> anyhow::Result<TableContents> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }
    Ok(TableContents { headers, rows })
}
