//! Clip metadata rows and the gender vocabulary

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical gender values
///
/// The corpus uses several spellings; everything outside the alias table is
/// excluded before any audio is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Both canonical values, in output order
    pub const ALL: [Gender; 2] = [Gender::Male, Gender::Female];

    /// Map a raw metadata value onto the closed vocabulary
    ///
    /// Input is trimmed and lower-cased. Returns `None` for empty, missing or
    /// unrecognized values (e.g. "other", "do_not_wish_to_say").
    pub fn normalize(raw: &str) -> Option<Gender> {
        match raw.trim().to_lowercase().as_str() {
            "male" | "male_masculine" => Some(Gender::Male),
            "female" | "female_feminine" => Some(Gender::Female),
            _ => None,
        }
    }

    /// Canonical spelling, also used as the output directory name
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One valid clip from a language's metadata table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRow {
    /// Clip path relative to `<lang>/clips/`
    pub path: String,
    /// Normalized gender
    pub gender: Gender,
    /// Age bracket as written in the table (e.g. "twenties")
    pub age: Option<String>,
    /// Locale code when the table carries one
    pub locale: Option<String>,
}
