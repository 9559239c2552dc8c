// ⚙️ Configuration - Title lists and output conventions as data
// Loaded once from TOML and passed down; nothing here is global state.

use crate::error::{MergeError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// TITLE LISTS
// ============================================================================

/// Closed title lists consulted by the validator and the classifier.
///
/// Membership tests are exact-string and case-sensitive: `"Dr."` is special,
/// `"dr."` is not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleConfig {
    pub strictly_male: Vec<String>,
    pub strictly_female: Vec<String>,
    pub special: Vec<String>,
    pub common: Vec<String>,
}

fn owned(titles: &[&str]) -> Vec<String> {
    titles.iter().map(|t| t.to_string()).collect()
}

impl Default for TitleConfig {
    fn default() -> Self {
        TitleConfig {
            strictly_male: owned(&[
                "Rev. Mr.",
                "Deacon",
                "Father",
                "Brother",
                "Monsignor",
                "Reverend Monsignor",
                "Mr.",
                "Sr.",
            ]),
            strictly_female: owned(&["Mrs.", "Miss", "Sister", "Ms."]),
            special: owned(&[
                "Dr.",
                "The Honorable",
                "Col.",
                "Cmsgt. Ret.",
                "Rev. Mr.",
                "Deacon",
                "Judge",
                "Lt. Col.",
                "Col. Ret.",
                "Major",
                "Capt.",
                "Maj. Gen.",
                "Family of",
                "Senator",
                "Reverend",
                "Lt.",
                "Cmdr.",
                "Msgt.",
                "Sister",
                "Drs.",
                "Master",
                "Sgt. Maj.",
                "SMSgt.",
                "Prof.",
                "Lt. Col. Ret.",
                "Rev. Dr.",
                "Father",
                "Brother",
                "Bishop",
                "Gen.",
                "Admiral",
                "Very Reverend",
                "MMC",
                "Monsignor",
                "1st Lt.",
                "Reverend Monsignor",
                "Maj.",
                "Most Reverend",
                "Bishop Emeritus",
            ]),
            common: owned(&["Mrs.", "Mr.", "Ms.", "Miss", "Sr.", "Sra.", "Señor"]),
        }
    }
}

impl TitleConfig {
    pub fn is_strictly_male(&self, title: &str) -> bool {
        self.strictly_male.iter().any(|t| t == title)
    }

    pub fn is_strictly_female(&self, title: &str) -> bool {
        self.strictly_female.iter().any(|t| t == title)
    }

    /// Title implies a gender on its own
    pub fn is_gendered(&self, title: &str) -> bool {
        self.is_strictly_male(title) || self.is_strictly_female(title)
    }

    pub fn is_special(&self, title: &str) -> bool {
        self.special.iter().any(|t| t == title)
    }

    pub fn is_common(&self, title: &str) -> bool {
        self.common.iter().any(|t| t == title)
    }
}

// ============================================================================
// OUTPUT CONVENTIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    /// Header of the first-names-only addressee column
    pub informal_addressee: String,
    /// Header of the first-names-only salutation column
    pub informal_salutation: String,
    /// Position the informal pair is inserted at (clamped to the row width)
    pub informal_index: usize,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        ColumnConfig {
            informal_addressee: "Informal_Addressee".to_string(),
            informal_salutation: "Informal_Salutation".to_string(),
            informal_index: 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AckConfig {
    /// Addressee substrings marking walk-in visitor records
    pub visitor_markers: Vec<String>,
    /// Header and cell value of the membership column
    pub membership_label: String,
    /// Inserted into `"<date> <label>_complete.csv"`
    pub output_label: String,
    /// chrono format for the summary's gift date
    pub date_format: String,
}

impl Default for AckConfig {
    fn default() -> Self {
        AckConfig {
            visitor_markers: owned(&["Visitors -", "Visitor -"]),
            membership_label: "Fidelis Society".to_string(),
            output_label: "Ack".to_string(),
            date_format: "%Y-%m-%d".to_string(),
        }
    }
}

impl AckConfig {
    pub fn is_visitor(&self, addressee: &str) -> bool {
        self.visitor_markers
            .iter()
            .any(|marker| addressee.contains(marker.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub placeholder_open: String,
    pub placeholder_close: String,
    pub combined_name: String,
    /// Remove `merged_letter_*` parts once the combined document is written
    pub remove_parts: bool,
    /// SQLite journal file, relative to the working directory
    pub journal_name: String,
}

impl Default for MergeConfig {
    fn default() -> Self {
        MergeConfig {
            placeholder_open: "«".to_string(),
            placeholder_close: "»".to_string(),
            combined_name: "combined_ack_letters.txt".to_string(),
            remove_parts: true,
            journal_name: "donor_merge_journal.db".to_string(),
        }
    }
}

// ============================================================================
// APP CONFIG
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub titles: TitleConfig,
    pub columns: ColumnConfig,
    pub ack: AckConfig,
    pub merge: MergeConfig,
}

impl AppConfig {
    /// Load from a TOML file; absent sections keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            MergeError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(content).map_err(|e| MergeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.merge.placeholder_open.is_empty() || self.merge.placeholder_close.is_empty() {
            return Err(MergeError::Config(
                "merge placeholders must not be empty".to_string(),
            ));
        }
        if self.columns.informal_addressee == self.columns.informal_salutation {
            return Err(MergeError::Config(
                "informal addressee and salutation columns need distinct names".to_string(),
            ));
        }
        Ok(())
    }
}
