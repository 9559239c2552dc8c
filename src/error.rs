// 🚨 Error Taxonomy - Fatal failures of the household/gift pipeline
// Advisory outcomes (title violations, fallthroughs, reconciliation gaps) are
// report data, not errors. Only what must stop a step lives here.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for library operations
pub type Result<T> = std::result::Result<T, MergeError>;

// ============================================================================
// INPUT KINDS
// ============================================================================

/// The export files a step may require
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InputKind {
    /// `*_export.csv` household export from the CRM
    HouseholdExport,
    /// `*_clean.csv` produced by the clean step
    CleanHouseholds,
    /// `*_mail.csv` raw gift export
    GiftExport,
    /// Membership-qualifying id list (optional by caller choice)
    Membership,
    /// Letter template for the mail merge
    Template,
    /// `*_complete.csv` gift summary feeding the mail merge
    GiftSummary,
}

impl InputKind {
    pub fn label(&self) -> &'static str {
        match self {
            InputKind::HouseholdExport => "_export CSV",
            InputKind::CleanHouseholds => "_clean CSV",
            InputKind::GiftExport => "_mail CSV",
            InputKind::Membership => "membership CSV",
            InputKind::Template => "letter template",
            InputKind::GiftSummary => "_complete CSV",
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn join_kinds(kinds: &[InputKind]) -> String {
    kinds
        .iter()
        .map(|k| k.label())
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================================
// ERROR ENUM
// ============================================================================

#[derive(Error, Debug)]
pub enum MergeError {
    /// One or more required exports are absent
    #[error("missing required input file(s): {}", join_kinds(.kinds))]
    MissingInputFile { kinds: Vec<InputKind> },

    /// Input could not be decoded (or output encoded) under either encoding
    #[error("encoding failure in {}: {detail}", .path.display())]
    Encoding { path: PathBuf, detail: String },

    /// A column the step depends on is not in the header row
    #[error("{file}: missing column '{column}'")]
    MissingColumn { file: String, column: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file unreadable or invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// Template could not be rendered or combined
    #[error("template error: {0}")]
    Template(String),

    #[error("journal error: {0}")]
    Journal(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MergeError {
    pub fn missing(kind: InputKind) -> Self {
        MergeError::MissingInputFile { kinds: vec![kind] }
    }

    /// Only missing inputs and encoding failures abort a run outright
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MergeError::MissingInputFile { .. } | MergeError::Encoding { .. }
        )
    }
}
