// 🔎 Input Discovery - Find the CRM exports and letter template in a directory

use crate::config::MergeConfig;
use crate::error::{InputKind, MergeError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

pub const HOUSEHOLD_EXPORT: &str = "*_export.[Cc][Ss][Vv]";
pub const CLEAN_HOUSEHOLDS: &str = "*_clean.[Cc][Ss][Vv]";
pub const GIFT_EXPORT: &str = "*_mail.[Cc][Ss][Vv]";
pub const MEMBERSHIP: &str = "Fidelis.[Cc][Ss][Vv]";
pub const TEMPLATE: &str = "*.txt";
pub const GIFT_SUMMARY: &str = "*_complete.csv";

/// Matches for `pattern` inside `dir`, in path order
pub fn find(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = format!(
        "{}/{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        pattern
    );
    let paths = glob::glob(&full).map_err(|e| MergeError::Config(format!("bad pattern {:?}: {}", full, e)))?;

    let mut found = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| MergeError::Io(e.into_error()))?;
        if path.is_file() {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

fn modified(path: &Path) -> SystemTime {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

/// What a directory holds for each step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovered {
    pub household_export: Option<PathBuf>,
    pub clean_households: Option<PathBuf>,
    pub gift_export: Option<PathBuf>,
    pub membership: Option<PathBuf>,
    pub templates: Vec<PathBuf>,
    /// Most recently modified gift summary
    pub gift_summary: Option<PathBuf>,
}

pub fn discover(dir: &Path, merge: &MergeConfig) -> Result<Discovered> {
    let first = |pattern: &str| -> Result<Option<PathBuf>> { Ok(find(dir, pattern)?.into_iter().next()) };

    // Merge output is text too; never mistake it for a template
    let templates = find(dir, TEMPLATE)?
        .into_iter()
        .filter(|p| {
            let name = p.file_name().and_then(|n| n.to_str()).unwrap_or("");
            !name.starts_with("merged_letter_") && name != merge.combined_name
        })
        .collect();

    let gift_summary = find(dir, GIFT_SUMMARY)?
        .into_iter()
        .max_by_key(|p| modified(p));

    let found = Discovered {
        household_export: first(HOUSEHOLD_EXPORT)?,
        clean_households: first(CLEAN_HOUSEHOLDS)?,
        gift_export: first(GIFT_EXPORT)?,
        membership: first(MEMBERSHIP)?,
        templates,
        gift_summary,
    };
    debug!("Discovered in {}: {:?}", dir.display(), found);
    Ok(found)
}

impl Discovered {
    /// Required kinds (template, gift export, household export) not found
    pub fn missing_required(&self) -> Vec<InputKind> {
        let mut missing = Vec::new();
        if self.templates.is_empty() {
            missing.push(InputKind::Template);
        }
        if self.gift_export.is_none() {
            missing.push(InputKind::GiftExport);
        }
        if self.household_export.is_none() {
            missing.push(InputKind::HouseholdExport);
        }
        missing
    }

    pub fn path(&self, kind: InputKind) -> Option<&Path> {
        match kind {
            InputKind::HouseholdExport => self.household_export.as_deref(),
            InputKind::CleanHouseholds => self.clean_households.as_deref(),
            InputKind::GiftExport => self.gift_export.as_deref(),
            InputKind::Membership => self.membership.as_deref(),
            InputKind::Template => self.templates.first().map(PathBuf::as_path),
            InputKind::GiftSummary => self.gift_summary.as_deref(),
        }
    }

    /// The path for `kind`, or `MissingInputFile`
    pub fn require(&self, kind: InputKind) -> Result<&Path> {
        if kind == InputKind::Template && self.templates.len() > 1 {
            return Err(MergeError::Template(format!(
                "exactly one letter template expected, found {}",
                self.templates.len()
            )));
        }
        self.path(kind).ok_or_else(|| MergeError::missing(kind))
    }
}

/// Discover, failing with every missing required kind at once
pub fn check_required(dir: &Path, merge: &MergeConfig) -> Result<Discovered> {
    let found = discover(dir, merge)?;
    let kinds = found.missing_required();
    if kinds.is_empty() {
        Ok(found)
    } else {
        Err(MergeError::MissingInputFile { kinds })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "x").unwrap();
        path
    }

    #[test]
    fn test_discovers_each_kind() {
        let dir = tempfile::tempdir().unwrap();
        let export = touch(dir.path(), "spring_export.CSV");
        touch(dir.path(), "spring_export_clean.CSV");
        touch(dir.path(), "spring_mail.csv");
        touch(dir.path(), "Fidelis.csv");
        touch(dir.path(), "letter.txt");
        touch(dir.path(), "merged_letter_0.txt");
        touch(dir.path(), "combined_ack_letters.txt");

        let found = check_required(dir.path(), &MergeConfig::default()).unwrap();
        assert_eq!(found.household_export, Some(export));
        assert!(found.clean_households.unwrap().ends_with("spring_export_clean.CSV"));
        assert!(found.membership.is_some());
        assert_eq!(found.templates.len(), 1);
        assert!(found.gift_summary.is_none());
    }

    #[test]
    fn test_missing_kinds_reported_together() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "spring_export.csv");

        let err = check_required(dir.path(), &MergeConfig::default()).unwrap_err();
        match err {
            MergeError::MissingInputFile { kinds } => {
                assert_eq!(kinds, vec![InputKind::Template, InputKind::GiftExport]);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_require_single_template() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.txt");
        touch(dir.path(), "b.txt");
        let found = discover(dir.path(), &MergeConfig::default()).unwrap();
        assert!(matches!(found.require(InputKind::Template), Err(MergeError::Template(_))));
        assert!(matches!(
            found.require(InputKind::Membership),
            Err(MergeError::MissingInputFile { .. })
        ));
    }

    #[test]
    fn test_latest_summary_by_modified_time() {
        let dir = tempfile::tempdir().unwrap();
        let old = touch(dir.path(), "2024-01-01 Ack_complete.csv");
        let new = touch(dir.path(), "2023-12-31 Ack_complete.csv");
        let earlier = SystemTime::now() - std::time::Duration::from_secs(3600);
        fs::File::options()
            .write(true)
            .open(&old)
            .unwrap()
            .set_modified(earlier)
            .unwrap();

        let found = discover(dir.path(), &MergeConfig::default()).unwrap();
        assert_eq!(found.gift_summary, Some(new));
    }
}
