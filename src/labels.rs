// 🧹 Household Cleaning - validate → classify → render → `_clean` export
// Each record is processed on its own; nothing is shared between rows.

use crate::classifier::{Classification, Classifier, RelationshipCategory};
use crate::config::AppConfig;
use crate::error::Result;
use crate::export::{clean_path, Table};
use crate::household::{HouseholdColumns, HouseholdRecord, Salutation};
use crate::salutation::{render, render_informal};
use crate::validator::{TitleGenderValidator, ValidationReport};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// ============================================================================
// POLICY / RESULTS
// ============================================================================

/// What to do when the validator reports violations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViolationPolicy {
    /// Stop before classifying; records need manual review
    #[default]
    Halt,
    /// Classify anyway
    Proceed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedHousehold {
    pub classification: Classification,
    pub formal: Salutation,
    pub informal: Salutation,
}

impl CleanedHousehold {
    /// The normalized record carrying its rendered addressee/salutation
    pub fn to_record(&self) -> HouseholdRecord {
        let mut record = self.classification.household.record.clone();
        record.existing = self.formal.clone();
        record
    }
}

#[derive(Debug, Clone, Default)]
pub struct CleanReport {
    pub validation: ValidationReport,
    pub households: Vec<CleanedHousehold>,
    pub category_counts: BTreeMap<RelationshipCategory, usize>,
    /// Ids of households no category matched; their fields are blank
    pub fallthrough_ids: Vec<String>,
}

impl CleanReport {
    pub fn fallthrough_count(&self) -> usize {
        self.fallthrough_ids.len()
    }

    pub fn summary(&self) -> String {
        let counts = self
            .category_counts
            .iter()
            .map(|(c, n)| format!("{}={}", c.code(), n))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "{} households cleaned, {} unhandled [{}]",
            self.households.len(),
            self.fallthrough_count(),
            counts
        )
    }
}

#[derive(Debug, Clone)]
pub enum CleanOutcome {
    /// Validator found violations under `ViolationPolicy::Halt`
    Halted(ValidationReport),
    Cleaned(CleanReport),
}

impl CleanOutcome {
    pub fn validation(&self) -> &ValidationReport {
        match self {
            CleanOutcome::Halted(report) => report,
            CleanOutcome::Cleaned(report) => &report.validation,
        }
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

pub fn clean_record(classifier: &Classifier, record: &HouseholdRecord) -> CleanedHousehold {
    let classification = classifier.classify(record);
    let formal = render(&classification.household, classification.category);
    let informal = render_informal(&classification.household);
    CleanedHousehold {
        classification,
        formal,
        informal,
    }
}

/// Validate, then classify and render every record
pub fn clean_households(
    records: &[HouseholdRecord],
    config: &AppConfig,
    policy: ViolationPolicy,
) -> CleanOutcome {
    let validation = TitleGenderValidator::new(&config.titles).validate(records);
    if !validation.is_clean() {
        warn!("{}", validation.summary());
        if policy == ViolationPolicy::Halt {
            return CleanOutcome::Halted(validation);
        }
        warn!("Proceeding despite title/gender violations");
    }

    let classifier = Classifier::new(config.titles.clone());
    let mut report = CleanReport {
        validation,
        ..CleanReport::default()
    };

    for record in records {
        let cleaned = clean_record(&classifier, record);
        match cleaned.classification.category {
            Some(category) => *report.category_counts.entry(category).or_insert(0) += 1,
            None => {
                warn!("Record {}: no salutation rule matched, left blank", record.id);
                report.fallthrough_ids.push(record.id.clone());
            }
        }
        report.households.push(cleaned);
    }

    if report.fallthrough_count() > 0 {
        warn!(
            "{} records fell through every rule and need a manual addressee/salutation",
            report.fallthrough_count()
        );
    }
    info!("{}", report.summary());

    CleanOutcome::Cleaned(report)
}

/// Clean a household export table, returning the `_clean` table when not halted
pub fn clean_table(
    table: &Table,
    config: &AppConfig,
    policy: ViolationPolicy,
) -> Result<(CleanOutcome, Option<Table>)> {
    let cols = HouseholdColumns::resolve(table)?;
    let records: Vec<HouseholdRecord> = table.rows.iter().map(|row| cols.record(row)).collect();

    let outcome = clean_households(&records, config, policy);
    let cleaned = match &outcome {
        CleanOutcome::Halted(_) => None,
        CleanOutcome::Cleaned(report) => Some(cleaned_table(table, &cols, report, config)),
    };
    Ok((outcome, cleaned))
}

/// Export rows with normalized fields written back and informal columns inserted
fn cleaned_table(
    table: &Table,
    cols: &HouseholdColumns,
    report: &CleanReport,
    config: &AppConfig,
) -> Table {
    let at = config.columns.informal_index.min(table.headers.len());
    let mut headers = table.headers.clone();
    headers.insert(at, config.columns.informal_salutation.clone());
    headers.insert(at, config.columns.informal_addressee.clone());

    let mut out = Table::new(headers, table.encoding, &table.source);
    for (row, cleaned) in table.rows.iter().zip(&report.households) {
        let mut row = row.clone();
        cols.write_back(&mut row, &cleaned.to_record());
        let at = at.min(row.len());
        row.insert(at, cleaned.informal.salutation.clone());
        row.insert(at, cleaned.informal.addressee.clone());
        out.rows.push(row);
    }
    out
}

/// Files written by one clean run
#[derive(Debug, Clone)]
pub struct CleanRun {
    pub outcome: CleanOutcome,
    pub clean_file: Option<PathBuf>,
    pub violations_file: Option<PathBuf>,
}

/// `<stem>_violations.csv` next to the export
pub fn violations_path(export: &Path) -> PathBuf {
    let stem = export
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("export");
    export.with_file_name(format!("{}_violations.csv", stem))
}

/// Read an export, clean it, and write `_clean` (and `_violations` if any)
pub fn clean_export(path: &Path, config: &AppConfig, policy: ViolationPolicy) -> Result<CleanRun> {
    let table = Table::read(path)?;
    info!("Loaded {} household records from {}", table.rows.len(), table.source);

    let (outcome, cleaned) = clean_table(&table, config, policy)?;

    let violations_file = if outcome.validation().is_clean() {
        None
    } else {
        let target = violations_path(path);
        outcome.validation().to_table(table.encoding).write(&target)?;
        Some(target)
    };

    let clean_file = match cleaned {
        Some(out) => {
            let target = clean_path(path);
            out.write(&target)?;
            info!("Wrote {}", target.display());
            Some(target)
        }
        None => None,
    };

    Ok(CleanRun {
        outcome,
        clean_file,
        violations_file,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::TextEncoding;
    use crate::household::{columns, Gender};
    use crate::household::test_support::{household, none};

    const HEADER: &str = "CnBio_ID,CnBio_Title_1,CnBio_First_Name,CnBio_Last_Name,CnBio_Gender,\
CnBio_Marital_status,CnSpSpBio_Title_1,CnSpSpBio_First_Name,CnSpSpBio_Last_Name,\
CnSpSpBio_Gender,CnSpSpBio_Inactive,CnSpSpBio_Deceased,CnAdrSal_Addressee,CnAdrSal_Salutation,City";

    fn export(rows: &[&str]) -> Table {
        let text = format!("{}\n{}\n", HEADER, rows.join("\n"));
        Table::from_text(&text, TextEncoding::Utf8, "test_export.csv").unwrap()
    }

    #[test]
    fn test_halts_on_violation_by_default() {
        let table = export(&["1,Mr.,Jane,Doe,Female,Single,,,,,,,,,Austin"]);
        let (outcome, out) = clean_table(&table, &AppConfig::default(), ViolationPolicy::Halt).unwrap();
        assert!(matches!(outcome, CleanOutcome::Halted(_)));
        assert!(out.is_none());

        let (outcome, out) = clean_table(&table, &AppConfig::default(), ViolationPolicy::Proceed).unwrap();
        assert!(matches!(outcome, CleanOutcome::Cleaned(_)));
        assert!(out.is_some());
        assert_eq!(outcome.validation().violations.len(), 1);
    }

    #[test]
    fn test_clean_table_columns_and_values() {
        let table = export(&[
            "1,Mrs.,Jane,Smith,Female,Married,Mr.,John,Smith,Male,No,No,old,old,Austin",
            "2,,,,,,,,,,,,Keep Me,Keep,Dallas",
        ]);
        let (outcome, out) =
            clean_table(&table, &AppConfig::default(), ViolationPolicy::Halt).unwrap();
        let out = out.unwrap();

        assert_eq!(out.headers[12], "Informal_Addressee");
        assert_eq!(out.headers[13], "Informal_Salutation");
        assert_eq!(out.headers.len(), table.headers.len() + 2);

        let addr = out.find_column(columns::ADDRESSEE).unwrap();
        let sal = out.find_column(columns::SALUTATION).unwrap();
        let first = out.find_column(columns::FIRST_NAME).unwrap();
        let status = out.find_column(columns::MARITAL_STATUS).unwrap();

        // Swapped so the husband is primary; status column untouched
        assert_eq!(out.rows[0][first], "John");
        assert_eq!(out.rows[0][status], "Married");
        assert_eq!(out.rows[0][addr], "Mr. and Mrs. John Smith");
        assert_eq!(out.rows[0][sal], "Mr. and Mrs. Smith");
        assert_eq!(out.rows[0][12], "John and Jane Smith");
        assert_eq!(out.rows[0][13], "John and Jane");
        assert_eq!(out.rows[0].last().unwrap(), "Austin");

        assert_eq!(out.rows[1][addr], "Keep Me");
        assert_eq!(out.rows[1][sal], "Keep");
        assert_eq!(out.rows[1][12], "");

        match outcome {
            CleanOutcome::Cleaned(report) => {
                assert_eq!(report.category_counts[&RelationshipCategory::StandardCouple], 1);
                assert_eq!(report.category_counts[&RelationshipCategory::Unchanged], 1);
                assert_eq!(report.fallthrough_count(), 0);
            }
            CleanOutcome::Halted(_) => panic!("clean export should not halt"),
        }
    }

    #[test]
    fn test_fallthrough_is_counted() {
        let records = vec![
            household(("Ms.", "Dana", "Cho", Gender::Female), none(), "Engaged"),
            household(("Mr.", "Al", "Fox", Gender::Male), none(), "Single"),
        ];
        let outcome = clean_households(&records, &AppConfig::default(), ViolationPolicy::Halt);
        let CleanOutcome::Cleaned(report) = outcome else {
            panic!("expected a cleaned report");
        };
        assert_eq!(report.fallthrough_ids, vec!["1001".to_string()]);
        assert!(report.households[0].formal.is_empty());
        assert!(report.summary().contains("1 unhandled"));
    }

    #[test]
    fn test_second_pass_is_idempotent() {
        let config = AppConfig::default();
        let classifier = Classifier::new(config.titles.clone());
        let records = vec![
            household(("", "John", "Smith", Gender::Male), ("Ms.", "Jane", "Smith", Gender::default()), "Married"),
            household(("Mrs.", "Jane", "Smith", Gender::Female), ("", "John", "Smith", Gender::Male), ""),
            household(("Ms.", "Kay", "Park", Gender::Female), ("Miss", "Lin", "Park", Gender::Female), "Married"),
            household(("Dr.", "Raj", "Rao", Gender::Male), ("Ms.", "Mia", "Rao", Gender::Female), "Married"),
            household(("Mr.", "Bryce", "Howard", Gender::Male), ("Mrs.", "Jen", "Ha", Gender::Female), "Single"),
            household(("Mr.", "Sam", "Ortiz", Gender::Male), ("Mrs.", "Sam", "Ortiz", Gender::Female), "Widowed"),
            household(("", "", "", Gender::default()), none(), ""),
            household(("", "Pat", "Smith", Gender::default()), ("Mr.", "Bob", "Smith", Gender::Male), "Married"),
            household(("", "Ann", "Cole", Gender::Female), ("Mr.", "Ed", "Cole", Gender::Male), "Married"),
        ];

        for record in &records {
            let once = clean_record(&classifier, record);
            let twice = clean_record(&classifier, &once.to_record());
            assert_eq!(once.formal, twice.formal, "record {:?}", record.primary);
            assert_eq!(once.informal, twice.informal);
            assert_eq!(
                render(&twice.classification.household, twice.classification.category),
                once.formal
            );
        }
    }

    #[test]
    fn test_clean_export_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spring_export.csv");
        std::fs::write(
            &path,
            format!("{}\n1,Mr.,Jane,Doe,Female,Single,,,,,,,,,Austin\n", HEADER),
        )
        .unwrap();

        let run = clean_export(&path, &AppConfig::default(), ViolationPolicy::Halt).unwrap();
        assert!(run.clean_file.is_none());
        let violations = run.violations_file.unwrap();
        assert!(violations.ends_with("spring_export_violations.csv"));

        let listing = Table::read(&violations).unwrap();
        assert_eq!(listing.rows[0][0], "1");

        let run = clean_export(&path, &AppConfig::default(), ViolationPolicy::Proceed).unwrap();
        let clean = run.clean_file.unwrap();
        assert!(clean.ends_with("spring_export_clean.csv"));
        let out = Table::read(&clean).unwrap();
        let addr = out.find_column(columns::ADDRESSEE).unwrap();
        assert_eq!(out.rows[0][addr], "Mr. Jane Doe");
    }
}
