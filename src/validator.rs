// ✅ Title/Gender Validator - Gate before salutations are derived
// A title that contradicts the recorded gender produces a wrong salutation
// downstream, so these records are surfaced for manual review first.

use crate::config::TitleConfig;
use crate::export::{Table, TextEncoding};
use crate::household::{is_blank, Gender, HouseholdRecord, Person};
use serde::{Deserialize, Serialize};
use tracing::warn;

// ============================================================================
// VIOLATIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Party {
    Primary,
    Spouse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationKind {
    /// Male gender holding a strictly-female title
    MaleWithFemaleTitle,
    /// Female gender holding a strictly-male title
    FemaleWithMaleTitle,
    /// Named person of Unknown gender whose title implies one
    UnknownGenderWithGenderedTitle,
}

impl ViolationKind {
    pub fn describe(&self) -> &'static str {
        match self {
            ViolationKind::MaleWithFemaleTitle => "male gender with female title",
            ViolationKind::FemaleWithMaleTitle => "female gender with male title",
            ViolationKind::UnknownGenderWithGenderedTitle => "unknown gender with gendered title",
        }
    }
}

/// One failed check, with enough of the record to fix it by hand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleViolation {
    pub id: String,
    pub party: Party,
    pub kind: ViolationKind,
    pub primary_gender: String,
    pub primary_title: String,
    pub spouse_gender: String,
    pub spouse_title: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub records_checked: usize,
    pub violations: Vec<TitleViolation>,
}

impl ValidationReport {
    /// The "all clean" gate
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// Distinct record ids with at least one violation
    pub fn violating_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for v in &self.violations {
            if !ids.contains(&v.id.as_str()) {
                ids.push(&v.id);
            }
        }
        ids
    }

    pub fn summary(&self) -> String {
        format!(
            "{} records checked, {} title/gender violations in {} records",
            self.records_checked,
            self.violations.len(),
            self.violating_ids().len()
        )
    }

    /// Review listing: one row per violation
    pub fn to_table(&self, encoding: TextEncoding) -> Table {
        let headers = ["CnBio_ID", "Gender", "Title", "SpSpGender", "SpSpTitle", "Problem"];
        let mut table = Table::new(
            headers.iter().map(|h| h.to_string()).collect(),
            encoding,
            "violations",
        );
        for v in &self.violations {
            let party = match v.party {
                Party::Primary => "primary",
                Party::Spouse => "spouse",
            };
            table.rows.push(vec![
                v.id.clone(),
                v.primary_gender.clone(),
                v.primary_title.clone(),
                v.spouse_gender.clone(),
                v.spouse_title.clone(),
                format!("{}: {}", party, v.kind.describe()),
            ]);
        }
        table
    }

    /// Fixed-width text grid for the terminal
    pub fn render_grid(&self) -> String {
        let table = self.to_table(TextEncoding::Utf8);
        let mut widths: Vec<usize> = table.headers.iter().map(|h| h.chars().count()).collect();
        for row in &table.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        let rule: String = widths
            .iter()
            .map(|w| "-".repeat(w + 2))
            .collect::<Vec<_>>()
            .join("+");
        let line = |cells: &[String]| -> String {
            cells
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!(" {:<width$} ", c, width = *w))
                .collect::<Vec<_>>()
                .join("|")
        };

        let mut out = Vec::with_capacity(table.rows.len() + 4);
        out.push(format!("+{}+", rule));
        out.push(format!("|{}|", line(&table.headers)));
        out.push(format!("+{}+", rule));
        for row in &table.rows {
            out.push(format!("|{}|", line(row)));
        }
        out.push(format!("+{}+", rule));
        out.join("\n")
    }
}

// ============================================================================
// VALIDATOR
// ============================================================================

pub struct TitleGenderValidator<'a> {
    titles: &'a TitleConfig,
}

impl<'a> TitleGenderValidator<'a> {
    pub fn new(titles: &'a TitleConfig) -> Self {
        TitleGenderValidator { titles }
    }

    /// Check every record; advisory, the caller decides whether to proceed
    pub fn validate(&self, records: &[HouseholdRecord]) -> ValidationReport {
        let mut report = ValidationReport {
            records_checked: records.len(),
            violations: Vec::new(),
        };

        for record in records {
            for (party, person) in [(Party::Primary, &record.primary), (Party::Spouse, &record.spouse)] {
                if let Some(kind) = self.check_person(person) {
                    warn!(
                        "Record {}: {} ({:?} '{}')",
                        record.id,
                        kind.describe(),
                        party,
                        person.title
                    );
                    report.violations.push(TitleViolation {
                        id: record.id.clone(),
                        party,
                        kind,
                        primary_gender: record.primary.gender.to_string(),
                        primary_title: record.primary.title.clone(),
                        spouse_gender: record.spouse.gender.to_string(),
                        spouse_title: record.spouse.title.clone(),
                    });
                }
            }
        }

        report
    }

    fn check_person(&self, person: &Person) -> Option<ViolationKind> {
        let title = person.title.as_str();

        match person.gender {
            Gender::Male if self.titles.is_strictly_female(title) => {
                Some(ViolationKind::MaleWithFemaleTitle)
            }
            Gender::Female if self.titles.is_strictly_male(title) => {
                Some(ViolationKind::FemaleWithMaleTitle)
            }
            Gender::Unknown if !is_blank(&person.first_name) && self.titles.is_gendered(title) => {
                Some(ViolationKind::UnknownGenderWithGenderedTitle)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::household::test_support::{household, none};

    #[test]
    fn test_clean_couple_passes() {
        let titles = TitleConfig::default();
        let records = vec![household(
            ("Mr.", "John", "Smith", Gender::Male),
            ("Mrs.", "Jane", "Smith", Gender::Female),
            "Married",
        )];
        let report = TitleGenderValidator::new(&titles).validate(&records);
        assert!(report.is_clean());
        assert_eq!(report.records_checked, 1);
    }

    #[test]
    fn test_female_with_male_title() {
        let titles = TitleConfig::default();
        let records = vec![household(("Mr.", "Jane", "Doe", Gender::Female), none(), "Single")];
        let report = TitleGenderValidator::new(&titles).validate(&records);

        assert!(!report.is_clean());
        assert_eq!(report.violations[0].kind, ViolationKind::FemaleWithMaleTitle);
        assert_eq!(report.violations[0].party, Party::Primary);
        assert_eq!(report.violations[0].primary_title, "Mr.");
    }

    #[test]
    fn test_spouse_male_with_female_title() {
        let titles = TitleConfig::default();
        let records = vec![household(
            ("Dr.", "Ann", "Lee", Gender::Female),
            ("Sister", "Tom", "Lee", Gender::Male),
            "Married",
        )];
        let report = TitleGenderValidator::new(&titles).validate(&records);

        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].party, Party::Spouse);
        assert_eq!(report.violations[0].kind, ViolationKind::MaleWithFemaleTitle);
        assert_eq!(report.violations[0].spouse_gender, "Male");
    }

    #[test]
    fn test_unknown_gender_needs_first_name() {
        let titles = TitleConfig::default();
        let named = household(("Mrs.", "Pat", "Kim", Gender::Unknown), none(), "");
        let unnamed = household(("Mrs.", "", "Kim", Gender::Unknown), none(), "");
        let neutral = household(("Dr.", "Pat", "Kim", Gender::Unknown), none(), "");

        let report = TitleGenderValidator::new(&titles).validate(&[named, unnamed, neutral]);
        assert_eq!(report.violations.len(), 1);
        assert_eq!(
            report.violations[0].kind,
            ViolationKind::UnknownGenderWithGenderedTitle
        );
    }

    #[test]
    fn test_blank_gender_is_not_unknown() {
        let titles = TitleConfig::default();
        let records = vec![household(("Mrs.", "Pat", "Kim", Gender::default()), none(), "")];
        assert!(TitleGenderValidator::new(&titles).validate(&records).is_clean());
    }

    #[test]
    fn test_report_listing() {
        let titles = TitleConfig::default();
        let mut a = household(("Mr.", "Jane", "Doe", Gender::Female), none(), "");
        a.id = "7".to_string();
        let report = TitleGenderValidator::new(&titles).validate(&[a]);

        let table = report.to_table(TextEncoding::Utf8);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0][0], "7");
        assert_eq!(table.rows[0][5], "primary: female gender with male title");

        let grid = report.render_grid();
        assert!(grid.contains("| 7 "));
        assert_eq!(report.violating_ids(), vec!["7"]);
    }
}
