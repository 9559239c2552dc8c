// 🏠 Household Records - One constituent plus an optional spouse/partner
// Typed view over the CnBio_* / CnSpSpBio_* / CnAdrSal_* export columns.

use crate::error::Result;
use crate::export::Table;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// COLUMN NAMES
// ============================================================================

pub mod columns {
    pub const ID: &str = "CnBio_ID";
    pub const TITLE: &str = "CnBio_Title_1";
    pub const FIRST_NAME: &str = "CnBio_First_Name";
    pub const LAST_NAME: &str = "CnBio_Last_Name";
    pub const GENDER: &str = "CnBio_Gender";
    pub const MARITAL_STATUS: &str = "CnBio_Marital_status";

    pub const SP_TITLE: &str = "CnSpSpBio_Title_1";
    pub const SP_FIRST_NAME: &str = "CnSpSpBio_First_Name";
    pub const SP_LAST_NAME: &str = "CnSpSpBio_Last_Name";
    pub const SP_GENDER: &str = "CnSpSpBio_Gender";
    pub const SP_INACTIVE: &str = "CnSpSpBio_Inactive";
    pub const SP_DECEASED: &str = "CnSpSpBio_Deceased";
    pub const SP_MARITAL_STATUS: &str = "CnSpSpBio_Marital_status";

    pub const ADDRESSEE: &str = "CnAdrSal_Addressee";
    pub const SALUTATION: &str = "CnAdrSal_Salutation";
}

/// Empty or whitespace-only cells count as missing
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

// ============================================================================
// GENDER / MARITAL STATUS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    /// The CRM's explicit "Unknown" value
    Unknown,
    /// Blank or any other raw value, kept verbatim for write-back
    Other(String),
}

impl Gender {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "Male" => Gender::Male,
            "Female" => Gender::Female,
            "Unknown" => Gender::Unknown,
            other => Gender::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Unknown => "Unknown",
            Gender::Other(raw) => raw,
        }
    }
}

impl Default for Gender {
    fn default() -> Self {
        Gender::Other(String::new())
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The record's genuine marital status, never overwritten by classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaritalStatus {
    Married,
    Single,
    Widowed,
    Divorced,
    Separated,
    Annulled,
    Unknown,
    Blank,
    Other(String),
}

impl MaritalStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "" => MaritalStatus::Blank,
            "Married" => MaritalStatus::Married,
            "Single" => MaritalStatus::Single,
            "Widowed" => MaritalStatus::Widowed,
            "Divorced" => MaritalStatus::Divorced,
            "Separated" => MaritalStatus::Separated,
            // The CRM has exported both spellings
            "Annulled" | "Annuled" => MaritalStatus::Annulled,
            "Unknown" => MaritalStatus::Unknown,
            other => MaritalStatus::Other(other.to_string()),
        }
    }

    /// Partnership ended: the spouse no longer belongs on the envelope
    pub fn is_dissolved(&self) -> bool {
        matches!(
            self,
            MaritalStatus::Widowed
                | MaritalStatus::Divorced
                | MaritalStatus::Separated
                | MaritalStatus::Annulled
        )
    }
}

impl Default for MaritalStatus {
    fn default() -> Self {
        MaritalStatus::Blank
    }
}

// ============================================================================
// PERSON / HOUSEHOLD
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub title: String,
    pub first_name: String,
    pub last_name: String,
    pub gender: Gender,
}

impl Person {
    pub fn new(title: &str, first_name: &str, last_name: &str, gender: Gender) -> Self {
        Person {
            title: title.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            gender,
        }
    }

    /// Title, first and last name all blank
    pub fn is_blank(&self) -> bool {
        is_blank(&self.title) && is_blank(&self.first_name) && is_blank(&self.last_name)
    }

    pub fn has_name(&self) -> bool {
        !is_blank(&self.first_name) || !is_blank(&self.last_name)
    }
}

/// Stored addressee/salutation pair
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Salutation {
    pub addressee: String,
    pub salutation: String,
}

impl Salutation {
    pub fn new(addressee: impl Into<String>, salutation: impl Into<String>) -> Self {
        Salutation {
            addressee: addressee.into(),
            salutation: salutation.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.addressee.is_empty() && self.salutation.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseholdRecord {
    pub id: String,
    pub primary: Person,
    pub spouse: Person,
    pub marital_status: MaritalStatus,
    pub spouse_marital_status: MaritalStatus,
    pub spouse_inactive: bool,
    pub spouse_deceased: bool,
    /// Values already stored in the CRM, possibly stale
    pub existing: Salutation,
}

fn flag(raw: &str) -> bool {
    raw.trim() == "Yes"
}

// ============================================================================
// TABLE MAPPING
// ============================================================================

/// Resolved column positions for a household export
#[derive(Debug, Clone)]
pub struct HouseholdColumns {
    pub id: usize,
    pub title: usize,
    pub first_name: usize,
    pub last_name: usize,
    pub gender: usize,
    pub marital_status: usize,
    pub sp_title: usize,
    pub sp_first_name: usize,
    pub sp_last_name: usize,
    pub sp_gender: usize,
    pub sp_inactive: usize,
    pub sp_deceased: usize,
    /// Not every export carries the spouse's own status
    pub sp_marital_status: Option<usize>,
    pub addressee: usize,
    pub salutation: usize,
}

impl HouseholdColumns {
    pub fn resolve(table: &Table) -> Result<Self> {
        Ok(HouseholdColumns {
            id: table.column(columns::ID)?,
            title: table.column(columns::TITLE)?,
            first_name: table.column(columns::FIRST_NAME)?,
            last_name: table.column(columns::LAST_NAME)?,
            gender: table.column(columns::GENDER)?,
            marital_status: table.column(columns::MARITAL_STATUS)?,
            sp_title: table.column(columns::SP_TITLE)?,
            sp_first_name: table.column(columns::SP_FIRST_NAME)?,
            sp_last_name: table.column(columns::SP_LAST_NAME)?,
            sp_gender: table.column(columns::SP_GENDER)?,
            sp_inactive: table.column(columns::SP_INACTIVE)?,
            sp_deceased: table.column(columns::SP_DECEASED)?,
            sp_marital_status: table.find_column(columns::SP_MARITAL_STATUS),
            addressee: table.column(columns::ADDRESSEE)?,
            salutation: table.column(columns::SALUTATION)?,
        })
    }

    pub fn record(&self, row: &[String]) -> HouseholdRecord {
        let cell = |i: usize| row.get(i).map(String::as_str).unwrap_or("");
        HouseholdRecord {
            id: cell(self.id).to_string(),
            primary: Person::new(
                cell(self.title),
                cell(self.first_name),
                cell(self.last_name),
                Gender::parse(cell(self.gender)),
            ),
            spouse: Person::new(
                cell(self.sp_title),
                cell(self.sp_first_name),
                cell(self.sp_last_name),
                Gender::parse(cell(self.sp_gender)),
            ),
            marital_status: MaritalStatus::parse(cell(self.marital_status)),
            spouse_marital_status: self
                .sp_marital_status
                .map(|i| MaritalStatus::parse(cell(i)))
                .unwrap_or_default(),
            spouse_inactive: flag(cell(self.sp_inactive)),
            spouse_deceased: flag(cell(self.sp_deceased)),
            existing: Salutation::new(cell(self.addressee), cell(self.salutation)),
        }
    }

    /// Overwrite the person and addressee cells of `row` with `record`.
    ///
    /// Marital status and the spouse flags are left as exported.
    pub fn write_back(&self, row: &mut [String], record: &HouseholdRecord) {
        let mut set = |i: usize, value: &str| {
            if let Some(cell) = row.get_mut(i) {
                *cell = value.to_string();
            }
        };
        set(self.title, &record.primary.title);
        set(self.first_name, &record.primary.first_name);
        set(self.last_name, &record.primary.last_name);
        set(self.gender, record.primary.gender.as_str());
        set(self.sp_title, &record.spouse.title);
        set(self.sp_first_name, &record.spouse.first_name);
        set(self.sp_last_name, &record.spouse.last_name);
        set(self.sp_gender, record.spouse.gender.as_str());
        set(self.addressee, &record.existing.addressee);
        set(self.salutation, &record.existing.salutation);
    }
}

/// Parse every row of a household export
pub fn load_households(table: &Table) -> Result<Vec<HouseholdRecord>> {
    let cols = HouseholdColumns::resolve(table)?;
    Ok(table.rows.iter().map(|row| cols.record(row)).collect())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Build a record the way the tests describe households
    pub fn household(
        primary: (&str, &str, &str, Gender),
        spouse: (&str, &str, &str, Gender),
        status: &str,
    ) -> HouseholdRecord {
        HouseholdRecord {
            id: "1001".to_string(),
            primary: Person::new(primary.0, primary.1, primary.2, primary.3),
            spouse: Person::new(spouse.0, spouse.1, spouse.2, spouse.3),
            marital_status: MaritalStatus::parse(status),
            ..HouseholdRecord::default()
        }
    }

    pub fn none() -> (&'static str, &'static str, &'static str, Gender) {
        ("", "", "", Gender::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::TextEncoding;

    const HEADER: &str = "CnBio_ID,CnBio_Title_1,CnBio_First_Name,CnBio_Last_Name,CnBio_Gender,\
CnBio_Marital_status,CnSpSpBio_Title_1,CnSpSpBio_First_Name,CnSpSpBio_Last_Name,\
CnSpSpBio_Gender,CnSpSpBio_Inactive,CnSpSpBio_Deceased,CnAdrSal_Addressee,CnAdrSal_Salutation";

    #[test]
    fn test_parse_household_row() {
        let text = format!(
            "{}\n42,Dr.,Ann,Lee,Female,Married,Dr.,Tom,Lee,Male,No,Yes,Old Addr,Old Sal\n",
            HEADER
        );
        let table = Table::from_text(&text, TextEncoding::Utf8, "h.csv").unwrap();
        let records = load_households(&table).unwrap();

        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.id, "42");
        assert_eq!(r.primary.title, "Dr.");
        assert_eq!(r.primary.gender, Gender::Female);
        assert_eq!(r.spouse.gender, Gender::Male);
        assert_eq!(r.marital_status, MaritalStatus::Married);
        assert_eq!(r.spouse_marital_status, MaritalStatus::Blank);
        assert!(!r.spouse_inactive);
        assert!(r.spouse_deceased);
        assert_eq!(r.existing, Salutation::new("Old Addr", "Old Sal"));
    }

    #[test]
    fn test_missing_spouse_column_is_an_error() {
        let table = Table::from_text("CnBio_ID,CnBio_Title_1\n", TextEncoding::Utf8, "h.csv")
            .unwrap();
        assert!(load_households(&table).is_err());
    }

    #[test]
    fn test_marital_status_spellings() {
        assert_eq!(MaritalStatus::parse("Annuled"), MaritalStatus::Annulled);
        assert_eq!(MaritalStatus::parse("  "), MaritalStatus::Blank);
        assert_eq!(
            MaritalStatus::parse("Partner"),
            MaritalStatus::Other("Partner".to_string())
        );
        assert!(MaritalStatus::Separated.is_dissolved());
        assert!(!MaritalStatus::Single.is_dissolved());
    }

    #[test]
    fn test_gender_keeps_raw_value() {
        assert_eq!(Gender::parse("F").as_str(), "F");
        assert_eq!(Gender::parse("").as_str(), "");
        assert_eq!(Gender::parse("Unknown"), Gender::Unknown);
    }
}
