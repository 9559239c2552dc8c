// 🏷️ Relationship Classifier - Which salutation shape fits this household
// Two stages, both pure:
//   1. Normalization passes, applied in a fixed order, each one taking the
//      previous pass's output (spouse clearing, gender ordering, title
//      backfill, marital-status inference).
//   2. A priority-ordered category table; the first rule that matches wins.
// A household no rule matches has no category and renders blank.

use crate::config::TitleConfig;
use crate::household::{is_blank, Gender, HouseholdRecord, MaritalStatus, Person};
use serde::{Deserialize, Serialize};

/// Titles a married woman is retitled from
const UNMARRIED_FEMALE_TITLES: [&str; 2] = ["Miss", "Ms."];

/// Spouse titles that imply the primary is the husband
const FEMALE_COMMON_TITLES: [&str; 3] = ["Mrs.", "Ms.", "Miss"];

// ============================================================================
// RELATIONSHIP CATEGORY
// ============================================================================

/// Rendering-dispatch key; not a marital status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RelationshipCategory {
    Unchanged,
    EffectivelySingle,
    DifferentSurname,
    SameSurnameSameTitleCommon,
    SameSurnameSameTitleSpecial,
    SameSurnameBothSpecial,
    SameSurnamePrimarySpecial,
    SameSurnameSecondarySpecial,
    StandardCouple,
    StandardCoupleSecondaryMale,
}

impl RelationshipCategory {
    /// Every category, in match priority order
    pub const ALL: [RelationshipCategory; 10] = [
        RelationshipCategory::Unchanged,
        RelationshipCategory::EffectivelySingle,
        RelationshipCategory::DifferentSurname,
        RelationshipCategory::SameSurnameSameTitleCommon,
        RelationshipCategory::SameSurnameSameTitleSpecial,
        RelationshipCategory::SameSurnameBothSpecial,
        RelationshipCategory::SameSurnamePrimarySpecial,
        RelationshipCategory::SameSurnameSecondarySpecial,
        RelationshipCategory::StandardCouple,
        RelationshipCategory::StandardCoupleSecondaryMale,
    ];

    /// 1-based position in the match table
    pub fn priority(&self) -> usize {
        Self::ALL
            .iter()
            .position(|c| c == self)
            .map(|i| i + 1)
            .unwrap_or(usize::MAX)
    }

    /// Short code for reports
    pub fn code(&self) -> &'static str {
        match self {
            RelationshipCategory::Unchanged => "Unchanged",
            RelationshipCategory::EffectivelySingle => "WidSinDiv_0",
            RelationshipCategory::DifferentSurname => "DifferentLastName_1",
            RelationshipCategory::SameSurnameSameTitleCommon => "SameLastNameSameTitleNonSpecial_2",
            RelationshipCategory::SameSurnameSameTitleSpecial => "SameLastNameSameTitleSpecial_3",
            RelationshipCategory::SameSurnameBothSpecial => "SameLastNameBothSpecialTitle_4",
            RelationshipCategory::SameSurnamePrimarySpecial => "SameLastNameMainSpecialTitle_5",
            RelationshipCategory::SameSurnameSecondarySpecial => "SameLastNameSpSpecialTitle_6",
            RelationshipCategory::StandardCouple => "StandardAddSal_7",
            RelationshipCategory::StandardCoupleSecondaryMale => "StandardAddSal_MaleSp_8",
        }
    }
}

// ============================================================================
// NORMALIZED HOUSEHOLD
// ============================================================================

/// Where normalization left the household's marital state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    /// Marital status (possibly inferred) the category table reads
    Status(MaritalStatus),
    /// Spouse cleared; render the primary alone
    EffectivelySingle,
    /// No primary name; the stored addressee/salutation stand
    Unchanged,
}

/// A household after the normalization passes.
///
/// `record.marital_status` still holds the exported value; the working
/// state lives in `disposition`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedHousehold {
    pub record: HouseholdRecord,
    pub disposition: Disposition,
}

impl NormalizedHousehold {
    pub fn new(record: HouseholdRecord) -> Self {
        let disposition = Disposition::Status(record.marital_status.clone());
        NormalizedHousehold {
            record,
            disposition,
        }
    }

    pub fn primary(&self) -> &Person {
        &self.record.primary
    }

    pub fn spouse(&self) -> &Person {
        &self.record.spouse
    }

    /// Both surnames present and equal
    pub fn surnames_match(&self) -> bool {
        let (a, b) = (&self.record.primary.last_name, &self.record.spouse.last_name);
        !is_blank(a) && a == b
    }

    pub fn titles_match(&self) -> bool {
        self.record.primary.title == self.record.spouse.title
    }

    pub fn is_married(&self) -> bool {
        self.disposition == Disposition::Status(MaritalStatus::Married)
    }

    fn status(&self) -> Option<&MaritalStatus> {
        match &self.disposition {
            Disposition::Status(status) => Some(status),
            _ => None,
        }
    }

    fn clear_spouse(mut self) -> Self {
        self.record.spouse = Person::default();
        self.disposition = Disposition::EffectivelySingle;
        self
    }
}

// ============================================================================
// NORMALIZATION PASSES
// ============================================================================

pub type Pass = fn(NormalizedHousehold, &TitleConfig) -> NormalizedHousehold;

/// The passes, in the order they must run
pub const PASSES: [(&str, Pass); 8] = [
    ("self_reference", clear_self_reference),
    ("ended_partnership", clear_ended_partnership),
    ("gender_order", order_by_gender),
    ("married_titles", retitle_married),
    ("blank_titles", backfill_blank_titles),
    ("infer_status", infer_marital_status),
    ("collapse_single", collapse_to_single),
    ("no_name", guard_no_name),
];

/// Primary and spouse share a first name: the spouse row is the primary again
pub fn clear_self_reference(h: NormalizedHousehold, _: &TitleConfig) -> NormalizedHousehold {
    if h.primary().first_name.trim() == h.spouse().first_name.trim() {
        h.clear_spouse()
    } else {
        h
    }
}

pub fn clear_ended_partnership(h: NormalizedHousehold, _: &TitleConfig) -> NormalizedHousehold {
    if h.record.spouse_inactive || h.record.spouse_deceased || h.record.marital_status.is_dissolved() {
        h.clear_spouse()
    } else {
        h
    }
}

/// Mixed-gender couples list the man first
pub fn order_by_gender(mut h: NormalizedHousehold, _: &TitleConfig) -> NormalizedHousehold {
    if h.primary().gender == Gender::Female && h.spouse().gender == Gender::Male {
        std::mem::swap(&mut h.record.primary, &mut h.record.spouse);
    }
    h
}

/// Married, same surname, still titled Miss/Ms.: both partners become Mrs.
///
/// Blank titles are judged by what the backfill pass will write, so a
/// cleaned record retitles the same way as its export. Skipped when the
/// primary is Mr.; partners who are male or hold a special title keep theirs.
pub fn retitle_married(mut h: NormalizedHousehold, titles: &TitleConfig) -> NormalizedHousehold {
    let either_married = h.is_married() || h.record.spouse_marital_status == MaritalStatus::Married;
    let primary_title = effective_title(h.primary(), &h.spouse().title);
    let spouse_title = effective_title(h.spouse(), primary_title);
    let primary_is_mr = primary_title == "Mr.";
    let holds_unmarried_title = [primary_title, spouse_title]
        .iter()
        .any(|t| UNMARRIED_FEMALE_TITLES.contains(t));

    if h.surnames_match() && either_married && !primary_is_mr && holds_unmarried_title {
        let keeps_title = |p: &Person| {
            p.gender == Gender::Male || titles.is_strictly_male(&p.title) || titles.is_special(&p.title)
        };
        for person in [&mut h.record.primary, &mut h.record.spouse] {
            if !keeps_title(&*person) {
                person.title = "Mrs.".to_string();
            }
        }
    }
    h
}

/// Fill blank titles from gender, or from the partner's title
pub fn backfill_blank_titles(mut h: NormalizedHousehold, _: &TitleConfig) -> NormalizedHousehold {
    if let Some(title) = inferred_title(h.primary(), &h.spouse().title) {
        h.record.primary.title = title.to_string();
    }
    // Reads the primary title the line above may have just filled
    if let Some(title) = inferred_title(h.spouse(), &h.primary().title) {
        h.record.spouse.title = title.to_string();
    }
    h
}

fn inferred_title(person: &Person, partner_title: &str) -> Option<&'static str> {
    if !is_blank(&person.title) || is_blank(&person.last_name) {
        return None;
    }
    if person.gender == Gender::Male || FEMALE_COMMON_TITLES.contains(&partner_title) {
        Some("Mr.")
    } else if person.gender == Gender::Female || partner_title == "Mr." {
        Some("Ms.")
    } else {
        None
    }
}

/// The stored title, or the one `backfill_blank_titles` would fill in
fn effective_title<'a>(person: &'a Person, partner_title: &str) -> &'a str {
    inferred_title(person, partner_title).unwrap_or(person.title.as_str())
}

/// Shared surname, or a named partner with a different one, reads as married
pub fn infer_marital_status(mut h: NormalizedHousehold, _: &TitleConfig) -> NormalizedHousehold {
    let Some(status) = h.status() else {
        return h;
    };
    let unset = matches!(status, MaritalStatus::Blank | MaritalStatus::Single);
    let same = h.surnames_match();
    if (unset && same) || (!same && !is_blank(&h.spouse().last_name)) {
        h.disposition = Disposition::Status(MaritalStatus::Married);
    }
    h
}

pub fn collapse_to_single(mut h: NormalizedHousehold, _: &TitleConfig) -> NormalizedHousehold {
    let Some(status) = h.status() else {
        return h;
    };
    let ended = h.record.spouse_deceased
        || h.record.spouse_inactive
        || matches!(status, MaritalStatus::Divorced | MaritalStatus::Separated);
    let no_spouse = h.spouse().is_blank()
        && matches!(
            status,
            MaritalStatus::Single | MaritalStatus::Married | MaritalStatus::Unknown | MaritalStatus::Blank
        );
    if ended || no_spouse {
        h.disposition = Disposition::EffectivelySingle;
    }
    h
}

pub fn guard_no_name(mut h: NormalizedHousehold, _: &TitleConfig) -> NormalizedHousehold {
    if !h.primary().has_name() {
        h.disposition = Disposition::Unchanged;
    }
    h
}

// ============================================================================
// CATEGORY RULES
// ============================================================================

/// Does `category`'s condition hold for `h`, ignoring higher-priority rules?
pub fn rule_matches(category: RelationshipCategory, h: &NormalizedHousehold, titles: &TitleConfig) -> bool {
    let t1 = h.primary().title.as_str();
    let t2 = h.spouse().title.as_str();
    let couple = h.surnames_match() && h.is_married();

    match category {
        RelationshipCategory::Unchanged => h.disposition == Disposition::Unchanged,
        RelationshipCategory::EffectivelySingle => h.disposition == Disposition::EffectivelySingle,
        RelationshipCategory::DifferentSurname => {
            !h.surnames_match()
                && h.is_married()
                && (!is_blank(&h.spouse().first_name) || !is_blank(&h.spouse().last_name))
        }
        RelationshipCategory::SameSurnameSameTitleCommon => {
            couple && h.titles_match() && !titles.is_special(t1)
        }
        RelationshipCategory::SameSurnameSameTitleSpecial => {
            couple && h.titles_match() && titles.is_special(t1)
        }
        RelationshipCategory::SameSurnameBothSpecial => {
            couple && titles.is_special(t1) && titles.is_special(t2)
        }
        RelationshipCategory::SameSurnamePrimarySpecial => couple && titles.is_special(t1),
        RelationshipCategory::SameSurnameSecondarySpecial => couple && titles.is_special(t2),
        RelationshipCategory::StandardCouple => {
            couple
                && (titles.is_common(t1) || titles.is_common(t2))
                && h.spouse().gender != Gender::Male
        }
        RelationshipCategory::StandardCoupleSecondaryMale => {
            couple
                && (titles.is_common(t1) || titles.is_common(t2))
                && h.spouse().gender == Gender::Male
        }
    }
}

// ============================================================================
// CLASSIFIER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub household: NormalizedHousehold,
    /// `None` when no rule matched
    pub category: Option<RelationshipCategory>,
}

impl Classification {
    pub fn is_fallthrough(&self) -> bool {
        self.category.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Classifier {
    titles: TitleConfig,
}

impl Classifier {
    pub fn new(titles: TitleConfig) -> Self {
        Classifier { titles }
    }

    pub fn titles(&self) -> &TitleConfig {
        &self.titles
    }

    /// Run every pass in order
    pub fn normalize(&self, record: &HouseholdRecord) -> NormalizedHousehold {
        PASSES
            .iter()
            .fold(NormalizedHousehold::new(record.clone()), |h, (_, pass)| {
                pass(h, &self.titles)
            })
    }

    /// First category in priority order whose rule holds
    pub fn categorize(&self, h: &NormalizedHousehold) -> Option<RelationshipCategory> {
        RelationshipCategory::ALL
            .iter()
            .copied()
            .find(|c| rule_matches(*c, h, &self.titles))
    }

    pub fn classify(&self, record: &HouseholdRecord) -> Classification {
        let household = self.normalize(record);
        let category = self.categorize(&household);
        Classification {
            household,
            category,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
