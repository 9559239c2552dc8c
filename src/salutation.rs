// ✉️ Salutation Renderer - Category → addressee/salutation text
// Pure: the same household and category always render the same strings.

use crate::classifier::{NormalizedHousehold, RelationshipCategory};
use crate::household::{is_blank, Salutation};

/// Join the non-blank parts with single spaces
fn words(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render the formal addressee/salutation pair.
///
/// `None` (no category matched) renders both fields empty so the record
/// stands out in the cleaned file.
pub fn render(h: &NormalizedHousehold, category: Option<RelationshipCategory>) -> Salutation {
    let Some(category) = category else {
        return Salutation::default();
    };

    let p = h.primary();
    let s = h.spouse();
    let (t1, f1, l1) = (p.title.as_str(), p.first_name.as_str(), p.last_name.as_str());
    let (t2, f2, l2) = (s.title.as_str(), s.first_name.as_str(), s.last_name.as_str());

    match category {
        RelationshipCategory::Unchanged => h.record.existing.clone(),

        // Mr. Bryce Howard / Mr. Howard
        RelationshipCategory::EffectivelySingle => {
            if !is_blank(l1) {
                Salutation::new(words(&[t1, f1, l1]), words(&[t1, l1]))
            } else if !is_blank(f1) {
                Salutation::new(words(&[t1, f1]), words(&[t1, f1]))
            } else {
                Salutation::default()
            }
        }

        // Mr. Bryce Howard and Mrs. Jennifer Ha / Mr. Howard and Mrs. Ha
        RelationshipCategory::DifferentSurname
        | RelationshipCategory::SameSurnameSameTitleSpecial
        | RelationshipCategory::SameSurnameBothSpecial => Salutation::new(
            words(&[t1, f1, l1, "and", t2, f2, l2]),
            words(&[t1, l1, "and", t2, l2]),
        ),

        // Mr. Bryce Howard and Mr. Branden Howard / Mr. and Mr. Howard
        RelationshipCategory::SameSurnameSameTitleCommon => Salutation::new(
            words(&[t1, f1, l1, "and", t2, f2, l2]),
            words(&[t1, "and", t2, l1]),
        ),

        // Dr. Bryce Howard and Mrs. Howard / Dr. Howard and Mrs. Howard
        RelationshipCategory::SameSurnamePrimarySpecial => Salutation::new(
            words(&[t1, f1, l1, "and", t2, l2]),
            words(&[t1, l1, "and", t2, l2]),
        ),

        // Dr. Jennifer Howard and Mr. Howard / Dr. Howard and Mr. Howard
        RelationshipCategory::SameSurnameSecondarySpecial => Salutation::new(
            words(&[t2, f2, l2, "and", t1, l1]),
            words(&[t2, l2, "and", t1, l1]),
        ),

        // Mr. and Mrs. Bryce Howard / Mr. and Mrs. Howard
        RelationshipCategory::StandardCouple => Salutation::new(
            words(&[t1, "and", t2, f1, l1]),
            words(&[t1, "and", t2, l1]),
        ),

        RelationshipCategory::StandardCoupleSecondaryMale => Salutation::new(
            words(&[t2, "and", t1, f2, l2]),
            words(&[t2, "and", t1, l2]),
        ),
    }
}

/// First-names-only pair for warmer correspondence
pub fn render_informal(h: &NormalizedHousehold) -> Salutation {
    let p = h.primary();
    if !p.has_name() {
        return Salutation::default();
    }

    let (first, last) = (p.first_name.as_str(), p.last_name.as_str());
    let spouse_first = h.spouse().first_name.trim();
    if spouse_first.is_empty() {
        Salutation::new(words(&[first, last]), first.trim())
    } else {
        Salutation::new(
            words(&[first, "and", spouse_first, last]),
            words(&[first, "and", spouse_first]),
        )
    }
}
