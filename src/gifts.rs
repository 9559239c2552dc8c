// 🎁 Gift Acknowledgment - Gift export + cleaned households → one row per (constituent, fund)
//
// Pledge precedence: when any gift in a group is a pledge, only the pledges
// are summed and the row is labelled "pledge"; otherwise every gift is
// summed and labelled "gift".

use crate::config::AckConfig;
use crate::error::{InputKind, MergeError, Result};
use crate::export::Table;
use crate::household::{columns as household_columns, is_blank};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub mod columns {
    pub const CONSTITUENT_ID: &str = "Constituent ID";
    pub const ADDRESSEE: &str = "Addressee";
    pub const SALUTATION: &str = "Salutation";
    pub const ADDRESS_1: &str = "Address line 1";
    pub const ADDRESS_2: &str = "Address line 2";
    pub const ADDRESS_3: &str = "Address line 3";
    pub const CITY: &str = "City";
    pub const STATE: &str = "State";
    pub const ZIP: &str = "ZIP Code";
    pub const GIFT_TYPE: &str = "Gift type";
    pub const GIFT_SUBTYPE: &str = "Gift subtype";
    pub const AMOUNT: &str = "Amount";
    pub const FUND: &str = "Fund description_1";
    pub const GIFT_DATE: &str = "Gift date";
    pub const PAY_METHOD: &str = "Pay Method";
    pub const INSTALLMENT_FREQUENCY: &str = "Installment Frequency";

    /// Summary header order (membership label appended when used)
    pub const SUMMARY: [&str; 16] = [
        CONSTITUENT_ID,
        ADDRESSEE,
        SALUTATION,
        "Address_Line_1",
        ADDRESS_2,
        ADDRESS_3,
        CITY,
        STATE,
        "ZIP_Code",
        GIFT_TYPE,
        GIFT_SUBTYPE,
        AMOUNT,
        FUND,
        GIFT_DATE,
        PAY_METHOD,
        INSTALLMENT_FREQUENCY,
    ];
}

// ============================================================================
// AMOUNTS / DATES
// ============================================================================

/// Money in whole cents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cents(pub i64);

impl Cents {
    /// Keep only digits and '.', then parse exactly ("$1,250.50" → 125050).
    ///
    /// Fractions past the cent round half up. `None` when nothing numeric is
    /// left or the value does not fit.
    pub fn parse(raw: &str) -> Option<Self> {
        let digits: String = raw
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits.as_str(), ""));
        if (whole.is_empty() && fraction.is_empty()) || fraction.contains('.') {
            return None;
        }

        let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
        let mut frac = fraction.bytes().map(|b| i64::from(b - b'0'));
        let cents = frac.next().unwrap_or(0) * 10 + frac.next().unwrap_or(0);
        let round_up = i64::from(frac.next().unwrap_or(0) >= 5);

        whole
            .checked_mul(100)?
            .checked_add(cents + round_up)
            .map(Cents)
    }

    pub fn checked_add(self, rhs: Cents) -> Option<Cents> {
        self.0.checked_add(rhs.0).map(Cents)
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// Two-digit years first: %Y would read "24" as the year 24
const DATE_FORMATS: [&str; 3] = ["%m/%d/%y", "%m/%d/%Y", "%Y-%m-%d"];
const DATETIME_FORMATS: [&str; 3] = ["%m/%d/%Y %H:%M:%S", "%Y-%m-%d %H:%M:%S", "%m/%d/%Y %H:%M"];

/// Parse a gift date; `None` when no known format fits
pub fn parse_gift_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
                .map(|dt| dt.date())
        })
}

/// Ordering key: numeric ids by value, then any others as text
pub fn id_order_key(id: &str) -> (bool, u64, String) {
    match id.trim().parse::<u64>() {
        Ok(n) => (false, n, id.to_string()),
        Err(_) => (true, 0, id.to_string()),
    }
}

// ============================================================================
// INPUT RECORDS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftRecord {
    pub constituent_id: String,
    pub addressee: String,
    pub salutation: String,
    pub address_lines: [String; 3],
    pub city: String,
    pub state: String,
    pub zip: String,
    pub gift_type: String,
    pub gift_subtype: String,
    pub amount: Option<Cents>,
    pub fund: String,
    pub date: Option<NaiveDate>,
    pub pay_method: String,
    pub installment_frequency: String,
}

impl GiftRecord {
    pub fn is_pledge(&self) -> bool {
        self.gift_type.trim() == "Pledge"
    }
}

/// Parse every row of a gift export
pub fn load_gifts(table: &Table) -> Result<Vec<GiftRecord>> {
    let idx = |name: &str| table.column(name);
    let (id, addressee, salutation) = (
        idx(columns::CONSTITUENT_ID)?,
        idx(columns::ADDRESSEE)?,
        idx(columns::SALUTATION)?,
    );
    let address = [
        idx(columns::ADDRESS_1)?,
        idx(columns::ADDRESS_2)?,
        idx(columns::ADDRESS_3)?,
    ];
    let (city, state, zip) = (idx(columns::CITY)?, idx(columns::STATE)?, idx(columns::ZIP)?);
    let (gift_type, gift_subtype, amount) = (
        idx(columns::GIFT_TYPE)?,
        idx(columns::GIFT_SUBTYPE)?,
        idx(columns::AMOUNT)?,
    );
    let (fund, date, pay_method, frequency) = (
        idx(columns::FUND)?,
        idx(columns::GIFT_DATE)?,
        idx(columns::PAY_METHOD)?,
        idx(columns::INSTALLMENT_FREQUENCY)?,
    );

    let mut gifts = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        let cell = |i: usize| row.get(i).cloned().unwrap_or_default();
        let gift = GiftRecord {
            constituent_id: cell(id),
            addressee: cell(addressee),
            salutation: cell(salutation),
            address_lines: [cell(address[0]), cell(address[1]), cell(address[2])],
            city: cell(city),
            state: cell(state),
            zip: cell(zip),
            gift_type: cell(gift_type),
            gift_subtype: cell(gift_subtype),
            amount: Cents::parse(&cell(amount)),
            fund: cell(fund),
            date: parse_gift_date(&cell(date)),
            pay_method: cell(pay_method),
            installment_frequency: cell(frequency),
        };
        if gift.amount.is_none() {
            let raw = cell(amount);
            if is_blank(&raw) {
                debug!("Gift for {} has no amount", gift.constituent_id);
            } else {
                warn!("Gift for {} has an unusable amount {:?}", gift.constituent_id, raw);
            }
        }
        gifts.push(gift);
    }
    Ok(gifts)
}

/// The slice of a cleaned household row the acknowledgment needs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanContact {
    pub id: String,
    pub addressee: String,
    pub salutation: String,
}

pub fn load_contacts(table: &Table) -> Result<Vec<CleanContact>> {
    let id = table.column(household_columns::ID)?;
    let addressee = table.column(household_columns::ADDRESSEE)?;
    let salutation = table.column(household_columns::SALUTATION)?;
    Ok(table
        .rows
        .iter()
        .map(|row| {
            let cell = |i: usize| row.get(i).cloned().unwrap_or_default();
            CleanContact {
                id: cell(id),
                addressee: cell(addressee),
                salutation: cell(salutation),
            }
        })
        .collect())
}

/// Ids qualifying for the membership column
#[derive(Debug, Clone, Default)]
pub struct Membership {
    ids: HashSet<String>,
}

impl Membership {
    pub fn from_table(table: &Table) -> Result<Self> {
        let id = table.column(columns::CONSTITUENT_ID)?;
        let ids = table
            .rows
            .iter()
            .filter_map(|row| row.get(id))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        Ok(Membership { ids })
    }

    pub fn from_ids<I: IntoIterator<Item = S>, S: Into<String>>(ids: I) -> Self {
        Membership {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id.trim())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

// ============================================================================
// RECONCILIATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingRecord {
    pub id: String,
    pub addressee: String,
}

/// Ids present on one side of the gift/household join but not the other
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// In the cleaned households, no gift
    pub missing_from_gifts: Vec<MissingRecord>,
    /// Gifted, but not in the cleaned households
    pub missing_from_households: Vec<MissingRecord>,
}

impl ReconciliationReport {
    pub fn is_reconciled(&self) -> bool {
        self.missing_from_gifts.is_empty() && self.missing_from_households.is_empty()
    }

    pub fn mismatch_count(&self) -> usize {
        self.missing_from_gifts.len() + self.missing_from_households.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} household records without gifts, {} gift records without a household",
            self.missing_from_gifts.len(),
            self.missing_from_households.len()
        )
    }
}

/// First addressee seen per id, in id order
fn missing(ids: &HashMap<&str, &str>, other: &HashMap<&str, &str>) -> Vec<MissingRecord> {
    let mut out: Vec<MissingRecord> = ids
        .iter()
        .filter(|(id, _)| !other.contains_key(*id))
        .map(|(id, addressee)| MissingRecord {
            id: id.to_string(),
            addressee: addressee.to_string(),
        })
        .collect();
    out.sort_by_key(|m| id_order_key(&m.id));
    out
}

/// Compare ids across both files, visitors excluded from each side
pub fn reconcile(contacts: &[CleanContact], gifts: &[GiftRecord], ack: &AckConfig) -> ReconciliationReport {
    let mut household_ids: HashMap<&str, &str> = HashMap::new();
    for c in contacts.iter().filter(|c| !ack.is_visitor(&c.addressee)) {
        household_ids.entry(c.id.as_str()).or_insert(c.addressee.as_str());
    }
    let mut gift_ids: HashMap<&str, &str> = HashMap::new();
    for g in gifts.iter().filter(|g| !ack.is_visitor(&g.addressee)) {
        gift_ids
            .entry(g.constituent_id.as_str())
            .or_insert(g.addressee.as_str());
    }

    let report = ReconciliationReport {
        missing_from_gifts: missing(&household_ids, &gift_ids),
        missing_from_households: missing(&gift_ids, &household_ids),
    };
    for m in &report.missing_from_gifts {
        warn!("In cleaned households but not in gifts: {} ({})", m.id, m.addressee);
    }
    for m in &report.missing_from_households {
        warn!("In gifts but not in cleaned households: {} ({})", m.id, m.addressee);
    }
    report
}

// ============================================================================
// AGGREGATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SummaryKind {
    Pledge,
    Gift,
}

impl SummaryKind {
    pub fn label(&self) -> &'static str {
        match self {
            SummaryKind::Pledge => "pledge",
            SummaryKind::Gift => "gift",
        }
    }
}

/// One acknowledgment row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftSummary {
    pub constituent_id: String,
    pub addressee: String,
    pub salutation: String,
    pub address_lines: [String; 3],
    pub city: String,
    pub state: String,
    pub zip: String,
    pub kind: SummaryKind,
    pub gift_subtype: String,
    pub amount: Cents,
    pub fund: String,
    pub latest_date: Option<NaiveDate>,
    pub pay_method: String,
    pub installment_frequency: String,
    /// `None` when membership was skipped
    pub member: Option<bool>,
}

pub struct GiftAggregator<'a> {
    config: &'a AckConfig,
}

impl<'a> GiftAggregator<'a> {
    pub fn new(config: &'a AckConfig) -> Self {
        GiftAggregator { config }
    }

    /// Group by (constituent, fund) and apply pledge precedence.
    ///
    /// Only ids with a cleaned household are summarized; the rest are left
    /// to the reconciliation report.
    pub fn aggregate(
        &self,
        contacts: &[CleanContact],
        gifts: &[GiftRecord],
        membership: Option<&Membership>,
    ) -> Vec<GiftSummary> {
        let mut first_contact: HashMap<&str, &CleanContact> = HashMap::new();
        for c in contacts {
            first_contact.entry(c.id.as_str()).or_insert(c);
        }

        let mut groups: BTreeMap<((bool, u64, String), String), Vec<&GiftRecord>> = BTreeMap::new();
        let (mut visitors, mut unmatched) = (0, 0);
        for gift in gifts {
            if self.config.is_visitor(&gift.addressee) {
                visitors += 1;
                continue;
            }
            if !first_contact.contains_key(gift.constituent_id.as_str()) {
                unmatched += 1;
                continue;
            }
            groups
                .entry((id_order_key(&gift.constituent_id), gift.fund.clone()))
                .or_default()
                .push(gift);
        }
        if visitors > 0 {
            debug!("Excluded {} visitor gifts", visitors);
        }
        if unmatched > 0 {
            info!("Left out {} gifts with no cleaned household", unmatched);
        }

        groups
            .into_values()
            .filter_map(|group| {
                let first = *group.first()?;
                let contact = first_contact.get(first.constituent_id.as_str());
                Some(self.summarize(first, &group, contact.copied(), membership))
            })
            .collect()
    }

    fn summarize(
        &self,
        first: &GiftRecord,
        group: &[&GiftRecord],
        contact: Option<&CleanContact>,
        membership: Option<&Membership>,
    ) -> GiftSummary {
        let has_pledge = group.iter().any(|g| g.is_pledge());
        let selected: Vec<&GiftRecord> = group
            .iter()
            .copied()
            .filter(|g| !has_pledge || g.is_pledge())
            .collect();

        let mut amount = Cents::default();
        for value in selected.iter().filter_map(|g| g.amount) {
            match amount.checked_add(value) {
                Some(total) => amount = total,
                None => warn!(
                    "Total for {} / {} overflows; left out an amount of {}",
                    first.constituent_id, first.fund, value
                ),
            }
        }
        let latest_date = selected.iter().filter_map(|g| g.date).max();

        let pick = |clean: Option<&String>, own: &String| match clean {
            Some(v) if !is_blank(v) => v.clone(),
            _ => own.clone(),
        };

        GiftSummary {
            constituent_id: first.constituent_id.clone(),
            addressee: pick(contact.map(|c| &c.addressee), &first.addressee),
            salutation: pick(contact.map(|c| &c.salutation), &first.salutation),
            address_lines: first.address_lines.clone(),
            city: first.city.clone(),
            state: first.state.clone(),
            zip: first.zip.clone(),
            kind: if has_pledge {
                SummaryKind::Pledge
            } else {
                SummaryKind::Gift
            },
            gift_subtype: first.gift_subtype.clone(),
            amount,
            fund: first.fund.clone(),
            latest_date,
            pay_method: first.pay_method.clone(),
            installment_frequency: first.installment_frequency.clone(),
            member: membership.map(|m| m.contains(&first.constituent_id)),
        }
    }

    /// Summary rows in the fixed column order
    pub fn to_table(&self, summaries: &[GiftSummary], with_membership: bool, template: &Table) -> Table {
        let mut headers: Vec<String> = columns::SUMMARY.iter().map(|h| h.to_string()).collect();
        if with_membership {
            headers.push(self.config.membership_label.clone());
        }

        let mut table = Table::new(headers, template.encoding, &template.source);
        for s in summaries {
            let mut row = vec![
                s.constituent_id.clone(),
                s.addressee.clone(),
                s.salutation.clone(),
                s.address_lines[0].clone(),
                s.address_lines[1].clone(),
                s.address_lines[2].clone(),
                s.city.clone(),
                s.state.clone(),
                s.zip.clone(),
                s.kind.label().to_string(),
                s.gift_subtype.clone(),
                s.amount.to_string(),
                s.fund.clone(),
                s.latest_date
                    .map(|d| d.format(&self.config.date_format).to_string())
                    .unwrap_or_default(),
                s.pay_method.clone(),
                s.installment_frequency.clone(),
            ];
            if with_membership {
                let member = s.member.unwrap_or(false);
                row.push(if member {
                    self.config.membership_label.clone()
                } else {
                    String::new()
                });
            }
            table.rows.push(row);
        }
        table
    }
}

/// `"2024-03-01 Ack_complete.csv"`
pub fn summary_file_name(date: NaiveDate, label: &str) -> String {
    format!("{} {}_complete.csv", date.format("%Y-%m-%d"), label)
}

// ============================================================================
// RUN
// ============================================================================

/// Where the membership list comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipSource {
    File(PathBuf),
    /// Operator chose to continue without membership
    Skip,
    /// No file found and no decision made
    Missing,
}

#[derive(Debug, Clone)]
pub struct AckRun {
    pub output: PathBuf,
    pub summaries: Vec<GiftSummary>,
    pub reconciliation: ReconciliationReport,
}

/// Read both exports (and membership), reconcile, aggregate, write the summary
pub fn run_ack(
    gifts_path: &Path,
    clean_path: &Path,
    membership: &MembershipSource,
    out_dir: &Path,
    config: &AckConfig,
    today: NaiveDate,
) -> Result<AckRun> {
    let membership = match membership {
        MembershipSource::File(path) => Some(Membership::from_table(&Table::read(path)?)?),
        MembershipSource::Skip => {
            info!("Continuing without a membership list");
            None
        }
        MembershipSource::Missing => return Err(MergeError::missing(InputKind::Membership)),
    };

    let gift_table = Table::read(gifts_path)?;
    let gifts = load_gifts(&gift_table)?;
    let contacts = load_contacts(&Table::read(clean_path)?)?;
    info!(
        "Loaded {} gifts and {} cleaned households",
        gifts.len(),
        contacts.len()
    );

    let reconciliation = reconcile(&contacts, &gifts, config);
    if !reconciliation.is_reconciled() {
        warn!("{}", reconciliation.summary());
    }

    let aggregator = GiftAggregator::new(config);
    let summaries = aggregator.aggregate(&contacts, &gifts, membership.as_ref());
    let table = aggregator.to_table(&summaries, membership.is_some(), &gift_table);

    let output = out_dir.join(summary_file_name(today, &config.output_label));
    table.write(&output)?;
    info!("Wrote {} acknowledgment rows to {}", summaries.len(), output.display());

    Ok(AckRun {
        output,
        summaries,
        reconciliation,
    })
}
