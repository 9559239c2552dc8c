// Donor Merge - Core Library
// Household salutations, gift acknowledgments and letter merge for CRM exports

pub mod error;
pub mod config;
pub mod export;
pub mod household;
pub mod validator;      // Title/gender gate
pub mod classifier;     // Normalization passes + category table
pub mod salutation;     // Category → addressee/salutation
pub mod labels;         // Clean pipeline (`_clean` export)
pub mod gifts;          // Acknowledgment summary
pub mod journal;        // SQLite merge journal + event log
pub mod merge;          // Template rendering + combined letters
pub mod discovery;

// Re-export commonly used types
pub use error::{InputKind, MergeError, Result};
pub use config::{AckConfig, AppConfig, ColumnConfig, MergeConfig, TitleConfig};
pub use export::{clean_path, Table, TextEncoding};
pub use household::{
    Gender, HouseholdColumns, HouseholdRecord, MaritalStatus, Person, Salutation,
    load_households,
};
pub use validator::{
    Party, TitleGenderValidator, TitleViolation, ValidationReport, ViolationKind,
};
pub use classifier::{
    Classification, Classifier, Disposition, NormalizedHousehold, RelationshipCategory,
};
pub use salutation::{render, render_informal};
pub use labels::{
    CleanOutcome, CleanReport, CleanRun, CleanedHousehold, ViolationPolicy,
    clean_export, clean_households, clean_table,
};
pub use gifts::{
    AckRun, Cents, CleanContact, GiftAggregator, GiftRecord, GiftSummary, Membership,
    MembershipSource, ReconciliationReport, SummaryKind,
    reconcile, run_ack,
};
pub use journal::{Event, Journal, MergedDocument, Step};
pub use merge::{MailMerge, MergeOutcome, PlaceholderTemplate, TemplateRenderer};
pub use discovery::{check_required, discover, Discovered};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
