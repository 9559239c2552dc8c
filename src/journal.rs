// 📓 Run Journal - SQLite record of merged documents and run outcomes
//
// Two tables:
//   merged_documents: one row per written letter, keyed by (run, row_index),
//                     so an interrupted merge can resume where it stopped
//   step_events:      append-only log of what each step found per input

use crate::error::Result;
use crate::gifts::ReconciliationReport;
use crate::labels::CleanReport;
use crate::validator::ValidationReport;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::debug;

/// Hex SHA-256 of `bytes`
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Identifies a merge run: same data and template, same fingerprint
pub fn run_fingerprint(data: &[u8], template: &[u8]) -> String {
    let mut hasher = Sha256::new();
    // Length prefixes keep ("ab", "c") and ("a", "bc") apart
    hasher.update((data.len() as u64).to_le_bytes());
    hasher.update(data);
    hasher.update((template.len() as u64).to_le_bytes());
    hasher.update(template);
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// RECORDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedDocument {
    pub run: String,
    pub row_index: usize,
    pub constituent_id: String,
    pub content_hash: String,
    pub path: String,
}

/// Pipeline step an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    Validate,
    Clean,
    Reconcile,
    Merge,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Validate => "validate",
            Step::Clean => "clean",
            Step::Reconcile => "reconcile",
            Step::Merge => "merge",
        }
    }

    pub fn parse(raw: &str) -> Option<Step> {
        [Step::Validate, Step::Clean, Step::Reconcile, Step::Merge]
            .into_iter()
            .find(|s| s.as_str() == raw)
    }
}

/// What one step found for one input (an export file or a merge run)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub id: String,
    pub recorded_at: DateTime<Utc>,
    pub step: Step,
    pub source: String,
    pub data: serde_json::Value,
}

impl Event {
    pub fn new(step: Step, source: &str, data: serde_json::Value) -> Self {
        Event {
            id: uuid::Uuid::new_v4().to_string(),
            recorded_at: Utc::now(),
            step,
            source: source.to_string(),
            data,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown step {0:?}")]
struct UnknownStep(String);

fn conversion_error<E>(column: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e))
}

// ============================================================================
// JOURNAL
// ============================================================================

pub struct Journal {
    conn: Connection,
}

impl Journal {
    pub fn open(path: &Path) -> Result<Self> {
        let journal = Journal {
            conn: Connection::open(path)?,
        };
        journal.setup()?;
        debug!("Opened journal {}", path.display());
        Ok(journal)
    }

    pub fn open_in_memory() -> Result<Self> {
        let journal = Journal {
            conn: Connection::open_in_memory()?,
        };
        journal.setup()?;
        Ok(journal)
    }

    fn setup(&self) -> Result<()> {
        // WAL for crash recovery (in-memory databases report "memory")
        let _mode: String = self
            .conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS merged_documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run TEXT NOT NULL,
                row_index INTEGER NOT NULL,
                constituent_id TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                path TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(run, row_index)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS step_events (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT UNIQUE NOT NULL,
                recorded_at TEXT NOT NULL,
                step TEXT NOT NULL,
                source TEXT NOT NULL,
                data TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_step_events_source ON step_events(source)",
            [],
        )?;

        Ok(())
    }

    // ------------------------------------------------------------------------
    // Merged documents
    // ------------------------------------------------------------------------

    /// Insert or replace the entry for `(run, row_index)`
    pub fn record_document(&self, doc: &MergedDocument) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO merged_documents (
                run, row_index, constituent_id, content_hash, path
            ) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                doc.run,
                doc.row_index as i64,
                doc.constituent_id,
                doc.content_hash,
                doc.path,
            ],
        )?;
        Ok(())
    }

    pub fn document(&self, run: &str, row_index: usize) -> Result<Option<MergedDocument>> {
        let doc = self
            .conn
            .query_row(
                "SELECT run, row_index, constituent_id, content_hash, path
                 FROM merged_documents WHERE run = ?1 AND row_index = ?2",
                params![run, row_index as i64],
                |row| {
                    let index: i64 = row.get(1)?;
                    Ok(MergedDocument {
                        run: row.get(0)?,
                        row_index: index as usize,
                        constituent_id: row.get(2)?,
                        content_hash: row.get(3)?,
                        path: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(doc)
    }

    /// Every document of a run, in row order
    pub fn documents(&self, run: &str) -> Result<Vec<MergedDocument>> {
        let mut stmt = self.conn.prepare(
            "SELECT run, row_index, constituent_id, content_hash, path
             FROM merged_documents WHERE run = ?1 ORDER BY row_index",
        )?;
        let docs = stmt
            .query_map(params![run], |row| {
                let index: i64 = row.get(1)?;
                Ok(MergedDocument {
                    run: row.get(0)?,
                    row_index: index as usize,
                    constituent_id: row.get(2)?,
                    content_hash: row.get(3)?,
                    path: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(docs)
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    pub fn insert_event(&self, event: &Event) -> Result<()> {
        self.conn.execute(
            "INSERT INTO step_events (id, recorded_at, step, source, data)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event.id,
                event.recorded_at.to_rfc3339(),
                event.step.as_str(),
                event.source,
                serde_json::to_string(&event.data)?,
            ],
        )?;
        Ok(())
    }

    /// Everything recorded about `source`, oldest first
    pub fn events_for(&self, source: &str) -> Result<Vec<Event>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, recorded_at, step, source, data
             FROM step_events WHERE source = ?1 ORDER BY seq",
        )?;

        let events = stmt
            .query_map(params![source], |row| {
                let recorded_at: String = row.get(1)?;
                let step: String = row.get(2)?;
                let data: String = row.get(4)?;
                Ok(Event {
                    id: row.get(0)?,
                    recorded_at: DateTime::parse_from_rfc3339(&recorded_at)
                        .map_err(|e| conversion_error(1, e))?
                        .with_timezone(&Utc),
                    step: Step::parse(&step).ok_or_else(|| conversion_error(2, UnknownStep(step)))?,
                    source: row.get(3)?,
                    data: serde_json::from_str(&data).map_err(|e| conversion_error(4, e))?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(events)
    }

    // ------------------------------------------------------------------------
    // Step outcomes
    // ------------------------------------------------------------------------

    pub fn log_validation(&self, source: &str, report: &ValidationReport) -> Result<()> {
        self.insert_event(&Event::new(
            Step::Validate,
            source,
            serde_json::json!({
                "records_checked": report.records_checked,
                "violations": report.violations,
            }),
        ))
    }

    pub fn log_clean(&self, source: &str, report: &CleanReport) -> Result<()> {
        let counts: serde_json::Map<String, serde_json::Value> = report
            .category_counts
            .iter()
            .map(|(c, n)| (c.code().to_string(), serde_json::json!(n)))
            .collect();
        self.insert_event(&Event::new(
            Step::Clean,
            source,
            serde_json::json!({
                "records": report.households.len(),
                "violations": report.validation.violations.len(),
                "fallthrough_count": report.fallthrough_count(),
                "fallthrough_ids": report.fallthrough_ids,
                "categories": counts,
            }),
        ))
    }

    pub fn log_reconciliation(&self, source: &str, report: &ReconciliationReport) -> Result<()> {
        self.insert_event(&Event::new(Step::Reconcile, source, serde_json::to_value(report)?))
    }

    pub fn log_merge(&self, run: &str, written: usize, reused: usize, combined: &str) -> Result<()> {
        self.insert_event(&Event::new(
            Step::Merge,
            run,
            serde_json::json!({
                "written": written,
                "reused": reused,
                "combined": combined,
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gifts::MissingRecord;

    fn doc(run: &str, index: usize, hash: &str) -> MergedDocument {
        MergedDocument {
            run: run.to_string(),
            row_index: index,
            constituent_id: format!("{}", 100 + index),
            content_hash: hash.to_string(),
            path: format!("merged_letter_{}.txt", index),
        }
    }

    #[test]
    fn test_fingerprint_depends_on_both_inputs() {
        let a = run_fingerprint(b"data", b"template");
        assert_eq!(a, run_fingerprint(b"data", b"template"));
        assert_ne!(a, run_fingerprint(b"data", b"template2"));
        assert_ne!(run_fingerprint(b"ab", b"c"), run_fingerprint(b"a", b"bc"));
        assert_eq!(content_hash(b"").len(), 64);
    }

    #[test]
    fn test_documents_resume_lookup() {
        let journal = Journal::open_in_memory().unwrap();
        journal.record_document(&doc("run1", 1, "h1")).unwrap();
        journal.record_document(&doc("run1", 0, "h0")).unwrap();
        journal.record_document(&doc("run2", 0, "x")).unwrap();

        let found = journal.document("run1", 1).unwrap().unwrap();
        assert_eq!(found.content_hash, "h1");
        assert_eq!(found.constituent_id, "101");
        assert!(journal.document("run1", 5).unwrap().is_none());

        let all = journal.documents("run1").unwrap();
        assert_eq!(all.iter().map(|d| d.row_index).collect::<Vec<_>>(), vec![0, 1]);

        // Rewriting a row replaces its entry
        journal.record_document(&doc("run1", 1, "h1b")).unwrap();
        assert_eq!(journal.documents("run1").unwrap().len(), 2);
        assert_eq!(journal.document("run1", 1).unwrap().unwrap().content_hash, "h1b");
    }

    #[test]
    fn test_event_log() {
        let journal = Journal::open_in_memory().unwrap();

        let event = Event::new(
            Step::Validate,
            "spring_export.csv",
            serde_json::json!({"records_checked": 3}),
        );
        journal.insert_event(&event).unwrap();

        let report = ReconciliationReport {
            missing_from_gifts: vec![MissingRecord {
                id: "1".to_string(),
                addressee: "Mr. A".to_string(),
            }],
            missing_from_households: Vec::new(),
        };
        journal.log_reconciliation("spring_mail.csv", &report).unwrap();

        let events = journal.events_for("spring_export.csv").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].step, Step::Validate);
        assert_eq!(events[0].id, event.id);
        assert_eq!(events[0].data["records_checked"], 3);

        let events = journal.events_for("spring_mail.csv").unwrap();
        assert_eq!(events[0].step, Step::Reconcile);
        assert_eq!(events[0].data["missing_from_gifts"][0]["id"], "1");

        println!("✅ Event log test PASSED");
    }

    #[test]
    fn test_clean_outcome_logged() {
        let journal = Journal::open_in_memory().unwrap();
        let report = CleanReport {
            fallthrough_ids: vec!["42".to_string()],
            ..CleanReport::default()
        };
        journal.log_clean("x_export.csv", &report).unwrap();
        journal
            .log_validation("x_export.csv", &report.validation)
            .unwrap();

        let events = journal.events_for("x_export.csv").unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].step, Step::Clean);
        assert_eq!(events[0].data["fallthrough_count"], 1);
        assert_eq!(events[1].step, Step::Validate);
    }

    #[test]
    fn test_journal_file_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.db");
        {
            let journal = Journal::open(&path).unwrap();
            journal.record_document(&doc("r", 0, "h")).unwrap();
        }
        let journal = Journal::open(&path).unwrap();
        assert_eq!(journal.documents("r").unwrap().len(), 1);
    }
}
