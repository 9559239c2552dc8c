// 📨 Mail Merge - One letter per summary row, combined in row order
//
// Each row renders to `merged_letter_<index>.txt`; the parts are then
// concatenated by row index (form-feed between letters) into the combined
// document. With a journal, a rerun of the same data and template reuses
// every part already on disk with a matching hash.

use crate::config::MergeConfig;
use crate::error::{MergeError, Result};
use crate::export::{decode, Table};
use crate::gifts::columns::CONSTITUENT_ID;
use crate::journal::{content_hash, run_fingerprint, Journal, MergedDocument};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Separates letters in the combined document
pub const PAGE_BREAK: char = '\u{000C}';

/// Field name → value for one record
pub type Fields = BTreeMap<String, String>;

/// Renders one personalized document from a record's fields
pub trait TemplateRenderer {
    fn render(&self, fields: &Fields) -> Result<String>;
}

// ============================================================================
// PLACEHOLDER TEMPLATE
// ============================================================================

/// Plain-text template with `«Column»` tokens
#[derive(Debug, Clone)]
pub struct PlaceholderTemplate {
    text: String,
    open: String,
    close: String,
}

impl PlaceholderTemplate {
    pub fn new(text: impl Into<String>, open: &str, close: &str) -> Self {
        PlaceholderTemplate {
            text: text.into(),
            open: open.to_string(),
            close: close.to_string(),
        }
    }

    pub fn from_file(path: &Path, config: &MergeConfig) -> Result<Self> {
        if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("docx"))
        {
            return Err(MergeError::Template(format!(
                "{}: save the letter template as plain text",
                path.display()
            )));
        }
        let (text, _) = decode(fs::read(path)?, path)?;
        Ok(Self::new(text, &config.placeholder_open, &config.placeholder_close))
    }

    /// Placeholder names in order of appearance
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names = Vec::new();
        let mut rest = self.text.as_str();
        while let Some(start) = rest.find(&self.open) {
            let after = &rest[start + self.open.len()..];
            let Some(end) = after.find(&self.close) else {
                break;
            };
            names.push(&after[..end]);
            rest = &after[end + self.close.len()..];
        }
        names
    }
}

impl TemplateRenderer for PlaceholderTemplate {
    /// Unknown tokens are left as written
    fn render(&self, fields: &Fields) -> Result<String> {
        let mut out = String::with_capacity(self.text.len());
        let mut rest = self.text.as_str();

        while let Some(start) = rest.find(&self.open) {
            out.push_str(&rest[..start]);
            let after = &rest[start + self.open.len()..];
            let Some(end) = after.find(&self.close) else {
                // Unterminated token: copy the remainder verbatim
                out.push_str(&rest[start..]);
                return Ok(out);
            };

            let name = &after[..end];
            match fields.get(name) {
                Some(value) => out.push_str(value),
                None => out.push_str(&rest[start..start + self.open.len() + end + self.close.len()]),
            }
            rest = &after[end + self.close.len()..];
        }

        out.push_str(rest);
        Ok(out)
    }
}

// ============================================================================
// MAIL MERGE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub run: String,
    pub combined: PathBuf,
    pub documents: usize,
    /// Parts rendered and written this run
    pub written: usize,
    /// Parts reused from an earlier, interrupted run
    pub reused: usize,
}

pub struct MailMerge<'a> {
    out_dir: PathBuf,
    config: &'a MergeConfig,
    journal: Option<&'a Journal>,
}

/// `merged_letter_<index>.txt`
pub fn part_name(index: usize) -> String {
    format!("merged_letter_{}.txt", index)
}

fn row_fields(table: &Table, row: &[String]) -> Fields {
    table
        .headers
        .iter()
        .cloned()
        .zip(row.iter().cloned())
        .collect()
}

impl<'a> MailMerge<'a> {
    pub fn new(out_dir: &Path, config: &'a MergeConfig) -> Self {
        MailMerge {
            out_dir: out_dir.to_path_buf(),
            config,
            journal: None,
        }
    }

    pub fn with_journal(mut self, journal: &'a Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Read the data and template files, then merge
    pub fn run_files(&self, data_path: &Path, template_path: &Path) -> Result<MergeOutcome> {
        let data_bytes = fs::read(data_path)?;
        let template_bytes = fs::read(template_path)?;
        let run = run_fingerprint(&data_bytes, &template_bytes);

        let table = Table::read(data_path)?;
        let template = PlaceholderTemplate::from_file(template_path, self.config)?;
        for name in template.placeholders() {
            if table.find_column(name).is_none() {
                warn!("Template placeholder '{}' has no matching column", name);
            }
        }
        self.run(&run, &table, &template)
    }

    /// Render every row in order, then combine the parts
    pub fn run(&self, run: &str, data: &Table, renderer: &dyn TemplateRenderer) -> Result<MergeOutcome> {
        if data.rows.is_empty() {
            return Err(MergeError::Template(format!("{} has no rows to merge", data.source)));
        }
        fs::create_dir_all(&self.out_dir)?;

        let id_column = data.find_column(CONSTITUENT_ID);
        let mut parts = Vec::with_capacity(data.rows.len());
        let (mut written, mut reused) = (0, 0);

        for (index, row) in data.rows.iter().enumerate() {
            let path = self.out_dir.join(part_name(index));
            if self.reusable(run, index, &path)? {
                debug!("Reusing {}", path.display());
                reused += 1;
                parts.push(path);
                continue;
            }

            let letter = renderer.render(&row_fields(data, row))?;
            fs::write(&path, letter.as_bytes())?;
            written += 1;

            if let Some(journal) = self.journal {
                journal.record_document(&MergedDocument {
                    run: run.to_string(),
                    row_index: index,
                    constituent_id: id_column
                        .and_then(|i| row.get(i))
                        .cloned()
                        .unwrap_or_default(),
                    content_hash: content_hash(letter.as_bytes()),
                    path: path.display().to_string(),
                })?;
            }
            parts.push(path);
        }

        let combined = self.out_dir.join(&self.config.combined_name);
        self.combine(&parts, &combined)?;
        info!(
            "Merged {} letters into {} ({} reused)",
            parts.len(),
            combined.display(),
            reused
        );

        if self.config.remove_parts {
            for part in &parts {
                fs::remove_file(part)?;
            }
        }

        if let Some(journal) = self.journal {
            journal.log_merge(run, written, reused, &combined.display().to_string())?;
        }

        Ok(MergeOutcome {
            run: run.to_string(),
            combined,
            documents: parts.len(),
            written,
            reused,
        })
    }

    /// Part on disk whose hash matches the journal entry
    fn reusable(&self, run: &str, index: usize, path: &Path) -> Result<bool> {
        let Some(journal) = self.journal else {
            return Ok(false);
        };
        let Some(entry) = journal.document(run, index)? else {
            return Ok(false);
        };
        if !path.exists() {
            return Ok(false);
        }
        Ok(content_hash(&fs::read(path)?) == entry.content_hash)
    }

    fn combine(&self, parts: &[PathBuf], combined: &Path) -> Result<()> {
        let mut out = String::new();
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                out.push(PAGE_BREAK);
            }
            let bytes = fs::read(part)?;
            let text = String::from_utf8(bytes).map_err(|_| MergeError::Encoding {
                path: part.clone(),
                detail: "merged letter is not UTF-8".to_string(),
            })?;
            out.push_str(&text);
        }
        fs::write(combined, out)?;
        Ok(())
    }
}
