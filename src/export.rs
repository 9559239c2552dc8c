// 📄 Tabular Exports - CSV in, CSV out, same encoding both ways
// CRM exports arrive as UTF-8 or as a legacy single-byte code page. The
// encoding is found by trial and remembered so the output matches the input.

use crate::error::{MergeError, Result};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

// ============================================================================
// ENCODING TRIAL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextEncoding {
    Utf8,
    /// ISO-8859-1, decoded with the Windows-1252 superset
    Latin1,
}

impl TextEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Latin1 => "ISO-8859-1",
        }
    }
}

/// Decode as UTF-8, falling back to Latin-1 when the bytes are not valid UTF-8
pub fn decode(bytes: Vec<u8>, path: &Path) -> Result<(String, TextEncoding)> {
    match String::from_utf8(bytes) {
        Ok(mut text) => {
            if text.starts_with('\u{feff}') {
                text.drain(..'\u{feff}'.len_utf8());
            }
            Ok((text, TextEncoding::Utf8))
        }
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, had_errors) = encoding_rs::WINDOWS_1252
                .decode_without_bom_handling(&bytes);
            if had_errors {
                return Err(MergeError::Encoding {
                    path: path.to_path_buf(),
                    detail: "not valid UTF-8 or ISO-8859-1".to_string(),
                });
            }
            debug!("{} is not UTF-8, decoded as ISO-8859-1", path.display());
            Ok((decoded.into_owned(), TextEncoding::Latin1))
        }
    }
}

/// Encode text for writing in the encoding the input was read with
pub fn encode(text: &str, encoding: TextEncoding, path: &Path) -> Result<Vec<u8>> {
    match encoding {
        TextEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
        TextEncoding::Latin1 => {
            let (bytes, _, had_unmappable) = encoding_rs::WINDOWS_1252.encode(text);
            if had_unmappable {
                return Err(MergeError::Encoding {
                    path: path.to_path_buf(),
                    detail: "output contains characters outside ISO-8859-1".to_string(),
                });
            }
            Ok(bytes.into_owned())
        }
    }
}

// ============================================================================
// TABLE
// ============================================================================

/// A header row plus string cells, exactly as exported
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub encoding: TextEncoding,
    /// File name used in error messages
    pub source: String,
}

impl Table {
    pub fn new(headers: Vec<String>, encoding: TextEncoding, source: &str) -> Self {
        Table {
            headers,
            rows: Vec::new(),
            encoding,
            source: source.to_string(),
        }
    }

    /// Read a CSV export, trying UTF-8 then Latin-1
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let (text, encoding) = decode(bytes, path)?;
        let source = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown.csv");
        let table = Self::from_text(&text, encoding, source)?;
        debug!(
            "Read {} rows from {} ({})",
            table.rows.len(),
            source,
            encoding.name()
        );
        Ok(table)
    }

    pub fn from_text(text: &str, encoding: TextEncoding, source: &str) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
        let width = headers.len();
        let mut table = Table::new(headers, encoding, source);

        for result in reader.records() {
            let record = result?;
            let mut row: Vec<String> = record.iter().map(|f| f.to_string()).collect();
            if row.len() < width {
                row.resize(width, String::new());
            }
            table.rows.push(row);
        }

        Ok(table)
    }

    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Index of a required column
    pub fn column(&self, name: &str) -> Result<usize> {
        self.find_column(name).ok_or_else(|| MergeError::MissingColumn {
            file: self.source.clone(),
            column: name.to_string(),
        })
    }

    pub fn to_text(&self) -> Result<String> {
        let mut writer = WriterBuilder::new().flexible(true).from_writer(Vec::new());
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| MergeError::Io(e.into_error()))?;
        // Every cell came in as a String, so the buffer is valid UTF-8
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Write in the table's own encoding
    pub fn write(&self, path: &Path) -> Result<()> {
        let text = self.to_text()?;
        let bytes = encode(&text, self.encoding, path)?;
        fs::write(path, bytes)?;
        debug!("Wrote {} rows to {}", self.rows.len(), path.display());
        Ok(())
    }
}

/// `households_export.csv` → `households_export_clean.csv`
pub fn clean_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("export");
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}_clean.{}", stem, ext),
        None => format!("{}_clean", stem),
    };
    path.with_file_name(name)
}
