//! Payload wire formats: JSON (primary) and RFC4180 CSV (interchange).
//!
//! Records inside an export payload are plaintext — the envelope seal is
//! the protection layer, not per-field encryption.

use crate::{ExportError, ExportResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Column order of the CSV wire format. Fixed: part of the file format.
const CSV_HEADER: &str = "service,username,secret,notes,details";

/// A record as it travels inside an export payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortableRecord {
    /// Present when the record originated in a vault; absent for CSV
    /// imports from other tools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub service: String,
    pub username: String,
    /// Plaintext secret; the envelope seal protects it at rest.
    #[serde(default)]
    pub secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Structured sensitive payload, shape-agnostic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl PortableRecord {
    pub fn new(service: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: None,
            service: service.into(),
            username: username.into(),
            secret: String::new(),
            notes: None,
            details: None,
        }
    }
}

// ============================================================================
// JSON payload
// ============================================================================

pub(crate) fn to_json_payload(records: &[PortableRecord]) -> ExportResult<Vec<u8>> {
    serde_json::to_vec(records).map_err(|e| ExportError::Serialization(e.to_string()))
}

// ============================================================================
// CSV payload (RFC4180)
// ============================================================================

pub(crate) fn to_csv_payload(records: &[PortableRecord]) -> ExportResult<Vec<u8>> {
    let mut out = String::from(CSV_HEADER);
    out.push_str("\r\n");

    for record in records {
        let details = match &record.details {
            Some(value) => serde_json::to_string(value)
                .map_err(|e| ExportError::Serialization(e.to_string()))?,
            None => String::new(),
        };
        let row = [
            record.service.as_str(),
            record.username.as_str(),
            record.secret.as_str(),
            record.notes.as_deref().unwrap_or(""),
            details.as_str(),
        ]
        .map(escape_csv_field)
        .join(",");
        out.push_str(&row);
        out.push_str("\r\n");
    }

    Ok(out.into_bytes())
}

/// Parses a payload: JSON first, CSV as the fallback format.
pub(crate) fn from_payload(payload: &[u8]) -> ExportResult<Vec<PortableRecord>> {
    if let Ok(records) = serde_json::from_slice::<Vec<PortableRecord>>(payload) {
        return Ok(records);
    }

    let text = std::str::from_utf8(payload)
        .map_err(|_| ExportError::UnsupportedFormat("payload is neither JSON nor CSV".into()))?;
    from_csv_text(text)
}

fn from_csv_text(text: &str) -> ExportResult<Vec<PortableRecord>> {
    let mut rows = parse_csv(text)?.into_iter();

    let header = rows
        .next()
        .ok_or_else(|| ExportError::UnsupportedFormat("empty CSV payload".into()))?;
    if header.join(",") != CSV_HEADER {
        return Err(ExportError::UnsupportedFormat(
            "payload is neither JSON nor CSV".into(),
        ));
    }

    let mut records = Vec::new();
    for row in rows {
        if row.len() != 5 {
            return Err(ExportError::UnsupportedFormat(format!(
                "CSV row has {} columns, expected 5",
                row.len()
            )));
        }
        let [service, username, secret, notes, details]: [String; 5] =
            row.try_into().expect("length checked above");

        let details = if details.is_empty() {
            None
        } else {
            Some(
                serde_json::from_str(&details)
                    .map_err(|e| ExportError::Serialization(format!("details column: {e}")))?,
            )
        };

        records.push(PortableRecord {
            id: None,
            service,
            username,
            secret,
            notes: if notes.is_empty() { None } else { Some(notes) },
            details,
        });
    }
    Ok(records)
}

/// Quotes a field when it contains a comma, quote, or line break; embedded
/// quotes are doubled.
fn escape_csv_field(field: &str) -> String {
    if field.contains(['"', ',', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Minimal RFC4180 parser: quoted fields may contain commas, doubled
/// quotes, and line breaks; rows end at CRLF or bare LF.
fn parse_csv(text: &str) -> ExportResult<Vec<Vec<String>>> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut quoted_field = false;

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() && !quoted_field => {
                in_quotes = true;
                quoted_field = true;
            }
            ',' => {
                row.push(std::mem::take(&mut field));
                quoted_field = false;
            }
            '\r' | '\n' => {
                if c == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                row.push(std::mem::take(&mut field));
                quoted_field = false;
                rows.push(std::mem::take(&mut row));
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(ExportError::UnsupportedFormat(
            "unterminated quoted CSV field".into(),
        ));
    }
    if !field.is_empty() || !row.is_empty() || quoted_field {
        row.push(field);
        rows.push(row);
    }

    // A trailing newline produces no phantom empty row by construction;
    // skip any fully blank lines between rows.
    Ok(rows
        .into_iter()
        .filter(|r| !(r.len() == 1 && r[0].is_empty()))
        .collect())
}
