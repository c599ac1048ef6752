//! Record export.
//!
//! Writes the accumulated record in the `{ sheetName, data }` shape the
//! spreadsheet backend expects, plus an append-only CSV per template for
//! offline collection.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use super::session::ScanSession;

/// One finished record.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPayload {
    /// Template name, doubles as the target sheet name
    pub sheet_name: String,
    /// Field key → recognized or corrected value (unset fields absent)
    pub data: BTreeMap<String, String>,
    pub captured_at: DateTime<Local>,
}

impl RecordPayload {
    pub fn from_session(session: &ScanSession) -> Self {
        Self {
            sheet_name: session.template().name.clone(),
            data: session
                .results()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            captured_at: Local::now(),
        }
    }
}

/// Writes the record as pretty-printed JSON.
pub fn write_json(path: &Path, payload: &RecordPayload) -> Result<()> {
    let json = serde_json::to_string_pretty(payload).context("Failed to serialize record")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write record to {}", path.display()))?;
    Ok(())
}

/// Quotes a CSV field when it contains separators, quotes or newlines.
/// Amounts like `12,345` always need it.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn has_content(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    let file = File::open(path).context("Failed to open existing CSV")?;
    Ok(BufReader::new(file).lines().next().is_some())
}

/// Appends one row for the session's record.
///
/// Header (`timestamp` then field labels in template order) is written only
/// when the file is new or empty. Opened in append mode per write, so rows
/// already written survive a crash.
pub fn append_csv(path: &Path, session: &ScanSession) -> Result<()> {
    let needs_header = !has_content(path)?;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .context("Failed to open CSV for append")?;

    let ordered = session.ordered_results();

    if needs_header {
        let header: Vec<String> = std::iter::once("timestamp".to_string())
            .chain(ordered.iter().map(|(f, _)| csv_field(&f.label)))
            .collect();
        writeln!(file, "{}", header.join(",")).context("Failed to write CSV header")?;
    }

    let row: Vec<String> = std::iter::once(Local::now().format("%Y-%m-%dT%H:%M:%S").to_string())
        .chain(ordered.iter().map(|(_, v)| csv_field(v.unwrap_or(""))))
        .collect();
    writeln!(file, "{}", row.join(",")).context("Failed to write CSV row")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::AcquisitionMode;
    use crate::template::TemplateCatalog;
    use std::fs;
    use tempfile::tempdir;

    fn filled_session() -> ScanSession {
        let template = TemplateCatalog::builtin().get("支払明細").unwrap().clone();
        let mut session = ScanSession::new(template, AcquisitionMode::Static);
        session.set_result("no", "3").unwrap();
        session.set_result("kingaku", "¥12,345").unwrap();
        session
    }

    #[test]
    fn test_payload_shape() {
        let payload = RecordPayload::from_session(&filled_session());
        let json: serde_json::Value = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["sheetName"], "支払明細");
        assert_eq!(json["data"]["kingaku"], "¥12,345");
        assert!(json["data"].get("shishutsu_saki").is_none());
        assert!(json.get("capturedAt").is_some());
    }

    #[test]
    fn test_write_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("record.json");
        write_json(&path, &RecordPayload::from_session(&filled_session())).unwrap();

        let back: RecordPayload = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back.data.get("no").map(String::as_str), Some("3"));
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("12,345"), "\"12,345\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_append_csv_writes_header_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.csv");
        let session = filled_session();

        append_csv(&path, &session).unwrap();
        append_csv(&path, &session).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "timestamp,番号(No),金額,支出年月日,支出の目的,支出先名称");
        assert!(lines[1].ends_with(",3,\"¥12,345\",,,"));
    }

    #[test]
    fn test_append_csv_keeps_existing_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.csv");
        fs::write(&path, "existing header\n").unwrap();

        append_csv(&path, &filled_session()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("existing header\n"));
        assert_eq!(content.lines().count(), 2);
    }
}
