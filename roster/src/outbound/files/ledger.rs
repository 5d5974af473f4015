//! Participant ledger stored as `First Name,Email` CSV.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use super::{append_text, non_blank, read_text, run_blocking};
use crate::domain::ports::{LedgerError, LedgerStorage};
use crate::domain::{EmailAddress, ParticipantRecord};

pub(super) const PARTICIPANT_HEADER: &str = "First Name,Email\n";

#[derive(Debug, Deserialize)]
struct ParticipantRowDto {
    #[serde(rename = "First Name", default)]
    first_name: Option<String>,
    #[serde(rename = "Email", default)]
    email: Option<String>,
}

/// Parse `First Name,Email` rows. Rows without an email are skipped with a
/// warning; a missing first name falls back to the unknown-participant name.
pub(super) fn parse_participants(
    text: &str,
    source: &Path,
) -> Result<Vec<ParticipantRecord>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut records = Vec::new();
    for (index, row) in reader.deserialize::<ParticipantRowDto>().enumerate() {
        let row = row?;
        let Some(email) = EmailAddress::from_optional(non_blank(row.email).as_deref()) else {
            warn!(file = %source.display(), row = index + 1, "skipping participant row without email");
            continue;
        };
        let first_name = non_blank(row.first_name).unwrap_or_else(|| {
            ParticipantRecord::from_display_name(None, email.clone()).first_name
        });
        records.push(ParticipantRecord { first_name, email });
    }
    Ok(records)
}

/// CSV-backed ledger storage.
#[derive(Debug, Clone)]
pub struct CsvLedger {
    path: PathBuf,
}

impl CsvLedger {
    /// Ledger stored at `path`. Nothing is touched until the first read or
    /// append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the ledger file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LedgerStorage for CsvLedger {
    async fn read_all(&self) -> Result<Vec<ParticipantRecord>, LedgerError> {
        let path = self.path.clone();
        let text = run_blocking(move || read_text(&path))
            .await
            .map_err(|error| LedgerError::read(format!("{}: {error}", self.path.display())))?;
        let Some(text) = text else {
            return Ok(Vec::new());
        };
        parse_participants(&text, &self.path)
            .map_err(|error| LedgerError::decode(format!("{}: {error}", self.path.display())))
    }

    async fn append(&self, record: &ParticipantRecord) -> Result<(), LedgerError> {
        let row = render_row(record)
            .map_err(|error| LedgerError::write(format!("{}: {error}", self.path.display())))?;
        let path = self.path.clone();
        run_blocking(move || append_text(&path, PARTICIPANT_HEADER, &row))
            .await
            .map_err(|error| LedgerError::write(format!("{}: {error}", self.path.display())))
    }
}

fn render_row(record: &ParticipantRecord) -> Result<String, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record([record.first_name.as_str(), record.email.as_str()])?;
    let bytes = writer
        .into_inner()
        .map_err(|error| csv::Error::from(error.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    //! Ledger round trips through a real file.

    use super::*;
    use tempfile::TempDir;

    fn record(first: &str, email: &str) -> ParticipantRecord {
        ParticipantRecord {
            first_name: first.to_owned(),
            email: EmailAddress::parse(email).expect("email"),
        }
    }

    #[tokio::test]
    async fn missing_ledger_reads_empty() {
        let temp = TempDir::new().expect("temp dir");
        let ledger = CsvLedger::new(temp.path().join("Participants.csv"));

        assert!(ledger.read_all().await.expect("read").is_empty());
    }

    #[tokio::test]
    async fn append_writes_header_then_rows() {
        let temp = TempDir::new().expect("temp dir");
        let ledger = CsvLedger::new(temp.path().join("data/Participants.csv"));

        ledger.append(&record("Ann", "ann@x.com")).await.expect("append");
        ledger
            .append(&record("Bo, Jr", "bo@x.com"))
            .await
            .expect("append");

        let text = std::fs::read_to_string(ledger.path()).expect("ledger text");
        assert_eq!(text, "First Name,Email\nAnn,ann@x.com\n\"Bo, Jr\",bo@x.com\n");
        let records = ledger.read_all().await.expect("read");
        assert_eq!(records, vec![record("Ann", "ann@x.com"), record("Bo, Jr", "bo@x.com")]);
    }

    #[test]
    fn skips_rows_without_email_and_defaults_first_name() {
        let text = "First Name,Email\nAnn,\n,cy@x.com\n  Dee , dee@x.com \n";
        let records = parse_participants(text, Path::new("ledger.csv")).expect("parse");

        assert_eq!(records, vec![record("Unknown", "cy@x.com"), record("Dee", "dee@x.com")]);
    }

    #[test]
    fn reorders_columns_by_header() {
        let text = "Email,First Name\nann@x.com,Ann\n";
        let records = parse_participants(text, Path::new("ledger.csv")).expect("parse");

        assert_eq!(records, vec![record("Ann", "ann@x.com")]);
    }
}
