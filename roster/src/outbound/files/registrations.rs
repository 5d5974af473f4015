//! Late-registration and provisioning intake CSV files.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::ledger::parse_participants;
use super::{non_blank, read_text, run_blocking};
use crate::domain::ports::{IntakeRow, RegistrationSource, RegistrationSourceError};
use crate::domain::{DirectoryObjectId, ParticipantRecord};

#[derive(Debug, Deserialize)]
struct IntakeRowDto {
    #[serde(rename = "Email Address", default)]
    email: Option<String>,
    #[serde(rename = "First Name", default)]
    first_name: Option<String>,
    #[serde(rename = "Last Name", default)]
    last_name: Option<String>,
}

impl From<IntakeRowDto> for IntakeRow {
    fn from(dto: IntakeRowDto) -> Self {
        Self {
            email: non_blank(dto.email),
            first_name: non_blank(dto.first_name),
            last_name: non_blank(dto.last_name),
        }
    }
}

/// Registration files read from disk.
///
/// The late-registrations file shares the ledger's `First Name,Email` layout
/// and reads as empty when absent. The intake file carries `Email Address`,
/// `First Name` and `Last Name` columns and must exist.
#[derive(Debug, Clone)]
pub struct CsvRegistrationSource {
    late_registrations_path: PathBuf,
    intake_path: PathBuf,
}

impl CsvRegistrationSource {
    /// Source over the two registration files.
    pub fn new(late_registrations_path: impl Into<PathBuf>, intake_path: impl Into<PathBuf>) -> Self {
        Self {
            late_registrations_path: late_registrations_path.into(),
            intake_path: intake_path.into(),
        }
    }
}

#[async_trait]
impl RegistrationSource for CsvRegistrationSource {
    async fn late_registrations(&self) -> Result<Vec<ParticipantRecord>, RegistrationSourceError> {
        let Some(text) = read_source(&self.late_registrations_path).await? else {
            debug!(
                file = %self.late_registrations_path.display(),
                "no late registrations file"
            );
            return Ok(Vec::new());
        };
        parse_participants(&text, &self.late_registrations_path).map_err(|error| {
            RegistrationSourceError::decode(format!(
                "{}: {error}",
                self.late_registrations_path.display()
            ))
        })
    }

    async fn intake_rows(&self) -> Result<Vec<IntakeRow>, RegistrationSourceError> {
        let text = read_source(&self.intake_path).await?.ok_or_else(|| {
            RegistrationSourceError::read(format!(
                "{}: file not found",
                self.intake_path.display()
            ))
        })?;
        parse_intake(&text).map_err(|error| {
            RegistrationSourceError::decode(format!("{}: {error}", self.intake_path.display()))
        })
    }
}

async fn read_source(path: &Path) -> Result<Option<String>, RegistrationSourceError> {
    let owned = path.to_path_buf();
    run_blocking(move || read_text(&owned))
        .await
        .map_err(|error| RegistrationSourceError::read(format!("{}: {error}", path.display())))
}

fn parse_intake(text: &str) -> Result<Vec<IntakeRow>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());
    reader
        .deserialize::<IntakeRowDto>()
        .map(|row| row.map(IntakeRow::from))
        .collect()
}

/// Read directory user ids, one per line. Blank lines are ignored.
///
/// # Errors
///
/// Returns [`RegistrationSourceError::Read`] when the file is missing or
/// unreadable and [`RegistrationSourceError::Decode`] for a line that is not a
/// usable id.
pub async fn read_user_ids(path: &Path) -> Result<Vec<DirectoryObjectId>, RegistrationSourceError> {
    let text = read_source(path).await?.ok_or_else(|| {
        RegistrationSourceError::read(format!("{}: file not found", path.display()))
    })?;
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            DirectoryObjectId::parse(line).map_err(|error| {
                RegistrationSourceError::decode(format!("{}: {error}", path.display()))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    //! Registration file parsing against temporary files.

    use super::*;
    use tempfile::TempDir;

    fn write(temp: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = temp.path().join(name);
        std::fs::write(&path, contents).expect("write fixture");
        path
    }

    #[tokio::test]
    async fn absent_late_registrations_read_empty() {
        let temp = TempDir::new().expect("temp dir");
        let source = CsvRegistrationSource::new(
            temp.path().join("subscriberShorts.csv"),
            temp.path().join("registered.csv"),
        );

        assert!(source.late_registrations().await.expect("read").is_empty());
    }

    #[tokio::test]
    async fn absent_intake_is_a_read_error() {
        let temp = TempDir::new().expect("temp dir");
        let source = CsvRegistrationSource::new(
            temp.path().join("subscriberShorts.csv"),
            temp.path().join("registered.csv"),
        );

        let error = source.intake_rows().await.expect_err("intake must exist");
        assert!(matches!(error, RegistrationSourceError::Read { .. }));
    }

    #[tokio::test]
    async fn reads_intake_rows_with_optional_columns() {
        let temp = TempDir::new().expect("temp dir");
        let intake = write(
            &temp,
            "registered.csv",
            "Email Address,First Name,Last Name\nann@x.com,Ann,B\n,Bo,\ncy@x.com,Cy\n",
        );
        let source = CsvRegistrationSource::new(temp.path().join("late.csv"), intake);

        let rows = source.intake_rows().await.expect("rows");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].email.as_deref(), Some("ann@x.com"));
        assert_eq!(rows[0].last_name.as_deref(), Some("B"));
        assert_eq!(rows[1].email, None);
        assert_eq!(rows[2].last_name, None);
    }

    #[tokio::test]
    async fn reads_user_ids_skipping_blank_lines() {
        let temp = TempDir::new().expect("temp dir");
        let path = write(&temp, "ids.txt", "u-1\n\n  u-2  \n");

        let ids = read_user_ids(&path).await.expect("ids");
        let ids = ids.iter().map(DirectoryObjectId::as_str).collect::<Vec<_>>();
        assert_eq!(ids, ["u-1", "u-2"]);
    }
}
