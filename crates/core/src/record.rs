use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Ordered column → raw cell text mapping for one spreadsheet row.
///
/// Column order follows the header row of the source sheet.
pub type Fields = IndexMap<String, String>;

/// Unique record identifier, minted once per ingestion cycle.
pub type RecordId = Uuid;

/// Calendar-day partition key for the ledger (`YYYY-MM-DD`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    /// The local calendar day containing `now` at the given UTC offset.
    pub fn for_instant(now: DateTime<Utc>, offset: &FixedOffset) -> Self {
        Self(now.with_timezone(offset).date_naive())
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Date text as it appears in report subjects, e.g. `19-October-2025`.
    ///
    /// Day without zero padding, full English month name, four-digit year.
    pub fn subject_text(&self) -> String {
        self.0.format("%-d-%B-%Y").to_string()
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for DayKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Self)
            .map_err(|_| CoreError::InvalidDayKey(s.to_string()))
    }
}

/// Where a batch of records came from. Shared by every record of one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub subject: String,
    /// Attachment names joined with `", "`.
    pub file_name: String,
    pub message_date: DateTime<Utc>,
}

/// One normalized spreadsheet row (a "lead").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub fields: Fields,
    pub source_subject: String,
    pub source_file_name: String,
    pub message_date: DateTime<Utc>,
    pub observed_at: DateTime<Utc>,
    pub day_key: DayKey,
}

impl Record {
    pub fn new(
        fields: Fields,
        provenance: &Provenance,
        observed_at: DateTime<Utc>,
        day_key: DayKey,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            fields,
            source_subject: provenance.subject.clone(),
            source_file_name: provenance.file_name.clone(),
            message_date: provenance.message_date,
            observed_at,
            day_key,
        }
    }
}

/// A qualifying mailbox message whose tabular attachments were saved to scratch storage.
///
/// Lives for a single polling cycle. The scheduler deletes `attachment_paths`
/// once the attachments have been normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct MailMessage {
    pub subject: String,
    pub timestamp: DateTime<Utc>,
    pub sender: String,
    pub attachment_paths: Vec<PathBuf>,
    pub attachment_names: Vec<String>,
}

impl MailMessage {
    pub fn file_label(&self) -> String {
        self.attachment_names.join(", ")
    }

    pub fn provenance(&self) -> Provenance {
        Provenance {
            subject: self.subject.clone(),
            file_name: self.file_label(),
            message_date: self.timestamp,
        }
    }
}
