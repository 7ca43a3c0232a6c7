//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings so that text order
//! equals time order. Enums are stored as their lowercase names. UUIDs are
//! stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use tally_core::{
  entry::{EntryKind, LedgerEntry},
  job::{Assignee, Job, JobStatus},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── JobStatus ────────────────────────────────────────────────────────────────

pub fn encode_status(s: JobStatus) -> &'static str {
  match s {
    JobStatus::Active => "active",
    JobStatus::Completed => "completed",
    JobStatus::Archived => "archived",
  }
}

pub fn decode_status(s: &str) -> Result<JobStatus> {
  match s {
    "active" => Ok(JobStatus::Active),
    "completed" => Ok(JobStatus::Completed),
    "archived" => Ok(JobStatus::Archived),
    other => Err(Error::Decode(format!("unknown job status: {other:?}"))),
  }
}

// ─── Assignee ─────────────────────────────────────────────────────────────────

pub fn encode_assignee(a: Assignee) -> &'static str { a.as_str() }

pub fn decode_assignee(s: &str) -> Result<Assignee> {
  Assignee::ALL
    .into_iter()
    .find(|a| a.as_str() == s)
    .ok_or_else(|| Error::Decode(format!("unknown assignee: {s:?}")))
}

// ─── EntryKind ────────────────────────────────────────────────────────────────

pub fn encode_kind(k: EntryKind) -> &'static str {
  match k {
    EntryKind::Production => "production",
    EntryKind::Delivery => "delivery",
  }
}

pub fn decode_kind(s: &str) -> Result<EntryKind> {
  match s {
    "production" => Ok(EntryKind::Production),
    "delivery" => Ok(EntryKind::Delivery),
    other => Err(Error::Decode(format!("unknown entry kind: {other:?}"))),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawJob::from_row`].
pub const JOB_COLUMNS: &str = "job_id, name, parts_needed, parts_produced, \
  parts_overproduced, delivered, notes, archived, status, assignee, \
  created_at, updated_at";

/// Column list matching [`RawEntry::from_row`].
pub const ENTRY_COLUMNS: &str =
  "entry_id, job_id, delta, kind, created_at, updated_by, note";

/// Raw values read directly from, or about to be written to, a `jobs` row.
pub struct RawJob {
  pub job_id:             String,
  pub name:               String,
  pub parts_needed:       i64,
  pub parts_produced:     i64,
  pub parts_overproduced: i64,
  pub delivered:          i64,
  pub notes:              Option<String>,
  pub archived:           bool,
  pub status:             String,
  pub assignee:           String,
  pub created_at:         String,
  pub updated_at:         String,
}

impl RawJob {
  pub fn from_job(job: &Job) -> Self {
    Self {
      job_id:             encode_uuid(job.job_id),
      name:               job.name.clone(),
      parts_needed:       job.parts_needed,
      parts_produced:     job.parts_produced,
      parts_overproduced: job.parts_overproduced,
      delivered:          job.delivered,
      notes:              job.notes.clone(),
      archived:           job.archived,
      status:             encode_status(job.status).to_owned(),
      assignee:           encode_assignee(job.assignee).to_owned(),
      created_at:         encode_dt(job.created_at),
      updated_at:         encode_dt(job.updated_at),
    }
  }

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      job_id:             row.get(0)?,
      name:               row.get(1)?,
      parts_needed:       row.get(2)?,
      parts_produced:     row.get(3)?,
      parts_overproduced: row.get(4)?,
      delivered:          row.get(5)?,
      notes:              row.get(6)?,
      archived:           row.get(7)?,
      status:             row.get(8)?,
      assignee:           row.get(9)?,
      created_at:         row.get(10)?,
      updated_at:         row.get(11)?,
    })
  }

  pub fn into_job(self) -> Result<Job> {
    Ok(Job {
      job_id:             decode_uuid(&self.job_id)?,
      name:               self.name,
      parts_needed:       self.parts_needed,
      parts_produced:     self.parts_produced,
      parts_overproduced: self.parts_overproduced,
      delivered:          self.delivered,
      notes:              self.notes,
      archived:           self.archived,
      status:             decode_status(&self.status)?,
      assignee:           decode_assignee(&self.assignee)?,
      created_at:         decode_dt(&self.created_at)?,
      updated_at:         decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from a `job_entries` row.
pub struct RawEntry {
  pub entry_id:   String,
  pub job_id:     String,
  pub delta:      i64,
  pub kind:       String,
  pub created_at: String,
  pub updated_by: Option<String>,
  pub note:       Option<String>,
}

impl RawEntry {
  pub fn from_entry(entry: &LedgerEntry) -> Self {
    Self {
      entry_id:   encode_uuid(entry.entry_id),
      job_id:     encode_uuid(entry.job_id),
      delta:      entry.delta,
      kind:       encode_kind(entry.kind).to_owned(),
      created_at: encode_dt(entry.created_at),
      updated_by: entry.updated_by.clone(),
      note:       entry.note.clone(),
    }
  }

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      entry_id:   row.get(0)?,
      job_id:     row.get(1)?,
      delta:      row.get(2)?,
      kind:       row.get(3)?,
      created_at: row.get(4)?,
      updated_by: row.get(5)?,
      note:       row.get(6)?,
    })
  }

  pub fn into_entry(self) -> Result<LedgerEntry> {
    Ok(LedgerEntry {
      entry_id:   decode_uuid(&self.entry_id)?,
      job_id:     decode_uuid(&self.job_id)?,
      delta:      self.delta,
      kind:       decode_kind(&self.kind)?,
      created_at: decode_dt(&self.created_at)?,
      updated_by: self.updated_by,
      note:       self.note,
    })
  }
}
