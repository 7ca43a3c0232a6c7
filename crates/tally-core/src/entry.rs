//! Ledger entries: one production or delivery event against a job.
//!
//! Entries are append-only apart from two operations: their `delta` may be
//! corrected, and an entry may be removed outright. Both trigger a full
//! reconciliation of the owning job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::job::Job;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
  Production,
  Delivery,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
  pub entry_id:   Uuid,
  pub job_id:     Uuid,
  /// Always strictly positive.
  pub delta:      i64,
  pub kind:       EntryKind,
  /// Store-assigned; the only ordering key.
  pub created_at: DateTime<Utc>,
  pub updated_by: Option<String>,
  pub note:       Option<String>,
}

/// Input to [`crate::store::LedgerStore::append_entry`].
/// `entry_id` and `created_at` are always assigned by the store.
#[derive(Debug, Clone)]
pub struct NewEntry {
  pub job_id:     Uuid,
  pub kind:       EntryKind,
  pub delta:      i64,
  pub updated_by: Option<String>,
  pub note:       Option<String>,
}

impl NewEntry {
  pub fn production(job_id: Uuid, delta: i64) -> Self {
    Self::new(job_id, EntryKind::Production, delta)
  }

  pub fn delivery(job_id: Uuid, delta: i64) -> Self {
    Self::new(job_id, EntryKind::Delivery, delta)
  }

  fn new(job_id: Uuid, kind: EntryKind, delta: i64) -> Self {
    Self { job_id, kind, delta, updated_by: None, note: None }
  }

  pub fn updated_by(mut self, who: Option<String>) -> Self {
    self.updated_by = who;
    self
  }

  pub fn note(mut self, note: Option<String>) -> Self {
    self.note = note;
    self
  }

  /// Materialise the entry with store-assigned identity and timestamp.
  pub fn into_entry(self, created_at: DateTime<Utc>) -> LedgerEntry {
    LedgerEntry {
      entry_id: Uuid::new_v4(),
      job_id: self.job_id,
      delta: self.delta,
      kind: self.kind,
      created_at,
      updated_by: self.updated_by,
      note: self.note,
    }
  }
}

/// A job bundled with its ledger, newest entry first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobView {
  pub job:     Job,
  pub entries: Vec<LedgerEntry>,
}
