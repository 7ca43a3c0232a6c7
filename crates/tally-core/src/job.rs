//! Jobs, the aggregate root of the ledger.
//!
//! A job carries a target quantity plus the derived counters that summarise
//! its ledger. The counters are a materialised view: they are only ever
//! written with the output of [`crate::reconcile`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::reconcile::Aggregate;

/// Upper bound on [`Job::notes`], counted in characters.
pub const MAX_NOTES_LEN: usize = 2000;

// ─── Assignee ────────────────────────────────────────────────────────────────

/// The people a job can be assigned to.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub enum Assignee {
  #[default]
  Samuil,
  Oleksii,
  Veselin,
}

impl Assignee {
  pub const ALL: [Assignee; 3] =
    [Assignee::Samuil, Assignee::Oleksii, Assignee::Veselin];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Samuil => "Samuil",
      Self::Oleksii => "Oleksii",
      Self::Veselin => "Veselin",
    }
  }
}

// ─── Status ──────────────────────────────────────────────────────────────────

/// Derived job status. Never set directly; see
/// [`crate::reconcile::derive_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
  Active,
  Completed,
  Archived,
}

// ─── Job ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
  pub job_id:             Uuid,
  pub name:               String,
  /// Target quantity; always at least 1.
  pub parts_needed:       i64,
  /// Production credited toward the target, `0..=parts_needed`.
  pub parts_produced:     i64,
  /// Production beyond the target.
  pub parts_overproduced: i64,
  /// Cumulative delivered quantity.
  pub delivered:          i64,
  pub notes:              Option<String>,
  pub archived:           bool,
  pub status:             JobStatus,
  pub assignee:           Assignee,
  pub created_at:         DateTime<Utc>,
  pub updated_at:         DateTime<Utc>,
}

impl Job {
  /// A fresh job with an empty ledger.
  pub fn new(input: NewJob, now: DateTime<Utc>) -> Self {
    Self {
      job_id: Uuid::new_v4(),
      name: input.name,
      parts_needed: input.parts_needed,
      parts_produced: 0,
      parts_overproduced: 0,
      delivered: 0,
      notes: None,
      archived: false,
      status: JobStatus::Active,
      assignee: input.assignee,
      created_at: now,
      updated_at: now,
    }
  }

  /// Everything produced so far, credited or not.
  pub fn total_produced(&self) -> i64 {
    self.parts_produced + self.parts_overproduced
  }

  /// How many more parts may be delivered before deliveries outrun
  /// production.
  pub fn available_to_deliver(&self) -> i64 {
    (self.total_produced() - self.delivered).max(0)
  }

  /// The derived fields currently stored on this job.
  pub fn aggregate(&self) -> Aggregate {
    Aggregate {
      parts_produced:     self.parts_produced,
      parts_overproduced: self.parts_overproduced,
      delivered:          self.delivered,
      status:             self.status,
    }
  }

  /// Overwrite the derived fields with freshly reconciled values.
  pub fn apply(&mut self, aggregate: &Aggregate) {
    self.parts_produced = aggregate.parts_produced;
    self.parts_overproduced = aggregate.parts_overproduced;
    self.delivered = aggregate.delivered;
    self.status = aggregate.status;
  }

  pub fn summary(&self) -> JobSummary {
    JobSummary {
      job_id:             self.job_id,
      name:               self.name.clone(),
      parts_needed:       self.parts_needed,
      parts_produced:     self.parts_produced,
      parts_overproduced: self.parts_overproduced,
      delivered:          self.delivered,
    }
  }
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Input to [`crate::ledger::Ledger::create_job`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewJob {
  pub name:         String,
  pub parts_needed: i64,
  #[serde(default)]
  pub assignee:     Assignee,
}

/// Input to [`crate::ledger::Ledger::update_job`]. Leaves the ledger alone.
#[derive(Debug, Clone, Deserialize)]
pub struct JobUpdate {
  pub name:         String,
  pub parts_needed: i64,
  pub assignee:     Assignee,
}

// ─── Read models ─────────────────────────────────────────────────────────────

/// The restricted projection released to read-only share viewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
  pub job_id:             Uuid,
  pub name:               String,
  pub parts_needed:       i64,
  pub parts_produced:     i64,
  pub parts_overproduced: i64,
  pub delivered:          i64,
}
