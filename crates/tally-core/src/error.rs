//! Error types for `tally-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("delta must be positive, got {0}")]
  InvalidDelta(i64),

  #[error("parts needed must be at least 1, got {0}")]
  InvalidCapacity(i64),

  #[error(
    "cannot deliver {requested} parts: only {available} produced and not yet delivered"
  )]
  DeliveryExceedsProduction { requested: i64, available: i64 },

  /// Only raised under [`CapacityPolicy::Reject`](crate::ledger::CapacityPolicy).
  #[error("parts needed {parts_needed} is below total production {total}")]
  CapacityBelowProduction { parts_needed: i64, total: i64 },

  #[error("job not found: {0}")]
  JobNotFound(Uuid),

  #[error("ledger entry not found: {0}")]
  EntryNotFound(Uuid),

  #[error("ledger entry {entry_id} does not belong to job {job_id}")]
  ForeignKeyMismatch { entry_id: Uuid, job_id: Uuid },

  #[error("validation error: {0}")]
  Validation(String),

  /// The ledger sums to more than a counter can hold.
  #[error("{0} total of the ledger does not fit in a counter")]
  TotalOverflow(&'static str),

  #[error("backing store error: {0}")]
  Backing(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// The ledger entry was committed but the job aggregate was not brought up
  /// to date. The aggregate is stale until the next `view` or `repair`.
  #[error("ledger of job {job_id} changed but its aggregate was not updated: {source}")]
  PartiallyApplied {
    job_id: Uuid,
    #[source]
    source: Box<Error>,
  },
}

impl Error {
  /// Wrap any backend failure that has no domain meaning.
  pub fn backing(err: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Backing(Box::new(err))
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::JobNotFound(_) | Self::EntryNotFound(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
