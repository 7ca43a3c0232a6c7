//! The reconciliation engine.
//!
//! Pure functions that derive a job's counters from its ledger. Every edit or
//! delete re-runs them over the job's entire remaining entry set instead of
//! patching the previous aggregate, so the stored counters are always a
//! function of the log. Sums commute, so entry order never matters.

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  entry::{EntryKind, LedgerEntry},
  job::JobStatus,
};

/// The production half of a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Production {
  pub parts_produced:     i64,
  pub parts_overproduced: i64,
  pub status:             JobStatus,
}

/// Every derived field of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
  pub parts_produced:     i64,
  pub parts_overproduced: i64,
  pub delivered:          i64,
  pub status:             JobStatus,
}

/// Split a production total into the part credited toward `parts_needed` and
/// the overproduction beyond it.
pub fn apportion(total: i64, parts_needed: i64) -> (i64, i64) {
  let total = total.max(0);
  (total.min(parts_needed), (total - parts_needed).max(0))
}

/// Archived wins; otherwise a job is complete once credited production meets
/// its target.
pub fn derive_status(
  parts_produced: i64,
  parts_needed: i64,
  archived: bool,
) -> JobStatus {
  if archived {
    JobStatus::Archived
  } else if parts_produced >= parts_needed {
    JobStatus::Completed
  } else {
    JobStatus::Active
  }
}

fn sum_of(entries: &[LedgerEntry], kind: EntryKind) -> Result<i64> {
  entries
    .iter()
    .filter(|e| e.kind == kind)
    .try_fold(0i64, |acc, e| acc.checked_add(e.delta))
    .ok_or(Error::TotalOverflow(match kind {
      EntryKind::Production => "production",
      EntryKind::Delivery => "delivery",
    }))
}

/// Recompute the production counters and status. Delivery entries are
/// ignored; see [`reconcile_delivered`].
pub fn reconcile(
  entries: &[LedgerEntry],
  parts_needed: i64,
  archived: bool,
) -> Result<Production> {
  let total = sum_of(entries, EntryKind::Production)?;
  let (parts_produced, parts_overproduced) = apportion(total, parts_needed);
  Ok(Production {
    parts_produced,
    parts_overproduced,
    status: derive_status(parts_produced, parts_needed, archived),
  })
}

/// Sum of all delivery deltas, before clamping.
pub fn reconcile_delivered(entries: &[LedgerEntry]) -> Result<i64> {
  sum_of(entries, EntryKind::Delivery)
}

/// Deliveries can never exceed what was produced. Only ever lowers
/// `delivered`.
pub fn clamp_delivered(
  delivered: i64,
  parts_produced: i64,
  parts_overproduced: i64,
) -> i64 {
  delivered.min(parts_produced + parts_overproduced).max(0)
}

/// Full reconciliation: production, clamped deliveries and status.
///
/// Fails with [`Error::TotalOverflow`] if either sum leaves the `i64` range.
pub fn reconcile_aggregate(
  entries: &[LedgerEntry],
  parts_needed: i64,
  archived: bool,
) -> Result<Aggregate> {
  let production = reconcile(entries, parts_needed, archived)?;
  let delivered = clamp_delivered(
    reconcile_delivered(entries)?,
    production.parts_produced,
    production.parts_overproduced,
  );
  Ok(Aggregate {
    parts_produced: production.parts_produced,
    parts_overproduced: production.parts_overproduced,
    delivered,
    status: production.status,
  })
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use uuid::Uuid;

  use super::*;
  use crate::entry::NewEntry;

  fn entries(job_id: Uuid, production: &[i64], delivery: &[i64]) -> Vec<LedgerEntry> {
    let now = Utc::now();
    production
      .iter()
      .map(|&d| NewEntry::production(job_id, d).into_entry(now))
      .chain(
        delivery
          .iter()
          .map(|&d| NewEntry::delivery(job_id, d).into_entry(now)),
      )
      .collect()
  }

  #[test]
  fn empty_ledger_is_active_and_zero() {
    let agg = reconcile_aggregate(&[], 10, false).unwrap();
    assert_eq!(agg.parts_produced, 0);
    assert_eq!(agg.parts_overproduced, 0);
    assert_eq!(agg.delivered, 0);
    assert_eq!(agg.status, JobStatus::Active);
  }

  #[test]
  fn production_beyond_capacity_is_overproduction() {
    let log = entries(Uuid::new_v4(), &[4, 9], &[]);
    let p = reconcile(&log, 10, false).unwrap();
    assert_eq!(p.parts_produced, 10);
    assert_eq!(p.parts_overproduced, 3);
    assert_eq!(p.status, JobStatus::Completed);
  }

  #[test]
  fn order_does_not_matter() {
    let job_id = Uuid::new_v4();
    let mut log = entries(job_id, &[1, 7, 3, 12, 2], &[4, 6]);
    let forward = reconcile_aggregate(&log, 20, false).unwrap();
    log.reverse();
    assert_eq!(reconcile_aggregate(&log, 20, false).unwrap(), forward);
    log.rotate_left(3);
    assert_eq!(reconcile_aggregate(&log, 20, false).unwrap(), forward);
    assert_eq!(forward.parts_produced, 20);
    assert_eq!(forward.parts_overproduced, 5);
    assert_eq!(forward.delivered, 10);
  }

  #[test]
  fn min_and_max_hold_for_many_capacities() {
    let job_id = Uuid::new_v4();
    let log = entries(job_id, &[3, 5, 8], &[]);
    for capacity in 1..=30 {
      let p = reconcile(&log, capacity, false).unwrap();
      assert_eq!(p.parts_produced, 16.min(capacity));
      assert_eq!(p.parts_overproduced, (16 - capacity).max(0));
    }
  }

  #[test]
  fn removing_an_entry_equals_never_applying_it() {
    let job_id = Uuid::new_v4();
    let full = entries(job_id, &[4, 6, 5], &[3]);
    for skip in 0..full.len() {
      let remaining: Vec<_> = full
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != skip)
        .map(|(_, e)| e.clone())
        .collect();
      let rebuilt: Vec<_> = remaining
        .iter()
        .map(|e| {
          NewEntry {
            job_id,
            kind: e.kind,
            delta: e.delta,
            updated_by: None,
            note: None,
          }
          .into_entry(e.created_at)
        })
        .collect();
      assert_eq!(
        reconcile_aggregate(&remaining, 12, false).unwrap(),
        reconcile_aggregate(&rebuilt, 12, false).unwrap()
      );
    }
  }

  #[test]
  fn delivered_is_clamped_to_production() {
    let log = entries(Uuid::new_v4(), &[2], &[5]);
    let agg = reconcile_aggregate(&log, 5, false).unwrap();
    assert_eq!(agg.delivered, 2);

    let log = entries(Uuid::new_v4(), &[], &[5]);
    assert_eq!(reconcile_aggregate(&log, 5, false).unwrap().delivered, 0);
  }

  #[test]
  fn archived_wins_over_completed() {
    let log = entries(Uuid::new_v4(), &[10], &[]);
    assert_eq!(reconcile(&log, 10, true).unwrap().status, JobStatus::Archived);
    assert_eq!(reconcile(&log, 10, false).unwrap().status, JobStatus::Completed);
    assert_eq!(reconcile(&log, 11, false).unwrap().status, JobStatus::Active);
  }

  #[test]
  fn sums_beyond_i64_are_rejected() {
    let job_id = Uuid::new_v4();
    let log = entries(job_id, &[i64::MAX], &[]);
    let p = reconcile(&log, 5, false).unwrap();
    assert_eq!((p.parts_produced, p.parts_overproduced), (5, i64::MAX - 5));

    let log = entries(job_id, &[i64::MAX, 1], &[]);
    assert!(matches!(
      reconcile(&log, 5, false),
      Err(Error::TotalOverflow("production"))
    ));

    let log = entries(job_id, &[3], &[i64::MAX, i64::MAX]);
    assert!(matches!(
      reconcile_aggregate(&log, 5, false),
      Err(Error::TotalOverflow("delivery"))
    ));
  }

  #[test]
  fn apportion_reapportions_total_across_new_capacity() {
    assert_eq!(apportion(13, 10), (10, 3));
    assert_eq!(apportion(13, 20), (13, 0));
    assert_eq!(apportion(0, 1), (0, 0));
  }

  #[test]
  fn status_serialises_lowercase() {
    let json = serde_json::to_string(&JobStatus::Completed).unwrap();
    assert_eq!(json, "\"completed\"");
  }
}
