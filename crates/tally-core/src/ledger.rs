//! [`Ledger`]: the mutation coordinator.
//!
//! Every operation validates its input before touching the store, then
//! combines at most one ledger write with a reconciliation and an aggregate
//! write. The two writes are separate store calls: if the second one fails
//! after the first committed, the caller gets [`Error::PartiallyApplied`] and
//! the aggregate stays stale until [`Ledger::view`] or [`Ledger::repair`]
//! re-derives it from the log.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  entry::{EntryKind, JobView, LedgerEntry, NewEntry},
  job::{Job, JobSummary, JobUpdate, MAX_NOTES_LEN, NewJob},
  reconcile::{apportion, derive_status, reconcile_aggregate},
  store::{LedgerStore, store_timestamp},
};

// ─── Policy ──────────────────────────────────────────────────────────────────

/// What to do when a job's capacity is lowered below what it has already
/// produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityPolicy {
  /// Keep total production and move the excess into overproduction.
  #[default]
  Reapportion,
  /// Refuse the change with [`Error::CapacityBelowProduction`].
  Reject,
}

// ─── Repair results ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct RepairOutcome {
  pub job:      Job,
  /// `true` if the stored aggregate disagreed with the log and was rewritten.
  pub repaired: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RepairReport {
  pub checked:  usize,
  pub repaired: Vec<Uuid>,
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

/// Coordinates ledger writes, reconciliation and aggregate writes over any
/// [`LedgerStore`].
#[derive(Debug, Clone)]
pub struct Ledger<S> {
  store:  S,
  policy: CapacityPolicy,
}

impl<S: LedgerStore> Ledger<S> {
  pub fn new(store: S) -> Self {
    Self { store, policy: CapacityPolicy::default() }
  }

  pub fn with_policy(mut self, policy: CapacityPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn policy(&self) -> CapacityPolicy { self.policy }

  // ── Reads ─────────────────────────────────────────────────────────────────

  pub async fn get_job(&self, id: Uuid) -> Result<Job> {
    self
      .store
      .get_job(id)
      .await
      .map_err(store_err)?
      .ok_or(Error::JobNotFound(id))
  }

  /// All jobs, newest first, as stored.
  pub async fn list_jobs(&self) -> Result<Vec<Job>> {
    self.store.list_jobs().await.map_err(store_err)
  }

  /// A job with its ledger, newest entry first.
  ///
  /// If the stored aggregate has drifted from the log (e.g. after a
  /// [`Error::PartiallyApplied`]), it is rewritten before returning. Should
  /// that write fail, the stored job is returned unchanged.
  pub async fn view(&self, id: Uuid) -> Result<JobView> {
    let job = self.get_job(id).await?;
    let entries = self.entries(id).await?;

    let derived = reconcile_aggregate(&entries, job.parts_needed, job.archived)?;
    if derived == job.aggregate() {
      return Ok(JobView { job, entries });
    }

    warn!(job_id = %id, stored = ?job.aggregate(), ?derived, "aggregate drifted from ledger, repairing");
    let mut healed = job.clone();
    healed.apply(&derived);
    healed.updated_at = store_timestamp();
    match self.store.save_job(healed).await {
      Ok(job) => Ok(JobView { job, entries }),
      Err(e) => {
        let e: Error = e.into();
        warn!(job_id = %id, error = %e, "lazy repair failed, serving stored aggregate");
        Ok(JobView { job, entries })
      }
    }
  }

  pub async fn summary(&self, id: Uuid) -> Result<JobSummary> {
    Ok(self.get_job(id).await?.summary())
  }

  async fn entries(&self, id: Uuid) -> Result<Vec<LedgerEntry>> {
    self.store.list_entries(id).await.map_err(store_err)
  }

  // ── Job lifecycle ─────────────────────────────────────────────────────────

  pub async fn create_job(&self, input: NewJob) -> Result<Job> {
    validate_capacity(input.parts_needed)?;
    let name = validate_name(&input.name)?;

    let job = Job::new(NewJob { name, ..input }, store_timestamp());
    let job = self.store.insert_job(job).await.map_err(store_err)?;
    debug!(job_id = %job.job_id, parts_needed = job.parts_needed, "job created");
    Ok(job)
  }

  /// Rename, reassign or resize a job. Total production is held constant and
  /// re-split across the new capacity; the ledger is not touched.
  pub async fn update_job(&self, id: Uuid, input: JobUpdate) -> Result<Job> {
    validate_capacity(input.parts_needed)?;
    let name = validate_name(&input.name)?;

    let mut job = self.get_job(id).await?;
    let total = job.total_produced();

    if self.policy == CapacityPolicy::Reject
      && input.parts_needed < job.parts_needed
      && input.parts_needed < total
    {
      return Err(Error::CapacityBelowProduction {
        parts_needed: input.parts_needed,
        total,
      });
    }

    let (parts_produced, parts_overproduced) = apportion(total, input.parts_needed);
    job.name = name;
    job.assignee = input.assignee;
    job.parts_needed = input.parts_needed;
    job.parts_produced = parts_produced;
    job.parts_overproduced = parts_overproduced;
    job.status = derive_status(parts_produced, input.parts_needed, job.archived);
    job.updated_at = store_timestamp();

    self.store.save_job(job).await.map_err(store_err)
  }

  /// Archiving freezes the status at `archived`; unarchiving derives it from
  /// the current counters again.
  pub async fn archive_job(&self, id: Uuid, archived: bool) -> Result<Job> {
    let mut job = self.get_job(id).await?;
    job.archived = archived;
    job.status = derive_status(job.parts_produced, job.parts_needed, archived);
    job.updated_at = store_timestamp();
    self.store.save_job(job).await.map_err(store_err)
  }

  /// Remove a job and its whole ledger.
  pub async fn delete_job(&self, id: Uuid) -> Result<()> {
    self.store.delete_job(id).await.map_err(store_err)?;
    debug!(job_id = %id, "job deleted");
    Ok(())
  }

  /// Blank notes clear the field.
  pub async fn update_job_notes(&self, id: Uuid, notes: Option<String>) -> Result<Job> {
    let notes = notes.filter(|n| !n.trim().is_empty());
    if let Some(n) = &notes {
      let len = n.chars().count();
      if len > MAX_NOTES_LEN {
        return Err(Error::Validation(format!(
          "notes are {len} characters long, the limit is {MAX_NOTES_LEN}"
        )));
      }
    }

    let mut job = self.get_job(id).await?;
    job.notes = notes;
    job.updated_at = store_timestamp();
    self.store.save_job(job).await.map_err(store_err)
  }

  // ── Ledger mutations ──────────────────────────────────────────────────────

  /// Log produced parts, then recompute production from the full ledger.
  pub async fn add_production(
    &self,
    id: Uuid,
    delta: i64,
    updated_by: Option<String>,
  ) -> Result<Job> {
    validate_delta(delta)?;
    let job = self.get_job(id).await?;
    checked_total(job.total_produced(), delta)?;

    let entry = NewEntry::production(id, delta).updated_by(updated_by);
    let entry = self.store.append_entry(entry).await.map_err(store_err)?;
    debug!(job_id = %id, entry_id = %entry.entry_id, delta, "production logged");

    self.rederive_committed(id).await
  }

  /// Log delivered parts. The bound check and the write happen in one store
  /// step so concurrent deliveries cannot overshoot production.
  pub async fn add_delivery(
    &self,
    id: Uuid,
    delta: i64,
    updated_by: Option<String>,
  ) -> Result<Job> {
    validate_delta(delta)?;
    let job = self.get_job(id).await?;
    if checked_total(job.delivered, delta)? > job.total_produced() {
      return Err(Error::DeliveryExceedsProduction {
        requested: delta,
        available: job.available_to_deliver(),
      });
    }

    let entry = NewEntry::delivery(id, delta).updated_by(updated_by);
    let (job, entry) = self.store.add_delivery(entry).await.map_err(store_err)?;
    debug!(job_id = %id, entry_id = %entry.entry_id, delta, "delivery logged");
    Ok(job)
  }

  /// Correct the delta of one entry and reconcile the job from its ledger.
  ///
  /// Raising a delivery entry past what is available fails with
  /// [`Error::DeliveryExceedsProduction`]; raising a production entry past the
  /// counter range fails with [`Error::InvalidDelta`]. Lowering production may
  /// lower `delivered` through clamping.
  pub async fn update_history_item(
    &self,
    job_id: Uuid,
    entry_id: Uuid,
    delta: i64,
  ) -> Result<Job> {
    validate_delta(delta)?;
    let job = self.get_job(job_id).await?;
    let entry = self.owned_entry(job_id, entry_id).await?;

    if delta > entry.delta {
      let increase = delta - entry.delta;
      match entry.kind {
        EntryKind::Production => {
          checked_total(job.total_produced(), increase)
            .map_err(|_| Error::InvalidDelta(delta))?;
        }
        EntryKind::Delivery => {
          let available = job.available_to_deliver();
          if increase > available {
            return Err(Error::DeliveryExceedsProduction { requested: increase, available });
          }
        }
      }
    }

    self
      .store
      .update_entry(job_id, entry_id, delta)
      .await
      .map_err(store_err)?;
    debug!(%job_id, %entry_id, old = entry.delta, new = delta, "ledger entry corrected");

    self.rederive_committed(job_id).await
  }

  /// Remove one entry and reconcile the job from what remains.
  pub async fn delete_history_item(&self, job_id: Uuid, entry_id: Uuid) -> Result<Job> {
    self.get_job(job_id).await?;
    self.owned_entry(job_id, entry_id).await?;

    self
      .store
      .delete_entry(job_id, entry_id)
      .await
      .map_err(store_err)?;
    debug!(%job_id, %entry_id, "ledger entry deleted");

    self.rederive_committed(job_id).await
  }

  // ── Repair ────────────────────────────────────────────────────────────────

  /// Re-derive one job's aggregate from its ledger, writing only on drift.
  pub async fn repair(&self, id: Uuid) -> Result<RepairOutcome> {
    let job = self.get_job(id).await?;
    let entries = self.entries(id).await?;
    let derived = reconcile_aggregate(&entries, job.parts_needed, job.archived)?;
    if derived == job.aggregate() {
      return Ok(RepairOutcome { job, repaired: false });
    }

    let before = job.aggregate();
    let job = self.rederive(id).await?;
    info!(job_id = %id, ?before, after = ?job.aggregate(), "aggregate repaired");
    Ok(RepairOutcome { job, repaired: true })
  }

  /// Run [`Ledger::repair`] over every job.
  pub async fn repair_all(&self) -> Result<RepairReport> {
    let mut report = RepairReport::default();
    for job in self.list_jobs().await? {
      report.checked += 1;
      if self.repair(job.job_id).await?.repaired {
        report.repaired.push(job.job_id);
      }
    }
    info!(checked = report.checked, repaired = report.repaired.len(), "repair pass finished");
    Ok(report)
  }

  // ── Helpers ───────────────────────────────────────────────────────────────

  async fn owned_entry(&self, job_id: Uuid, entry_id: Uuid) -> Result<LedgerEntry> {
    let entry = self
      .store
      .get_entry(entry_id)
      .await
      .map_err(store_err)?
      .ok_or(Error::EntryNotFound(entry_id))?;
    if entry.job_id != job_id {
      return Err(Error::ForeignKeyMismatch { entry_id, job_id });
    }
    Ok(entry)
  }

  /// Reload the job and its ledger, reconcile and persist the aggregate.
  /// Reads the job fresh, so edits to its own fields since the caller's read
  /// survive and the split uses the current `parts_needed`.
  async fn rederive(&self, id: Uuid) -> Result<Job> {
    let mut job = self.get_job(id).await?;
    let entries = self.entries(id).await?;
    let aggregate = reconcile_aggregate(&entries, job.parts_needed, job.archived)?;
    job.apply(&aggregate);
    job.updated_at = store_timestamp();
    self.store.save_job(job).await.map_err(store_err)
  }

  /// [`Ledger::rederive`] after a ledger write has already committed.
  async fn rederive_committed(&self, job_id: Uuid) -> Result<Job> {
    self.rederive(job_id).await.map_err(|source| {
      warn!(%job_id, error = %source, "ledger written but aggregate update failed");
      Error::PartiallyApplied { job_id, source: Box::new(source) }
    })
  }
}

// ─── Validation ──────────────────────────────────────────────────────────────

fn validate_delta(delta: i64) -> Result<()> {
  if delta <= 0 {
    return Err(Error::InvalidDelta(delta));
  }
  Ok(())
}

/// `current + delta`, or [`Error::InvalidDelta`] if the sum leaves the
/// counter range.
fn checked_total(current: i64, delta: i64) -> Result<i64> {
  current.checked_add(delta).ok_or(Error::InvalidDelta(delta))
}

fn validate_capacity(parts_needed: i64) -> Result<()> {
  if parts_needed < 1 {
    return Err(Error::InvalidCapacity(parts_needed));
  }
  Ok(())
}

fn validate_name(name: &str) -> Result<String> {
  let name = name.trim();
  if name.is_empty() {
    return Err(Error::Validation("job name must not be empty".into()));
  }
  Ok(name.to_owned())
}

fn store_err<E: Into<Error>>(err: E) -> Error { err.into() }
