//! [`MemoryStore`]: an in-process [`LedgerStore`] for tests and embedding.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use uuid::Uuid;

use crate::{
  Error, Result,
  entry::{EntryKind, LedgerEntry, NewEntry},
  job::Job,
  store::{LedgerStore, store_timestamp},
};

/// A ledger held entirely in memory behind a single mutex.
///
/// Cloning is cheap and clones share state. Every method runs inside one
/// critical section, which is what makes [`LedgerStore::add_delivery`]
/// atomic here.
#[derive(Clone, Default)]
pub struct MemoryStore {
  inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
  jobs:     HashMap<Uuid, Job>,
  /// Insertion sequence of each job; breaks `created_at` ties.
  job_seq:  HashMap<Uuid, u64>,
  next_seq: u64,
  /// Kept in insertion order; position breaks `created_at` ties.
  entries:  Vec<LedgerEntry>,
}

impl Inner {
  fn owned_entry(&mut self, job_id: Uuid, entry_id: Uuid) -> Result<&mut LedgerEntry> {
    let entry = self
      .entries
      .iter_mut()
      .find(|e| e.entry_id == entry_id)
      .ok_or(Error::EntryNotFound(entry_id))?;
    if entry.job_id != job_id {
      return Err(Error::ForeignKeyMismatch { entry_id, job_id });
    }
    Ok(entry)
  }
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  fn lock(&self) -> MutexGuard<'_, Inner> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl LedgerStore for MemoryStore {
  type Error = Error;

  // ── Jobs ──────────────────────────────────────────────────────────────────

  async fn insert_job(&self, job: Job) -> Result<Job> {
    let mut inner = self.lock();
    if inner.jobs.contains_key(&job.job_id) {
      return Err(Error::Validation(format!("job {} already exists", job.job_id)));
    }
    let seq = inner.next_seq;
    inner.next_seq += 1;
    inner.job_seq.insert(job.job_id, seq);
    inner.jobs.insert(job.job_id, job.clone());
    Ok(job)
  }

  async fn get_job(&self, id: Uuid) -> Result<Option<Job>> {
    Ok(self.lock().jobs.get(&id).cloned())
  }

  async fn list_jobs(&self) -> Result<Vec<Job>> {
    let inner = self.lock();
    let mut jobs: Vec<(u64, Job)> = inner
      .jobs
      .values()
      .map(|j| (inner.job_seq.get(&j.job_id).copied().unwrap_or(0), j.clone()))
      .collect();
    jobs.sort_by(|(sa, a), (sb, b)| b.created_at.cmp(&a.created_at).then(sb.cmp(sa)));
    Ok(jobs.into_iter().map(|(_, j)| j).collect())
  }

  async fn save_job(&self, job: Job) -> Result<Job> {
    let mut inner = self.lock();
    let slot = inner
      .jobs
      .get_mut(&job.job_id)
      .ok_or(Error::JobNotFound(job.job_id))?;
    *slot = job.clone();
    Ok(job)
  }

  async fn delete_job(&self, id: Uuid) -> Result<()> {
    let mut inner = self.lock();
    inner.jobs.remove(&id).ok_or(Error::JobNotFound(id))?;
    inner.job_seq.remove(&id);
    inner.entries.retain(|e| e.job_id != id);
    Ok(())
  }

  // ── Ledger entries ────────────────────────────────────────────────────────

  async fn append_entry(&self, input: NewEntry) -> Result<LedgerEntry> {
    if input.delta <= 0 {
      return Err(Error::InvalidDelta(input.delta));
    }
    let mut inner = self.lock();
    if !inner.jobs.contains_key(&input.job_id) {
      return Err(Error::JobNotFound(input.job_id));
    }
    let entry = input.into_entry(store_timestamp());
    inner.entries.push(entry.clone());
    Ok(entry)
  }

  async fn get_entry(&self, entry_id: Uuid) -> Result<Option<LedgerEntry>> {
    Ok(
      self
        .lock()
        .entries
        .iter()
        .find(|e| e.entry_id == entry_id)
        .cloned(),
    )
  }

  async fn update_entry(
    &self,
    job_id: Uuid,
    entry_id: Uuid,
    delta: i64,
  ) -> Result<LedgerEntry> {
    if delta <= 0 {
      return Err(Error::InvalidDelta(delta));
    }
    let mut inner = self.lock();
    let entry = inner.owned_entry(job_id, entry_id)?;
    entry.delta = delta;
    Ok(entry.clone())
  }

  async fn delete_entry(&self, job_id: Uuid, entry_id: Uuid) -> Result<()> {
    let mut inner = self.lock();
    inner.owned_entry(job_id, entry_id)?;
    inner.entries.retain(|e| e.entry_id != entry_id);
    Ok(())
  }

  async fn list_entries(&self, job_id: Uuid) -> Result<Vec<LedgerEntry>> {
    let inner = self.lock();
    if !inner.jobs.contains_key(&job_id) {
      return Err(Error::JobNotFound(job_id));
    }
    // Reverse insertion order first; the stable sort keeps it within ties.
    let mut entries: Vec<LedgerEntry> = inner
      .entries
      .iter()
      .rev()
      .filter(|e| e.job_id == job_id)
      .cloned()
      .collect();
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(entries)
  }

  // ── Procedures ────────────────────────────────────────────────────────────

  async fn add_delivery(&self, input: NewEntry) -> Result<(Job, LedgerEntry)> {
    if input.kind != EntryKind::Delivery {
      return Err(Error::Validation("add_delivery requires a delivery entry".into()));
    }
    if input.delta <= 0 {
      return Err(Error::InvalidDelta(input.delta));
    }

    let mut guard = self.lock();
    let Inner { jobs, entries, .. } = &mut *guard;
    let job = jobs
      .get_mut(&input.job_id)
      .ok_or(Error::JobNotFound(input.job_id))?;

    let delivered = job
      .delivered
      .checked_add(input.delta)
      .ok_or(Error::InvalidDelta(input.delta))?;
    if delivered > job.total_produced() {
      return Err(Error::DeliveryExceedsProduction {
        requested: input.delta,
        available: job.available_to_deliver(),
      });
    }

    let now = store_timestamp();
    let entry = input.into_entry(now);
    job.delivered = delivered;
    job.updated_at = now;
    entries.push(entry.clone());

    Ok((job.clone(), entry))
  }
}
