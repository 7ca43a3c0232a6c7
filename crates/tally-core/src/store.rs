//! The `LedgerStore` trait.
//!
//! One trait covers both halves of persistence: the ledger entry store and the
//! job aggregate store. It is implemented by storage backends (e.g.
//! `tally-store-sqlite`, or [`crate::memory::MemoryStore`]). The
//! [`Ledger`](crate::ledger::Ledger) coordinator depends on this abstraction,
//! not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, SubsecRound as _, Utc};
use uuid::Uuid;

use crate::{
  entry::{LedgerEntry, NewEntry},
  job::Job,
};

/// Current time at the precision every backend can store.
///
/// Text-encoded backends keep microseconds; truncating up front means a value
/// reads back exactly as it was returned.
pub fn store_timestamp() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

/// Abstraction over a ledger backend.
///
/// Domain failures (`JobNotFound`, `EntryNotFound`, `ForeignKeyMismatch`,
/// `InvalidDelta`, `DeliveryExceedsProduction`) must survive the conversion
/// into [`crate::Error`] unchanged, so the coordinator can tell them apart
/// from transport failures.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait LedgerStore: Send + Sync {
  type Error: std::error::Error + Into<crate::Error> + Send + Sync + 'static;

  // ── Jobs ──────────────────────────────────────────────────────────────

  /// Persist a new job exactly as given.
  fn insert_job(
    &self,
    job: Job,
  ) -> impl Future<Output = Result<Job, Self::Error>> + Send + '_;

  /// Retrieve a job by UUID. Returns `None` if not found.
  fn get_job(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Job>, Self::Error>> + Send + '_;

  /// All jobs, newest first.
  fn list_jobs(
    &self,
  ) -> impl Future<Output = Result<Vec<Job>, Self::Error>> + Send + '_;

  /// Overwrite a job's mutable columns (metadata and aggregate).
  ///
  /// Fails with `JobNotFound` if the job no longer exists.
  fn save_job(
    &self,
    job: Job,
  ) -> impl Future<Output = Result<Job, Self::Error>> + Send + '_;

  /// Remove a job together with its entire ledger.
  fn delete_job(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Ledger entries ────────────────────────────────────────────────────

  /// Append an entry. `entry_id` and `created_at` are set by the store.
  ///
  /// Fails with `InvalidDelta` for a non-positive delta and `JobNotFound` if
  /// the owning job does not exist.
  fn append_entry(
    &self,
    input: NewEntry,
  ) -> impl Future<Output = Result<LedgerEntry, Self::Error>> + Send + '_;

  /// Retrieve a single entry. Returns `None` if not found.
  fn get_entry(
    &self,
    entry_id: Uuid,
  ) -> impl Future<Output = Result<Option<LedgerEntry>, Self::Error>> + Send + '_;

  /// Replace the delta of an entry owned by `job_id`.
  ///
  /// Fails with `EntryNotFound`, `ForeignKeyMismatch` or `InvalidDelta`.
  fn update_entry(
    &self,
    job_id: Uuid,
    entry_id: Uuid,
    delta: i64,
  ) -> impl Future<Output = Result<LedgerEntry, Self::Error>> + Send + '_;

  /// Remove an entry owned by `job_id`.
  ///
  /// Fails with `EntryNotFound` or `ForeignKeyMismatch`.
  fn delete_entry(
    &self,
    job_id: Uuid,
    entry_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// A job's ledger, newest first. Entries sharing a timestamp are returned
  /// in reverse insertion order.
  ///
  /// Fails with `JobNotFound` if the job does not exist.
  fn list_entries(
    &self,
    job_id: Uuid,
  ) -> impl Future<Output = Result<Vec<LedgerEntry>, Self::Error>> + Send + '_;

  // ── Procedures ────────────────────────────────────────────────────────

  /// Append a delivery entry and raise the job's `delivered` counter as one
  /// all-or-nothing step.
  ///
  /// The bound `delivered + delta <= parts_produced + parts_overproduced` is
  /// checked inside the same step; on violation nothing is written and the
  /// call fails with `DeliveryExceedsProduction`.
  fn add_delivery(
    &self,
    input: NewEntry,
  ) -> impl Future<Output = Result<(Job, LedgerEntry), Self::Error>> + Send + '_;
}
