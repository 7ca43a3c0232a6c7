//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::Utc;
use tally_core::{
  Error as CoreError, Ledger,
  entry::{EntryKind, NewEntry},
  job::{Assignee, Job, JobStatus, NewJob},
  store::{LedgerStore, store_timestamp},
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn job(parts_needed: i64) -> Job {
  Job::new(
    NewJob {
      name: "Brackets".into(),
      parts_needed,
      assignee: Assignee::Veselin,
    },
    store_timestamp(),
  )
}

async fn stored_job(s: &SqliteStore, parts_needed: i64) -> Job {
  s.insert_job(job(parts_needed)).await.unwrap()
}

fn core(err: Error) -> CoreError { err.into() }

// ─── Jobs ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_get_job_roundtrip() {
  let s = store().await;
  let mut input = job(12);
  input.notes = Some("ship by Friday".into());

  let inserted = s.insert_job(input.clone()).await.unwrap();
  let fetched = s.get_job(inserted.job_id).await.unwrap().unwrap();
  assert_eq!(fetched, input);
}

#[tokio::test]
async fn get_job_missing_returns_none() {
  let s = store().await;
  assert!(s.get_job(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn list_jobs_newest_first() {
  let s = store().await;
  let older = stored_job(&s, 1).await;
  let mut newer = job(1);
  newer.created_at = older.created_at + chrono::Duration::seconds(5);
  let newer = s.insert_job(newer).await.unwrap();

  let ids: Vec<_> = s.list_jobs().await.unwrap().iter().map(|j| j.job_id).collect();
  assert_eq!(ids, vec![newer.job_id, older.job_id]);
}

#[tokio::test]
async fn list_jobs_same_instant_newest_insert_first() {
  let s = store().await;
  let now = store_timestamp();
  let mut inserted = Vec::new();
  for _ in 0..3 {
    let mut j = job(1);
    j.created_at = now;
    inserted.push(s.insert_job(j).await.unwrap().job_id);
  }
  inserted.reverse();

  let ids: Vec<_> = s.list_jobs().await.unwrap().iter().map(|j| j.job_id).collect();
  assert_eq!(ids, inserted);
}

#[tokio::test]
async fn save_job_overwrites_mutable_columns() {
  let s = store().await;
  let mut j = stored_job(&s, 10).await;
  j.name = "Renamed".into();
  j.parts_produced = 10;
  j.parts_overproduced = 2;
  j.status = JobStatus::Completed;
  j.archived = true;
  j.assignee = Assignee::Samuil;
  s.save_job(j.clone()).await.unwrap();

  assert_eq!(s.get_job(j.job_id).await.unwrap().unwrap(), j);
}

#[tokio::test]
async fn save_missing_job_is_not_found() {
  let s = store().await;
  let err = s.save_job(job(3)).await.unwrap_err();
  assert!(matches!(core(err), CoreError::JobNotFound(_)));
}

#[tokio::test]
async fn delete_job_cascades_to_entries() {
  let s = store().await;
  let j = stored_job(&s, 10).await;
  let entry = s
    .append_entry(NewEntry::production(j.job_id, 3))
    .await
    .unwrap();

  s.delete_job(j.job_id).await.unwrap();

  assert!(s.get_job(j.job_id).await.unwrap().is_none());
  assert!(s.get_entry(entry.entry_id).await.unwrap().is_none());
  let err = s.delete_job(j.job_id).await.unwrap_err();
  assert!(matches!(core(err), CoreError::JobNotFound(_)));
}

// ─── Entries ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn append_entry_and_retrieve() {
  let s = store().await;
  let j = stored_job(&s, 10).await;

  let entry = s
    .append_entry(
      NewEntry::production(j.job_id, 4)
        .updated_by(Some("Oleksii".into()))
        .note(Some("night shift".into())),
    )
    .await
    .unwrap();

  let fetched = s.get_entry(entry.entry_id).await.unwrap().unwrap();
  assert_eq!(fetched, entry);
  assert_eq!(fetched.kind, EntryKind::Production);
  assert_eq!(fetched.updated_by.as_deref(), Some("Oleksii"));
}

#[tokio::test]
async fn append_rejects_non_positive_delta() {
  let s = store().await;
  let j = stored_job(&s, 10).await;

  for delta in [0, -4] {
    let err = s
      .append_entry(NewEntry::production(j.job_id, delta))
      .await
      .unwrap_err();
    assert!(matches!(core(err), CoreError::InvalidDelta(d) if d == delta));
  }
  assert!(s.list_entries(j.job_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn append_to_unknown_job_is_not_found() {
  let s = store().await;
  let err = s
    .append_entry(NewEntry::production(Uuid::new_v4(), 1))
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::JobNotFound(_)));
}

#[tokio::test]
async fn list_entries_newest_first_with_ties_by_insertion() {
  let s = store().await;
  let j = stored_job(&s, 100).await;
  for delta in 1..=6 {
    s.append_entry(NewEntry::production(j.job_id, delta))
      .await
      .unwrap();
  }

  let deltas: Vec<_> = s
    .list_entries(j.job_id)
    .await
    .unwrap()
    .iter()
    .map(|e| e.delta)
    .collect();
  assert_eq!(deltas, vec![6, 5, 4, 3, 2, 1]);
}

#[tokio::test]
async fn list_entries_of_unknown_job_is_not_found() {
  let s = store().await;
  let err = s.list_entries(Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(core(err), CoreError::JobNotFound(_)));
}

#[tokio::test]
async fn update_entry_changes_delta_only() {
  let s = store().await;
  let j = stored_job(&s, 10).await;
  let entry = s
    .append_entry(NewEntry::production(j.job_id, 4))
    .await
    .unwrap();

  let updated = s.update_entry(j.job_id, entry.entry_id, 9).await.unwrap();
  assert_eq!(updated.delta, 9);
  assert_eq!(updated.created_at, entry.created_at);
  assert_eq!(updated.kind, entry.kind);
}

#[tokio::test]
async fn update_and_delete_check_ownership() {
  let s = store().await;
  let a = stored_job(&s, 10).await;
  let b = stored_job(&s, 10).await;
  let entry = s
    .append_entry(NewEntry::production(a.job_id, 4))
    .await
    .unwrap();

  let err = s.update_entry(b.job_id, entry.entry_id, 1).await.unwrap_err();
  assert!(matches!(core(err), CoreError::ForeignKeyMismatch { .. }));
  let err = s.delete_entry(b.job_id, entry.entry_id).await.unwrap_err();
  assert!(matches!(core(err), CoreError::ForeignKeyMismatch { .. }));

  let err = s.update_entry(a.job_id, Uuid::new_v4(), 1).await.unwrap_err();
  assert!(matches!(core(err), CoreError::EntryNotFound(_)));
  let err = s.update_entry(a.job_id, entry.entry_id, 0).await.unwrap_err();
  assert!(matches!(core(err), CoreError::InvalidDelta(0)));

  assert_eq!(s.get_entry(entry.entry_id).await.unwrap().unwrap().delta, 4);

  s.delete_entry(a.job_id, entry.entry_id).await.unwrap();
  assert!(s.get_entry(entry.entry_id).await.unwrap().is_none());
}

// ─── Delivery procedure ──────────────────────────────────────────────────────

#[tokio::test]
async fn add_delivery_checks_bound_and_writes_atomically() {
  let s = store().await;
  let mut j = stored_job(&s, 5).await;
  j.parts_produced = 5;
  j.parts_overproduced = 1;
  s.save_job(j.clone()).await.unwrap();

  let (updated, entry) = s
    .add_delivery(NewEntry::delivery(j.job_id, 4))
    .await
    .unwrap();
  assert_eq!(updated.delivered, 4);
  assert_eq!(entry.kind, EntryKind::Delivery);

  let err = s
    .add_delivery(NewEntry::delivery(j.job_id, 3))
    .await
    .unwrap_err();
  assert!(matches!(
    core(err),
    CoreError::DeliveryExceedsProduction { requested: 3, available: 2 }
  ));

  // Nothing from the rejected call landed.
  assert_eq!(s.get_job(j.job_id).await.unwrap().unwrap().delivered, 4);
  assert_eq!(s.list_entries(j.job_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn add_delivery_of_counter_limit_is_refused() {
  let s = store().await;
  let mut j = stored_job(&s, 5).await;
  j.parts_produced = 5;
  j.delivered = 1;
  s.save_job(j.clone()).await.unwrap();

  let err = s
    .add_delivery(NewEntry::delivery(j.job_id, i64::MAX))
    .await
    .unwrap_err();
  assert!(matches!(
    core(err),
    CoreError::DeliveryExceedsProduction { requested: i64::MAX, available: 4 }
  ));
  assert_eq!(s.get_job(j.job_id).await.unwrap().unwrap().delivered, 1);
  assert!(s.list_entries(j.job_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn add_delivery_rejects_production_entries() {
  let s = store().await;
  let j = stored_job(&s, 5).await;
  let err = s
    .add_delivery(NewEntry::production(j.job_id, 1))
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::Validation(_)));
}

#[tokio::test]
async fn concurrent_deliveries_never_overshoot() {
  let s = store().await;
  let mut j = stored_job(&s, 10).await;
  j.parts_produced = 10;
  s.save_job(j.clone()).await.unwrap();
  let job_id = j.job_id;

  let handles: Vec<_> = (0..8)
    .map(|_| {
      let s = s.clone();
      tokio::spawn(async move { s.add_delivery(NewEntry::delivery(job_id, 3)).await })
    })
    .collect();

  let mut accepted = 0;
  for h in handles {
    if h.await.unwrap().is_ok() {
      accepted += 1;
    }
  }

  assert_eq!(accepted, 3);
  assert_eq!(s.get_job(job_id).await.unwrap().unwrap().delivered, 9);
}

// ─── Through the coordinator ─────────────────────────────────────────────────

#[tokio::test]
async fn ledger_scenarios_on_sqlite() {
  let l = Ledger::new(store().await);
  let j = l
    .create_job(NewJob { name: "Flanges".into(), parts_needed: 10, assignee: Assignee::Samuil })
    .await
    .unwrap();

  l.add_production(j.job_id, 4, None).await.unwrap();
  let j = l.add_production(j.job_id, 9, None).await.unwrap();
  assert_eq!((j.parts_produced, j.parts_overproduced), (10, 3));
  assert_eq!(j.status, JobStatus::Completed);

  let j = l.add_delivery(j.job_id, 13, Some("Samuil".into())).await.unwrap();
  assert_eq!(j.delivered, 13);

  let view = l.view(j.job_id).await.unwrap();
  assert_eq!(view.entries.len(), 3);
  assert_eq!(view.entries[0].kind, EntryKind::Delivery);

  let nine = view.entries.iter().find(|e| e.delta == 9).unwrap();
  let j = l.delete_history_item(j.job_id, nine.entry_id).await.unwrap();
  assert_eq!((j.parts_produced, j.parts_overproduced, j.delivered), (4, 0, 4));
  assert_eq!(j.status, JobStatus::Active);
  assert!(j.updated_at <= Utc::now());

  l.delete_job(j.job_id).await.unwrap();
  assert!(l.list_jobs().await.unwrap().is_empty());
}

#[tokio::test]
async fn counter_limits_on_sqlite() {
  let l = Ledger::new(store().await);
  let j = l
    .create_job(NewJob { name: "Rivets".into(), parts_needed: 5, assignee: Assignee::Oleksii })
    .await
    .unwrap();

  let j = l.add_production(j.job_id, i64::MAX - 10, None).await.unwrap();
  assert_eq!((j.parts_produced, j.parts_overproduced), (5, i64::MAX - 15));
  let j = l.add_production(j.job_id, 5, None).await.unwrap();

  let err = l.add_production(j.job_id, 20, None).await.unwrap_err();
  assert!(matches!(err, CoreError::InvalidDelta(20)));

  let five = l
    .view(j.job_id)
    .await
    .unwrap()
    .entries
    .into_iter()
    .find(|e| e.delta == 5)
    .unwrap();
  let err = l
    .update_history_item(j.job_id, five.entry_id, 20)
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::InvalidDelta(20)));

  let j = l.add_delivery(j.job_id, 1, None).await.unwrap();
  let err = l.add_delivery(j.job_id, i64::MAX, None).await.unwrap_err();
  assert!(matches!(err, CoreError::InvalidDelta(i64::MAX)));

  let view = l.view(j.job_id).await.unwrap();
  assert_eq!(view.entries.len(), 3);
  assert_eq!(view.job.total_produced(), i64::MAX - 5);
  assert_eq!(view.job.delivered, 1);
}
