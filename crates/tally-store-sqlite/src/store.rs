//! [`SqliteStore`]: the SQLite implementation of [`LedgerStore`].

use std::path::Path;

use rusqlite::{OptionalExtension as _, TransactionBehavior};
use tally_core::{
  Error as CoreError,
  entry::{EntryKind, LedgerEntry, NewEntry},
  job::Job,
  store::{LedgerStore, store_timestamp},
};
use uuid::Uuid;

use crate::{
  Result,
  encode::{ENTRY_COLUMNS, JOB_COLUMNS, RawEntry, RawJob, encode_dt, encode_uuid},
  schema::SCHEMA,
};

/// Result of a closure run on the connection thread: the outer layer is the
/// database, the inner one a domain check that failed with the connection
/// still healthy.
type Checked<T> = std::result::Result<T, CoreError>;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Tally ledger backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, used by the tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Row helpers (run on the connection thread) ─────────────────────────────

fn select_job(conn: &rusqlite::Connection, job_id: &str) -> rusqlite::Result<Option<RawJob>> {
  conn
    .query_row(
      &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE job_id = ?1"),
      rusqlite::params![job_id],
      RawJob::from_row,
    )
    .optional()
}

fn select_entry(
  conn: &rusqlite::Connection,
  entry_id: &str,
) -> rusqlite::Result<Option<RawEntry>> {
  conn
    .query_row(
      &format!("SELECT {ENTRY_COLUMNS} FROM job_entries WHERE entry_id = ?1"),
      rusqlite::params![entry_id],
      RawEntry::from_row,
    )
    .optional()
}

fn job_exists(conn: &rusqlite::Connection, job_id: &str) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM jobs WHERE job_id = ?1",
        rusqlite::params![job_id],
        |_| Ok(true),
      )
      .optional()?
      .unwrap_or(false),
  )
}

/// Look up the owner of an entry. `Ok(Err(..))` when the entry is missing or
/// belongs to another job.
fn check_owner(
  conn: &rusqlite::Connection,
  job_id: Uuid,
  entry_id: Uuid,
) -> rusqlite::Result<Checked<()>> {
  let owner: Option<String> = conn
    .query_row(
      "SELECT job_id FROM job_entries WHERE entry_id = ?1",
      rusqlite::params![encode_uuid(entry_id)],
      |r| r.get(0),
    )
    .optional()?;

  Ok(match owner {
    None => Err(CoreError::EntryNotFound(entry_id)),
    Some(owner) if owner != encode_uuid(job_id) => {
      Err(CoreError::ForeignKeyMismatch { entry_id, job_id })
    }
    Some(_) => Ok(()),
  })
}

fn insert_entry(conn: &rusqlite::Connection, raw: &RawEntry) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO job_entries (
       entry_id, job_id, delta, kind, created_at, updated_by, note
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    rusqlite::params![
      raw.entry_id,
      raw.job_id,
      raw.delta,
      raw.kind,
      raw.created_at,
      raw.updated_by,
      raw.note,
    ],
  )?;
  Ok(())
}

// ─── LedgerStore impl ────────────────────────────────────────────────────────

impl LedgerStore for SqliteStore {
  type Error = crate::Error;

  // ── Jobs ──────────────────────────────────────────────────────────────────

  async fn insert_job(&self, job: Job) -> Result<Job> {
    let raw = RawJob::from_job(&job);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "INSERT INTO jobs ({JOB_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
          ),
          rusqlite::params![
            raw.job_id,
            raw.name,
            raw.parts_needed,
            raw.parts_produced,
            raw.parts_overproduced,
            raw.delivered,
            raw.notes,
            raw.archived,
            raw.status,
            raw.assignee,
            raw.created_at,
            raw.updated_at,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(job)
  }

  async fn get_job(&self, id: Uuid) -> Result<Option<Job>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawJob> = self
      .conn
      .call(move |conn| Ok(select_job(conn, &id_str)?))
      .await?;

    raw.map(RawJob::into_job).transpose()
  }

  async fn list_jobs(&self) -> Result<Vec<Job>> {
    let raws: Vec<RawJob> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {JOB_COLUMNS} FROM jobs ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt
          .query_map([], RawJob::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawJob::into_job).collect()
  }

  async fn save_job(&self, job: Job) -> Result<Job> {
    let raw = RawJob::from_job(&job);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE jobs SET
             name               = ?2,
             parts_needed       = ?3,
             parts_produced     = ?4,
             parts_overproduced = ?5,
             delivered          = ?6,
             notes              = ?7,
             archived           = ?8,
             status             = ?9,
             assignee           = ?10,
             updated_at         = ?11
           WHERE job_id = ?1",
          rusqlite::params![
            raw.job_id,
            raw.name,
            raw.parts_needed,
            raw.parts_produced,
            raw.parts_overproduced,
            raw.delivered,
            raw.notes,
            raw.archived,
            raw.status,
            raw.assignee,
            raw.updated_at,
          ],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(CoreError::JobNotFound(job.job_id).into());
    }
    Ok(job)
  }

  async fn delete_job(&self, id: Uuid) -> Result<()> {
    let id_str = encode_uuid(id);

    // job_entries rows go with it through ON DELETE CASCADE.
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM jobs WHERE job_id = ?1", rusqlite::params![id_str])?)
      })
      .await?;

    if changed == 0 {
      return Err(CoreError::JobNotFound(id).into());
    }
    Ok(())
  }

  // ── Ledger entries ────────────────────────────────────────────────────────

  async fn append_entry(&self, input: NewEntry) -> Result<LedgerEntry> {
    if input.delta <= 0 {
      return Err(CoreError::InvalidDelta(input.delta).into());
    }

    let entry = input.into_entry(store_timestamp());
    let job_id = entry.job_id;
    let raw = RawEntry::from_entry(&entry);

    let checked: Checked<()> = self
      .conn
      .call(move |conn| {
        if !job_exists(conn, &raw.job_id)? {
          return Ok(Err(CoreError::JobNotFound(job_id)));
        }
        insert_entry(conn, &raw)?;
        Ok(Ok(()))
      })
      .await?;

    checked?;
    Ok(entry)
  }

  async fn get_entry(&self, entry_id: Uuid) -> Result<Option<LedgerEntry>> {
    let id_str = encode_uuid(entry_id);

    let raw: Option<RawEntry> = self
      .conn
      .call(move |conn| Ok(select_entry(conn, &id_str)?))
      .await?;

    raw.map(RawEntry::into_entry).transpose()
  }

  async fn update_entry(
    &self,
    job_id: Uuid,
    entry_id: Uuid,
    delta: i64,
  ) -> Result<LedgerEntry> {
    if delta <= 0 {
      return Err(CoreError::InvalidDelta(delta).into());
    }

    let raw: Checked<RawEntry> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if let Err(e) = check_owner(&tx, job_id, entry_id)? {
          return Ok(Err(e));
        }

        let entry_id_str = encode_uuid(entry_id);
        tx.execute(
          "UPDATE job_entries SET delta = ?2 WHERE entry_id = ?1",
          rusqlite::params![entry_id_str, delta],
        )?;
        let raw = select_entry(&tx, &entry_id_str)?;
        tx.commit()?;

        Ok(raw.ok_or(CoreError::EntryNotFound(entry_id)))
      })
      .await?;

    raw?.into_entry()
  }

  async fn delete_entry(&self, job_id: Uuid, entry_id: Uuid) -> Result<()> {
    let checked: Checked<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if let Err(e) = check_owner(&tx, job_id, entry_id)? {
          return Ok(Err(e));
        }
        tx.execute(
          "DELETE FROM job_entries WHERE entry_id = ?1",
          rusqlite::params![encode_uuid(entry_id)],
        )?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;

    Ok(checked?)
  }

  async fn list_entries(&self, job_id: Uuid) -> Result<Vec<LedgerEntry>> {
    let id_str = encode_uuid(job_id);

    let raws: Checked<Vec<RawEntry>> = self
      .conn
      .call(move |conn| {
        if !job_exists(conn, &id_str)? {
          return Ok(Err(CoreError::JobNotFound(job_id)));
        }
        let mut stmt = conn.prepare(&format!(
          "SELECT {ENTRY_COLUMNS} FROM job_entries
           WHERE job_id = ?1
           ORDER BY created_at DESC, seq DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Ok(rows))
      })
      .await?;

    raws?.into_iter().map(RawEntry::into_entry).collect()
  }

  // ── Procedures ────────────────────────────────────────────────────────────

  async fn add_delivery(&self, input: NewEntry) -> Result<(Job, LedgerEntry)> {
    if input.kind != EntryKind::Delivery {
      return Err(
        CoreError::Validation("add_delivery requires a delivery entry".into()).into(),
      );
    }
    if input.delta <= 0 {
      return Err(CoreError::InvalidDelta(input.delta).into());
    }

    let now = store_timestamp();
    let entry = input.into_entry(now);
    let job_id = entry.job_id;
    let raw_entry = RawEntry::from_entry(&entry);
    let now_str = encode_dt(now);

    // BEGIN IMMEDIATE takes the write lock before the bound is read, so no
    // other writer can slip a delivery in between check and insert.
    let raw_job: Checked<RawJob> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(job) = select_job(&tx, &raw_entry.job_id)? else {
          return Ok(Err(CoreError::JobNotFound(job_id)));
        };
        // delta <= available keeps `delivered + delta` within total production,
        // so the UPDATE below cannot leave the integer range.
        let available = job
          .parts_produced
          .saturating_add(job.parts_overproduced)
          .saturating_sub(job.delivered);
        if raw_entry.delta > available {
          return Ok(Err(CoreError::DeliveryExceedsProduction {
            requested: raw_entry.delta,
            available: available.max(0),
          }));
        }

        insert_entry(&tx, &raw_entry)?;
        tx.execute(
          "UPDATE jobs SET delivered = delivered + ?2, updated_at = ?3
           WHERE job_id = ?1",
          rusqlite::params![raw_entry.job_id, raw_entry.delta, now_str],
        )?;
        let job = select_job(&tx, &raw_entry.job_id)?;
        tx.commit()?;

        Ok(job.ok_or(CoreError::JobNotFound(job_id)))
      })
      .await?;

    Ok((raw_job?.into_job()?, entry))
  }
}
