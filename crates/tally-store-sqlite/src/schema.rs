//! SQL schema for the Tally SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per job. The counter columns are a materialised view of
-- job_entries and are only written with reconciled values.
CREATE TABLE IF NOT EXISTS jobs (
    job_id             TEXT PRIMARY KEY,
    name               TEXT NOT NULL,
    parts_needed       INTEGER NOT NULL CHECK (parts_needed >= 1),
    parts_produced     INTEGER NOT NULL DEFAULT 0 CHECK (parts_produced >= 0),
    parts_overproduced INTEGER NOT NULL DEFAULT 0 CHECK (parts_overproduced >= 0),
    delivered          INTEGER NOT NULL DEFAULT 0 CHECK (delivered >= 0),
    notes              TEXT CHECK (notes IS NULL OR length(notes) <= 2000),
    archived           INTEGER NOT NULL DEFAULT 0,
    status             TEXT NOT NULL,   -- 'active' | 'completed' | 'archived'
    assignee           TEXT NOT NULL,
    created_at         TEXT NOT NULL,   -- RFC 3339 UTC, microsecond precision
    updated_at         TEXT NOT NULL
);

-- The ledger. Rows are only ever updated to correct `delta`.
CREATE TABLE IF NOT EXISTS job_entries (
    seq        INTEGER PRIMARY KEY AUTOINCREMENT,  -- breaks created_at ties
    entry_id   TEXT NOT NULL UNIQUE,
    job_id     TEXT NOT NULL REFERENCES jobs(job_id) ON DELETE CASCADE,
    delta      INTEGER NOT NULL CHECK (delta > 0),
    kind       TEXT NOT NULL,   -- 'production' | 'delivery'
    created_at TEXT NOT NULL,
    updated_by TEXT,
    note       TEXT
);

CREATE INDEX IF NOT EXISTS job_entries_job_idx     ON job_entries(job_id, created_at);
CREATE INDEX IF NOT EXISTS jobs_created_idx        ON jobs(created_at);

PRAGMA user_version = 1;
";
