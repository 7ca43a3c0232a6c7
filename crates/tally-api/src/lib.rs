//! JSON REST API for Tally.
//!
//! Exposes an axum [`Router`] over a [`tally_core::Ledger`] backed by any
//! [`LedgerStore`]. Every mutation goes through the coordinator, so handlers
//! never touch the store directly. Auth, TLS and transport concerns are the
//! caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", tally_api::api_router(ledger.clone()))
//! ```

pub mod entries;
pub mod error;
pub mod jobs;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use tally_core::{Ledger, store::LedgerStore};

pub use error::ApiError;

/// Build a fully-materialised API router for `ledger`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(ledger: Arc<Ledger<S>>) -> Router<()>
where
  S: LedgerStore + 'static,
{
  Router::new()
    // Jobs
    .route("/jobs", get(jobs::list::<S>).post(jobs::create::<S>))
    .route(
      "/jobs/{id}",
      get(jobs::get_one::<S>)
        .put(jobs::update::<S>)
        .delete(jobs::delete_one::<S>),
    )
    .route("/jobs/{id}/summary", get(jobs::summary::<S>))
    .route("/jobs/{id}/notes", put(jobs::update_notes::<S>))
    .route("/jobs/{id}/archive", post(jobs::archive::<S>))
    .route("/jobs/{id}/repair", post(jobs::repair::<S>))
    // Ledger
    .route("/jobs/{id}/production", post(entries::add_production::<S>))
    .route("/jobs/{id}/delivery", post(entries::add_delivery::<S>))
    .route(
      "/jobs/{id}/entries/{entry_id}",
      put(entries::update_one::<S>).delete(entries::delete_one::<S>),
    )
    .with_state(ledger)
}

// ─── Integration tests ────────────────────────────────────────────────────────
