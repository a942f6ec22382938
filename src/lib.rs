//! orgdesk library: API client, org tree building/filtering, and
//! association reconciliation for the business-relationship backend.
//!
//! The CLI binary (src/bin/cli.rs) is the main consumer.

pub mod api;
pub mod reconcile;
pub mod settings;
pub mod tree;
