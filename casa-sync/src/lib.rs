//! # casa-sync
//!
//! Create-or-patch reconciliation of the casa configuration record.
//!
//! Call [`pipeline::run`] to bootstrap the record in the configured backend,
//! or [`pipeline::diff`] to preview what a run would change.

pub mod codec;
pub mod diff;
pub mod error;
pub mod layout;
pub mod pipeline;
pub mod reconcile;

pub use codec::BlobCodec;
pub use diff::FieldDrift;
pub use error::SyncError;
pub use reconcile::{BlobComparison, ConfigReconciler, ReconcileOutcome};
