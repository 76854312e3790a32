//! Task ledger, state machine, and marketplace orchestration.
//!
//! The ledger owns the authoritative in-memory task collection and is the
//! sole mutator of worker aggregate state and the live balance. Lifecycle
//! transitions are:
//!
//! ```text
//! pending --[payment detected for task's address]--> active
//! active  --[worker submits work]-----------------> in_progress
//! in_progress --[verification approved]-----------> completed
//! in_progress --[verification rejected]-----------> active
//! ```
//!
//! Transition guards reject calls from any other state as silent no-ops.
//! On top of the ledger sits [`Marketplace`], which wires the payment
//! monitor, the evaluator, the intake bridge, and notifications into the
//! settlement flow.

mod service;
mod state;

pub use service::{Marketplace, SubmissionOutcome};
pub use state::{Settlement, TaskLedger, VerificationOutcome};
