//! Core domain types used by the marketplace
//!
//! This module defines strongly-typed addresses, task identifiers, and
//! amount conversions that are shared across the settlement core. The goal
//! is to avoid "naked" strings and floats in public APIs and instead use
//! domain-specific newtypes.

use serde::{Deserialize, Serialize};

/// Task, worker, and notification types.
pub mod task;

/// Block wire types delivered by the node's block-added event stream.
pub mod block;

pub use block::{Block, Transaction, TxInput, TxOutput};
pub use task::{PaymentNotification, Rank, Task, TaskStatus, Worker};

/// Number of sompi (the chain's smallest integer unit) per KAS.
pub const SOMPI_PER_KAS: u64 = 100_000_000;

/// Sentinel used when a transaction has no resolvable sender address.
///
/// In a UTXO model there is no canonical single "from" address; the monitor
/// reports the first input's previous-output address when available and
/// this sentinel otherwise.
pub const UNKNOWN_SENDER: &str = "Unknown sender";

/// Converts an amount in sompi to its KAS display value.
pub fn sompi_to_kas(sompi: u64) -> f64 {
    sompi as f64 / SOMPI_PER_KAS as f64
}

/// Converts a KAS display amount to sompi, truncating sub-sompi precision.
pub fn kas_to_sompi(kas: f64) -> u64 {
    (kas * SOMPI_PER_KAS as f64).floor() as u64
}

/// Formats a KAS amount with full sompi precision for display.
pub fn format_kas(amount: f64) -> String {
    format!("{amount:.8} KAS")
}

/// Strongly-typed chain address.
///
/// Addresses are carried as opaque strings in the `kaspa:` format. The
/// wrapper exists so the watched-address registry and block scanner cannot
/// accidentally mix addresses with other string-shaped data.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    /// Derives the dedicated payment address for a task.
    ///
    /// This is a placeholder, not real HD-wallet derivation: the address is
    /// a deterministic function of the task id (BLAKE3 of the id bytes,
    /// rendered into the `kaspa:qq…` shape) so that every task gets a
    /// unique, stable address that is never reused across tasks.
    pub fn for_task(task_id: &TaskId) -> Self {
        let digest = blake3::hash(task_id.as_str().as_bytes());
        let body = hex::encode(digest.as_bytes());
        Address(format!("kaspa:qq{}", &body[..59]))
    }

    /// Checks whether a string is shaped like a valid address.
    ///
    /// Only the `kaspa:` prefix and the payload character set and length
    /// are checked; no checksum validation is performed.
    pub fn is_valid(candidate: &str) -> bool {
        let Some(body) = candidate.strip_prefix("kaspa:") else {
            return false;
        };
        (61..=63).contains(&body.len())
            && body
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
    }

    /// Returns the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque unique task identifier.
///
/// The prefix encodes the task's origin: `task_` for locally created tasks
/// and `tg_` for tasks adopted from the external intake bridge. The prefix
/// is informational, except that it routes the post-completion callback
/// back to the bridge.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

/// Prefix carried by task ids originating from the intake bridge.
pub const EXTERNAL_ID_PREFIX: &str = "tg_";

impl TaskId {
    /// Mints a new local task id from a millisecond timestamp and a
    /// per-process sequence number (two tasks created in the same
    /// millisecond must not collide).
    pub fn new_local(timestamp_ms: u64, seq: u64) -> Self {
        TaskId(format!("task_{timestamp_ms}_{seq}"))
    }

    /// Returns `true` if this id marks a task adopted from the bridge.
    pub fn is_external(&self) -> bool {
        self.0.starts_with(EXTERNAL_ID_PREFIX)
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns the current wall-clock time in milliseconds since Unix epoch.
///
/// On error (system clock before epoch) this falls back to 0.
pub fn current_unix_millis() -> u64 {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sompi_conversion_roundtrip_at_display_precision() {
        assert_eq!(sompi_to_kas(100_000_000), 1.0);
        assert_eq!(sompi_to_kas(50_000_000), 0.5);
        assert_eq!(kas_to_sompi(1.0), 100_000_000);
        assert_eq!(kas_to_sompi(0.5), 50_000_000);
    }

    #[test]
    fn format_kas_uses_full_sompi_precision() {
        assert_eq!(format_kas(0.8), "0.80000000 KAS");
    }

    #[test]
    fn task_addresses_are_deterministic_and_distinct() {
        let a = Address::for_task(&TaskId("task_1".to_string()));
        let b = Address::for_task(&TaskId("task_1".to_string()));
        let c = Address::for_task(&TaskId("task_2".to_string()));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(Address::is_valid(a.as_str()), "derived: {a}");
    }

    #[test]
    fn address_validation_rejects_bad_shapes() {
        assert!(!Address::is_valid("qqabcdef"));
        assert!(!Address::is_valid("kaspa:short"));
        assert!(!Address::is_valid(&format!("kaspa:{}", "A".repeat(62))));
    }

    #[test]
    fn external_prefix_routes_completion_callbacks() {
        assert!(TaskId("tg_1700000000".to_string()).is_external());
        assert!(!TaskId::new_local(1_700_000_000_000, 0).is_external());
    }
}
