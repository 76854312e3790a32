// market/src/monitor/registry.rs

//! Watched-address registry and block scanning.
//!
//! The registry maps each address of interest to a single detection
//! callback. Registering an address twice overwrites the prior callback
//! (last-writer-wins); callers must unwatch before an address stops being
//! relevant to avoid stale callback retention.
//!
//! Callbacks are looked up under the lock but invoked outside it, so a
//! callback may re-enter `watch`/`unwatch` without deadlocking. Registry
//! mutations are therefore safe to perform concurrently with an in-flight
//! block-processing pass.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::types::{Address, Block, UNKNOWN_SENDER, current_unix_millis, sompi_to_kas};

use super::PaymentDetection;

/// Callback invoked once per detected payment to a watched address.
pub type DetectionCallback = dyn Fn(PaymentDetection) + Send + Sync;

/// Registry of watched addresses owned by the payment monitor.
#[derive(Default)]
pub struct WatchRegistry {
    inner: Mutex<HashMap<Address, Arc<DetectionCallback>>>,
}

impl WatchRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers interest in an address. O(1); last-writer-wins when the
    /// address is already watched.
    pub fn watch(
        &self,
        address: Address,
        callback: impl Fn(PaymentDetection) + Send + Sync + 'static,
    ) {
        tracing::debug!(address = %address, "watching address");
        self.inner
            .lock()
            .expect("watch registry lock poisoned")
            .insert(address, Arc::new(callback));
    }

    /// Removes interest in an address. O(1); silently a no-op when the
    /// address is not being watched.
    pub fn unwatch(&self, address: &Address) {
        let removed = self
            .inner
            .lock()
            .expect("watch registry lock poisoned")
            .remove(address);
        if removed.is_some() {
            tracing::debug!(address = %address, "stopped watching address");
        }
    }

    /// Returns the number of addresses currently watched.
    pub fn watched_count(&self) -> usize {
        self.inner
            .lock()
            .expect("watch registry lock poisoned")
            .len()
    }

    /// Scans one block and fires a callback per matching output.
    ///
    /// Every transaction output whose destination is currently watched
    /// produces an independent callback invocation; multiple outputs in
    /// the same block to the same address each fire separately, with no
    /// deduplication or aggregation. Output order within the block is
    /// preserved. Returns the number of detections fired.
    pub fn dispatch_block(&self, block: &Block) -> usize {
        let mut fired = 0usize;

        for tx in &block.transactions {
            let tx_id = tx.tx_id_or_unknown();
            let from_address = tx
                .sender_address()
                .map(|a| a.0.clone())
                .unwrap_or_else(|| UNKNOWN_SENDER.to_string());

            for output in &tx.outputs {
                let Some(to_address) = &output.address else {
                    continue;
                };

                // Snapshot the callback, then invoke outside the lock.
                let callback = {
                    let watched = self.inner.lock().expect("watch registry lock poisoned");
                    watched.get(to_address).cloned()
                };

                if let Some(callback) = callback {
                    let detection = PaymentDetection {
                        tx_id: tx_id.clone(),
                        amount: sompi_to_kas(output.value),
                        to_address: to_address.clone(),
                        from_address: from_address.clone(),
                        timestamp: current_unix_millis(),
                    };
                    tracing::info!(
                        tx_id = %detection.tx_id,
                        amount = detection.amount,
                        to = %detection.to_address,
                        "payment detected"
                    );
                    callback(detection);
                    fired += 1;
                }
            }
        }

        fired
    }
}
