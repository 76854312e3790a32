//! Event-driven payment detection.
//!
//! This module defines a trait [`NodeRpc`] that abstracts over the chain
//! node's RPC surface, and a [`PaymentMonitor`] that:
//!
//! - subscribes to the node's block-added event stream,
//! - scans each confirmed block's outputs for transfers to addresses
//!   currently of interest, and
//! - invokes the registered callback once per matching output.
//!
//! Detection is purely event-driven; there is no polling of address
//! balances. Blocks are processed in arrival order, and output order
//! within a block is preserved. No confirmation-depth requirement is
//! modeled; this is a design simplification, not a correctness guarantee for a
//! production payment system.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::types::{Address, Block, sompi_to_kas};

mod registry;
mod rpc;

pub use registry::{DetectionCallback, WatchRegistry};
pub use rpc::ChannelNodeRpc;

/// A confirmed transfer to a watched address, reported once per matching
/// transaction output.
#[derive(Clone, Debug)]
pub struct PaymentDetection {
    pub tx_id: String,
    /// Transferred amount in KAS (converted from sompi).
    pub amount: f64,
    pub to_address: Address,
    /// Best-effort sender; UTXO transactions have no canonical single
    /// sender, so this is the first input's previous-output address or
    /// the unknown-sender sentinel.
    pub from_address: String,
    /// Detection time, milliseconds since Unix epoch.
    pub timestamp: u64,
}

/// Errors that can occur while talking to the chain node.
#[derive(Debug)]
pub enum MonitorError {
    /// The block-event subscription could not be established.
    Subscribe(String),
    /// An RPC query failed.
    Rpc(String),
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorError::Subscribe(msg) => write!(f, "block subscription failed: {msg}"),
            MonitorError::Rpc(msg) => write!(f, "node rpc error: {msg}"),
        }
    }
}

impl std::error::Error for MonitorError {}

/// Abstract chain-node RPC surface used by the payment monitor.
///
/// Implementations are responsible for delivering each newly confirmed
/// block on the receiver returned by [`NodeRpc::subscribe_blocks`] and for
/// answering confirmed-balance queries in sompi.
pub trait NodeRpc: Send + Sync + 'static {
    /// Establishes a block-added subscription.
    ///
    /// Each call returns an independent receiver. Propagates an error when
    /// the subscription cannot be established.
    fn subscribe_blocks(&self) -> Result<mpsc::Receiver<Block>, MonitorError>;

    /// Returns the confirmed balance of an address in sompi.
    fn balance(&self, address: &Address) -> impl Future<Output = Result<u64, MonitorError>> + Send;
}

/// Event-driven payment monitor.
///
/// The monitor owns the watched-address registry and a spawned dispatch
/// loop that scans incoming blocks. It is shared behind an [`Arc`]; all
/// methods take `&self`.
pub struct PaymentMonitor<R> {
    rpc: Arc<R>,
    registry: Arc<WatchRegistry>,
    dispatch_loop: Mutex<Option<JoinHandle<()>>>,
}

impl<R> PaymentMonitor<R>
where
    R: NodeRpc,
{
    /// Creates a monitor over the given node RPC handle.
    pub fn new(rpc: Arc<R>) -> Self {
        Self {
            rpc,
            registry: Arc::new(WatchRegistry::new()),
            dispatch_loop: Mutex::new(None),
        }
    }

    /// Starts monitoring: subscribes to block-added events and spawns the
    /// dispatch loop.
    ///
    /// Idempotent: calling while already monitoring is a no-op. If the
    /// subscription cannot be established the error is propagated and the
    /// monitor is considered not started.
    pub fn start_monitoring(&self) -> Result<(), MonitorError> {
        let mut guard = self
            .dispatch_loop
            .lock()
            .expect("monitor handle lock poisoned");

        if guard.as_ref().is_some_and(|h| !h.is_finished()) {
            return Ok(());
        }

        let mut blocks = self.rpc.subscribe_blocks()?;
        let registry = self.registry.clone();

        let handle = tokio::spawn(async move {
            // Blocks are handled strictly in arrival order; no batching
            // across blocks.
            while let Some(block) = blocks.recv().await {
                let fired = registry.dispatch_block(&block);
                if fired > 0 {
                    tracing::debug!(detections = fired, "block scan complete");
                }
            }
            tracing::debug!("block stream ended");
        });

        *guard = Some(handle);
        tracing::info!("payment monitoring started");
        Ok(())
    }

    /// Stops monitoring: tears down the subscription loop.
    ///
    /// Idempotent no-op if not monitoring. Callback invocations already
    /// dispatched are not cancelled; they run to completion.
    pub fn stop_monitoring(&self) {
        let mut guard = self
            .dispatch_loop
            .lock()
            .expect("monitor handle lock poisoned");
        if let Some(handle) = guard.take() {
            handle.abort();
            tracing::info!("payment monitoring stopped");
        }
    }

    /// Returns `true` while the dispatch loop is running.
    pub fn is_monitoring(&self) -> bool {
        self.dispatch_loop
            .lock()
            .expect("monitor handle lock poisoned")
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Registers interest in payments to an address. O(1).
    pub fn watch_address(
        &self,
        address: Address,
        callback: impl Fn(PaymentDetection) + Send + Sync + 'static,
    ) {
        self.registry.watch(address, callback);
    }

    /// Removes interest in an address. O(1); silent no-op when unknown.
    pub fn unwatch_address(&self, address: &Address) {
        self.registry.unwatch(address);
    }

    /// Returns the registry shared with the dispatch loop.
    pub fn registry(&self) -> &Arc<WatchRegistry> {
        &self.registry
    }

    /// On-demand confirmed balance of an address, in KAS.
    ///
    /// Query failures are swallowed and reported as a zero balance; this
    /// is documented as lossy for this reference scope.
    pub async fn check_balance(&self, address: &Address) -> f64 {
        match self.rpc.balance(address).await {
            Ok(sompi) => sompi_to_kas(sompi),
            Err(e) => {
                tracing::warn!(address = %address, "balance query failed: {e}");
                0.0
            }
        }
    }
}
