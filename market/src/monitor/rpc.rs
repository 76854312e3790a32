// market/src/monitor/rpc.rs

//! In-process node RPC backend.
//!
//! This implementation of [`NodeRpc`] is useful for unit tests, demos, and
//! the gateway's dev tooling: blocks pushed with [`ChannelNodeRpc::publish_block`]
//! fan out to every live subscription, and per-address balances are plain
//! settable values. A deployment against a real node swaps this for a
//! client over the node's wire protocol; the monitor only sees the trait.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::types::{Address, Block};

use super::{MonitorError, NodeRpc};

/// Capacity of each subscriber channel. Blocks beyond this while a
/// subscriber lags are dropped for that subscriber.
const SUBSCRIBER_BUFFER: usize = 64;

/// In-process implementation of [`NodeRpc`].
#[derive(Default)]
pub struct ChannelNodeRpc {
    subscribers: Mutex<Vec<mpsc::Sender<Block>>>,
    balances: Mutex<HashMap<Address, u64>>,
}

impl ChannelNodeRpc {
    /// Creates a new source with no subscribers and no balances.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers a block to every live subscription, in call order.
    ///
    /// Returns the number of subscribers the block was delivered to.
    /// Closed subscriptions are pruned.
    pub fn publish_block(&self, block: Block) -> usize {
        let mut subscribers = self
            .subscribers
            .lock()
            .expect("subscriber list lock poisoned");

        subscribers.retain(|tx| !tx.is_closed());

        let mut delivered = 0usize;
        for tx in subscribers.iter() {
            if tx.try_send(block.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Sets the confirmed balance reported for an address, in sompi.
    pub fn set_balance(&self, address: Address, sompi: u64) {
        self.balances
            .lock()
            .expect("balance map lock poisoned")
            .insert(address, sompi);
    }

    /// Returns the number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self
            .subscribers
            .lock()
            .expect("subscriber list lock poisoned");
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }
}

impl NodeRpc for ChannelNodeRpc {
    fn subscribe_blocks(&self) -> Result<mpsc::Receiver<Block>, MonitorError> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.subscribers
            .lock()
            .expect("subscriber list lock poisoned")
            .push(tx);
        Ok(rx)
    }

    async fn balance(&self, address: &Address) -> Result<u64, MonitorError> {
        let balances = self.balances.lock().expect("balance map lock poisoned");
        Ok(balances.get(address).copied().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_fans_out_to_all_subscribers() {
        let rpc = ChannelNodeRpc::new();
        let mut rx1 = rpc.subscribe_blocks().expect("subscribe");
        let mut rx2 = rpc.subscribe_blocks().expect("subscribe");

        assert_eq!(rpc.publish_block(Block::default()), 2);

        assert!(rx1.recv().await.is_some());
        assert!(rx2.recv().await.is_some());
    }

    #[tokio::test]
    async fn dropped_subscribers_are_pruned() {
        let rpc = ChannelNodeRpc::new();
        let rx = rpc.subscribe_blocks().expect("subscribe");
        assert_eq!(rpc.subscriber_count(), 1);

        drop(rx);
        assert_eq!(rpc.publish_block(Block::default()), 0);
        assert_eq!(rpc.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn unknown_addresses_have_zero_balance() {
        let rpc = ChannelNodeRpc::new();
        let address = Address("kaspa:qqx".to_string());
        assert_eq!(rpc.balance(&address).await.unwrap(), 0);

        rpc.set_balance(address.clone(), 42);
        assert_eq!(rpc.balance(&address).await.unwrap(), 42);
    }
}
