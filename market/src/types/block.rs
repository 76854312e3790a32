// market/src/types/block.rs

//! Block wire types.
//!
//! These mirror the shape of the node's "block added" notification: a block
//! carries a list of transactions, each with inputs referencing previous
//! outputs and outputs bearing a destination address and a value in sompi.
//! Only the fields the payment monitor needs are modeled; everything else
//! in the node's payload is ignored on decode.

use serde::{Deserialize, Serialize};

use super::Address;

/// A confirmed block as delivered by the block-added event stream.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

/// A transaction inside a block notification.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Transaction id; absent from some node payloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,
    #[serde(default)]
    pub inputs: Vec<TxInput>,
    #[serde(default)]
    pub outputs: Vec<TxOutput>,
}

/// A transaction input, reduced to the previous output's address.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxInput {
    /// Address of the output this input spends, when the node resolves it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_outpoint_address: Option<Address>,
}

/// A transaction output.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxOutput {
    /// Destination address, when the node resolves the script to one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    /// Transferred value in sompi.
    #[serde(default)]
    pub value: u64,
}

impl Transaction {
    /// Returns the transaction id, or `"unknown"` when the node omitted it.
    pub fn tx_id_or_unknown(&self) -> String {
        self.tx_id.clone().unwrap_or_else(|| "unknown".to_string())
    }

    /// Best-effort sender address.
    ///
    /// UTXO transactions have no canonical single sender; this returns the
    /// first input's previous-output address when present.
    pub fn sender_address(&self) -> Option<&Address> {
        self.inputs
            .first()
            .and_then(|input| input.previous_outpoint_address.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_is_first_inputs_previous_output() {
        let tx = Transaction {
            tx_id: Some("abc".to_string()),
            inputs: vec![
                TxInput {
                    previous_outpoint_address: Some(Address("kaspa:qqsender1".to_string())),
                },
                TxInput {
                    previous_outpoint_address: Some(Address("kaspa:qqsender2".to_string())),
                },
            ],
            outputs: vec![],
        };

        assert_eq!(tx.sender_address().unwrap().as_str(), "kaspa:qqsender1");
    }

    #[test]
    fn sender_absent_when_inputs_are_unresolved() {
        let tx = Transaction {
            tx_id: None,
            inputs: vec![TxInput {
                previous_outpoint_address: None,
            }],
            outputs: vec![],
        };

        assert!(tx.sender_address().is_none());
        assert_eq!(tx.tx_id_or_unknown(), "unknown");
    }

    #[test]
    fn sparse_node_payload_decodes_with_defaults() {
        let json = r#"{
            "transactions": [
                { "txId": "t1", "outputs": [ { "address": "kaspa:qqx", "value": 50000000 } ] }
            ]
        }"#;

        let block: Block = serde_json::from_str(json).expect("block parses");
        assert_eq!(block.transactions.len(), 1);
        let tx = &block.transactions[0];
        assert!(tx.inputs.is_empty());
        assert_eq!(tx.outputs[0].value, 50_000_000);
    }
}
