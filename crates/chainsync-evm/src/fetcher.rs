//! EVM block fetcher.
//!
//! Uses JSON-RPC `eth_blockNumber` and `eth_getBlockByNumber` (with full
//! transaction objects) to read blocks from a node.

use async_trait::async_trait;
use serde_json::{json, Value};

use chainsync_core::types::{Block, BlockNumber, RawTransaction};

use crate::rpc::{HttpRpcClient, RpcError};

/// Trait for fetching EVM data from a JSON-RPC provider.
#[async_trait]
pub trait EvmRpcClient: Send + Sync {
    async fn get_block_number(&self) -> Result<BlockNumber, RpcError>;

    /// `Ok(None)` if the node does not have the block yet.
    async fn get_block(&self, number: BlockNumber) -> Result<Option<Block>, RpcError>;
}

#[async_trait]
impl EvmRpcClient for HttpRpcClient {
    async fn get_block_number(&self) -> Result<BlockNumber, RpcError> {
        let v = self.request("eth_blockNumber", vec![]).await?;
        let s = v
            .as_str()
            .ok_or_else(|| RpcError::Malformed(format!("eth_blockNumber returned {v}")))?;
        parse_hex_u64(s).ok_or_else(|| RpcError::Malformed(format!("bad block number {s:?}")))
    }

    async fn get_block(&self, number: BlockNumber) -> Result<Option<Block>, RpcError> {
        let v = self
            .request("eth_getBlockByNumber", vec![json!(format!("{number:#x}")), json!(true)])
            .await?;
        if v.is_null() {
            return Ok(None);
        }
        block_from_json(&v).map(Some)
    }
}

/// Parse a hex-encoded quantity (with or without `0x`) to u64.
pub fn parse_hex_u64(s: &str) -> Option<u64> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).ok()
}

/// Convert an `eth_getBlockByNumber` result into a [`Block`].
///
/// Individual transaction fields are not validated here; that is the
/// extractor's job. Transactions given as bare hashes are rejected, since the
/// call must be made with full transaction objects.
pub fn block_from_json(v: &Value) -> Result<Block, RpcError> {
    let number = v["number"]
        .as_str()
        .and_then(parse_hex_u64)
        .ok_or_else(|| RpcError::Malformed("block without a number".into()))?;

    let transactions = match &v["transactions"] {
        Value::Null => vec![],
        Value::Array(txs) => txs
            .iter()
            .map(|tx| {
                if !tx.is_object() {
                    return Err(RpcError::Malformed(format!(
                        "block {number}: expected transaction object, got {tx}"
                    )));
                }
                Ok(serde_json::from_value::<RawTransaction>(tx.clone())?)
            })
            .collect::<Result<Vec<_>, _>>()?,
        other => {
            return Err(RpcError::Malformed(format!(
                "block {number}: transactions is {other}"
            )))
        }
    };

    Ok(Block::new(number, transactions))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_u64_basic() {
        assert_eq!(parse_hex_u64("0x1"), Some(1));
        assert_eq!(parse_hex_u64("0xff"), Some(255));
        assert_eq!(parse_hex_u64("1234"), Some(0x1234));
        assert_eq!(parse_hex_u64("0xzz"), None);
    }

    #[test]
    fn block_with_full_transactions() {
        let v = json!({
            "number": "0x12a05f200",
            "hash": "0xabc",
            "transactions": [
                {
                    "hash": "0x01",
                    "from": "0xaaaa",
                    "to": "0xbbbb",
                    "value": "0xde0b6b3a7640000",
                    "gas": "0x5208",
                    "nonce": "0x0"
                },
                {
                    "hash": "0x02",
                    "from": "0xaaaa",
                    "to": null,
                    "value": "0x0",
                    "input": "0x6080"
                }
            ]
        });

        let block = block_from_json(&v).unwrap();
        assert_eq!(block.number, 5_000_000_000);
        assert_eq!(block.transactions.len(), 2);
        assert_eq!(block.transactions[0].value.as_deref(), Some("0xde0b6b3a7640000"));
        assert_eq!(block.transactions[1].to, None);
    }

    #[test]
    fn transaction_fields_may_be_missing() {
        let v = json!({ "number": "0x1", "transactions": [{ "from": "0xaaaa" }] });
        let block = block_from_json(&v).unwrap();
        assert_eq!(block.transactions[0].hash, None);
    }

    #[test]
    fn hash_only_transactions_rejected() {
        let v = json!({ "number": "0x1", "transactions": ["0x01", "0x02"] });
        assert!(matches!(block_from_json(&v), Err(RpcError::Malformed(_))));
    }

    #[test]
    fn block_without_number_rejected() {
        assert!(block_from_json(&json!({ "transactions": [] })).is_err());
    }

    #[test]
    fn empty_block() {
        let block = block_from_json(&json!({ "number": "0x10", "transactions": [] })).unwrap();
        assert!(block.is_empty());
        assert_eq!(block.number, 16);
    }
}
