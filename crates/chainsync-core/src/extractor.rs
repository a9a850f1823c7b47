//! Transaction extractor — maps a block's raw transactions to records.

use alloy_primitives::U256;

use crate::error::SyncError;
use crate::types::{Block, BlockNumber, RawTransaction, TransactionRecord};

/// Result of extracting one block.
#[derive(Debug, Default)]
pub struct Extraction {
    /// Well-formed records, in block order.
    pub records: Vec<TransactionRecord>,
    /// One `SyncError::Extraction` per dropped transaction.
    pub rejected: Vec<SyncError>,
}

/// Extract every transaction of `block`.
///
/// Malformed transactions are dropped and reported; they never fail the block.
pub fn extract(block: &Block) -> Extraction {
    let mut out = Extraction {
        records: Vec::with_capacity(block.transactions.len()),
        rejected: Vec::new(),
    };
    for (index, raw) in block.transactions.iter().enumerate() {
        match extract_one(block.number, index, raw) {
            Ok(record) => out.records.push(record),
            Err(err) => out.rejected.push(err),
        }
    }
    out
}

/// Normalize a single raw transaction.
pub fn extract_one(
    block_number: BlockNumber,
    index: usize,
    raw: &RawTransaction,
) -> Result<TransactionRecord, SyncError> {
    let malformed = |reason: String| SyncError::Extraction {
        block_number,
        index,
        reason,
    };

    let hash = match raw.hash.as_deref() {
        Some(h) if !h.is_empty() => h.to_string(),
        _ => return Err(malformed("missing hash".into())),
    };
    let from_address = raw
        .from
        .clone()
        .ok_or_else(|| malformed(format!("missing sender for {hash}")))?;
    let value = normalize_value(raw.value.as_deref())
        .map_err(|reason| malformed(format!("{reason} for {hash}")))?;

    Ok(TransactionRecord {
        hash,
        from_address,
        to_address: raw.to.clone(),
        value,
    })
}

/// Convert a node quantity (`0x…` hex or decimal digits) to a decimal string.
///
/// An absent value is `"0"`.
pub fn normalize_value(value: Option<&str>) -> Result<String, String> {
    let Some(raw) = value else {
        return Ok("0".into());
    };
    let (digits, radix) = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (raw, 10),
    };
    if digits.is_empty() {
        return Err(format!("empty value {raw:?}"));
    }
    // `from_str_radix` skips `_` separators; node quantities never contain them.
    let well_formed = match radix {
        16 => digits.bytes().all(|b| b.is_ascii_hexdigit()),
        _ => digits.bytes().all(|b| b.is_ascii_digit()),
    };
    if !well_formed {
        return Err(format!("invalid value {raw:?}"));
    }
    U256::from_str_radix(digits, radix)
        .map(|v| v.to_string())
        .map_err(|e| format!("invalid value {raw:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_fields_verbatim() {
        let raw = RawTransaction::new("0xAbC", "0xFrom").to("0xTo").value("0x2a");
        let rec = extract_one(1, 0, &raw).unwrap();
        assert_eq!(rec.hash, "0xAbC");
        assert_eq!(rec.from_address, "0xFrom");
        assert_eq!(rec.to_address.as_deref(), Some("0xTo"));
        assert_eq!(rec.value, "42");
    }

    #[test]
    fn absent_recipient_stays_absent() {
        let rec = extract_one(1, 0, &RawTransaction::new("0x1", "0xa").value("0x0")).unwrap();
        assert_eq!(rec.to_address, None);
    }

    #[test]
    fn absent_value_is_zero() {
        let rec = extract_one(1, 0, &RawTransaction::new("0x1", "0xa")).unwrap();
        assert_eq!(rec.value, "0");
    }

    #[test]
    fn large_values_keep_precision() {
        // 2^256 - 1
        let max = format!("0x{}", "f".repeat(64));
        assert_eq!(
            normalize_value(Some(&max)).unwrap(),
            "115792089237316195423570985008687907853269984665640564039457584007913129639935"
        );
        assert_eq!(
            normalize_value(Some("1000000000000000000000")).unwrap(),
            "1000000000000000000000"
        );
    }

    #[test]
    fn rejects_garbage_values() {
        assert!(normalize_value(Some("0x")).is_err());
        assert!(normalize_value(Some("0xzz")).is_err());
        assert!(normalize_value(Some("-5")).is_err());
        assert!(normalize_value(Some("_")).is_err());
        assert!(normalize_value(Some("1_000")).is_err());
        assert!(normalize_value(Some("0x_ff")).is_err());
        assert!(normalize_value(Some(" 12")).is_err());
    }

    #[test]
    fn separator_in_value_drops_transaction() {
        let raw = RawTransaction::new("0x1", "0xa").value("1_000");
        let err = extract_one(4, 0, &raw).unwrap_err();
        assert!(matches!(err, SyncError::Extraction { block_number: 4, .. }));
    }

    #[test]
    fn missing_hash_drops_only_that_transaction() {
        let block = Block::new(
            9,
            vec![
                RawTransaction::new("0x1", "0xa"),
                RawTransaction { from: Some("0xb".into()), ..Default::default() },
                RawTransaction::new("0x3", "0xc"),
            ],
        );
        let out = extract(&block);
        let hashes: Vec<_> = out.records.iter().map(|r| r.hash.as_str()).collect();
        assert_eq!(hashes, ["0x1", "0x3"]);
        assert_eq!(out.rejected.len(), 1);
        assert!(matches!(
            out.rejected[0],
            SyncError::Extraction { block_number: 9, index: 1, .. }
        ));
    }
}
