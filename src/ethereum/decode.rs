//! Decodes transaction receipts and raw logs into named event occurrences.
//!
//! `decode_log` is total: a log that matches nothing in the ABI, or that fails
//! to decode against its matched signature, comes back tagged `Unknown` with
//! the raw topics/data attached. One bad log never aborts a batch.

use alloy::{
    dyn_abi::{DynSolValue, EventExt},
    rpc::types::{Log, TransactionReceipt},
};
use serde_json::{Map, Value};
use tracing::debug;

use super::{display_name, registry::AbiRegistry, DecodedEvent};

pub const UNKNOWN_EVENT: &str = "Unknown";

/// Decode a single log against the registry's events. Matching is by the
/// first topic (the event signature hash), in ABI declaration order; the
/// first match wins even in the face of a hash collision.
pub fn decode_log(registry: &AbiRegistry, log: &Log) -> DecodedEvent {
    let topics = log.topics();
    let Some(topic0) = topics.first() else {
        return unknown(log, "log has no topics");
    };

    let Some(event) = registry.events().iter().find(|e| e.selector() == *topic0) else {
        return unknown(log, "no event in the ABI matches the log signature");
    };

    let decoded = match event.decode_log_parts(topics.iter().copied(), log.data().data.as_ref(), false) {
        Ok(decoded) => decoded,
        Err(e) => {
            debug!("log failed to decode against '{}': {}", event.name, e);
            return unknown(log, &format!("failed to decode against '{}': {e}", event.name));
        }
    };

    // Indexed values come from topic slots, the rest from the data payload;
    // zip them back together in declaration order.
    let mut indexed = decoded.indexed.into_iter();
    let mut body = decoded.body.into_iter();
    let mut args = Map::new();
    for (index, input) in event.inputs.iter().enumerate() {
        let value = if input.indexed { indexed.next() } else { body.next() };
        let Some(value) = value else {
            return unknown(log, &format!("decoded value count mismatch for '{}'", event.name));
        };
        args.insert(display_name(&input.name, index), render_value(&value));
    }

    DecodedEvent {
        name: event.name.clone(),
        args,
        block_number: log.block_number,
        transaction_hash: log.transaction_hash,
        log_index: log.log_index,
        decode_error: None,
    }
}

/// Decode every log in a confirmed receipt. Per-entry failures surface as
/// `Unknown` entries in place.
pub fn decode_receipt(registry: &AbiRegistry, receipt: &TransactionReceipt) -> Vec<DecodedEvent> {
    receipt
        .inner
        .logs()
        .iter()
        .map(|log| decode_log(registry, log))
        .collect()
}

fn unknown(log: &Log, reason: &str) -> DecodedEvent {
    let mut args = Map::new();
    args.insert(
        "topics".to_string(),
        Value::Array(
            log.topics()
                .iter()
                .map(|t| Value::String(format!("0x{:x}", t)))
                .collect(),
        ),
    );
    args.insert(
        "data".to_string(),
        Value::String(format!("0x{}", hex::encode(&log.data().data))),
    );
    DecodedEvent {
        name: UNKNOWN_EVENT.to_string(),
        args,
        block_number: log.block_number,
        transaction_hash: log.transaction_hash,
        log_index: log.log_index,
        decode_error: Some(reason.to_string()),
    }
}

/// Render a decoded value for the presentation layer. Integers always become
/// decimal strings; a round-trip through f64 would silently lose precision.
pub fn render_value(value: &DynSolValue) -> Value {
    match value {
        DynSolValue::Address(addr) => Value::String(format!("0x{:x}", addr)),
        DynSolValue::Uint(num, _) => Value::String(num.to_string()),
        DynSolValue::Int(num, _) => Value::String(num.to_string()),
        DynSolValue::Bool(b) => Value::Bool(*b),
        DynSolValue::String(s) => Value::String(s.clone()),
        DynSolValue::Bytes(bytes) => Value::String(format!("0x{}", hex::encode(bytes))),
        DynSolValue::FixedBytes(word, len) => {
            Value::String(format!("0x{}", hex::encode(&word[..*len])))
        }
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            Value::Array(items.iter().map(render_value).collect())
        }
        DynSolValue::Function(f) => Value::String(format!("0x{}", hex::encode(f.as_slice()))),
        other => Value::String(format!("{other:?}")),
    }
}

/// Render a function's return values: a single output flattens to its value,
/// multiple outputs become an array.
pub fn render_values(values: &[DynSolValue]) -> Value {
    match values {
        [] => Value::Null,
        [single] => render_value(single),
        many => Value::Array(many.iter().map(render_value).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, Bytes, LogData, B256, U256};

    fn transfer_registry() -> AbiRegistry {
        AbiRegistry::parse(
            r#"[
                {"type":"event","name":"Transfer","anonymous":false,
                 "inputs":[{"name":"from","type":"address","indexed":true},
                           {"name":"to","type":"address","indexed":true},
                           {"name":"value","type":"uint256","indexed":false}]}
            ]"#,
        )
        .unwrap()
    }

    fn address_topic(address: Address) -> B256 {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(address.as_slice());
        B256::from(word)
    }

    fn raw_log(topics: Vec<B256>, data: Vec<u8>) -> Log {
        Log {
            inner: alloy::primitives::Log {
                address: Address::repeat_byte(0x11),
                data: LogData::new_unchecked(topics, Bytes::from(data)),
            },
            block_number: Some(7),
            transaction_hash: Some(B256::repeat_byte(0xab)),
            log_index: Some(3),
            ..Default::default()
        }
    }

    #[test]
    fn decodes_matching_log_in_declaration_order() {
        let registry = transfer_registry();
        let selector = registry.events()[0].selector();
        let from = Address::repeat_byte(0x01);
        let to = Address::repeat_byte(0x02);
        let amount = DynSolValue::Uint(U256::from(1_000_000u64), 256).abi_encode();

        let log = raw_log(
            vec![selector, address_topic(from), address_topic(to)],
            amount,
        );
        let decoded = decode_log(&registry, &log);

        assert_eq!(decoded.name, "Transfer");
        assert!(decoded.decode_error.is_none());
        let keys: Vec<_> = decoded.args.keys().cloned().collect();
        assert_eq!(keys, vec!["from", "to", "value"]);
        assert_eq!(
            decoded.args["value"],
            Value::String("1000000".to_string())
        );
        assert_eq!(decoded.block_number, Some(7));
        assert_eq!(decoded.log_index, Some(3));
    }

    #[test]
    fn unmatched_signature_yields_unknown_not_error() {
        let registry = transfer_registry();
        let log = raw_log(vec![B256::repeat_byte(0xff)], vec![0u8; 32]);
        let decoded = decode_log(&registry, &log);

        assert_eq!(decoded.name, UNKNOWN_EVENT);
        assert!(decoded.decode_error.is_some());
        assert!(decoded.args.contains_key("topics"));
        assert!(decoded.args.contains_key("data"));
    }

    #[test]
    fn topicless_log_yields_unknown() {
        let registry = transfer_registry();
        let decoded = decode_log(&registry, &raw_log(vec![], vec![]));
        assert_eq!(decoded.name, UNKNOWN_EVENT);
        assert_eq!(decoded.decode_error.as_deref(), Some("log has no topics"));
    }

    #[test]
    fn shape_mismatch_yields_unknown() {
        let registry = transfer_registry();
        let selector = registry.events()[0].selector();
        // Right signature but missing indexed topics and data.
        let decoded = decode_log(&registry, &raw_log(vec![selector], vec![]));
        assert_eq!(decoded.name, UNKNOWN_EVENT);
        assert!(decoded.decode_error.is_some());
    }

    #[test]
    fn large_integers_render_without_precision_loss() {
        let value = DynSolValue::Uint(U256::MAX, 256);
        assert_eq!(render_value(&value), Value::String(U256::MAX.to_string()));
    }

    #[test]
    fn function_values_render_as_hex() {
        let value = DynSolValue::Function(alloy::primitives::Function::from([0x11u8; 24]));
        assert_eq!(
            render_value(&value),
            Value::String(format!("0x{}", "11".repeat(24)))
        );
    }

    #[test]
    fn multiple_outputs_render_as_array() {
        let values = [
            DynSolValue::Bool(true),
            DynSolValue::Uint(U256::from(5u64), 256),
        ];
        assert_eq!(
            render_values(&values),
            Value::Array(vec![Value::Bool(true), Value::String("5".to_string())])
        );
        assert_eq!(render_values(&values[..1]), Value::Bool(true));
        assert_eq!(render_values(&[]), Value::Null);
    }
}
