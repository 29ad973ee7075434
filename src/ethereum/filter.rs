//! Builds log-filter specifications from user selections.
//!
//! Only indexed parameters can constrain a query; that is a protocol-level
//! property of topic slots, so values supplied for non-indexed parameters are
//! ignored rather than rejected.

use alloy::{
    dyn_abi::DynSolValue,
    json_abi::Event,
    primitives::{keccak256, Address, B256},
    rpc::types::Filter,
};
use tracing::debug;

use super::{coerce, display_name, error::InvalidArgument, ParamValues};

/// Build an `eth_getLogs` filter for one event of one contract. `values` is
/// keyed by the event input's declaration index; empty or absent values leave
/// that topic slot unconstrained. Absent block bounds stay unbounded and the
/// node applies its earliest/latest defaults.
pub fn build_filter(
    address: Address,
    event: &Event,
    values: &ParamValues,
    from_block: Option<u64>,
    to_block: Option<u64>,
) -> Result<Filter, InvalidArgument> {
    let mut filter = Filter::new().address(address).event_signature(event.selector());
    if let Some(block) = from_block {
        filter = filter.from_block(block);
    }
    if let Some(block) = to_block {
        filter = filter.to_block(block);
    }

    let mut topic_slot = 0usize;
    for (index, input) in event.inputs.iter().enumerate() {
        if !input.indexed {
            if values.get(index).is_some_and(|raw| !raw.trim().is_empty()) {
                debug!(
                    "ignoring filter value for non-indexed parameter '{}'",
                    display_name(&input.name, index)
                );
            }
            continue;
        }
        topic_slot += 1;
        let Some(raw) = values.get(index).filter(|raw| !raw.trim().is_empty()) else {
            continue;
        };
        let value = coerce::coerce_event_param(input, index, raw)?;
        let word = topic_word(&value);
        filter = match topic_slot {
            1 => filter.topic1(word),
            2 => filter.topic2(word),
            3 => filter.topic3(word),
            // the registry drops events with more indexed params than slots
            _ => filter,
        };
    }

    Ok(filter)
}

/// Topic encoding of an equality constraint: word-sized values go in
/// directly, dynamic values are stored by the protocol as their keccak hash.
fn topic_word(value: &DynSolValue) -> B256 {
    match value.as_word() {
        Some(word) => word,
        None => keccak256(value.abi_encode_packed()),
    }
}
