pub mod coerce;
pub mod decode;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod provider;
pub mod registry;

use alloy::{
    dyn_abi::DynSolValue,
    json_abi::Function,
    primitives::{Address, B256},
    rpc::types::TransactionReceipt,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// A fully prepared invocation: target, selected function descriptor and
/// already-coerced arguments. Built per user action, discarded after dispatch.
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub to: Address,
    pub function: Function,
    pub args: Vec<DynSolValue>,
    /// Sender override for writes; defaults to the wallet's first account.
    pub from: Option<Address>,
}

/// Normalized result of a dispatched invocation. Failures are folded into the
/// `Reverted`/`Failed` variants so callers never deal with a second error channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CallOutcome {
    ReadResult {
        value: serde_json::Value,
    },
    TxSubmitted {
        hash: B256,
    },
    TxConfirmed {
        receipt: ReceiptSummary,
        events: Vec<DecodedEvent>,
    },
    Reverted {
        reason: String,
    },
    Failed {
        message: String,
    },
}

/// The receipt fields worth showing after a confirmed write.
#[derive(Debug, Clone, Serialize)]
pub struct ReceiptSummary {
    pub hash: B256,
    pub block_number: u64,
    pub gas_used: u64,
    pub effective_gas_price: String,
    pub status: bool,
}

impl ReceiptSummary {
    pub fn from_receipt(receipt: &TransactionReceipt) -> Self {
        Self {
            hash: receipt.transaction_hash,
            block_number: receipt.block_number.unwrap_or_default(),
            gas_used: receipt.gas_used.try_into().unwrap_or(u64::MAX),
            effective_gas_price: receipt.effective_gas_price.to_string(),
            status: receipt.status(),
        }
    }
}

/// One decoded log entry. `args` keeps ABI declaration order; integers are
/// rendered as decimal strings so no precision is lost on the way out.
#[derive(Debug, Clone, Serialize)]
pub struct DecodedEvent {
    pub name: String,
    pub args: serde_json::Map<String, serde_json::Value>,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<B256>,
    pub log_index: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decode_error: Option<String>,
}

/// Raw per-parameter form input, keyed by declaration index rather than by
/// name so anonymous and duplicate-named parameters stay addressable.
#[derive(Debug, Clone, Default)]
pub struct ParamValues {
    values: BTreeMap<usize, String>,
}

impl ParamValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, index: usize, raw: impl Into<String>) {
        self.values.insert(index, raw.into());
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(&index).map(String::as_str)
    }

    /// Positional values, e.g. repeated `--arg` flags in declaration order.
    pub fn from_ordered<I, S>(raws: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut values = Self::new();
        for (index, raw) in raws.into_iter().enumerate() {
            values.set(index, raw);
        }
        values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Parameter name for display and diagnostics; anonymous parameters get a
/// positional placeholder.
pub fn display_name(name: &str, index: usize) -> String {
    if name.is_empty() {
        format!("arg{index}")
    } else {
        name.to_string()
    }
}
