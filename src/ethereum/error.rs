use alloy::{
    dyn_abi::{DynSolType, DynSolValue},
    primitives::Bytes,
};
use thiserror::Error;

/// The ABI document cannot be used at all. Blocks contract selection entirely.
#[derive(Debug, Error)]
pub enum InvalidAbi {
    #[error("malformed JSON: {detail}")]
    MalformedJson { detail: String },
    #[error("not an array (expected a JSON array of ABI entries, or an object with an \"abi\" array)")]
    NotAnArray,
    #[error("no usable entries (no valid function or event definitions remain)")]
    NoUsableEntries,
}

/// A single form value could not be converted to its ABI type. Addressable
/// per field so the caller can point at the offending input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid value for '{name}' ({ty}): {reason} (got '{raw}')")]
pub struct InvalidArgument {
    pub name: String,
    pub ty: String,
    pub raw: String,
    pub reason: String,
}

impl InvalidArgument {
    pub fn new(
        name: impl Into<String>,
        ty: impl Into<String>,
        raw: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            raw: raw.into(),
            reason: reason.into(),
        }
    }
}

/// Structured failure surface of the RPC/wallet collaborators. A revert keeps
/// whatever the node gave us (reason string, raw revert data) so the reason
/// can be explained without scraping transport error text downstream.
#[derive(Debug, Error, Clone)]
pub enum RpcFailure {
    #[error("execution reverted")]
    Reverted {
        reason: Option<String>,
        data: Option<Bytes>,
    },
    #[error("transport error: {0}")]
    Transport(String),
}

/// Selector of the standard `Error(string)` revert payload.
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

const GENERIC_REVERT_EXPLANATION: &str = "execution reverted without a reason; \
    common causes are invalid parameters, a failed precondition, insufficient \
    permissions, or a conflicting contract state";

/// Best-effort human explanation of a revert: structured reason string first,
/// then an `Error(string)` payload decoded from the revert data, then the raw
/// custom-error selector, then a fixed generic explanation.
pub fn explain_revert(reason: Option<&str>, data: Option<&Bytes>) -> String {
    if let Some(reason) = reason.map(str::trim).filter(|r| !r.is_empty()) {
        return format!("execution reverted: {reason}");
    }
    if let Some(data) = data {
        if let Some(message) = decode_error_string(data) {
            return format!("execution reverted: {message}");
        }
        if data.len() >= 4 {
            return format!(
                "execution reverted with custom error 0x{}",
                hex::encode(&data[..4])
            );
        }
    }
    GENERIC_REVERT_EXPLANATION.to_string()
}

fn decode_error_string(data: &Bytes) -> Option<String> {
    let payload = data.strip_prefix(&ERROR_STRING_SELECTOR[..])?;
    match DynSolType::String.abi_decode(payload) {
        Ok(DynSolValue::String(message)) => Some(message),
        _ => None,
    }
}
