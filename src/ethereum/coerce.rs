//! Converts raw per-field text input into typed call arguments.
//!
//! Every rule here is a pure transform on one (parameter, raw text) pair:
//! identical input always yields the identical value or the identical
//! field-addressable error, before any network round-trip happens.

use alloy::{
    dyn_abi::{DynSolValue, Word},
    json_abi::{EventParam, Param},
    primitives::{Address, Sign, I256, U256},
};
use serde_json::Value;
use std::str::FromStr;

use super::{display_name, error::InvalidArgument, ParamValues};

/// Coerce one raw text value against a function/tuple parameter.
pub fn coerce(param: &Param, raw: &str) -> Result<DynSolValue, InvalidArgument> {
    let name = display_name(&param.name, 0);
    coerce_value(&name, &param.ty, &param.components, raw)
}

/// Coerce one raw text value against an event parameter (used by the query
/// planner for indexed-argument filters).
pub fn coerce_event_param(
    param: &EventParam,
    index: usize,
    raw: &str,
) -> Result<DynSolValue, InvalidArgument> {
    let name = display_name(&param.name, index);
    coerce_value(&name, &param.ty, &param.components, raw)
}

/// Coerce a full input list from per-slot form values. A missing slot is the
/// empty string, so untouched required fields fail with a precise diagnostic
/// instead of silently defaulting.
pub fn coerce_all(
    inputs: &[Param],
    values: &ParamValues,
) -> Result<Vec<DynSolValue>, InvalidArgument> {
    inputs
        .iter()
        .enumerate()
        .map(|(index, param)| {
            let name = display_name(&param.name, index);
            let raw = values.get(index).unwrap_or("");
            coerce_value(&name, &param.ty, &param.components, raw)
        })
        .collect()
}

fn coerce_value(
    name: &str,
    ty: &str,
    components: &[Param],
    raw: &str,
) -> Result<DynSolValue, InvalidArgument> {
    // Array suffixes strip from the right so nested arrays recurse naturally.
    if let Some((base, len)) = split_array_suffix(ty) {
        return coerce_array(name, ty, base, len, components, raw);
    }

    if ty == "tuple" {
        return coerce_tuple(name, ty, components, raw);
    }

    if let Some(bits) = ty.strip_prefix("uint") {
        let bits = parse_bits(bits)
            .ok_or_else(|| invalid(name, ty, raw, "unsupported integer width"))?;
        return coerce_uint(name, ty, bits, raw);
    }
    if let Some(bits) = ty.strip_prefix("int") {
        let bits = parse_bits(bits)
            .ok_or_else(|| invalid(name, ty, raw, "unsupported integer width"))?;
        return coerce_int(name, ty, bits, raw);
    }

    match ty {
        "bool" => coerce_bool(name, ty, raw),
        "address" => coerce_address(name, ty, raw),
        "string" => Ok(DynSolValue::String(raw.to_string())),
        "bytes" => coerce_bytes(name, ty, raw),
        fixed if fixed.starts_with("bytes") => coerce_fixed_bytes(name, ty, raw),
        other => Err(invalid(name, other, raw, "unsupported ABI type")),
    }
}

/// `"uint256[3]"` -> `("uint256", Some(3))`, `"uint256[]"` -> `("uint256", None)`.
fn split_array_suffix(ty: &str) -> Option<(&str, Option<usize>)> {
    if !ty.ends_with(']') {
        return None;
    }
    let open = ty.rfind('[')?;
    let inner = &ty[open + 1..ty.len() - 1];
    if inner.is_empty() {
        Some((&ty[..open], None))
    } else {
        Some((&ty[..open], inner.parse::<usize>().ok().map(Some)?))
    }
}

fn coerce_array(
    name: &str,
    ty: &str,
    base: &str,
    fixed_len: Option<usize>,
    components: &[Param],
    raw: &str,
) -> Result<DynSolValue, InvalidArgument> {
    let elements = split_elements(raw);
    if let Some(expected) = fixed_len {
        if elements.len() != expected {
            return Err(invalid(
                name,
                ty,
                raw,
                format!("expected {} elements, got {}", expected, elements.len()),
            ));
        }
    }
    let mut values = Vec::with_capacity(elements.len());
    for (index, element) in elements.iter().enumerate() {
        let value = coerce_value(name, base, components, element).map_err(|e| {
            invalid(name, ty, raw, format!("element {index}: {}", e.reason))
        })?;
        values.push(value);
    }
    Ok(match fixed_len {
        Some(_) => DynSolValue::FixedArray(values),
        None => DynSolValue::Array(values),
    })
}

/// Element splitting is deliberately lenient: a JSON array literal is tried
/// first, then a comma-split of the raw text. An empty string is an empty
/// sequence, not an error.
fn split_elements(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(trimmed) {
        return items.iter().map(element_raw).collect();
    }
    trimmed.split(',').map(|s| s.trim().to_string()).collect()
}

/// JSON strings feed through unquoted; everything else keeps its JSON text so
/// nested arrays and objects re-parse on recursion.
fn element_raw(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn coerce_tuple(
    name: &str,
    ty: &str,
    components: &[Param],
    raw: &str,
) -> Result<DynSolValue, InvalidArgument> {
    let fields = split_elements(raw);
    if fields.len() != components.len() {
        return Err(invalid(
            name,
            ty,
            raw,
            format!("expected {} tuple fields, got {}", components.len(), fields.len()),
        ));
    }
    let mut values = Vec::with_capacity(components.len());
    for (component, field) in components.iter().zip(&fields) {
        let field_name = if component.name.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", name, component.name)
        };
        values.push(coerce_value(
            &field_name,
            &component.ty,
            &component.components,
            field,
        )?);
    }
    Ok(DynSolValue::Tuple(values))
}

fn parse_bits(suffix: &str) -> Option<usize> {
    if suffix.is_empty() {
        return Some(256);
    }
    let bits = suffix.parse::<usize>().ok()?;
    (bits >= 8 && bits <= 256 && bits % 8 == 0).then_some(bits)
}

/// Base-10 or 0x-prefixed hex, nothing else; no fractional part, no sign.
fn parse_magnitude(digits: &str) -> Option<U256> {
    if let Some(hex_part) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        if hex_part.is_empty() || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        U256::from_str_radix(hex_part, 16).ok()
    } else {
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        U256::from_str_radix(digits, 10).ok()
    }
}

fn coerce_uint(name: &str, ty: &str, bits: usize, raw: &str) -> Result<DynSolValue, InvalidArgument> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid(name, ty, raw, "empty value"));
    }
    let value = parse_magnitude(trimmed).ok_or_else(|| {
        invalid(name, ty, raw, "not a valid base-10 or 0x-prefixed unsigned integer")
    })?;
    if bits < 256 && value >> bits != U256::ZERO {
        return Err(invalid(name, ty, raw, format!("out of range for {ty}")));
    }
    Ok(DynSolValue::Uint(value, bits))
}

fn coerce_int(name: &str, ty: &str, bits: usize, raw: &str) -> Result<DynSolValue, InvalidArgument> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid(name, ty, raw, "empty value"));
    }
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (Sign::Negative, rest),
        None => (Sign::Positive, trimmed),
    };
    let abs = parse_magnitude(digits).ok_or_else(|| {
        invalid(name, ty, raw, "not a valid base-10 or 0x-prefixed integer")
    })?;
    // Two's complement bounds: [-2^(bits-1), 2^(bits-1) - 1].
    let limit = U256::from(1) << (bits - 1);
    let in_range = match sign {
        Sign::Positive => abs < limit,
        Sign::Negative => abs <= limit,
    };
    if !in_range {
        return Err(invalid(name, ty, raw, format!("out of range for {ty}")));
    }
    let value = I256::checked_from_sign_and_abs(sign, abs)
        .ok_or_else(|| invalid(name, ty, raw, format!("out of range for {ty}")))?;
    Ok(DynSolValue::Int(value, bits))
}

/// Strictly "true"/"false" (any case). Nothing else is silently truthy.
fn coerce_bool(name: &str, ty: &str, raw: &str) -> Result<DynSolValue, InvalidArgument> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        Ok(DynSolValue::Bool(true))
    } else if trimmed.eq_ignore_ascii_case("false") {
        Ok(DynSolValue::Bool(false))
    } else {
        Err(invalid(name, ty, raw, "expected 'true' or 'false'"))
    }
}

fn coerce_address(name: &str, ty: &str, raw: &str) -> Result<DynSolValue, InvalidArgument> {
    let trimmed = raw.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| invalid(name, ty, raw, "address must start with 0x"))?;
    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid(
            name,
            ty,
            raw,
            "address must be 0x followed by exactly 40 hex digits",
        ));
    }
    let address = Address::from_str(trimmed)
        .map_err(|e| invalid(name, ty, raw, format!("invalid address: {e}")))?;
    Ok(DynSolValue::Address(address))
}

fn coerce_bytes(name: &str, ty: &str, raw: &str) -> Result<DynSolValue, InvalidArgument> {
    let trimmed = raw.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let bytes = hex::decode(hex_part)
        .map_err(|_| invalid(name, ty, raw, "not a valid hex byte string"))?;
    Ok(DynSolValue::Bytes(bytes))
}

fn coerce_fixed_bytes(name: &str, ty: &str, raw: &str) -> Result<DynSolValue, InvalidArgument> {
    let width = ty
        .strip_prefix("bytes")
        .and_then(|w| w.parse::<usize>().ok())
        .filter(|w| (1..=32).contains(w))
        .ok_or_else(|| invalid(name, ty, raw, "unsupported ABI type"))?;
    let trimmed = raw.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let bytes = hex::decode(hex_part)
        .map_err(|_| invalid(name, ty, raw, "not a valid hex byte string"))?;
    if bytes.len() != width {
        return Err(invalid(
            name,
            ty,
            raw,
            format!("expected exactly {width} bytes, got {}", bytes.len()),
        ));
    }
    let mut word = Word::ZERO;
    word[..width].copy_from_slice(&bytes);
    Ok(DynSolValue::FixedBytes(word, width))
}

fn invalid(name: &str, ty: &str, raw: &str, reason: impl Into<String>) -> InvalidArgument {
    InvalidArgument::new(name, ty, raw, reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn param(name: &str, ty: &str) -> Param {
        serde_json::from_value(json!({ "name": name, "type": ty })).unwrap()
    }

    fn uint(value: u64, bits: usize) -> DynSolValue {
        DynSolValue::Uint(U256::from(value), bits)
    }

    #[test]
    fn uint_accepts_decimal_and_hex() {
        assert_eq!(coerce(&param("n", "uint256"), "42").unwrap(), uint(42, 256));
        assert_eq!(coerce(&param("n", "uint256"), "0x2a").unwrap(), uint(42, 256));
        assert_eq!(coerce(&param("n", "uint256"), " 7 ").unwrap(), uint(7, 256));
    }

    #[test]
    fn uint_full_width_round_trips() {
        let max = U256::MAX;
        let coerced = coerce(&param("n", "uint256"), &max.to_string()).unwrap();
        assert_eq!(coerced, DynSolValue::Uint(max, 256));
    }

    #[test]
    fn uint_rejects_empty_negative_and_fractional() {
        assert!(coerce(&param("n", "uint256"), "").is_err());
        assert!(coerce(&param("n", "uint256"), "-1").is_err());
        assert!(coerce(&param("n", "uint256"), "1.5").is_err());
        assert!(coerce(&param("n", "uint256"), "0x").is_err());
    }

    #[test]
    fn uint_range_is_validated_against_width() {
        assert_eq!(coerce(&param("n", "uint8"), "255").unwrap(), uint(255, 8));
        let err = coerce(&param("n", "uint8"), "256").unwrap_err();
        assert!(err.reason.contains("out of range"));
        assert_eq!(err.ty, "uint8");
    }

    #[test]
    fn int_handles_sign_and_bounds() {
        assert_eq!(
            coerce(&param("n", "int8"), "-128").unwrap(),
            DynSolValue::Int(I256::try_from(-128i64).unwrap(), 8)
        );
        assert_eq!(
            coerce(&param("n", "int8"), "127").unwrap(),
            DynSolValue::Int(I256::try_from(127i64).unwrap(), 8)
        );
        assert!(coerce(&param("n", "int8"), "-129").is_err());
        assert!(coerce(&param("n", "int8"), "128").is_err());
    }

    #[test]
    fn bool_is_strict_but_case_insensitive() {
        assert_eq!(coerce(&param("b", "bool"), "TRUE").unwrap(), DynSolValue::Bool(true));
        assert_eq!(coerce(&param("b", "bool"), "false").unwrap(), DynSolValue::Bool(false));
        assert!(coerce(&param("b", "bool"), "1").is_err());
        assert!(coerce(&param("b", "bool"), "yes").is_err());
        assert!(coerce(&param("b", "bool"), "").is_err());
    }

    #[test]
    fn address_requires_exact_grammar() {
        let ok = coerce(
            &param("to", "address"),
            "0x742d35Cc6435C9c1c72c5E7b18BaB7e1DB7a5d6e",
        );
        assert!(matches!(ok.unwrap(), DynSolValue::Address(_)));

        assert!(coerce(&param("to", "address"), "742d35Cc6435C9c1c72c5E7b18BaB7e1DB7a5d6e").is_err());
        assert!(coerce(&param("to", "address"), "0x123").is_err());
        assert!(coerce(&param("to", "address"), "0xgg2d35Cc6435C9c1c72c5E7b18BaB7e1DB7a5d6e").is_err());
    }

    #[test]
    fn string_passes_through_untouched() {
        assert_eq!(
            coerce(&param("s", "string"), "  hello world ").unwrap(),
            DynSolValue::String("  hello world ".to_string())
        );
    }

    #[test]
    fn bytes_decode_from_hex() {
        assert_eq!(
            coerce(&param("d", "bytes"), "0xdeadbeef").unwrap(),
            DynSolValue::Bytes(vec![0xde, 0xad, 0xbe, 0xef])
        );
        assert!(coerce(&param("d", "bytes"), "0xzz").is_err());
    }

    #[test]
    fn fixed_bytes_enforce_width() {
        let ok = coerce(&param("h", "bytes4"), "0xdeadbeef").unwrap();
        assert!(matches!(ok, DynSolValue::FixedBytes(_, 4)));
        assert!(coerce(&param("h", "bytes4"), "0xdead").is_err());
        assert!(coerce(&param("h", "bytes32"), "0xdead").is_err());
    }

    #[test]
    fn empty_array_input_is_an_empty_sequence() {
        assert_eq!(
            coerce(&param("xs", "uint256[]"), "").unwrap(),
            DynSolValue::Array(vec![])
        );
    }

    #[test]
    fn array_accepts_json_literal() {
        assert_eq!(
            coerce(&param("xs", "uint256[]"), "[1,2,3]").unwrap(),
            DynSolValue::Array(vec![uint(1, 256), uint(2, 256), uint(3, 256)])
        );
    }

    #[test]
    fn array_falls_back_to_comma_split() {
        assert_eq!(
            coerce(&param("xs", "uint256[]"), "1, 2, 3").unwrap(),
            DynSolValue::Array(vec![uint(1, 256), uint(2, 256), uint(3, 256)])
        );
    }

    #[test]
    fn array_element_errors_carry_the_position() {
        let err = coerce(&param("xs", "uint256[]"), "[1,\"nope\",3]").unwrap_err();
        assert!(err.reason.contains("element 1"));
    }

    #[test]
    fn fixed_array_length_is_checked() {
        let ok = coerce(&param("pair", "uint256[2]"), "[1,2]").unwrap();
        assert_eq!(ok, DynSolValue::FixedArray(vec![uint(1, 256), uint(2, 256)]));
        assert!(coerce(&param("pair", "uint256[2]"), "[1,2,3]").is_err());
    }

    #[test]
    fn nested_arrays_recurse() {
        let coerced = coerce(&param("grid", "uint8[][]"), "[[1,2],[3]]").unwrap();
        assert_eq!(
            coerced,
            DynSolValue::Array(vec![
                DynSolValue::Array(vec![uint(1, 8), uint(2, 8)]),
                DynSolValue::Array(vec![uint(3, 8)]),
            ])
        );
    }

    #[test]
    fn tuples_coerce_by_declared_field_order() {
        let tuple: Param = serde_json::from_value(json!({
            "name": "pos",
            "type": "tuple",
            "components": [
                { "name": "x", "type": "uint256" },
                { "name": "flag", "type": "bool" }
            ]
        }))
        .unwrap();
        assert_eq!(
            coerce(&tuple, "[\"5\", true]").unwrap(),
            DynSolValue::Tuple(vec![uint(5, 256), DynSolValue::Bool(true)])
        );
        let err = coerce(&tuple, "[1]").unwrap_err();
        assert!(err.reason.contains("tuple fields"));
    }

    #[test]
    fn coerce_all_uses_positional_slots_and_placeholder_names() {
        let inputs = vec![param("to", "address"), param("", "uint256")];
        let values = ParamValues::from_ordered([
            "0x742d35Cc6435C9c1c72c5E7b18BaB7e1DB7a5d6e".to_string(),
            "10".to_string(),
        ]);
        let coerced = coerce_all(&inputs, &values).unwrap();
        assert_eq!(coerced.len(), 2);
        assert_eq!(coerced[1], uint(10, 256));

        // A missing slot coerces the empty string and fails addressably.
        let sparse = ParamValues::from_ordered(["0x742d35Cc6435C9c1c72c5E7b18BaB7e1DB7a5d6e".to_string()]);
        let err = coerce_all(&inputs, &sparse).unwrap_err();
        assert_eq!(err.name, "arg1");
        assert!(err.reason.contains("empty"));
    }

    #[test]
    fn determinism_same_input_same_result() {
        let p = param("n", "uint64");
        assert_eq!(coerce(&p, "99").unwrap(), coerce(&p, "99").unwrap());
        assert_eq!(
            coerce(&p, "nope").unwrap_err(),
            coerce(&p, "nope").unwrap_err()
        );
    }
}
