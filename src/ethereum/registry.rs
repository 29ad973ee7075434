use alloy::json_abi::{Event, Function};
use serde_json::Value;
use tracing::{debug, warn};

use super::error::InvalidAbi;

/// Non-anonymous events spend one topic slot on the signature hash, leaving
/// three for indexed parameters.
pub const MAX_INDEXED_PARAMS: usize = 3;

/// Validated, indexed view of an ABI document: the callable functions and the
/// emitted event shapes, in source order.
#[derive(Debug, Clone, Default)]
pub struct AbiRegistry {
    functions: Vec<Function>,
    events: Vec<Event>,
}

impl AbiRegistry {
    /// Parse raw ABI text. Accepts a bare JSON array of entries or an object
    /// wrapping one under an `abi` key (the shape compiler artifacts use).
    /// Individually malformed entries are dropped; the document only fails as
    /// a whole when nothing usable remains.
    pub fn parse(raw: &str) -> Result<Self, InvalidAbi> {
        let value: Value = serde_json::from_str(raw).map_err(|e| InvalidAbi::MalformedJson {
            detail: e.to_string(),
        })?;

        let entries = match value {
            Value::Array(entries) => entries,
            Value::Object(mut map) => match map.remove("abi") {
                Some(Value::Array(entries)) => entries,
                _ => return Err(InvalidAbi::NotAnArray),
            },
            _ => return Err(InvalidAbi::NotAnArray),
        };

        let mut functions = Vec::new();
        let mut events = Vec::new();

        for mut entry in entries {
            match entry.get("type").and_then(Value::as_str) {
                Some("function") => {
                    if !has_function_shape(&entry) {
                        debug!("dropping function entry with missing name or malformed inputs/outputs");
                        continue;
                    }
                    normalize_function_entry(&mut entry);
                    match serde_json::from_value::<Function>(entry) {
                        Ok(function) => functions.push(function),
                        Err(e) => debug!("dropping undeserializable function entry: {}", e),
                    }
                }
                Some("event") => match serde_json::from_value::<Event>(entry) {
                    Ok(event) => {
                        let indexed = event.inputs.iter().filter(|p| p.indexed).count();
                        if indexed > MAX_INDEXED_PARAMS {
                            warn!(
                                "dropping event '{}': {} indexed parameters exceeds the topic slot limit",
                                event.name, indexed
                            );
                        } else {
                            events.push(event);
                        }
                    }
                    Err(e) => debug!("dropping undeserializable event entry: {}", e),
                },
                // constructor, fallback, receive and unknown kinds are not
                // callable through this tool
                _ => {}
            }
        }

        if functions.is_empty() && events.is_empty() {
            return Err(InvalidAbi::NoUsableEntries);
        }

        Ok(Self { functions, events })
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Select a function by canonical signature (`name(type1,type2)`), or by
    /// bare name when it is unambiguous. Overloads share a name, so a bare
    /// name matching more than one descriptor returns `None`.
    pub fn find_function(&self, selector: &str) -> Option<&Function> {
        if let Some(function) = self.functions.iter().find(|f| f.signature() == selector) {
            return Some(function);
        }
        let mut named = self.functions.iter().filter(|f| f.name == selector);
        match (named.next(), named.next()) {
            (Some(function), None) => Some(function),
            _ => None,
        }
    }

    /// Select an event by name (first declaration wins, mirroring log decode).
    pub fn find_event(&self, name: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.name == name)
    }
}

/// Required-field validation for the ABI JSON format: a function needs
/// a string `name`, and `inputs`/`outputs` must be arrays when present.
fn has_function_shape(entry: &Value) -> bool {
    if !entry.get("name").map_or(false, Value::is_string) {
        return false;
    }
    for key in ["inputs", "outputs"] {
        if let Some(value) = entry.get(key) {
            if !value.is_array() {
                return false;
            }
        }
    }
    true
}

/// Fill in the optional fields serde requires so hand-written ABI fragments
/// (no outputs, no stateMutability) still deserialize.
fn normalize_function_entry(entry: &mut Value) {
    if let Some(map) = entry.as_object_mut() {
        map.entry("inputs").or_insert_with(|| Value::Array(vec![]));
        map.entry("outputs").or_insert_with(|| Value::Array(vec![]));
        map.entry("stateMutability")
            .or_insert_with(|| Value::String("nonpayable".to_string()));
    }
}
