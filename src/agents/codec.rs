//! Tool-call argument decoding
//!
//! The assistant writes regex patterns into the `pattern` argument and the
//! transport delivers the argument payload as a string. Backslashes in that
//! payload are not reliably valid JSON escapes (`\.` or `\d` are common), so
//! decoding first doubles every backslash, parses the protected payload, and
//! then collapses one layer again on `pattern` values only.
//!
//! Non-pattern strings keep the payload's backslashes verbatim.
//!
//! Known limitation: a pattern whose raw payload holds an odd run of
//! backslashes (for example `\\\.`) does not come back symmetrically, since
//! collapsing works on pairs and leaves the trailing single backslash in place.

use serde_json::{Map, Value};

use crate::agents::error::{AgentError, AgentResult};

/// Argument that carries a regular expression
pub const PATTERN_ARGUMENT: &str = "pattern";

/// Keyword arguments for one function invocation
pub type Arguments = Map<String, Value>;

/// Decoded tool-call payload
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedArguments {
    /// One invocation
    Single(Arguments),
    /// Several invocations of the same function, in order
    Batch(Vec<Arguments>),
}

impl DecodedArguments {
    pub fn invocations(&self) -> usize {
        match self {
            DecodedArguments::Single(_) => 1,
            DecodedArguments::Batch(list) => list.len(),
        }
    }
}

/// Add the escaping layer the transport introduces: every backslash doubled
pub fn transport_encode(s: &str) -> String {
    s.replace('\\', "\\\\")
}

/// Remove exactly one escaping layer: every `\\` pair collapses to `\`
pub fn unescape_pattern(s: &str) -> String {
    s.replace("\\\\", "\\")
}

/// Decode a raw argument payload into keyword arguments.
///
/// An empty payload decodes to a single invocation with no arguments.
pub fn decode_arguments(raw: &str) -> AgentResult<DecodedArguments> {
    if raw.trim().is_empty() {
        return Ok(DecodedArguments::Single(Map::new()));
    }

    match serde_json::from_str::<Value>(&transport_encode(raw)) {
        Ok(value) => {
            let mut decoded = into_arguments(value)?;
            restore_patterns(&mut decoded);
            Ok(decoded)
        }
        Err(protected_err) => {
            // Doubling breaks payloads that escape quotes; those parse as plain
            // JSON, which already removed the transport layer.
            let value = serde_json::from_str::<Value>(raw).map_err(|_| {
                AgentError::Decode(format!("invalid argument payload: {}", protected_err))
            })?;
            tracing::debug!("Argument payload decoded without backslash protection");
            into_arguments(value)
        }
    }
}

fn into_arguments(value: Value) -> AgentResult<DecodedArguments> {
    match value {
        Value::Object(map) => Ok(DecodedArguments::Single(map)),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => Ok(map),
                other => Err(AgentError::Decode(format!(
                    "expected an argument object in list, got {}",
                    type_name(&other)
                ))),
            })
            .collect::<AgentResult<Vec<_>>>()
            .map(DecodedArguments::Batch),
        other => Err(AgentError::Decode(format!(
            "expected an argument object or list, got {}",
            type_name(&other)
        ))),
    }
}

fn restore_patterns(decoded: &mut DecodedArguments) {
    match decoded {
        DecodedArguments::Single(args) => restore_pattern(args),
        DecodedArguments::Batch(list) => list.iter_mut().for_each(restore_pattern),
    }
}

fn restore_pattern(args: &mut Arguments) {
    match args.get_mut(PATTERN_ARGUMENT) {
        Some(Value::String(pattern)) => *pattern = unescape_pattern(pattern),
        Some(Value::Array(patterns)) => {
            for pattern in patterns.iter_mut() {
                if let Value::String(p) = pattern {
                    *p = unescape_pattern(p);
                }
            }
        }
        _ => {}
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
