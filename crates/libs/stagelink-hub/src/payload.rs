//! Payload translation between the two transport representations.
//!
//! The cloud transport carries structured JSON text; the local transport
//! carries typed argument lists. Whichever client publishes a forwarded
//! message calls into these functions to reach its native representation.

use serde_json::Value;

use crate::error::HubError;
use crate::types::Arg;

/// Encodes an argument list as cloud-side JSON text.
///
/// A single `Str` argument is treated as pre-encoded structured text: it
/// must already parse as JSON and is passed through verbatim. Any other
/// argument list maps element-wise to a JSON array, so `[Float(22.5)]`
/// becomes `"[22.5]"`.
pub fn encode_args(args: &[Arg]) -> Result<String, HubError> {
    if let [Arg::Str(text)] = args {
        return match serde_json::from_str::<Value>(text) {
            Ok(_) => Ok(text.clone()),
            Err(err) => Err(HubError::malformed_payload(format!(
                "string argument is not valid JSON: {err}"
            ))),
        };
    }

    let values = args.iter().map(arg_to_value).collect::<Result<Vec<_>, _>>()?;
    serde_json::to_string(&Value::Array(values))
        .map_err(|err| HubError::malformed_payload(err.to_string()))
}

/// Decodes cloud-side JSON text into an argument list.
///
/// A JSON array maps element-wise to arguments; a scalar maps to a single
/// argument; an object has no scalar shape and becomes a single `Str`
/// argument carrying its JSON text. Text that is not JSON at all is a
/// malformed payload.
pub fn decode_args(text: &str) -> Result<Vec<Arg>, HubError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|err| HubError::malformed_payload(format!("invalid JSON: {err}")))?;

    Ok(match value {
        Value::Array(items) => items.iter().map(value_to_arg).collect(),
        other => vec![value_to_arg(&other)],
    })
}

fn arg_to_value(arg: &Arg) -> Result<Value, HubError> {
    Ok(match arg {
        Arg::Int(n) => Value::from(*n),
        Arg::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .ok_or_else(|| {
                HubError::malformed_payload(format!("non-finite float argument: {f}"))
            })?,
        Arg::Str(s) => Value::from(s.clone()),
        Arg::Bool(b) => Value::from(*b),
        Arg::Nil => Value::Null,
    })
}

fn value_to_arg(value: &Value) -> Arg {
    match value {
        Value::Null => Arg::Nil,
        Value::Bool(b) => Arg::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Arg::Int(i),
            None => Arg::Float(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => Arg::Str(s.clone()),
        // Nested structures keep their JSON text; the scalar model has no
        // deeper shape to map them onto.
        nested => Arg::Str(nested.to_string()),
    }
}
