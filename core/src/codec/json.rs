use log::debug;
use serde_json::{Number, Value};

use super::{BodyCodec, DecodeError};
use crate::core::params::Parameters;
use crate::core::RequestKind;

const FORMAT: &str = "JSON";

/// JSON request bodies.
///
/// Every terminal value (string, number, bool, null) of the document becomes
/// one parameter named by its path (`user.name`, `items[0]`). The decoded
/// document is kept as a template so parameters can be written back into it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonCodec {
    template: Option<Value>,
    /// Parameter name to the JSON pointers of the leaves it stands for.
    locations: Parameters,
}

impl JsonCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// The document decoded last, if any.
    pub fn document(&self) -> Option<&Value> {
        self.template.as_ref()
    }
}

fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn render_leaf(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Recursively traverses a JSON value, recording every terminal value with
/// its display path and JSON pointer.
fn flatten(
    value: &Value,
    current_path: &str,
    pointer: &str,
    params: &mut Parameters,
    locations: &mut Parameters,
) {
    match value {
        Value::Object(map) => {
            for (key, val) in map {
                let new_path = if current_path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", current_path, key)
                };
                let new_pointer = format!("{}/{}", pointer, escape_pointer_token(key));
                flatten(val, &new_path, &new_pointer, params, locations);
            }
        }
        Value::Array(arr) => {
            for (index, val) in arr.iter().enumerate() {
                let new_path = format!("{}[{}]", current_path, index);
                let new_pointer = format!("{}/{}", pointer, index);
                flatten(val, &new_path, &new_pointer, params, locations);
            }
        }
        Value::String(_) | Value::Number(_) | Value::Bool(_) | Value::Null => {
            params.append(current_path, render_leaf(value));
            locations.append(current_path, pointer);
        }
    }
}

/// Writes `payload` into a leaf, preserving the leaf's type where the payload
/// still parses as that type.
fn inject_payload_into_value(value: &mut Value, payload: &str) {
    *value = match value {
        Value::Number(_) => match serde_json::from_str::<Number>(payload) {
            Ok(num) => Value::Number(num),
            Err(_) => Value::String(payload.to_string()),
        },
        Value::Bool(_) if payload == "true" => Value::Bool(true),
        Value::Bool(_) if payload == "false" => Value::Bool(false),
        Value::Null if payload == "null" => Value::Null,
        _ => Value::String(payload.to_string()),
    };
}

impl BodyCodec for JsonCodec {
    fn kind(&self) -> RequestKind {
        RequestKind::Json
    }

    fn decode(&mut self, body: &[u8]) -> Result<Parameters, DecodeError> {
        let document: Value = serde_json::from_slice(body)
            .map_err(|e| DecodeError::malformed(FORMAT, e.to_string()))?;
        if !(document.is_object() || document.is_array()) {
            return Err(DecodeError::NotThisFormat("a JSON object or array"));
        }

        let mut params = Parameters::new();
        let mut locations = Parameters::new();
        flatten(&document, "", "", &mut params, &mut locations);
        debug!("Decoded JSON document into {} parameter(s)", params.len());

        self.template = Some(document);
        self.locations = locations;
        Ok(params)
    }

    fn encode(&self, params: &Parameters) -> Result<Vec<u8>, DecodeError> {
        let mut document = self
            .template
            .clone()
            .ok_or(DecodeError::NotDecoded(FORMAT))?;

        for (key, values) in params.iter() {
            let pointers = self
                .locations
                .get_all(key)
                .ok_or_else(|| DecodeError::UnknownParameter {
                    format: FORMAT,
                    name: key.to_string(),
                })?;
            for (pointer, value) in pointers.iter().zip(values) {
                if let Some(target) = document.pointer_mut(pointer) {
                    inject_payload_into_value(target, value);
                }
            }
        }

        serde_json::to_vec(&document).map_err(|e| DecodeError::malformed(FORMAT, e.to_string()))
    }
}
