//! JSON transcoding.
//!
//! Mapping from YAML values to JSON:
//!   - Null, Undefined   -> null
//!   - Bool              -> boolean
//!   - Integer           -> number (must fit in i64 or u64)
//!   - Float             -> number (must be finite)
//!   - String            -> string
//!   - Binary            -> base64 string
//!   - Timestamp         -> RFC 3339 string
//!   - Regex             -> "/pattern/" string
//!   - Sequence          -> array
//!   - Mapping           -> object
//!   - Set               -> array of keys
//!   - Pairs             -> array of [key, value] arrays

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use libyamel::Value;
use num_traits::ToPrimitive;
use serde_json::{Map, Number, Value as JsonValue};

use super::Ancestors;

/// Encode a value as pretty-printed JSON.
pub fn encode(value: &Value) -> Result<String, String> {
    let json = to_json(value, &mut Ancestors::default())?;
    serde_json::to_string_pretty(&json).map_err(|e| format!("JSON encode error: {}", e))
}

fn to_json(value: &Value, ancestors: &mut Ancestors) -> Result<JsonValue, String> {
    match value {
        Value::Null | Value::Undefined => Ok(JsonValue::Null),
        Value::Bool(b) => Ok(JsonValue::Bool(*b)),
        Value::Integer(n) => {
            if let Some(i) = n.to_i64() {
                Ok(JsonValue::Number(i.into()))
            } else if let Some(u) = n.to_u64() {
                Ok(JsonValue::Number(u.into()))
            } else {
                Err(format!("integer {} is too large for JSON", n))
            }
        }
        Value::Float(f) => Number::from_f64(*f)
            .map(JsonValue::Number)
            .ok_or_else(|| format!("JSON cannot represent the float {:?}", value)),
        Value::String(s) => Ok(JsonValue::String(s.clone())),
        Value::Binary(b) => Ok(JsonValue::String(STANDARD.encode(b))),
        Value::Timestamp(_) | Value::Regex(_) => {
            Ok(JsonValue::String(value.to_key().unwrap_or_default()))
        }
        Value::Sequence(items) => ancestors.within(value, |ancestors| {
            let items = items.borrow();
            let items: Result<Vec<JsonValue>, String> =
                items.iter().map(|item| to_json(item, ancestors)).collect();
            Ok(JsonValue::Array(items?))
        }),
        Value::Mapping(entries) => ancestors.within(value, |ancestors| {
            let mut object = Map::new();
            for (key, item) in entries.borrow().iter() {
                object.insert(key.clone(), to_json(item, ancestors)?);
            }
            Ok(JsonValue::Object(object))
        }),
        Value::Set(keys) => Ok(JsonValue::Array(
            keys.borrow().iter().cloned().map(JsonValue::String).collect(),
        )),
        Value::Pairs(pairs) => ancestors.within(value, |ancestors| {
            let mut items = Vec::new();
            for (key, item) in pairs.borrow().iter() {
                items.push(JsonValue::Array(vec![
                    to_json(key, ancestors)?,
                    to_json(item, ancestors)?,
                ]));
            }
            Ok(JsonValue::Array(items))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json(input: &str) -> Result<JsonValue, String> {
        let value = libyamel::load(input).unwrap();
        to_json(&value, &mut Ancestors::default())
    }

    #[test]
    fn test_scalars() {
        assert_eq!(
            json("[~, true, 12, 1.5, text, 2001-12-14]").unwrap(),
            serde_json::json!([null, true, 12, 1.5, "text", "2001-12-14T00:00:00.000Z"])
        );
    }

    #[test]
    fn test_collections() {
        assert_eq!(
            json("a: !!set {x}\nb: !!pairs [k: 1]\nc: !!binary AQID\n").unwrap(),
            serde_json::json!({"a": ["x"], "b": [["k", 1]], "c": "AQID"})
        );
    }

    #[test]
    fn test_objects_keep_document_order() {
        let value = libyamel::load("zeta: 1\nalpha: 2\nmid: {y: 1, b: 2}\n").unwrap();
        let out = encode(&value).unwrap();
        let order: Vec<usize> = ["\"zeta\"", "\"alpha\"", "\"mid\"", "\"y\"", "\"b\""]
            .iter()
            .map(|key| out.find(key).unwrap())
            .collect();
        assert!(order.windows(2).all(|pair| pair[0] < pair[1]), "{}", out);
    }

    #[test]
    fn test_unrepresentable() {
        assert!(json(".inf").unwrap_err().contains("cannot represent"));
        assert!(json("123456789012345678901234567890")
            .unwrap_err()
            .contains("too large"));
        assert_eq!(
            json("&x [*x]").unwrap_err(),
            "document contains a recursive structure"
        );
    }
}
