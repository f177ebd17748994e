//! TOML transcoding: write a loaded YAML document as TOML text.
//!
//! Mapping from YAML values to TOML:
//!   - Bool      -> boolean
//!   - Integer   -> integer (must fit in i64)
//!   - Float     -> float
//!   - String    -> string
//!   - Timestamp -> offset datetime
//!   - Regex     -> "/pattern/" string
//!   - Sequence  -> array
//!   - Mapping   -> table (inline when nested in an array)
//!   - Set       -> array of strings
//!   - Pairs     -> array of [key, value] arrays
//!
//! Lossy edges:
//!   - TOML has no null; null and undefined values cause an error.
//!   - TOML has no binary type; binary values cause an error.
//!   - The top-level value must be a mapping.

use libyamel::Value;
use num_traits::ToPrimitive;
use toml_edit::{Array, DocumentMut, Formatted, InlineTable, Item, Table};

use super::Ancestors;

/// Encode a value as a TOML document.
pub fn encode(value: &Value) -> Result<String, String> {
    let Value::Mapping(_) = value else {
        return Err("TOML requires the top-level value to be a mapping".to_string());
    };
    let mut ancestors = Ancestors::default();
    let table = value_to_table(value, &mut ancestors)?;
    let mut doc = DocumentMut::new();
    for (key, item) in table.iter() {
        doc[key] = item.clone();
    }
    Ok(doc.to_string())
}

fn value_to_table(value: &Value, ancestors: &mut Ancestors) -> Result<Table, String> {
    ancestors.within(value, |ancestors| {
        let mut table = Table::new();
        if let Value::Mapping(entries) = value {
            for (key, item) in entries.borrow().iter() {
                let item = match item {
                    Value::Mapping(_) => Item::Table(value_to_table(item, ancestors)?),
                    _ => Item::Value(value_to_toml(item, ancestors)?),
                };
                table.insert(key, item);
            }
        }
        Ok(table)
    })
}

fn value_to_toml(value: &Value, ancestors: &mut Ancestors) -> Result<toml_edit::Value, String> {
    match value {
        Value::Null | Value::Undefined => Err("TOML has no null type".to_string()),
        Value::Binary(_) => Err("TOML has no binary data type".to_string()),
        Value::Bool(b) => Ok(toml_edit::Value::Boolean(Formatted::new(*b))),
        Value::Integer(n) => {
            let i = n
                .to_i64()
                .ok_or_else(|| format!("integer {} is too large for TOML (i64)", n))?;
            Ok(toml_edit::Value::Integer(Formatted::new(i)))
        }
        Value::Float(f) => Ok(toml_edit::Value::Float(Formatted::new(*f))),
        Value::String(s) => Ok(toml_edit::Value::String(Formatted::new(s.clone()))),
        Value::Regex(_) => Ok(toml_edit::Value::String(Formatted::new(
            value.to_key().unwrap_or_default(),
        ))),
        Value::Timestamp(_) => {
            let text = value.to_key().unwrap_or_default();
            let datetime = text
                .parse::<toml_edit::Datetime>()
                .map_err(|e| format!("timestamp {} is not a TOML datetime: {}", text, e))?;
            Ok(toml_edit::Value::Datetime(Formatted::new(datetime)))
        }
        Value::Sequence(items) => ancestors.within(value, |ancestors| {
            let mut array = Array::new();
            for item in items.borrow().iter() {
                array.push(value_to_toml(item, ancestors)?);
            }
            Ok(toml_edit::Value::Array(array))
        }),
        Value::Mapping(entries) => ancestors.within(value, |ancestors| {
            let mut inline = InlineTable::new();
            for (key, item) in entries.borrow().iter() {
                inline.insert(key, value_to_toml(item, ancestors)?);
            }
            Ok(toml_edit::Value::InlineTable(inline))
        }),
        Value::Set(keys) => {
            let mut array = Array::new();
            for key in keys.borrow().iter() {
                array.push(key.as_str());
            }
            Ok(toml_edit::Value::Array(array))
        }
        Value::Pairs(pairs) => ancestors.within(value, |ancestors| {
            let mut array = Array::new();
            for (key, item) in pairs.borrow().iter() {
                let mut pair = Array::new();
                pair.push(value_to_toml(key, ancestors)?);
                pair.push(value_to_toml(item, ancestors)?);
                array.push(toml_edit::Value::Array(pair));
            }
            Ok(toml_edit::Value::Array(array))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toml(input: &str) -> Result<String, String> {
        encode(&libyamel::load(input).unwrap())
    }

    #[test]
    fn test_tables_keep_document_order() {
        let out = toml("zeta: 1\nalpha:\n  inner: true\n").unwrap();
        let zeta = out.find("zeta = 1").unwrap();
        let alpha = out.find("[alpha]").unwrap();
        assert!(zeta < alpha, "{}", out);
        assert!(out.contains("inner = true"), "{}", out);
    }

    #[test]
    fn test_arrays_and_timestamps() {
        let out = toml("list: [1, two]\nwhen: 2001-12-14\n").unwrap();
        assert!(out.contains("list = [1, \"two\"]"), "{}", out);
        assert!(out.contains("when = 2001-12-14T00:00:00"), "{}", out);
    }

    #[test]
    fn test_unrepresentable() {
        assert!(toml("a: ~\n").unwrap_err().contains("null"));
        assert!(toml("a: !!binary AQID\n").unwrap_err().contains("binary"));
        assert!(toml("[1, 2]").unwrap_err().contains("top-level"));
        assert!(toml("a: &x {b: *x}\n").unwrap_err().contains("recursive"));
    }
}
