//! CBOR transcoding: write loaded YAML values as CBOR binary data.
//!
//! Mapping from YAML values to CBOR:
//!   - Null      -> null (simple value 22)
//!   - Undefined -> undefined (simple value 23)
//!   - Bool      -> simple values 20/21
//!   - Integer   -> smallest native integer, else bignum (tag 2 or 3)
//!   - Float     -> float64 (always 9 bytes, never downgraded)
//!   - String    -> text string
//!   - Binary    -> byte string
//!   - Timestamp -> tag 0 over an RFC 3339 text string
//!   - Regex     -> tag 35 over the pattern text
//!   - Sequence  -> array
//!   - Mapping   -> map with text keys, in document order
//!   - Set       -> tag 258 over an array of text strings
//!   - Pairs     -> array of two-element arrays

use libyamel::Value;
use num_bigint::{BigInt, Sign};
use num_traits::ToPrimitive;
use std::fmt::Write as FmtWrite;

use super::Ancestors;

const TAG_DATETIME: u64 = 0;
const TAG_POSITIVE_BIGNUM: u64 = 2;
const TAG_NEGATIVE_BIGNUM: u64 = 3;
const TAG_REGEX: u64 = 35;
const TAG_SET: u64 = 258;

// ciborium downgrades float64 to float16/float32 whenever the value
// survives the trip, so the encoder writes the wire format itself.

/// Encode a value as CBOR bytes.
pub fn encode(value: &Value) -> Result<Vec<u8>, String> {
    let mut buf = Vec::new();
    write_value(&mut buf, value, &mut Ancestors::default())?;
    Ok(buf)
}

fn write_value(buf: &mut Vec<u8>, value: &Value, ancestors: &mut Ancestors) -> Result<(), String> {
    match value {
        Value::Null => buf.push(0xf6),
        Value::Undefined => buf.push(0xf7),
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Integer(n) => write_integer(buf, n),
        Value::Float(f) => {
            buf.push(0xfb);
            buf.extend_from_slice(&f.to_be_bytes());
        }
        Value::String(s) => write_text(buf, s),
        Value::Binary(b) => {
            write_type_and_length(buf, 2, b.len() as u64);
            buf.extend_from_slice(b);
        }
        Value::Timestamp(_) => {
            write_type_and_length(buf, 6, TAG_DATETIME);
            write_text(buf, &value.to_key().unwrap_or_default());
        }
        Value::Regex(regex) => {
            write_type_and_length(buf, 6, TAG_REGEX);
            write_text(buf, regex.as_str());
        }
        Value::Sequence(items) => ancestors.within(value, |ancestors| {
            let items = items.borrow();
            write_type_and_length(buf, 4, items.len() as u64);
            for item in items.iter() {
                write_value(buf, item, ancestors)?;
            }
            Ok(())
        })?,
        Value::Mapping(entries) => ancestors.within(value, |ancestors| {
            let entries = entries.borrow();
            write_type_and_length(buf, 5, entries.len() as u64);
            for (key, item) in entries.iter() {
                write_text(buf, key);
                write_value(buf, item, ancestors)?;
            }
            Ok(())
        })?,
        Value::Set(keys) => {
            let keys = keys.borrow();
            write_type_and_length(buf, 6, TAG_SET);
            write_type_and_length(buf, 4, keys.len() as u64);
            for key in keys.iter() {
                write_text(buf, key);
            }
        }
        Value::Pairs(pairs) => ancestors.within(value, |ancestors| {
            let pairs = pairs.borrow();
            write_type_and_length(buf, 4, pairs.len() as u64);
            for (key, item) in pairs.iter() {
                write_type_and_length(buf, 4, 2);
                write_value(buf, key, ancestors)?;
                write_value(buf, item, ancestors)?;
            }
            Ok(())
        })?,
    }
    Ok(())
}

fn write_text(buf: &mut Vec<u8>, text: &str) {
    write_type_and_length(buf, 3, text.len() as u64);
    buf.extend_from_slice(text.as_bytes());
}

/// Write a CBOR major type and its argument.
///
/// Arguments up to 23 live in the low 5 bits; larger ones follow the
/// initial byte in 1, 2, 4 or 8 bytes (additional info 24 to 27).
fn write_type_and_length(buf: &mut Vec<u8>, major: u8, val: u64) {
    let high = major << 5;
    match val {
        0..=23 => {
            buf.push(high | val as u8);
        }
        24..=0xff => {
            buf.push(high | 24);
            buf.push(val as u8);
        }
        0x100..=0xffff => {
            buf.push(high | 25);
            buf.extend_from_slice(&(val as u16).to_be_bytes());
        }
        0x10000..=0xffff_ffff => {
            buf.push(high | 26);
            buf.extend_from_slice(&(val as u32).to_be_bytes());
        }
        _ => {
            buf.push(high | 27);
            buf.extend_from_slice(&val.to_be_bytes());
        }
    }
}

/// Write an integer as the smallest CBOR encoding.
///
/// Major 0 carries `n`, major 1 carries `-1 - n`. Outside the 64-bit
/// argument range the same magnitude goes into a bignum byte string.
fn write_integer(buf: &mut Vec<u8>, n: &BigInt) {
    let (major, tag, magnitude) = integer_parts(n);
    match magnitude.to_u64() {
        Some(val) => write_type_and_length(buf, major, val),
        None => {
            let (_, bytes) = magnitude.to_bytes_be();
            write_type_and_length(buf, 6, tag);
            write_type_and_length(buf, 2, bytes.len() as u64);
            buf.extend_from_slice(&bytes);
        }
    }
}

/// The major type, bignum tag and argument magnitude for `n`.
fn integer_parts(n: &BigInt) -> (u8, u64, BigInt) {
    if n.sign() == Sign::Minus {
        (1, TAG_NEGATIVE_BIGNUM, -n - BigInt::from(1))
    } else {
        (0, TAG_POSITIVE_BIGNUM, n.clone())
    }
}

// ---------------------------------------------------------------------------
// Diagnostic Notation (RFC 8949 §8)
// ---------------------------------------------------------------------------

/// Collections whose items fit within this many columns stay on one line.
const DIAG_LINE_WIDTH: usize = 60;

/// Render a value in CBOR diagnostic notation.
///
/// Mirrors the choices [`encode`] makes: floats carry the `_3`
/// double-precision indicator, integers outside the native range appear as
/// bignum tags, and timestamps, regexes and sets appear under their tags.
pub fn diagnostic(value: &Value) -> Result<String, String> {
    let mut out = diag_value(value, 0, &mut Ancestors::default())?;
    out.push('\n');
    Ok(out)
}

fn diag_value(value: &Value, indent: usize, ancestors: &mut Ancestors) -> Result<String, String> {
    let text = match value {
        Value::Null => "null".to_string(),
        Value::Undefined => "undefined".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Integer(n) => diag_integer(n),
        Value::Float(f) => diag_float(*f),
        Value::String(s) => diag_text(s),
        Value::Binary(b) => diag_bytes(b),
        Value::Timestamp(_) => {
            format!("{}({})", TAG_DATETIME, diag_text(&value.to_key().unwrap_or_default()))
        }
        Value::Regex(regex) => format!("{}({})", TAG_REGEX, diag_text(regex.as_str())),
        Value::Set(keys) => {
            let keys: Vec<String> = keys.borrow().iter().map(|key| diag_text(key)).collect();
            format!("{}({})", TAG_SET, diag_layout('[', ']', keys, indent))
        }
        Value::Sequence(items) => ancestors.within(value, |ancestors| {
            let mut rendered = Vec::new();
            for item in items.borrow().iter() {
                rendered.push(diag_value(item, indent + 2, ancestors)?);
            }
            Ok(diag_layout('[', ']', rendered, indent))
        })?,
        Value::Mapping(entries) => ancestors.within(value, |ancestors| {
            let mut rendered = Vec::new();
            for (key, item) in entries.borrow().iter() {
                let item = diag_value(item, indent + 2, ancestors)?;
                rendered.push(format!("{}: {}", diag_text(key), item));
            }
            Ok(diag_layout('{', '}', rendered, indent))
        })?,
        Value::Pairs(pairs) => ancestors.within(value, |ancestors| {
            let mut rendered = Vec::new();
            for (key, item) in pairs.borrow().iter() {
                let pair = vec![
                    diag_value(key, indent + 4, ancestors)?,
                    diag_value(item, indent + 4, ancestors)?,
                ];
                rendered.push(diag_layout('[', ']', pair, indent + 2));
            }
            Ok(diag_layout('[', ']', rendered, indent))
        })?,
    };
    Ok(text)
}

/// Join rendered items on one line when they are short, else one per line.
fn diag_layout(open: char, close: char, items: Vec<String>, indent: usize) -> String {
    let width: usize = items.iter().map(|item| item.len() + 2).sum();
    if width <= DIAG_LINE_WIDTH && items.iter().all(|item| !item.contains('\n')) {
        return format!("{}{}{}", open, items.join(", "), close);
    }
    let child = " ".repeat(indent + 2);
    let mut out = format!("{}\n", open);
    for (i, item) in items.iter().enumerate() {
        out.push_str(&child);
        out.push_str(item);
        if i + 1 < items.len() {
            out.push(',');
        }
        out.push('\n');
    }
    out.push_str(&" ".repeat(indent));
    out.push(close);
    out
}

fn diag_integer(n: &BigInt) -> String {
    let (_, tag, magnitude) = integer_parts(n);
    if magnitude.to_u64().is_some() {
        return n.to_string();
    }
    let (_, bytes) = magnitude.to_bytes_be();
    format!("{}({})", tag, diag_bytes(&bytes))
}

fn diag_float(f: f64) -> String {
    let number = if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        let text = if f > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else {
        format!("{:?}", f)
    };
    format!("{}_3", number)
}

fn diag_bytes(bytes: &[u8]) -> String {
    let mut out = String::from("h'");
    for byte in bytes {
        let _ = write!(out, "{:02x}", byte);
    }
    out.push('\'');
    out
}

fn diag_text(s: &str) -> String {
    let mut out = String::from("\"");
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cbor(input: &str) -> Vec<u8> {
        encode(&libyamel::load(input).unwrap()).unwrap()
    }

    #[test]
    fn test_scalars() {
        assert_eq!(cbor("~"), vec![0xf6]);
        assert_eq!(cbor("yes"), vec![0xf5]);
        assert_eq!(cbor("500"), vec![0x19, 0x01, 0xf4]);
        assert_eq!(cbor("-1"), vec![0x20]);
        assert_eq!(cbor("abc"), vec![0x63, b'a', b'b', b'c']);
    }

    #[test]
    fn test_floats_stay_double() {
        let mut expected = vec![0xfb];
        expected.extend_from_slice(&1.5f64.to_be_bytes());
        assert_eq!(cbor("1.5"), expected);
    }

    #[test]
    fn test_bignum() {
        // 2^64
        assert_eq!(
            cbor("18446744073709551616"),
            vec![0xc2, 0x49, 0x01, 0, 0, 0, 0, 0, 0, 0, 0]
        );
        // -2^64 - 1
        assert_eq!(
            cbor("-18446744073709551617"),
            vec![0xc3, 0x49, 0x01, 0, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_mapping_keeps_document_order() {
        assert_eq!(
            cbor("b: 1\na: 2\n"),
            vec![0xa2, 0x61, b'b', 0x01, 0x61, b'a', 0x02]
        );
    }

    #[test]
    fn test_tagged_values() {
        assert_eq!(cbor("!!set {x}"), vec![0xd9, 0x01, 0x02, 0x81, 0x61, b'x']);
        let timestamp = cbor("2001-12-14");
        assert_eq!(timestamp[0], 0xc0);
        assert_eq!(&timestamp[1..3], [0x78, 24]);
        assert_eq!(&timestamp[3..], b"2001-12-14T00:00:00.000Z");
    }

    #[test]
    fn test_recursive_structure() {
        let value = libyamel::load("&x [*x]").unwrap();
        assert!(encode(&value).is_err());
    }

    #[test]
    fn test_decodes_as_cbor() {
        let bytes = cbor("name: yamel\nlist: [1, 2.5, true]\n");
        let decoded: ciborium::value::Value = ciborium::de::from_reader(&bytes[..]).unwrap();
        let entries = decoded.as_map().unwrap();
        assert_eq!(entries[0].0.as_text(), Some("name"));
        let list = entries[1].1.as_array().unwrap();
        assert_eq!(list[1].as_float(), Some(2.5));
    }

    #[test]
    fn test_diagnostic() {
        let value = libyamel::load("name: yamel\nlist: [1, 2.5, true]\n").unwrap();
        assert_eq!(
            diagnostic(&value).unwrap(),
            "{\"name\": \"yamel\", \"list\": [1, 2.5_3, true]}\n"
        );
    }

    #[test]
    fn test_diagnostic_shows_tags() {
        let value =
            libyamel::load("[2001-12-14, !!set {x}, 18446744073709551616, !!binary AQID, -.inf]")
                .unwrap();
        assert_eq!(
            diagnostic(&value).unwrap(),
            "[\n  0(\"2001-12-14T00:00:00.000Z\"),\n  258([\"x\"]),\n  2(h'010000000000000000'),\n  h'010203',\n  -Infinity_3\n]\n"
        );
    }

    #[test]
    fn test_diagnostic_nests_long_collections() {
        let input = "outer:\n  - a fairly long string value here\n  - another long string value\n";
        let value = libyamel::load(input).unwrap();
        assert_eq!(
            diagnostic(&value).unwrap(),
            "{\n  \"outer\": [\n    \"a fairly long string value here\",\n    \"another long string value\"\n  ]\n}\n"
        );
        let cycle = libyamel::load("&x [*x]").unwrap();
        assert!(diagnostic(&cycle).is_err());
    }
}
