//! Constructed YAML values.

use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::{IndexMap, IndexSet};
use num_bigint::BigInt;
use num_traits::ToPrimitive;

/// A constructed YAML value.
///
/// Collections are shared: every alias to the same node yields a clone of
/// the same `Rc`, so a structure may contain itself.
#[derive(Clone)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Arbitrary-precision integer.
    Integer(BigInt),
    /// 64-bit floating-point number.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Decoded `!!binary` data.
    Binary(Vec<u8>),
    /// A `!!timestamp`, normalized to UTC.
    Timestamp(DateTime<Utc>),
    /// Sequence of values. Also used for `!!omap`, as one-entry mappings.
    Sequence(Rc<RefCell<Vec<Value>>>),
    /// Mapping in source order, keyed by canonical key text.
    Mapping(Rc<RefCell<IndexMap<String, Value>>>),
    /// A `!!set`.
    Set(Rc<RefCell<IndexSet<String>>>),
    /// A `!!pairs` list, which may repeat keys.
    Pairs(Rc<RefCell<Vec<(Value, Value)>>>),
    /// `!!js/undefined`, full schema only.
    Undefined,
    /// `!!js/regexp`, full schema only.
    Regex(regex::Regex),
}

impl Value {
    pub fn sequence(items: Vec<Value>) -> Self {
        Value::Sequence(Rc::new(RefCell::new(items)))
    }

    pub fn mapping(entries: IndexMap<String, Value>) -> Self {
        Value::Mapping(Rc::new(RefCell::new(entries)))
    }

    /// Returns `true` if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Returns the boolean value if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns a reference to the integer if this is an `Integer`.
    pub fn as_integer(&self) -> Option<&BigInt> {
        match self {
            Value::Integer(n) => Some(n),
            _ => None,
        }
    }

    /// Returns the integer if it fits in an `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        self.as_integer().and_then(ToPrimitive::to_i64)
    }

    /// Returns the float value if this is a `Float`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns a reference to the string if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    /// Borrows the items if this is a `Sequence`.
    pub fn as_sequence(&self) -> Option<Ref<'_, Vec<Value>>> {
        match self {
            Value::Sequence(items) => Some(items.borrow()),
            _ => None,
        }
    }

    /// Borrows the entries if this is a `Mapping`.
    pub fn as_mapping(&self) -> Option<Ref<'_, IndexMap<String, Value>>> {
        match self {
            Value::Mapping(entries) => Some(entries.borrow()),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<Ref<'_, IndexSet<String>>> {
        match self {
            Value::Set(keys) => Some(keys.borrow()),
            _ => None,
        }
    }

    pub fn as_pairs(&self) -> Option<Ref<'_, Vec<(Value, Value)>>> {
        match self {
            Value::Pairs(pairs) => Some(pairs.borrow()),
            _ => None,
        }
    }

    pub fn as_regex(&self) -> Option<&regex::Regex> {
        match self {
            Value::Regex(re) => Some(re),
            _ => None,
        }
    }

    /// Look up a mapping entry by key.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.as_mapping().and_then(|entries| entries.get(key).cloned())
    }

    /// Look up a sequence item by position.
    pub fn get_index(&self, index: usize) -> Option<Value> {
        self.as_sequence().and_then(|items| items.get(index).cloned())
    }

    /// Whether both values are the same shared collection.
    ///
    /// Always `false` for scalars, which are never shared.
    pub fn same_instance(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Sequence(a), Value::Sequence(b)) => Rc::ptr_eq(a, b),
            (Value::Mapping(a), Value::Mapping(b)) => Rc::ptr_eq(a, b),
            (Value::Set(a), Value::Set(b)) => Rc::ptr_eq(a, b),
            (Value::Pairs(a), Value::Pairs(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// The text used when this value is a mapping or set key.
    ///
    /// Collections have no key text.
    pub fn to_key(&self) -> Option<String> {
        match self {
            Value::Null => Some("null".to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Integer(n) => Some(n.to_string()),
            Value::Float(f) => Some(float_key(*f)),
            Value::String(s) => Some(s.clone()),
            Value::Binary(b) => Some(STANDARD.encode(b)),
            Value::Timestamp(t) => Some(t.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Value::Undefined => Some("undefined".to_string()),
            Value::Regex(re) => Some(format!("/{}/", re.as_str())),
            Value::Sequence(_) | Value::Mapping(_) | Value::Set(_) | Value::Pairs(_) => None,
        }
    }

    fn address(&self) -> Option<*const ()> {
        match self {
            Value::Sequence(rc) => Some(Rc::as_ptr(rc) as *const ()),
            Value::Mapping(rc) => Some(Rc::as_ptr(rc) as *const ()),
            Value::Set(rc) => Some(Rc::as_ptr(rc) as *const ()),
            Value::Pairs(rc) => Some(Rc::as_ptr(rc) as *const ()),
            _ => None,
        }
    }
}

fn float_key(f: f64) -> String {
    if f.is_nan() {
        ".nan".to_string()
    } else if f.is_infinite() {
        let text = if f > 0.0 { ".inf" } else { "-.inf" };
        text.to_string()
    } else {
        f.to_string()
    }
}

impl PartialEq for Value {
    /// Structural equality. Shared collections compare equal without being
    /// walked, but two distinct cyclic structures will not terminate.
    fn eq(&self, other: &Self) -> bool {
        if self.same_instance(other) {
            return true;
        }
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Undefined, Value::Undefined) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Binary(a), Value::Binary(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Regex(a), Value::Regex(b)) => a.as_str() == b.as_str(),
            (Value::Sequence(a), Value::Sequence(b)) => *a.borrow() == *b.borrow(),
            (Value::Mapping(a), Value::Mapping(b)) => *a.borrow() == *b.borrow(),
            (Value::Set(a), Value::Set(b)) => *a.borrow() == *b.borrow(),
            (Value::Pairs(a), Value::Pairs(b)) => *a.borrow() == *b.borrow(),
            _ => false,
        }
    }
}

thread_local! {
    /// Collections currently being formatted on this thread.
    static VISITING: RefCell<Vec<*const ()>> = const { RefCell::new(Vec::new()) };
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(address) = self.address() {
            if VISITING.with(|visiting| visiting.borrow().contains(&address)) {
                return write!(f, "<recursive>");
            }
            VISITING.with(|visiting| visiting.borrow_mut().push(address));
            let result = self.fmt_collection(f);
            VISITING.with(|visiting| visiting.borrow_mut().pop());
            return result;
        }
        match self {
            Value::Null => write!(f, "null"),
            Value::Undefined => write!(f, "undefined"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", float_key(*n)),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Binary(b) => {
                write!(f, "<")?;
                for byte in b {
                    write!(f, "{:02x}", byte)?;
                }
                write!(f, ">")
            }
            Value::Timestamp(t) => write!(f, "{}", t.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Value::Regex(re) => write!(f, "/{}/", re.as_str()),
            _ => self.fmt_collection(f),
        }
    }
}

impl Value {
    fn fmt_collection(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Sequence(items) => f.debug_list().entries(items.borrow().iter()).finish(),
            Value::Mapping(entries) => f.debug_map().entries(entries.borrow().iter()).finish(),
            Value::Set(keys) => f.debug_set().entries(keys.borrow().iter()).finish(),
            Value::Pairs(pairs) => f
                .debug_list()
                .entries(pairs.borrow().iter().map(|(k, v)| (k, v)))
                .finish(),
            _ => Ok(()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<BigInt> for Value {
    fn from(n: BigInt) -> Self {
        Value::Integer(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(BigInt::from(n))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::sequence(items)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(entries: IndexMap<String, Value>) -> Self {
        Value::mapping(entries)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Binary(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Timestamp(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_key_text() {
        assert_eq!(Value::Null.to_key().unwrap(), "null");
        assert_eq!(Value::from(false).to_key().unwrap(), "false");
        assert_eq!(Value::from(-12i64).to_key().unwrap(), "-12");
        assert_eq!(Value::from(1.5).to_key().unwrap(), "1.5");
        assert_eq!(Value::from(f64::NEG_INFINITY).to_key().unwrap(), "-.inf");
        assert_eq!(Value::from(vec![1u8, 2, 3]).to_key().unwrap(), "AQID");
        let t = Utc.with_ymd_and_hms(2001, 12, 14, 0, 0, 0).unwrap();
        assert_eq!(Value::from(t).to_key().unwrap(), "2001-12-14T00:00:00.000Z");
        assert!(Value::sequence(vec![]).to_key().is_none());
    }

    #[test]
    fn test_same_instance() {
        let a = Value::sequence(vec![Value::from(1i64)]);
        let b = a.clone();
        let c = Value::sequence(vec![Value::from(1i64)]);
        assert!(a.same_instance(&b));
        assert!(!a.same_instance(&c));
        assert_eq!(a, c);
        assert!(!Value::Null.same_instance(&Value::Null));
    }

    #[test]
    fn test_debug_of_cycle() {
        let items = Rc::new(RefCell::new(vec![Value::from(1i64)]));
        let seq = Value::Sequence(items.clone());
        items.borrow_mut().push(seq.clone());
        assert_eq!(format!("{:?}", seq), "[1, <recursive>]");
        items.borrow_mut().clear();
    }

    #[test]
    fn test_debug_scalars() {
        let mut entries = IndexMap::new();
        entries.insert("b".to_string(), Value::Binary(vec![0xde, 0xad]));
        entries.insert("n".to_string(), Value::Float(f64::NAN));
        assert_eq!(format!("{:?}", Value::mapping(entries)), r#"{"b": <dead>, "n": .nan}"#);
    }

    #[test]
    fn test_accessors() {
        let mut entries = IndexMap::new();
        entries.insert("k".to_string(), Value::from("v"));
        let map = Value::mapping(entries);
        assert_eq!(map.get("k").unwrap().as_str(), Some("v"));
        assert!(map.get("missing").is_none());
        assert_eq!(Value::from(7i64).as_i64(), Some(7));
        assert!(Value::from("x").as_i64().is_none());
    }
}
