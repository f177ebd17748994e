//! Stage 6: Constructor
//!
//! Turns a composed [`Document`] into a [`Value`]. Each node is constructed
//! at most once and the result is shared by every reference to the node.
//!
//! Collection constructors return [`Constructed::Deferred`]: an empty
//! container that is recorded for the node immediately, plus a closure that
//! fills it in later. A collection that refers to itself therefore finds its
//! own container instead of recursing. Deferred closures run after the root
//! has been constructed, one phase at a time, unless deep construction is in
//! effect, in which case they run as soon as their container is recorded.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;
use std::sync::{Arc, LazyLock};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use indexmap::{IndexMap, IndexSet};
use num_bigint::BigInt;
use regex::Regex;

use crate::error::{Error, Mark, MarkedError, Result};
use crate::nodes::{Document, Node, NodeId, NodeKind};
use crate::resolver::tag;
use crate::value::Value;

/// Fills in a container returned by a deferred constructor.
pub type Populate = Box<dyn FnOnce(&mut Constructor<'_>) -> Result<()>>;

/// Builds the value of one node.
pub type ConstructFn =
    Arc<dyn Fn(&mut Constructor<'_>, NodeId) -> Result<Constructed> + Send + Sync>;

/// What a construction function produced.
pub enum Constructed {
    Value(Value),
    /// A container to record now and a closure that populates it.
    Deferred(Value, Populate),
}

impl From<Value> for Constructed {
    fn from(value: Value) -> Self {
        Constructed::Value(value)
    }
}

/// Build a [`Error::Constructor`].
pub fn constructor_error(
    context: Option<(&str, &Mark)>,
    problem: impl Into<String>,
    mark: &Mark,
) -> Error {
    let mut error = MarkedError::new(problem, Some(mark.clone()));
    if let Some((context, context_mark)) = context {
        error = error.with_context(context, Some(context_mark.clone()));
    }
    Error::Constructor(error)
}

/// The tag to constructor registry.
#[derive(Clone)]
pub struct Constructors {
    by_tag: HashMap<String, ConstructFn>,
    /// Used for tags with no registered constructor.
    fallback: ConstructFn,
}

impl Constructors {
    /// A registry that rejects every tag.
    pub fn empty() -> Self {
        Self {
            by_tag: HashMap::new(),
            fallback: Arc::new(construct_undefined),
        }
    }

    /// The standard YAML 1.1 types.
    pub fn safe() -> Self {
        let mut constructors = Self::empty();
        constructors.add(tag::NULL, construct_yaml_null);
        constructors.add(tag::BOOL, construct_yaml_bool);
        constructors.add(tag::INT, construct_yaml_int);
        constructors.add(tag::FLOAT, construct_yaml_float);
        constructors.add(tag::BINARY, construct_yaml_binary);
        constructors.add(tag::TIMESTAMP, construct_yaml_timestamp);
        constructors.add(tag::OMAP, construct_yaml_omap);
        constructors.add(tag::PAIRS, construct_yaml_pairs);
        constructors.add(tag::SET, construct_yaml_set);
        constructors.add(tag::STR, construct_yaml_str);
        constructors.add(tag::SEQ, construct_yaml_seq);
        constructors.add(tag::MAP, construct_yaml_map);
        constructors
    }

    /// The safe types plus `!!js/undefined` and `!!js/regexp`.
    pub fn full() -> Self {
        let mut constructors = Self::safe();
        constructors.add(tag::JS_UNDEFINED, construct_js_undefined);
        constructors.add(tag::JS_REGEXP, construct_js_regexp);
        constructors
    }

    /// Register `construct` for `tag`, replacing any previous entry.
    pub fn add<F>(&mut self, tag: &str, construct: F)
    where
        F: Fn(&mut Constructor<'_>, NodeId) -> Result<Constructed> + Send + Sync + 'static,
    {
        self.by_tag.insert(tag.to_string(), Arc::new(construct));
    }

    /// Replace the constructor used for unregistered tags.
    pub fn set_fallback<F>(&mut self, construct: F)
    where
        F: Fn(&mut Constructor<'_>, NodeId) -> Result<Constructed> + Send + Sync + 'static,
    {
        self.fallback = Arc::new(construct);
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.by_tag.contains_key(tag)
    }

    pub fn get(&self, tag: &str) -> &ConstructFn {
        self.by_tag.get(tag).unwrap_or(&self.fallback)
    }
}

impl Default for Constructors {
    fn default() -> Self {
        Self::safe()
    }
}

impl fmt::Debug for Constructors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<&String> = self.by_tag.keys().collect();
        tags.sort();
        f.debug_struct("Constructors").field("tags", &tags).finish()
    }
}

/// Construction state for one document.
pub struct Constructor<'a> {
    document: &'a Document,
    constructors: &'a Constructors,
    constructed: HashMap<NodeId, Value>,
    in_progress: HashSet<NodeId>,
    pending: Vec<Populate>,
    deep: bool,
    /// Mappings whose merge keys are being expanded.
    flattening: HashSet<NodeId>,
}

impl<'a> Constructor<'a> {
    pub fn new(document: &'a Document, constructors: &'a Constructors) -> Self {
        Self {
            document,
            constructors,
            constructed: HashMap::new(),
            in_progress: HashSet::new(),
            pending: Vec::new(),
            deep: false,
            flattening: HashSet::new(),
        }
    }

    pub fn document(&self) -> &'a Document {
        self.document
    }

    pub fn node(&self, id: NodeId) -> &'a Node {
        self.document.node(id)
    }

    /// Construct the root and run every deferred population.
    pub fn construct_document(&mut self) -> Result<Value> {
        let value = self.construct_object(self.document.root_id(), false)?;
        let mut drained = 0;
        while !self.pending.is_empty() {
            let phase = std::mem::take(&mut self.pending);
            drained += phase.len();
            for populate in phase {
                populate(self)?;
            }
        }
        tracing::debug!(
            nodes = self.constructed.len(),
            deferred = drained,
            "constructed document"
        );
        Ok(value)
    }

    /// Construct a node, or return its value if it was already constructed.
    ///
    /// With `deep` set, deferred populations of this node and everything it
    /// constructs run immediately.
    pub fn construct_object(&mut self, id: NodeId, deep: bool) -> Result<Value> {
        if let Some(value) = self.constructed.get(&id) {
            return Ok(value.clone());
        }
        let node = self.node(id);
        if self.in_progress.contains(&id) {
            return Err(constructor_error(
                None,
                "found unconstructable recursive node",
                &node.start_mark,
            ));
        }

        let old_deep = self.deep;
        if deep {
            self.deep = true;
        }
        self.in_progress.insert(id);

        let constructors = self.constructors;
        let construct = Arc::clone(constructors.get(&node.tag));
        let value = match construct(self, id)? {
            Constructed::Value(value) => {
                self.constructed.insert(id, value.clone());
                self.in_progress.remove(&id);
                value
            }
            Constructed::Deferred(value, populate) => {
                self.constructed.insert(id, value.clone());
                self.in_progress.remove(&id);
                if self.deep {
                    populate(self)?;
                } else {
                    self.pending.push(populate);
                }
                value
            }
        };

        self.deep = old_deep;
        Ok(value)
    }

    /// The text of a scalar node.
    ///
    /// A mapping with a `=` key stands for the scalar value of that entry.
    pub fn construct_scalar(&self, id: NodeId) -> Result<&'a str> {
        let node = self.node(id);
        match &node.kind {
            NodeKind::Scalar { value, .. } => Ok(value.as_str()),
            NodeKind::Mapping { pairs, .. } => {
                let value_entry = pairs
                    .iter()
                    .rev()
                    .find(|&&(key, _)| self.node(key).tag == tag::VALUE);
                match value_entry {
                    Some(&(_, value)) => self.construct_scalar(value),
                    None => Err(expected_kind("scalar", node)),
                }
            }
            NodeKind::Sequence { .. } => Err(expected_kind("scalar", node)),
        }
    }

    /// The items of a sequence node.
    pub fn construct_sequence(&mut self, id: NodeId, deep: bool) -> Result<Vec<Value>> {
        let node = self.node(id);
        let Some(items) = node.items() else {
            return Err(expected_kind("sequence", node));
        };
        items
            .iter()
            .map(|&item| self.construct_object(item, deep))
            .collect()
    }

    /// The entries of a mapping node, after merge keys are expanded.
    pub fn construct_mapping(&mut self, id: NodeId, deep: bool) -> Result<IndexMap<String, Value>> {
        let node = self.node(id);
        if !node.is_mapping() {
            return Err(expected_kind("mapping", node));
        }
        let pairs = self.flatten_mapping(id)?;
        let mut mapping = IndexMap::with_capacity(pairs.len());
        for (key_id, value_id) in pairs {
            let key = self.construct_key(key_id, deep)?;
            let value = self.construct_object(value_id, deep)?;
            mapping.insert(key, value);
        }
        Ok(mapping)
    }

    fn construct_key(&mut self, id: NodeId, deep: bool) -> Result<String> {
        let node = self.node(id);
        let key = if node.tag == tag::VALUE {
            Value::from(self.construct_scalar(id)?)
        } else {
            self.construct_object(id, deep)?
        };
        key.to_key().ok_or_else(|| {
            constructor_error(
                Some(("while constructing a mapping", &node.start_mark)),
                "found unhashable key",
                &node.start_mark,
            )
        })
    }

    /// The pairs of a mapping with every `<<` entry replaced by the pairs it
    /// merges in. Merged pairs come first so that the node's own keys win.
    fn flatten_mapping(&mut self, id: NodeId) -> Result<Vec<(NodeId, NodeId)>> {
        let node = self.node(id);
        let pairs = node.pairs().unwrap_or_default();
        if !self.flattening.insert(id) {
            return Err(constructor_error(
                Some(("while constructing a mapping", &node.start_mark)),
                "found recursive merge",
                &node.start_mark,
            ));
        }

        let mut merge = Vec::new();
        let mut own = Vec::with_capacity(pairs.len());
        for &(key_id, value_id) in pairs {
            if self.node(key_id).tag != tag::MERGE {
                own.push((key_id, value_id));
                continue;
            }
            let value_node = self.node(value_id);
            match &value_node.kind {
                NodeKind::Mapping { .. } => merge.extend(self.flatten_mapping(value_id)?),
                NodeKind::Sequence { items, .. } => {
                    let mut submerge = Vec::with_capacity(items.len());
                    for &item in items {
                        let subnode = self.node(item);
                        if !subnode.is_mapping() {
                            return Err(constructor_error(
                                Some(("while constructing a mapping", &node.start_mark)),
                                format!(
                                    "expected a mapping for merging, but found {}",
                                    subnode.id()
                                ),
                                &subnode.start_mark,
                            ));
                        }
                        submerge.push(self.flatten_mapping(item)?);
                    }
                    for pairs in submerge.into_iter().rev() {
                        merge.extend(pairs);
                    }
                }
                NodeKind::Scalar { .. } => {
                    return Err(constructor_error(
                        Some(("while constructing a mapping", &node.start_mark)),
                        format!(
                            "expected a mapping or list of mappings for merging, but found {}",
                            value_node.id()
                        ),
                        &value_node.start_mark,
                    ));
                }
            }
        }

        self.flattening.remove(&id);
        merge.extend(own);
        Ok(merge)
    }

    /// The single key and value of each entry of an `!!omap` or `!!pairs`.
    fn construct_single_pairs(&mut self, id: NodeId, context: &str) -> Result<Vec<(Value, Value)>> {
        let node = self.node(id);
        let Some(items) = node.items() else {
            return Err(constructor_error(
                Some((context, &node.start_mark)),
                format!("expected a sequence, but found {}", node.id()),
                &node.start_mark,
            ));
        };
        let mut result = Vec::with_capacity(items.len());
        for &item in items {
            let subnode = self.node(item);
            let Some(pairs) = subnode.pairs() else {
                return Err(constructor_error(
                    Some((context, &node.start_mark)),
                    format!("expected a mapping of length 1, but found {}", subnode.id()),
                    &subnode.start_mark,
                ));
            };
            let &[(key_id, value_id)] = pairs else {
                return Err(constructor_error(
                    Some((context, &node.start_mark)),
                    format!("expected a single mapping item, but found {} items", pairs.len()),
                    &subnode.start_mark,
                ));
            };
            let key = self.construct_object(key_id, false)?;
            let value = self.construct_object(value_id, false)?;
            result.push((key, value));
        }
        Ok(result)
    }
}

fn expected_kind(expected: &str, node: &Node) -> Error {
    constructor_error(
        None,
        format!("expected a {} node, but found {}", expected, node.id()),
        &node.start_mark,
    )
}

fn construct_undefined(constructor: &mut Constructor<'_>, id: NodeId) -> Result<Constructed> {
    let node = constructor.node(id);
    Err(constructor_error(
        None,
        format!("could not determine a constructor for the tag {}", node.tag),
        &node.start_mark,
    ))
}

fn construct_yaml_null(constructor: &mut Constructor<'_>, id: NodeId) -> Result<Constructed> {
    constructor.construct_scalar(id)?;
    Ok(Value::Null.into())
}

fn construct_yaml_bool(constructor: &mut Constructor<'_>, id: NodeId) -> Result<Constructed> {
    let value = constructor.construct_scalar(id)?;
    let b = match value.to_lowercase().as_str() {
        "y" | "yes" | "true" | "on" => true,
        "n" | "no" | "false" | "off" => false,
        _ => {
            return Err(constructor_error(
                None,
                format!("expected a boolean, but found '{}'", value),
                &constructor.node(id).start_mark,
            ))
        }
    };
    Ok(Value::Bool(b).into())
}

/// Strip `_` separators and split off the sign.
fn split_sign(value: &str) -> (bool, String) {
    let value: String = value.chars().filter(|&ch| ch != '_').collect();
    match value.strip_prefix('-') {
        Some(rest) => (true, rest.to_string()),
        None => {
            let rest = value.strip_prefix('+').unwrap_or(&value);
            (false, rest.to_string())
        }
    }
}

fn parse_int(value: &str) -> Option<BigInt> {
    let (negative, digits) = split_sign(value);
    let magnitude = if digits == "0" {
        BigInt::from(0)
    } else if let Some(binary) = digits.strip_prefix("0b") {
        BigInt::parse_bytes(binary.as_bytes(), 2)?
    } else if let Some(hex) = digits.strip_prefix("0x") {
        BigInt::parse_bytes(hex.as_bytes(), 16)?
    } else if digits.starts_with('0') {
        BigInt::parse_bytes(digits.as_bytes(), 8)?
    } else if digits.contains(':') {
        let mut total = BigInt::from(0);
        for part in digits.split(':') {
            total = total * 60 + BigInt::parse_bytes(part.as_bytes(), 10)?;
        }
        total
    } else {
        BigInt::parse_bytes(digits.as_bytes(), 10)?
    };
    Some(if negative { -magnitude } else { magnitude })
}

fn construct_yaml_int(constructor: &mut Constructor<'_>, id: NodeId) -> Result<Constructed> {
    let value = constructor.construct_scalar(id)?;
    match parse_int(value) {
        Some(n) => Ok(Value::Integer(n).into()),
        None => Err(constructor_error(
            None,
            format!("expected an integer, but found '{}'", value),
            &constructor.node(id).start_mark,
        )),
    }
}

fn parse_float(value: &str) -> Option<f64> {
    let (negative, digits) = split_sign(value);
    let lower = digits.to_lowercase();
    let magnitude = if lower == ".inf" {
        f64::INFINITY
    } else if lower == ".nan" {
        f64::NAN
    } else if digits.contains(':') {
        let mut total = 0.0;
        for part in digits.split(':') {
            total = total * 60.0 + part.parse::<f64>().ok()?;
        }
        total
    } else {
        digits.parse::<f64>().ok()?
    };
    Some(if negative { -magnitude } else { magnitude })
}

fn construct_yaml_float(constructor: &mut Constructor<'_>, id: NodeId) -> Result<Constructed> {
    let value = constructor.construct_scalar(id)?;
    match parse_float(value) {
        Some(f) => Ok(Value::Float(f).into()),
        None => Err(constructor_error(
            None,
            format!("expected a float, but found '{}'", value),
            &constructor.node(id).start_mark,
        )),
    }
}

fn construct_yaml_binary(constructor: &mut Constructor<'_>, id: NodeId) -> Result<Constructed> {
    let value = constructor.construct_scalar(id)?;
    let compact: String = value.chars().filter(|ch| !ch.is_whitespace()).collect();
    match STANDARD.decode(compact) {
        Ok(bytes) => Ok(Value::Binary(bytes).into()),
        Err(e) => Err(constructor_error(
            None,
            format!("failed to decode base64 data: {}", e),
            &constructor.node(id).start_mark,
        )),
    }
}

static TIMESTAMP_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^([0-9][0-9][0-9][0-9])",
        r"-([0-9][0-9]?)",
        r"-([0-9][0-9]?)",
        r"(?:(?:[Tt]|[ \t]+)",
        r"([0-9][0-9]?)",
        r":([0-9][0-9])",
        r":([0-9][0-9])",
        r"(?:\.([0-9]*))?",
        r"(?:[ \t]*(Z|([-+])([0-9][0-9]?)",
        r"(?::([0-9][0-9]))?))?)?$",
    ))
    .expect("timestamp pattern is valid")
});

fn parse_timestamp(value: &str) -> Option<chrono::DateTime<Utc>> {
    let caps = TIMESTAMP_REGEX.captures(value)?;
    let number = |index: usize| -> Option<u32> { caps.get(index)?.as_str().parse().ok() };

    let year: i32 = caps.get(1)?.as_str().parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, number(2)?, number(3)?)?;
    let Some(hour) = number(4) else {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    };

    let millis = match caps.get(7) {
        Some(fraction) => {
            let mut digits: String = fraction.as_str().chars().take(3).collect();
            while digits.len() < 3 {
                digits.push('0');
            }
            digits.parse().ok()?
        }
        None => 0,
    };
    let time = date.and_hms_milli_opt(hour, number(5)?, number(6)?, millis)?;
    let mut instant = Utc.from_utc_datetime(&time);

    if let Some(sign) = caps.get(9) {
        let minutes = i64::from(number(10)?) * 60 + i64::from(number(11).unwrap_or(0));
        let delta = Duration::minutes(if sign.as_str() == "-" { -minutes } else { minutes });
        instant = instant - delta;
    }
    Some(instant)
}

fn construct_yaml_timestamp(constructor: &mut Constructor<'_>, id: NodeId) -> Result<Constructed> {
    let value = constructor.construct_scalar(id)?;
    match parse_timestamp(value) {
        Some(t) => Ok(Value::Timestamp(t).into()),
        None => Err(constructor_error(
            None,
            format!("expected a timestamp, but found '{}'", value),
            &constructor.node(id).start_mark,
        )),
    }
}

fn construct_yaml_omap(_: &mut Constructor<'_>, id: NodeId) -> Result<Constructed> {
    let items = Rc::new(RefCell::new(Vec::new()));
    let target = Rc::clone(&items);
    Ok(Constructed::Deferred(
        Value::Sequence(items),
        Box::new(move |constructor: &mut Constructor<'_>| {
            let node = constructor.node(id);
            let pairs =
                constructor.construct_single_pairs(id, "while constructing an ordered map")?;
            for (key, value) in pairs {
                let key = key.to_key().ok_or_else(|| {
                    constructor_error(
                        Some(("while constructing an ordered map", &node.start_mark)),
                        "found unhashable key",
                        &node.start_mark,
                    )
                })?;
                let mut entry = IndexMap::with_capacity(1);
                entry.insert(key, value);
                target.borrow_mut().push(Value::mapping(entry));
            }
            Ok(())
        }),
    ))
}

fn construct_yaml_pairs(_: &mut Constructor<'_>, id: NodeId) -> Result<Constructed> {
    let pairs = Rc::new(RefCell::new(Vec::new()));
    let target = Rc::clone(&pairs);
    Ok(Constructed::Deferred(
        Value::Pairs(pairs),
        Box::new(move |constructor: &mut Constructor<'_>| {
            let result = constructor.construct_single_pairs(id, "while constructing pairs")?;
            target.borrow_mut().extend(result);
            Ok(())
        }),
    ))
}

fn construct_yaml_set(_: &mut Constructor<'_>, id: NodeId) -> Result<Constructed> {
    let keys = Rc::new(RefCell::new(IndexSet::new()));
    let target = Rc::clone(&keys);
    Ok(Constructed::Deferred(
        Value::Set(keys),
        Box::new(move |constructor: &mut Constructor<'_>| {
            let mapping = constructor.construct_mapping(id, false)?;
            target.borrow_mut().extend(mapping.into_keys());
            Ok(())
        }),
    ))
}

fn construct_yaml_str(constructor: &mut Constructor<'_>, id: NodeId) -> Result<Constructed> {
    Ok(Value::from(constructor.construct_scalar(id)?).into())
}

fn construct_yaml_seq(_: &mut Constructor<'_>, id: NodeId) -> Result<Constructed> {
    let items = Rc::new(RefCell::new(Vec::new()));
    let target = Rc::clone(&items);
    Ok(Constructed::Deferred(
        Value::Sequence(items),
        Box::new(move |constructor: &mut Constructor<'_>| {
            let values = constructor.construct_sequence(id, false)?;
            target.borrow_mut().extend(values);
            Ok(())
        }),
    ))
}

fn construct_yaml_map(_: &mut Constructor<'_>, id: NodeId) -> Result<Constructed> {
    let entries = Rc::new(RefCell::new(IndexMap::new()));
    let target = Rc::clone(&entries);
    Ok(Constructed::Deferred(
        Value::Mapping(entries),
        Box::new(move |constructor: &mut Constructor<'_>| {
            let mapping = constructor.construct_mapping(id, true)?;
            target.borrow_mut().extend(mapping);
            Ok(())
        }),
    ))
}

fn construct_js_undefined(_: &mut Constructor<'_>, _: NodeId) -> Result<Constructed> {
    Ok(Value::Undefined.into())
}

static REGEXP_FLAGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/([gim]*)$").expect("flags pattern is valid")
});

fn construct_js_regexp(constructor: &mut Constructor<'_>, id: NodeId) -> Result<Constructed> {
    let source = constructor.construct_scalar(id)?;
    let mut pattern = source;
    let mut flags = "";
    // `/pattern/flags` with at most three flags.
    if let Some(tail) = REGEXP_FLAGS.captures(source) {
        if let (Some(whole), Some(modifiers)) = (tail.get(0), tail.get(1)) {
            if source.starts_with('/') && whole.as_str().len() <= 4 {
                pattern = source.get(1..whole.start()).unwrap_or("");
                flags = modifiers.as_str();
            }
        }
    }
    let regex = regex::RegexBuilder::new(pattern)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .build()
        .map_err(|e| {
            constructor_error(
                None,
                format!("failed to compile regular expression: {}", e),
                &constructor.node(id).start_mark,
            )
        })?;
    Ok(Value::Regex(regex).into())
}
