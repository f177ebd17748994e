//! Implicit tag resolution.
//!
//! Untagged plain scalars get their tag by matching the value against an
//! ordered list of patterns. Candidate patterns are bucketed by the first
//! character they can match, so most scalars are tested against only a
//! handful of patterns.

use std::collections::HashMap;

use regex::Regex;

/// Standard tags of the `tag:yaml.org,2002:` namespace.
pub mod tag {
    pub const STR: &str = "tag:yaml.org,2002:str";
    pub const SEQ: &str = "tag:yaml.org,2002:seq";
    pub const MAP: &str = "tag:yaml.org,2002:map";
    pub const NULL: &str = "tag:yaml.org,2002:null";
    pub const BOOL: &str = "tag:yaml.org,2002:bool";
    pub const INT: &str = "tag:yaml.org,2002:int";
    pub const FLOAT: &str = "tag:yaml.org,2002:float";
    pub const BINARY: &str = "tag:yaml.org,2002:binary";
    pub const TIMESTAMP: &str = "tag:yaml.org,2002:timestamp";
    pub const OMAP: &str = "tag:yaml.org,2002:omap";
    pub const PAIRS: &str = "tag:yaml.org,2002:pairs";
    pub const SET: &str = "tag:yaml.org,2002:set";
    pub const MERGE: &str = "tag:yaml.org,2002:merge";
    pub const VALUE: &str = "tag:yaml.org,2002:value";
    pub const YAML: &str = "tag:yaml.org,2002:yaml";
    pub const JS_UNDEFINED: &str = "tag:yaml.org,2002:js/undefined";
    pub const JS_REGEXP: &str = "tag:yaml.org,2002:js/regexp";
}

/// The structural kind of a node being resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeShape {
    Scalar,
    Sequence,
    Mapping,
}

#[derive(Clone, Debug)]
struct ImplicitRule {
    tag: String,
    regex: Regex,
}

/// Ordered implicit resolvers for plain scalars.
#[derive(Clone, Debug, Default)]
pub struct Resolver {
    rules: Vec<ImplicitRule>,
    by_first: HashMap<char, Vec<usize>>,
    /// Rules tried for the empty string.
    empty: Vec<usize>,
    /// Rules tried for every value.
    any: Vec<usize>,
}

impl Resolver {
    /// A resolver with no implicit rules: every plain scalar is a string.
    pub fn new() -> Self {
        Self::default()
    }

    /// The YAML 1.1 implicit types.
    pub fn yaml11() -> Self {
        let mut resolver = Self::new();
        for (tag, pattern, first) in YAML11_RULES {
            match Regex::new(pattern) {
                Ok(regex) => resolver.add_implicit_resolver(tag, regex, Some(first)),
                Err(e) => tracing::error!(tag, error = %e, "invalid built-in resolver pattern"),
            }
        }
        resolver
    }

    /// Register `regex` for `tag`.
    ///
    /// `first` lists the characters a matching value may begin with; `None`
    /// makes the rule a candidate for every value. If the pattern matches the
    /// empty string, the rule is also tried for empty values. Bucketed rules
    /// are tried in registration order, then the unbucketed ones.
    pub fn add_implicit_resolver(&mut self, tag: &str, regex: Regex, first: Option<&str>) {
        let index = self.rules.len();
        let matches_empty = regex.is_match("");
        self.rules.push(ImplicitRule {
            tag: tag.to_string(),
            regex,
        });
        match first {
            None => self.any.push(index),
            Some(chars) => {
                for ch in chars.chars() {
                    self.by_first.entry(ch).or_default().push(index);
                }
                if matches_empty {
                    self.empty.push(index);
                }
            }
        }
    }

    /// The tag for an untagged node.
    ///
    /// Scalars are matched against the implicit rules only when
    /// `implicit.0` is set, that is when they were written plain or with the
    /// non-specific `!` tag.
    pub fn resolve(&self, shape: NodeShape, value: &str, implicit: (bool, bool)) -> &str {
        match shape {
            NodeShape::Scalar => {
                if implicit.0 {
                    let bucket = match value.chars().next() {
                        None => Some(&self.empty),
                        Some(ch) => self.by_first.get(&ch),
                    };
                    let candidates = bucket.into_iter().flatten().chain(self.any.iter());
                    for &index in candidates {
                        let rule = &self.rules[index];
                        if rule.regex.is_match(value) {
                            return &rule.tag;
                        }
                    }
                }
                tag::STR
            }
            NodeShape::Sequence => tag::SEQ,
            NodeShape::Mapping => tag::MAP,
        }
    }
}

const YAML11_RULES: [(&str, &str, &str); 8] = [
    (
        tag::BOOL,
        r"^(?:yes|Yes|YES|no|No|NO|true|True|TRUE|false|False|FALSE|on|On|ON|off|Off|OFF)$",
        "yYnNtTfFoO",
    ),
    (
        tag::FLOAT,
        r"^(?:[-+]?(?:[0-9][0-9_]*)\.[0-9_]*(?:[eE][-+][0-9]+)?|\._*[0-9][0-9_]*(?:[eE][-+][0-9]+)?|[-+]?[0-9][0-9_]*(?::[0-5]?[0-9])+\.[0-9_]*|[-+]?\.(?:inf|Inf|INF)|\.(?:nan|NaN|NAN))$",
        "-+0123456789.",
    ),
    (
        tag::INT,
        r"^(?:[-+]?0b_*[0-1][0-1_]*|[-+]?0[0-7_]+|[-+]?(?:0|[1-9][0-9_]*)|[-+]?0x_*[0-9a-fA-F][0-9a-fA-F_]*|[-+]?[1-9][0-9_]*(?::[0-5]?[0-9])+)$",
        "-+0123456789",
    ),
    (tag::MERGE, r"^(?:<<)$", "<"),
    (tag::NULL, r"^(?:~|null|Null|NULL|)$", "~nN"),
    (
        tag::TIMESTAMP,
        r"^(?:[0-9][0-9][0-9][0-9]-[0-9][0-9]-[0-9][0-9]|[0-9][0-9][0-9][0-9]-[0-9][0-9]?-[0-9][0-9]?(?:[Tt]|[ \t]+)[0-9][0-9]?:[0-9][0-9]:[0-9][0-9](?:\.[0-9]*)?(?:[ \t]*(?:Z|[-+][0-9][0-9]?(?::[0-9][0-9])?))?)$",
        "0123456789",
    ),
    (tag::VALUE, r"^(?:=)$", "="),
    // Never matches a scalar that reaches the resolver: `!`, `&` and `*`
    // cannot start a plain scalar.
    (tag::YAML, r"^(?:!|&|\*)$", "!&*"),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(value: &str) -> String {
        Resolver::yaml11()
            .resolve(NodeShape::Scalar, value, (true, false))
            .to_string()
    }

    #[test]
    fn test_booleans() {
        for value in ["yes", "No", "TRUE", "false", "on", "OFF"] {
            assert_eq!(plain(value), tag::BOOL, "{}", value);
        }
        assert_eq!(plain("y"), tag::STR);
        assert_eq!(plain("tRUE"), tag::STR);
    }

    #[test]
    fn test_integers() {
        for value in ["0", "-17", "+3", "1_000", "0b1010", "017", "0x1F", "190:20:30"] {
            assert_eq!(plain(value), tag::INT, "{}", value);
        }
        assert_eq!(plain("0x"), tag::STR);
        assert_eq!(plain("0x_"), tag::STR);
        assert_eq!(plain("-0b__"), tag::STR);
        assert_eq!(plain("0b_1"), tag::INT);
        assert_eq!(plain("0x_f_f"), tag::INT);
        assert_eq!(plain("1:99"), tag::STR);
    }

    #[test]
    fn test_floats() {
        for value in ["1.5", "-0.5e+3", ".5", "1.", "190:20:30.15", ".inf", "-.Inf", ".NaN"] {
            assert_eq!(plain(value), tag::FLOAT, "{}", value);
        }
        assert_eq!(plain("1e5"), tag::STR);
        assert_eq!(plain("-.nan"), tag::STR);
        assert_eq!(plain("._"), tag::STR);
        assert_eq!(plain("._5"), tag::FLOAT);
    }

    #[test]
    fn test_null() {
        for value in ["~", "null", "Null", "NULL", ""] {
            assert_eq!(plain(value), tag::NULL, "{:?}", value);
        }
        assert_eq!(plain("nil"), tag::STR);
    }

    #[test]
    fn test_timestamps() {
        for value in [
            "2001-12-14",
            "2001-12-14t21:59:43.10-05:00",
            "2001-12-14 21:59:43.10 -5",
            "2001-12-15T02:59:43.1Z",
            "2001-1-2 3:04:05",
        ] {
            assert_eq!(plain(value), tag::TIMESTAMP, "{}", value);
        }
        assert_eq!(plain("2001-1-2"), tag::STR);
    }

    #[test]
    fn test_merge_and_value() {
        assert_eq!(plain("<<"), tag::MERGE);
        assert_eq!(plain("="), tag::VALUE);
    }

    #[test]
    fn test_quoted_scalars_are_strings() {
        let resolver = Resolver::yaml11();
        assert_eq!(resolver.resolve(NodeShape::Scalar, "123", (false, true)), tag::STR);
    }

    #[test]
    fn test_collections() {
        let resolver = Resolver::new();
        assert_eq!(resolver.resolve(NodeShape::Sequence, "", (true, false)), tag::SEQ);
        assert_eq!(resolver.resolve(NodeShape::Mapping, "", (false, false)), tag::MAP);
    }

    #[test]
    fn test_custom_rule_order() {
        let mut resolver = Resolver::yaml11();
        resolver.add_implicit_resolver("!hex", Regex::new(r"^#[0-9a-f]{6}$").unwrap(), Some("#"));
        resolver.add_implicit_resolver("!any", Regex::new(r"^zz$").unwrap(), None);
        assert_eq!(resolver.resolve(NodeShape::Scalar, "#00ff00", (true, false)), "!hex");
        assert_eq!(resolver.resolve(NodeShape::Scalar, "zz", (true, false)), "!any");
        assert_eq!(resolver.resolve(NodeShape::Scalar, "12", (true, false)), tag::INT);
    }
}
