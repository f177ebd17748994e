//! Resolver and constructor tables, bundled.

use std::sync::LazyLock;

use regex::Regex;

use crate::constructor::{Constructed, Constructor, Constructors};
use crate::error::Result;
use crate::nodes::NodeId;
use crate::resolver::Resolver;

/// The standard YAML 1.1 types. Safe for untrusted input.
pub static SAFE_SCHEMA: LazyLock<Schema> = LazyLock::new(Schema::safe);

/// The safe types plus `!!js/undefined` and `!!js/regexp`.
pub static FULL_SCHEMA: LazyLock<Schema> = LazyLock::new(Schema::full);

/// Which implicit tags plain scalars get, and how each tag is constructed.
///
/// A schema is a plain value: adding to one never affects another.
#[derive(Clone, Debug)]
pub struct Schema {
    resolver: Resolver,
    constructors: Constructors,
}

impl Schema {
    pub fn new(resolver: Resolver, constructors: Constructors) -> Self {
        Self {
            resolver,
            constructors,
        }
    }

    pub fn safe() -> Self {
        Self::new(Resolver::yaml11(), Constructors::safe())
    }

    pub fn full() -> Self {
        Self::new(Resolver::yaml11(), Constructors::full())
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn constructors(&self) -> &Constructors {
        &self.constructors
    }

    /// Register a constructor for `tag`.
    pub fn add_constructor<F>(&mut self, tag: &str, construct: F) -> &mut Self
    where
        F: Fn(&mut Constructor<'_>, NodeId) -> Result<Constructed> + Send + Sync + 'static,
    {
        self.constructors.add(tag, construct);
        self
    }

    /// Resolve plain scalars matching `regex` to `tag`.
    ///
    /// `first` lists the characters such scalars can start with. `None`
    /// tries the rule on every plain scalar.
    pub fn add_implicit_resolver(
        &mut self,
        tag: &str,
        regex: Regex,
        first: Option<&str>,
    ) -> &mut Self {
        self.resolver.add_implicit_resolver(tag, regex, first);
        self
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::safe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{load_with, LoadOptions, Value};

    fn point_schema() -> Schema {
        let mut schema = Schema::safe();
        schema
            .add_implicit_resolver(
                "!point",
                Regex::new(r"^\(-?[0-9]+,-?[0-9]+\)$").unwrap(),
                Some("("),
            )
            .add_constructor("!point", |constructor, id| {
                let text = constructor.construct_scalar(id)?;
                let coordinates: Vec<Value> = text
                    .trim_matches(|ch: char| ch == '(' || ch == ')')
                    .split(',')
                    .map(|n| Value::from(n.parse::<i64>().unwrap_or_default()))
                    .collect();
                Ok(Value::sequence(coordinates).into())
            });
        schema
    }

    #[test]
    fn test_custom_tag() {
        let options = LoadOptions {
            schema: point_schema(),
            ..LoadOptions::default()
        };
        let value = load_with("at: (3,-4)\nexplicit: !point '(1,2)'\n", &options).unwrap();
        let at = value.get("at").unwrap();
        assert_eq!(at.get_index(1).unwrap().as_i64(), Some(-4));
        let explicit = value.get("explicit").unwrap();
        assert_eq!(explicit.get_index(0).unwrap().as_i64(), Some(1));
    }

    #[test]
    fn test_schemas_are_independent() {
        let _custom = point_schema();
        let value = crate::load("(3,-4)").unwrap();
        assert_eq!(value.as_str(), Some("(3,-4)"));
        assert!(!SAFE_SCHEMA.constructors().contains("!point"));
    }

    #[test]
    fn test_full_schema() {
        assert!(FULL_SCHEMA.constructors().contains("tag:yaml.org,2002:js/regexp"));
        assert!(!SAFE_SCHEMA.constructors().contains("tag:yaml.org,2002:js/regexp"));
    }
}
