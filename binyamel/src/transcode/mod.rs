//! Encoders from loaded YAML values to other formats.
//!
//! YAML documents may contain themselves through aliases. None of the
//! target formats can, so every encoder tracks the collections it is inside
//! and fails on re-entry.

pub mod cbor;
pub mod json;
pub mod toml;

use libyamel::Value;

/// The collections enclosing the value being encoded.
#[derive(Default)]
pub struct Ancestors(Vec<Value>);

impl Ancestors {
    /// Run `f` with `value` pushed as an ancestor.
    pub fn within<T>(
        &mut self,
        value: &Value,
        f: impl FnOnce(&mut Self) -> Result<T, String>,
    ) -> Result<T, String> {
        if self.0.iter().any(|ancestor| ancestor.same_instance(value)) {
            return Err("document contains a recursive structure".to_string());
        }
        self.0.push(value.clone());
        let result = f(self);
        self.0.pop();
        result
    }
}
