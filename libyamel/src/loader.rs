//! The full pipeline: text to values.

use crate::composer::Composer;
use crate::constructor::{Constructor, Constructors};
use crate::error::{Error, MarkedError, Result};
use crate::parser::Parser;
use crate::reader::Reader;
use crate::scanner::Scanner;
use crate::schema::{Schema, SAFE_SCHEMA};
use crate::value::Value;

/// Source name used in marks when none is given.
pub const DEFAULT_NAME: &str = "<input>";

/// Options for the `*_with` entry points.
#[derive(Clone, Debug)]
pub struct LoadOptions {
    /// Shown in error marks. Defaults to `<input>`.
    pub name: Option<String>,
    pub schema: Schema,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            name: None,
            schema: SAFE_SCHEMA.clone(),
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_NAME)
    }
}

/// Loads documents one at a time.
pub struct Loader {
    composer: Composer,
    constructors: Constructors,
    failed: bool,
}

impl Loader {
    pub fn new(input: &str, options: &LoadOptions) -> Result<Self> {
        let reader = Reader::new(options.name(), input)?;
        let parser = Parser::new(Scanner::new(reader));
        Ok(Self {
            composer: Composer::new(parser, options.schema.resolver().clone()),
            constructors: options.schema.constructors().clone(),
            failed: false,
        })
    }

    /// Whether another document is available.
    pub fn check_data(&mut self) -> Result<bool> {
        self.composer.check_node()
    }

    /// Load the next document, or `None` at the end of the stream.
    pub fn get_data(&mut self) -> Result<Option<Value>> {
        match self.composer.get_node()? {
            Some(document) => Constructor::new(&document, &self.constructors)
                .construct_document()
                .map(Some),
            None => Ok(None),
        }
    }

    /// Load the only document of the stream.
    ///
    /// Fails if the stream holds no document or more than one.
    pub fn get_single_data(&mut self) -> Result<Value> {
        match self.composer.get_single_node()? {
            Some(document) => Constructor::new(&document, &self.constructors).construct_document(),
            None => Err(Error::Composer(MarkedError::new(
                "expected a single document in the stream, but found none",
                Some(self.composer.mark()),
            ))),
        }
    }
}

impl Iterator for Loader {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.get_data() {
            Ok(value) => value.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_documents_in_order() {
        let mut loader = Loader::new("--- 1\n--- two\n...\n", &LoadOptions::default()).unwrap();
        assert!(loader.check_data().unwrap());
        assert_eq!(loader.get_data().unwrap().unwrap().as_i64(), Some(1));
        assert_eq!(loader.get_data().unwrap().unwrap().as_str(), Some("two"));
        assert!(!loader.check_data().unwrap());
        assert!(loader.get_data().unwrap().is_none());
    }

    #[test]
    fn test_single_data_requires_a_document() {
        let mut loader = Loader::new("# nothing\n", &LoadOptions::default()).unwrap();
        let err = loader.get_single_data().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Composer);
        assert_eq!(
            err.problem(),
            "expected a single document in the stream, but found none"
        );
    }

    #[test]
    fn test_name_appears_in_marks() {
        let options = LoadOptions::new().with_name("config.yaml");
        let err = Loader::new("a: *b\n", &options)
            .unwrap()
            .get_single_data()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "found undefined alias 'b' in \"config.yaml\", line 1, column 4"
        );
    }

    #[test]
    fn test_stops_after_error() {
        let loader = Loader::new("--- [1\n--- 2\n", &LoadOptions::default()).unwrap();
        let results: Vec<Result<Value>> = loader.collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }

    #[test]
    fn test_stops_after_composer_error() {
        let loader = Loader::new("[*x, [1, 2]]\n", &LoadOptions::default()).unwrap();
        let results: Vec<Result<Value>> = loader.collect();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_ref().unwrap_err().kind(), ErrorKind::Composer);
    }

    #[test]
    fn test_stops_after_constructor_error() {
        let loader = Loader::new("--- !!int abc\n--- 2\n", &LoadOptions::default()).unwrap();
        let results: Vec<Result<Value>> = loader.collect();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_ref().unwrap_err().kind(), ErrorKind::Constructor);
    }
}
