//! YAML 1.1 loader.
//!
//! Text goes through six pull-based stages, each asking the previous one
//! for the next item only when it needs it.
//!
//! # Loading Pipeline
//!
//! 1. **Reader**: Decodes the input into characters, rejecting unprintable
//!    ones, and tracks line and column for marks.
//!
//! 2. **Scanner**: Produces tokens, inserting the implicit block structure
//!    (block starts, block ends, simple keys) that indentation implies.
//!
//! 3. **Parser**: Checks the token stream against the grammar and emits
//!    events, resolving `%TAG` handles and synthesizing empty scalars.
//!
//! 4. **Composer**: Builds a node graph per document, connecting aliases to
//!    their anchors.
//!
//! 5. **Resolver**: Fills in tags the source left out.
//!
//! 6. **Constructor**: Turns nodes into [`Value`]s, sharing the value of
//!    every node among all its references.

pub mod composer;
pub mod constructor;
mod error;
pub mod events;
mod loader;
pub mod nodes;
pub mod parser;
pub mod reader;
pub mod render;
pub mod resolver;
pub mod scanner;
mod schema;
pub mod tokens;
mod value;

pub use composer::Composer;
pub use constructor::{Constructed, Constructor, Constructors};
pub use error::{Error, ErrorKind, Mark, MarkedError, ReaderError, Result};
pub use events::{Event, EventKind};
pub use loader::{LoadOptions, Loader, DEFAULT_NAME};
pub use nodes::{Document, Node, NodeId, NodeKind};
pub use parser::Parser;
pub use reader::Reader;
pub use resolver::Resolver;
pub use scanner::Scanner;
pub use schema::{Schema, FULL_SCHEMA, SAFE_SCHEMA};
pub use tokens::{ScalarStyle, Token, TokenKind};
pub use value::Value;

fn parser(input: &str) -> Result<Parser> {
    let reader = Reader::new(DEFAULT_NAME, input)?;
    Ok(Parser::new(Scanner::new(reader)))
}

fn composer(input: &str) -> Result<Composer> {
    Ok(Composer::new(parser(input)?, SAFE_SCHEMA.resolver().clone()))
}

/// Visit every token of `input`.
///
/// # Example
///
/// ```
/// let mut count = 0;
/// libyamel::scan("a: 1", |_| count += 1).unwrap();
/// assert_eq!(count, 8);
/// ```
pub fn scan(input: &str, mut visit: impl FnMut(Token)) -> Result<()> {
    let reader = Reader::new(DEFAULT_NAME, input)?;
    for token in Scanner::new(reader) {
        visit(token?);
    }
    Ok(())
}

/// Visit every event of `input`.
pub fn parse(input: &str, mut visit: impl FnMut(Event)) -> Result<()> {
    for event in parser(input)? {
        visit(event?);
    }
    Ok(())
}

/// Compose the only document of `input`, or `None` if there is none.
pub fn compose(input: &str) -> Result<Option<Document>> {
    composer(input)?.get_single_node()
}

/// Compose every document of `input`.
pub fn compose_all(input: &str) -> Result<Vec<Document>> {
    composer(input)?.collect()
}

/// Load the only document of `input` with the safe schema.
///
/// # Example
///
/// ```
/// let value = libyamel::load("answer: 42").unwrap();
/// assert_eq!(value.get("answer").unwrap().as_i64(), Some(42));
/// ```
pub fn load(input: &str) -> Result<Value> {
    load_with(input, &LoadOptions::default())
}

/// Load every document of `input` with the safe schema.
pub fn load_all(input: &str, visit: impl FnMut(Value)) -> Result<()> {
    load_all_with(input, &LoadOptions::default(), visit)
}

/// Load the only document of `input`.
pub fn load_with(input: &str, options: &LoadOptions) -> Result<Value> {
    Loader::new(input, options)?.get_single_data()
}

/// Load every document of `input`, in order.
pub fn load_all_with(
    input: &str,
    options: &LoadOptions,
    mut visit: impl FnMut(Value),
) -> Result<()> {
    for value in Loader::new(input, options)? {
        visit(value?);
    }
    Ok(())
}
