//! yamel command-line tool for inspecting and transcoding YAML documents.
//!
//! Usage: yamel [OPTIONS] [FILE]
//!
//! Reads FILE, or stdin when FILE is absent or `-`, and prints one stage of
//! the loading pipeline: tokens, events, composed nodes, or loaded values
//! transcoded to another format.

use clap::{Parser as ClapParser, ValueEnum};
use libyamel::{
    render, Composer, Document, Error, LoadOptions, Loader, NodeId, NodeKind, Parser, Reader,
    Scanner, Value, DEFAULT_NAME, FULL_SCHEMA,
};
use std::collections::HashSet;
use std::fmt::Write as FmtWrite;
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process;
use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod transcode;

#[derive(ClapParser, Debug)]
#[command(name = "yamel", about = "Inspect and transcode YAML 1.1 documents", version)]
struct Args {
    /// Input file (reads stdin when absent or `-`)
    file: Option<String>,

    /// Pipeline stage to print
    #[arg(short, long, value_enum, default_value_t = Mode::Load)]
    mode: Mode,

    /// Output format for loaded values
    #[arg(short, long, value_enum, default_value_t = Format::Debug)]
    to: Format,

    /// Use the full schema (adds !!js/undefined and !!js/regexp)
    #[arg(long)]
    full: bool,

    /// Render errors on a single line
    #[arg(long)]
    compact: bool,

    /// Only check that the input loads (exit 0 if valid, 1 if invalid)
    #[arg(long)]
    check: bool,

    /// Write output to the specified file
    #[arg(short, long)]
    output: Option<String>,

    /// Log pipeline activity to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// One token per line
    Scan,
    /// One event per line
    Events,
    /// The node graph of each document
    Compose,
    /// Constructed values
    Load,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Debug,
    Json,
    Cbor,
    Diag,
    Toml,
}

/// Why a run failed: the input itself, or everything around it.
enum Failure {
    Yaml(Error),
    Other(String),
}

impl From<Error> for Failure {
    fn from(error: Error) -> Self {
        Failure::Yaml(error)
    }
}

impl From<String> for Failure {
    fn from(message: String) -> Self {
        Failure::Other(message)
    }
}

enum Output {
    Text(String),
    Binary(Vec<u8>),
}

fn setup_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("YAMEL_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn main() {
    let args = Args::parse();
    setup_tracing(args.verbose);

    let path = args.file.as_deref().filter(|path| *path != "-");
    let input = read_input(path);
    let name = path
        .map(|path| {
            Path::new(path)
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|| path.to_string())
        })
        .unwrap_or_else(|| DEFAULT_NAME.to_string());
    debug!(name = %name, bytes = input.len(), "read input");

    let mut options = LoadOptions::new().with_name(name.clone());
    if args.full {
        options = options.with_schema(FULL_SCHEMA.clone());
    }

    if args.check {
        process::exit(check(&input, &options, &name, args.compact));
    }

    let result = match args.mode {
        Mode::Scan => scan(&input, &name).map(Output::Text),
        Mode::Events => events(&input, &name).map(Output::Text),
        Mode::Compose => compose(&input, &options).map(Output::Text),
        Mode::Load => load(&input, &options, args.to),
    };

    match result {
        Ok(Output::Text(text)) => write_text_output(&text, args.output.as_deref()),
        Ok(Output::Binary(bytes)) => write_binary_output(&bytes, args.output.as_deref()),
        Err(Failure::Yaml(error)) => {
            eprintln!("{}", render_error(&error, args.compact));
            process::exit(1);
        }
        Err(Failure::Other(message)) => {
            eprintln!("Error: {}", message);
            process::exit(1);
        }
    }
}

fn read_input(path: Option<&str>) -> String {
    let raw_bytes: Vec<u8> = match path {
        Some(path) => match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                eprintln!("Error reading {}: {}", path, e);
                process::exit(1);
            }
        },
        None => {
            let mut buffer = Vec::new();
            if let Err(e) = io::stdin().read_to_end(&mut buffer) {
                eprintln!("Error reading stdin: {}", e);
                process::exit(1);
            }
            buffer
        }
    };
    match String::from_utf8(raw_bytes) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: input is not valid UTF-8: {}", e);
            process::exit(1);
        }
    }
}

fn render_error(error: &Error, compact: bool) -> String {
    if compact {
        render::compact(error)
    } else {
        render::full(error)
    }
}

/// Load every document, reporting only success or the first error.
fn check(input: &str, options: &LoadOptions, name: &str, compact: bool) -> i32 {
    let result = Loader::new(input, options).and_then(|loader| {
        for value in loader {
            value?;
        }
        Ok(())
    });
    match result {
        Ok(()) => {
            println!("{}: ok", name);
            0
        }
        Err(e) => {
            eprintln!("{}", render_error(&e, compact));
            1
        }
    }
}

fn scan(input: &str, name: &str) -> Result<String, Failure> {
    let mut out = String::new();
    for token in Scanner::new(Reader::new(name, input)?) {
        let token = token?;
        let _ = writeln!(
            out,
            "{}:{} {}",
            token.start_mark.line + 1,
            token.start_mark.column + 1,
            token
        );
    }
    Ok(out)
}

fn events(input: &str, name: &str) -> Result<String, Failure> {
    let mut out = String::new();
    for event in Parser::new(Scanner::new(Reader::new(name, input)?)) {
        let _ = writeln!(out, "{}", event?);
    }
    Ok(out)
}

fn compose(input: &str, options: &LoadOptions) -> Result<String, Failure> {
    let reader = Reader::new(options.name(), input)?;
    let parser = Parser::new(Scanner::new(reader));
    let composer = Composer::new(parser, options.schema.resolver().clone());
    let mut out = String::new();
    for (index, document) in composer.enumerate() {
        let document = document?;
        if index > 0 {
            out.push_str("---\n");
        }
        let mut seen = HashSet::new();
        write_node(&mut out, &document, document.root_id(), 0, &mut seen);
    }
    Ok(out)
}

/// Write a node and its children, one per line, indented by depth.
///
/// A node reached a second time is written as a reference to its index.
fn write_node(
    out: &mut String,
    document: &Document,
    id: NodeId,
    depth: usize,
    seen: &mut HashSet<NodeId>,
) {
    out.extend(std::iter::repeat(' ').take(depth * 2));
    if !seen.insert(id) {
        let _ = writeln!(out, "*{}", id.index());
        return;
    }
    let node = document.node(id);
    let _ = write!(out, "&{} {} <{}>", id.index(), node.id(), node.tag);
    match &node.kind {
        NodeKind::Scalar { value, .. } => {
            let _ = writeln!(out, " {:?}", value);
        }
        NodeKind::Sequence { items, .. } => {
            out.push('\n');
            for item in items {
                write_node(out, document, *item, depth + 1, seen);
            }
        }
        NodeKind::Mapping { pairs, .. } => {
            out.push('\n');
            for (key, value) in pairs {
                write_node(out, document, *key, depth + 1, seen);
                write_node(out, document, *value, depth + 2, seen);
            }
        }
    }
}

fn load(input: &str, options: &LoadOptions, format: Format) -> Result<Output, Failure> {
    let values: Vec<Value> = Loader::new(input, options)?.collect::<libyamel::Result<_>>()?;
    debug!(documents = values.len(), ?format, "loaded");
    match format {
        Format::Debug => {
            let documents: Vec<String> =
                values.iter().map(|value| format!("{:#?}", value)).collect();
            Ok(Output::Text(format!("{}\n", documents.join("\n---\n"))))
        }
        Format::Json => {
            let mut out = String::new();
            for value in &values {
                out.push_str(&transcode::json::encode(value)?);
                out.push('\n');
            }
            Ok(Output::Text(out))
        }
        Format::Cbor => {
            let mut out = Vec::new();
            for value in &values {
                out.extend(transcode::cbor::encode(value)?);
            }
            Ok(Output::Binary(out))
        }
        Format::Diag => {
            let mut out = String::new();
            for value in &values {
                out.push_str(&transcode::cbor::diagnostic(value)?);
            }
            Ok(Output::Text(out))
        }
        Format::Toml => match values.as_slice() {
            [value] => Ok(Output::Text(transcode::toml::encode(value)?)),
            _ => Err(Failure::Other(format!(
                "TOML output needs exactly one document, but found {}",
                values.len()
            ))),
        },
    }
}

fn write_text_output(output: &str, output_file: Option<&str>) {
    if let Some(path) = output_file {
        if let Err(e) = fs::write(path, output) {
            eprintln!("Error writing {}: {}", path, e);
            process::exit(1);
        }
    } else {
        print!("{}", output);
    }
}

fn write_binary_output(output: &[u8], output_file: Option<&str>) {
    if let Some(path) = output_file {
        if let Err(e) = fs::write(path, output) {
            eprintln!("Error writing {}: {}", path, e);
            process::exit(1);
        }
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        if let Err(e) = handle.write_all(output) {
            eprintln!("Error writing to stdout: {}", e);
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(output: Result<Output, Failure>) -> String {
        match output {
            Ok(Output::Text(text)) => text,
            Ok(Output::Binary(_)) => panic!("expected text output"),
            Err(Failure::Yaml(e)) => panic!("{}", e),
            Err(Failure::Other(e)) => panic!("{}", e),
        }
    }

    #[test]
    fn test_scan_lists_positions() {
        let out = scan("a: 1", "t.yaml").ok().unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 8);
        assert!(lines[0].starts_with("1:1 "), "{}", out);
    }

    #[test]
    fn test_compose_marks_repeated_nodes() {
        let out = compose("a: &x [1]\nb: *x\n", &LoadOptions::new()).ok().unwrap();
        let refs: Vec<&str> = out
            .lines()
            .filter(|line| line.trim_start().starts_with('*'))
            .collect();
        assert_eq!(refs.len(), 1, "{}", out);
        assert!(out.contains("<tag:yaml.org,2002:int> \"1\""), "{}", out);
    }

    #[test]
    fn test_load_json_per_document() {
        let out = text(load("--- 1\n--- [2]\n", &LoadOptions::new(), Format::Json));
        assert_eq!(out, "1\n[\n  2\n]\n");
    }

    #[test]
    fn test_toml_needs_single_document() {
        match load("--- {a: 1}\n--- {b: 2}\n", &LoadOptions::new(), Format::Toml) {
            Err(Failure::Other(message)) => assert!(message.contains("exactly one")),
            _ => panic!("expected a TOML error"),
        }
    }

    #[test]
    fn test_load_error_is_yaml_failure() {
        let options = LoadOptions::new().with_name("bad.yaml");
        match load("a: *missing\n", &options, Format::Debug) {
            Err(Failure::Yaml(e)) => assert!(e.to_string().contains("bad.yaml")),
            _ => panic!("expected a YAML error"),
        }
    }
}
