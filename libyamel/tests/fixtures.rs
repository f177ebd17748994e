//! Test harness for the loader against fixture files.
//!
//! Every `test/yaml/NAME.yaml` is parsed and its event stream compared with
//! `test/events/NAME.events`, one event per line in tree notation. Every
//! `test/nay/NAME.yaml` must fail to load; when `test/nay/NAME.error`
//! exists, the compact error rendering must match it.

use std::fs;
use std::path::{Path, PathBuf};

use libyamel::{load_with, parse, LoadOptions};
use pretty_assertions::assert_eq;

/// Root test directory.
fn test_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("test")
}

/// All files matching `pattern` under the test directory, sorted.
fn fixture_files(pattern: &str) -> Vec<PathBuf> {
    let pattern = test_root().join(pattern);
    let mut files: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())
        .expect("valid glob pattern")
        .flatten()
        .collect();
    files.sort();
    files
}

fn basename(path: &Path) -> String {
    path.file_stem().unwrap().to_string_lossy().to_string()
}

/// Run a single event fixture.
fn run_events_test(path: &Path) -> Result<(), String> {
    let name = basename(path);
    let content = fs::read_to_string(path).map_err(|e| format!("{}: {}", name, e))?;
    let expected_path = test_root().join("events").join(format!("{}.events", name));
    let expected = fs::read_to_string(&expected_path)
        .map_err(|e| format!("{}: missing events file: {}", name, e))?;

    let mut actual = Vec::new();
    parse(&content, |event| actual.push(event.to_string()))
        .map_err(|e| format!("{}: unexpected error: {}", name, e))?;

    let expected: Vec<&str> = expected.lines().collect();
    if actual != expected {
        return Err(format!(
            "{}: event mismatch\n    expected: {:?}\n    actual:   {:?}",
            name, expected, actual
        ));
    }
    println!("  {} => {} events", name, actual.len());
    Ok(())
}

/// Run a single failing fixture.
fn run_nay_test(path: &Path) -> Result<(), String> {
    let name = basename(path);
    let filename = path.file_name().unwrap().to_string_lossy().to_string();
    let content = fs::read_to_string(path).map_err(|e| format!("{}: {}", name, e))?;

    let options = LoadOptions::new().with_name(filename);
    match load_with(&content, &options) {
        Ok(value) => Err(format!("{}: expected an error, but got {:?}", name, value)),
        Err(e) => {
            let actual = e.to_string();
            let error_path = test_root().join("nay").join(format!("{}.error", name));
            match fs::read_to_string(error_path) {
                Ok(expected) if actual == expected.trim() => {
                    println!("  {} => {} (as expected)", name, e.kind());
                    Ok(())
                }
                Ok(expected) => Err(format!(
                    "{}: error mismatch\n    expected: {}\n    actual:   {}",
                    name,
                    expected.trim(),
                    actual
                )),
                Err(_) => {
                    println!("  {} => {} (no .error file to compare)", name, actual);
                    Ok(())
                }
            }
        }
    }
}

fn run_all(files: &[PathBuf], run: fn(&Path) -> Result<(), String>) -> Vec<String> {
    let mut errors = Vec::new();
    for file in files {
        if let Err(e) = run(file) {
            errors.push(e);
        }
    }
    println!(
        "\nResults: {} passed, {} failed",
        files.len() - errors.len(),
        errors.len()
    );
    for error in &errors {
        println!("  - {}", error);
    }
    errors
}

#[test]
fn test_all_event_fixtures() {
    let files = fixture_files("yaml/*.yaml");
    assert!(!files.is_empty(), "no event fixtures found");

    println!("\nRunning {} event fixtures:", files.len());
    let errors = run_all(&files, run_events_test);
    assert!(errors.is_empty(), "{} event fixtures failed", errors.len());
}

#[test]
fn test_all_nay_fixtures() {
    let files = fixture_files("nay/*.yaml");
    assert!(!files.is_empty(), "no nay fixtures found");

    println!("\nRunning {} nay fixtures:", files.len());
    let errors = run_all(&files, run_nay_test);
    assert!(errors.is_empty(), "{} nay fixtures failed", errors.len());
}

#[test]
fn test_block_scalar_fixture_values() {
    let content = fs::read_to_string(test_root().join("yaml/block-scalars.yaml")).unwrap();
    let value = libyamel::load(&content).unwrap();
    assert_eq!(value.get("literal").unwrap().as_str(), Some("line one\nline two\n"));
    assert_eq!(value.get("folded").unwrap().as_str(), Some("folded text\n"));
    assert_eq!(value.get("keep").unwrap().as_str(), Some("kept\n\n"));
    assert_eq!(value.get("strip").unwrap().as_str(), Some("stripped"));
}
