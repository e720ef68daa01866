//! Lint command - validate Kargo manifests offline
//!
//! Runs the same checks the admission webhooks run, minus anything that
//! needs a cluster.

use console::style;
use std::path::{Path, PathBuf};

use kargo_core::{Manifest, ValidationErrors, parse_manifests};

use crate::error::{CliError, Result};

/// Outcome of linting one document
#[derive(Debug)]
pub struct DocumentReport {
    pub kind: String,
    pub name: String,
    pub errors: Option<ValidationErrors>,
}

/// Outcome of linting one file
#[derive(Debug, Default)]
pub struct FileReport {
    pub documents: Vec<DocumentReport>,
    /// The file could not be read or parsed at all
    pub load_error: Option<String>,
}

impl FileReport {
    pub fn error_count(&self) -> usize {
        let field_errors: usize = self
            .documents
            .iter()
            .filter_map(|d| d.errors.as_ref())
            .map(|e| e.errors().len())
            .sum();
        field_errors + usize::from(self.load_error.is_some())
    }
}

/// Lint the manifests in `content`
pub fn lint_content(content: &str) -> FileReport {
    match parse_manifests(content) {
        Ok(manifests) => FileReport {
            documents: manifests.iter().map(lint_manifest).collect(),
            load_error: None,
        },
        Err(e) => FileReport {
            documents: Vec::new(),
            load_error: Some(e.to_string()),
        },
    }
}

fn lint_manifest(manifest: &Manifest) -> DocumentReport {
    DocumentReport {
        kind: manifest.kind().to_string(),
        name: manifest.name().to_string(),
        errors: manifest.validate().err(),
    }
}

fn lint_file(path: &Path) -> FileReport {
    match std::fs::read_to_string(path) {
        Ok(content) => lint_content(&content),
        Err(e) => FileReport {
            documents: Vec::new(),
            load_error: Some(e.to_string()),
        },
    }
}

pub fn run(paths: &[PathBuf]) -> Result<()> {
    let mut errors = 0;
    let mut failed_files = 0;

    for path in paths {
        println!("{} Linting {}", style("→").blue(), path.display());
        let report = lint_file(path);

        if let Some(e) = &report.load_error {
            println!("  {} {}", style("✗").red(), e);
        }
        for doc in &report.documents {
            match &doc.errors {
                None => println!("  {} {} {}", style("✓").green(), doc.kind, doc.name),
                Some(field_errors) => {
                    println!("  {} {} {}", style("✗").red(), doc.kind, doc.name);
                    for e in field_errors.errors() {
                        println!("      {}", e);
                    }
                }
            }
        }
        if report.documents.is_empty() && report.load_error.is_none() {
            println!("  {} no documents found", style("⚠").yellow());
        }

        let count = report.error_count();
        if count > 0 {
            errors += count;
            failed_files += 1;
        }
    }

    println!();
    if errors > 0 {
        return Err(CliError::LintFailed {
            errors,
            files: failed_files,
        });
    }
    println!("{} Linting passed!", style("✓").green().bold());
    Ok(())
}
