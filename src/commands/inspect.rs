//! @acp:module "Inspect Command"
//! @acp:summary "Show the declarations the parser finds in a file"
//! @acp:domain cli
//! @acp:layer handler

use std::path::PathBuf;

use anyhow::Result;
use console::style;

use crate::parse::{Declaration, Parser};

/// Options for the inspect command
#[derive(Debug, Clone)]
pub struct InspectOptions {
    pub file: PathBuf,
    /// Print the index as JSON
    pub json: bool,
}

/// Execute the inspect command
pub fn execute_inspect(options: InspectOptions) -> Result<()> {
    if !options.file.is_file() {
        eprintln!("{} File not found: {}", style("✗").red(), options.file.display());
        std::process::exit(1);
    }

    let index = Parser::new().parse_file(&options.file);
    if options.json {
        println!("{}", serde_json::to_string_pretty(&index)?);
        return Ok(());
    }

    println!("{}", style(options.file.display()).bold());
    if index.is_degraded() {
        println!("  {} Syntax errors found; results may be partial", style("⚠").yellow());
    }
    if index.is_empty() {
        println!("  {}", style("(no declarations)").dim());
        return Ok(());
    }

    for declaration in in_document_order(index.classes(), index.modules()) {
        println!("{}", describe(declaration));
    }
    Ok(())
}

fn in_document_order<'a>(classes: &'a [Declaration], modules: &'a [Declaration]) -> Vec<&'a Declaration> {
    let mut all: Vec<&Declaration> = classes.iter().chain(modules).collect();
    all.sort_by_key(|d| (d.line_number, d.column));
    all
}

fn describe(declaration: &Declaration) -> String {
    format!(
        "{}{} {} {}",
        "  ".repeat(declaration.namespace.len() + 1),
        style(declaration.kind).cyan(),
        declaration.full_name,
        style(format!("[{}-{}]", declaration.line_number, declaration.end_line)).dim()
    )
}
