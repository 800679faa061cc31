//! @acp:module "Routes Command"
//! @acp:summary "Annotate the routes file with the route map"
//! @acp:domain cli
//! @acp:layer handler

use std::path::PathBuf;

use anyhow::{Context, Result};

use super::output::{report, OutputFormat};
use crate::annotation::{AnnotationManager, BatchResult};
use crate::config::Config;
use crate::producers::{annotate_with, RoutesProducer};

/// Options for the routes command
#[derive(Debug, Clone, Default)]
pub struct RoutesOptions {
    /// Routes snapshot; defaults to the configured one
    pub snapshot: Option<PathBuf>,
    /// Routes file; defaults to the configured one
    pub file: Option<PathBuf>,
    pub format: OutputFormat,
}

/// Execute the routes command
pub fn execute_routes(options: RoutesOptions, config: &Config) -> Result<BatchResult> {
    let snapshot = options
        .snapshot
        .unwrap_or_else(|| config.resolve(&config.routes_snapshot));
    let file = options
        .file
        .unwrap_or_else(|| config.resolve(&config.routes_file));
    let anchor = config
        .routes_anchor()
        .context("invalid routes_anchor pattern")?;

    let producer = RoutesProducer::from_snapshot(&snapshot, file, anchor)
        .with_context(|| format!("reading routes snapshot {}", snapshot.display()))?;
    let manager = AnnotationManager::from_config(config)?;
    let result = annotate_with(&manager, &producer);

    report(&result, "annotated", config.dry_run, options.format)?;
    Ok(result)
}
