//! @acp:module "Models Command"
//! @acp:summary "Annotate model classes with their table schema"
//! @acp:domain cli
//! @acp:layer handler

use std::path::PathBuf;

use anyhow::{Context, Result};

use super::output::{report, spinner, OutputFormat};
use crate::annotation::{AnnotationManager, BatchResult};
use crate::config::Config;
use crate::producers::{annotate_with, PathResolver, SchemaOptions, SchemaProducer, SnapshotSchemaSource};

/// Options for the models command
#[derive(Debug, Clone, Default)]
pub struct ModelsOptions {
    /// Schema snapshot; defaults to the configured one
    pub snapshot: Option<PathBuf>,
    pub format: OutputFormat,
}

/// Execute the models command
pub fn execute_models(options: ModelsOptions, config: &Config) -> Result<BatchResult> {
    let snapshot = options
        .snapshot
        .unwrap_or_else(|| config.resolve(&config.schema_snapshot));
    let source = SnapshotSchemaSource::load(&snapshot)
        .with_context(|| format!("reading schema snapshot {}", snapshot.display()))?;

    let producer = SchemaProducer::new(source, PathResolver::new(&config.root, config.model_dirs()))
        .with_options(SchemaOptions::from(config));
    let manager = AnnotationManager::from_config(config)?;

    let progress = spinner("Annotating models...");
    let result = annotate_with(&manager, &producer);
    progress.finish_and_clear();

    report(&result, "annotated", config.dry_run, options.format)?;
    Ok(result)
}
