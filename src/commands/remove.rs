//! @acp:module "Remove Command"
//! @acp:summary "Strip generated blocks by marker tag"
//! @acp:domain cli
//! @acp:layer handler

use std::path::PathBuf;

use anyhow::Result;

use super::output::{report, OutputFormat};
use crate::annotation::{AnnotationManager, BatchResult, MarkerTag};
use crate::config::Config;
use crate::producers::PathResolver;

/// Options for the remove command
#[derive(Debug, Clone)]
pub struct RemoveOptions {
    /// Tags to strip; every tag when empty
    pub tags: Vec<MarkerTag>,
    pub format: OutputFormat,
}

impl Default for RemoveOptions {
    fn default() -> Self {
        Self {
            tags: MarkerTag::ALL.to_vec(),
            format: OutputFormat::Summary,
        }
    }
}

/// Files that may carry blocks with `tag`
fn candidate_files(tag: MarkerTag, config: &Config) -> Vec<PathBuf> {
    match tag {
        MarkerTag::Schema => PathResolver::new(&config.root, config.model_dirs()).source_files(),
        MarkerTag::Mailer => PathResolver::new(&config.root, config.mailer_dirs()).source_files(),
        MarkerTag::Routes => vec![config.resolve(&config.routes_file)],
    }
}

/// Execute the remove command
pub fn execute_remove(options: RemoveOptions, config: &Config) -> Result<BatchResult> {
    let tags = if options.tags.is_empty() {
        MarkerTag::ALL.to_vec()
    } else {
        options.tags
    };
    let manager = AnnotationManager::from_config(config)?;

    let mut result = BatchResult::default();
    for tag in tags {
        let files = candidate_files(tag, config);
        tracing::debug!("removing {} blocks from {} files", tag, files.len());
        result.merge(manager.remove_from_files(&files, tag));
    }

    report(&result, "cleaned", config.dry_run, options.format)?;
    Ok(result)
}
