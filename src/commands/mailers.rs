//! @acp:module "Mailers Command"
//! @acp:summary "Annotate mailer classes with their actions"
//! @acp:domain cli
//! @acp:layer handler

use std::path::PathBuf;

use anyhow::{Context, Result};

use super::output::{report, OutputFormat};
use crate::annotation::{AnnotationManager, BatchResult};
use crate::config::Config;
use crate::producers::{annotate_with, MailerProducer, PathResolver};

/// Options for the mailers command
#[derive(Debug, Clone, Default)]
pub struct MailersOptions {
    /// Mailer snapshot; defaults to the configured one
    pub snapshot: Option<PathBuf>,
    pub format: OutputFormat,
}

/// Execute the mailers command
pub fn execute_mailers(options: MailersOptions, config: &Config) -> Result<BatchResult> {
    let snapshot = options
        .snapshot
        .unwrap_or_else(|| config.resolve(&config.mailer_snapshot));
    let resolver = PathResolver::new(&config.root, config.mailer_dirs());
    let producer = MailerProducer::from_snapshot(&snapshot, resolver)
        .with_context(|| format!("reading mailer snapshot {}", snapshot.display()))?;

    let manager = AnnotationManager::from_config(config)?;
    let result = annotate_with(&manager, &producer);

    report(&result, "annotated", config.dry_run, options.format)?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Position;
    use tempfile::TempDir;

    #[test]
    fn test_mailers_before_position_and_failure_tally() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("app/mailers")).unwrap();
        std::fs::write(
            dir.path().join("app/mailers/user_mailer.rb"),
            "class UserMailer < ApplicationMailer\n  def welcome(user); end\nend\n",
        )
        .unwrap();
        let snapshot = dir.path().join("mailers.yml");
        std::fs::write(
            &snapshot,
            "mailers:\n  - name: UserMailer\n    actions:\n      - name: welcome\n        params: [user]\n  - name: GoneMailer\n    actions:\n      error: not loadable\n",
        )
        .unwrap();

        let config = Config {
            root: dir.path().to_path_buf(),
            position: Position::Before,
            ..Config::default()
        };
        let options = MailersOptions {
            snapshot: Some(snapshot),
            ..MailersOptions::default()
        };
        let result = execute_mailers(options, &config).unwrap();
        assert_eq!(result.succeeded, vec!["UserMailer"]);
        assert_eq!(result.failed.len(), 1);

        let content = std::fs::read_to_string(dir.path().join("app/mailers/user_mailer.rb")).unwrap();
        assert!(content.starts_with("# --- BEGIN annotate:mailer ---\n"));
        assert!(content.contains("# welcome(user)\n# --- END annotate:mailer ---\nclass UserMailer"));
    }
}
