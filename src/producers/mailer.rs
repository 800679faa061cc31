//! @acp:module "Mailer Producer"
//! @acp:summary "Mailer actions and their parameters as a class comment"
//! @acp:domain producers
//! @acp:layer service

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::resolve::PathResolver;
use super::{load_snapshot, Fetched, MetadataProducer};
use crate::annotation::{AnnotationTarget, MarkerTag};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailerAction {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailerInfo {
    pub name: String,
    #[serde(default)]
    pub source_location: Option<PathBuf>,
    pub actions: Fetched<Vec<MailerAction>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailerSnapshot {
    pub mailers: Vec<MailerInfo>,
}

/// @acp:summary "Builds one mailer annotation target per mailer class"
pub struct MailerProducer {
    mailers: Vec<MailerInfo>,
    resolver: PathResolver,
}

impl MailerProducer {
    pub fn new(snapshot: MailerSnapshot, resolver: PathResolver) -> Self {
        Self {
            mailers: snapshot.mailers,
            resolver,
        }
    }

    pub fn from_snapshot(path: &Path, resolver: PathResolver) -> Result<Self> {
        Ok(Self::new(load_snapshot(path)?, resolver))
    }

    pub fn render(&self, mailer: &MailerInfo) -> Result<String> {
        let actions = mailer.actions.to_result(&mailer.name, "actions")?;

        let mut lines = vec!["== Mailer Information".to_string(), String::new()];
        if actions.is_empty() {
            lines.push("(no actions)".to_string());
        }
        for action in &actions {
            lines.push(format!("{}({})", action.name, action.params.join(", ")));
        }
        Ok(lines.join("\n"))
    }
}

impl MetadataProducer for MailerProducer {
    fn tag(&self) -> MarkerTag {
        MarkerTag::Mailer
    }

    fn produce(&self) -> Vec<Result<AnnotationTarget>> {
        self.mailers
            .iter()
            .map(|mailer| {
                let text = self.render(mailer)?;
                let path = self
                    .resolver
                    .resolve(&mailer.name, mailer.source_location.as_deref());
                Ok(AnnotationTarget::for_declaration(
                    &mailer.name,
                    path,
                    MarkerTag::Mailer,
                    text,
                ))
            })
            .collect()
    }
}
