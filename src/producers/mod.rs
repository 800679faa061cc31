//! @acp:module "Metadata Producers"
//! @acp:summary "Turn exported application metadata into annotation targets"
//! @acp:domain producers
//! @acp:layer service
//!
//! Producers never reach into a live application. The host exports a snapshot
//! (JSON or YAML) and a producer is built over it, so every data source is an
//! explicit value handed to the orchestration layer.

pub mod mailer;
pub mod resolve;
pub mod routes;
pub mod schema;

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::annotation::{AnnotationManager, AnnotationTarget, BatchResult, MarkerTag};
use crate::error::{AnnotateError, Result};

pub use mailer::{MailerAction, MailerInfo, MailerProducer, MailerSnapshot};
pub use resolve::{underscore, PathResolver};
pub use routes::{RouteEntry, RoutesProducer, RoutesSnapshot};
pub use schema::{
    Capabilities, CheckConstraint, Column, ForeignKey, Index, ModelInfo, ModelSnapshot,
    SchemaOptions, SchemaProducer, SchemaSource, SnapshotSchemaSource,
};

/// @acp:summary "Source of annotation targets for one marker tag"
pub trait MetadataProducer {
    fn tag(&self) -> MarkerTag;

    /// One entry per entity; an `Err` marks that entity as failed
    fn produce(&self) -> Vec<Result<AnnotationTarget>>;
}

/// @acp:summary "A metadata accessor outcome as recorded in a snapshot"
///
/// Exporters write either the payload itself or `{"error": "..."}` when the
/// adapter could not provide it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Fetched<T> {
    Failed { error: String },
    Ok(T),
}

impl<T> Default for Fetched<Vec<T>> {
    fn default() -> Self {
        Fetched::Ok(Vec::new())
    }
}

impl<T: Clone> Fetched<T> {
    pub fn to_result(&self, entity: &str, what: &str) -> Result<T> {
        match self {
            Fetched::Ok(value) => Ok(value.clone()),
            Fetched::Failed { error } => Err(AnnotateError::producer(
                entity,
                format!("{} unavailable: {}", what, error),
            )),
        }
    }
}

/// @acp:summary "Read a snapshot, YAML or JSON by extension"
pub fn load_snapshot<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("yml") | Some("yaml") => Ok(serde_yaml::from_str(&content)?),
        _ => Ok(serde_json::from_str(&content)?),
    }
}

/// @acp:summary "Run a producer and apply everything it yields"
pub fn annotate_with(manager: &AnnotationManager, producer: &dyn MetadataProducer) -> BatchResult {
    let mut failures = BatchResult::default();
    let mut targets = Vec::new();

    for produced in producer.produce() {
        match produced {
            Ok(target) => targets.push(target),
            Err(AnnotateError::Producer { entity, message }) => {
                tracing::warn!("{}: {}", entity, message);
                failures.fail(entity, message);
            }
            Err(e) => {
                tracing::warn!("{}", e);
                failures.fail(producer.tag().as_str(), e.to_string());
            }
        }
    }

    let mut result = manager.apply_all(&targets);
    result.merge(failures);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, Deserialize)]
    struct Payload {
        items: Fetched<Vec<u32>>,
        #[serde(default)]
        extra: Fetched<Vec<u32>>,
    }

    #[test]
    fn test_fetched_accepts_payload_or_error() {
        let ok: Payload = serde_json::from_str(r#"{"items": [1, 2]}"#).unwrap();
        assert_eq!(ok.items, Fetched::Ok(vec![1, 2]));
        assert_eq!(ok.extra, Fetched::Ok(vec![]));

        let failed: Payload = serde_json::from_str(r#"{"items": {"error": "no adapter"}}"#).unwrap();
        let err = failed.items.to_result("User", "indexes").unwrap_err();
        assert_eq!(err.to_string(), "User: indexes unavailable: no adapter");
    }

    #[test]
    fn test_load_snapshot_by_extension() {
        let dir = TempDir::new().unwrap();
        let json = dir.path().join("payload.json");
        let yaml = dir.path().join("payload.yml");
        std::fs::write(&json, r#"{"items": [3]}"#).unwrap();
        std::fs::write(&yaml, "items:\n  - 4\n").unwrap();

        let from_json: Payload = load_snapshot(&json).unwrap();
        let from_yaml: Payload = load_snapshot(&yaml).unwrap();
        assert_eq!(from_json.items, Fetched::Ok(vec![3]));
        assert_eq!(from_yaml.items, Fetched::Ok(vec![4]));
    }

    struct Fixed(Vec<Result<AnnotationTarget>>);

    impl MetadataProducer for Fixed {
        fn tag(&self) -> MarkerTag {
            MarkerTag::Schema
        }

        fn produce(&self) -> Vec<Result<AnnotationTarget>> {
            self.0
                .iter()
                .map(|r| match r {
                    Ok(t) => Ok(t.clone()),
                    Err(AnnotateError::Producer { entity, message }) => {
                        Err(AnnotateError::producer(entity.clone(), message.clone()))
                    }
                    Err(e) => Err(AnnotateError::Other(e.to_string())),
                })
                .collect()
        }
    }

    #[test]
    fn test_annotate_with_records_producer_failures() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("user.rb"), "class User\nend\n").unwrap();

        let producer = Fixed(vec![
            Ok(AnnotationTarget::for_declaration(
                "User",
                Some(dir.path().join("user.rb")),
                MarkerTag::Schema,
                "Table name: users",
            )),
            Err(AnnotateError::producer("Post", "columns unavailable: boom")),
        ]);

        let result = annotate_with(&AnnotationManager::new(dir.path()), &producer);
        assert_eq!(result.succeeded, vec!["User"]);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].identifier, "Post");
        assert!(result.has_failures());
    }
}
