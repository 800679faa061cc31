//! @acp:module "Schema Producer"
//! @acp:summary "Table metadata rendered as the classic schema comment"
//! @acp:domain producers
//! @acp:layer service
//!
//! Each metadata kind comes from its own accessor on [`SchemaSource`] and
//! each accessor reports failure as a value. Columns are mandatory: without
//! them the model fails. Indexes, foreign keys and check constraints are
//! optional sections, dropped with a warning when their accessor fails.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::resolve::PathResolver;
use super::{load_snapshot, Fetched, MetadataProducer};
use crate::annotation::{AnnotationTarget, MarkerTag};
use crate::config::Config;
use crate::error::{AnnotateError, Result};

const TYPE_WIDTH: usize = 16;

/// @acp:summary "A model known to the schema source"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub table_name: String,
    /// Source file recorded by the exporter, if any
    #[serde(default)]
    pub source_location: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub sql_type: String,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub precision: Option<u32>,
    #[serde(default)]
    pub scale: Option<u32>,
    #[serde(default = "default_nullable")]
    pub null: bool,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default, rename = "where")]
    pub where_clause: Option<String>,
    #[serde(default)]
    pub using: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub name: String,
    pub column: String,
    pub to_table: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    #[serde(default)]
    pub on_delete: Option<String>,
    #[serde(default)]
    pub on_update: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckConstraint {
    pub name: String,
    pub expression: String,
}

/// @acp:summary "What optional behaviour a model supports, decided once"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Tree strategy such as `closure_tree` or `ancestry`
    #[serde(default)]
    pub hierarchy: Option<String>,
    #[serde(default = "default_true")]
    pub foreign_keys: bool,
    #[serde(default = "default_true")]
    pub check_constraints: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            hierarchy: None,
            foreign_keys: true,
            check_constraints: true,
        }
    }
}

fn default_nullable() -> bool {
    true
}

fn default_true() -> bool {
    true
}

fn default_primary_key() -> String {
    "id".to_string()
}

/// @acp:summary "Per-model schema metadata accessors"
pub trait SchemaSource {
    fn models(&self) -> Vec<ModelInfo>;
    fn capabilities(&self, model: &str) -> Capabilities;
    fn columns(&self, model: &str) -> Result<Vec<Column>>;
    fn indexes(&self, model: &str) -> Result<Vec<Index>>;
    fn foreign_keys(&self, model: &str) -> Result<Vec<ForeignKey>>;
    fn check_constraints(&self, model: &str) -> Result<Vec<CheckConstraint>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSnapshot {
    #[serde(flatten)]
    pub info: ModelInfo,
    #[serde(default)]
    pub capabilities: Capabilities,
    pub columns: Fetched<Vec<Column>>,
    #[serde(default)]
    pub indexes: Fetched<Vec<Index>>,
    #[serde(default)]
    pub foreign_keys: Fetched<Vec<ForeignKey>>,
    #[serde(default)]
    pub check_constraints: Fetched<Vec<CheckConstraint>>,
}

/// @acp:summary "Schema source backed by an exported snapshot file"
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotSchemaSource {
    pub models: Vec<ModelSnapshot>,
}

impl SnapshotSchemaSource {
    pub fn load(path: &std::path::Path) -> Result<Self> {
        load_snapshot(path)
    }

    fn model(&self, name: &str) -> Result<&ModelSnapshot> {
        self.models
            .iter()
            .find(|m| m.info.name == name)
            .ok_or_else(|| AnnotateError::producer(name, "not present in schema snapshot"))
    }
}

impl SchemaSource for SnapshotSchemaSource {
    fn models(&self) -> Vec<ModelInfo> {
        self.models.iter().map(|m| m.info.clone()).collect()
    }

    fn capabilities(&self, model: &str) -> Capabilities {
        self.model(model)
            .map(|m| m.capabilities.clone())
            .unwrap_or_default()
    }

    fn columns(&self, model: &str) -> Result<Vec<Column>> {
        self.model(model)?.columns.to_result(model, "columns")
    }

    fn indexes(&self, model: &str) -> Result<Vec<Index>> {
        self.model(model)?.indexes.to_result(model, "indexes")
    }

    fn foreign_keys(&self, model: &str) -> Result<Vec<ForeignKey>> {
        self.model(model)?.foreign_keys.to_result(model, "foreign keys")
    }

    fn check_constraints(&self, model: &str) -> Result<Vec<CheckConstraint>> {
        self.model(model)?
            .check_constraints
            .to_result(model, "check constraints")
    }
}

/// Which optional sections to render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaOptions {
    pub show_indexes: bool,
    pub show_foreign_keys: bool,
    pub show_check_constraints: bool,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            show_indexes: true,
            show_foreign_keys: true,
            show_check_constraints: true,
        }
    }
}

impl From<&Config> for SchemaOptions {
    fn from(config: &Config) -> Self {
        Self {
            show_indexes: config.show_indexes,
            show_foreign_keys: config.show_foreign_keys,
            show_check_constraints: config.show_check_constraints,
        }
    }
}

/// @acp:summary "Builds one schema annotation target per model"
pub struct SchemaProducer<S: SchemaSource> {
    source: S,
    resolver: PathResolver,
    options: SchemaOptions,
}

impl<S: SchemaSource> SchemaProducer<S> {
    pub fn new(source: S, resolver: PathResolver) -> Self {
        Self {
            source,
            resolver,
            options: SchemaOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SchemaOptions) -> Self {
        self.options = options;
        self
    }

    /// @acp:summary "Render the schema comment payload for one model"
    pub fn render(&self, model: &ModelInfo) -> Result<String> {
        let capabilities = self.source.capabilities(&model.name);
        let columns = self.source.columns(&model.name)?;

        let mut lines = vec![
            "== Schema Information".to_string(),
            String::new(),
            format!("Table name: {}", model.table_name),
        ];
        if let Some(strategy) = &capabilities.hierarchy {
            lines.push(format!("Hierarchy: {}", strategy));
        }
        lines.push(String::new());
        lines.extend(render_columns(&columns));

        if self.options.show_indexes {
            if let Some(indexes) = optional(self.source.indexes(&model.name)) {
                push_section(&mut lines, "Indexes", render_indexes(indexes));
            }
        }
        if self.options.show_foreign_keys && capabilities.foreign_keys {
            if let Some(keys) = optional(self.source.foreign_keys(&model.name)) {
                push_section(&mut lines, "Foreign Keys", render_foreign_keys(keys));
            }
        }
        if self.options.show_check_constraints && capabilities.check_constraints {
            if let Some(checks) = optional(self.source.check_constraints(&model.name)) {
                push_section(&mut lines, "Check Constraints", render_checks(checks));
            }
        }

        Ok(lines.join("\n"))
    }
}

impl<S: SchemaSource> MetadataProducer for SchemaProducer<S> {
    fn tag(&self) -> MarkerTag {
        MarkerTag::Schema
    }

    fn produce(&self) -> Vec<Result<AnnotationTarget>> {
        self.source
            .models()
            .into_iter()
            .map(|model| {
                let text = self.render(&model)?;
                let path = self
                    .resolver
                    .resolve(&model.name, model.source_location.as_deref());
                Ok(AnnotationTarget::for_declaration(
                    model.name,
                    path,
                    MarkerTag::Schema,
                    text,
                ))
            })
            .collect()
    }
}

fn optional<T>(fetched: Result<Vec<T>>) -> Option<Vec<T>> {
    match fetched {
        Ok(items) if items.is_empty() => None,
        Ok(items) => Some(items),
        Err(e) => {
            tracing::warn!("{}; section omitted", e);
            None
        }
    }
}

fn push_section(lines: &mut Vec<String>, title: &str, body: Vec<String>) {
    lines.push(String::new());
    lines.push(title.to_string());
    lines.push(String::new());
    lines.extend(body);
}

fn column_type(column: &Column) -> String {
    match (column.limit, column.precision, column.scale) {
        (_, Some(p), Some(s)) => format!("{}({},{})", column.sql_type, p, s),
        (_, Some(p), None) => format!("{}({})", column.sql_type, p),
        (Some(limit), _, _) => format!("{}({})", column.sql_type, limit),
        _ => column.sql_type.clone(),
    }
}

fn render_columns(columns: &[Column]) -> Vec<String> {
    let width = columns.iter().map(|c| c.name.len()).max().unwrap_or(0) + 1;
    columns
        .iter()
        .map(|column| {
            let mut attrs = Vec::new();
            if !column.null {
                attrs.push("not null".to_string());
            }
            if let Some(default) = &column.default {
                attrs.push(format!("default({})", default));
            }
            if column.primary_key {
                attrs.push("primary key".to_string());
            }
            if let Some(comment) = &column.comment {
                attrs.push(format!("comment({})", comment));
            }
            format!(
                " {:<width$}:{:<type_width$} {}",
                column.name,
                column_type(column),
                attrs.join(", "),
                width = width,
                type_width = TYPE_WIDTH,
            )
            .trim_end()
            .to_string()
        })
        .collect()
}

fn render_indexes(mut indexes: Vec<Index>) -> Vec<String> {
    indexes.sort_by(|a, b| a.name.cmp(&b.name));
    let width = indexes.iter().map(|i| i.name.len()).max().unwrap_or(0);
    indexes
        .iter()
        .map(|index| {
            let mut line = format!(
                " {:<width$}  ({})",
                index.name,
                index.columns.join(","),
                width = width
            );
            if index.unique {
                line.push_str(" UNIQUE");
            }
            if let Some(clause) = &index.where_clause {
                line.push_str(&format!(" WHERE {}", clause));
            }
            if let Some(using) = &index.using {
                line.push_str(&format!(" USING {}", using));
            }
            line
        })
        .collect()
}

fn render_foreign_keys(mut keys: Vec<ForeignKey>) -> Vec<String> {
    keys.sort_by(|a, b| a.name.cmp(&b.name));
    let width = keys.iter().map(|k| k.name.len()).max().unwrap_or(0);
    keys.iter()
        .map(|key| {
            let mut line = format!(
                " {:<width$}  ({} => {}.{})",
                key.name,
                key.column,
                key.to_table,
                key.primary_key,
                width = width
            );
            if let Some(action) = &key.on_delete {
                line.push_str(&format!(" ON DELETE => {}", action));
            }
            if let Some(action) = &key.on_update {
                line.push_str(&format!(" ON UPDATE => {}", action));
            }
            line
        })
        .collect()
}

fn render_checks(mut checks: Vec<CheckConstraint>) -> Vec<String> {
    checks.sort_by(|a, b| a.name.cmp(&b.name));
    let width = checks.iter().map(|c| c.name.len()).max().unwrap_or(0);
    checks
        .iter()
        .map(|check| format!(" {:<width$}  ({})", check.name, check.expression, width = width))
        .collect()
}
