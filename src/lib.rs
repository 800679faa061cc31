#![forbid(unsafe_code)]

//! @acp:module "rb-annotate Library"
//! @acp:summary "Idempotent schema, route and mailer comments for Ruby sources"
//! @acp:domain cli
//! @acp:layer api
//! @acp:stability stable
//!
//! # rb-annotate
//!
//! Places generated comment blocks into Ruby source files next to the class
//! they describe, and removes them again, without disturbing anything else.
//!
//! ## Features
//!
//! - **Tolerant Parsing**: tree-sitter finds class/module boundaries even in broken files
//! - **Marker Blocks**: each subsystem owns a tagged block, replaced or removed independently
//! - **Batch Mode**: several classes in one file are annotated from one parse
//! - **Snapshots**: schema, route and mailer metadata come from exported JSON/YAML
//!
//! ## Example
//!
//! ```rust,no_run
//! use rb_annotate::{AnnotationManager, AnnotationTarget, MarkerTag};
//!
//! let manager = AnnotationManager::new(".");
//! let target = AnnotationTarget::for_declaration(
//!     "User",
//!     Some("app/models/user.rb".into()),
//!     MarkerTag::Schema,
//!     "== Schema Information\n\nTable name: users",
//! );
//! manager.apply(&target);
//! ```

pub mod annotation;
pub mod commands;
pub mod config;
pub mod error;
pub mod parse;
pub mod producers;

// Re-exports
pub use annotation::{
    Anchor, AnnotationBlock, AnnotationManager, AnnotationTarget, BatchFailure, BatchInsert,
    BatchResult, FileChange, Inserter, MarkerTag, Position,
};
pub use config::Config;
pub use error::{AnnotateError, Result};
pub use parse::{Declaration, DeclarationIndex, DeclarationKind, Parser};
pub use producers::{
    MailerProducer, MetadataProducer, PathResolver, RoutesProducer, SchemaProducer, SchemaSource,
    SnapshotSchemaSource,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
