//! @acp:module "Annotation"
//! @acp:summary "Source-preserving placement of generated comment blocks"
//! @acp:domain annotation
//! @acp:layer service
//!
//! Layers, leaf first:
//! - [`block`]: the marker-delimited block value and text-level operations
//! - [`directive`]: magic comments that must stay on top
//! - [`insert`]: parse-driven placement into one file, single or batch
//! - [`manager`]: per-entity idempotent apply/remove with write policy

pub mod block;
pub mod directive;
pub mod insert;
pub mod manager;

pub use block::{AnnotationBlock, ExtractedBlock, MarkerTag};
pub use insert::{BatchInsert, FileChange, Inserter, Position};
pub use manager::{Anchor, AnnotationManager, AnnotationTarget, BatchFailure, BatchResult};
