//! @acp:module "Annotation Manager"
//! @acp:summary "Idempotent apply/remove of annotation blocks per entity"
//! @acp:domain annotation
//! @acp:layer service
//!
//! When a file holds exactly one block of a tag and exactly one target wants
//! that tag, the block is rewritten where it sits, so independent tags keep
//! their relative order across runs. Otherwise the tag's blocks are stripped
//! and reinserted fresh. Targets sharing a file are handled together: one
//! read, one removal pass, one batch insertion and at most one write.
//! Otherwise annotating the second model in a file would strip the block just
//! written for the first.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use glob::Pattern;
use regex::Regex;
use serde::Serialize;

use super::block::{AnnotationBlock, MarkerTag};
use super::insert::{FileChange, Inserter, Position};
use crate::config::Config;
use crate::error::Result;

/// @acp:summary "How a target finds its place in the file"
#[derive(Debug, Clone)]
pub enum Anchor {
    /// Class name, simple or fully qualified
    Declaration(String),
    /// First line matching the pattern (existing blocks are replaced in place)
    Pattern(Regex),
}

/// @acp:summary "One entity's annotation, as handed over by a producer"
#[derive(Debug, Clone)]
pub struct AnnotationTarget {
    pub identifier: String,
    pub file_path: Option<PathBuf>,
    pub anchor: Anchor,
    pub tag: MarkerTag,
    /// Payload lines, without comment prefixes
    pub annotation: String,
}

impl AnnotationTarget {
    /// Target anchored on the class named `identifier`
    pub fn for_declaration(
        identifier: impl Into<String>,
        file_path: Option<PathBuf>,
        tag: MarkerTag,
        annotation: impl Into<String>,
    ) -> Self {
        let identifier = identifier.into();
        Self {
            anchor: Anchor::Declaration(identifier.clone()),
            identifier,
            file_path,
            tag,
            annotation: annotation.into(),
        }
    }

    pub fn for_pattern(
        identifier: impl Into<String>,
        file_path: Option<PathBuf>,
        anchor: Regex,
        tag: MarkerTag,
        annotation: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            file_path,
            anchor: Anchor::Pattern(anchor),
            tag,
            annotation: annotation.into(),
        }
    }

    fn rendered(&self) -> String {
        AnnotationBlock::from_text(self.tag, &self.annotation).render()
    }
}

/// @acp:summary "A failed entity with its reason"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub identifier: String,
    pub message: String,
}

/// @acp:summary "Tally of a collection-level operation"
#[derive(Debug, Default, Serialize)]
pub struct BatchResult {
    pub succeeded: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<BatchFailure>,
    /// Rewrites performed (or planned, under dry-run)
    #[serde(skip)]
    pub changes: Vec<FileChange>,
}

impl BatchResult {
    pub fn fail(&mut self, identifier: impl Into<String>, message: impl Into<String>) {
        self.failed.push(BatchFailure {
            identifier: identifier.into(),
            message: message.into(),
        });
    }

    pub fn merge(&mut self, other: BatchResult) {
        self.succeeded.extend(other.succeeded);
        self.skipped.extend(other.skipped);
        self.failed.extend(other.failed);
        self.changes.extend(other.changes);
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.skipped.len() + self.failed.len()
    }
}

/// @acp:summary "Per-entity orchestration over the insertion engine"
pub struct AnnotationManager {
    inserter: Inserter,
    root: PathBuf,
    allow_outside_root: bool,
    exclude: Vec<Pattern>,
    dry_run: bool,
}

impl AnnotationManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            inserter: Inserter::new(),
            root: root.into(),
            allow_outside_root: false,
            exclude: Vec::new(),
            dry_run: false,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let exclude = config
            .exclude
            .iter()
            .map(|p| Pattern::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self::new(&config.root)
            .with_position(config.position)
            .with_dry_run(config.dry_run)
            .allow_outside_root(config.allow_outside_root)
            .with_exclude(exclude))
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.inserter = Inserter::new()
            .with_position(position)
            .with_dry_run(self.dry_run);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self.inserter = Inserter::new()
            .with_position(self.inserter.position())
            .with_dry_run(dry_run);
        self
    }

    pub fn allow_outside_root(mut self, allow: bool) -> Self {
        self.allow_outside_root = allow;
        self
    }

    pub fn with_exclude(mut self, patterns: Vec<Pattern>) -> Self {
        self.exclude = patterns;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// @acp:summary "Annotate one entity; true when its file changed"
    pub fn apply(&self, target: &AnnotationTarget) -> bool {
        !self.apply_all(std::slice::from_ref(target)).succeeded.is_empty()
    }

    /// @acp:summary "Strip one entity's block; false when there was none"
    pub fn remove(&self, target: &AnnotationTarget) -> bool {
        !self.remove_all(std::slice::from_ref(target)).succeeded.is_empty()
    }

    /// @acp:summary "Annotate many entities, grouping them by file"
    pub fn apply_all(&self, targets: &[AnnotationTarget]) -> BatchResult {
        let mut result = BatchResult::default();
        for (path, group) in self.group_by_file(targets, &mut result) {
            match self.apply_group(&path, &group) {
                Ok(outcome) => result.merge(outcome),
                Err(e) => {
                    tracing::warn!("{}", e);
                    for target in group {
                        result.fail(&target.identifier, e.to_string());
                    }
                }
            }
        }
        result
    }

    /// @acp:summary "Remove blocks for many entities, grouping them by file"
    pub fn remove_all(&self, targets: &[AnnotationTarget]) -> BatchResult {
        let mut result = BatchResult::default();
        for (path, group) in self.group_by_file(targets, &mut result) {
            let tags: BTreeSet<MarkerTag> = group.iter().map(|t| t.tag).collect();
            match self.remove_tags(&path, &tags) {
                Ok(Some(change)) => {
                    result.succeeded.extend(group.iter().map(|t| t.identifier.clone()));
                    result.changes.push(change);
                }
                Ok(None) => result.skipped.extend(group.iter().map(|t| t.identifier.clone())),
                Err(e) => {
                    tracing::warn!("{}", e);
                    for target in group {
                        result.fail(&target.identifier, e.to_string());
                    }
                }
            }
        }
        result
    }

    /// @acp:summary "Strip blocks with `tag` from every given file"
    pub fn remove_from_files(&self, paths: &[PathBuf], tag: MarkerTag) -> BatchResult {
        let mut result = BatchResult::default();
        let tags = BTreeSet::from([tag]);
        for path in paths {
            let identifier = path.display().to_string();
            if let Err(reason) = self.admit(path) {
                tracing::debug!("skipping {}: {}", identifier, reason);
                result.skipped.push(identifier);
                continue;
            }
            match self.remove_tags(path, &tags) {
                Ok(Some(change)) => {
                    result.succeeded.push(identifier);
                    result.changes.push(change);
                }
                Ok(None) => result.skipped.push(identifier),
                Err(e) => result.fail(identifier, e.to_string()),
            }
        }
        result
    }

    fn group_by_file<'t>(
        &self,
        targets: &'t [AnnotationTarget],
        result: &mut BatchResult,
    ) -> Vec<(PathBuf, Vec<&'t AnnotationTarget>)> {
        let mut groups: Vec<(PathBuf, Vec<&AnnotationTarget>)> = Vec::new();
        for target in targets {
            let Some(path) = target.file_path.as_deref() else {
                tracing::debug!("{}: no source file resolved", target.identifier);
                result.skipped.push(target.identifier.clone());
                continue;
            };
            if let Err(reason) = self.admit(path) {
                tracing::debug!("{}: skipped, {}", target.identifier, reason);
                result.skipped.push(target.identifier.clone());
                continue;
            }
            match groups.iter_mut().find(|(p, _)| p == path) {
                Some((_, group)) => group.push(target),
                None => groups.push((path.to_path_buf(), vec![target])),
            }
        }
        groups
    }

    /// Boundary and exclusion policy; refusals are silent skips
    fn admit(&self, path: &Path) -> std::result::Result<(), &'static str> {
        if !path.is_file() {
            return Err("file does not exist");
        }
        if !self.allow_outside_root && !self.is_within_root(path) {
            return Err("outside the configured root");
        }
        if self.is_excluded(path) {
            return Err("excluded by pattern");
        }
        Ok(())
    }

    fn is_within_root(&self, path: &Path) -> bool {
        let root = self.root.canonicalize().unwrap_or_else(|_| self.root.clone());
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        path.starts_with(root)
    }

    fn is_excluded(&self, path: &Path) -> bool {
        if self.exclude.is_empty() {
            return false;
        }
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        self.exclude
            .iter()
            .any(|p| p.matches_path(relative) || p.matches_path(path))
    }

    fn apply_group(&self, path: &Path, group: &[&AnnotationTarget]) -> Result<BatchResult> {
        let original = std::fs::read_to_string(path)?;
        let mut result = BatchResult::default();
        let mut working = original.clone();
        let mut placed: Vec<&str> = Vec::new();

        let mut by_tag: BTreeMap<MarkerTag, Vec<&AnnotationTarget>> = BTreeMap::new();
        for target in group {
            if matches!(target.anchor, Anchor::Declaration(_)) {
                by_tag.entry(target.tag).or_default().push(*target);
            }
        }

        // A lone block for a lone target is rewritten in place; the rest are regenerated
        let mut declaration_targets: Vec<&AnnotationTarget> = Vec::new();
        for (tag, targets) in by_tag {
            if let &[target] = targets.as_slice() {
                if let Some(updated) = self.replace_in_place(&working, target) {
                    working = updated;
                    placed.push(&target.identifier);
                    continue;
                }
            }
            working = AnnotationBlock::remove_all(&working, tag);
            declaration_targets.extend(targets);
        }

        if !declaration_targets.is_empty() {
            let entries: Vec<(String, String)> = declaration_targets
                .iter()
                .filter_map(|t| match &t.anchor {
                    Anchor::Declaration(name) => Some((name.clone(), t.rendered())),
                    Anchor::Pattern(_) => None,
                })
                .collect();
            let batch = self.inserter.insert_batch_into(&working, &entries);
            working = batch.content;
            for target in &declaration_targets {
                if let Anchor::Declaration(name) = &target.anchor {
                    if batch.inserted.contains(name) {
                        placed.push(&target.identifier);
                    }
                }
            }
        }

        // Pattern-anchored blocks are updated where they already sit
        for target in group {
            if let Anchor::Pattern(anchor) = &target.anchor {
                let before = working.clone();
                working = AnnotationBlock::upsert(&before, target.tag, &target.rendered(), anchor);
                let anchored = working != before
                    || AnnotationBlock::exists(&before, target.tag)
                    || anchor.is_match(&before);
                if anchored {
                    placed.push(&target.identifier);
                }
            }
        }

        if placed.is_empty() {
            tracing::debug!("{}: no target could be placed", path.display());
            result
                .skipped
                .extend(group.iter().map(|t| t.identifier.clone()));
            return Ok(result);
        }

        // Stripping folds blank runs; a rewrite that differs only there is no change
        if working != original && AnnotationBlock::collapse_blank_runs(&original) == working {
            working = original.clone();
        }

        let change = FileChange::new(path, original, working);
        let changed = !change.is_noop();
        if changed && !self.dry_run {
            change.write()?;
            tracing::info!("annotated {}", path.display());
        }

        for target in group {
            if changed && placed.contains(&target.identifier.as_str()) {
                result.succeeded.push(target.identifier.clone());
            } else {
                result.skipped.push(target.identifier.clone());
            }
        }
        if changed {
            result.changes.push(change);
        }
        Ok(result)
    }

    fn replace_in_place(&self, content: &str, target: &AnnotationTarget) -> Option<String> {
        let Anchor::Declaration(name) = &target.anchor else {
            return None;
        };
        let rendered = target.rendered();
        if rendered.is_empty() || AnnotationBlock::count(content, target.tag) != 1 {
            return None;
        }
        if !self.inserter.declares(content, name) {
            return None;
        }
        AnnotationBlock::replace(content, target.tag, &rendered)
    }

    fn remove_tags(&self, path: &Path, tags: &BTreeSet<MarkerTag>) -> Result<Option<FileChange>> {
        let original = std::fs::read_to_string(path)?;
        let mut working = original.clone();
        for tag in tags {
            working = AnnotationBlock::remove_all(&working, *tag);
        }

        let change = FileChange::new(path, original, working);
        if change.is_noop() {
            return Ok(None);
        }
        if !self.dry_run {
            change.write()?;
            tracing::info!("removed annotations from {}", path.display());
        }
        Ok(Some(change))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn setup(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        dir
    }

    fn schema_target(dir: &TempDir, name: &str, file: &str, text: &str) -> AnnotationTarget {
        AnnotationTarget::for_declaration(
            name,
            Some(dir.path().join(file)),
            MarkerTag::Schema,
            text,
        )
    }

    #[test]
    fn test_apply_is_idempotent() {
        let dir = setup(&[("user.rb", "# frozen_string_literal: true\n\nclass User\nend\n")]);
        let manager = AnnotationManager::new(dir.path());
        let target = schema_target(&dir, "User", "user.rb", "Table name: users");

        assert!(manager.apply(&target));
        let first = std::fs::read_to_string(dir.path().join("user.rb")).unwrap();

        assert!(!manager.apply(&target));
        let second = std::fs::read_to_string(dir.path().join("user.rb")).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.matches(&MarkerTag::Schema.begin_marker()).count(), 1);
    }

    #[test]
    fn test_apply_replaces_stale_block() {
        let dir = setup(&[("user.rb", "class User\nend\n")]);
        let manager = AnnotationManager::new(dir.path());

        manager.apply(&schema_target(&dir, "User", "user.rb", "old"));
        assert!(manager.apply(&schema_target(&dir, "User", "user.rb", "new")));

        let content = std::fs::read_to_string(dir.path().join("user.rb")).unwrap();
        assert!(content.contains("# new"));
        assert!(!content.contains("# old"));
    }

    #[test]
    fn test_remove_without_block_is_noop() {
        let dir = setup(&[("user.rb", "class User\nend\n")]);
        let manager = AnnotationManager::new(dir.path());
        assert!(!manager.remove(&schema_target(&dir, "User", "user.rb", "x")));
    }

    #[test]
    fn test_remove_after_apply_restores_file() {
        let original = "# frozen_string_literal: true\n\nclass User\nend\n";
        let dir = setup(&[("user.rb", original)]);
        let manager = AnnotationManager::new(dir.path());
        let target = schema_target(&dir, "User", "user.rb", "x");

        manager.apply(&target);
        assert!(manager.remove(&target));
        assert_eq!(std::fs::read_to_string(dir.path().join("user.rb")).unwrap(), original);
    }

    #[test]
    fn test_outside_root_is_refused() {
        let outside = setup(&[("gem_model.rb", "class GemModel\nend\n")]);
        let root = TempDir::new().unwrap();
        let target = schema_target(&outside, "GemModel", "gem_model.rb", "x");

        let manager = AnnotationManager::new(root.path());
        assert!(!manager.apply(&target));

        let permissive = AnnotationManager::new(root.path()).allow_outside_root(true);
        assert!(permissive.apply(&target));
    }

    #[test]
    fn test_dry_run_plans_without_writing() {
        let dir = setup(&[("user.rb", "class User\nend\n")]);
        let manager = AnnotationManager::new(dir.path()).with_dry_run(true);
        let result = manager.apply_all(&[schema_target(&dir, "User", "user.rb", "x")]);

        assert_eq!(result.succeeded, vec!["User"]);
        assert_eq!(result.changes.len(), 1);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("user.rb")).unwrap(),
            "class User\nend\n"
        );
    }

    #[test]
    fn test_batch_tally() {
        let dir = setup(&[
            ("user.rb", "class User\nend\n"),
            ("post.rb", "class Post\nend\n"),
        ]);
        let manager = AnnotationManager::new(dir.path());
        let targets = vec![
            schema_target(&dir, "User", "user.rb", "users"),
            schema_target(&dir, "Comment", "post.rb", "comments"),
            AnnotationTarget::for_declaration("Ghost", None, MarkerTag::Schema, "ghosts"),
            schema_target(&dir, "Tag", "tag.rb", "tags"),
        ];

        let result = manager.apply_all(&targets);
        assert_eq!(result.succeeded, vec!["User"]);
        assert_eq!(result.skipped.len(), 3);
        assert!(result.failed.is_empty());
        assert_eq!(result.total(), 4);
    }

    #[test]
    fn test_two_models_in_one_file_keep_both_blocks() {
        let dir = setup(&[("shapes.rb", "class Circle\nend\n\nclass Square\nend\n")]);
        let manager = AnnotationManager::new(dir.path()).with_position(Position::Before);
        let targets = vec![
            schema_target(&dir, "Circle", "shapes.rb", "circles"),
            schema_target(&dir, "Square", "shapes.rb", "squares"),
        ];

        let result = manager.apply_all(&targets);
        assert_eq!(result.succeeded.len(), 2);

        let rerun = manager.apply_all(&targets);
        assert_eq!(rerun.skipped.len(), 2);

        let content = std::fs::read_to_string(dir.path().join("shapes.rb")).unwrap();
        assert_eq!(content.matches("# circles").count(), 1);
        assert_eq!(content.matches("# squares").count(), 1);
    }

    #[test]
    fn test_rerun_leaves_blank_runs_alone() {
        let original = "class Circle\nend\n\n\n\nclass Square\nend\n";
        let dir = setup(&[("shapes.rb", original)]);
        let manager = AnnotationManager::new(dir.path()).with_position(Position::Before);
        let targets = vec![
            schema_target(&dir, "Circle", "shapes.rb", "circles"),
            schema_target(&dir, "Square", "shapes.rb", "squares"),
        ];

        manager.apply_all(&targets);
        let first = std::fs::read_to_string(dir.path().join("shapes.rb")).unwrap();
        assert!(first.contains("end\n\n\n\n# --- BEGIN"));

        let rerun = manager.apply_all(&targets);
        assert!(rerun.succeeded.is_empty());
        assert!(rerun.changes.is_empty());
        assert_eq!(std::fs::read_to_string(dir.path().join("shapes.rb")).unwrap(), first);
    }

    #[test]
    fn test_lone_block_is_replaced_where_it_sits() {
        let dir = setup(&[("user.rb", "module Admin\n  class User\n  end\nend\n")]);
        let before = AnnotationManager::new(dir.path()).with_position(Position::Before);
        before.apply(&schema_target(&dir, "Admin::User", "user.rb", "old"));

        let top = AnnotationManager::new(dir.path());
        assert!(top.apply(&schema_target(&dir, "Admin::User", "user.rb", "new")));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("user.rb")).unwrap(),
            "module Admin\n  # --- BEGIN annotate:schema ---\n  # new\n  # --- END annotate:schema ---\n  class User\n  end\nend\n"
        );
    }

    #[test]
    fn test_excluded_files_are_skipped() {
        let dir = setup(&[("vendor/legacy.rb", "class Legacy\nend\n")]);
        let manager = AnnotationManager::new(dir.path())
            .with_exclude(vec![Pattern::new("vendor/**").unwrap()]);
        let result = manager.apply_all(&[schema_target(&dir, "Legacy", "vendor/legacy.rb", "x")]);
        assert_eq!(result.skipped, vec!["Legacy"]);
    }

    #[test]
    fn test_pattern_anchor_updates_in_place() {
        let routes = "Rails.application.routes.draw do\n  resources :users\nend\n";
        let dir = setup(&[("config/routes.rb", routes)]);
        let manager = AnnotationManager::new(dir.path());
        let anchor = Regex::new(r"routes\.draw").unwrap();
        let target = |text: &str| {
            AnnotationTarget::for_pattern(
                "routes",
                Some(dir.path().join("config/routes.rb")),
                anchor.clone(),
                MarkerTag::Routes,
                text,
            )
        };

        assert!(manager.apply(&target("GET /users")));
        assert!(manager.apply(&target("GET /users\nPOST /users")));
        assert!(!manager.apply(&target("GET /users\nPOST /users")));

        let content = std::fs::read_to_string(dir.path().join("config/routes.rb")).unwrap();
        assert_eq!(content.matches(&MarkerTag::Routes.begin_marker()).count(), 1);
        assert!(content.contains("# POST /users"));
    }

    #[test]
    fn test_remove_from_files() {
        let dir = setup(&[("a.rb", "class A\nend\n"), ("b.rb", "class B\nend\n")]);
        let manager = AnnotationManager::new(dir.path());
        manager.apply(&schema_target(&dir, "A", "a.rb", "x"));

        let result = manager.remove_from_files(
            &[dir.path().join("a.rb"), dir.path().join("b.rb")],
            MarkerTag::Schema,
        );
        assert_eq!(result.succeeded.len(), 1);
        assert_eq!(result.skipped.len(), 1);
    }
}
