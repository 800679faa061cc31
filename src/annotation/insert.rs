//! @acp:module "File Insertion Engine"
//! @acp:summary "Places rendered annotation blocks relative to parsed declarations"
//! @acp:domain annotation
//! @acp:layer service
//!
//! Every placement re-parses the text it is about to modify, so line numbers
//! are never carried across a mutation. Batch insertion parses once and then
//! applies entries bottom-up: inserting text below a declaration cannot shift
//! the recorded line of any declaration above it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use similar::TextDiff;

use super::directive;
use crate::error::{AnnotateError, Result};
use crate::parse::{Declaration, DeclarationIndex, Parser, SCOPE_SEPARATOR};

/// @acp:summary "Where a block goes relative to its declaration"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    /// Top of the file, below any leading directives
    #[default]
    Top,
    /// Directly above the `class` line, at the declaration's indentation
    Before,
    /// Directly below the declaration's closing `end`
    After,
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Position::Top => "top",
            Position::Before => "before",
            Position::After => "after",
        };
        write!(f, "{}", name)
    }
}

/// @acp:summary "Planned rewrite of one file"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub original: String,
    pub updated: String,
}

impl FileChange {
    pub fn new(path: impl Into<PathBuf>, original: String, updated: String) -> Self {
        Self {
            path: path.into(),
            original,
            updated,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.original == self.updated
    }

    /// Unified diff of the change, empty for a no-op
    pub fn diff(&self) -> String {
        if self.is_noop() {
            return String::new();
        }
        let name = self.path.display().to_string();
        TextDiff::from_lines(&self.original, &self.updated)
            .unified_diff()
            .context_radius(3)
            .header(&format!("a/{}", name), &format!("b/{}", name))
            .to_string()
    }

    /// Write the new content; unchanged files are not touched
    pub fn write(&self) -> Result<()> {
        if self.is_noop() {
            return Ok(());
        }
        std::fs::write(&self.path, &self.updated).map_err(|source| AnnotateError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

/// @acp:summary "Outcome of a batch insertion over one text"
#[derive(Debug, Clone, Default)]
pub struct BatchInsert {
    pub content: String,
    /// Requested names that were placed, in document order
    pub inserted: Vec<String>,
    /// Requested names with no matching declaration
    pub missing: Vec<String>,
}

/// @acp:summary "Annotation insertion engine"
pub struct Inserter {
    parser: Parser,
    position: Position,
    dry_run: bool,
}

impl Default for Inserter {
    fn default() -> Self {
        Self::new()
    }
}

impl Inserter {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
            position: Position::default(),
            dry_run: false,
        }
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// @acp:summary "Insert one annotation into the file declaring `declaration`"
    /// Returns true when the file was rewritten (or would be, under dry-run).
    pub fn insert_before_declaration<P: AsRef<Path>>(
        &self,
        path: P,
        declaration: &str,
        annotation: &str,
    ) -> bool {
        let path = path.as_ref();
        match self.plan(path, declaration, annotation) {
            Some(change) if !change.is_noop() => self.commit(&change),
            _ => false,
        }
    }

    /// @acp:summary "Insert several annotations into one file from a single parse"
    /// Returns how many entries were placed; zero when nothing was written.
    pub fn insert_batch<P: AsRef<Path>>(&self, path: P, entries: &[(String, String)]) -> usize {
        let path = path.as_ref();
        let Some((change, batch)) = self.plan_batch(path, entries) else {
            return 0;
        };
        if change.is_noop() || !self.commit(&change) {
            return 0;
        }
        batch.inserted.len()
    }

    /// Whether `declaration` resolves to a class in `content`
    pub fn declares(&self, content: &str, declaration: &str) -> bool {
        resolve(&self.parser.parse(content), declaration).is_some()
    }

    /// Compute the rewrite for a single insertion without touching the file
    pub fn plan(&self, path: &Path, declaration: &str, annotation: &str) -> Option<FileChange> {
        let original = read_source(path)?;
        let updated = self.insert_in(Some(path), &original, declaration, annotation)?;
        Some(FileChange::new(path, original, updated))
    }

    /// Compute the rewrite for a batch without touching the file
    pub fn plan_batch(
        &self,
        path: &Path,
        entries: &[(String, String)],
    ) -> Option<(FileChange, BatchInsert)> {
        let original = read_source(path)?;
        let batch = self.insert_batch_in(Some(path), &original, entries);
        if batch.inserted.is_empty() {
            return None;
        }
        let change = FileChange::new(path, original, batch.content.clone());
        Some((change, batch))
    }

    /// In-memory single insertion; `None` when the declaration cannot be resolved
    pub fn insert_into(&self, content: &str, declaration: &str, annotation: &str) -> Option<String> {
        self.insert_in(None, content, declaration, annotation)
    }

    /// In-memory batch insertion
    pub fn insert_batch_into(&self, content: &str, entries: &[(String, String)]) -> BatchInsert {
        self.insert_batch_in(None, content, entries)
    }

    fn insert_in(
        &self,
        origin: Option<&Path>,
        content: &str,
        declaration: &str,
        annotation: &str,
    ) -> Option<String> {
        let index = self.parser.parse(content);
        if index.classes().is_empty() {
            report_no_classes(origin, &index);
            return None;
        }

        let Some(target) = resolve(&index, declaration) else {
            tracing::debug!(
                "{}: declaration {} not found",
                origin_label(origin),
                declaration
            );
            return None;
        };

        if annotation.is_empty() {
            return Some(content.to_string());
        }
        Some(self.place(content, target, annotation))
    }

    fn insert_batch_in(
        &self,
        origin: Option<&Path>,
        content: &str,
        entries: &[(String, String)],
    ) -> BatchInsert {
        let mut batch = BatchInsert {
            content: content.to_string(),
            ..BatchInsert::default()
        };

        let index = self.parser.parse(content);
        if index.classes().is_empty() {
            report_no_classes(origin, &index);
            batch.missing = entries.iter().map(|(name, _)| name.clone()).collect();
            return batch;
        }

        let mut resolved: Vec<(Declaration, &str, &str)> = Vec::with_capacity(entries.len());
        for (name, annotation) in entries {
            match resolve(&index, name) {
                Some(declaration) => resolved.push((declaration.clone(), name, annotation)),
                None => {
                    tracing::debug!("{}: declaration {} not found", origin_label(origin), name);
                    batch.missing.push(name.clone());
                }
            }
        }

        // Bottom-most first. Ascending order would invalidate every later line number.
        resolved.sort_by(|a, b| self.anchor_line(&b.0).cmp(&self.anchor_line(&a.0)));

        for (declaration, name, annotation) in &resolved {
            if !annotation.is_empty() {
                batch.content = self.place(&batch.content, declaration, annotation);
            }
            batch.inserted.push(name.to_string());
        }
        batch.inserted.reverse();
        batch
    }

    fn anchor_line(&self, declaration: &Declaration) -> usize {
        match self.position {
            Position::After => declaration.end_line,
            Position::Top | Position::Before => declaration.line_number,
        }
    }

    fn place(&self, content: &str, declaration: &Declaration, annotation: &str) -> String {
        match self.position {
            Position::Top => place_top(content, annotation),
            Position::Before => place_before(content, declaration, annotation),
            Position::After => place_after(content, declaration, annotation),
        }
    }

    fn commit(&self, change: &FileChange) -> bool {
        if self.dry_run {
            tracing::debug!("dry run: not writing {}", change.path.display());
            return true;
        }
        match change.write() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("{}", e);
                false
            }
        }
    }
}

/// Qualified names fall back to compact-style declarations, compared on the
/// enclosing namespace plus the path as written.
fn resolve<'a>(index: &'a DeclarationIndex, query: &str) -> Option<&'a Declaration> {
    if !query.contains(SCOPE_SEPARATOR) {
        return index.classes().iter().find(|c| c.name == query);
    }

    index
        .find_class(query)
        .or_else(|| index.classes().iter().find(|c| c.qualified_path() == query))
}

fn read_source(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) => {
            tracing::debug!("cannot read {}: {}", path.display(), e);
            None
        }
    }
}

/// Filename heuristic for files worth warning about
pub fn looks_like_ruby(path: &Path) -> bool {
    let by_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| matches!(ext, "rb" | "rake" | "ru" | "gemspec"));
    let by_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| matches!(name, "Gemfile" | "Rakefile"));
    by_extension || by_name
}

fn origin_label(origin: Option<&Path>) -> String {
    origin
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<input>".to_string())
}

fn report_no_classes(origin: Option<&Path>, index: &DeclarationIndex) {
    let label = origin_label(origin);
    if origin.map_or(true, looks_like_ruby) {
        tracing::warn!(
            "{}: no class declarations found{}; annotation not placed",
            label,
            if index.is_degraded() { " (parse degraded)" } else { "" }
        );
    } else {
        tracing::debug!("{}: not a Ruby source file", label);
    }
}

fn place_top(content: &str, annotation: &str) -> String {
    let header_lines = directive::header_len(content);
    let split_at: usize = content
        .split_inclusive('\n')
        .take(header_lines)
        .map(str::len)
        .sum();
    let (head, rest) = content.split_at(split_at);
    let rest = rest.trim_start_matches('\n');

    let mut out = String::with_capacity(content.len() + annotation.len() + 4);
    if !head.is_empty() {
        out.push_str(head);
        if !head.ends_with('\n') {
            out.push('\n');
        }
        out.push('\n');
    }
    out.push_str(annotation);
    out.push('\n');
    if !rest.is_empty() {
        out.push('\n');
        out.push_str(rest);
    }
    out
}

fn place_before(content: &str, declaration: &Declaration, annotation: &str) -> String {
    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    let at = declaration.line_number.saturating_sub(1).min(lines.len());
    let indent = lines.get(at).map(|l| leading_whitespace(l)).unwrap_or("");
    splice_lines(&lines, at, &indent_block(annotation, indent))
}

fn place_after(content: &str, declaration: &Declaration, annotation: &str) -> String {
    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    let at = declaration.end_line.min(lines.len());
    let indent = lines
        .get(declaration.line_number.saturating_sub(1))
        .map(|l| leading_whitespace(l))
        .unwrap_or("");
    splice_lines(&lines, at, &indent_block(annotation, indent))
}

fn splice_lines(lines: &[&str], at: usize, block: &str) -> String {
    let mut out = String::new();
    for line in &lines[..at] {
        out.push_str(line);
    }
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(block);
    out.push('\n');
    for line in &lines[at..] {
        out.push_str(line);
    }
    out
}

fn leading_whitespace(line: &str) -> &str {
    let trimmed = line.trim_start_matches([' ', '\t']);
    &line[..line.len() - trimmed.len()]
}

fn indent_block(block: &str, indent: &str) -> String {
    if indent.is_empty() {
        return block.to_string();
    }
    block
        .lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{}{}", indent, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
