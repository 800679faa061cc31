//! @acp:module "Annotation Block"
//! @acp:summary "Marker-delimited comment blocks: render, extract, remove, upsert"
//! @acp:domain annotation
//! @acp:layer model
//!
//! A block is a run of `#` comment lines wrapped in a begin and an end marker
//! line. The marker text is part of the on-disk format and must not change,
//! otherwise previously annotated files stop being recognised.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Comment token for Ruby sources
pub const COMMENT: &str = "#";

static BLANK_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// @acp:summary "Subsystem owning a block; independent blocks coexist in one file"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerTag {
    Schema,
    Routes,
    Mailer,
}

impl MarkerTag {
    pub const ALL: [MarkerTag; 3] = [MarkerTag::Schema, MarkerTag::Routes, MarkerTag::Mailer];

    pub fn as_str(&self) -> &'static str {
        match self {
            MarkerTag::Schema => "schema",
            MarkerTag::Routes => "routes",
            MarkerTag::Mailer => "mailer",
        }
    }

    pub fn begin_marker(&self) -> String {
        format!("{} --- BEGIN annotate:{} ---", COMMENT, self.as_str())
    }

    pub fn end_marker(&self) -> String {
        format!("{} --- END annotate:{} ---", COMMENT, self.as_str())
    }
}

impl std::fmt::Display for MarkerTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MarkerTag {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "schema" | "models" => Ok(MarkerTag::Schema),
            "routes" => Ok(MarkerTag::Routes),
            "mailer" | "mailers" => Ok(MarkerTag::Mailer),
            _ => Err(format!("Unknown marker tag: {}", s)),
        }
    }
}

/// @acp:summary "Location of an existing block inside file text"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedBlock {
    /// Byte offset of the begin marker's line (indentation included)
    pub start: usize,
    /// Byte offset just past the end marker text
    pub end: usize,
    pub text: String,
}

/// @acp:summary "Value object for one generated annotation"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationBlock {
    pub tag: MarkerTag,
    pub content: Vec<String>,
}

impl AnnotationBlock {
    pub fn new(tag: MarkerTag, content: Vec<String>) -> Self {
        Self { tag, content }
    }

    /// Build from multi-line payload text (one payload line per text line)
    pub fn from_text(tag: MarkerTag, text: &str) -> Self {
        let content = if text.trim().is_empty() {
            Vec::new()
        } else {
            text.trim_end_matches('\n').lines().map(str::to_string).collect()
        };
        Self { tag, content }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Serialize as comment lines between markers, no trailing newline.
    /// An empty payload renders to an empty string.
    pub fn render(&self) -> String {
        if self.content.is_empty() {
            return String::new();
        }

        let mut lines = Vec::with_capacity(self.content.len() + 2);
        lines.push(self.tag.begin_marker());
        for line in &self.content {
            if line.is_empty() {
                lines.push(COMMENT.to_string());
            } else {
                lines.push(format!("{} {}", COMMENT, line));
            }
        }
        lines.push(self.tag.end_marker());
        lines.join("\n")
    }

    /// Find the first begin marker and the first end marker after it.
    /// A begin marker with no closing marker yields `None`.
    pub fn extract(content: &str, tag: MarkerTag) -> Option<ExtractedBlock> {
        let begin = tag.begin_marker();
        let end = tag.end_marker();

        let begin_pos = content.find(&begin)?;
        let search_from = begin_pos + begin.len();
        let end_pos = search_from + content[search_from..].find(&end)? + end.len();
        let start = indented_line_start(content, begin_pos);

        Some(ExtractedBlock {
            start,
            end: end_pos,
            text: content[start..end_pos].to_string(),
        })
    }

    pub fn exists(content: &str, tag: MarkerTag) -> bool {
        Self::extract(content, tag).is_some()
    }

    /// Strip every block carrying `tag`.
    ///
    /// Each block takes its own line terminator with it. When the block sat
    /// between blank-line separators (or at the top of the file), one
    /// separator goes too, so insert-then-remove restores the original text.
    /// Once anything was removed, every run of blank lines in the file
    /// collapses to one. Content without a block is returned untouched.
    pub fn remove_all(content: &str, tag: MarkerTag) -> String {
        let mut result = content.to_string();
        let mut removed = false;

        while let Some(block) = Self::extract(&result, tag) {
            let before = &result[..block.start];
            let mut after = &result[block.end..];

            if let Some(rest) = after.strip_prefix('\n') {
                after = rest;
                if before.is_empty() || before.ends_with("\n\n") {
                    after = after.strip_prefix('\n').unwrap_or(after);
                }
            }

            result = join_collapsing(before, after);
            removed = true;
        }

        if removed {
            Self::collapse_blank_runs(&result)
        } else {
            result
        }
    }

    /// Swap the first block for `new_block`, keeping the old block's
    /// indentation and surroundings. `None` when there is no block.
    pub fn replace(content: &str, tag: MarkerTag, new_block: &str) -> Option<String> {
        let block = Self::extract(content, tag)?;
        let indent: String = block
            .text
            .chars()
            .take_while(|c| *c == ' ' || *c == '\t')
            .collect();
        let indented = new_block
            .lines()
            .map(|line| {
                if line.is_empty() {
                    String::new()
                } else {
                    format!("{}{}", indent, line)
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        Some(format!("{}{}{}", &content[..block.start], indented, &content[block.end..]))
    }

    /// Number of blocks carrying `tag`
    pub fn count(content: &str, tag: MarkerTag) -> usize {
        content.matches(&tag.begin_marker()).count()
    }

    /// Fold every run of blank lines down to a single one
    pub fn collapse_blank_runs(content: &str) -> String {
        BLANK_RUN.replace_all(content, "\n\n").into_owned()
    }

    /// Replace an existing block in place, or insert after the first line
    /// matching `anchor`. Exactly one blank line separates the block from
    /// its neighbours. Without a block or an anchor match the text is
    /// returned unchanged.
    pub fn upsert(content: &str, tag: MarkerTag, new_block: &str, anchor: &Regex) -> String {
        if new_block.is_empty() {
            return Self::remove_all(content, tag);
        }

        if let Some(block) = Self::extract(content, tag) {
            return splice_separated(&content[..block.start], new_block, &content[block.end..]);
        }

        let mut offset = 0;
        for line in content.split_inclusive('\n') {
            if anchor.is_match(line.trim_end_matches(['\r', '\n'])) {
                let insert_at = offset + line.len();
                return splice_separated(&content[..insert_at], new_block, &content[insert_at..]);
            }
            offset += line.len();
        }

        content.to_string()
    }
}

/// Start of the marker's line if only whitespace precedes the marker on it
fn indented_line_start(content: &str, pos: usize) -> usize {
    let line_start = content[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0);
    if content[line_start..pos].chars().all(|c| c == ' ' || c == '\t') {
        line_start
    } else {
        pos
    }
}

fn join_collapsing(before: &str, after: &str) -> String {
    let trailing = before.len() - before.trim_end_matches('\n').len();
    let leading = after.len() - after.trim_start_matches('\n').len();

    if trailing + leading <= 2 {
        return format!("{}{}", before, after);
    }

    let keep_before = trailing.min(2);
    let keep_after = 2 - keep_before;
    format!(
        "{}{}{}",
        &before[..before.len() - trailing + keep_before],
        "\n".repeat(keep_after),
        &after[leading..]
    )
}

fn splice_separated(before: &str, block: &str, after: &str) -> String {
    let before = before.trim_end_matches('\n');
    let after = after.trim_start_matches('\n');

    let mut out = String::with_capacity(before.len() + block.len() + after.len() + 4);
    if !before.is_empty() {
        out.push_str(before);
        out.push_str("\n\n");
    }
    out.push_str(block);
    out.push('\n');
    if !after.is_empty() {
        out.push('\n');
        out.push_str(after);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn schema_block(lines: &[&str]) -> String {
        AnnotationBlock::new(
            MarkerTag::Schema,
            lines.iter().map(|l| l.to_string()).collect(),
        )
        .render()
    }

    #[test]
    fn test_render_wraps_payload_in_markers() {
        let rendered = schema_block(&["== Schema Information", "", "Table name: users"]);
        assert_eq!(
            rendered,
            "# --- BEGIN annotate:schema ---\n# == Schema Information\n#\n# Table name: users\n# --- END annotate:schema ---"
        );
    }

    #[test]
    fn test_empty_payload_renders_nothing() {
        assert_eq!(AnnotationBlock::new(MarkerTag::Routes, vec![]).render(), "");
        assert!(AnnotationBlock::from_text(MarkerTag::Routes, "  \n").is_empty());
    }

    #[test]
    fn test_from_text_keeps_inner_blank_lines() {
        let block = AnnotationBlock::from_text(MarkerTag::Mailer, "a\n\nb\n");
        assert_eq!(block.content, vec!["a", "", "b"]);
    }

    #[test]
    fn test_extract_finds_block() {
        let block = schema_block(&["x"]);
        let content = format!("class User\nend\n\n{}\n", block);
        let found = AnnotationBlock::extract(&content, MarkerTag::Schema).unwrap();
        assert_eq!(found.text, block);
        assert_eq!(&content[found.start..found.end], block);
    }

    #[test]
    fn test_extract_stray_begin_marker_is_none() {
        let content = format!("{}\n# leftover\nclass User\nend\n", MarkerTag::Schema.begin_marker());
        assert!(AnnotationBlock::extract(&content, MarkerTag::Schema).is_none());
    }

    #[test]
    fn test_extract_ignores_other_tags() {
        let content = format!("{}\n", AnnotationBlock::new(MarkerTag::Routes, vec!["r".into()]).render());
        assert!(AnnotationBlock::extract(&content, MarkerTag::Schema).is_none());
        assert!(AnnotationBlock::exists(&content, MarkerTag::Routes));
    }

    #[test]
    fn test_extract_includes_indentation() {
        let content = "module A\n  # --- BEGIN annotate:schema ---\n  # x\n  # --- END annotate:schema ---\n  class B\n  end\nend\n";
        let found = AnnotationBlock::extract(content, MarkerTag::Schema).unwrap();
        assert!(found.text.starts_with("  # --- BEGIN"));
    }

    #[test]
    fn test_remove_all_header_block_restores_original() {
        let original = "class User\nend\n";
        let annotated = format!("{}\n\n{}", schema_block(&["x"]), original);
        assert_eq!(AnnotationBlock::remove_all(&annotated, MarkerTag::Schema), original);
    }

    #[test]
    fn test_remove_all_strips_every_block() {
        let block = schema_block(&["x"]);
        let content = format!("{b}\n\nclass A\nend\n\n{b}\n\nclass B\nend\n", b = block);
        let cleaned = AnnotationBlock::remove_all(&content, MarkerTag::Schema);
        assert_eq!(cleaned, "class A\nend\n\nclass B\nend\n");
        assert!(!AnnotationBlock::exists(&cleaned, MarkerTag::Schema));
    }

    #[test]
    fn test_remove_all_collapses_blank_runs_at_removal_site() {
        let content = format!("class A\nend\n\n\n{}\n\n\nclass B\nend\n", schema_block(&["x"]));
        let cleaned = AnnotationBlock::remove_all(&content, MarkerTag::Schema);
        assert_eq!(cleaned, "class A\nend\n\nclass B\nend\n");
    }

    #[test]
    fn test_remove_all_without_block_is_untouched() {
        let content = "class A\nend\n\n\n\nclass B\nend\n";
        assert_eq!(AnnotationBlock::remove_all(content, MarkerTag::Schema), content);
    }

    #[test]
    fn test_remove_all_collapses_blank_runs_across_file() {
        let content = format!(
            "class A\nend\n\n\n\nclass B\nend\n{}\nclass C\nend\n",
            schema_block(&["x"])
        );
        let cleaned = AnnotationBlock::remove_all(&content, MarkerTag::Schema);
        assert_eq!(cleaned, "class A\nend\n\nclass B\nend\nclass C\nend\n");
    }

    #[test]
    fn test_remove_all_keeps_other_tags() {
        let routes = AnnotationBlock::new(MarkerTag::Routes, vec!["r".into()]).render();
        let content = format!("{}\n\n{}\n\nclass A\nend\n", routes, schema_block(&["s"]));
        let cleaned = AnnotationBlock::remove_all(&content, MarkerTag::Schema);
        assert_eq!(cleaned, format!("{}\n\nclass A\nend\n", routes));
    }

    #[test]
    fn test_replace_keeps_position_and_indent() {
        let content = format!("module Admin\n  {}\n  class User\n  end\nend\n", schema_block(&["old"]));
        let replaced = AnnotationBlock::replace(&content, MarkerTag::Schema, &schema_block(&["new"])).unwrap();
        assert_eq!(
            replaced,
            "module Admin\n  # --- BEGIN annotate:schema ---\n  # new\n  # --- END annotate:schema ---\n  class User\n  end\nend\n"
        );
        assert!(AnnotationBlock::replace("class User\nend\n", MarkerTag::Schema, "x").is_none());
    }

    #[test]
    fn test_upsert_replaces_existing_block() {
        let anchor = Regex::new(r"routes\.draw").unwrap();
        let old = schema_block(&["old"]);
        let new = schema_block(&["new"]);
        let content = format!("# header\n{}\nclass A\nend\n", old);

        let updated = AnnotationBlock::upsert(&content, MarkerTag::Schema, &new, &anchor);
        assert_eq!(updated, format!("# header\n\n{}\n\nclass A\nend\n", new));
    }

    #[test]
    fn test_upsert_inserts_after_anchor() {
        let anchor = Regex::new(r"routes\.draw do").unwrap();
        let block = AnnotationBlock::new(MarkerTag::Routes, vec!["GET /".into()]).render();
        let content = "Rails.application.routes.draw do\n  root 'home#index'\nend\n";

        let updated = AnnotationBlock::upsert(content, MarkerTag::Routes, &block, &anchor);
        assert_eq!(
            updated,
            format!("Rails.application.routes.draw do\n\n{}\n\n  root 'home#index'\nend\n", block)
        );
        // second upsert is stable
        assert_eq!(
            AnnotationBlock::upsert(&updated, MarkerTag::Routes, &block, &anchor),
            updated
        );
    }

    #[test]
    fn test_upsert_without_anchor_match_is_noop() {
        let anchor = Regex::new(r"nothing matches this").unwrap();
        let content = "class A\nend\n";
        assert_eq!(
            AnnotationBlock::upsert(content, MarkerTag::Schema, &schema_block(&["x"]), &anchor),
            content
        );
    }

    #[test]
    fn test_marker_tag_from_str() {
        assert_eq!("models".parse::<MarkerTag>().unwrap(), MarkerTag::Schema);
        assert_eq!("Routes".parse::<MarkerTag>().unwrap(), MarkerTag::Routes);
        assert!("diagram".parse::<MarkerTag>().is_err());
    }
}
