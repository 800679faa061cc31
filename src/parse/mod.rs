//! @acp:module "Structural Parser"
//! @acp:summary "Locates class/module boundaries and namespaces in Ruby source"
//! @acp:domain parsing
//! @acp:layer service
//!
//! Builds a tree-sitter syntax tree for a Ruby file and walks it depth-first,
//! recording every `class` and `module` definition with its namespace and
//! line span. Only declaration boundaries matter here; method bodies and
//! everything else are walked through without interpretation.
//!
//! Malformed input never fails the caller. tree-sitter recovers from most
//! syntax errors on its own, so a broken file usually yields a partial index;
//! if no tree can be produced at all the index is empty.

pub mod index;

use std::path::Path;

use serde::Serialize;
use tree_sitter::Node;

pub use index::{DeclarationIndex, SCOPE_SEPARATOR};

/// @acp:summary "Kind of a parsed declaration"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclarationKind {
    Class,
    Module,
}

impl DeclarationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclarationKind::Class => "class",
            DeclarationKind::Module => "module",
        }
    }

    fn from_node_kind(kind: &str) -> Option<Self> {
        match kind {
            "class" => Some(DeclarationKind::Class),
            "module" => Some(DeclarationKind::Module),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// @acp:summary "A parsed class or module definition"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Declaration {
    pub kind: DeclarationKind,
    /// Last path segment of the declared name
    pub name: String,
    /// Enclosing class/module names, outermost first
    pub namespace: Vec<String>,
    pub full_name: String,
    /// Name as written after the keyword; `Admin::User` for `class Admin::User`
    pub declared_path: String,
    /// 1-based line of the `class`/`module` keyword
    pub line_number: usize,
    /// 0-based column of the keyword
    pub column: usize,
    /// 1-based line of the closing `end`
    pub end_line: usize,
}

impl Declaration {
    pub fn new(
        kind: DeclarationKind,
        name: impl Into<String>,
        namespace: Vec<String>,
        line_number: usize,
        column: usize,
        end_line: usize,
    ) -> Self {
        let name = name.into();
        let full_name = if namespace.is_empty() {
            name.clone()
        } else {
            format!("{}{}{}", namespace.join(SCOPE_SEPARATOR), SCOPE_SEPARATOR, name)
        };
        Self {
            kind,
            declared_path: name.clone(),
            name,
            namespace,
            full_name,
            line_number,
            column,
            end_line: end_line.max(line_number),
        }
    }

    pub fn with_declared_path(mut self, path: impl Into<String>) -> Self {
        self.declared_path = path.into();
        self
    }

    /// Namespace joined with `::`, empty at top level
    pub fn namespace_path(&self) -> String {
        self.namespace.join(SCOPE_SEPARATOR)
    }

    /// Enclosing namespace plus the name as written, e.g. `Outer::Admin::User`
    /// for `class Admin::User` inside `module Outer`
    pub fn qualified_path(&self) -> String {
        if self.namespace.is_empty() {
            self.declared_path.clone()
        } else {
            format!("{}{}{}", self.namespace_path(), SCOPE_SEPARATOR, self.declared_path)
        }
    }

    pub fn is_top_level(&self) -> bool {
        self.namespace.is_empty()
    }
}

/// @acp:summary "Parser for Ruby declaration structure"
pub struct Parser {
    language: tree_sitter::Language,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_ruby::LANGUAGE.into(),
        }
    }

    /// @acp:summary "Parse source text into a declaration index"
    /// Never fails: anything the parser cannot handle degrades to an empty index.
    pub fn parse(&self, content: &str) -> DeclarationIndex {
        let mut parser = tree_sitter::Parser::new();
        if let Err(e) = parser.set_language(&self.language) {
            tracing::warn!("Ruby grammar unavailable: {}", e);
            return DeclarationIndex::degraded();
        }

        let Some(tree) = parser.parse(content, None) else {
            tracing::warn!("tree-sitter produced no tree; treating file as having no declarations");
            return DeclarationIndex::degraded();
        };

        let root = tree.root_node();
        let mut walker = Walker {
            source: content.as_bytes(),
            namespace: Vec::new(),
            classes: Vec::new(),
            modules: Vec::new(),
        };
        walker.visit(root);

        if root.has_error() {
            tracing::debug!(
                classes = walker.classes.len(),
                modules = walker.modules.len(),
                "source contains syntax errors; declaration index may be partial"
            );
        }

        DeclarationIndex::new(walker.classes, walker.modules, root.has_error())
    }

    /// @acp:summary "Read and parse a file; unreadable files yield an empty index"
    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> DeclarationIndex {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => self.parse(&content),
            Err(e) => {
                tracing::debug!("cannot read {}: {}", path.display(), e);
                DeclarationIndex::degraded()
            }
        }
    }
}

/// Depth-first walk keeping the enclosing namespace on a stack
struct Walker<'s> {
    source: &'s [u8],
    namespace: Vec<String>,
    classes: Vec<Declaration>,
    modules: Vec<Declaration>,
}

impl Walker<'_> {
    fn visit(&mut self, node: Node) {
        if let Some(kind) = DeclarationKind::from_node_kind(node.kind()) {
            if let Some((name, path)) = self.declared_name(node) {
                let start = node.start_position();
                let end = node.end_position();
                let declaration = Declaration::new(
                    kind,
                    name.clone(),
                    self.namespace.clone(),
                    start.row + 1,
                    start.column,
                    end.row + 1,
                )
                .with_declared_path(path);
                match kind {
                    DeclarationKind::Class => self.classes.push(declaration),
                    DeclarationKind::Module => self.modules.push(declaration),
                }

                self.namespace.push(name);
                self.visit_children(node);
                self.namespace.pop();
                return;
            }
        }

        self.visit_children(node);
    }

    fn visit_children(&mut self, node: Node) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child);
        }
    }

    /// Last segment and written path: `class A::B::C` gives `(C, A::B::C)`.
    /// Lexical nesting supplies the namespace.
    fn declared_name(&self, node: Node) -> Option<(String, String)> {
        let name_node = node.child_by_field_name("name")?;
        let last_segment = match name_node.kind() {
            "constant" => name_node,
            "scope_resolution" => name_node.child_by_field_name("name")?,
            _ => return None,
        };
        let name = last_segment.utf8_text(self.source).ok()?.trim();
        if name.is_empty() {
            return None;
        }
        let written: String = name_node
            .utf8_text(self.source)
            .ok()?
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let path = written.trim_start_matches(SCOPE_SEPARATOR).to_string();
        Some((name.to_string(), path))
    }
}
