//! @acp:module "Declaration Index"
//! @acp:summary "Name lookup over parsed classes and modules"
//! @acp:domain parsing
//! @acp:layer model

use serde::Serialize;

use super::Declaration;

/// Ruby's scope-resolution token
pub const SCOPE_SEPARATOR: &str = "::";

/// @acp:summary "Immutable view over one parse result"
///
/// Lookups resolve a query by exact `full_name` first, then (only for
/// unqualified queries) by bare `name`. Either way the first declaration in
/// document order wins, so `find_class("User")` in a file defining `User`,
/// `Admin::User` and `Blog::User` returns whichever of them appears first.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeclarationIndex {
    classes: Vec<Declaration>,
    modules: Vec<Declaration>,
    degraded: bool,
}

impl DeclarationIndex {
    pub fn new(classes: Vec<Declaration>, modules: Vec<Declaration>, degraded: bool) -> Self {
        Self {
            classes,
            modules,
            degraded,
        }
    }

    /// Empty index for input that could not be parsed at all
    pub fn degraded() -> Self {
        Self {
            degraded: true,
            ..Self::default()
        }
    }

    pub fn classes(&self) -> &[Declaration] {
        &self.classes
    }

    pub fn modules(&self) -> &[Declaration] {
        &self.modules
    }

    pub fn find_class(&self, query: &str) -> Option<&Declaration> {
        find_in(&self.classes, query)
    }

    pub fn find_module(&self, query: &str) -> Option<&Declaration> {
        find_in(&self.modules, query)
    }

    /// Fully qualified class names in document order
    pub fn class_names(&self) -> Vec<&str> {
        self.classes.iter().map(|c| c.full_name.as_str()).collect()
    }

    /// Fully qualified module names in document order
    pub fn module_names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.full_name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.modules.is_empty()
    }

    /// Whether the syntax tree contained errors. An empty, degraded index
    /// does not prove the file has no declarations.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }
}

fn find_in<'a>(declarations: &'a [Declaration], query: &str) -> Option<&'a Declaration> {
    declarations
        .iter()
        .find(|d| d.full_name == query)
        .or_else(|| {
            if query.contains(SCOPE_SEPARATOR) {
                None
            } else {
                declarations.iter().find(|d| d.name == query)
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{DeclarationKind, Parser};

    const THREE_USERS: &str = r#"class User
end

module Admin
  class User
  end
end

module Blog
  class User
  end
end
"#;

    #[test]
    fn test_bare_name_returns_first_in_document_order() {
        let index = Parser::new().parse(THREE_USERS);
        let user = index.find_class("User").unwrap();
        assert_eq!(user.full_name, "User");
        assert_eq!(user.line_number, 1);
    }

    #[test]
    fn test_qualified_names_resolve_to_their_namespace() {
        let index = Parser::new().parse(THREE_USERS);
        assert_eq!(index.find_class("Admin::User").unwrap().line_number, 5);
        assert_eq!(index.find_class("Blog::User").unwrap().line_number, 10);
    }

    #[test]
    fn test_unqualified_query_matches_namespaced_declaration() {
        let index = Parser::new().parse("module Admin\n  class Report\n  end\nend\n");
        assert_eq!(index.find_class("Report").unwrap().full_name, "Admin::Report");
    }

    #[test]
    fn test_qualified_query_never_matches_by_bare_name() {
        let index = Parser::new().parse("class Report\nend\n");
        assert!(index.find_class("Admin::Report").is_none());
    }

    #[test]
    fn test_bare_name_prefers_full_name_match() {
        // `Report` as a full name beats an earlier namespaced `Report`
        let index = DeclarationIndex::new(
            vec![
                Declaration::new(DeclarationKind::Class, "Report", vec!["Admin".into()], 2, 2, 3),
                Declaration::new(DeclarationKind::Class, "Report", vec![], 6, 0, 7),
            ],
            vec![],
            false,
        );
        assert_eq!(index.find_class("Report").unwrap().line_number, 6);
    }

    #[test]
    fn test_find_module_is_separate_from_classes() {
        let index = Parser::new().parse("module Notifications\nend\n");
        assert!(index.find_class("Notifications").is_none());
        assert_eq!(
            index.find_module("Notifications").unwrap().kind,
            DeclarationKind::Module
        );
    }

    #[test]
    fn test_degraded_index_is_empty() {
        let index = DeclarationIndex::degraded();
        assert!(index.is_empty());
        assert!(index.is_degraded());
        assert!(index.class_names().is_empty());
    }
}
