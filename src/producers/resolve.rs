//! @acp:module "Path Resolution"
//! @acp:summary "Entity name to source file, via known location, convention or scan"
//! @acp:domain producers
//! @acp:layer utility

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, OnceLock};

use rayon::prelude::*;
use regex::Regex;
use walkdir::WalkDir;

use crate::annotation::insert::looks_like_ruby;
use crate::parse::Parser;

static ACRONYM_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z\d]+)([A-Z][a-z])").unwrap());
static WORD_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z\d])([A-Z])").unwrap());

/// `Admin::HTMLPage` becomes `admin/html_page`
pub fn underscore(name: &str) -> String {
    let path = name.replace("::", "/");
    let path = ACRONYM_BOUNDARY.replace_all(&path, "${1}_${2}");
    let path = WORD_BOUNDARY.replace_all(&path, "${1}_${2}");
    path.replace('-', "_").to_lowercase()
}

/// @acp:summary "Finds the file that declares an entity"
///
/// Resolution order: the location the exporter recorded, the conventional
/// `<dir>/<underscored name>.rb`, then a scan of every Ruby file under the
/// search directories. The scan runs at most once, on first need.
pub struct PathResolver {
    root: PathBuf,
    dirs: Vec<PathBuf>,
    scanned: OnceLock<HashMap<String, PathBuf>>,
}

impl PathResolver {
    pub fn new(root: impl Into<PathBuf>, dirs: Vec<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dirs,
            scanned: OnceLock::new(),
        }
    }

    pub fn resolve(&self, name: &str, known: Option<&Path>) -> Option<PathBuf> {
        if let Some(known) = known {
            let candidate = if known.is_absolute() {
                known.to_path_buf()
            } else {
                self.root.join(known)
            };
            if candidate.is_file() {
                return Some(candidate);
            }
            tracing::debug!("{}: recorded location {} is gone", name, candidate.display());
        }

        let relative = format!("{}.rb", underscore(name));
        if let Some(conventional) = self
            .dirs
            .iter()
            .map(|dir| dir.join(&relative))
            .find(|p| p.is_file())
        {
            return Some(conventional);
        }

        let found = self.declarations().get(name).cloned();
        if found.is_none() {
            tracing::debug!("{}: no source file found", name);
        }
        found
    }

    /// Every Ruby file under the search directories, in sorted order
    pub fn source_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self
            .dirs
            .iter()
            .flat_map(|dir| {
                WalkDir::new(dir)
                    .follow_links(false)
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                    .map(|e| e.into_path())
                    .filter(|p| looks_like_ruby(p))
            })
            .collect();
        files.sort();
        files.dedup();
        files
    }

    fn declarations(&self) -> &HashMap<String, PathBuf> {
        self.scanned.get_or_init(|| self.scan())
    }

    fn scan(&self) -> HashMap<String, PathBuf> {
        let files = self.source_files();
        let parsed: Vec<(PathBuf, Vec<String>)> = files
            .into_par_iter()
            .map(|path| {
                let index = Parser::new().parse_file(&path);
                let names = index
                    .classes()
                    .iter()
                    .chain(index.modules())
                    .map(|d| d.full_name.clone())
                    .collect();
                (path, names)
            })
            .collect();

        // First file in path order wins
        let mut map = HashMap::new();
        for (path, names) in parsed {
            for name in names {
                map.entry(name).or_insert_with(|| path.clone());
            }
        }
        tracing::debug!("scanned {} declarations", map.len());
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, rel: &str, content: &str) -> PathBuf {
        let path = dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_underscore() {
        assert_eq!(underscore("User"), "user");
        assert_eq!(underscore("UserProfile"), "user_profile");
        assert_eq!(underscore("Admin::UserProfile"), "admin/user_profile");
        assert_eq!(underscore("HTMLPage"), "html_page");
        assert_eq!(underscore("OAuth2Token"), "o_auth2_token");
    }

    #[test]
    fn test_known_location_first() {
        let dir = TempDir::new().unwrap();
        let odd = write(&dir, "lib/legacy/people.rb", "class User\nend\n");
        write(&dir, "app/models/user.rb", "class User\nend\n");

        let resolver = PathResolver::new(dir.path(), vec![dir.path().join("app/models")]);
        assert_eq!(resolver.resolve("User", Some(Path::new("lib/legacy/people.rb"))), Some(odd));
    }

    #[test]
    fn test_conventional_path() {
        let dir = TempDir::new().unwrap();
        let expected = write(&dir, "app/models/admin/user_profile.rb", "module Admin\n  class UserProfile\n  end\nend\n");

        let resolver = PathResolver::new(dir.path(), vec![dir.path().join("app/models")]);
        assert_eq!(resolver.resolve("Admin::UserProfile", None), Some(expected.clone()));
        assert_eq!(
            resolver.resolve("Admin::UserProfile", Some(Path::new("gone.rb"))),
            Some(expected)
        );
    }

    #[test]
    fn test_scan_fallback() {
        let dir = TempDir::new().unwrap();
        let shapes = write(&dir, "app/models/shapes.rb", "class Circle\nend\n\nclass Square\nend\n");

        let resolver = PathResolver::new(dir.path(), vec![dir.path().join("app/models")]);
        assert_eq!(resolver.resolve("Square", None), Some(shapes));
    }

    #[test]
    fn test_unresolvable_is_none() {
        let dir = TempDir::new().unwrap();
        let resolver = PathResolver::new(dir.path(), vec![dir.path().join("app/models")]);
        assert_eq!(resolver.resolve("Ghost", None), None);
    }

    #[test]
    fn test_source_files_sorted_ruby_only() {
        let dir = TempDir::new().unwrap();
        write(&dir, "app/models/b.rb", "");
        write(&dir, "app/models/a.rb", "");
        write(&dir, "app/models/notes.txt", "");

        let resolver = PathResolver::new(dir.path(), vec![dir.path().join("app/models")]);
        let names: Vec<_> = resolver
            .source_files()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.rb", "b.rb"]);
    }
}
