//! @acp:module "Configuration"
//! @acp:summary "Project configuration loading and defaults"
//! @acp:domain cli
//! @acp:layer config
//!
//! Reads `.annotaterb.yml` (YAML) or `.annotate.config.json` (JSON). Every
//! field has a default, so an empty file and a missing file behave the same.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::annotation::Position;
use crate::error::{AnnotateError, Result};

/// Config files tried, in order, when no path is given
pub const DEFAULT_CONFIG_FILES: [&str; 3] =
    [".annotaterb.yml", ".annotaterb.yaml", ".annotate.config.json"];

/// @acp:summary "Main configuration structure"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Writes are confined to this directory unless `allow_outside_root` is set
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Directories searched for model sources
    #[serde(default = "default_model_dirs")]
    pub model_dir: Vec<PathBuf>,

    /// Directories searched for mailer sources
    #[serde(default = "default_mailer_dirs")]
    pub mailer_dir: Vec<PathBuf>,

    #[serde(default = "default_routes_file")]
    pub routes_file: PathBuf,

    /// Line after which a fresh route map is inserted
    #[serde(default = "default_routes_anchor")]
    pub routes_anchor: String,

    #[serde(default = "default_schema_snapshot")]
    pub schema_snapshot: PathBuf,

    #[serde(default = "default_routes_snapshot")]
    pub routes_snapshot: PathBuf,

    #[serde(default = "default_mailer_snapshot")]
    pub mailer_snapshot: PathBuf,

    #[serde(default)]
    pub position: Position,

    #[serde(default)]
    pub allow_outside_root: bool,

    #[serde(default)]
    pub dry_run: bool,

    #[serde(default = "default_true")]
    pub show_indexes: bool,

    #[serde(default = "default_true")]
    pub show_foreign_keys: bool,

    #[serde(default = "default_true")]
    pub show_check_constraints: bool,

    /// Glob patterns (relative to root) never written to
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: default_root(),
            model_dir: default_model_dirs(),
            mailer_dir: default_mailer_dirs(),
            routes_file: default_routes_file(),
            routes_anchor: default_routes_anchor(),
            schema_snapshot: default_schema_snapshot(),
            routes_snapshot: default_routes_snapshot(),
            mailer_snapshot: default_mailer_snapshot(),
            position: Position::default(),
            allow_outside_root: false,
            dry_run: false,
            show_indexes: true,
            show_foreign_keys: true,
            show_check_constraints: true,
            exclude: default_exclude(),
        }
    }
}

impl Config {
    /// @acp:summary "Load config, choosing the format by file extension"
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        match path.extension().and_then(|e| e.to_str()) {
            Some("yml") | Some("yaml") => Ok(serde_yaml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            other => Err(AnnotateError::ConfigFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }

    /// @acp:summary "Save config, choosing the format by file extension"
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = match path.extension().and_then(|e| e.to_str()) {
            Some("yml") | Some("yaml") => serde_yaml::to_string(self)?,
            _ => serde_json::to_string_pretty(self)?,
        };
        std::fs::write(path, content)?;
        Ok(())
    }

    /// @acp:summary "Load the first default config file found, or defaults"
    pub fn discover(dir: &Path) -> Result<Self> {
        for name in DEFAULT_CONFIG_FILES {
            let candidate = dir.join(name);
            if candidate.is_file() {
                tracing::debug!("loading config from {}", candidate.display());
                return Self::load(candidate);
            }
        }
        Ok(Self::default())
    }

    pub fn load_or_default() -> Self {
        Self::discover(Path::new(".")).unwrap_or_default()
    }

    /// Resolve a configured path against `root`
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn model_dirs(&self) -> Vec<PathBuf> {
        self.model_dir.iter().map(|d| self.resolve(d)).collect()
    }

    pub fn mailer_dirs(&self) -> Vec<PathBuf> {
        self.mailer_dir.iter().map(|d| self.resolve(d)).collect()
    }

    pub fn routes_anchor(&self) -> Result<Regex> {
        Ok(Regex::new(&self.routes_anchor)?)
    }
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_model_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from("app/models")]
}

fn default_mailer_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from("app/mailers")]
}

fn default_routes_file() -> PathBuf {
    PathBuf::from("config/routes.rb")
}

fn default_routes_anchor() -> String {
    r"^\s*\S+\.routes\.draw\s+do\b".to_string()
}

fn default_schema_snapshot() -> PathBuf {
    PathBuf::from("tmp/annotate/schema.json")
}

fn default_routes_snapshot() -> PathBuf {
    PathBuf::from("tmp/annotate/routes.json")
}

fn default_mailer_snapshot() -> PathBuf {
    PathBuf::from("tmp/annotate/mailers.json")
}

fn default_true() -> bool {
    true
}

fn default_exclude() -> Vec<String> {
    vec![
        "vendor/**".to_string(),
        "node_modules/**".to_string(),
        "tmp/**".to_string(),
    ]
}
