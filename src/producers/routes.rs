//! @acp:module "Routes Producer"
//! @acp:summary "Route table rendered as an aligned comment in the routes file"
//! @acp:domain producers
//! @acp:layer service

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{load_snapshot, MetadataProducer};
use crate::annotation::{AnnotationTarget, MarkerTag};
use crate::error::Result;

/// @acp:summary "One row of the application's route table"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEntry {
    /// Named-route prefix; empty for unnamed routes
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub verb: String,
    pub path: String,
    /// `controller#action`, or the mounted application
    pub reqs: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutesSnapshot {
    pub routes: Vec<RouteEntry>,
}

/// @acp:summary "Produces the single route map target for the routes file"
pub struct RoutesProducer {
    routes: Vec<RouteEntry>,
    file: PathBuf,
    anchor: Regex,
}

impl RoutesProducer {
    pub fn new(routes: Vec<RouteEntry>, file: impl Into<PathBuf>, anchor: Regex) -> Self {
        Self {
            routes,
            file: file.into(),
            anchor,
        }
    }

    pub fn from_snapshot(snapshot: &Path, file: impl Into<PathBuf>, anchor: Regex) -> Result<Self> {
        let snapshot: RoutesSnapshot = load_snapshot(snapshot)?;
        Ok(Self::new(snapshot.routes, file, anchor))
    }

    pub fn render(&self) -> String {
        let header = RouteEntry {
            prefix: "Prefix".to_string(),
            verb: "Verb".to_string(),
            path: "URI Pattern".to_string(),
            reqs: "Controller#Action".to_string(),
        };
        let rows: Vec<&RouteEntry> = std::iter::once(&header).chain(&self.routes).collect();

        let prefix_width = rows.iter().map(|r| r.prefix.len()).max().unwrap_or(0);
        let verb_width = rows.iter().map(|r| r.verb.len()).max().unwrap_or(0);
        let path_width = rows.iter().map(|r| r.path.len()).max().unwrap_or(0);

        let mut lines = vec!["== Route Map".to_string(), String::new()];
        lines.extend(rows.iter().map(|row| {
            format!(
                "{:>pw$} {:<vw$} {:<uw$} {}",
                row.prefix,
                row.verb,
                row.path,
                row.reqs,
                pw = prefix_width,
                vw = verb_width,
                uw = path_width,
            )
            .trim_end()
            .to_string()
        }));
        lines.join("\n")
    }
}

impl MetadataProducer for RoutesProducer {
    fn tag(&self) -> MarkerTag {
        MarkerTag::Routes
    }

    fn produce(&self) -> Vec<Result<AnnotationTarget>> {
        vec![Ok(AnnotationTarget::for_pattern(
            "routes",
            Some(self.file.clone()),
            self.anchor.clone(),
            MarkerTag::Routes,
            self.render(),
        ))]
    }
}
