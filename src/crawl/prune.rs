use crate::error::{Error, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use rustc_hash::FxHashSet;
use std::path::Path;

/// Directories that are recorded but never descended into.
///
/// `names` match a directory's base name exactly (`.git`, `node_modules`),
/// `paths` are globs over the absolute path where `*` stops at separators
/// (`/proc`, `/home/*/.cache`).
#[derive(Debug, Clone, Default)]
pub struct PruneRules {
    names: FxHashSet<String>,
    paths: Option<GlobSet>,
}

impl PruneRules {
    pub fn new(names: &[String], paths: &[String]) -> Result<Self> {
        let names = names.iter().cloned().collect();

        let paths = if paths.is_empty() {
            None
        } else {
            let mut builder = GlobSetBuilder::new();
            for pattern in paths {
                let glob = GlobBuilder::new(pattern)
                    .literal_separator(true)
                    .build()
                    .map_err(|e| Error::Pattern {
                        pattern: pattern.clone(),
                        reason: e.to_string(),
                    })?;
                builder.add(glob);
            }
            Some(builder.build().map_err(|e| Error::Pattern {
                pattern: paths.join(", "),
                reason: e.to_string(),
            })?)
        };

        Ok(Self { names, paths })
    }

    pub fn is_pruned(&self, path: &Path) -> bool {
        if !self.names.is_empty() {
            if let Some(name) = path.file_name() {
                if self.names.contains(name.to_string_lossy().as_ref()) {
                    return true;
                }
            }
        }

        match &self.paths {
            Some(set) => set.is_match(path),
            None => false,
        }
    }
}
