use crate::crawl::CrawlOptions;
use crate::index::types::UpdatePolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const APP_NAME: &str = "flocate";
const CONFIG_FILE: &str = "config.json";
const DATABASE_FILE: &str = "flocate.db";

/// Application configuration stored in the app data directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Crawl worker threads
    /// If 0, picked from the available CPUs
    #[serde(default)]
    pub crawl_threads: usize,

    /// Descend into symlinked directories while crawling
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Maximum symlink hops from a root when following links
    #[serde(default = "default_max_link_depth")]
    pub max_link_depth: u32,

    /// Directory names recorded but never descended
    #[serde(default = "default_prune_names")]
    pub prune_names: Vec<String>,

    /// Absolute path globs recorded but never descended
    #[serde(default = "default_prune_paths")]
    pub prune_paths: Vec<String>,

    /// Roots indexed when none are given on the command line.
    /// Empty means the platform defaults from [`default_roots`].
    #[serde(default)]
    pub default_roots: Vec<PathBuf>,

    /// Database location; `None` uses the app data directory
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    #[serde(default)]
    pub update_policy: UpdatePolicy,
}

fn default_max_link_depth() -> u32 {
    8
}

fn default_prune_names() -> Vec<String> {
    vec![".git".to_string(), ".hg".to_string(), ".svn".to_string()]
}

fn default_prune_paths() -> Vec<String> {
    if cfg!(target_os = "linux") {
        ["/proc", "/sys", "/dev", "/run"]
            .iter()
            .map(|p| p.to_string())
            .collect()
    } else {
        Vec::new()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            crawl_threads: 0,
            follow_symlinks: false,
            max_link_depth: default_max_link_depth(),
            prune_names: default_prune_names(),
            prune_paths: default_prune_paths(),
            default_roots: Vec::new(),
            database_path: None,
            update_policy: UpdatePolicy::default(),
        }
    }
}

impl AppConfig {
    /// Load config from the app data directory, or return default if not found
    pub fn load() -> Result<Self> {
        let config_path = get_config_path()?;

        if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            let config: AppConfig = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Crawl options for the engine; cancellation is left to the caller
    pub fn crawl_options(&self) -> CrawlOptions {
        CrawlOptions {
            threads: self.crawl_threads,
            follow_symlinks: self.follow_symlinks,
            max_link_depth: self.max_link_depth,
            prune_names: self.prune_names.clone(),
            prune_paths: self.prune_paths.clone(),
            cancel: None,
        }
    }

    /// Configured database path, or the default one
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => default_database_path(),
        }
    }

    /// Configured roots, or the platform defaults; missing ones are dropped
    pub fn roots(&self) -> Vec<PathBuf> {
        if self.default_roots.is_empty() {
            default_roots()
        } else {
            self.default_roots
                .iter()
                .filter(|p| p.exists())
                .cloned()
                .collect()
        }
    }
}

/// Home directory plus the usual system trees that exist on this host
pub fn default_roots() -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = dirs::home_dir().into_iter().collect();

    if std::env::var_os("TERMUX_VERSION").is_some() {
        roots.push(PathBuf::from("/data/data/com.termux/files/usr"));
    } else if cfg!(unix) {
        roots.extend(["/usr", "/opt", "/var"].iter().map(PathBuf::from));
    }

    roots.retain(|p| p.exists());
    roots
}

/// Get the path to the config file
pub fn get_config_path() -> Result<PathBuf> {
    let app_dir = get_app_data_dir()?;
    Ok(app_dir.join(CONFIG_FILE))
}

/// Database used when none is configured or given
pub fn default_database_path() -> Result<PathBuf> {
    Ok(get_app_data_dir()?.join(DATABASE_FILE))
}

/// Get the application data directory for the config and the default database
pub fn get_app_data_dir() -> Result<PathBuf> {
    let base = if cfg!(target_os = "macos") {
        dirs::home_dir()
            .map(|h| h.join("Library").join("Application Support"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
    } else {
        // Linux/Unix: use XDG_DATA_HOME or ~/.local/share
        dirs::data_dir()
    };

    let base = base.context("Could not determine app data directory")?;
    let app_dir = base.join(APP_NAME);

    fs::create_dir_all(&app_dir)
        .with_context(|| format!("Failed to create {}", app_dir.display()))?;
    Ok(app_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.crawl_threads, 0);
        assert!(!config.follow_symlinks);
        assert_eq!(config.max_link_depth, 8);
        assert!(config.prune_names.contains(&".git".to_string()));
        assert_eq!(config.update_policy, UpdatePolicy::Replace);
    }

    #[test]
    fn test_app_config_serialization() {
        let config = AppConfig {
            crawl_threads: 4,
            follow_symlinks: true,
            update_policy: UpdatePolicy::Merge,
            database_path: Some(PathBuf::from("/tmp/x.db")),
            ..Default::default()
        };

        let json = serde_json::to_string(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_app_config_partial_json() {
        // Should use defaults for missing fields
        let json = r#"{"follow_symlinks": true, "update_policy": "merge"}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();

        assert!(config.follow_symlinks);
        assert_eq!(config.update_policy, UpdatePolicy::Merge);
        assert_eq!(config.max_link_depth, 8); // default
        assert_eq!(config.prune_names, default_prune_names());
    }

    #[test]
    fn test_app_config_empty_json() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_crawl_options_follow_config() {
        let config = AppConfig {
            crawl_threads: 3,
            max_link_depth: 2,
            prune_names: vec!["node_modules".to_string()],
            ..Default::default()
        };
        let options = config.crawl_options();
        assert_eq!(options.threads, 3);
        assert_eq!(options.max_link_depth, 2);
        assert_eq!(options.prune_names, vec!["node_modules".to_string()]);
        assert!(options.cancel.is_none());
    }

    #[test]
    fn test_configured_roots_drop_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            default_roots: vec![dir.path().to_path_buf(), dir.path().join("missing")],
            ..Default::default()
        };
        assert_eq!(config.roots(), vec![dir.path().to_path_buf()]);
    }
}
