//! Configuration for talkmark.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (TALKMARK_CONFIG, TALKMARK_API, TALKMARK_USER)
//! 2. Config file (.talkmark/config.yaml)
//! 3. Defaults
//!
//! Config file discovery:
//! - `TALKMARK_CONFIG` names the file directly
//! - Otherwise searches current directory and parents for .talkmark/config.yaml
//! - Falls back to ~/.talkmark/config.yaml
//!
//! The engine itself never reads this; callers pass an [`EngineConfig`] in.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::engine::{DiffConfig, ExtractorConfig, FingerprintConfig, MatcherConfig, ReconcilerConfig};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Settings for every engine component
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub fingerprint: FingerprintConfig,
    #[serde(default)]
    pub matcher: MatcherConfig,
    #[serde(default)]
    pub diff: DiffConfig,
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
}

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub api: Option<ApiConfig>,
    /// User name treated as "own" when classifying comments
    #[serde(default)]
    pub current_user: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// MediaWiki api.php endpoint
    pub endpoint: String,
    pub user_agent: Option<String>,
}

/// Resolved configuration
#[derive(Debug, Clone, Default)]
pub struct ResolvedConfig {
    pub engine: EngineConfig,
    pub api_endpoint: Option<String>,
    pub user_agent: Option<String>,
    pub current_user: Option<String>,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("TALKMARK_CONFIG") {
        return Some(PathBuf::from(path));
    }

    let mut current = std::env::current_dir().ok()?;
    loop {
        let config_path = current.join(".talkmark").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    dirs::home_dir()
        .map(|home| home.join(".talkmark").join("config.yaml"))
        .filter(|path| path.exists())
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Merge a parsed file (if any) with environment overrides
fn resolve(file: Option<ConfigFile>, config_file: Option<PathBuf>) -> ResolvedConfig {
    let (engine, api, current_user) = match file {
        Some(file) => (file.engine, file.api, file.current_user),
        None => (EngineConfig::default(), None, None),
    };

    let api_endpoint = std::env::var("TALKMARK_API")
        .ok()
        .or_else(|| api.as_ref().map(|a| a.endpoint.clone()));
    let current_user = std::env::var("TALKMARK_USER").ok().or(current_user);

    ResolvedConfig {
        engine,
        api_endpoint,
        user_agent: api.and_then(|a| a.user_agent),
        current_user,
        config_file,
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let config_file = find_config_file();
    let file = match config_file {
        Some(ref path) => Some(load_config_file(path)?),
        None => None,
    };

    Ok(resolve(file, config_file))
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let config_dir = temp.path().join(".talkmark");
        std::fs::create_dir_all(&config_dir).unwrap();

        let config_path = config_dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1.0"
current_user: Alice
api:
  endpoint: https://en.wikipedia.org/w/api.php
engine:
  matcher:
    threshold: 3.0
  extractor:
    user_namespaces: ["User", "Benutzer"]
  reconciler:
    tolerance_seconds: 90
"#
        )
        .unwrap();

        let config = load_config_file(&config_path).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.current_user.as_deref(), Some("Alice"));
        assert_eq!(config.engine.matcher.threshold, 3.0);
        // Unspecified weights keep their defaults
        assert_eq!(config.engine.matcher.position_weight, 2.0);
        assert_eq!(config.engine.extractor.user_namespaces, vec!["User", "Benutzer"]);
        assert_eq!(config.engine.extractor.max_signature_length, 255);
        assert_eq!(config.engine.reconciler.tolerance_seconds, 90);
        assert_eq!(
            config.api.unwrap().endpoint,
            "https://en.wikipedia.org/w/api.php"
        );
    }

    #[test]
    fn test_defaults_without_file() {
        let config = resolve(None, None);
        assert!(config.config_file.is_none());
        assert_eq!(config.engine.matcher.threshold, crate::engine::MATCH_THRESHOLD);
        assert_eq!(config.engine.diff.rerender_below, 1.0);
    }

    #[test]
    fn test_invalid_yaml_reports_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "version: [unclosed").unwrap();
        let err = load_config_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
