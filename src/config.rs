/// Application configuration and directory resolution
///
/// The data root is resolved in priority order:
/// 1. `HAVEN_DATA_DIR` environment variable
/// 2. OS data directory (`~/.local/share/haven` on Linux)
/// 3. Home directory fallback (`~/haven`)
///
/// An optional `config.json` inside the data root overrides the bundled demo
/// asset directory and the renderer readiness retry policy.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{HavenError, Result};
use crate::state::placement::RetryPolicy;

/// Environment variable that overrides the data root
pub const DATA_DIR_ENV: &str = "HAVEN_DATA_DIR";

/// Name of the optional overrides file inside the data root
const CONFIG_FILE_NAME: &str = "config.json";

/// Resolved runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of all persisted state
    pub data_dir: PathBuf,
    /// Persistent document directory holding captured and demo images
    pub documents_dir: PathBuf,
    /// SQLite file backing the key-value store
    pub db_path: PathBuf,
    /// Cache directory for 256px thumbnails
    pub thumbnail_dir: PathBuf,
    /// Scratch frames written by the desktop scene preview
    pub scene_dir: PathBuf,
    /// Where the bundled demo images live (greg-*.jpg, sera-*.jpg)
    pub demo_asset_dir: PathBuf,
    /// How long to wait for the scene renderer to become ready
    pub renderer_retry: RetryPolicy,
    /// Drop project image references whose file is gone at startup
    pub prune_missing_images: bool,
}

/// Overrides read from `config.json`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    demo_asset_dir: Option<PathBuf>,
    renderer_max_attempts: Option<u32>,
    renderer_base_delay_ms: Option<u64>,
    renderer_max_delay_ms: Option<u64>,
    prune_missing_images: Option<bool>,
}

impl Config {
    /// Resolve configuration from the environment and the platform directories
    pub fn resolve() -> Result<Self> {
        let data_dir = match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .map(|d| d.join("haven"))
                .or_else(|| dirs::home_dir().map(|d| d.join("haven")))
                .ok_or_else(|| {
                    HavenError::Config("Could not determine user data directory".to_string())
                })?,
        };

        let thumbnail_dir = dirs::cache_dir()
            .map(|d| d.join("haven").join("thumbnails"))
            .unwrap_or_else(|| data_dir.join("thumbnails"));

        let mut config = Self::for_root(&data_dir);
        config.thumbnail_dir = thumbnail_dir;
        config.apply_file()?;
        Ok(config)
    }

    /// Configuration rooted at an explicit directory (used by tests and the env override)
    pub fn for_root(root: &Path) -> Self {
        Self {
            data_dir: root.to_path_buf(),
            documents_dir: root.join("documents"),
            db_path: root.join("haven.db"),
            thumbnail_dir: root.join("thumbnails"),
            scene_dir: root.join("scene"),
            demo_asset_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR"))
                .join("assets")
                .join("demo"),
            renderer_retry: RetryPolicy::default(),
            prune_missing_images: false,
        }
    }

    /// Create every directory the app writes into
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.documents_dir)?;
        std::fs::create_dir_all(&self.thumbnail_dir)?;
        std::fs::create_dir_all(&self.scene_dir)?;
        Ok(())
    }

    /// Merge `config.json` overrides when the file exists
    fn apply_file(&mut self) -> Result<()> {
        let path = self.data_dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(());
        }

        let contents = std::fs::read_to_string(&path)?;
        let file: ConfigFile = serde_json::from_str(&contents)
            .map_err(|e| HavenError::Config(format!("{}: {}", path.display(), e)))?;

        if let Some(dir) = file.demo_asset_dir {
            self.demo_asset_dir = dir;
        }
        if let Some(attempts) = file.renderer_max_attempts {
            self.renderer_retry.max_attempts = attempts.max(1);
        }
        if let Some(ms) = file.renderer_base_delay_ms {
            self.renderer_retry.base_delay_ms = ms;
        }
        if let Some(ms) = file.renderer_max_delay_ms {
            self.renderer_retry.max_delay_ms = ms;
        }
        if let Some(prune) = file.prune_missing_images {
            self.prune_missing_images = prune;
        }

        tracing::info!("⚙️  Loaded overrides from {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_root_layout() {
        let root = Path::new("/tmp/haven-root");
        let config = Config::for_root(root);
        assert_eq!(config.documents_dir, root.join("documents"));
        assert_eq!(config.db_path, root.join("haven.db"));
    }

    #[test]
    fn test_config_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{"demoAssetDir": "/opt/demo", "rendererMaxAttempts": 0, "rendererMaxDelayMs": 50, "pruneMissingImages": true}"#,
        )
        .unwrap();

        let mut config = Config::for_root(dir.path());
        config.apply_file().unwrap();

        assert_eq!(config.demo_asset_dir, PathBuf::from("/opt/demo"));
        // Zero attempts would never poll the renderer at all
        assert_eq!(config.renderer_retry.max_attempts, 1);
        assert_eq!(config.renderer_retry.max_delay_ms, 50);
        assert!(config.prune_missing_images);
    }

    #[test]
    fn test_malformed_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "{ not json").unwrap();

        let mut config = Config::for_root(dir.path());
        assert!(matches!(config.apply_file(), Err(HavenError::Config(_))));
    }
}
