use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "EagleSync";
const APP_NAME: &str = "eagle-sync";

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:41595";
pub const DEFAULT_FOLDER_FIELD: &str = "eagle_folder_id";

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn with_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            default_cfg.post_load();
            self.save(&default_cfg)?;
            return Ok(default_cfg);
        }

        self.load()
    }

    /// Reads the settings file; keys missing from it keep their defaults.
    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load();
        Ok(cfg)
    }

    pub fn save(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes()).context("writing config")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub log_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var("EAGLE_SYNC_CONFIG").ok().map(PathBuf::from);

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let state_dir = project_dirs
            .state_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| project_dirs.data_dir().join("state"));
        let log_dir = state_dir.join("logs");

        Ok(Self {
            config_dir,
            config_file,
            log_dir,
            state_dir,
        })
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.config_dir,
            &self.log_dir,
            &self.state_dir,
        ] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Free-text label shown in the status bar.
    pub label: String,
    pub api_base_url: String,
    pub api_token: String,
    /// Metadata key holding the Eagle folder id in a note.
    pub folder_field: String,
    pub gallery: GalleryOptions,
    pub http: HttpOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            label: "default".into(),
            api_base_url: DEFAULT_API_BASE_URL.into(),
            api_token: String::new(),
            folder_field: DEFAULT_FOLDER_FIELD.into(),
            gallery: GalleryOptions::default(),
            http: HttpOptions::default(),
        }
    }
}

impl AppConfig {
    fn post_load(&mut self) {
        if self.api_base_url.trim().is_empty() {
            tracing::warn!("empty api_base_url in config, falling back to {DEFAULT_API_BASE_URL}");
            self.api_base_url = DEFAULT_API_BASE_URL.into();
        }
        if self.folder_field.trim().is_empty() {
            tracing::warn!("empty folder_field in config, falling back to {DEFAULT_FOLDER_FIELD}");
            self.folder_field = DEFAULT_FOLDER_FIELD.into();
        }
        self.gallery.clamp();
    }

    pub fn redacted_token(&self) -> &str {
        if self.api_token.is_empty() {
            "<unset>"
        } else {
            "<redacted>"
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryOptions {
    /// Target tile height in pixels before shrinking.
    pub row_height: f32,
    pub shrink_factor: f32,
    pub thumbnail_workers: usize,
    /// Pixel width of one terminal cell, used to map tile widths onto columns.
    pub cell_width_px: f32,
}

impl Default for GalleryOptions {
    fn default() -> Self {
        Self {
            row_height: 128.0,
            shrink_factor: 0.8,
            thumbnail_workers: 4,
            cell_width_px: 8.0,
        }
    }
}

impl GalleryOptions {
    fn clamp(&mut self) {
        let defaults = Self::default();
        if !(self.row_height.is_finite() && self.row_height > 0.0) {
            self.row_height = defaults.row_height;
        }
        if !(self.shrink_factor.is_finite() && self.shrink_factor > 0.0) {
            self.shrink_factor = defaults.shrink_factor;
        }
        if !(self.cell_width_px.is_finite() && self.cell_width_px >= 1.0) {
            self.cell_width_px = defaults.cell_width_px;
        }
        self.thumbnail_workers = self.thumbnail_workers.clamp(1, 32);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpOptions {
    pub timeout_secs: u64,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl HttpOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_paths(root: &TempDir) -> ConfigPaths {
        let base = root.path();
        ConfigPaths {
            config_dir: base.join("config"),
            config_file: base.join("config/config.toml"),
            log_dir: base.join("state/logs"),
            state_dir: base.join("state"),
        }
    }

    #[test]
    fn first_run_writes_defaults() -> Result<()> {
        let temp = TempDir::new()?;
        let loader = ConfigLoader::with_paths(temp_paths(&temp));
        let cfg = loader.load_or_init()?;
        assert_eq!(cfg.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(cfg.folder_field, DEFAULT_FOLDER_FIELD);
        assert!(loader.paths().config_file.exists());
        Ok(())
    }

    #[test]
    fn ensure_directories_creates_config_and_log_dirs() -> Result<()> {
        let temp = TempDir::new()?;
        let paths = temp_paths(&temp);
        paths.ensure_directories()?;
        assert!(paths.config_dir.is_dir());
        assert!(paths.log_dir.is_dir());
        let mut created: Vec<_> = fs::read_dir(temp.path())?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        created.sort();
        assert_eq!(created, vec!["config", "state"]);
        Ok(())
    }

    #[test]
    fn saved_values_merge_over_defaults() -> Result<()> {
        let temp = TempDir::new()?;
        let paths = temp_paths(&temp);
        paths.ensure_directories()?;
        fs::write(
            &paths.config_file,
            "api_token = \"abc\"\n\n[gallery]\nthumbnail_workers = 0\n",
        )?;
        let cfg = ConfigLoader::with_paths(paths).load()?;
        assert_eq!(cfg.api_token, "abc");
        assert_eq!(cfg.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(cfg.gallery.row_height, 128.0);
        assert_eq!(cfg.gallery.thumbnail_workers, 1);
        assert_eq!(cfg.redacted_token(), "<redacted>");
        Ok(())
    }

    #[test]
    fn blank_fields_fall_back() -> Result<()> {
        let temp = TempDir::new()?;
        let paths = temp_paths(&temp);
        paths.ensure_directories()?;
        fs::write(&paths.config_file, "api_base_url = \"\"\nfolder_field = \" \"\n")?;
        let cfg = ConfigLoader::with_paths(paths).load()?;
        assert_eq!(cfg.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(cfg.folder_field, DEFAULT_FOLDER_FIELD);
        Ok(())
    }
}
