use anyhow::Result;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable pointing at an alternative config file
pub const CONFIG_ENV: &str = "SAMVEDANA_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub images: ImageConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Endpoints of the automation and media services
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the automation service (no trailing slash)
    pub base_url: String,
    pub create_event_path: String,
    /// Drafts are fetched with a GET on this path
    pub drafts_path: String,
    pub publish_path: String,
    pub history_url: String,
    pub media_upload_url: String,
    pub timeout_secs: u64,
    pub publish_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://automation.mysamvedana.org".to_string(),
            create_event_path: "/webhook/create-event".to_string(),
            drafts_path: "/webhook/create-event".to_string(),
            publish_path: "/webhook/publish".to_string(),
            history_url: "https://automation.mysamvedana.org/webhook/webhook/history".to_string(),
            media_upload_url: "https://media.mysamvedana.org/api/upload-event-images".to_string(),
            timeout_secs: 180,
            publish_timeout_secs: 120,
        }
    }
}

impl ApiConfig {
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }
}

/// Limits applied when images are selected for a new event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub max_count: usize,
    pub max_bytes: u64,
    pub allowed_types: Vec<String>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_count: 5,
            max_bytes: 5 * 1024 * 1024,
            allowed_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/webp".to_string(),
            ],
        }
    }
}

/// Identity directory (Firestore `Authority` collection)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub project_id: Option<String>,
    pub api_key: Option<String>,
    pub collection: String,
    pub base_url: String,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            api_key: None,
            collection: "Authority".to_string(),
            base_url: "https://firestore.googleapis.com/v1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Where drafts and the session are kept (defaults to the platform data dir)
    pub data_dir: Option<PathBuf>,
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("org", "samvedana", "samvedana")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }

        let proj_dirs = project_dirs()?;
        let config_dir = proj_dirs.config_dir();
        std::fs::create_dir_all(config_dir)?;

        Ok(config_dir.join("config.toml"))
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Directory holding cached drafts and the saved session
    pub fn data_dir(&self) -> Result<PathBuf> {
        let dir = match &self.storage.data_dir {
            Some(dir) => dir.clone(),
            None => project_dirs()?.data_dir().to_path_buf(),
        };
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Set one value by its dotted key, e.g. `api.base_url`
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let optional = |v: &str| (!v.is_empty()).then(|| v.to_string());
        match key {
            "api.base_url" => self.api.base_url = value.to_string(),
            "api.create_event_path" => self.api.create_event_path = value.to_string(),
            "api.drafts_path" => self.api.drafts_path = value.to_string(),
            "api.publish_path" => self.api.publish_path = value.to_string(),
            "api.history_url" => self.api.history_url = value.to_string(),
            "api.media_upload_url" => self.api.media_upload_url = value.to_string(),
            "api.timeout_secs" => self.api.timeout_secs = value.parse()?,
            "api.publish_timeout_secs" => self.api.publish_timeout_secs = value.parse()?,
            "images.max_count" => self.images.max_count = value.parse()?,
            "images.max_bytes" => self.images.max_bytes = value.parse()?,
            "images.allowed_types" => {
                self.images.allowed_types = value
                    .split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            }
            "directory.project_id" => self.directory.project_id = optional(value),
            "directory.api_key" => self.directory.api_key = optional(value),
            "directory.collection" => self.directory.collection = value.to_string(),
            "directory.base_url" => self.directory.base_url = value.to_string(),
            "storage.data_dir" => self.storage.data_dir = optional(value).map(PathBuf::from),
            _ => anyhow::bail!("Unknown config key: {}. Valid keys: {}", key, KEYS.join(", ")),
        }
        Ok(())
    }

    /// Read one value by its dotted key; the API key is masked
    pub fn get_value(&self, key: &str) -> Result<String> {
        let value = match key {
            "api.base_url" => self.api.base_url.clone(),
            "api.create_event_path" => self.api.create_event_path.clone(),
            "api.drafts_path" => self.api.drafts_path.clone(),
            "api.publish_path" => self.api.publish_path.clone(),
            "api.history_url" => self.api.history_url.clone(),
            "api.media_upload_url" => self.api.media_upload_url.clone(),
            "api.timeout_secs" => self.api.timeout_secs.to_string(),
            "api.publish_timeout_secs" => self.api.publish_timeout_secs.to_string(),
            "images.max_count" => self.images.max_count.to_string(),
            "images.max_bytes" => self.images.max_bytes.to_string(),
            "images.allowed_types" => self.images.allowed_types.join(","),
            "directory.project_id" => self.directory.project_id.clone().unwrap_or_default(),
            "directory.api_key" => self.directory.api_key.as_ref().map(|_| "****").unwrap_or_default().to_string(),
            "directory.collection" => self.directory.collection.clone(),
            "directory.base_url" => self.directory.base_url.clone(),
            "storage.data_dir" => self
                .storage
                .data_dir
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_default(),
            _ => anyhow::bail!("Unknown config key: {}", key),
        };
        Ok(value)
    }
}

/// Every key accepted by `config set` and `config get`
pub const KEYS: [&str; 16] = [
    "api.base_url",
    "api.create_event_path",
    "api.drafts_path",
    "api.publish_path",
    "api.history_url",
    "api.media_upload_url",
    "api.timeout_secs",
    "api.publish_timeout_secs",
    "images.max_count",
    "images.max_bytes",
    "images.allowed_types",
    "directory.project_id",
    "directory.api_key",
    "directory.collection",
    "directory.base_url",
    "storage.data_dir",
];
