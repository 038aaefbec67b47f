//! Administrator sessions: directory lookup, login/logout and the saved session file.

use async_trait::async_trait;
use serde::Deserialize;
use shared::{DirectoryRecord, User};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::DirectoryConfig;
use crate::error::{ConsoleError, Result};

const SESSION_FILE: &str = "samvedana_admin_user.json";
const DIRECTORY_TIMEOUT: Duration = Duration::from_secs(30);

pub const INVALID_CREDENTIALS: &str = "Invalid mobile number or password";
pub const ACCESS_DENIED: &str = "Access denied. Administrator role required.";
pub const LOGIN_FAILED: &str = "Login failed. Please try again.";
pub const NOT_CONFIGURED: &str = "Directory is not configured. Please check your configuration.";

/// Source of administrator records, keyed by mobile number
#[async_trait]
pub trait Directory: Send + Sync {
    fn is_configured(&self) -> bool;

    /// `Ok(None)` when no record exists for `mobile`
    async fn lookup(&self, mobile: &str) -> Result<Option<DirectoryRecord>>;
}

// ============================================================================
// Firestore REST directory
// ============================================================================

#[derive(Debug, Deserialize)]
struct FirestoreDocument {
    #[serde(default)]
    fields: BTreeMap<String, FirestoreValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FirestoreValue {
    string_value: Option<String>,
    integer_value: Option<String>,
    double_value: Option<f64>,
    boolean_value: Option<bool>,
}

impl FirestoreValue {
    fn as_text(&self) -> Option<String> {
        self.string_value
            .clone()
            .or_else(|| self.integer_value.clone())
            .or_else(|| self.double_value.map(|v| v.to_string()))
            .or_else(|| self.boolean_value.map(|v| v.to_string()))
    }
}

impl FirestoreDocument {
    fn text(&self, key: &str) -> String {
        self.fields.get(key).and_then(FirestoreValue::as_text).unwrap_or_default()
    }

    fn into_record(self) -> DirectoryRecord {
        DirectoryRecord {
            mobile_number: self.text("mobile_number"),
            name: self.text("name"),
            password: self.text("password"),
            role: self.text("role"),
        }
    }
}

/// Reads `<collection>/<mobile>` documents through the Firestore REST API
#[derive(Debug, Clone)]
pub struct FirestoreDirectory {
    client: reqwest::Client,
    config: DirectoryConfig,
}

impl FirestoreDirectory {
    pub fn new(config: DirectoryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DIRECTORY_TIMEOUT)
            .build()
            .map_err(|e| ConsoleError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn project_id(&self) -> Option<&str> {
        self.config
            .project_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    fn document_url(&self, mobile: &str) -> Result<reqwest::Url> {
        let project = self
            .project_id()
            .ok_or_else(|| ConsoleError::Auth(NOT_CONFIGURED.to_string()))?;
        let mut url = reqwest::Url::parse(&self.config.base_url)
            .map_err(|e| ConsoleError::Config(format!("invalid directory URL {}: {}", self.config.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ConsoleError::Config(format!("invalid directory URL {}", self.config.base_url)))?
            .pop_if_empty()
            .extend([
                "projects",
                project,
                "databases",
                "(default)",
                "documents",
                self.config.collection.as_str(),
                mobile,
            ]);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            url.query_pairs_mut().append_pair("key", key);
        }
        Ok(url)
    }
}

#[async_trait]
impl Directory for FirestoreDirectory {
    fn is_configured(&self) -> bool {
        self.project_id().is_some()
    }

    async fn lookup(&self, mobile: &str) -> Result<Option<DirectoryRecord>> {
        let url = self.document_url(mobile)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ConsoleError::remote(format!("Network error: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let text = response
            .text()
            .await
            .map_err(|e| ConsoleError::remote(format!("Network error: {}", e)))?;
        if !status.is_success() {
            return Err(ConsoleError::Remote {
                message: format!("HTTP {}: {}", status.as_u16(), status.canonical_reason().unwrap_or("Unknown")),
                status: Some(status.as_u16()),
                body: serde_json::from_str(&text).ok(),
            });
        }

        let document: FirestoreDocument = serde_json::from_str(&text)?;
        Ok(Some(document.into_record()))
    }
}

// ============================================================================
// Saved session
// ============================================================================

/// The signed-in user, kept as JSON in the data directory
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(SESSION_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<User>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, user: &User) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(user)?)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Session holder
// ============================================================================

/// Current user plus the loading/error state of the last login attempt
pub struct Session<D> {
    directory: D,
    store: SessionStore,
    user: Option<User>,
    loading: bool,
    error: Option<String>,
}

impl<D: Directory> Session<D> {
    pub fn new(directory: D, store: SessionStore) -> Self {
        Self {
            directory,
            store,
            user: None,
            loading: true,
            error: None,
        }
    }

    /// Restore a saved session. An unreadable or non-administrator file is deleted.
    pub fn init(&mut self) {
        self.loading = true;
        match self.store.load() {
            Ok(Some(user)) if user.is_administrator() => {
                tracing::debug!("Restored session for {}", user.mobile_number);
                self.user = Some(user);
            }
            Ok(Some(user)) => {
                tracing::warn!("Discarding saved session with role {:?}", user.role);
                self.discard_saved();
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("Discarding unreadable session {:?}: {}", self.store.path(), e);
                self.discard_saved();
            }
        }
        self.loading = false;
    }

    fn discard_saved(&mut self) {
        if let Err(e) = self.store.clear() {
            tracing::warn!("Failed to remove session file: {}", e);
        }
        self.user = None;
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Guard for commands that need a signed-in administrator
    pub fn require_user(&self) -> Result<&User> {
        self.user.as_ref().ok_or(ConsoleError::NotLoggedIn)
    }

    pub async fn login(&mut self, mobile: &str, password: &str) -> Result<User> {
        if !self.directory.is_configured() {
            self.error = Some(NOT_CONFIGURED.to_string());
            return Err(ConsoleError::Auth(NOT_CONFIGURED.to_string()));
        }

        self.loading = true;
        self.error = None;
        let outcome = self.authenticate(mobile.trim(), password).await;
        self.loading = false;

        match outcome {
            Ok(user) => {
                tracing::info!("Logged in as {}", user.creator_label());
                self.user = Some(user.clone());
                Ok(user)
            }
            Err(e) => {
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn authenticate(&self, mobile: &str, password: &str) -> Result<User> {
        let invalid = || ConsoleError::Auth(INVALID_CREDENTIALS.to_string());
        if mobile.is_empty() {
            return Err(invalid());
        }

        let record = match self.directory.lookup(mobile).await {
            Ok(Some(record)) => record,
            Ok(None) => return Err(invalid()),
            Err(e) => {
                tracing::error!("Directory lookup for {} failed: {}", mobile, e);
                return Err(ConsoleError::Auth(LOGIN_FAILED.to_string()));
            }
        };
        if record.password != password {
            return Err(invalid());
        }

        let mut user = record.into_user();
        if !user.is_administrator() {
            return Err(ConsoleError::Auth(ACCESS_DENIED.to_string()));
        }
        if user.mobile_number.is_empty() {
            user.mobile_number = mobile.to_string();
        }

        self.store.save(&user).map_err(|e| {
            tracing::error!("Failed to save session: {}", e);
            ConsoleError::Auth(LOGIN_FAILED.to_string())
        })?;
        Ok(user)
    }

    pub fn logout(&mut self) -> Result<()> {
        self.store.clear()?;
        if let Some(user) = self.user.take() {
            tracing::info!("Logged out {}", user.creator_label());
        }
        self.error = None;
        self.loading = false;
        Ok(())
    }
}
