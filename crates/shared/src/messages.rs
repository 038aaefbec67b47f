use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::models::{DraftBundle, EventStatus, ExtraFields, Platform, PlatformDrafts};

// ============================================================================
// Event creation
// ============================================================================

/// JSON body for the event-creation endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CreateEventBody {
    pub prompt_text: String,
    pub date_time: String,
    pub created_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_urls: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images_base64: Option<Vec<String>>,
}

/// Response of the event-creation endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateEventResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_drafts: Option<PlatformDrafts>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl CreateEventResponse {
    /// The server-assigned id, if the response carried a non-empty one
    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref().filter(|id| !id.trim().is_empty())
    }

    /// The bundle to cache locally, if the response carried drafts
    pub fn into_bundle(self, event_id: &str) -> Option<DraftBundle> {
        let drafts = self.platform_drafts?;
        Some(DraftBundle {
            event_id: event_id.to_string(),
            title: self.title,
            platform_drafts: Some(drafts),
            uploaded_images: Vec::new(),
            extra: self.extra,
        })
    }
}

// ============================================================================
// Draft retrieval
// ============================================================================

/// The drafts endpoint answers with either one object or a one-element list
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DraftsEnvelope {
    Many(Vec<DraftBundle>),
    One(Box<DraftBundle>),
}

impl DraftsEnvelope {
    pub fn into_first(self) -> Option<DraftBundle> {
        match self {
            DraftsEnvelope::Many(list) => list.into_iter().next(),
            DraftsEnvelope::One(bundle) => Some(*bundle),
        }
    }
}

// ============================================================================
// Media upload
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadImagesRequest {
    pub event_id: String,
    pub images_base64: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadImagesResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub urls: Option<Vec<String>>,
    #[serde(default)]
    pub files: Option<Vec<String>>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl UploadImagesResponse {
    /// Public URLs of the uploaded images.
    ///
    /// A direct `urls` list wins; otherwise each entry of `files` is joined
    /// onto `base_url` with exactly one `/` between them. Anything else yields
    /// no URLs.
    pub fn image_urls(&self) -> Vec<String> {
        if let Some(urls) = &self.urls {
            return urls.clone();
        }
        match (&self.files, &self.base_url) {
            (Some(files), Some(base)) => files.iter().map(|f| join_url(base, f)).collect(),
            _ => Vec::new(),
        }
    }
}

fn join_url(base: &str, file: &str) -> String {
    if file.is_empty() {
        return base.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), file.trim_start_matches('/'))
}

// ============================================================================
// Publishing
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishRequest {
    pub event_id: String,
    pub platforms: Vec<Platform>,
    pub final_drafts: PlatformDrafts,
    #[serde(default)]
    pub uploaded_images: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublishResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, deserialize_with = "lenient_platforms")]
    pub published_platforms: Vec<Platform>,
    #[serde(default, deserialize_with = "lenient_links")]
    pub links: BTreeMap<Platform, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PublishResponse {
    /// Only an explicit `success: false` counts as a rejected publish
    pub fn is_success(&self) -> bool {
        self.success != Some(false)
    }
}

/// `null` reads as empty; unknown platform names are dropped
fn lenient_platforms<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Platform>, D::Error> {
    let names: Option<Vec<serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(names
        .unwrap_or_default()
        .iter()
        .filter_map(|name| name.as_str()?.parse().ok())
        .collect())
}

/// `null` reads as empty; entries with an unknown platform or a non-string link are dropped
fn lenient_links<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeMap<Platform, String>, D::Error> {
    let links: Option<BTreeMap<String, serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(links
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(platform, link)| Some((platform.parse().ok()?, link.as_str()?.to_string())))
        .collect())
}

// ============================================================================
// History
// ============================================================================

/// Query parameters for the history endpoint; unset fields are omitted
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistoryQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EventStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub event_id: String,
    #[serde(default)]
    pub title: String,
    pub status: EventStatus,
    #[serde(default)]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platforms: Option<Vec<Platform>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<BTreeMap<Platform, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub events: Vec<HistoryItem>,
    #[serde(default)]
    pub total: u64,
}
