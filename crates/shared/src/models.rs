use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Role a directory record must carry for a console session to be valid.
pub const ADMINISTRATOR_ROLE: &str = "Administrator";

/// Extra JSON fields a record carried that this crate does not model.
pub type ExtraFields = serde_json::Map<String, serde_json::Value>;

/// Per-platform drafts of one event, keyed by platform.
pub type PlatformDrafts = BTreeMap<Platform, Arc<PlatformDraft>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Unknown platform: {0}. Valid platforms: linkedin, instagram, facebook, twitter")]
    Platform(String),
    #[error("Unknown draft field: {0}. Valid fields: text, hashtags, seo_keywords, alt_text, cta")]
    Field(String),
    #[error("Unknown event status: {0}. Valid statuses: draft, published, failed")]
    Status(String),
}

// ============================================================================
// Platforms
// ============================================================================

/// A social network an event can be published to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Linkedin,
    Instagram,
    Facebook,
    Twitter,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Linkedin,
        Platform::Instagram,
        Platform::Facebook,
        Platform::Twitter,
    ];

    /// Platforms the console currently exposes for editing and publishing
    pub const EDITABLE: [Platform; 2] = [Platform::Facebook, Platform::Twitter];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Linkedin => "linkedin",
            Platform::Instagram => "instagram",
            Platform::Facebook => "facebook",
            Platform::Twitter => "twitter",
        }
    }

    pub fn is_editable(&self) -> bool {
        Self::EDITABLE.contains(self)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseError::Platform(s.to_string()))
    }
}

// ============================================================================
// Drafts
// ============================================================================

/// AI-generated content for one platform
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformDraft {
    #[serde(default)]
    pub text: String,
    /// Always held as one string; a list from the service is space-joined
    #[serde(default, deserialize_with = "deserialize_hashtags")]
    pub hashtags: String,
    #[serde(default)]
    pub seo_keywords: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Separator used when the service sends hashtags as a list
pub const HASHTAG_SEPARATOR: &str = " ";

fn deserialize_hashtags<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<StringOrList>::deserialize(deserializer)? {
        Some(StringOrList::One(s)) => s,
        Some(StringOrList::Many(tags)) => tags.join(HASHTAG_SEPARATOR),
        None => String::new(),
    })
}

/// An editable field of a [`PlatformDraft`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DraftField {
    Text,
    Hashtags,
    SeoKeywords,
    AltText,
    Cta,
}

impl DraftField {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftField::Text => "text",
            DraftField::Hashtags => "hashtags",
            DraftField::SeoKeywords => "seo_keywords",
            DraftField::AltText => "alt_text",
            DraftField::Cta => "cta",
        }
    }
}

impl fmt::Display for DraftField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DraftField {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "text" => Ok(DraftField::Text),
            "hashtags" => Ok(DraftField::Hashtags),
            "seo_keywords" | "seo" => Ok(DraftField::SeoKeywords),
            "alt_text" => Ok(DraftField::AltText),
            "cta" => Ok(DraftField::Cta),
            other => Err(ParseError::Field(other.to_string())),
        }
    }
}

impl PlatformDraft {
    pub fn field(&self, field: DraftField) -> &str {
        match field {
            DraftField::Text => &self.text,
            DraftField::Hashtags => &self.hashtags,
            DraftField::SeoKeywords => &self.seo_keywords,
            DraftField::AltText => self.alt_text.as_deref().unwrap_or_default(),
            DraftField::Cta => self.cta.as_deref().unwrap_or_default(),
        }
    }

    /// Returns a copy of this draft with one field replaced
    pub fn with_field(&self, field: DraftField, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        let value = value.into();
        match field {
            DraftField::Text => next.text = value,
            DraftField::Hashtags => next.hashtags = value,
            DraftField::SeoKeywords => next.seo_keywords = value,
            DraftField::AltText => next.alt_text = Some(value),
            DraftField::Cta => next.cta = Some(value),
        }
        next
    }
}

/// Everything cached locally for one event: its drafts and uploaded image URLs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DraftBundle {
    #[serde(default)]
    pub event_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// `None` when the event has no drafts yet (e.g. only images were recorded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_drafts: Option<PlatformDrafts>,
    #[serde(default)]
    pub uploaded_images: Vec<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl DraftBundle {
    /// Empty bundle used as the base of a merge when nothing is cached
    pub fn skeleton(event_id: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            ..Default::default()
        }
    }

    pub fn has_drafts(&self) -> bool {
        self.platform_drafts.is_some()
    }

    pub fn draft(&self, platform: Platform) -> Option<&Arc<PlatformDraft>> {
        self.platform_drafts.as_ref()?.get(&platform)
    }

    /// Platforms that have a draft in this bundle, in canonical order
    pub fn platforms(&self) -> Vec<Platform> {
        self.platform_drafts
            .as_ref()
            .map(|drafts| drafts.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Shallow merge: fields present in the patch replace ours, images are appended
    pub fn apply(&mut self, patch: DraftPatch) {
        if let Some(title) = patch.title {
            self.title = Some(title);
        }
        if let Some(drafts) = patch.platform_drafts {
            self.platform_drafts = Some(drafts);
        }
        self.uploaded_images.extend(patch.uploaded_images);
        self.extra.extend(patch.extra);
    }

    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.event_id)
    }
}

/// Partial bundle merged into the cached copy
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftPatch {
    pub title: Option<String>,
    pub platform_drafts: Option<PlatformDrafts>,
    pub uploaded_images: Vec<String>,
    pub extra: ExtraFields,
}

impl DraftPatch {
    pub fn images(urls: Vec<String>) -> Self {
        Self {
            uploaded_images: urls,
            ..Default::default()
        }
    }
}

// ============================================================================
// Events
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Draft,
    Published,
    Failed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Draft => "draft",
            EventStatus::Published => "published",
            EventStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(EventStatus::Draft),
            "published" => Ok(EventStatus::Published),
            "failed" => Ok(EventStatus::Failed),
            other => Err(ParseError::Status(other.to_string())),
        }
    }
}

// ============================================================================
// Users
// ============================================================================

/// The signed-in administrator, persisted between runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub mobile_number: String,
    pub name: String,
    pub role: String,
}

impl User {
    pub fn is_administrator(&self) -> bool {
        self.role == ADMINISTRATOR_ROLE
    }

    /// Identity recorded as `created_by` on new events
    pub fn creator_label(&self) -> &str {
        if !self.name.is_empty() {
            &self.name
        } else if !self.mobile_number.is_empty() {
            &self.mobile_number
        } else {
            "admin"
        }
    }
}

/// A record from the identity directory, including its stored password
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DirectoryRecord {
    #[serde(default)]
    pub mobile_number: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub role: String,
}

impl DirectoryRecord {
    pub fn into_user(self) -> User {
        User {
            mobile_number: self.mobile_number,
            name: self.name,
            role: self.role,
        }
    }
}
