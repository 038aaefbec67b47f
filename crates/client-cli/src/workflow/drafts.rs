//! Draft editing and publishing for one event.
//!
//! The editor works on an in-memory copy of the event's bundle. Edits mark it
//! dirty until `save` writes it back to the draft store or `revert` throws it
//! away and reloads.

use shared::{DraftBundle, DraftField, Platform, PublishRequest, PublishResponse};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::{ConsoleError, Result};
use crate::gateway::Gateway;
use crate::store::DraftStore;

/// Local cache first, then the automation service.
///
/// A cached bundle with no drafts yet (images recorded, drafts not cached)
/// still goes to the service; its image URLs are kept when the service has
/// none. The service answering without drafts is an error.
pub async fn load_bundle<G: Gateway + ?Sized>(store: &DraftStore, gateway: &G, event_id: &str) -> Result<DraftBundle> {
    let cached = store.get(event_id);
    if let Some(bundle) = &cached {
        if bundle.has_drafts() {
            tracing::debug!("Loaded drafts for {} from local cache", event_id);
            return Ok(bundle.clone());
        }
    }

    tracing::info!("No cached drafts for {}, fetching from service", event_id);
    let mut bundle = gateway.fetch_drafts(event_id).await?;
    if !bundle.has_drafts() {
        return Err(ConsoleError::NoDrafts(format!(
            "No drafts found for event {}",
            event_id
        )));
    }
    if bundle.uploaded_images.is_empty() {
        if let Some(cached) = cached {
            bundle.uploaded_images = cached.uploaded_images;
        }
    }
    Ok(bundle)
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditorState {
    Loading,
    Ready { bundle: DraftBundle, dirty: bool },
    Error(String),
}

pub struct DraftEditor<G> {
    gateway: G,
    store: DraftStore,
    event_id: String,
    state: EditorState,
    selected: BTreeSet<Platform>,
    pending_ack: Option<PublishResponse>,
    publishing: bool,
}

impl<G: Gateway> DraftEditor<G> {
    pub fn new(gateway: G, store: DraftStore, event_id: impl Into<String>) -> Self {
        Self {
            gateway,
            store,
            event_id: event_id.into(),
            state: EditorState::Loading,
            selected: BTreeSet::new(),
            pending_ack: None,
            publishing: false,
        }
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn bundle(&self) -> Option<&DraftBundle> {
        match &self.state {
            EditorState::Ready { bundle, .. } => Some(bundle),
            _ => None,
        }
    }

    pub fn is_dirty(&self) -> bool {
        matches!(self.state, EditorState::Ready { dirty: true, .. })
    }

    /// Load the bundle and reset the platform selection to every visible platform
    pub async fn load(&mut self) -> Result<()> {
        self.state = EditorState::Loading;
        match load_bundle(&self.store, &self.gateway, &self.event_id).await {
            Ok(bundle) => {
                self.selected = visible_in(&bundle).into_iter().collect();
                self.state = EditorState::Ready { bundle, dirty: false };
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to load drafts for {}: {}", self.event_id, e);
                self.state = EditorState::Error(e.to_string());
                Err(e)
            }
        }
    }

    /// Replace one field of one platform's draft.
    ///
    /// The edited platform gets a new draft value; every other platform keeps
    /// the one it had.
    pub fn edit(&mut self, platform: Platform, field: DraftField, value: impl Into<String>) -> Result<()> {
        let EditorState::Ready { bundle, dirty } = &mut self.state else {
            return Err(not_loaded());
        };
        if !platform.is_editable() {
            return Err(ConsoleError::Validation(format!("{} drafts cannot be edited", platform)));
        }
        let Some(drafts) = bundle.platform_drafts.as_mut() else {
            return Err(ConsoleError::Validation(format!("No {} draft for this event", platform)));
        };
        let Some(current) = drafts.get(&platform) else {
            return Err(ConsoleError::Validation(format!("No {} draft for this event", platform)));
        };

        let edited = Arc::new(current.with_field(field, value));
        drafts.insert(platform, edited);
        *dirty = true;
        Ok(())
    }

    /// Overwrite the cached bundle with the in-memory one
    pub fn save(&mut self) -> Result<()> {
        let EditorState::Ready { bundle, dirty } = &mut self.state else {
            return Err(not_loaded());
        };
        self.store.put(&self.event_id, bundle)?;
        *dirty = false;
        tracing::info!("Saved drafts for {}", self.event_id);
        Ok(())
    }

    /// Drop the cache entry and any unsaved edits, then load again
    pub async fn revert(&mut self) -> Result<()> {
        self.store.clear(&self.event_id)?;
        tracing::info!("Reverted drafts for {}", self.event_id);
        self.load().await
    }

    /// Editable platforms that have a draft, in canonical order
    pub fn visible_platforms(&self) -> Vec<Platform> {
        self.bundle().map(visible_in).unwrap_or_default()
    }

    /// Flip one platform in or out of the publish selection; returns whether it is now selected
    pub fn toggle_platform(&mut self, platform: Platform) -> Result<bool> {
        self.check_visible(platform)?;
        if self.selected.remove(&platform) {
            Ok(false)
        } else {
            self.selected.insert(platform);
            Ok(true)
        }
    }

    pub fn select_platforms(&mut self, platforms: &[Platform]) -> Result<()> {
        for platform in platforms {
            self.check_visible(*platform)?;
        }
        self.selected = platforms.iter().copied().collect();
        Ok(())
    }

    pub fn selected(&self) -> Vec<Platform> {
        self.selected.iter().copied().collect()
    }

    fn check_visible(&self, platform: Platform) -> Result<()> {
        if self.visible_platforms().contains(&platform) {
            Ok(())
        } else {
            Err(ConsoleError::Validation(format!(
                "{} is not available for this event",
                platform
            )))
        }
    }

    /// The publish request for the current selection and in-memory drafts
    pub fn publish_payload(&self) -> Result<PublishRequest> {
        let bundle = self.bundle().ok_or_else(not_loaded)?;
        let drafts = bundle.platform_drafts.as_ref().ok_or_else(not_loaded)?;

        let final_drafts: shared::PlatformDrafts = self
            .selected
            .iter()
            .filter_map(|p| drafts.get(p).map(|d| (*p, d.clone())))
            .collect();
        if final_drafts.is_empty() {
            return Err(ConsoleError::Validation(
                "Select at least one platform to publish".to_string(),
            ));
        }

        Ok(PublishRequest {
            event_id: self.event_id.clone(),
            platforms: final_drafts.keys().copied().collect(),
            final_drafts,
            uploaded_images: bundle.uploaded_images.clone(),
        })
    }

    /// Publish the selected drafts.
    ///
    /// On success the cache entry is cleared and an acknowledgement is left
    /// pending. On failure nothing changes and the call can be repeated.
    pub async fn publish(&mut self) -> Result<PublishResponse> {
        if self.publishing {
            return Err(ConsoleError::Validation("Publishing is already in progress".to_string()));
        }
        let request = self.publish_payload()?;

        self.publishing = true;
        let result = self.gateway.publish(&request).await;
        self.publishing = false;

        let response = result?;
        if let Err(e) = self.store.clear(&self.event_id) {
            tracing::warn!("Published {} but could not clear cached drafts: {}", self.event_id, e);
        }
        self.pending_ack = Some(response.clone());
        Ok(response)
    }

    pub fn pending_acknowledgement(&self) -> Option<&PublishResponse> {
        self.pending_ack.as_ref()
    }

    pub fn acknowledge_publish(&mut self) -> Option<PublishResponse> {
        self.pending_ack.take()
    }

    /// False while a publish success has not been acknowledged
    pub fn can_navigate(&self) -> bool {
        self.pending_ack.is_none()
    }
}

fn visible_in(bundle: &DraftBundle) -> Vec<Platform> {
    bundle
        .platforms()
        .into_iter()
        .filter(Platform::is_editable)
        .collect()
}

fn not_loaded() -> ConsoleError {
    ConsoleError::Validation("Drafts are not loaded".to_string())
}
