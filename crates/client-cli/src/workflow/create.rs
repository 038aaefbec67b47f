//! Event creation: validate the form, create the event, cache its drafts,
//! upload the images and record their URLs.
//!
//! A failure at any step stops the sequence and leaves the flow idle with the
//! message in `last_error`. Steps that already succeeded are kept: the event
//! may exist remotely with no cached drafts, or have cached drafts without
//! images.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use shared::{DraftPatch, User};
use std::fmt;

use crate::config::ImageConfig;
use crate::error::{ConsoleError, Result};
use crate::gateway::{CreateEventRequest, Gateway};
use crate::images::{self, ImageSelection};
use crate::store::DraftStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Creating,
    Uploading,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Idle => f.write_str("Idle"),
            Stage::Creating => f.write_str("Creating Event..."),
            Stage::Uploading => f.write_str("Uploading Images..."),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateEventForm {
    pub title: String,
    pub description: String,
    /// `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM` or RFC 3339
    pub date_time: String,
    pub images: ImageSelection,
}

impl CreateEventForm {
    pub fn new(rules: ImageConfig) -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            date_time: String::new(),
            images: ImageSelection::new(rules),
        }
    }

    /// Check the submission preconditions, first failure wins
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(ConsoleError::Validation("Title is required".to_string()));
        }
        if self.description.trim().is_empty() {
            return Err(ConsoleError::Validation("Description is required".to_string()));
        }
        let date_time = self.date_time.trim();
        if date_time.is_empty() {
            return Err(ConsoleError::Validation("Date and time required".to_string()));
        }
        if !is_valid_date_time(date_time) {
            return Err(ConsoleError::Validation(format!("Invalid date and time: {}", date_time)));
        }
        if self.images.is_empty() {
            return Err(ConsoleError::Validation("At least one image required".to_string()));
        }
        Ok(())
    }

    pub fn prompt_text(&self) -> String {
        format!("{}\n\n{}", self.title.trim(), self.description.trim())
    }
}

fn is_valid_date_time(value: &str) -> bool {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M").is_ok()
        || DateTime::parse_from_rfc3339(value).is_ok()
}

/// Outcome of a successful submission
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedEvent {
    pub event_id: String,
    pub image_urls: Vec<String>,
    /// Whether the creation response carried drafts that were cached
    pub drafts_cached: bool,
}

type StageObserver = Box<dyn Fn(Stage) + Send + Sync>;

pub struct CreateEventFlow<G> {
    gateway: G,
    store: DraftStore,
    pub form: CreateEventForm,
    stage: Stage,
    last_error: Option<String>,
    submitting: bool,
    observer: Option<StageObserver>,
}

impl<G: Gateway> CreateEventFlow<G> {
    pub fn new(gateway: G, store: DraftStore, rules: ImageConfig) -> Self {
        Self {
            gateway,
            store,
            form: CreateEventForm::new(rules),
            stage: Stage::Idle,
            last_error: None,
            submitting: false,
            observer: None,
        }
    }

    /// Called on every stage change, e.g. to drive a progress line
    pub fn with_stage_observer(mut self, observer: impl Fn(Stage) + Send + Sync + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    fn set_stage(&mut self, stage: Stage) {
        if self.stage != stage {
            tracing::info!("Create event: {:?} -> {:?}", self.stage, stage);
            self.stage = stage;
            if let Some(observer) = &self.observer {
                observer(stage);
            }
        }
    }

    /// Run the whole creation sequence for `user`.
    ///
    /// The form is left as entered whatever the outcome, so a failed
    /// submission can be retried without re-entering anything.
    pub async fn submit(&mut self, user: &User) -> Result<CreatedEvent> {
        if self.submitting {
            return Err(ConsoleError::Validation("A submission is already in progress".to_string()));
        }
        self.last_error = None;

        if let Err(e) = self.form.validate() {
            self.last_error = Some(e.to_string());
            return Err(e);
        }

        self.submitting = true;
        let result = self.run(user).await;
        self.submitting = false;
        self.set_stage(Stage::Idle);

        match &result {
            Ok(created) => tracing::info!(
                "Event {} created with {} image(s)",
                created.event_id,
                created.image_urls.len()
            ),
            Err(e) => {
                tracing::error!("Event creation failed: {}", e);
                self.last_error = Some(e.to_string());
            }
        }
        result
    }

    async fn run(&mut self, user: &User) -> Result<CreatedEvent> {
        self.set_stage(Stage::Creating);
        let request = CreateEventRequest {
            prompt_text: self.form.prompt_text(),
            date_time: self.form.date_time.trim().to_string(),
            created_by: user.creator_label().to_string(),
            images: None,
        };
        let response = self.gateway.create_event(request).await?;
        let event_id = response
            .event_id()
            .ok_or(ConsoleError::MissingEventId)?
            .to_string();

        let drafts_cached = match response.into_bundle(&event_id) {
            Some(bundle) => {
                self.store.put(&event_id, &bundle)?;
                true
            }
            None => {
                tracing::warn!("createEvent for {} returned no platform drafts", event_id);
                false
            }
        };

        self.set_stage(Stage::Uploading);
        let encoded = images::encode_all(self.form.images.previews()).await?;
        let upload = self.gateway.upload_images(&event_id, encoded).await?;
        let image_urls = upload.image_urls();
        if image_urls.is_empty() {
            tracing::warn!("Image upload for {} returned no URLs", event_id);
        } else {
            self.store.merge(&event_id, DraftPatch::images(image_urls.clone()))?;
        }

        Ok(CreatedEvent {
            event_id,
            image_urls,
            drafts_cached,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::testing::{Call, FakeGateway};
    use shared::{CreateEventResponse, Platform, PlatformDraft, UploadImagesResponse, ADMINISTRATOR_ROLE};
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    fn admin() -> User {
        User {
            mobile_number: "9876543210".into(),
            name: "Asha".into(),
            role: ADMINISTRATOR_ROLE.into(),
        }
    }

    fn created(event_id: &str, with_drafts: bool) -> CreateEventResponse {
        let platform_drafts = with_drafts.then(|| {
            let mut drafts = BTreeMap::new();
            drafts.insert(
                Platform::Facebook,
                Arc::new(PlatformDraft {
                    text: "Support our annual drive".into(),
                    hashtags: "#give".into(),
                    ..Default::default()
                }),
            );
            drafts
        });
        CreateEventResponse {
            event_id: Some(event_id.to_string()),
            platform_drafts,
            ..Default::default()
        }
    }

    fn uploaded(files: &[&str], base_url: &str) -> UploadImagesResponse {
        UploadImagesResponse {
            success: true,
            files: Some(files.iter().map(|f| f.to_string()).collect()),
            base_url: Some(base_url.to_string()),
            ..Default::default()
        }
    }

    fn flow(gateway: FakeGateway, data_dir: &Path, image_dir: &Path) -> CreateEventFlow<FakeGateway> {
        let mut flow = CreateEventFlow::new(gateway, DraftStore::new(data_dir), ImageConfig::default());
        flow.form.title = "Fundraiser".into();
        flow.form.description = "Annual drive".into();
        flow.form.date_time = "2026-11-01T18:30".into();

        let image = image_dir.join("poster.jpg");
        std::fs::write(&image, [0xFFu8, 0xD8, 0xFF]).unwrap();
        assert!(flow.form.images.add_files(&[image]).is_empty());
        flow
    }

    #[test]
    fn test_validation_messages_in_order() {
        let mut form = CreateEventForm::new(ImageConfig::default());
        assert_eq!(form.validate().unwrap_err().to_string(), "Title is required");
        form.title = "Fundraiser".into();
        assert_eq!(form.validate().unwrap_err().to_string(), "Description is required");
        form.description = "Annual drive".into();
        assert_eq!(form.validate().unwrap_err().to_string(), "Date and time required");
        form.date_time = "next friday".into();
        assert_eq!(form.validate().unwrap_err().to_string(), "Invalid date and time: next friday");
        form.date_time = "2026-11-01".into();
        assert_eq!(form.validate().unwrap_err().to_string(), "At least one image required");
    }

    #[test]
    fn test_accepted_date_formats() {
        assert!(is_valid_date_time("2026-11-01"));
        assert!(is_valid_date_time("2026-11-01T18:30"));
        assert!(is_valid_date_time("2026-11-01T18:30:00+05:30"));
        assert!(!is_valid_date_time("01/11/2026"));
    }

    #[tokio::test]
    async fn scenario_create_then_upload_records_image_urls() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = FakeGateway::new()
            .on_create(Ok(created("ev1", true)))
            .on_upload(Ok(uploaded(&["/a.png"], "https://cdn/")));
        let mut flow = flow(gateway, dir.path(), dir.path());

        let result = flow.submit(&admin()).await.unwrap();
        assert_eq!(result.event_id, "ev1");
        assert!(result.drafts_cached);
        assert_eq!(flow.stage(), Stage::Idle);
        assert!(flow.last_error().is_none());

        let cached = DraftStore::new(dir.path()).get("ev1").unwrap();
        assert_eq!(cached.uploaded_images, vec!["https://cdn/a.png"]);
        assert!(cached.draft(Platform::Facebook).is_some());

        let calls = flow.gateway().calls();
        assert_eq!(calls.len(), 2);
        match &calls[0] {
            Call::CreateEvent(request) => {
                assert_eq!(request.prompt_text, "Fundraiser\n\nAnnual drive");
                assert_eq!(request.created_by, "Asha");
                assert_eq!(request.date_time, "2026-11-01T18:30");
            }
            other => panic!("Expected createEvent first, got {:?}", other),
        }
        match &calls[1] {
            Call::UploadImages { event_id, images } => {
                assert_eq!(event_id, "ev1");
                assert_eq!(images, &vec!["data:image/jpeg;base64,/9j/".to_string()]);
            }
            other => panic!("Expected uploadImages second, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn upload_failure_keeps_cached_drafts_and_form() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = FakeGateway::new()
            .on_create(Ok(created("ev1", true)))
            .on_upload(Err(ConsoleError::remote("Image upload failed")));
        let mut flow = flow(gateway, dir.path(), dir.path());

        let err = flow.submit(&admin()).await.unwrap_err();
        assert!(err.is_remote());
        assert_eq!(flow.last_error(), Some("Image upload failed"));
        assert_eq!(flow.stage(), Stage::Idle);
        assert!(!flow.is_submitting());
        assert_eq!(flow.form.title, "Fundraiser");
        assert_eq!(flow.form.images.len(), 1);

        let cached = DraftStore::new(dir.path()).get("ev1").unwrap();
        assert!(cached.has_drafts());
        assert!(cached.uploaded_images.is_empty());
    }

    #[tokio::test]
    async fn create_without_drafts_still_records_images() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = FakeGateway::new()
            .on_create(Ok(created("ev2", false)))
            .on_upload(Ok(uploaded(&["b.png"], "https://cdn")));
        let mut flow = flow(gateway, dir.path(), dir.path());

        let result = flow.submit(&admin()).await.unwrap();
        assert!(!result.drafts_cached);

        let cached = DraftStore::new(dir.path()).get("ev2").unwrap();
        assert!(!cached.has_drafts());
        assert_eq!(cached.uploaded_images, vec!["https://cdn/b.png"]);
    }

    #[tokio::test]
    async fn missing_event_id_stops_before_upload() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = FakeGateway::new().on_create(Ok(CreateEventResponse::default()));
        let mut flow = flow(gateway, dir.path(), dir.path());

        let err = flow.submit(&admin()).await.unwrap_err();
        assert!(matches!(err, ConsoleError::MissingEventId));
        assert_eq!(flow.last_error(), Some("No event_id returned from createEvent"));
        assert_eq!(flow.gateway().calls().len(), 1);
        assert!(DraftStore::new(dir.path()).list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_event_id_counts_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let response = CreateEventResponse {
            event_id: Some("  ".into()),
            ..created("ignored", true)
        };
        let mut flow = flow(FakeGateway::new().on_create(Ok(response)), dir.path(), dir.path());

        let err = flow.submit(&admin()).await.unwrap_err();
        assert!(matches!(err, ConsoleError::MissingEventId));
        assert_eq!(flow.gateway().calls().len(), 1);
        assert!(DraftStore::new(dir.path()).list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn upload_without_urls_leaves_no_cache_entry() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = FakeGateway::new()
            .on_create(Ok(created("ev3", false)))
            .on_upload(Ok(uploaded(&[], "https://cdn")));
        let mut flow = flow(gateway, dir.path(), dir.path());

        let result = flow.submit(&admin()).await.unwrap();
        assert!(result.image_urls.is_empty());
        assert!(!DraftStore::new(dir.path()).contains("ev3"));
        assert!(DraftStore::new(dir.path()).list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_form_makes_no_calls() {
        let dir = tempfile::tempdir().unwrap();
        let mut flow = flow(FakeGateway::new(), dir.path(), dir.path());
        flow.form.description = "   ".into();

        let err = flow.submit(&admin()).await.unwrap_err();
        assert!(matches!(err, ConsoleError::Validation(_)));
        assert_eq!(flow.last_error(), Some("Description is required"));
        assert!(flow.gateway().calls().is_empty());
    }

    #[tokio::test]
    async fn stage_observer_sees_each_transition() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = FakeGateway::new()
            .on_create(Ok(created("ev1", true)))
            .on_upload(Ok(uploaded(&["a.png"], "https://cdn")));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut flow = flow(gateway, dir.path(), dir.path()).with_stage_observer(move |stage| {
            sink.lock().unwrap().push(stage);
        });

        flow.submit(&admin()).await.unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Stage::Creating, Stage::Uploading, Stage::Idle]
        );
    }
}
