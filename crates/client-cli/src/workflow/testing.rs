//! Scripted in-memory gateway for workflow tests.

use async_trait::async_trait;
use shared::{CreateEventResponse, DraftBundle, HistoryQuery, HistoryResponse, PublishRequest, PublishResponse, UploadImagesResponse};
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::{ConsoleError, Result};
use crate::gateway::{CreateEventRequest, Gateway};

/// Every call the fake received, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateEvent(CreateEventRequest),
    UploadImages { event_id: String, images: Vec<String> },
    FetchDrafts(String),
    Publish(PublishRequest),
    History(HistoryQuery),
}

#[derive(Default)]
pub struct FakeGateway {
    create: Mutex<VecDeque<Result<CreateEventResponse>>>,
    upload: Mutex<VecDeque<Result<UploadImagesResponse>>>,
    drafts: Mutex<VecDeque<Result<DraftBundle>>>,
    publish: Mutex<VecDeque<Result<PublishResponse>>>,
    calls: Mutex<Vec<Call>>,
}

fn next<T>(queue: &Mutex<VecDeque<Result<T>>>, operation: &str) -> Result<T> {
    queue
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| Err(ConsoleError::remote(format!("unexpected {} call", operation))))
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_create(self, response: Result<CreateEventResponse>) -> Self {
        self.create.lock().unwrap().push_back(response);
        self
    }

    pub fn on_upload(self, response: Result<UploadImagesResponse>) -> Self {
        self.upload.lock().unwrap().push_back(response);
        self
    }

    pub fn on_fetch(self, response: Result<DraftBundle>) -> Self {
        self.drafts.lock().unwrap().push_back(response);
        self
    }

    pub fn on_publish(self, response: Result<PublishResponse>) -> Self {
        self.publish.lock().unwrap().push_back(response);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn create_event(&self, request: CreateEventRequest) -> Result<CreateEventResponse> {
        self.record(Call::CreateEvent(request));
        next(&self.create, "createEvent")
    }

    async fn upload_images(&self, event_id: &str, images_base64: Vec<String>) -> Result<UploadImagesResponse> {
        self.record(Call::UploadImages {
            event_id: event_id.to_string(),
            images: images_base64,
        });
        next(&self.upload, "uploadImages")
    }

    async fn fetch_drafts(&self, event_id: &str) -> Result<DraftBundle> {
        self.record(Call::FetchDrafts(event_id.to_string()));
        next(&self.drafts, "fetchDrafts")
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishResponse> {
        self.record(Call::Publish(request.clone()));
        next(&self.publish, "publish")
    }

    async fn history(&self, query: &HistoryQuery) -> Result<HistoryResponse> {
        self.record(Call::History(query.clone()));
        Ok(HistoryResponse::default())
    }
}
