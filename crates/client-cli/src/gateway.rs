//! Remote service gateway: the automation service (event creation, drafts,
//! publishing, history) and the media upload service.
//!
//! Every call runs under a client-side deadline and every failure, whether a
//! non-2xx status, an unparseable body, a transport error or a timeout, comes
//! back as one [`ConsoleError`] with the HTTP status and parsed body attached
//! when there was one.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use shared::{
    CreateEventBody, CreateEventResponse, DraftBundle, DraftsEnvelope, HistoryQuery, HistoryResponse,
    PublishRequest, PublishResponse, UploadImagesRequest, UploadImagesResponse,
};
use std::time::Duration;

use crate::config::ApiConfig;
use crate::error::{ConsoleError, Result};

const VERSION: &str = env!("SAMVEDANA_VERSION");

/// A raw image file sent with the legacy multipart upload
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFile {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

/// The image shapes the creation endpoint accepts
#[derive(Debug, Clone, PartialEq)]
pub enum ImagePayload {
    /// Images already uploaded elsewhere
    Urls(Vec<String>),
    /// Data URLs the automation forwards to the media service
    Base64(Vec<String>),
    /// Raw files posted as multipart form parts
    Files(Vec<ImageFile>),
}

impl ImagePayload {
    /// Pick the cheapest shape for the server: URLs, then base64, then raw files.
    /// Empty lists count as unavailable.
    pub fn select(urls: Vec<String>, base64: Vec<String>, files: Vec<ImageFile>) -> Option<Self> {
        if !urls.is_empty() {
            Some(ImagePayload::Urls(urls))
        } else if !base64.is_empty() {
            Some(ImagePayload::Base64(base64))
        } else if !files.is_empty() {
            Some(ImagePayload::Files(files))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateEventRequest {
    pub prompt_text: String,
    pub date_time: String,
    pub created_by: String,
    pub images: Option<ImagePayload>,
}

#[async_trait]
pub trait Gateway: Send + Sync {
    /// Create an event and receive its AI drafts
    async fn create_event(&self, request: CreateEventRequest) -> Result<CreateEventResponse>;

    /// Upload data-URL images for an event. Fails unless the service reports success.
    async fn upload_images(&self, event_id: &str, images_base64: Vec<String>) -> Result<UploadImagesResponse>;

    /// Fetch the drafts the automation service holds for an event
    async fn fetch_drafts(&self, event_id: &str) -> Result<DraftBundle>;

    async fn publish(&self, request: &PublishRequest) -> Result<PublishResponse>;

    async fn history(&self, query: &HistoryQuery) -> Result<HistoryResponse>;
}

#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    api: ApiConfig,
}

impl HttpGateway {
    pub fn new(api: ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("samvedana/{}", VERSION))
            .build()
            .map_err(|e| ConsoleError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, api })
    }

    /// Send a request under `deadline` and decode a JSON success body
    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        deadline: Duration,
        operation: &str,
    ) -> Result<T> {
        let exchange = async {
            let response = request.send().await.map_err(|e| transport_error(e, deadline))?;
            let status = response.status();
            let text = response.text().await.map_err(|e| transport_error(e, deadline))?;
            Ok::<_, ConsoleError>((status, text))
        };

        let (status, text) = match tokio::time::timeout(deadline, exchange).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::error!("{} failed: {}", operation, e);
                return Err(e);
            }
            Err(_) => {
                tracing::error!("{} timed out after {:?}", operation, deadline);
                return Err(ConsoleError::Timeout { after: deadline });
            }
        };

        if !status.is_success() {
            let body = serde_json::from_str::<serde_json::Value>(&text).ok();
            let message = body
                .as_ref()
                .and_then(|b| b.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
                .unwrap_or_else(|| {
                    format!("HTTP {}: {}", status.as_u16(), status.canonical_reason().unwrap_or("Unknown"))
                });
            tracing::error!(
                status = status.as_u16(),
                body = %text,
                "{} returned non-success status",
                operation
            );
            return Err(ConsoleError::Remote {
                message,
                status: Some(status.as_u16()),
                body,
            });
        }

        tracing::debug!("{} raw response: {}", operation, text);
        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(status = status.as_u16(), body = %text, "{} returned invalid JSON: {}", operation, e);
            ConsoleError::Remote {
                message: format!("Invalid JSON response: {}", text),
                status: Some(status.as_u16()),
                body: None,
            }
        })
    }
}

fn transport_error(e: reqwest::Error, deadline: Duration) -> ConsoleError {
    if e.is_timeout() {
        ConsoleError::Timeout { after: deadline }
    } else {
        ConsoleError::remote(format!("Network error: {}", e))
    }
}

fn json_body(
    request: &CreateEventRequest,
    image_urls: Option<Vec<String>>,
    images_base64: Option<Vec<String>>,
) -> CreateEventBody {
    CreateEventBody {
        prompt_text: request.prompt_text.clone(),
        date_time: request.date_time.clone(),
        created_by: request.created_by.clone(),
        image_urls,
        images_base64,
    }
}

/// Multipart body for the file-upload shape. The prompt's first line doubles as the legacy title.
fn legacy_form(request: CreateEventRequest, files: Vec<ImageFile>) -> Result<Form> {
    let title = request.prompt_text.lines().next().unwrap_or_default().to_string();
    let mut form = Form::new()
        .text("prompt_text", request.prompt_text.clone())
        .text("title", title)
        .text("description", request.prompt_text)
        .text("date_time", request.date_time)
        .text("created_by", request.created_by);

    for file in files {
        let part = Part::bytes(file.bytes)
            .file_name(file.name.clone())
            .mime_str(&file.media_type)
            .map_err(|e| ConsoleError::Validation(format!("Unsupported format: {} ({})", file.media_type, e)))?;
        form = form.part("images", part);
    }
    Ok(form)
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn create_event(&self, request: CreateEventRequest) -> Result<CreateEventResponse> {
        let url = self.api.endpoint(&self.api.create_event_path);
        let builder = match request.images.clone() {
            Some(ImagePayload::Urls(urls)) => self.client.post(&url).json(&json_body(&request, Some(urls), None)),
            Some(ImagePayload::Base64(images)) => {
                self.client.post(&url).json(&json_body(&request, None, Some(images)))
            }
            Some(ImagePayload::Files(files)) => self.client.post(&url).multipart(legacy_form(request, files)?),
            None => self.client.post(&url).multipart(legacy_form(request, Vec::new())?),
        };

        let response: CreateEventResponse = self.execute(builder, self.api.timeout(), "createEvent").await?;
        match response.event_id() {
            Some(event_id) => {
                tracing::info!("Created event {}", event_id);
                Ok(response)
            }
            None => {
                tracing::warn!("createEvent: response missing event_id: {:?}", response);
                Err(ConsoleError::MissingEventId)
            }
        }
    }

    async fn upload_images(&self, event_id: &str, images_base64: Vec<String>) -> Result<UploadImagesResponse> {
        let body = UploadImagesRequest {
            event_id: event_id.to_string(),
            images_base64,
        };
        let builder = self.client.post(&self.api.media_upload_url).json(&body);
        let response: UploadImagesResponse = self.execute(builder, self.api.timeout(), "uploadImages").await?;

        if !response.success {
            tracing::error!("uploadImages for {} reported failure: {:?}", event_id, response);
            return Err(ConsoleError::remote(
                response.message.unwrap_or_else(|| "Image upload failed".to_string()),
            ));
        }
        Ok(response)
    }

    async fn fetch_drafts(&self, event_id: &str) -> Result<DraftBundle> {
        let builder = self
            .client
            .get(self.api.endpoint(&self.api.drafts_path))
            .query(&[("event_id", event_id)]);
        let envelope: DraftsEnvelope = self.execute(builder, self.api.timeout(), "fetchDrafts").await?;

        let mut bundle = envelope
            .into_first()
            .ok_or_else(|| ConsoleError::NoDrafts("No drafts found in webhook response".to_string()))?;
        if bundle.event_id.is_empty() {
            bundle.event_id = event_id.to_string();
        }
        Ok(bundle)
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishResponse> {
        let builder = self.client.post(self.api.endpoint(&self.api.publish_path)).json(request);
        let response: PublishResponse = self.execute(builder, self.api.publish_timeout(), "publish").await?;

        if !response.is_success() {
            tracing::error!("publish for {} rejected: {:?}", request.event_id, response);
            return Err(ConsoleError::Remote {
                message: response.message.clone().unwrap_or_else(|| "Publish failed".to_string()),
                status: None,
                body: serde_json::to_value(&response).ok(),
            });
        }
        tracing::info!("Published {} to {:?}", request.event_id, request.platforms);
        Ok(response)
    }

    async fn history(&self, query: &HistoryQuery) -> Result<HistoryResponse> {
        let builder = self.client.get(&self.api.history_url).query(query);
        self.execute(builder, self.api.timeout(), "getHistory").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{EventStatus, Platform};
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_gateway(server: &MockServer) -> HttpGateway {
        let api = ApiConfig {
            base_url: server.uri(),
            history_url: format!("{}/history", server.uri()),
            media_upload_url: format!("{}/upload", server.uri()),
            ..ApiConfig::default()
        };
        HttpGateway::new(api).unwrap()
    }

    fn request(images: Option<ImagePayload>) -> CreateEventRequest {
        CreateEventRequest {
            prompt_text: "Fundraiser\n\nAnnual drive".to_string(),
            date_time: "2026-11-01".to_string(),
            created_by: "Asha".to_string(),
            images,
        }
    }

    #[test]
    fn test_image_payload_priority() {
        let file = ImageFile {
            name: "a.png".into(),
            media_type: "image/png".into(),
            bytes: vec![1, 2, 3],
        };
        assert_eq!(
            ImagePayload::select(vec!["u".into()], vec!["b".into()], vec![file.clone()]),
            Some(ImagePayload::Urls(vec!["u".into()]))
        );
        assert_eq!(
            ImagePayload::select(vec![], vec!["b".into()], vec![file.clone()]),
            Some(ImagePayload::Base64(vec!["b".into()]))
        );
        assert_eq!(
            ImagePayload::select(vec![], vec![], vec![file.clone()]),
            Some(ImagePayload::Files(vec![file]))
        );
        assert_eq!(ImagePayload::select(vec![], vec![], vec![]), None);
    }

    #[tokio::test]
    async fn create_event_with_base64_posts_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webhook/create-event"))
            .and(body_partial_json(serde_json::json!({
                "prompt_text": "Fundraiser\n\nAnnual drive",
                "created_by": "Asha",
                "images_base64": ["data:image/png;base64,AQID"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "event_id": "ev1",
                "platform_drafts": {"facebook": {"text": "Hi", "hashtags": "#a", "seo_keywords": ""}}
            })))
            .mount(&server)
            .await;

        let gateway = test_gateway(&server);
        let images = ImagePayload::Base64(vec!["data:image/png;base64,AQID".into()]);
        let response = gateway.create_event(request(Some(images))).await.unwrap();
        assert_eq!(response.event_id(), Some("ev1"));
        assert!(response.platform_drafts.unwrap().contains_key(&Platform::Facebook));
    }

    #[tokio::test]
    async fn create_event_without_images_uses_multipart() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webhook/create-event"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"event_id": "ev2"})))
            .mount(&server)
            .await;

        let gateway = test_gateway(&server);
        gateway.create_event(request(None)).await.unwrap();

        let received = server.received_requests().await.unwrap();
        let content_type = received[0].headers.get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.starts_with("multipart/form-data"));
        let body = String::from_utf8_lossy(&received[0].body);
        assert!(body.contains("name=\"prompt_text\"\r\n\r\nFundraiser\n\nAnnual drive\r\n"));
        assert!(body.contains("name=\"title\"\r\n\r\nFundraiser\r\n"));
        assert!(body.contains("name=\"date_time\""));
        assert!(body.contains("name=\"created_by\""));
        assert!(!body.contains("name=\"images\""));
    }

    #[tokio::test]
    async fn create_event_with_urls_posts_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webhook/create-event"))
            .and(body_partial_json(serde_json::json!({
                "prompt_text": "Fundraiser\n\nAnnual drive",
                "date_time": "2026-11-01",
                "image_urls": ["https://cdn/a.png", "https://cdn/b.png"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"event_id": "ev3"})))
            .mount(&server)
            .await;

        let images = ImagePayload::Urls(vec!["https://cdn/a.png".into(), "https://cdn/b.png".into()]);
        let response = test_gateway(&server).create_event(request(Some(images))).await.unwrap();
        assert_eq!(response.event_id(), Some("ev3"));

        let received = server.received_requests().await.unwrap();
        let sent: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
        assert!(sent.get("images_base64").is_none());
    }

    #[tokio::test]
    async fn create_event_with_files_sends_image_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webhook/create-event"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"event_id": "ev4"})))
            .mount(&server)
            .await;

        let files = vec![
            ImageFile {
                name: "poster.png".into(),
                media_type: "image/png".into(),
                bytes: b"PNGDATA".to_vec(),
            },
            ImageFile {
                name: "crowd.jpg".into(),
                media_type: "image/jpeg".into(),
                bytes: b"JPGDATA".to_vec(),
            },
        ];
        test_gateway(&server)
            .create_event(request(Some(ImagePayload::Files(files))))
            .await
            .unwrap();

        let received = server.received_requests().await.unwrap();
        let content_type = received[0].headers.get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.starts_with("multipart/form-data"));
        let body = String::from_utf8_lossy(&received[0].body);
        assert_eq!(body.matches("name=\"images\"").count(), 2);
        assert!(body.contains("filename=\"poster.png\""));
        assert!(body.contains("content-type: image/jpeg") || body.contains("Content-Type: image/jpeg"));
        assert!(body.contains("PNGDATA"));
        assert!(body.contains("name=\"prompt_text\""));
    }

    #[tokio::test]
    async fn create_event_missing_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"platform_drafts": {}})))
            .mount(&server)
            .await;

        let err = test_gateway(&server).create_event(request(None)).await.unwrap_err();
        assert!(matches!(err, ConsoleError::MissingEventId));
    }

    #[tokio::test]
    async fn non_success_status_carries_message_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({"message": "prompt too long"})))
            .mount(&server)
            .await;

        let err = test_gateway(&server).create_event(request(None)).await.unwrap_err();
        match err {
            ConsoleError::Remote { message, status, body } => {
                assert_eq!(message, "prompt too long");
                assert_eq!(status, Some(422));
                assert_eq!(body.unwrap()["message"], "prompt too long");
            }
            other => panic!("Expected Remote, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn non_success_without_json_uses_status_line() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let err = test_gateway(&server).fetch_drafts("ev1").await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 503: Service Unavailable");
        assert_eq!(err.status(), Some(503));
    }

    #[tokio::test]
    async fn invalid_json_is_remote_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = test_gateway(&server).history(&HistoryQuery::default()).await.unwrap_err();
        assert!(err.to_string().starts_with("Invalid JSON response"));
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"event_id": "ev1", "platform_drafts": {}}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let api = ApiConfig {
            base_url: server.uri(),
            timeout_secs: 0,
            ..ApiConfig::default()
        };
        let err = HttpGateway::new(api).unwrap().fetch_drafts("ev1").await.unwrap_err();
        assert!(matches!(err, ConsoleError::Timeout { .. }));
        assert!(err.is_remote());
    }

    #[tokio::test]
    async fn fetch_drafts_unwraps_single_element_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/webhook/create-event"))
            .and(query_param("event_id", "ev1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"platform_drafts": {"twitter": {"text": "t", "hashtags": ["#a", "#b"]}}}
            ])))
            .mount(&server)
            .await;

        let bundle = test_gateway(&server).fetch_drafts("ev1").await.unwrap();
        assert_eq!(bundle.event_id, "ev1");
        assert_eq!(bundle.draft(Platform::Twitter).unwrap().hashtags, "#a #b");
    }

    #[tokio::test]
    async fn upload_images_requires_success_flag() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": false})))
            .mount(&server)
            .await;

        let err = test_gateway(&server)
            .upload_images("ev1", vec!["data:image/png;base64,AA==".into()])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Image upload failed");
    }

    #[tokio::test]
    async fn upload_images_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .and(body_partial_json(serde_json::json!({"event_id": "ev1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true, "files": ["a.png"], "base_url": "https://cdn/"
            })))
            .mount(&server)
            .await;

        let response = test_gateway(&server)
            .upload_images("ev1", vec!["data:image/png;base64,AA==".into()])
            .await
            .unwrap();
        assert_eq!(response.image_urls(), vec!["https://cdn/a.png"]);
    }

    #[tokio::test]
    async fn publish_rejected_by_service() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webhook/publish"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"success": false, "message": "token expired"})),
            )
            .mount(&server)
            .await;

        let request = PublishRequest {
            event_id: "ev1".into(),
            platforms: vec![Platform::Facebook],
            final_drafts: Default::default(),
            uploaded_images: vec![],
        };
        let err = test_gateway(&server).publish(&request).await.unwrap_err();
        assert_eq!(err.to_string(), "token expired");
    }

    #[tokio::test]
    async fn publish_accepts_null_optional_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webhook/publish"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true, "published_platforms": null, "links": null, "message": "done"
            })))
            .mount(&server)
            .await;

        let request = PublishRequest {
            event_id: "ev1".into(),
            platforms: vec![Platform::Facebook],
            final_drafts: Default::default(),
            uploaded_images: vec![],
        };
        let response = test_gateway(&server).publish(&request).await.unwrap();
        assert!(response.is_success());
        assert!(response.published_platforms.is_empty());
        assert!(response.links.is_empty());
        assert_eq!(response.message.as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn history_sends_only_set_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/history"))
            .and(query_param("limit", "5"))
            .and(query_param("status", "draft"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "events": [{"event_id": "ev1", "title": "Fundraiser", "status": "draft", "created_at": "2026-10-01"}],
                "total": 1
            })))
            .mount(&server)
            .await;

        let query = HistoryQuery {
            limit: Some(5),
            status: Some(EventStatus::Draft),
            ..Default::default()
        };
        let response = test_gateway(&server).history(&query).await.unwrap();
        assert_eq!(response.total, 1);

        let received = server.received_requests().await.unwrap();
        assert!(!received[0].url.query().unwrap().contains("start_date"));
    }
}
