use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::models::evaluation::StorageKind;
use crate::services::storage::{ImageStore, StorageError};

/// Attempts per `analyze_image` call, the first one included.
pub const MAX_ATTEMPTS: u32 = 3;

/// Substituted when the provider answers without usable content.
pub const EMPTY_ANALYSIS_PLACEHOLDER: &str = "Unable to obtain analysis result";

const MAX_INSIGHTS: usize = 5;
const MIN_INSIGHT_CHARS: usize = 10;

const EVALUATION_PROMPT: &str = r#"You are a notoriously sharp-tongued photography critic with thirty years of commercial and fine-art experience. You believe brutal honesty is the highest form of care: you praise great work extravagantly and dissect weak work with surgical, theatrical wit, always leaving the photographer with something to think about.

Critique the submitted photograph in the following format.

## Opening Verdict
One or two sentences that set the tone. Make them memorable.

## Under the Microscope
Dissect the photo across six dimensions, wrapping each professional observation in vivid metaphor or irony:
1. Composition: layout, balance, framing.
2. Technical Quality: sharpness, exposure, colour accuracy.
3. Lighting: how light shapes the subject.
4. Artistic Merit: creativity and emotional impact.
5. Subject Matter: how well the subject holds the frame.
6. Post-processing: whether the editing helps or hurts.

## Survival Guide
Two or three of the most important improvements, in character.

## Final Sentence
Score each dimension from 1 to 10 using exactly this format:

- **Composition**: X/10 - one-line remark
- **Technical Quality**: X/10 - one-line remark
- **Artistic Merit**: X/10 - one-line remark
- **Lighting**: X/10 - one-line remark
- **Subject Matter**: X/10 - one-line remark
- **Post-processing**: X/10 - one-line remark

**Closing Remark**: one summarising line of praise or scorn.

Stay in character from start to finish."#;

/// Image to critique, as recorded on the evaluation.
#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub image_url: String,
    pub image_path: String,
    pub storage_kind: StorageKind,
}

/// Critique text returned by the provider.
#[derive(Debug, Clone)]
pub struct VisionAnalysis {
    pub analysis: String,
    pub insights: Vec<String>,
    pub raw: ChatResponse,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub message: Option<ChoiceMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatRequest {
    /// Two-part user message: the critic persona followed by the inline image.
    pub fn evaluation(model: &str, image_data_url: String) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ContentPart::Text {
                        text: EVALUATION_PROMPT.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image_data_url,
                        },
                    },
                ],
            }],
            stream: false,
        }
    }
}

/// A single chat-completions round trip.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn chat_completions(&self, request: &ChatRequest) -> Result<ChatResponse, VisionError>;
}

/// OpenAI-compatible chat-completions endpoint (Hunyuan, and others).
pub struct HttpChatTransport {
    http: Client,
    endpoint: String,
    api_key: String,
}

impl HttpChatTransport {
    pub fn new(base_url: &str, api_key: &str, request_timeout: Duration) -> Result<Self, VisionError> {
        let http = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn chat_completions(&self, request: &ChatRequest) -> Result<ChatResponse, VisionError> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VisionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<ChatResponse>().await?)
    }
}

/// Vision model client producing photo critiques.
pub struct VisionClient {
    transport: Arc<dyn ChatTransport>,
    images: ImageStore,
    model: String,
}

impl VisionClient {
    pub fn new(transport: Arc<dyn ChatTransport>, images: ImageStore, model: impl Into<String>) -> Self {
        Self {
            transport,
            images,
            model: model.into(),
        }
    }

    /// Critique one image.
    ///
    /// The image is read from storage once and sent inline as a data URL, so
    /// the provider never needs network access to it. Storage errors are not
    /// retried; provider calls are (see [`MAX_ATTEMPTS`]).
    pub async fn analyze_image(&self, request: &VisionRequest) -> Result<VisionAnalysis, VisionError> {
        let bytes = self
            .images
            .backend(request.storage_kind)?
            .read(&request.image_path)
            .await?;
        let data_url = encode_data_url(&bytes, &request.image_path);

        tracing::info!(
            image_url = %request.image_url,
            storage = %request.storage_kind,
            image_bytes = bytes.len(),
            model = %self.model,
            "Requesting photo critique"
        );

        let chat_request = ChatRequest::evaluation(&self.model, data_url);
        let response = self.call_with_retry(&chat_request).await?;
        let analysis = parse_response(&response);

        Ok(VisionAnalysis {
            insights: extract_insights(&analysis),
            analysis,
            raw: response,
        })
    }

    async fn call_with_retry(&self, request: &ChatRequest) -> Result<ChatResponse, VisionError> {
        let mut attempt = 1;
        loop {
            match self.transport.chat_completions(request).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < MAX_ATTEMPTS => {
                    let delay = backoff_delay(attempt);
                    tracing::warn!(
                        attempt,
                        retry_in_secs = delay.as_secs(),
                        error = %e,
                        "Vision API call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(attempts = attempt, error = %e, "Vision API call failed");
                    return Err(e);
                }
            }
        }
    }
}

/// `2^attempt` seconds: 2s after the first failure, 4s after the second.
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.pow(attempt))
}

/// First choice's content, or the placeholder when it is missing or empty.
/// Whitespace is passed through untouched.
pub fn parse_response(response: &ChatResponse) -> String {
    let content = response
        .choices
        .first()
        .and_then(|choice| choice.message.as_ref())
        .and_then(|message| message.content.as_deref())
        .filter(|content| !content.is_empty());

    match content {
        Some(content) => content.to_string(),
        None => {
            tracing::warn!(choices = response.choices.len(), "Empty content in vision response");
            EMPTY_ANALYSIS_PLACEHOLDER.to_string()
        }
    }
}

/// Sentences long enough to stand alone, at most five.
pub fn extract_insights(analysis: &str) -> Vec<String> {
    analysis
        .split(['。', '！', '？', '!', '?', '\n'])
        .map(str::trim)
        .filter(|s| s.chars().count() > MIN_INSIGHT_CHARS)
        .take(MAX_INSIGHTS)
        .map(String::from)
        .collect()
}

/// `data:<mime>;base64,<payload>`, sniffing the format from the bytes first
/// and the file extension second.
pub fn encode_data_url(bytes: &[u8], image_path: &str) -> String {
    let mime = image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or_else(|_| mime_from_extension(image_path));
    let payload = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{};base64,{}", mime, payload)
}

fn mime_from_extension(image_path: &str) -> &'static str {
    let ext = image_path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        _ => "image/jpeg",
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Vision API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to load image: {0}")]
    Storage(#[from] StorageError),
}
