//! Gemini (Google) repaint provider.

use crate::error::{RepaintError, Result};
use crate::repaint::provider::RepaintProvider;
use crate::repaint::types::{RepaintMetadata, RepaintRequest, RepaintedImage};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Finish reasons that mean the model refused to draw.
const SAFETY_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "IMAGE_SAFETY",
    "IMAGE_PROHIBITED_CONTENT",
    "PROHIBITED_CONTENT",
    "RECITATION",
    "IMAGE_RECITATION",
    "BLOCKLIST",
];

/// Gemini image model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeminiModel {
    /// Nano Banana - Gemini 2.5 Flash Image (fast, economical).
    #[default]
    NanoBanana,
    /// Nano Banana Pro - Gemini 3 Pro Image (highest quality).
    NanoBananaPro,
}

impl GeminiModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NanoBanana => "gemini-2.5-flash-image",
            Self::NanoBananaPro => "nano-banana-pro-preview",
        }
    }
}

/// Which response part the image is read from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PartSelection {
    /// Only the first part of the first candidate.
    #[default]
    First,
    /// The first part of the first candidate that carries inline data,
    /// skipping any leading text parts.
    FirstImage,
}

/// Builder for GeminiProvider.
#[derive(Debug, Clone)]
pub struct GeminiProviderBuilder {
    api_key: Option<String>,
    model: GeminiModel,
    base_url: Option<String>,
    timeout: Duration,
    part_selection: PartSelection,
}

impl Default for GeminiProviderBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            model: GeminiModel::default(),
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            part_selection: PartSelection::default(),
        }
    }
}

impl GeminiProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `GOOGLE_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the Gemini model variant.
    pub fn model(mut self, model: GeminiModel) -> Self {
        self.model = model;
        self
    }

    /// Overrides the API root (default: the public v1beta endpoint).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the request timeout (default: 120s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets which response part the image is read from.
    pub fn part_selection(mut self, selection: PartSelection) -> Self {
        self.part_selection = selection;
        self
    }

    /// Builds the provider, resolving the API key.
    pub fn build(self) -> Result<GeminiProvider> {
        let api_key = match self.api_key {
            Some(key) => key,
            None => std::env::var("GOOGLE_API_KEY").map_err(|_| {
                RepaintError::Auth("GOOGLE_API_KEY not set and no API key provided".into())
            })?,
        };
        if api_key.trim().is_empty() {
            return Err(RepaintError::Auth("API key is empty".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| RepaintError::Unknown(format!("failed to build HTTP client: {e}")))?;

        let base_url = self
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        Ok(GeminiProvider {
            client,
            api_key,
            model: self.model,
            base_url,
            timeout: self.timeout,
            part_selection: self.part_selection,
        })
    }
}

/// Gemini repaint provider.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: GeminiModel,
    base_url: String,
    timeout: Duration,
    part_selection: PartSelection,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("part_selection", &self.part_selection)
            .finish_non_exhaustive()
    }
}

impl GeminiProvider {
    /// Creates a new `GeminiProviderBuilder`.
    pub fn builder() -> GeminiProviderBuilder {
        GeminiProviderBuilder::new()
    }

    /// The configured model.
    pub fn model(&self) -> GeminiModel {
        self.model
    }

    /// The configured request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn model_url(&self) -> String {
        format!("{}/models/{}", self.base_url, self.model.as_str())
    }

    async fn repaint_impl(&self, request: &RepaintRequest) -> Result<RepaintedImage> {
        request.validate()?;
        let start = Instant::now();

        let url = format!("{}:generateContent", self.model_url());
        let body = GeminiRequest::from_repaint_request(request);

        tracing::debug!(
            model = self.model.as_str(),
            zones = request.directives.len(),
            "dispatching repaint request"
        );

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(RepaintError::from_transport)?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let text = response.text().await.unwrap_or_default();
            tracing::warn!(
                status = status.as_u16(),
                body = %truncate(&text, 512),
                "Gemini returned a non-success status"
            );
            return Err(RepaintError::Server {
                status: status.as_u16(),
            });
        }

        let text = response
            .text()
            .await
            .map_err(RepaintError::from_transport)?;
        let json: Value = serde_json::from_str(&text)
            .map_err(|e| RepaintError::malformed("$", format!("body is not valid JSON: {e}")))?;

        let inline = extract_inline_image(&json, self.part_selection)?;
        let duration_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            model = self.model.as_str(),
            duration_ms,
            bytes_b64 = inline.data.len(),
            "repaint response extracted"
        );

        Ok(RepaintedImage {
            data: inline.data,
            mime_type: inline.mime_type,
            metadata: RepaintMetadata {
                model: Some(self.model.as_str().to_string()),
                duration_ms: Some(duration_ms),
            },
        })
    }
}

#[async_trait]
impl RepaintProvider for GeminiProvider {
    async fn repaint(&self, request: &RepaintRequest) -> Result<RepaintedImage> {
        self.repaint_impl(request).await
    }

    fn name(&self) -> &str {
        "Gemini (Google)"
    }

    async fn health_check(&self) -> Result<()> {
        let response = self
            .client
            .get(self.model_url())
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(RepaintError::from_transport)?;

        match response.status().as_u16() {
            401 | 403 => Err(RepaintError::Auth("Gemini rejected the API key".into())),
            s if !(200..300).contains(&s) => Err(RepaintError::Server { status: s }),
            _ => Ok(()),
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// Request types
#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiRequestPart>,
}

/// A part in a Gemini request - inline image data or text.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiRequestPart {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

impl GeminiRequest {
    fn from_repaint_request(req: &RepaintRequest) -> Self {
        // Image before text.
        let parts = vec![
            GeminiRequestPart::InlineData {
                inline_data: GeminiInlineData {
                    mime_type: req.image.mime_type().to_string(),
                    data: req.image.data().to_string(),
                },
            },
            GeminiRequestPart::Text {
                text: req.instruction(),
            },
        ];

        Self {
            contents: vec![GeminiContent { parts }],
        }
    }
}

// Response extraction
#[derive(Debug, PartialEq, Eq)]
struct InlineImage {
    mime_type: Option<String>,
    data: String,
}

/// A position in the response body, remembering how we got there.
struct Lookup<'a> {
    value: &'a Value,
    path: String,
}

impl<'a> Lookup<'a> {
    fn root(value: &'a Value) -> Self {
        Self {
            value,
            path: String::new(),
        }
    }

    fn display_path(&self) -> String {
        if self.path.is_empty() {
            "$".to_string()
        } else {
            self.path.clone()
        }
    }

    fn field(&self, key: &str) -> Result<Lookup<'a>> {
        let path = if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{key}", self.path)
        };
        let object = self
            .value
            .as_object()
            .ok_or_else(|| RepaintError::malformed(self.display_path(), "expected an object"))?;
        match object.get(key) {
            Some(value) if !value.is_null() => Ok(Lookup { value, path }),
            _ => Err(RepaintError::malformed(path, "field missing")),
        }
    }

    fn index(&self, idx: usize) -> Result<Lookup<'a>> {
        let path = format!("{}[{idx}]", self.path);
        let items = self
            .value
            .as_array()
            .ok_or_else(|| RepaintError::malformed(self.display_path(), "expected an array"))?;
        match items.get(idx) {
            Some(value) => Ok(Lookup { value, path }),
            None => Err(RepaintError::malformed(path, "index out of range")),
        }
    }

    fn first_with(&self, key: &str) -> Result<Lookup<'a>> {
        let items = self
            .value
            .as_array()
            .ok_or_else(|| RepaintError::malformed(self.display_path(), "expected an array"))?;
        items
            .iter()
            .enumerate()
            .find(|(_, item)| item.get(key).is_some_and(|v| !v.is_null()))
            .map(|(idx, value)| Lookup {
                value,
                path: format!("{}[{idx}]", self.path),
            })
            .ok_or_else(|| {
                RepaintError::malformed(
                    format!("{}[*].{key}", self.path),
                    "no element carries this field",
                )
            })
    }

    fn as_str(&self) -> Result<&'a str> {
        self.value
            .as_str()
            .ok_or_else(|| RepaintError::malformed(self.display_path(), "expected a string"))
    }
}

fn extract_inline_image(body: &Value, selection: PartSelection) -> Result<InlineImage> {
    let root = Lookup::root(body);

    let candidate = root
        .field("candidates")
        .and_then(|candidates| candidates.index(0))
        .map_err(|err| with_block_reason(err, prompt_block_reason(body)))?;

    let content = candidate
        .field("content")
        .map_err(|err| with_block_reason(err, candidate_block_reason(candidate.value)))?;

    let parts = content.field("parts")?;
    let part = match selection {
        PartSelection::First => parts.index(0)?,
        PartSelection::FirstImage => parts.first_with("inlineData")?,
    };

    let inline = part.field("inlineData")?;
    let data = inline.field("data")?.as_str()?.to_string();
    let mime_type = inline
        .value
        .get("mimeType")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(InlineImage { mime_type, data })
}

/// Replaces a lookup failure's detail with the model's refusal reason.
fn with_block_reason(err: RepaintError, reason: Option<String>) -> RepaintError {
    match (err, reason) {
        (RepaintError::MalformedResponse { path, .. }, Some(detail)) => {
            tracing::warn!(%path, %detail, "Gemini refused to produce an image");
            RepaintError::MalformedResponse { path, detail }
        }
        (err, _) => err,
    }
}

fn prompt_block_reason(body: &Value) -> Option<String> {
    let feedback = body.get("promptFeedback")?;
    let reason = feedback.get("blockReason")?.as_str()?;
    let message = feedback
        .get("blockReasonMessage")
        .and_then(Value::as_str)
        .map(|msg| format!("prompt blocked ({reason}): {msg}"))
        .unwrap_or_else(|| format!("prompt blocked: {reason}"));
    Some(message)
}

fn candidate_block_reason(candidate: &Value) -> Option<String> {
    let reason = candidate.get("finishReason")?.as_str()?;
    SAFETY_FINISH_REASONS
        .contains(&reason)
        .then(|| format!("blocked by Gemini safety filter: {reason}"))
}
