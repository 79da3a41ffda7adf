//! Plate recognition through a multimodal inference endpoint.
//!
//! The client is stateless per call. Recapture retries for unclear frames
//! belong to the workflow.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::API_NAME;

pub const PLATE_PROMPT: &str = "You are a vehicle number plate recognition system. \
Look for a rectangular license plate on a vehicle.\n\n\
INDIAN PLATE FORMAT: 2 letters + 2 digits + 1-2 letters + 4 digits (e.g., MH12AB1234)\n\n\
INSTRUCTIONS:\n\
1. If you see a clear readable plate, extract and return ONLY the alphanumeric text (remove spaces/hyphens, uppercase)\n\
2. If plate exists but is blurry/unclear, return: BLUR_ERROR\n\
3. If NO vehicle or plate visible, return: NO_PLATE\n\n\
EXAMPLES:\n\
- Clear plate 'MH 12 AB 1234' -> MH12AB1234\n\
- Blurry plate -> BLUR_ERROR\n\
- Empty image -> NO_PLATE\n\n\
Respond with ONLY the plate text or status code.";

/// Upper bound for one inference round trip.
pub const INFERENCE_TIMEOUT: Duration = Duration::from_secs(30);

const BLUR_MARKER: &str = "BLUR_ERROR";

/// Matched against the answer uppercased with separators removed.
const NO_PLATE_PHRASES: &[&str] = &["NOPLATE", "NOVEHICLE", "NOLICENSEPLATE", "NOTVISIBLE"];
const UNREADABLE_PHRASES: &[&str] = &["UNABLE", "CANNOT", "CANT", "NOTREADABLE", "UNREADABLE"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlateResult {
    /// Candidate plate text, trimmed but otherwise unvalidated.
    Plate(String),
    Unclear,
    NoPlate,
}

#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("inference API key is not configured")]
    NotConfigured,

    #[error("inference request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("inference service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not parse inference response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("inference response contained no text")]
    EmptyResponse,
}

#[async_trait]
pub trait PlateRecognizer: Send + Sync {
    async fn recognize(&self, image: &[u8], mime_type: &str)
        -> Result<PlateResult, RecognitionError>;
}

/// Maps the model's raw answer onto a verdict.
pub fn interpret_verdict(raw: &str) -> PlateResult {
    let text = raw.trim();
    let lower = text.to_lowercase();
    if text.contains(BLUR_MARKER) || lower.contains("blur") || lower.contains("unclear") {
        return PlateResult::Unclear;
    }
    let squashed: String = text
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_uppercase();
    if NO_PLATE_PHRASES.iter().any(|p| squashed.contains(p)) {
        return PlateResult::NoPlate;
    }
    if UNREADABLE_PHRASES.iter().any(|p| squashed.contains(p)) {
        return PlateResult::Unclear;
    }
    PlateResult::Plate(text.to_string())
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Image {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    fn text(&self) -> Option<String> {
        let text: String = self
            .candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

/// Gemini `generateContent` client.
#[derive(Debug, Clone)]
pub struct GeminiPlateRecognizer {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiPlateRecognizer {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl PlateRecognizer for GeminiPlateRecognizer {
    async fn recognize(
        &self,
        image: &[u8],
        mime_type: &str,
    ) -> Result<PlateResult, RecognitionError> {
        if self.api_key.is_empty() {
            return Err(RecognitionError::NotConfigured);
        }

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::Image {
                        inline_data: InlineData {
                            mime_type,
                            data: base64::engine::general_purpose::STANDARD.encode(image),
                        },
                    },
                    Part::Text { text: PLATE_PROMPT },
                ],
            }],
        };

        tracing::debug!(
            "{} Calling {} with {} image bytes",
            API_NAME,
            self.model,
            image.len()
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RecognitionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)?;
        let text = parsed.text().ok_or(RecognitionError::EmptyResponse)?;
        tracing::info!("{} Recognition response: {}", API_NAME, text.trim());

        Ok(interpret_verdict(&text))
    }
}

/// Recognizer that replays queued verdicts, for tests and dry runs without
/// an inference service. An empty queue answers `NoPlate`.
#[derive(Debug, Default)]
pub struct ScriptedRecognizer {
    verdicts: Mutex<VecDeque<Result<PlateResult, String>>>,
}

impl ScriptedRecognizer {
    pub fn new(verdicts: Vec<PlateResult>) -> Self {
        Self {
            verdicts: Mutex::new(verdicts.into_iter().map(Ok).collect()),
        }
    }

    pub fn push(&self, verdict: PlateResult) {
        self.lock().push_back(Ok(verdict));
    }

    /// Queues a transport failure.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.lock().push_back(Err(message.into()));
    }

    pub fn remaining(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<PlateResult, String>>> {
        self.verdicts.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl PlateRecognizer for ScriptedRecognizer {
    async fn recognize(
        &self,
        _image: &[u8],
        _mime_type: &str,
    ) -> Result<PlateResult, RecognitionError> {
        match self.lock().pop_front() {
            Some(Ok(verdict)) => Ok(verdict),
            Some(Err(message)) => Err(RecognitionError::Status {
                status: 503,
                body: message,
            }),
            None => Ok(PlateResult::NoPlate),
        }
    }
}
