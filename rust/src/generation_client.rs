use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GenerationError;

pub const API_KEY_HEADER: &str = "X-API-Key";
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8787";
pub const DEFAULT_GENERATE_PATH: &str = "/generate";
const FALLBACK_API_ERROR: &str = "Failed to generate image";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub negative_prompt: String,
    pub model: String,
    pub width: u32,
    pub height: u32,
    #[serde(rename = "num_inference_steps")]
    pub steps: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum GenerationResult {
    Image {
        #[serde(rename = "imageUrl")]
        image_url: String,
    },
    Failed {
        #[serde(rename = "imageError")]
        image_error: String,
    },
}

impl GenerationResult {
    pub fn image_url(&self) -> Option<&str> {
        match self {
            Self::Image { image_url } => Some(image_url),
            Self::Failed { .. } => None,
        }
    }

    pub fn image_error(&self) -> Option<&str> {
        match self {
            Self::Image { .. } => None,
            Self::Failed { image_error } => Some(image_error),
        }
    }
}

impl From<Result<String, GenerationError>> for GenerationResult {
    fn from(outcome: Result<String, GenerationError>) -> Self {
        match outcome {
            Ok(image_url) => Self::Image { image_url },
            Err(err) => Self::Failed {
                image_error: err.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl GenerationClient {
    pub fn new(base_url: &str, generate_path: &str) -> Result<Self, GenerationError> {
        let endpoint = build_endpoint(base_url, generate_path)?;
        Ok(Self {
            http: reqwest::Client::new(),
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// No timeout is applied; the call resolves or fails as the transport does.
    pub async fn send(
        &self,
        request: &GenerationRequest,
        api_key: &str,
    ) -> Result<String, GenerationError> {
        if api_key.trim().is_empty() {
            return Err(GenerationError::Validation(
                "Please enter your API Key".to_string(),
            ));
        }

        let response = self
            .http
            .post(self.endpoint.clone())
            .header(API_KEY_HEADER, api_key)
            .json(request)
            .send()
            .await
            .map_err(|err| GenerationError::Transport(err.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| GenerationError::Transport(err.to_string()))?;

        tracing::debug!(
            status = status.as_u16(),
            body_len = text.len(),
            "generation endpoint responded"
        );
        interpret_response(status, &text)
    }
}

pub fn interpret_response(status: StatusCode, body: &str) -> Result<String, GenerationError> {
    let trimmed = body.trim();
    let parsed = if trimmed.is_empty() {
        None
    } else {
        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => Some(value),
            Err(_) => return Err(GenerationError::Transport(trimmed.to_string())),
        }
    };

    if !status.is_success() {
        let message = parsed
            .as_ref()
            .and_then(extract_error_message)
            .unwrap_or_else(|| FALLBACK_API_ERROR.to_string());
        return Err(GenerationError::Api {
            status: status.as_u16(),
            message,
        });
    }

    let Some(body) = parsed else {
        return Err(GenerationError::MalformedResponse);
    };

    if let Some(url) = non_empty_str(&body, "url") {
        return Ok(url.to_string());
    }
    if let Some(payload) = non_empty_str(&body, "b64_json") {
        return Ok(format!(
            "data:{};base64,{}",
            sniff_image_content_type(payload),
            payload
        ));
    }

    Err(GenerationError::MalformedResponse)
}

pub fn sniff_image_content_type(payload: &str) -> &'static str {
    let head: String = payload.chars().take(16).collect();
    let Ok(bytes) = STANDARD.decode(head.as_bytes()) else {
        return "image/png";
    };

    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/png"
    }
}

fn build_endpoint(base_url: &str, generate_path: &str) -> Result<Url, GenerationError> {
    let base = base_url.trim().trim_end_matches('/');
    let path = generate_path.trim();
    let joined = if path.is_empty() {
        base.to_string()
    } else if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    };

    Url::parse(&joined)
        .map_err(|err| GenerationError::Validation(format!("invalid API URL {joined}: {err}")))
}

fn extract_error_message(body: &Value) -> Option<String> {
    match body.get("error")? {
        Value::String(message) if !message.trim().is_empty() => Some(message.clone()),
        Value::Object(details) => details
            .get("message")
            .and_then(Value::as_str)
            .filter(|message| !message.trim().is_empty())
            .map(ToOwned::to_owned),
        _ => None,
    }
}

fn non_empty_str<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
