//! HTTP client for the Gemini `generateContent` API.
//!
//! Text analysis and coordinate detection ask for JSON output; identification
//! asks for plain text; image generation asks for an inline image part.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::prompts;
use super::types::{parse_detected_parts, AiError, AnalysisResult, DetectedPart, RawAnalysis};
use super::AiCapability;
use crate::config::AiSettings;
use crate::models::{GenerationConfig, Image};

/// Default API root.
pub const DEFAULT_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

/// Gemini-backed [`AiCapability`].
#[derive(Debug, Clone)]
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    text_model: String,
    image_model: String,
    client: Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<RequestContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<RequestGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    role: &'static str,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart {
    Text { text: String },
    Inline { inline_data: InlineData },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<&'static str>>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

impl GenerateResponse {
    fn text(&self) -> Option<String> {
        let text: String = self
            .parts()
            .filter_map(|part| part.text.as_deref())
            .collect::<Vec<_>>()
            .join("");
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    fn image(&self) -> Option<Image> {
        self.parts()
            .filter_map(|part| part.inline_data.as_ref())
            .find(|data| !data.data.is_empty())
            .map(|data| Image::from_base64(&data.mime_type, &data.data))
    }

    fn parts(&self) -> impl Iterator<Item = &ResponsePart> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
    }
}

impl RequestPart {
    fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    fn image(image: &Image) -> Option<Self> {
        Some(Self::Inline {
            inline_data: InlineData {
                mime_type: image.mime_type()?.to_string(),
                data: image.base64_data()?.to_string(),
            },
        })
    }
}

impl GeminiClient {
    /// Create with explicit configuration.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        text_model: impl Into<String>,
        image_model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AiError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(AiError::Unauthorized);
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into(),
            api_key,
            text_model: text_model.into(),
            image_model: image_model.into(),
            client,
        })
    }

    pub fn from_settings(settings: &AiSettings) -> Result<Self, AiError> {
        Self::new(
            settings.base_url.clone(),
            settings.api_key.clone(),
            settings.text_model.clone(),
            settings.image_model.clone(),
            settings.timeout,
        )
    }

    /// Send one `generateContent` call.
    async fn generate(
        &self,
        model: &str,
        parts: Vec<RequestPart>,
        generation_config: Option<RequestGenerationConfig>,
    ) -> Result<GenerateResponse, AiError> {
        let url = format!("{}/{}:generateContent", self.base_url, model);
        tracing::debug!("Sending request to {}", url);

        let body = GenerateRequest {
            contents: vec![RequestContent {
                role: "user",
                parts,
            }],
            generation_config,
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Handle response, converting HTTP errors to AiError.
    async fn handle_response(&self, response: reqwest::Response) -> Result<GenerateResponse, AiError> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let body = response.text().await.unwrap_or_default();
            match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AiError::Unauthorized),
                _ => Err(AiError::Api(format!("{}: {}", status, body))),
            }
        }
    }

    fn json_output() -> Option<RequestGenerationConfig> {
        Some(RequestGenerationConfig {
            response_mime_type: Some("application/json"),
            response_modalities: None,
        })
    }

    fn image_output() -> Option<RequestGenerationConfig> {
        Some(RequestGenerationConfig {
            response_mime_type: None,
            response_modalities: Some(vec!["IMAGE", "TEXT"]),
        })
    }
}

#[async_trait]
impl AiCapability for GeminiClient {
    async fn identify_object(&self, image: &Image) -> Result<String, AiError> {
        let image_part = RequestPart::image(image)
            .ok_or_else(|| AiError::Malformed("reference is not a data URL".to_string()))?;
        let response = self
            .generate(
                &self.text_model,
                vec![image_part, RequestPart::text(prompts::identify_prompt())],
                None,
            )
            .await?;

        let name = response
            .text()
            .map(|t| t.trim().trim_matches(|c: char| c == '.' || c == '"').to_string())
            .unwrap_or_default();
        if name.is_empty() {
            return Err(AiError::Malformed("no object name in response".to_string()));
        }
        Ok(name)
    }

    async fn analyze(
        &self,
        query: &str,
        config: &GenerationConfig,
    ) -> Result<AnalysisResult, AiError> {
        let response = self
            .generate(
                &self.text_model,
                vec![RequestPart::text(prompts::analysis_prompt(query, config))],
                Self::json_output(),
            )
            .await?;
        let text = response
            .text()
            .ok_or_else(|| AiError::Malformed("empty analysis response".to_string()))?;
        RawAnalysis::parse(&text)?.validate()
    }

    async fn generate_image(&self, prompt: &str, reference: Option<&Image>) -> Option<Image> {
        let mut parts = Vec::with_capacity(2);
        if let Some(part) = reference.and_then(RequestPart::image) {
            parts.push(part);
        }
        parts.push(RequestPart::text(prompt));

        match self
            .generate(&self.image_model, parts, Self::image_output())
            .await
        {
            Ok(response) => {
                let image = response.image();
                if image.is_none() {
                    tracing::warn!("Image generation returned no image");
                }
                image
            }
            Err(e) => {
                tracing::warn!("Image generation failed: {}", e);
                None
            }
        }
    }

    async fn detect_coordinates(&self, image: &Image, part_names: &[String]) -> Vec<DetectedPart> {
        let Some(image_part) = RequestPart::image(image) else {
            return Vec::new();
        };
        let parts = vec![
            image_part,
            RequestPart::text(prompts::coordinates_prompt(part_names)),
        ];

        match self
            .generate(&self.text_model, parts, Self::json_output())
            .await
        {
            Ok(response) => response
                .text()
                .map(|text| parse_detected_parts(&text))
                .unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Coordinate detection failed: {}", e);
                Vec::new()
            }
        }
    }
}
