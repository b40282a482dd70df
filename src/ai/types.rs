//! Shapes exchanged with the AI capability, and their validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Characteristic;

/// AI service errors.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unauthorized: API key missing or invalid")]
    Unauthorized,

    #[error("Service error: {0}")]
    Api(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// A validated analysis of one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub name: String,
    pub category: String,
    pub description: String,
    pub part_names: Vec<String>,
    pub facts: Vec<String>,
    pub characteristics: Vec<Characteristic>,
}

/// The analysis payload as the model returns it, before validation.
///
/// Every field is optional here so that a missing key becomes a precise
/// validation message instead of a serde error.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAnalysis {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "parts", alias = "part_names")]
    pub part_names: Option<Vec<String>>,
    #[serde(default)]
    pub facts: Option<Vec<String>>,
    #[serde(default)]
    pub characteristics: Option<Vec<Characteristic>>,
}

/// Expected number of parts per analysis.
pub const PART_COUNT: std::ops::RangeInclusive<usize> = 5..=7;
pub const FACT_COUNT: std::ops::RangeInclusive<usize> = 3..=5;
pub const CHARACTERISTIC_COUNT: std::ops::RangeInclusive<usize> = 3..=6;

impl RawAnalysis {
    /// Parse model output text, tolerating a surrounding markdown fence.
    pub fn parse(text: &str) -> Result<Self, AiError> {
        serde_json::from_str(strip_code_fence(text))
            .map_err(|e| AiError::Malformed(format!("analysis is not valid JSON: {}", e)))
    }

    pub fn validate(self) -> Result<AnalysisResult, AiError> {
        let name = required_text(self.name, "name")?;
        let part_names: Vec<String> = self
            .part_names
            .ok_or_else(|| AiError::Malformed("missing partNames".to_string()))?
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if part_names.is_empty() {
            return Err(AiError::Malformed("analysis lists no parts".to_string()));
        }
        if !PART_COUNT.contains(&part_names.len()) {
            tracing::warn!(
                "Analysis of '{}' returned {} parts (expected {}-{})",
                name,
                part_names.len(),
                PART_COUNT.start(),
                PART_COUNT.end()
            );
        }

        let facts = self.facts.unwrap_or_default();
        if !FACT_COUNT.contains(&facts.len()) {
            tracing::debug!("Analysis of '{}' returned {} facts", name, facts.len());
        }
        let characteristics = self.characteristics.unwrap_or_default();
        if !CHARACTERISTIC_COUNT.contains(&characteristics.len()) {
            tracing::debug!(
                "Analysis of '{}' returned {} characteristics",
                name,
                characteristics.len()
            );
        }

        Ok(AnalysisResult {
            name,
            category: self.category.unwrap_or_default().trim().to_string(),
            description: self.description.unwrap_or_default().trim().to_string(),
            part_names,
            facts,
            characteristics,
        })
    }
}

fn required_text(value: Option<String>, field: &str) -> Result<String, AiError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AiError::Malformed(format!("missing {}", field))),
    }
}

/// One part located by the vision capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPart {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub x: f32,
    pub y: f32,
}

/// Coordinate detection output, either a bare array or `{"parts": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDetection {
    List(Vec<DetectedPart>),
    Wrapped { parts: Vec<DetectedPart> },
}

/// Parse detected parts, returning an empty list for anything unreadable.
pub fn parse_detected_parts(text: &str) -> Vec<DetectedPart> {
    match serde_json::from_str::<RawDetection>(strip_code_fence(text)) {
        Ok(RawDetection::List(parts)) | Ok(RawDetection::Wrapped { parts }) => parts
            .into_iter()
            .filter(|p| p.x.is_finite() && p.y.is_finite())
            .collect(),
        Err(e) => {
            tracing::warn!("Discarding unreadable coordinate response: {}", e);
            Vec::new()
        }
    }
}

/// Strip a leading ```json fence and trailing ``` if present.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
