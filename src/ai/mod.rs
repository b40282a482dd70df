//! The generative AI capability consumed by the pipeline.
//!
//! The engine only depends on [`AiCapability`]. [`GeminiClient`] is the
//! shipped implementation; tests substitute scripted fakes.

mod client;
pub mod prompts;
mod types;

pub use client::*;
pub use types::*;

use async_trait::async_trait;

use crate::models::{GenerationConfig, Image};

/// What the pipeline needs from a text/vision/image-generation service.
///
/// `identify_object` and `analyze` report failures; `generate_image` and
/// `detect_coordinates` never do, because the pipeline has a fallback for
/// both and treats a missing result as a normal outcome.
#[async_trait]
pub trait AiCapability: Send + Sync {
    /// Name the single main object in a photo.
    async fn identify_object(&self, image: &Image) -> Result<String, AiError>;

    /// Describe `query` as a decomposable object.
    async fn analyze(
        &self,
        query: &str,
        config: &GenerationConfig,
    ) -> Result<AnalysisResult, AiError>;

    /// Render `prompt`, optionally conditioned on a reference image.
    async fn generate_image(&self, prompt: &str, reference: Option<&Image>) -> Option<Image>;

    /// Locate each named part on `image`. Empty when detection fails.
    async fn detect_coordinates(&self, image: &Image, part_names: &[String]) -> Vec<DetectedPart>;
}
