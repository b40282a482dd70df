//! The identify → analyze → synthesize → scan pipeline.
//!
//! One [`Pipeline::run`] call turns a query (or a photo) into a compiled
//! [`Item`]. Progress is reported through a callback after each stage. Stage
//! failures that have a fallback are absorbed here; the rest end the run with
//! an error and nothing is returned.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::ai::{prompts, AiCapability, AnalysisResult, DetectedPart};
use crate::context::build_query_from_names;
use crate::error::{ExploreError, Result};
use crate::models::*;
use crate::tree::names_match;

/// Description given to parts placed without a successful scan.
pub const UNAVAILABLE_DESCRIPTION: &str = "Visual details unavailable";

/// Input for one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct ExploreRequest {
    /// What the user asked to explore. Replaced by the identified name when
    /// `reference_image` is set.
    pub query: String,
    /// Names along the navigation path, root first, ending at the parent.
    pub lineage: Vec<String>,
    pub reference_image: Option<Image>,
    /// Depth the compiled item will sit at.
    pub depth: u32,
}

impl ExploreRequest {
    pub fn root(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

/// Receives progress reports while a run is in flight.
pub type Progress<'a> = &'a (dyn Fn(GenerationStatus) + Send + Sync);

/// Runs exploration requests against an AI capability.
#[derive(Clone)]
pub struct Pipeline {
    ai: Arc<dyn AiCapability>,
    config: GenerationConfig,
}

impl Pipeline {
    pub fn new(ai: Arc<dyn AiCapability>, config: GenerationConfig) -> Self {
        Self { ai, config }
    }

    /// Run every stage for `request`.
    ///
    /// The returned item is its own root (`root_id == id`, no parent, no
    /// children); attaching it somewhere is the caller's decision.
    pub async fn run(&self, request: ExploreRequest, progress: Progress<'_>) -> Result<Item> {
        let subject = match &request.reference_image {
            Some(image) => {
                progress(GenerationStatus::new(
                    GenerationStage::Analyzing,
                    "Identifying object...",
                ));
                self.identify(image).await?
            }
            None => request.query.trim().to_string(),
        };
        if subject.is_empty() {
            return Err(ExploreError::AnalysisFailed("empty query".to_string()));
        }

        let query = build_query_from_names(&request.lineage, &subject);
        progress(GenerationStatus::new(
            GenerationStage::Analyzing,
            format!("Analyzing {}...", query),
        ));
        let analysis = self.analyze(&query).await?;
        let facts = analysis.facts.clone();

        let part_names = prompts::filter_parts(&analysis.name, &analysis.part_names);
        let images = self
            .synthesize(&analysis.name, &part_names, &facts, progress)
            .await?;

        progress(
            GenerationStatus::new(
                GenerationStage::Scanning,
                format!("Locating {} parts...", part_names.len()),
            )
            .with_facts(&facts),
        );
        let exploded = images.as_ref().and_then(|set| set.exploded.as_ref());
        let parts = self.scan(exploded, &part_names).await;

        tracing::info!(
            "Compiled '{}' with {} parts ({} views)",
            analysis.name,
            parts.len(),
            images.as_ref().map(count_views).unwrap_or(0)
        );
        Ok(compile(analysis, images, parts, request.depth))
    }

    async fn identify(&self, image: &Image) -> Result<String> {
        let name = self
            .ai
            .identify_object(image)
            .await
            .map_err(|e| ExploreError::IdentificationFailed(e.to_string()))?;
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(ExploreError::IdentificationFailed(
                "no object recognized".to_string(),
            ));
        }
        tracing::info!("Identified reference image as '{}'", name);
        Ok(name)
    }

    async fn analyze(&self, query: &str) -> Result<AnalysisResult> {
        self.ai
            .analyze(query, &self.config)
            .await
            .map_err(|e| ExploreError::AnalysisFailed(e.to_string()))
    }

    /// Produce the views for the configured mode.
    ///
    /// Fast mode must yield an exploded view. Full mode yields no views at all
    /// when the assembled render fails, and otherwise fills a failed cutaway
    /// or exploded render with the assembled image.
    async fn synthesize(
        &self,
        subject: &str,
        part_names: &[String],
        facts: &[String],
        progress: Progress<'_>,
    ) -> Result<Option<ImageSet>> {
        match self.config.mode {
            GenerationMode::Fast => {
                progress(
                    GenerationStatus::new(
                        GenerationStage::RenderingDetails,
                        "Rendering exploded view...",
                    )
                    .with_facts(facts),
                );
                let prompt = prompts::exploded_prompt(subject, part_names, &self.config);
                let exploded = self
                    .ai
                    .generate_image(&prompt, None)
                    .await
                    .ok_or(ExploreError::SynthesisUnavailable)?;
                Ok(Some(ImageSet {
                    exploded: Some(exploded),
                    ..Default::default()
                }))
            }
            GenerationMode::Full => {
                progress(
                    GenerationStatus::new(
                        GenerationStage::RenderingAssembled,
                        "Rendering assembled view...",
                    )
                    .with_facts(facts),
                );
                let prompt = prompts::assembled_prompt(subject, &self.config);
                let Some(assembled) = self.ai.generate_image(&prompt, None).await else {
                    tracing::warn!("{} for '{}'", ExploreError::SynthesisUnavailable, subject);
                    return Ok(None);
                };

                progress(
                    GenerationStatus::new(
                        GenerationStage::RenderingDetails,
                        "Rendering cutaway and exploded views...",
                    )
                    .with_facts(facts),
                );
                let cutaway_prompt = prompts::cutaway_prompt(subject, part_names, &self.config);
                let exploded_prompt = prompts::exploded_prompt(subject, part_names, &self.config);
                let (cutaway, exploded) = tokio::join!(
                    self.ai.generate_image(&cutaway_prompt, Some(&assembled)),
                    self.ai.generate_image(&exploded_prompt, Some(&assembled)),
                );

                if cutaway.is_none() {
                    tracing::warn!("Cutaway render failed for '{}', reusing assembled", subject);
                }
                if exploded.is_none() {
                    tracing::warn!("Exploded render failed for '{}', reusing assembled", subject);
                }
                Ok(Some(ImageSet {
                    cutaway: Some(cutaway.unwrap_or_else(|| assembled.clone())),
                    exploded: Some(exploded.unwrap_or_else(|| assembled.clone())),
                    assembled: Some(assembled),
                }))
            }
        }
    }

    /// Locate parts on the exploded view, falling back to stacked placement.
    async fn scan(&self, exploded: Option<&Image>, part_names: &[String]) -> Vec<Part> {
        let detected = match exploded {
            Some(image) if !part_names.is_empty() => {
                self.ai.detect_coordinates(image, part_names).await
            }
            _ => Vec::new(),
        };

        if detected.is_empty() {
            if !part_names.is_empty() {
                tracing::warn!("{}, using stacked placement", ExploreError::ScanUnavailable);
            }
            return synthetic_parts(part_names);
        }

        part_names
            .iter()
            .enumerate()
            .map(|(index, name)| match match_detection(name, &detected) {
                Some(found) => Part {
                    id: Uuid::new_v4(),
                    name: name.clone(),
                    description: if found.description.trim().is_empty() {
                        UNAVAILABLE_DESCRIPTION.to_string()
                    } else {
                        found.description.trim().to_string()
                    },
                    x: found.x.clamp(0.0, 100.0),
                    y: found.y.clamp(0.0, 100.0),
                },
                None => synthetic_part(index, name),
            })
            .collect()
    }
}

/// Prefer an exact (case-insensitive) name, then containment either way.
fn match_detection<'a>(name: &str, detected: &'a [DetectedPart]) -> Option<&'a DetectedPart> {
    detected
        .iter()
        .find(|d| d.name.trim().eq_ignore_ascii_case(name.trim()))
        .or_else(|| detected.iter().find(|d| names_match(&d.name, name)))
}

/// Stacked placement used when no scan is available.
pub fn synthetic_parts(part_names: &[String]) -> Vec<Part> {
    part_names
        .iter()
        .enumerate()
        .map(|(index, name)| synthetic_part(index, name))
        .collect()
}

fn synthetic_part(index: usize, name: &str) -> Part {
    Part {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: UNAVAILABLE_DESCRIPTION.to_string(),
        x: 50.0,
        y: 50.0 + 10.0 * index as f32,
    }
}

fn count_views(images: &ImageSet) -> usize {
    [&images.assembled, &images.cutaway, &images.exploded]
        .iter()
        .filter(|view| view.is_some())
        .count()
}

fn compile(
    analysis: AnalysisResult,
    images: Option<ImageSet>,
    parts: Vec<Part>,
    depth: u32,
) -> Item {
    let id = Uuid::new_v4();
    Item {
        id,
        root_id: id,
        parent_id: None,
        name: analysis.name,
        category: analysis.category,
        description: analysis.description,
        facts: analysis.facts,
        characteristics: analysis.characteristics,
        images,
        parts,
        depth,
        timestamp: Utc::now(),
        children: Vec::new(),
    }
}
