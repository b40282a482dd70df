//! Errors surfaced by the exploration engine.

use thiserror::Error;
use uuid::Uuid;

/// Why an exploration action did not complete.
///
/// `IdentificationFailed`, `AnalysisFailed` and `OfflineBlocked` abort a
/// request. `SynthesisUnavailable` and `ScanUnavailable` are normally absorbed
/// by fallbacks; `SynthesisUnavailable` only aborts in fast mode, where the
/// exploded view is mandatory. `PersistenceFailed` is logged and never
/// returned from a state change that has already been exposed.
#[derive(Debug, Error)]
pub enum ExploreError {
    #[error("Could not identify the object in the image: {0}")]
    IdentificationFailed(String),

    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("Image generation unavailable")]
    SynthesisUnavailable,

    #[error("Part scan unavailable")]
    ScanUnavailable,

    #[error("Cannot generate while offline: configure an API key to explore new parts")]
    OfflineBlocked,

    #[error("Persistence failed: {0}")]
    PersistenceFailed(String),

    #[error("Import payload malformed: {0}")]
    ImportMalformed(String),

    #[error("An exploration is already in progress")]
    Busy,

    #[error("Item not found: {0}")]
    NotFound(Uuid),
}

pub type Result<T> = std::result::Result<T, ExploreError>;
