use serde::{Deserialize, Serialize};

/// Where the exploration in flight currently is.
///
/// - `Idle`: Nothing running, nothing failed
/// - `Analyzing`: Identifying the subject and asking for its structure
/// - `RenderingAssembled`: Generating the assembled view (full mode)
/// - `RenderingDetails`: Generating cutaway and exploded views
/// - `Scanning`: Locating parts on the exploded view
/// - `Complete`: The current item is the result of the last request
/// - `Error`: The last request failed; `reset` returns to `Idle`
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStage {
    #[default]
    Idle,
    Analyzing,
    RenderingAssembled,
    RenderingDetails,
    Scanning,
    Complete,
    Error,
}

impl GenerationStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Analyzing => "analyzing",
            Self::RenderingAssembled => "rendering_assembled",
            Self::RenderingDetails => "rendering_details",
            Self::Scanning => "scanning",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

/// A progress report for the rendering surface.
///
/// `facts` is empty until analysis has produced them, after which every
/// report carries them so a caller can rotate through them while waiting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationStatus {
    pub stage: GenerationStage,
    pub message: String,
    #[serde(default)]
    pub facts: Vec<String>,
}

impl GenerationStatus {
    pub fn new(stage: GenerationStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            facts: Vec::new(),
        }
    }

    pub fn idle() -> Self {
        Self::default()
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(GenerationStage::Error, message)
    }

    pub fn with_facts(mut self, facts: &[String]) -> Self {
        self.facts = facts.to_vec();
        self
    }
}
