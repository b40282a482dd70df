use serde::{Deserialize, Serialize};

/// How many views the synthesis stage produces.
///
/// - `Fast`: Only the exploded view
/// - `Full`: Assembled view first, then cutaway and exploded from it
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    Fast,
    #[default]
    Full,
}

impl GenerationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Full => "full",
        }
    }
}

impl std::str::FromStr for GenerationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "full" => Ok(Self::Full),
            _ => Err(format!("Unknown generation mode: {}", s)),
        }
    }
}

/// Options for one exploration.
///
/// `style`, `perspective` and `detail` are free-form hints forwarded to the
/// generative service; the engine never interprets them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub mode: GenerationMode,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub perspective: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl GenerationConfig {
    pub fn with_mode(mode: GenerationMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }
}
