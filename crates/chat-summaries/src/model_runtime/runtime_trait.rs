use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One text-generation call: a system instruction, a user prompt and an
/// output budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub system: String,
    pub prompt: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_tokens() -> u32 { 2048 }
fn default_temperature() -> f32 { 0.0 }

impl GenerationRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            max_tokens,
            temperature: default_temperature(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub text: String,
    /// Completion tokens reported by the backend, if it reports usage.
    pub completion_tokens: Option<i64>,
}

/// Opaque text-generation capability. Implementations may fail; callers
/// decide how to recover.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> anyhow::Result<GenerationOutput>;

    /// Short name used in log lines.
    fn name(&self) -> &str {
        "text-generator"
    }
}
