use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    #[default]
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningSummary {
    Auto,
    Concise,
    #[default]
    Detailed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrenoConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub reasoning_effort: ReasoningEffort,
    #[serde(default)]
    pub reasoning_summary: ReasoningSummary,
    /// Upper bound on provider rounds (tool call → follow-up) per prompt.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    /// Tool output beyond this many characters is cut before the model sees it.
    #[serde(default = "default_max_tool_output_chars")]
    pub max_tool_output_chars: usize,
    /// How often the front end polls the transcript.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_model() -> String {
    std::env::var("ORENO_MODEL").unwrap_or_else(|_| "gpt-5-nano".to_string())
}

fn default_base_url() -> String {
    std::env::var("ORENO_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string())
}

fn default_api_key() -> String {
    std::env::var("ORENO_API_KEY")
        .or_else(|_| std::env::var("OPENAI_API_KEY"))
        .unwrap_or_default()
}

fn default_max_turns() -> usize {
    16
}

fn default_max_tool_output_chars() -> usize {
    20_000
}

fn default_poll_interval_ms() -> u64 {
    50
}

impl Default for OrenoConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            api_key: default_api_key(),
            reasoning_effort: ReasoningEffort::default(),
            reasoning_summary: ReasoningSummary::default(),
            max_turns: default_max_turns(),
            max_tool_output_chars: default_max_tool_output_chars(),
            poll_interval_ms: default_poll_interval_ms(),
            system_prompt: None,
        }
    }
}

impl OrenoConfig {
    /// Defaults, then `~/.oreno/config.json`, then `./.oreno.json` on top.
    pub fn load() -> Result<Self> {
        let local_path = std::env::current_dir()
            .ok()
            .map(|d| d.join(".oreno.json"));
        Self::load_from(&Self::resolve_path("config.json"), local_path.as_deref())
    }

    pub fn load_from(global: &Path, local: Option<&Path>) -> Result<Self> {
        let mut config = if global.exists() {
            let data = std::fs::read_to_string(global)?;
            serde_json::from_str::<OrenoConfig>(&data)?
        } else {
            OrenoConfig::default()
        };

        if config.api_key.is_empty() {
            config.api_key = default_api_key();
        }

        if let Some(local) = local.filter(|p| p.exists()) {
            let data = std::fs::read_to_string(local)?;
            let override_val: serde_json::Value = serde_json::from_str(&data)?;
            let mut base = serde_json::to_value(&config)?;
            if let (Some(base_obj), Some(over_obj)) =
                (base.as_object_mut(), override_val.as_object())
            {
                for (k, v) in over_obj {
                    base_obj.insert(k.clone(), v.clone());
                }
            }
            config = serde_json::from_value(base)?;
        }

        Ok(config)
    }

    pub fn resolve_path(relative: &str) -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".oreno")
            .join(relative)
    }
}
