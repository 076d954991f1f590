mod chat;

use std::sync::Arc;

use anyhow::Result;
use oreno_core::{Controller, OpenAiProvider, OrenoAgentBuilder, OrenoConfig, ToolRegistry};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = OrenoConfig::load()?;
    if config.api_key.is_empty() {
        anyhow::bail!(
            "no API key configured: set OPENAI_API_KEY (or ORENO_API_KEY), \
             or add \"api_key\" to {}",
            OrenoConfig::resolve_path("config.json").display()
        );
    }

    let provider = Arc::new(OpenAiProvider::from_config(&config));
    let agent = OrenoAgentBuilder::new(config.clone(), provider)
        .registry(ToolRegistry::builtin())
        .build();
    let banner = chat::Banner {
        model: config.model.clone(),
        tools: agent.tool_names().join(", "),
    };
    let controller = Controller::new(agent.clone(), tokio::runtime::Handle::current());

    chat::run(controller, agent, banner, config.poll_interval_ms).await
}
