pub mod compatible;
pub mod openai;
pub mod scripted;
pub mod traits;

use crate::config::{ProviderConfig, ProviderKind};
use std::sync::Arc;

pub use traits::{CompletionClient, CompletionRequest, TransportError};

/// Builds the completion client selected by configuration.
pub fn build_client(config: &ProviderConfig) -> Result<Arc<dyn CompletionClient>, TransportError> {
    log::info!(
        "Using {} completion provider with model {} ({:?} per call)",
        config.name,
        config.model,
        config.request_timeout
    );

    let client: Arc<dyn CompletionClient> = match config.kind {
        ProviderKind::OpenAI => Arc::new(openai::OpenAIProvider::new(
            config.api_key.clone(),
            config.model.clone(),
            Some(config.api_url.clone()),
            config.request_timeout,
        )?),
        ProviderKind::Compatible => Arc::new(compatible::CompatibleProvider::new(
            config.api_key.clone(),
            config.api_url.clone(),
            config.model.clone(),
            config.request_timeout,
        )?),
    };
    Ok(client)
}
