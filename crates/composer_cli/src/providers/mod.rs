use std::path::Path;
use std::sync::Arc;

use composer::ComposerConfig;
use generation::{GenerationProvider, ProviderInitError};
use generation_chat_api::{ChatApiProvider, ChatApiProviderConfig, CHAT_API_PROVIDER_ID};
use generation_mock::{ScriptedProvider, MOCK_PROVIDER_ID};

pub fn provider_from_config(
    config: &ComposerConfig,
) -> Result<Arc<dyn GenerationProvider>, ProviderInitError> {
    provider_for_id(
        config.provider.as_str(),
        config.chat_api_config_path.as_deref(),
    )
}

pub fn provider_for_id(
    provider_id: &str,
    chat_api_config_path: Option<&Path>,
) -> Result<Arc<dyn GenerationProvider>, ProviderInitError> {
    match provider_id {
        MOCK_PROVIDER_ID => Ok(Arc::new(ScriptedProvider::default())),
        CHAT_API_PROVIDER_ID => {
            let path = chat_api_config_path.ok_or_else(|| {
                ProviderInitError::new(format!(
                    "Provider '{CHAT_API_PROVIDER_ID}' needs a JSON config file path"
                ))
            })?;
            let config = ChatApiProviderConfig::load(path)?;
            Ok(Arc::new(ChatApiProvider::new(config)?))
        }
        unknown => Err(ProviderInitError::new(format!(
            "Unsupported provider '{unknown}'. Available providers: {MOCK_PROVIDER_ID}, {CHAT_API_PROVIDER_ID}"
        ))),
    }
}
