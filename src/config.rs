//! Environment configuration.

use std::env;
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::compose::{ComposerSettings, DEFAULT_MAX_TOKENS, DEFAULT_TITLE_MAX_TOKENS};

pub const PROVIDER_ENV: &str = "COMPOSER_PROVIDER";
pub const STORE_DIR_ENV: &str = "COMPOSER_STORE_DIR";
pub const MAX_TOKENS_ENV: &str = "COMPOSER_MAX_TOKENS";
pub const TITLE_MAX_TOKENS_ENV: &str = "COMPOSER_TITLE_MAX_TOKENS";
pub const CHAT_API_CONFIG_PATH_ENV: &str = "COMPOSER_CHAT_API_CONFIG_PATH";
pub const LOG_ENV: &str = "COMPOSER_LOG";

pub const DEFAULT_STORE_DIR: &str = ".composer/sessions";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    #[default]
    Mock,
    ChatApi,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::ChatApi => "chat-api",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "mock" => Some(Self::Mock),
            "chat-api" => Some(Self::ChatApi),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unsupported provider '{value}' in {key}; expected 'mock' or 'chat-api'")]
    UnsupportedProvider { key: &'static str, value: String },

    #[error("{key} must be a positive integer, got '{value}'")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{key} must be set when {provider_key}=chat-api")]
    MissingChatApiConfig {
        key: &'static str,
        provider_key: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposerConfig {
    pub provider: ProviderKind,
    pub store_dir: PathBuf,
    pub max_tokens: u32,
    pub title_max_tokens: u32,
    /// JSON config file for the chat-api provider.
    pub chat_api_config_path: Option<PathBuf>,
    /// Tracing filter directive.
    pub log_filter: Option<String>,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            store_dir: PathBuf::from(DEFAULT_STORE_DIR),
            max_tokens: DEFAULT_MAX_TOKENS,
            title_max_tokens: DEFAULT_TITLE_MAX_TOKENS,
            chat_api_config_path: None,
            log_filter: None,
        }
    }
}

impl ComposerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let provider = match env_string_opt(PROVIDER_ENV) {
            Some(value) => {
                ProviderKind::parse(&value).ok_or(ConfigError::UnsupportedProvider {
                    key: PROVIDER_ENV,
                    value,
                })?
            }
            None => ProviderKind::default(),
        };
        let chat_api_config_path = env_string_opt(CHAT_API_CONFIG_PATH_ENV).map(PathBuf::from);
        if provider == ProviderKind::ChatApi && chat_api_config_path.is_none() {
            return Err(ConfigError::MissingChatApiConfig {
                key: CHAT_API_CONFIG_PATH_ENV,
                provider_key: PROVIDER_ENV,
            });
        }

        Ok(Self {
            provider,
            store_dir: env_string_opt(STORE_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR)),
            max_tokens: env_u32(MAX_TOKENS_ENV, DEFAULT_MAX_TOKENS)?,
            title_max_tokens: env_u32(TITLE_MAX_TOKENS_ENV, DEFAULT_TITLE_MAX_TOKENS)?,
            chat_api_config_path,
            log_filter: env_string_opt(LOG_ENV),
        })
    }

    pub fn settings(&self) -> ComposerSettings {
        ComposerSettings {
            max_tokens: self.max_tokens,
            title_max_tokens: self.title_max_tokens,
        }
    }
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

fn env_u32(key: &'static str, default: u32) -> Result<u32, ConfigError> {
    let Some(value) = env_string_opt(key) else {
        return Ok(default);
    };
    match value.trim().parse::<u32>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(ConfigError::InvalidNumber { key, value }),
    }
}
