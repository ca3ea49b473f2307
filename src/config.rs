//! Config handling

use std::path::PathBuf;

use tracing::log::LevelFilter;
use url::Url;

use crate::cli::{CliOptions, ServiceOptions};
use crate::constants::APP_TITLE;
use crate::error::MangaError;

/// Sets up logging based on the debug flag
pub fn setup_logging(debug: bool) -> Result<(), Box<std::io::Error>> {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut logger = simple_logger::SimpleLogger::new().with_level(level);
    if !debug {
        logger = logger
            .with_module_level("tracing", LevelFilter::Warn)
            .with_module_level("reqwest", LevelFilter::Warn)
            .with_module_level("rustls", LevelFilter::Info)
            .with_module_level("hyper_util", LevelFilter::Info)
            .with_module_level("h2", LevelFilter::Info)
            .with_module_level("tower_http", LevelFilter::Info);
    }
    logger.init().map_err(|err| {
        eprintln!("Failed to initialize logger: {}", err);
        Box::new(std::io::Error::other(err))
    })
}

/// Where and how to reach the chat completion service.
#[derive(Clone, Debug)]
pub struct ChatSettings {
    /// Full chat completion URL
    pub endpoint: Url,
    /// Model id sent in the request body
    pub model: String,
    /// Bearer credential, requests go out unauthenticated without one
    pub api_key: Option<String>,
}

/// Where and how to reach the text-to-image service.
#[derive(Clone, Debug)]
pub struct ImageSettings {
    /// Base URL, a model is addressed as `{base_url}/models/{model}`
    pub base_url: Url,
    /// Primary model
    pub model: String,
    /// Tried once if the primary model fails
    pub fallback_model: String,
    /// Bearer credential
    pub api_key: Option<String>,
}

/// Everything the pipeline and the drivers need to know.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// Chat completion settings
    pub chat: ChatSettings,
    /// Image generation settings
    pub images: ImageSettings,
    /// Progress document path
    pub context_file: PathBuf,
    /// Page artifact directory
    pub output_dir: PathBuf,
}

impl ServiceConfig {
    /// Builds the config from parsed CLI options, validating the endpoints.
    pub fn from_cli(cli: &CliOptions) -> Result<Self, MangaError> {
        Self::from_parts(&cli.services, cli.context_file.clone(), cli.output_dir.clone())
    }

    /// Builds the config from service options and local paths.
    pub fn from_parts(
        services: &ServiceOptions,
        context_file: PathBuf,
        output_dir: PathBuf,
    ) -> Result<Self, MangaError> {
        Ok(Self {
            chat: ChatSettings {
                endpoint: Url::parse(&services.chat_endpoint)?,
                model: services.chat_model.clone(),
                api_key: non_empty(services.openrouter_api_key.as_deref()),
            },
            images: ImageSettings {
                base_url: Url::parse(&services.hf_base_url)?,
                model: services.image_model.clone(),
                fallback_model: services.fallback_image_model.clone(),
                api_key: non_empty(services.hf_api_key.as_deref()),
            },
            context_file,
            output_dir,
        })
    }
}

/// HTTP client shared by the architect and the artist.
pub fn build_client() -> Result<reqwest::Client, MangaError> {
    let client = reqwest::Client::builder()
        .user_agent(format!("{APP_TITLE}/{}", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Trims a credential and drops it if nothing is left.
pub(crate) fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{DEFAULT_CHAT_ENDPOINT, DEFAULT_HF_BASE_URL};

    fn services() -> ServiceOptions {
        ServiceOptions {
            openrouter_api_key: Some("  ".to_string()),
            chat_endpoint: DEFAULT_CHAT_ENDPOINT.to_string(),
            chat_model: "chat".to_string(),
            hf_api_key: Some(" hf_token ".to_string()),
            hf_base_url: DEFAULT_HF_BASE_URL.to_string(),
            image_model: "primary".to_string(),
            fallback_image_model: "fallback".to_string(),
        }
    }

    #[test]
    fn blank_keys_are_dropped_and_keys_trimmed() {
        let config = ServiceConfig::from_parts(
            &services(),
            PathBuf::from("context.json"),
            PathBuf::from("output"),
        )
        .expect("valid config");
        assert_eq!(config.chat.api_key, None);
        assert_eq!(config.images.api_key.as_deref(), Some("hf_token"));
    }

    #[test]
    fn bad_endpoint_is_rejected() {
        let mut options = services();
        options.chat_endpoint = "not a url".to_string();
        let result = ServiceConfig::from_parts(
            &options,
            PathBuf::from("context.json"),
            PathBuf::from("output"),
        );
        assert!(matches!(result, Err(MangaError::InvalidUrl(_))));
    }
}
