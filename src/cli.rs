//! CLI parser
use clap::{Args, Parser, Subcommand};
use std::num::NonZeroU16;
use std::path::PathBuf;

use crate::constants::{
    CHUNK_SIZE, DEFAULT_CHAT_ENDPOINT, DEFAULT_CHAT_MODEL, DEFAULT_HF_BASE_URL,
    DEFAULT_IMAGE_MODEL, DEFAULT_TITLE, FALLBACK_IMAGE_MODEL,
};

#[derive(Parser, Debug)]
#[command(name = "mangamaker", version)]
/// Turn prose into manga pages
pub struct CliOptions {
    #[clap(long, help = "Enable debug logging", env = "MANGAMAKER_DEBUG")]
    /// Enable debug logging. Env: MANGAMAKER_DEBUG
    pub debug: bool,

    #[clap(long, default_value = "context.json", env = "MANGAMAKER_CONTEXT_FILE")]
    /// Progress document, defaults to `context.json` in the working directory.
    /// Env: MANGAMAKER_CONTEXT_FILE
    pub context_file: PathBuf,

    #[clap(long, default_value = "./output", env = "MANGAMAKER_OUTPUT_DIR")]
    /// Where finished pages are written.
    /// Env: MANGAMAKER_OUTPUT_DIR
    pub output_dir: PathBuf,

    #[clap(flatten)]
    /// Remote service settings
    pub services: ServiceOptions,

    #[command(subcommand)]
    /// What to do
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
/// Remote endpoints, models and credentials
pub struct ServiceOptions {
    #[clap(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    /// Credential for the chat completion service. Env: OPENROUTER_API_KEY
    pub openrouter_api_key: Option<String>,

    #[clap(long, default_value = DEFAULT_CHAT_ENDPOINT, env = "MANGAMAKER_CHAT_ENDPOINT")]
    /// Chat completion endpoint. Env: MANGAMAKER_CHAT_ENDPOINT
    pub chat_endpoint: String,

    #[clap(long, default_value = DEFAULT_CHAT_MODEL, env = "MANGAMAKER_CHAT_MODEL")]
    /// Model used to plan page layouts. Env: MANGAMAKER_CHAT_MODEL
    pub chat_model: String,

    #[clap(long, env = "HF_API_KEY", hide_env_values = true)]
    /// Credential for the text-to-image service. Env: HF_API_KEY
    pub hf_api_key: Option<String>,

    #[clap(long, default_value = DEFAULT_HF_BASE_URL, env = "MANGAMAKER_HF_BASE_URL")]
    /// Text-to-image inference base URL. Env: MANGAMAKER_HF_BASE_URL
    pub hf_base_url: String,

    #[clap(long, default_value = DEFAULT_IMAGE_MODEL, env = "MANGAMAKER_IMAGE_MODEL")]
    /// Primary image model. Env: MANGAMAKER_IMAGE_MODEL
    pub image_model: String,

    #[clap(
        long,
        default_value = FALLBACK_IMAGE_MODEL,
        env = "MANGAMAKER_FALLBACK_IMAGE_MODEL"
    )]
    /// Image model tried when the primary fails. Env: MANGAMAKER_FALLBACK_IMAGE_MODEL
    pub fallback_image_model: String,
}

#[derive(Subcommand, Debug)]
/// Subcommands
pub enum Command {
    /// Generate one page per scene of the input story
    Generate {
        #[clap(long, short, default_value = "input/chapter_input.txt")]
        /// Plain-text story to illustrate
        input: PathBuf,
        #[clap(long, default_value_t = CHUNK_SIZE)]
        /// Approximate scene length in characters
        chunk_size: usize,
    },
    /// Create the progress document if it doesn't exist yet
    Init {
        #[clap(long, short, default_value = DEFAULT_TITLE)]
        /// Story title
        title: String,
    },
    /// Print the progress document
    Status,
    /// Serve the browser UI
    Serve {
        #[clap(long, short, default_value = "9000", env = "MANGAMAKER_PORT")]
        /// http listener, defaults to `9000`.
        /// Env: MANGAMAKER_PORT
        port: NonZeroU16,
        #[clap(
            long,
            short,
            default_value = "127.0.0.1",
            env = "MANGAMAKER_LISTEN_ADDRESS"
        )]
        /// Listen address, defaults to `127.0.0.1`.
        /// Env: MANGAMAKER_LISTEN_ADDRESS
        listen_address: String,
    },
}
