//! Shared constants/defaults for things
//!

use std::path::PathBuf;
use std::sync::LazyLock;

/// Page canvas width in pixels
pub const CANVAS_WIDTH: u32 = 1240;
/// Page canvas height in pixels
pub const CANVAS_HEIGHT: u32 = 1754;
/// Outer margin between the canvas edge and the panels
pub const PAGE_MARGIN: u32 = 50;
/// Gap between neighbouring panels
pub const PANEL_GAP: u32 = 20;
/// Width of the black outline drawn over every panel
pub const BORDER_WIDTH: u32 = 5;

/// Size of the square placeholder used when a panel can't be generated.
pub const PLACEHOLDER_SIZE: u32 = 512;

/// How many panel images are requested at the same time.
pub const PANEL_CONCURRENCY: usize = 4;

/// Target scene length when chunking a story, in characters.
pub const CHUNK_SIZE: usize = 1500;

/// Default chat completion endpoint.
pub const DEFAULT_CHAT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
/// Default chat model for blueprints.
pub const DEFAULT_CHAT_MODEL: &str = "meta-llama/llama-3.3-70b-instruct:free";
/// Sampling temperature for blueprint requests.
pub const CHAT_TEMPERATURE: f32 = 0.7;

/// Default text-to-image inference base URL; models live under `/models/{id}`.
pub const DEFAULT_HF_BASE_URL: &str = "https://router.huggingface.co/hf-inference";
/// Primary text-to-image model.
pub const DEFAULT_IMAGE_MODEL: &str = "stabilityai/stable-diffusion-xl-base-1.0";
/// Tried once when the primary model fails.
pub const FALLBACK_IMAGE_MODEL: &str = "CompVis/stable-diffusion-v1-4";

/// Appended to every panel description before it's sent to the image model.
pub const STYLE_SUFFIX: &str = ", Seinen style, heavy cross-hatching, dramatic high contrast shadows, intricate details, manga aesthetic, black and white, masterpiece by Kentaro Miura, ink drawing";

/// Title used when the progress document is created implicitly.
pub const DEFAULT_TITLE: &str = "My Manga Story";

/// Sent as `HTTP-Referer`, OpenRouter wants one.
pub const APP_REFERER: &str = "http://localhost:3000";
/// Sent as `X-Title`.
pub const APP_TITLE: &str = "Manga Maker";

/// The default place we put finished pages
pub static OUTPUT_DIR: LazyLock<PathBuf> = LazyLock::new(|| PathBuf::from("./output"));

/// The default progress document
pub static CONTEXT_FILE: LazyLock<PathBuf> = LazyLock::new(|| PathBuf::from("context.json"));

/// The default story input
pub static INPUT_FILE: LazyLock<PathBuf> =
    LazyLock::new(|| PathBuf::from("input/chapter_input.txt"));

/// Max age (in seconds) for page cache entries.
pub const PAGE_CACHE_MAX_AGE_SECONDS: u64 = 60 * 60;

/// Cache-Control value for page responses.
pub static PAGE_CACHE_CONTROL: LazyLock<String> =
    LazyLock::new(|| format!("private, max-age={}", PAGE_CACHE_MAX_AGE_SECONDS));
