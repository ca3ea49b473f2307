//! Panel images from a remote text-to-image service.
//!
//! Each panel tries an ordered list of providers (primary model, then the
//! fallback model). Panels render concurrently, at most
//! [`PANEL_CONCURRENCY`] at a time, and each one degrades to a placeholder
//! on its own.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use image::{Rgb, RgbImage};
use reqwest::StatusCode;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::blueprint::PanelSpec;
use crate::config::{ImageSettings, non_empty};
use crate::constants::{PANEL_CONCURRENCY, PLACEHOLDER_SIZE, STYLE_SUFFIX};

/// Placeholder when every provider failed for a panel.
pub const FAILED_PANEL_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
/// Placeholder when rendering a panel blew up unexpectedly.
pub const CRASHED_PANEL_COLOR: Rgb<u8> = Rgb([128, 128, 128]);

/// Outcome of asking one provider for one image.
#[derive(Debug)]
pub enum Attempt {
    /// The provider delivered
    Rendered(RgbImage),
    /// The provider failed, and why
    Failed {
        /// Provider name
        provider: String,
        /// Human readable reason
        reason: String,
    },
}

/// Something that can turn a prompt into a bitmap.
pub trait ImageProvider: Send + Sync {
    /// Name used in logs, usually the model id.
    fn name(&self) -> &str;

    /// Renders `prompt`. Failures are reported through [`Attempt::Failed`].
    fn generate(&self, prompt: &str) -> impl Future<Output = Attempt> + Send;
}

/// Tries `providers` in order and stops at the first image.
///
/// With no providers, or when all of them fail, the last failure comes back.
pub async fn first_success<P: ImageProvider>(providers: &[P], prompt: &str) -> Attempt {
    let mut last = Attempt::Failed {
        provider: "none".to_string(),
        reason: "no image providers configured".to_string(),
    };
    for provider in providers {
        debug!("Trying image provider {}", provider.name());
        match provider.generate(prompt).await {
            Attempt::Rendered(image) => return Attempt::Rendered(image),
            Attempt::Failed { provider, reason } => {
                warn!("Artist error with {provider}: {reason}");
                last = Attempt::Failed { provider, reason };
            }
        }
    }
    last
}

/// A solid square used in place of a panel that couldn't be rendered.
pub fn placeholder(color: Rgb<u8>) -> RgbImage {
    RgbImage::from_pixel(PLACEHOLDER_SIZE, PLACEHOLDER_SIZE, color)
}

#[derive(Serialize, Debug)]
struct InferenceRequest<'a> {
    inputs: &'a str,
}

/// One model on a Hugging Face style inference endpoint:
/// `POST {base_url}/models/{model}` with `{"inputs": prompt}`, image bytes back.
#[derive(Clone, Debug)]
pub struct InferenceModel {
    client: reqwest::Client,
    base_url: Url,
    model: String,
    api_key: Option<String>,
}

impl InferenceModel {
    /// New provider for `model`.
    pub fn new(
        client: reqwest::Client,
        base_url: Url,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url,
            model: model.into(),
            api_key,
        }
    }

    /// The URL requests for this model go to.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/models/{}",
            self.base_url.as_str().trim_end_matches('/'),
            self.model
        )
    }

    async fn request(&self, prompt: &str) -> Result<RgbImage> {
        let mut request = self
            .client
            .post(self.endpoint())
            .json(&InferenceRequest { inputs: prompt });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request
            .send()
            .await
            .with_context(|| format!("Request to {} failed", self.endpoint()))?;
        let status = resp.status();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(anyhow!(
                "Model {} is currently loading, try again in a moment",
                self.model
            ));
        }
        let bytes = resp
            .bytes()
            .await
            .context("Failed reading the image response body")?;
        if !status.is_success() {
            return Err(anyhow!(
                "Image API error {status}: {}",
                String::from_utf8_lossy(&bytes)
            ));
        }

        let image = image::load_from_memory(&bytes).context("Failed to decode image bytes")?;
        Ok(image.to_rgb8())
    }
}

impl ImageProvider for InferenceModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Attempt {
        match self.request(prompt).await {
            Ok(image) => Attempt::Rendered(image),
            Err(err) => Attempt::Failed {
                provider: self.model.clone(),
                reason: format!("{err:#}"),
            },
        }
    }
}

/// Renders every panel of a blueprint.
#[derive(Debug)]
pub struct Artist<P> {
    providers: Arc<Vec<P>>,
    concurrency: usize,
}

impl Artist<InferenceModel> {
    /// Primary then fallback model from `settings`. `api_key` and `model`
    /// override the configured credential and primary model when given.
    pub fn from_settings(
        client: &reqwest::Client,
        settings: &ImageSettings,
        api_key: Option<&str>,
        model: Option<&str>,
    ) -> Self {
        let api_key = non_empty(api_key).or_else(|| settings.api_key.clone());
        let primary = non_empty(model).unwrap_or_else(|| settings.model.clone());

        let mut models = vec![primary];
        if !models.contains(&settings.fallback_model) {
            models.push(settings.fallback_model.clone());
        }
        let providers = models
            .into_iter()
            .map(|model| {
                InferenceModel::new(
                    client.clone(),
                    settings.base_url.clone(),
                    model,
                    api_key.clone(),
                )
            })
            .collect();
        Self::new(providers)
    }
}

impl<P: ImageProvider + 'static> Artist<P> {
    /// Artist trying `providers` in order for each panel.
    pub fn new(providers: Vec<P>) -> Self {
        Self {
            providers: Arc::new(providers),
            concurrency: PANEL_CONCURRENCY,
        }
    }

    /// Providers in the order they're tried.
    pub fn providers(&self) -> &[P] {
        &self.providers
    }

    /// Renders all `panels`, at most [`PANEL_CONCURRENCY`] at a time.
    ///
    /// The result has an entry for every panel id, placeholders included.
    pub async fn generate_page_panels(&self, panels: &[PanelSpec]) -> BTreeMap<u32, RgbImage> {
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(panels.len());

        for panel in panels {
            let providers = Arc::clone(&self.providers);
            let permits = Arc::clone(&permits);
            let panel = panel.clone();
            let handle = tokio::spawn(async move {
                let _permit = permits.acquire_owned().await;
                let preview: String = panel.description.chars().take(30).collect();
                info!("Artist generating panel {}: {preview}...", panel.id);
                let prompt = format!("{}{}", panel.description, STYLE_SUFFIX);
                match first_success(&providers, &prompt).await {
                    Attempt::Rendered(image) => image,
                    Attempt::Failed { .. } => {
                        warn!("Panel {} failed on every model, using a placeholder", panel.id);
                        placeholder(FAILED_PANEL_COLOR)
                    }
                }
            });
            handles.push((panel.id, handle));
        }

        let mut results = BTreeMap::new();
        for (id, handle) in handles {
            let image = match handle.await {
                Ok(image) => image,
                Err(err) => {
                    error!("Panel {id} generated an exception: {err}");
                    placeholder(CRASHED_PANEL_COLOR)
                }
            };
            results.insert(id, image);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use axum::Router;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::post;

    use super::*;
    use crate::testing::{closed_url, png_bytes, spawn_mock};

    #[derive(Default)]
    struct Scripted {
        name: &'static str,
        color: Option<[u8; 3]>,
        calls: AtomicUsize,
    }

    impl ImageProvider for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        async fn generate(&self, _prompt: &str) -> Attempt {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.color {
                Some(color) => Attempt::Rendered(RgbImage::from_pixel(8, 8, Rgb(color))),
                None => Attempt::Failed {
                    provider: self.name.to_string(),
                    reason: "scripted failure".to_string(),
                },
            }
        }
    }

    struct Exploding;

    impl ImageProvider for Exploding {
        fn name(&self) -> &str {
            "exploding"
        }

        #[allow(clippy::panic)]
        async fn generate(&self, prompt: &str) -> Attempt {
            if prompt.starts_with("boom") {
                panic!("provider exploded");
            }
            Attempt::Rendered(RgbImage::from_pixel(8, 8, Rgb([0, 0, 255])))
        }
    }

    struct Slow {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ImageProvider for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn generate(&self, _prompt: &str) -> Attempt {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Attempt::Rendered(RgbImage::new(4, 4))
        }
    }

    fn panels(count: u32) -> Vec<PanelSpec> {
        (1..=count)
            .map(|id| PanelSpec::new(id, format!("panel {id}")))
            .collect()
    }

    fn settings(base_url: Url) -> ImageSettings {
        ImageSettings {
            base_url,
            model: "primary/model".to_string(),
            fallback_model: "fallback/model".to_string(),
            api_key: None,
        }
    }

    #[tokio::test]
    async fn fallback_provider_used_after_primary_fails() {
        let providers = vec![
            Scripted {
                name: "primary",
                ..Default::default()
            },
            Scripted {
                name: "fallback",
                color: Some([10, 20, 30]),
                ..Default::default()
            },
        ];
        let attempt = first_success(&providers, "prompt").await;
        let Attempt::Rendered(image) = attempt else {
            panic!("expected an image");
        };
        assert_eq!(image.get_pixel(0, 0), &Rgb([10, 20, 30]));
        assert_eq!(providers[0].calls.load(Ordering::SeqCst), 1);
        assert_eq!(providers[1].calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn primary_success_skips_fallback() {
        let providers = vec![
            Scripted {
                name: "primary",
                color: Some([1, 1, 1]),
                ..Default::default()
            },
            Scripted {
                name: "fallback",
                color: Some([2, 2, 2]),
                ..Default::default()
            },
        ];
        assert!(matches!(
            first_success(&providers, "prompt").await,
            Attempt::Rendered(_)
        ));
        assert_eq!(providers[1].calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn no_providers_is_a_failure() {
        let providers: Vec<Scripted> = Vec::new();
        assert!(matches!(
            first_success(&providers, "prompt").await,
            Attempt::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn every_remote_call_failing_gives_white_placeholders() {
        let client = reqwest::Client::new();
        let artist = Artist::from_settings(&client, &settings(closed_url().await), None, None);
        let images = artist.generate_page_panels(&panels(4)).await;

        assert_eq!(images.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        for image in images.values() {
            assert_eq!(image.dimensions(), (PLACEHOLDER_SIZE, PLACEHOLDER_SIZE));
            assert_eq!(image.get_pixel(100, 100), &FAILED_PANEL_COLOR);
        }
    }

    #[tokio::test]
    async fn crashed_panel_is_gray_and_others_unaffected() {
        let artist = Artist::new(vec![Exploding]);
        let specs = vec![PanelSpec::new(1, "calm"), PanelSpec::new(2, "boom goes the panel")];
        let images = artist.generate_page_panels(&specs).await;
        assert_eq!(images[&1].get_pixel(0, 0), &Rgb([0, 0, 255]));
        assert_eq!(images[&2].get_pixel(0, 0), &CRASHED_PANEL_COLOR);
        assert_eq!(images[&2].dimensions(), (PLACEHOLDER_SIZE, PLACEHOLDER_SIZE));
    }

    #[tokio::test]
    async fn at_most_four_panels_in_flight() {
        let artist = Artist::new(vec![Slow {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }]);
        let images = artist.generate_page_panels(&panels(9)).await;
        assert_eq!(images.len(), 9);
        let peak = artist.providers()[0].peak.load(Ordering::SeqCst);
        assert!(peak <= PANEL_CONCURRENCY, "peak was {peak}");
    }

    #[tokio::test]
    async fn inference_model_decodes_images_and_reports_failures() {
        let png = png_bytes(16, 12, [9, 8, 7]);
        let router = Router::new()
            .route(
                "/models/good/model",
                post(move || {
                    let png = png.clone();
                    async move { png }
                }),
            )
            .route(
                "/models/loading/model",
                post(|| async { (AxumStatus::SERVICE_UNAVAILABLE, "{\"error\":\"loading\"}") }),
            )
            .route(
                "/models/text/model",
                post(|| async { "definitely not an image" }),
            );
        let base = spawn_mock(router).await;
        let client = reqwest::Client::new();

        let good = InferenceModel::new(client.clone(), base.clone(), "good/model", None);
        let Attempt::Rendered(image) = good.generate("a cat").await else {
            panic!("expected an image");
        };
        assert_eq!(image.dimensions(), (16, 12));

        let loading = InferenceModel::new(client.clone(), base.clone(), "loading/model", None);
        let Attempt::Failed { provider, reason } = loading.generate("a cat").await else {
            panic!("expected a failure");
        };
        assert_eq!(provider, "loading/model");
        assert!(reason.contains("loading"), "{reason}");

        let text = InferenceModel::new(client, base, "text/model", None);
        assert!(matches!(
            text.generate("a cat").await,
            Attempt::Failed { .. }
        ));
    }

    #[test]
    fn overrides_replace_primary_model_and_key() {
        let client = reqwest::Client::new();
        let base = Url::parse("https://inference.example/hf-inference/").expect("url");
        let artist =
            Artist::from_settings(&client, &settings(base), Some("key"), Some("custom/model"));
        let names: Vec<&str> = artist.providers().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["custom/model", "fallback/model"]);
        assert_eq!(
            artist.providers()[0].endpoint(),
            "https://inference.example/hf-inference/models/custom/model"
        );
        assert_eq!(artist.providers()[0].api_key.as_deref(), Some("key"));

        let collapsed = ImageSettings {
            model: "fallback/model".to_string(),
            ..settings(Url::parse("https://inference.example").expect("url"))
        };
        let same = Artist::from_settings(&client, &collapsed, None, None);
        assert_eq!(same.providers().len(), 1);
    }
}
