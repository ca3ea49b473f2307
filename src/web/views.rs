use std::collections::BTreeMap;

use axum::Json;
use axum::response::Response;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::RgbImage;

use super::prelude::*;
use crate::artist::Artist;
use crate::blueprint::PanelSpec;
use crate::config::non_empty;
use crate::pipeline::{PageReport, Pipeline};
use crate::progress::ProgressContext;
use crate::typesetter::{encode_png, fit};

/// Edge length of the panel previews on the result page.
const THUMBNAIL_SIZE: u32 = 256;

#[derive(Deserialize, Debug, Default)]
pub(crate) struct GenerateForm {
    #[serde(default)]
    openrouter_key: Option<String>,
    #[serde(default)]
    hf_key: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    scene: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub(crate) struct HomeTemplate {
    pub(crate) error: Option<String>,
    pub(crate) scene: String,
    pub(crate) model: String,
    pub(crate) has_openrouter_key: bool,
    pub(crate) has_hf_key: bool,
    pub(crate) context: ProgressContext,
}

#[derive(Clone, Debug)]
pub(crate) struct PanelView {
    pub(crate) id: u32,
    pub(crate) description: String,
    pub(crate) data_uri: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "result.html")]
pub(crate) struct ResultTemplate {
    pub(crate) page_number: u32,
    pub(crate) layout: String,
    pub(crate) reasoning: String,
    pub(crate) blueprint_json: String,
    pub(crate) panels: Vec<PanelView>,
    pub(crate) context: ProgressContext,
}

fn home_page(
    state: &AppState,
    error: Option<String>,
    form: GenerateForm,
) -> Result<HomeTemplate, MangaError> {
    Ok(HomeTemplate {
        error,
        scene: form.scene,
        model: non_empty(form.model.as_deref()).unwrap_or_else(|| state.config.images.model.clone()),
        has_openrouter_key: state.config.chat.api_key.is_some(),
        has_hf_key: state.config.images.api_key.is_some(),
        context: state.store.load()?,
    })
}

/// handles the / GET
pub(crate) async fn home_handler(
    State(state): State<AppState>,
) -> Result<HomeTemplate, MangaError> {
    home_page(&state, None, GenerateForm::default())
}

/// Checks the form before any remote call is made.
fn validate(state: &AppState, form: &GenerateForm) -> Result<(), String> {
    if form.scene.trim().is_empty() {
        return Err("Please enter some text.".to_string());
    }
    if non_empty(form.openrouter_key.as_deref()).is_none() && state.config.chat.api_key.is_none() {
        return Err("An OpenRouter API key is required.".to_string());
    }
    if non_empty(form.hf_key.as_deref()).is_none() && state.config.images.api_key.is_none() {
        return Err("A HuggingFace API key is required.".to_string());
    }
    Ok(())
}

fn panel_views(
    panels: &[PanelSpec],
    images: &BTreeMap<u32, RgbImage>,
) -> Result<Vec<PanelView>, MangaError> {
    let mut views = Vec::with_capacity(images.len());
    for (id, image) in images {
        let description = panels
            .iter()
            .find(|panel| panel.id == *id)
            .map(|panel| panel.description.clone())
            .unwrap_or_default();
        let thumbnail = fit(image, THUMBNAIL_SIZE, THUMBNAIL_SIZE);
        let data_uri = format!(
            "data:image/png;base64,{}",
            STANDARD.encode(encode_png(&thumbnail)?)
        );
        views.push(PanelView {
            id: *id,
            description,
            data_uri,
        });
    }
    Ok(views)
}

fn result_page(report: &PageReport, context: ProgressContext) -> Result<ResultTemplate, MangaError> {
    Ok(ResultTemplate {
        page_number: report.page_number,
        layout: report.blueprint.layout.to_string(),
        reasoning: report.blueprint.reasoning.clone(),
        blueprint_json: report.blueprint.to_pretty_json(),
        panels: panel_views(&report.blueprint.panels, &report.panel_images)?,
        context,
    })
}

/// handles the /generate POST
pub(crate) async fn generate_handler(
    State(state): State<AppState>,
    Form(form): Form<GenerateForm>,
) -> Result<Response, MangaError> {
    if let Err(message) = validate(&state, &form) {
        info!("Rejected generate request: {message}");
        let page = home_page(&state, Some(message), form)?;
        return Ok((StatusCode::BAD_REQUEST, page).into_response());
    }

    // one page at a time, the progress store has a single writer
    let _guard = state.generation.lock().await;

    let pipeline = Pipeline::new(
        state.architect().with_api_key(form.openrouter_key.as_deref()),
        Artist::from_settings(
            &state.client,
            &state.config.images,
            form.hf_key.as_deref(),
            form.model.as_deref(),
        ),
        state.typesetter.clone(),
        state.store.clone(),
    );

    let page_number = state.store.current_page()?;
    let report = pipeline
        .produce_page(page_number, &form.scene)
        .await
        .inspect_err(|err| error!("Failed to produce page {page_number}: {err}"))?;

    let context = state.store.load()?;
    Ok(result_page(&report, context)?.into_response())
}

/// handles the /context GET
pub(crate) async fn context_handler(
    State(state): State<AppState>,
) -> Result<Json<ProgressContext>, MangaError> {
    Ok(Json(state.store.load()?))
}

pub(crate) async fn styles_handler() -> impl IntoResponse {
    const STYLES: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/static/styles.css"));
    ([(CONTENT_TYPE, "text/css")], STYLES)
}
