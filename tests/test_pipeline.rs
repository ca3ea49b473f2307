use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header::CONTENT_TYPE};
use axum::response::IntoResponse;
use axum::routing::post;
use image::{ImageFormat, Rgb, RgbImage};
use mangamaker::cli::ServiceOptions;
use mangamaker::config::{ServiceConfig, build_client, setup_logging};
use mangamaker::pipeline::Pipeline;
use mangamaker::progress::ProgressStore;
use url::Url;

const BLUEPRINT_REPLY: &str = "```json\n{\"layout\": \"cinematic\", \"reasoning\": \"Wide establishing shots.\", \"panels\": [{\"id\": 1, \"description\": \"A gate in the rain\"}, {\"id\": 2, \"description\": \"A lone swordsman\"}, {\"id\": 3, \"description\": \"Lightning\"}]}\n```";

#[derive(Clone, Default)]
struct Calls {
    chat: Arc<AtomicUsize>,
    primary: Arc<AtomicUsize>,
    fallback: Arc<AtomicUsize>,
}

async fn chat(State(calls): State<Calls>) -> impl IntoResponse {
    calls.chat.fetch_add(1, Ordering::SeqCst);
    axum::Json(serde_json::json!({
        "choices": [{"message": {"role": "assistant", "content": BLUEPRINT_REPLY}}]
    }))
}

async fn inference(State(calls): State<Calls>, Path(model): Path<String>) -> axum::response::Response {
    if model.starts_with("primary") {
        calls.primary.fetch_add(1, Ordering::SeqCst);
        return (StatusCode::SERVICE_UNAVAILABLE, "loading").into_response();
    }
    calls.fallback.fetch_add(1, Ordering::SeqCst);
    let mut bytes = Vec::new();
    RgbImage::from_pixel(64, 64, Rgb([0, 0, 200]))
        .write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode png");
    ([(CONTENT_TYPE, "image/png")], bytes).into_response()
}

async fn spawn_services(calls: Calls) -> Url {
    let router = Router::new()
        .route("/chat", post(chat))
        .route("/models/{*model}", post(inference))
        .with_state(calls);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock listener");
    let addr = listener.local_addr().expect("mock address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Url::parse(&format!("http://{addr}/")).expect("mock url")
}

fn config(base: &Url, dir: &std::path::Path) -> ServiceConfig {
    let services = ServiceOptions {
        openrouter_api_key: Some("sk-test".to_string()),
        chat_endpoint: base.join("chat").expect("chat url").to_string(),
        chat_model: "planner".to_string(),
        hf_api_key: Some("hf-test".to_string()),
        hf_base_url: base.to_string(),
        image_model: "primary/model".to_string(),
        fallback_image_model: "fallback/model".to_string(),
    };
    ServiceConfig::from_parts(&services, dir.join("context.json"), dir.join("output"))
        .expect("config")
}

#[tokio::test]
async fn chapter_renders_through_model_fallback() {
    let _ = setup_logging(true);
    let calls = Calls::default();
    let base = spawn_services(calls.clone()).await;
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config(&base, dir.path());

    let input = dir.path().join("chapter.txt");
    std::fs::write(
        &input,
        "The rain had not stopped for three days.\n\nAt the gate, a swordsman waited.",
    )
    .expect("write input");

    let pipeline = Pipeline::from_config(build_client().expect("client"), &config);
    let pages = pipeline.run_chapter(&input, 41).await.expect("chapter");

    assert_eq!(
        pages,
        vec![
            dir.path().join("output").join("Page_01.png"),
            dir.path().join("output").join("Page_02.png"),
        ]
    );
    assert_eq!(calls.chat.load(Ordering::SeqCst), 2);
    assert_eq!(calls.primary.load(Ordering::SeqCst), 6);
    assert_eq!(calls.fallback.load(Ordering::SeqCst), 6);

    let page = image::open(&pages[0]).expect("open page").to_rgb8();
    assert_eq!(page.dimensions(), (1240, 1754));
    // middle of each cinematic strip
    for y in [319, 877, 1435] {
        assert_eq!(page.get_pixel(620, y), &Rgb([0, 0, 200]));
    }
    // border and margin
    assert_eq!(page.get_pixel(52, 319), &Rgb([0, 0, 0]));
    assert_eq!(page.get_pixel(20, 319), &Rgb([255, 255, 255]));

    let context = ProgressStore::new(config.context_file.clone())
        .load()
        .expect("context");
    assert_eq!(context.current_page, 3);
    assert_eq!(context.story_logs.len(), 2);
    assert_eq!(
        context.story_logs[0].scene_snippet,
        "The rain had not stopped for three days."
    );
    assert_eq!(
        context.story_logs[1].scene_snippet,
        "At the gate, a swordsman waited."
    );
}
