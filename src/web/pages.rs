//! Serving finished page artifacts with cache validators.

use std::io::ErrorKind;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::http::header::{
    CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH,
    LAST_MODIFIED,
};
use axum::http::response::Builder;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use httpdate::{fmt_http_date, parse_http_date};
use tracing::debug;

use super::prelude::*;
use crate::constants::PAGE_CACHE_CONTROL;
use crate::typesetter::page_file_name;

/// Cache headers derived from page file metadata.
#[derive(Clone, Debug)]
pub(crate) struct PageCacheHeaders {
    etag: Option<HeaderValue>,
    last_modified: Option<HeaderValue>,
    modified_at: Option<SystemTime>,
}

impl PageCacheHeaders {
    /// Builds cache headers from a page file's metadata.
    pub(crate) fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        let modified_at = metadata.modified().ok();
        let etag = build_etag(metadata.len(), modified_at);
        let last_modified =
            modified_at.and_then(|modified| HeaderValue::from_str(&fmt_http_date(modified)).ok());
        Self {
            etag,
            last_modified,
            modified_at,
        }
    }
}

/// Applies page cache headers to a response builder.
pub(crate) fn apply_cache_headers(mut builder: Builder, cache: &PageCacheHeaders) -> Builder {
    builder = builder.header(CACHE_CONTROL, PAGE_CACHE_CONTROL.as_str());
    if let Some(etag) = &cache.etag {
        builder = builder.header(ETAG, etag.clone());
    }
    if let Some(last_modified) = &cache.last_modified {
        builder = builder.header(LAST_MODIFIED, last_modified.clone());
    }
    builder
}

/// True when the request's validators say the client copy is current.
///
/// `If-None-Match` wins over `If-Modified-Since` when both are present.
pub(crate) fn is_not_modified(headers: &HeaderMap, cache: &PageCacheHeaders) -> bool {
    if let Some(if_none_match) = headers.get(IF_NONE_MATCH) {
        if let Ok(value) = if_none_match.to_str() {
            let value = value.trim();
            if value == "*" {
                return true;
            }
            if let Some(etag) = cache.etag.as_ref().and_then(|value| value.to_str().ok())
                && value.split(',').any(|candidate| candidate.trim() == etag)
            {
                return true;
            }
        }
        return false;
    }

    if let (Some(if_modified_since), Some(modified_at)) =
        (headers.get(IF_MODIFIED_SINCE), cache.modified_at)
        && let Ok(value) = if_modified_since.to_str()
        && let Ok(since) = parse_http_date(value)
        && whole_seconds(modified_at) <= since
    {
        return true;
    }

    false
}

/// HTTP dates have no sub-second part, so neither may the comparison.
fn whole_seconds(time: SystemTime) -> SystemTime {
    time.duration_since(UNIX_EPOCH)
        .map(|elapsed| UNIX_EPOCH + Duration::from_secs(elapsed.as_secs()))
        .unwrap_or(time)
}

/// Builds a 304 response that keeps the page's cache headers.
fn not_modified_response(cache: &PageCacheHeaders) -> Result<Response, MangaError> {
    let builder = Response::builder().status(StatusCode::NOT_MODIFIED);
    apply_cache_headers(builder, cache)
        .body(Body::empty())
        .map_err(MangaError::from)
}

fn build_etag(size: u64, modified_at: Option<SystemTime>) -> Option<HeaderValue> {
    let suffix = match modified_at {
        Some(modified) => modified
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_nanos().to_string())
            .unwrap_or_else(|_| "0".to_string()),
        None => "0".to_string(),
    };
    HeaderValue::from_str(&format!("W/\"{size}-{suffix}\"")).ok()
}

async fn page_metadata(
    path: &std::path::Path,
    page: u32,
) -> Result<std::fs::Metadata, MangaError> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => Ok(metadata),
        Ok(_) => Err(MangaError::NotFound(format!("page {page}"))),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            Err(MangaError::NotFound(format!("page {page}")))
        }
        Err(err) => Err(err.into()),
    }
}

async fn serve_page(
    state: &AppState,
    headers: &HeaderMap,
    page: u32,
    attachment: bool,
) -> Result<Response, MangaError> {
    let path = state.typesetter.page_path(page);
    let metadata = page_metadata(&path, page).await?;
    let cache_headers = PageCacheHeaders::from_metadata(&metadata);
    if is_not_modified(headers, &cache_headers) {
        debug!("Page {page} not modified");
        return not_modified_response(&cache_headers);
    }

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(MangaError::NotFound(format!("page {page}")));
        }
        Err(err) => return Err(err.into()),
    };

    let mut builder = Response::builder().header(CONTENT_TYPE, "image/png");
    if attachment {
        builder = builder.header(
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", page_file_name(page)),
        );
    }
    apply_cache_headers(builder, &cache_headers)
        .body(Body::from(bytes))
        .map_err(MangaError::from)
}

/// GET /pages/{page}
pub(crate) async fn page_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(page): Path<u32>,
) -> Result<Response, MangaError> {
    serve_page(&state, &headers, page, false).await
}

/// GET /pages/{page}/download
pub(crate) async fn page_download_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(page): Path<u32>,
) -> Result<Response, MangaError> {
    serve_page(&state, &headers, page, true).await
}
