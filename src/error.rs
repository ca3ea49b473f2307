//! Error handling

use std::path::PathBuf;

use axum::response::IntoResponse;
use tracing::info;

/// Errors for the mangamaker pipeline and its drivers.
///
/// Remote failures never show up here: the architect and the artist degrade
/// to fallbacks instead. What is left are local problems.
#[derive(Debug)]
pub enum MangaError {
    /// The story input file does not exist, which ends the run
    InputNotFound(PathBuf),
    /// Filesystem trouble
    Io(std::io::Error),
    /// The progress document could not be (de)serialized
    Json(serde_json::Error),
    /// Encoding or decoding a bitmap failed
    Image(image::ImageError),
    /// The HTTP client could not be built
    Http(reqwest::Error),
    /// A configured endpoint is not a valid URL
    InvalidUrl(url::ParseError),
    /// When you didn't do the right thing
    BadRequest(String),
    /// When a requested resource is not found
    NotFound(String),
    /// When an internal server error occurs
    InternalServerError(String),
}

impl std::fmt::Display for MangaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InputNotFound(path) => write!(f, "Input file not found at {}", path.display()),
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::Json(err) => write!(f, "JSON error: {err}"),
            Self::Image(err) => write!(f, "Image error: {err}"),
            Self::Http(err) => write!(f, "HTTP client error: {err}"),
            Self::InvalidUrl(err) => write!(f, "Invalid URL: {err}"),
            Self::BadRequest(message) => write!(f, "Bad request: {message}"),
            Self::NotFound(what) => write!(f, "Not found: {what}"),
            Self::InternalServerError(message) => write!(f, "Internal error: {message}"),
        }
    }
}

impl std::error::Error for MangaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::Image(err) => Some(err),
            Self::Http(err) => Some(err),
            Self::InvalidUrl(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MangaError {
    fn from(err: std::io::Error) -> Self {
        MangaError::Io(err)
    }
}

impl From<serde_json::Error> for MangaError {
    fn from(err: serde_json::Error) -> Self {
        MangaError::Json(err)
    }
}

impl From<image::ImageError> for MangaError {
    fn from(err: image::ImageError) -> Self {
        MangaError::Image(err)
    }
}

impl From<reqwest::Error> for MangaError {
    fn from(err: reqwest::Error) -> Self {
        MangaError::Http(err)
    }
}

impl From<url::ParseError> for MangaError {
    fn from(err: url::ParseError) -> Self {
        MangaError::InvalidUrl(err)
    }
}

impl From<axum::http::Error> for MangaError {
    fn from(err: axum::http::Error) -> Self {
        MangaError::InternalServerError(err.to_string())
    }
}

impl IntoResponse for MangaError {
    fn into_response(self) -> axum::response::Response {
        match self {
            MangaError::BadRequest(message) => {
                info!("Bad request received: {message}");
                let mut response =
                    axum::response::Response::new(axum::body::Body::from("Bad Request"));
                *response.status_mut() = axum::http::StatusCode::BAD_REQUEST;
                response
            }
            MangaError::NotFound(what) => {
                tracing::error!("404 {what}");
                let mut response =
                    axum::response::Response::new(axum::body::Body::from("Not Found"));
                *response.status_mut() = axum::http::StatusCode::NOT_FOUND;
                response
            }
            other => {
                tracing::error!("Internal server error: {}", other);
                let mut response =
                    axum::response::Response::new(axum::body::Body::from("Internal server error"));
                *response.status_mut() = axum::http::StatusCode::INTERNAL_SERVER_ERROR;
                response
            }
        }
    }
}
