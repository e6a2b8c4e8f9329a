use std::sync::Arc;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::app::library::Library;
use crate::epub::{IngestRequest, MAX_ARCHIVE_BYTES};
use crate::error::Error;
use crate::formats::SourceLanguage;

const EPUB_CONTENT_TYPE: &str = "application/epub+zip";

#[derive(Clone)]
pub struct AppState {
    pub library: Arc<Library>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok\n" }))
        .route("/api/novels", get(list_novels))
        .route(
            "/api/novels/upload",
            post(upload_novel).layer(DefaultBodyLimit::max(MAX_ARCHIVE_BYTES + 1024 * 1024)),
        )
        .route("/api/novels/:novel_id", get(get_novel).delete(delete_novel))
        .route("/api/novels/:novel_id/chapters", get(list_chapters))
        .route("/api/novels/:novel_id/chapters/:number", get(get_chapter))
        .route(
            "/api/novels/:novel_id/chapters/:number/translate",
            post(translate_chapter),
        )
        .route(
            "/api/novels/:novel_id/translation-status",
            get(translation_status),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    PayloadTooLarge(String),
    Library(Error),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::Library(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::PayloadTooLarge(message) => (StatusCode::PAYLOAD_TOO_LARGE, message),
            ApiError::Library(err) => {
                let status = match &err {
                    Error::NovelNotFound(_) | Error::ChapterNotFound { .. } => StatusCode::NOT_FOUND,
                    Error::UnsupportedLanguage(_) => StatusCode::BAD_REQUEST,
                    Error::ArchiveTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                    Error::CorruptArchive(_)
                    | Error::InvalidContainer(_)
                    | Error::InvalidPackageDocument(_)
                    | Error::ChapterExtractionSkipped { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    Error::AllModelsExhausted { .. } => StatusCode::BAD_GATEWAY,
                    Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    tracing::error!(error = %format!("{err:#}"), "request failed");
                }
                let message = match &err {
                    Error::Internal(_) => "internal server error".to_owned(),
                    other => other.to_string(),
                };
                (status, message)
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

async fn list_novels(State(state): State<AppState>) -> Result<Response, ApiError> {
    let novels = state.library.list_novels().await?;
    Ok(Json(novels).into_response())
}

async fn get_novel(
    State(state): State<AppState>,
    Path(novel_id): Path<String>,
) -> Result<Response, ApiError> {
    let novel = state.library.get_novel(&novel_id).await?;
    Ok(Json(novel).into_response())
}

async fn delete_novel(
    State(state): State<AppState>,
    Path(novel_id): Path<String>,
) -> Result<Response, ApiError> {
    state.library.delete_novel(&novel_id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn list_chapters(
    State(state): State<AppState>,
    Path(novel_id): Path<String>,
) -> Result<Response, ApiError> {
    let chapters = state.library.list_chapters(&novel_id).await?;
    Ok(Json(chapters).into_response())
}

async fn get_chapter(
    State(state): State<AppState>,
    Path((novel_id, number)): Path<(String, u32)>,
) -> Result<Response, ApiError> {
    let chapter = state.library.get_chapter(&novel_id, number).await?;
    Ok(Json(chapter).into_response())
}

async fn translate_chapter(
    State(state): State<AppState>,
    Path((novel_id, number)): Path<(String, u32)>,
) -> Result<Response, ApiError> {
    let translation = state.library.translate_chapter(&novel_id, number).await?;
    Ok(Json(translation).into_response())
}

async fn translation_status(
    State(state): State<AppState>,
    Path(novel_id): Path<String>,
) -> Result<Response, ApiError> {
    let status = state.library.translation_status(&novel_id).await?;
    Ok(Json(status).into_response())
}

#[derive(Default)]
struct UploadForm {
    epub: Option<Vec<u8>>,
    file_name: Option<String>,
    language: Option<String>,
    author: Option<String>,
    description: Option<String>,
}

async fn upload_novel(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "epub" => {
                let file_name = field.file_name().map(str::to_owned);
                let content_type = field.content_type().map(str::to_owned);
                let looks_like_epub = content_type.as_deref() == Some(EPUB_CONTENT_TYPE)
                    || file_name
                        .as_deref()
                        .is_some_and(|n| n.to_ascii_lowercase().ends_with(".epub"));
                if !looks_like_epub {
                    return Err(ApiError::BadRequest("only EPUB files are allowed".to_owned()));
                }
                let bytes = field.bytes().await.map_err(multipart_error)?;
                form.epub = Some(bytes.to_vec());
                form.file_name = file_name;
            }
            "language" | "originalLanguage" => {
                form.language = Some(field.text().await.map_err(multipart_error)?);
            }
            "author" => form.author = Some(field.text().await.map_err(multipart_error)?),
            "description" => {
                form.description = Some(field.text().await.map_err(multipart_error)?);
            }
            other => {
                tracing::debug!(field = other, "ignoring unknown upload field");
            }
        }
    }

    let Some(bytes) = form.epub else {
        return Err(ApiError::BadRequest("no EPUB file provided".to_owned()));
    };
    let source_language = match form.language.as_deref().map(str::trim) {
        None | Some("") => SourceLanguage::Chinese,
        Some(raw) => raw.parse::<SourceLanguage>()?,
    };

    let request = IngestRequest {
        source_language,
        author: form.author,
        description: form.description,
        file_name: form.file_name,
    };
    let summary = state.library.ingest_archive(bytes, request).await?;
    Ok((StatusCode::CREATED, Json(summary)).into_response())
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::PayloadTooLarge(err.body_text());
    }
    ApiError::BadRequest(err.body_text())
}
