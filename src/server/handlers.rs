//! HTTP handlers bridging the async surface to the synchronous engine.
//!
//! Every pipeline invocation runs under `spawn_blocking` with an
//! operation-appropriate deadline so slow uploads cannot starve the runtime.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::audio::youtube::{self, FetchError};
use crate::error::ServiceError;
use crate::service::{CancelToken, MatchResult};

use super::types::{
    AddSongResponse, AddSongYoutubeRequest, DeleteSongResponse, ErrorResponse, ListSongsResponse,
    MatchHashesRequest, MatchResponse, MetricsResponse, SongDto, MAX_HASHES_SOFT_LIMIT,
};
use super::AppState;

const INGEST_TIMEOUT: Duration = Duration::from_secs(300);
const MATCH_TIMEOUT: Duration = Duration::from_secs(120);
const HASH_MATCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Error with an HTTP status, rendered as the standard envelope.
pub(super) struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self
                .status
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
            message: self.message,
            code: self.status.as_u16(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let status = match &err {
            ServiceError::InvalidInput(_) | ServiceError::Reader(_) | ServiceError::Pipeline(_) => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::DecoderFailed(_)
            | ServiceError::Index(_)
            | ServiceError::Cancelled
            | ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

pub(super) async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

pub(super) async fn metrics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MetricsResponse>, ApiError> {
    let songs = run_blocking(state.clone(), move |state| state.service.list_songs()).await?;
    Ok(Json(MetricsResponse {
        status: "healthy".to_string(),
        database_path: state.config.db_path.display().to_string(),
        song_count: songs.len(),
        sample_rate: state.config.sample_rate,
    }))
}

pub(super) async fn list_songs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ListSongsResponse>, ApiError> {
    let songs = run_blocking(state, move |state| state.service.list_songs()).await?;
    let songs: Vec<SongDto> = songs.into_iter().map(SongDto::from).collect();
    let count = songs.len();
    Ok(Json(ListSongsResponse { songs, count }))
}

pub(super) async fn get_song(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SongDto>, ApiError> {
    let song = run_blocking(state, move |state| state.service.get_song(&id)).await?;
    Ok(Json(SongDto::from(song)))
}

pub(super) async fn delete_song(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteSongResponse>, ApiError> {
    let song = run_blocking(state, move |state| {
        let cancel = CancelToken::with_timeout(HASH_MATCH_TIMEOUT);
        state.service.delete_song(&cancel, &id)
    })
    .await?;
    Ok(Json(DeleteSongResponse {
        message: "Song deleted successfully".to_string(),
        id: song.id,
    }))
}

pub(super) async fn add_song(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<AddSongResponse>), ApiError> {
    let upload = read_song_upload(multipart).await?;
    if upload.title.is_empty() || upload.artist.is_empty() {
        return Err(ApiError::bad_request("title and artist are required"));
    }
    let Some(audio) = upload.audio else {
        return Err(ApiError::bad_request("audio file is required"));
    };

    let temp_path = save_upload(&state, "upload", &audio.0, &audio.1).await?;
    let title = upload.title.clone();
    let artist = upload.artist.clone();
    let youtube_id = upload.youtube_id.clone();
    let ingest_path = temp_path.clone();
    let result = run_blocking(state, move |state| {
        let cancel = CancelToken::with_timeout(INGEST_TIMEOUT);
        state
            .service
            .add_song(&cancel, &ingest_path, &title, &artist, &youtube_id)
    })
    .await;
    let _ = tokio::fs::remove_file(&temp_path).await;
    let id = result?;

    tracing::info!("Added song '{}' by '{}' as {id}", upload.title, upload.artist);
    Ok((
        StatusCode::CREATED,
        Json(AddSongResponse {
            message: "Song added successfully".to_string(),
            id,
            title: upload.title,
            artist: upload.artist,
            youtube_id: upload.youtube_id,
        }),
    ))
}

pub(super) async fn add_song_youtube(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AddSongYoutubeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AddSongResponse>), ApiError> {
    let Json(request) = payload.map_err(|_| ApiError::bad_request("Invalid request body"))?;
    if request.youtube_url.trim().is_empty() {
        return Err(ApiError::bad_request("youtube_url is required"));
    }

    let result = run_blocking(state, move |state| {
        let cancel = CancelToken::with_timeout(INGEST_TIMEOUT);
        let (audio_path, metadata) =
            youtube::fetch_audio(&request.youtube_url, &state.config.temp_dir, &cancel)
                .map_err(map_fetch_error)?;

        let title = if request.title.trim().is_empty() {
            metadata.title.clone()
        } else {
            request.title.clone()
        };
        let artist = if request.artist.trim().is_empty() {
            metadata.resolved_artist().to_string()
        } else {
            request.artist.clone()
        };

        let ingest = state
            .service
            .add_song(&cancel, &audio_path, &title, &artist, &metadata.id);
        let _ = std::fs::remove_file(&audio_path);
        let id = ingest.map_err(ApiError::from)?;
        Ok::<_, ApiError>((id, title, artist, metadata.id.clone()))
    })
    .await?;
    let (id, title, artist, youtube_id) = result;

    Ok((
        StatusCode::CREATED,
        Json(AddSongResponse {
            message: "Song added successfully from YouTube".to_string(),
            id,
            title,
            artist,
            youtube_id,
        }),
    ))
}

pub(super) async fn match_file(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<MatchResponse>, ApiError> {
    let upload = read_song_upload(multipart).await?;
    let Some(audio) = upload.audio else {
        return Err(ApiError::bad_request("audio file is required"));
    };

    let temp_path = save_upload(&state, "query", &audio.0, &audio.1).await?;
    let query_path = temp_path.clone();
    let result = run_blocking(state, move |state| {
        let cancel = CancelToken::with_timeout(MATCH_TIMEOUT);
        state.service.match_file(&cancel, &query_path)
    })
    .await;
    let _ = tokio::fs::remove_file(&temp_path).await;
    let matches = result?;

    Ok(Json(match_response(matches)))
}

pub(super) async fn match_hashes(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<MatchHashesRequest>, JsonRejection>,
) -> Result<Json<MatchResponse>, ApiError> {
    let Json(request) = payload.map_err(|_| ApiError::bad_request("Invalid request body"))?;
    request.validate().map_err(ApiError::bad_request)?;
    let hashes = request.to_hash_map().map_err(ApiError::bad_request)?;
    if hashes.len() >= MAX_HASHES_SOFT_LIMIT {
        tracing::warn!("Large hash batch received: {} hashes", hashes.len());
    }

    let matches = run_blocking(state, move |state| {
        let cancel = CancelToken::with_timeout(HASH_MATCH_TIMEOUT);
        state.service.match_hashes(&cancel, &hashes)
    })
    .await?;

    Ok(Json(match_response(matches)))
}

pub(super) async fn not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "Resource not found")
}

struct SongUpload {
    title: String,
    artist: String,
    youtube_id: String,
    audio: Option<(String, Vec<u8>)>,
}

async fn read_song_upload(mut multipart: Multipart) -> Result<SongUpload, ApiError> {
    let mut upload = SongUpload {
        title: String::new(),
        artist: String::new(),
        youtube_id: String::new(),
        audio: None,
    };
    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|err| ApiError::bad_request(format!("Failed to parse form data: {err}")))?;
        let Some(field) = field else {
            break;
        };
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "title" => upload.title = read_text(field).await?,
            "artist" => upload.artist = read_text(field).await?,
            "youtube_id" => upload.youtube_id = read_text(field).await?,
            "audio" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let data = field.bytes().await.map_err(|err| {
                    ApiError::bad_request(format!("Failed to read audio field: {err}"))
                })?;
                upload.audio = Some((file_name, data.to_vec()));
            }
            _ => {
                let _ = field.bytes().await;
            }
        }
    }
    Ok(upload)
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|err| ApiError::bad_request(format!("Failed to read form field: {err}")))
}

/// Persist an upload to the temp directory under a collision-free name.
async fn save_upload(
    state: &Arc<AppState>,
    prefix: &str,
    file_name: &str,
    data: &[u8],
) -> Result<PathBuf, ApiError> {
    let safe_name = std::path::Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("audio");
    let path = state.config.temp_dir.join(format!(
        "{prefix}_{}_{safe_name}",
        uuid::Uuid::new_v4().simple()
    ));
    tokio::fs::create_dir_all(&state.config.temp_dir)
        .await
        .map_err(|err| ApiError::internal(format!("Failed to prepare temp dir: {err}")))?;
    tokio::fs::write(&path, data)
        .await
        .map_err(|err| ApiError::internal(format!("Failed to save upload: {err}")))?;
    Ok(path)
}

fn match_response(matches: Vec<MatchResult>) -> MatchResponse {
    let count = matches.len();
    MatchResponse { matches, count }
}

fn map_fetch_error(err: FetchError) -> ApiError {
    match err {
        FetchError::InvalidUrl(_) => ApiError::bad_request(err.to_string()),
        other => ApiError::internal(other.to_string()),
    }
}

/// Run a synchronous engine call off the async runtime.
async fn run_blocking<T, E, F>(state: Arc<AppState>, call: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
    F: FnOnce(Arc<AppState>) -> Result<T, E> + Send + 'static,
{
    tokio::task::spawn_blocking(move || call(state))
        .await
        .map_err(|err| ApiError::internal(format!("Worker task failed: {err}")))?
        .map_err(Into::into)
}
