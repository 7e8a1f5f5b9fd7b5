//! HTTP handlers: media resolution, the download proxy and the raw metadata passthrough.

use axum::body::{Body, Bytes};
use axum::extract::{Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};
use url::Url;

use super::AppState;
use crate::error::Error;
use crate::media::ResolvedPost;
use crate::utils::sanitize_filename;

const DEFAULT_FILENAME: &str = "media";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// JSON error body for the API endpoints.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            Error::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Error::NoMediaFound(_) => (StatusCode::NOT_FOUND, self.0.to_string()),
            e if e.is_upstream() => {
                warn!("Upstream failure: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            _ => {
                error!("Internal error: {}", self.0);
                (StatusCode::INTERNAL_SERVER_ERROR, "server error".to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Deserialize)]
pub struct MediaQuery {
    pub url: Option<String>,
}

pub async fn resolve_media(
    State(state): State<AppState>,
    Query(query): Query<MediaQuery>,
) -> Result<Json<ResolvedPost>, ApiError> {
    let url = non_empty(query.url).ok_or_else(|| Error::invalid_input("url required"))?;
    let post = state.resolver.resolve_post(&url).await?;
    Ok(Json(post))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStatusQuery {
    pub tweet_id: Option<String>,
}

/// Relays the mirror's metadata document untouched.
pub async fn raw_status(
    State(state): State<AppState>,
    Query(query): Query<RawStatusQuery>,
) -> Response {
    let Some(post_id) = non_empty(query.tweet_id) else {
        return ApiError(Error::invalid_input("tweetId is required")).into_response();
    };
    if !post_id.chars().all(|c| c.is_ascii_digit()) {
        return ApiError(Error::invalid_input("tweetId must be numeric")).into_response();
    }

    match state.resolver.fetch_raw(&post_id).await {
        Ok(body) => Json(body).into_response(),
        Err(Error::UpstreamStatus(status)) => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
            Json(json!({ "error": "Failed to fetch from mirror" })),
        )
            .into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub url: Option<String>,
    pub filename: Option<String>,
}

fn plain(status: StatusCode, body: &'static str) -> Response {
    (status, body).into_response()
}

/// Streams a remote media file back as an attachment.
pub async fn download_proxy(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Response {
    let Some(raw_url) = non_empty(query.url) else {
        return plain(StatusCode::BAD_REQUEST, "url required");
    };
    info!("Download request: {}", raw_url);

    let target = match Url::parse(&raw_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => url,
        _ => return plain(StatusCode::BAD_REQUEST, "url must be an absolute http(s) url"),
    };
    let filename = non_empty(query.filename).unwrap_or_else(|| DEFAULT_FILENAME.to_string());

    match relay(&state, target, &filename).await {
        Ok(response) => response,
        Err(e) if e.is_upstream() => {
            warn!("Download of {} failed: {}", raw_url, e);
            plain(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch media")
        }
        Err(e) => {
            error!("Download error for {}: {}", raw_url, e);
            plain(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
        }
    }
}

async fn relay(state: &AppState, target: Url, filename: &str) -> Result<Response, Error> {
    let upstream = state
        .http
        .get(target)
        .header(USER_AGENT, &*state.user_agent)
        .send()
        .await
        .map_err(|e| Error::UpstreamFetch(e.to_string()))?;

    let status = upstream.status();
    let content_type = upstream
        .headers()
        .get(CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    info!(
        "Upstream status: {}, content-type: {:?}",
        status, content_type
    );

    if !status.is_success() {
        return Err(Error::UpstreamStatus(status.as_u16()));
    }
    let content_length = upstream.content_length();
    let mut chunks = upstream.bytes_stream();
    let first = first_chunk(&mut chunks).await?;

    let disposition = HeaderValue::from_bytes(
        format!("attachment; filename=\"{}\"", sanitize_filename(filename)).as_bytes(),
    )
    .map_err(|e| Error::Internal(format!("bad content-disposition: {e}")))?;

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type)
        .header(CONTENT_DISPOSITION, disposition);
    if let Some(len) = content_length {
        response = response.header(CONTENT_LENGTH, len);
    }

    let body = stream::once(async move { Ok::<_, reqwest::Error>(first) }).chain(chunks);
    response
        .body(Body::from_stream(body))
        .map_err(|e| Error::Internal(e.to_string()))
}

/// Waits for the first non-empty chunk, so an upstream that sends no bytes
/// at all fails before any status line goes out.
async fn first_chunk<S>(stream: &mut S) -> Result<Bytes, Error>
where
    S: Stream<Item = reqwest::Result<Bytes>> + Unpin,
{
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| Error::UpstreamFetch(format!("stream error: {e}")))?;
        if !chunk.is_empty() {
            return Ok(chunk);
        }
    }
    Err(Error::UpstreamFetch("no response body".to_string()))
}
