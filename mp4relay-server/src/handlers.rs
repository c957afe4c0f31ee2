use std::time::Duration;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use rand::RngExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use mp4relay_engine::{RangeError, RelayError, derive_key, resolve_window, stream_entry};

use crate::state::AppState;

/// Channel depth between the origin pump and the client body.
const RELAY_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Deserialize)]
pub struct FetchParams {
    url: Option<String>,
    token: Option<String>,
}

/// Plain-text error response for the fetch endpoint.
#[derive(Debug)]
pub struct ServeError {
    status: StatusCode,
    message: String,
    content_range: Option<String>,
}

impl ServeError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            content_range: None,
        }
    }

    fn bad_request() -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Invalid or missing .mp4 URL")
    }

    fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "Forbidden: Invalid token")
    }

    fn unsatisfiable(err: &RangeError) -> Self {
        let mut this = Self::new(StatusCode::RANGE_NOT_SATISFIABLE, err.to_string());
        this.content_range = Some(err.content_range());
        this
    }

    fn internal(err: impl std::fmt::Display) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {err}"))
    }

    /// Origin failures pass the upstream status through unchanged; any
    /// other relay failure is a single 500.
    fn from_relay(err: RelayError) -> Self {
        match err.origin_status() {
            Some(status) => Self::new(status, "Upstream error"),
            None => Self::internal(err),
        }
    }
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.message).into_response();
        if let Some(content_range) = self.content_range
            && let Ok(value) = content_range.parse()
        {
            response
                .headers_mut()
                .insert(header::CONTENT_RANGE, value);
        }
        response
    }
}

/// The fetch endpoint.
///
/// `ValidateInput -> AuthCheck -> CacheLookup -> {Hit | Miss} -> Respond`,
/// with the token check first so the randomized delay is observable
/// before anything else, exactly as deployed clients expect.
pub async fn fetch_video(
    State(state): State<AppState>,
    Query(params): Query<FetchParams>,
    headers: HeaderMap,
) -> Result<Response, ServeError> {
    // An absent token never matches, even an empty configured secret
    if params.token.as_deref() != Some(state.config.token.as_str()) {
        // Uniform whole-second delay against automated token guessing
        let delay = rand::rng().random_range(1..5u64);
        tokio::time::sleep(Duration::from_secs(delay)).await;
        return Err(ServeError::forbidden());
    }

    let url = match params.url {
        Some(url) if url.ends_with(".mp4") => url,
        _ => return Err(ServeError::bad_request()),
    };

    let key = derive_key(&url);
    let filename = url.rsplit('/').next().unwrap_or_default().to_string();

    if state.store.exists(&key).await.map_err(ServeError::internal)? {
        return serve_hit(&state, &key, &filename, &headers).await;
    }

    // Miss: serialize concurrent fetches of the same key. Whoever loses
    // the race re-checks the store and is served the committed entry.
    let lock = state.locks.lock_for(&key);
    let guard = lock.lock_owned().await;

    if state.store.exists(&key).await.map_err(ServeError::internal)? {
        return serve_hit(&state, &key, &filename, &headers).await;
    }

    let origin = state
        .fetcher
        .start(&url)
        .await
        .map_err(ServeError::from_relay)?;

    let content_type = origin
        .content_type()
        .unwrap_or_else(|| "video/mp4".to_string());
    let content_length = origin.content_length();

    let (tx, rx) = mpsc::channel(RELAY_CHANNEL_CAPACITY);
    let store = state.store.clone();
    let max_cache_size = state.config.max_cache_size;
    let task_key = key.clone();
    tokio::spawn(async move {
        // Hold the per-key lock until commit or discard is done
        let _guard = guard;
        match origin
            .relay_to_cache(&store, &task_key, max_cache_size, tx)
            .await
        {
            Ok(true) => debug!(key = %task_key, "Fetched video committed to cache"),
            Ok(false) => debug!(key = %task_key, "Fetched video discarded as incomplete"),
            Err(e) => warn!(key = %task_key, error = %e, "Origin relay failed"),
        }
    });

    // No partial-content support on a cold cache: always a full stream
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{filename}\""),
        );
    if content_length > 0 {
        builder = builder.header(header::CONTENT_LENGTH, content_length);
    }
    builder
        .body(Body::from_stream(ReceiverStream::new(rx)))
        .map_err(ServeError::internal)
}

/// Stream a committed entry over the window the `Range` header resolves
/// to, refreshing its recency first.
async fn serve_hit(
    state: &AppState,
    key: &str,
    filename: &str,
    headers: &HeaderMap,
) -> Result<Response, ServeError> {
    state.store.touch(key).await.map_err(ServeError::internal)?;
    let total = state
        .store
        .size_of(key)
        .await
        .map_err(ServeError::internal)?;

    let range_header = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok());
    let window =
        resolve_window(range_header, total).map_err(|e| ServeError::unsatisfiable(&e))?;

    let entry_path = state.store.entry_path(key);
    let stream = stream_entry(&entry_path, &window)
        .await
        .map_err(ServeError::internal)?;

    let status = if window.partial {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(header::CONTENT_LENGTH, window.length())
        .header(header::ACCEPT_RANGES, "bytes")
        .header(
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{filename}\""),
        );
    if let Some(content_range) = window.content_range() {
        builder = builder.header(header::CONTENT_RANGE, content_range);
    }
    builder
        .body(Body::from_stream(stream))
        .map_err(ServeError::internal)
}
