//! # Origin Fetcher
//!
//! Streams a video from its origin while the bytes are simultaneously
//! appended to a staging file and relayed to the waiting client. The
//! relay half is best-effort: a client that disconnects stops only the
//! relay, never the fetch-to-cache loop, so the download still completes
//! and is committed for future requests.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use reqwest::{Client, Response, Url};
use rustls::ClientConfig;
use rustls::crypto::aws_lc_rs;
use rustls_platform_verifier::BuilderVerifierExt;
use tokio::fs;
use tokio::io::{self, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cache::store::CacheStore;
use crate::config::FetcherConfig;
use crate::error::RelayError;
use crate::stream::CHUNK_SIZE;

/// Sender half of the client relay. The receiver side backs the HTTP
/// response body; a closed receiver means the client went away.
pub type RelaySender = mpsc::Sender<io::Result<Bytes>>;

/// Create a reqwest Client with the provided configuration
pub fn create_client(config: &FetcherConfig) -> Result<Client, RelayError> {
    // Create the crypto provider
    let provider = Arc::new(aws_lc_rs::default_provider());

    // Build platform default TLS configuration
    let tls_config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .expect("Failed to configure default TLS protocol versions")
        .with_platform_verifier()
        .expect("Failed to configure platform certificate verifier")
        .with_no_client_auth();

    let mut client_builder = Client::builder()
        .pool_max_idle_per_host(5)
        .user_agent(&config.user_agent)
        .default_headers(config.headers.clone())
        .use_preconfigured_tls(tls_config)
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !config.timeout.is_zero() {
        client_builder = client_builder.timeout(config.timeout);
    }

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    client_builder.build().map_err(RelayError::from)
}

/// Issues origin requests and drives the fetch-while-relay loop.
#[derive(Debug, Clone)]
pub struct OriginFetcher {
    client: Client,
}

impl OriginFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self, RelayError> {
        let client = create_client(config)?;
        Ok(Self { client })
    }

    /// Build a fetcher around an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Issue the origin GET and verify it succeeded.
    ///
    /// A non-success origin status is surfaced unchanged to the caller;
    /// there is no local retry.
    pub async fn start(&self, url_str: &str) -> Result<OriginResponse, RelayError> {
        let url = url_str
            .parse::<Url>()
            .map_err(|e| RelayError::Url(format!("{url_str}: {e}")))?;

        info!(url = %url, "Starting origin request");
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(RelayError::OriginStatus(response.status()));
        }

        Ok(OriginResponse { inner: response })
    }
}

/// A successful origin response, ready to be relayed and cached.
#[derive(Debug)]
pub struct OriginResponse {
    inner: Response,
}

impl OriginResponse {
    /// Declared content length; absent or unparsable counts as 0, which
    /// the commit rule treats as unverifiable and refuses to promote.
    pub fn content_length(&self) -> u64 {
        self.inner.content_length().unwrap_or(0)
    }

    /// Origin's declared content type, if any.
    pub fn content_type(&self) -> Option<String> {
        self.inner
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }

    /// Consume the response: append every chunk to the staging file and
    /// try to relay it through `tx`. On loop completion the staging file
    /// is committed iff the written byte count matches the declared
    /// length, and a committed entry triggers an eviction pass.
    ///
    /// Returns whether the entry was committed. A transport error
    /// mid-fetch removes the staging file best-effort and is surfaced
    /// once, both to the caller and through the relay.
    pub async fn relay_to_cache(
        self,
        store: &CacheStore,
        key: &str,
        max_cache_bytes: u64,
        tx: RelaySender,
    ) -> Result<bool, RelayError> {
        let expected_len = self.content_length();
        let staging = store.staging_path(key);

        let written = match pump(self.inner, &staging, &tx).await {
            Ok(written) => written,
            Err(e) => {
                warn!(key, error = %e, "Origin fetch failed, discarding staging file");
                if let Err(cleanup) = store.discard_staging(key).await {
                    warn!(key, error = %cleanup, "Failed to discard staging file");
                }
                // Let an attached client observe the failure too
                let _ = tx.send(Err(io::Error::other(e.to_string()))).await;
                return Err(e);
            }
        };

        let committed = store.commit_staging(key, expected_len, written).await?;
        if committed {
            // Eviction is best-effort and never fails the request
            if let Err(e) = store.evict_if_needed(max_cache_bytes).await {
                warn!(error = %e, "Cache eviction pass failed");
            }
        }
        Ok(committed)
    }
}

/// The tee loop: write each chunk to the staging file, then offer it to
/// the client. `written` counts staging bytes only, independent of how
/// much the client actually received.
async fn pump(response: Response, staging: &Path, tx: &RelaySender) -> Result<u64, RelayError> {
    let mut file = fs::File::create(staging).await?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;
    let mut relay_open = true;

    while let Some(chunk) = stream.next().await {
        let mut chunk = chunk?;
        while !chunk.is_empty() {
            let piece = chunk.split_to(chunk.len().min(CHUNK_SIZE));
            file.write_all(&piece).await?;
            written += piece.len() as u64;

            if relay_open && tx.send(Ok(piece)).await.is_err() {
                relay_open = false;
                debug!("Client disconnected during relay, continuing fetch to cache");
            }
        }
    }

    file.flush().await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::tempdir;

    fn fetcher() -> OriginFetcher {
        // The reqwest build relies on a process-default crypto provider
        let _ = aws_lc_rs::default_provider().install_default();
        OriginFetcher::with_client(Client::new())
    }

    async fn store() -> (tempfile::TempDir, CacheStore) {
        let dir = tempdir().expect("temp dir");
        let store = CacheStore::open(dir.path()).await.expect("open store");
        (dir, store)
    }

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[tokio::test]
    async fn test_relay_and_commit() {
        let mut server = mockito::Server::new_async().await;
        let content = sample(CHUNK_SIZE * 2 + 100);
        let mock = server
            .mock("GET", "/v.mp4")
            .with_body(&content)
            .create_async()
            .await;

        let (_dir, store) = store().await;
        let url = format!("{}/v.mp4", server.url());
        let key = crate::cache::key::derive_key(&url);

        let response = fetcher().start(&url).await.unwrap();
        assert_eq!(response.content_length(), content.len() as u64);

        let (tx, mut rx) = mpsc::channel::<io::Result<Bytes>>(16);
        let relay = tokio::spawn(async move {
            let mut body = Vec::new();
            while let Some(chunk) = rx.recv().await {
                body.extend_from_slice(&chunk.unwrap());
            }
            body
        });

        let committed = response
            .relay_to_cache(&store, &key, u64::MAX, tx)
            .await
            .unwrap();
        assert!(committed);
        assert_eq!(relay.await.unwrap(), content);
        assert_eq!(
            fs::read(store.entry_path(&key)).await.unwrap(),
            content
        );

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_client_gone_fetch_still_cached() {
        let mut server = mockito::Server::new_async().await;
        let content = sample(CHUNK_SIZE * 4);
        server
            .mock("GET", "/v.mp4")
            .with_body(&content)
            .create_async()
            .await;

        let (_dir, store) = store().await;
        let url = format!("{}/v.mp4", server.url());
        let key = crate::cache::key::derive_key(&url);

        let response = fetcher().start(&url).await.unwrap();
        // Receiver dropped immediately: the client never reads a byte
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let committed = response
            .relay_to_cache(&store, &key, u64::MAX, tx)
            .await
            .unwrap();
        assert!(committed);
        assert_eq!(store.size_of(&key).await.unwrap(), content.len() as u64);
    }

    #[tokio::test]
    async fn test_unknown_length_is_not_committed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v.mp4")
            .with_chunked_body(|w| w.write_all(&[7u8; 4096]))
            .create_async()
            .await;

        let (_dir, store) = store().await;
        let url = format!("{}/v.mp4", server.url());
        let key = crate::cache::key::derive_key(&url);

        let response = fetcher().start(&url).await.unwrap();
        assert_eq!(response.content_length(), 0);

        let (tx, mut rx) = mpsc::channel(16);
        let drain = tokio::spawn(async move { while rx.recv().await.is_some() {} });

        let committed = response
            .relay_to_cache(&store, &key, u64::MAX, tx)
            .await
            .unwrap();
        drain.await.unwrap();

        assert!(!committed);
        assert!(!store.exists(&key).await.unwrap());
        assert!(!fs::try_exists(store.staging_path(&key)).await.unwrap());
    }

    #[tokio::test]
    async fn test_transport_error_discards_staging() {
        let mut server = mockito::Server::new_async().await;
        // Aborting the chunked body mid-stream fails the client's read
        server
            .mock("GET", "/cut.mp4")
            .with_chunked_body(|w| {
                w.write_all(&[7u8; CHUNK_SIZE])?;
                Err(io::Error::other("connection dropped"))
            })
            .create_async()
            .await;

        let (_dir, store) = store().await;
        let url = format!("{}/cut.mp4", server.url());
        let key = crate::cache::key::derive_key(&url);

        let response = fetcher().start(&url).await.unwrap();
        let (tx, mut rx) = mpsc::channel::<io::Result<Bytes>>(16);
        let relay = tokio::spawn(async move {
            let mut last_was_err = false;
            while let Some(chunk) = rx.recv().await {
                last_was_err = chunk.is_err();
            }
            last_was_err
        });

        let err = response
            .relay_to_cache(&store, &key, u64::MAX, tx)
            .await
            .unwrap_err();
        assert!(err.origin_status().is_none());
        assert!(relay.await.unwrap(), "failure was not relayed");

        assert!(!store.exists(&key).await.unwrap());
        assert!(!fs::try_exists(store.staging_path(&key)).await.unwrap());
    }

    #[tokio::test]
    async fn test_origin_error_surfaced_unchanged() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/missing.mp4")
            .with_status(404)
            .create_async()
            .await;

        let url = format!("{}/missing.mp4", server.url());
        let err = fetcher().start(&url).await.unwrap_err();
        assert_eq!(err.origin_status(), Some(reqwest::StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_invalid_url_rejected() {
        let err = fetcher().start("not a url").await.unwrap_err();
        assert!(matches!(err, RelayError::Url(_)));
    }
}
