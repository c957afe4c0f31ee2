use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Configurable options for the origin fetcher.
///
/// Resolved once at startup and handed in; the engine never reads the
/// ambient environment itself.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Overall timeout for the entire HTTP request. Zero disables it;
    /// a stalled origin then holds the task open indefinitely.
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// User agent string
    pub user_agent: String,

    /// Custom HTTP headers for origin requests
    pub headers: HeaderMap,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::ZERO,
            connect_timeout: Duration::ZERO,
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: FetcherConfig::get_default_headers(),
        }
    }
}

impl FetcherConfig {
    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::ACCEPT_ENCODING,
            HeaderValue::from_static("gzip, deflate"),
        );

        default_headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );

        default_headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("*/*"));

        default_headers
    }
}
