use std::path::PathBuf;

use crate::cli::CliArgs;
use crate::error::AppError;

const BYTES_PER_GIB: u64 = 1024 * 1024 * 1024;

/// Resolved, immutable server configuration.
///
/// Built once at startup from CLI flags with environment fallbacks and
/// passed into the engine as plain values; core logic never reads the
/// ambient environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Path segment the endpoint is mounted under, without the leading
    /// slash. Empty means the root.
    pub app_path: String,
    pub cache_dir: PathBuf,
    /// Cache capacity in bytes.
    pub max_cache_size: u64,
    /// Shared secret compared against the `token` query parameter.
    pub token: String,
}

fn env_or<T, F>(var: &str, fallback: T, parse: F) -> Result<T, AppError>
where
    F: FnOnce(String) -> Result<T, AppError>,
{
    match std::env::var(var) {
        Ok(value) => parse(value),
        Err(_) => Ok(fallback),
    }
}

impl ServerConfig {
    /// Resolve the configuration: CLI flags win over environment
    /// variables, which win over the defaults.
    pub fn resolve(args: &CliArgs) -> Result<Self, AppError> {
        let host = match &args.host {
            Some(host) => host.clone(),
            None => env_or("HOST", "127.0.0.1".to_string(), Ok)?,
        };

        let port = match args.port {
            Some(port) => port,
            None => env_or("PORT", 8000, |v| {
                v.parse()
                    .map_err(|_| AppError::InvalidInput(format!("Invalid PORT value: '{v}'")))
            })?,
        };

        let app_path = match &args.app_path {
            Some(path) => path.clone(),
            None => env_or("APP_PATH", String::new(), Ok)?,
        };

        let cache_dir = match &args.cache_dir {
            Some(dir) => dir.clone(),
            None => env_or("CACHE_DIR", PathBuf::from("/tmp/mp4cache"), |v| {
                Ok(PathBuf::from(v))
            })?,
        };

        let cache_size_gb = match args.cache_size_gb {
            Some(gb) => gb,
            None => env_or("CACHE_SIZE_GB", 2, |v| {
                v.parse().map_err(|_| {
                    AppError::InvalidInput(format!("Invalid CACHE_SIZE_GB value: '{v}'"))
                })
            })?,
        };

        let token = match &args.token {
            Some(token) => token.clone(),
            None => env_or("TOKEN", String::new(), Ok)?,
        };

        Ok(Self {
            host,
            port,
            app_path: app_path.trim_start_matches('/').to_string(),
            cache_dir,
            max_cache_size: cache_size_gb * BYTES_PER_GIB,
            token,
        })
    }

    /// Route path the endpoint is mounted at.
    pub fn route_path(&self) -> String {
        format!("/{}", self.app_path)
    }
}
