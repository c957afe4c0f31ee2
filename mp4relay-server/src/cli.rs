use clap::Parser;
use std::path::PathBuf;

/// Define CLI arguments
#[derive(Parser, Debug, Default)]
#[command(
    author = "hua0512 <https://github.com/hua0512>",
    version,
    about = "Disk-caching HTTP streaming relay for remote MP4 files",
    long_about = "Serves remote MP4 files through a local disk cache.\n\
                  \n\
                  A cached video is streamed straight from disk with byte-range\n\
                  support; an uncached one is fetched from its origin while the\n\
                  bytes are simultaneously relayed to the client and persisted\n\
                  for future requests. Every flag falls back to the matching\n\
                  environment variable (a .env file is honored)."
)]
pub struct CliArgs {
    /// Address to listen on
    #[arg(long, help = "Listen address (env: HOST, default: 127.0.0.1)")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long, help = "Listen port (env: PORT, default: 8000)")]
    pub port: Option<u16>,

    /// Route path segment under which the endpoint is served
    #[arg(
        long = "path",
        help = "Route path segment, served under \"/<path>\" (env: APP_PATH, default: empty)"
    )]
    pub app_path: Option<String>,

    /// Directory holding cached videos
    #[arg(long, help = "Cache directory (env: CACHE_DIR, default: /tmp/mp4cache)")]
    pub cache_dir: Option<PathBuf>,

    /// Cache capacity in gibibytes
    #[arg(
        long,
        help = "Maximum cache size in GiB; least-recently-used entries are evicted past it (env: CACHE_SIZE_GB, default: 2)"
    )]
    pub cache_size_gb: Option<u64>,

    /// Shared-secret token clients must present
    #[arg(long, help = "Access token compared against the `token` query parameter (env: TOKEN)")]
    pub token: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable detailed debug logging")]
    pub verbose: bool,
}
