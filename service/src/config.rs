use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default backend API base URL used when `BACKEND_BASE_URL` is not set.
pub const DEFAULT_BACKEND_BASE_URL: &str = "http://localhost:8080/api";

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that allowed to receive server responses.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "http://localhost:3000,https://localhost:3000"
    )]
    pub allowed_origins: Vec<String>,

    /// Base URL of the backend API the order routes proxy to.
    #[arg(short, long, env, default_value = DEFAULT_BACKEND_BASE_URL)]
    backend_base_url: String,

    /// Path (relative to the backend base URL) of the backend order event stream.
    #[arg(long, env, default_value = "/orders/stream")]
    backend_order_stream_path: String,

    /// Path (relative to the backend base URL) used to refresh an expired session.
    #[arg(long, env, default_value = "/auth/refresh")]
    backend_refresh_path: String,

    /// Timeout in seconds for establishing a TCP/TLS connection to the backend
    #[arg(long, env, default_value_t = 10)]
    pub backend_connect_timeout_secs: u64,

    /// Timeout in seconds for a complete (non-streaming) backend request
    #[arg(long, env, default_value_t = 30)]
    pub backend_timeout_secs: u64,

    /// Name of the cookie holding the caller's access token.
    #[arg(long, env, default_value = "access_token")]
    pub access_token_cookie: String,

    /// Name of the cookie holding the caller's refresh token.
    #[arg(long, env, default_value = "refresh_token")]
    pub refresh_token_cookie: String,

    /// Frames a local order feed connection may have queued before new frames are dropped for it
    #[arg(long, env, default_value_t = 32)]
    pub sse_client_buffer: usize,

    /// Consecutive dropped frames after which a lagging local feed connection is closed
    #[arg(long, env, default_value_t = 64)]
    pub sse_max_lagged_frames: u32,

    /// Seconds between keep-alive comments on an idle local feed connection
    #[arg(long, env, default_value_t = 15)]
    pub sse_keep_alive_secs: u64,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 4000)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap()),
    )]
    pub runtime_env: RustEnv,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    /// Backend base URL without a trailing slash.
    pub fn backend_base_url(&self) -> &str {
        self.backend_base_url.trim_end_matches('/')
    }

    pub fn set_backend_base_url(mut self, backend_base_url: String) -> Self {
        self.backend_base_url = backend_base_url;
        self
    }

    pub fn backend_order_stream_path(&self) -> &str {
        &self.backend_order_stream_path
    }

    pub fn backend_refresh_path(&self) -> &str {
        &self.backend_refresh_path
    }

    pub fn backend_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_connect_timeout_secs)
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    pub fn sse_keep_alive(&self) -> Duration {
        Duration::from_secs(self.sse_keep_alive_secs.max(1))
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }

    pub fn is_production(&self) -> bool {
        self.runtime_env() == RustEnv::Production
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["order_relay"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);

        assert_eq!(config.backend_base_url(), DEFAULT_BACKEND_BASE_URL);
        assert_eq!(config.backend_order_stream_path(), "/orders/stream");
        assert_eq!(config.backend_refresh_path(), "/auth/refresh");
        assert_eq!(config.access_token_cookie, "access_token");
        assert_eq!(config.refresh_token_cookie, "refresh_token");
        assert_eq!(config.sse_client_buffer, 32);
        assert_eq!(config.sse_max_lagged_frames, 64);
        assert_eq!(config.sse_keep_alive(), Duration::from_secs(15));
        assert_eq!(config.log_level_filter, LevelFilter::Info);
        assert!(!config.is_production());
    }

    #[test]
    fn test_backend_base_url_trailing_slash_is_trimmed() {
        let config = parse(&["--backend-base-url", "https://backend.example.com/api/"]);
        assert_eq!(config.backend_base_url(), "https://backend.example.com/api");
    }

    #[test]
    fn test_allowed_origins_are_comma_delimited() {
        let config = parse(&["--allowed-origins", "https://a.example,https://b.example"]);
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn test_runtime_env_accepts_uppercase() {
        let config = parse(&["--runtime-env", "PRODUCTION"]);
        assert!(config.is_production());
        assert_eq!(config.runtime_env().to_string(), "production");
    }

    #[test]
    fn test_keep_alive_is_never_zero() {
        let config = parse(&["--sse-keep-alive-secs", "0"]);
        assert_eq!(config.sse_keep_alive(), Duration::from_secs(1));
    }

    #[test]
    fn test_rust_env_from_str_rejects_unknown() {
        assert_eq!("qa".parse::<RustEnv>(), Err(RustEnvParseError));
    }
}
