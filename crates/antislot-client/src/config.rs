//! Client configuration and API URL policy.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;

use crate::error::{Result, SyncError};

/// Hard timeout for each snapshot request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Hosts that may be reached over plain HTTP (local and emulator loopbacks).
pub const LOCAL_HTTP_HOSTS: &[&str] = &["localhost", "127.0.0.1", "10.0.2.2", "10.0.3.2"];

/// Client settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the distribution API.
    pub api_url: String,
    /// Shared HMAC secret; sync refuses to run without it.
    pub hmac_secret: Option<String>,
    pub timeout: Duration,
    /// Where verified state is persisted. `None` keeps it in memory only.
    pub state_file: Option<PathBuf>,
    /// Domains that are never blocked.
    pub allow_list: Vec<String>,
}

impl ClientConfig {
    /// Creates a config for `api_url` with the default timeout.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            hmac_secret: None,
            timeout: DEFAULT_TIMEOUT,
            state_file: None,
            allow_list: Vec::new(),
        }
    }

    /// Sets the HMAC secret.
    pub fn with_hmac_secret(mut self, secret: impl Into<String>) -> Self {
        self.hmac_secret = Some(secret.into());
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Persists verified state to `path`.
    pub fn with_state_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_file = Some(path.into());
        self
    }

    /// Seeds the allow-list.
    pub fn with_allow_list<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow_list = domains.into_iter().map(Into::into).collect();
        self
    }
}

/// Adds a scheme when none is given (`http` for local hosts, `https`
/// otherwise) and strips trailing slashes.
pub fn normalize_api_url(value: &str) -> String {
    let url = value.trim();
    if url.is_empty() {
        return String::new();
    }

    let lower = url.to_ascii_lowercase();
    let url = if lower.contains("://") {
        url.to_string()
    } else if LOCAL_HTTP_HOSTS.iter().any(|host| lower.starts_with(host)) {
        format!("http://{url}")
    } else {
        format!("https://{url}")
    };

    url.trim_end_matches('/').to_string()
}

/// Normalizes and checks an API URL: HTTP(S) only, HTTPS unless local.
pub fn validate_api_url(value: &str) -> Result<String> {
    let normalized = normalize_api_url(value);
    if normalized.is_empty() {
        return Err(SyncError::InvalidUrl(value.to_string()));
    }

    let parsed =
        Url::parse(&normalized).map_err(|e| SyncError::InvalidUrl(format!("{value}: {e}")))?;
    match parsed.scheme() {
        "https" => Ok(normalized),
        "http" => {
            let host = parsed.host_str().unwrap_or_default();
            if LOCAL_HTTP_HOSTS.contains(&host) {
                Ok(normalized)
            } else {
                Err(SyncError::InsecureUrl(normalized))
            }
        }
        _ => Err(SyncError::InvalidUrl(value.to_string())),
    }
}
