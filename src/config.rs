//! Client settings and base URL resolution.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

/// Default API base path, resolved against [`Config::origin`] when relative.
pub const DEFAULT_API_BASE_URL: &str = "/api/v1";
const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

/// Process-wide settings, constructed once at startup and handed to
/// [`ClientBuilder::from_config`](crate::ClientBuilder::from_config).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base path or absolute URL prepended to every endpoint.
    pub api_base_url: String,
    /// Scheme and host a relative `api_base_url` is resolved against.
    pub origin: Option<String>,
    /// Per-request timeout.
    #[serde(with = "millis")]
    pub request_timeout: Duration,
    /// Page size used when the caller does not ask for one.
    pub default_page_size: u32,
    /// Upper bound for any requested page size.
    pub max_page_size: u32,
    /// Verbose logging for surrounding UI code.
    pub debug: bool,
    /// Lifetime of cached GET responses. `None` disables caching.
    #[serde(with = "opt_secs")]
    pub cache_ttl: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            origin: None,
            request_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            debug: false,
            cache_ttl: None,
        }
    }
}

impl Config {
    /// Defaults overlaid with `LABEL_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup("LABEL_API_BASE_URL") {
            config.api_base_url = url;
        }
        if let Some(origin) = lookup("LABEL_API_ORIGIN") {
            config.origin = Some(origin);
        }
        if let Some(ms) = lookup("LABEL_REQUEST_TIMEOUT_MS") {
            config.request_timeout = Duration::from_millis(parse_var("LABEL_REQUEST_TIMEOUT_MS", &ms)?);
        }
        if let Some(debug) = lookup("LABEL_DEBUG") {
            config.debug = parse_var("LABEL_DEBUG", &debug)?;
        }
        if let Some(secs) = lookup("LABEL_CACHE_TTL_SECS") {
            config.cache_ttl = Some(Duration::from_secs(parse_var("LABEL_CACHE_TTL_SECS", &secs)?));
        }

        Ok(config)
    }

    /// The absolute base URL every endpoint is appended to.
    ///
    /// An absolute `api_base_url` is used as-is. A relative one is joined
    /// onto `origin`, the way a browser resolves it against the page.
    pub fn base_url(&self) -> Result<String> {
        let base = self.api_base_url.trim_end_matches('/');
        if base.starts_with("http://") || base.starts_with("https://") {
            return Ok(base.to_string());
        }

        let origin = self.origin.as_deref().ok_or_else(|| {
            Error::Config(format!(
                "relative API base URL {:?} needs an origin",
                self.api_base_url
            ))
        })?;

        let origin = origin.trim_end_matches('/');
        if base.is_empty() {
            Ok(origin.to_string())
        } else if base.starts_with('/') {
            Ok(format!("{}{}", origin, base))
        } else {
            Ok(format!("{}/{}", origin, base))
        }
    }

    /// Page size to request: the default when none was asked for,
    /// otherwise clamped to `1..=max_page_size`.
    pub fn page_size(&self, requested: Option<u32>) -> u32 {
        match requested {
            None => self.default_page_size,
            Some(size) => size.clamp(1, self.max_page_size.max(1)),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("invalid value for {}: {:?}", key, value)))
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

mod opt_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}
