use crate::error::ValidationError;
use crate::models::Price;
use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_SENTIMENT: &str = "close friend";
pub const DEFAULT_PRICE: Price = Price::from_minor(500);

/// Where the gift service lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub base_url: Url,
    /// Per-request timeout. `None` waits for the transport's own limits.
    pub timeout: Option<Duration>,
}

impl ServiceConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: None,
        }
    }

    /// Parse a base URL such as `https://giftie.example.com`.
    pub fn parse(base_url: &str) -> anyhow::Result<Self> {
        let url = Url::parse(base_url).with_context(|| format!("invalid base url {base_url:?}"))?;
        let config = Self::new(url);
        config.validate()?;
        Ok(config)
    }

    /// Endpoints are joined onto the base, so it must be able to carry a path.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.base_url.cannot_be_a_base() {
            return Err(ValidationError::InvalidBaseUrl(self.base_url.to_string()));
        }
        Ok(())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Resolve `path` against the base URL, keeping any path prefix the base
    /// already carries.
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let p = format!("{}/", base.path());
            base.set_path(&p);
        }
        base.join(path.trim_start_matches('/'))
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base url is valid"),
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Values used when the caller supplies none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defaults {
    pub sentiment: String,
    pub price: Price,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            sentiment: DEFAULT_SENTIMENT.into(),
            price: DEFAULT_PRICE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub service: ServiceConfig,
    pub defaults: Defaults,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    #[serde(default)]
    service: ServiceSection,
    #[serde(default)]
    defaults: DefaultsSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServiceSection {
    base_url: Option<Url>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DefaultsSection {
    sentiment: Option<String>,
    price: Option<Price>,
}

impl Settings {
    /// Parse settings from TOML text. Missing keys fall back to defaults.
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        let file: SettingsFile = toml::from_str(text).context("invalid settings file")?;
        let mut settings = Settings::default();
        if let Some(url) = file.service.base_url {
            settings.service.base_url = url;
        }
        if let Some(secs) = file.service.timeout_secs {
            settings.service.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        settings.service.validate()?;
        if let Some(sentiment) = file.defaults.sentiment {
            anyhow::ensure!(!sentiment.trim().is_empty(), "default sentiment is blank");
            settings.defaults.sentiment = sentiment;
        }
        if let Some(price) = file.defaults.price {
            anyhow::ensure!(!price.is_zero(), "default price must be greater than zero");
            settings.defaults.price = price;
        }
        Ok(settings)
    }

    /// Load settings from `path`; a missing file yields the defaults.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => {
                Self::from_toml(&text).with_context(|| format!("loading {}", path.display()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no settings file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }
}
