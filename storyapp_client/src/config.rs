use anyhow::{anyhow, Context, Result};
use reqwest::Url;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8080";

#[derive(Debug, Clone)]
pub struct StoryAppConfig {
    pub api_base_url: String,
    pub paths: StoryAppPaths,
    pub paging: PagingConfig,
    pub http: HttpConfig,
}

impl StoryAppConfig {
    pub fn from_env() -> Result<Self> {
        let paths = match env::var("STORYAPP_HOME") {
            Ok(raw) if !raw.trim().is_empty() => StoryAppPaths::from_base_dir(raw.trim())?,
            _ => StoryAppPaths::discover()?,
        };
        let api_base_url = env::var("STORYAPP_API_URL")
            .ok()
            .filter(|raw| !raw.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        Self::new(api_base_url, paths, PagingConfig::from_env(), HttpConfig::from_env())
    }

    pub fn new(
        api_base_url: impl Into<String>,
        paths: StoryAppPaths,
        paging: PagingConfig,
        http: HttpConfig,
    ) -> Result<Self> {
        Ok(Self {
            api_base_url: sanitize_base_url(api_base_url.into())?,
            paths,
            paging,
            http,
        })
    }
}

/// Window sizes for the story feed. Sizes are in stories, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingConfig {
    /// Stories requested per remote page and per local window.
    pub page_size: usize,
    /// How close to either edge of the loaded window the anchor may get
    /// before more data is requested.
    pub prefetch_distance: usize,
    pub initial_load_size: usize,
}

impl PagingConfig {
    pub fn new(page_size: usize) -> Self {
        let page_size = page_size.max(1);
        Self {
            page_size,
            prefetch_distance: page_size,
            initial_load_size: page_size * 3,
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Zero or unparsable values fall back to the defaults.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let positive = |key: &str| {
            lookup(key)
                .and_then(|raw| raw.trim().parse::<usize>().ok())
                .filter(|value| *value > 0)
        };
        let mut config = Self::new(positive("STORYAPP_PAGE_SIZE").unwrap_or(5));
        if let Some(distance) = positive("STORYAPP_PREFETCH_DISTANCE") {
            config.prefetch_distance = distance;
        }
        config
    }
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self::new(5)
    }
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub max_upload_bytes: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            max_upload_bytes: 1_000_000,
        }
    }
}

impl HttpConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let timeout = env::var("STORYAPP_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);
        let max_upload_bytes = env::var("STORYAPP_MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .unwrap_or(defaults.max_upload_bytes);
        Self {
            timeout,
            max_upload_bytes,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StoryAppPaths {
    pub base: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub logs_dir: PathBuf,
}

impl StoryAppPaths {
    pub fn discover() -> Result<Self> {
        let exe_path = std::env::current_exe()
            .map_err(|err| anyhow!("failed to resolve current executable: {err}"))?;
        let base = exe_path
            .parent()
            .ok_or_else(|| anyhow!("executable path missing parent"))?
            .to_path_buf();
        Self::from_base_dir(base)
    }

    pub fn from_base_dir<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        let data_dir = base.join("data");
        let db_path = data_dir.join("storyapp.db");
        let logs_dir = base.join("logs");

        Ok(Self {
            base,
            data_dir,
            db_path,
            logs_dir,
        })
    }
}

pub fn sanitize_base_url(mut base: String) -> Result<String> {
    base = base.trim().to_string();
    if !base.starts_with("http://") && !base.starts_with("https://") {
        base = format!("http://{base}");
    }
    while base.ends_with('/') {
        base.pop();
    }
    let _ = Url::parse(&base).with_context(|| format!("invalid API base URL: {base}"))?;
    Ok(base)
}
