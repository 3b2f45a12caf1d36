use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure for Sumi-Harvest
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Locale codes to harvest, in order
    pub locales: Vec<String>,
    pub harvest: HarvestConfig,
    pub http: HttpConfig,
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            locales: ["en", "fr", "es", "de", "it", "pt", "ja", "zh"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            harvest: HarvestConfig::default(),
            http: HttpConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

/// Worker pool and retry behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HarvestConfig {
    /// Number of concurrent workers (kept low, the upstream throttles hard)
    pub concurrency: usize,

    /// Retries after the first attempt of a single URL
    pub retries: u32,

    /// Hard per-attempt timeout (milliseconds)
    pub timeout_ms: u64,

    /// Number of leading URLs to skip from each list
    pub start: usize,

    /// Maximum URLs to take from each list after `start` (0 = unbounded)
    pub limit: usize,

    /// Linear backoff unit: attempt `n` waits `backoff_base_ms * (n + 1)`
    pub backoff_base_ms: u64,

    /// Lower bound of the random pause before each request (milliseconds)
    pub jitter_min_ms: u64,

    /// Upper bound of the random pause before each request (milliseconds)
    pub jitter_max_ms: u64,

    /// Emit a progress report every this many processed items
    pub progress_interval: u64,

    /// Query parameter carrying the resource identifier
    pub identity_param: String,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            retries: 2,
            timeout_ms: 20_000,
            start: 0,
            limit: 0,
            backoff_base_ms: 300,
            jitter_min_ms: 50,
            jitter_max_ms: 200,
            progress_interval: 100,
            identity_param: "property".to_string(),
        }
    }
}

impl HarvestConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    /// Returns the `limit` as an option, `None` meaning unbounded
    pub fn limit(&self) -> Option<usize> {
        (self.limit > 0).then_some(self.limit)
    }
}

/// Fixed header set sent with every request
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HttpConfig {
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
    pub origin: Option<String>,
    pub referer: Option<String>,

    /// Additional headers; these override the built-in ones on name clashes
    pub headers: BTreeMap<String, String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            accept: "application/json, text/plain, */*".to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
            origin: None,
            referer: None,
            headers: BTreeMap::new(),
        }
    }
}

impl HttpConfig {
    /// Builds the full header list: browser-like defaults, cache busting,
    /// fetch-metadata headers, then user overrides
    pub fn header_pairs(&self) -> BTreeMap<String, String> {
        let mut pairs = BTreeMap::new();
        pairs.insert("user-agent".to_string(), self.user_agent.clone());
        pairs.insert("accept".to_string(), self.accept.clone());
        pairs.insert("accept-language".to_string(), self.accept_language.clone());
        pairs.insert("cache-control".to_string(), "no-cache".to_string());
        pairs.insert("pragma".to_string(), "no-cache".to_string());
        pairs.insert("sec-fetch-site".to_string(), "same-origin".to_string());
        pairs.insert("sec-fetch-mode".to_string(), "cors".to_string());
        pairs.insert("sec-fetch-dest".to_string(), "empty".to_string());
        if let Some(origin) = &self.origin {
            pairs.insert("origin".to_string(), origin.clone());
        }
        if let Some(referer) = &self.referer {
            pairs.insert("referer".to_string(), referer.clone());
        }
        for (name, value) in &self.headers {
            pairs.insert(name.to_ascii_lowercase(), value.clone());
        }
        pairs
    }
}

/// Output discipline for a destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OutputMode {
    /// One JSON record per line, appended as records are accepted
    #[default]
    Ndjson,
    /// A single JSON array, merged and rewritten once at the end of the run
    JsonArray,
}

impl OutputMode {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Ndjson => "ndjson",
            Self::JsonArray => "json",
        }
    }
}

/// Input and output locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory holding `<locale>.txt` URL lists
    pub urls_dir: PathBuf,

    /// Directory receiving `<locale>.ndjson` / `<locale>.json` dumps
    pub dumps_dir: PathBuf,

    pub mode: OutputMode,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            urls_dir: PathBuf::from("urls"),
            dumps_dir: PathBuf::from("dumps"),
            mode: OutputMode::Ndjson,
        }
    }
}

impl OutputConfig {
    pub fn url_list_path(&self, locale: &str) -> PathBuf {
        self.urls_dir.join(format!("{}.txt", locale))
    }

    pub fn dump_path(&self, locale: &str) -> PathBuf {
        self.dumps_dir
            .join(format!("{}.{}", locale, self.mode.extension()))
    }

    pub fn dumps_dir(&self) -> &Path {
        &self.dumps_dir
    }
}
