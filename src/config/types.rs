use serde::Deserialize;

/// Main configuration structure for Driftwatch
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetcher: FetcherConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub notify: Option<NotifyConfig>,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Finds a configured source by name
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }
}

/// HTTP fetch behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    /// Whole-request timeout in seconds
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Accept header sent with every request
    #[serde(default = "default_accept")]
    pub accept: String,

    /// Accept-Language header sent with every request
    #[serde(rename = "accept-language", default = "default_accept_language")]
    pub accept_language: String,

    /// Minimum time between two requests to the same host (milliseconds)
    #[serde(rename = "min-host-interval-ms", default)]
    pub min_host_interval_ms: u64,

    /// Maximum number of redirects followed per request
    #[serde(rename = "max-redirects", default = "default_max_redirects")]
    pub max_redirects: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            accept: default_accept(),
            accept_language: default_accept_language(),
            min_host_interval_ms: 0,
            max_redirects: default_max_redirects(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36"
        .to_string()
}

fn default_accept() -> String {
    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string()
}

fn default_accept_language() -> String {
    "en-US,en;q=0.9".to_string()
}

fn default_max_redirects() -> usize {
    10
}

/// Output locations
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory that receives per-version JSON snapshots
    #[serde(rename = "snapshots-dir")]
    pub snapshots_dir: String,

    /// Directory that receives CSV/JSON/Markdown exports
    #[serde(rename = "exports-dir")]
    pub exports_dir: String,
}

/// Cadence used by `--watch`
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(rename = "interval-minutes", default = "default_interval_minutes")]
    pub interval_minutes: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
        }
    }
}

fn default_interval_minutes() -> u64 {
    30
}

/// Optional notification target
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    #[serde(rename = "webhook-url")]
    pub webhook_url: Option<String>,
    pub recipient: Option<String>,
}

/// Kind of site a source points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Blog,
    News,
    Pricing,
    #[default]
    Other,
}

impl Category {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Blog => "blog",
            Self::News => "news",
            Self::Pricing => "pricing",
            Self::Other => "other",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "blog" => Some(Self::Blog),
            "news" => Some(Self::News),
            "pricing" => Some(Self::Pricing),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// A configured origin to scrape
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Unique name; the store keys sources by it
    pub name: String,

    /// Listing page URL
    pub url: String,

    #[serde(default)]
    pub category: Category,

    /// Container selector; its presence switches extraction to structured mode
    #[serde(rename = "list-selector")]
    pub list_selector: Option<String>,

    #[serde(rename = "title-selector")]
    pub title_selector: Option<String>,

    #[serde(rename = "link-selector")]
    pub link_selector: Option<String>,

    #[serde(rename = "content-selector")]
    pub content_selector: Option<String>,

    #[serde(rename = "price-selector")]
    pub price_selector: Option<String>,

    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Structural hints used by the extractor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selectors {
    pub list: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub content: Option<String>,
    pub price: Option<String>,
}

impl SourceConfig {
    /// An active source with no selectors, extracted heuristically
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            category: Category::default(),
            list_selector: None,
            title_selector: None,
            link_selector: None,
            content_selector: None,
            price_selector: None,
            active: true,
        }
    }

    /// Returns the configured selectors, treating blank strings as unset
    pub fn selectors(&self) -> Selectors {
        Selectors {
            list: non_blank(&self.list_selector),
            title: non_blank(&self.title_selector),
            link: non_blank(&self.link_selector),
            content: non_blank(&self.content_selector),
            price: non_blank(&self.price_selector),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_roundtrip() {
        for category in &[
            Category::Blog,
            Category::News,
            Category::Pricing,
            Category::Other,
        ] {
            assert_eq!(
                Category::from_db_string(category.to_db_string()),
                Some(*category)
            );
        }
        assert_eq!(Category::from_db_string("forum"), None);
    }

    #[test]
    fn test_blank_selectors_are_unset() {
        let source = SourceConfig {
            name: "s".to_string(),
            url: "https://example.com/".to_string(),
            category: Category::Other,
            list_selector: Some("   ".to_string()),
            title_selector: Some(" h2 ".to_string()),
            link_selector: None,
            content_selector: Some(String::new()),
            price_selector: None,
            active: true,
        };

        let selectors = source.selectors();
        assert_eq!(selectors.list, None);
        assert_eq!(selectors.title.as_deref(), Some("h2"));
        assert_eq!(selectors.content, None);
    }

    #[test]
    fn test_fetcher_defaults() {
        let fetcher = FetcherConfig::default();
        assert_eq!(fetcher.timeout_secs, 20);
        assert_eq!(fetcher.max_redirects, 10);
        assert_eq!(fetcher.min_host_interval_ms, 0);
        assert!(fetcher.user_agent.starts_with("Mozilla/5.0"));
    }
}
