use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("unsupported scheme: {0}")]
    Scheme(String),
    #[error("blocked address: {0}")]
    BlockedAddress(String),
    #[error("disallowed by robots.txt: {0}")]
    RobotsDisallowed(String),
    #[error("fetch timed out after {timeout_ms}ms: {url}")]
    FetchTimeout { url: String, timeout_ms: u64 },
    #[error("body exceeds size limit of {limit} bytes")]
    SizeLimit {
        limit: u64,
        /// Set when the `Content-Length` pre-check rejected the response.
        declared: Option<u64>,
    },
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("parse failed: {0}")]
    Parse(String),
}

impl Error {
    /// Stable machine-readable code for envelopes and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidUrl(_) => "invalid_url",
            Error::Scheme(_) => "scheme",
            Error::BlockedAddress(_) => "blocked_address",
            Error::RobotsDisallowed(_) => "robots_disallowed",
            Error::FetchTimeout { .. } => "fetch_timeout",
            Error::SizeLimit { .. } => "size_limit",
            Error::HttpStatus { .. } => "http_status",
            Error::Fetch(_) => "fetch",
            Error::Parse(_) => "parse",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// An absolute http(s) URL that passed scheme validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTarget {
    url: url::Url,
}

impl UrlTarget {
    /// Parse and validate a caller-supplied URL.
    ///
    /// The scheme is checked before the host is looked at, so `file:///etc/passwd`
    /// fails with [`Error::Scheme`] rather than a missing-host error.
    pub fn parse(raw: &str) -> Result<Self> {
        let url = url::Url::parse(raw.trim()).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(Error::Scheme(other.to_string())),
        }
        if url.host_str().map(str::is_empty).unwrap_or(true) {
            return Err(Error::InvalidUrl(format!("missing host: {raw}")));
        }
        Ok(Self { url })
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// Hostname without brackets for IPv6 literals (`::1`, not `[::1]`).
    pub fn host(&self) -> String {
        match self.url.host() {
            Some(url::Host::Ipv6(ip)) => ip.to_string(),
            Some(h) => h.to_string(),
            None => String::new(),
        }
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn url(&self) -> &url::Url {
        &self.url
    }

    /// Normalized URL string used as the cache key (fragment dropped).
    pub fn cache_key(&self) -> String {
        let mut u = self.url.clone();
        u.set_fragment(None);
        u.to_string()
    }

    /// Same-origin robots.txt location. Keeps an explicit port.
    pub fn robots_url(&self) -> String {
        let mut u = self.url.clone();
        u.set_path("/robots.txt");
        u.set_query(None);
        u.set_fragment(None);
        u.to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Heading {
    /// Tag name, e.g. `"h2"`.
    pub level: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Link {
    pub href: String,
    pub text: String,
    pub rel: Option<String>,
    pub nofollow: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Passage {
    pub snippet: String,
    pub score: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageAnalysis {
    pub url: String,
    pub final_url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub published_at: Option<String>,
    pub author: Option<String>,
    pub word_count: usize,
    pub headings: Vec<Heading>,
    pub links: Vec<Link>,
    pub excerpt: String,
    pub main_text: String,
    pub relevant_passages: Vec<Passage>,
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl FetchedPage {
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}

#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, target: &UrlTarget) -> Result<FetchedPage>;
}

/// Robots policy lookup.
///
/// Returns a verdict, never an error: an unreachable or unreadable policy means
/// "allowed". Callers must not treat any internal failure as a denial.
#[async_trait::async_trait]
pub trait RobotsPolicy: Send + Sync {
    async fn is_allowed(&self, target: &UrlTarget, user_agent: &str) -> bool;
}

/// Shared store of finished analyses keyed by normalized URL.
///
/// Implementations must be safe for concurrent use and must not hold locks across
/// await points (the methods are sync for that reason).
pub trait AnalysisCache: Send + Sync {
    fn get(&self, key: &str) -> Option<PageAnalysis>;
    fn put(&self, key: &str, value: PageAnalysis);
}
