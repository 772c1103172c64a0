use std::time::Duration;

/// Upper bound on page bodies (and on the declared `Content-Length`).
pub const DEFAULT_MAX_BYTES: u64 = 5 * 1024 * 1024;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_ROBOTS_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_millis(600_000);
pub const DEFAULT_MAX_PASSAGES: usize = 10;
pub const DEFAULT_MAX_REDIRECTS: usize = 10;
pub const DEFAULT_ROBOTS_AGENT: &str = "webprobe";

pub fn default_user_agent() -> String {
    format!("webprobe/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub fetch_timeout: Duration,
    pub robots_timeout: Duration,
    pub max_bytes: u64,
    pub cache_ttl: Duration,
    pub max_passages: usize,
    pub max_redirects: usize,
    /// Full `User-Agent` header value.
    pub user_agent: String,
    /// Product token matched against robots.txt `User-agent` lines.
    pub robots_agent: String,
    /// Disables the address guard (including redirect hops). Local fixtures only.
    pub allow_private_hosts: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            robots_timeout: DEFAULT_ROBOTS_TIMEOUT,
            max_bytes: DEFAULT_MAX_BYTES,
            cache_ttl: DEFAULT_CACHE_TTL,
            max_passages: DEFAULT_MAX_PASSAGES,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: default_user_agent(),
            robots_agent: DEFAULT_ROBOTS_AGENT.to_string(),
            allow_private_hosts: false,
        }
    }
}

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_u64(key: &str) -> Option<u64> {
    env(key).and_then(|s| s.parse::<u64>().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    let v = env(key)?.to_ascii_lowercase();
    match v.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl AnalyzerConfig {
    /// Defaults with `WEBPROBE_*` overrides applied. Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(ms) = env_u64("WEBPROBE_FETCH_TIMEOUT_MS") {
            cfg.fetch_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_u64("WEBPROBE_ROBOTS_TIMEOUT_MS") {
            cfg.robots_timeout = Duration::from_millis(ms);
        }
        if let Some(n) = env_u64("WEBPROBE_MAX_BYTES") {
            cfg.max_bytes = n;
        }
        if let Some(ms) = env_u64("WEBPROBE_CACHE_TTL_MS") {
            cfg.cache_ttl = Duration::from_millis(ms);
        }
        if let Some(n) = env_u64("WEBPROBE_MAX_PASSAGES") {
            cfg.max_passages = n as usize;
        }
        if let Some(n) = env_u64("WEBPROBE_MAX_REDIRECTS") {
            cfg.max_redirects = n as usize;
        }
        if let Some(ua) = env("WEBPROBE_USER_AGENT") {
            cfg.user_agent = ua;
        }
        if let Some(agent) = env("WEBPROBE_ROBOTS_AGENT") {
            cfg.robots_agent = agent;
        }
        if let Some(b) = env_bool("WEBPROBE_ALLOW_PRIVATE_HOSTS") {
            cfg.allow_private_hosts = b;
        }
        cfg
    }
}
