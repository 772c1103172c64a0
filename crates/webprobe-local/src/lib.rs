use futures_util::StreamExt;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::time::{Duration, Instant};
use webprobe_core::{Error, FetchedPage, PageFetcher, Result, UrlTarget};

pub mod analyze;
pub mod cache;
pub mod config;
pub mod dom;
pub mod extract;
pub mod guard;
pub mod links;
pub mod rank;
pub mod robots;
pub mod textprep;

pub use analyze::Analyzer;
pub use cache::MemoryCache;
pub use config::AnalyzerConfig;
pub use robots::{HttpRobotsResolver, RobotsRuleSet};

/// Redirect hop refused by the address guard. Recovered from reqwest's error chain.
#[derive(Debug, thiserror::Error)]
#[error("redirect into blocked address {0}")]
struct BlockedRedirect(String);

#[derive(Debug, thiserror::Error)]
#[error("more than {0} redirects")]
struct TooManyRedirects(usize);

/// Shared HTTP client for page and robots fetches.
///
/// Every redirect hop goes through the address guard unless private hosts are allowed.
pub fn build_client(cfg: &AnalyzerConfig) -> Result<reqwest::Client> {
    let allow_private = cfg.allow_private_hosts;
    let max_redirects = cfg.max_redirects;
    let policy = reqwest::redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() > max_redirects {
            return attempt.error(TooManyRedirects(max_redirects));
        }
        if !allow_private {
            if let Some(host) = guard::forbidden_host(attempt.url()) {
                return attempt.error(BlockedRedirect(host));
            }
        }
        attempt.follow()
    });
    reqwest::Client::builder()
        .user_agent(cfg.user_agent.clone())
        .redirect(policy)
        .connect_timeout(cfg.fetch_timeout)
        .build()
        .map_err(|e| Error::Fetch(e.to_string()))
}

fn map_send_error(e: reqwest::Error, url: &str, timeout: Duration) -> Error {
    let mut src: Option<&(dyn StdError + 'static)> = e.source();
    while let Some(s) = src {
        if let Some(b) = s.downcast_ref::<BlockedRedirect>() {
            tracing::warn!(url = %url, host = %b.0, "blocked redirect to private address");
            return Error::BlockedAddress(b.0.clone());
        }
        src = s.source();
    }
    if e.is_timeout() {
        return Error::FetchTimeout {
            url: url.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        };
    }
    Error::Fetch(e.to_string())
}

fn declared_length(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
}

/// Bounded page retrieval over reqwest.
#[derive(Debug, Clone)]
pub struct LocalFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: u64,
}

impl LocalFetcher {
    pub fn new(client: reqwest::Client, timeout: Duration, max_bytes: u64) -> Self {
        Self {
            client,
            timeout,
            max_bytes,
        }
    }

    pub fn from_config(cfg: &AnalyzerConfig) -> Result<Self> {
        Ok(Self::new(build_client(cfg)?, cfg.fetch_timeout, cfg.max_bytes))
    }

    async fn fetch_bounded(&self, target: &UrlTarget) -> Result<FetchedPage> {
        let url = target.url().to_string();
        let t0 = Instant::now();
        let resp = self
            .client
            .get(target.url().clone())
            .header(reqwest::header::ACCEPT, "text/html")
            .send()
            .await
            .map_err(|e| map_send_error(e, &url, self.timeout))?;

        let final_url = resp.url().to_string();
        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            return Err(Error::HttpStatus {
                status,
                url: final_url,
            });
        }
        if let Some(declared) = declared_length(resp.headers()) {
            if declared > self.max_bytes {
                return Err(Error::SizeLimit {
                    limit: self.max_bytes,
                    declared: Some(declared),
                });
            }
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let mut headers = BTreeMap::new();
        for (k, v) in resp.headers().iter() {
            if let Ok(s) = v.to_str() {
                headers.insert(k.as_str().to_string(), s.to_string());
            }
        }

        let max_bytes = self.max_bytes as usize;
        let mut body = Vec::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| map_send_error(e, &url, self.timeout))?;
            if body.len().saturating_add(chunk.len()) > max_bytes {
                return Err(Error::SizeLimit {
                    limit: self.max_bytes,
                    declared: None,
                });
            }
            body.extend_from_slice(&chunk);
        }

        if !content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().contains("html"))
            .unwrap_or(true)
        {
            tracing::debug!(url = %final_url, content_type = ?content_type, "non-html content type; parsing anyway");
        }
        tracing::debug!(
            url = %url,
            final_url = %final_url,
            status,
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "page fetched"
        );

        Ok(FetchedPage {
            url,
            final_url,
            status,
            content_type,
            headers,
            body,
        })
    }
}

#[async_trait::async_trait]
impl PageFetcher for LocalFetcher {
    /// Dropping the in-flight future on timeout tears down the connection.
    async fn fetch(&self, target: &UrlTarget) -> Result<FetchedPage> {
        match tokio::time::timeout(self.timeout, self.fetch_bounded(target)).await {
            Ok(r) => r,
            Err(_) => Err(Error::FetchTimeout {
                url: target.url().to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}
