//! `fetch_and_analyze`: guard → cache → robots → fetch → extract → rank → cache.

use crate::cache::MemoryCache;
use crate::config::AnalyzerConfig;
use crate::robots::HttpRobotsResolver;
use crate::{build_client, extract, guard, rank, LocalFetcher};
use std::sync::Arc;
use webprobe_core::{
    AnalysisCache, Error, PageAnalysis, PageFetcher, Passage, Result, RobotsPolicy, UrlTarget,
};

pub struct Analyzer {
    cfg: AnalyzerConfig,
    fetcher: Arc<dyn PageFetcher>,
    robots: Arc<dyn RobotsPolicy>,
    cache: Arc<dyn AnalysisCache>,
}

impl Analyzer {
    /// reqwest fetcher + HTTP robots resolver + in-memory cache, all from `cfg`.
    pub fn new(cfg: AnalyzerConfig) -> Result<Self> {
        let client = build_client(&cfg)?;
        let fetcher = LocalFetcher::new(client.clone(), cfg.fetch_timeout, cfg.max_bytes);
        let robots = HttpRobotsResolver::new(client, cfg.robots_timeout);
        let cache = MemoryCache::new(cfg.cache_ttl);
        Ok(Self::with_parts(
            cfg,
            Arc::new(fetcher),
            Arc::new(robots),
            Arc::new(cache),
        ))
    }

    pub fn with_parts(
        cfg: AnalyzerConfig,
        fetcher: Arc<dyn PageFetcher>,
        robots: Arc<dyn RobotsPolicy>,
        cache: Arc<dyn AnalysisCache>,
    ) -> Self {
        Self {
            cfg,
            fetcher,
            robots,
            cache,
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.cfg
    }

    fn passages(&self, main_text: &str, question: Option<&str>) -> Vec<Passage> {
        match question {
            Some(q) => rank::rank(main_text, q, self.cfg.max_passages),
            None => Vec::new(),
        }
    }

    /// Fetch `url` and analyze it, optionally ranking passages against `question`.
    ///
    /// Fails before any I/O on a bad scheme or a forbidden host. With `use_cache`, a fresh
    /// cached analysis is returned without touching the network (passages are re-ranked
    /// for `question`), and a newly computed one is stored.
    pub async fn fetch_and_analyze(
        &self,
        url: &str,
        question: Option<&str>,
        use_cache: bool,
    ) -> Result<PageAnalysis> {
        let target = UrlTarget::parse(url)?;
        if !self.cfg.allow_private_hosts {
            guard::check_target(&target)?;
        }

        let key = target.cache_key();
        if use_cache {
            if let Some(mut hit) = self.cache.get(&key) {
                tracing::debug!(key = %key, "analysis cache hit");
                hit.relevant_passages = self.passages(&hit.main_text, question);
                return Ok(hit);
            }
            tracing::debug!(key = %key, "analysis cache miss");
        }

        if !self.robots.is_allowed(&target, &self.cfg.robots_agent).await {
            return Err(Error::RobotsDisallowed(target.url().to_string()));
        }

        let page = self.fetcher.fetch(&target).await?;

        let requested = target.url().to_string();
        let question = question.map(str::to_string);
        let max_passages = self.cfg.max_passages;
        let analysis = tokio::task::spawn_blocking(move || {
            let ex = extract::extract(&page.text_lossy(), &page.final_url)?;
            let relevant_passages = match question.as_deref() {
                Some(q) => rank::rank(&ex.main_text, q, max_passages),
                None => Vec::new(),
            };
            Ok::<_, Error>(PageAnalysis {
                url: requested,
                final_url: page.final_url,
                word_count: ex.word_count(),
                excerpt: ex.excerpt(),
                title: ex.metadata.title,
                description: ex.metadata.description,
                published_at: ex.metadata.published_at,
                author: ex.metadata.author,
                headings: ex.headings,
                links: ex.links,
                main_text: ex.main_text,
                relevant_passages,
            })
        })
        .await
        .map_err(|e| Error::Parse(format!("extraction task failed: {e}")))??;

        if use_cache {
            self.cache.put(&key, analysis.clone());
            tracing::debug!(key = %key, "analysis cached");
        }
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::header, routing::get, Router};
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    const ARTICLE: &str = r#"<!doctype html>
<html><head>
  <title>Caching notes</title>
  <meta name="description" content="Notes on caches">
  <meta name="author" content="A. Writer">
</head><body>
  <nav class="menu"><a href="/">Home</a></nav>
  <article>
    <h1>Why cache</h1>
    <p>A cache keeps recently computed results so repeat caching lookups stay fast and cheap.</p>
    <p>Routers forward packets between networks and have nothing to do with this topic at all.</p>
    <p>Short one.</p>
    <a href="/next" rel="next">Next</a>
  </article>
</body></html>"#;

    /// Fixture serving `ARTICLE` at `/page` and counting page hits.
    async fn article_server(robots: &'static str) -> (SocketAddr, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let app = Router::new()
            .route("/robots.txt", get(move || async move { robots }))
            .route(
                "/page",
                get(move || {
                    let h = Arc::clone(&h);
                    async move {
                        h.fetch_add(1, Ordering::SeqCst);
                        ([(header::CONTENT_TYPE, "text/html")], ARTICLE)
                    }
                }),
            );
        (serve(app).await, hits)
    }

    fn local_cfg() -> AnalyzerConfig {
        AnalyzerConfig {
            allow_private_hosts: true,
            ..AnalyzerConfig::default()
        }
    }

    #[tokio::test]
    async fn analyzes_page_end_to_end() {
        let (addr, _hits) = article_server("User-agent: *\nDisallow: /private\n").await;
        let analyzer = Analyzer::new(local_cfg()).unwrap();
        let url = format!("http://{addr}/page");

        let a = analyzer
            .fetch_and_analyze(&url, Some("caching"), true)
            .await
            .unwrap();
        assert_eq!(a.url, url);
        assert_eq!(a.final_url, url);
        assert_eq!(a.title.as_deref(), Some("Caching notes"));
        assert_eq!(a.description.as_deref(), Some("Notes on caches"));
        assert_eq!(a.author.as_deref(), Some("A. Writer"));
        assert_eq!(a.published_at, None);
        assert_eq!(a.headings.len(), 1);
        assert_eq!(a.headings[0].level, "h1");
        assert!(!a.main_text.contains("Home"));
        assert_eq!(a.word_count, a.main_text.split_whitespace().count());
        assert_eq!(a.excerpt, a.main_text);

        let next = a.links.iter().find(|l| l.text == "Next").unwrap();
        assert_eq!(next.href, format!("http://{addr}/next"));
        assert_eq!(next.rel.as_deref(), Some("next"));

        assert_eq!(a.relevant_passages.len(), 1);
        assert!(a.relevant_passages[0].snippet.starts_with("A cache keeps"));
        assert_eq!(a.relevant_passages[0].score, 1);
    }

    #[tokio::test]
    async fn no_question_means_no_passages() {
        let (addr, _hits) = article_server("").await;
        let analyzer = Analyzer::new(local_cfg()).unwrap();
        let a = analyzer
            .fetch_and_analyze(&format!("http://{addr}/page"), None, false)
            .await
            .unwrap();
        assert!(a.relevant_passages.is_empty());
        assert!(a.word_count > 0);
    }

    #[tokio::test]
    async fn second_call_within_ttl_is_served_from_cache() {
        let (addr, hits) = article_server("").await;
        let analyzer = Analyzer::new(local_cfg()).unwrap();
        let url = format!("http://{addr}/page");

        let a1 = analyzer.fetch_and_analyze(&url, Some("cache"), true).await.unwrap();
        let a2 = analyzer.fetch_and_analyze(&url, Some("cache"), true).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(
            serde_json::to_vec(&a1).unwrap(),
            serde_json::to_vec(&a2).unwrap()
        );

        // Same page, different question: still no fetch, passages follow the question.
        let a3 = analyzer.fetch_and_analyze(&url, Some("routers"), true).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(a3.relevant_passages[0].snippet.starts_with("Routers"));
    }

    #[tokio::test]
    async fn expired_entry_triggers_a_fresh_fetch() {
        let (addr, hits) = article_server("").await;
        let cfg = AnalyzerConfig {
            cache_ttl: Duration::from_millis(50),
            ..local_cfg()
        };
        let analyzer = Analyzer::new(cfg).unwrap();
        let url = format!("http://{addr}/page");

        analyzer.fetch_and_analyze(&url, None, true).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        analyzer.fetch_and_analyze(&url, None, true).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cache_disabled_always_fetches() {
        let (addr, hits) = article_server("").await;
        let analyzer = Analyzer::new(local_cfg()).unwrap();
        let url = format!("http://{addr}/page");

        analyzer.fetch_and_analyze(&url, None, false).await.unwrap();
        analyzer.fetch_and_analyze(&url, None, false).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn robots_disallow_stops_before_page_fetch() {
        let (addr, hits) = article_server("User-agent: webprobe\nDisallow: /page\n").await;
        let analyzer = Analyzer::new(local_cfg()).unwrap();

        let err = analyzer
            .fetch_and_analyze(&format!("http://{addr}/page"), None, true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RobotsDisallowed(_)), "{err}");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn private_host_is_blocked_with_default_config() {
        let (addr, hits) = article_server("").await;
        let analyzer = Analyzer::new(AnalyzerConfig::default()).unwrap();

        let err = analyzer
            .fetch_and_analyze(&format!("http://{addr}/page"), None, true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BlockedAddress(ref h) if h == "127.0.0.1"), "{err}");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    /// Counts calls so tests can prove the pipeline stopped early.
    struct CountingFetcher {
        calls: AtomicUsize,
        body: &'static str,
    }

    #[async_trait::async_trait]
    impl PageFetcher for CountingFetcher {
        async fn fetch(&self, target: &UrlTarget) -> Result<webprobe_core::FetchedPage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(webprobe_core::FetchedPage {
                url: target.url().to_string(),
                final_url: target.url().to_string(),
                status: 200,
                content_type: Some("text/html".to_string()),
                headers: Default::default(),
                body: self.body.as_bytes().to_vec(),
            })
        }
    }

    struct CountingRobots {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl RobotsPolicy for CountingRobots {
        async fn is_allowed(&self, _target: &UrlTarget, _user_agent: &str) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    fn stubbed(body: &'static str) -> (Analyzer, Arc<CountingFetcher>, Arc<CountingRobots>) {
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
            body,
        });
        let robots = Arc::new(CountingRobots {
            calls: AtomicUsize::new(0),
        });
        let analyzer = Analyzer::with_parts(
            AnalyzerConfig::default(),
            fetcher.clone(),
            robots.clone(),
            Arc::new(MemoryCache::new(Duration::from_secs(60))),
        );
        (analyzer, fetcher, robots)
    }

    #[tokio::test]
    async fn scheme_and_guard_failures_do_no_io() {
        let (analyzer, fetcher, robots) = stubbed(ARTICLE);
        for (url, code) in [
            ("ftp://example.com/file", "scheme"),
            ("http://localhost/", "blocked_address"),
            ("http://10.1.2.3/", "blocked_address"),
            ("http://printer.local/status", "blocked_address"),
            ("not a url", "invalid_url"),
        ] {
            let err = analyzer.fetch_and_analyze(url, None, true).await.unwrap_err();
            assert_eq!(err.code(), code, "{url}: {err}");
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(robots.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cache_hit_skips_robots_and_fetch() {
        let (analyzer, fetcher, robots) = stubbed(ARTICLE);
        let url = "https://example.com/article#section";
        analyzer.fetch_and_analyze(url, None, true).await.unwrap();
        // Fragment is not part of the cache key.
        analyzer
            .fetch_and_analyze("https://EXAMPLE.com/article", None, true)
            .await
            .unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(robots.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_document_surfaces_parse_error() {
        let (analyzer, _fetcher, _robots) = stubbed("   ");
        let err = analyzer
            .fetch_and_analyze("https://example.com/blank", None, true)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "parse");
    }
}
