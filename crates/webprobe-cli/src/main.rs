use anyhow::Result;
use clap::{Parser, Subcommand};
use std::time::{Duration, Instant};
use webprobe_core::PageAnalysis;
use webprobe_local::{Analyzer, AnalyzerConfig};

mod envelope;
mod logging;

use envelope::AnalyzeEnvelope;

#[derive(Parser, Debug)]
#[command(name = "webprobe")]
#[command(about = "Safe fetch + extract + passage ranking for a single URL", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch one URL and print its analysis (json envelope by default).
    Analyze(AnalyzeCmd),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(clap::Args, Debug)]
struct AnalyzeCmd {
    /// Absolute http(s) URL to analyze.
    url: String,
    /// Optional question; passages are ranked against it.
    #[arg(long)]
    question: Option<String>,
    /// Skip the in-process analysis cache.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    no_cache: bool,
    /// Maximum passages to return.
    #[arg(long)]
    max_passages: Option<usize>,
    /// Page fetch timeout (ms). Overrides WEBPROBE_FETCH_TIMEOUT_MS.
    #[arg(long)]
    fetch_timeout_ms: Option<u64>,
    /// Page body cap (bytes). Overrides WEBPROBE_MAX_BYTES.
    #[arg(long)]
    max_bytes: Option<u64>,
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

impl AnalyzeCmd {
    fn config(&self) -> AnalyzerConfig {
        let mut cfg = AnalyzerConfig::from_env();
        if let Some(n) = self.max_passages {
            cfg.max_passages = n;
        }
        if let Some(ms) = self.fetch_timeout_ms {
            cfg.fetch_timeout = Duration::from_millis(ms);
        }
        if let Some(n) = self.max_bytes {
            cfg.max_bytes = n;
        }
        cfg
    }
}

fn print_text(a: &PageAnalysis) {
    println!("{}", a.title.as_deref().unwrap_or("(untitled)"));
    println!("{}", a.final_url);
    if let Some(d) = &a.description {
        println!("{d}");
    }
    println!(
        "words={} headings={} links={}",
        a.word_count,
        a.headings.len(),
        a.links.len()
    );
    for p in &a.relevant_passages {
        println!();
        println!("[score {}] {}", p.score, p.snippet);
    }
    if a.relevant_passages.is_empty() && !a.excerpt.is_empty() {
        println!();
        println!("{}", a.excerpt);
    }
}

async fn run_analyze(args: AnalyzeCmd) -> Result<bool> {
    let cfg = args.config();
    tracing::debug!(url = %args.url, no_cache = args.no_cache, max_passages = cfg.max_passages, "analyze");
    let analyzer = Analyzer::new(cfg)?;
    let t0 = Instant::now();
    let r = analyzer
        .fetch_and_analyze(&args.url, args.question.as_deref(), !args.no_cache)
        .await;
    let env = AnalyzeEnvelope::from_result(r, t0.elapsed().as_millis() as u64);
    let ok = env.ok;

    match (args.output.to_ascii_lowercase().as_str(), &env.analysis, &env.error) {
        ("text", Some(a), _) => print_text(a),
        ("text", None, Some(e)) => {
            eprintln!("error[{}]: {}", e.code, e.message);
            if let Some(h) = e.hint {
                eprintln!("hint: {h}");
            }
        }
        _ => println!("{}", serde_json::to_string(&env)?),
    }
    Ok(ok)
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze(args) => {
            if !run_analyze(args).await? {
                std::process::exit(1);
            }
        }
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": envelope::SCHEMA_VERSION,
                "kind": "version",
                "ok": true,
                "name": "webprobe",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("webprobe {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{}", v),
            }
        }
    }
    Ok(())
}
