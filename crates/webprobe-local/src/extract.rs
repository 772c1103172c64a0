use crate::dom::{Document, Element, Visit};
use crate::links::extract_links;
use crate::textprep::{norm_ws, truncate_chars};
use std::io::Cursor;
use webprobe_core::{Heading, Link, Result};

pub const MAX_HEADING_CHARS: usize = 300;
pub const MAX_EXCERPT_CHARS: usize = 1_000;

/// Candidate containers for the main-content pick.
const CONTAINER_TAGS: [&str; 4] = ["article", "main", "section", "div"];
/// Elements that become one paragraph each in the main text.
const BLOCK_TAGS: [&str; 14] = [
    "p",
    "li",
    "pre",
    "blockquote",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "td",
    "dd",
    "dt",
    "figcaption",
];
/// Page chrome that never belongs to the article body.
const CHROME_TAGS: [&str; 5] = ["nav", "header", "footer", "aside", "form"];
/// Bound on containers scored per page.
const MAX_CANDIDATES: usize = 20_000;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub published_at: Option<String>,
    pub author: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Extracted {
    pub metadata: PageMetadata,
    pub main_text: String,
    pub headings: Vec<Heading>,
    pub links: Vec<Link>,
}

impl Extracted {
    pub fn word_count(&self) -> usize {
        self.main_text.split_whitespace().count()
    }

    pub fn excerpt(&self) -> String {
        truncate_chars(&self.main_text, MAX_EXCERPT_CHARS).0
    }
}

/// Parse `html` and pull out metadata, readable text, headings and links.
///
/// `base_url` is the URL the document was served from (after redirects).
pub fn extract(html: &str, base_url: &str) -> Result<Extracted> {
    let doc = Document::parse(html)?;
    let metadata = extract_metadata(&doc)?;
    let main_text = match main_text(&doc) {
        Some(t) => t,
        None => body_text(&doc, html)?,
    };
    let headings = extract_headings(&doc)?;
    let links = extract_links(&doc, base_url)?;
    Ok(Extracted {
        metadata,
        main_text,
        headings,
        links,
    })
}

/// First candidate that yields something non-empty.
fn first_of(doc: &Document, candidates: &[&str]) -> Result<Option<String>> {
    for key in candidates {
        if let Some(v) = doc.meta(key)? {
            return Ok(Some(v));
        }
    }
    Ok(None)
}

pub fn extract_metadata(doc: &Document) -> Result<PageMetadata> {
    let title = match doc.meta("og:title")? {
        Some(t) => Some(t),
        None => doc
            .first("title")?
            .map(|t| t.text())
            .filter(|t| !t.is_empty()),
    };
    Ok(PageMetadata {
        title,
        description: first_of(doc, &["description", "og:description"])?,
        published_at: first_of(doc, &["article:published_time"])?,
        author: first_of(doc, &["author", "article:author"])?,
    })
}

pub fn extract_headings(doc: &Document) -> Result<Vec<Heading>> {
    Ok(doc
        .select("h1, h2, h3, h4")?
        .into_iter()
        .map(|h| Heading {
            level: h.tag().to_string(),
            text: h.text_prefix(MAX_HEADING_CHARS),
        })
        .collect())
}

fn has_any_text(s: &str) -> bool {
    s.chars().any(|c| !c.is_whitespace())
}

fn is_generic_boilerplate_container(el: &Element) -> bool {
    // Structural UI words only; no per-site rules.
    let s = el.class_or_id_lc();
    if s.is_empty() {
        return false;
    }
    [
        "nav",
        "navbar",
        "menu",
        "sidebar",
        "footer",
        "header",
        "banner",
        "cookie",
        "consent",
        "ads",
        "advert",
        "promo",
        "subscribe",
        "newsletter",
    ]
    .iter()
    .any(|bad| s.contains(bad))
}

/// Highest-scoring content container: dense non-link text, with bonuses for
/// `<article>`/`<main>` and a penalty for link-heavy blocks.
fn pick_main_container(doc: &Document) -> Option<Element<'_>> {
    let mut best_score: i64 = 0;
    let mut best: Option<Element<'_>> = None;

    let candidates = doc
        .text_stats()
        .into_iter()
        .filter(|s| CONTAINER_TAGS.contains(&s.element.tag()))
        .take(MAX_CANDIDATES);
    for stats in candidates {
        let el = stats.element;
        if is_generic_boilerplate_container(&el) {
            continue;
        }
        let txt = stats.text_chars;
        // Low enough for small single-article pages.
        if txt < 20 {
            continue;
        }
        let link_txt = stats.link_chars;
        let mut score = txt as i64 - 2 * (link_txt as i64);
        match el.tag() {
            "article" => score += 500,
            "main" => score += 300,
            _ => {}
        }
        if link_txt > txt / 2 {
            score -= 500;
        }
        if score > best_score {
            best_score = score;
            best = Some(el);
        }
    }
    best
}

/// Paragraph-per-block text under `root`, joined by blank lines.
///
/// Nested blocks are folded into their outermost block; chrome below `root` is skipped.
fn block_text(root: &Element) -> String {
    let mut paras: Vec<String> = Vec::new();
    root.descend(|el| {
        if BLOCK_TAGS.contains(&el.tag()) {
            let t = el.text();
            if !t.is_empty() {
                paras.push(t);
            }
            return Visit::Skip;
        }
        if CHROME_TAGS.contains(&el.tag()) || is_generic_boilerplate_container(&el) {
            return Visit::Skip;
        }
        Visit::Descend
    });
    paras.join("\n\n")
}

/// Readability-style main text. `None` when no container qualifies.
fn main_text(doc: &Document) -> Option<String> {
    let container = pick_main_container(doc)?;
    let mut text = block_text(&container);
    if !has_any_text(&text) {
        text = container.text();
    }
    has_any_text(&text).then_some(text)
}

/// Whole-body fallback: blocks first, then a plain rendering of the page.
fn body_text(doc: &Document, html: &str) -> Result<String> {
    let Some(body) = doc.body()? else {
        return Ok(String::new());
    };
    let blocks = block_text(&body);
    if has_any_text(&blocks) {
        return Ok(blocks);
    }
    let rendered = html2text::from_read(Cursor::new(html.as_bytes()), 10_000)
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| body.text());
    if has_any_text(&rendered) {
        Ok(rendered)
    } else {
        Ok(norm_ws(&body.text()))
    }
}
