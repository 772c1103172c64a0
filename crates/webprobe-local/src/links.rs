use crate::dom::Document;
use webprobe_core::{Link, Result};

/// At most this many anchors are reported, in document order.
pub const MAX_LINKS: usize = 500;
pub const MAX_LINK_TEXT_CHARS: usize = 200;

/// Effective base for relative links: `<base href>` (resolved against the page URL) if
/// present, else the page URL itself.
fn effective_base(doc: &Document, page_url: &str) -> Result<Option<url::Url>> {
    let page = url::Url::parse(page_url).ok();
    let declared = doc
        .first("base[href]")?
        .and_then(|b| b.attr("href"))
        .map(str::trim)
        .filter(|h| !h.is_empty());
    let Some(href) = declared else {
        return Ok(page);
    };
    let resolved = match &page {
        Some(p) => p.join(href).ok(),
        None => url::Url::parse(href).ok(),
    };
    Ok(resolved.or(page))
}

/// Collect anchors with an `href`.
///
/// - Relative hrefs are resolved against the effective base; unresolvable ones are kept as-is.
/// - Anchor text is whitespace-collapsed and bounded.
/// - `rel` is lower-cased; `nofollow` is set when it carries that token.
pub fn extract_links(doc: &Document, page_url: &str) -> Result<Vec<Link>> {
    let base = effective_base(doc, page_url)?;
    let mut out = Vec::new();
    for a in doc.select("a[href]")? {
        if out.len() >= MAX_LINKS {
            break;
        }
        let raw = a.attr("href").unwrap_or("").trim();
        let href = match &base {
            Some(b) => b.join(raw).map(|u| u.to_string()).unwrap_or_else(|_| raw.to_string()),
            None => url::Url::parse(raw)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| raw.to_string()),
        };
        let text = a.text_prefix(MAX_LINK_TEXT_CHARS);
        let rel = a
            .attr("rel")
            .map(|r| r.trim().to_ascii_lowercase())
            .filter(|r| !r.is_empty());
        let nofollow = rel
            .as_deref()
            .map(|r| r.split_whitespace().any(|t| t == "nofollow"))
            .unwrap_or(false);
        out.push(Link {
            href,
            text,
            rel,
            nofollow,
        });
    }
    Ok(out)
}
