//! Narrow document/element view over the HTML parser.
//!
//! Extraction code only goes through these types, so the parser is touched in one place.

use html_scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use webprobe_core::{Error, Result};

/// Elements whose text is never shown to a reader.
const HIDDEN_TAGS: [&str; 5] = ["script", "style", "noscript", "template", "svg"];

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Parse(format!("selector {css:?}: {e}")))
}

pub struct Document {
    html: Html,
}

impl Document {
    /// Parse a full HTML document. Empty input has no usable document.
    pub fn parse(html: &str) -> Result<Self> {
        if html.trim().is_empty() {
            return Err(Error::Parse("empty document".to_string()));
        }
        Ok(Self {
            html: Html::parse_document(html),
        })
    }

    /// All matches in document order.
    pub fn select(&self, css: &str) -> Result<Vec<Element<'_>>> {
        let sel = selector(css)?;
        Ok(self.html.select(&sel).map(Element).collect())
    }

    pub fn first(&self, css: &str) -> Result<Option<Element<'_>>> {
        let sel = selector(css)?;
        Ok(self.html.select(&sel).next().map(Element))
    }

    /// First non-empty `content` of a `<meta>` whose `property` or `name` equals `key`
    /// (case-insensitive).
    pub fn meta(&self, key: &str) -> Result<Option<String>> {
        for m in self.select("meta[content]")? {
            let names = [m.attr("property"), m.attr("name")];
            if !names
                .iter()
                .flatten()
                .any(|n| n.trim().eq_ignore_ascii_case(key))
            {
                continue;
            }
            let v = m.attr("content").unwrap_or("").trim();
            if !v.is_empty() {
                return Ok(Some(v.to_string()));
            }
        }
        Ok(None)
    }

    pub fn body(&self) -> Result<Option<Element<'_>>> {
        self.first("body")
    }

    /// Visible and in-link character counts for every element, in document order.
    ///
    /// One pre-order pass marks hidden subtrees, then a reverse pass sums children into
    /// parents, so the whole table costs O(nodes) regardless of nesting depth.
    pub fn text_stats(&self) -> Vec<TextStats<'_>> {
        let mut order = Vec::new();
        let mut stack = vec![(*self.html.root_element(), false)];
        while let Some((node, hidden_above)) = stack.pop() {
            let hidden = hidden_above
                || node
                    .value()
                    .as_element()
                    .is_some_and(|e| HIDDEN_TAGS.contains(&e.name()));
            order.push((node, hidden));
            for child in node.children().rev() {
                stack.push((child, hidden));
            }
        }

        let mut sums = HashMap::with_capacity(order.len());
        let mut out = Vec::new();
        for &(node, hidden) in order.iter().rev() {
            let counts = if hidden {
                (0, 0)
            } else if let Some(t) = node.value().as_text() {
                (t.chars().count(), 0)
            } else {
                let (mut text_chars, mut link_chars) = (0usize, 0usize);
                for child in node.children() {
                    if let Some(&(t, l)) = sums.get(&child.id()) {
                        text_chars += t;
                        link_chars += l;
                    }
                }
                if node.value().as_element().is_some_and(|e| e.name() == "a") {
                    link_chars = text_chars;
                }
                (text_chars, link_chars)
            };
            sums.insert(node.id(), counts);
            if let Some(el) = ElementRef::wrap(node) {
                out.push(TextStats {
                    element: Element(el),
                    text_chars: counts.0,
                    link_chars: counts.1,
                });
            }
        }
        out.reverse();
        out
    }
}

#[derive(Clone, Copy)]
pub struct TextStats<'a> {
    pub element: Element<'a>,
    /// Visible characters below the element.
    pub text_chars: usize,
    /// Visible characters inside `<a>` elements below (or at) the element.
    pub link_chars: usize,
}

/// What [`Element::descend`] does after visiting an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Descend,
    Skip,
}

#[derive(Clone, Copy)]
pub struct Element<'a>(ElementRef<'a>);

impl<'a> Element<'a> {
    pub fn tag(&self) -> &'a str {
        self.0.value().name()
    }

    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.0.value().attr(name)
    }

    /// Feed visible text nodes to `f` in document order until it returns `false`.
    ///
    /// Script/style-like subtrees are pruned on entry, so each node is visited once.
    fn each_visible_text(&self, mut f: impl FnMut(&'a str) -> bool) {
        let mut stack = vec![*self.0];
        while let Some(node) = stack.pop() {
            if let Some(t) = node.value().as_text() {
                if !f(&**t) {
                    return;
                }
                continue;
            }
            if node
                .value()
                .as_element()
                .is_some_and(|e| HIDDEN_TAGS.contains(&e.name()))
            {
                continue;
            }
            stack.extend(node.children().rev());
        }
    }

    /// Text nodes at or below this element, skipping script/style-like subtrees.
    pub fn visible_text_parts(&self) -> Vec<&'a str> {
        let mut out = Vec::new();
        self.each_visible_text(|t| {
            out.push(t);
            true
        });
        out
    }

    /// Visible text with whitespace collapsed to single spaces.
    pub fn text(&self) -> String {
        crate::textprep::norm_ws(&self.visible_text_parts().join(" "))
    }

    /// Same as `text()` cut to `max_chars`, but stops reading once enough text is seen.
    pub fn text_prefix(&self, max_chars: usize) -> String {
        let mut parts = Vec::new();
        // Length of the collapsed text so far, plus one.
        let mut seen = 0usize;
        self.each_visible_text(|t| {
            parts.push(t);
            seen += t
                .split_whitespace()
                .map(|w| w.chars().count() + 1)
                .sum::<usize>();
            seen <= max_chars
        });
        let text = crate::textprep::norm_ws(&parts.join(" "));
        crate::textprep::truncate_chars(&text, max_chars).0
    }

    /// Visit element descendants in document order; `Visit::Skip` prunes that subtree.
    pub fn descend(&self, mut f: impl FnMut(Element<'a>) -> Visit) {
        let mut stack: Vec<_> = self.0.children().rev().collect();
        while let Some(node) = stack.pop() {
            let Some(el) = ElementRef::wrap(node) else {
                continue;
            };
            if f(Element(el)) == Visit::Descend {
                stack.extend(node.children().rev());
            }
        }
    }

    /// Lower-cased `class` and `id` joined, for structural heuristics.
    pub fn class_or_id_lc(&self) -> String {
        let mut out = String::new();
        if let Some(c) = self.attr("class") {
            out.push_str(c);
            out.push(' ');
        }
        if let Some(i) = self.attr("id") {
            out.push_str(i);
        }
        out.to_ascii_lowercase()
    }
}
