//! robots.txt parsing and policy lookup.
//!
//! Only `User-agent`, `Allow` and `Disallow` are understood. Paths match by plain
//! prefix; the longest matching rule wins and ties keep the first-declared rule.
//! Among groups naming the same agent, the first-declared group wins.

use futures_util::StreamExt;
use std::collections::BTreeSet;
use std::time::Duration;
use webprobe_core::{RobotsPolicy, UrlTarget};

/// Bytes of robots.txt we are willing to read; the rest is ignored.
pub const MAX_ROBOTS_BYTES: usize = 512 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub kind: RuleKind,
    pub path_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// Lower-cased agent tokens.
    pub agents: BTreeSet<String>,
    pub rules: Vec<Rule>,
}

/// Immutable result of parsing one robots.txt body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RobotsRuleSet {
    groups: Vec<Group>,
}

enum Line<'a> {
    UserAgent(&'a str),
    Rule(RuleKind, &'a str),
    Other,
}

fn classify(line: &str) -> Line<'_> {
    let Some((k, v)) = line.split_once(':') else {
        return Line::Other;
    };
    let v = v.trim();
    match k.trim().to_ascii_lowercase().as_str() {
        "user-agent" => Line::UserAgent(v),
        "allow" => Line::Rule(RuleKind::Allow, v),
        "disallow" => Line::Rule(RuleKind::Disallow, v),
        _ => Line::Other,
    }
}

enum State {
    NoActiveGroup,
    InGroup(Group),
}

impl RobotsRuleSet {
    pub fn parse(body: &str) -> Self {
        let mut groups = Vec::new();
        let mut state = State::NoActiveGroup;

        for raw in body.lines() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            state = match (state, classify(line)) {
                (state, Line::Other) => state,
                (State::NoActiveGroup, Line::UserAgent(a)) => State::InGroup(Group {
                    agents: BTreeSet::from([a.to_ascii_lowercase()]),
                    rules: Vec::new(),
                }),
                // Consecutive user-agent lines share one group.
                (State::InGroup(mut g), Line::UserAgent(a)) if g.rules.is_empty() => {
                    g.agents.insert(a.to_ascii_lowercase());
                    State::InGroup(g)
                }
                (State::InGroup(g), Line::UserAgent(a)) => {
                    groups.push(g);
                    State::InGroup(Group {
                        agents: BTreeSet::from([a.to_ascii_lowercase()]),
                        rules: Vec::new(),
                    })
                }
                (State::NoActiveGroup, Line::Rule(kind, p)) => State::InGroup(Group {
                    agents: BTreeSet::from(["*".to_string()]),
                    rules: vec![Rule {
                        kind,
                        path_prefix: p.to_string(),
                    }],
                }),
                (State::InGroup(mut g), Line::Rule(kind, p)) => {
                    g.rules.push(Rule {
                        kind,
                        path_prefix: p.to_string(),
                    });
                    State::InGroup(g)
                }
            };
        }
        if let State::InGroup(g) = state {
            groups.push(g);
        }
        Self { groups }
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    fn group_for(&self, agent: &str) -> Option<&Group> {
        let agent = agent.trim().to_ascii_lowercase();
        self.groups
            .iter()
            .find(|g| g.agents.contains(&agent))
            .or_else(|| self.groups.iter().find(|g| g.agents.contains("*")))
    }

    pub fn is_allowed(&self, path: &str, agent: &str) -> bool {
        let Some(group) = self.group_for(agent) else {
            return true;
        };
        let mut best: Option<&Rule> = None;
        for r in &group.rules {
            if r.path_prefix.is_empty() || !path.starts_with(&r.path_prefix) {
                continue;
            }
            // Strictly longer only, so ties keep the first-declared rule.
            if best.map_or(true, |b| r.path_prefix.len() > b.path_prefix.len()) {
                best = Some(r);
            }
        }
        best.map_or(true, |r| r.kind == RuleKind::Allow)
    }
}

/// Fetches robots.txt over HTTP and answers allow/deny. Fails open.
#[derive(Debug, Clone)]
pub struct HttpRobotsResolver {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpRobotsResolver {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn fetch_body(&self, url: &str) -> Result<String, String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !resp.status().is_success() {
            return Err(format!("status {}", resp.status().as_u16()));
        }
        let mut bytes = Vec::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| e.to_string())?;
            let room = MAX_ROBOTS_BYTES.saturating_sub(bytes.len());
            if chunk.len() >= room {
                bytes.extend_from_slice(&chunk[..room]);
                break;
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&bytes).to_string())
    }

    /// Fetch and parse the policy for `target`'s origin. `None` means no enforceable policy.
    pub async fn fetch_rules(&self, target: &UrlTarget) -> Option<RobotsRuleSet> {
        let url = target.robots_url();
        match tokio::time::timeout(self.timeout, self.fetch_body(&url)).await {
            Ok(Ok(body)) => Some(RobotsRuleSet::parse(&body)),
            Ok(Err(reason)) => {
                tracing::warn!(url = %url, reason = %reason, "robots.txt unavailable; allowing");
                None
            }
            Err(_) => {
                tracing::warn!(url = %url, timeout_ms = self.timeout.as_millis() as u64, "robots.txt timed out; allowing");
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl RobotsPolicy for HttpRobotsResolver {
    async fn is_allowed(&self, target: &UrlTarget, user_agent: &str) -> bool {
        let Some(rules) = self.fetch_rules(target).await else {
            return true;
        };
        let allowed = rules.is_allowed(target.path(), user_agent);
        tracing::debug!(path = %target.path(), agent = %user_agent, allowed, "robots verdict");
        allowed
    }
}
