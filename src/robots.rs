//! robots.txt policy evaluator (spec.md §4.2).
//!
//! Hand-written rather than delegated to a general-purpose robots-matcher
//! crate: the longest-prefix allow/disallow tie-break and the
//! substring-match agent selection spec.md mandates are bespoke to this
//! system (see DESIGN.md).

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
struct AgentRules {
    allow: Vec<String>,
    disallow: Vec<String>,
    crawl_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicySource {
    Fetched,
    AllowAll(String),
}

/// Immutable once constructed. `is_allowed` and `crawl_delay_ms` are the
/// only query surface.
#[derive(Debug, Clone)]
pub struct RobotsPolicy {
    allow: Vec<String>,
    disallow: Vec<String>,
    crawl_delay_ms: Option<u64>,
    pub source: PolicySource,
}

impl RobotsPolicy {
    /// Allow-all policy, used when `--no-robots` is set or a robots.txt
    /// fetch fails (spec.md §4.2 "Failure modes").
    pub fn allow_all(reason: impl Into<String>) -> Self {
        Self {
            allow: Vec::new(),
            disallow: Vec::new(),
            crawl_delay_ms: None,
            source: PolicySource::AllowAll(reason.into()),
        }
    }

    /// Parse robots.txt text for the given user agent.
    pub fn parse(body: &str, user_agent: &str) -> Self {
        let by_agent = parse_agents(body);
        let rules = select_agent(&by_agent, user_agent);
        match rules {
            Some(r) => Self {
                allow: r.allow.clone(),
                disallow: r.disallow.clone(),
                crawl_delay_ms: r.crawl_delay_ms,
                source: PolicySource::Fetched,
            },
            None => Self::allow_all("no matching user-agent section"),
        }
    }

    /// Longest matching Allow vs longest matching Disallow; ties favor
    /// allow; no match at all favors allow.
    pub fn is_allowed(&self, path: &str) -> bool {
        let longest_allow = longest_prefix_len(&self.allow, path);
        let longest_disallow = longest_prefix_len(&self.disallow, path);
        if longest_allow == 0 && longest_disallow == 0 {
            return true;
        }
        longest_allow >= longest_disallow
    }

    pub fn crawl_delay_ms(&self) -> Option<u64> {
        self.crawl_delay_ms
    }

    /// `max(user-delay, robots.crawlDelayMs)`.
    pub fn effective_delay_ms(&self, user_delay_ms: u64) -> u64 {
        user_delay_ms.max(self.crawl_delay_ms.unwrap_or(0))
    }
}

fn longest_prefix_len(rules: &[String], path: &str) -> usize {
    rules
        .iter()
        .filter(|rule| path.starts_with(rule.as_str()))
        .map(|rule| rule.len())
        .max()
        .unwrap_or(0)
}

fn normalize_rule_value(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('/') {
        Some(trimmed.to_string())
    } else {
        Some(format!("/{trimmed}"))
    }
}

/// Strip `#` comments, split into `(agent-token, AgentRules)` sections.
/// Unknown directives are ignored; the file never causes a parse error.
fn parse_agents(body: &str) -> HashMap<String, AgentRules> {
    let mut sections: HashMap<String, AgentRules> = HashMap::new();
    let mut current: Vec<String> = Vec::new();

    for raw_line in body.lines() {
        let line = match raw_line.split('#').next() {
            Some(l) => l.trim(),
            None => continue,
        };
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                let token = value.to_lowercase();
                // A fresh User-agent line after non-useragent directives
                // starts a new context (classic robots.txt grouping).
                current = vec![token.clone()];
                sections.entry(token).or_default();
            }
            "allow" => {
                if let Some(v) = normalize_rule_value(value) {
                    for agent in &current {
                        sections.entry(agent.clone()).or_default().allow.push(v.clone());
                    }
                }
            }
            "disallow" => {
                if let Some(v) = normalize_rule_value(value) {
                    for agent in &current {
                        sections
                            .entry(agent.clone())
                            .or_default()
                            .disallow
                            .push(v.clone());
                    }
                }
            }
            "crawl-delay" => {
                if let Ok(seconds) = value.parse::<f64>() {
                    let ms = (seconds * 1000.0).round() as u64;
                    for agent in &current {
                        sections.entry(agent.clone()).or_default().crawl_delay_ms = Some(ms);
                    }
                }
            }
            _ => {} // unknown directive, ignored
        }
    }

    sections
}

/// Exact lowercase match, else any non-`*` agent whose token is a substring
/// of the UA, else `*`, else `None` (caller falls back to allow-all).
fn select_agent<'a>(
    sections: &'a HashMap<String, AgentRules>,
    user_agent: &str,
) -> Option<&'a AgentRules> {
    let ua_lower = user_agent.to_lowercase();

    if let Some(rules) = sections.get(&ua_lower) {
        return Some(rules);
    }

    if let Some(rules) = sections
        .iter()
        .find(|(token, _)| token.as_str() != "*" && !token.is_empty() && ua_lower.contains(token.as_str()))
        .map(|(_, rules)| rules)
    {
        return Some(rules);
    }

    sections.get("*")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROBOTS: &str = "\
User-agent: *\n\
Disallow: /private/\n\
Allow: /private/public-page\n\
Crawl-delay: 2.5\n\
\n\
User-agent: GoodBot\n\
Disallow:\n\
";

    #[test]
    fn disallows_private_but_allows_carveout() {
        let policy = RobotsPolicy::parse(ROBOTS, "SomeBot/1.0");
        assert!(!policy.is_allowed("/private/secret"));
        assert!(policy.is_allowed("/private/public-page"));
        assert!(policy.is_allowed("/docs"));
    }

    #[test]
    fn crawl_delay_rounds_half_up_to_ms() {
        let policy = RobotsPolicy::parse(ROBOTS, "SomeBot/1.0");
        assert_eq!(policy.crawl_delay_ms(), Some(2500));
    }

    #[test]
    fn named_agent_with_empty_disallow_allows_all() {
        let policy = RobotsPolicy::parse(ROBOTS, "GoodBot");
        assert!(policy.is_allowed("/private/secret"));
    }

    #[test]
    fn substring_agent_match() {
        let body = "User-agent: good\nDisallow: /x\n";
        let policy = RobotsPolicy::parse(body, "my-good-crawler/1.0");
        assert!(!policy.is_allowed("/x/y"));
    }

    #[test]
    fn allow_all_when_no_rules_match_at_all() {
        let policy = RobotsPolicy::parse("User-agent: *\n", "anything");
        assert!(policy.is_allowed("/whatever"));
    }

    #[test]
    fn monotone_in_allow_length() {
        // Adding a longer matching Allow never forbids a previously allowed path.
        let body_a = "User-agent: *\nDisallow: /a\n";
        let body_b = "User-agent: *\nDisallow: /a\nAllow: /a/b\n";
        let p_a = RobotsPolicy::parse(body_a, "bot");
        let p_b = RobotsPolicy::parse(body_b, "bot");
        if p_a.is_allowed("/a/b") {
            assert!(p_b.is_allowed("/a/b"));
        }
        assert!(p_b.is_allowed("/a/b"));
    }

    #[test]
    fn effective_delay_takes_the_max() {
        let policy = RobotsPolicy::parse(ROBOTS, "SomeBot/1.0");
        assert_eq!(policy.effective_delay_ms(1000), 2500);
        assert_eq!(policy.effective_delay_ms(5000), 5000);
    }
}
