//! Robots.txt parser implementation
//!
//! Matching is delegated to the robotstxt crate; crawl delays and sitemap
//! declarations are read from the raw content.

use robotstxt::DefaultMatcher;

/// Crawlers used by AI assistants and answer engines
pub const AI_CRAWLERS: &[&str] = &["GPTBot", "ClaudeBot", "PerplexityBot", "Google-Extended"];

/// Parsed robots.txt data
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    content: String,
    allow_all: bool,
    disallow_all: bool,
}

impl ParsedRobots {
    /// Creates a ParsedRobots from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            allow_all: false,
            disallow_all: false,
        }
    }

    /// Creates a permissive ParsedRobots that allows everything
    ///
    /// Used when robots.txt is missing or cannot be fetched.
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
            disallow_all: false,
        }
    }

    /// Creates a ParsedRobots that disallows everything
    ///
    /// Used when the server refuses access to robots.txt (401/403).
    pub fn disallow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: false,
            disallow_all: true,
        }
    }

    /// Checks if a URL is allowed for the given user agent
    ///
    /// `url` should be absolute; the matcher extracts path and query itself.
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.disallow_all {
            return false;
        }
        if self.allow_all || self.content.trim().is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Gets the crawl delay in seconds for a specific user agent
    ///
    /// A delay in a group naming the agent wins over the wildcard group.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        if self.allow_all || self.disallow_all || self.content.is_empty() {
            return None;
        }

        let agent = user_agent.to_lowercase();
        let mut named = None;
        let mut wildcard = None;

        for group in groups(&self.content) {
            let Some(delay) = group.crawl_delay else {
                continue;
            };
            if group.agents.iter().any(|ua| ua != "*" && agent.contains(ua.as_str())) {
                named = Some(delay);
            } else if group.agents.iter().any(|ua| ua == "*") {
                wildcard = Some(delay);
            }
        }

        named.or(wildcard)
    }

    /// Sitemap URLs declared with `Sitemap:` lines, in file order
    pub fn sitemaps(&self) -> Vec<String> {
        directives(&self.content)
            .filter(|(key, value)| key == "sitemap" && !value.is_empty())
            .map(|(_, value)| value)
            .collect()
    }

    /// AI crawlers that may not fetch the site root
    pub fn blocked_ai_crawlers(&self, site_root: &str) -> Vec<&'static str> {
        AI_CRAWLERS
            .iter()
            .copied()
            .filter(|agent| !self.is_allowed(site_root, agent))
            .collect()
    }
}

/// One `User-agent` group of a robots.txt file
struct Group {
    agents: Vec<String>,
    crawl_delay: Option<f64>,
}

/// Splits the file into groups; consecutive `User-agent` lines share one
fn groups(content: &str) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();
    let mut open = false;

    for (key, value) in directives(content) {
        if key == "user-agent" {
            match groups.last_mut() {
                Some(group) if open => group.agents.push(value.to_lowercase()),
                _ => groups.push(Group {
                    agents: vec![value.to_lowercase()],
                    crawl_delay: None,
                }),
            }
            open = true;
            continue;
        }

        open = false;
        if key == "crawl-delay" {
            let delay = value.parse::<f64>().ok().filter(|d| d.is_finite() && *d >= 0.0);
            if let (Some(group), Some(delay)) = (groups.last_mut(), delay) {
                group.crawl_delay = Some(delay);
            }
        }
    }

    groups
}

/// Yields `(lowercased key, value)` for each directive line
fn directives(content: &str) -> impl Iterator<Item = (String, String)> + '_ {
    content.lines().filter_map(|line| {
        let line = line.split('#').next().unwrap_or_default().trim();
        let (key, value) = line.split_once(':')?;
        Some((key.trim().to_lowercase(), value.trim().to_string()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &str = "https://example.com/";

    fn page(path: &str) -> String {
        format!("https://example.com{}", path)
    }

    #[test]
    fn test_allow_all() {
        let robots = ParsedRobots::allow_all();
        assert!(robots.is_allowed(&page("/any/path"), "TestBot"));
        assert!(robots.is_allowed(&page("/admin"), "TestBot"));
    }

    #[test]
    fn test_disallow_all_constructor() {
        let robots = ParsedRobots::disallow_all();
        assert!(!robots.is_allowed(ROOT, "TestBot"));
        assert_eq!(robots.crawl_delay("TestBot"), None);
    }

    #[test]
    fn test_parse_disallow_specific() {
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /admin");
        assert!(robots.is_allowed(ROOT, "TestBot"));
        assert!(robots.is_allowed(&page("/page"), "TestBot"));
        assert!(!robots.is_allowed(&page("/admin"), "TestBot"));
        assert!(!robots.is_allowed(&page("/admin/users?x=1"), "TestBot"));
    }

    #[test]
    fn test_parse_allow_and_disallow() {
        let robots =
            ParsedRobots::from_content("User-agent: *\nDisallow: /private\nAllow: /private/public");
        assert!(!robots.is_allowed(&page("/private"), "TestBot"));
        assert!(robots.is_allowed(&page("/private/public"), "TestBot"));
    }

    #[test]
    fn test_parse_specific_user_agent() {
        let robots =
            ParsedRobots::from_content("User-agent: BadBot\nDisallow: /\n\nUser-agent: *\nAllow: /");
        assert!(robots.is_allowed(&page("/page"), "GoodBot"));
        assert!(!robots.is_allowed(&page("/page"), "BadBot"));
    }

    #[test]
    fn test_garbage_allows_everything() {
        let robots = ParsedRobots::from_content("This is not valid robots.txt {{{");
        assert!(robots.is_allowed(&page("/any/path"), "TestBot"));
    }

    #[test]
    fn test_crawl_delay_specific_agent_wins() {
        let robots = ParsedRobots::from_content(
            "User-agent: *\nCrawl-delay: 10\n\nUser-agent: TestBot\nCrawl-delay: 5",
        );
        assert_eq!(robots.crawl_delay("TestBot"), Some(5.0));
        assert_eq!(robots.crawl_delay("OtherBot"), Some(10.0));
    }

    #[test]
    fn test_crawl_delay_group_spans_rules() {
        let robots = ParsedRobots::from_content(
            "User-agent: BotA\nUser-agent: BotB\nDisallow: /tmp\nCrawl-delay: 3\n\nUser-agent: BotC\nDisallow: /",
        );
        assert_eq!(robots.crawl_delay("BotA"), Some(3.0));
        assert_eq!(robots.crawl_delay("botb"), Some(3.0));
        assert_eq!(robots.crawl_delay("BotC"), None);
    }

    #[test]
    fn test_crawl_delay_ignores_invalid_values() {
        let robots = ParsedRobots::from_content("User-agent: *\nCrawl-delay: soon\nCrawl-delay: -2");
        assert_eq!(robots.crawl_delay("TestBot"), None);
    }

    #[test]
    fn test_sitemaps() {
        let robots = ParsedRobots::from_content(
            "Sitemap: https://example.com/sitemap.xml\nUser-agent: *\nDisallow:\n# Sitemap: https://example.com/old.xml\nsitemap: https://example.com/news.xml",
        );
        assert_eq!(
            robots.sitemaps(),
            vec![
                "https://example.com/sitemap.xml".to_string(),
                "https://example.com/news.xml".to_string()
            ]
        );
    }

    #[test]
    fn test_blocked_ai_crawlers() {
        let robots = ParsedRobots::from_content(
            "User-agent: GPTBot\nDisallow: /\n\nUser-agent: ClaudeBot\nDisallow: /\n\nUser-agent: *\nAllow: /",
        );
        assert_eq!(robots.blocked_ai_crawlers(ROOT), vec!["GPTBot", "ClaudeBot"]);
        assert!(ParsedRobots::allow_all().blocked_ai_crawlers(ROOT).is_empty());
    }
}
