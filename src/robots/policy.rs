//! Allow/deny and crawl-delay decisions over a fetched robots.txt
//!
//! Matching is delegated to the robotstxt crate; `Crawl-delay` is not part of
//! the matcher, so it is read from the group structure here.

use crate::robots::RobotsTxt;
use robotstxt::DefaultMatcher;
use std::time::Duration;

/// Robots.txt rules for one crawl target
#[derive(Debug, Clone)]
pub struct RobotsPolicy {
    /// Raw robots.txt body; `None` means everything is allowed
    body: Option<String>,
    /// Product token matched against `User-agent` lines
    agent: String,
}

impl RobotsPolicy {
    /// Builds a policy from the fetcher's robots.txt outcome
    ///
    /// A missing or unreadable robots.txt permits everything.
    ///
    /// # Arguments
    ///
    /// * `robots` - Result of `RateLimitedFetcher::check_robots_txt`
    /// * `user_agent_name` - Configured crawler name; its first word is the product token
    pub fn from_robots_txt(robots: &RobotsTxt, user_agent_name: &str) -> Self {
        let body = match robots {
            RobotsTxt::Found(body) if !body.trim().is_empty() => Some(body.clone()),
            _ => None,
        };

        Self {
            body,
            agent: product_token(user_agent_name),
        }
    }

    /// Creates a permissive policy
    pub fn allow_all() -> Self {
        Self {
            body: None,
            agent: String::new(),
        }
    }

    /// Checks if a URL may be fetched
    pub fn is_allowed(&self, url: &str) -> bool {
        match &self.body {
            None => true,
            Some(body) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(body, &self.agent, url)
            }
        }
    }

    /// Returns the `Crawl-delay` that applies to this agent
    ///
    /// A group naming the agent takes precedence over the `*` group.
    pub fn crawl_delay(&self) -> Option<Duration> {
        let body = self.body.as_deref()?;
        let agent = self.agent.to_lowercase();

        let mut group_agents: Vec<String> = Vec::new();
        let mut in_agent_list = false;
        let mut specific: Option<Duration> = None;
        let mut wildcard: Option<Duration> = None;

        for line in body.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            if key == "user-agent" {
                if !in_agent_list {
                    group_agents.clear();
                }
                group_agents.push(value.to_lowercase());
                in_agent_list = true;
                continue;
            }
            in_agent_list = false;

            if key != "crawl-delay" {
                continue;
            }
            // negative, NaN, infinite and out-of-range values are ignored
            let Some(seconds) = value
                .parse::<f64>()
                .ok()
                .and_then(|s| Duration::try_from_secs_f64(s).ok())
            else {
                continue;
            };

            if !agent.is_empty() && group_agents.iter().any(|a| a == &agent) {
                specific = Some(seconds);
            } else if group_agents.iter().any(|a| a == "*") {
                wildcard = Some(seconds);
            }
        }

        specific.or(wildcard)
    }
}

/// Extracts the product token robots.txt groups are matched against
fn product_token(name: &str) -> String {
    name.chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(body: &str, agent: &str) -> RobotsPolicy {
        RobotsPolicy::from_robots_txt(&RobotsTxt::Found(body.to_string()), agent)
    }

    #[test]
    fn test_allow_all() {
        let robots = RobotsPolicy::allow_all();
        assert!(robots.is_allowed("https://example.com/any/path"));
        assert_eq!(robots.crawl_delay(), None);
    }

    #[test]
    fn test_unavailable_robots_allows_everything() {
        let robots = RobotsPolicy::from_robots_txt(
            &RobotsTxt::Unavailable("robots.txt not found (Status: 404)".to_string()),
            "DocHarvest",
        );
        assert!(robots.is_allowed("https://example.com/admin"));
    }

    #[test]
    fn test_disallow_specific_path() {
        let robots = policy("User-agent: *\nDisallow: /admin", "DocHarvest");
        assert!(robots.is_allowed("https://example.com/"));
        assert!(robots.is_allowed("https://example.com/portal/Normatividad.page"));
        assert!(!robots.is_allowed("https://example.com/admin"));
        assert!(!robots.is_allowed("https://example.com/admin/users"));
    }

    #[test]
    fn test_allow_overrides_disallow() {
        let robots = policy(
            "User-agent: *\nDisallow: /private\nAllow: /private/public",
            "DocHarvest",
        );
        assert!(!robots.is_allowed("https://example.com/private"));
        assert!(robots.is_allowed("https://example.com/private/public"));
    }

    #[test]
    fn test_agent_specific_group() {
        let body = "User-agent: DocHarvest\nDisallow: /\n\nUser-agent: *\nAllow: /";
        assert!(!policy(body, "DocHarvest").is_allowed("https://example.com/page"));
        assert!(policy(body, "OtherBot").is_allowed("https://example.com/page"));
    }

    #[test]
    fn test_product_token_from_long_name() {
        assert_eq!(
            product_token("Universidad Central - Proyecto Big Data"),
            "Universidad"
        );
        assert_eq!(product_token("DocHarvest/1.0"), "DocHarvest");
    }

    #[test]
    fn test_crawl_delay_wildcard() {
        let robots = policy("User-agent: *\nCrawl-delay: 10\nDisallow: /admin", "DocHarvest");
        assert_eq!(robots.crawl_delay(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_crawl_delay_specific_agent_wins() {
        let body = "User-agent: *\nCrawl-delay: 10\n\nUser-agent: DocHarvest\nCrawl-delay: 5";
        assert_eq!(policy(body, "DocHarvest").crawl_delay(), Some(Duration::from_secs(5)));
        assert_eq!(policy(body, "OtherBot").crawl_delay(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_crawl_delay_shared_group() {
        let body = "User-agent: BotA\nUser-agent: DocHarvest\nCrawl-delay: 2.5";
        assert_eq!(
            policy(body, "DocHarvest").crawl_delay(),
            Some(Duration::from_millis(2500))
        );
        assert_eq!(policy(body, "BotC").crawl_delay(), None);
    }

    #[test]
    fn test_crawl_delay_unrepresentable_values_ignored() {
        for value in ["inf", "NaN", "1e300", "-3"] {
            let body = format!("User-agent: *\nCrawl-delay: {}\nDisallow: /admin", value);
            assert_eq!(policy(&body, "DocHarvest").crawl_delay(), None, "{}", value);
        }

        let body = "User-agent: *\nCrawl-delay: 4\n\nUser-agent: DocHarvest\nCrawl-delay: inf";
        assert_eq!(
            policy(body, "DocHarvest").crawl_delay(),
            Some(Duration::from_secs(4))
        );
    }

    #[test]
    fn test_crawl_delay_absent() {
        let robots = policy("User-agent: *\nDisallow: /admin", "DocHarvest");
        assert_eq!(robots.crawl_delay(), None);
    }
}
