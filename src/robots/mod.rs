//! Robots.txt handling module
//!
//! The fetcher retrieves robots.txt verbatim ([`RobotsTxt`]); the crawl
//! session turns it into a [`RobotsPolicy`] and consults it before every fetch.

mod policy;

pub use policy::RobotsPolicy;

use std::fmt;

/// Outcome of fetching `/robots.txt`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RobotsTxt {
    /// The server returned 200 with this body
    Found(String),

    /// The file could not be retrieved; the payload describes why
    Unavailable(String),
}

impl RobotsTxt {
    /// Returns true if a robots.txt body was retrieved
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// Raw text when found, otherwise the failure description
    pub fn as_text(&self) -> &str {
        match self {
            Self::Found(body) => body,
            Self::Unavailable(reason) => reason,
        }
    }
}

impl fmt::Display for RobotsTxt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_text())
    }
}
