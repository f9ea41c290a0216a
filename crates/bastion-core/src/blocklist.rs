//! Domains that are known not to yield an article.
//!
//! A URL on a listed domain is given up on before any attempt is made.

use std::sync::Arc;

use url::Url;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainBlocklist {
    domains: Arc<[String]>,
}

impl DomainBlocklist {
    /// Entries are lower-cased; a leading `.` and surrounding whitespace are
    /// ignored, empty entries dropped.
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let domains: Vec<String> = domains
            .into_iter()
            .map(|d| d.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        Self {
            domains: domains.into(),
        }
    }

    /// Comma-separated list, e.g. `reuters.com, isna.ir`.
    pub fn parse(raw: &str) -> Self {
        Self::new(raw.split(','))
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    /// The listed domain `url`'s host equals or is a subdomain of.
    pub fn matching(&self, url: &Url) -> Option<&str> {
        let host = url.host_str()?.trim_end_matches('.').to_ascii_lowercase();
        self.domains
            .iter()
            .find(|domain| {
                host == domain.as_str()
                    || host
                        .strip_suffix(domain.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'))
            })
            .map(String::as_str)
    }
}
