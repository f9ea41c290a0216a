//! Browser identities presented to target sites.
//!
//! Every attempt asks the [`IdentitySource`] for a fresh header set, so a
//! retried request shows up with a different fingerprint than the one that
//! was just rejected.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use url::Url;

/// Header name → value. Ordered so serialized header sets are stable.
pub type HeaderSet = BTreeMap<String, String>;

/// Desktop browser signatures covering Blink, WebKit and Gecko.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

const ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "zh-TW,zh;q=0.9,en-US;q=0.8,en;q=0.7";
const ACCEPT_ENCODING: &str = "gzip, deflate, br";

/// Supplies the header set for one attempt against `url`.
pub trait IdentitySource: Send + Sync + Clone {
    fn next_headers(&self, url: &Url) -> HeaderSet;
}

/// Rotating identity drawn uniformly from a static User-Agent pool.
#[derive(Debug, Clone, Copy)]
pub struct IdentityPool {
    user_agents: &'static [&'static str],
}

impl Default for IdentityPool {
    fn default() -> Self {
        Self {
            user_agents: USER_AGENTS,
        }
    }
}

impl IdentityPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different static pool. An empty pool falls back to
    /// [`USER_AGENTS`].
    pub fn with_user_agents(user_agents: &'static [&'static str]) -> Self {
        if user_agents.is_empty() {
            return Self::default();
        }
        Self { user_agents }
    }

    pub fn user_agents(&self) -> &'static [&'static str] {
        self.user_agents
    }

    fn pick_user_agent(&self) -> &'static str {
        self.user_agents
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENTS[0])
    }
}

impl IdentitySource for IdentityPool {
    fn next_headers(&self, url: &Url) -> HeaderSet {
        let mut headers = HeaderSet::new();
        headers.insert("User-Agent".into(), self.pick_user_agent().into());
        headers.insert("Accept".into(), ACCEPT.into());
        headers.insert("Accept-Language".into(), ACCEPT_LANGUAGE.into());
        headers.insert("Accept-Encoding".into(), ACCEPT_ENCODING.into());
        if let Some(referer) = origin_referer(url) {
            headers.insert("Referer".into(), referer);
        }
        headers.insert("Connection".into(), "keep-alive".into());
        headers.insert("Upgrade-Insecure-Requests".into(), "1".into());
        headers.insert("Sec-Fetch-Dest".into(), "document".into());
        headers.insert("Sec-Fetch-Mode".into(), "navigate".into());
        headers.insert("Sec-Fetch-Site".into(), "none".into());
        headers.insert("Cache-Control".into(), "max-age=0".into());
        headers
    }
}

/// `https://<host[:port]>/` of the target itself.
fn origin_referer(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let port = url.port().map(|p| format!(":{p}")).unwrap_or_default();
    Some(format!("https://{host}{port}/"))
}

/// Overlay caller-supplied headers on a generated set.
///
/// Names are compared case-insensitively, so an override of `user-agent`
/// replaces the generated `User-Agent` instead of sending both.
pub fn merge_headers(mut generated: HeaderSet, overrides: &HeaderSet) -> HeaderSet {
    for (name, value) in overrides {
        generated.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
        generated.insert(name.clone(), value.clone());
    }
    generated
}
