//! Intelligence sources.
//!
//! A [`Source`] is a connector: given a root domain, it fetches names from a
//! third party. [`SourceService`] runs a connector as a [`Service`](crate::Service):
//! it walks every configured root in turn, honours the connector's rate limit
//! and the lifecycle, and publishes each name as `NewName`.
//!
//! | Connector  | Tag      | Credentials                                      |
//! |------------|----------|--------------------------------------------------|
//! | [`Crtsh`]  | `cert`   | none                                             |
//! | [`Riddler`]| `scrape` | none                                             |
//! | [`Ipv4Info`] | `scrape` | none                                           |
//! | [`Shodan`] | `api`    | key required; without it the source yields nothing |
//! | [`Censys`] | `cert`   | key + secret for the REST API, else public page |

mod censys;
mod crtsh;
mod ipv4info;
mod riddler;
mod service;
mod shodan;

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use crate::config::ApiKey;
use crate::error::SourceError;
use crate::events::Tag;

pub use censys::Censys;
pub use crtsh::Crtsh;
pub use ipv4info::Ipv4Info;
pub use riddler::Riddler;
pub use service::{SourceService, http_client};
pub use shodan::Shodan;

/// How a connector depends on an API key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyPolicy {
    /// Never uses one.
    None,
    /// Uses one when configured, works without.
    Optional,
    /// Does nothing without one.
    Required,
}

/// Everything a connector needs for one query.
#[derive(Clone, Debug)]
pub struct SourceContext {
    pub client: reqwest::Client,
    /// Usable credentials, if configured.
    pub api_key: Option<ApiKey>,
}

/// One third-party connector.
#[async_trait]
pub trait Source: Send + Sync + 'static {
    /// Display name; also the key under which credentials are looked up.
    fn name(&self) -> &str;

    /// Provenance of everything it yields.
    fn tag(&self) -> Tag;

    /// Pause between two root domains.
    fn rate_limit(&self) -> Duration {
        Duration::ZERO
    }

    fn key_policy(&self) -> KeyPolicy {
        KeyPolicy::None
    }

    /// Whether `key` carries everything the connector needs.
    fn accepts_key(&self, key: &ApiKey) -> bool {
        key.has_key()
    }

    /// Names found for `domain`. Duplicates and noise are tolerated; the
    /// name service cleans and filters them.
    async fn query(&self, ctx: &SourceContext, domain: &str) -> Result<Vec<String>, SourceError>;
}

/// Every connector, in a fixed order.
pub fn all() -> Vec<std::sync::Arc<dyn Source>> {
    vec![
        std::sync::Arc::new(Crtsh),
        std::sync::Arc::new(Riddler),
        std::sync::Arc::new(Ipv4Info),
        std::sync::Arc::new(Shodan),
        std::sync::Arc::new(Censys),
    ]
}

/// Fetches `request` and returns the body of a successful response.
pub(crate) async fn fetch_text(
    source_name: &str,
    request: reqwest::RequestBuilder,
) -> Result<String, SourceError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Status {
            source_name: source_name.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response.text().await?)
}

/// Every match of `re` in `text`, in order.
pub(crate) fn scrape(re: &Regex, text: &str) -> Vec<String> {
    re.find_iter(text).map(|m| m.as_str().to_string()).collect()
}

pub(crate) fn domain_regex(source_name: &str, domain: &str) -> Result<Regex, SourceError> {
    crate::config::subdomain_regex(domain).map_err(|e| SourceError::Decode {
        source_name: source_name.to_string(),
        error: e.to_string(),
    })
}

pub(crate) fn decode_error(source_name: &str, error: impl ToString) -> SourceError {
    SourceError::Decode {
        source_name: source_name.to_string(),
        error: error.to_string(),
    }
}
