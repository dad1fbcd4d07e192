//! Censys certificate search.
//!
//! With a key and secret the REST API is used; otherwise the public domain
//! table page is scraped.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::{KeyPolicy, Source, SourceContext, domain_regex, fetch_text, scrape};
use crate::config::ApiKey;
use crate::error::SourceError;
use crate::events::Tag;

const NAME: &str = "Censys";
const REST_URL: &str = "https://www.censys.io/api/v1/search/certificates";

/// Certificate names known to Censys.
#[derive(Clone, Copy, Debug, Default)]
pub struct Censys;

#[async_trait]
impl Source for Censys {
    fn name(&self) -> &str {
        NAME
    }

    fn tag(&self) -> Tag {
        Tag::Cert
    }

    fn rate_limit(&self) -> Duration {
        Duration::from_secs(3)
    }

    fn key_policy(&self) -> KeyPolicy {
        KeyPolicy::Optional
    }

    fn accepts_key(&self, key: &ApiKey) -> bool {
        key.has_key() && key.has_secret()
    }

    async fn query(&self, ctx: &SourceContext, domain: &str) -> Result<Vec<String>, SourceError> {
        let request = match &ctx.api_key {
            Some(key) => ctx
                .client
                .post(REST_URL)
                .basic_auth(&key.key, Some(&key.secret))
                .json(&json!({ "query": domain })),
            None => ctx
                .client
                .get(format!("https://www.censys.io/domain/{domain}/table")),
        };
        let page = fetch_text(NAME, request).await?;
        Ok(scrape(&domain_regex(NAME, domain)?, &page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_both_halves_of_the_credentials() {
        assert!(!Censys.accepts_key(&ApiKey::new("id")));
        assert!(Censys.accepts_key(&ApiKey::new("id").with_secret("secret")));
    }

    #[test]
    fn scrapes_names_from_api_results() {
        let body = r#"{"results":[{"parsed.names":["example.com","www.example.com","*.dev.example.com"]}]}"#;
        let re = domain_regex(NAME, "example.com").unwrap();
        assert_eq!(scrape(&re, body), vec!["www.example.com", "dev.example.com"]);
    }
}
