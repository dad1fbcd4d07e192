//! Shodan host search.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{KeyPolicy, Source, SourceContext, decode_error, domain_regex, fetch_text};
use crate::error::SourceError;
use crate::events::Tag;

const NAME: &str = "Shodan";

#[derive(Debug, Default, Deserialize)]
struct SearchResult {
    #[serde(default)]
    matches: Vec<Match>,
}

#[derive(Debug, Default, Deserialize)]
struct Match {
    #[serde(default)]
    hostnames: Vec<String>,
}

/// Hostnames of hosts Shodan indexed under a domain. Needs an API key.
#[derive(Clone, Copy, Debug, Default)]
pub struct Shodan;

fn parse(body: &str, domain: &str) -> Result<Vec<String>, SourceError> {
    let result: SearchResult = serde_json::from_str(body).map_err(|e| decode_error(NAME, e))?;
    let re = domain_regex(NAME, domain)?;
    Ok(result
        .matches
        .into_iter()
        .flat_map(|m| m.hostnames)
        .filter(|host| re.is_match(host))
        .collect())
}

#[async_trait]
impl Source for Shodan {
    fn name(&self) -> &str {
        NAME
    }

    fn tag(&self) -> Tag {
        Tag::Api
    }

    fn rate_limit(&self) -> Duration {
        Duration::from_secs(1)
    }

    fn key_policy(&self) -> KeyPolicy {
        KeyPolicy::Required
    }

    async fn query(&self, ctx: &SourceContext, domain: &str) -> Result<Vec<String>, SourceError> {
        let Some(key) = ctx.api_key.as_ref() else {
            return Err(SourceError::MissingCredentials {
                source_name: NAME.to_string(),
            });
        };
        let filter = format!("hostname:{domain}");
        let request = ctx
            .client
            .get("https://api.shodan.io/shodan/host/search")
            .query(&[("key", key.key.as_str()), ("query", filter.as_str())])
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        let body = fetch_text(NAME, request).await?;
        parse(&body, domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn refuses_to_query_without_a_key() {
        let ctx = SourceContext {
            client: reqwest::Client::new(),
            api_key: None,
        };
        let err = Shodan.query(&ctx, "example.com").await.unwrap_err();
        assert_eq!(err.as_label(), "source_missing_credentials");
    }

    #[test]
    fn keeps_only_in_scope_hostnames() {
        let body = r#"{"total": 2, "matches": [
            {"ip_str": "192.0.2.1", "hostnames": ["vpn.example.com", "cdn.other.net"]},
            {"ip_str": "192.0.2.2"}
        ]}"#;
        assert_eq!(parse(body, "example.com").unwrap(), vec!["vpn.example.com"]);
        assert!(parse("{}", "example.com").unwrap().is_empty());
    }
}
