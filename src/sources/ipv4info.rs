//! IPv4Info page chain scraping.
//!
//! ```text
//! /search/{domain} ─► /ip-address/…/{domain} ─► /dns/…/{domain} ─► /subdomains/…/{domain}
//!                                                                     │ domain regex
//!                                                                     ▼
//!                                                                   names
//! ```

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use super::{Source, SourceContext, decode_error, domain_regex, fetch_text, scrape};
use crate::error::SourceError;
use crate::events::Tag;

const NAME: &str = "IPv4Info";
const BASE_URL: &str = "http://ipv4info.com";
const STEP_DELAY: Duration = Duration::from_secs(1);

/// Links followed from the search page, in order.
const STEPS: [&str; 3] = ["ip-address", "dns", "subdomains"];

/// Names listed on ipv4info.com subdomain pages.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ipv4Info;

/// Absolute URL of the first `/{step}/…/{domain}` link on `page`.
fn next_link(page: &str, step: &str, domain: &str) -> Result<String, SourceError> {
    let re = Regex::new(&format!(r#"/{step}/[^"'\s<>]*?/{}"#, regex::escape(domain)))
        .map_err(|e| decode_error(NAME, e))?;
    re.find(page)
        .map(|m| format!("{BASE_URL}{}", m.as_str()))
        .ok_or_else(|| decode_error(NAME, format!("no /{step}/ link for {domain}")))
}

#[async_trait]
impl Source for Ipv4Info {
    fn name(&self) -> &str {
        NAME
    }

    fn tag(&self) -> Tag {
        Tag::Scrape
    }

    fn rate_limit(&self) -> Duration {
        Duration::from_secs(1)
    }

    async fn query(&self, ctx: &SourceContext, domain: &str) -> Result<Vec<String>, SourceError> {
        let search = format!("{BASE_URL}/search/{domain}");
        let mut page = fetch_text(NAME, ctx.client.get(search)).await?;
        for step in STEPS {
            let url = next_link(&page, step, domain)?;
            tokio::time::sleep(STEP_DELAY).await;
            page = fetch_text(NAME, ctx.client.get(url)).await?;
        }
        Ok(scrape(&domain_regex(NAME, domain)?, &page))
    }
}
