//! Riddler search page scraping.

use async_trait::async_trait;

use super::{Source, SourceContext, domain_regex, fetch_text, scrape};
use crate::error::SourceError;
use crate::events::Tag;

const NAME: &str = "Riddler";

/// Names found on riddler.io search results.
#[derive(Clone, Copy, Debug, Default)]
pub struct Riddler;

#[async_trait]
impl Source for Riddler {
    fn name(&self) -> &str {
        NAME
    }

    fn tag(&self) -> Tag {
        Tag::Scrape
    }

    async fn query(&self, ctx: &SourceContext, domain: &str) -> Result<Vec<String>, SourceError> {
        let url = format!("https://riddler.io/search?q=pld:{domain}");
        let page = fetch_text(NAME, ctx.client.get(url)).await?;
        Ok(scrape(&domain_regex(NAME, domain)?, &page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrapes_subdomains_out_of_markup() {
        let page = r#"<td><a href="/x">api.example.com</a></td><td>Dev.Example.com</td>
            <td>example.org</td><td>notexample.com</td>"#;
        let re = domain_regex(NAME, "example.com").unwrap();
        assert_eq!(scrape(&re, page), vec!["api.example.com", "Dev.Example.com"]);
    }
}
