//! crt.sh certificate transparency search.

use async_trait::async_trait;
use serde::Deserialize;

use super::{Source, SourceContext, decode_error, fetch_text};
use crate::error::SourceError;
use crate::events::Tag;

const NAME: &str = "crt.sh";

#[derive(Debug, Deserialize)]
struct Entry {
    name_value: String,
}

/// Certificate names logged for a domain.
#[derive(Clone, Copy, Debug, Default)]
pub struct Crtsh;

impl Crtsh {
    fn url(domain: &str) -> String {
        format!("https://crt.sh/?q=%25.{domain}&output=json")
    }
}

/// Names in a crt.sh JSON answer; one entry may carry several, one per line.
fn parse(body: &str) -> Result<Vec<String>, SourceError> {
    let entries: Vec<Entry> = serde_json::from_str(body).map_err(|e| decode_error(NAME, e))?;
    Ok(entries
        .iter()
        .flat_map(|e| e.name_value.lines())
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect())
}

#[async_trait]
impl Source for Crtsh {
    fn name(&self) -> &str {
        NAME
    }

    fn tag(&self) -> Tag {
        Tag::Cert
    }

    async fn query(&self, ctx: &SourceContext, domain: &str) -> Result<Vec<String>, SourceError> {
        let body = fetch_text(NAME, ctx.client.get(Self::url(domain))).await?;
        parse(&body)
    }
}
