//! # Discovered-name records.
//!
//! A [`Request`] is what every producer publishes and every consumer receives.
//! Once wrapped in an [`Event`](crate::events::Event) it is shared behind an
//! `Arc` and never mutated; consumers that need a variant build a new one.

use std::fmt;

use serde::Serialize;

/// DNS record types the pipeline knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RecordType {
    A,
    AAAA,
    CNAME,
    NS,
    MX,
    TXT,
    PTR,
    SOA,
    SRV,
    /// Any other type, by its numeric code.
    Other(u16),
}

impl RecordType {
    /// True for address records (`A` / `AAAA`).
    #[inline]
    pub fn is_address(&self) -> bool {
        matches!(self, RecordType::A | RecordType::AAAA)
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::A => f.write_str("A"),
            RecordType::AAAA => f.write_str("AAAA"),
            RecordType::CNAME => f.write_str("CNAME"),
            RecordType::NS => f.write_str("NS"),
            RecordType::MX => f.write_str("MX"),
            RecordType::TXT => f.write_str("TXT"),
            RecordType::PTR => f.write_str("PTR"),
            RecordType::SOA => f.write_str("SOA"),
            RecordType::SRV => f.write_str("SRV"),
            RecordType::Other(code) => write!(f, "TYPE{code}"),
        }
    }
}

/// One resolved DNS answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DnsAnswer {
    /// Owner name of the record.
    pub name: String,
    /// Record type.
    pub record_type: RecordType,
    /// Time to live, in seconds.
    pub ttl: u32,
    /// Presentation form of the record data (address, target name, ...).
    pub data: String,
}

impl DnsAnswer {
    pub fn new(
        name: impl Into<String>,
        record_type: RecordType,
        ttl: u32,
        data: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            record_type,
            ttl,
            data: data.into(),
        }
    }
}

/// Provenance category of a discovered name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    /// Wordlist brute forcing.
    Brute,
    /// Certificate transparency.
    Cert,
    /// Web page scraping.
    Scrape,
    /// Third-party API.
    Api,
    /// Derived from DNS data.
    #[default]
    Dns,
}

impl Tag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Brute => "brute",
            Tag::Cert => "cert",
            Tag::Scrape => "scrape",
            Tag::Api => "api",
            Tag::Dns => "dns",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discovered-name record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Request {
    /// Fully-qualified candidate name.
    pub name: String,
    /// Root domain the name belongs to.
    pub domain: String,
    /// Resolved answers, in query order.
    pub records: Vec<DnsAnswer>,
    /// How the name was discovered.
    pub tag: Tag,
    /// Name of the producing service.
    pub source: String,
}

impl Request {
    /// Creates a request for `name` under the root `domain`.
    pub fn new(name: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
            ..Self::default()
        }
    }

    #[inline]
    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tag = tag;
        self
    }

    #[inline]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    #[inline]
    pub fn with_records(mut self, records: Vec<DnsAnswer>) -> Self {
        self.records = records;
        self
    }

    /// True if at least one `A` or `AAAA` answer is attached.
    pub fn has_address(&self) -> bool {
        self.records.iter().any(|r| r.record_type.is_address())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_address_ignores_cname_only() {
        let req = Request::new("www.example.com", "example.com").with_records(vec![
            DnsAnswer::new("www.example.com", RecordType::CNAME, 300, "edge.cdn.net"),
        ]);
        assert!(!req.has_address());

        let req = req.with_records(vec![DnsAnswer::new(
            "www.example.com",
            RecordType::AAAA,
            300,
            "2001:db8::1",
        )]);
        assert!(req.has_address());
    }

    #[test]
    fn serializes_tag_lowercase() {
        let req = Request::new("mail.example.com", "example.com")
            .with_tag(Tag::Brute)
            .with_source("Brute Forcing");
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["tag"], "brute");
        assert_eq!(json["source"], "Brute Forcing");
        assert_eq!(RecordType::Other(65).to_string(), "TYPE65");
    }
}
