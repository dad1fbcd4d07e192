//! # Enumeration configuration.
//!
//! Provides [`Config`], the settings shared (as `Arc<Config>`) by every service.
//!
//! ## Sentinel values
//! - `min_for_recursive = 0` → immediate recursion (every resolved name is a new seed)
//! - `max_dns_queries = 0` → the default ceiling of 5000 in-flight resolutions
//! - `resolve_timeout = 0s` → no per-query timeout

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::time::Duration;

use regex::Regex;

/// Default ceiling of concurrently in-flight brute-force resolutions.
pub const DEFAULT_MAX_DNS_QUERIES: usize = 5000;

/// Matches one or more labels followed by a dot, for building domain regexes.
const SUBDOMAIN_LABELS: &str =
    r"(?i)(([a-z0-9]|[_a-z0-9][_a-z0-9-]{0,61}[a-z0-9])\.)+";

/// Credentials for an intelligence source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApiKey {
    pub key: String,
    pub secret: String,
}

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: String::new(),
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = secret.into();
        self
    }

    /// True if a key is present.
    pub fn has_key(&self) -> bool {
        !self.key.is_empty()
    }

    /// True if both a key and a secret are present.
    pub fn has_secret(&self) -> bool {
        self.has_key() && !self.secret.is_empty()
    }
}

/// How the brute-force engine re-expands confirmed subdomains.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecursiveMode {
    /// Every resolved name becomes a new seed immediately.
    Immediate,
    /// A subdomain is expanded the first time its discovery count equals the threshold.
    Threshold(usize),
}

/// Settings for one enumeration run.
///
/// ## Field semantics
/// - `domains`: root domains to enumerate (stored lowercase, see [`Config::add_domain`])
/// - `wordlist`: brute-force labels, processed in order
/// - `max_dns_queries`: global in-flight resolution ceiling (`0` = default 5000)
/// - `brute_forcing` / `recursive` / `min_for_recursive`: brute-force policy
/// - `sources_enabled`: run the intelligence source connectors
/// - `api_keys`: credentials by lowercase source name
/// - `stats_interval`: metrics reporting period
/// - `active_window`: heartbeat age still considered "active" for idle detection
/// - `idle_check_interval`: how often the run coordinator evaluates idleness
/// - `grace`: maximum wait for services to stop
#[derive(Clone, Debug)]
pub struct Config {
    pub domains: Vec<String>,
    pub wordlist: Vec<String>,
    pub max_dns_queries: usize,
    pub brute_forcing: bool,
    pub recursive: bool,
    pub min_for_recursive: usize,
    pub sources_enabled: bool,
    pub api_keys: HashMap<String, ApiKey>,
    pub resolve_timeout: Duration,
    pub http_timeout: Duration,
    pub stats_interval: Duration,
    pub active_window: Duration,
    pub idle_check_interval: Duration,
    pub grace: Duration,
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - brute forcing on, immediate recursion, sources on
    /// - `max_dns_queries = 5000`
    /// - `resolve_timeout = 5s`, `http_timeout = 20s`
    /// - `stats_interval = 60s`, `active_window = 10s`, `idle_check_interval = 1s`
    /// - `grace = 10s`
    fn default() -> Self {
        Self {
            domains: Vec::new(),
            wordlist: Vec::new(),
            max_dns_queries: DEFAULT_MAX_DNS_QUERIES,
            brute_forcing: true,
            recursive: true,
            min_for_recursive: 0,
            sources_enabled: true,
            api_keys: HashMap::new(),
            resolve_timeout: Duration::from_secs(5),
            http_timeout: Duration::from_secs(20),
            stats_interval: Duration::from_secs(60),
            active_window: Duration::from_secs(10),
            idle_check_interval: Duration::from_secs(1),
            grace: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Adds a root domain (trimmed, lowercased, trailing dot removed). Duplicates are ignored.
    pub fn add_domain(&mut self, domain: &str) {
        let domain = normalize_name(domain);
        if !domain.is_empty() && !self.domains.contains(&domain) {
            self.domains.push(domain);
        }
    }

    /// Registers credentials for a source (name is case-insensitive).
    pub fn set_api_key(&mut self, source: &str, key: ApiKey) {
        self.api_keys.insert(source.to_lowercase(), key);
    }

    /// Credentials for a source, if configured.
    pub fn api_key(&self, source: &str) -> Option<&ApiKey> {
        self.api_keys.get(&source.to_lowercase())
    }

    /// The effective in-flight resolution ceiling.
    #[inline]
    pub fn dns_query_limit(&self) -> usize {
        if self.max_dns_queries == 0 {
            DEFAULT_MAX_DNS_QUERIES
        } else {
            self.max_dns_queries
        }
    }

    /// The per-query timeout as an `Option`.
    #[inline]
    pub fn query_timeout(&self) -> Option<Duration> {
        if self.resolve_timeout == Duration::ZERO {
            None
        } else {
            Some(self.resolve_timeout)
        }
    }

    /// The recursion policy, or `None` when recursion is disabled.
    #[inline]
    pub fn recursive_mode(&self) -> Option<RecursiveMode> {
        match (self.recursive, self.min_for_recursive) {
            (false, _) => None,
            (true, 0) => Some(RecursiveMode::Immediate),
            (true, n) => Some(RecursiveMode::Threshold(n)),
        }
    }

    /// True if `name` is one of the roots or below one of them.
    pub fn is_domain_in_scope(&self, name: &str) -> bool {
        self.root_domain_of(name).is_some()
    }

    /// The configured root `name` belongs to (the longest match wins).
    pub fn root_domain_of(&self, name: &str) -> Option<&str> {
        let name = normalize_name(name);
        self.domains
            .iter()
            .filter(|root| {
                name == **root
                    || (name.len() > root.len()
                        && name.ends_with(root.as_str())
                        && name.as_bytes()[name.len() - root.len() - 1] == b'.')
            })
            .max_by_key(|root| root.len())
            .map(String::as_str)
    }

    /// A regex matching subdomains of `domain` anywhere in a text.
    pub fn domain_regex(&self, domain: &str) -> Result<Regex, regex::Error> {
        subdomain_regex(domain)
    }
}

/// A regex matching subdomains of `domain` anywhere in a text.
pub fn subdomain_regex(domain: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("{SUBDOMAIN_LABELS}{}", regex::escape(domain)))
}

/// Trims, lowercases and strips the trailing dot of a DNS name.
pub fn normalize_name(name: &str) -> String {
    name.trim().trim_end_matches('.').to_lowercase()
}

/// Reads a wordlist: one entry per line, trimmed, blank lines and `#` comments skipped.
pub fn load_wordlist(path: impl AsRef<Path>) -> io::Result<Vec<String>> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_wordlist(&text))
}

fn parse_wordlist(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        let mut cfg = Config::default();
        cfg.add_domain("Example.COM.");
        cfg.add_domain("dev.example.com");
        cfg.add_domain("example.com");
        cfg
    }

    #[test]
    fn domains_are_normalized_and_unique() {
        assert_eq!(config().domains, vec!["example.com", "dev.example.com"]);
    }

    #[test]
    fn scope_requires_label_boundary() {
        let cfg = config();
        assert!(cfg.is_domain_in_scope("example.com"));
        assert!(cfg.is_domain_in_scope("WWW.example.com"));
        assert!(!cfg.is_domain_in_scope("badexample.com"));
        assert!(!cfg.is_domain_in_scope("example.org"));
        assert_eq!(cfg.root_domain_of("a.dev.example.com"), Some("dev.example.com"));
        assert_eq!(cfg.root_domain_of("mail.example.com"), Some("example.com"));
    }

    #[test]
    fn recursive_mode_sentinels() {
        let mut cfg = Config::default();
        assert_eq!(cfg.recursive_mode(), Some(RecursiveMode::Immediate));
        cfg.min_for_recursive = 3;
        assert_eq!(cfg.recursive_mode(), Some(RecursiveMode::Threshold(3)));
        cfg.recursive = false;
        assert_eq!(cfg.recursive_mode(), None);

        cfg.max_dns_queries = 0;
        assert_eq!(cfg.dns_query_limit(), DEFAULT_MAX_DNS_QUERIES);
        cfg.resolve_timeout = Duration::ZERO;
        assert_eq!(cfg.query_timeout(), None);
    }

    #[test]
    fn domain_regex_finds_subdomains_in_text() {
        let cfg = config();
        let re = cfg.domain_regex("example.com").unwrap();
        let page = r#"<td>api.example.com</td><td>A.B.Example.com</td><td>example.org</td>"#;
        let found: Vec<&str> = re.find_iter(page).map(|m| m.as_str()).collect();
        assert_eq!(found, vec!["api.example.com", "A.B.Example.com"]);
    }

    #[test]
    fn api_keys_are_case_insensitive() {
        let mut cfg = Config::default();
        cfg.set_api_key("Shodan", ApiKey::new("k"));
        assert!(cfg.api_key("shodan").unwrap().has_key());
        assert!(!cfg.api_key("SHODAN").unwrap().has_secret());
        assert!(cfg.api_key("censys").is_none());
    }

    #[test]
    fn wordlist_skips_blanks_and_comments() {
        let words = parse_wordlist("www\n\n# common\n  mail \nwww\n");
        assert_eq!(words, vec!["www", "mail", "www"]);
    }
}
