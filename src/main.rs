use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use subvisor::{ApiKey, Config, DEFAULT_MAX_DNS_QUERIES, Enumeration, load_wordlist};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Subdomain enumeration by brute forcing and intelligence sources.
#[derive(Parser, Debug)]
#[command(name = "subvisor", version, about)]
struct Args {
    /// Root domain to enumerate (repeatable).
    #[arg(short = 'd', long = "domain", required = true)]
    domains: Vec<String>,

    /// Wordlist for brute forcing, one label per line.
    #[arg(short, long)]
    wordlist: Option<PathBuf>,

    /// Disable brute forcing.
    #[arg(long)]
    no_brute: bool,

    /// Disable recursive brute forcing of discovered subdomains.
    #[arg(long)]
    no_recursive: bool,

    /// Discoveries needed before a subdomain is brute forced (0 = immediately).
    #[arg(long, default_value_t = 0)]
    min_for_recursive: usize,

    /// Ceiling of concurrent brute-force resolutions.
    #[arg(long, default_value_t = DEFAULT_MAX_DNS_QUERIES)]
    max_dns_queries: usize,

    /// Disable intelligence sources.
    #[arg(long)]
    no_sources: bool,

    /// Source credentials (repeatable).
    #[arg(long = "api-key", value_name = "NAME=KEY[:SECRET]", value_parser = parse_api_key)]
    api_keys: Vec<(String, ApiKey)>,

    /// Also write the discovered names to this file.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print one JSON object per discovered name.
    #[arg(long)]
    json: bool,
}

impl Args {
    fn config(&self) -> Result<Config> {
        let mut cfg = Config::default();
        for domain in &self.domains {
            cfg.add_domain(domain);
        }
        if cfg.domains.is_empty() {
            bail!("no usable root domain given");
        }

        if let Some(path) = &self.wordlist {
            cfg.wordlist = load_wordlist(path)
                .with_context(|| format!("reading wordlist {}", path.display()))?;
        } else if !self.no_brute {
            warn!("no wordlist given, brute forcing has nothing to try");
        }
        cfg.brute_forcing = !self.no_brute;
        cfg.recursive = !self.no_recursive;
        cfg.min_for_recursive = self.min_for_recursive;
        cfg.max_dns_queries = self.max_dns_queries;
        cfg.sources_enabled = !self.no_sources;
        for (name, key) in &self.api_keys {
            cfg.set_api_key(name, key.clone());
        }
        Ok(cfg)
    }
}

fn parse_api_key(raw: &str) -> Result<(String, ApiKey), String> {
    let (name, creds) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=KEY[:SECRET], got {raw:?}"))?;
    let key = match creds.split_once(':') {
        Some((key, secret)) => ApiKey::new(key).with_secret(secret),
        None => ApiKey::new(creds),
    };
    if name.is_empty() || !key.has_key() {
        return Err(format!("expected NAME=KEY[:SECRET], got {raw:?}"));
    }
    Ok((name.to_string(), key))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "subvisor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let cfg = args.config()?;

    let run = Enumeration::builder(cfg).build()?;
    let mut found = run.output().context("result stream already taken")?;
    let json = args.json;
    let printer = tokio::spawn(async move {
        while let Some(req) = found.recv().await {
            if !json {
                println!("{}", req.name);
                continue;
            }
            match serde_json::to_string(&*req) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(name = %req.name, error = %e, "result not serializable"),
            }
        }
    });

    let results = run.run().await?;
    printer.await?;

    for stats in run.stats() {
        info!(
            service = %stats.service,
            total_queries = stats.total_queries,
            queries_per_sec = %format!("{:.1}", stats.queries_per_sec),
            "final stats"
        );
    }

    if let Some(path) = &args.output {
        let mut text = String::new();
        for req in &results {
            text.push_str(&req.name);
            text.push('\n');
        }
        std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    }
    info!(found = results.len(), "enumeration finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_keys_parse_with_and_without_secret() {
        let (name, key) = parse_api_key("shodan=abc").unwrap();
        assert_eq!(name, "shodan");
        assert_eq!(key, ApiKey::new("abc"));

        let (name, key) = parse_api_key("Censys=id:secret").unwrap();
        assert_eq!(name, "Censys");
        assert!(key.has_secret());

        assert!(parse_api_key("shodan").is_err());
        assert!(parse_api_key("=abc").is_err());
        assert!(parse_api_key("shodan=").is_err());
    }

    #[test]
    fn flags_fill_the_config() {
        let args = Args::parse_from([
            "subvisor",
            "-d",
            "Example.com.",
            "--domain",
            "example.org",
            "--no-sources",
            "--min-for-recursive",
            "3",
            "--api-key",
            "censys=id:secret",
        ]);
        let cfg = args.config().unwrap();
        assert_eq!(cfg.domains, vec!["example.com", "example.org"]);
        assert!(!cfg.sources_enabled);
        assert!(cfg.brute_forcing);
        assert_eq!(cfg.min_for_recursive, 3);
        assert!(cfg.api_key("Censys").is_some_and(ApiKey::has_secret));
    }
}
