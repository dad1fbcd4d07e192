//! Concrete services.
//!
//! - [`BruteForceService`]: wordlist expansion of roots and confirmed subdomains.
//! - [`NameService`]: resolution of scraped names and subdomain discovery counts.
//!
//! Intelligence sources are services too; see [`crate::sources`].

mod brute;
mod names;

pub use brute::{BRUTE_FORCE_SOURCE, BruteForceService};
pub use names::{NameService, clean_name};
