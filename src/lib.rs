//! Brute-force subdomain discovery against a single DNS server.
//!
//! Labels from a wordlist are qualified against a target domain and
//! resolved concurrently. CNAME chains are followed to their final target
//! while every finding keeps the name that was originally queried.

pub mod cli;
pub mod config;
pub mod error;
pub mod feeder;
pub mod lookup;
pub mod output;
pub mod scanner;
pub mod stage;

use std::path::Path;

pub use config::ResolverConfig;
pub use error::{LookupError, ScanError};
pub use lookup::{DnsLookup, Finding, Lookup, Resolver};
pub use scanner::{RunResult, SubdomainScanner};

/// Resolves `label.domain` for every line of `wordlist` using
/// `worker_count` concurrent workers against `server` (`host[:port]`).
///
/// Only a wordlist that can't be read, or a server that can't be parsed or
/// reached, is an error. Candidates that don't resolve are simply absent.
pub async fn resolve(
    domain: &str,
    wordlist: impl AsRef<Path>,
    server: &str,
    worker_count: usize,
) -> error::Result<Vec<Finding>> {
    let server = config::parse_server(server).map_err(|e| ScanError::InvalidServer {
        input: server.to_string(),
        reason: format!("{:#}", e),
    })?;
    let config = ResolverConfig::new(domain, wordlist.as_ref(), server, worker_count);
    let scanner = SubdomainScanner::new(config).await?;
    Ok(scanner.scan().await?.into_findings())
}
