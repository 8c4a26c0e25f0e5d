use std::collections::HashSet;
use std::path::Path;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::lookup::Lookup;
use crate::output;
use crate::scanner::{RunResult, SubdomainScanner};

/// Outcome of one enumeration stage. Callers add these up themselves.
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub name: &'static str,
    /// Distinct hostnames that resolved
    pub found: usize,
    /// Resolved (hostname, address) pairs
    pub addresses: usize,
    pub new_lines: usize,
    #[serde(with = "millis")]
    pub elapsed: Duration,
}

/// Runs the brute-force scanner and appends every resolved hostname to
/// `out_file`.
pub async fn run_bruteforce<L: Lookup + 'static>(
    scanner: &SubdomainScanner<L>,
    out_file: &Path,
) -> Result<(StageReport, RunResult)> {
    const NAME: &str = "subkill3r";

    info!("Running {}", NAME);
    let started = Instant::now();

    let result = scanner.scan().await?;

    let before = output::count_lines(out_file).unwrap_or_else(|e| {
        warn!("Failed to measure {}: {}", out_file.display(), e);
        0
    });
    output::append_hostnames(out_file, &result.findings)?;
    let after = output::count_lines(out_file).unwrap_or_else(|e| {
        warn!("Failed to measure {}: {}", out_file.display(), e);
        before
    });

    let report = StageReport {
        name: NAME,
        found: result.hostnames().into_iter().collect::<HashSet<_>>().len(),
        addresses: result.len(),
        new_lines: after.saturating_sub(before),
        elapsed: started.elapsed(),
    };
    info!("{} new subdomain found!", report.new_lines);
    info!("{} completed in {:?}", NAME, report.elapsed);

    Ok((report, result))
}

mod millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolverConfig;
    use crate::error::LookupError;
    use async_trait::async_trait;
    use std::io::Write;
    use std::net::Ipv4Addr;

    struct Everything;

    #[async_trait]
    impl Lookup for Everything {
        async fn cname(&self, _name: &str) -> std::result::Result<Vec<String>, LookupError> {
            Ok(Vec::new())
        }

        async fn a(&self, _name: &str) -> std::result::Result<Vec<Ipv4Addr>, LookupError> {
            Ok(vec![Ipv4Addr::LOCALHOST, Ipv4Addr::new(127, 0, 0, 2)])
        }
    }

    #[tokio::test]
    async fn test_stage_appends_and_counts_new_lines() {
        let dir = tempfile::tempdir().unwrap();
        let words = dir.path().join("words.txt");
        let mut file = std::fs::File::create(&words).unwrap();
        writeln!(file, "www").unwrap();
        writeln!(file, "api").unwrap();

        let out = dir.path().join("subdomains.txt");
        std::fs::write(&out, "old.example.com\n").unwrap();

        let config = ResolverConfig::new("example.com", &words, "127.0.0.1:53".parse().unwrap(), 2);
        let scanner = SubdomainScanner::with_lookup(config, Everything);

        let (report, result) = run_bruteforce(&scanner, &out).await.unwrap();

        assert_eq!(report.name, "subkill3r");
        assert_eq!(report.found, 2);
        assert_eq!(report.addresses, 4);
        assert_eq!(report.new_lines, 4);
        assert_eq!(result.candidates, 2);
        assert_eq!(output::count_lines(&out).unwrap(), 5);
    }

    #[tokio::test]
    async fn test_failed_scan_leaves_no_run_dir() {
        let dir = tempfile::tempdir().unwrap();
        let run_dir = dir.path().join("example.com_20240309_140501");
        let out = run_dir.join("subdomains.txt");

        let config = ResolverConfig::new(
            "example.com",
            dir.path().join("missing.txt"),
            "127.0.0.1:53".parse().unwrap(),
            2,
        );
        let scanner = SubdomainScanner::with_lookup(config, Everything);

        assert!(run_bruteforce(&scanner, &out).await.is_err());
        assert!(!run_dir.exists());
    }
}
