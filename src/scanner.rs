//! Worker pool, aggregation and completion tracking for a brute-force run.
//!
//! Candidates flow from the [`CandidateFeeder`] through a bounded queue to
//! `worker_count` workers. Each worker forwards non-empty batches of
//! findings to a single aggregator task. Completion happens in two distinct
//! steps: the coordinator first joins every worker, only then closes the
//! result channel, and finally awaits the aggregator's own handle.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info};

use crate::config::ResolverConfig;
use crate::error::{Result, ScanError};
use crate::feeder::CandidateFeeder;
use crate::lookup::{DnsLookup, Finding, Lookup, Resolver};

/// Where the coordinator currently is in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Dispatching,
    Draining,
    Collecting,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Dispatching => "dispatching",
            Phase::Draining => "draining",
            Phase::Collecting => "collecting",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

/// What a worker did before the intake queue ran dry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerReport {
    pub id: usize,
    pub processed: usize,
    pub found: usize,
}

/// Everything a run produced. Arrival order of findings is unspecified.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunResult {
    pub findings: Vec<Finding>,
    pub candidates: usize,
    pub workers: Vec<WorkerReport>,
}

impl RunResult {
    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    /// Hostnames in arrival order. A name with several addresses appears once
    /// per address.
    pub fn hostnames(&self) -> Vec<&str> {
        self.findings.iter().map(|f| f.hostname.as_str()).collect()
    }

    pub fn into_findings(self) -> Vec<Finding> {
        self.findings
    }
}

type Queue = Arc<Mutex<mpsc::Receiver<String>>>;

pub struct SubdomainScanner<L> {
    config: ResolverConfig,
    resolver: Arc<Resolver<L>>,
}

impl SubdomainScanner<DnsLookup> {
    /// Scanner that queries `config.server` over the network.
    pub async fn new(config: ResolverConfig) -> Result<Self> {
        let lookup = DnsLookup::connect(config.server, config.timeout).await?;
        Ok(Self::with_lookup(config, lookup))
    }
}

impl<L: Lookup + 'static> SubdomainScanner<L> {
    pub fn with_lookup(config: ResolverConfig, lookup: L) -> Self {
        let resolver = Arc::new(Resolver::new(lookup, config.max_cname_depth));
        Self { config, resolver }
    }

    pub async fn scan(&self) -> Result<RunResult> {
        // Nothing is spawned until the wordlist is known to be readable.
        let feeder = CandidateFeeder::open(&self.config.wordlist, &self.config.domain).await?;
        let worker_count = self.config.worker_count.max(1);

        let (queue_tx, queue_rx) = mpsc::channel::<String>(worker_count);
        let queue: Queue = Arc::new(Mutex::new(queue_rx));
        let (results_tx, results_rx) = mpsc::unbounded_channel::<Vec<Finding>>();

        let aggregator: JoinHandle<RunResult> = tokio::spawn(aggregate(results_rx));

        let mut pool = JoinSet::new();
        for id in 0..worker_count {
            pool.spawn(work(id, self.resolver.clone(), queue.clone(), results_tx.clone()));
        }
        drop(queue);

        enter(Phase::Dispatching, &self.config);
        let candidates = match feeder.feed(queue_tx).await {
            Ok(count) => count,
            Err(e) => {
                pool.abort_all();
                aggregator.abort();
                return Err(e);
            }
        };

        enter(Phase::Draining, &self.config);
        let mut workers = Vec::with_capacity(worker_count);
        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(report) => workers.push(report),
                Err(e) => {
                    pool.abort_all();
                    aggregator.abort();
                    return Err(ScanError::Worker(e.to_string()));
                }
            }
        }
        debug_assert_eq!(workers.len(), worker_count);

        // Every worker has exited, so this is the last sender.
        drop(results_tx);

        enter(Phase::Collecting, &self.config);
        let mut result = aggregator
            .await
            .map_err(|e| ScanError::Worker(format!("aggregator: {}", e)))?;
        workers.sort_by_key(|w| w.id);
        result.candidates = candidates;
        result.workers = workers;

        enter(Phase::Done, &self.config);
        info!(
            domain = %self.config.domain,
            candidates,
            found = result.len(),
            "brute-force run finished"
        );
        Ok(result)
    }
}

fn enter(phase: Phase, config: &ResolverConfig) {
    debug!(domain = %config.domain, workers = config.worker_count, %phase, "phase change");
}

async fn work<L: Lookup>(
    id: usize,
    resolver: Arc<Resolver<L>>,
    queue: Queue,
    results: mpsc::UnboundedSender<Vec<Finding>>,
) -> WorkerReport {
    let mut report = WorkerReport {
        id,
        ..Default::default()
    };

    loop {
        let candidate = queue.lock().await.recv().await;
        let Some(candidate) = candidate else {
            break;
        };

        let findings = resolver.resolve(&candidate).await;
        report.processed += 1;

        if !findings.is_empty() {
            report.found += findings.len();
            if results.send(findings).is_err() {
                break;
            }
        }
    }

    report
}

async fn aggregate(mut results: mpsc::UnboundedReceiver<Vec<Finding>>) -> RunResult {
    let mut run = RunResult::default();
    while let Some(batch) = results.recv().await {
        run.findings.extend(batch);
    }
    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LookupError;
    use async_trait::async_trait;
    use std::io::Write;
    use std::net::Ipv4Addr;
    use tempfile::NamedTempFile;

    /// Every name whose first label starts with "hit" resolves to 192.0.2.1.
    struct Prefix;

    #[async_trait]
    impl Lookup for Prefix {
        async fn cname(&self, _name: &str) -> std::result::Result<Vec<String>, LookupError> {
            Err(LookupError::NoAnswer)
        }

        async fn a(&self, name: &str) -> std::result::Result<Vec<Ipv4Addr>, LookupError> {
            if name.starts_with("hit") {
                Ok(vec![Ipv4Addr::new(192, 0, 2, 1)])
            } else {
                Err(LookupError::NoAnswer)
            }
        }
    }

    fn wordlist(labels: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for label in labels {
            writeln!(file, "{}", label).unwrap();
        }
        file
    }

    fn scanner(file: &NamedTempFile, workers: usize) -> SubdomainScanner<Prefix> {
        let config = ResolverConfig::new(
            "example.com",
            file.path(),
            "127.0.0.1:53".parse().unwrap(),
            workers,
        );
        SubdomainScanner::with_lookup(config, Prefix)
    }

    #[tokio::test]
    async fn test_reports_account_for_every_candidate() {
        let file = wordlist(&["hit1", "miss", "hit2", "hit1", "other"]);
        let result = scanner(&file, 3).scan().await.unwrap();

        assert_eq!(result.candidates, 5);
        assert_eq!(result.workers.len(), 3);
        assert_eq!(result.workers.iter().map(|w| w.processed).sum::<usize>(), 5);
        assert_eq!(result.workers.iter().map(|w| w.found).sum::<usize>(), 3);
        assert_eq!(result.len(), 3);
    }

    #[tokio::test]
    async fn test_more_workers_than_candidates() {
        let file = wordlist(&["hit"]);
        let result = scanner(&file, 64).scan().await.unwrap();

        assert_eq!(result.workers.len(), 64);
        assert_eq!(result.hostnames(), vec!["hit.example.com"]);
    }

    #[tokio::test]
    async fn test_empty_wordlist() {
        let file = wordlist(&[]);
        let result = scanner(&file, 4).scan().await.unwrap();

        assert!(result.is_empty());
        assert_eq!(result.candidates, 0);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Dispatching.to_string(), "dispatching");
        assert_eq!(Phase::Done.to_string(), "done");
    }
}
