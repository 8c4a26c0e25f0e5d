use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;
use tracing::{Level, debug};

use crate::config::{DEFAULT_MAX_CNAME_DEPTH, ResolverConfig, Settings, parse_server};

#[derive(Parser, Debug)]
#[command(name = "subkill")]
#[command(version, about = "Brute-force subdomains against a DNS server", long_about = None)]
pub struct Cli {
    /// Target domain to enumerate
    #[arg(short, long, value_name = "DOMAIN")]
    pub domain: String,

    /// File containing subdomain labels (one per line)
    #[arg(short, long, value_name = "FILE")]
    pub wordlist: Option<PathBuf>,

    /// DNS server to query, host[:port]
    #[arg(short, long, value_name = "ADDR")]
    pub server: Option<String>,

    /// Number of concurrent workers
    #[arg(short = 't', long, value_name = "N")]
    pub workers: Option<usize>,

    /// Query timeout in seconds
    #[arg(long, default_value = "5", value_name = "SECS")]
    pub timeout: u64,

    /// Longest CNAME chain followed before a candidate is dropped
    #[arg(long, default_value_t = DEFAULT_MAX_CNAME_DEPTH, value_name = "N")]
    pub max_cname_depth: usize,

    /// Directory that receives one folder per run
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Name of the file found hostnames are appended to
    #[arg(long, value_name = "NAME")]
    pub file_name: Option<String>,

    /// Output format
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub output_format: OutputFormat,

    /// Show verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Only show warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Everything the binary needs for one run, after flags and environment
/// have been merged.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub config: ResolverConfig,
    pub out_dir: PathBuf,
    pub file_name: String,
    pub output_format: OutputFormat,
}

impl Cli {
    pub fn log_level(&self) -> Level {
        if self.verbose {
            Level::DEBUG
        } else if self.quiet {
            Level::WARN
        } else {
            Level::INFO
        }
    }

    /// Merges flags over `settings`; flags win.
    pub fn to_plan(&self, settings: &Settings) -> anyhow::Result<RunPlan> {
        let domain = self.domain.trim().trim_end_matches('.').to_lowercase();
        if !is_valid_domain(&domain) {
            anyhow::bail!("Invalid domain '{}'", self.domain);
        }

        let wordlist = self
            .wordlist
            .clone()
            .or_else(|| settings.wordlist.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("No wordlist given (use --wordlist or SUBKILL3R_WORDLIST)")
            })?;

        let server = match &self.server {
            Some(server) => parse_server(server)?,
            None => settings.server,
        };

        let workers = self.workers.unwrap_or(settings.worker_count);
        if workers == 0 {
            anyhow::bail!("Worker count must be at least 1");
        }

        let config = ResolverConfig::new(domain, wordlist, server, workers)
            .with_timeout(Duration::from_secs(self.timeout))
            .with_max_cname_depth(self.max_cname_depth);
        debug!("Resolved run configuration: {:?}", config);

        Ok(RunPlan {
            config,
            out_dir: self.out_dir.clone().unwrap_or_else(|| settings.out_dir.clone()),
            file_name: self.file_name.clone().unwrap_or_else(|| settings.file_name.clone()),
            output_format: self.output_format,
        })
    }
}

fn is_valid_domain(domain: &str) -> bool {
    if domain.is_empty() || domain.len() > 253 {
        return false;
    }

    if domain.starts_with('.') || domain.ends_with('.') {
        return false;
    }

    let mut label_chars = 0;
    for c in domain.chars() {
        if c == '.' {
            if label_chars == 0 {
                return false;
            }
            label_chars = 0;
        } else {
            if !(c.is_ascii_alphanumeric() || c == '-' || c == '_') {
                return false;
            }
            label_chars += 1;
            if label_chars > 63 {
                return false;
            }
        }
    }

    true
}
