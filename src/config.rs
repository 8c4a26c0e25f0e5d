use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};

pub const DEFAULT_SERVER: &str = "8.8.8.8:53";
pub const DEFAULT_WORKER_COUNT: usize = 1000;
pub const DEFAULT_FILE_NAME: &str = "subdomains.txt";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_CNAME_DEPTH: usize = 10;

/// Parameters of a single brute-force run. Not modified once the run starts.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub domain: String,
    pub wordlist: PathBuf,
    pub server: SocketAddr,
    pub worker_count: usize,
    pub timeout: Duration,
    pub max_cname_depth: usize,
}

impl ResolverConfig {
    pub fn new(
        domain: impl Into<String>,
        wordlist: impl Into<PathBuf>,
        server: SocketAddr,
        worker_count: usize,
    ) -> Self {
        Self {
            domain: domain.into(),
            wordlist: wordlist.into(),
            server,
            worker_count: worker_count.max(1),
            timeout: DEFAULT_TIMEOUT,
            max_cname_depth: DEFAULT_MAX_CNAME_DEPTH,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_cname_depth(mut self, depth: usize) -> Self {
        self.max_cname_depth = depth;
        self
    }
}

/// Defaults for the command line, read from `SUBKILL3R_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub out_dir: PathBuf,
    pub file_name: String,
    pub wordlist: Option<PathBuf>,
    pub server: SocketAddr,
    pub worker_count: usize,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup, so tests don't have to
    /// touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let out_dir = match get("SUBKILL3R_OUT_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => default_out_dir(lookup("HOME")),
        };

        let server = match get("SUBKILL3R_SERVER_ADDR") {
            Some(addr) => parse_server(&addr).context("invalid SUBKILL3R_SERVER_ADDR")?,
            None => parse_server(DEFAULT_SERVER)?,
        };

        let worker_count = match get("SUBKILL3R_WORKER_COUNT") {
            Some(count) => count
                .trim()
                .parse::<usize>()
                .with_context(|| format!("invalid SUBKILL3R_WORKER_COUNT '{}'", count))?,
            None => DEFAULT_WORKER_COUNT,
        };

        Ok(Self {
            out_dir,
            file_name: get("SUBKILL3R_FILE_NAME").unwrap_or_else(|| DEFAULT_FILE_NAME.to_string()),
            wordlist: get("SUBKILL3R_WORDLIST").map(PathBuf::from),
            server,
            worker_count,
        })
    }
}

fn default_out_dir(home: Option<String>) -> PathBuf {
    match home {
        Some(home) if !home.is_empty() => PathBuf::from(home).join("r3conwhal3").join("results"),
        _ => PathBuf::from("results"),
    }
}

/// Parses a DNS server address. A missing port defaults to 53 and host
/// names are resolved through the system resolver.
pub fn parse_server(input: &str) -> anyhow::Result<SocketAddr> {
    let input = input.trim();

    if let Ok(addr) = SocketAddr::from_str(input) {
        return Ok(addr);
    }
    if let Ok(ip) = IpAddr::from_str(input.trim_start_matches('[').trim_end_matches(']')) {
        return Ok(SocketAddr::new(ip, 53));
    }

    let candidate = if input.contains(':') {
        input.to_string()
    } else {
        format!("{}:53", input)
    };

    candidate
        .to_socket_addrs()
        .with_context(|| format!("cannot resolve DNS server '{}'", input))?
        .next()
        .ok_or_else(|| anyhow!("DNS server '{}' has no address", input))
}
