use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a whole brute-force run.
///
/// Failures for a single candidate (timeouts, NXDOMAIN, empty answers) are
/// never represented here; they only shrink the result set.
#[derive(Error, Debug)]
pub enum ScanError {
    /// The wordlist could not be opened or a line could not be read
    #[error("failed to read wordlist {}: {source}", path.display())]
    Wordlist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The DNS server address could not be parsed or resolved
    #[error("invalid DNS server '{input}': {reason}")]
    InvalidServer { input: String, reason: String },

    /// No DNS transport could be set up towards the server
    #[error("failed to connect to DNS server {server}: {reason}")]
    Connect { server: SocketAddr, reason: String },

    /// A worker task panicked or was cancelled
    #[error("worker task failed: {0}")]
    Worker(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Why a single DNS query produced nothing. Absorbed by the resolver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("invalid name '{0}'")]
    InvalidName(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("no answer")]
    NoAnswer,
}

impl ScanError {
    pub(crate) fn wordlist(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ScanError::Wordlist {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
