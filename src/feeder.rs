use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Split};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{Result, ScanError};

/// Reads a wordlist line by line and qualifies every label against the
/// target domain.
///
/// Lines are used verbatim: no trimming, no comment syntax, no filtering of
/// blank lines. A blank line therefore becomes `".<domain>"`, which simply
/// fails to resolve later on. Bytes that are not valid UTF-8 are replaced
/// rather than rejected, so such a line is just another candidate that
/// won't resolve.
pub struct CandidateFeeder {
    path: PathBuf,
    domain: String,
    lines: Split<BufReader<File>>,
}

impl CandidateFeeder {
    pub async fn open(path: impl AsRef<Path>, domain: &str) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .await
            .map_err(|e| ScanError::wordlist(&path, e))?;

        Ok(Self {
            path,
            domain: domain.to_string(),
            lines: BufReader::new(file).split(b'\n'),
        })
    }

    /// Next candidate in file order, `None` once the wordlist is exhausted.
    pub async fn next_candidate(&mut self) -> Result<Option<String>> {
        let line = self
            .lines
            .next_segment()
            .await
            .map_err(|e| ScanError::wordlist(&self.path, e))?;

        Ok(line.map(|raw| {
            let label = raw.strip_suffix(b"\r").unwrap_or(&raw[..]);
            qualify(&String::from_utf8_lossy(label), &self.domain)
        }))
    }

    /// Publishes every candidate on `queue`, waiting whenever the queue is
    /// full. The queue is closed when `self` and `queue` are dropped on return.
    pub async fn feed(mut self, queue: mpsc::Sender<String>) -> Result<usize> {
        let mut published = 0;

        while let Some(candidate) = self.next_candidate().await? {
            queue.send(candidate).await.map_err(|_| {
                ScanError::Worker("candidate queue closed before the wordlist was exhausted".into())
            })?;
            published += 1;
        }

        debug!(path = %self.path.display(), published, "wordlist exhausted");
        Ok(published)
    }
}

/// Forms the fully qualified candidate `label.domain`.
pub fn qualify(label: &str, domain: &str) -> String {
    format!("{}.{}", label, domain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    #[test]
    fn test_qualify() {
        assert_eq!(qualify("www", "example.com"), "www.example.com");
        assert_eq!(qualify("", "example.com"), ".example.com");
    }

    #[tokio::test]
    async fn test_candidates_in_file_order() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "www").unwrap();
        writeln!(file, "mail").unwrap();
        writeln!(file, "").unwrap();
        writeln!(file, "www").unwrap();
        write!(file, "dev").unwrap();

        let mut feeder = CandidateFeeder::open(file.path(), "example.com").await.unwrap();
        let mut candidates = Vec::new();
        while let Some(candidate) = feeder.next_candidate().await.unwrap() {
            candidates.push(candidate);
        }

        assert_eq!(
            candidates,
            vec![
                "www.example.com",
                "mail.example.com",
                ".example.com",
                "www.example.com",
                "dev.example.com",
            ]
        );
    }

    #[tokio::test]
    async fn test_feed_drains_into_small_queue() {
        let mut file = NamedTempFile::new().unwrap();
        for label in ["a", "b", "c", "d"] {
            writeln!(file, "{}", label).unwrap();
        }

        let feeder = CandidateFeeder::open(file.path(), "example.com").await.unwrap();
        let (tx, mut rx) = mpsc::channel(1);
        let handle = tokio::spawn(feeder.feed(tx));

        let mut received = Vec::new();
        while let Some(candidate) = rx.recv().await {
            received.push(candidate);
        }

        assert_eq!(handle.await.unwrap().unwrap(), 4);
        assert_eq!(received.len(), 4);
        assert_eq!(received[3], "d.example.com");
    }

    #[tokio::test]
    async fn test_feed_blocks_on_full_queue() {
        let mut file = NamedTempFile::new().unwrap();
        for label in ["a", "b", "c"] {
            writeln!(file, "{}", label).unwrap();
        }

        let feeder = CandidateFeeder::open(file.path(), "example.com").await.unwrap();
        let (tx, mut rx) = mpsc::channel(1);

        let fed = tokio::time::timeout(Duration::from_millis(300), feeder.feed(tx)).await;
        assert!(fed.is_err(), "feed returned although nobody read the queue");

        assert_eq!(rx.recv().await.as_deref(), Some("a.example.com"));
    }

    #[tokio::test]
    async fn test_undecodable_and_crlf_lines_are_candidates() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"www\r\ncaf\xe9\nmail\n").unwrap();

        let mut feeder = CandidateFeeder::open(file.path(), "example.com").await.unwrap();
        let mut candidates = Vec::new();
        while let Some(candidate) = feeder.next_candidate().await.unwrap() {
            candidates.push(candidate);
        }

        assert_eq!(
            candidates,
            vec!["www.example.com", "caf\u{FFFD}.example.com", "mail.example.com"]
        );
    }

    #[tokio::test]
    async fn test_missing_wordlist_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.txt");

        let err = CandidateFeeder::open(&missing, "example.com").await.err().unwrap();
        assert!(matches!(err, ScanError::Wordlist { .. }));
    }
}
