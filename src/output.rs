use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::lookup::Finding;

/// Folder of a run, `<base>/<domain>_<YYYYMMDD_HHMMSS>`. Nothing is created
/// on disk until results are written into it.
pub fn run_dir(base: &Path, domain: &str, now: DateTime<Local>) -> PathBuf {
    base.join(format!("{}_{}", domain, now.format("%Y%m%d_%H%M%S")))
}

/// Appends one hostname per finding, creating the file and its parent
/// directories when needed.
pub fn append_hostnames(path: &Path, findings: &[Finding]) -> std::io::Result<usize> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = BufWriter::new(file);

    for finding in findings {
        writeln!(writer, "{}", finding.hostname)?;
    }
    writer.flush()?;

    Ok(findings.len())
}

/// Number of lines in `path`. A missing file counts as empty.
pub fn count_lines(path: &Path) -> std::io::Result<usize> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut count = 0;
    for line in BufReader::new(file).lines() {
        line?;
        count += 1;
    }
    Ok(count)
}

/// Rewrites `path` keeping only the first occurrence of every line and
/// returns how many lines remain.
pub fn dedup_lines(path: &Path) -> std::io::Result<usize> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();

    for line in BufReader::new(File::open(path)?).lines() {
        let line = line?;
        if seen.insert(line.clone()) {
            unique.push(line);
        }
    }

    let mut writer = BufWriter::new(File::create(path)?);
    for line in &unique {
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;

    Ok(unique.len())
}
