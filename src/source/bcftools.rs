use std::io::{self, BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use tracing::debug;

use crate::core::record::ShardRecord;
use crate::core::types::Region;
use crate::parsing::rows::{parse_row, ROW_FORMAT};
use crate::source::{RecordSource, RecordStream, SourceError};

/// Bytes of `bcftools` stderr kept for error reports; the rest is discarded
pub const STDERR_LIMIT: usize = 64 * 1024;

/// Region queries answered by an external `bcftools` process.
///
/// The file must be indexed (`.tbi`/`.csi`). Output rows follow
/// [`ROW_FORMAT`] and are parsed as they arrive.
#[derive(Debug, Clone)]
pub struct BcftoolsSource {
    binary: PathBuf,
    location: String,
}

impl BcftoolsSource {
    pub fn new(binary: impl Into<PathBuf>, location: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            location: location.into(),
        }
    }

    fn program(&self) -> String {
        self.binary.display().to_string()
    }
}

impl RecordSource for BcftoolsSource {
    fn location(&self) -> &str {
        &self.location
    }

    fn stream(&self, region: &Region) -> Result<RecordStream<'_>, SourceError> {
        let region_arg = region.to_string();
        debug!(
            "Running {} query --regions {} {}",
            self.program(),
            region_arg,
            self.location
        );

        let mut child = Command::new(&self.binary)
            .args(["query", "--regions", &region_arg, "--format", ROW_FORMAT, "--"])
            .arg(&self.location)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SourceError::Spawn {
                program: self.program(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or_else(|| SourceError::Spawn {
            program: self.program(),
            source: io::Error::other("stdout was not captured"),
        })?;
        let stderr = child.stderr.take().map(drain_stderr);

        Ok(Box::new(QueryRows {
            program: self.program(),
            lines: BufReader::new(stdout).lines().enumerate(),
            child: Some(child),
            stderr,
        }))
    }
}

/// Read stderr to the end on its own thread so a chatty child never blocks
/// on a full pipe while stdout is being consumed.
fn drain_stderr(mut pipe: ChildStderr) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut kept = Vec::new();
        let _ = pipe.by_ref().take(STDERR_LIMIT as u64).read_to_end(&mut kept);
        let _ = io::copy(&mut pipe, &mut io::sink());
        String::from_utf8_lossy(&kept).into_owned()
    })
}

/// Rows of a running query; reaps the child when the output ends
struct QueryRows {
    program: String,
    lines: std::iter::Enumerate<io::Lines<BufReader<ChildStdout>>>,
    child: Option<Child>,
    stderr: Option<JoinHandle<String>>,
}

impl QueryRows {
    fn finish(&mut self) -> Option<SourceError> {
        let mut child = self.child.take()?;
        let status = match child.wait() {
            Ok(status) => status,
            Err(e) => return Some(e.into()),
        };
        if status.success() {
            return None;
        }
        let stderr = self
            .stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        Some(SourceError::ProcessFailed {
            program: self.program.clone(),
            status,
            stderr: stderr.trim().to_string(),
        })
    }
}

impl Iterator for QueryRows {
    type Item = Result<ShardRecord, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.child.as_ref()?;
        match self.lines.next() {
            Some((i, Ok(line))) => Some(parse_row(&line, i + 1)),
            Some((_, Err(e))) => Some(Err(e.into())),
            None => self.finish().map(Err),
        }
    }
}

impl Drop for QueryRows {
    fn drop(&mut self) {
        // Stream abandoned early (existence found or cancelled)
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary() {
        let source = BcftoolsSource::new("/nonexistent/bcftools", "file.vcf.gz");
        let result = source.stream(&Region::new("1", 1, 10));
        assert!(matches!(result, Err(SourceError::Spawn { .. })));
    }

    /// Write an executable shell script standing in for `bcftools`
    #[cfg(unix)]
    fn fake_bcftools(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("bcftools");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("Failed to write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("Failed to make script executable");
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_noisy_stderr_does_not_stall_rows() {
        let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        // Well past the pipe buffer before any row is printed
        let script = fake_bcftools(
            &dir,
            "head -c 300000 /dev/zero | tr '\\0' w >&2\nprintf '100\\tA\\tT\\t.\\t0/1,\\n'",
        );

        let source = BcftoolsSource::new(script, "calls.vcf.gz");
        let records: Vec<_> = source
            .stream(&Region::new("1", 1, 1000))
            .expect("Process should start")
            .collect::<Result<_, _>>()
            .expect("Rows should parse");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].position, 100);
    }

    #[cfg(unix)]
    #[test]
    fn test_failure_keeps_bounded_stderr() {
        let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let script = fake_bcftools(&dir, "head -c 300000 /dev/zero | tr '\\0' w >&2\nexit 3");

        let source = BcftoolsSource::new(script, "calls.vcf.gz");
        let results: Vec<_> = source
            .stream(&Region::new("1", 1, 1000))
            .expect("Process should start")
            .collect();
        assert_eq!(results.len(), 1);
        match &results[0] {
            Err(SourceError::ProcessFailed { stderr, .. }) => {
                assert_eq!(stderr.len(), STDERR_LIMIT);
                assert!(stderr.chars().all(|c| c == 'w'));
            }
            other => panic!("expected a process failure, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_location_follows_option_terminator() {
        let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        // Print the last two arguments as a row: "--" then the location
        let script = fake_bcftools(
            &dir,
            "for a; do prev=$last; last=$a; done\nprintf '1\\t%s\\t%s\\t.\\t\\n' \"$prev\" \"$last\"",
        );

        let source = BcftoolsSource::new(script, "calls.vcf.gz");
        let records: Vec<_> = source
            .stream(&Region::new("1", 1, 1000))
            .expect("Process should start")
            .collect::<Result<_, _>>()
            .expect("Row should parse");
        assert_eq!(records[0].reference, "--");
        assert_eq!(records[0].alternates, vec!["calls.vcf.gz"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_process() {
        let source = BcftoolsSource::new("false", "ignored.vcf.gz");
        let results: Vec<_> = source.stream(&Region::new("1", 1, 10)).unwrap().collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(SourceError::ProcessFailed { .. })));
    }
}
