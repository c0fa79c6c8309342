use scopewatch_core::model::ProbeResult;
use scopewatch_core::traits::Prober;
use scopewatch_core::{Error, Result};
use serde::Deserialize;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::stderr_excerpt;

/// Flags passed to every httpx run
const HTTPX_ARGS: &[&str] = &[
    "-json",
    "-silent",
    "-probe",
    "-title",
    "-tech-detect",
    "-follow-redirects",
    "-status-code",
];

/// Batch HTTP probing through `httpx`
#[derive(Debug, Clone)]
pub struct HttpxProber {
    binary: String,
}

impl HttpxProber {
    /// Use `httpx` from `PATH`
    pub fn new() -> Self {
        Self::with_binary("httpx")
    }

    /// Use a specific executable
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for HttpxProber {
    fn default() -> Self {
        Self::new()
    }
}

/// The subset of an httpx JSON line we care about
#[derive(Debug, Deserialize)]
struct HttpxLine {
    #[serde(default)]
    input: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    tech: Vec<String>,
    #[serde(default)]
    words: u64,
    #[serde(default)]
    chain_status_codes: Vec<u16>,
    #[serde(default)]
    status_code: u16,
    #[serde(default)]
    failed: bool,
}

/// Parse one line of `httpx -json` output
///
/// Returns `None` for lines that are not JSON objects. A line for a host
/// that could not be reached yields a result with `succeeded = false`.
pub fn parse_httpx_line(line: &str) -> Option<ProbeResult> {
    let parsed: HttpxLine = serde_json::from_str(line.trim()).ok()?;

    let status_codes = if !parsed.chain_status_codes.is_empty() {
        parsed.chain_status_codes.iter().map(u16::to_string).collect()
    } else if parsed.status_code != 0 {
        vec![parsed.status_code.to_string()]
    } else {
        Vec::new()
    };

    Some(ProbeResult {
        input: parsed.input,
        url: parsed.url,
        title: parsed.title,
        technologies: parsed.tech,
        status_codes,
        word_count: parsed.words,
        succeeded: !parsed.failed,
    })
}

#[async_trait::async_trait]
impl Prober for HttpxProber {
    async fn probe(&self, hostnames: &[String]) -> Result<Vec<ProbeResult>> {
        if hostnames.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!("Running {} over {} host(s)", self.binary, hostnames.len());

        let mut child = Command::new(&self.binary)
            .args(HTTPX_ARGS)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::probe(format!("Failed to run {}: {}", self.binary, e)))?;

        // Feed stdin concurrently so a full stdout pipe cannot deadlock us
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::probe("httpx stdin was not captured"))?;
        let input = hostnames.join("\n") + "\n";
        let writer = tokio::spawn(async move {
            let result = stdin.write_all(input.as_bytes()).await;
            drop(stdin);
            result
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::probe(format!("Failed to wait for {}: {}", self.binary, e)))?;

        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Writing hostnames to {} failed: {}", self.binary, e),
            Err(e) => tracing::warn!("Hostname writer task failed: {}", e),
        }

        if !output.status.success() {
            return Err(Error::probe(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                stderr_excerpt(&output.stderr)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut results = Vec::new();
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            match parse_httpx_line(line) {
                Some(result) => results.push(result),
                None => tracing::warn!("Skipping unparsable {} line: {}", self.binary, line),
            }
        }

        tracing::debug!("{} returned {} result(s)", self.binary, results.len());
        Ok(results)
    }

    fn prober_name(&self) -> &'static str {
        "httpx"
    }
}
