use scopewatch_core::traits::Enumerator;
use scopewatch_core::{Error, Result};
use std::process::Stdio;
use tokio::process::Command;

use crate::stderr_excerpt;

/// Passive subdomain enumeration through `subfinder`
#[derive(Debug, Clone)]
pub struct SubfinderEnumerator {
    binary: String,
}

impl SubfinderEnumerator {
    /// Use `subfinder` from `PATH`
    pub fn new() -> Self {
        Self::with_binary("subfinder")
    }

    /// Use a specific executable
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for SubfinderEnumerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Enumerator for SubfinderEnumerator {
    async fn enumerate(&self, domain: &str) -> Result<Vec<String>> {
        tracing::debug!("Running {} for {}", self.binary, domain);

        let output = Command::new(&self.binary)
            .args(["-d", domain, "-silent"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::enumerate(format!("Failed to run {}: {}", self.binary, e)))?;

        if !output.status.success() {
            return Err(Error::enumerate(format!(
                "{} exited with {} for {}: {}",
                self.binary,
                output.status,
                domain,
                stderr_excerpt(&output.stderr)
            )));
        }

        let hosts = parse_subfinder_output(&output.stdout);
        tracing::debug!("{} found {} hostname(s) for {}", self.binary, hosts.len(), domain);
        Ok(hosts)
    }

    fn enumerator_name(&self) -> &'static str {
        "subfinder"
    }
}

/// Split subfinder's stdout into hostnames, dropping blank lines
pub fn parse_subfinder_output(stdout: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
