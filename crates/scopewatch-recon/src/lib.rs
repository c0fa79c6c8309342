// # Recon Adapters
//
// This crate provides subdomain enumeration and HTTP probing for scopewatch
// by driving two ProjectDiscovery command line tools.
//
// - [`SubfinderEnumerator`]: `subfinder -d <domain> -silent`, one hostname
//   per stdout line
// - [`HttpxProber`]: `httpx -json ...`, hostnames on stdin, one JSON object
//   per stdout line
//
// ## Platform Support
//
// Both tools must be installed and reachable through `PATH` (or given as an
// absolute path). A missing binary surfaces as an enumeration or probe
// error on the first cycle, not at startup.
//
// Child processes are killed when the future driving them is dropped, so a
// timed-out or aborted cycle does not leave tools running.

mod httpx;
mod subfinder;

pub use httpx::{HttpxProber, parse_httpx_line};
pub use subfinder::{SubfinderEnumerator, parse_subfinder_output};

/// Keep the tail of a tool's stderr for error messages
fn stderr_excerpt(stderr: &[u8]) -> String {
    const MAX: usize = 512;

    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= MAX {
        return text.to_string();
    }

    let mut start = text.len() - MAX;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}
