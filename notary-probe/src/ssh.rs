//! SSH host-key fingerprinting via `ssh-keyscan` + `ssh-keygen -lf`,
//! mirroring the original Python implementation's `ssh_scan.py`: the
//! notary shells out rather than speaking the SSH transport protocol
//! itself, since `ssh-keygen` already knows how to hash every key type a
//! host offers.

use crate::error::ProbeError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

/// Key types probed, in the order `ssh_scan.py` tries them.
const KEY_TYPES: &[&str] = &["rsa", "dsa", "rsa1"];

static FINGERPRINT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-f0-9]{2}(:[a-f0-9]{2}){15}$").unwrap());

/// Probe `host:port` for an SSH host key fingerprint. Tries each key type
/// in turn and returns the first one the host offers.
pub async fn probe_ssh_fingerprint(
    host: &str,
    port: u16,
    timeout_sec: u64,
) -> Result<String, ProbeError> {
    let deadline = Duration::from_secs(timeout_sec);

    for key_type in KEY_TYPES {
        match timeout(deadline, fingerprint_for_key_type(host, port, key_type)).await {
            Ok(Ok(Some(fp))) => return Ok(fp),
            Ok(Ok(None)) => continue,
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(ProbeError::Timeout),
        }
    }

    Err(ProbeError::Other(format!(
        "no SSH host key found for {host}:{port}"
    )))
}

async fn fingerprint_for_key_type(
    host: &str,
    port: u16,
    key_type: &str,
) -> Result<Option<String>, ProbeError> {
    let scan = Command::new("ssh-keyscan")
        .args(["-t", key_type, "-p", &port.to_string(), host])
        .output()
        .await
        .map_err(|e| ProbeError::Other(format!("failed to spawn ssh-keyscan: {e}")))?;

    if !scan.status.success() || scan.stdout.is_empty() {
        return Ok(None);
    }

    let keygen_stdout = pipe_through_ssh_keygen(&scan.stdout).await?;
    parse_fingerprint_from_keygen_output(&String::from_utf8_lossy(&keygen_stdout))
}

async fn pipe_through_ssh_keygen(key_line: &[u8]) -> Result<Vec<u8>, ProbeError> {
    let mut child = Command::new("ssh-keygen")
        .args(["-lf", "-"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| ProbeError::Other(format!("failed to spawn ssh-keygen: {e}")))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(key_line)
            .await
            .map_err(|e| ProbeError::Other(format!("failed writing to ssh-keygen: {e}")))?;
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| ProbeError::Other(format!("ssh-keygen failed: {e}")))?;
    Ok(output.stdout)
}

/// `ssh-keygen -lf` prints lines like:
/// `2048 SHA256:abcd... host (RSA)` on modern builds, or the legacy
/// `2048 aa:bb:cc:...:ff host (RSA)` colon-hex form on older ones. The
/// notary wire format needs the legacy colon-hex MD5 form to stay
/// byte-compatible with `notary_signer`'s fingerprint packing, so only
/// the colon-hex form is accepted; hosts that only yield a SHA256-form
/// fingerprint are treated as not offering a usable key.
fn parse_fingerprint_from_keygen_output(output: &str) -> Result<Option<String>, ProbeError> {
    for line in output.lines() {
        for token in line.split_whitespace() {
            if FINGERPRINT_RE.is_match(token) {
                return Ok(Some(token.to_lowercase()));
            }
        }
    }
    Ok(None)
}
