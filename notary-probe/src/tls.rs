//! TLS certificate-fingerprint probing, grounded in the original Python
//! implementation's `ssl_scan_sock.py`: open a raw TCP connection, send
//! a `ClientHello`, read records until the `Certificate` message shows
//! up, then MD5-fingerprint the leaf certificate.
//!
//! A full TLS stack such as `tokio_rustls` needs a validated, usable
//! session; the notary only needs to see what certificate a host
//! presents, so this module speaks just enough of the record layer to
//! read the `Certificate` message off the wire, the way
//! `ssl_scan_sock.py` does with a raw socket.

use crate::error::ProbeError;
use crate::tls_record::{build_client_hello, RecordAssembler, RecordEvent};
use md5::{Digest, Md5};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

const READ_CHUNK: usize = 4096;

/// Probe `host:port` for its TLS certificate fingerprint.
///
/// When `sni` is true, the `ClientHello` carries an SNI extension for
/// `host`; on a TLS alert the probe falls back to a second attempt
/// without SNI (some older or misconfigured servers reject unexpected
/// `server_name` extensions outright).
pub async fn probe_tls_fingerprint(
    host: &str,
    port: u16,
    timeout_sec: u64,
    sni: bool,
) -> Result<String, ProbeError> {
    let deadline = Duration::from_secs(timeout_sec);

    match timeout(deadline, attempt(host, port, sni)).await {
        Ok(result) => match result {
            Ok(fp) => Ok(fp),
            Err(ProbeError::TlsAlert { level, code }) if sni => {
                tracing::debug!(host, port, level, code, "SNI hello alerted, retrying without SNI");
                timeout(deadline, attempt(host, port, false))
                    .await
                    .map_err(|_| ProbeError::Timeout)?
            }
            Err(e) => Err(e),
        },
        Err(_) => Err(ProbeError::Timeout),
    }
}

async fn attempt(host: &str, port: u16, sni: bool) -> Result<String, ProbeError> {
    let mut stream = TcpStream::connect((host, port))
        .await
        .map_err(|e| ProbeError::from_io_error(&e))?;

    let hello = build_client_hello(sni.then_some(host));
    stream
        .write_all(&hello)
        .await
        .map_err(|e| ProbeError::from_io_error(&e))?;

    let mut assembler = RecordAssembler::new();
    let mut buf = [0u8; READ_CHUNK];

    loop {
        let n = stream
            .read(&mut buf)
            .await
            .map_err(|e| ProbeError::from_io_error(&e))?;
        if n == 0 {
            return Err(ProbeError::Other(
                "connection closed before a certificate was received".to_string(),
            ));
        }

        match assembler.feed(&buf[..n]) {
            RecordEvent::LeafCertificate(der) => return Ok(fingerprint_der(&der)),
            RecordEvent::Alert { level, code } => return Err(ProbeError::TlsAlert { level, code }),
            RecordEvent::NeedMore | RecordEvent::Ignored => continue,
        }
    }
}

/// MD5 fingerprint of a DER-encoded certificate, formatted as lowercase
/// colon-separated hex, matching the wire `key` format notary-core and
/// notary-signer expect.
fn fingerprint_der(der: &[u8]) -> String {
    let digest = Md5::digest(der);
    digest
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_sixteen_colon_separated_lowercase_hex_groups() {
        let fp = fingerprint_der(b"some fake certificate bytes");
        let groups: Vec<&str> = fp.split(':').collect();
        assert_eq!(groups.len(), 16);
        for g in groups {
            assert_eq!(g.len(), 2);
            assert!(g.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
        }
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let a = fingerprint_der(b"same bytes");
        let b = fingerprint_der(b"same bytes");
        assert_eq!(a, b);
    }
}
