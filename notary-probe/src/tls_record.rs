//! Minimal TLS record/handshake parsing: just enough to build a
//! `ClientHello` and pull the server's leaf certificate out of the
//! `Certificate` handshake message (type 11), per RFC 2246 §7.4.2 (the
//! server's own certificate comes first in the chain).
//!
//! This deliberately does not perform a real handshake (no key exchange,
//! no session establishment) — the notary only needs the certificate the
//! server presents, mirroring the raw-socket approach of the original
//! Python implementation's `ssl_scan_sock.py`.

const RECORD_HEADER_LEN: usize = 5;
const HANDSHAKE_HEADER_LEN: usize = 4;

const CONTENT_TYPE_ALERT: u8 = 0x15;
const CONTENT_TYPE_HANDSHAKE: u8 = 0x16;

const HANDSHAKE_TYPE_CERTIFICATE: u8 = 11;

/// A handful of broadly-supported cipher suites; we don't need to complete
/// a handshake, only to elicit a `Certificate` message, so there is no
/// need to offer an exhaustive suite list.
const CIPHER_SUITES: &[[u8; 2]] = &[
    [0xc0, 0x2f], // TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256
    [0xc0, 0x30], // TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384
    [0xc0, 0x13], // TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA
    [0x00, 0x2f], // TLS_RSA_WITH_AES_128_CBC_SHA
    [0x00, 0x35], // TLS_RSA_WITH_AES_256_CBC_SHA
    [0x00, 0x0a], // TLS_RSA_WITH_3DES_EDE_CBC_SHA
];

/// Build a `ClientHello` record. When `sni_host` is `Some`, a
/// `server_name` extension is included.
pub fn build_client_hello(sni_host: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();

    // client_version: TLS 1.2
    body.extend_from_slice(&[0x03, 0x03]);

    // random: 32 bytes. Cryptographic quality doesn't matter; we never
    // complete a handshake.
    let mut random = [0u8; 32];
    for (i, b) in random.iter_mut().enumerate() {
        *b = (i as u8).wrapping_mul(31).wrapping_add(7);
    }
    body.extend_from_slice(&random);

    // session_id: empty
    body.push(0);

    // cipher_suites
    let cs_len = (CIPHER_SUITES.len() * 2) as u16;
    body.extend_from_slice(&cs_len.to_be_bytes());
    for suite in CIPHER_SUITES {
        body.extend_from_slice(suite);
    }

    // compression_methods: null only
    body.push(1);
    body.push(0);

    // extensions
    let extensions = build_extensions(sni_host);
    body.extend_from_slice(&(extensions.len() as u16).to_be_bytes());
    body.extend_from_slice(&extensions);

    let mut handshake = Vec::new();
    handshake.push(0x01); // ClientHello
    let body_len = body.len() as u32;
    handshake.extend_from_slice(&body_len.to_be_bytes()[1..]); // 3-byte length
    handshake.extend_from_slice(&body);

    let mut record = Vec::new();
    record.push(CONTENT_TYPE_HANDSHAKE);
    record.extend_from_slice(&[0x03, 0x01]); // record-layer version
    record.extend_from_slice(&(handshake.len() as u16).to_be_bytes());
    record.extend_from_slice(&handshake);
    record
}

fn build_extensions(sni_host: Option<&str>) -> Vec<u8> {
    let Some(host) = sni_host else {
        return Vec::new();
    };

    let mut server_name_list = Vec::new();
    server_name_list.push(0x00); // host_name
    server_name_list.extend_from_slice(&(host.len() as u16).to_be_bytes());
    server_name_list.extend_from_slice(host.as_bytes());

    let mut ext_body = Vec::new();
    ext_body.extend_from_slice(&(server_name_list.len() as u16).to_be_bytes());
    ext_body.extend_from_slice(&server_name_list);

    let mut ext = Vec::new();
    ext.extend_from_slice(&[0x00, 0x00]); // extension type: server_name
    ext.extend_from_slice(&(ext_body.len() as u16).to_be_bytes());
    ext.extend_from_slice(&ext_body);
    ext
}

/// Outcome of feeding more bytes into the record/handshake assembler.
pub enum RecordEvent {
    /// Not enough bytes buffered yet; caller should read more.
    NeedMore,
    /// A fatal or warning TLS alert was received.
    Alert { level: u8, code: u8 },
    /// The server's leaf certificate (DER bytes), extracted from a
    /// `Certificate` handshake message.
    LeafCertificate(Vec<u8>),
    /// A handshake message type we don't care about; caller should keep
    /// reading.
    Ignored,
}

/// Incrementally assembles TLS records into handshake messages.
#[derive(Default)]
pub struct RecordAssembler {
    record_buf: Vec<u8>,
    handshake_buf: Vec<u8>,
}

impl RecordAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed newly-read bytes in; returns the first interesting event found,
    /// if any. Call repeatedly as more bytes arrive.
    pub fn feed(&mut self, bytes: &[u8]) -> RecordEvent {
        self.record_buf.extend_from_slice(bytes);
        self.drain_records()
    }

    fn drain_records(&mut self) -> RecordEvent {
        loop {
            if self.record_buf.len() < RECORD_HEADER_LEN {
                return RecordEvent::NeedMore;
            }
            let content_type = self.record_buf[0];
            let len = u16::from_be_bytes([self.record_buf[3], self.record_buf[4]]) as usize;
            if self.record_buf.len() < RECORD_HEADER_LEN + len {
                return RecordEvent::NeedMore;
            }

            let payload: Vec<u8> = self.record_buf
                [RECORD_HEADER_LEN..RECORD_HEADER_LEN + len]
                .to_vec();
            self.record_buf.drain(0..RECORD_HEADER_LEN + len);

            match content_type {
                CONTENT_TYPE_ALERT if payload.len() >= 2 => {
                    return RecordEvent::Alert {
                        level: payload[0],
                        code: payload[1],
                    };
                }
                CONTENT_TYPE_HANDSHAKE => {
                    self.handshake_buf.extend_from_slice(&payload);
                    if let Some(event) = self.try_parse_handshake() {
                        return event;
                    }
                    // no complete handshake message yet; loop to drain any
                    // further buffered records before asking for more bytes.
                }
                _ => {
                    // Not Alert or Handshake (e.g. ChangeCipherSpec); skip.
                }
            }
        }
    }

    /// Parse as many complete handshake messages as are currently buffered.
    /// A server's flight (ServerHello, Certificate, ServerKeyExchange,
    /// ServerHelloDone, ...) routinely arrives coalesced into one or more
    /// TLS records read in a single `read()`; a non-Certificate message
    /// must not stop the drain, or a Certificate already sitting in the
    /// buffer right behind it would be stranded until more bytes arrive
    /// (which may never happen once the server has sent everything).
    fn try_parse_handshake(&mut self) -> Option<RecordEvent> {
        loop {
            if self.handshake_buf.len() < HANDSHAKE_HEADER_LEN {
                return None;
            }
            let msg_type = self.handshake_buf[0];
            let msg_len = u32::from_be_bytes([
                0,
                self.handshake_buf[1],
                self.handshake_buf[2],
                self.handshake_buf[3],
            ]) as usize;

            if self.handshake_buf.len() < HANDSHAKE_HEADER_LEN + msg_len {
                return None;
            }

            let body: Vec<u8> = self.handshake_buf
                [HANDSHAKE_HEADER_LEN..HANDSHAKE_HEADER_LEN + msg_len]
                .to_vec();
            self.handshake_buf.drain(0..HANDSHAKE_HEADER_LEN + msg_len);

            if msg_type == HANDSHAKE_TYPE_CERTIFICATE {
                if let Some(der) = extract_leaf_certificate(&body) {
                    return Some(RecordEvent::LeafCertificate(der));
                }
                // malformed Certificate body; keep draining the rest of
                // this flight rather than getting stuck on it.
                continue;
            }

            // Not the message we're after (ServerHello, ServerKeyExchange,
            // ServerHelloDone, ...); keep draining instead of returning
            // Ignored here, so a Certificate further back in the buffer
            // isn't stranded behind it.
        }
    }
}

/// Parse a `Certificate` handshake message body and return the first
/// (leaf) certificate's DER bytes.
fn extract_leaf_certificate(body: &[u8]) -> Option<Vec<u8>> {
    if body.len() < 3 {
        return None;
    }
    // 3-byte certificate_list length, then we only need the first entry.
    if body.len() < 6 {
        return None;
    }
    let cert_len = u32::from_be_bytes([0, body[3], body[4], body[5]]) as usize;
    let start = 6;
    if body.len() < start + cert_len {
        return None;
    }
    Some(body[start..start + cert_len].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_a_plain_client_hello() {
        let hello = build_client_hello(None);
        assert_eq!(hello[0], CONTENT_TYPE_HANDSHAKE);
        assert_eq!(hello[5], 0x01); // ClientHello handshake type
    }

    #[test]
    fn builds_an_sni_client_hello_containing_the_hostname() {
        let hello = build_client_hello(Some("example.com"));
        let as_str = String::from_utf8_lossy(&hello);
        assert!(as_str.contains("example.com"));
    }

    #[test]
    fn assembles_a_single_record_certificate_message() {
        let der = vec![0xAAu8; 10];
        let mut cert_entry = Vec::new();
        cert_entry.extend_from_slice(&(der.len() as u32).to_be_bytes()[1..]);
        cert_entry.extend_from_slice(&der);

        let mut cert_list = Vec::new();
        cert_list.extend_from_slice(&(cert_entry.len() as u32).to_be_bytes()[1..]);
        cert_list.extend_from_slice(&cert_entry);

        let mut handshake = Vec::new();
        handshake.push(HANDSHAKE_TYPE_CERTIFICATE);
        handshake.extend_from_slice(&(cert_list.len() as u32).to_be_bytes()[1..]);
        handshake.extend_from_slice(&cert_list);

        let mut record = Vec::new();
        record.push(CONTENT_TYPE_HANDSHAKE);
        record.extend_from_slice(&[0x03, 0x03]);
        record.extend_from_slice(&(handshake.len() as u16).to_be_bytes());
        record.extend_from_slice(&handshake);

        let mut assembler = RecordAssembler::new();
        match assembler.feed(&record) {
            RecordEvent::LeafCertificate(bytes) => assert_eq!(bytes, der),
            _ => panic!("expected a leaf certificate event"),
        }
    }

    #[test]
    fn finds_a_certificate_coalesced_behind_a_server_hello_in_one_record() {
        // A real server's flight is typically ServerHello, Certificate,
        // ServerKeyExchange, ServerHelloDone, all read back in a single
        // `read()`. The assembler must not get stuck on the ServerHello.
        let server_hello_body = vec![0u8; 40];
        let mut server_hello = Vec::new();
        server_hello.push(0x02); // ServerHello
        server_hello.extend_from_slice(&(server_hello_body.len() as u32).to_be_bytes()[1..]);
        server_hello.extend_from_slice(&server_hello_body);

        let der = vec![0xBBu8; 12];
        let mut cert_entry = Vec::new();
        cert_entry.extend_from_slice(&(der.len() as u32).to_be_bytes()[1..]);
        cert_entry.extend_from_slice(&der);

        let mut cert_list = Vec::new();
        cert_list.extend_from_slice(&(cert_entry.len() as u32).to_be_bytes()[1..]);
        cert_list.extend_from_slice(&cert_entry);

        let mut certificate = Vec::new();
        certificate.push(HANDSHAKE_TYPE_CERTIFICATE);
        certificate.extend_from_slice(&(cert_list.len() as u32).to_be_bytes()[1..]);
        certificate.extend_from_slice(&cert_list);

        let mut handshake_payload = server_hello;
        handshake_payload.extend_from_slice(&certificate);

        let mut record = Vec::new();
        record.push(CONTENT_TYPE_HANDSHAKE);
        record.extend_from_slice(&[0x03, 0x03]);
        record.extend_from_slice(&(handshake_payload.len() as u16).to_be_bytes());
        record.extend_from_slice(&handshake_payload);

        let mut assembler = RecordAssembler::new();
        match assembler.feed(&record) {
            RecordEvent::LeafCertificate(bytes) => assert_eq!(bytes, der),
            _ => panic!("expected a leaf certificate event"),
        }
    }

    #[test]
    fn reports_alert_records() {
        let record = [CONTENT_TYPE_ALERT, 0x03, 0x03, 0x00, 0x02, 0x02, 0x28];
        let mut assembler = RecordAssembler::new();
        match assembler.feed(&record) {
            RecordEvent::Alert { level, code } => {
                assert_eq!(level, 2);
                assert_eq!(code, 0x28);
            }
            _ => panic!("expected an alert event"),
        }
    }

    #[test]
    fn needs_more_bytes_for_a_partial_record() {
        let mut assembler = RecordAssembler::new();
        match assembler.feed(&[CONTENT_TYPE_HANDSHAKE, 0x03, 0x03, 0x00, 0x10]) {
            RecordEvent::NeedMore => {}
            _ => panic!("expected NeedMore"),
        }
    }
}
