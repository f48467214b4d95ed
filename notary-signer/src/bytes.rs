//! The canonical signed-bytes layout, confirmed byte-for-byte against the
//! `struct.pack` sequence in the original Python implementation's
//! `notary_http.py`.
//!
//! ```text
//! signed_bytes := service_id_ascii ‖ 0x00 ‖ reversed_key_records
//! key_record    := header(5B) ‖ fingerprint(16B) ‖ timespans
//! header        := num_timespans_hi, num_timespans_lo, 0x00, 0x10, 0x03
//! timespan      := start_be32 ‖ end_be32
//! ```
//!
//! Key records are concatenated in the *reverse* of the order they are
//! emitted in the XML body. This is a historical invariant and must
//! never change.

use crate::error::SignerError;

/// One key's worth of observed timespans, in the order they will appear
/// in the XML body (not yet sorted).
#[derive(Debug, Clone)]
pub struct KeyObservations {
    /// Colon-separated lowercase hex, 16 bytes (e.g. `"aa:bb:...:ff"`).
    pub fingerprint: String,
    pub timespans: Vec<(i64, i64)>,
}

/// Parse a `aa:bb:...` fingerprint string into its 16 raw bytes.
pub fn parse_fingerprint(fp: &str) -> Result<[u8; 16], SignerError> {
    let mut out = [0u8; 16];
    let groups: Vec<&str> = fp.split(':').collect();
    if groups.len() != 16 {
        return Err(SignerError::InvalidFingerprint(fp.to_string()));
    }
    for (i, group) in groups.iter().enumerate() {
        out[i] =
            u8::from_str_radix(group, 16).map_err(|_| SignerError::InvalidFingerprint(fp.to_string()))?;
    }
    Ok(out)
}

/// Pack one key's record: header + fingerprint + sorted timespans.
fn pack_key_record(key: &KeyObservations) -> Result<Vec<u8>, SignerError> {
    let mut spans = key.timespans.clone();
    spans.sort_by_key(|&(start, _)| start);

    let num_timespans = spans.len() as u16;
    let mut record = Vec::with_capacity(5 + 16 + spans.len() * 8);
    record.push(((num_timespans >> 8) & 0xff) as u8);
    record.push((num_timespans & 0xff) as u8);
    record.push(0x00);
    record.push(0x10);
    record.push(0x03);
    record.extend_from_slice(&parse_fingerprint(&key.fingerprint)?);

    for (start, end) in spans {
        record.extend_from_slice(&(start as u32).to_be_bytes());
        record.extend_from_slice(&(end as u32).to_be_bytes());
    }

    Ok(record)
}

/// Build the canonical byte string that gets MD5-hashed and RSA-signed.
///
/// `keys_in_xml_order` must be in the same order the caller will emit the
/// `<key>` elements in the XML body; this function takes care of reversing
/// them for the packed layout.
pub fn pack_signed_bytes(
    service_id: &str,
    keys_in_xml_order: &[KeyObservations],
) -> Result<Vec<u8>, SignerError> {
    let mut out = Vec::new();
    out.extend_from_slice(service_id.as_bytes());
    out.push(0x00);

    for key in keys_in_xml_order.iter().rev() {
        out.extend_from_slice(&pack_key_record(key)?);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_fingerprint() {
        let fp = "00:11:22:33:44:55:66:77:88:99:aa:bb:cc:dd:ee:ff";
        let bytes = parse_fingerprint(fp).unwrap();
        assert_eq!(
            bytes,
            [
                0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc,
                0xdd, 0xee, 0xff
            ]
        );
    }

    #[test]
    fn rejects_wrong_length_fingerprint() {
        assert!(parse_fingerprint("aa:bb").is_err());
    }

    #[test]
    fn reverses_key_record_order() {
        let k1 = KeyObservations {
            fingerprint: "00:00:00:00:00:00:00:00:00:00:00:00:00:00:00:01".into(),
            timespans: vec![(100, 200)],
        };
        let k2 = KeyObservations {
            fingerprint: "00:00:00:00:00:00:00:00:00:00:00:00:00:00:00:02".into(),
            timespans: vec![(300, 400)],
        };

        let packed = pack_signed_bytes("svc", &[k1.clone(), k2.clone()]).unwrap();
        let rec2 = pack_key_record(&k2).unwrap();
        let rec1 = pack_key_record(&k1).unwrap();

        // service_id + 0x00 + rec2 + rec1 (reverse of XML order [k1, k2]).
        let mut expected = b"svc".to_vec();
        expected.push(0x00);
        expected.extend_from_slice(&rec2);
        expected.extend_from_slice(&rec1);
        assert_eq!(packed, expected);
    }

    #[test]
    fn sorts_timespans_by_start_ascending() {
        let key = KeyObservations {
            fingerprint: "00:00:00:00:00:00:00:00:00:00:00:00:00:00:00:01".into(),
            timespans: vec![(300, 350), (100, 150)],
        };
        let record = pack_key_record(&key).unwrap();
        // header(5) + fp(16) = 21 bytes before timespans.
        let ts_bytes = &record[21..];
        let first_start = u32::from_be_bytes(ts_bytes[0..4].try_into().unwrap());
        assert_eq!(first_start, 100);
    }
}
