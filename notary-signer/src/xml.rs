//! Renders the `<notary_reply>` XML wire format.

use crate::bytes::KeyObservations;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::writer::Writer;
use std::io::Cursor;

/// A fully-built, signed reply ready to be rendered as XML.
pub struct SignedReply {
    pub sig_type: &'static str,
    pub signature_b64: String,
    /// Label used for the `<key type="...">` attribute: `"ssl"` or `"ssh"`.
    pub key_type_label: &'static str,
    /// In the same order the bytes were (reverse-)packed from — i.e. the
    /// canonical XML iteration order.
    pub keys: Vec<KeyObservations>,
}

/// Render the reply as `<notary_reply version="1" sig_type="..." sig="...">
/// <key type="..." fp="...."><timestamp start=".." end=".."/>...</key>...
/// </notary_reply>`.
pub fn render_xml(reply: &SignedReply) -> String {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    let mut root = BytesStart::new("notary_reply");
    root.push_attribute(("version", "1"));
    root.push_attribute(("sig_type", reply.sig_type));
    root.push_attribute(("sig", reply.signature_b64.as_str()));
    writer
        .write_event(Event::Start(root))
        .expect("writing to an in-memory buffer cannot fail");

    for key in &reply.keys {
        let mut key_elem = BytesStart::new("key");
        key_elem.push_attribute(("type", reply.key_type_label));
        key_elem.push_attribute(("fp", key.fingerprint.as_str()));
        writer
            .write_event(Event::Start(key_elem))
            .expect("writing to an in-memory buffer cannot fail");

        let mut spans = key.timespans.clone();
        spans.sort_by_key(|&(start, _)| start);
        for (start, end) in spans {
            let start = start.to_string();
            let end = end.to_string();
            let mut ts = BytesStart::new("timestamp");
            ts.push_attribute(("end", end.as_str()));
            ts.push_attribute(("start", start.as_str()));
            writer
                .write_event(Event::Empty(ts))
                .expect("writing to an in-memory buffer cannot fail");
        }

        writer
            .write_event(Event::End(BytesEnd::new("key")))
            .expect("writing to an in-memory buffer cannot fail");
    }

    writer
        .write_event(Event::End(BytesEnd::new("notary_reply")))
        .expect("writing to an in-memory buffer cannot fail");

    String::from_utf8(writer.into_inner().into_inner())
        .expect("xml writer only ever emits valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_expected_shape() {
        let reply = SignedReply {
            sig_type: "rsa-md5",
            signature_b64: "c2ln".into(),
            key_type_label: "ssl",
            keys: vec![KeyObservations {
                fingerprint: "aa:bb:cc:dd:ee:ff:00:11:22:33:44:55:66:77:88:99".into(),
                timespans: vec![(100, 200)],
            }],
        };

        let xml = render_xml(&reply);
        assert!(xml.starts_with(r#"<notary_reply version="1" sig_type="rsa-md5" sig="c2ln">"#));
        assert!(xml.contains(r#"<key type="ssl" fp="aa:bb:cc:dd:ee:ff:00:11:22:33:44:55:66:77:88:99">"#));
        assert!(xml.contains(r#"<timestamp end="200" start="100"/>"#));
        assert!(xml.ends_with("</notary_reply>"));
    }
}
