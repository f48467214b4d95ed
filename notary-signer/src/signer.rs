//! Ties together byte packing, RSA-MD5 signing, and XML rendering into the
//! `Signer` component.

use crate::bytes::{pack_signed_bytes, KeyObservations};
use crate::error::SignerError;
use crate::xml::{render_xml, SignedReply};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use md5::Md5;
use notary_core::{Observation, ServiceType};
use rsa::pkcs1v15::SigningKey;
use rsa::signature::{SignatureEncoding, Signer as _};
use rsa::RsaPrivateKey;

pub struct Signer {
    signing_key: SigningKey<Md5>,
}

impl Signer {
    pub fn new(private_key: RsaPrivateKey) -> Self {
        Self {
            signing_key: SigningKey::<Md5>::new(private_key),
        }
    }

    /// Build and sign the full XML reply for `service_id`'s observations.
    ///
    /// `observations` must already be grouped by key; distinct keys appear
    /// in the order they'll be emitted in the XML body (ascending key order,
    /// matching `ObservationStore::get_observations`'s `(key, start)` sort).
    pub fn sign_reply(
        &self,
        service_id: &str,
        service_type: ServiceType,
        observations: &[Observation],
    ) -> Result<String, SignerError> {
        let keys = group_by_key_preserving_order(observations);

        let signed_bytes = pack_signed_bytes(service_id, &keys)?;
        let digest_and_sign = self
            .signing_key
            .try_sign(&signed_bytes)
            .map_err(|e| SignerError::SigningFailure(e.to_string()))?;
        let signature_b64 = BASE64.encode(digest_and_sign.to_bytes());

        let key_type_label = match service_type {
            ServiceType::Tls => "ssl",
            ServiceType::Ssh => "ssh",
        };

        let reply = SignedReply {
            sig_type: "rsa-md5",
            signature_b64,
            key_type_label,
            keys,
        };

        Ok(render_xml(&reply))
    }
}

/// Group observations by key, preserving first-seen order (the input is
/// already sorted by `(key, start)`, so this is a stable grouping pass).
fn group_by_key_preserving_order(observations: &[Observation]) -> Vec<KeyObservations> {
    let mut groups: Vec<KeyObservations> = Vec::new();
    for obs in observations {
        if let Some(group) = groups.iter_mut().find(|g| g.fingerprint == obs.key) {
            group.timespans.push((obs.start, obs.end));
        } else {
            groups.push(KeyObservations {
                fingerprint: obs.key.clone(),
                timespans: vec![(obs.start, obs.end)],
            });
        }
    }
    groups
}
