//! Canonical byte packing and RSA-MD5 signing of notary replies.
//!
//! The byte layout and reverse-key-record ordering are a historical
//! wire-compatibility invariant and must not change.

pub mod bytes;
pub mod error;
pub mod key;
mod signer;
pub mod xml;

pub use bytes::{parse_fingerprint, KeyObservations};
pub use error::SignerError;
pub use key::{load_private_key, load_public_key_pem};
pub use signer::Signer;
pub use xml::{render_xml, SignedReply};
