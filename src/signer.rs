use tracing::trace;

use crate::{
    common::{PrivateKey, Profile, SignError, SignedEnvelope, Transaction},
    primitives::{encode64, utf8_to_hex, CryptoProvider},
};

/// Signs transactions into envelopes for a given protocol profile and network.
#[derive(Debug)]
pub struct Signer<'a, C: ?Sized> {
    crypto: &'a C,
    profile: Profile,
    network_code: Option<&'a str>,
}

impl<'a, C: CryptoProvider + ?Sized> Signer<'a, C> {
    /// Create a new signer. The network code is only used by profiles that bind
    /// signatures to a network.
    pub fn new(crypto: &'a C, profile: Profile, network_code: Option<&'a str>) -> Self {
        let network_code = if profile.binds_network() { network_code } else { None };
        Self { crypto, profile, network_code }
    }

    /// Serialize, encode and sign a transaction.
    ///
    /// `tx` in the envelope is `base64(hex(json))`; the signature is computed
    /// over the hex string.
    pub fn sign(&self, key: &PrivateKey, tx: &Transaction) -> Result<SignedEnvelope, SignError> {
        let json = tx.canonical_json(self.profile)?;
        let raw = utf8_to_hex(&json);
        let signature = self.crypto.sign_message(self.network_code, key, raw.as_bytes())?;
        trace!(sender = %tx.sender_address, nonce = tx.nonce, "Signed transaction");

        Ok(SignedEnvelope { tx: encode64(&raw), signature })
    }
}
