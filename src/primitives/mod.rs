use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;

use crate::common::{Address, CryptoError, PrivateKey, Wallet};

pub mod bls;

/// The cryptography collaborator: key generation, address derivation and signing.
pub trait CryptoProvider {
    /// Generate a fresh wallet using randomness drawn from `rng`.
    fn generate_wallet(&self, rng: &mut dyn RngCore) -> Result<Wallet, CryptoError>;

    /// Derive the address controlled by the given private key.
    fn address_from_private_key(&self, key: &PrivateKey) -> Result<Address, CryptoError>;

    /// Sign `message` with `key`. When a network code is given, the signature is bound to it.
    fn sign_message(
        &self,
        network_code: Option<&str>,
        key: &PrivateKey,
        message: &[u8],
    ) -> Result<String, CryptoError>;
}

/// Hex-encodes the UTF-8 bytes of `s` (lowercase, no prefix).
pub fn utf8_to_hex(s: &str) -> String {
    hex::encode(s.as_bytes())
}

/// Standard padded base64.
pub fn encode64(data: impl AsRef<[u8]>) -> String {
    STANDARD.encode(data)
}
