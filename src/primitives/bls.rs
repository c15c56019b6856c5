//! BLS12-381 keys, addresses and signatures.

use alloy::primitives::{keccak256, Keccak256, B256};
use blst::{
    min_pk::{PublicKey as BlsPublicKey, SecretKey as BlsSecretKey, Signature as BlsSignature},
    BLST_ERROR,
};
use rand::RngCore;

use super::CryptoProvider;
use crate::common::{Address, CryptoError, PrivateKey, Wallet};

/// The BLS Domain Separator used in Ethereum 2.0.
pub const BLS_DST_PREFIX: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// Every address starts with this prefix.
pub const ADDRESS_PREFIX: &str = "CH";

/// Length of freshly generated keying material.
const IKM_LEN: usize = 32;

/// Accepted length of decoded private key text.
const IKM_LEN_RANGE: std::ops::RangeInclusive<usize> = 32..=64;

/// Length of the address checksum suffix.
const CHECKSUM_LEN: usize = 4;

/// Sign the given data with the given BLS secret key.
/// Returns the BLS signature.
#[inline]
pub(crate) fn sign_with_prefix(key: &BlsSecretKey, data: impl AsRef<[u8]>) -> BlsSignature {
    key.sign(data.as_ref(), BLS_DST_PREFIX, &[])
}

/// Verify the given BLS signature against the given message digest and the public key.
/// Returns `true` if the signature is valid, `false` otherwise.
#[inline]
pub(crate) fn verify_signature(
    signature: &BlsSignature,
    pubkey: &BlsPublicKey,
    digest: impl AsRef<[u8]>,
) -> bool {
    signature.verify(false, digest.as_ref(), BLS_DST_PREFIX, &[], pubkey, true) ==
        BLST_ERROR::BLST_SUCCESS
}

/// Derive the BLS secret key from base58 private key text.
///
/// The decoded bytes are used as input keying material, so any 32 to 64 byte
/// string is a usable key.
fn secret_from_private_key(key: &PrivateKey) -> Result<BlsSecretKey, CryptoError> {
    let ikm = bs58::decode(key.expose())
        .into_vec()
        .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;

    if !IKM_LEN_RANGE.contains(&ikm.len()) {
        return Err(CryptoError::InvalidKeyLength(ikm.len()))
    }

    BlsSecretKey::key_gen(&ikm, &[]).map_err(|e| CryptoError::KeyGen(format!("{e:?}")))
}

/// `CH` + base58(last 20 bytes of keccak256(pubkey) || 4 byte checksum).
pub fn address_from_pubkey(pubkey: &BlsPublicKey) -> Address {
    let hash = keccak256(pubkey.compress());

    let mut payload = Vec::with_capacity(20 + CHECKSUM_LEN);
    payload.extend_from_slice(&hash[12..]);
    let checksum = keccak256(&payload);
    payload.extend_from_slice(&checksum[..CHECKSUM_LEN]);

    Address::new(format!("{ADDRESS_PREFIX}{}", bs58::encode(payload).into_string()))
}

/// The digest that actually gets signed for a message.
fn signing_digest(network_code: Option<&str>, message: &[u8]) -> B256 {
    match network_code {
        None => keccak256(message),
        Some(code) => {
            let mut hasher = Keccak256::new();
            hasher.update(keccak256(code.as_bytes()));
            hasher.update(keccak256(message));
            hasher.finalize()
        }
    }
}

/// BLS12-381 (min-pk) implementation of the cryptography collaborator.
///
/// Signatures are deterministic, so identical keys and messages always produce
/// identical signature text.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlsCrypto;

impl BlsCrypto {
    /// Verify a base58 signature over `message`, checking it against the public key of `key`.
    pub fn verify_message(
        &self,
        network_code: Option<&str>,
        key: &PrivateKey,
        message: &[u8],
        signature: &str,
    ) -> Result<bool, CryptoError> {
        let pubkey = secret_from_private_key(key)?.sk_to_pk();
        let bytes = bs58::decode(signature)
            .into_vec()
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
        let signature = BlsSignature::from_bytes(&bytes)
            .map_err(|e| CryptoError::InvalidSignature(format!("{e:?}")))?;

        Ok(verify_signature(&signature, &pubkey, signing_digest(network_code, message)))
    }
}

impl CryptoProvider for BlsCrypto {
    fn generate_wallet(&self, rng: &mut dyn RngCore) -> Result<Wallet, CryptoError> {
        let mut ikm = [0u8; IKM_LEN];
        rng.fill_bytes(&mut ikm);

        let private_key = PrivateKey::new(bs58::encode(ikm).into_string());
        let address = self.address_from_private_key(&private_key)?;

        Ok(Wallet { address, private_key })
    }

    fn address_from_private_key(&self, key: &PrivateKey) -> Result<Address, CryptoError> {
        let secret = secret_from_private_key(key)?;
        Ok(address_from_pubkey(&secret.sk_to_pk()))
    }

    fn sign_message(
        &self,
        network_code: Option<&str>,
        key: &PrivateKey,
        message: &[u8],
    ) -> Result<String, CryptoError> {
        let secret = secret_from_private_key(key)?;
        let signature = sign_with_prefix(&secret, signing_digest(network_code, message));

        Ok(bs58::encode(signature.compress()).into_string())
    }
}
