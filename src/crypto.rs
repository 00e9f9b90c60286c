//! Cryptographic envelope: master-key derivation, the AEAD seal around the
//! plaintext, and the keyed MAC that drives pointer resolution.
//!
//! Cipher choice: AES-256-GCM with both the AEAD key and the 96-bit nonce
//! derived from the master key via HKDF-SHA256 under distinct info strings.
//! Nothing besides the master key is persisted; encode and decode derive
//! identical cipher state from it. A master key is generated fresh per
//! embed and never reused, which is what makes the derived nonce sound.
//! Callers who inject their own key for reproducibility take on the
//! nonce-reuse risk of sealing different messages under the same key.

use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit},
    Aes256Gcm,
};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{Result, VeilchainError};

/// Master key length in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// PBKDF2-HMAC-SHA256 iteration count for master-key derivation.
pub const PBKDF2_ROUNDS: u32 = 1_000_000;

const AEAD_KEY_INFO: &[u8] = b"veilchain/aead-key/v1";
const AEAD_NONCE_INFO: &[u8] = b"veilchain/aead-nonce/v1";

/// 256-bit master key. Zeroed on drop; renders as hex only on request.
#[derive(Clone)]
pub struct MasterKey(Zeroizing<[u8; KEY_LEN]>);

impl PartialEq for MasterKey {
    fn eq(&self, other: &Self) -> bool {
        *self.0 == *other.0
    }
}

impl Eq for MasterKey {}

impl MasterKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Lowercase hex, 64 chars. This string also seeds the candidate stream.
    pub fn to_hex(&self) -> String {
        hex::encode(*self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let raw = hex::decode(s)
            .map_err(|_| VeilchainError::KeyFormat("master key is not valid hex".into()))?;
        let bytes: [u8; KEY_LEN] = raw
            .try_into()
            .map_err(|_| VeilchainError::KeyFormat("master key must be 32 bytes".into()))?;
        Ok(Self::from_bytes(bytes))
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

/// Derive a fresh master key: 32 random password bytes and 32 random salt
/// bytes from the OS, stretched with PBKDF2-HMAC-SHA256. Both inputs are
/// discarded (and zeroed) once the key exists; only the key itself ever
/// leaves this function.
pub fn derive_master_key() -> MasterKey {
    let mut password = Zeroizing::new([0u8; KEY_LEN]);
    let mut salt = Zeroizing::new([0u8; KEY_LEN]);
    OsRng.fill_bytes(&mut *password);
    OsRng.fill_bytes(&mut *salt);

    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(&*password, &*salt, PBKDF2_ROUNDS, &mut key);
    MasterKey::from_bytes(key)
}

fn aead_material(key: &MasterKey) -> ([u8; 32], [u8; 12]) {
    let hk = Hkdf::<Sha256>::new(None, key.as_bytes());

    let mut aead_key = [0u8; 32];
    hk.expand(AEAD_KEY_INFO, &mut aead_key)
        .expect("HKDF expand with a 32-byte output never fails");

    let mut nonce = [0u8; 12];
    hk.expand(AEAD_NONCE_INFO, &mut nonce)
        .expect("HKDF expand with a 12-byte output never fails");

    (aead_key, nonce)
}

/// Encrypt plaintext under the master key. Output is ciphertext plus the
/// 16-byte GCM tag; its length is what the chain must carry.
pub fn seal(key: &MasterKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let (aead_key, nonce) = aead_material(key);
    let cipher = Aes256Gcm::new(GenericArray::from_slice(&aead_key));
    cipher
        .encrypt(GenericArray::from_slice(&nonce), plaintext)
        .map_err(|_| VeilchainError::Crypto("AES-256-GCM encryption failed".into()))
}

/// Decrypt and authenticate ciphertext recovered from a chain walk.
pub fn open(key: &MasterKey, ciphertext: &[u8]) -> Result<Vec<u8>> {
    let (aead_key, nonce) = aead_material(key);
    let cipher = Aes256Gcm::new(GenericArray::from_slice(&aead_key));
    cipher
        .decrypt(GenericArray::from_slice(&nonce), ciphertext)
        .map_err(|_| VeilchainError::Decrypt)
}

/// Keyed HMAC-SHA256 tag over an arbitrary message.
pub fn hmac_tag(key: &MasterKey, msg: &[u8]) -> [u8; 32] {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key.as_bytes())
        .expect("HMAC-SHA256 accepts keys of any length");
    mac.update(msg);
    mac.finalize().into_bytes().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key(last: u8) -> MasterKey {
        let mut bytes = [0u8; KEY_LEN];
        bytes[KEY_LEN - 1] = last;
        MasterKey::from_bytes(bytes)
    }

    #[test]
    fn test_seal_open_round_trip() {
        let key = test_key(1);
        let msg = b"attack at dawn";
        let sealed = seal(&key, msg).unwrap();
        assert_eq!(sealed.len(), msg.len() + 16);
        assert_eq!(open(&key, &sealed).unwrap(), msg);
    }

    #[test]
    fn test_open_rejects_wrong_key() {
        let sealed = seal(&test_key(1), b"hello").unwrap();
        assert!(matches!(
            open(&test_key(2), &sealed),
            Err(VeilchainError::Decrypt)
        ));
    }

    #[test]
    fn test_open_rejects_tampered_ciphertext() {
        let key = test_key(1);
        let mut sealed = seal(&key, b"hello").unwrap();
        sealed[0] ^= 0x01;
        assert!(matches!(open(&key, &sealed), Err(VeilchainError::Decrypt)));
    }

    #[test]
    fn test_seal_is_deterministic_for_fixed_key() {
        // No persisted IV: the whole cipher state comes from the key.
        let key = test_key(7);
        let a = seal(&key, b"same message").unwrap();
        let b = seal(&key, b"same message").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_master_key_hex_round_trip() {
        let key = test_key(0xab);
        let hexed = key.to_hex();
        assert_eq!(hexed.len(), 64);
        assert_eq!(hexed, hexed.to_lowercase());
        assert_eq!(MasterKey::from_hex(&hexed).unwrap(), key);
    }

    #[test]
    fn test_master_key_from_hex_rejects_garbage() {
        assert!(MasterKey::from_hex("zz").is_err());
        assert!(MasterKey::from_hex("abcd").is_err());
    }

    #[test]
    fn test_hmac_tag_depends_on_key_and_message() {
        let a = hmac_tag(&test_key(1), b"msg");
        let b = hmac_tag(&test_key(1), b"msg");
        let c = hmac_tag(&test_key(2), b"msg");
        let d = hmac_tag(&test_key(1), b"other");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }
}
