use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::codec;
use crate::error::Result;
use storage::Download;

pub const PUBLIC_KEY_FILENAME: &str = "public_key.bin";
pub const PRIVATE_KEY_FILENAME: &str = "private_key.bin";
pub const KEY_MIME_TYPE: &str = "application/octet-stream";

/// A freshly generated key pair as handed out by the service.
///
/// The private half is wiped from memory when dropped. Converting into
/// downloads consumes the value, so nothing is kept once the bytes have been
/// offered for persistence.
pub struct KeyMaterial {
    public_key: Vec<u8>,
    private_key: Zeroizing<Vec<u8>>,
}

impl KeyMaterial {
    pub fn new(public_key: Vec<u8>, private_key: Vec<u8>) -> Self {
        Self {
            public_key,
            private_key: Zeroizing::new(private_key),
        }
    }

    /// Decode both halves from their transmitted text form. Fails without
    /// producing anything if either half is malformed.
    pub fn from_encoded(public_key: &str, private_key: &str) -> Result<Self> {
        let public_key = codec::decode_to_binary(public_key)?;
        let private_key = codec::decode_to_binary(private_key)?;
        Ok(Self::new(public_key, private_key))
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    pub fn private_key(&self) -> &[u8] {
        &self.private_key
    }

    /// Short fingerprint for display (first 4 bytes of SHA-256 over the public key).
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.public_key);
        hex::encode(&digest[..4])
    }

    /// The two files the pair is persisted as, public first.
    pub fn into_downloads(self) -> [Download; 2] {
        let public = codec::blob(PUBLIC_KEY_FILENAME, self.public_key, KEY_MIME_TYPE);
        let private = codec::blob(
            PRIVATE_KEY_FILENAME,
            self.private_key.to_vec(),
            KEY_MIME_TYPE,
        );
        [public, private]
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("public_key_len", &self.public_key.len())
            .field("fingerprint", &self.fingerprint())
            .finish_non_exhaustive()
    }
}
