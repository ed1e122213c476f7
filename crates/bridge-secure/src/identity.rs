use std::path::Path;

use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

/// Length, in hex characters, of a destination address. Addresses are the
/// first 8 bytes of the sha256 hash of the identity's public key, mirroring
/// the fixed-width hash addresses of the upstream store-and-forward network.
pub const ADDRESS_HEX_LEN: usize = 16;

pub struct Identity {
    pub signing_key: SigningKey,
    pub address: String,
}

impl Identity {
    /// Load the identity from `path` if it exists, otherwise generate a
    /// fresh one and persist it there (when a path is configured at all).
    pub fn load_or_create(path: Option<&str>) -> anyhow::Result<Self> {
        let signing_key = match path.map(Path::new) {
            Some(p) if p.exists() => {
                let bytes = std::fs::read(p)?;
                let key_bytes: [u8; 32] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| anyhow::anyhow!("identity file {} is not a 32-byte key", p.display()))?;
                SigningKey::from_bytes(&key_bytes)
            }
            Some(p) => {
                let key = SigningKey::generate(&mut OsRng);
                if let Some(parent) = p.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(p, key.to_bytes())?;
                key
            }
            None => SigningKey::generate(&mut OsRng),
        };
        let address = derive_address(&signing_key.verifying_key());
        Ok(Self { signing_key, address })
    }
}

fn derive_address(key: &VerifyingKey) -> String {
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(&digest[..ADDRESS_HEX_LEN / 2])
}
