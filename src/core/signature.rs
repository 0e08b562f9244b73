//! HMAC-SHA256 signing shared by inbound verification and outbound webhooks.
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex signature, inbound and outbound.
pub const SIGNATURE_HEADER: &str = "x-signature";

#[derive(Debug, thiserror::Error)]
#[error("signing secret must not be empty")]
pub struct EmptySecret;

/// Keyed signer. Cloning is cheap relative to re-keying.
#[derive(Clone)]
pub struct Signer {
    mac: HmacSha256,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer").finish_non_exhaustive()
    }
}

impl Signer {
    pub fn new(secret: &[u8]) -> Result<Self, EmptySecret> {
        if secret.is_empty() {
            return Err(EmptySecret);
        }
        let mac = HmacSha256::new_from_slice(secret).map_err(|_| EmptySecret)?;
        Ok(Self { mac })
    }

    /// Lowercase hex HMAC-SHA256 of `payload`.
    pub fn sign(&self, payload: &[u8]) -> String {
        hex::encode(self.digest(payload))
    }

    /// Check a hex signature against `payload`.
    ///
    /// Surrounding whitespace and hex case are ignored. Malformed hex or a digest of the
    /// wrong length is simply a mismatch. The comparison runs in constant time.
    pub fn verify(&self, payload: &[u8], signature: &str) -> bool {
        let Ok(supplied) = hex::decode(signature.trim()) else {
            return false;
        };
        let expected = self.digest(payload);
        expected.as_slice().ct_eq(supplied.as_slice()).into()
    }

    fn digest(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}
