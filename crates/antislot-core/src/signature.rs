//! HMAC signing and ETag derivation.
//!
//! Payloads are signed over their canonical JSON form: serialized through
//! `serde_json::Value`, object keys sorted at every depth, then rendered
//! without whitespace. Two parties that agree on the payload therefore agree
//! on the bytes, regardless of struct field order or of which map backend
//! `serde_json` was compiled with.
//!
//! Floats are written in their shortest round-trip form and parsed back with
//! `float_roundtrip`, so a weight re-serialized by a client renders the same
//! digits the server signed.

use std::fmt;

use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{CoreError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Number of hex characters of the SHA-256 digest used in an ETag.
pub const ETAG_HEX_LEN: usize = 16;

/// Renders a payload as canonical JSON (sorted keys, no whitespace).
pub fn canonical_json<T: Serialize + ?Sized>(payload: &T) -> Result<String> {
    let value = sort_keys(serde_json::to_value(payload)?);
    Ok(serde_json::to_string(&value)?)
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, sort_keys(v)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Derives a quoted ETag from the first 16 hex chars of the body's SHA-256.
///
/// A cache fingerprint only; it carries no authenticity guarantee.
pub fn etag(body: &[u8]) -> String {
    let digest = hex::encode(Sha256::digest(body));
    format!("\"{}\"", &digest[..ETAG_HEX_LEN])
}

/// Signs and verifies payloads with a shared secret.
#[derive(Clone)]
pub struct SignatureService {
    mac: HmacSha256,
}

impl fmt::Debug for SignatureService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureService").finish_non_exhaustive()
    }
}

impl SignatureService {
    /// Creates a service keyed by `secret`.
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self> {
        let mac = HmacSha256::new_from_slice(secret.as_ref()).map_err(|_| CoreError::InvalidKey)?;
        Ok(Self { mac })
    }

    /// Returns the hex HMAC-SHA256 of raw bytes.
    pub fn sign_bytes(&self, bytes: &[u8]) -> String {
        let mut mac = self.mac.clone();
        mac.update(bytes);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Returns the hex HMAC-SHA256 of the payload's canonical JSON.
    pub fn sign<T: Serialize + ?Sized>(&self, payload: &T) -> Result<String> {
        let json = canonical_json(payload)?;
        Ok(self.sign_bytes(json.as_bytes()))
    }

    /// Checks a hex signature over raw bytes in constant time.
    pub fn verify_bytes(&self, bytes: &[u8], signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature.trim()) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(bytes);
        mac.verify_slice(&expected).is_ok()
    }

    /// Checks a hex signature over the payload's canonical JSON.
    ///
    /// A mismatch, malformed hex or unserializable payload all yield `false`.
    pub fn verify<T: Serialize + ?Sized>(&self, payload: &T, signature: &str) -> bool {
        match canonical_json(payload) {
            Ok(json) => self.verify_bytes(json.as_bytes(), signature),
            Err(_) => false,
        }
    }
}
