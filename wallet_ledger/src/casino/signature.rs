//! Request and response signing for the casino one-wallet protocol.
//!
//! `hmac = HMAC_SHA256(key = SHA256(secret), message)`, hex encoded. The
//! message concatenates the values of every field except `hmac` in ascending
//! key order. Array elements are flattened in place, objects contributing
//! their own key-sorted values.

use hmac::{Hmac, Mac};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use super::errors::CasinoError;

/// Name of the signature field
pub const SIGNATURE_FIELD: &str = "hmac";

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies protocol bodies
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
    /// Build a signer from the shared secret
    pub fn new(secret: &str) -> Result<Self, CasinoError> {
        let key = Sha256::digest(secret.as_bytes());
        let mac = HmacSha256::new_from_slice(&key).map_err(|_| CasinoError::InvalidKey)?;
        Ok(Self { mac })
    }

    /// Hex signature of a body, ignoring any `hmac` field it carries
    pub fn sign(&self, body: &Map<String, Value>) -> String {
        let mut mac = self.mac.clone();
        mac.update(canonical_message(body).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Verify the `hmac` field of a body
    ///
    /// # Errors
    ///
    /// * `CasinoError::Authentication` - Signature missing, malformed or wrong
    pub fn verify(&self, body: &Map<String, Value>) -> Result<(), CasinoError> {
        let provided = body
            .get(SIGNATURE_FIELD)
            .and_then(Value::as_str)
            .ok_or(CasinoError::Authentication)?;
        let provided = hex::decode(provided.trim()).map_err(|_| CasinoError::Authentication)?;

        let mut mac = self.mac.clone();
        mac.update(canonical_message(body).as_bytes());
        mac.verify_slice(&provided)
            .map_err(|_| CasinoError::Authentication)
    }

    /// Attach a fresh signature to an outbound body
    pub fn seal(&self, mut body: Map<String, Value>) -> Value {
        body.remove(SIGNATURE_FIELD);
        let signature = self.sign(&body);
        body.insert(SIGNATURE_FIELD.to_string(), Value::String(signature));
        Value::Object(body)
    }
}

/// Concatenated field values in signing order
pub fn canonical_message(body: &Map<String, Value>) -> String {
    let mut out = String::new();
    let mut keys: Vec<&String> = body.keys().filter(|k| *k != SIGNATURE_FIELD).collect();
    keys.sort();
    for key in keys {
        push_value(&mut out, &body[key.as_str()]);
    }
    out
}

fn push_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => {}
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => out.push_str(s),
        Value::Array(items) => items.iter().for_each(|item| push_value(out, item)),
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                push_value(out, &map[key.as_str()]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_canonical_message_sorts_keys_and_skips_hmac() {
        let body = object(json!({
            "type": "debit",
            "amount": "50.00",
            "hmac": "ignored",
            "userid": "u1",
        }));
        assert_eq!(canonical_message(&body), "50.00debitu1");
    }

    #[test]
    fn test_canonical_message_flattens_arrays() {
        let body = object(json!({
            "type": "roundinfo",
            "actions": [
                { "timestamp": "t1", "amount": 5 },
                { "timestamp": "t2", "amount": 7 },
            ],
        }));
        assert_eq!(canonical_message(&body), "5t17t2roundinfo");
    }

    #[test]
    fn test_seal_then_verify() {
        let signer = Signer::new("a-long-shared-secret").unwrap();
        let sealed = signer.seal(object(json!({ "status": "OK", "balance": "450.00" })));
        let sealed = object(sealed);
        assert_eq!(sealed[SIGNATURE_FIELD].as_str().unwrap().len(), 64);
        assert!(signer.verify(&sealed).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let signer = Signer::new("a-long-shared-secret").unwrap();
        let mut sealed = object(signer.seal(object(json!({ "amount": "10.00" }))));
        sealed.insert("amount".into(), json!("99.00"));
        assert!(matches!(signer.verify(&sealed), Err(CasinoError::Authentication)));
    }

    #[test]
    fn test_missing_signature_rejected() {
        let signer = Signer::new("a-long-shared-secret").unwrap();
        let body = object(json!({ "type": "ping" }));
        assert!(matches!(signer.verify(&body), Err(CasinoError::Authentication)));
    }

    #[test]
    fn test_key_is_sha256_of_secret() {
        let signer = Signer::new("secret").unwrap();
        let body = object(json!({ "type": "ping" }));

        let key = Sha256::digest(b"secret");
        let mut mac = HmacSha256::new_from_slice(&key).unwrap();
        mac.update(b"ping");
        assert_eq!(signer.sign(&body), hex::encode(mac.finalize().into_bytes()));
    }
}
