use hmac::{Hmac, Mac};
use sha2::Sha256;

use application::gateways::WebhookSignatureVerifier;

type HmacSha256 = Hmac<Sha256>;

/// Hex HMAC-SHA256 of the raw request body with a shared secret.
pub struct HmacWebhookVerifier {
    secret: String,
}

impl HmacWebhookVerifier {
    pub fn new(secret: String) -> Self {
        Self { secret }
    }

    pub fn sign(&self, payload: &[u8]) -> Option<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes()).ok()?;
        mac.update(payload);
        Some(hex::encode(mac.finalize().into_bytes()))
    }
}

impl WebhookSignatureVerifier for HmacWebhookVerifier {
    fn verify(&self, payload: &[u8], signature: &str) -> bool {
        if self.secret.is_empty() {
            return false;
        }
        let signature = signature.trim();
        let signature = signature.strip_prefix("sha256=").unwrap_or(signature);
        let Ok(provided) = hex::decode(signature) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(self.secret.as_bytes()) else {
            return false;
        };
        mac.update(payload);
        // Constant-time comparison.
        mac.verify_slice(&provided).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"{"eventId":"evt_1","eventType":"usage"}"#;

    #[test]
    fn accepts_own_signature() {
        let verifier = HmacWebhookVerifier::new("shh".to_string());
        let signature = verifier.sign(BODY).unwrap();
        assert!(verifier.verify(BODY, &signature));
        assert!(verifier.verify(BODY, &signature.to_uppercase()));
        assert!(verifier.verify(BODY, &format!("sha256={signature}")));
    }

    #[test]
    fn rejects_other_secret_or_body() {
        let verifier = HmacWebhookVerifier::new("shh".to_string());
        let other = HmacWebhookVerifier::new("loud".to_string());
        let signature = other.sign(BODY).unwrap();
        assert!(!verifier.verify(BODY, &signature));

        let signature = verifier.sign(BODY).unwrap();
        assert!(!verifier.verify(b"{}", &signature));
    }

    #[test]
    fn rejects_garbage_and_empty_secret() {
        let verifier = HmacWebhookVerifier::new("shh".to_string());
        assert!(!verifier.verify(BODY, "not-hex"));
        assert!(!verifier.verify(BODY, ""));

        let unset = HmacWebhookVerifier::new(String::new());
        assert!(!unset.verify(BODY, &unset.sign(BODY).unwrap()));
    }
}
