use crate::domain::ids::ExternalRef;
use crate::domain::payment::{GatewayEvent, GatewayEventKind};
use crate::error::{GymError, Result};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Deserialize)]
struct CallbackBody {
    external_id: Option<String>,
    reference_id: Option<String>,
    status: String,
    amount: Option<Decimal>,
}

/// Authenticates and decodes gateway callback deliveries.
///
/// The signature is an HMAC-SHA256 over the exact raw body bytes, hex
/// encoded, computed with the secret shared with the gateway. Verification
/// happens before any parsing: a bad signature rejects the delivery with no
/// state touched anywhere.
pub struct WebhookDecoder {
    secret: Vec<u8>,
}

impl WebhookDecoder {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Computes the hex signature for a payload. The test double for what
    /// the gateway does on its side before delivering a callback.
    pub fn sign(&self, payload: &[u8]) -> Result<String> {
        let mut mac = self.mac()?;
        mac.update(payload);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Verifies the signature over the raw body and decodes the callback.
    ///
    /// Unknown status keywords decode to an unrecognized event rather than
    /// an error; the processor logs and acknowledges those so the gateway
    /// stops redelivering.
    pub fn decode(&self, raw_body: &[u8], signature_hex: &str) -> Result<GatewayEvent> {
        self.verify(raw_body, signature_hex)?;

        let payload: serde_json::Value = serde_json::from_slice(raw_body)
            .map_err(|e| GymError::Validation(format!("malformed callback body: {e}")))?;
        let body: CallbackBody = serde_json::from_value(payload.clone())
            .map_err(|e| GymError::Validation(format!("malformed callback body: {e}")))?;

        let external_id = body
            .external_id
            .or(body.reference_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                GymError::Validation("callback carries no external_id or reference_id".to_string())
            })?;

        Ok(GatewayEvent {
            external_ref: ExternalRef::new(external_id),
            kind: GatewayEventKind::from_keyword(&body.status),
            amount: body.amount,
            payload,
        })
    }

    fn verify(&self, raw_body: &[u8], signature_hex: &str) -> Result<()> {
        let signature = hex::decode(signature_hex).map_err(|_| GymError::InvalidSignature)?;
        let mut mac = self.mac()?;
        mac.update(raw_body);
        // verify_slice is constant-time.
        mac.verify_slice(&signature)
            .map_err(|_| GymError::InvalidSignature)
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret).map_err(|e| GymError::Internal(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn decoder() -> WebhookDecoder {
        WebhookDecoder::new(b"test-secret".to_vec())
    }

    #[test]
    fn test_decode_valid_callback() {
        let decoder = decoder();
        let body = br#"{"external_id":"gym-42","status":"PAID","amount":"250.0"}"#;
        let signature = decoder.sign(body).unwrap();

        let event = decoder.decode(body, &signature).unwrap();
        assert_eq!(event.external_ref, ExternalRef::new("gym-42"));
        assert_eq!(event.kind, GatewayEventKind::Paid);
        assert_eq!(event.amount, Some(dec!(250.0)));
    }

    #[test]
    fn test_reference_id_fallback() {
        let decoder = decoder();
        let body = br#"{"reference_id":"gym-7","status":"EXPIRED"}"#;
        let signature = decoder.sign(body).unwrap();

        let event = decoder.decode(body, &signature).unwrap();
        assert_eq!(event.external_ref, ExternalRef::new("gym-7"));
        assert_eq!(event.kind, GatewayEventKind::Expired);
        assert_eq!(event.amount, None);
    }

    #[test]
    fn test_tampered_body_is_rejected() {
        let decoder = decoder();
        let body = br#"{"external_id":"gym-42","status":"PAID"}"#;
        let signature = decoder.sign(body).unwrap();

        let tampered = br#"{"external_id":"gym-42","status":"FAILED"}"#;
        assert!(matches!(
            decoder.decode(tampered, &signature),
            Err(GymError::InvalidSignature)
        ));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let body = br#"{"external_id":"gym-42","status":"PAID"}"#;
        let signature = WebhookDecoder::new(b"other-secret".to_vec()).sign(body).unwrap();

        assert!(matches!(
            decoder().decode(body, &signature),
            Err(GymError::InvalidSignature)
        ));
    }

    #[test]
    fn test_garbage_signature_is_rejected() {
        let body = br#"{"external_id":"gym-42","status":"PAID"}"#;
        assert!(matches!(
            decoder().decode(body, "not-hex"),
            Err(GymError::InvalidSignature)
        ));
    }

    #[test]
    fn test_unknown_status_decodes_as_unrecognized() {
        let decoder = decoder();
        let body = br#"{"external_id":"gym-42","status":"REFUND_REQUESTED"}"#;
        let signature = decoder.sign(body).unwrap();

        let event = decoder.decode(body, &signature).unwrap();
        assert_eq!(
            event.kind,
            GatewayEventKind::Unrecognized("REFUND_REQUESTED".to_string())
        );
    }

    #[test]
    fn test_missing_reference_is_a_validation_error() {
        let decoder = decoder();
        let body = br#"{"status":"PAID"}"#;
        let signature = decoder.sign(body).unwrap();

        assert!(matches!(
            decoder.decode(body, &signature),
            Err(GymError::Validation(_))
        ));
    }
}
