// libs/payment-cell/src/services/signature.rs
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use crate::models::PaymentError;

type HmacSha256 = Hmac<Sha256>;

/// Verify the gateway's payment signature: a hex-encoded HMAC-SHA256 over
/// `order_id|payment_id` keyed with the merchant secret. Comparison goes
/// through `Mac::verify_slice`, which is constant-time.
pub fn verify_payment_signature(
    order_id: &str,
    payment_id: &str,
    signature: &str,
    key_secret: &str,
) -> Result<(), PaymentError> {
    if key_secret.is_empty() {
        return Err(PaymentError::NotConfigured);
    }

    let provided = decode_hex(signature).ok_or_else(|| {
        debug!("Payment signature is not valid hex");
        PaymentError::SignatureMismatch
    })?;

    let mut mac = HmacSha256::new_from_slice(key_secret.as_bytes())
        .map_err(|_| PaymentError::SignatureMismatch)?;
    mac.update(format!("{}|{}", order_id, payment_id).as_bytes());

    mac.verify_slice(&provided).map_err(|_| {
        debug!("Payment signature verification failed for order {}", order_id);
        PaymentError::SignatureMismatch
    })
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if !s.is_ascii() || s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(order_id: &str, payment_id: &str, secret: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
        mac.finalize()
            .into_bytes()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    #[test]
    fn accepts_genuine_signature() {
        let sig = sign("order_abc", "pay_xyz", "secret");
        assert!(verify_payment_signature("order_abc", "pay_xyz", &sig, "secret").is_ok());
    }

    #[test]
    fn rejects_tampered_payment_id() {
        let sig = sign("order_abc", "pay_xyz", "secret");
        let err = verify_payment_signature("order_abc", "pay_xyZ", &sig, "secret");
        assert!(matches!(err, Err(PaymentError::SignatureMismatch)));
    }

    #[test]
    fn rejects_single_flipped_signature_character() {
        let sig = sign("order_abc", "pay_xyz", "secret");
        let mut chars: Vec<char> = sig.chars().collect();
        chars[0] = if chars[0] == '0' { '1' } else { '0' };
        let tampered: String = chars.into_iter().collect();
        let err = verify_payment_signature("order_abc", "pay_xyz", &tampered, "secret");
        assert!(matches!(err, Err(PaymentError::SignatureMismatch)));
    }

    #[test]
    fn rejects_non_hex_signature() {
        let err = verify_payment_signature("order_abc", "pay_xyz", "not-hex!", "secret");
        assert!(matches!(err, Err(PaymentError::SignatureMismatch)));
    }

    #[test]
    fn empty_secret_is_a_configuration_error() {
        let err = verify_payment_signature("order_abc", "pay_xyz", "00", "");
        assert!(matches!(err, Err(PaymentError::NotConfigured)));
    }
}
