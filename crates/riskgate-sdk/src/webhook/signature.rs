use crate::error::{Result, SdkError};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-riskgate-signature";
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Checks `t=<unix>,v1=<hex>` signatures over `"{t}.{body}"`
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Vec<u8>,
    tolerance_secs: i64,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish_non_exhaustive()
    }
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    pub fn with_tolerance(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    /// Header value for `body` signed at `timestamp`
    pub fn sign(&self, body: &[u8], timestamp: i64) -> Result<String> {
        let mac = self.mac(body, timestamp)?;
        Ok(format!(
            "t={},v1={}",
            timestamp,
            hex::encode(mac.finalize().into_bytes())
        ))
    }

    pub fn verify(&self, header: Option<&str>, body: &[u8]) -> Result<()> {
        self.verify_at(header, body, Utc::now().timestamp())
    }

    pub fn verify_at(&self, header: Option<&str>, body: &[u8], now: i64) -> Result<()> {
        let header = header.ok_or_else(|| invalid("missing signature header"))?;

        let mut timestamp = None;
        let mut candidates = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => {
                    timestamp = Some(
                        value
                            .parse::<i64>()
                            .map_err(|_| invalid("malformed timestamp"))?,
                    );
                }
                Some(("v1", value)) => candidates.push(value),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or_else(|| invalid("missing timestamp"))?;
        if candidates.is_empty() {
            return Err(invalid("missing v1 signature"));
        }
        if (now - timestamp).abs() > self.tolerance_secs {
            return Err(invalid("timestamp outside tolerance"));
        }

        for candidate in candidates {
            let Ok(expected) = hex::decode(candidate) else {
                continue;
            };
            // verify_slice compares in constant time
            if self.mac(body, timestamp)?.verify_slice(&expected).is_ok() {
                return Ok(());
            }
        }
        Err(invalid("signature mismatch"))
    }

    fn mac(&self, body: &[u8], timestamp: i64) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| SdkError::ConfigError("invalid webhook secret".to_string()))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        Ok(mac)
    }
}

fn invalid(reason: &str) -> SdkError {
    SdkError::SignatureError(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"{"id":"evt_1"}"#;
    const NOW: i64 = 1_760_000_000;

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new("whsec_test")
    }

    #[test]
    fn test_valid_signature() {
        let header = verifier().sign(BODY, NOW).unwrap();
        assert!(verifier().verify_at(Some(&header), BODY, NOW + 10).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let header = verifier().sign(BODY, NOW).unwrap();
        assert!(verifier()
            .verify_at(Some(&header), br#"{"id":"evt_2"}"#, NOW)
            .is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let header = SignatureVerifier::new("other").sign(BODY, NOW).unwrap();
        assert!(verifier().verify_at(Some(&header), BODY, NOW).is_err());
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let header = verifier().sign(BODY, NOW).unwrap();
        let err = verifier()
            .verify_at(Some(&header), BODY, NOW + DEFAULT_TOLERANCE_SECS + 1)
            .unwrap_err();
        assert!(err.to_string().contains("tolerance"));
    }

    #[test]
    fn test_missing_or_malformed_header() {
        assert!(verifier().verify_at(None, BODY, NOW).is_err());
        assert!(verifier().verify_at(Some("garbage"), BODY, NOW).is_err());
        assert!(verifier().verify_at(Some("t=abc,v1=00"), BODY, NOW).is_err());
        assert!(verifier().verify_at(Some("t=1760000000"), BODY, NOW).is_err());
    }

    #[test]
    fn test_any_matching_candidate_accepted() {
        let good = verifier().sign(BODY, NOW).unwrap();
        let v1 = good.split_once(",v1=").unwrap().1;
        let header = format!("t={},v1=deadbeef,v1={}", NOW, v1);
        assert!(verifier().verify_at(Some(&header), BODY, NOW).is_ok());
    }
}
