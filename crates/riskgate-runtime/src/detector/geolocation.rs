use super::geoip::GeoIpResolver;
use super::Detector;
use crate::error::Result;
use async_trait::async_trait;
use riskgate_core::{DetectionContext, DetectorResult};
use std::net::IpAddr;
use std::sync::Arc;

pub const GEOLOCATION_DETECTOR_ID: &str = "geolocation";

/// Metadata keys the ingestion layer may set when the provider flags a
/// VPN or proxy connection
const VPN_METADATA_KEYS: [&str; 2] = ["is_vpn", "is_proxy"];

/// Compares the customer's IP country with the card-issuing country.
///
/// Abstains when the IP or card country is missing, the IP cannot be
/// resolved, or no geo database is loaded.
pub struct GeolocationDetector {
    resolver: Option<Arc<dyn GeoIpResolver>>,
}

impl GeolocationDetector {
    pub fn new(resolver: Arc<dyn GeoIpResolver>) -> Self {
        Self {
            resolver: Some(resolver),
        }
    }

    /// Detector without a geo database; it abstains on every call
    pub fn unavailable() -> Self {
        Self { resolver: None }
    }
}

#[async_trait]
impl Detector for GeolocationDetector {
    fn id(&self) -> &str {
        GEOLOCATION_DETECTOR_ID
    }

    fn priority(&self) -> i32 {
        20
    }

    async fn detect(&self, context: &DetectionContext) -> Result<Option<DetectorResult>> {
        let Some(resolver) = &self.resolver else {
            tracing::debug!("geo-ip database not loaded, skipping");
            return Ok(None);
        };
        let (Some(raw_ip), Some(card_country)) = (&context.customer_ip, &context.card_country)
        else {
            return Ok(None);
        };
        let Ok(ip) = raw_ip.trim().parse::<IpAddr>() else {
            tracing::debug!(ip = %raw_ip, "unparsable customer ip");
            return Ok(None);
        };
        let Some(record) = resolver.lookup(ip) else {
            return Ok(None);
        };

        let card_country = card_country.to_ascii_uppercase();
        let vpn = record.anonymous_proxy
            || VPN_METADATA_KEYS.iter().any(|k| context.metadata_flag(k));

        let result = if record.country == card_country {
            DetectorResult::new(
                GEOLOCATION_DETECTOR_ID,
                0.0,
                90.0,
                format!("IP country matches card country ({})", card_country),
            )
        } else if vpn {
            DetectorResult::new(
                GEOLOCATION_DETECTOR_ID,
                15.0,
                60.0,
                format!(
                    "IP country {} differs from card country {} behind VPN/proxy",
                    record.country, card_country
                ),
            )
        } else {
            DetectorResult::new(
                GEOLOCATION_DETECTOR_ID,
                30.0,
                85.0,
                format!(
                    "IP country {} differs from card country {}",
                    record.country, card_country
                ),
            )
        };

        Ok(Some(
            result
                .with_metadata("ip_country", record.country.clone())
                .with_metadata("card_country", card_country)
                .with_metadata("vpn", vpn),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::RangeTableGeoIp;

    fn detector() -> GeolocationDetector {
        let table = RangeTableGeoIp::from_json(
            r#"[
                { "start": "3.0.0.0", "end": "3.255.255.255", "country": "US" },
                { "start": "2.16.0.0", "end": "2.16.255.255", "country": "FR" },
                { "start": "185.220.100.0", "end": "185.220.103.255", "country": "DE", "anonymous_proxy": true }
            ]"#,
        )
        .unwrap();
        GeolocationDetector::new(Arc::new(table))
    }

    fn ctx(ip: Option<&str>, card: Option<&str>) -> DetectionContext {
        let mut b = DetectionContext::builder("org_1", "pi_1", 1000, "USD");
        if let Some(ip) = ip {
            b = b.customer_ip(ip);
        }
        if let Some(card) = card {
            b = b.card_country(card);
        }
        b.build()
    }

    #[tokio::test]
    async fn test_us_ip_with_ng_card_is_high() {
        let result = detector()
            .detect(&ctx(Some("3.1.2.3"), Some("NG")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.score, 30.0);
        assert_eq!(
            result.metadata_value("ip_country").and_then(|v| v.as_str()),
            Some("US")
        );
    }

    #[tokio::test]
    async fn test_matching_countries_are_low() {
        let result = detector()
            .detect(&ctx(Some("2.16.4.4"), Some("fr")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.score, 0.0);
    }

    #[tokio::test]
    async fn test_vpn_range_softens_mismatch() {
        let result = detector()
            .detect(&ctx(Some("185.220.101.9"), Some("US")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.score, 15.0);
    }

    #[tokio::test]
    async fn test_vpn_metadata_softens_mismatch() {
        let ctx = DetectionContext::builder("org_1", "pi_1", 1000, "USD")
            .customer_ip("3.1.2.3")
            .card_country("GB")
            .metadata("is_vpn", true)
            .build();
        let result = detector().detect(&ctx).await.unwrap().unwrap();
        assert_eq!(result.score, 15.0);
    }

    #[tokio::test]
    async fn test_abstains_on_missing_or_unknown_data() {
        let d = detector();
        assert!(d.detect(&ctx(None, Some("US"))).await.unwrap().is_none());
        assert!(d.detect(&ctx(Some("3.1.2.3"), None)).await.unwrap().is_none());
        assert!(d.detect(&ctx(Some("not-an-ip"), Some("US"))).await.unwrap().is_none());
        assert!(d.detect(&ctx(Some("9.9.9.9"), Some("US"))).await.unwrap().is_none());

        let offline = GeolocationDetector::unavailable();
        assert!(offline.detect(&ctx(Some("3.1.2.3"), Some("US"))).await.unwrap().is_none());
    }
}
