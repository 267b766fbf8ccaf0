//! Detectors
//!
//! Each detector produces an independent opinion (score + confidence) about
//! one transaction. `Ok(None)` means the detector abstains because its
//! inputs are missing; `Err` means it failed. The engine omits both.

mod geoip;
mod geolocation;
#[cfg(feature = "maxminddb")]
mod maxmind;
mod trust_score;
mod velocity;

pub use geoip::{GeoIpResolver, GeoRange, GeoRecord, RangeTableGeoIp};
pub use geolocation::{GeolocationDetector, GEOLOCATION_DETECTOR_ID};
#[cfg(feature = "maxminddb")]
pub use maxmind::{is_maxmind_path, MaxMindGeoIp};
pub use trust_score::{TrustScoreDetector, TRUST_SCORE_DETECTOR_ID};
pub use velocity::{velocity_key, VelocityClock, VelocityDetector, VELOCITY_DETECTOR_ID};

use crate::error::Result;
use async_trait::async_trait;
use riskgate_core::{DetectionContext, DetectorResult};

/// A unit of analysis registered with the detection engine
#[async_trait]
pub trait Detector: Send + Sync {
    /// Stable identifier, also used as `DetectorResult::detector_id`
    fn id(&self) -> &str;

    /// Lower values sort first in result lists
    fn priority(&self) -> i32 {
        100
    }

    /// Whether the detector applies to this context. Detectors that
    /// return false are skipped without counting as failures.
    fn validate(&self, _context: &DetectionContext) -> bool {
        true
    }

    async fn detect(&self, context: &DetectionContext) -> Result<Option<DetectorResult>>;
}
