//! MaxMind geo-IP lookup
//!
//! Reads GeoLite2 / GeoIP2 Country databases (`.mmdb`). Enabled with the
//! `maxminddb` feature.

use super::geoip::{GeoIpResolver, GeoRecord};
use crate::error::{Result, RuntimeError};
use maxminddb::{geoip2, MaxMindDBError, Reader};
use std::net::IpAddr;
use std::path::Path;

/// Country database loaded fully into memory
pub struct MaxMindGeoIp {
    reader: Reader<Vec<u8>>,
}

impl MaxMindGeoIp {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = Reader::open_readfile(path).map_err(|e| {
            RuntimeError::Config(format!("cannot open geo database {}: {}", path.display(), e))
        })?;
        tracing::info!(
            "Loaded {} geo-ip database from {}",
            reader.metadata.database_type,
            path.display()
        );
        Ok(Self { reader })
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let reader = Reader::from_source(bytes)
            .map_err(|e| RuntimeError::Config(format!("invalid geo database: {}", e)))?;
        Ok(Self { reader })
    }
}

impl GeoIpResolver for MaxMindGeoIp {
    fn lookup(&self, ip: IpAddr) -> Option<GeoRecord> {
        let found: geoip2::Country = match self.reader.lookup(ip) {
            Ok(found) => found,
            Err(MaxMindDBError::AddressNotFoundError(_)) => return None,
            Err(e) => {
                tracing::warn!(%ip, "geo-ip lookup failed: {}", e);
                return None;
            }
        };

        let country = found.country.and_then(|c| c.iso_code)?;
        let anonymous_proxy = found
            .traits
            .and_then(|t| t.is_anonymous_proxy)
            .unwrap_or(false);
        Some(GeoRecord {
            country: country.to_ascii_uppercase(),
            anonymous_proxy,
        })
    }
}

/// Whether `path` names a MaxMind database rather than a JSON range table
pub fn is_maxmind_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mmdb"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mmdb_extension_detected() {
        assert!(is_maxmind_path(Path::new("/data/GeoLite2-Country.mmdb")));
        assert!(is_maxmind_path(Path::new("geo.MMDB")));
        assert!(!is_maxmind_path(Path::new("geo.json")));
        assert!(!is_maxmind_path(Path::new("mmdb")));
    }

    #[test]
    fn test_corrupt_database_rejected() {
        let err = MaxMindGeoIp::from_bytes(b"not a maxmind database".to_vec()).unwrap_err();
        assert!(matches!(err, RuntimeError::Config(_)));
    }

    #[test]
    fn test_missing_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = MaxMindGeoIp::open(dir.path().join("absent.mmdb")).unwrap_err();
        assert!(matches!(err, RuntimeError::Config(_)));
    }
}
