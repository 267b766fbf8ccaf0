//! Offline geo-IP lookup
//!
//! Range table of `[start, end] -> country` loaded from a local JSON file:
//!
//! ```json
//! [
//!   { "start": "81.2.69.0", "end": "81.2.69.255", "country": "GB" },
//!   { "start": "185.220.100.0", "end": "185.220.103.255", "country": "DE", "anonymous_proxy": true }
//! ]
//! ```

use crate::error::{Result, RuntimeError};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;

/// What the lookup knows about an address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoRecord {
    /// ISO 3166-1 alpha-2, upper-case
    pub country: String,
    /// Known VPN / anonymizing proxy range
    pub anonymous_proxy: bool,
}

/// Local geo-IP database
pub trait GeoIpResolver: Send + Sync {
    fn lookup(&self, ip: IpAddr) -> Option<GeoRecord>;
}

/// One row of the range file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoRange {
    pub start: IpAddr,
    pub end: IpAddr,
    pub country: String,
    #[serde(default)]
    pub anonymous_proxy: bool,
}

#[derive(Debug, Clone)]
struct IndexedRange {
    start: u128,
    end: u128,
    record: GeoRecord,
}

/// Sorted, non-overlapping ranges searched by binary search
#[derive(Debug, Clone, Default)]
pub struct RangeTableGeoIp {
    ranges: Vec<IndexedRange>,
}

fn ip_key(ip: IpAddr) -> u128 {
    match ip {
        IpAddr::V4(v4) => u128::from(v4.to_ipv6_mapped()),
        IpAddr::V6(v6) => u128::from(v6),
    }
}

impl RangeTableGeoIp {
    pub fn from_ranges(ranges: Vec<GeoRange>) -> Result<Self> {
        let mut indexed = Vec::with_capacity(ranges.len());
        for range in ranges {
            let (start, end) = (ip_key(range.start), ip_key(range.end));
            if start > end {
                return Err(RuntimeError::Config(format!(
                    "geo range {} - {} is inverted",
                    range.start, range.end
                )));
            }
            indexed.push(IndexedRange {
                start,
                end,
                record: GeoRecord {
                    country: range.country.to_ascii_uppercase(),
                    anonymous_proxy: range.anonymous_proxy,
                },
            });
        }
        indexed.sort_by_key(|r| r.start);

        if let Some(pair) = indexed.windows(2).find(|w| w[1].start <= w[0].end) {
            return Err(RuntimeError::Config(format!(
                "geo ranges overlap near {}",
                pair[1].record.country
            )));
        }
        Ok(Self { ranges: indexed })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let ranges: Vec<GeoRange> = serde_json::from_str(json)?;
        Self::from_ranges(ranges)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RuntimeError::Config(format!("cannot read geo database {}: {}", path.display(), e))
        })?;
        let table = Self::from_json(&content)?;
        tracing::info!("Loaded {} geo-ip ranges from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

impl GeoIpResolver for RangeTableGeoIp {
    fn lookup(&self, ip: IpAddr) -> Option<GeoRecord> {
        let key = ip_key(ip);
        let idx = self.ranges.partition_point(|r| r.start <= key);
        let candidate = self.ranges.get(idx.checked_sub(1)?)?;
        (key <= candidate.end).then(|| candidate.record.clone())
    }
}
