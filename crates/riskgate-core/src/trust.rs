//! Customer trust scores

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TRUST_SCORE: u8 = 50;
pub const WHITELIST_TRUST_SCORE: u8 = 90;
pub const BLACKLIST_TRUST_SCORE: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustStatus {
    Normal,
    Whitelisted,
    Blacklisted,
}

impl TrustStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrustStatus::Normal => "normal",
            TrustStatus::Whitelisted => "whitelisted",
            TrustStatus::Blacklisted => "blacklisted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(TrustStatus::Normal),
            "whitelisted" => Some(TrustStatus::Whitelisted),
            "blacklisted" => Some(TrustStatus::Blacklisted),
            _ => None,
        }
    }
}

/// Events that move a customer's trust score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustScoreEvent {
    SuccessfulPayment,
    Chargeback,
    BlockedTransaction,
    Whitelisted,
    Blacklisted,
}

impl TrustScoreEvent {
    /// Relative adjustment, `None` for events that set an absolute value
    pub fn delta(&self) -> Option<i32> {
        match self {
            TrustScoreEvent::SuccessfulPayment => Some(5),
            TrustScoreEvent::Chargeback => Some(-50),
            TrustScoreEvent::BlockedTransaction => Some(-10),
            TrustScoreEvent::Whitelisted | TrustScoreEvent::Blacklisted => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrustScoreEvent::SuccessfulPayment => "successful_payment",
            TrustScoreEvent::Chargeback => "chargeback",
            TrustScoreEvent::BlockedTransaction => "blocked_transaction",
            TrustScoreEvent::Whitelisted => "whitelisted",
            TrustScoreEvent::Blacklisted => "blacklisted",
        }
    }
}

/// Persisted reputation row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerTrustScore {
    pub organization_id: String,
    pub customer_id: String,
    /// Always within 0..=100
    pub score: u8,
    pub status: TrustStatus,
    pub transaction_count: u32,
    pub fraud_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CustomerTrustScore {
    pub fn new(organization_id: impl Into<String>, customer_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            organization_id: organization_id.into(),
            customer_id: customer_id.into(),
            score: DEFAULT_TRUST_SCORE,
            status: TrustStatus::Normal,
            transaction_count: 0,
            fraud_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply an event in place. The score never leaves 0..=100.
    pub fn apply(&mut self, event: TrustScoreEvent) {
        match event {
            TrustScoreEvent::Whitelisted => {
                self.score = WHITELIST_TRUST_SCORE;
                self.status = TrustStatus::Whitelisted;
            }
            TrustScoreEvent::Blacklisted => {
                self.score = BLACKLIST_TRUST_SCORE;
                self.status = TrustStatus::Blacklisted;
            }
            relative => {
                let delta = relative.delta().unwrap_or(0);
                self.score = (self.score as i32 + delta).clamp(0, 100) as u8;
                match relative {
                    TrustScoreEvent::SuccessfulPayment => {
                        self.transaction_count = self.transaction_count.saturating_add(1);
                    }
                    TrustScoreEvent::Chargeback => {
                        self.fraud_count = self.fraud_count.saturating_add(1);
                    }
                    _ => {}
                }
            }
        }
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_with(score: u8) -> CustomerTrustScore {
        let mut row = CustomerTrustScore::new("org", "cus");
        row.score = score;
        row
    }

    #[test]
    fn test_new_row_is_neutral() {
        let row = CustomerTrustScore::new("org", "cus");
        assert_eq!(row.score, DEFAULT_TRUST_SCORE);
        assert_eq!(row.status, TrustStatus::Normal);
    }

    #[test]
    fn test_clamped_at_upper_bound() {
        let mut row = row_with(98);
        row.apply(TrustScoreEvent::SuccessfulPayment);
        assert_eq!(row.score, 100);
        assert_eq!(row.transaction_count, 1);
    }

    #[test]
    fn test_clamped_at_lower_bound() {
        let mut row = row_with(5);
        row.apply(TrustScoreEvent::Chargeback);
        assert_eq!(row.score, 0);
        assert_eq!(row.fraud_count, 1);
    }

    #[test]
    fn test_clamp_holds_for_every_event_and_start() {
        let events = [
            TrustScoreEvent::SuccessfulPayment,
            TrustScoreEvent::Chargeback,
            TrustScoreEvent::BlockedTransaction,
            TrustScoreEvent::Whitelisted,
            TrustScoreEvent::Blacklisted,
        ];
        for start in 0..=100u8 {
            for event in events {
                let mut row = row_with(start);
                row.apply(event);
                assert!(row.score <= 100, "{:?} from {}", event, start);
            }
        }
    }

    #[test]
    fn test_manual_events_set_absolute_values() {
        let mut row = row_with(12);
        row.apply(TrustScoreEvent::Whitelisted);
        assert_eq!(row.score, 90);
        assert_eq!(row.status, TrustStatus::Whitelisted);

        row.apply(TrustScoreEvent::Blacklisted);
        assert_eq!(row.score, 0);
        assert_eq!(row.status, TrustStatus::Blacklisted);
    }
}
