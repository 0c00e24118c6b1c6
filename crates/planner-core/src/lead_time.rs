//! Notification lead times — how long before an occurrence starts a push
//! notification fires.
//!
//! The vocabulary is closed: exactly six values, identified on the wire by
//! the integer codes 0–5. Anything else is a decode error, never a silent
//! fallback.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A recognized notification lead time.
///
/// Serialized as its bare integer code (0–5) in both the HTTP API and push
/// message payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum LeadTime {
    FiveMinutes,
    TenMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    Hour,
    Day,
}

/// A lead-time code or duration outside the six-value vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported lead time: {0}")]
pub struct UnknownLeadTime(pub String);

impl LeadTime {
    /// All recognized values, in wire-code order.
    pub const ALL: [LeadTime; 6] = [
        LeadTime::FiveMinutes,
        LeadTime::TenMinutes,
        LeadTime::FifteenMinutes,
        LeadTime::ThirtyMinutes,
        LeadTime::Hour,
        LeadTime::Day,
    ];

    /// Wire code (0–5) used by clients and push payloads.
    pub fn code(self) -> u8 {
        match self {
            LeadTime::FiveMinutes => 0,
            LeadTime::TenMinutes => 1,
            LeadTime::FifteenMinutes => 2,
            LeadTime::ThirtyMinutes => 3,
            LeadTime::Hour => 4,
            LeadTime::Day => 5,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, UnknownLeadTime> {
        match code {
            0 => Ok(LeadTime::FiveMinutes),
            1 => Ok(LeadTime::TenMinutes),
            2 => Ok(LeadTime::FifteenMinutes),
            3 => Ok(LeadTime::ThirtyMinutes),
            4 => Ok(LeadTime::Hour),
            5 => Ok(LeadTime::Day),
            other => Err(UnknownLeadTime(format!("code {}", other))),
        }
    }

    /// How far ahead of the occurrence start this lead time fires.
    pub fn duration(self) -> Duration {
        match self {
            LeadTime::FiveMinutes => Duration::minutes(5),
            LeadTime::TenMinutes => Duration::minutes(10),
            LeadTime::FifteenMinutes => Duration::minutes(15),
            LeadTime::ThirtyMinutes => Duration::minutes(30),
            LeadTime::Hour => Duration::hours(1),
            LeadTime::Day => Duration::hours(24),
        }
    }

    pub fn seconds(self) -> i64 {
        self.duration().num_seconds()
    }

    /// Inverse of [`seconds`](Self::seconds) — used when decoding stored rows.
    pub fn from_seconds(secs: i64) -> Result<Self, UnknownLeadTime> {
        Self::ALL
            .into_iter()
            .find(|lt| lt.seconds() == secs)
            .ok_or_else(|| UnknownLeadTime(format!("{} seconds", secs)))
    }
}

impl From<LeadTime> for u8 {
    fn from(lt: LeadTime) -> u8 {
        lt.code()
    }
}

impl TryFrom<u8> for LeadTime {
    type Error = UnknownLeadTime;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        LeadTime::from_code(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for lt in LeadTime::ALL {
            assert_eq!(LeadTime::from_code(lt.code()).unwrap(), lt);
        }
    }

    #[test]
    fn seconds_round_trip() {
        for lt in LeadTime::ALL {
            assert_eq!(LeadTime::from_seconds(lt.seconds()).unwrap(), lt);
        }
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert!(LeadTime::from_code(6).is_err());
        assert!(LeadTime::from_seconds(42).is_err());
    }

    #[test]
    fn day_is_the_longest_lead() {
        assert_eq!(LeadTime::Day.duration(), Duration::hours(24));
        let max = LeadTime::ALL.iter().map(|lt| lt.seconds()).max().unwrap();
        assert_eq!(max, LeadTime::Day.seconds());
    }

    #[test]
    fn serde_uses_bare_codes() {
        let json = serde_json::to_string(&vec![LeadTime::FiveMinutes, LeadTime::Day]).unwrap();
        assert_eq!(json, "[0,5]");
        let back: Vec<LeadTime> = serde_json::from_str("[2,4]").unwrap();
        assert_eq!(back, vec![LeadTime::FifteenMinutes, LeadTime::Hour]);
        assert!(serde_json::from_str::<LeadTime>("9").is_err());
    }
}
