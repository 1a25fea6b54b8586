//! Trading cadence: which aligned days query the policy.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("invalid trade frequency '{0}' (expected e.g. 1D, 5D, 1W, 1M)")]
pub struct FrequencyError(pub String);

/// How often the policy is evaluated.
///
/// Days outside the cadence are pass-through: holdings carry forward and are
/// re-marked, but no query and no trade happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TradeFrequency {
    /// Every aligned day ("1D").
    #[default]
    Daily,
    /// Every n-th aligned day, starting with the first ("nD").
    EveryNDays(u32),
    /// First aligned day of each ISO week ("1W").
    Weekly,
    /// First aligned day of each calendar month ("1M").
    Monthly,
}

impl TradeFrequency {
    /// Whether the day at `index` (0-based position on the aligned timeline)
    /// is a trading day. `prev` is the previous aligned date, if any.
    pub fn is_trading_day(&self, index: usize, date: NaiveDate, prev: Option<NaiveDate>) -> bool {
        match self {
            TradeFrequency::Daily => true,
            TradeFrequency::EveryNDays(n) => index % (*n).max(1) as usize == 0,
            TradeFrequency::Weekly => prev.map_or(true, |p| p.iso_week() != date.iso_week()),
            TradeFrequency::Monthly => {
                prev.map_or(true, |p| (p.year(), p.month()) != (date.year(), date.month()))
            }
        }
    }
}

impl FromStr for TradeFrequency {
    type Err = FrequencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_uppercase();
        match norm.as_str() {
            "D" | "DAILY" => return Ok(TradeFrequency::Daily),
            "W" | "WEEKLY" => return Ok(TradeFrequency::Weekly),
            "M" | "MONTHLY" => return Ok(TradeFrequency::Monthly),
            _ => {}
        }

        let err = || FrequencyError(s.to_string());
        let unit = norm.chars().last().ok_or_else(err)?;
        let count: u32 = norm
            .strip_suffix(unit)
            .ok_or_else(err)?
            .parse()
            .map_err(|_| err())?;
        match (count, unit) {
            (0, _) => Err(err()),
            (1, 'D') => Ok(TradeFrequency::Daily),
            (n, 'D') => Ok(TradeFrequency::EveryNDays(n)),
            (1, 'W') => Ok(TradeFrequency::Weekly),
            (1, 'M') => Ok(TradeFrequency::Monthly),
            _ => Err(err()),
        }
    }
}

impl fmt::Display for TradeFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeFrequency::Daily => write!(f, "1D"),
            TradeFrequency::EveryNDays(n) => write!(f, "{n}D"),
            TradeFrequency::Weekly => write!(f, "1W"),
            TradeFrequency::Monthly => write!(f, "1M"),
        }
    }
}

impl TryFrom<String> for TradeFrequency {
    type Error = FrequencyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TradeFrequency> for String {
    fn from(f: TradeFrequency) -> Self {
        f.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn parses_common_spellings() {
        assert_eq!("1D".parse(), Ok(TradeFrequency::Daily));
        assert_eq!("daily".parse(), Ok(TradeFrequency::Daily));
        assert_eq!("5d".parse(), Ok(TradeFrequency::EveryNDays(5)));
        assert_eq!("1W".parse(), Ok(TradeFrequency::Weekly));
        assert_eq!("M".parse(), Ok(TradeFrequency::Monthly));
    }

    #[test]
    fn rejects_garbage() {
        assert!("".parse::<TradeFrequency>().is_err());
        assert!("0D".parse::<TradeFrequency>().is_err());
        assert!("2W".parse::<TradeFrequency>().is_err());
        assert!("xD".parse::<TradeFrequency>().is_err());
        assert!("1H".parse::<TradeFrequency>().is_err());
        assert!("5€".parse::<TradeFrequency>().is_err());
        assert!("€".parse::<TradeFrequency>().is_err());
    }

    #[test]
    fn display_roundtrips() {
        for f in [
            TradeFrequency::Daily,
            TradeFrequency::EveryNDays(3),
            TradeFrequency::Weekly,
            TradeFrequency::Monthly,
        ] {
            assert_eq!(f.to_string().parse::<TradeFrequency>(), Ok(f));
        }
    }

    #[test]
    fn every_n_days_counts_aligned_index() {
        let f = TradeFrequency::EveryNDays(3);
        let flags: Vec<bool> = (0..7)
            .map(|i| f.is_trading_day(i, d(2024, 1, 1), None))
            .collect();
        assert_eq!(flags, vec![true, false, false, true, false, false, true]);
    }

    #[test]
    fn weekly_trades_on_first_day_of_iso_week() {
        let f = TradeFrequency::Weekly;
        // Fri 2024-01-05 -> Mon 2024-01-08 crosses a week boundary
        assert!(f.is_trading_day(1, d(2024, 1, 8), Some(d(2024, 1, 5))));
        assert!(!f.is_trading_day(2, d(2024, 1, 9), Some(d(2024, 1, 8))));
        assert!(f.is_trading_day(0, d(2024, 1, 9), None));
    }

    #[test]
    fn monthly_trades_on_first_day_of_month() {
        let f = TradeFrequency::Monthly;
        assert!(f.is_trading_day(5, d(2024, 2, 1), Some(d(2024, 1, 31))));
        assert!(!f.is_trading_day(6, d(2024, 2, 2), Some(d(2024, 2, 1))));
    }

    #[test]
    fn serde_uses_string_form() {
        let json = serde_json::to_string(&TradeFrequency::EveryNDays(5)).unwrap();
        assert_eq!(json, "\"5D\"");
        let back: TradeFrequency = serde_json::from_str("\"1W\"").unwrap();
        assert_eq!(back, TradeFrequency::Weekly);
    }
}
