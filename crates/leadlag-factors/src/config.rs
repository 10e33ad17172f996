//! Lead-lag and filter configuration.

use crate::error::{FactorError, Result};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Shift range and rolling correlation length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadLagConfig {
    /// Half-width `J` of the shift range `[-J, +J]` (default: 4)
    pub shift_period: usize,
    /// Rolling correlation length `R` in quarters (default: 20)
    pub rolling_window: usize,
}

impl Default for LeadLagConfig {
    fn default() -> Self {
        Self {
            shift_period: 4,
            rolling_window: 20,
        }
    }
}

impl LeadLagConfig {
    /// Quarters per window, `2J + R + 1`.
    ///
    /// One quarter is consumed by differencing and `J` on each side by the
    /// shifts, leaving exactly one full rolling span per industry.
    pub const fn window_length(&self) -> usize {
        2 * self.shift_period + self.rolling_window + 1
    }

    /// Shift values `-J..=J`.
    pub const fn shifts(&self) -> RangeInclusive<i64> {
        let j = self.shift_period as i64;
        -j..=j
    }

    /// Number of shifts, `2J + 1`.
    pub const fn shift_count(&self) -> usize {
        2 * self.shift_period + 1
    }

    /// Reject rolling windows too short for a correlation.
    pub fn validate(&self) -> Result<()> {
        if self.rolling_window < 2 {
            return Err(FactorError::InvalidConfig(format!(
                "rolling_window must be at least 2, got {}",
                self.rolling_window
            )));
        }
        Ok(())
    }
}

/// Eligibility rules applied to every window. Unset rules are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Market segments to keep
    pub market_segments: Option<Vec<i64>>,
    /// Maximum days between the anchor quarter end and a statement's annotation date
    pub max_disclosure_delay_days: Option<i64>,
    /// Drop quarters at or before a stock's listing quarter
    pub drop_unlisted: bool,
    /// Keep only stocks observed in every quarter of the window
    pub balanced: bool,
}

impl FilterConfig {
    /// Whether any rule needs market segment metadata.
    pub const fn needs_market_types(&self) -> bool {
        self.market_segments.is_some()
    }

    /// Whether any rule needs annotation dates.
    pub const fn needs_annotations(&self) -> bool {
        self.max_disclosure_delay_days.is_some()
    }

    /// Whether any rule needs listing dates.
    pub const fn needs_listings(&self) -> bool {
        self.drop_unlisted
    }

    /// Reject negative disclosure delays.
    pub fn validate(&self) -> Result<()> {
        match self.max_disclosure_delay_days {
            Some(days) if days < 0 => Err(FactorError::InvalidConfig(format!(
                "max_disclosure_delay_days must not be negative, got {}",
                days
            ))),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_window_length() {
        let config = LeadLagConfig::default();
        assert_eq!(config.window_length(), 29);
        assert_eq!(config.shift_count(), 9);
        assert_eq!(config.shifts().collect::<Vec<_>>(), (-4..=4).collect::<Vec<_>>());
    }

    #[rstest]
    #[case(1, 2, 5)]
    #[case(2, 20, 25)]
    #[case(0, 3, 4)]
    fn test_window_length(#[case] j: usize, #[case] r: usize, #[case] expected: usize) {
        let config = LeadLagConfig {
            shift_period: j,
            rolling_window: r,
        };
        assert_eq!(config.window_length(), expected);
    }

    #[test]
    fn test_validate() {
        let config = LeadLagConfig {
            shift_period: 1,
            rolling_window: 1,
        };
        assert!(config.validate().is_err());
        assert!(LeadLagConfig::default().validate().is_ok());

        let filter = FilterConfig {
            max_disclosure_delay_days: Some(-1),
            ..Default::default()
        };
        assert!(filter.validate().is_err());
    }

    #[test]
    fn test_filter_default_is_permissive() {
        let filter = FilterConfig::default();
        assert!(!filter.needs_market_types());
        assert!(!filter.needs_annotations());
        assert!(!filter.needs_listings());
        assert!(!filter.balanced);
    }
}
