//! Dynamic fee schedule.
//!
//! Fees are in hundredths of a basis point as used by the pool hook
//! (3000 = 0.30%). The schedule is monotonically non-decreasing in
//! volatility level.

use crate::config::EngineConfig;
use crate::types::VolatilityLevel;

#[derive(Debug, Clone)]
pub struct FeeSchedule {
    pub low: u32,
    pub medium: u32,
    pub high: u32,
    pub extreme: u32,
    /// Gap between optimal and current fee that must be exceeded to adjust.
    pub adjust_threshold: u32,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            low: 3_000,
            medium: 5_000,
            high: 8_000,
            extreme: 10_000,
            adjust_threshold: 500,
        }
    }
}

impl From<&EngineConfig> for FeeSchedule {
    fn from(cfg: &EngineConfig) -> Self {
        Self {
            low: cfg.base_fee_bps,
            medium: cfg.fee_medium_bps,
            high: cfg.fee_high_bps,
            extreme: cfg.fee_extreme_bps,
            adjust_threshold: cfg.fee_adjust_threshold_bps,
        }
    }
}

impl FeeSchedule {
    pub fn optimal_fee(&self, level: VolatilityLevel) -> u32 {
        match level {
            VolatilityLevel::Low => self.low,
            VolatilityLevel::Medium => self.medium,
            VolatilityLevel::High => self.high,
            VolatilityLevel::Extreme => self.extreme,
        }
    }

    /// True when `|optimal - current|` strictly exceeds the threshold.
    pub fn needs_adjustment(&self, current: u32, optimal: u32) -> bool {
        (optimal as i64 - current as i64).abs() > self.adjust_threshold as i64
    }
}

/// Render a hook fee as a percentage, e.g. 3000 → "0.30%".
pub fn fee_percent(fee: u32) -> String {
    format!("{:.2}%", fee as f64 / 10_000.0)
}
