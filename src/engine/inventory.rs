// ==========================================
// 工地物料订货与配送系统 - 库存跟踪引擎
// ==========================================
// 职责: 实时库存快照 + 日用量趋势
// 口径: calendar_days = 窗口内首条到末条记录日期的跨度（含两端）,
//       当天若无记录不计入分母
// ==========================================

use crate::domain::material::PhaseRecord;
use crate::domain::numeric::round_dp;
use crate::engine::error::{ensure_non_negative, EngineResult};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 默认趋势窗口（天）
pub const DEFAULT_TREND_WINDOW_DAYS: i64 = 7;

/// 库存快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryStatus {
    pub total_available: f64,
    pub used: f64,
    pub remaining: f64,
    pub utilization_pct: f64,
}

/// 日用量趋势
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageTrend {
    pub avg_per_active_day: f64,
    pub avg_per_calendar_day: f64,
    pub total_consumed: f64,
    /// 有记录的不同日期数
    pub active_days: usize,
    pub calendar_days: i64,
    /// 按日历日均速率估算的剩余天数
    pub days_remaining_est: Option<f64>,
}

impl UsageTrend {
    fn empty() -> Self {
        Self {
            avg_per_active_day: 0.0,
            avg_per_calendar_day: 0.0,
            total_consumed: 0.0,
            active_days: 0,
            calendar_days: 0,
            days_remaining_est: None,
        }
    }
}

// ==========================================
// InventoryTracker - 库存跟踪引擎
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct InventoryTracker {
    window_days: i64,
}

impl Default for InventoryTracker {
    fn default() -> Self {
        Self::new(DEFAULT_TREND_WINDOW_DAYS)
    }
}

impl InventoryTracker {
    pub fn new(window_days: i64) -> Self {
        Self {
            window_days: window_days.max(1),
        }
    }

    /// 库存快照
    ///
    /// total_available = ordered + carry_in; remaining = max(0, total - consumed)
    pub fn status(
        &self,
        ordered_qty: f64,
        consumed_qty: f64,
        carry_in: f64,
    ) -> EngineResult<InventoryStatus> {
        ensure_non_negative("ordered_qty", ordered_qty)?;
        ensure_non_negative("consumed_qty", consumed_qty)?;
        ensure_non_negative("carry_in", carry_in)?;

        let total_available = ordered_qty + carry_in;
        let remaining = (total_available - consumed_qty).max(0.0);
        let utilization_pct = if total_available > 0.0 {
            round_dp(consumed_qty / total_available * 100.0, 2)
        } else {
            0.0
        };

        Ok(InventoryStatus {
            total_available: round_dp(total_available, 4),
            used: round_dp(consumed_qty, 4),
            remaining: round_dp(remaining, 4),
            utilization_pct,
        })
    }

    /// 日用量趋势
    ///
    /// 取 as_of 往前 window_days 天内的记录,窗口内无记录时回退到全部记录
    pub fn trend(&self, phase: &PhaseRecord, as_of: NaiveDate) -> UsageTrend {
        if phase.daily_usage.is_empty() {
            return UsageTrend::empty();
        }

        let cutoff = as_of - Duration::days(self.window_days);
        let mut recent: Vec<_> = phase
            .daily_usage
            .iter()
            .filter(|e| e.date >= cutoff)
            .collect();
        if recent.is_empty() {
            recent = phase.daily_usage.iter().collect();
        }

        let total: f64 = recent.iter().map(|e| e.quantity).sum();
        let dates: BTreeSet<NaiveDate> = recent.iter().map(|e| e.date).collect();
        let active_days = dates.len();

        let calendar_days = match (dates.iter().next(), dates.iter().next_back()) {
            (Some(first), Some(last)) => (*last - *first).num_days() + 1,
            _ => 1,
        };

        let avg_active = total / active_days as f64;
        let avg_calendar = total / calendar_days as f64;
        let days_remaining_est = if avg_calendar > 0.0 {
            Some(round_dp(phase.remaining() / avg_calendar, 1))
        } else {
            None
        };

        UsageTrend {
            avg_per_active_day: round_dp(avg_active, 4),
            avg_per_calendar_day: round_dp(avg_calendar, 4),
            total_consumed: round_dp(total, 4),
            active_days,
            calendar_days,
            days_remaining_est,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::material::DailyUsageEntry;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn test_inventory_status_scenario() {
        let tracker = InventoryTracker::default();
        let status = tracker.status(220.0, 80.0, 10.0).unwrap();
        assert_eq!(status.total_available, 230.0);
        assert_eq!(status.remaining, 150.0);
        assert!((status.utilization_pct - 34.78).abs() < 0.01);
    }

    #[test]
    fn test_inventory_status_overconsumed_floors_at_zero() {
        let tracker = InventoryTracker::default();
        let status = tracker.status(100.0, 130.0, 0.0).unwrap();
        assert_eq!(status.remaining, 0.0);
        assert!(tracker.status(-1.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_trend_excludes_unlogged_current_day() {
        let tracker = InventoryTracker::default();
        let mut phase = PhaseRecord::open(0, "Slab", 100.0, 110.0, 0.0);
        // 3 月 1 日与 3 月 3 日记录,3 月 2 日空缺,今天（3 月 5 日）无记录
        phase.daily_usage = vec![
            DailyUsageEntry { date: day(1), quantity: 10.0 },
            DailyUsageEntry { date: day(3), quantity: 20.0 },
            DailyUsageEntry { date: day(3), quantity: 6.0 },
        ];
        phase.recompute_consumed();

        let trend = tracker.trend(&phase, day(5));
        assert_eq!(trend.total_consumed, 36.0);
        assert_eq!(trend.active_days, 2);
        assert_eq!(trend.calendar_days, 3);
        assert_eq!(trend.avg_per_active_day, 18.0);
        assert_eq!(trend.avg_per_calendar_day, 12.0);
        // 剩余 74 / 12 ≈ 6.2
        assert_eq!(trend.days_remaining_est, Some(6.2));
    }

    #[test]
    fn test_trend_falls_back_to_all_entries() {
        let tracker = InventoryTracker::new(7);
        let mut phase = PhaseRecord::open(0, "Slab", 100.0, 110.0, 0.0);
        phase.daily_usage = vec![DailyUsageEntry { date: day(1), quantity: 5.0 }];
        phase.recompute_consumed();

        let trend = tracker.trend(&phase, day(28));
        assert_eq!(trend.total_consumed, 5.0);
        assert_eq!(trend.calendar_days, 1);
    }
}
