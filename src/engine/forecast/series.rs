// ==========================================
// 预测引擎 - 用量序列构建
// ==========================================
// 日序列: 同日用量合并,缺失日期补 0（仅用于 ARIMA 建模）
// 记录序列: 按记录顺序的原始用量（用于移动平均与样本计数）
// ==========================================

use crate::domain::material::DailyUsageEntry;
use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;

/// 补齐后的日用量序列
#[derive(Debug, Clone, PartialEq)]
pub struct UsageSeries {
    pub start: NaiveDate,
    pub values: Vec<f64>,
    /// 每条记录所在日的下标（按日期升序,同日重复保留）
    pub entry_days: Vec<usize>,
}

impl UsageSeries {
    /// 由日用量记录构建日序列,无记录时返回 None
    pub fn from_entries(entries: &[DailyUsageEntry]) -> Option<Self> {
        let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for entry in entries {
            *by_date.entry(entry.date).or_insert(0.0) += entry.quantity;
        }

        let (&start, _) = by_date.iter().next()?;
        let (&end, _) = by_date.iter().next_back()?;
        let span = (end - start).num_days() + 1;

        let values = (0..span)
            .map(|offset| {
                by_date
                    .get(&(start + Duration::days(offset)))
                    .copied()
                    .unwrap_or(0.0)
            })
            .collect();

        let mut entry_days: Vec<usize> = entries
            .iter()
            .map(|e| (e.date - start).num_days() as usize)
            .collect();
        entry_days.sort_unstable();

        Some(Self {
            start,
            values,
            entry_days,
        })
    }

    /// 末尾 k 条记录覆盖的日下标（升序去重）
    ///
    /// 补 0 的空白日不在其中
    pub fn holdout_days(&self, k: usize) -> Vec<usize> {
        let from = self.entry_days.len().saturating_sub(k);
        let mut days = self.entry_days[from..].to_vec();
        days.dedup();
        days
    }

    /// 首末记录日期跨度（含两端）
    pub fn calendar_days(&self) -> usize {
        self.values.len()
    }

    pub fn last_date(&self) -> NaiveDate {
        self.start + Duration::days(self.values.len() as i64 - 1)
    }

    /// 预测日期: 最后记录日期的次日起
    pub fn future_dates(&self, horizon: usize) -> Vec<NaiveDate> {
        let last = self.last_date();
        (1..=horizon as i64).map(|i| last + Duration::days(i)).collect()
    }
}

/// 按记录顺序取用量
pub fn logged_quantities(entries: &[DailyUsageEntry]) -> Vec<f64> {
    entries.iter().map(|e| e.quantity).collect()
}

/// 末尾 window 个值的均值（window 超出长度时取全部）
pub fn trailing_mean(values: &[f64], window: usize) -> Option<f64> {
    if values.is_empty() || window == 0 {
        return None;
    }
    let w = window.min(values.len());
    let tail = &values[values.len() - w..];
    Some(tail.iter().sum::<f64>() / w as f64)
}

/// 平均绝对百分比误差（%）
///
/// 实际值接近 0 时以 1 作分母,避免除零放大
pub fn mape(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    let n = actual.len().min(predicted.len());
    if n == 0 {
        return None;
    }
    let total: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| {
            let denom = if a.abs() < 1e-6 { 1.0 } else { a.abs() };
            (a - p).abs() / denom
        })
        .sum();
    Some(total / n as f64 * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(d: u32, q: f64) -> DailyUsageEntry {
        DailyUsageEntry {
            date: NaiveDate::from_ymd_opt(2026, 4, d).unwrap(),
            quantity: q,
        }
    }

    #[test]
    fn test_series_gap_fill_and_merge() {
        let entries = vec![entry(3, 5.0), entry(1, 2.0), entry(3, 1.0)];
        let s = UsageSeries::from_entries(&entries).unwrap();
        assert_eq!(s.values, vec![2.0, 0.0, 6.0]);
        assert_eq!(s.calendar_days(), 3);
        assert_eq!(s.last_date(), NaiveDate::from_ymd_opt(2026, 4, 3).unwrap());
        assert_eq!(
            s.future_dates(2),
            vec![
                NaiveDate::from_ymd_opt(2026, 4, 4).unwrap(),
                NaiveDate::from_ymd_opt(2026, 4, 5).unwrap()
            ]
        );
    }

    #[test]
    fn test_holdout_days_skip_gaps() {
        let entries = vec![entry(1, 2.0), entry(3, 4.0), entry(7, 1.0), entry(5, 3.0), entry(7, 2.0)];
        let s = UsageSeries::from_entries(&entries).unwrap();
        assert_eq!(s.entry_days, vec![0, 2, 4, 6, 6]);
        assert_eq!(s.holdout_days(3), vec![4, 6]);
        assert_eq!(s.holdout_days(2), vec![6]);
        assert_eq!(s.holdout_days(10), vec![0, 2, 4, 6]);
    }

    #[test]
    fn test_trailing_mean_and_mape() {
        assert_eq!(trailing_mean(&[1.0, 2.0, 3.0, 4.0], 2), Some(3.5));
        assert_eq!(trailing_mean(&[4.0], 7), Some(4.0));
        assert_eq!(trailing_mean(&[], 7), None);

        let m = mape(&[10.0, 0.0], &[12.0, 0.5]).unwrap();
        // (0.2 + 0.5) / 2 × 100
        assert!((m - 35.0).abs() < 1e-9);
    }
}
