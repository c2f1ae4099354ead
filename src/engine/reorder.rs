// ==========================================
// 工地物料订货与配送系统 - 补货监控引擎
// ==========================================
// 职责:
//   1. 阈值告警: remaining <= threshold_ratio × ordered
//   2. 断料预测: 日用量 EMA 速率 → 剩余天数 → 自动补货建议
// 口径: suggested_reorder_qty = planned × (1 + buffer_pct/100),与推荐下单量同一公式
// ==========================================

use crate::config::engine_config::ReorderConfig;
use crate::domain::material::{Material, PhaseRecord};
use crate::domain::numeric::round_dp;
use crate::engine::buffer::AdaptiveBufferEngine;
use crate::engine::error::{ensure_non_negative, EngineError, EngineResult};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, instrument};

// ==========================================
// 输出结构
// ==========================================

/// 阈值检查结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderCheck {
    pub alert: bool,
    pub remaining: f64,
    pub threshold_qty: f64,
    pub suggested_reorder_qty: f64,
}

/// 断料预测
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockoutPrediction {
    pub ema_rate: Option<f64>,
    pub days_remaining: Option<f64>,
    pub stockout_date: Option<NaiveDate>,
    /// 现场实物库存
    pub remaining_stock: f64,
    /// 实物库存 + 在途
    pub effective_stock: f64,
    pub on_order_qty: f64,
    pub insufficient_data: bool,
}

/// 自动补货判定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoReorderAlert {
    pub material: String,
    pub unit: String,
    pub phase_index: usize,
    pub triggered: bool,
    pub critical: bool,
    pub reason: String,
    pub prediction: StockoutPrediction,
    pub reorder_qty: f64,
    pub days_to_cover: Option<f64>,
}

impl AutoReorderAlert {
    /// 排序键: 紧急 → 触发 → 其余
    fn urgency_rank(&self) -> u8 {
        if self.critical {
            0
        } else if self.triggered {
            1
        } else {
            2
        }
    }
}

// ==========================================
// ReorderMonitor - 补货监控引擎
// ==========================================
#[derive(Debug, Clone)]
pub struct ReorderMonitor {
    config: ReorderConfig,
    buffer_engine: AdaptiveBufferEngine,
}

impl Default for ReorderMonitor {
    fn default() -> Self {
        Self::new(ReorderConfig::default())
    }
}

impl ReorderMonitor {
    pub fn new(config: ReorderConfig) -> Self {
        Self {
            config,
            buffer_engine: AdaptiveBufferEngine::new(),
        }
    }

    /// 阈值检查
    ///
    /// # 参数
    /// - `material`: 提供当前 buffer_pct
    /// - `ordered_qty` / `remaining` / `planned_qty`: 阶段数量
    ///
    /// # 返回
    /// alert 为真时给出建议补货量,否则为 0
    pub fn check(
        &self,
        material: &Material,
        ordered_qty: f64,
        remaining: f64,
        planned_qty: f64,
    ) -> EngineResult<ReorderCheck> {
        ensure_non_negative("ordered_qty", ordered_qty)?;
        ensure_non_negative("remaining", remaining)?;
        ensure_non_negative("planned_qty", planned_qty)?;

        let threshold_qty = round_dp(self.config.threshold_ratio * ordered_qty, 4);
        let alert = remaining <= threshold_qty;
        let suggested_reorder_qty = if alert {
            self.buffer_engine
                .recommended_order(planned_qty, material.buffer_pct)?
        } else {
            0.0
        };

        Ok(ReorderCheck {
            alert,
            remaining: round_dp(remaining, 4),
            threshold_qty,
            suggested_reorder_qty,
        })
    }

    /// 按日期排序后的日用量 EMA,记录不足时返回 None
    pub fn ema_daily_rate(&self, phase: &PhaseRecord) -> Option<f64> {
        if phase.daily_usage.len() < self.config.min_usage_entries.max(1) {
            return None;
        }

        let mut entries: Vec<_> = phase.daily_usage.iter().collect();
        entries.sort_by_key(|e| e.date);

        let alpha = self.config.rate_ema_alpha;
        let mut iter = entries.into_iter();
        let mut ema = iter.next()?.quantity;
        for entry in iter {
            ema = alpha * entry.quantity + (1.0 - alpha) * ema;
        }
        Some(round_dp(ema, 4))
    }

    /// 断料预测
    ///
    /// on_order_qty 计入有效库存,避免在途订单重复告警
    pub fn predict_stockout(
        &self,
        phase: &PhaseRecord,
        on_order_qty: f64,
        as_of: NaiveDate,
    ) -> StockoutPrediction {
        let rate = self.ema_daily_rate(phase);
        let remaining = round_dp(phase.remaining(), 4);
        let on_order = on_order_qty.max(0.0);
        let effective = round_dp(remaining + on_order, 4);

        match rate {
            Some(r) if r > 0.0 => {
                let days_left = effective / r;
                StockoutPrediction {
                    ema_rate: Some(r),
                    days_remaining: Some(round_dp(days_left, 1)),
                    stockout_date: Some(as_of + Duration::days(days_left.floor() as i64)),
                    remaining_stock: remaining,
                    effective_stock: effective,
                    on_order_qty: on_order,
                    insufficient_data: false,
                }
            }
            _ => StockoutPrediction {
                ema_rate: rate,
                days_remaining: None,
                stockout_date: None,
                remaining_stock: remaining,
                effective_stock: effective,
                on_order_qty: on_order,
                insufficient_data: true,
            },
        }
    }

    /// 单个物料单个阶段的自动补货判定
    #[instrument(skip(self, material), fields(material = %material.name))]
    pub fn check_auto_reorder(
        &self,
        material: &Material,
        phase_index: usize,
        on_order_qty: f64,
        as_of: NaiveDate,
    ) -> EngineResult<AutoReorderAlert> {
        let phase = material.phase(phase_index).ok_or_else(|| {
            EngineError::InvalidArgument(format!(
                "phase_index {} 超出范围（共 {} 个阶段）",
                phase_index,
                material.phases_logged()
            ))
        })?;
        let horizon = self.config.auto_horizon_days;
        let prediction = self.predict_stockout(phase, on_order_qty, as_of);

        let mut alert = AutoReorderAlert {
            material: material.name.clone(),
            unit: material.unit.clone(),
            phase_index,
            triggered: false,
            critical: false,
            reason: String::new(),
            prediction: prediction.clone(),
            reorder_qty: 0.0,
            days_to_cover: None,
        };

        let (days_left, rate) = match (prediction.days_remaining, prediction.ema_rate) {
            (Some(d), Some(r)) if !prediction.insufficient_data => (d, r),
            _ => {
                alert.reason = format!(
                    "至少需要 {} 条日用量记录才能预测断料",
                    self.config.min_usage_entries
                );
                return Ok(alert);
            }
        };

        if days_left > horizon {
            alert.reason = format!("库存充足,约可用 {:.1} 天（阈值 {} 天）", days_left, horizon);
            if prediction.on_order_qty > 0.0 {
                alert.reason.push_str(&format!(
                    ",含在途 {:.2} {}",
                    prediction.on_order_qty, material.unit
                ));
            }
            return Ok(alert);
        }

        let critical = days_left <= self.config.critical_horizon_days;
        let days_to_cover = (horizon * 2.0).max(14.0);
        let mut raw_qty = rate * days_to_cover;

        // 阶段剩余需求为正时,补货量不超过剩余需求
        let still_needs = (phase.planned_qty - phase.ordered_qty - phase.consumed_qty).max(0.0);
        if still_needs > 0.0 {
            raw_qty = raw_qty.min(still_needs);
        }
        let reorder_qty = round_dp(raw_qty * (1.0 + material.buffer_pct / 100.0), 2);

        let mut reason = format!(
            "预计约 {:.1} 天后断料（EMA 速率 {:.2} {}/天）,低于 {} 天阈值,触发补货",
            days_left, rate, material.unit, horizon
        );
        if critical {
            reason.push_str(&format!(
                "; 紧急: 剩余不足 {} 天",
                self.config.critical_horizon_days
            ));
        }
        debug!(days_left, reorder_qty, critical, "自动补货触发");

        alert.triggered = true;
        alert.critical = critical;
        alert.reason = reason;
        alert.reorder_qty = reorder_qty;
        alert.days_to_cover = Some(days_to_cover);
        Ok(alert)
    }

    /// 批量检查所有物料的最新阶段
    ///
    /// # 返回
    /// 按紧急 → 触发 → 其余排序（同级保持输入顺序）
    pub fn check_all(
        &self,
        materials: &[Material],
        on_order: &HashMap<String, f64>,
        as_of: NaiveDate,
    ) -> Vec<AutoReorderAlert> {
        let mut alerts: Vec<AutoReorderAlert> = materials
            .iter()
            .filter_map(|m| {
                let idx = m.latest_phase_index()?;
                let in_flight = on_order.get(&m.name).copied().unwrap_or(0.0);
                self.check_auto_reorder(m, idx, in_flight, as_of).ok()
            })
            .collect();

        alerts.sort_by_key(|a| a.urgency_rank());
        alerts
    }
}
