// ==========================================
// 工地物料订货与配送系统 - 自适应余量引擎
// ==========================================
// 职责: 推荐下单量 + 按实际浪费率 EMA 学习安全余量
// 公式: ordered = planned × (1 + buffer/100)
//       new_buffer = clamp(0.7 × old + 0.3 × waste, 0, 100)
// 红线: 每个阶段收尾时恰好更新一次
// ==========================================

use crate::domain::material::Material;
use crate::domain::numeric::round_dp;
use crate::engine::error::{ensure_non_negative, EngineError, EngineResult};
use tracing::debug;

/// EMA 新观测权重（固定,不可配置）
pub const EMA_WEIGHT: f64 = 0.3;

/// 余量取值范围
pub const BUFFER_MIN_PCT: f64 = 0.0;
pub const BUFFER_MAX_PCT: f64 = 100.0;

/// 零下单却有消耗时的浪费率（全部缺料）
pub const ZERO_ORDER_SHORTFALL_PCT: f64 = -100.0;

// ==========================================
// AdaptiveBufferEngine - 自适应余量引擎
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct AdaptiveBufferEngine {
    // 无状态引擎
}

impl AdaptiveBufferEngine {
    pub fn new() -> Self {
        Self {}
    }

    /// 推荐下单量
    ///
    /// # 参数
    /// - `planned_qty`: 计划用量（>=0）
    /// - `buffer_pct`: 当前余量（%）
    ///
    /// # 返回
    /// planned × (1 + buffer/100),保留 4 位小数
    pub fn recommended_order(&self, planned_qty: f64, buffer_pct: f64) -> EngineResult<f64> {
        ensure_non_negative("planned_qty", planned_qty)?;
        if !buffer_pct.is_finite() {
            return Err(EngineError::InvalidArgument(format!(
                "buffer_pct 非法: {}",
                buffer_pct
            )));
        }
        let buffer = buffer_pct.clamp(BUFFER_MIN_PCT, BUFFER_MAX_PCT);
        Ok(round_dp(planned_qty * (1.0 + buffer / 100.0), 4))
    }

    /// EMA 更新余量
    ///
    /// waste 可以为负（下单不足）,结果总被夹在 [0,100]
    pub fn update_buffer(&self, old_buffer_pct: f64, actual_waste_pct: f64) -> f64 {
        let old = if old_buffer_pct.is_finite() {
            old_buffer_pct.clamp(BUFFER_MIN_PCT, BUFFER_MAX_PCT)
        } else {
            BUFFER_MIN_PCT
        };
        if actual_waste_pct.is_nan() {
            return old;
        }

        let blended = (1.0 - EMA_WEIGHT) * old + EMA_WEIGHT * actual_waste_pct;
        let new_buffer = round_dp(blended.clamp(BUFFER_MIN_PCT, BUFFER_MAX_PCT), 4);
        debug!(old, actual_waste_pct, new_buffer, "余量 EMA 更新");
        new_buffer
    }

    /// 浪费率 = (下单 - 消耗) / 下单 × 100
    ///
    /// 正值表示多订（余料）,负值表示少订（缺料）。
    /// 下单量为 0 时: 无消耗记 0,有消耗（来自结转）记 [`ZERO_ORDER_SHORTFALL_PCT`]
    pub fn evaluate_waste(&self, ordered_qty: f64, consumed_qty: f64) -> EngineResult<f64> {
        ensure_non_negative("ordered_qty", ordered_qty)?;
        ensure_non_negative("consumed_qty", consumed_qty)?;
        if ordered_qty == 0.0 {
            return Ok(if consumed_qty > 0.0 {
                ZERO_ORDER_SHORTFALL_PCT
            } else {
                0.0
            });
        }
        Ok(round_dp((ordered_qty - consumed_qty) / ordered_qty * 100.0, 4))
    }

    /// 恢复初始余量（幂等）
    pub fn reset_buffer(&self, material: &mut Material) {
        material.buffer_pct = material.baseline_buffer_pct;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recommended_order_scenario() {
        let engine = AdaptiveBufferEngine::new();
        assert_eq!(engine.recommended_order(200.0, 10.0).unwrap(), 220.0);
        assert_eq!(engine.recommended_order(0.0, 10.0).unwrap(), 0.0);
    }

    #[test]
    fn test_recommended_order_rejects_negative() {
        let engine = AdaptiveBufferEngine::new();
        assert!(matches!(
            engine.recommended_order(-1.0, 10.0),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_ordered_never_below_planned() {
        let engine = AdaptiveBufferEngine::new();
        for planned in [0.0, 0.5, 1.0, 37.25, 200.0, 12_345.0] {
            for buffer in [0.0, 0.1, 5.0, 50.0, 100.0] {
                let ordered = engine.recommended_order(planned, buffer).unwrap();
                assert!(ordered >= planned, "planned={} buffer={}", planned, buffer);
            }
        }
    }

    #[test]
    fn test_update_buffer_clamped() {
        let engine = AdaptiveBufferEngine::new();
        for waste in [-1e9, -500.0, -10.0, 0.0, 11.36, 250.0, 1e9, f64::INFINITY, f64::NEG_INFINITY] {
            let b = engine.update_buffer(50.0, waste);
            assert!((0.0..=100.0).contains(&b), "waste={} → {}", waste, b);
        }
        assert_eq!(engine.update_buffer(10.0, f64::NAN), 10.0);
    }

    #[test]
    fn test_update_buffer_converges_to_zero() {
        let engine = AdaptiveBufferEngine::new();
        let mut buffer = 12.0;
        for _ in 0..40 {
            let next = engine.update_buffer(buffer, 0.0);
            assert!(next <= buffer);
            buffer = next;
        }
        assert!(buffer < 0.01);
    }

    #[test]
    fn test_phase_close_scenario() {
        let engine = AdaptiveBufferEngine::new();
        let waste = engine.evaluate_waste(220.0, 195.0).unwrap();
        assert!((waste - 11.3636).abs() < 1e-4);

        let new_buffer = engine.update_buffer(10.0, waste);
        assert!((new_buffer - (0.7 * 10.0 + 0.3 * 11.3636)).abs() < 1e-3);
    }

    #[test]
    fn test_evaluate_waste_zero_order() {
        let engine = AdaptiveBufferEngine::new();
        assert_eq!(engine.evaluate_waste(0.0, 0.0).unwrap(), 0.0);
        assert_eq!(engine.evaluate_waste(0.0, 12.0).unwrap(), ZERO_ORDER_SHORTFALL_PCT);
        assert!(engine.evaluate_waste(-1.0, 0.0).is_err());
        assert!(engine.evaluate_waste(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_reset_buffer_idempotent() {
        let engine = AdaptiveBufferEngine::new();
        let mut m = Material::new("cement", "bags", 6.0, 50.0, 9);
        m.buffer_pct = 17.5;
        engine.reset_buffer(&mut m);
        engine.reset_buffer(&mut m);
        assert_eq!(m.buffer_pct, 6.0);
    }
}
