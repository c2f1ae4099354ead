// ==========================================
// 预测引擎 - 模型策略链
// ==========================================
// 链路: 自动定阶 ARIMA → 固定 ARMA(1,1) → （由引擎兜底）移动平均
// 能力检查: is_available() 在每次调用时确定一次
// ==========================================

use super::arima::{self, ArimaFit, ArimaOrder, FitError};

/// 一次成功的模型拟合
#[derive(Debug, Clone)]
pub struct ModelFit {
    /// 对外展示的模型标签
    pub label: String,
    pub fit: ArimaFit,
}

impl ModelFit {
    pub fn order(&self) -> ArimaOrder {
        self.fit.order
    }
}

/// 序列模型策略
pub trait ForecastModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// 当前环境下是否可用
    fn is_available(&self) -> bool {
        true
    }

    /// 在日序列上拟合
    fn fit(&self, series: &[f64]) -> Result<ModelFit, FitError>;
}

// ==========================================
// AutoArima - 网格搜索 + AIC 定阶
// ==========================================
#[derive(Debug, Clone)]
pub struct AutoArima {
    max_p: usize,
    max_d: usize,
    max_q: usize,
    enabled: bool,
}

impl AutoArima {
    pub fn new(max_p: usize, max_d: usize, max_q: usize, enabled: bool) -> Self {
        Self {
            max_p,
            max_d,
            max_q,
            enabled,
        }
    }
}

impl ForecastModel for AutoArima {
    fn name(&self) -> &'static str {
        "auto_arima"
    }

    fn is_available(&self) -> bool {
        self.enabled
    }

    fn fit(&self, series: &[f64]) -> Result<ModelFit, FitError> {
        if !self.enabled {
            return Err(FitError::Unavailable("自动定阶已关闭".to_string()));
        }
        let fit = arima::select_order(series, self.max_p, self.max_d, self.max_q)?;
        Ok(ModelFit {
            label: format!("auto_arima {}", fit.order),
            fit,
        })
    }
}

// ==========================================
// FixedArma - 固定阶数
// ==========================================
#[derive(Debug, Clone)]
pub struct FixedArma {
    order: ArimaOrder,
}

impl FixedArma {
    pub fn new(order: ArimaOrder) -> Self {
        Self { order }
    }

    /// 一级回退: ARMA(1,1)
    pub fn arma11() -> Self {
        Self::new(ArimaOrder::new(1, 0, 1))
    }
}

impl ForecastModel for FixedArma {
    fn name(&self) -> &'static str {
        "fixed_arma"
    }

    fn fit(&self, series: &[f64]) -> Result<ModelFit, FitError> {
        let fit = arima::fit(series, self.order)?;
        Ok(ModelFit {
            label: self.order.to_string(),
            fit,
        })
    }
}
