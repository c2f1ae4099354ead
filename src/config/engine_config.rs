// ==========================================
// 工地物料订货与配送系统 - 引擎配置
// ==========================================
// 职责: 各引擎的可调参数（带默认值）
// 来源: 默认值 → config_kv 覆写 → 环境变量覆写（见 ConfigManager）
// 红线: 余量 EMA 权重 0.7/0.3 固定,不在此处
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 补货监控配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReorderConfig {
    /// 补货阈值比例（threshold = ratio × ordered）
    pub threshold_ratio: f64,
    /// 自动补货触发天数
    pub auto_horizon_days: f64,
    /// 紧急补货天数
    pub critical_horizon_days: f64,
    /// 日用量 EMA 平滑系数
    pub rate_ema_alpha: f64,
    /// 断料预测所需最少用量记录数
    pub min_usage_entries: usize,
}

impl Default for ReorderConfig {
    fn default() -> Self {
        Self {
            threshold_ratio: 0.20,
            auto_horizon_days: 7.0,
            critical_horizon_days: 3.0,
            rate_ema_alpha: 0.35,
            min_usage_entries: 2,
        }
    }
}

// ==========================================
// 预测配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// 日历跨度低于此值走 MA
    pub ma_threshold_days: usize,
    /// 记录条数低于此值走 MA
    pub min_arima_points: usize,
    /// MA 窗口上限
    pub ma_window: usize,
    /// 回测 MAPE 告警阈值（%）
    pub mape_warn_pct: f64,
    /// 回测留出点数上限
    pub max_backtest_points: usize,
    pub max_p: usize,
    pub max_d: usize,
    pub max_q: usize,
    /// 自动定阶开关（关闭时直接从 ARMA(1,1) 起步）
    pub auto_arima_enabled: bool,
    pub default_horizon: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            ma_threshold_days: 14,
            min_arima_points: 10,
            ma_window: 7,
            mape_warn_pct: 25.0,
            max_backtest_points: 5,
            max_p: 3,
            max_d: 1,
            max_q: 3,
            auto_arima_enabled: true,
            default_horizon: 14,
        }
    }
}

// ==========================================
// 物流配置
// ==========================================

/// 路径求解器选择
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingSolverKind {
    /// Clarke-Wright 节约算法
    ClarkeWright,
    /// 不使用求解器,直接最近邻
    None,
}

impl RoutingSolverKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "clarke_wright" | "clarke-wright" | "savings" => Some(Self::ClarkeWright),
            "none" | "nearest_neighbor" | "off" => Some(Self::None),
            _ => None,
        }
    }
}

impl fmt::Display for RoutingSolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClarkeWright => write!(f, "clarke_wright"),
            Self::None => write!(f, "none"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticsConfig {
    /// 基础排放因子（kg CO2 / km）
    pub emission_factor_kg_per_km: f64,
    pub routing_solver: RoutingSolverKind,
    /// 预计降雨时提升装车优先级的物料
    pub weather_sensitive_materials: Vec<String>,
}

impl Default for LogisticsConfig {
    fn default() -> Self {
        Self {
            emission_factor_kg_per_km: 0.12,
            routing_solver: RoutingSolverKind::ClarkeWright,
            weather_sensitive_materials: vec![
                "Cement".to_string(),
                "Sand".to_string(),
                "Wood".to_string(),
            ],
        }
    }
}

// ==========================================
// 路况数据源配置
// ==========================================

/// 天气/交通数据源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionsSource {
    Mock,
    Live,
}

impl ConditionsSource {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "mock" => Some(Self::Mock),
            "live" => Some(Self::Live),
            _ => None,
        }
    }
}

impl fmt::Display for ConditionsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mock => write!(f, "mock"),
            Self::Live => write!(f, "live"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionsConfig {
    pub source: ConditionsSource,
    /// 单次外部查询超时（毫秒）
    pub provider_timeout_ms: u64,
    /// 模拟数据种子（None 时每次随机）
    pub mock_seed: Option<u64>,
    /// 基础车速（km/h）
    pub avg_speed_kmh: f64,
    /// 燃油成本（USD / km）
    pub fuel_cost_per_km: f64,
    /// 延误成本（USD / min）
    pub delay_cost_per_min: f64,
}

impl Default for ConditionsConfig {
    fn default() -> Self {
        Self {
            source: ConditionsSource::Mock,
            provider_timeout_ms: 3000,
            mock_seed: None,
            avg_speed_kmh: 60.0,
            fuel_cost_per_km: 0.15,
            delay_cost_per_min: 2.5,
        }
    }
}

// ==========================================
// EngineConfig - 引擎配置总表
// ==========================================
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub reorder: ReorderConfig,
    pub forecast: ForecastConfig,
    pub logistics: LogisticsConfig,
    pub conditions: ConditionsConfig,
}
