// ==========================================
// 工地物料订货与配送系统 - 领域类型定义
// ==========================================
// 职责: 跨模块共享的枚举类型
// 序列化格式: snake_case (与对外数据契约一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 阶段状态 (Phase Status)
// ==========================================
// 红线: 阶段关闭后不可再记录用量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Open,   // 进行中
    Closed, // 已收尾
}

impl PhaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseStatus::Open => "open",
            PhaseStatus::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "open" => Some(PhaseStatus::Open),
            "closed" => Some(PhaseStatus::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 预测模式 (Forecast Regime)
// ==========================================
// 每次预测调用时选择,不落库
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForecastRegime {
    #[serde(rename = "MA")]
    MovingAverage,
    #[serde(rename = "ARIMA")]
    Arima,
}

impl fmt::Display for ForecastRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForecastRegime::MovingAverage => write!(f, "MA"),
            ForecastRegime::Arima => write!(f, "ARIMA"),
        }
    }
}

// ==========================================
// 天气风险等级 (Risk Level)
// ==========================================
// 顺序: Clear < Low < Moderate < High < Critical
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Clear,
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    /// 按路线最大天气延误（分钟）评估风险
    pub fn from_delay(delay_minutes: f64) -> Self {
        if delay_minutes <= 0.0 {
            RiskLevel::Clear
        } else if delay_minutes < 15.0 {
            RiskLevel::Low
        } else if delay_minutes < 45.0 {
            RiskLevel::Moderate
        } else if delay_minutes < 120.0 {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Clear => write!(f, "clear"),
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Moderate => write!(f, "moderate"),
            RiskLevel::High => write!(f, "high"),
            RiskLevel::Critical => write!(f, "critical"),
        }
    }
}

// ==========================================
// 拥堵等级 (Congestion Level)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CongestionLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl CongestionLevel {
    /// 按路线累计交通延误（分钟）评估拥堵
    pub fn from_delay(delay_minutes: f64) -> Self {
        if delay_minutes < 5.0 {
            CongestionLevel::Low
        } else if delay_minutes < 15.0 {
            CongestionLevel::Medium
        } else if delay_minutes < 30.0 {
            CongestionLevel::High
        } else {
            CongestionLevel::Critical
        }
    }
}

impl fmt::Display for CongestionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CongestionLevel::Low => write!(f, "low"),
            CongestionLevel::Medium => write!(f, "medium"),
            CongestionLevel::High => write!(f, "high"),
            CongestionLevel::Critical => write!(f, "critical"),
        }
    }
}

// ==========================================
// 天气状况 (Weather Condition)
// ==========================================
// 外部天气服务的状况文本统一映射到此枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    Clear,
    Cloudy,
    Drizzle,
    Rain,
    HeavyRain,
    Snow,
    Thunderstorm,
    Other,
}

impl WeatherCondition {
    /// 解析外部服务返回的状况文本（大小写不敏感）
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "clear" | "sunny" => WeatherCondition::Clear,
            "cloudy" | "clouds" | "overcast" => WeatherCondition::Cloudy,
            "drizzle" => WeatherCondition::Drizzle,
            "rain" | "light_rain" => WeatherCondition::Rain,
            "heavy_rain" | "heavy rain" => WeatherCondition::HeavyRain,
            "snow" => WeatherCondition::Snow,
            "thunderstorm" => WeatherCondition::Thunderstorm,
            _ => WeatherCondition::Other,
        }
    }

    pub fn is_rain(&self) -> bool {
        matches!(
            self,
            WeatherCondition::Drizzle
                | WeatherCondition::Rain
                | WeatherCondition::HeavyRain
                | WeatherCondition::Thunderstorm
        )
    }
}

impl fmt::Display for WeatherCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WeatherCondition::Clear => "clear",
            WeatherCondition::Cloudy => "cloudy",
            WeatherCondition::Drizzle => "drizzle",
            WeatherCondition::Rain => "rain",
            WeatherCondition::HeavyRain => "heavy_rain",
            WeatherCondition::Snow => "snow",
            WeatherCondition::Thunderstorm => "thunderstorm",
            WeatherCondition::Other => "other",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_thresholds() {
        assert_eq!(RiskLevel::from_delay(0.0), RiskLevel::Clear);
        assert_eq!(RiskLevel::from_delay(14.9), RiskLevel::Low);
        assert_eq!(RiskLevel::from_delay(15.0), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_delay(45.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_delay(120.0), RiskLevel::Critical);
    }

    #[test]
    fn test_congestion_level_thresholds() {
        assert_eq!(CongestionLevel::from_delay(4.9), CongestionLevel::Low);
        assert_eq!(CongestionLevel::from_delay(5.0), CongestionLevel::Medium);
        assert_eq!(CongestionLevel::from_delay(15.0), CongestionLevel::High);
        assert_eq!(CongestionLevel::from_delay(30.0), CongestionLevel::Critical);
    }

    #[test]
    fn test_weather_condition_labels() {
        assert_eq!(WeatherCondition::from_label("Clouds"), WeatherCondition::Cloudy);
        assert_eq!(WeatherCondition::from_label("HEAVY_RAIN"), WeatherCondition::HeavyRain);
        assert_eq!(WeatherCondition::from_label("mist"), WeatherCondition::Other);
        assert!(WeatherCondition::Drizzle.is_rain());
        assert!(!WeatherCondition::Snow.is_rain());
    }
}
