// ==========================================
// 工地物料订货与配送系统 - 路况数据契约
// ==========================================
// 职责: 天气 / 交通外部服务的返回结构（只约定数据,不约定传输）
// ==========================================

use crate::domain::site::Coords;
use crate::domain::types::{CongestionLevel, WeatherCondition};
use serde::{Deserialize, Serialize};

/// 单点天气观测
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub condition: WeatherCondition,
    pub rainfall_mm: f64,
    pub wind_kmh: f64,
    /// 服务方给出的延误估计（仅供参考,引擎按延误表重新计算）
    pub delay_minutes: f64,
}

impl WeatherObservation {
    pub fn clear() -> Self {
        Self {
            condition: WeatherCondition::Clear,
            rainfall_mm: 0.0,
            wind_kmh: 0.0,
            delay_minutes: 0.0,
        }
    }
}

/// 路段交通状况
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficSegment {
    pub from: Coords,
    pub to: Coords,
    pub distance_km: f64,
    pub free_flow_min: f64,
    pub current_min: f64,
    pub speed_kmh: f64,
    pub congestion: CongestionLevel,
}

impl TrafficSegment {
    /// 当前耗时 - 自由流耗时（快于自由流不计延误）
    pub fn delay_minutes(&self) -> f64 {
        (self.current_min - self.free_flow_min).max(0.0)
    }
}

/// 整条路线交通报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficReport {
    pub route_name: String,
    pub segments: Vec<TrafficSegment>,
    pub delay_minutes: f64,
    pub congestion_level: CongestionLevel,
}
