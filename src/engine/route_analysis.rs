// ==========================================
// 工地物料订货与配送系统 - 路线路况分析引擎
// ==========================================
// 职责: 结合天气与交通,计算路线耗时、成本、排放与效率分
// 口径:
//   天气延误 = 各途经点延误的最大值（最差点决定）
//   交通延误 = 各路段延误之和
//   efficiency = 0.40×max(0,100-距离/10) + 0.35×max(0,100-延误/5)
//              + 0.15×max(0,100-CO2/0.05) + 0.10×min(100,100×载重/额定),取整到 [0,100]
// ==========================================

use crate::conditions::gateway::ConditionsGateway;
use crate::conditions::weather::weather_delay_minutes;
use crate::config::engine_config::ConditionsConfig;
use crate::domain::conditions::{TrafficReport, TrafficSegment, WeatherObservation};
use crate::domain::numeric::round_dp;
use crate::domain::site::Coords;
use crate::domain::types::{CongestionLevel, RiskLevel};
use crate::engine::error::{ensure_non_negative, EngineError, EngineResult};
use crate::engine::geo::{co2_kg, path_length_km};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

/// 待分析路线
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteInput {
    pub route_name: String,
    pub waypoints: Vec<Coords>,
    pub load_kg: f64,
    pub capacity_kg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherImpact {
    pub points: Vec<WeatherObservation>,
    pub delay_minutes: f64,
    pub has_rain: bool,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficImpact {
    pub segments: Vec<TrafficSegment>,
    pub delay_minutes: f64,
    pub congestion_level: CongestionLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteAnalysis {
    pub route_name: String,
    pub base_distance_km: f64,
    pub base_time_min: f64,
    pub weather: WeatherImpact,
    pub traffic: TrafficImpact,
    pub delay_minutes: f64,
    pub final_delivery_time_min: f64,
    pub fuel_cost_usd: f64,
    pub delay_cost_usd: f64,
    pub total_cost_usd: f64,
    pub co2_kg: f64,
    pub utilization_pct: f64,
    pub efficiency_score: u8,
    pub risk_level: RiskLevel,
    /// 数据源降级说明
    pub notes: Vec<String>,
}

/// 综合效率分（整数,0-100）
pub fn efficiency_score(
    distance_km: f64,
    delay_min: f64,
    co2: f64,
    load_kg: f64,
    capacity_kg: f64,
) -> u8 {
    let distance_term = (100.0 - distance_km / 10.0).max(0.0);
    let delay_term = (100.0 - delay_min / 5.0).max(0.0);
    let co2_term = (100.0 - co2 / 0.05).max(0.0);
    let utilization_term = if capacity_kg > 0.0 {
        (100.0 * load_kg / capacity_kg).clamp(0.0, 100.0)
    } else {
        0.0
    };

    let score = 0.40 * distance_term + 0.35 * delay_term + 0.15 * co2_term + 0.10 * utilization_term;
    if score.is_finite() {
        // 抵消权重乘法的浮点误差后再取整
        (score + 1e-9).floor().clamp(0.0, 100.0) as u8
    } else {
        0
    }
}

// ==========================================
// RouteConditionAnalyzer - 路线路况分析引擎
// ==========================================
pub struct RouteConditionAnalyzer {
    config: ConditionsConfig,
    emission_factor: f64,
    gateway: Arc<ConditionsGateway>,
}

impl RouteConditionAnalyzer {
    pub fn new(config: ConditionsConfig, emission_factor: f64, gateway: Arc<ConditionsGateway>) -> Self {
        Self {
            config,
            emission_factor,
            gateway,
        }
    }

    /// 拉取路况并分析
    ///
    /// # 返回
    /// - Ok(RouteAnalysis): 外部数据失败时使用兜底数据,说明写入 notes
    /// - Err(InvalidArgument): 途经点不足 2 个、坐标非法、载重参数非法
    #[instrument(skip(self, input), fields(route = %input.route_name, waypoints = input.waypoints.len()))]
    pub async fn analyze(&self, input: &RouteInput) -> EngineResult<RouteAnalysis> {
        validate(input)?;

        let (weather, traffic) = futures::join!(
            self.gateway.route_weather(&input.waypoints),
            self.gateway.route_traffic(&input.waypoints, &input.route_name)
        );

        let mut analysis = self.evaluate(input, &weather.value, &traffic.value)?;
        analysis.notes.extend(weather.notes);
        analysis.notes.extend(traffic.notes);

        info!(
            score = analysis.efficiency_score,
            delay = analysis.delay_minutes,
            risk = %analysis.risk_level,
            "路线分析完成"
        );
        Ok(analysis)
    }

    /// 纯计算: 给定途经点天气与交通报告
    pub fn evaluate(
        &self,
        input: &RouteInput,
        weather: &[WeatherObservation],
        traffic: &TrafficReport,
    ) -> EngineResult<RouteAnalysis> {
        validate(input)?;

        let distance = path_length_km(&input.waypoints);
        let base_time = if self.config.avg_speed_kmh > 0.0 {
            distance / self.config.avg_speed_kmh * 60.0
        } else {
            0.0
        };

        let points: Vec<WeatherObservation> = weather
            .iter()
            .map(|w| WeatherObservation {
                delay_minutes: weather_delay_minutes(w.condition, w.rainfall_mm, w.wind_kmh),
                ..w.clone()
            })
            .collect();
        let weather_delay = points.iter().map(|w| w.delay_minutes).fold(0.0, f64::max);
        let has_rain = points.iter().any(|w| w.condition.is_rain());
        let risk_level = RiskLevel::from_delay(weather_delay);

        let traffic_delay: f64 = traffic.segments.iter().map(TrafficSegment::delay_minutes).sum();
        let delay = weather_delay + traffic_delay;

        let co2 = co2_kg(distance, input.load_kg, input.capacity_kg, self.emission_factor);
        let fuel_cost = distance * self.config.fuel_cost_per_km;
        let delay_cost = delay * self.config.delay_cost_per_min;

        Ok(RouteAnalysis {
            route_name: input.route_name.clone(),
            base_distance_km: round_dp(distance, 2),
            base_time_min: round_dp(base_time, 1),
            weather: WeatherImpact {
                points,
                delay_minutes: round_dp(weather_delay, 1),
                has_rain,
                risk_level,
            },
            traffic: TrafficImpact {
                segments: traffic.segments.clone(),
                delay_minutes: round_dp(traffic_delay, 1),
                congestion_level: CongestionLevel::from_delay(traffic_delay),
            },
            delay_minutes: round_dp(delay, 1),
            final_delivery_time_min: round_dp(base_time + delay, 1),
            fuel_cost_usd: round_dp(fuel_cost, 2),
            delay_cost_usd: round_dp(delay_cost, 2),
            total_cost_usd: round_dp(fuel_cost + delay_cost, 2),
            co2_kg: round_dp(co2, 2),
            utilization_pct: round_dp(input.load_kg / input.capacity_kg * 100.0, 1),
            efficiency_score: efficiency_score(distance, delay, co2, input.load_kg, input.capacity_kg),
            risk_level,
            notes: Vec::new(),
        })
    }
}

fn validate(input: &RouteInput) -> EngineResult<()> {
    if input.waypoints.len() < 2 {
        return Err(EngineError::InvalidArgument(format!(
            "路线 {} 至少需要 2 个途经点, 实际={}",
            input.route_name,
            input.waypoints.len()
        )));
    }
    if let Some(bad) = input.waypoints.iter().find(|c| !c.is_valid()) {
        return Err(EngineError::InvalidArgument(format!(
            "坐标非法: ({}, {})",
            bad.lat, bad.lon
        )));
    }
    ensure_non_negative("load_kg", input.load_kg)?;
    if !input.capacity_kg.is_finite() || input.capacity_kg <= 0.0 {
        return Err(EngineError::InvalidArgument(format!(
            "capacity_kg 必须大于 0, 实际={}",
            input.capacity_kg
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_efficiency_score_bounds() {
        assert_eq!(efficiency_score(0.0, 0.0, 0.0, 1000.0, 1000.0), 100);
        assert_eq!(efficiency_score(1e6, 1e6, 1e6, 0.0, 1000.0), 0);
        for d in [0.0, 5.0, 50.0, 500.0, 5000.0] {
            for delay in [0.0, 10.0, 100.0, 1000.0] {
                for co2 in [0.0, 1.0, 5.0, 100.0] {
                    for load in [0.0, 500.0, 1000.0, 5000.0] {
                        let s = efficiency_score(d, delay, co2, load, 1000.0);
                        assert!(s <= 100);
                    }
                }
            }
        }
    }

    #[test]
    fn test_efficiency_score_weights() {
        // 距离 100km → 90, 延误 50min → 90, CO2 2.5kg → 50, 装载 50%
        // 0.4×90 + 0.35×90 + 0.15×50 + 0.1×50 = 80
        assert_eq!(efficiency_score(100.0, 50.0, 2.5, 500.0, 1000.0), 80);
    }
}
