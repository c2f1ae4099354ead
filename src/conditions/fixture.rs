// ==========================================
// 路况数据源 - 固定数据（测试与离线回放）
// ==========================================

use super::error::ProviderResult;
use super::traffic::{build_report, segment, TrafficProvider};
use super::weather::WeatherProvider;
use crate::domain::conditions::{TrafficReport, WeatherObservation};
use crate::domain::site::Coords;
use crate::domain::types::CongestionLevel;
use async_trait::async_trait;

/// 所有点返回同一观测,可按坐标覆写
pub struct FixtureWeatherProvider {
    default: WeatherObservation,
    overrides: Vec<(Coords, WeatherObservation)>,
}

impl FixtureWeatherProvider {
    pub fn new(default: WeatherObservation) -> Self {
        Self {
            default,
            overrides: Vec::new(),
        }
    }

    pub fn with_point(mut self, coords: Coords, obs: WeatherObservation) -> Self {
        self.overrides.push((coords, obs));
        self
    }
}

#[async_trait]
impl WeatherProvider for FixtureWeatherProvider {
    fn name(&self) -> &'static str {
        "fixture_weather"
    }

    async fn query(&self, coords: Coords) -> ProviderResult<WeatherObservation> {
        let hit = self.overrides.iter().find(|(c, _)| {
            (c.lat - coords.lat).abs() < 1e-9 && (c.lon - coords.lon).abs() < 1e-9
        });
        Ok(hit.map(|(_, obs)| obs.clone()).unwrap_or_else(|| self.default.clone()))
    }
}

/// 每段使用固定车速（超出列表长度时用最后一个）
pub struct FixtureTrafficProvider {
    free_flow_kmh: f64,
    speeds_kmh: Vec<f64>,
}

impl FixtureTrafficProvider {
    pub fn new(free_flow_kmh: f64, speeds_kmh: Vec<f64>) -> Self {
        Self {
            free_flow_kmh,
            speeds_kmh,
        }
    }

    /// 全程自由流,无延误
    pub fn free_flow(free_flow_kmh: f64) -> Self {
        Self::new(free_flow_kmh, vec![free_flow_kmh])
    }
}

#[async_trait]
impl TrafficProvider for FixtureTrafficProvider {
    fn name(&self) -> &'static str {
        "fixture_traffic"
    }

    async fn query(&self, waypoints: &[Coords], route_name: &str) -> ProviderResult<TrafficReport> {
        let segments = waypoints
            .windows(2)
            .enumerate()
            .map(|(i, pair)| {
                let speed = self
                    .speeds_kmh
                    .get(i)
                    .or_else(|| self.speeds_kmh.last())
                    .copied()
                    .unwrap_or(self.free_flow_kmh);
                let congestion = if speed >= self.free_flow_kmh {
                    CongestionLevel::Low
                } else if speed >= self.free_flow_kmh * 0.66 {
                    CongestionLevel::Medium
                } else {
                    CongestionLevel::High
                };
                segment(pair[0], pair[1], self.free_flow_kmh, speed, congestion)
            })
            .collect();
        Ok(build_report(route_name, segments))
    }
}
