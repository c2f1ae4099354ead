// ==========================================
// 路况数据源 - 可复现模拟数据
// ==========================================
// 天气: 从 4 个预设（clear / rain / heavy_rain / cloudy）中随机选择
// 交通: 每段拥堵从 [low, low, medium, high, high] 中选择,
//       车速 low 60-70 / medium 40-50 / high 20-30 km/h
// 种子: Some(seed) 可复现,None 使用系统熵
// ==========================================

use super::error::{ProviderError, ProviderResult};
use super::traffic::{build_report, segment, TrafficProvider};
use super::weather::{observation, WeatherProvider};
use crate::domain::conditions::{TrafficReport, WeatherObservation};
use crate::domain::site::Coords;
use crate::domain::types::{CongestionLevel, WeatherCondition};
use async_trait::async_trait;
use rand::prelude::*;
use std::sync::Mutex;

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

// ==========================================
// MockWeatherProvider
// ==========================================
pub struct MockWeatherProvider {
    rng: Mutex<StdRng>,
}

impl MockWeatherProvider {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            rng: Mutex::new(seeded_rng(seed)),
        }
    }

    fn next_observation(&self) -> ProviderResult<WeatherObservation> {
        const PRESETS: [(WeatherCondition, f64, f64); 4] = [
            (WeatherCondition::Clear, 0.0, 10.0),
            (WeatherCondition::Rain, 5.0, 20.0),
            (WeatherCondition::HeavyRain, 15.0, 35.0),
            (WeatherCondition::Cloudy, 0.0, 12.0),
        ];
        let mut rng = self
            .rng
            .lock()
            .map_err(|e| ProviderError::Unavailable(format!("随机源锁获取失败: {}", e)))?;
        let (condition, rain, wind) = PRESETS[rng.gen_range(0..PRESETS.len())];
        Ok(observation(condition, rain, wind))
    }
}

#[async_trait]
impl WeatherProvider for MockWeatherProvider {
    fn name(&self) -> &'static str {
        "mock_weather"
    }

    async fn query(&self, _coords: Coords) -> ProviderResult<WeatherObservation> {
        self.next_observation()
    }
}

// ==========================================
// MockTrafficProvider
// ==========================================
pub struct MockTrafficProvider {
    rng: Mutex<StdRng>,
    free_flow_kmh: f64,
}

impl MockTrafficProvider {
    pub fn new(seed: Option<u64>, free_flow_kmh: f64) -> Self {
        Self {
            rng: Mutex::new(seeded_rng(seed)),
            free_flow_kmh,
        }
    }
}

#[async_trait]
impl TrafficProvider for MockTrafficProvider {
    fn name(&self) -> &'static str {
        "mock_traffic"
    }

    async fn query(&self, waypoints: &[Coords], route_name: &str) -> ProviderResult<TrafficReport> {
        const PATTERN: [CongestionLevel; 5] = [
            CongestionLevel::Low,
            CongestionLevel::Low,
            CongestionLevel::Medium,
            CongestionLevel::High,
            CongestionLevel::High,
        ];
        let mut rng = self
            .rng
            .lock()
            .map_err(|e| ProviderError::Unavailable(format!("随机源锁获取失败: {}", e)))?;

        let segments = waypoints
            .windows(2)
            .map(|pair| {
                let congestion = PATTERN[rng.gen_range(0..PATTERN.len())];
                let speed = match congestion {
                    CongestionLevel::Low => 60.0 + rng.gen_range(0..=10) as f64,
                    CongestionLevel::Medium => 40.0 + rng.gen_range(0..=10) as f64,
                    _ => 20.0 + rng.gen_range(0..=10) as f64,
                };
                segment(pair[0], pair[1], self.free_flow_kmh, speed, congestion)
            })
            .collect();

        Ok(build_report(route_name, segments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seeded_mock_is_reproducible() {
        let a = MockWeatherProvider::new(Some(42));
        let b = MockWeatherProvider::new(Some(42));
        let p = Coords::new(12.97, 77.59);
        for _ in 0..5 {
            assert_eq!(a.query(p).await.unwrap(), b.query(p).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_mock_traffic_shape() {
        let provider = MockTrafficProvider::new(Some(7), 60.0);
        let pts = [
            Coords::new(12.97, 77.59),
            Coords::new(12.96, 77.75),
            Coords::new(12.84, 77.66),
        ];
        let report = provider.query(&pts, "Route A").await.unwrap();
        assert_eq!(report.route_name, "Route A");
        assert_eq!(report.segments.len(), 2);
        assert!(report.delay_minutes >= 0.0);
        for s in &report.segments {
            assert!((20.0..=70.0).contains(&s.speed_kmh));
        }
    }
}
