// ==========================================
// 路况数据源 - 网关（超时 + 兜底）
// ==========================================
// 数据源选择: source=live 且注册了实时数据源时先查实时,否则直接用兜底源
// 超时: 每次实时查询包一层 tokio::time::timeout
// 红线: 外部失败从不向调用方抛错,改用兜底数据并写 notes
// ==========================================

use super::error::ProviderError;
use super::mock::{MockTrafficProvider, MockWeatherProvider};
use super::traffic::TrafficProvider;
use super::weather::WeatherProvider;
use crate::config::engine_config::{ConditionsConfig, ConditionsSource};
use crate::domain::conditions::{TrafficReport, WeatherObservation};
use crate::domain::site::Coords;
use crate::domain::types::CongestionLevel;
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// 带来源说明的查询结果
#[derive(Debug, Clone)]
pub struct Sourced<T> {
    pub value: T,
    pub source: String,
    pub notes: Vec<String>,
}

// ==========================================
// ConditionsGateway
// ==========================================
pub struct ConditionsGateway {
    source: ConditionsSource,
    timeout: Duration,
    live_weather: Option<Arc<dyn WeatherProvider>>,
    live_traffic: Option<Arc<dyn TrafficProvider>>,
    fallback_weather: Arc<dyn WeatherProvider>,
    fallback_traffic: Arc<dyn TrafficProvider>,
}

impl ConditionsGateway {
    /// 兜底源为按配置种子初始化的模拟数据
    pub fn new(config: &ConditionsConfig) -> Self {
        Self {
            source: config.source,
            timeout: Duration::from_millis(config.provider_timeout_ms.max(1)),
            live_weather: None,
            live_traffic: None,
            fallback_weather: Arc::new(MockWeatherProvider::new(config.mock_seed)),
            fallback_traffic: Arc::new(MockTrafficProvider::new(
                config.mock_seed.map(|s| s.wrapping_add(1)),
                config.avg_speed_kmh,
            )),
        }
    }

    /// 注册实时数据源（仅 source=live 时生效）
    pub fn with_live(
        mut self,
        weather: Arc<dyn WeatherProvider>,
        traffic: Arc<dyn TrafficProvider>,
    ) -> Self {
        self.live_weather = Some(weather);
        self.live_traffic = Some(traffic);
        self
    }

    /// 替换兜底数据源（测试注入固定数据）
    pub fn with_fallback(
        mut self,
        weather: Arc<dyn WeatherProvider>,
        traffic: Arc<dyn TrafficProvider>,
    ) -> Self {
        self.fallback_weather = weather;
        self.fallback_traffic = traffic;
        self
    }

    pub fn source(&self) -> ConditionsSource {
        self.source
    }

    /// 单点天气
    pub async fn weather_at(&self, coords: Coords) -> Sourced<WeatherObservation> {
        let mut notes = Vec::new();

        if let Some(live) = self.live_provider(&self.live_weather, "天气", &mut notes) {
            match self.with_timeout(live.query(coords)).await {
                Ok(obs) => {
                    return Sourced {
                        value: obs,
                        source: live.name().to_string(),
                        notes,
                    }
                }
                Err(e) => {
                    warn!(provider = live.name(), error = %e, "实时天气查询失败,使用兜底数据");
                    notes.push(format!("{} 查询失败（{}）,已使用 {}", live.name(), e, self.fallback_weather.name()));
                }
            }
        }

        let value = match self.fallback_weather.query(coords).await {
            Ok(obs) => obs,
            Err(e) => {
                warn!(error = %e, "兜底天气数据失败,按晴天处理");
                notes.push(format!("兜底天气数据失败（{}）,按晴天处理", e));
                WeatherObservation::clear()
            }
        };
        Sourced {
            value,
            source: self.fallback_weather.name().to_string(),
            notes,
        }
    }

    /// 路线所有途经点天气（并发查询,结果与 waypoints 顺序一致）
    pub async fn route_weather(&self, waypoints: &[Coords]) -> Sourced<Vec<WeatherObservation>> {
        let results = join_all(waypoints.iter().map(|&c| self.weather_at(c))).await;

        let mut notes: Vec<String> = Vec::new();
        let mut sources: Vec<String> = Vec::new();
        let mut values = Vec::with_capacity(results.len());
        for r in results {
            for n in r.notes {
                if !notes.contains(&n) {
                    notes.push(n);
                }
            }
            if !sources.contains(&r.source) {
                sources.push(r.source);
            }
            values.push(r.value);
        }
        debug!(points = values.len(), sources = ?sources, "路线天气查询完成");

        Sourced {
            value: values,
            source: sources.join(","),
            notes,
        }
    }

    /// 路线交通
    pub async fn route_traffic(&self, waypoints: &[Coords], route_name: &str) -> Sourced<TrafficReport> {
        let mut notes = Vec::new();

        if let Some(live) = self.live_provider(&self.live_traffic, "交通", &mut notes) {
            match self.with_timeout(live.query(waypoints, route_name)).await {
                Ok(report) => {
                    return Sourced {
                        value: report,
                        source: live.name().to_string(),
                        notes,
                    }
                }
                Err(e) => {
                    warn!(provider = live.name(), error = %e, "实时交通查询失败,使用兜底数据");
                    notes.push(format!("{} 查询失败（{}）,已使用 {}", live.name(), e, self.fallback_traffic.name()));
                }
            }
        }

        let value = match self.fallback_traffic.query(waypoints, route_name).await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "兜底交通数据失败,按无延误处理");
                notes.push(format!("兜底交通数据失败（{}）,按无延误处理", e));
                TrafficReport {
                    route_name: route_name.to_string(),
                    segments: Vec::new(),
                    delay_minutes: 0.0,
                    congestion_level: CongestionLevel::Low,
                }
            }
        };
        Sourced {
            value,
            source: self.fallback_traffic.name().to_string(),
            notes,
        }
    }

    // ==========================================
    // 内部工具
    // ==========================================

    fn live_provider<'a, P: ?Sized>(
        &self,
        provider: &'a Option<Arc<P>>,
        kind: &str,
        notes: &mut Vec<String>,
    ) -> Option<&'a Arc<P>> {
        if self.source != ConditionsSource::Live {
            return None;
        }
        if provider.is_none() {
            warn!(kind, "配置为实时数据源但未注册,使用兜底数据");
            notes.push(format!("未注册实时{}数据源,已使用模拟数据", kind));
        }
        provider.as_ref()
    }

    async fn with_timeout<T, F>(&self, fut: F) -> Result<T, ProviderError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::error::ProviderResult;
    use crate::conditions::fixture::{FixtureTrafficProvider, FixtureWeatherProvider};
    use crate::conditions::weather::observation;
    use crate::domain::types::WeatherCondition;
    use async_trait::async_trait;

    struct SlowWeather;

    #[async_trait]
    impl WeatherProvider for SlowWeather {
        fn name(&self) -> &'static str {
            "slow_weather"
        }

        async fn query(&self, _coords: Coords) -> ProviderResult<WeatherObservation> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(observation(WeatherCondition::Snow, 0.0, 0.0))
        }
    }

    fn live_config() -> ConditionsConfig {
        ConditionsConfig {
            source: ConditionsSource::Live,
            provider_timeout_ms: 20,
            ..ConditionsConfig::default()
        }
    }

    fn fixture_fallback(gateway: ConditionsGateway) -> ConditionsGateway {
        gateway.with_fallback(
            Arc::new(FixtureWeatherProvider::new(observation(WeatherCondition::Cloudy, 0.0, 12.0))),
            Arc::new(FixtureTrafficProvider::free_flow(60.0)),
        )
    }

    #[tokio::test]
    async fn test_timeout_falls_back() {
        let gateway = fixture_fallback(ConditionsGateway::new(&live_config()))
            .with_live(Arc::new(SlowWeather), Arc::new(FixtureTrafficProvider::free_flow(60.0)));

        let result = gateway.weather_at(Coords::new(12.97, 77.59)).await;
        assert_eq!(result.value.condition, WeatherCondition::Cloudy);
        assert_eq!(result.source, "fixture_weather");
        assert!(result.notes[0].contains("超时"));
    }

    #[tokio::test]
    async fn test_live_without_provider_notes_mock() {
        let gateway = fixture_fallback(ConditionsGateway::new(&live_config()));
        let pts = [Coords::new(12.97, 77.59), Coords::new(13.03, 77.59)];

        let traffic = gateway.route_traffic(&pts, "Route A").await;
        assert_eq!(traffic.value.delay_minutes, 0.0);
        assert!(traffic.notes.iter().any(|n| n.contains("未注册")));
    }

    #[tokio::test]
    async fn test_mock_source_ignores_live() {
        let config = ConditionsConfig::default();
        let gateway = fixture_fallback(ConditionsGateway::new(&config))
            .with_live(Arc::new(SlowWeather), Arc::new(FixtureTrafficProvider::free_flow(60.0)));

        let pts = [Coords::new(12.97, 77.59), Coords::new(13.03, 77.59)];
        let weather = gateway.route_weather(&pts).await;
        assert_eq!(weather.value.len(), 2);
        assert!(weather.notes.is_empty());
        assert_eq!(weather.source, "fixture_weather");
    }
}
