// ==========================================
// 路况数据源 - 天气
// ==========================================
// 延误表（分钟）:
//   clear=0, cloudy=5,
//   rain/drizzle: <5mm=10, <10mm=25, >=10mm=45,
//   heavy_rain=60, snow=90, thunderstorm=120, 其他=0
//   风速 > 30 km/h 额外 0.5 × (wind - 30)
// ==========================================

use super::error::ProviderResult;
use crate::domain::conditions::WeatherObservation;
use crate::domain::site::Coords;
use crate::domain::types::WeatherCondition;
use async_trait::async_trait;

/// 天气数据源
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn query(&self, coords: Coords) -> ProviderResult<WeatherObservation>;
}

/// 单点天气延误（分钟）
pub fn weather_delay_minutes(condition: WeatherCondition, rainfall_mm: f64, wind_kmh: f64) -> f64 {
    let base = match condition {
        WeatherCondition::Clear => 0.0,
        WeatherCondition::Cloudy => 5.0,
        WeatherCondition::Rain | WeatherCondition::Drizzle => {
            if rainfall_mm < 5.0 {
                10.0
            } else if rainfall_mm < 10.0 {
                25.0
            } else {
                45.0
            }
        }
        WeatherCondition::HeavyRain => 60.0,
        WeatherCondition::Snow => 90.0,
        WeatherCondition::Thunderstorm => 120.0,
        WeatherCondition::Other => 0.0,
    };
    base + 0.5 * (wind_kmh - 30.0).max(0.0)
}

/// 构建观测并按延误表填写 delay_minutes
pub fn observation(condition: WeatherCondition, rainfall_mm: f64, wind_kmh: f64) -> WeatherObservation {
    WeatherObservation {
        condition,
        rainfall_mm,
        wind_kmh,
        delay_minutes: weather_delay_minutes(condition, rainfall_mm, wind_kmh),
    }
}
