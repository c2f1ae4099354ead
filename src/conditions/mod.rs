// ==========================================
// 工地物料订货与配送系统 - 路况数据源层
// ==========================================
// 职责: 天气 / 交通外部数据的接口、模拟实现、固定数据与超时兜底网关
// 红线: 只约定数据契约,不含具体网络传输
// ==========================================

pub mod error;
pub mod fixture;
pub mod gateway;
pub mod mock;
pub mod traffic;
pub mod weather;

pub use error::{ProviderError, ProviderResult};
pub use fixture::{FixtureTrafficProvider, FixtureWeatherProvider};
pub use gateway::{ConditionsGateway, Sourced};
pub use mock::{MockTrafficProvider, MockWeatherProvider};
pub use traffic::TrafficProvider;
pub use weather::{weather_delay_minutes, WeatherProvider};
