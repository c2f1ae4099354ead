// ==========================================
// 工地物料订货与配送系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型与数据契约
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod conditions;
pub mod delivery;
pub mod material;
pub mod numeric;
pub mod site;
pub mod types;

// 重导出核心类型
pub use conditions::{TrafficReport, TrafficSegment, WeatherObservation};
pub use delivery::{DeliveryPlan, MaterialAllocation, RoutingStrategy, TruckAssignment, TruckSpec};
pub use material::{
    default_catalog, normalize_material_name, DailyUsageEntry, Material, PhaseRecord,
};
pub use site::{default_sites, Coords, Site};
pub use types::{CongestionLevel, ForecastRegime, PhaseStatus, RiskLevel, WeatherCondition};
