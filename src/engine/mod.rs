// ==========================================
// 工地物料订货与配送系统 - 引擎层
// ==========================================
// 职责: 订货、预测、补货、装车路线与路况分析的纯计算
// 红线: Engine 不拼 SQL, 不持有账本状态; 降级结果必须附带 note / warning
// ==========================================

pub mod buffer;
pub mod error;
pub mod forecast;
pub mod geo;
pub mod inventory;
pub mod logistics;
pub mod reorder;
pub mod route_analysis;
pub mod route_compare;

// 重导出核心引擎
pub use buffer::AdaptiveBufferEngine;
pub use error::{EngineError, EngineResult};
pub use forecast::arima::{ArimaOrder, FitError};
pub use forecast::models::{AutoArima, FixedArma, ForecastModel, ModelFit};
pub use forecast::{ForecastEngine, ForecastPoint, ForecastResult};
pub use geo::{haversine_km, DistanceMatrix};
pub use inventory::{InventoryStatus, InventoryTracker, UsageTrend};
pub use logistics::allocation::{AllocationOutcome, CapacityAllocator, LoadItem};
pub use logistics::routing::{ClarkeWrightSolver, RoutingProblem, SolverError, VehicleRoutingSolver};
pub use logistics::{DeliveryRequest, LogisticsPlanner};
pub use reorder::{AutoReorderAlert, ReorderCheck, ReorderMonitor, StockoutPrediction};
pub use route_analysis::{RouteAnalysis, RouteConditionAnalyzer, RouteInput};
pub use route_compare::{RecommendationKind, RouteComparator, RouteComparison, RouteSavings};
