// ==========================================
// 工地物料订货与配送系统 - API 层
// ==========================================
// 职责: 对外业务接口,统一参数校验与错误映射
// ==========================================

pub mod delivery_api;
pub mod error;
pub mod material_api;

// 重导出核心类型
pub use delivery_api::{
    AnalyzeRouteRequest, CompareRoutesRequest, DeliveryApi, DeliveryPlanRequest, RouteSpec,
    StopInput,
};
pub use error::{ApiError, ApiResult};
pub use material_api::{
    AutoReorderRequest, ForecastRequest, ForecastResponse, InventoryStatusRequest,
    LogUsageRequest, MaterialApi, PhaseCompleteRequest, PhaseInitializeRequest,
    RecordPhaseRequest, ReorderCheckRequest, ReorderCheckResponse, SmartOrderRequest,
    SmartOrderResponse,
};
