// ==========================================
// 工地物料订货与配送系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite + tokio
// 系统定位: 决策支持引擎（自适应余量、用量预测、补货、配送规划、路况分析）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 物料账本 - 并发安全的共享状态
pub mod ledger;

// 引擎层 - 业务规则
pub mod engine;

// 外部路况数据源
pub mod conditions;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组件组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域实体与类型
pub use domain::{
    Coords, DeliveryPlan, Material, PhaseRecord, PhaseStatus, RiskLevel, RoutingStrategy, Site,
    TruckSpec,
};

// 引擎
pub use engine::{
    AdaptiveBufferEngine, EngineError, ForecastEngine, InventoryTracker, LogisticsPlanner,
    ReorderMonitor, RouteComparator, RouteConditionAnalyzer,
};

// 账本
pub use ledger::{LedgerError, MaterialLedger};

// API
pub use api::{ApiError, DeliveryApi, MaterialApi};

// 配置
pub use config::{ConfigManager, EngineConfig};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "BuildSense 工地物料订货与配送系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
