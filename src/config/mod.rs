// ==========================================
// 工地物料订货与配送系统 - 配置层
// ==========================================
// 职责: 引擎参数的类型化定义与多级覆写
// 存储: config_kv 表 + 环境变量
// ==========================================

pub mod config_manager;
pub mod engine_config;

// 重导出核心配置
pub use config_manager::{apply_env_overrides, apply_override, config_keys, ConfigManager};
pub use engine_config::{
    ConditionsConfig, ConditionsSource, EngineConfig, ForecastConfig, LogisticsConfig,
    ReorderConfig, RoutingSolverKind,
};
