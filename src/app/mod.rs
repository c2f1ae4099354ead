// ==========================================
// 工地物料订货与配送系统 - 应用层
// ==========================================
// 职责: 组装各层组件,供入口程序使用
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState, DB_PATH_ENV};
