// ==========================================
// 工地物料订货与配送系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供物料账本与站点的持久化接口,屏蔽数据库细节
// 约束: 所有查询使用参数化
// ==========================================

pub mod error;
pub mod material_repo;
pub mod site_repo;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use material_repo::{InMemoryMaterialStore, MaterialStore, SqliteMaterialStore};
pub use site_repo::{InMemorySiteStore, SiteStore, SqliteSiteStore};
