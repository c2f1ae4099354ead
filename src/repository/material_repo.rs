// ==========================================
// 工地物料订货与配送系统 - 物料数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 原子性: 一次保存要么全部落库,要么保持原状态
// ==========================================

mod memory;
mod sqlite;

pub use memory::InMemoryMaterialStore;
pub use sqlite::SqliteMaterialStore;

use crate::domain::material::Material;
use crate::repository::error::RepositoryResult;

/// 物料账本存储接口
///
/// 键为物料名称,物料之间无顺序要求
pub trait MaterialStore: Send + Sync {
    /// 读取全部物料（含阶段历史与日用量）
    fn load_all(&self) -> RepositoryResult<Vec<Material>>;

    /// 整体替换单个物料
    fn save_material(&self, material: &Material) -> RepositoryResult<()>;

    /// 整体替换全部物料
    fn save_all(&self, materials: &[Material]) -> RepositoryResult<()>;

    /// 删除物料（级联删除阶段与日用量）
    ///
    /// # 返回
    /// - Ok(true): 已删除
    /// - Ok(false): 物料不存在
    fn delete_material(&self, name: &str) -> RepositoryResult<bool>;
}
