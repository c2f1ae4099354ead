// ==========================================
// 工地物料订货与配送系统 - 账本层错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use crate::engine::error::EngineError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 账本层错误类型
#[derive(Error, Debug)]
pub enum LedgerError {
    /// 物料不存在 / 阶段序号越界
    #[error("未找到: {0}")]
    NotFound(String),

    /// 物料重名 / 同一物料内阶段重名
    #[error("冲突: {0}")]
    Conflict(String),

    /// 参数非法或阶段状态不允许该操作
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    #[error("账本锁获取失败: {0}")]
    LockError(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Result 类型别名
pub type LedgerResult<T> = Result<T, LedgerError>;
