// ==========================================
// 工地物料订货与配送系统 - 仓储层错误类型
// ==========================================
// 映射: 主键/唯一约束 → 重复; CHECK/外键/非空 → 校验失败;
//       库忙/库锁 → 锁错误; 其余 → 查询失败
// ==========================================

use rusqlite::ffi;
use rusqlite::ErrorCode;
use thiserror::Error;

/// 仓储层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("{entity} '{id}' 不存在")]
    NotFound { entity: String, id: String },

    /// Mutex 中毒或 SQLite 忙/锁
    #[error("存储锁不可用: {0}")]
    LockError(String),

    #[error("事务提交失败: {0}")]
    DatabaseTransactionError(String),

    #[error("SQL 执行失败: {0}")]
    DatabaseQueryError(String),

    /// 物料名或站点名重复
    #[error("记录重复: {0}")]
    UniqueConstraintViolation(String),

    #[error("快照 JSON 无效: {0}")]
    SerializationError(String),

    /// 余量越界、阶段状态未知、日期格式错误、配置取值非法等
    #[error("数据不合法: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, msg) => {
                let detail = msg.clone().unwrap_or_else(|| err.to_string());
                match code.code {
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                        RepositoryError::LockError(detail)
                    }
                    ErrorCode::ConstraintViolation => match code.extended_code {
                        ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                            RepositoryError::UniqueConstraintViolation(detail)
                        }
                        _ => RepositoryError::ValidationError(detail),
                    },
                    _ => RepositoryError::DatabaseQueryError(detail),
                }
            }
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "row".to_string(),
                id: "?".to_string(),
            },
            _ => RepositoryError::DatabaseQueryError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::SerializationError(err.to_string())
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;
