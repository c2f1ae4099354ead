// ==========================================
// 工地物料订货与配送系统 - API层错误类型
// ==========================================
// 职责: 把各层错误统一为调用方可读的错误
// 映射: 无效参数 / 未找到 / 数据不足 与引擎层一一对应;
//       降级计算不是错误,不会出现在这里
// ==========================================

use crate::engine::error::EngineError;
use crate::ledger::error::LedgerError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 输入与业务错误
    // ==========================================
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("数据不足: {0}")]
    InsufficientData(String),

    /// 物料重名、阶段重名
    #[error("冲突: {0}")]
    Conflict(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 对外错误码（与 HTTP 语义对齐,供上层路由层使用）
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::InvalidArgument(_) | ApiError::InsufficientData(_) => 400,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::DatabaseError(_) | ApiError::InternalError(_) | ApiError::Other(_) => 500,
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidArgument(msg) => ApiError::InvalidArgument(msg),
            EngineError::InsufficientData(msg) => ApiError::InsufficientData(msg),
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// 目的: 将技术错误转换为调用方可读的错误
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::UniqueConstraintViolation(msg) => ApiError::Conflict(msg),
            RepositoryError::ValidationError(msg) => ApiError::InvalidArgument(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg)
            | RepositoryError::DatabaseQueryError(msg)
            | RepositoryError::SerializationError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 LedgerError 转换
// ==========================================
impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(msg) => ApiError::NotFound(msg),
            LedgerError::Conflict(msg) => ApiError::Conflict(msg),
            LedgerError::InvalidArgument(msg) => ApiError::InvalidArgument(msg),
            LedgerError::LockError(msg) => ApiError::InternalError(format!("账本锁获取失败: {}", msg)),
            LedgerError::Engine(e) => e.into(),
            LedgerError::Repository(e) => e.into(),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let e: ApiError = LedgerError::Engine(EngineError::InsufficientData("无日用量".into())).into();
        assert!(matches!(e, ApiError::InsufficientData(_)));
        assert_eq!(e.status_code(), 400);

        let e: ApiError = LedgerError::Conflict("物料 'Cement' 已存在".into()).into();
        assert_eq!(e.status_code(), 409);

        let e: ApiError = RepositoryError::NotFound {
            entity: "Material".into(),
            id: "Tiles".into(),
        }
        .into();
        assert_eq!(e.status_code(), 404);
        assert!(e.to_string().contains("Tiles"));
    }
}
