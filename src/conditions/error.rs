// ==========================================
// 工地物料订货与配送系统 - 外部数据源错误
// ==========================================
// 说明: 仅在网关内部流转,调用方看到的是兜底数据 + notes
// ==========================================

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("数据源不可用: {0}")]
    Unavailable(String),

    #[error("数据源超时: {0}ms")]
    Timeout(u64),

    #[error("数据源返回格式错误: {0}")]
    InvalidResponse(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;
