// ==========================================
// 工地物料订货与配送系统 - 引擎层错误类型
// ==========================================
// 说明: 降级计算（模型拟合失败、求解器不可用、外部服务超时）不是错误,
//       以 note / warning 字段随有效结果返回
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// 输入格式或取值范围错误（负数量、horizon<1、比较路线不足 2 条等）
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 数据不足以完成计算（无日用量时请求预测）
    #[error("数据不足: {0}")]
    InsufficientData(String),
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;

/// 校验数量为有限非负数
pub(crate) fn ensure_non_negative(field: &str, value: f64) -> EngineResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidArgument(format!(
            "{} 必须为非负有限数, 实际={}",
            field, value
        )))
    }
}
