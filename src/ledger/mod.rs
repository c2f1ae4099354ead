// ==========================================
// 工地物料订货与配送系统 - 物料账本层
// ==========================================
// 职责: 进程内共享的物料账本,唯一可变更 Material / PhaseRecord 的入口
// 红线: 同一物料的读-改-写串行; 先落库后发布,落库失败内存不变
// ==========================================

pub mod error;
pub mod material_ledger;

pub use error::{LedgerError, LedgerResult};
pub use material_ledger::{
    MaterialReport, MaterialSpec, MaterialLedger, PhaseCompleted, PhaseInitialized,
    PhaseInventory, PhaseSummary, UsageLogged,
};
