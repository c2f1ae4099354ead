// ==========================================
// 工地物料订货与配送系统 - 物料 API
// ==========================================
// 职责: 物料目录、阶段生命周期、库存/预测/补货查询
// 红线: 所有变更经 MaterialLedger; 预测在物料快照上计算,不持有账本锁
// ==========================================

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::api::error::{ApiError, ApiResult};
use crate::config::engine_config::EngineConfig;
use crate::domain::material::Material;
use crate::engine::buffer::AdaptiveBufferEngine;
use crate::engine::forecast::{ForecastEngine, ForecastResult};
use crate::engine::inventory::{InventoryStatus, InventoryTracker};
use crate::engine::reorder::{AutoReorderAlert, ReorderCheck, ReorderMonitor};
use crate::ledger::{
    MaterialLedger, MaterialReport, MaterialSpec, PhaseCompleted, PhaseInitialized,
    PhaseInventory, UsageLogged,
};

// ==========================================
// 请求 / 响应结构
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseInitializeRequest {
    pub material: String,
    pub phase_name: String,
    pub planned_qty: f64,
    #[serde(default)]
    pub carry_in: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmartOrderRequest {
    pub material: String,
    pub planned_qty: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmartOrderResponse {
    pub material: String,
    pub unit: String,
    pub planned_qty: f64,
    pub buffer_pct: f64,
    pub recommended_qty: f64,
}

/// 直接按数量计算库存快照（不读账本）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryStatusRequest {
    pub ordered_qty: f64,
    pub consumed_qty: f64,
    #[serde(default)]
    pub carry_in: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogUsageRequest {
    pub material: String,
    /// 缺省为最近一个阶段
    #[serde(default)]
    pub phase_index: Option<usize>,
    pub qty_used: f64,
    /// 缺省为今天
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastRequest {
    pub material: String,
    #[serde(default)]
    pub phase_index: Option<usize>,
    /// 缺省取配置 forecast.default_horizon
    #[serde(default)]
    pub horizon: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResponse {
    pub material: String,
    pub unit: String,
    #[serde(flatten)]
    pub result: ForecastResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderCheckRequest {
    pub material: String,
    pub ordered_qty: f64,
    pub remaining: f64,
    pub planned_qty: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderCheckResponse {
    pub material: String,
    pub unit: String,
    #[serde(flatten)]
    pub check: ReorderCheck,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoReorderRequest {
    pub material: String,
    #[serde(default)]
    pub phase_index: Option<usize>,
    /// 在途未到货数量
    #[serde(default)]
    pub on_order_qty: f64,
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseCompleteRequest {
    pub material: String,
    #[serde(default)]
    pub phase_index: Option<usize>,
    /// 显式实际消耗,缺省按日用量汇总
    #[serde(default)]
    pub consumed_qty: Option<f64>,
}

/// 补录已完成阶段
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPhaseRequest {
    pub material: String,
    pub phase_name: String,
    pub planned_qty: f64,
    pub ordered_qty: f64,
    pub consumed_qty: f64,
    #[serde(default)]
    pub carry_in: f64,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

// ==========================================
// MaterialApi - 物料 API
// ==========================================
pub struct MaterialApi {
    ledger: Arc<MaterialLedger>,
    buffer_engine: AdaptiveBufferEngine,
    tracker: InventoryTracker,
    forecast_engine: Arc<ForecastEngine>,
    reorder_monitor: ReorderMonitor,
    default_horizon: usize,
}

impl MaterialApi {
    /// 创建新的MaterialApi实例
    ///
    /// # 参数
    /// - ledger: 物料账本
    /// - forecast_engine: 预测引擎（可注入自定义模型链）
    /// - config: 引擎配置
    pub fn new(
        ledger: Arc<MaterialLedger>,
        forecast_engine: Arc<ForecastEngine>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            ledger,
            buffer_engine: AdaptiveBufferEngine::new(),
            tracker: InventoryTracker::default(),
            forecast_engine,
            reorder_monitor: ReorderMonitor::new(config.reorder.clone()),
            default_horizon: config.forecast.default_horizon,
        }
    }

    pub fn ledger(&self) -> &Arc<MaterialLedger> {
        &self.ledger
    }

    // ==========================================
    // 物料目录
    // ==========================================

    pub fn list_materials(&self) -> ApiResult<Vec<Material>> {
        Ok(self.ledger.list()?)
    }

    pub fn get_material(&self, name: &str) -> ApiResult<Material> {
        Ok(self.ledger.get(name)?)
    }

    pub fn add_material(&self, spec: MaterialSpec) -> ApiResult<Material> {
        Ok(self.ledger.add_material(spec)?)
    }

    /// # 返回
    /// 规范化后的物料名
    pub fn delete_material(&self, name: &str) -> ApiResult<String> {
        Ok(self.ledger.remove_material(name)?)
    }

    pub fn reset_buffer(&self, name: &str) -> ApiResult<Material> {
        let material = self.ledger.reset_buffer(name)?;
        info!(material = %material.name, buffer = material.buffer_pct, "余量已重置");
        Ok(material)
    }

    pub fn material_report(&self, name: &str) -> ApiResult<MaterialReport> {
        Ok(self.ledger.report(name)?)
    }

    // ==========================================
    // 阶段生命周期
    // ==========================================

    /// 阶段初始化（下单量 = 计划 × (1 + 余量/100)）
    pub fn phase_initialize(&self, req: PhaseInitializeRequest) -> ApiResult<PhaseInitialized> {
        Ok(self
            .ledger
            .initialize_phase(&req.material, &req.phase_name, req.planned_qty, req.carry_in)?)
    }

    /// 推荐下单量（只读,不建阶段）
    pub fn smart_order(&self, req: SmartOrderRequest) -> ApiResult<SmartOrderResponse> {
        let material = self.ledger.get(&req.material)?;
        let recommended_qty = self
            .buffer_engine
            .recommended_order(req.planned_qty, material.buffer_pct)?;
        Ok(SmartOrderResponse {
            material: material.name,
            unit: material.unit,
            planned_qty: req.planned_qty,
            buffer_pct: material.buffer_pct,
            recommended_qty,
        })
    }

    pub fn inventory_status(&self, req: InventoryStatusRequest) -> ApiResult<InventoryStatus> {
        Ok(self
            .tracker
            .status(req.ordered_qty, req.consumed_qty, req.carry_in)?)
    }

    /// 账本中某阶段的库存快照与趋势
    pub fn phase_inventory(
        &self,
        material: &str,
        phase_index: Option<usize>,
    ) -> ApiResult<PhaseInventory> {
        Ok(self.ledger.inventory_status(material, phase_index, today())?)
    }

    pub fn log_daily_usage(&self, req: LogUsageRequest) -> ApiResult<UsageLogged> {
        let today = today();
        let date = req.date.unwrap_or(today);
        Ok(self.ledger.log_daily_usage(
            &req.material,
            req.phase_index,
            req.qty_used,
            date,
            today.max(date),
        )?)
    }

    pub fn phase_complete(&self, req: PhaseCompleteRequest) -> ApiResult<PhaseCompleted> {
        Ok(self
            .ledger
            .complete_phase(&req.material, req.phase_index, req.consumed_qty)?)
    }

    pub fn record_closed_phase(&self, req: RecordPhaseRequest) -> ApiResult<PhaseCompleted> {
        Ok(self.ledger.record_closed_phase(
            &req.material,
            &req.phase_name,
            req.planned_qty,
            req.ordered_qty,
            req.consumed_qty,
            req.carry_in,
        )?)
    }

    // ==========================================
    // 预测与补货
    // ==========================================

    /// 用量预测
    ///
    /// # 返回
    /// - Err(NotFound): 物料不存在或阶段越界
    /// - Err(InsufficientData): 阶段无日用量记录
    /// - Err(InvalidArgument): horizon < 1
    #[instrument(skip(self, req), fields(material = %req.material))]
    pub fn forecast(&self, req: ForecastRequest) -> ApiResult<ForecastResponse> {
        let material = self.ledger.get(&req.material)?;
        let phase = select_phase(&material, req.phase_index)?;
        let horizon = req.horizon.unwrap_or(self.default_horizon);

        let result = self.forecast_engine.forecast(phase, horizon)?;
        Ok(ForecastResponse {
            material: material.name.clone(),
            unit: material.unit.clone(),
            result,
        })
    }

    /// 阈值补货检查（数量由调用方给出）
    pub fn reorder_check(&self, req: ReorderCheckRequest) -> ApiResult<ReorderCheckResponse> {
        let material = self.ledger.get(&req.material)?;
        let check =
            self.reorder_monitor
                .check(&material, req.ordered_qty, req.remaining, req.planned_qty)?;
        Ok(ReorderCheckResponse {
            material: material.name,
            unit: material.unit,
            check,
        })
    }

    /// 单物料自动补货判定（EMA 断料预测）
    pub fn auto_reorder(&self, req: AutoReorderRequest) -> ApiResult<AutoReorderAlert> {
        let material = self.ledger.get(&req.material)?;
        let phase = select_phase(&material, req.phase_index)?;
        Ok(self.reorder_monitor.check_auto_reorder(
            &material,
            phase.phase_index,
            req.on_order_qty,
            req.as_of.unwrap_or_else(today),
        )?)
    }

    /// 全部物料最新阶段的自动补货判定（紧急在前）
    pub fn auto_reorder_all(
        &self,
        on_order: &HashMap<String, f64>,
        as_of: Option<NaiveDate>,
    ) -> ApiResult<Vec<AutoReorderAlert>> {
        let materials = self.ledger.list()?;
        Ok(self
            .reorder_monitor
            .check_all(&materials, on_order, as_of.unwrap_or_else(today)))
    }
}

fn select_phase(
    material: &Material,
    phase_index: Option<usize>,
) -> ApiResult<&crate::domain::material::PhaseRecord> {
    let idx = match phase_index {
        Some(i) => i,
        None => material.latest_phase_index().ok_or_else(|| {
            ApiError::NotFound(format!("物料 '{}' 尚无阶段记录", material.name))
        })?,
    };
    material.phase(idx).ok_or_else(|| {
        ApiError::NotFound(format!(
            "物料 '{}' 的 phase_index {} 超出范围（共 {} 个阶段）",
            material.name,
            idx,
            material.phases_logged()
        ))
    })
}
