// ==========================================
// 工地物料订货与配送系统 - 配送领域模型
// ==========================================
// 所有权: TruckAssignment 由 LogisticsPlanner 在单次规划内持有,路线确定后不可变
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 车辆规格（规划输入）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TruckSpec {
    pub truck_id: String,
    pub capacity_kg: f64,
}

impl TruckSpec {
    pub fn new(truck_id: impl Into<String>, capacity_kg: f64) -> Self {
        Self {
            truck_id: truck_id.into(),
            capacity_kg,
        }
    }
}

// ==========================================
// TruckAssignment - 单车装载与路线
// ==========================================
// 空闲车辆: distance_km = 0, route 为空
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TruckAssignment {
    pub truck_id: String,
    pub capacity_kg: f64,
    pub used_capacity_kg: f64,
    pub utilization_pct: f64,
    /// 物料 → 装载件数
    pub materials_loaded: BTreeMap<String, u64>,
    /// 站点名称序列,非空闲时首尾均为仓库
    pub route: Vec<String>,
    pub distance_km: f64,
    pub co2_kg: f64,
}

impl TruckAssignment {
    pub fn empty(spec: &TruckSpec) -> Self {
        Self {
            truck_id: spec.truck_id.clone(),
            capacity_kg: spec.capacity_kg,
            used_capacity_kg: 0.0,
            utilization_pct: 0.0,
            materials_loaded: BTreeMap::new(),
            route: Vec::new(),
            distance_km: 0.0,
            co2_kg: 0.0,
        }
    }

    pub fn free_capacity_kg(&self) -> f64 {
        (self.capacity_kg - self.used_capacity_kg).max(0.0)
    }

    pub fn is_loaded(&self) -> bool {
        self.used_capacity_kg > 0.0
    }

    /// 装载率 = 已用 / 额定 (0..=1)
    pub fn load_factor(&self) -> f64 {
        if self.capacity_kg <= 0.0 {
            0.0
        } else {
            (self.used_capacity_kg / self.capacity_kg).clamp(0.0, 1.0)
        }
    }
}

/// 单个物料的装车结果（未能全部装下时截断）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialAllocation {
    pub material: String,
    pub priority: u8,
    pub requested_units: u64,
    pub loaded_units: u64,
    pub unplaced_units: u64,
}

/// 路线求解策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    /// 外部/内置约束求解器
    Solver,
    /// 最近邻启发式兜底
    NearestNeighbor,
    /// 没有需要出车的车辆
    Idle,
}

// ==========================================
// DeliveryPlan - 单次配送规划结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryPlan {
    pub plan_id: String,
    pub depot: String,
    pub trucks: Vec<TruckAssignment>,
    pub allocations: Vec<MaterialAllocation>,
    pub routing_strategy: RoutingStrategy,
    pub solver_name: Option<String>,
    pub total_distance_km: f64,
    pub total_co2_kg: f64,
    /// 总体装载率（已用 / 总额定）
    pub utilization_pct: f64,
    /// 降级说明（求解器不可用、截断等）
    pub notes: Vec<String>,
}
