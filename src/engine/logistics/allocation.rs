// ==========================================
// 物流规划 - 装车分配（贪心背包）
// ==========================================
// 排序: 优先级降序 → 单位重量降序（同级保持输入顺序）
// 放置: 每种物料按车辆剩余容量降序依次装入,直到需求满足或容量用尽
// 截断: 装不下的部分记入 unplaced_units,不报错
// ==========================================

use crate::domain::delivery::{MaterialAllocation, TruckAssignment, TruckSpec};
use crate::domain::material::Material;
use crate::domain::numeric::round_dp;
use crate::engine::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// 待装车物料
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadItem {
    pub material: String,
    pub weight_per_unit: f64,
    pub priority: u8,
    pub units: u64,
}

impl LoadItem {
    /// 按物料主数据构建,数量四舍五入为整件
    pub fn from_material(material: &Material, quantity: f64) -> Self {
        Self {
            material: material.name.clone(),
            weight_per_unit: material.weight_per_unit,
            priority: material.priority,
            units: quantity.max(0.0).round() as u64,
        }
    }
}

/// 分配结果
#[derive(Debug, Clone)]
pub struct AllocationOutcome {
    pub trucks: Vec<TruckAssignment>,
    pub allocations: Vec<MaterialAllocation>,
    pub notes: Vec<String>,
}

// ==========================================
// CapacityAllocator - 装车分配器
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct CapacityAllocator {
    weather_sensitive: Vec<String>,
}

impl CapacityAllocator {
    pub fn new(weather_sensitive: Vec<String>) -> Self {
        Self { weather_sensitive }
    }

    /// 降雨时对怕潮物料提升优先级: min(10, floor(p × 1.5))
    pub fn effective_priority(&self, item: &LoadItem, rain_expected: bool) -> u8 {
        let sensitive = self
            .weather_sensitive
            .iter()
            .any(|m| m.eq_ignore_ascii_case(&item.material));
        if rain_expected && sensitive {
            ((item.priority as f64 * 1.5).floor() as u8).min(10)
        } else {
            item.priority
        }
    }

    /// 贪心装车
    ///
    /// # 参数
    /// - `items`: 待装物料（件数）
    /// - `trucks`: 车辆规格（额定载重 > 0）
    /// - `rain_expected`: 是否预计降雨
    ///
    /// # 返回
    /// 每车装载 + 每种物料的装载/截断情况
    pub fn allocate(
        &self,
        items: &[LoadItem],
        trucks: &[TruckSpec],
        rain_expected: bool,
    ) -> EngineResult<AllocationOutcome> {
        validate(items, trucks)?;

        let mut ordered: Vec<(u8, &LoadItem)> = items
            .iter()
            .map(|item| (self.effective_priority(item, rain_expected), item))
            .collect();
        ordered.sort_by(|a, b| {
            b.0.cmp(&a.0).then_with(|| {
                b.1.weight_per_unit
                    .partial_cmp(&a.1.weight_per_unit)
                    .unwrap_or(Ordering::Equal)
            })
        });

        let mut assignments: Vec<TruckAssignment> =
            trucks.iter().map(TruckAssignment::empty).collect();
        let mut allocations = Vec::with_capacity(ordered.len());
        let mut notes = Vec::new();

        for (priority, item) in ordered {
            let mut remaining = item.units;

            let mut order: Vec<usize> = (0..assignments.len()).collect();
            order.sort_by(|&a, &b| {
                assignments[b]
                    .free_capacity_kg()
                    .partial_cmp(&assignments[a].free_capacity_kg())
                    .unwrap_or(Ordering::Equal)
            });

            for idx in order {
                if remaining == 0 {
                    break;
                }
                let truck = &mut assignments[idx];
                let fit = ((truck.free_capacity_kg() + 1e-9) / item.weight_per_unit).floor() as u64;
                let placed = fit.min(remaining);
                if placed == 0 {
                    continue;
                }
                truck.used_capacity_kg += placed as f64 * item.weight_per_unit;
                *truck
                    .materials_loaded
                    .entry(item.material.clone())
                    .or_insert(0) += placed;
                remaining -= placed;
            }

            let loaded = item.units - remaining;
            if remaining > 0 {
                notes.push(format!(
                    "{} 请求 {} 件,容量不足仅装载 {} 件",
                    item.material, item.units, loaded
                ));
            }
            debug!(material = %item.material, priority, loaded, unplaced = remaining, "物料装车");

            allocations.push(MaterialAllocation {
                material: item.material.clone(),
                priority,
                requested_units: item.units,
                loaded_units: loaded,
                unplaced_units: remaining,
            });
        }

        for truck in &mut assignments {
            truck.utilization_pct = if truck.capacity_kg > 0.0 {
                round_dp(truck.used_capacity_kg / truck.capacity_kg * 100.0, 2)
            } else {
                0.0
            };
        }

        Ok(AllocationOutcome {
            trucks: assignments,
            allocations,
            notes,
        })
    }
}

fn validate(items: &[LoadItem], trucks: &[TruckSpec]) -> EngineResult<()> {
    if trucks.is_empty() {
        return Err(EngineError::InvalidArgument("至少需要一辆车".to_string()));
    }
    for truck in trucks {
        if !truck.capacity_kg.is_finite() || truck.capacity_kg <= 0.0 {
            return Err(EngineError::InvalidArgument(format!(
                "车辆 {} 额定载重必须大于 0, 实际={}",
                truck.truck_id, truck.capacity_kg
            )));
        }
    }
    for item in items {
        if !item.weight_per_unit.is_finite() || item.weight_per_unit <= 0.0 {
            return Err(EngineError::InvalidArgument(format!(
                "物料 {} 单位重量必须大于 0, 实际={}",
                item.material, item.weight_per_unit
            )));
        }
    }
    Ok(())
}
