// ==========================================
// 工地物料订货与配送系统 - 物流规划引擎
// ==========================================
// 两阶段:
//   1. 装车分配（贪心背包,见 allocation）
//   2. 路径求解（CVRP 求解器 → 最近邻兜底,见 routing）
// 输出: DeliveryPlan（每车装载、路线、里程、排放 + 降级说明）
// ==========================================

pub mod allocation;
pub mod routing;

#[cfg(test)]
mod tests;

use crate::config::engine_config::{LogisticsConfig, RoutingSolverKind};
use crate::domain::delivery::{DeliveryPlan, RoutingStrategy, TruckSpec};
use crate::domain::numeric::round_dp;
use crate::domain::site::{Coords, Site};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::geo::{co2_kg, DistanceMatrix};
use allocation::{CapacityAllocator, LoadItem};
use routing::{
    nearest_neighbor_routes, ClarkeWrightSolver, RoutingProblem, SolverError, VehicleRoutingSolver,
};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// 配送规划请求
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    pub items: Vec<LoadItem>,
    pub trucks: Vec<TruckSpec>,
    /// 首个站点为仓库
    pub sites: Vec<Site>,
    pub rain_expected: bool,
}

// ==========================================
// LogisticsPlanner - 物流规划引擎
// ==========================================
pub struct LogisticsPlanner {
    config: LogisticsConfig,
    allocator: CapacityAllocator,
    solver: Option<Arc<dyn VehicleRoutingSolver>>,
}

impl LogisticsPlanner {
    /// 按配置选择求解器
    pub fn new(config: LogisticsConfig) -> Self {
        let solver: Option<Arc<dyn VehicleRoutingSolver>> = match config.routing_solver {
            RoutingSolverKind::ClarkeWright => Some(Arc::new(ClarkeWrightSolver)),
            RoutingSolverKind::None => None,
        };
        Self::with_solver(config, solver)
    }

    /// 注入自定义求解器（None 表示不可用）
    pub fn with_solver(
        config: LogisticsConfig,
        solver: Option<Arc<dyn VehicleRoutingSolver>>,
    ) -> Self {
        let allocator = CapacityAllocator::new(config.weather_sensitive_materials.clone());
        Self {
            config,
            allocator,
            solver,
        }
    }

    pub fn allocator(&self) -> &CapacityAllocator {
        &self.allocator
    }

    /// 生成配送计划
    ///
    /// # 参数
    /// - `request`: 待装物料 + 车辆 + 站点（首个为仓库）
    ///
    /// # 返回
    /// - Ok(DeliveryPlan): 求解器失败时以最近邻兜底,原因写入 notes
    /// - Err(InvalidArgument): 无站点、坐标非法、车辆/物料参数非法
    #[instrument(skip(self, request), fields(
        trucks = request.trucks.len(),
        sites = request.sites.len(),
        rain = request.rain_expected
    ))]
    pub fn plan(&self, request: &DeliveryRequest) -> EngineResult<DeliveryPlan> {
        let depot = request
            .sites
            .first()
            .ok_or_else(|| EngineError::InvalidArgument("站点列表为空,缺少仓库".to_string()))?;
        if let Some(bad) = request.sites.iter().find(|s| !s.coords.is_valid()) {
            return Err(EngineError::InvalidArgument(format!(
                "站点 {} 坐标非法: ({}, {})",
                bad.name, bad.coords.lat, bad.coords.lon
            )));
        }

        let outcome = self
            .allocator
            .allocate(&request.items, &request.trucks, request.rain_expected)?;
        let mut trucks = outcome.trucks;
        let mut notes = outcome.notes;
        let stops = &request.sites[1..];

        // 装载车辆按额定载重降序,与按载荷降序的路线一一对应
        let mut active: Vec<usize> = (0..trucks.len()).filter(|&i| trucks[i].is_loaded()).collect();
        active.sort_by(|&a, &b| {
            trucks[b]
                .capacity_kg
                .partial_cmp(&trucks[a].capacity_kg)
                .unwrap_or(Ordering::Equal)
        });

        let (strategy, solver_name) = if active.is_empty() || stops.is_empty() {
            if !active.is_empty() {
                notes.push("没有配送站点,装载车辆停留在仓库".to_string());
            }
            (RoutingStrategy::Idle, None)
        } else {
            let points: Vec<Coords> = request.sites.iter().map(|s| s.coords).collect();
            let matrix = DistanceMatrix::new(&points);
            let loaded_kg: f64 = active.iter().map(|&i| trucks[i].used_capacity_kg).sum();
            let demands = stop_demands(stops, loaded_kg);
            let capacity = active
                .iter()
                .map(|&i| trucks[i].capacity_kg)
                .fold(f64::INFINITY, f64::min);

            let problem = RoutingProblem {
                matrix: &matrix,
                demands: &demands,
                vehicle_capacity_kg: capacity,
                vehicles: active.len(),
            };
            let (routes, strategy, solver_name) = self.resolve_routes(&problem, &mut notes);

            for (k, &truck_idx) in active.iter().enumerate() {
                let truck = &mut trucks[truck_idx];
                let route_stops = routes.get(k).map(Vec::as_slice).unwrap_or(&[]);
                if route_stops.is_empty() {
                    notes.push(format!("车辆 {} 已装载但未分配站点", truck.truck_id));
                    continue;
                }

                let mut full = Vec::with_capacity(route_stops.len() + 2);
                full.push(0);
                full.extend_from_slice(route_stops);
                full.push(0);

                let distance = matrix.route_length(&full);
                truck.route = full
                    .iter()
                    .map(|&idx| request.sites[idx].name.clone())
                    .collect();
                truck.distance_km = round_dp(distance, 2);
                truck.co2_kg = round_dp(
                    co2_kg(
                        distance,
                        truck.used_capacity_kg,
                        truck.capacity_kg,
                        self.config.emission_factor_kg_per_km,
                    ),
                    2,
                );
            }
            (strategy, solver_name)
        };

        let total_capacity: f64 = trucks.iter().map(|t| t.capacity_kg).sum();
        let total_used: f64 = trucks.iter().map(|t| t.used_capacity_kg).sum();
        let plan = DeliveryPlan {
            plan_id: Uuid::new_v4().to_string(),
            depot: depot.name.clone(),
            total_distance_km: round_dp(trucks.iter().map(|t| t.distance_km).sum(), 2),
            total_co2_kg: round_dp(trucks.iter().map(|t| t.co2_kg).sum(), 2),
            utilization_pct: if total_capacity > 0.0 {
                round_dp(total_used / total_capacity * 100.0, 2)
            } else {
                0.0
            },
            trucks,
            allocations: outcome.allocations,
            routing_strategy: strategy,
            solver_name,
            notes,
        };

        info!(
            plan_id = %plan.plan_id,
            strategy = ?plan.routing_strategy,
            distance_km = plan.total_distance_km,
            "配送计划生成完成"
        );
        Ok(plan)
    }

    /// 求解器优先,失败或不可用时最近邻
    fn resolve_routes(
        &self,
        problem: &RoutingProblem<'_>,
        notes: &mut Vec<String>,
    ) -> (Vec<Vec<usize>>, RoutingStrategy, Option<String>) {
        match &self.solver {
            Some(solver) => match solver.solve(problem).and_then(|routes| {
                check_route_coverage(problem, routes)
            }) {
                Ok(routes) => {
                    return (
                        routes,
                        RoutingStrategy::Solver,
                        Some(solver.name().to_string()),
                    )
                }
                Err(e) => {
                    warn!(solver = solver.name(), error = %e, "路径求解失败,回退最近邻");
                    notes.push(format!("{} 求解失败（{}）,已使用最近邻启发式", solver.name(), e));
                }
            },
            None => {
                warn!("未配置路径求解器,使用最近邻");
                notes.push("路径求解器不可用,已使用最近邻启发式".to_string());
            }
        }
        (
            nearest_neighbor_routes(problem.matrix, problem.vehicles),
            RoutingStrategy::NearestNeighbor,
            None,
        )
    }
}

impl Default for LogisticsPlanner {
    fn default() -> Self {
        Self::new(LogisticsConfig::default())
    }
}

/// 求解结果校验: 站点够分时每辆装载车至少一条非空路线
fn check_route_coverage(
    problem: &RoutingProblem<'_>,
    routes: Vec<Vec<usize>>,
) -> Result<Vec<Vec<usize>>, SolverError> {
    let non_empty = routes.iter().filter(|r| !r.is_empty()).count();
    let required = problem.vehicles.min(problem.stop_count());
    if non_empty < required || routes.len() > problem.vehicles {
        return Err(SolverError::Infeasible(format!(
            "得到 {} 条非空路线,需要 {} 条（车辆 {}）",
            non_empty, required, problem.vehicles
        )));
    }
    Ok(routes)
}

/// 站点需求: 未指定时将装载总重均摊到各站点
///
/// 返回下标 0 为仓库（需求 0）
fn stop_demands(stops: &[Site], loaded_kg: f64) -> Vec<f64> {
    let specified = stops.iter().any(|s| s.demand_kg > 0.0);
    let even = if stops.is_empty() {
        0.0
    } else {
        loaded_kg / stops.len() as f64
    };

    std::iter::once(0.0)
        .chain(stops.iter().map(|s| {
            if specified {
                s.demand_kg.max(0.0)
            } else {
                even
            }
        }))
        .collect()
}
