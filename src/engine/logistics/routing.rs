// ==========================================
// 物流规划 - 路径求解
// ==========================================
// 求解器: VehicleRoutingSolver 能力接口（内置 Clarke-Wright 节约算法）
// 兜底: 最近邻启发式,站点按车辆数均分,始终有解
// 索引约定: 0 = 仓库,1..n = 配送点;返回的路线不含仓库
// ==========================================

use crate::engine::geo::DistanceMatrix;
use std::cmp::Ordering;
use thiserror::Error;

/// 求解器失败（不向调用方暴露,触发最近邻兜底）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("求解器不可用: {0}")]
    Unavailable(String),

    #[error("无可行解: {0}")]
    Infeasible(String),
}

/// 带容量约束的车辆路径问题
#[derive(Debug, Clone, Copy)]
pub struct RoutingProblem<'a> {
    pub matrix: &'a DistanceMatrix,
    /// 各点需求（kg）,下标 0 为仓库
    pub demands: &'a [f64],
    pub vehicle_capacity_kg: f64,
    pub vehicles: usize,
}

impl RoutingProblem<'_> {
    pub fn stop_count(&self) -> usize {
        self.matrix.len().saturating_sub(1)
    }
}

/// 车辆路径求解器
pub trait VehicleRoutingSolver: Send + Sync {
    fn name(&self) -> &'static str;

    /// 返回每条路线的站点序列（不含仓库）
    ///
    /// 路线数介于 min(车辆数, 站点数) 与车辆数之间,且每条路线非空
    fn solve(&self, problem: &RoutingProblem<'_>) -> Result<Vec<Vec<usize>>, SolverError>;
}

// ==========================================
// ClarkeWrightSolver - 节约算法
// ==========================================
// 节约值 S(i,j) = d(0,i) + d(0,j) - d(i,j),降序合并端点相接且不超载的路线
#[derive(Debug, Clone, Copy, Default)]
pub struct ClarkeWrightSolver;

struct CwRoute {
    stops: Vec<usize>,
    load: f64,
}

impl VehicleRoutingSolver for ClarkeWrightSolver {
    fn name(&self) -> &'static str {
        "clarke_wright"
    }

    fn solve(&self, problem: &RoutingProblem<'_>) -> Result<Vec<Vec<usize>>, SolverError> {
        let n = problem.matrix.len();
        if n <= 1 {
            return Ok(Vec::new());
        }
        if problem.vehicles == 0 {
            return Err(SolverError::Infeasible("没有可用车辆".to_string()));
        }
        let cap = problem.vehicle_capacity_kg;
        let demand = |i: usize| problem.demands.get(i).copied().unwrap_or(0.0);

        for stop in 1..n {
            if demand(stop) > cap + 1e-9 {
                return Err(SolverError::Infeasible(format!(
                    "站点 {} 需求 {:.1}kg 超过单车容量 {:.1}kg",
                    stop,
                    demand(stop),
                    cap
                )));
            }
        }

        let d = problem.matrix;
        let mut routes: Vec<Option<CwRoute>> = (0..n)
            .map(|i| {
                (i > 0).then(|| CwRoute {
                    stops: vec![i],
                    load: demand(i),
                })
            })
            .collect();
        let mut route_of: Vec<usize> = (0..n).collect();

        let mut savings = Vec::with_capacity(n * n / 2);
        for i in 1..n {
            for j in (i + 1)..n {
                savings.push((d.get(0, i) + d.get(0, j) - d.get(i, j), i, j));
            }
        }
        savings.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| (a.1, a.2).cmp(&(b.1, b.2)))
        });

        // 路线数不低于 min(车辆数, 站点数),保证每辆装载车都有站点
        let min_routes = problem.vehicles.min(n - 1);
        let mut route_count = n - 1;
        for (saving, i, j) in savings {
            if saving <= 0.0 || route_count <= min_routes {
                break;
            }
            let (ri, rj) = (route_of[i], route_of[j]);
            if ri == rj {
                continue;
            }
            let (Some(mut a), Some(mut b)) = (routes[ri].take(), routes[rj].take()) else {
                continue;
            };

            let a_end = a.stops.first() == Some(&i) || a.stops.last() == Some(&i);
            let b_end = b.stops.first() == Some(&j) || b.stops.last() == Some(&j);
            if !a_end || !b_end || a.load + b.load > cap + 1e-9 {
                routes[ri] = Some(a);
                routes[rj] = Some(b);
                continue;
            }

            // 调整方向: i 在 a 尾部,j 在 b 头部
            if a.stops.last() != Some(&i) {
                a.stops.reverse();
            }
            if b.stops.first() != Some(&j) {
                b.stops.reverse();
            }
            for &stop in &b.stops {
                route_of[stop] = ri;
            }
            a.stops.extend(b.stops);
            a.load += b.load;
            routes[ri] = Some(a);
            route_count -= 1;
        }

        let mut merged: Vec<CwRoute> = routes.into_iter().flatten().collect();
        if merged.len() > problem.vehicles {
            return Err(SolverError::Infeasible(format!(
                "需要 {} 条路线,仅有 {} 辆车",
                merged.len(),
                problem.vehicles
            )));
        }
        merged.sort_by(|a, b| b.load.partial_cmp(&a.load).unwrap_or(Ordering::Equal));
        Ok(merged.into_iter().map(|r| r.stops).collect())
    }
}

// ==========================================
// 最近邻兜底
// ==========================================

/// 站点按车辆数均分（向上取整）,每组从仓库出发按最近邻排序
///
/// 返回长度恒为 vehicles,站点不足的车辆得到空路线
pub fn nearest_neighbor_routes(matrix: &DistanceMatrix, vehicles: usize) -> Vec<Vec<usize>> {
    let stops: Vec<usize> = (1..matrix.len()).collect();
    if vehicles == 0 {
        return Vec::new();
    }
    let chunk = stops.len().div_ceil(vehicles).max(1);

    (0..vehicles)
        .map(|k| {
            let group: Vec<usize> = stops.iter().copied().skip(k * chunk).take(chunk).collect();
            nearest_neighbor_order(matrix, group)
        })
        .collect()
}

/// 单车最近邻排序（从仓库出发）
fn nearest_neighbor_order(matrix: &DistanceMatrix, mut unvisited: Vec<usize>) -> Vec<usize> {
    let mut order = Vec::with_capacity(unvisited.len());
    let mut current = 0;
    while !unvisited.is_empty() {
        let (pos, _) = unvisited
            .iter()
            .enumerate()
            .min_by(|(_, &a), (_, &b)| {
                matrix
                    .get(current, a)
                    .partial_cmp(&matrix.get(current, b))
                    .unwrap_or(Ordering::Equal)
            })
            .map(|(pos, &stop)| (pos, stop))
            .unwrap_or((0, unvisited[0]));
        current = unvisited.remove(pos);
        order.push(current);
    }
    order
}
