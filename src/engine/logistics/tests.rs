use super::allocation::{CapacityAllocator, LoadItem};
use super::routing::{ClarkeWrightSolver, RoutingProblem, SolverError, VehicleRoutingSolver};
use super::*;
use crate::domain::site::default_sites;
use std::collections::BTreeSet;

// ==========================================
// 测试辅助函数
// ==========================================

fn item(name: &str, weight: f64, priority: u8, units: u64) -> LoadItem {
    LoadItem {
        material: name.to_string(),
        weight_per_unit: weight,
        priority,
        units,
    }
}

fn sensitive() -> Vec<String> {
    vec!["Cement".to_string(), "Sand".to_string(), "Wood".to_string()]
}

/// 所有车辆路线中出现的配送站点（不含仓库）
fn visited_stops(plan: &DeliveryPlan) -> Vec<String> {
    plan.trucks
        .iter()
        .flat_map(|t| t.route.iter())
        .filter(|name| name.as_str() != plan.depot)
        .cloned()
        .collect()
}

struct BrokenSolver;

impl VehicleRoutingSolver for BrokenSolver {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn solve(&self, _problem: &RoutingProblem<'_>) -> Result<Vec<Vec<usize>>, SolverError> {
        Err(SolverError::Unavailable("license expired".to_string()))
    }
}

// ==========================================
// 装车分配
// ==========================================

#[test]
fn test_allocation_priority_then_truncation() {
    let allocator = CapacityAllocator::new(sensitive());
    let items = vec![item("Cement", 50.0, 9, 30), item("Steel", 1.0, 10, 200)];
    let trucks = vec![TruckSpec::new("T1", 1000.0), TruckSpec::new("T2", 500.0)];

    let outcome = allocator.allocate(&items, &trucks, false).unwrap();
    println!("分配结果: {:?}", outcome.allocations);

    // Steel 优先级更高,先装
    assert_eq!(outcome.allocations[0].material, "Steel");
    assert_eq!(outcome.allocations[0].loaded_units, 200);

    let cement = &outcome.allocations[1];
    assert_eq!(cement.loaded_units, 26);
    assert_eq!(cement.unplaced_units, 4);
    assert_eq!(outcome.notes.len(), 1);

    assert_eq!(outcome.trucks[0].used_capacity_kg, 1000.0);
    assert_eq!(outcome.trucks[0].materials_loaded.get("Cement"), Some(&16));
    assert_eq!(outcome.trucks[1].materials_loaded.get("Cement"), Some(&10));
    assert_eq!(outcome.trucks[1].utilization_pct, 100.0);
}

#[test]
fn test_rain_boost_reorders_materials() {
    let allocator = CapacityAllocator::new(sensitive());
    let cement = item("Cement", 50.0, 9, 1);
    let sand = item("Sand", 1000.0, 6, 1);
    let steel = item("Steel", 1.0, 10, 1);

    assert_eq!(allocator.effective_priority(&cement, true), 10);
    assert_eq!(allocator.effective_priority(&sand, true), 9);
    assert_eq!(allocator.effective_priority(&steel, true), 10);
    assert_eq!(allocator.effective_priority(&cement, false), 9);

    let outcome = allocator
        .allocate(&[steel, cement], &[TruckSpec::new("T1", 5000.0)], true)
        .unwrap();
    // 同为 10 级时单位重量大的先装
    assert_eq!(outcome.allocations[0].material, "Cement");
    assert_eq!(outcome.allocations[0].priority, 10);
}

#[test]
fn test_allocation_validation() {
    let allocator = CapacityAllocator::default();
    let items = vec![item("Cement", 50.0, 9, 1)];
    assert!(allocator.allocate(&items, &[], false).is_err());
    assert!(allocator
        .allocate(&items, &[TruckSpec::new("T1", 0.0)], false)
        .is_err());
    assert!(allocator
        .allocate(&[item("Air", 0.0, 1, 1)], &[TruckSpec::new("T1", 10.0)], false)
        .is_err());
}

// ==========================================
// 路径求解
// ==========================================

#[test]
fn test_clarke_wright_merges_within_capacity() {
    let sites = default_sites();
    let points: Vec<Coords> = sites.iter().take(4).map(|s| s.coords).collect();
    let matrix = DistanceMatrix::new(&points);
    let demands = [0.0, 100.0, 100.0, 100.0];

    let routes = ClarkeWrightSolver
        .solve(&RoutingProblem {
            matrix: &matrix,
            demands: &demands,
            vehicle_capacity_kg: 1000.0,
            vehicles: 3,
        })
        .unwrap();

    let all: BTreeSet<usize> = routes.iter().flatten().copied().collect();
    assert_eq!(all, BTreeSet::from([1, 2, 3]));
    assert_eq!(routes.iter().map(Vec::len).sum::<usize>(), 3);
    assert!(routes.len() <= 3);
}

#[test]
fn test_clarke_wright_infeasible_cases() {
    let sites = default_sites();
    let points: Vec<Coords> = sites.iter().take(4).map(|s| s.coords).collect();
    let matrix = DistanceMatrix::new(&points);

    // 任意两站合并都超载 → 3 条路线 > 2 辆车
    let demands = [0.0, 600.0, 600.0, 600.0];
    let err = ClarkeWrightSolver
        .solve(&RoutingProblem {
            matrix: &matrix,
            demands: &demands,
            vehicle_capacity_kg: 1000.0,
            vehicles: 2,
        })
        .unwrap_err();
    assert!(matches!(err, SolverError::Infeasible(_)));

    // 单站需求超过单车容量
    let demands = [0.0, 1200.0, 10.0, 10.0];
    assert!(ClarkeWrightSolver
        .solve(&RoutingProblem {
            matrix: &matrix,
            demands: &demands,
            vehicle_capacity_kg: 1000.0,
            vehicles: 3,
        })
        .is_err());
}

#[test]
fn test_clarke_wright_keeps_one_route_per_vehicle() {
    let sites = default_sites();
    let points: Vec<Coords> = sites.iter().take(4).map(|s| s.coords).collect();
    let matrix = DistanceMatrix::new(&points);
    let demands = [0.0, 10.0, 10.0, 10.0];

    // 容量足够全部合并,但两辆车都需要路线
    let routes = ClarkeWrightSolver
        .solve(&RoutingProblem {
            matrix: &matrix,
            demands: &demands,
            vehicle_capacity_kg: 10_000.0,
            vehicles: 2,
        })
        .unwrap();
    assert_eq!(routes.len(), 2);
    assert!(routes.iter().all(|r| !r.is_empty()));

    // 车多于站点: 每站一条路线
    let routes = ClarkeWrightSolver
        .solve(&RoutingProblem {
            matrix: &matrix,
            demands: &demands,
            vehicle_capacity_kg: 10_000.0,
            vehicles: 5,
        })
        .unwrap();
    assert_eq!(routes.len(), 3);
}

// ==========================================
// 完整规划
// ==========================================

fn standard_request() -> DeliveryRequest {
    DeliveryRequest {
        items: vec![item("Cement", 50.0, 9, 40), item("Brick", 3.0, 7, 500)],
        trucks: vec![TruckSpec::new("T1", 5000.0), TruckSpec::new("T2", 5000.0)],
        sites: default_sites(),
        rain_expected: false,
    }
}

#[test]
fn test_plan_with_builtin_solver_covers_all_stops() {
    let planner = LogisticsPlanner::default();
    let plan = planner.plan(&standard_request()).unwrap();
    println!("配送计划: {}", serde_json::to_string_pretty(&plan).unwrap());

    assert_eq!(plan.routing_strategy, RoutingStrategy::Solver);
    assert_eq!(plan.solver_name.as_deref(), Some("clarke_wright"));
    assert_eq!(plan.depot, "Central Depot");

    let mut visited = visited_stops(&plan);
    visited.sort();
    let mut expected: Vec<String> = default_sites()[1..].iter().map(|s| s.name.clone()).collect();
    expected.sort();
    assert_eq!(visited, expected);

    for truck in plan.trucks.iter().filter(|t| !t.route.is_empty()) {
        assert_eq!(truck.route.first(), Some(&plan.depot));
        assert_eq!(truck.route.last(), Some(&plan.depot));
        assert!(truck.distance_km > 0.0);
        assert!(truck.co2_kg > 0.0);
    }
    assert!(plan.total_distance_km > 0.0);
    // (2000 + 1500) / 10000
    assert_eq!(plan.utilization_pct, 35.0);
    assert!(!plan.plan_id.is_empty());
}

#[test]
fn test_plan_without_solver_uses_nearest_neighbor() {
    let planner = LogisticsPlanner::with_solver(LogisticsConfig::default(), None);
    let plan = planner.plan(&standard_request()).unwrap();

    assert_eq!(plan.routing_strategy, RoutingStrategy::NearestNeighbor);
    assert!(plan.solver_name.is_none());
    assert!(plan.notes.iter().any(|n| n.contains("最近邻")));
    // 4 个站点均分给 2 辆车
    for truck in &plan.trucks {
        assert_eq!(truck.route.len(), 4);
    }
    assert_eq!(visited_stops(&plan).len(), 4);
}

#[test]
fn test_failing_solver_falls_back() {
    let planner =
        LogisticsPlanner::with_solver(LogisticsConfig::default(), Some(Arc::new(BrokenSolver)));
    let plan = planner.plan(&standard_request()).unwrap();

    assert_eq!(plan.routing_strategy, RoutingStrategy::NearestNeighbor);
    assert!(plan.notes.iter().any(|n| n.contains("broken")));
}

/// 只返回一条路线的求解器
struct SingleRouteSolver;

impl VehicleRoutingSolver for SingleRouteSolver {
    fn name(&self) -> &'static str {
        "single_route"
    }

    fn solve(&self, problem: &RoutingProblem<'_>) -> Result<Vec<Vec<usize>>, SolverError> {
        Ok(vec![(1..=problem.stop_count()).collect()])
    }
}

fn two_stop_request() -> DeliveryRequest {
    DeliveryRequest {
        items: vec![item("Steel", 1.0, 10, 600), item("Brick", 1.0, 5, 300)],
        trucks: vec![TruckSpec::new("T1", 1000.0), TruckSpec::new("T2", 1000.0)],
        sites: vec![
            Site::new("Depot", 12.9716, 77.5946),
            Site::new("A", 12.9750, 77.5990),
            Site::new("B", 12.9790, 77.6010),
        ],
        rain_expected: false,
    }
}

fn assert_loaded_trucks_routed(plan: &DeliveryPlan) {
    for truck in plan.trucks.iter().filter(|t| t.is_loaded()) {
        assert!(truck.route.len() >= 3, "车辆 {} 没有路线", truck.truck_id);
        assert_eq!(truck.route.first(), Some(&plan.depot));
        assert_eq!(truck.route.last(), Some(&plan.depot));
        assert!(truck.distance_km > 0.0);
    }
    assert!(!plan.notes.iter().any(|n| n.contains("未分配站点")));
}

#[test]
fn test_every_loaded_truck_gets_route() {
    let plan = LogisticsPlanner::default().plan(&two_stop_request()).unwrap();

    assert_eq!(plan.routing_strategy, RoutingStrategy::Solver);
    assert_eq!(plan.trucks.iter().filter(|t| t.is_loaded()).count(), 2);
    assert_loaded_trucks_routed(&plan);

    let mut visited = visited_stops(&plan);
    visited.sort();
    assert_eq!(visited, vec!["A".to_string(), "B".to_string()]);
}

#[test]
fn test_solver_leaving_truck_unrouted_falls_back() {
    let planner = LogisticsPlanner::with_solver(
        LogisticsConfig::default(),
        Some(Arc::new(SingleRouteSolver)),
    );
    let plan = planner.plan(&two_stop_request()).unwrap();

    assert_eq!(plan.routing_strategy, RoutingStrategy::NearestNeighbor);
    assert!(plan.notes.iter().any(|n| n.contains("single_route")));
    assert_loaded_trucks_routed(&plan);
}

#[test]
fn test_emission_uses_underutilization_multiplier() {
    let planner = LogisticsPlanner::default();
    let request = DeliveryRequest {
        items: vec![item("Cement", 50.0, 9, 50)],
        trucks: vec![TruckSpec::new("T1", 5000.0)],
        sites: default_sites().into_iter().take(2).collect(),
        rain_expected: false,
    };
    let plan = planner.plan(&request).unwrap();
    let truck = &plan.trucks[0];

    assert_eq!(truck.utilization_pct, 50.0);
    let expected = 0.12 * truck.distance_km * 1.5;
    assert!((truck.co2_kg - expected).abs() < 0.02);
}

#[test]
fn test_idle_plan_when_nothing_to_load() {
    let planner = LogisticsPlanner::default();
    let request = DeliveryRequest {
        items: Vec::new(),
        trucks: vec![TruckSpec::new("T1", 5000.0)],
        sites: default_sites(),
        rain_expected: false,
    };
    let plan = planner.plan(&request).unwrap();

    assert_eq!(plan.routing_strategy, RoutingStrategy::Idle);
    assert!(plan.trucks[0].route.is_empty());
    assert_eq!(plan.trucks[0].distance_km, 0.0);
    assert_eq!(plan.total_co2_kg, 0.0);
}

#[test]
fn test_plan_rejects_missing_depot() {
    let planner = LogisticsPlanner::default();
    let mut request = standard_request();
    request.sites.clear();
    assert!(matches!(
        planner.plan(&request),
        Err(EngineError::InvalidArgument(_))
    ));
}

#[test]
fn test_even_demand_spread() {
    let sites = default_sites();
    let demands = stop_demands(&sites[1..], 400.0);
    assert_eq!(demands, vec![0.0, 100.0, 100.0, 100.0, 100.0]);

    let mut custom = sites[1..3].to_vec();
    custom[0].demand_kg = 250.0;
    assert_eq!(stop_demands(&custom, 400.0), vec![0.0, 250.0, 0.0]);
}
