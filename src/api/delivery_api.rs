// ==========================================
// 工地物料订货与配送系统 - 配送 API
// ==========================================
// 职责: 配送规划、单路线路况分析、多路线比较
// 说明: 外部路况调用失败不报错,结果中以 notes 说明数据来源
// ==========================================

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::delivery::{DeliveryPlan, TruckSpec};
use crate::domain::site::{Coords, Site};
use crate::engine::logistics::allocation::LoadItem;
use crate::engine::logistics::{DeliveryRequest, LogisticsPlanner};
use crate::engine::route_analysis::{RouteAnalysis, RouteConditionAnalyzer, RouteInput};
use crate::engine::route_compare::{RouteComparator, RouteComparison};
use crate::ledger::MaterialLedger;
use crate::repository::site_repo::SiteStore;

// ==========================================
// 请求结构
// ==========================================

/// 自定义站点
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopInput {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub is_depot: bool,
    #[serde(default)]
    pub demand_kg: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryPlanRequest {
    /// 物料 → 数量（按物料单位）
    pub order_quantities: BTreeMap<String, f64>,
    pub trucks: Vec<TruckSpec>,
    #[serde(default)]
    pub rain_expected: bool,
    /// 自定义站点,缺省使用站点库
    #[serde(default)]
    pub stops: Option<Vec<StopInput>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRouteRequest {
    pub route_name: String,
    /// [[lat, lon], ...]
    pub waypoints: Vec<[f64; 2]>,
    pub truck_load_kg: f64,
    pub truck_capacity_kg: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSpec {
    pub name: String,
    pub waypoints: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareRoutesRequest {
    pub routes: Vec<RouteSpec>,
    pub truck_load_kg: f64,
    pub truck_capacity_kg: f64,
}

fn to_coords(points: &[[f64; 2]]) -> Vec<Coords> {
    points.iter().map(|[lat, lon]| Coords::new(*lat, *lon)).collect()
}

/// 自定义站点转为有序站点列表: 首个 is_depot 站点（否则第一个）移到最前
pub fn sites_from_stops(stops: &[StopInput]) -> ApiResult<Vec<Site>> {
    if stops.is_empty() {
        return Err(ApiError::InvalidArgument("自定义站点列表为空".to_string()));
    }
    let depot_idx = stops.iter().position(|s| s.is_depot).unwrap_or(0);

    let mut sites: Vec<Site> = stops
        .iter()
        .map(|s| Site::new(s.name.clone(), s.lat, s.lon).with_demand(s.demand_kg.max(0.0)))
        .collect();
    let depot = sites.remove(depot_idx);
    sites.insert(0, depot);
    Ok(sites)
}

// ==========================================
// DeliveryApi - 配送 API
// ==========================================
pub struct DeliveryApi {
    ledger: Arc<MaterialLedger>,
    site_store: Arc<dyn SiteStore>,
    planner: Arc<LogisticsPlanner>,
    analyzer: Arc<RouteConditionAnalyzer>,
    comparator: RouteComparator,
}

impl DeliveryApi {
    pub fn new(
        ledger: Arc<MaterialLedger>,
        site_store: Arc<dyn SiteStore>,
        planner: Arc<LogisticsPlanner>,
        analyzer: Arc<RouteConditionAnalyzer>,
    ) -> Self {
        Self {
            ledger,
            site_store,
            planner,
            analyzer,
            comparator: RouteComparator::new(),
        }
    }

    /// 站点库（首个为仓库）
    pub fn list_sites(&self) -> ApiResult<Vec<Site>> {
        Ok(self.site_store.load()?)
    }

    /// 配送规划: 装车 + 路线
    ///
    /// # 返回
    /// - Err(InvalidArgument): 无车辆、无物料、数量为负、站点为空
    /// - Err(NotFound): 物料不存在
    #[instrument(skip(self, req), fields(trucks = req.trucks.len(), materials = req.order_quantities.len()))]
    pub fn delivery_plan(&self, req: DeliveryPlanRequest) -> ApiResult<DeliveryPlan> {
        if req.trucks.is_empty() {
            return Err(ApiError::InvalidArgument("至少需要一辆车".to_string()));
        }
        if req.order_quantities.is_empty() {
            return Err(ApiError::InvalidArgument("至少需要一种物料的配送数量".to_string()));
        }

        let mut items = Vec::with_capacity(req.order_quantities.len());
        for (name, qty) in &req.order_quantities {
            if !qty.is_finite() || *qty < 0.0 {
                return Err(ApiError::InvalidArgument(format!(
                    "物料 {} 的数量非法: {}",
                    name, qty
                )));
            }
            let material = self.ledger.get(name)?;
            items.push(LoadItem::from_material(&material, *qty));
        }

        let sites = match &req.stops {
            Some(stops) => sites_from_stops(stops)?,
            None => self.site_store.load()?,
        };

        let request = DeliveryRequest {
            items,
            trucks: req.trucks,
            sites,
            rain_expected: req.rain_expected,
        };
        let plan = self.planner.plan(&request)?;
        info!(plan_id = %plan.plan_id, strategy = ?plan.routing_strategy, "配送规划完成");
        Ok(plan)
    }

    /// 单路线路况分析
    pub async fn analyze_route(&self, req: AnalyzeRouteRequest) -> ApiResult<RouteAnalysis> {
        let input = RouteInput {
            route_name: req.route_name,
            waypoints: to_coords(&req.waypoints),
            load_kg: req.truck_load_kg,
            capacity_kg: req.truck_capacity_kg,
        };
        Ok(self.analyzer.analyze(&input).await?)
    }

    /// 多路线比较（各路线并发分析）
    ///
    /// # 返回
    /// - Err(InvalidArgument): 少于 2 条路线
    pub async fn compare_routes(&self, req: CompareRoutesRequest) -> ApiResult<RouteComparison> {
        let inputs: Vec<RouteInput> = req
            .routes
            .iter()
            .map(|r| RouteInput {
                route_name: r.name.clone(),
                waypoints: to_coords(&r.waypoints),
                load_kg: req.truck_load_kg,
                capacity_kg: req.truck_capacity_kg,
            })
            .collect();
        Ok(self
            .comparator
            .analyze_and_compare(&self.analyzer, &inputs)
            .await?)
    }
}
