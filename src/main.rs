// ==========================================
// 工地物料订货与配送系统 - 命令行主入口
// ==========================================
// 职责: 打开（或初始化）数据库,输出物料总览、补货提示、
//       配送方案与路线比较（JSON）
// 用法: buildsense [db_path]
// ==========================================

use std::collections::{BTreeMap, HashMap};

use anyhow::{anyhow, Context};
use buildsense::api::{CompareRoutesRequest, DeliveryPlanRequest, RouteSpec};
use buildsense::app::{get_default_db_path, AppState};
use buildsense::domain::TruckSpec;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志系统
    buildsense::logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", buildsense::APP_NAME);
    tracing::info!("系统版本: {}", buildsense::VERSION);
    tracing::info!("==================================================");

    let db_path = std::env::args().nth(1).unwrap_or_else(get_default_db_path);
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path).map_err(|e| anyhow!(e))?;

    // ==========================================
    // 物料总览
    // ==========================================
    let materials = state.material_api.list_materials()?;
    let mut overview = Vec::with_capacity(materials.len());
    for material in &materials {
        let latest = if material.history.is_empty() {
            None
        } else {
            Some(state.material_api.phase_inventory(&material.name, None)?)
        };
        overview.push(serde_json::json!({
            "material": material.name,
            "unit": material.unit,
            "buffer_pct": material.buffer_pct,
            "baseline_buffer_pct": material.baseline_buffer_pct,
            "phases_logged": material.history.len(),
            "latest_phase": latest,
        }));
    }
    println!("{}", serde_json::to_string_pretty(&overview)?);

    let alerts = state.material_api.auto_reorder_all(&HashMap::new(), None)?;
    println!("{}", serde_json::to_string_pretty(&alerts)?);

    // ==========================================
    // 配送方案: 每种物料按最新阶段剩余量的一成配送
    // ==========================================
    let mut order_quantities = BTreeMap::new();
    for entry in &overview {
        if let (Some(name), Some(remaining)) = (
            entry["material"].as_str(),
            entry["latest_phase"]["inventory"]["remaining"].as_f64(),
        ) {
            if remaining > 0.0 {
                order_quantities.insert(name.to_string(), (remaining * 0.1).round());
            }
        }
    }
    if order_quantities.is_empty() {
        order_quantities.insert("Cement".to_string(), 40.0);
        order_quantities.insert("Brick".to_string(), 500.0);
    }

    let plan = state.delivery_api.delivery_plan(DeliveryPlanRequest {
        order_quantities,
        trucks: vec![TruckSpec::new("T1", 5_000.0), TruckSpec::new("T2", 3_000.0)],
        rain_expected: false,
        stops: None,
    })?;
    println!("{}", serde_json::to_string_pretty(&plan)?);

    // ==========================================
    // 路线比较: 仓库 → 首个工地,直达与绕行
    // ==========================================
    let sites = state.delivery_api.list_sites()?;
    let depot = sites.first().context("站点库为空")?;
    let target = sites.get(1).context("站点库缺少工地")?;
    let detour = sites.get(2).unwrap_or(target);
    let point = |s: &buildsense::Site| [s.coords.lat, s.coords.lon];

    let comparison = state
        .delivery_api
        .compare_routes(CompareRoutesRequest {
            routes: vec![
                RouteSpec {
                    name: "直达".to_string(),
                    waypoints: vec![point(depot), point(target)],
                },
                RouteSpec {
                    name: "绕行".to_string(),
                    waypoints: vec![point(depot), point(detour), point(target)],
                },
            ],
            truck_load_kg: 3_200.0,
            truck_capacity_kg: 5_000.0,
        })
        .await?;
    println!("{}", serde_json::to_string_pretty(&comparison)?);

    Ok(())
}
