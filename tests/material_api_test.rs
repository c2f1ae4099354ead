// ==========================================
// MaterialApi 集成测试
// ==========================================
// 测试范围:
// 1. 阶段生命周期: 初始化 → 记录日用量 → 收尾 → 余量更新
// 2. 预测与补货: MA 预测、阈值检查、自动补货
// 3. 持久化: 重开数据库后账本状态一致
// 4. 错误映射: 未找到 / 冲突 / 无效参数 / 数据不足
// ==========================================


use std::collections::HashMap;

use buildsense::api::{
    ApiError, AutoReorderRequest, ForecastRequest, LogUsageRequest, MaterialApi,
    PhaseCompleteRequest, PhaseInitializeRequest, RecordPhaseRequest, ReorderCheckRequest,
    SmartOrderRequest,
};
use buildsense::app::AppState;
use buildsense::domain::{ForecastRegime, PhaseStatus};
use buildsense::ledger::MaterialSpec;
use chrono::Duration;
use test_helpers::{create_test_state, date};

fn init_cement(api: &MaterialApi, planned: f64) -> usize {
    api.phase_initialize(PhaseInitializeRequest {
        material: "cement".to_string(),
        phase_name: "Foundation".to_string(),
        planned_qty: planned,
        carry_in: 0.0,
    })
    .unwrap()
    .phase_index
}

fn log_days(api: &MaterialApi, material: &str, qtys: &[f64]) {
    let start = date(2024, 3, 1);
    for (i, q) in qtys.iter().enumerate() {
        api.log_daily_usage(LogUsageRequest {
            material: material.to_string(),
            phase_index: None,
            qty_used: *q,
            date: Some(start + Duration::days(i as i64)),
        })
        .unwrap();
    }
}

// ==========================================
// 阶段生命周期
// ==========================================

#[test]
fn test_phase_lifecycle_正常流程() {
    let (_tmp, state) = create_test_state().unwrap();
    let api = &state.material_api;

    let idx = init_cement(api, 200.0);
    assert_eq!(idx, 0);
    let phase = api.get_material("Cement").unwrap().history[0].clone();
    assert_eq!(phase.ordered_qty, 212.0);
    assert_eq!(phase.status, PhaseStatus::Open);

    log_days(api, "Cement", &[20.0; 10]);

    let inv = api.phase_inventory("Cement", None).unwrap();
    assert_eq!(inv.inventory.used, 200.0);
    assert_eq!(inv.inventory.remaining, 12.0);

    let done = api
        .phase_complete(PhaseCompleteRequest {
            material: "Cement".to_string(),
            phase_index: None,
            consumed_qty: None,
        })
        .unwrap();
    assert!((done.waste_pct - 5.6604).abs() < 1e-9);
    assert_eq!(done.previous_buffer_pct, 6.0);
    assert!((done.new_buffer_pct - 5.8981).abs() < 1e-9);

    // 下一阶段使用新余量
    let smart = api
        .smart_order(SmartOrderRequest {
            material: "Cement".to_string(),
            planned_qty: 100.0,
        })
        .unwrap();
    assert!((smart.recommended_qty - 105.8981).abs() < 1e-9);

    // 已收尾阶段不能再记录用量或重复收尾
    let err = api
        .log_daily_usage(LogUsageRequest {
            material: "Cement".to_string(),
            phase_index: Some(0),
            qty_used: 1.0,
            date: Some(date(2024, 3, 20)),
        })
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidArgument(_)));
    assert!(api
        .phase_complete(PhaseCompleteRequest {
            material: "Cement".to_string(),
            phase_index: Some(0),
            consumed_qty: None,
        })
        .is_err());
}

#[test]
fn test_buffer_persisted_across_reopen() {
    let (_tmp, state) = create_test_state().unwrap();
    let db_path = state.get_db_path().to_string();

    state
        .material_api
        .record_closed_phase(RecordPhaseRequest {
            material: "Brick".to_string(),
            phase_name: "Walls".to_string(),
            planned_qty: 1000.0,
            ordered_qty: 1100.0,
            consumed_qty: 880.0,
            carry_in: 0.0,
        })
        .unwrap();
    let init = state
        .material_api
        .phase_initialize(PhaseInitializeRequest {
            material: "Brick".to_string(),
            phase_name: "Partition".to_string(),
            planned_qty: 500.0,
            carry_in: 220.0,
        })
        .unwrap();
    log_days(&state.material_api, "Brick", &[40.0, 60.0]);
    let before = state.material_api.get_material("Brick").unwrap();
    drop(state);

    let reopened = AppState::new(db_path).unwrap();
    let after = reopened.material_api.get_material("Brick").unwrap();
    assert_eq!(after.buffer_pct, before.buffer_pct);
    assert_eq!(after.history.len(), 2);
    assert_eq!(after.history[0].status, PhaseStatus::Closed);
    assert_eq!(after.history[1].carry_in, 220.0);
    assert_eq!(after.history[1].ordered_qty, init.ordered_qty);
    assert_eq!(after.history[1].daily_usage.len(), 2);
    assert_eq!(after.history[1].consumed_qty, 100.0);
}

#[test]
fn test_material_catalog_管理() {
    let (_tmp, state) = create_test_state().unwrap();
    let api = &state.material_api;

    let added = api
        .add_material(MaterialSpec {
            name: "tiles".to_string(),
            unit: "boxes".to_string(),
            baseline_buffer_pct: 8.0,
            weight_per_unit: 20.0,
            priority: 5,
        })
        .unwrap();
    assert_eq!(added.name, "Tiles");
    assert_eq!(added.buffer_pct, 8.0);

    let dup = api
        .add_material(MaterialSpec {
            name: "TILES".to_string(),
            unit: "boxes".to_string(),
            baseline_buffer_pct: 8.0,
            weight_per_unit: 20.0,
            priority: 5,
        })
        .unwrap_err();
    assert_eq!(dup.status_code(), 409);

    assert_eq!(api.delete_material("Tiles").unwrap(), "Tiles");
    assert_eq!(api.get_material("Tiles").unwrap_err().status_code(), 404);
}

#[test]
fn test_reset_buffer_restores_baseline() {
    let (_tmp, state) = create_test_state().unwrap();
    let api = &state.material_api;

    api.record_closed_phase(RecordPhaseRequest {
        material: "Steel".to_string(),
        phase_name: "Frame".to_string(),
        planned_qty: 1000.0,
        ordered_qty: 1020.0,
        consumed_qty: 700.0,
        carry_in: 0.0,
    })
    .unwrap();
    assert!(api.get_material("Steel").unwrap().buffer_pct > 2.0);

    let reset = api.reset_buffer("Steel").unwrap();
    assert_eq!(reset.buffer_pct, reset.baseline_buffer_pct);
    // 幂等
    let again = api.reset_buffer("Steel").unwrap();
    assert_eq!(again.buffer_pct, reset.buffer_pct);
}

// ==========================================
// 预测与补货
// ==========================================

#[test]
fn test_forecast_short_history_uses_moving_average() {
    let (_tmp, state) = create_test_state().unwrap();
    let api = &state.material_api;

    init_cement(api, 400.0);
    log_days(api, "Cement", &[20.0; 6]);

    let resp = api
        .forecast(ForecastRequest {
            material: "Cement".to_string(),
            phase_index: None,
            horizon: Some(5),
        })
        .unwrap();
    assert_eq!(resp.unit, "bags");
    assert_eq!(resp.result.regime, ForecastRegime::MovingAverage);
    assert_eq!(resp.result.forecast.len(), 5);
    assert!((resp.result.total_forecast - 100.0).abs() < 1e-6);

    // 默认 horizon 取配置
    let resp = api
        .forecast(ForecastRequest {
            material: "Cement".to_string(),
            phase_index: None,
            horizon: None,
        })
        .unwrap();
    assert_eq!(resp.result.horizon, state.config.forecast.default_horizon);
}

#[test]
fn test_forecast_errors() {
    let (_tmp, state) = create_test_state().unwrap();
    let api = &state.material_api;

    // 无阶段
    let err = api
        .forecast(ForecastRequest {
            material: "Glass".to_string(),
            phase_index: None,
            horizon: Some(3),
        })
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    // 有阶段无用量
    init_cement(api, 100.0);
    let err = api
        .forecast(ForecastRequest {
            material: "Cement".to_string(),
            phase_index: Some(0),
            horizon: Some(3),
        })
        .unwrap_err();
    assert!(matches!(err, ApiError::InsufficientData(_)));

    // 阶段越界
    let err = api
        .forecast(ForecastRequest {
            material: "Cement".to_string(),
            phase_index: Some(5),
            horizon: Some(3),
        })
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[test]
fn test_reorder_check_uses_current_buffer() {
    let (_tmp, state) = create_test_state().unwrap();
    let resp = state
        .material_api
        .reorder_check(ReorderCheckRequest {
            material: "cement".to_string(),
            ordered_qty: 212.0,
            remaining: 30.0,
            planned_qty: 200.0,
        })
        .unwrap();
    assert!(resp.check.alert);
    assert!((resp.check.threshold_qty - 42.4).abs() < 1e-9);
    assert_eq!(resp.check.suggested_reorder_qty, 212.0);

    let json = serde_json::to_value(&resp).unwrap();
    assert_eq!(json["material"], "Cement");
    assert_eq!(json["alert"], true);
}

#[test]
fn test_auto_reorder_triggers_near_stockout() {
    let (_tmp, state) = create_test_state().unwrap();
    let api = &state.material_api;

    init_cement(api, 200.0);
    // 212 下单, 已用 190, 剩 22, 日均约 20 → 约 1 天断料
    log_days(api, "Cement", &[20.0, 20.0, 20.0, 20.0, 20.0, 20.0, 20.0, 20.0, 20.0, 10.0]);

    let alert = api
        .auto_reorder(AutoReorderRequest {
            material: "Cement".to_string(),
            phase_index: None,
            on_order_qty: 0.0,
            as_of: Some(date(2024, 3, 11)),
        })
        .unwrap();
    assert!(alert.triggered);
    assert!(alert.critical);
    assert!(alert.reorder_qty > 0.0);

    let all = api.auto_reorder_all(&HashMap::new(), Some(date(2024, 3, 11))).unwrap();
    assert_eq!(all.first().map(|a| a.material.as_str()), Some("Cement"));
}
