// ==========================================
// 工地物料订货与配送系统 - 演示数据库重置与填充
// ==========================================
// 用法: reset_and_seed_demo_db [db_path] [usage_days]
// 内容: 每种物料两个已完成阶段 + 一个进行中阶段（按日用量记录）
// ==========================================

use chrono::{Duration, Local};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::error::Error;
use std::fs;
use std::path::Path;

use buildsense::app::{get_default_db_path, AppState};

const DEFAULT_USAGE_DAYS: i64 = 21;
const SEED: u64 = 20_240_601;

/// (物料, 阶段计划量, 日均用量)
const SCENARIO: [(&str, f64, f64); 8] = [
    ("Cement", 400.0, 14.0),
    ("Brick", 12_000.0, 420.0),
    ("Steel", 6_000.0, 190.0),
    ("Sand", 60.0, 2.2),
    ("Aggregate", 80.0, 2.8),
    ("Paint", 300.0, 9.0),
    ("Wood", 900.0, 30.0),
    ("Glass", 500.0, 12.0),
];

fn main() -> Result<(), Box<dyn Error>> {
    buildsense::logging::init();

    let db_path = std::env::args().nth(1).unwrap_or_else(get_default_db_path);
    let usage_days = std::env::args()
        .nth(2)
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(DEFAULT_USAGE_DAYS)
        .clamp(1, 120);

    backup_and_reset_db(&db_path)?;

    let state = AppState::new(db_path.clone())?;
    let ledger = state.ledger.clone();
    let mut rng = StdRng::seed_from_u64(SEED);

    let today = Local::now().date_naive();
    let start = today - Duration::days(usage_days - 1);

    for (material, planned, daily) in SCENARIO {
        // 两个历史阶段: 浪费率分别约 9% 与 4%
        for (idx, waste) in [(1, 0.09), (2, 0.04)] {
            let ordered = planned * 1.1;
            let consumed = ordered * (1.0 - waste);
            ledger.record_closed_phase(
                material,
                &format!("Phase {}", idx),
                planned,
                ordered,
                consumed,
                0.0,
            )?;
        }

        let init = ledger.initialize_phase(material, "Phase 3", planned, 0.0)?;
        let mut logged = 0.0;
        for offset in 0..usage_days {
            // 周日停工
            let date = start + Duration::days(offset);
            if offset % 7 == 6 {
                continue;
            }
            let qty = (daily * rng.gen_range(0.75..1.25)).round();
            if logged + qty > init.ordered_qty {
                break;
            }
            ledger.log_daily_usage(material, Some(init.phase_index), qty, date, today)?;
            logged += qty;
        }
    }

    print_quick_counts(&state)?;
    Ok(())
}

fn backup_and_reset_db(db_path: &str) -> Result<(), Box<dyn Error>> {
    let path = Path::new(db_path);
    if !path.exists() {
        return Ok(());
    }

    let ts = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let backup_path = format!("{}.bak.{}", db_path, ts);
    fs::copy(path, &backup_path)?;
    fs::remove_file(path)?;

    eprintln!("Backed up {} -> {}", db_path, backup_path);
    Ok(())
}

fn print_quick_counts(state: &AppState) -> Result<(), Box<dyn Error>> {
    eprintln!("Seeded {}", state.get_db_path());
    for material in state.ledger.list()? {
        let entries: usize = material.history.iter().map(|p| p.daily_usage.len()).sum();
        eprintln!(
            "  {:<10} buffer={:>6.2}%  phases={}  usage_entries={}",
            material.name,
            material.buffer_pct,
            material.history.len(),
            entries
        );
    }
    Ok(())
}
