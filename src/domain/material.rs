// ==========================================
// 工地物料订货与配送系统 - 物料领域模型
// ==========================================
// 职责: 物料主数据 + 阶段历史 + 日用量记录
// 红线: buffer_pct 始终在 [0,100]; phases_logged == history.len()
// 所有权: 仅 MaterialLedger 可变更
// ==========================================

use crate::domain::types::PhaseStatus;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// DailyUsageEntry - 单次日用量记录
// ==========================================
// 同一天可以有多条记录,不合并
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyUsageEntry {
    pub date: NaiveDate, // 用量日期
    pub quantity: f64,   // 当次用量（>=0）
}

// ==========================================
// PhaseRecord - 施工阶段记录
// ==========================================
// 生命周期: phase-initialize 创建 → 日用量累加 → phase-complete 收尾（此后不可变）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub phase_index: usize,     // 阶段序号（创建时 = history.len()）
    pub phase_name: String,     // 阶段名称（同一物料内唯一）
    pub planned_qty: f64,       // 计划用量
    pub ordered_qty: f64,       // 下单量（初始化时确定）
    pub consumed_qty: f64,      // 实际消耗（由 daily_usage 汇总,收尾时可显式覆盖）
    pub carry_in: f64,          // 上阶段结转库存
    pub waste_pct: Option<f64>, // 浪费率（仅收尾时计算）
    pub status: PhaseStatus,
    #[serde(default)]
    pub daily_usage: Vec<DailyUsageEntry>,
}

impl PhaseRecord {
    /// 新建进行中的阶段
    pub fn open(
        phase_index: usize,
        phase_name: impl Into<String>,
        planned_qty: f64,
        ordered_qty: f64,
        carry_in: f64,
    ) -> Self {
        Self {
            phase_index,
            phase_name: phase_name.into(),
            planned_qty,
            ordered_qty,
            consumed_qty: 0.0,
            carry_in,
            waste_pct: None,
            status: PhaseStatus::Open,
            daily_usage: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == PhaseStatus::Open
    }

    /// 日用量合计（不区分日期,重复日期照常累加）
    pub fn logged_total(&self) -> f64 {
        self.daily_usage.iter().map(|e| e.quantity).sum()
    }

    /// 按日用量重新汇总 consumed_qty
    pub fn recompute_consumed(&mut self) {
        self.consumed_qty = self.logged_total();
    }

    /// 可用总量 = 下单量 + 结转
    pub fn total_available(&self) -> f64 {
        self.ordered_qty + self.carry_in
    }

    /// 剩余库存（不低于 0）
    pub fn remaining(&self) -> f64 {
        (self.total_available() - self.consumed_qty).max(0.0)
    }
}

// ==========================================
// Material - 物料
// ==========================================
// baseline_buffer_pct 创建后固定; buffer_pct 随阶段收尾按 EMA 学习
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    pub name: String,             // 唯一键（首字母大写规范化）
    pub unit: String,             // 计量单位（bags / pcs / kg / tons ...）
    pub baseline_buffer_pct: f64, // 初始安全余量（%）
    pub buffer_pct: f64,          // 当前学习到的安全余量（%）
    pub weight_per_unit: f64,     // 单位重量（kg）,用于装车
    pub priority: u8,             // 装车优先级 1-10,越大越先装
    #[serde(default)]
    pub history: Vec<PhaseRecord>,
}

impl Material {
    pub fn new(
        name: &str,
        unit: &str,
        baseline_buffer_pct: f64,
        weight_per_unit: f64,
        priority: u8,
    ) -> Self {
        Self {
            name: normalize_material_name(name),
            unit: unit.trim().to_string(),
            baseline_buffer_pct,
            buffer_pct: baseline_buffer_pct,
            weight_per_unit,
            priority,
            history: Vec::new(),
        }
    }

    pub fn phases_logged(&self) -> usize {
        self.history.len()
    }

    pub fn phase(&self, phase_index: usize) -> Option<&PhaseRecord> {
        self.history.get(phase_index)
    }

    pub fn phase_mut(&mut self, phase_index: usize) -> Option<&mut PhaseRecord> {
        self.history.get_mut(phase_index)
    }

    /// 最近一个阶段的序号
    pub fn latest_phase_index(&self) -> Option<usize> {
        self.history.len().checked_sub(1)
    }

    pub fn has_phase_named(&self, phase_name: &str) -> bool {
        self.history.iter().any(|p| p.phase_name == phase_name)
    }
}

// ==========================================
// 名称规范化
// ==========================================

/// 物料名规范化: 去首尾空白,按词首字母大写其余小写（"ready MIX" → "Ready Mix"）
pub fn normalize_material_name(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ==========================================
// 默认物料目录
// ==========================================

/// 空账本初始化时写入的默认物料
///
/// (名称, 单位, 初始余量%, 单位重量kg, 优先级)
pub fn default_catalog() -> Vec<Material> {
    const CATALOG: [(&str, &str, f64, f64, u8); 8] = [
        ("Cement", "bags", 6.0, 50.0, 9),
        ("Brick", "pcs", 10.0, 3.0, 7),
        ("Steel", "kg", 2.0, 1.0, 10),
        ("Sand", "tons", 8.0, 1000.0, 6),
        ("Aggregate", "tons", 5.0, 1000.0, 5),
        ("Paint", "litres", 7.0, 1.2, 4),
        ("Wood", "sq ft", 12.0, 5.0, 6),
        ("Glass", "sq ft", 5.0, 2.5, 5),
    ];

    CATALOG
        .iter()
        .map(|(name, unit, buffer, weight, priority)| {
            Material::new(name, unit, *buffer, *weight, *priority)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_material_name() {
        assert_eq!(normalize_material_name("  cement "), "Cement");
        assert_eq!(normalize_material_name("ready   MIX"), "Ready Mix");
        assert_eq!(normalize_material_name(""), "");
    }

    #[test]
    fn test_phase_consumed_sums_duplicate_dates() {
        let d = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let mut phase = PhaseRecord::open(0, "Foundation", 200.0, 220.0, 10.0);
        phase.daily_usage.push(DailyUsageEntry { date: d, quantity: 30.0 });
        phase.daily_usage.push(DailyUsageEntry { date: d, quantity: 50.0 });
        phase.recompute_consumed();

        assert_eq!(phase.consumed_qty, 80.0);
        assert_eq!(phase.total_available(), 230.0);
        assert_eq!(phase.remaining(), 150.0);
    }

    #[test]
    fn test_default_catalog() {
        let catalog = default_catalog();
        assert_eq!(catalog.len(), 8);
        let steel = catalog.iter().find(|m| m.name == "Steel").unwrap();
        assert_eq!(steel.priority, 10);
        assert_eq!(steel.buffer_pct, steel.baseline_buffer_pct);
        assert_eq!(steel.phases_logged(), 0);
    }
}
