// ==========================================
// 工地物料订货与配送系统 - 物料账本
// ==========================================
// 并发模型:
//   RwLock<HashMap<物料名, Arc<Mutex<Option<Material>>>>>
//   map 锁只在查找/插入/删除条目时持有; 条目 Mutex 串行化单个物料的读-改-写
//   条目为 None 表示已删除（墓碑）,等待中的写入会得到 NotFound
// 写入顺序: 在副本上修改 → 落库 → 替换内存
// ==========================================

use crate::domain::material::{
    default_catalog, normalize_material_name, DailyUsageEntry, Material, PhaseRecord,
};
use crate::domain::numeric::round_dp;
use crate::domain::types::PhaseStatus;
use crate::engine::buffer::AdaptiveBufferEngine;
use crate::engine::error::ensure_non_negative;
use crate::engine::inventory::{InventoryStatus, InventoryTracker, UsageTrend};
use crate::ledger::error::{LedgerError, LedgerResult};
use crate::repository::material_repo::{InMemoryMaterialStore, MaterialStore};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{debug, info, instrument, warn};

/// 库存上限比较的容差
const STOCK_EPSILON: f64 = 1e-9;

type Entry = Arc<Mutex<Option<Material>>>;

// ==========================================
// 输入 / 输出结构
// ==========================================

/// 新增物料参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialSpec {
    pub name: String,
    pub unit: String,
    pub baseline_buffer_pct: f64,
    pub weight_per_unit: f64,
    pub priority: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseInitialized {
    pub material: String,
    pub unit: String,
    pub phase_index: usize,
    pub phase_name: String,
    pub planned_qty: f64,
    pub buffer_pct: f64,
    pub ordered_qty: f64,
    pub carry_in: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageLogged {
    pub material: String,
    pub unit: String,
    pub phase_index: usize,
    pub phase_name: String,
    pub ordered_qty: f64,
    pub consumed_qty: f64,
    pub remaining_stock: f64,
    pub daily_usage: Vec<DailyUsageEntry>,
    pub trend: UsageTrend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseCompleted {
    pub material: String,
    pub unit: String,
    pub phase_index: usize,
    pub phase_name: String,
    pub planned_qty: f64,
    pub ordered_qty: f64,
    pub consumed_qty: f64,
    pub remaining_stock: f64,
    pub waste_pct: f64,
    pub previous_buffer_pct: f64,
    pub new_buffer_pct: f64,
    pub baseline_buffer_pct: f64,
    pub phases_logged: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseInventory {
    pub material: String,
    pub unit: String,
    pub phase_index: usize,
    pub phase_name: String,
    pub phase_status: PhaseStatus,
    pub inventory: InventoryStatus,
    pub trend: UsageTrend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSummary {
    pub phase_index: usize,
    pub phase_name: String,
    pub status: PhaseStatus,
    pub planned_qty: f64,
    pub ordered_qty: f64,
    pub consumed_qty: f64,
    pub remaining_stock: f64,
    pub waste_pct: Option<f64>,
}

/// 单个物料的历史报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialReport {
    pub material: String,
    pub unit: String,
    pub baseline_buffer_pct: f64,
    pub buffer_pct: f64,
    pub phases: Vec<PhaseSummary>,
    pub total_ordered: f64,
    pub total_consumed: f64,
    /// 全部阶段合计的浪费率,无下单量时为 0
    pub overall_waste_pct: f64,
}

// ==========================================
// MaterialLedger - 物料账本
// ==========================================
pub struct MaterialLedger {
    store: Arc<dyn MaterialStore>,
    entries: RwLock<HashMap<String, Entry>>,
    buffer_engine: AdaptiveBufferEngine,
    tracker: InventoryTracker,
}

fn lock_err<E: std::fmt::Display>(e: E) -> LedgerError {
    LedgerError::LockError(e.to_string())
}

fn not_found(name: &str) -> LedgerError {
    LedgerError::NotFound(format!("物料 '{}' 不存在", name))
}

/// 解析阶段序号（None 表示最近一个阶段）
fn resolve_phase(material: &Material, phase_index: Option<usize>) -> LedgerResult<usize> {
    let idx = match phase_index {
        Some(i) => i,
        None => material.latest_phase_index().ok_or_else(|| {
            LedgerError::NotFound(format!("物料 '{}' 尚无阶段记录", material.name))
        })?,
    };
    if idx >= material.phases_logged() {
        return Err(LedgerError::NotFound(format!(
            "物料 '{}' 的 phase_index {} 超出范围（共 {} 个阶段）",
            material.name,
            idx,
            material.phases_logged()
        )));
    }
    Ok(idx)
}

impl MaterialLedger {
    /// 从存储加载账本,空账本写入默认物料目录
    #[instrument(skip(store))]
    pub fn open(store: Arc<dyn MaterialStore>) -> LedgerResult<Self> {
        let mut materials = store.load_all()?;
        if materials.is_empty() {
            materials = default_catalog();
            store.save_all(&materials)?;
            info!(count = materials.len(), "空账本, 已写入默认物料目录");
        }

        let entries = materials
            .into_iter()
            .map(|m| (m.name.clone(), Arc::new(Mutex::new(Some(m)))))
            .collect();

        Ok(Self {
            store,
            entries: RwLock::new(entries),
            buffer_engine: AdaptiveBufferEngine::new(),
            tracker: InventoryTracker::default(),
        })
    }

    /// 内存账本（不落盘）
    pub fn in_memory() -> LedgerResult<Self> {
        Self::open(Arc::new(InMemoryMaterialStore::new()))
    }

    fn entry(&self, name: &str) -> LedgerResult<(String, Entry)> {
        let key = normalize_material_name(name);
        let map = self.entries.read().map_err(lock_err)?;
        let entry = map.get(&key).cloned().ok_or_else(|| not_found(&key))?;
        Ok((key, entry))
    }

    /// 在物料副本上执行变更,落库成功后才替换内存中的物料
    fn mutate<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Material) -> LedgerResult<R>,
    ) -> LedgerResult<R> {
        let (key, entry) = self.entry(name)?;
        let mut guard: MutexGuard<'_, Option<Material>> = entry.lock().map_err(lock_err)?;
        let current = guard.as_ref().ok_or_else(|| not_found(&key))?;

        let mut draft = current.clone();
        let out = f(&mut draft)?;
        if let Err(e) = self.store.save_material(&draft) {
            warn!(material = %key, error = %e, "物料落库失败, 内存状态保持不变");
            return Err(e.into());
        }
        *guard = Some(draft);
        Ok(out)
    }

    /// 只读访问
    fn read<R>(&self, name: &str, f: impl FnOnce(&Material) -> LedgerResult<R>) -> LedgerResult<R> {
        let (key, entry) = self.entry(name)?;
        let guard = entry.lock().map_err(lock_err)?;
        let material = guard.as_ref().ok_or_else(|| not_found(&key))?;
        f(material)
    }

    // ==========================================
    // 物料目录
    // ==========================================

    /// 新增物料
    ///
    /// # 返回
    /// - Err(Conflict): 规范化后的名称已存在
    /// - Err(InvalidArgument): 单位为空、余量不在 [0,100]、单位重量 <= 0、优先级不在 1-10
    pub fn add_material(&self, spec: MaterialSpec) -> LedgerResult<Material> {
        let name = normalize_material_name(&spec.name);
        if name.is_empty() {
            return Err(LedgerError::InvalidArgument("物料名称不能为空".to_string()));
        }
        if spec.unit.trim().is_empty() {
            return Err(LedgerError::InvalidArgument("计量单位不能为空".to_string()));
        }
        if !(0.0..=100.0).contains(&spec.baseline_buffer_pct) {
            return Err(LedgerError::InvalidArgument(format!(
                "baseline_buffer_pct 必须在 [0,100] 内, 实际={}",
                spec.baseline_buffer_pct
            )));
        }
        if !spec.weight_per_unit.is_finite() || spec.weight_per_unit <= 0.0 {
            return Err(LedgerError::InvalidArgument(format!(
                "weight_per_unit 必须大于 0, 实际={}",
                spec.weight_per_unit
            )));
        }
        if !(1..=10).contains(&spec.priority) {
            return Err(LedgerError::InvalidArgument(format!(
                "priority 必须在 1-10 内, 实际={}",
                spec.priority
            )));
        }

        let mut map = self.entries.write().map_err(lock_err)?;
        if map.contains_key(&name) {
            return Err(LedgerError::Conflict(format!("物料 '{}' 已存在", name)));
        }

        let material = Material::new(
            &name,
            &spec.unit,
            spec.baseline_buffer_pct,
            spec.weight_per_unit,
            spec.priority,
        );
        self.store.save_material(&material)?;
        map.insert(name.clone(), Arc::new(Mutex::new(Some(material.clone()))));
        info!(material = %name, "新增物料");
        Ok(material)
    }

    /// 删除物料
    pub fn remove_material(&self, name: &str) -> LedgerResult<String> {
        let key = normalize_material_name(name);
        let mut map = self.entries.write().map_err(lock_err)?;
        let entry = map.get(&key).cloned().ok_or_else(|| not_found(&key))?;

        // 等待该物料上进行中的写入完成后再删除
        let mut guard = entry.lock().map_err(lock_err)?;
        self.store.delete_material(&key)?;
        *guard = None;
        map.remove(&key);
        info!(material = %key, "删除物料");
        Ok(key)
    }

    /// 物料快照
    pub fn get(&self, name: &str) -> LedgerResult<Material> {
        self.read(name, |m| Ok(m.clone()))
    }

    /// 全部物料快照（按名称排序）
    pub fn list(&self) -> LedgerResult<Vec<Material>> {
        let entries: Vec<Entry> = {
            let map = self.entries.read().map_err(lock_err)?;
            map.values().cloned().collect()
        };

        let mut materials = Vec::with_capacity(entries.len());
        for entry in entries {
            if let Some(m) = entry.lock().map_err(lock_err)?.as_ref() {
                materials.push(m.clone());
            }
        }
        materials.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(materials)
    }

    // ==========================================
    // 阶段生命周期
    // ==========================================

    /// 新建阶段,下单量按当前余量推荐
    ///
    /// # 返回
    /// - Err(Conflict): 同一物料内阶段名重复
    #[instrument(skip(self))]
    pub fn initialize_phase(
        &self,
        material: &str,
        phase_name: &str,
        planned_qty: f64,
        carry_in: f64,
    ) -> LedgerResult<PhaseInitialized> {
        let phase_name = match phase_name.trim() {
            "" => "Unnamed Phase".to_string(),
            s => s.to_string(),
        };
        ensure_non_negative("carry_in", carry_in)?;

        self.mutate(material, |m| {
            if m.has_phase_named(&phase_name) {
                return Err(LedgerError::Conflict(format!(
                    "物料 '{}' 已存在阶段 '{}'",
                    m.name, phase_name
                )));
            }
            let ordered_qty = self.buffer_engine.recommended_order(planned_qty, m.buffer_pct)?;
            let phase_index = m.phases_logged();
            m.history.push(PhaseRecord::open(
                phase_index,
                phase_name.clone(),
                planned_qty,
                ordered_qty,
                carry_in,
            ));

            info!(phase_index, ordered_qty, "阶段初始化");
            Ok(PhaseInitialized {
                material: m.name.clone(),
                unit: m.unit.clone(),
                phase_index,
                phase_name: phase_name.clone(),
                planned_qty,
                buffer_pct: m.buffer_pct,
                ordered_qty,
                carry_in,
            })
        })
    }

    /// 记录一次日用量
    ///
    /// # 参数
    /// - `phase_index`: None 表示最近一个阶段
    /// - `usage_date`: 用量日期
    /// - `as_of`: 趋势计算的参考日
    ///
    /// # 返回
    /// - Err(InvalidArgument): 数量为负、阶段已收尾、累计消耗将超过 下单量 + 结转
    #[instrument(skip(self))]
    pub fn log_daily_usage(
        &self,
        material: &str,
        phase_index: Option<usize>,
        quantity: f64,
        usage_date: NaiveDate,
        as_of: NaiveDate,
    ) -> LedgerResult<UsageLogged> {
        ensure_non_negative("quantity", quantity)?;

        self.mutate(material, |m| {
            let idx = resolve_phase(m, phase_index)?;
            let unit = m.unit.clone();
            let name = m.name.clone();
            let phase = m
                .phase_mut(idx)
                .ok_or_else(|| LedgerError::NotFound(format!("phase_index {}", idx)))?;

            if !phase.is_open() {
                return Err(LedgerError::InvalidArgument(format!(
                    "阶段 '{}' 已收尾, 不能再记录用量",
                    phase.phase_name
                )));
            }

            let already = phase.logged_total();
            let limit = phase.total_available();
            if already + quantity > limit + STOCK_EPSILON {
                let available = round_dp((limit - already).max(0.0), 4);
                return Err(LedgerError::InvalidArgument(format!(
                    "无法记录 {} {}: 阶段 '{}' 仅剩 {} {}（下单 {} + 结转 {}, 已消耗 {}）",
                    quantity,
                    unit,
                    phase.phase_name,
                    available,
                    unit,
                    phase.ordered_qty,
                    phase.carry_in,
                    round_dp(already, 4)
                )));
            }

            phase.daily_usage.push(DailyUsageEntry {
                date: usage_date,
                quantity,
            });
            phase.recompute_consumed();
            let trend = self.tracker.trend(phase, as_of);
            debug!(consumed = phase.consumed_qty, "日用量已记录");

            Ok(UsageLogged {
                material: name,
                unit,
                phase_index: idx,
                phase_name: phase.phase_name.clone(),
                ordered_qty: phase.ordered_qty,
                consumed_qty: round_dp(phase.consumed_qty, 4),
                remaining_stock: round_dp(phase.remaining(), 4),
                daily_usage: phase.daily_usage.clone(),
                trend,
            })
        })
    }

    /// 阶段收尾: 计算浪费率并更新余量（每个阶段恰好一次）
    ///
    /// # 参数
    /// - `actual_consumed`: 显式实际消耗,None 时按日用量汇总
    #[instrument(skip(self))]
    pub fn complete_phase(
        &self,
        material: &str,
        phase_index: Option<usize>,
        actual_consumed: Option<f64>,
    ) -> LedgerResult<PhaseCompleted> {
        if let Some(actual) = actual_consumed {
            ensure_non_negative("actual_consumed", actual)?;
        }

        self.mutate(material, |m| {
            let idx = resolve_phase(m, phase_index)?;
            let previous_buffer = m.buffer_pct;
            let phase = m
                .phase_mut(idx)
                .ok_or_else(|| LedgerError::NotFound(format!("phase_index {}", idx)))?;

            if !phase.is_open() {
                return Err(LedgerError::InvalidArgument(format!(
                    "阶段 '{}' 已收尾",
                    phase.phase_name
                )));
            }

            match actual_consumed {
                Some(actual) => phase.consumed_qty = actual,
                None => phase.recompute_consumed(),
            }
            let waste = self
                .buffer_engine
                .evaluate_waste(phase.ordered_qty, phase.consumed_qty)?;
            phase.waste_pct = Some(waste);
            phase.status = PhaseStatus::Closed;

            let new_buffer = self.buffer_engine.update_buffer(previous_buffer, waste);
            m.buffer_pct = new_buffer;
            info!(phase_index = idx, waste, previous_buffer, new_buffer, "阶段收尾");

            Self::completion(m, idx, previous_buffer)
        })
    }

    /// 补录已完成的阶段（给定计划/下单/实际消耗）,同样触发余量更新
    #[instrument(skip(self))]
    pub fn record_closed_phase(
        &self,
        material: &str,
        phase_name: &str,
        planned_qty: f64,
        ordered_qty: f64,
        consumed_qty: f64,
        carry_in: f64,
    ) -> LedgerResult<PhaseCompleted> {
        let phase_name = phase_name.trim().to_string();
        if phase_name.is_empty() {
            return Err(LedgerError::InvalidArgument("阶段名称不能为空".to_string()));
        }
        ensure_non_negative("planned_qty", planned_qty)?;
        ensure_non_negative("consumed_qty", consumed_qty)?;
        ensure_non_negative("carry_in", carry_in)?;

        self.mutate(material, |m| {
            if m.has_phase_named(&phase_name) {
                return Err(LedgerError::Conflict(format!(
                    "物料 '{}' 已存在阶段 '{}'",
                    m.name, phase_name
                )));
            }
            let waste = self.buffer_engine.evaluate_waste(ordered_qty, consumed_qty)?;
            let idx = m.phases_logged();
            let mut phase =
                PhaseRecord::open(idx, phase_name.clone(), planned_qty, ordered_qty, carry_in);
            phase.consumed_qty = consumed_qty;
            phase.waste_pct = Some(waste);
            phase.status = PhaseStatus::Closed;
            m.history.push(phase);

            let previous_buffer = m.buffer_pct;
            m.buffer_pct = self.buffer_engine.update_buffer(previous_buffer, waste);
            Self::completion(m, idx, previous_buffer)
        })
    }

    fn completion(m: &Material, idx: usize, previous_buffer: f64) -> LedgerResult<PhaseCompleted> {
        let phase = m
            .phase(idx)
            .ok_or_else(|| LedgerError::NotFound(format!("phase_index {}", idx)))?;
        Ok(PhaseCompleted {
            material: m.name.clone(),
            unit: m.unit.clone(),
            phase_index: idx,
            phase_name: phase.phase_name.clone(),
            planned_qty: phase.planned_qty,
            ordered_qty: phase.ordered_qty,
            consumed_qty: round_dp(phase.consumed_qty, 4),
            remaining_stock: round_dp(phase.remaining(), 4),
            waste_pct: phase.waste_pct.unwrap_or(0.0),
            previous_buffer_pct: previous_buffer,
            new_buffer_pct: m.buffer_pct,
            baseline_buffer_pct: m.baseline_buffer_pct,
            phases_logged: m.phases_logged(),
        })
    }

    /// 恢复初始余量（幂等）
    pub fn reset_buffer(&self, material: &str) -> LedgerResult<Material> {
        self.mutate(material, |m| {
            self.buffer_engine.reset_buffer(m);
            Ok(m.clone())
        })
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 阶段库存快照与用量趋势
    pub fn inventory_status(
        &self,
        material: &str,
        phase_index: Option<usize>,
        as_of: NaiveDate,
    ) -> LedgerResult<PhaseInventory> {
        self.read(material, |m| {
            let idx = resolve_phase(m, phase_index)?;
            let phase = m
                .phase(idx)
                .ok_or_else(|| LedgerError::NotFound(format!("phase_index {}", idx)))?;
            let inventory =
                self.tracker
                    .status(phase.ordered_qty, phase.consumed_qty, phase.carry_in)?;
            Ok(PhaseInventory {
                material: m.name.clone(),
                unit: m.unit.clone(),
                phase_index: idx,
                phase_name: phase.phase_name.clone(),
                phase_status: phase.status,
                inventory,
                trend: self.tracker.trend(phase, as_of),
            })
        })
    }

    /// 物料历史报告
    pub fn report(&self, material: &str) -> LedgerResult<MaterialReport> {
        self.read(material, |m| {
            let phases: Vec<PhaseSummary> = m
                .history
                .iter()
                .map(|p| PhaseSummary {
                    phase_index: p.phase_index,
                    phase_name: p.phase_name.clone(),
                    status: p.status,
                    planned_qty: p.planned_qty,
                    ordered_qty: p.ordered_qty,
                    consumed_qty: round_dp(p.consumed_qty, 4),
                    remaining_stock: round_dp(p.remaining(), 4),
                    waste_pct: p.waste_pct,
                })
                .collect();

            let total_ordered: f64 = m.history.iter().map(|p| p.ordered_qty).sum();
            let total_consumed: f64 = m.history.iter().map(|p| p.consumed_qty).sum();
            let overall_waste_pct = if total_ordered > 0.0 {
                self.buffer_engine.evaluate_waste(total_ordered, total_consumed)?
            } else {
                0.0
            };

            Ok(MaterialReport {
                material: m.name.clone(),
                unit: m.unit.clone(),
                baseline_buffer_pct: m.baseline_buffer_pct,
                buffer_pct: m.buffer_pct,
                phases,
                total_ordered: round_dp(total_ordered, 4),
                total_consumed: round_dp(total_consumed, 4),
                overall_waste_pct: round_dp(overall_waste_pct, 2),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::error::{RepositoryError, RepositoryResult};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, d).unwrap()
    }

    /// 可切换为写入失败的存储
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemoryMaterialStore,
        fail: AtomicBool,
    }

    impl MaterialStore for FlakyStore {
        fn load_all(&self) -> RepositoryResult<Vec<Material>> {
            self.inner.load_all()
        }
        fn save_material(&self, material: &Material) -> RepositoryResult<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(RepositoryError::DatabaseTransactionError("磁盘已满".to_string()));
            }
            self.inner.save_material(material)
        }
        fn save_all(&self, materials: &[Material]) -> RepositoryResult<()> {
            self.inner.save_all(materials)
        }
        fn delete_material(&self, name: &str) -> RepositoryResult<bool> {
            self.inner.delete_material(name)
        }
    }

    #[test]
    fn test_open_seeds_default_catalog() {
        let ledger = MaterialLedger::in_memory().unwrap();
        let names: Vec<String> = ledger.list().unwrap().into_iter().map(|m| m.name).collect();
        assert_eq!(names.len(), 8);
        assert!(names.contains(&"Cement".to_string()));
    }

    #[test]
    fn test_initialize_phase_and_duplicate_name() {
        let ledger = MaterialLedger::in_memory().unwrap();
        let init = ledger.initialize_phase(" cement", "Foundation", 200.0, 0.0).unwrap();
        assert_eq!(init.material, "Cement");
        assert_eq!(init.phase_index, 0);
        // 水泥初始余量 6%
        assert_eq!(init.ordered_qty, 212.0);

        let dup = ledger.initialize_phase("Cement", "Foundation", 50.0, 0.0);
        assert!(matches!(dup, Err(LedgerError::Conflict(_))));
        assert_eq!(ledger.get("Cement").unwrap().phases_logged(), 1);
    }

    #[test]
    fn test_log_usage_enforces_stock_limit() {
        let ledger = MaterialLedger::in_memory().unwrap();
        ledger.initialize_phase("Brick", "Walls", 100.0, 5.0).unwrap(); // 下单 110 + 结转 5

        let logged = ledger
            .log_daily_usage("Brick", None, 60.0, day(1), day(1))
            .unwrap();
        assert_eq!(logged.consumed_qty, 60.0);
        assert_eq!(logged.remaining_stock, 55.0);

        let over = ledger.log_daily_usage("Brick", Some(0), 56.0, day(2), day(2));
        assert!(matches!(over, Err(LedgerError::InvalidArgument(_))));

        let exact = ledger
            .log_daily_usage("Brick", Some(0), 55.0, day(2), day(2))
            .unwrap();
        assert_eq!(exact.remaining_stock, 0.0);

        let missing = ledger.log_daily_usage("Brick", Some(3), 1.0, day(2), day(2));
        assert!(matches!(missing, Err(LedgerError::NotFound(_))));
    }

    #[test]
    fn test_complete_phase_updates_buffer_once() {
        let ledger = MaterialLedger::in_memory().unwrap();
        ledger.add_material(MaterialSpec {
            name: "rebar mesh".to_string(),
            unit: "sheets".to_string(),
            baseline_buffer_pct: 10.0,
            weight_per_unit: 12.0,
            priority: 8,
        })
        .unwrap();
        ledger.initialize_phase("Rebar Mesh", "Slab", 200.0, 0.0).unwrap();

        let done = ledger.complete_phase("Rebar Mesh", None, Some(195.0)).unwrap();
        // (220 - 195) / 220 × 100
        assert!((done.waste_pct - 11.3636).abs() < 1e-4);
        let expected = 0.7 * 10.0 + 0.3 * done.waste_pct;
        assert!((done.new_buffer_pct - expected).abs() < 1e-3);

        let again = ledger.complete_phase("Rebar Mesh", Some(0), None);
        assert!(matches!(again, Err(LedgerError::InvalidArgument(_))));
        let closed_log = ledger.log_daily_usage("Rebar Mesh", Some(0), 1.0, day(3), day(3));
        assert!(matches!(closed_log, Err(LedgerError::InvalidArgument(_))));
        assert_eq!(ledger.get("Rebar Mesh").unwrap().buffer_pct, done.new_buffer_pct);
    }

    #[test]
    fn test_zero_planned_phase_can_close() {
        let ledger = MaterialLedger::in_memory().unwrap();
        let baseline = ledger.get("Glass").unwrap().buffer_pct;
        let init = ledger.initialize_phase("Glass", "Punch list", 0.0, 0.0).unwrap();
        assert_eq!(init.ordered_qty, 0.0);

        let done = ledger.complete_phase("Glass", None, None).unwrap();
        assert_eq!(done.waste_pct, 0.0);
        assert!((done.new_buffer_pct - 0.7 * baseline).abs() < 1e-3);
        let glass = ledger.get("Glass").unwrap();
        assert!(!glass.history[0].is_open());

        // 仅靠结转供料: 有消耗即按全部缺料计
        let paint_before = ledger.get("Paint").unwrap().buffer_pct;
        ledger.initialize_phase("Paint", "Touch up", 0.0, 10.0).unwrap();
        ledger
            .log_daily_usage("Paint", None, 4.0, day(5), day(5))
            .unwrap();
        let done = ledger.complete_phase("Paint", Some(0), None).unwrap();
        assert_eq!(done.waste_pct, -100.0);
        let expected = (0.7 * paint_before - 30.0).clamp(0.0, 100.0);
        assert!((done.new_buffer_pct - expected).abs() < 1e-3);
    }

    #[test]
    fn test_add_material_validation_and_conflict() {
        let ledger = MaterialLedger::in_memory().unwrap();
        let spec = |name: &str, buffer: f64, weight: f64, priority: u8| MaterialSpec {
            name: name.to_string(),
            unit: "pcs".to_string(),
            baseline_buffer_pct: buffer,
            weight_per_unit: weight,
            priority,
        };
        assert!(matches!(
            ledger.add_material(spec("STEEL", 2.0, 1.0, 5)),
            Err(LedgerError::Conflict(_))
        ));
        assert!(matches!(
            ledger.add_material(spec("Tiles", 120.0, 1.0, 5)),
            Err(LedgerError::InvalidArgument(_))
        ));
        assert!(matches!(
            ledger.add_material(spec("Tiles", 5.0, 0.0, 5)),
            Err(LedgerError::InvalidArgument(_))
        ));
        assert!(matches!(
            ledger.add_material(spec("Tiles", 5.0, 1.0, 11)),
            Err(LedgerError::InvalidArgument(_))
        ));
        assert_eq!(ledger.add_material(spec("tiles", 5.0, 1.0, 5)).unwrap().name, "Tiles");
    }

    #[test]
    fn test_failed_save_leaves_memory_unchanged() {
        let store = Arc::new(FlakyStore::default());
        let ledger = MaterialLedger::open(store.clone()).unwrap();
        ledger.initialize_phase("Sand", "Plaster", 10.0, 0.0).unwrap();

        store.fail.store(true, Ordering::SeqCst);
        let result = ledger.log_daily_usage("Sand", None, 2.0, day(1), day(1));
        assert!(matches!(result, Err(LedgerError::Repository(_))));
        assert_eq!(ledger.get("Sand").unwrap().history[0].consumed_qty, 0.0);

        store.fail.store(false, Ordering::SeqCst);
        ledger.log_daily_usage("Sand", None, 2.0, day(1), day(1)).unwrap();
        assert_eq!(ledger.get("Sand").unwrap().history[0].consumed_qty, 2.0);
    }

    #[test]
    fn test_remove_then_mutate_is_not_found() {
        let ledger = MaterialLedger::in_memory().unwrap();
        assert_eq!(ledger.remove_material("glass").unwrap(), "Glass");
        assert!(matches!(ledger.get("Glass"), Err(LedgerError::NotFound(_))));
        assert!(matches!(ledger.reset_buffer("Glass"), Err(LedgerError::NotFound(_))));
        assert_eq!(ledger.list().unwrap().len(), 7);
    }

    #[test]
    fn test_report_overall_waste() {
        let ledger = MaterialLedger::in_memory().unwrap();
        ledger
            .record_closed_phase("Paint", "Interior", 100.0, 110.0, 99.0, 0.0)
            .unwrap();
        ledger
            .record_closed_phase("Paint", "Exterior", 100.0, 110.0, 110.0, 0.0)
            .unwrap();

        let report = ledger.report("paint").unwrap();
        assert_eq!(report.phases.len(), 2);
        assert_eq!(report.total_ordered, 220.0);
        assert_eq!(report.total_consumed, 209.0);
        assert_eq!(report.overall_waste_pct, 5.0);
    }
}
