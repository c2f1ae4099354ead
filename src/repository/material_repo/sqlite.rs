use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::material::{DailyUsageEntry, Material, PhaseRecord};
use crate::domain::types::PhaseStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::material_repo::MaterialStore;
use chrono::NaiveDate;
use rusqlite::{params, Connection, Transaction};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

const DATE_FORMAT: &str = "%Y-%m-%d";

// ==========================================
// SqliteMaterialStore - SQLite 物料存储
// ==========================================
/// 物料账本 SQLite 存储
/// 职责: 管理 material / phase_record / daily_usage 三张表
/// 红线: 不含业务逻辑，只负责数据访问
pub struct SqliteMaterialStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMaterialStore {
    /// 打开数据库并确保表结构存在
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例（调用方负责建表）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

/// 事务内写入单个物料（先删后插,级联清理旧的阶段与日用量）
fn write_material(tx: &Transaction<'_>, material: &Material) -> RepositoryResult<()> {
    tx.execute("DELETE FROM material WHERE name = ?1", params![material.name])?;
    tx.execute(
        r#"
        INSERT INTO material (
            name, unit, baseline_buffer_pct, buffer_pct, weight_per_unit, priority, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))
        "#,
        params![
            material.name,
            material.unit,
            material.baseline_buffer_pct,
            material.buffer_pct,
            material.weight_per_unit,
            material.priority,
        ],
    )?;

    for phase in &material.history {
        tx.execute(
            r#"
            INSERT INTO phase_record (
                material_name, phase_index, phase_name, planned_qty, ordered_qty,
                consumed_qty, carry_in, waste_pct, status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                material.name,
                phase.phase_index as i64,
                phase.phase_name,
                phase.planned_qty,
                phase.ordered_qty,
                phase.consumed_qty,
                phase.carry_in,
                phase.waste_pct,
                phase.status.as_str(),
            ],
        )?;

        for (seq, entry) in phase.daily_usage.iter().enumerate() {
            tx.execute(
                r#"
                INSERT INTO daily_usage (material_name, phase_index, seq, usage_date, quantity)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    material.name,
                    phase.phase_index as i64,
                    seq as i64,
                    entry.date.format(DATE_FORMAT).to_string(),
                    entry.quantity,
                ],
            )?;
        }
    }
    Ok(())
}

fn parse_date(raw: &str) -> RepositoryResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| RepositoryError::ValidationError(format!("日期格式错误 '{}': {}", raw, e)))
}

impl MaterialStore for SqliteMaterialStore {
    fn load_all(&self) -> RepositoryResult<Vec<Material>> {
        let conn = self.get_conn()?;

        // 日用量按 (物料, 阶段) 分组,保持记录顺序
        let mut usage: HashMap<(String, usize), Vec<DailyUsageEntry>> = HashMap::new();
        {
            let mut stmt = conn.prepare(
                r#"
                SELECT material_name, phase_index, usage_date, quantity
                FROM daily_usage
                ORDER BY material_name, phase_index, seq
                "#,
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, f64>(3)?,
                ))
            })?;
            for row in rows {
                let (name, idx, date, quantity) = row?;
                usage
                    .entry((name, idx as usize))
                    .or_default()
                    .push(DailyUsageEntry {
                        date: parse_date(&date)?,
                        quantity,
                    });
            }
        }

        let mut phases: HashMap<String, Vec<PhaseRecord>> = HashMap::new();
        {
            let mut stmt = conn.prepare(
                r#"
                SELECT material_name, phase_index, phase_name, planned_qty, ordered_qty,
                       consumed_qty, carry_in, waste_pct, status
                FROM phase_record
                ORDER BY material_name, phase_index
                "#,
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, f64>(5)?,
                    row.get::<_, f64>(6)?,
                    row.get::<_, Option<f64>>(7)?,
                    row.get::<_, String>(8)?,
                ))
            })?;
            for row in rows {
                let (name, idx, phase_name, planned, ordered, consumed, carry_in, waste, status) = row?;
                let status = PhaseStatus::parse(&status).ok_or_else(|| {
                    RepositoryError::ValidationError(format!("未知阶段状态: {}", status))
                })?;
                let phase_index = idx as usize;
                let daily_usage = usage.remove(&(name.clone(), phase_index)).unwrap_or_default();
                phases.entry(name).or_default().push(PhaseRecord {
                    phase_index,
                    phase_name,
                    planned_qty: planned,
                    ordered_qty: ordered,
                    consumed_qty: consumed,
                    carry_in,
                    waste_pct: waste,
                    status,
                    daily_usage,
                });
            }
        }

        let mut stmt = conn.prepare(
            r#"
            SELECT name, unit, baseline_buffer_pct, buffer_pct, weight_per_unit, priority
            FROM material
            ORDER BY name
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Material {
                name: row.get(0)?,
                unit: row.get(1)?,
                baseline_buffer_pct: row.get(2)?,
                buffer_pct: row.get(3)?,
                weight_per_unit: row.get(4)?,
                priority: row.get(5)?,
                history: Vec::new(),
            })
        })?;

        let mut materials = Vec::new();
        for row in rows {
            let mut material = row?;
            material.history = phases.remove(&material.name).unwrap_or_default();
            materials.push(material);
        }

        debug!(count = materials.len(), "物料账本加载完成");
        Ok(materials)
    }

    fn save_material(&self, material: &Material) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        write_material(&tx, material)?;
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(())
    }

    fn save_all(&self, materials: &[Material]) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM material", [])?;
        for material in materials {
            write_material(&tx, material)?;
        }
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(())
    }

    fn delete_material(&self, name: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM material WHERE name = ?1", params![name])?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::configure_sqlite_connection;

    fn store() -> SqliteMaterialStore {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        SqliteMaterialStore::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn cement_with_phase() -> Material {
        let mut cement = Material::new("cement", "bags", 6.0, 50.0, 9);
        let mut phase = PhaseRecord::open(0, "Foundation", 200.0, 212.0, 0.0);
        let d = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        // 故意乱序与重复日期
        phase.daily_usage.push(DailyUsageEntry { date: d, quantity: 12.0 });
        phase.daily_usage.push(DailyUsageEntry { date: d.pred_opt().unwrap(), quantity: 8.0 });
        phase.daily_usage.push(DailyUsageEntry { date: d, quantity: 5.5 });
        phase.recompute_consumed();
        cement.history.push(phase);
        cement
    }

    #[test]
    fn test_save_and_load_preserves_history_order() {
        let store = store();
        store.save_material(&cement_with_phase()).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        let cement = &loaded[0];
        assert_eq!(cement.name, "Cement");
        assert_eq!(cement.phases_logged(), 1);

        let phase = &cement.history[0];
        assert_eq!(phase.status, PhaseStatus::Open);
        assert_eq!(phase.consumed_qty, 25.5);
        let quantities: Vec<f64> = phase.daily_usage.iter().map(|e| e.quantity).collect();
        assert_eq!(quantities, vec![12.0, 8.0, 5.5]);
    }

    #[test]
    fn test_save_material_replaces_rows() {
        let store = store();
        let mut cement = cement_with_phase();
        store.save_material(&cement).unwrap();

        cement.history[0].daily_usage.truncate(1);
        cement.history[0].recompute_consumed();
        cement.buffer_pct = 7.5;
        store.save_material(&cement).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded[0].buffer_pct, 7.5);
        assert_eq!(loaded[0].history[0].daily_usage.len(), 1);
    }

    #[test]
    fn test_delete_cascades() {
        let store = store();
        store.save_material(&cement_with_phase()).unwrap();
        assert!(store.delete_material("Cement").unwrap());
        assert!(!store.delete_material("Cement").unwrap());

        let conn = store.get_conn().unwrap();
        let usage_rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM daily_usage", [], |row| row.get(0))
            .unwrap();
        assert_eq!(usage_rows, 0);
    }

    #[test]
    fn test_failed_save_all_keeps_prior_state() {
        let store = store();
        store.save_material(&cement_with_phase()).unwrap();

        // buffer_pct 越界触发 CHECK 约束,整个事务回滚
        let mut bad = Material::new("Brick", "pcs", 10.0, 3.0, 7);
        bad.buffer_pct = 150.0;
        assert!(store.save_all(&[bad]).is_err());

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "Cement");
    }
}
