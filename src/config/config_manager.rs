// ==========================================
// 工地物料订货与配送系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// 优先级: 默认值 < config_kv(global) < 环境变量
// 红线: 配置只改变数据源与参数,不改变对外契约
// ==========================================

use crate::config::engine_config::{ConditionsSource, EngineConfig, RoutingSolverKind};
use crate::db::{init_schema, open_sqlite_connection};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// 全局作用域
pub const GLOBAL_SCOPE: &str = "global";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例（确保表结构存在）
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

    /// 从已有连接创建 ConfigManager
    ///
    /// 会对传入连接再次应用统一 PRAGMA（幂等）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&guard)?;
        }
        Ok(Self { conn })
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
            params![GLOBAL_SCOPE, key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 写入 global scope 的配置值（UPSERT）
    ///
    /// 写入前先校验键与取值,非法值直接拒绝
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let mut probe = EngineConfig::default();
        apply_override(&mut probe, key, value).map_err(RepositoryError::ValidationError)?;

        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES (?1, ?2, ?3, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3, updated_at = datetime('now')",
            params![GLOBAL_SCOPE, key, value],
        )?;
        debug!(key, value, "配置已写入");
        Ok(())
    }

    /// 删除 global scope 的配置值
    pub fn remove_global_config_value(&self, key: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM config_kv WHERE scope_id = ?1 AND key = ?2",
            params![GLOBAL_SCOPE, key],
        )?;
        Ok(affected > 0)
    }

    fn global_overrides(&self) -> RepositoryResult<BTreeMap<String, String>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![GLOBAL_SCOPE], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut map = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            map.insert(key, value);
        }
        Ok(map)
    }

    /// 获取所有覆写配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let json_value = json!(self.global_overrides()?);
        Ok(serde_json::to_string(&json_value)?)
    }

    /// 从配置快照恢复配置
    ///
    /// # 返回
    /// - Ok(usize): 恢复的配置项数量
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> RepositoryResult<usize> {
        let config_map: BTreeMap<String, String> = serde_json::from_str(snapshot_json)?;

        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let mut count = 0;
        for (key, value) in config_map.iter() {
            count += tx.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3",
                params![GLOBAL_SCOPE, key, value],
            )?;
        }
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(count)
    }

    /// 加载引擎配置: 默认值 → config_kv 覆写 → 进程环境变量覆写
    pub fn load_engine_config(&self) -> RepositoryResult<EngineConfig> {
        self.load_engine_config_with(|name| std::env::var(name).ok())
    }

    /// 同 load_engine_config,环境变量来源可注入
    pub fn load_engine_config_with(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> RepositoryResult<EngineConfig> {
        let mut cfg = EngineConfig::default();
        for (key, value) in self.global_overrides()? {
            if let Err(reason) = apply_override(&mut cfg, &key, &value) {
                warn!(config_key = %key, raw_value = %value, %reason, "配置覆写无效, 保持默认值");
            }
        }
        apply_env_overrides(&mut cfg, env);
        Ok(cfg)
    }
}

/// 按环境变量覆写（变量名 → 配置键见 config_keys::ENV_OVERRIDES）
pub fn apply_env_overrides(cfg: &mut EngineConfig, env: impl Fn(&str) -> Option<String>) {
    for (var, key) in config_keys::ENV_OVERRIDES {
        if let Some(value) = env(var) {
            match apply_override(cfg, key, &value) {
                Ok(()) => debug!(env = var, value = %value, "环境变量覆写配置"),
                Err(reason) => warn!(env = var, raw_value = %value, %reason, "环境变量取值无效, 已忽略"),
            }
        }
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, String> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| format!("{} 取值无法解析: '{}'", key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(format!("{} 不是布尔值: '{}'", key, value)),
    }
}

/// 单个键值覆写到配置
///
/// # 返回
/// - Err(String): 未知键或取值非法（配置保持不变）
pub fn apply_override(cfg: &mut EngineConfig, key: &str, value: &str) -> Result<(), String> {
    use config_keys::*;

    match key {
        REORDER_THRESHOLD_RATIO => cfg.reorder.threshold_ratio = parse(key, value)?,
        REORDER_AUTO_HORIZON_DAYS => cfg.reorder.auto_horizon_days = parse(key, value)?,
        REORDER_CRITICAL_HORIZON_DAYS => cfg.reorder.critical_horizon_days = parse(key, value)?,
        REORDER_RATE_EMA_ALPHA => {
            let alpha: f64 = parse(key, value)?;
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(format!("{} 必须在 (0,1] 内", key));
            }
            cfg.reorder.rate_ema_alpha = alpha;
        }
        REORDER_MIN_USAGE_ENTRIES => cfg.reorder.min_usage_entries = parse(key, value)?,

        FORECAST_MA_THRESHOLD_DAYS => cfg.forecast.ma_threshold_days = parse(key, value)?,
        FORECAST_MIN_ARIMA_POINTS => cfg.forecast.min_arima_points = parse(key, value)?,
        FORECAST_MA_WINDOW => {
            let window: usize = parse(key, value)?;
            if window == 0 {
                return Err(format!("{} 必须大于 0", key));
            }
            cfg.forecast.ma_window = window;
        }
        FORECAST_MAPE_WARN_PCT => cfg.forecast.mape_warn_pct = parse(key, value)?,
        FORECAST_MAX_BACKTEST_POINTS => cfg.forecast.max_backtest_points = parse(key, value)?,
        FORECAST_MAX_P => cfg.forecast.max_p = parse(key, value)?,
        FORECAST_MAX_D => cfg.forecast.max_d = parse(key, value)?,
        FORECAST_MAX_Q => cfg.forecast.max_q = parse(key, value)?,
        FORECAST_AUTO_ARIMA_ENABLED => cfg.forecast.auto_arima_enabled = parse_bool(key, value)?,
        FORECAST_DEFAULT_HORIZON => cfg.forecast.default_horizon = parse(key, value)?,

        LOGISTICS_EMISSION_FACTOR => cfg.logistics.emission_factor_kg_per_km = parse(key, value)?,
        LOGISTICS_ROUTING_SOLVER => {
            cfg.logistics.routing_solver = RoutingSolverKind::parse(value)
                .ok_or_else(|| format!("{} 未知求解器: '{}'", key, value))?
        }
        LOGISTICS_WEATHER_SENSITIVE => {
            cfg.logistics.weather_sensitive_materials = value
                .split(',')
                .map(crate::domain::material::normalize_material_name)
                .filter(|s| !s.is_empty())
                .collect()
        }

        CONDITIONS_SOURCE => {
            cfg.conditions.source = ConditionsSource::parse(value)
                .ok_or_else(|| format!("{} 未知数据源: '{}'", key, value))?
        }
        CONDITIONS_PROVIDER_TIMEOUT_MS => cfg.conditions.provider_timeout_ms = parse(key, value)?,
        CONDITIONS_MOCK_SEED => {
            cfg.conditions.mock_seed = match value.trim() {
                "" | "none" => None,
                v => Some(parse(key, v)?),
            }
        }
        CONDITIONS_AVG_SPEED_KMH => cfg.conditions.avg_speed_kmh = parse(key, value)?,
        CONDITIONS_FUEL_COST_PER_KM => cfg.conditions.fuel_cost_per_km = parse(key, value)?,
        CONDITIONS_DELAY_COST_PER_MIN => cfg.conditions.delay_cost_per_min = parse(key, value)?,

        _ => return Err(format!("未知配置键: {}", key)),
    }
    Ok(())
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 补货监控
    pub const REORDER_THRESHOLD_RATIO: &str = "reorder.threshold_ratio";
    pub const REORDER_AUTO_HORIZON_DAYS: &str = "reorder.auto_horizon_days";
    pub const REORDER_CRITICAL_HORIZON_DAYS: &str = "reorder.critical_horizon_days";
    pub const REORDER_RATE_EMA_ALPHA: &str = "reorder.rate_ema_alpha";
    pub const REORDER_MIN_USAGE_ENTRIES: &str = "reorder.min_usage_entries";

    // 用量预测
    pub const FORECAST_MA_THRESHOLD_DAYS: &str = "forecast.ma_threshold_days";
    pub const FORECAST_MIN_ARIMA_POINTS: &str = "forecast.min_arima_points";
    pub const FORECAST_MA_WINDOW: &str = "forecast.ma_window";
    pub const FORECAST_MAPE_WARN_PCT: &str = "forecast.mape_warn_pct";
    pub const FORECAST_MAX_BACKTEST_POINTS: &str = "forecast.max_backtest_points";
    pub const FORECAST_MAX_P: &str = "forecast.max_p";
    pub const FORECAST_MAX_D: &str = "forecast.max_d";
    pub const FORECAST_MAX_Q: &str = "forecast.max_q";
    pub const FORECAST_AUTO_ARIMA_ENABLED: &str = "forecast.auto_arima_enabled";
    pub const FORECAST_DEFAULT_HORIZON: &str = "forecast.default_horizon";

    // 物流
    pub const LOGISTICS_EMISSION_FACTOR: &str = "logistics.emission_factor_kg_per_km";
    pub const LOGISTICS_ROUTING_SOLVER: &str = "logistics.routing_solver";
    pub const LOGISTICS_WEATHER_SENSITIVE: &str = "logistics.weather_sensitive_materials"; // 逗号分隔

    // 路况数据源
    pub const CONDITIONS_SOURCE: &str = "conditions.source";
    pub const CONDITIONS_PROVIDER_TIMEOUT_MS: &str = "conditions.provider_timeout_ms";
    pub const CONDITIONS_MOCK_SEED: &str = "conditions.mock_seed";
    pub const CONDITIONS_AVG_SPEED_KMH: &str = "conditions.avg_speed_kmh";
    pub const CONDITIONS_FUEL_COST_PER_KM: &str = "conditions.fuel_cost_per_km";
    pub const CONDITIONS_DELAY_COST_PER_MIN: &str = "conditions.delay_cost_per_min";

    /// 环境变量 → 配置键
    pub const ENV_OVERRIDES: [(&str, &str); 4] = [
        ("BUILDSENSE_CONDITIONS_SOURCE", CONDITIONS_SOURCE),
        ("BUILDSENSE_PROVIDER_TIMEOUT_MS", CONDITIONS_PROVIDER_TIMEOUT_MS),
        ("BUILDSENSE_MOCK_SEED", CONDITIONS_MOCK_SEED),
        ("BUILDSENSE_ROUTING_SOLVER", LOGISTICS_ROUTING_SOLVER),
    ];
}
