// ==========================================
// 工地物料订货与配送系统 - 应用状态
// ==========================================
// 职责: 组装仓储、引擎、API 实例（共享一条 SQLite 连接）
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{DeliveryApi, MaterialApi};
use crate::conditions::ConditionsGateway;
use crate::config::config_manager::ConfigManager;
use crate::config::engine_config::EngineConfig;
use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::site::default_sites;
use crate::engine::forecast::ForecastEngine;
use crate::engine::logistics::LogisticsPlanner;
use crate::engine::route_analysis::RouteConditionAnalyzer;
use crate::ledger::MaterialLedger;
use crate::repository::material_repo::SqliteMaterialStore;
use crate::repository::site_repo::{SiteStore, SqliteSiteStore};

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "BUILDSENSE_DB_PATH";

/// 应用状态
///
/// 包含所有 API 实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 生效配置（默认值 + config_kv + 环境变量）
    pub config: EngineConfig,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 物料账本
    pub ledger: Arc<MaterialLedger>,

    /// 物料API
    pub material_api: Arc<MaterialApi>,

    /// 配送API
    pub delivery_api: Arc<DeliveryApi>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开数据库并建表
    /// 2. 加载配置
    /// 3. 初始化账本（空库写入默认物料目录）与站点库（空库写入默认站点）
    /// 4. 创建所有API实例
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("无法初始化表结构: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 配置
        // ==========================================
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let config = config_manager
            .load_engine_config()
            .map_err(|e| format!("无法加载配置: {}", e))?;

        // ==========================================
        // 仓储与账本
        // ==========================================
        let material_store = Arc::new(SqliteMaterialStore::from_connection(conn.clone()));
        let ledger = Arc::new(
            MaterialLedger::open(material_store).map_err(|e| format!("无法打开物料账本: {}", e))?,
        );

        let site_store: Arc<dyn SiteStore> = Arc::new(SqliteSiteStore::from_connection(conn));
        let sites = site_store
            .load()
            .map_err(|e| format!("无法读取站点: {}", e))?;
        if sites.is_empty() {
            site_store
                .save_all(&default_sites())
                .map_err(|e| format!("无法写入默认站点: {}", e))?;
            tracing::info!("空站点库, 已写入默认站点");
        }

        Self::assemble(db_path, config, config_manager, ledger, site_store)
    }

    /// 用已构建的组件组装 API（测试可注入内存仓储）
    pub fn assemble(
        db_path: String,
        config: EngineConfig,
        config_manager: Arc<ConfigManager>,
        ledger: Arc<MaterialLedger>,
        site_store: Arc<dyn SiteStore>,
    ) -> Result<Self, String> {
        // ==========================================
        // 引擎
        // ==========================================
        let forecast_engine = Arc::new(ForecastEngine::new(config.forecast.clone()));
        let planner = Arc::new(LogisticsPlanner::new(config.logistics.clone()));
        let gateway = Arc::new(ConditionsGateway::new(&config.conditions));
        let analyzer = Arc::new(RouteConditionAnalyzer::new(
            config.conditions.clone(),
            config.logistics.emission_factor_kg_per_km,
            gateway,
        ));

        // ==========================================
        // API
        // ==========================================
        let material_api = Arc::new(MaterialApi::new(ledger.clone(), forecast_engine, &config));
        let delivery_api = Arc::new(DeliveryApi::new(
            ledger.clone(),
            site_store,
            planner,
            analyzer,
        ));

        tracing::info!(
            conditions = %config.conditions.source,
            solver = %config.logistics.routing_solver,
            "AppState初始化完成"
        );

        Ok(Self {
            db_path,
            config,
            config_manager,
            ledger,
            material_api,
            delivery_api,
        })
    }

    /// 获取数据库路径
    pub fn get_db_path(&self) -> &str {
        &self.db_path
    }
}

// ==========================================
// 默认数据库路径辅助函数
// ==========================================

/// 获取默认数据库路径
///
/// # 返回
/// - BUILDSENSE_DB_PATH 非空时使用该值
/// - 否则: 用户数据目录/buildsense/buildsense.db（取不到时为 ./buildsense.db）
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    match dirs::data_local_dir() {
        Some(data_dir) => {
            let dir = data_dir.join("buildsense");
            // 建目录失败时由打开数据库报错
            std::fs::create_dir_all(&dir).ok();
            dir.join("buildsense.db").to_string_lossy().to_string()
        }
        None => "./buildsense.db".to_string(),
    }
}
