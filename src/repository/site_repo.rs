// ==========================================
// 工地物料订货与配送系统 - 站点数据仓储
// ==========================================
// 红线: load() 按 seq 返回,首个为仓库
// ==========================================

use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::site::{Coords, Site};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

/// 站点存储接口
pub trait SiteStore: Send + Sync {
    /// 有序站点列表,首个为仓库
    fn load(&self) -> RepositoryResult<Vec<Site>>;

    /// 整体替换站点列表（顺序即 seq）
    fn save_all(&self, sites: &[Site]) -> RepositoryResult<()>;
}

// ==========================================
// SqliteSiteStore
// ==========================================
pub struct SqliteSiteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSiteStore {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

impl SiteStore for SqliteSiteStore {
    fn load(&self) -> RepositoryResult<Vec<Site>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT name, lat, lon, demand_kg FROM site ORDER BY seq")?;
        let sites = stmt
            .query_map([], |row| {
                Ok(Site {
                    name: row.get(0)?,
                    coords: Coords::new(row.get(1)?, row.get(2)?),
                    demand_kg: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sites)
    }

    fn save_all(&self, sites: &[Site]) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM site", [])?;
        for (seq, site) in sites.iter().enumerate() {
            tx.execute(
                "INSERT INTO site (name, seq, lat, lon, demand_kg) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![site.name, seq as i64, site.coords.lat, site.coords.lon, site.demand_kg],
            )?;
        }
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(())
    }
}

// ==========================================
// InMemorySiteStore
// ==========================================
#[derive(Debug, Default)]
pub struct InMemorySiteStore {
    sites: Mutex<Vec<Site>>,
}

impl InMemorySiteStore {
    pub fn new(sites: Vec<Site>) -> Self {
        Self {
            sites: Mutex::new(sites),
        }
    }
}

impl SiteStore for InMemorySiteStore {
    fn load(&self) -> RepositoryResult<Vec<Site>> {
        self.sites
            .lock()
            .map(|s| s.clone())
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn save_all(&self, sites: &[Site]) -> RepositoryResult<()> {
        let mut guard = self
            .sites
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        *guard = sites.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::configure_sqlite_connection;
    use crate::domain::site::default_sites;

    #[test]
    fn test_sites_keep_depot_first() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        let store = SqliteSiteStore::from_connection(Arc::new(Mutex::new(conn)));

        // 追加站点按名称排在仓库前,读取仍按写入顺序
        let mut sites = default_sites();
        sites.push(Site::new("Airport Cargo Yard", 13.19, 77.70).with_demand(1200.0));
        store.save_all(&sites).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 6);
        assert_eq!(loaded[0].name, "Central Depot");
        assert_eq!(loaded[5].name, "Airport Cargo Yard");
        assert_eq!(loaded[5].demand_kg, 1200.0);
    }
}
