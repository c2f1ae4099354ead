// ==========================================
// 工地物料订货与配送系统 - 站点领域模型
// ==========================================
// 红线: 站点集合中第一个为仓库（depot）,其余为配送点
// 所有权: 只读输入,跨调用共享
// ==========================================

use serde::{Deserialize, Serialize};

/// 经纬度坐标（度）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coords {
    pub lat: f64,
    pub lon: f64,
}

impl Coords {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

impl From<(f64, f64)> for Coords {
    fn from((lat, lon): (f64, f64)) -> Self {
        Self { lat, lon }
    }
}

// ==========================================
// Site - 仓库 / 配送站点
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub name: String,
    pub coords: Coords,
    /// 站点需求重量（kg）,0 表示未指定
    #[serde(default)]
    pub demand_kg: f64,
}

impl Site {
    pub fn new(name: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            name: name.into(),
            coords: Coords::new(lat, lon),
            demand_kg: 0.0,
        }
    }

    pub fn with_demand(mut self, demand_kg: f64) -> Self {
        self.demand_kg = demand_kg;
        self
    }
}

/// 空站点库初始化时写入的默认站点（首个为仓库）
pub fn default_sites() -> Vec<Site> {
    vec![
        Site::new("Central Depot", 12.9716, 77.5946),
        Site::new("Whitefield Tower", 12.9698, 77.7500),
        Site::new("Electronic City Block C", 12.8452, 77.6602),
        Site::new("Hebbal Flyover Works", 13.0358, 77.5970),
        Site::new("Yelahanka Housing", 13.1007, 77.5963),
    ]
}
