// ==========================================
// 工地物料订货与配送系统 - 距离与排放模型
// ==========================================
// 距离: Haversine 球面距离（地球半径 6371 km）
// 排放: co2 = factor × distance × (2 - load_factor)
//       满载 ×1.0,半载 ×1.5,空载 ×2.0;距离或额定为 0 时为 0
// ==========================================

use crate::domain::site::Coords;

/// 地球平均半径（km）
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// 两点间球面距离（km）
pub fn haversine_km(a: Coords, b: Coords) -> f64 {
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();
    let h = (dlat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// 折线总长（相邻点距离之和）
pub fn path_length_km(points: &[Coords]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_km(pair[0], pair[1]))
        .sum()
}

/// 装载不足惩罚系数: 2 - load_factor,取值 [1, 2]
pub fn utilization_multiplier(load_kg: f64, capacity_kg: f64) -> f64 {
    if capacity_kg <= 0.0 {
        return 2.0;
    }
    let load_factor = (load_kg / capacity_kg).clamp(0.0, 1.0);
    2.0 - load_factor
}

/// 单车一趟的 CO2 排放（kg）
pub fn co2_kg(distance_km: f64, load_kg: f64, capacity_kg: f64, emission_factor: f64) -> f64 {
    if distance_km <= 0.0 || capacity_kg <= 0.0 {
        return 0.0;
    }
    emission_factor * distance_km * utilization_multiplier(load_kg, capacity_kg)
}

// ==========================================
// DistanceMatrix - 站点距离矩阵
// ==========================================
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    size: usize,
    data: Vec<f64>,
}

impl DistanceMatrix {
    pub fn new(points: &[Coords]) -> Self {
        let size = points.len();
        let mut data = vec![0.0; size * size];
        for i in 0..size {
            for j in (i + 1)..size {
                let d = haversine_km(points[i], points[j]);
                data[i * size + j] = d;
                data[j * size + i] = d;
            }
        }
        Self { size, data }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.size + j]
    }

    /// 按索引序列累计距离
    pub fn route_length(&self, route: &[usize]) -> f64 {
        route.windows(2).map(|pair| self.get(pair[0], pair[1])).sum()
    }
}
