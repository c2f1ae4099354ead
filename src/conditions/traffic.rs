// ==========================================
// 路况数据源 - 交通
// ==========================================
// 路线延误 = Σ 各路段 max(0, 当前耗时 - 自由流耗时)
// ==========================================

use super::error::ProviderResult;
use crate::domain::conditions::{TrafficReport, TrafficSegment};
use crate::domain::numeric::round_dp;
use crate::domain::site::Coords;
use crate::domain::types::CongestionLevel;
use crate::engine::geo::haversine_km;
use async_trait::async_trait;

/// 交通数据源
#[async_trait]
pub trait TrafficProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn query(&self, waypoints: &[Coords], route_name: &str) -> ProviderResult<TrafficReport>;
}

/// 按当前车速构建路段
pub fn segment(
    from: Coords,
    to: Coords,
    free_flow_kmh: f64,
    speed_kmh: f64,
    congestion: CongestionLevel,
) -> TrafficSegment {
    let distance_km = haversine_km(from, to);
    let minutes = |speed: f64| {
        if speed > 0.0 {
            distance_km / speed * 60.0
        } else {
            0.0
        }
    };
    TrafficSegment {
        from,
        to,
        distance_km: round_dp(distance_km, 2),
        free_flow_min: minutes(free_flow_kmh),
        current_min: minutes(speed_kmh),
        speed_kmh,
        congestion,
    }
}

/// 汇总路段得到路线报告
pub fn build_report(route_name: &str, segments: Vec<TrafficSegment>) -> TrafficReport {
    let delay: f64 = segments.iter().map(TrafficSegment::delay_minutes).sum();
    TrafficReport {
        route_name: route_name.to_string(),
        segments,
        delay_minutes: round_dp(delay, 1),
        congestion_level: CongestionLevel::from_delay(delay),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_sums_positive_delays_only() {
        let a = Coords::new(12.97, 77.59);
        let b = Coords::new(12.97, 77.75);
        let c = Coords::new(13.04, 77.60);

        let slow = segment(a, b, 60.0, 30.0, CongestionLevel::High);
        let fast = segment(b, c, 60.0, 70.0, CongestionLevel::Low);
        let expected = slow.current_min - slow.free_flow_min;

        let report = build_report("Route A", vec![slow, fast]);
        assert!((report.delay_minutes - round_dp(expected, 1)).abs() < 1e-9);
        assert_eq!(report.congestion_level, CongestionLevel::from_delay(expected));
    }
}
