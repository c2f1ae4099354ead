// ==========================================
// 工地物料订货与配送系统 - 路线比较引擎
// ==========================================
// 排名: 效率分降序,同分按总成本升序;best = 第一,worst = 最后
// 节省: worst - best（时间 / 成本 / CO2,各自不低于 0）
// 建议: 节省时间 > 30 分钟 → 避开延误;节省成本 > 50 → 降本;否则报告效率分
// ==========================================

use crate::domain::numeric::round_dp;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::route_analysis::{RouteAnalysis, RouteConditionAnalyzer, RouteInput};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{info, instrument};

/// 建议类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    DelayAvoidance,
    CostReduction,
    Efficiency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSavings {
    pub time_minutes: f64,
    pub cost_usd: f64,
    pub co2_kg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteComparison {
    /// 按排名排序
    pub routes: Vec<RouteAnalysis>,
    pub best_route: String,
    pub worst_route: String,
    pub best_efficiency: u8,
    pub savings: RouteSavings,
    pub recommendation_kind: RecommendationKind,
    pub recommendation: String,
}

// ==========================================
// RouteComparator - 路线比较引擎
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteComparator {
    // 无状态引擎
}

impl RouteComparator {
    pub fn new() -> Self {
        Self {}
    }

    /// 比较已分析的路线
    ///
    /// # 返回
    /// - Err(InvalidArgument): 路线少于 2 条
    pub fn compare(&self, mut routes: Vec<RouteAnalysis>) -> EngineResult<RouteComparison> {
        if routes.len() < 2 {
            return Err(EngineError::InvalidArgument(format!(
                "比较至少需要 2 条路线, 实际={}",
                routes.len()
            )));
        }

        routes.sort_by(|a, b| {
            b.efficiency_score.cmp(&a.efficiency_score).then_with(|| {
                a.total_cost_usd
                    .partial_cmp(&b.total_cost_usd)
                    .unwrap_or(Ordering::Equal)
            })
        });

        let (best, worst) = match (routes.first(), routes.last()) {
            (Some(b), Some(w)) => (b, w),
            _ => return Err(EngineError::InvalidArgument("路线列表为空".to_string())),
        };

        let savings = RouteSavings {
            time_minutes: round_dp((worst.final_delivery_time_min - best.final_delivery_time_min).max(0.0), 1),
            cost_usd: round_dp((worst.total_cost_usd - best.total_cost_usd).max(0.0), 2),
            co2_kg: round_dp((worst.co2_kg - best.co2_kg).max(0.0), 2),
        };

        let (recommendation_kind, recommendation) = if savings.time_minutes > 30.0 {
            (
                RecommendationKind::DelayAvoidance,
                format!(
                    "{} 预计耗时 {} 分钟,改走 {} 可节省 {} 分钟、${} 及 {:.1} kg CO2",
                    worst.route_name,
                    worst.final_delivery_time_min as i64,
                    best.route_name,
                    savings.time_minutes as i64,
                    savings.cost_usd as i64,
                    savings.co2_kg
                ),
            )
        } else if savings.cost_usd > 50.0 {
            (
                RecommendationKind::CostReduction,
                format!(
                    "{} 可降低成本 ${}（延误更少、油耗更优）",
                    best.route_name, savings.cost_usd as i64
                ),
            )
        } else {
            (
                RecommendationKind::Efficiency,
                format!("{} 效率分 {}%", best.route_name, best.efficiency_score),
            )
        };

        info!(best = %best.route_name, worst = %worst.route_name, kind = ?recommendation_kind, "路线比较完成");

        Ok(RouteComparison {
            best_route: best.route_name.clone(),
            worst_route: worst.route_name.clone(),
            best_efficiency: best.efficiency_score,
            savings,
            recommendation_kind,
            recommendation,
            routes,
        })
    }

    /// 并发分析多条路线后比较
    #[instrument(skip(self, analyzer, inputs), fields(routes = inputs.len()))]
    pub async fn analyze_and_compare(
        &self,
        analyzer: &RouteConditionAnalyzer,
        inputs: &[RouteInput],
    ) -> EngineResult<RouteComparison> {
        if inputs.len() < 2 {
            return Err(EngineError::InvalidArgument(format!(
                "比较至少需要 2 条路线, 实际={}",
                inputs.len()
            )));
        }
        let analyses = join_all(inputs.iter().map(|input| analyzer.analyze(input)))
            .await
            .into_iter()
            .collect::<EngineResult<Vec<_>>>()?;
        self.compare(analyses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{CongestionLevel, RiskLevel};
    use crate::engine::route_analysis::{TrafficImpact, WeatherImpact};

    fn analysis(name: &str, score: u8, time: f64, cost: f64, co2: f64) -> RouteAnalysis {
        RouteAnalysis {
            route_name: name.to_string(),
            base_distance_km: 20.0,
            base_time_min: 20.0,
            weather: WeatherImpact {
                points: Vec::new(),
                delay_minutes: 0.0,
                has_rain: false,
                risk_level: RiskLevel::Clear,
            },
            traffic: TrafficImpact {
                segments: Vec::new(),
                delay_minutes: 0.0,
                congestion_level: CongestionLevel::Low,
            },
            delay_minutes: (time - 20.0).max(0.0),
            final_delivery_time_min: time,
            fuel_cost_usd: 3.0,
            delay_cost_usd: cost - 3.0,
            total_cost_usd: cost,
            co2_kg: co2,
            utilization_pct: 60.0,
            efficiency_score: score,
            risk_level: RiskLevel::Clear,
            notes: Vec::new(),
        }
    }

    #[test]
    fn test_compare_requires_two_routes() {
        let comparator = RouteComparator::new();
        let result = comparator.compare(vec![analysis("A", 80, 30.0, 10.0, 1.0)]);
        assert!(matches!(result, Err(EngineError::InvalidArgument(_))));
    }

    #[test]
    fn test_compare_delay_avoidance_scenario() {
        // A: 效率 62, 95 分钟, $180; B: 效率 78, 55 分钟, $95
        let comparator = RouteComparator::new();
        let result = comparator
            .compare(vec![
                analysis("Route A", 62, 95.0, 180.0, 4.2),
                analysis("Route B", 78, 55.0, 95.0, 3.0),
            ])
            .unwrap();

        assert_eq!(result.best_route, "Route B");
        assert_eq!(result.worst_route, "Route A");
        assert_eq!(result.best_efficiency, 78);
        assert_eq!(result.savings.time_minutes, 40.0);
        assert_eq!(result.savings.cost_usd, 85.0);
        assert_eq!(result.savings.co2_kg, 1.2);
        assert_eq!(result.recommendation_kind, RecommendationKind::DelayAvoidance);
        assert!(result.recommendation.contains("Route B"));
        assert!(result.recommendation.contains("40"));
        assert_eq!(result.routes[0].route_name, "Route B");
    }

    #[test]
    fn test_compare_cost_and_efficiency_recommendations() {
        let comparator = RouteComparator::new();
        let cost = comparator
            .compare(vec![
                analysis("North", 70, 40.0, 160.0, 2.0),
                analysis("South", 75, 30.0, 90.0, 2.0),
            ])
            .unwrap();
        assert_eq!(cost.recommendation_kind, RecommendationKind::CostReduction);
        assert!(cost.recommendation.contains("$70"));

        let close = comparator
            .compare(vec![
                analysis("North", 70, 40.0, 60.0, 2.0),
                analysis("South", 75, 35.0, 50.0, 2.0),
            ])
            .unwrap();
        assert_eq!(close.recommendation_kind, RecommendationKind::Efficiency);
        assert!(close.recommendation.contains("75%"));
    }

    #[test]
    fn test_compare_tie_breaks_on_cost_and_clamps_savings() {
        let comparator = RouteComparator::new();
        // 同分时成本低者为 best; best 反而更慢时时间节省夹为 0
        let result = comparator
            .compare(vec![
                analysis("Expensive", 80, 30.0, 120.0, 1.0),
                analysis("Cheap", 80, 45.0, 40.0, 2.0),
                analysis("Middle", 80, 35.0, 70.0, 1.5),
            ])
            .unwrap();
        assert_eq!(result.best_route, "Cheap");
        assert_eq!(result.worst_route, "Expensive");
        assert_eq!(result.savings.time_minutes, 0.0);
        assert_eq!(result.savings.co2_kg, 0.0);
        assert_eq!(result.savings.cost_usd, 80.0);
        assert_eq!(result.routes.len(), 3);
    }
}
