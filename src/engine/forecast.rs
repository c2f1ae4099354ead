// ==========================================
// 工地物料订货与配送系统 - 用量预测引擎
// ==========================================
// 职责: 按阶段日用量预测未来每日消耗
// 模式: MA（历史不足,平铺均值） / ARIMA（自动定阶,带回退链）
// 切换: calendar_days < ma_threshold_days 或 entry_count < min_arima_points → MA
// 回退: auto_arima → ARMA(1,1) → MA（设置 warning）
// 回测: 留出末尾 k = clamp(entry_count/3, 1, max_backtest_points) 个点计算 MAPE
// ==========================================

pub mod arima;
pub mod models;
pub mod series;


use crate::config::engine_config::ForecastConfig;
use crate::domain::material::PhaseRecord;
use crate::domain::numeric::round_dp;
use crate::domain::types::ForecastRegime;
use crate::engine::error::{EngineError, EngineResult};
use chrono::NaiveDate;
use models::{AutoArima, FixedArma, ForecastModel};
use serde::{Deserialize, Serialize};
use series::{logged_quantities, mape, trailing_mean, UsageSeries};
use tracing::{debug, instrument, warn};

// ==========================================
// 预测结果
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub quantity: f64,
}

/// 数据可用性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataAvailability {
    pub log_entries: usize,
    pub calendar_days: usize,
}

/// 本次使用的模式切换阈值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastThresholds {
    pub ma_threshold_days: usize,
    pub min_arima_points: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub phase_index: usize,
    pub phase_name: String,
    pub regime: ForecastRegime,
    pub model: String,
    pub horizon: usize,
    pub forecast: Vec<ForecastPoint>,
    pub total_forecast: f64,
    /// 正值=预计余料,负值=预计缺口
    pub expected_excess: f64,
    pub backtest_mape: Option<f64>,
    pub note: String,
    pub warning: Option<String>,
    pub data_available: DataAvailability,
    pub thresholds: ForecastThresholds,
}

/// 单个模型的预测产出
struct Projection {
    model: String,
    values: Vec<f64>,
    backtest_mape: Option<f64>,
    note: String,
}

// ==========================================
// ForecastEngine - 用量预测引擎
// ==========================================
pub struct ForecastEngine {
    config: ForecastConfig,
    chain: Vec<Box<dyn ForecastModel>>,
}

impl ForecastEngine {
    /// 按配置构建默认策略链
    pub fn new(config: ForecastConfig) -> Self {
        let chain: Vec<Box<dyn ForecastModel>> = vec![
            Box::new(AutoArima::new(
                config.max_p,
                config.max_d,
                config.max_q,
                config.auto_arima_enabled,
            )),
            Box::new(FixedArma::arma11()),
        ];
        Self { config, chain }
    }

    /// 自定义策略链（MA 兜底始终保留）
    pub fn with_models(config: ForecastConfig, chain: Vec<Box<dyn ForecastModel>>) -> Self {
        Self { config, chain }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// 模式选择（每次调用时判定,不落库）
    pub fn select_regime(&self, entry_count: usize, calendar_days: usize) -> ForecastRegime {
        if calendar_days < self.config.ma_threshold_days
            || entry_count < self.config.min_arima_points
        {
            ForecastRegime::MovingAverage
        } else {
            ForecastRegime::Arima
        }
    }

    /// 回测留出点数: clamp(entry_count / 3, 1, max_backtest_points)
    pub fn backtest_size(&self, entry_count: usize) -> usize {
        (entry_count / 3).min(self.config.max_backtest_points).max(1)
    }

    /// 预测阶段未来 horizon 天的用量
    ///
    /// # 参数
    /// - `phase`: 阶段记录（使用其日用量、下单量与已消耗量）
    /// - `horizon`: 预测天数（>=1）
    ///
    /// # 返回
    /// - Ok(ForecastResult): 预测结果（降级信息在 note / warning 中）
    /// - Err(InvalidArgument): horizon < 1
    /// - Err(InsufficientData): 无日用量记录
    #[instrument(skip(self, phase), fields(phase = %phase.phase_name))]
    pub fn forecast(&self, phase: &PhaseRecord, horizon: usize) -> EngineResult<ForecastResult> {
        if horizon < 1 {
            return Err(EngineError::InvalidArgument(format!(
                "horizon 必须 >= 1, 实际={}",
                horizon
            )));
        }

        let entries = &phase.daily_usage;
        let series = UsageSeries::from_entries(entries).ok_or_else(|| {
            EngineError::InsufficientData(format!(
                "阶段 {} 尚无日用量记录,无法预测",
                phase.phase_name
            ))
        })?;

        let entry_count = entries.len();
        let calendar_days = series.calendar_days();
        let regime = self.select_regime(entry_count, calendar_days);
        let k = self.backtest_size(entry_count);
        let logged = logged_quantities(entries);
        debug!(entry_count, calendar_days, %regime, k, "预测模式判定");

        let mut notes = Vec::new();
        let mut warnings = Vec::new();

        let projection = match regime {
            ForecastRegime::MovingAverage => {
                notes.push(format!(
                    "历史数据不足以识别趋势（{} 条记录 / {} 天,需 >= {} 条且 >= {} 天）",
                    entry_count,
                    calendar_days,
                    self.config.min_arima_points,
                    self.config.ma_threshold_days
                ));
                self.moving_average(&logged, horizon, k)
            }
            ForecastRegime::Arima => match self.run_chain(&series, horizon, k, &mut notes) {
                Some(p) => p,
                None => {
                    warn!("ARIMA 类模型均不可用,回退移动平均");
                    warnings.push("ARIMA 类模型均不可用或拟合失败,已回退移动平均".to_string());
                    self.moving_average(&logged, horizon, k)
                }
            },
        };
        notes.push(projection.note.clone());

        if let Some(m) = projection.backtest_mape {
            if m > self.config.mape_warn_pct {
                warnings.push(format!(
                    "回测 MAPE {:.2}% 超过阈值 {:.0}%,预测可信度低",
                    m, self.config.mape_warn_pct
                ));
            }
        }

        let values: Vec<f64> = projection
            .values
            .iter()
            .map(|v| if v.is_finite() { v.max(0.0) } else { 0.0 })
            .collect();
        let total: f64 = values.iter().sum();
        let forecast = series
            .future_dates(horizon)
            .into_iter()
            .zip(values.iter())
            .map(|(date, q)| ForecastPoint {
                date,
                quantity: round_dp(*q, 4),
            })
            .collect();

        Ok(ForecastResult {
            phase_index: phase.phase_index,
            phase_name: phase.phase_name.clone(),
            regime,
            model: projection.model,
            horizon,
            forecast,
            total_forecast: round_dp(total, 4),
            expected_excess: round_dp(phase.ordered_qty - phase.consumed_qty - total, 4),
            backtest_mape: projection.backtest_mape,
            note: notes.join("; "),
            warning: if warnings.is_empty() {
                None
            } else {
                Some(warnings.join("; "))
            },
            data_available: DataAvailability {
                log_entries: entry_count,
                calendar_days,
            },
            thresholds: ForecastThresholds {
                ma_threshold_days: self.config.ma_threshold_days,
                min_arima_points: self.config.min_arima_points,
            },
        })
    }

    // ==========================================
    // 内部: 各模式预测
    // ==========================================

    /// 依次尝试策略链,全部失败返回 None
    fn run_chain(
        &self,
        series: &UsageSeries,
        horizon: usize,
        k: usize,
        notes: &mut Vec<String>,
    ) -> Option<Projection> {
        for model in &self.chain {
            if !model.is_available() {
                warn!(model = model.name(), "模型不可用,尝试下一级");
                notes.push(format!("{} 不可用", model.name()));
                continue;
            }

            match model.fit(&series.values) {
                Ok(fitted) => {
                    let values = fitted.fit.forecast(horizon);
                    if values.iter().any(|v| !v.is_finite()) {
                        warn!(model = model.name(), "预测值非有限,尝试下一级");
                        notes.push(format!("{} 预测值非有限", model.name()));
                        continue;
                    }

                    let backtest_mape = match self.backtest_arima(series, &fitted, k) {
                        Ok(m) => m,
                        Err(e) => {
                            notes.push(format!("回测重拟合失败: {}", e));
                            None
                        }
                    };
                    debug!(model = %fitted.label, aic = fitted.fit.aic, "模型拟合成功");
                    return Some(Projection {
                        note: format!("{} 拟合 {} 天日序列", fitted.label, series.values.len()),
                        model: fitted.label,
                        values,
                        backtest_mape,
                    });
                }
                Err(e) => {
                    warn!(model = model.name(), error = %e, "模型拟合失败,尝试下一级");
                    notes.push(format!("{} 拟合失败: {}", model.name(), e));
                }
            }
        }
        None
    }

    /// 留出末尾 k 条记录所在日,用选定阶数在其之前的日序列上重拟合
    ///
    /// MAPE 只在有记录的留出日上计算,补 0 的空白日不参与
    fn backtest_arima(
        &self,
        series: &UsageSeries,
        fitted: &models::ModelFit,
        k: usize,
    ) -> Result<Option<f64>, arima::FitError> {
        let days = series.holdout_days(k);
        let cut = match days.first() {
            Some(&cut) if cut > 0 => cut,
            _ => return Ok(None),
        };

        let refit = arima::fit(&series.values[..cut], fitted.order())?;
        let path = refit.forecast(series.values.len() - cut);
        let (actual, predicted): (Vec<f64>, Vec<f64>) = days
            .iter()
            .map(|&d| (series.values[d], path[d - cut].max(0.0)))
            .unzip();
        Ok(mape(&actual, &predicted).map(|m| round_dp(m, 2)))
    }

    /// 最近 min(ma_window, n) 条记录均值平铺
    fn moving_average(&self, logged: &[f64], horizon: usize, k: usize) -> Projection {
        let window = self.config.ma_window.min(logged.len()).max(1);
        let mean = trailing_mean(logged, window).unwrap_or(0.0);

        let backtest_mape = if logged.len() > k {
            let (train, held_out) = logged.split_at(logged.len() - k);
            trailing_mean(train, self.config.ma_window)
                .and_then(|pred| mape(held_out, &vec![pred; held_out.len()]))
                .map(|m| round_dp(m, 2))
        } else {
            None
        };

        Projection {
            model: format!("MA(window={})", window),
            values: vec![mean; horizon],
            backtest_mape,
            note: format!("按最近 {} 条记录均值 {:.4} 平铺预测", window, mean),
        }
    }
}

impl Default for ForecastEngine {
    fn default() -> Self {
        Self::new(ForecastConfig::default())
    }
}
