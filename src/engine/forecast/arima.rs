// ==========================================
// 预测引擎 - ARIMA 估计器
// ==========================================
// 方法: 差分 d 次 → Hannan-Rissanen 两阶段最小二乘估计 ARMA(p,q)
//       → 条件平方和残差 → AIC
// 约束: AR 系数绝对值和 < 1（平稳）,MA 系数绝对值和 < 1（可逆）
// ==========================================

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 回归的最小剩余自由度
const MIN_DOF: usize = 3;

/// 方差下限,避免完美拟合时 ln(0)
const SIGMA2_FLOOR: f64 = 1e-12;

/// 模型拟合失败原因
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("模型不可用: {0}")]
    Unavailable(String),

    #[error("样本过短: 需要至少 {required} 个点, 实际 {actual}")]
    TooShort { required: usize, actual: usize },

    #[error("设计矩阵奇异")]
    Singular,

    #[error("模型不平稳或不可逆: {0}")]
    Unstable(String),

    #[error("数值计算失败: {0}")]
    Numerical(String),
}

/// ARIMA 阶数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl ArimaOrder {
    pub const fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }

    fn param_count(&self) -> usize {
        1 + self.p + self.q
    }
}

impl fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.d == 0 {
            write!(f, "ARMA({},{})", self.p, self.q)
        } else {
            write!(f, "ARIMA({},{},{})", self.p, self.d, self.q)
        }
    }
}

// ==========================================
// ArimaFit - 拟合结果
// ==========================================
#[derive(Debug, Clone)]
pub struct ArimaFit {
    pub order: ArimaOrder,
    pub intercept: f64,
    pub ar: Vec<f64>,
    pub ma: Vec<f64>,
    pub sigma2: f64,
    pub aic: f64,
    differenced: Vec<f64>,
    residuals: Vec<f64>,
    /// 各差分层（0..d）序列的末值,用于还原预测
    level_tails: Vec<f64>,
}

impl ArimaFit {
    /// 向前递推 horizon 步,未来新息取 0,再逐层积分还原
    pub fn forecast(&self, horizon: usize) -> Vec<f64> {
        let n = self.differenced.len();
        let mut w = self.differenced.clone();
        let mut e = self.residuals.clone();

        for _ in 0..horizon {
            let t = w.len();
            let mut pred = self.intercept;
            for (i, phi) in self.ar.iter().enumerate() {
                if t > i {
                    pred += phi * w[t - 1 - i];
                }
            }
            for (j, theta) in self.ma.iter().enumerate() {
                if t > j {
                    pred += theta * e[t - 1 - j];
                }
            }
            w.push(pred);
            e.push(0.0);
        }

        let mut fc = w[n..].to_vec();
        for level in (0..self.order.d).rev() {
            let mut prev = self.level_tails[level];
            for v in fc.iter_mut() {
                prev += *v;
                *v = prev;
            }
        }
        fc
    }
}

// ==========================================
// 拟合入口
// ==========================================

/// 按给定阶数拟合
pub fn fit(series: &[f64], order: ArimaOrder) -> Result<ArimaFit, FitError> {
    if series.iter().any(|v| !v.is_finite()) {
        return Err(FitError::Numerical("序列含非有限值".to_string()));
    }
    if series.len() <= order.d {
        return Err(FitError::TooShort {
            required: order.d + order.param_count() + MIN_DOF,
            actual: series.len(),
        });
    }

    let (w, level_tails) = difference(series, order.d);
    let n = w.len();
    let (p, q) = (order.p, order.q);

    // 第一阶段: 长 AR 回归估计新息（仅 q>0 时需要）
    let (innovations, start) = if q > 0 {
        let m = (p + q + 2).max(3);
        if n < 2 * m + 1 + MIN_DOF {
            return Err(FitError::TooShort {
                required: 2 * m + 1 + MIN_DOF + order.d,
                actual: series.len(),
            });
        }
        let (x, y) = design(&w, &[], m, 0, m);
        let beta = least_squares(&x, &y)?;
        let mut e = vec![0.0; n];
        for t in m..n {
            let mut pred = beta[0];
            for i in 1..=m {
                pred += beta[i] * w[t - i];
            }
            e[t] = w[t] - pred;
        }
        (e, (m + q).max(p))
    } else {
        (vec![0.0; n], p)
    };

    if n < start + order.param_count() + MIN_DOF {
        return Err(FitError::TooShort {
            required: start + order.param_count() + MIN_DOF + order.d,
            actual: series.len(),
        });
    }

    // 第二阶段: w_t ~ 1 + w_{t-1..t-p} + e_{t-1..t-q}
    let (x, y) = design(&w, &innovations, p, q, start);
    let beta = least_squares(&x, &y)?;
    let intercept = beta[0];
    let ar = beta[1..=p].to_vec();
    let ma = beta[p + 1..].to_vec();

    let ar_sum: f64 = ar.iter().map(|v| v.abs()).sum();
    if ar_sum >= 1.0 {
        return Err(FitError::Unstable(format!("Σ|φ|={:.4}", ar_sum)));
    }
    let ma_sum: f64 = ma.iter().map(|v| v.abs()).sum();
    if ma_sum >= 1.0 {
        return Err(FitError::Unstable(format!("Σ|θ|={:.4}", ma_sum)));
    }

    // 条件平方和残差
    let mut residuals = vec![0.0; n];
    let mut sse = 0.0;
    for t in p..n {
        let mut pred = intercept;
        for (i, phi) in ar.iter().enumerate() {
            pred += phi * w[t - 1 - i];
        }
        for (j, theta) in ma.iter().enumerate() {
            if t > j {
                pred += theta * residuals[t - 1 - j];
            }
        }
        residuals[t] = w[t] - pred;
        sse += residuals[t] * residuals[t];
    }

    let n_eff = (n - p) as f64;
    let sigma2 = sse / n_eff;
    if !sigma2.is_finite() {
        return Err(FitError::Numerical("残差方差非有限".to_string()));
    }
    let aic = n_eff * sigma2.max(SIGMA2_FLOOR).ln() + 2.0 * order.param_count() as f64;

    Ok(ArimaFit {
        order,
        intercept,
        ar,
        ma,
        sigma2,
        aic,
        differenced: w,
        residuals,
        level_tails,
    })
}

/// 在 p∈[0,max_p], d∈[0,max_d], q∈[0,max_q] 网格上按 AIC 最小选阶
///
/// AIC 相同时保留参数更少（先遍历到）的阶数
pub fn select_order(
    series: &[f64],
    max_p: usize,
    max_d: usize,
    max_q: usize,
) -> Result<ArimaFit, FitError> {
    let mut best: Option<ArimaFit> = None;
    let mut last_err = FitError::Numerical("搜索网格为空".to_string());

    for d in 0..=max_d {
        for p in 0..=max_p {
            for q in 0..=max_q {
                match fit(series, ArimaOrder::new(p, d, q)) {
                    Ok(candidate) => {
                        let better = best
                            .as_ref()
                            .map(|b| candidate.aic < b.aic)
                            .unwrap_or(true);
                        if better {
                            best = Some(candidate);
                        }
                    }
                    Err(e) => last_err = e,
                }
            }
        }
    }

    best.ok_or(last_err)
}

// ==========================================
// 内部工具
// ==========================================

/// 差分 d 次,返回 (差分后序列, 各层末值)
fn difference(series: &[f64], d: usize) -> (Vec<f64>, Vec<f64>) {
    let mut current = series.to_vec();
    let mut tails = Vec::with_capacity(d);
    for _ in 0..d {
        tails.push(current.last().copied().unwrap_or(0.0));
        current = current.windows(2).map(|pair| pair[1] - pair[0]).collect();
    }
    (current, tails)
}

/// 构建回归设计矩阵: 行 t∈[start,n): [1, w_{t-1..t-p}, e_{t-1..t-q}]
fn design(w: &[f64], e: &[f64], p: usize, q: usize, start: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
    let mut rows = Vec::with_capacity(w.len().saturating_sub(start));
    let mut y = Vec::with_capacity(w.len().saturating_sub(start));
    for t in start..w.len() {
        let mut row = Vec::with_capacity(1 + p + q);
        row.push(1.0);
        for i in 1..=p {
            row.push(w[t - i]);
        }
        for j in 1..=q {
            row.push(e[t - j]);
        }
        rows.push(row);
        y.push(w[t]);
    }
    (rows, y)
}

/// SVD 最小二乘,秩亏时判为奇异
fn least_squares(rows: &[Vec<f64>], y: &[f64]) -> Result<Vec<f64>, FitError> {
    let n = rows.len();
    let k = rows.first().map(|r| r.len()).unwrap_or(0);
    if n == 0 || k == 0 || n < k {
        return Err(FitError::TooShort { required: k, actual: n });
    }

    let x = DMatrix::from_fn(n, k, |i, j| rows[i][j]);
    let b = DVector::from_column_slice(y);
    let svd = x.svd(true, true);

    let max_sv = svd.singular_values.max();
    if !max_sv.is_finite() || max_sv <= 0.0 {
        return Err(FitError::Singular);
    }
    let eps = max_sv * 1e-10;
    if svd.rank(eps) < k {
        return Err(FitError::Singular);
    }

    let beta = svd
        .solve(&b, eps)
        .map_err(|e| FitError::Numerical(e.to_string()))?;
    let coeffs: Vec<f64> = beta.iter().copied().collect();
    if coeffs.iter().any(|c| !c.is_finite()) {
        return Err(FitError::Numerical("回归系数非有限".to_string()));
    }
    Ok(coeffs)
}
