// ==========================================
// 数值工具
// ==========================================

/// 四舍五入到 dp 位小数（对外输出统一口径）
pub fn round_dp(value: f64, dp: i32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10f64.powi(dp);
    (value * factor).round() / factor
}

/// 有限且非负
pub fn is_non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}
