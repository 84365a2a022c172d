use crate::model::{Grade, Stats};

/// Below this attendance percentage a student is highlighted on the roster.
pub const LOW_ATTENDANCE_PCT: i64 = 15;
/// Risk policy: attendance strictly below 85% AND average strictly below 7.
pub const RISK_ATTENDANCE_PCT: i64 = 85;
pub const RISK_GRADE_AVERAGE: f64 = 7.0;

/// `round(100 * present / (present + absent))`, 0 for an empty denominator.
/// `later` marks never enter the denominator; a late arrival already counted
/// one presence when it was reclassified.
pub fn attendance_percentage(stats: &Stats) -> i64 {
    let denom = stats.present + stats.absent;
    if denom == 0 {
        return 0;
    }
    ((stats.present as f64 / denom as f64) * 100.0).round() as i64
}

/// Grade values coming out of imported documents may be strings or garbage;
/// only finite numbers participate in the average.
pub fn numeric_grade_value(value: &serde_json::Value) -> Option<f64> {
    let v = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

/// Mean of the numeric grade values, rounded to 2 decimals. 0.0 when the
/// list is empty or contains nothing numeric.
pub fn grade_average(grades: &[Grade]) -> f64 {
    let nums: Vec<f64> = grades
        .iter()
        .filter_map(|g| numeric_grade_value(&g.value))
        .collect();
    if nums.is_empty() {
        return 0.0;
    }
    let mean = nums.iter().sum::<f64>() / nums.len() as f64;
    (mean * 100.0).round() / 100.0
}

pub fn is_low_attendance(pct: i64) -> bool {
    pct < LOW_ATTENDANCE_PCT
}

pub fn is_at_risk(pct: i64, average: f64) -> bool {
    pct < RISK_ATTENDANCE_PCT && average < RISK_GRADE_AVERAGE
}
