use std::fmt;

use serde::{Serialize, Serializer};

/// An aggregate that may be undefined. Reports carry the reason instead of NaN/Inf.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Stat {
    Value(f64),
    #[default]
    InsufficientData,
    NotApplicable,
}

impl Stat {
    /// Non-finite inputs collapse to `InsufficientData`.
    pub fn from_f64(v: f64) -> Self {
        if v.is_finite() {
            Stat::Value(v)
        } else {
            Stat::InsufficientData
        }
    }

    pub fn from_option(v: Option<f64>) -> Self {
        match v {
            Some(v) => Stat::from_f64(v),
            None => Stat::InsufficientData,
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Stat::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_value(self) -> bool {
        matches!(self, Stat::Value(_))
    }

    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Stat {
        match self {
            Stat::Value(v) => Stat::from_f64(f(v)),
            other => other,
        }
    }
}

impl From<Option<f64>> for Stat {
    fn from(v: Option<f64>) -> Self {
        Stat::from_option(v)
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stat::Value(v) => write!(f, "{}", round4(*v)),
            Stat::InsufficientData => f.write_str("insufficient data"),
            Stat::NotApplicable => f.write_str("n/a"),
        }
    }
}

impl Serialize for Stat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Stat::Value(v) if v.is_finite() => serializer.serialize_f64(round4(*v)),
            Stat::Value(_) | Stat::InsufficientData => serializer.serialize_str("insufficient data"),
            Stat::NotApplicable => serializer.serialize_str("n/a"),
        }
    }
}

pub fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1).
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    let var = values
        .iter()
        .map(|v| {
            let d = v - mean;
            d * d
        })
        .sum::<f64>()
        / (values.len() as f64 - 1.0);
    Some(var.sqrt())
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// Linear-interpolated quantile over a copy of `values`.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

pub fn min(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

/// Coefficient of variation; undefined for a zero mean.
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let s = std_dev(values)?;
    if m.abs() <= 1e-9 {
        return None;
    }
    Some(s / m)
}

pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mx = mean(xs)?;
    let my = mean(ys)?;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mx;
        let dy = y - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= 1e-12 || syy <= 1e-12 {
        return None;
    }
    Some(sxy / (sxx.sqrt() * syy.sqrt()))
}

/// Cohen's d with pooled standard deviation.
pub fn cohens_d(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() < 2 || b.len() < 2 {
        return None;
    }
    let sa = std_dev(a)?;
    let sb = std_dev(b)?;
    let na = a.len() as f64;
    let nb = b.len() as f64;
    let pooled = (((na - 1.0) * sa * sa + (nb - 1.0) * sb * sb) / (na + nb - 2.0)).sqrt();
    if pooled <= 1e-12 {
        return None;
    }
    Some((mean(a)? - mean(b)?) / pooled)
}

pub fn mean_stat(values: &[f64]) -> Stat {
    Stat::from_option(mean(values))
}

pub fn median_stat(values: &[f64]) -> Stat {
    Stat::from_option(median(values))
}

pub fn std_stat(values: &[f64]) -> Stat {
    Stat::from_option(std_dev(values))
}

/// Divides when the denominator is usable; the stat is not applicable otherwise.
pub fn ratio_stat(num: f64, den: f64) -> Stat {
    if den.abs() <= 1e-12 {
        Stat::NotApplicable
    } else {
        Stat::from_f64(num / den)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantile_interpolates() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(median(&v), Some(2.5));
        assert_eq!(quantile(&v, 0.25), Some(1.75));
        assert_eq!(quantile(&v, 1.0), Some(4.0));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn std_requires_two_points() {
        assert_eq!(std_dev(&[5.0]), None);
        let s = std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((s - 2.138089935).abs() < 1e-6);
    }

    #[test]
    fn pearson_handles_degenerate_inputs() {
        assert_eq!(pearson(&[1.0], &[2.0]), None);
        assert_eq!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), None);
        let r = pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap();
        assert!((r - 1.0).abs() < 1e-12);
        let r = pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).unwrap();
        assert!((r + 1.0).abs() < 1e-12);
    }

    #[test]
    fn cohens_d_uses_pooled_sd() {
        let d = cohens_d(&[2.0, 4.0], &[0.0, 2.0]).unwrap();
        // pooled sd = sqrt(2), mean diff = 2
        assert!((d - 2.0 / 2f64.sqrt()).abs() < 1e-12);
        assert_eq!(cohens_d(&[1.0], &[1.0, 2.0]), None);
    }

    #[test]
    fn stat_never_serializes_non_finite() {
        let json = serde_json::to_string(&vec![
            Stat::from_f64(f64::NAN),
            Stat::from_f64(f64::INFINITY),
            Stat::Value(1.23456),
            Stat::NotApplicable,
        ])
        .unwrap();
        assert_eq!(json, r#"["insufficient data","insufficient data",1.2346,"n/a"]"#);
    }

    #[test]
    fn ratio_stat_guards_zero_denominator() {
        assert_eq!(ratio_stat(10.0, 0.0), Stat::NotApplicable);
        assert_eq!(ratio_stat(10.0, 4.0), Stat::Value(2.5));
    }
}
