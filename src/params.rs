//! Free-form module parameters with typed, defaulted accessors.

use std::collections::BTreeMap;

/// Parameter map for one module, as written in the configuration document.
pub type Params = BTreeMap<String, toml::Value>;

/// Build a parameter map from `(key, value)` pairs.
pub fn params<I, K, V>(entries: I) -> Params
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<toml::Value>,
{
    entries
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Overlay `overrides` on top of `defaults`.
pub fn merge(defaults: &Params, overrides: &Params) -> Params {
    let mut merged = defaults.clone();
    merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Float parameter. Integers are accepted and widened.
pub fn param_f64(p: &Params, key: &str, default: f64) -> f64 {
    match p.get(key) {
        Some(toml::Value::Float(f)) => *f,
        Some(toml::Value::Integer(i)) => *i as f64,
        _ => default,
    }
}

/// Non-negative integer parameter. Negative values clamp to zero.
pub fn param_usize(p: &Params, key: &str, default: usize) -> usize {
    match p.get(key) {
        Some(toml::Value::Integer(i)) => (*i).max(0) as usize,
        Some(toml::Value::Float(f)) if f.is_finite() => f.max(0.0) as usize,
        _ => default,
    }
}

pub fn param_u64(p: &Params, key: &str, default: u64) -> u64 {
    match p.get(key) {
        Some(toml::Value::Integer(i)) => (*i).max(0) as u64,
        _ => default,
    }
}

pub fn param_bool(p: &Params, key: &str, default: bool) -> bool {
    match p.get(key) {
        Some(toml::Value::Boolean(b)) => *b,
        _ => default,
    }
}

pub fn param_str<'a>(p: &'a Params, key: &str) -> Option<&'a str> {
    p.get(key).and_then(toml::Value::as_str)
}

/// List of floats; non-numeric entries are skipped.
pub fn param_f64_list(p: &Params, key: &str, default: &[f64]) -> Vec<f64> {
    match p.get(key) {
        Some(toml::Value::Array(items)) => items
            .iter()
            .filter_map(|v| match v {
                toml::Value::Float(f) => Some(*f),
                toml::Value::Integer(i) => Some(*i as f64),
                _ => None,
            })
            .collect(),
        _ => default.to_vec(),
    }
}
