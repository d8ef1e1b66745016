//! Parsing of the metrics document a candidate prints on success.
//!
//! Candidates print a flat YAML mapping such as
//!
//! ```text
//! GStencils/sec: 41.2
//! CPU Elapsed: 0.91
//! Elapsed: 0.87
//! ```
//!
//! Anything that is not such a mapping, lacks a configured key, or carries
//! a value that is not a finite number is rejected outright.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MetricsError {
    #[error("candidate output is not a metrics document: {0}")]
    Malformed(String),

    #[error("candidate output is not a key/value document")]
    NotAMapping,

    #[error("metric '{0}' missing from candidate output")]
    Missing(String),

    #[error("metric '{key}' is not a finite number: {value}")]
    NotNumeric { key: String, value: String },
}

impl From<serde_yaml::Error> for MetricsError {
    fn from(err: serde_yaml::Error) -> Self {
        MetricsError::Malformed(err.to_string())
    }
}

/// Which document keys hold which metric, and how the CSV columns are named.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricKeys {
    /// Total elapsed time including host-side work.
    pub elapsed: String,
    /// Kernel-only elapsed time. When absent, `elapsed` stands in for it.
    pub compute_elapsed: Option<String>,
    pub throughput: String,
    pub throughput_column: String,
    pub elapsed_column: String,
}

impl MetricKeys {
    pub fn tile_search() -> Self {
        Self {
            elapsed: "CPU Elapsed".into(),
            compute_elapsed: Some("Elapsed".into()),
            throughput: "GStencils/sec".into(),
            throughput_column: "gstencils".into(),
            elapsed_column: "cpu_elapsed".into(),
        }
    }

    pub fn cpu() -> Self {
        Self {
            elapsed: "Elapsed".into(),
            compute_elapsed: None,
            throughput: "GFlops".into(),
            throughput_column: "gflops".into(),
            elapsed_column: "elapsed".into(),
        }
    }

    /// Read throughput from `key` instead, keeping the column name in sync.
    pub fn with_throughput_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.throughput_column = column_name(&key);
        self.throughput = key;
        self
    }

    pub fn columns(&self) -> [&str; 3] {
        [
            self.throughput_column.as_str(),
            self.elapsed_column.as_str(),
            "compute_elapsed",
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub elapsed: f64,
    pub compute_elapsed: f64,
    pub throughput: f64,
}

pub fn parse_metrics(text: &str, keys: &MetricKeys) -> Result<Metrics, MetricsError> {
    if text.trim().is_empty() {
        return Err(MetricsError::NotAMapping);
    }
    let document: Value = serde_yaml::from_str(text)?;
    let Value::Mapping(map) = document else {
        return Err(MetricsError::NotAMapping);
    };

    let lookup = |key: &str| -> Result<f64, MetricsError> {
        let value = map
            .get(key)
            .ok_or_else(|| MetricsError::Missing(key.to_string()))?;
        coerce(key, value)
    };

    let elapsed = lookup(&keys.elapsed)?;
    let compute_elapsed = match &keys.compute_elapsed {
        Some(key) => lookup(key)?,
        None => elapsed,
    };
    let throughput = lookup(&keys.throughput)?;

    Ok(Metrics {
        elapsed,
        compute_elapsed,
        throughput,
    })
}

fn coerce(key: &str, value: &Value) -> Result<f64, MetricsError> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    number
        .filter(|n| n.is_finite())
        .ok_or_else(|| MetricsError::NotNumeric {
            key: key.to_string(),
            value: serde_yaml::to_string(value)
                .map(|s| s.trim_end().to_string())
                .unwrap_or_else(|_| format!("{value:?}")),
        })
}

fn column_name(key: &str) -> String {
    let mut name = String::with_capacity(key.len());
    for ch in key.chars() {
        if ch.is_ascii_alphanumeric() {
            name.push(ch.to_ascii_lowercase());
        } else if !name.ends_with('_') {
            name.push('_');
        }
    }
    name.trim_matches('_').to_string()
}
