//! Engine configuration

use chrono::NaiveDateTime;
use serde::Deserialize;
use std::env;
use tbl_core::DEFAULT_PRECISION;
use thiserror::Error;

/// Default limit on nested FormulaRef resolution
pub const DEFAULT_MAX_DEPTH: usize = 20;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got '{value}'")]
    InvalidInteger { name: &'static str, value: String },

    #[error("{name} must be true or false, got '{value}'")]
    InvalidFlag { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Significant digits for irrational results
    pub precision: u32,
    /// Maximum FormulaRef nesting, the root formula included
    pub max_depth: usize,
    /// Fixed clock for NOW()/TODAY(); `None` reads the local clock per run
    pub now: Option<NaiveDateTime>,
    /// Log structural warnings found before evaluation at warn level
    pub strict_alternation: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            precision: DEFAULT_PRECISION as u32,
            max_depth: DEFAULT_MAX_DEPTH,
            now: None,
            strict_alternation: false,
        }
    }
}

impl EngineConfig {
    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = Some(now);
        self
    }

    pub fn with_strict_alternation(mut self, strict: bool) -> Self {
        self.strict_alternation = strict;
        self
    }

    /// Defaults overridden by `TBL_FORMULA_PRECISION`, `TBL_FORMULA_MAX_DEPTH`
    /// and `TBL_FORMULA_STRICT`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(raw) = get("TBL_FORMULA_PRECISION") {
            config.precision = positive("TBL_FORMULA_PRECISION", &raw)? as u32;
        }
        if let Some(raw) = get("TBL_FORMULA_MAX_DEPTH") {
            config.max_depth = positive("TBL_FORMULA_MAX_DEPTH", &raw)?;
        }
        if let Some(raw) = get("TBL_FORMULA_STRICT") {
            config.strict_alternation = match raw.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                _ => return Err(ConfigError::InvalidFlag { name: "TBL_FORMULA_STRICT", value: raw }),
            };
        }
        Ok(config)
    }
}

fn positive(name: &'static str, raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n as usize),
        _ => Err(ConfigError::InvalidInteger { name, value: raw.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_map(pairs: &[(&str, &str)]) -> Result<EngineConfig, ConfigError> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        EngineConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = from_map(&[]).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.max_depth, 20);
        assert_eq!(config.precision, 50);
    }

    #[test]
    fn test_overrides() {
        let config = from_map(&[
            ("TBL_FORMULA_PRECISION", "30"),
            ("TBL_FORMULA_MAX_DEPTH", " 5 "),
            ("TBL_FORMULA_STRICT", "yes"),
        ]).unwrap();
        assert_eq!(config.precision, 30);
        assert_eq!(config.max_depth, 5);
        assert!(config.strict_alternation);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: EngineConfig = serde_json::from_value(serde_json::json!({
            "maxDepth": 8,
            "now": "2024-03-01T09:00:00"
        })).unwrap();
        assert_eq!(config.max_depth, 8);
        assert_eq!(config.precision, 50);
        assert!(config.now.is_some());
    }

    #[test]
    fn test_invalid_values() {
        assert_eq!(
            from_map(&[("TBL_FORMULA_MAX_DEPTH", "0")]),
            Err(ConfigError::InvalidInteger { name: "TBL_FORMULA_MAX_DEPTH", value: "0".into() })
        );
        assert!(from_map(&[("TBL_FORMULA_STRICT", "maybe")]).is_err());
    }
}
