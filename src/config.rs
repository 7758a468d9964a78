use serde::{Deserialize, Serialize};

use crate::error::LineageError;

/// Default worker pool size.
pub const DEFAULT_POOL_SIZE: usize = 6;
/// Default bound for the task queue and each fact channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Run-wide settings shared read-only by every worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LineageConfig {
    /// Database whose three-part names collapse to the bare table name.
    pub home_database: String,
    /// Number of parallel workers.
    pub pool_size: usize,
    /// Capacity of the task queue and of each fact channel.
    pub channel_capacity: usize,
    /// Prefix marking temp tables, which are never reported.
    pub temp_table_prefix: String,
    /// Wildcard marker recognized in portfolio literals.
    pub wildcard: char,
    /// Recover events from unparseable batches by scanning their tokens.
    pub tolerant_recovery: bool,
}

impl Default for LineageConfig {
    fn default() -> Self {
        Self {
            home_database: "BRS".to_string(),
            pool_size: DEFAULT_POOL_SIZE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            temp_table_prefix: "#".to_string(),
            wildcard: '%',
            tolerant_recovery: true,
        }
    }
}

impl LineageConfig {
    /// Load settings from JSON; absent fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, LineageError> {
        let parsed: Self = serde_json::from_str(json)
            .map_err(|e| LineageError::Config(format!("invalid config JSON: {e}")))?;
        parsed.validated()
    }

    /// Override the home database. Stored uppercased, as it is compared
    /// against uppercased segments.
    pub fn with_home_database(mut self, database: &str) -> Self {
        self.home_database = database.trim().to_uppercase();
        self
    }

    /// Override the worker pool size.
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Check invariants and canonicalize the home database casing.
    pub fn validated(mut self) -> Result<Self, LineageError> {
        if self.pool_size == 0 {
            return Err(LineageError::Config(
                "pool_size must be at least 1".to_string(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(LineageError::Config(
                "channel_capacity must be at least 1".to_string(),
            ));
        }
        if self.home_database.trim().is_empty() {
            return Err(LineageError::Config(
                "home_database must not be empty".to_string(),
            ));
        }
        if self.temp_table_prefix.is_empty() {
            return Err(LineageError::Config(
                "temp_table_prefix must not be empty".to_string(),
            ));
        }
        self.home_database = self.home_database.trim().to_uppercase();
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = LineageConfig::from_json(r#"{"home_database": "risk", "pool_size": 2}"#)
            .expect("config should parse");
        assert_eq!(config.home_database, "RISK");
        assert_eq!(config.pool_size, 2);
        assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(config.wildcard, '%');
        assert!(config.tolerant_recovery);
    }

    #[test]
    fn zero_pool_size_is_rejected() {
        let err = LineageConfig::from_json(r#"{"pool_size": 0}"#).expect_err("should reject");
        assert!(err.to_string().contains("pool_size"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = LineageConfig::from_json(r#"{"workers": 3}"#).expect_err("should reject");
        assert!(err.to_string().contains("invalid config JSON"));
    }
}
