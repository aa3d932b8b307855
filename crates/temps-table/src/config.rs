use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_QUERY_LIMIT: u64 = 100_000;
const QUERY_LIMIT_ENV: &str = "TEMPS_TABLE_QUERY_LIMIT";

fn default_query_limit() -> u64 {
    DEFAULT_QUERY_LIMIT
}

fn default_log_missing() -> bool {
    true
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Maximum rows an unpaged query may return
    #[serde(default = "default_query_limit")]
    pub query_limit: u64,
    /// Log outbound link values that could not be resolved
    #[serde(default = "default_log_missing")]
    pub link_lookup_log_missing: bool,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            query_limit: default_query_limit(),
            link_lookup_log_missing: default_log_missing(),
        }
    }
}

impl TableConfig {
    /// Defaults overridden by `TEMPS_TABLE_QUERY_LIMIT` when set
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(QUERY_LIMIT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(limit) if limit > 0 => config.query_limit = limit,
                _ => warn!("Ignoring invalid {}: {}", QUERY_LIMIT_ENV, raw),
            }
        }
        config
    }
}
