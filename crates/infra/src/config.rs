//! Engine configuration.

use std::str::FromStr;

use tracing::warn;

use orderflow_orders::MAX_ORDER_LINES;

pub const ENV_INTERNAL_CHANNEL: &str = "ORDERFLOW_INTERNAL_CHANNEL";
pub const ENV_MAX_ORDER_LINES: &str = "ORDERFLOW_MAX_ORDER_LINES";
pub const ENV_MAX_CONFLICT_RETRIES: &str = "ORDERFLOW_MAX_CONFLICT_RETRIES";

/// Workflow configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Name of the channel orders created through `create_order` belong to.
    pub internal_channel: String,
    /// Upper bound on lines per order.
    pub max_order_lines: usize,
    /// How many times a write that lost an optimistic check is recomputed.
    pub max_conflict_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            internal_channel: "INTERNAL".to_string(),
            max_order_lines: MAX_ORDER_LINES,
            max_conflict_retries: 3,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `ORDERFLOW_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`EngineConfig::from_env`], reading values through `lookup`.
    ///
    /// Unparseable or out-of-range values keep the default and log a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(name) = lookup(ENV_INTERNAL_CHANNEL) {
            let name = name.trim();
            if name.is_empty() {
                warn!(var = ENV_INTERNAL_CHANNEL, "empty channel name, keeping default");
            } else {
                config.internal_channel = name.to_string();
            }
        }
        if let Some(max) = parse_var::<usize>(&lookup, ENV_MAX_ORDER_LINES) {
            if max == 0 {
                warn!(var = ENV_MAX_ORDER_LINES, "must be positive, keeping default");
            } else {
                config.max_order_lines = max;
            }
        }
        if let Some(retries) = parse_var::<u32>(&lookup, ENV_MAX_CONFLICT_RETRIES) {
            config.max_conflict_retries = retries;
        }

        config
    }

    pub fn with_internal_channel(mut self, name: impl Into<String>) -> Self {
        self.internal_channel = name.into();
        self
    }

    pub fn with_max_order_lines(mut self, max: usize) -> Self {
        self.max_order_lines = max;
        self
    }

    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(var = key, value = %raw, "invalid value, keeping default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        assert_eq!(EngineConfig::from_lookup(lookup(&[])), EngineConfig::default());
        assert_eq!(EngineConfig::default().max_order_lines, 1000);
    }

    #[test]
    fn variables_override_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[
            (ENV_INTERNAL_CHANNEL, " WEBSHOP "),
            (ENV_MAX_ORDER_LINES, "50"),
            (ENV_MAX_CONFLICT_RETRIES, "0"),
        ]));

        assert_eq!(config.internal_channel, "WEBSHOP");
        assert_eq!(config.max_order_lines, 50);
        assert_eq!(config.max_conflict_retries, 0);
    }

    #[test]
    fn bad_values_keep_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[
            (ENV_INTERNAL_CHANNEL, "   "),
            (ENV_MAX_ORDER_LINES, "0"),
            (ENV_MAX_CONFLICT_RETRIES, "many"),
        ]));

        assert_eq!(config, EngineConfig::default());
    }
}
