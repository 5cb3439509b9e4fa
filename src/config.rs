//! Open-time configuration of relation managers.
//!
//! A [`BddConfig`] is read once, when a relation is opened, and decides how
//! its private manager is sized and how the variable order is laid out.

use std::env;
use std::str::FromStr;

use log::warn;

/// Boolean-function backend used by relation managers.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum Backend {
    /// The in-crate hash-consed manager.
    #[default]
    Native,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "native" => Ok(Backend::Native),
            other => Err(format!("unknown BDD backend '{}'", other)),
        }
    }
}

/// Sizing and ordering options for a relation manager.
///
/// # Examples
///
/// ```
/// use bdd_rel::config::BddConfig;
///
/// let config = BddConfig {
///     reverse_order: true,
///     ..BddConfig::default()
/// };
/// assert_eq!(config.node_table_bits, 16);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BddConfig {
    /// Initial node table size is `2^node_table_bits` (default: 16).
    pub node_table_bits: usize,
    /// Operation cache size is `2^cache_bits` (default: 14).
    pub cache_bits: usize,
    /// The node table doubles once fewer than this fraction of cells is free
    /// (default: 0.2).
    pub min_free: f64,
    /// Order each slot's bits least-significant first (default: false).
    pub reverse_order: bool,
    /// Boolean-function backend (default: native).
    pub backend: Backend,
}

impl Default for BddConfig {
    fn default() -> Self {
        Self {
            node_table_bits: 16,
            cache_bits: 14,
            min_free: 0.2,
            reverse_order: false,
            backend: Backend::Native,
        }
    }
}

impl BddConfig {
    /// Defaults overridden by `BDD_NODE_TABLE_BITS`, `BDD_CACHE_BITS`,
    /// `BDD_MIN_FREE`, `BDD_REVERSE_ORDER` and `BDD_BACKEND`.
    ///
    /// Unparsable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        read_into(&lookup, "BDD_NODE_TABLE_BITS", &mut config.node_table_bits);
        read_into(&lookup, "BDD_CACHE_BITS", &mut config.cache_bits);
        read_into(&lookup, "BDD_MIN_FREE", &mut config.min_free);
        read_into(&lookup, "BDD_REVERSE_ORDER", &mut config.reverse_order);
        read_into(&lookup, "BDD_BACKEND", &mut config.backend);

        if config.node_table_bits > 31 {
            warn!("BDD_NODE_TABLE_BITS={} is too large, clamping to 31", config.node_table_bits);
            config.node_table_bits = 31;
        }
        if config.cache_bits > 31 {
            warn!("BDD_CACHE_BITS={} is too large, clamping to 31", config.cache_bits);
            config.cache_bits = 31;
        }
        if !(0.0..1.0).contains(&config.min_free) {
            warn!("BDD_MIN_FREE={} is out of range, using default", config.min_free);
            config.min_free = Self::default().min_free;
        }
        config
    }
}

fn read_into<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T)
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(key) {
        match raw.trim().parse() {
            Ok(value) => *slot = value,
            Err(e) => warn!("Ignoring {}={:?}: {}", key, raw, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use test_log::test;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        assert_eq!(BddConfig::from_lookup(lookup(&[])), BddConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = BddConfig::from_lookup(lookup(&[
            ("BDD_NODE_TABLE_BITS", "12"),
            ("BDD_CACHE_BITS", "10"),
            ("BDD_MIN_FREE", "0.5"),
            ("BDD_REVERSE_ORDER", "true"),
            ("BDD_BACKEND", "Native"),
        ]));
        assert_eq!(config.node_table_bits, 12);
        assert_eq!(config.cache_bits, 10);
        assert_eq!(config.min_free, 0.5);
        assert!(config.reverse_order);
        assert_eq!(config.backend, Backend::Native);
    }

    #[test]
    fn test_bad_values_are_ignored() {
        let config = BddConfig::from_lookup(lookup(&[
            ("BDD_NODE_TABLE_BITS", "lots"),
            ("BDD_MIN_FREE", "1.5"),
            ("BDD_BACKEND", "cudd"),
        ]));
        assert_eq!(config, BddConfig::default());
    }

    #[test]
    fn test_backend_names() {
        assert_eq!("native".parse::<Backend>(), Ok(Backend::Native));
        assert!("java".parse::<Backend>().is_err());
        assert!("rust".parse::<Backend>().is_err());
    }
}
