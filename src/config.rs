use crate::cli::Args;
use crate::error::Result;
use crate::mode::Mode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

pub const DEFAULT_MAX_PRODUCTS: usize = 50;

/// Input of a single run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunConfig {
    pub keyword: String,
    pub max_products: usize,
    pub category: String,
    pub full_index: bool,
    pub update_only: bool,
    pub search_only: bool,
    pub save_to_cache: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            keyword: String::new(),
            max_products: DEFAULT_MAX_PRODUCTS,
            category: String::new(),
            full_index: false,
            update_only: false,
            search_only: false,
            save_to_cache: true,
        }
    }
}

impl RunConfig {
    /// Coerce an arbitrary JSON input into a config. Never fails.
    ///
    /// A bare string is taken as the keyword. Objects are read field by
    /// field so one badly typed value only resets that field to its default.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(keyword) => RunConfig {
                keyword,
                ..RunConfig::default()
            },
            Value::Object(map) => match serde_json::from_value(Value::Object(map.clone())) {
                Ok(config) => config,
                Err(e) => {
                    warn!("Input does not match the expected shape ({}), coercing field by field", e);
                    Self::from_map(&map)
                }
            },
            Value::Null => RunConfig::default(),
            other => {
                warn!("Ignoring input of unexpected shape: {}", other);
                RunConfig::default()
            }
        }
    }

    fn from_map(map: &Map<String, Value>) -> Self {
        let mut config = RunConfig::default();

        if let Some(keyword) = map.get("keyword").and_then(coerce_string) {
            config.keyword = keyword;
        }
        if let Some(category) = map.get("category").and_then(coerce_string) {
            config.category = category;
        }
        if let Some(max) = map.get("maxProducts").and_then(coerce_usize) {
            config.max_products = max;
        }
        if let Some(flag) = map.get("fullIndex").and_then(coerce_bool) {
            config.full_index = flag;
        }
        if let Some(flag) = map.get("updateOnly").and_then(coerce_bool) {
            config.update_only = flag;
        }
        if let Some(flag) = map.get("searchOnly").and_then(coerce_bool) {
            config.search_only = flag;
        }
        if let Some(flag) = map.get("saveToCache").and_then(coerce_bool) {
            config.save_to_cache = flag;
        }

        config
    }

    /// Build the config from the command line, layering explicit flags over
    /// the `--input` document when one is given.
    pub fn from_args(args: &Args) -> Result<Self> {
        let mut config = match &args.input {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                let value = serde_json::from_str(&raw).unwrap_or_else(|_| {
                    // Not JSON at all: treat the whole document as the keyword
                    Value::String(raw.trim().to_string())
                });
                RunConfig::from_value(value)
            }
            None => RunConfig::default(),
        };

        if let Some(keyword) = &args.keyword {
            config.keyword = keyword.clone();
        }
        if let Some(max) = args.max_products {
            config.max_products = max;
        }
        if let Some(category) = &args.category {
            config.category = category.clone();
        }
        config.full_index |= args.full_index;
        config.update_only |= args.update_only;
        config.search_only |= args.search_only;
        if args.no_cache_merge {
            config.save_to_cache = false;
        }

        Ok(config)
    }

    pub fn mode(&self) -> Mode {
        Mode::select(self)
    }
}

fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn coerce_usize(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serde_json::json;

    #[test]
    fn test_bare_string_becomes_keyword() {
        let config = RunConfig::from_value(json!("veggfeste"));
        assert_eq!(config.keyword, "veggfeste");
        assert_eq!(config.max_products, DEFAULT_MAX_PRODUCTS);
        assert!(config.save_to_cache);
    }

    #[test]
    fn test_object_with_defaults() {
        let config = RunConfig::from_value(json!({"keyword": "drill", "maxProducts": 5}));
        assert_eq!(config.keyword, "drill");
        assert_eq!(config.max_products, 5);
        assert_eq!(config.category, "");
        assert!(!config.full_index);
    }

    #[test]
    fn test_badly_typed_field_is_coerced() {
        let config = RunConfig::from_value(json!({
            "keyword": "drill",
            "maxProducts": "7",
            "searchOnly": "yes",
            "fullIndex": [1, 2]
        }));
        assert_eq!(config.keyword, "drill");
        assert_eq!(config.max_products, 7);
        assert!(config.search_only);
        assert!(!config.full_index);
    }

    #[test]
    fn test_other_shapes_default() {
        assert_eq!(RunConfig::from_value(Value::Null), RunConfig::default());
        assert_eq!(RunConfig::from_value(json!(42)), RunConfig::default());
        assert_eq!(RunConfig::from_value(json!([1])), RunConfig::default());
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::parse_from([
            "jula-scraper",
            "--keyword",
            "hylle",
            "--max-products",
            "3",
            "--update-only",
            "--no-cache-merge",
        ]);
        let config = RunConfig::from_args(&args).unwrap();
        assert_eq!(config.keyword, "hylle");
        assert_eq!(config.max_products, 3);
        assert!(config.update_only);
        assert!(!config.save_to_cache);
    }
}
