//! 配置解析
//!
//! 支持 TOML（主要）和 JSON 格式。

use contracts::{ContractError, StreamConfig};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (recommended)
    Toml,
    /// JSON
    Json,
}

impl ConfigFormat {
    /// Infer format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub fn parse_toml(content: &str) -> Result<StreamConfig, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

pub fn parse_json(content: &str) -> Result<StreamConfig, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

pub fn parse(content: &str, format: ConfigFormat) -> Result<StreamConfig, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{FilterOp, SourceKind};

    #[test]
    fn test_parse_toml_sources_and_rules() {
        let content = r#"
buffer_size = 500
batch_size = 50

[[sources]]
name = "clicks"
kind = "synthetic"
target = "user_events"
interval = 0.5
params = { records_per_tick = "3" }

[[sources]]
name = "orders"
kind = "db"
target = "/var/lib/shop/orders.db"

[processor]
tracked_metrics = ["value", "temperature"]

[[processor.filters]]
field = "event_type"
op = "ne"
value = "signup"
"#;
        let config = parse_toml(content).unwrap();
        assert_eq!(config.buffer_size, 500);
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].kind, SourceKind::Synthetic);
        assert_eq!(config.sources[0].params["records_per_tick"], "3");
        assert_eq!(config.sources[1].interval, 1.0);
        assert_eq!(config.processor.filters[0].op, FilterOp::Ne);
        assert_eq!(config.processor.window_size, 20);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "sources": [{ "name": "tail", "kind": "file", "target": "/tmp/app.log" }]
        }"#;
        let config = parse_json(content).unwrap();
        assert_eq!(config.sources[0].kind, SourceKind::File);
        assert_eq!(config.max_connections, 100);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let result = parse_toml("invalid toml [[[");
        assert!(matches!(result, Err(ContractError::ConfigParse { .. })));
    }

    #[test]
    fn test_unknown_source_kind() {
        let content = r#"
[[sources]]
name = "x"
kind = "mqtt"
target = "broker:1883"
"#;
        assert!(parse_toml(content).is_err());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
