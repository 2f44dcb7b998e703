//! Configuration checks
//!
//! Rules:
//! - field ranges (`validator` derive on the contracts)
//! - source names unique
//! - source targets well-formed for their kind
//! - `min_samples <= window_size`
//! - filter/threshold rules name a field, threshold bands are ordered

use std::collections::HashSet;
use std::net::SocketAddr;

use contracts::{is_identifier, ContractError, FilterOp, SourceKind, StreamConfig};
use validator::{Validate, ValidationErrors};

/// Validate a parsed `StreamConfig`
///
/// Returns the first error encountered. An empty source list is accepted
/// here; `start` rejects it.
pub fn validate(config: &StreamConfig) -> Result<(), ContractError> {
    config.validate().map_err(|e| from_validation_errors(&e))?;
    validate_source_names(config)?;
    validate_source_targets(config)?;
    validate_window(config)?;
    validate_rules(config)?;
    Ok(())
}

fn from_validation_errors(errors: &ValidationErrors) -> ContractError {
    let first = errors.field_errors().into_iter().find_map(|(field, errs)| {
        errs.first().map(|err| {
            let message = err
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| err.code.to_string());
            (field.to_string(), message)
        })
    });

    match first {
        Some((field, message)) => ContractError::config_validation(field, message),
        // Nested failures (sources/processor/health) only render via Display
        None => ContractError::config_validation("config", errors.to_string()),
    }
}

fn validate_source_names(config: &StreamConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for source in &config.sources {
        if !seen.insert(source.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sources[name={}]", source.name),
                "duplicate source name",
            ));
        }
    }
    Ok(())
}

fn validate_source_targets(config: &StreamConfig) -> Result<(), ContractError> {
    for source in &config.sources {
        let field = format!("sources[{}].target", source.name);
        match source.kind {
            SourceKind::Api => {
                if !(source.target.starts_with("http://") || source.target.starts_with("https://"))
                {
                    return Err(ContractError::config_validation(
                        field,
                        format!("api target must be an http(s) URL, got '{}'", source.target),
                    ));
                }
            }
            SourceKind::Iot => {
                if source.target.parse::<SocketAddr>().is_err() {
                    return Err(ContractError::config_validation(
                        field,
                        format!("iot target must be a bind address, got '{}'", source.target),
                    ));
                }
            }
            SourceKind::Db => {
                if let Some(table) = source.params.get("table") {
                    if !is_identifier(table) {
                        return Err(ContractError::config_validation(
                            format!("sources[{}].params.table", source.name),
                            format!("'{table}' is not a valid table name"),
                        ));
                    }
                }
            }
            SourceKind::File | SourceKind::Synthetic => {}
        }
    }
    Ok(())
}

fn validate_window(config: &StreamConfig) -> Result<(), ContractError> {
    let processor = &config.processor;
    if processor.min_samples > processor.window_size {
        return Err(ContractError::config_validation(
            "processor.min_samples / processor.window_size",
            format!(
                "min_samples ({}) must be <= window_size ({})",
                processor.min_samples, processor.window_size
            ),
        ));
    }
    if let Some(idx) = processor.tracked_metrics.iter().position(|m| m.is_empty()) {
        return Err(ContractError::config_validation(
            format!("processor.tracked_metrics[{idx}]"),
            "metric name cannot be empty",
        ));
    }
    Ok(())
}

fn validate_rules(config: &StreamConfig) -> Result<(), ContractError> {
    let processor = &config.processor;

    for (idx, rule) in processor.filters.iter().enumerate() {
        if rule.field.is_empty() {
            return Err(ContractError::config_validation(
                format!("processor.filters[{idx}].field"),
                "filter field cannot be empty",
            ));
        }
        let ordered = matches!(
            rule.op,
            FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte
        );
        if ordered && !rule.value.is_number() {
            return Err(ContractError::config_validation(
                format!("processor.filters[{idx}].value"),
                format!("operator {:?} needs a numeric operand", rule.op),
            ));
        }
    }

    for (idx, rule) in processor.thresholds.iter().enumerate() {
        if rule.field.is_empty() {
            return Err(ContractError::config_validation(
                format!("processor.thresholds[{idx}].field"),
                "threshold field cannot be empty",
            ));
        }
        match (rule.min, rule.max) {
            (None, None) => {
                return Err(ContractError::config_validation(
                    format!("processor.thresholds[{idx}]"),
                    "threshold needs min or max",
                ));
            }
            (Some(min), Some(max)) if min > max => {
                return Err(ContractError::config_validation(
                    format!("processor.thresholds[{idx}]"),
                    format!("min ({min}) must be <= max ({max})"),
                ));
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{FilterRule, SourceConfig, ThresholdRule};
    use serde_json::json;

    fn minimal_config() -> StreamConfig {
        let mut config = StreamConfig::default();
        config.sources.push(SourceConfig::new(
            "clicks",
            SourceKind::Synthetic,
            "user_events",
        ));
        config
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&minimal_config()).is_ok());
    }

    #[test]
    fn test_no_sources_is_accepted() {
        assert!(validate(&StreamConfig::default()).is_ok());
    }

    #[test]
    fn test_range_violation_names_field() {
        let mut config = minimal_config();
        config.batch_size = 0;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("batch_size"), "got: {err}");
    }

    #[test]
    fn test_duplicate_source_name() {
        let mut config = minimal_config();
        config.sources.push(config.sources[0].clone());
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("duplicate source name"), "got: {err}");
    }

    #[test]
    fn test_api_target_must_be_url() {
        let mut config = minimal_config();
        config
            .sources
            .push(SourceConfig::new("feed", SourceKind::Api, "localhost:8080"));
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("http(s) URL"), "got: {err}");
    }

    #[test]
    fn test_iot_target_must_be_socket_addr() {
        let mut config = minimal_config();
        config
            .sources
            .push(SourceConfig::new("sensors", SourceKind::Iot, "not-an-addr"));
        assert!(validate(&config).is_err());

        config.sources[1].target = "127.0.0.1:9000".into();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_db_table_must_be_identifier() {
        let mut config = minimal_config();
        config.sources.push(
            SourceConfig::new("orders", SourceKind::Db, "/tmp/orders.db")
                .with_param("table", "changes; DROP TABLE x"),
        );
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("table name"), "got: {err}");
    }

    #[test]
    fn test_min_samples_above_window() {
        let mut config = minimal_config();
        config.processor.window_size = 4;
        config.processor.min_samples = 10;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("min_samples"), "got: {err}");
    }

    #[test]
    fn test_ordered_filter_needs_number() {
        let mut config = minimal_config();
        config
            .processor
            .filters
            .push(FilterRule::new("value", FilterOp::Gt, json!("ten")));
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_threshold_band_order() {
        let mut config = minimal_config();
        config.processor.thresholds.push(ThresholdRule {
            field: "temperature".into(),
            min: Some(40.0),
            max: Some(10.0),
        });
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("must be <="), "got: {err}");
    }
}
