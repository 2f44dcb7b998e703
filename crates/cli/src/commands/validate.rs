//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::StreamConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    source_count: usize,
    buffer_size: usize,
    batch_size: usize,
    tracked_metrics: Vec<String>,
    filter_count: usize,
    threshold_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    source_count: config.sources.len(),
                    buffer_size: config.buffer_size,
                    batch_size: config.batch_size,
                    tracked_metrics: config.processor.tracked_metrics.clone(),
                    filter_count: config.processor.filters.len(),
                    threshold_count: config.processor.thresholds.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Non-fatal issues
fn collect_warnings(config: &StreamConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.sources.is_empty() {
        warnings.push("No sources configured - `run` needs --source to start".to_string());
    }
    if config.batch_size > config.buffer_size {
        warnings.push(format!(
            "batch_size ({}) exceeds buffer_size ({}) - batches will be cut by processing_interval",
            config.batch_size, config.buffer_size
        ));
    }
    if config.processor.tracked_metrics.is_empty() {
        warnings.push("processor.tracked_metrics is empty - anomaly detection disabled".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Sources: {}", summary.source_count);
            println!("  Buffer size: {}", summary.buffer_size);
            println!("  Batch size: {}", summary.batch_size);
            println!("  Tracked metrics: {:?}", summary.tracked_metrics);
            println!("  Filters: {}", summary.filter_count);
            println!("  Thresholds: {}", summary.threshold_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_valid_config_with_warnings() {
        let file = write_config("buffer_size = 10\nbatch_size = 20\n");
        let result = validate_config(&ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        });
        assert!(result.valid);
        assert_eq!(result.warnings.map(|w| w.len()), Some(2));
    }

    #[test]
    fn test_invalid_config() {
        let file = write_config("buffer_size = 0\n");
        let result = validate_config(&ValidateArgs {
            config: file.path().to_path_buf(),
            json: false,
        });
        assert!(!result.valid);
        assert!(result.error.is_some());
    }
}
