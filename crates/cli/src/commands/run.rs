//! `run` command implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use contracts::{StartRequest, StreamConfig};
use hub::{JsonLinesSink, LogSink};
use pipeline::StreamPipeline;
use tracing::{error, info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::report::print_status;

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    let config = load_config(args)?;

    info!(
        sources = config.sources.len(),
        buffer_size = config.buffer_size,
        batch_size = config.batch_size,
        processing_interval = config.processing_interval,
        max_connections = config.max_connections,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config, args);
        return Ok(());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
        info!("Metrics endpoint available on port {}", args.metrics_port);
    }

    let pipeline = StreamPipeline::new(config);

    if args.emit_stdout {
        pipeline
            .attach(JsonLinesSink::stdout())
            .context("Failed to attach stdout subscriber")?;
    }
    if args.log_events {
        pipeline
            .attach(LogSink::new("events"))
            .context("Failed to attach log subscriber")?;
    }

    let started = match &args.source {
        Some(source) => {
            let request = StartRequest {
                source: source.clone(),
                interval: args.interval,
            };
            pipeline.start_with_request(&request).await
        }
        None => pipeline.start().await,
    };
    started.map_err(CliError::Start)?;

    info!("Pipeline running, press Ctrl+C to stop");

    if args.duration > 0 {
        tokio::select! {
            _ = shutdown_signal() => warn!("Received shutdown signal, stopping pipeline..."),
            _ = tokio::time::sleep(Duration::from_secs(args.duration)) => {
                info!(seconds = args.duration, "Run duration elapsed, stopping pipeline...");
            }
        }
    } else {
        shutdown_signal().await;
        warn!("Received shutdown signal, stopping pipeline...");
    }

    pipeline.stop().await.map_err(CliError::Shutdown)?;

    let status = pipeline.status();
    info!(
        ingested = status.counters.ingested,
        processed = status.counters.processed,
        dropped = status.counters.dropped,
        errors = status.counters.errors,
        alerts = status.counters.alerts,
        "rtstream finished"
    );
    // stdout belongs to the event stream when --emit-stdout is set
    if !args.emit_stdout {
        print_status(&status);
    }
    Ok(())
}

fn load_config(args: &RunArgs) -> Result<StreamConfig> {
    if args.config.exists() {
        info!(config = %args.config.display(), "Loading configuration");
        return config_loader::ConfigLoader::load_from_path(&args.config)
            .with_context(|| format!("Failed to load config from {}", args.config.display()));
    }
    if args.source.is_some() {
        info!("No configuration file, using defaults with --source");
        return Ok(StreamConfig::default());
    }
    Err(CliError::config_not_found(args.config.display().to_string()).into())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &StreamConfig, args: &RunArgs) {
    println!("\n=== Configuration Summary ===\n");
    println!("Buffer: {} records, batches of {}", config.buffer_size, config.batch_size);
    println!("Processing interval: {}s", config.processing_interval);
    println!("Max subscribers: {}", config.max_connections);

    println!("\nSources ({}):", config.sources.len());
    for source in &config.sources {
        println!(
            "  - {} ({}) {} every {}s",
            source.name, source.kind, source.target, source.interval
        );
    }
    if let Some(source) = &args.source {
        println!("  - {source} (synthetic) every {}s [--source]", args.interval);
    }

    println!(
        "\nAnalytics: metrics {:?}, window {}, k = {}",
        config.processor.tracked_metrics,
        config.processor.window_size,
        config.processor.anomaly_threshold
    );
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(config: PathBuf, source: Option<&str>) -> RunArgs {
        RunArgs {
            config,
            source: source.map(str::to_string),
            interval: 1.0,
            duration: 0,
            emit_stdout: false,
            log_events: false,
            dry_run: true,
            metrics_port: 0,
        }
    }

    #[test]
    fn test_missing_config_without_source_fails() {
        let err = load_config(&args(PathBuf::from("/nonexistent/rtstream.toml"), None)).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_missing_config_with_source_uses_defaults() {
        let config =
            load_config(&args(PathBuf::from("/nonexistent/rtstream.toml"), Some("user_events")))
                .unwrap();
        assert!(config.sources.is_empty());
        assert_eq!(config.buffer_size, 1000);
    }

    #[tokio::test]
    async fn test_dry_run_with_config_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        std::io::Write::write_all(
            &mut file,
            br#"
buffer_size = 50

[[sources]]
name = "users"
kind = "synthetic"
target = "user_events"
"#,
        )
        .unwrap();

        run_pipeline(&args(file.path().to_path_buf(), None)).await.unwrap();
    }
}
