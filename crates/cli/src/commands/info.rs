//! `info` command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use contracts::StreamConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    stream: StreamInfo,
    sources: Vec<SourceInfo>,
    analytics: AnalyticsInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    filters: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    thresholds: Vec<String>,
}

#[derive(Serialize)]
struct StreamInfo {
    buffer_size: usize,
    batch_size: usize,
    processing_interval: f64,
    max_connections: usize,
    subscriber_backlog: usize,
    status_interval: f64,
    shutdown_grace: f64,
}

#[derive(Serialize)]
struct SourceInfo {
    name: String,
    kind: String,
    target: String,
    interval: f64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct AnalyticsInfo {
    tracked_metrics: Vec<String>,
    window_size: usize,
    min_samples: usize,
    anomaly_threshold: f64,
    required_fields: Vec<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&config, args);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(config: &StreamConfig, args: &InfoArgs) -> ConfigInfo {
    let sources = config
        .sources
        .iter()
        .map(|s| SourceInfo {
            name: s.name.clone(),
            kind: s.kind.to_string(),
            target: s.target.clone(),
            interval: s.interval,
            params: if args.sources {
                s.params.clone().into_iter().collect()
            } else {
                BTreeMap::new()
            },
        })
        .collect();

    let p = &config.processor;
    let (filters, thresholds) = if args.rules {
        (
            p.filters
                .iter()
                .map(|f| format!("{} {:?} {}", f.field, f.op, f.value))
                .collect(),
            p.thresholds
                .iter()
                .map(|t| {
                    let min = t.min.map_or("-inf".to_string(), |v| v.to_string());
                    let max = t.max.map_or("+inf".to_string(), |v| v.to_string());
                    format!("{} in [{min}, {max}]", t.field)
                })
                .collect(),
        )
    } else {
        (Vec::new(), Vec::new())
    };

    ConfigInfo {
        stream: StreamInfo {
            buffer_size: config.buffer_size,
            batch_size: config.batch_size,
            processing_interval: config.processing_interval,
            max_connections: config.max_connections,
            subscriber_backlog: config.subscriber_backlog,
            status_interval: config.status_interval,
            shutdown_grace: config.shutdown_grace,
        },
        sources,
        analytics: AnalyticsInfo {
            tracked_metrics: p.tracked_metrics.clone(),
            window_size: p.window_size,
            min_samples: p.min_samples,
            anomaly_threshold: p.anomaly_threshold,
            required_fields: p.required_fields.clone(),
        },
        filters,
        thresholds,
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                  rtstream Configuration                      ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let s = &info.stream;
    println!("🌊 Stream");
    println!("   ├─ Buffer: {} records", s.buffer_size);
    println!("   ├─ Batch: {} records / {}s", s.batch_size, s.processing_interval);
    println!("   ├─ Subscribers: max {} (backlog {})", s.max_connections, s.subscriber_backlog);
    println!("   └─ Heartbeat: every {}s", s.status_interval);

    println!("\n📥 Sources ({})", info.sources.len());
    for (i, source) in info.sources.iter().enumerate() {
        let is_last = i == info.sources.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };
        println!(
            "   {} {} ({}) {} every {}s",
            prefix, source.name, source.kind, source.target, source.interval
        );
        for (key, value) in &source.params {
            println!("   {}  · {} = {}", child_prefix, key, value);
        }
    }

    let a = &info.analytics;
    println!("\n📈 Analytics");
    println!("   ├─ Tracked metrics: {:?}", a.tracked_metrics);
    println!("   ├─ Window: {} samples (min {})", a.window_size, a.min_samples);
    println!("   ├─ Anomaly threshold: {}σ", a.anomaly_threshold);
    println!("   └─ Required fields: {:?}", a.required_fields);

    if !info.filters.is_empty() {
        println!("\n🔎 Filters");
        for filter in &info.filters {
            println!("   · {}", filter);
        }
    }
    if !info.thresholds.is_empty() {
        println!("\n🚨 Thresholds");
        for threshold in &info.thresholds {
            println!("   · {}", threshold);
        }
    }

    println!();
}
