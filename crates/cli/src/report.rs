//! Human-readable status output.

use contracts::{SourceState, StatusSnapshot};

/// Print a final status summary
pub fn print_status(status: &StatusSnapshot) {
    let c = &status.counters;

    println!("\n=== Pipeline Status ({}) ===\n", status.state);
    println!("Records");
    println!("  ingested:  {}", c.ingested);
    println!("  processed: {}", c.processed);
    println!("  dropped:   {}", c.dropped);
    println!("  errors:    {}", c.errors);
    println!("  filtered:  {}", c.filtered);
    println!("\nBatches: {}  Alerts: {}  Throughput: {:.2} rec/s", c.batches, c.alerts, status.throughput);
    println!("Subscriber drops: {}", c.subscriber_drops);

    if !status.sources.is_empty() {
        let degraded = status.degraded_sources().count();
        println!("\nSources ({}, {degraded} degraded)", status.sources.len());
        for source in &status.sources {
            let state = match source.state {
                SourceState::Active => "active",
                SourceState::Degraded => "DEGRADED",
            };
            print!(
                "  - {} ({}) {state}: {} records, {} failures",
                source.name, source.kind, source.records, source.failures
            );
            match &source.last_error {
                Some(err) if source.state == SourceState::Degraded => println!(" [{err}]"),
                _ => println!(),
            }
        }
    }

    println!();
}
