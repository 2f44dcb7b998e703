//! # Integration Tests
//!
//! 跨 crate 集成测试与端到端测试。
//!
//! 覆盖：
//! - 推送事件的线上格式
//! - 不经控制器的 buffer → processor → hub 数据流
//! - 基于 synthetic / file 数据源的完整流水线运行

#[cfg(test)]
mod contract_tests {
    use std::sync::Arc;

    use contracts::{Alert, AlertKind, Envelope, StreamEvent};

    #[test]
    fn test_envelope_wire_shape() {
        let alert = Alert::new(AlertKind::Anomaly, "spike").with_metric("value", 100.0);
        let envelope = Envelope::new(7, Arc::new(StreamEvent::ErrorAlert(alert)));

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["seq"], 7);
        assert_eq!(json["event"], "error_alert");
        assert_eq!(json["payload"]["kind"], "anomaly");
        assert_eq!(json["payload"]["metric"], "value");
    }
}

#[cfg(test)]
mod flow_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{AlertKind, Record, SourceKind, StreamEvent};
    use hub::{BroadcastHub, HubConfig};
    use ingestion::IngestionBuffer;
    use observability::MetricsCollector;
    use processor::StreamProcessor;
    use serde_json::json;
    use tokio::time::timeout;

    fn record(value: f64) -> Record {
        Record::new("sensors", SourceKind::Iot, json!({ "value": value }))
    }

    /// Capacity-3 buffer fed r1..r5 keeps r3..r5 and counts two drops
    #[tokio::test]
    async fn test_overflow_keeps_newest_through_processor() {
        let collector = Arc::new(MetricsCollector::new());
        let buffer = IngestionBuffer::new(3, Arc::clone(&collector));
        for i in 1..=5 {
            buffer.push(record(i as f64)).unwrap();
        }

        let batch = buffer
            .next_batch(10, Duration::from_millis(50))
            .await
            .unwrap();
        let mut processor = StreamProcessor::new(Default::default(), Arc::clone(&collector));
        let output = processor.process(batch);

        let values: Vec<f64> = output
            .batch
            .records
            .iter()
            .filter_map(|r| r.number("value"))
            .collect();
        assert_eq!(values, vec![3.0, 4.0, 5.0]);

        let counters = collector.counters();
        assert_eq!(counters.ingested, 5);
        assert_eq!(counters.dropped, 2);
        assert_eq!(counters.processed, 3);
    }

    /// A steady stream then one outlier raises exactly one anomaly alert,
    /// delivered to subscribers after the batch that carried it
    #[tokio::test]
    async fn test_anomaly_reaches_subscriber() {
        let collector = Arc::new(MetricsCollector::new());
        let hub = BroadcastHub::new(HubConfig::default(), Arc::clone(&collector));
        let mut sub = hub.subscribe().unwrap();
        let mut processor = StreamProcessor::new(Default::default(), Arc::clone(&collector));

        let mut alerts = Vec::new();
        for (id, chunk) in [[10.0, 11.0, 9.0, 10.0, 10.5], [9.5, 10.0, 100.0, 10.0, 10.2]]
            .iter()
            .enumerate()
        {
            let records = chunk.iter().map(|v| record(*v)).collect();
            let output = processor.process(contracts::Batch::new(id as u64 + 1, records));
            hub.publish(StreamEvent::DataUpdate(output.batch));
            for alert in output.alerts {
                alerts.push(alert.clone());
                hub.publish(StreamEvent::ErrorAlert(alert));
            }
        }

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Anomaly);
        assert_eq!(alerts[0].value, Some(100.0));
        assert_eq!(collector.counters().alerts, 1);

        let mut names = Vec::new();
        for _ in 0..3 {
            let env = timeout(Duration::from_secs(1), sub.recv())
                .await
                .unwrap()
                .unwrap();
            names.push(env.name());
        }
        assert_eq!(names, vec!["data_update", "data_update", "error_alert"]);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::future::pending;
    use std::io::Write;
    use std::time::Duration;

    use contracts::{
        ContractError, DataSink, Envelope, PipelineState, SourceConfig, SourceKind, StreamConfig,
        StreamEvent,
    };
    use pipeline::{PipelineError, StreamPipeline};
    use tokio::time::{sleep, timeout};

    /// Sink whose writes never complete
    struct StalledSink;

    impl DataSink for StalledSink {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn write(&mut self, _envelope: &Envelope) -> Result<(), ContractError> {
            pending().await
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    fn config(sources: Vec<SourceConfig>) -> StreamConfig {
        StreamConfig {
            processing_interval: 0.02,
            status_interval: 0.05,
            subscriber_backlog: 4,
            shutdown_grace: 0.5,
            sources,
            ..Default::default()
        }
    }

    fn synthetic(name: &str) -> SourceConfig {
        SourceConfig::new(name, SourceKind::Synthetic, "sensor_data").with_interval(0.005)
    }

    /// A stalled subscriber only loses its own backlog
    #[tokio::test]
    async fn test_stalled_subscriber_does_not_block_others() {
        let pipeline = StreamPipeline::new(config(vec![synthetic("sensors")]));
        let stalled = pipeline.attach(StalledSink).unwrap();
        let mut fast = pipeline.subscribe().unwrap();
        pipeline.start().await.unwrap();

        let mut received = 0;
        let mut last_seq = 0;
        while received < 40 {
            let env = timeout(Duration::from_secs(2), fast.recv())
                .await
                .expect("fast subscriber starved")
                .unwrap();
            assert!(env.seq > last_seq);
            last_seq = env.seq;
            received += 1;
        }

        let info = pipeline
            .hub()
            .subscribers()
            .into_iter()
            .find(|s| s.id == stalled)
            .unwrap();
        assert_eq!(info.stats.delivered, 0);
        assert!(info.stats.dropped > 0);
        assert!(info.stats.backlog_len <= 4);
        assert!(pipeline.status().counters.subscriber_drops > 0);

        timeout(Duration::from_secs(5), pipeline.stop())
            .await
            .expect("stop hung on stalled subscriber")
            .unwrap();
        assert_eq!(pipeline.status().subscribers, 0);
    }

    /// Tail a file: JSON lines become enriched records, garbage is counted
    #[tokio::test]
    async fn test_file_source_end_to_end() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{\"value\": 12.5, \"timestamp\": 1700000000}}").unwrap();
        writeln!(file, "not json at all").unwrap();
        writeln!(file, "{{\"value\": 13.0}}").unwrap();
        file.flush().unwrap();

        let source = SourceConfig::new("logs", SourceKind::File, file.path().to_string_lossy())
            .with_interval(0.01);
        let pipeline = StreamPipeline::new(config(vec![source]));
        let mut sub = pipeline.subscribe().unwrap();
        pipeline.start().await.unwrap();

        let mut records = Vec::new();
        while records.len() < 2 {
            let env = timeout(Duration::from_secs(2), sub.recv())
                .await
                .unwrap()
                .unwrap();
            if let StreamEvent::DataUpdate(batch) = env.event.as_ref() {
                records.extend(batch.records.iter().cloned());
            }
        }
        pipeline.stop().await.unwrap();

        assert_eq!(records[0].fields["_source"], "logs");
        assert_eq!(records[0].fields["_source_kind"], "file");
        assert_eq!(records[0].fields["_event_time"], "2023-11-14T22:13:20.000Z");
        assert_eq!(records[1].number("event_score"), Some(19.5));

        let counters = pipeline.status().counters;
        assert_eq!(counters.ingested, 3);
        assert_eq!(counters.errors, 1);
        assert_eq!(counters.processed, 2);
    }

    /// Start, stop, start: counters restart from zero, state machine holds
    #[tokio::test]
    async fn test_restart_baseline() {
        let pipeline = StreamPipeline::new(config(vec![synthetic("a"), synthetic("b")]));
        pipeline.start().await.unwrap();
        assert!(matches!(
            pipeline.start().await,
            Err(PipelineError::AlreadyRunning { .. })
        ));
        sleep(Duration::from_millis(150)).await;
        let first = pipeline.status();
        assert!(first.counters.processed > 0);
        assert_eq!(first.sources.len(), 2);
        pipeline.stop().await.unwrap();

        let handle = pipeline.clone();
        handle.start().await.unwrap();
        assert_eq!(pipeline.state(), PipelineState::Running);
        assert_eq!(pipeline.status().counters.batches, 0);
        sleep(Duration::from_millis(150)).await;
        assert!(pipeline.status().counters.processed > 0);
        pipeline.stop().await.unwrap();
        assert_eq!(pipeline.state(), PipelineState::Stopped);
    }
}
