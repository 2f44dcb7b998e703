//! StreamPipeline - lifecycle controller
//!
//! Owns every running component and drives the
//! `Stopped → Starting → Running → Stopping → Stopped` state machine.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use contracts::{
    DataSink, PipelineState, SourceConfig, StartRequest, StatusSnapshot, StreamConfig,
};
use hub::{BroadcastHub, HubConfig, SubscriberId, Subscription};
use ingestion::{IngestionBuffer, SourceContext, SourceTask};
use observability::MetricsCollector;
use parking_lot::RwLock;
use processor::StreamProcessor;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::error::{PipelineError, Result};
use crate::tasks::{heartbeat_loop, processor_loop};

/// Source alerts queued for the processor loop; overflow drops the alert
const ALERT_CHANNEL_CAPACITY: usize = 256;

/// State readable without taking the control lock
pub(crate) struct Shared {
    config: StreamConfig,
    pub(crate) collector: Arc<MetricsCollector>,
    pub(crate) hub: Arc<BroadcastHub>,
    state: RwLock<PipelineState>,
    started_at: RwLock<Option<DateTime<Utc>>>,
    buffer: RwLock<Option<Arc<IngestionBuffer>>>,
}

impl Shared {
    fn state(&self) -> PipelineState {
        *self.state.read()
    }

    fn set_state(&self, state: PipelineState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        info!(from = %previous, to = %state, "pipeline state changed");
    }

    pub(crate) fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            state: self.state(),
            counters: self.collector.counters(),
            throughput: self.collector.throughput(),
            sources: self.collector.sources(),
            subscribers: self.hub.subscriber_count(),
            buffer_depth: self.buffer.read().as_ref().map_or(0, |b| b.len()),
            started_at: *self.started_at.read(),
            taken_at: Utc::now(),
        }
    }
}

/// Components of one run
struct Running {
    buffer: Arc<IngestionBuffer>,
    context: SourceContext,
    sources: Vec<SourceTask>,
    processor: JoinHandle<StreamProcessor>,
    heartbeat: JoinHandle<()>,
    heartbeat_token: CancellationToken,
}

struct Control {
    sources: Vec<SourceConfig>,
    running: Option<Running>,
    /// Processor returned by the last drained run
    idle_processor: Option<StreamProcessor>,
}

/// Real-time streaming pipeline
///
/// Cheap to clone; every clone controls the same pipeline. Control
/// operations are serialized, `status` never waits on them.
#[derive(Clone)]
pub struct StreamPipeline {
    shared: Arc<Shared>,
    control: Arc<Mutex<Control>>,
}

impl StreamPipeline {
    /// Create a stopped pipeline; `config.sources` become the initial registry
    pub fn new(config: StreamConfig) -> Self {
        let collector = Arc::new(MetricsCollector::new());
        let hub = Arc::new(BroadcastHub::new(
            HubConfig::from_stream(&config),
            Arc::clone(&collector),
        ));
        let sources = config.sources.clone();

        Self {
            shared: Arc::new(Shared {
                config,
                collector,
                hub,
                state: RwLock::new(PipelineState::Stopped),
                started_at: RwLock::new(None),
                buffer: RwLock::new(None),
            }),
            control: Arc::new(Mutex::new(Control {
                sources,
                running: None,
                idle_processor: None,
            })),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.shared.state()
    }

    /// Read-only snapshot of counters, throughput and source health
    pub fn status(&self) -> StatusSnapshot {
        self.shared.status()
    }

    pub fn collector(&self) -> &Arc<MetricsCollector> {
        &self.shared.collector
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.shared.hub
    }

    /// Registered source descriptors
    pub async fn sources(&self) -> Vec<SourceConfig> {
        self.control.lock().await.sources.clone()
    }

    /// Start every registered source, the processor and the heartbeat
    ///
    /// Counters, source health and window state start from zero.
    #[instrument(name = "pipeline_start", skip(self))]
    pub async fn start(&self) -> Result<()> {
        let mut control = self.control.lock().await;

        let state = self.shared.state();
        if state != PipelineState::Stopped {
            return Err(PipelineError::AlreadyRunning { state });
        }
        let config = self.effective_config(&control.sources);
        if config.sources.is_empty() {
            return Err(PipelineError::no_sources());
        }
        config_loader::validate(&config).map_err(PipelineError::Config)?;
        let processing_interval = config.processing_interval();
        let status_interval = config.status_interval();

        self.shared.set_state(PipelineState::Starting);
        let collector = Arc::clone(&self.shared.collector);
        let hub = Arc::clone(&self.shared.hub);
        collector.reset();
        hub.reopen();

        let buffer = Arc::new(IngestionBuffer::new(config.buffer_size, Arc::clone(&collector)));
        let (alert_tx, alert_rx) = mpsc::channel(ALERT_CHANNEL_CAPACITY);
        let context = SourceContext {
            buffer: Arc::clone(&buffer),
            collector: Arc::clone(&collector),
            health: config.health.clone(),
            alerts: alert_tx,
        };
        let sources: Vec<_> = config
            .sources
            .iter()
            .map(|source| spawn_source(source.clone(), &context))
            .collect();

        let mut processor = control.idle_processor.take().unwrap_or_else(|| {
            StreamProcessor::new(config.processor.clone(), Arc::clone(&collector))
        });
        processor.reset();
        let processor = tokio::spawn(processor_loop(
            processor,
            Arc::clone(&buffer),
            hub,
            alert_rx,
            config.batch_size,
            processing_interval,
        ));

        let heartbeat_token = CancellationToken::new();
        let heartbeat = tokio::spawn(heartbeat_loop(
            Arc::clone(&self.shared),
            status_interval,
            heartbeat_token.clone(),
        ));

        *self.shared.buffer.write() = Some(Arc::clone(&buffer));
        *self.shared.started_at.write() = Some(Utc::now());
        control.running = Some(Running {
            buffer,
            context,
            sources,
            processor,
            heartbeat,
            heartbeat_token,
        });
        self.shared.set_state(PipelineState::Running);

        info!(
            sources = config.sources.len(),
            buffer_size = config.buffer_size,
            batch_size = config.batch_size,
            "pipeline running"
        );
        Ok(())
    }

    /// Register `request.source` as the single synthetic source, then start
    pub async fn start_with_request(&self, request: &StartRequest) -> Result<()> {
        {
            let mut control = self.control.lock().await;
            let state = self.shared.state();
            if state != PipelineState::Stopped {
                return Err(PipelineError::AlreadyRunning { state });
            }
            let source = request.to_source_config();
            match control.sources.iter_mut().find(|s| s.name == source.name) {
                Some(existing) => *existing = source,
                None => control.sources.push(source),
            }
        }
        self.start().await
    }

    /// Stop sources, drain the processor within the grace period, then
    /// force-disconnect every subscriber
    ///
    /// Counters stay readable until the next `start`.
    #[instrument(name = "pipeline_stop", skip(self))]
    pub async fn stop(&self) -> Result<()> {
        let mut control = self.control.lock().await;

        let state = self.shared.state();
        let running = match (state, control.running.take()) {
            (PipelineState::Running, Some(running)) => running,
            (_, other) => {
                control.running = other;
                return Err(PipelineError::NotRunning { state });
            }
        };
        self.shared.set_state(PipelineState::Stopping);
        let grace = self.shared.config.shutdown_grace();

        for task in &running.sources {
            task.cancel();
        }
        for task in running.sources {
            task.shutdown(grace).await;
        }

        running.buffer.close();
        let mut processor = running.processor;
        match tokio::time::timeout(grace, &mut processor).await {
            Ok(Ok(drained)) => control.idle_processor = Some(drained),
            Ok(Err(e)) => error!(error = %e, "processor task failed"),
            Err(_) => {
                warn!(
                    remaining = running.buffer.len(),
                    "processor did not drain within grace, aborting"
                );
                processor.abort();
            }
        }

        running.heartbeat_token.cancel();
        if let Err(e) = running.heartbeat.await {
            warn!(error = %e, "heartbeat task failed");
        }
        drop(running.context);

        let subscribers = self.shared.hub.disconnect_all().await;
        *self.shared.buffer.write() = None;
        *self.shared.started_at.write() = None;
        self.shared.set_state(PipelineState::Stopped);

        let counters = self.shared.collector.counters();
        info!(
            subscribers,
            ingested = counters.ingested,
            processed = counters.processed,
            dropped = counters.dropped,
            errors = counters.errors,
            "pipeline stopped"
        );
        Ok(())
    }

    /// Register a source; spawns it at once if the pipeline is running
    #[instrument(name = "pipeline_add_source", skip(self, source), fields(source = %source.name))]
    pub async fn add_source(&self, source: SourceConfig) -> Result<()> {
        let mut control = self.control.lock().await;

        if control.sources.iter().any(|s| s.name == source.name) {
            return Err(PipelineError::DuplicateSource { name: source.name });
        }
        let mut candidate = self.effective_config(&control.sources);
        candidate.sources.push(source.clone());
        config_loader::validate(&candidate).map_err(PipelineError::Config)?;

        if let Some(running) = control.running.as_mut() {
            running.sources.push(spawn_source(source.clone(), &running.context));
            info!("source added to running pipeline");
        }
        control.sources.push(source);
        Ok(())
    }

    /// Unregister a source, cancelling its task if running
    #[instrument(name = "pipeline_remove_source", skip(self))]
    pub async fn remove_source(&self, name: &str) -> Result<()> {
        let mut control = self.control.lock().await;

        let pos = control
            .sources
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| PipelineError::UnknownSource {
                name: name.to_string(),
            })?;
        control.sources.remove(pos);

        if let Some(running) = control.running.as_mut() {
            if let Some(i) = running.sources.iter().position(|t| t.name() == name) {
                let task = running.sources.swap_remove(i);
                task.shutdown(self.shared.config.shutdown_grace()).await;
            }
        }
        if self.shared.collector.source_health(name).is_some() {
            self.shared.collector.unregister_source(name);
        }
        info!("source removed");
        Ok(())
    }

    /// Connect an in-process subscriber
    pub fn subscribe(&self) -> Result<Subscription> {
        Ok(self.shared.hub.subscribe()?)
    }

    /// Connect a subscriber backed by `sink`
    pub fn attach<S: DataSink + 'static>(&self, sink: S) -> Result<SubscriberId> {
        Ok(self.shared.hub.attach(sink)?)
    }

    fn effective_config(&self, sources: &[SourceConfig]) -> StreamConfig {
        StreamConfig {
            sources: sources.to_vec(),
            ..self.shared.config.clone()
        }
    }
}

fn spawn_source(source: SourceConfig, context: &SourceContext) -> SourceTask {
    context.collector.register_source(&source.name, source.kind);
    SourceTask::spawn(source, context.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SourceKind;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    fn synthetic(name: &str) -> SourceConfig {
        SourceConfig::new(name, SourceKind::Synthetic, "sensor_data").with_interval(0.01)
    }

    fn config(sources: Vec<SourceConfig>) -> StreamConfig {
        StreamConfig {
            processing_interval: 0.05,
            status_interval: 0.05,
            shutdown_grace: 1.0,
            sources,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_start_without_sources_is_rejected() {
        let pipeline = StreamPipeline::new(config(vec![]));
        let err = pipeline.start().await.unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
        assert_eq!(pipeline.state(), PipelineState::Stopped);
    }

    #[tokio::test]
    async fn test_invalid_buffer_size_is_rejected() {
        let mut cfg = config(vec![synthetic("s")]);
        cfg.buffer_size = 0;
        let pipeline = StreamPipeline::new(cfg);
        assert!(matches!(pipeline.start().await, Err(PipelineError::Config(_))));
        assert_eq!(pipeline.state(), PipelineState::Stopped);
    }

    #[tokio::test]
    async fn test_control_misuse() {
        let pipeline = StreamPipeline::new(config(vec![synthetic("s")]));
        assert!(matches!(
            pipeline.stop().await,
            Err(PipelineError::NotRunning {
                state: PipelineState::Stopped
            })
        ));

        pipeline.start().await.unwrap();
        assert!(matches!(
            pipeline.start().await,
            Err(PipelineError::AlreadyRunning {
                state: PipelineState::Running
            })
        ));
        assert_eq!(pipeline.state(), PipelineState::Running);

        pipeline.stop().await.unwrap();
        assert_eq!(pipeline.state(), PipelineState::Stopped);
    }

    fn idle_file_source(file: &tempfile::NamedTempFile) -> SourceConfig {
        SourceConfig::new("idle", SourceKind::File, file.path().to_string_lossy())
            .with_interval(0.01)
    }

    #[tokio::test]
    async fn test_non_finite_interval_rejected_before_starting() {
        let mut cfg = config(vec![synthetic("s")]);
        cfg.processing_interval = f64::NAN;
        let pipeline = StreamPipeline::new(cfg);

        assert!(matches!(pipeline.start().await, Err(PipelineError::Config(_))));
        assert_eq!(pipeline.state(), PipelineState::Stopped);
        assert!(matches!(
            pipeline.stop().await,
            Err(PipelineError::NotRunning { .. })
        ));
    }

    #[tokio::test]
    async fn test_second_start_leaves_status_unchanged() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let pipeline = StreamPipeline::new(config(vec![idle_file_source(&file)]));
        pipeline.start().await.unwrap();

        let before = pipeline.status();
        assert!(pipeline.start().await.is_err());
        let after = pipeline.status();
        assert_eq!(after.state, before.state);
        assert_eq!(after.counters, before.counters);
        assert_eq!(after.sources, before.sources);
        assert_eq!(after.started_at, before.started_at);

        pipeline.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_then_stop_matches_fresh_baseline() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let cfg = config(vec![idle_file_source(&file)]);
        let fresh = StreamPipeline::new(cfg.clone()).status();

        let pipeline = StreamPipeline::new(cfg);
        pipeline.start().await.unwrap();
        pipeline.stop().await.unwrap();

        let status = pipeline.status();
        assert_eq!(status.state, fresh.state);
        assert_eq!(status.counters, fresh.counters);
        assert_eq!(status.buffer_depth, fresh.buffer_depth);
        assert_eq!(status.subscribers, fresh.subscribers);
        assert_eq!(status.started_at, fresh.started_at);
    }

    #[tokio::test]
    async fn test_counters_survive_stop_and_reset_on_start() {
        let pipeline = StreamPipeline::new(config(vec![synthetic("sensors")]));
        pipeline.start().await.unwrap();
        sleep(Duration::from_millis(300)).await;

        let running = pipeline.status();
        assert_eq!(running.state, PipelineState::Running);
        assert!(running.counters.ingested > 0);
        assert!(running.counters.processed > 0);
        assert_eq!(running.sources.len(), 1);
        assert!(running.started_at.is_some());

        pipeline.stop().await.unwrap();
        let stopped = pipeline.status();
        assert_eq!(stopped.state, PipelineState::Stopped);
        assert!(stopped.counters.processed >= running.counters.processed);

        pipeline.start().await.unwrap();
        let restarted = pipeline.status();
        assert_eq!(restarted.counters.batches, 0);
        assert_eq!(restarted.counters.processed, 0);
        pipeline.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_add_and_remove_sources() {
        let pipeline = StreamPipeline::new(config(vec![synthetic("a")]));
        assert!(matches!(
            pipeline.add_source(synthetic("a")).await,
            Err(PipelineError::DuplicateSource { .. })
        ));
        assert!(matches!(
            pipeline.remove_source("nope").await,
            Err(PipelineError::UnknownSource { .. })
        ));

        pipeline.start().await.unwrap();
        pipeline.add_source(synthetic("b")).await.unwrap();
        let names: Vec<_> = pipeline.status().sources.into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["a", "b"]);

        pipeline.remove_source("a").await.unwrap();
        let names: Vec<_> = pipeline.status().sources.into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["b"]);
        assert_eq!(pipeline.sources().await.len(), 1);

        pipeline.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_source_rejected_by_add() {
        let pipeline = StreamPipeline::new(config(vec![]));
        let bad = SourceConfig::new("web", SourceKind::Api, "not-a-url");
        assert!(matches!(pipeline.add_source(bad).await, Err(PipelineError::Config(_))));
        assert!(pipeline.sources().await.is_empty());
    }

    #[tokio::test]
    async fn test_subscriber_receives_events_until_stop() {
        let pipeline = StreamPipeline::new(config(vec![synthetic("sensors")]));
        let mut sub = pipeline.subscribe().unwrap();
        pipeline.start().await.unwrap();

        let mut seen_data = false;
        let mut seen_status = false;
        let mut last_seq = 0;
        while !(seen_data && seen_status) {
            let env = timeout(Duration::from_secs(2), sub.recv())
                .await
                .unwrap()
                .unwrap();
            assert!(env.seq > last_seq);
            last_seq = env.seq;
            match env.name() {
                "data_update" => seen_data = true,
                "stream_status" => seen_status = true,
                _ => {}
            }
        }

        pipeline.stop().await.unwrap();
        // Drain whatever was in flight; the stream then ends
        loop {
            match timeout(Duration::from_secs(2), sub.recv()).await.unwrap() {
                Some(_) => continue,
                None => break,
            }
        }
        assert_eq!(pipeline.status().subscribers, 0);
    }

    #[tokio::test]
    async fn test_start_with_request() {
        let pipeline = StreamPipeline::new(config(vec![]));
        let request = StartRequest {
            source: "user_events".into(),
            interval: 0.01,
        };
        pipeline.start_with_request(&request).await.unwrap();

        let status = pipeline.status();
        assert_eq!(status.state, PipelineState::Running);
        assert_eq!(status.sources.len(), 1);
        assert_eq!(status.sources[0].name, "user_events");
        assert_eq!(status.sources[0].kind, SourceKind::Synthetic);

        assert!(matches!(
            pipeline.start_with_request(&request).await,
            Err(PipelineError::AlreadyRunning { .. })
        ));
        pipeline.stop().await.unwrap();
    }
}
