//! Parallel coordinator.
//!
//! The [`Runner`] plans a file, submits one worker task per chunk to a
//! bounded rayon pool and folds chunk results into a [`StatsRecorder`] as
//! they arrive. Chunks complete in any order.
//!
//! Each chunk gets its own deadline, measured from the moment a worker picks
//! it up. A chunk that misses its deadline, returns an error or panics counts
//! as zero; the run carries on with the remaining chunks. A timed-out chunk
//! is asked to stop before its next bulk write.
//!
//! A worker stuck inside a sink call keeps its pool thread. Once every
//! thread is held by a timed-out chunk, the chunks still queued get one more
//! timeout window to start; after that they are settled as timed out too and
//! skipped if a thread ever frees up.
//!
//! Only planning failures (`FileNotFound`, `HeaderNotFound`, I/O on the
//! planning scans) and setup failures reach the caller.

use crate::config::IngestOptions;
use crate::error::IngestError;
use crate::metrics::{GaugeMetric, MetricsCollector};
use crate::planner::{ChunkPlan, ChunkSpec, plan_chunks};
use crate::record::HeaderInfo;
use crate::report::{ChunkLog, ChunkStatus, IngestionReport};
use crate::sink::DocumentSink;
use crate::stats::{IngestionStats, StatsRecorder};
use crate::worker::{ChunkOutcome, ChunkWorker};
use rayon::ThreadPoolBuilder;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Messages from worker tasks to the coordinator.
enum ChunkEvent {
    Started {
        index: usize,
        at: Instant,
    },
    Finished {
        index: usize,
        elapsed: Duration,
        result: Result<ChunkOutcome, String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Queued,
    Running { deadline: Instant },
    /// Timed out while its worker still holds a pool thread.
    Abandoned,
    Settled,
}

struct Slot {
    spec: ChunkSpec,
    cancel: Arc<AtomicBool>,
    state: SlotState,
}

impl Slot {
    fn deadline(&self) -> Option<Instant> {
        match self.state {
            SlotState::Running { deadline } => Some(deadline),
            SlotState::Queued | SlotState::Abandoned | SlotState::Settled => None,
        }
    }

    fn is_open(&self) -> bool {
        matches!(self.state, SlotState::Queued | SlotState::Running { .. })
    }
}

/// Drives an ingestion run.
pub struct Runner {
    pub options: IngestOptions,
    metrics: Option<MetricsCollector>,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new(IngestOptions::default())
    }
}

impl Runner {
    #[must_use]
    pub fn new(options: IngestOptions) -> Self {
        Self {
            options,
            metrics: None,
        }
    }

    /// Record run metrics into `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Ingest `path` into `sink` and return the frozen statistics.
    ///
    /// # Errors
    /// Fails only on invalid options, a missing file, a missing header, an
    /// unreadable file during planning, or a worker pool that cannot start.
    pub fn run(
        &self,
        path: impl AsRef<Path>,
        sink: Arc<dyn DocumentSink>,
    ) -> Result<IngestionStats, IngestError> {
        Ok(self.run_report(path, sink)?.stats)
    }

    /// Ingest `path` into `sink` and return the full report.
    ///
    /// # Errors
    /// See [`run`](Self::run).
    pub fn run_report(
        &self,
        path: impl AsRef<Path>,
        sink: Arc<dyn DocumentSink>,
    ) -> Result<IngestionReport, IngestError> {
        self.options.validate()?;
        let path = path.as_ref();
        let workers = self.options.processors();
        let plan = plan_chunks(path, workers)?;
        info!(
            file = %path.display(),
            total_lines = plan.total_lines,
            chunks = plan.chunks.len(),
            target_lines = plan.target_lines,
            workers,
            "starting ingestion"
        );

        if let Some(m) = &self.metrics {
            m.record_start();
        }
        let recorder = StatsRecorder::start(plan.total_lines, plan.chunks.len() as u64);
        let logs = if plan.chunks.is_empty() {
            Vec::new()
        } else {
            self.dispatch(&plan, workers, sink, &recorder)?
        };
        let stats = recorder.finish();
        let verdict = stats.validate_with(&self.options.loss_policy());
        self.record_metrics(&stats);

        info!(
            file = %path.display(),
            processed = stats.processed_lines,
            dropped = stats.dropped_lines,
            inserted = stats.inserted_documents,
            failed_chunks = stats.failed_chunks,
            timed_out_chunks = stats.timed_out_chunks,
            elapsed_ms = millis(stats.elapsed),
            throughput = stats.throughput(),
            "ingestion finished"
        );
        if verdict.ok {
            info!(file = %path.display(), "{verdict}");
        } else {
            warn!(file = %path.display(), "{verdict}");
        }
        Ok(IngestionReport::new(
            path.to_path_buf(),
            stats,
            verdict,
            logs,
        ))
    }

    fn dispatch(
        &self,
        plan: &ChunkPlan,
        workers: usize,
        sink: Arc<dyn DocumentSink>,
        recorder: &StatsRecorder,
    ) -> Result<Vec<ChunkLog>, IngestError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("ingest-worker-{i}"))
            .build()?;
        let path: Arc<Path> = Arc::from(plan.path.as_path());
        let header: Arc<HeaderInfo> = Arc::new(plan.header.clone());
        let batch_size = self.options.batch_size;
        let (tx, rx) = mpsc::channel::<ChunkEvent>();

        let mut slots = Vec::with_capacity(plan.chunks.len());
        for (index, spec) in plan.chunks.iter().copied().enumerate() {
            let cancel = Arc::new(AtomicBool::new(false));
            slots.push(Slot {
                spec,
                cancel: Arc::clone(&cancel),
                state: SlotState::Queued,
            });
            let tx = tx.clone();
            let path = Arc::clone(&path);
            let header = Arc::clone(&header);
            let sink = Arc::clone(&sink);
            pool.spawn(move || {
                if cancel.load(Ordering::Relaxed) {
                    return;
                }
                let started = Instant::now();
                if tx.send(ChunkEvent::Started { index, at: started }).is_err() {
                    return;
                }
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    ChunkWorker::new(&path, &header, sink.as_ref())
                        .batch_size(batch_size)
                        .cancel_on(&cancel)
                        .process(spec)
                }));
                let result = match result {
                    Ok(Ok(outcome)) => Ok(outcome),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(payload) => Err(panic_message(payload.as_ref())),
                };
                // The coordinator may have stopped listening after a timeout.
                let _ = tx.send(ChunkEvent::Finished {
                    index,
                    elapsed: started.elapsed(),
                    result,
                });
            });
        }
        drop(tx);

        let timeout = self.options.chunk_timeout();
        let mut logs = Vec::with_capacity(slots.len());
        let mut pending = slots.len();
        let mut abandoned = 0usize;
        let mut stalled_since: Option<Instant> = None;
        while pending > 0 {
            let queued = slots.iter().any(|s| s.state == SlotState::Queued);
            let queue_deadline = stalled_since.filter(|_| queued).map(|at| at + timeout);
            let next_deadline = slots
                .iter()
                .filter_map(Slot::deadline)
                .chain(queue_deadline)
                .min();
            let event = match next_deadline {
                Some(deadline) => {
                    match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                        Ok(event) => Some(event),
                        Err(RecvTimeoutError::Timeout) => None,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => match rx.recv() {
                    Ok(event) => Some(event),
                    Err(_) => break,
                },
            };

            match event {
                Some(ChunkEvent::Started { index, at }) => {
                    let slot = &mut slots[index];
                    if slot.state == SlotState::Queued {
                        slot.state = SlotState::Running {
                            deadline: at + timeout,
                        };
                        debug!(chunk = index, offset = slot.spec.start_offset, "chunk started");
                    }
                }
                Some(ChunkEvent::Finished {
                    index,
                    elapsed,
                    result,
                }) => {
                    let slot = &mut slots[index];
                    match slot.state {
                        SlotState::Abandoned => {
                            slot.state = SlotState::Settled;
                            abandoned -= 1;
                            if abandoned < workers {
                                stalled_since = None;
                            }
                            debug!(chunk = index, "ignoring result of abandoned chunk");
                        }
                        SlotState::Settled => {}
                        SlotState::Queued | SlotState::Running { .. } => {
                            slot.state = SlotState::Settled;
                            pending -= 1;
                            logs.push(self.settle(index, slot.spec, elapsed, result, recorder));
                        }
                    }
                }
                None => {
                    let now = Instant::now();
                    for (index, slot) in slots.iter_mut().enumerate() {
                        if slot.deadline().is_some_and(|d| d <= now) {
                            slot.state = SlotState::Abandoned;
                            abandoned += 1;
                            pending -= 1;
                            logs.push(time_out(index, slot, timeout, recorder));
                        }
                    }
                    if abandoned >= workers && stalled_since.is_none() {
                        stalled_since = Some(now);
                        warn!(workers, "every worker is held by a timed-out chunk");
                    }
                    if queue_deadline.is_some_and(|d| d <= now) {
                        for (index, slot) in slots.iter_mut().enumerate() {
                            if slot.state == SlotState::Queued {
                                slot.state = SlotState::Settled;
                                pending -= 1;
                                logs.push(time_out(index, slot, timeout, recorder));
                            }
                        }
                    }
                }
            }
        }

        // Every sender is gone yet some chunks never reported back.
        for (index, slot) in slots.iter().enumerate() {
            if slot.is_open() {
                recorder.record_failure();
                warn!(chunk = index, "worker exited without reporting");
                logs.push(ChunkLog::new(
                    index,
                    slot.spec,
                    ChunkStatus::Failed {
                        reason: "worker exited without reporting".to_string(),
                    },
                ));
            }
        }
        Ok(logs)
    }

    fn settle(
        &self,
        index: usize,
        spec: ChunkSpec,
        elapsed: Duration,
        result: Result<ChunkOutcome, String>,
        recorder: &StatsRecorder,
    ) -> ChunkLog {
        let mut log = match result {
            Ok(outcome) => {
                recorder.record_chunk(outcome.counts);
                let mut log = ChunkLog::new(index, spec, ChunkStatus::Completed);
                log.counts = outcome.counts;
                log
            }
            Err(reason) => {
                recorder.record_failure();
                warn!(chunk = index, offset = spec.start_offset, "chunk failed: {reason}");
                ChunkLog::new(index, spec, ChunkStatus::Failed { reason })
            }
        };
        log.elapsed_ms = millis(elapsed);
        if let Some(m) = &self.metrics {
            m.observe("chunk_duration_ms", elapsed.as_secs_f64() * 1000.0);
        }
        debug!(
            chunk = index,
            processed = recorder.processed_lines(),
            inserted = recorder.inserted_documents(),
            "progress"
        );
        log
    }

    fn record_metrics(&self, stats: &IngestionStats) {
        let Some(m) = &self.metrics else {
            return;
        };
        m.record_end();
        m.set_counter("total_lines", stats.total_lines);
        m.set_counter("processed_lines", stats.processed_lines);
        m.set_counter("dropped_lines", stats.dropped_lines);
        m.set_counter("inserted_documents", stats.inserted_documents);
        m.set_counter("chunks_planned", stats.chunk_count);
        m.set_counter("chunks_failed", stats.failed_chunks);
        m.set_counter("chunks_timed_out", stats.timed_out_chunks);
        m.register(Box::new(
            GaugeMetric::new("throughput_lines_per_sec", stats.throughput())
                .with_description("Accepted lines per second of wall time"),
        ));
    }
}

/// Raise the cancel flag of `slot` and count it as timed out.
fn time_out(index: usize, slot: &Slot, timeout: Duration, recorder: &StatsRecorder) -> ChunkLog {
    slot.cancel.store(true, Ordering::Relaxed);
    recorder.record_timeout();
    warn!(
        chunk = index,
        offset = slot.spec.start_offset,
        timeout_ms = millis(timeout),
        "chunk timed out; counting it as zero"
    );
    let mut log = ChunkLog::new(index, slot.spec, ChunkStatus::TimedOut);
    log.elapsed_ms = millis(timeout);
    log
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("worker panicked: {s}")
    } else {
        "worker panicked".to_string()
    }
}

/// Ingest `path` into `sink` with `processor_count` workers and default
/// settings otherwise.
///
/// Blocks until every chunk has finished or timed out.
///
/// # Errors
/// `FileNotFound` and `HeaderNotFound` are the expected failures; see
/// [`Runner::run`].
pub fn process_file(
    path: impl AsRef<Path>,
    processor_count: usize,
    sink: Arc<dyn DocumentSink>,
) -> Result<IngestionStats, IngestError> {
    let options = IngestOptions {
        processor_count: Some(processor_count.max(1)),
        ..IngestOptions::default()
    };
    Runner::new(options).run(path, sink)
}
