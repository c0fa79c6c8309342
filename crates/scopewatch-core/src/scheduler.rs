//! Periodic pipeline driver
//!
//! Every registered pipeline gets its own ticker and its own loop task, so a
//! slow freshness cycle never delays the scope feed and vice versa.
//!
//! ## Overlap
//!
//! - [`OverlapPolicy::Serialize`]: the cycle runs inside the loop task, so
//!   the next tick is only observed once it returns. Ticks that fired in the
//!   meantime are skipped, not queued.
//! - [`OverlapPolicy::Allow`]: every tick spawns a cycle, even if earlier
//!   ones are still running.
//!
//! ## Failure
//!
//! Under [`FailurePolicy::Exit`] the first fatal-class error stops every
//! loop and is returned from [`Scheduler::run`]. Non-fatal errors are only
//! logged. Under [`FailurePolicy::RetryNextTick`] nothing stops the loops.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, error, info, warn};

use crate::config::{FailurePolicy, OverlapPolicy, ScheduleConfig};
use crate::engine::{EventSink, Pipeline, PipelineEvent};
use crate::error::{Error, Result};

struct Scheduled {
    pipeline: Arc<dyn Pipeline>,
    period: Duration,
}

/// Drives pipelines on fixed intervals until shutdown
pub struct Scheduler {
    pipelines: Vec<Scheduled>,
    run_on_start: bool,
    overlap: OverlapPolicy,
    on_failure: FailurePolicy,
    events: EventSink,
}

impl Scheduler {
    pub fn new(config: &ScheduleConfig) -> Self {
        Self {
            pipelines: Vec::new(),
            run_on_start: config.run_on_start,
            overlap: config.overlap,
            on_failure: config.on_failure,
            events: EventSink::disabled(),
        }
    }

    /// Report cycle start/completion/failure on `events`
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Register a pipeline to run every `period`
    pub fn add(&mut self, pipeline: Arc<dyn Pipeline>, period: Duration) {
        info!("Scheduling {} every {:?}", pipeline.name(), period);
        self.pipelines.push(Scheduled { pipeline, period });
    }

    /// Number of registered pipelines
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// Run until Ctrl-C or a fatal error
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: Fatal error under [`FailurePolicy::Exit`]
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run until `shutdown_rx` fires or a fatal error
    ///
    /// With `None` this behaves like [`Scheduler::run`].
    pub async fn run_with_shutdown(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        if self.pipelines.is_empty() {
            return Err(Error::config("No pipelines scheduled"));
        }

        let mut loops: JoinSet<Result<()>> = JoinSet::new();
        for scheduled in &self.pipelines {
            loops.spawn(pipeline_loop(
                Arc::clone(&scheduled.pipeline),
                scheduled.period,
                self.run_on_start,
                self.overlap,
                self.on_failure,
                self.events.clone(),
            ));
        }

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to listen for shutdown signal: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
        };
        tokio::pin!(shutdown);

        let result = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break Ok(());
                }
                joined = loops.join_next() => match joined {
                    Some(Ok(Ok(()))) => continue,
                    Some(Ok(Err(e))) => {
                        error!("Stopping scheduler: {}", e);
                        break Err(e);
                    }
                    Some(Err(e)) => {
                        error!("Pipeline loop crashed: {}", e);
                        break Err(Error::Task(e.to_string()));
                    }
                    None => break Ok(()),
                },
            }
        };

        // Abort in-flight cycles and wait until they are gone
        loops.abort_all();
        while loops.join_next().await.is_some() {}
        debug!("All pipeline loops stopped");

        result
    }
}

async fn pipeline_loop(
    pipeline: Arc<dyn Pipeline>,
    period: Duration,
    run_on_start: bool,
    overlap: OverlapPolicy,
    on_failure: FailurePolicy,
    events: EventSink,
) -> Result<()> {
    let start = if run_on_start {
        Instant::now()
    } else {
        Instant::now() + period
    };
    let mut ticker = interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut ticks = IntervalStream::new(ticker);

    match overlap {
        OverlapPolicy::Serialize => {
            while ticks.next().await.is_some() {
                if let Err(e) = run_once(pipeline.as_ref(), &events).await
                    && stops_scheduler(on_failure, &e)
                {
                    return Err(e);
                }
            }
        }
        OverlapPolicy::Allow => {
            let mut in_flight: JoinSet<Result<()>> = JoinSet::new();
            loop {
                tokio::select! {
                    Some(_) = ticks.next() => {
                        if !in_flight.is_empty() {
                            debug!("{} still has {} cycle(s) running", pipeline.name(), in_flight.len());
                        }
                        let pipeline = Arc::clone(&pipeline);
                        let events = events.clone();
                        in_flight.spawn(async move { run_once(pipeline.as_ref(), &events).await });
                    }
                    Some(joined) = in_flight.join_next() => match joined {
                        Ok(Err(e)) if stops_scheduler(on_failure, &e) => return Err(e),
                        Ok(_) => {}
                        Err(e) => warn!("{} cycle task ended abnormally: {}", pipeline.name(), e),
                    },
                    else => break,
                }
            }
        }
    }

    Ok(())
}

/// Run one cycle and report it
async fn run_once(pipeline: &dyn Pipeline, events: &EventSink) -> Result<()> {
    let name = pipeline.name();
    events.emit(PipelineEvent::CycleStarted {
        pipeline: name.to_string(),
    });
    debug!("{} cycle started", name);

    match pipeline.run_cycle().await {
        Ok(report) => {
            info!(
                "{} cycle finished: {:?}, {} record(s), {} change(s) in {}ms",
                name,
                report.outcome,
                report.records,
                report.changes.len(),
                (report.finished_at - report.started_at).num_milliseconds()
            );
            events.emit(PipelineEvent::CycleCompleted {
                pipeline: name.to_string(),
                changes: report.changes.len(),
            });
            Ok(())
        }
        Err(e) => {
            if e.is_fatal() {
                error!("{} cycle failed: {}", name, e);
            } else {
                warn!("{} cycle failed: {}", name, e);
            }
            events.emit(PipelineEvent::CycleFailed {
                pipeline: name.to_string(),
                error: e.to_string(),
                fatal: e.is_fatal(),
            });
            Err(e)
        }
    }
}

fn stops_scheduler(policy: FailurePolicy, error: &Error) -> bool {
    policy == FailurePolicy::Exit && error.is_fatal()
}
