//! Background drainer thread
//!
//! Owns the `LogConsumer` and the sink. Runs at reduced priority, optionally
//! pinned to the last core, and backs off adaptively when the ring is idle.

use super::ring::LogConsumer;
use crate::config::LoggerConfig;
use crate::core::RingLogError;
use crate::perf::cpu;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Nice value applied to the drainer thread
const DRAINER_NICE: i32 = 10;

/// Spins allowed at shutdown while waiting on a claimed, unpublished slot
const SHUTDOWN_SPIN_LIMIT: u32 = 100_000;

/// Flags the logger front-end uses to steer the drainer
#[derive(Debug)]
pub(crate) struct DrainerControl {
    pub running: AtomicBool,
    pub needs_flush: AtomicBool,
    /// Open high-priority windows; the sink is left alone while non-zero
    pub high_priority: AtomicUsize,
}

impl DrainerControl {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            needs_flush: AtomicBool::new(false),
            high_priority: AtomicUsize::new(0),
        }
    }

    pub fn enter_high_priority(&self) {
        self.high_priority.fetch_add(1, Ordering::AcqRel);
    }

    /// Close one window; unmatched calls leave the depth at zero
    pub fn exit_high_priority(&self) {
        let _ = self
            .high_priority
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |depth| {
                depth.checked_sub(1)
            });
    }

    pub fn in_high_priority(&self) -> bool {
        self.high_priority.load(Ordering::Acquire) > 0
    }
}

/// Counters maintained by the drainer
#[derive(Debug)]
pub(crate) struct DrainerStats {
    pub written: AtomicU64,
    pub batches: AtomicU64,
    pub avg_batch: AtomicUsize,
    pub write_errors: AtomicU64,
    pub sink_panics: AtomicU64,
    pub flushes: AtomicU64,
}

impl DrainerStats {
    pub fn new(min_batch: usize) -> Self {
        Self {
            written: AtomicU64::new(0),
            batches: AtomicU64::new(0),
            avg_batch: AtomicUsize::new(min_batch),
            write_errors: AtomicU64::new(0),
            sink_panics: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
        }
    }

    fn record_batch(&self, processed: usize) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        // Only the drainer writes this; a plain load/store pair is enough
        let avg = self.avg_batch.load(Ordering::Relaxed);
        self.avg_batch
            .store(smoothed_batch(avg, processed), Ordering::Relaxed);
    }
}

/// `(7·avg + 3·processed) / 10`
pub(crate) fn smoothed_batch(avg: usize, processed: usize) -> usize {
    (avg * 7 + processed * 3) / 10
}

/// Tunables copied out of `LoggerConfig`
#[derive(Debug, Clone, Copy)]
pub(crate) struct DrainerSettings {
    pub spin_yield_threshold: u32,
    pub sleep_threshold: u32,
    pub min_sleep: Duration,
    pub max_sleep: Duration,
    pub min_batch: usize,
    pub lower_priority: bool,
    pub pin_to_last_core: bool,
}

impl From<&LoggerConfig> for DrainerSettings {
    fn from(cfg: &LoggerConfig) -> Self {
        Self {
            spin_yield_threshold: cfg.spin_yield_threshold,
            sleep_threshold: cfg.sleep_threshold,
            min_sleep: Duration::from_micros(cfg.min_sleep_us),
            max_sleep: Duration::from_micros(cfg.max_sleep_us),
            min_batch: cfg.min_batch,
            lower_priority: cfg.lower_priority,
            pin_to_last_core: cfg.pin_to_last_core,
        }
    }
}

/// Idle strategy: spin-yield, then yield, then sleep with linear growth
#[derive(Debug)]
pub(crate) struct IdleBackoff {
    idle_iterations: u32,
    current_sleep: Duration,
    settings: DrainerSettings,
}

/// What one idle step did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IdleStep {
    Spin,
    Yield,
    Sleep(Duration),
}

impl IdleBackoff {
    pub fn new(settings: DrainerSettings) -> Self {
        Self {
            idle_iterations: 0,
            current_sleep: settings.min_sleep,
            settings,
        }
    }

    /// Decide the next idle step and advance the back-off state
    pub fn next_step(&mut self) -> IdleStep {
        self.idle_iterations = self.idle_iterations.saturating_add(1);

        if self.idle_iterations < self.settings.spin_yield_threshold {
            IdleStep::Spin
        } else if self.idle_iterations < self.settings.sleep_threshold {
            IdleStep::Yield
        } else {
            let sleep = self.current_sleep;
            if self.current_sleep < self.settings.max_sleep {
                self.current_sleep = (self.current_sleep + Duration::from_micros(1))
                    .min(self.settings.max_sleep);
            }
            IdleStep::Sleep(sleep)
        }
    }

    pub fn wait(&mut self) {
        match self.next_step() {
            IdleStep::Spin => {
                std::hint::spin_loop();
                thread::yield_now();
            }
            IdleStep::Yield => thread::yield_now(),
            IdleStep::Sleep(d) => thread::sleep(d),
        }
    }

    /// Data arrived: start over at the cheapest step
    pub fn reset(&mut self) {
        self.idle_iterations = 0;
        self.current_sleep = self.settings.min_sleep;
    }
}

pub(crate) struct Drainer {
    consumer: LogConsumer,
    sink: Box<dyn Write + Send>,
    control: Arc<DrainerControl>,
    stats: Arc<DrainerStats>,
    settings: DrainerSettings,
}

impl Drainer {
    pub fn new(
        consumer: LogConsumer,
        sink: Box<dyn Write + Send>,
        control: Arc<DrainerControl>,
        stats: Arc<DrainerStats>,
        settings: DrainerSettings,
    ) -> Self {
        Self {
            consumer,
            sink,
            control,
            stats,
            settings,
        }
    }

    pub fn spawn(self) -> Result<JoinHandle<()>, RingLogError> {
        thread::Builder::new()
            .name("ringlog-drainer".to_string())
            .spawn(move || self.run())
            .map_err(RingLogError::Spawn)
    }

    fn run(mut self) {
        self.apply_scheduling();
        tracing::debug!(
            capacity = self.consumer.capacity(),
            "Log drainer started"
        );

        let mut idle = IdleBackoff::new(self.settings);

        while self.control.running.load(Ordering::Acquire) {
            if self.control.in_high_priority() {
                thread::sleep(self.settings.min_sleep);
                continue;
            }

            let pending = self.consumer.pending();
            let flush_requested = self.control.needs_flush.swap(false, Ordering::AcqRel);

            if !pending && !flush_requested {
                idle.wait();
                continue;
            }

            idle.reset();

            let processed = if pending { self.drain_once() } else { 0 };
            if processed > 0 {
                self.stats.record_batch(processed);
            }

            if flush_requested || (processed > 0 && self.consumer.backlog() == 0) {
                self.flush();
            }
        }

        self.shutdown();
    }

    fn apply_scheduling(&self) {
        if self.settings.lower_priority {
            if let Err(e) = cpu::lower_current_thread_priority(DRAINER_NICE) {
                tracing::warn!("Log drainer keeps default priority: {:#}", e);
            }
        }
        if self.settings.pin_to_last_core {
            if let Err(e) = cpu::pin_to_last_core() {
                tracing::warn!("Log drainer not pinned: {:#}", e);
            }
        }
    }

    /// One batch from the ring into the sink
    fn drain_once(&mut self) -> usize {
        let Self {
            consumer,
            sink,
            stats,
            settings,
            ..
        } = self;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            consumer.drain_batch(settings.min_batch, |line| {
                write_line(sink.as_mut(), stats, line);
            })
        }));

        match outcome {
            Ok(processed) => processed,
            Err(_) => {
                let n = stats.sink_panics.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::error!(sink_panics = n, "Log sink panicked; batch abandoned");
                0
            }
        }
    }

    fn flush(&mut self) {
        let Self { sink, stats, .. } = self;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| sink.flush()));
        match outcome {
            Ok(Ok(())) => {
                stats.flushes.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(e)) => {
                stats.write_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Log sink flush failed: {}", e);
            }
            Err(_) => {
                stats.sink_panics.fetch_add(1, Ordering::Relaxed);
                tracing::error!("Log sink panicked during flush");
            }
        }
    }

    /// Seal the ring, drain everything, report drops, flush
    fn shutdown(mut self) {
        self.consumer.seal();

        let mut spins = 0u32;
        while self.consumer.backlog() > 0 {
            let processed = self.drain_once();
            if processed > 0 {
                self.stats.record_batch(processed);
                spins = 0;
                continue;
            }
            // A producer claimed a slot and has not published it yet
            spins += 1;
            if spins > SHUTDOWN_SPIN_LIMIT {
                tracing::warn!(
                    backlog = self.consumer.backlog(),
                    "Log drainer gave up on unpublished entries at shutdown"
                );
                break;
            }
            thread::yield_now();
        }

        let dropped = self.consumer.dropped();
        if dropped > 0 {
            let line = format!("Dropped {} log messages due to full buffer.\n", dropped);
            let Self { sink, stats, .. } = &mut self;
            let _ = panic::catch_unwind(AssertUnwindSafe(|| {
                write_line(sink.as_mut(), stats, &line);
            }));
        }

        self.flush();
        tracing::debug!(
            written = self.stats.written.load(Ordering::Relaxed),
            dropped,
            "Log drainer stopped"
        );
    }
}

fn write_line(sink: &mut dyn Write, stats: &DrainerStats, line: &str) {
    match sink.write_all(line.as_bytes()) {
        Ok(()) => {
            stats.written.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            let n = stats.write_errors.fetch_add(1, Ordering::Relaxed) + 1;
            if n == 1 || n % 1024 == 0 {
                tracing::warn!(write_errors = n, "Log sink write failed: {}", e);
            }
        }
    }
}
