//! RingLog: lock-free asynchronous decision log
//!
//! The decision thread formats entries straight into pre-allocated ring
//! slots and moves on; a single low-priority drainer thread writes them to
//! the sink. Under overload entries are dropped and counted rather than
//! blocking the producer.
//!
//! ```no_run
//! use tachyon_core::config::LoggerConfig;
//! use tachyon_core::ringlog::RingLog;
//! use tachyon_core::ring_log;
//!
//! let log = RingLog::open(&LoggerConfig::default()).unwrap();
//! ring_log!(log, "signal={:.4} size={}", 0.42, 17);
//! log.signal_flush();
//! ```

mod drainer;
pub mod ring;
pub mod timestamp;

pub use ring::{bounded, LogConsumer, LogProducer};

use crate::config::LoggerConfig;
use crate::core::RingLogError;
use chrono::{DateTime, Local};
use drainer::{Drainer, DrainerControl, DrainerSettings, DrainerStats};
use serde::Serialize;
use std::fmt;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Sink buffer size for file-backed logs
const FILE_BUFFER_BYTES: usize = 64 * 1024;

/// Log a formatted entry through a `RingLog` or `LogProducer`
#[macro_export]
macro_rules! ring_log {
    ($log:expr, $($arg:tt)+) => {
        $log.log(format_args!($($arg)+))
    };
}

impl LogProducer {
    /// Log with the current local time
    #[inline]
    pub fn log(&self, args: fmt::Arguments<'_>) -> bool {
        self.log_at(&Local::now(), args)
    }

    /// Log with an explicit timestamp
    pub fn log_at(&self, timestamp: &DateTime<Local>, args: fmt::Arguments<'_>) -> bool {
        timestamp::with_formatted(timestamp, |ts| self.push(ts, args))
    }
}

/// Point-in-time view of the logger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RingLogStats {
    /// Entries written to the sink
    pub written: u64,
    /// Entries dropped because the ring was full
    pub dropped: u64,
    /// Entries claimed but not yet drained
    pub backlog: usize,
    pub batches: u64,
    /// Smoothed drain batch size
    pub avg_batch: usize,
    pub write_errors: u64,
    pub sink_panics: u64,
    pub flushes: u64,
}

/// Asynchronous logger: producer front-end plus the drainer thread it owns
///
/// Dropping it stops the drainer, which drains every published entry,
/// appends the dropped-count line and flushes the sink.
pub struct RingLog {
    producer: LogProducer,
    control: Arc<DrainerControl>,
    stats: Arc<DrainerStats>,
    handle: Option<JoinHandle<()>>,
}

impl RingLog {
    /// Append to the file named in `config`
    pub fn open(config: &LoggerConfig) -> Result<Self, RingLogError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.path)
            .map_err(|source| RingLogError::SinkOpen {
                path: config.path.clone(),
                source,
            })?;

        tracing::info!(path = %config.path.display(), "Opened decision log");
        Self::with_sink(BufWriter::with_capacity(FILE_BUFFER_BYTES, file), config)
    }

    /// Drain into any writer
    pub fn with_sink<W>(sink: W, config: &LoggerConfig) -> Result<Self, RingLogError>
    where
        W: Write + Send + 'static,
    {
        Self::start(Box::new(sink), config, false)
    }

    pub(crate) fn start(
        sink: Box<dyn Write + Send>,
        config: &LoggerConfig,
        paused: bool,
    ) -> Result<Self, RingLogError> {
        let (producer, consumer) = ring::bounded(config.capacity)?;
        let settings = DrainerSettings::from(config);

        let control = Arc::new(DrainerControl::new());
        if paused {
            control.enter_high_priority();
        }
        let stats = Arc::new(DrainerStats::new(settings.min_batch));

        let handle = Drainer::new(
            consumer,
            sink,
            Arc::clone(&control),
            Arc::clone(&stats),
            settings,
        )
        .spawn()?;

        Ok(Self {
            producer,
            control,
            stats,
            handle: Some(handle),
        })
    }

    /// Non-blocking; `false` means the entry was dropped
    #[inline]
    pub fn log(&self, args: fmt::Arguments<'_>) -> bool {
        self.producer.log(args)
    }

    #[inline]
    pub fn log_at(&self, timestamp: &DateTime<Local>, args: fmt::Arguments<'_>) -> bool {
        self.producer.log_at(timestamp, args)
    }

    /// Ask the drainer to flush the sink on its next pass
    pub fn signal_flush(&self) {
        self.control.needs_flush.store(true, Ordering::Release);
    }

    /// Open (`true`) or close (`false`) a high-priority window
    ///
    /// Windows nest: the drainer stays off the sink and sleeps between
    /// checks until every caller sharing this log has closed its window.
    pub fn notify_high_priority(&self, active: bool) {
        if active {
            self.control.enter_high_priority();
        } else {
            self.control.exit_high_priority();
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.producer.dropped()
    }

    /// Extra producer handle for another thread
    ///
    /// A handle that outlives the log keeps working but every entry it
    /// pushes afterwards is refused and counted in its `dropped()`.
    pub fn producer(&self) -> LogProducer {
        self.producer.clone()
    }

    pub fn stats(&self) -> RingLogStats {
        let load = |c: &std::sync::atomic::AtomicU64| c.load(Ordering::Relaxed);
        RingLogStats {
            written: load(&self.stats.written),
            dropped: self.producer.dropped(),
            backlog: self.producer.len(),
            batches: load(&self.stats.batches),
            avg_batch: self.stats.avg_batch.load(Ordering::Relaxed),
            write_errors: load(&self.stats.write_errors),
            sink_panics: load(&self.stats.sink_panics),
            flushes: load(&self.stats.flushes),
        }
    }
}

impl Drop for RingLog {
    fn drop(&mut self) {
        self.control.high_priority.store(0, Ordering::Release);
        self.control.running.store(false, Ordering::Release);

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Log drainer thread panicked");
            }
        }
    }
}
