//! Category-based logging for the console core.
//!
//! Hardware faults in this emulator are never fatal: unmapped bus accesses,
//! out-of-range register fields and frame overruns are reported here and the
//! emulation carries on. Every message is produced lazily so that a disabled
//! category costs one atomic load.
//!
//! - **LogConfig**: global configuration held in atomics
//! - **LogLevel**: `Off < Error < Warn < Info < Debug < Trace`
//! - **LogCategory**: CPU, bus decoder, TIA, RIOT, frame scheduler, stubs
//! - **log()**: the single entry point, rate limited per category
//!
//! File output goes through a background writer thread so a slow disk never
//! stalls the tick loop.
//!
//! ```rust
//! use vcs_core::logging::{log, LogCategory, LogLevel};
//!
//! log(LogCategory::Bus, LogLevel::Debug, || {
//!     format!("Bus: unmapped read at {:04X}", 0x0200)
//! });
//! ```

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

const CATEGORY_COUNT: usize = 6;

/// Log level for controlling verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    /// Parse log level from string (case-insensitive)
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "off" | "0" => Some(LogLevel::Off),
            "error" | "err" | "1" => Some(LogLevel::Error),
            "warn" | "warning" | "2" => Some(LogLevel::Warn),
            "info" | "3" => Some(LogLevel::Info),
            "debug" | "4" => Some(LogLevel::Debug),
            "trace" | "5" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    fn from_u8(val: u8) -> Self {
        match val {
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            5 => LogLevel::Trace,
            _ => LogLevel::Off,
        }
    }
}

/// Log category for the emulated components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    /// CPU core stepping and interrupt polling
    Cpu,
    /// Address decode and unmapped accesses
    Bus,
    /// Video chip register writes and draw state
    Tia,
    /// Companion chip RAM and I/O window
    Riot,
    /// Frame pacing and lifecycle
    Scheduler,
    /// Decoded registers whose behavior is not emulated
    Stubs,
}

impl LogCategory {
    pub const ALL: [LogCategory; CATEGORY_COUNT] = [
        LogCategory::Cpu,
        LogCategory::Bus,
        LogCategory::Tia,
        LogCategory::Riot,
        LogCategory::Scheduler,
        LogCategory::Stubs,
    ];

    /// Parse a category name (case-insensitive)
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cpu" => Some(LogCategory::Cpu),
            "bus" => Some(LogCategory::Bus),
            "tia" | "video" => Some(LogCategory::Tia),
            "riot" => Some(LogCategory::Riot),
            "scheduler" | "sched" => Some(LogCategory::Scheduler),
            "stubs" | "stub" => Some(LogCategory::Stubs),
            _ => None,
        }
    }

    fn index(self) -> usize {
        match self {
            LogCategory::Cpu => 0,
            LogCategory::Bus => 1,
            LogCategory::Tia => 2,
            LogCategory::Riot => 3,
            LogCategory::Scheduler => 4,
            LogCategory::Stubs => 5,
        }
    }
}

/// Per-category sliding window limiter.
struct RateLimiter {
    max_logs_per_second: AtomicUsize,
    window_duration: Duration,
    timestamps: Mutex<[VecDeque<Instant>; CATEGORY_COUNT]>,
    dropped_counts: Mutex<[usize; CATEGORY_COUNT]>,
    last_drop_report: Mutex<[Option<Instant>; CATEGORY_COUNT]>,
}

impl RateLimiter {
    fn new(max_logs_per_second: usize) -> Self {
        Self {
            max_logs_per_second: AtomicUsize::new(max_logs_per_second),
            window_duration: Duration::from_secs(1),
            timestamps: Mutex::new(std::array::from_fn(|_| VecDeque::new())),
            dropped_counts: Mutex::new([0; CATEGORY_COUNT]),
            last_drop_report: Mutex::new([None; CATEGORY_COUNT]),
        }
    }

    fn set_max_logs_per_second(&self, max: usize) {
        self.max_logs_per_second.store(max, Ordering::Relaxed);
    }

    fn get_max_logs_per_second(&self) -> usize {
        self.max_logs_per_second.load(Ordering::Relaxed)
    }

    /// Returns (allowed, dropped) where `dropped` is Some(n) when a summary of
    /// n suppressed messages is due.
    fn should_allow(&self, category: LogCategory) -> (bool, Option<usize>) {
        let now = Instant::now();
        let idx = category.index();

        // A poisoned lock only means another thread panicked mid-log; the
        // counters are still usable.
        let mut timestamps = self.timestamps.lock().unwrap_or_else(|e| e.into_inner());
        let mut dropped_counts = self.dropped_counts.lock().unwrap_or_else(|e| e.into_inner());
        let mut last_drop_report = self
            .last_drop_report
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        let window = &mut timestamps[idx];
        while let Some(&front) = window.front() {
            if now.duration_since(front) > self.window_duration {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() < self.get_max_logs_per_second() {
            window.push_back(now);

            let dropped = dropped_counts[idx];
            if dropped > 0 {
                dropped_counts[idx] = 0;
                last_drop_report[idx] = Some(now);
                return (true, Some(dropped));
            }

            (true, None)
        } else {
            dropped_counts[idx] += 1;

            let should_report = match last_drop_report[idx] {
                None => true,
                Some(last) => now.duration_since(last) >= Duration::from_secs(1),
            };

            if should_report {
                let dropped = dropped_counts[idx];
                dropped_counts[idx] = 0;
                last_drop_report[idx] = Some(now);
                (false, Some(dropped))
            } else {
                (false, None)
            }
        }
    }
}

/// Global logging configuration
pub struct LogConfig {
    global_level: AtomicU8,
    category_levels: [AtomicU8; CATEGORY_COUNT],
    log_sender: Mutex<Option<Sender<String>>>,
    file_logging_enabled: AtomicBool,
    rate_limiter: RateLimiter,
}

impl LogConfig {
    /// All logging disabled, 60 messages per second per category
    fn new() -> Self {
        Self {
            global_level: AtomicU8::new(LogLevel::Off as u8),
            category_levels: std::array::from_fn(|_| AtomicU8::new(LogLevel::Off as u8)),
            log_sender: Mutex::new(None),
            file_logging_enabled: AtomicBool::new(false),
            rate_limiter: RateLimiter::new(60),
        }
    }

    /// Get the global singleton instance
    pub fn global() -> &'static Self {
        static INSTANCE: OnceLock<LogConfig> = OnceLock::new();
        INSTANCE.get_or_init(LogConfig::new)
    }

    /// Set the level used by every category without an override
    pub fn set_global_level(&self, level: LogLevel) {
        self.global_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn get_global_level(&self) -> LogLevel {
        LogLevel::from_u8(self.global_level.load(Ordering::Relaxed))
    }

    /// Override the level for one category (`Off` removes the override)
    pub fn set_level(&self, category: LogCategory, level: LogLevel) {
        self.category_levels[category.index()].store(level as u8, Ordering::Relaxed);
    }

    pub fn get_level(&self, category: LogCategory) -> LogLevel {
        LogLevel::from_u8(self.category_levels[category.index()].load(Ordering::Relaxed))
    }

    /// A category override wins over the global level when it is not `Off`.
    pub fn should_log(&self, category: LogCategory, level: LogLevel) -> bool {
        let category_level = self.get_level(category);
        if category_level != LogLevel::Off {
            level <= category_level
        } else {
            level <= self.get_global_level()
        }
    }

    /// Reset all logging to Off
    pub fn reset(&self) {
        self.set_global_level(LogLevel::Off);
        for category in LogCategory::ALL {
            self.set_level(category, LogLevel::Off);
        }
    }

    /// Set the maximum logs per second per category
    pub fn set_rate_limit(&self, max_logs_per_second: usize) {
        self.rate_limiter
            .set_max_logs_per_second(max_logs_per_second);
    }

    pub fn get_rate_limit(&self) -> usize {
        self.rate_limiter.get_max_logs_per_second()
    }

    /// Append log output to `path` through a background writer thread.
    ///
    /// Replaces any previous log file.
    pub fn set_log_file(&self, path: PathBuf) -> std::io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let (sender, receiver) = channel::<String>();

        thread::Builder::new()
            .name("log-writer".to_string())
            .spawn(move || {
                let mut file = file;
                while let Ok(message) = receiver.recv() {
                    let _ = writeln!(file, "{}", message);
                    let _ = file.flush();
                }
                let _ = file.flush();
            })?;

        let mut log_sender = self.log_sender.lock().unwrap_or_else(|e| e.into_inner());
        *log_sender = Some(sender);
        self.file_logging_enabled.store(true, Ordering::Relaxed);

        Ok(())
    }

    /// Stop logging to file; the writer thread exits once its sender drops
    pub fn clear_log_file(&self) {
        let mut log_sender = self.log_sender.lock().unwrap_or_else(|e| e.into_inner());
        *log_sender = None;
        self.file_logging_enabled.store(false, Ordering::Relaxed);
    }

    fn write_message(&self, message: &str) {
        if self.file_logging_enabled.load(Ordering::Relaxed) {
            let log_sender = self.log_sender.lock().unwrap_or_else(|e| e.into_inner());
            match log_sender.as_ref() {
                Some(sender) if sender.send(message.to_string()).is_ok() => {}
                _ => eprintln!("{}", message),
            }
        } else {
            eprintln!("{}", message);
        }
    }
}

/// Log a message with the specified category and level.
///
/// `message_fn` only runs when the category is enabled at `level` and the
/// category's rate limit has room. Suppressed messages are summarised once
/// per second.
pub fn log<F>(category: LogCategory, level: LogLevel, message_fn: F)
where
    F: FnOnce() -> String,
{
    let config = LogConfig::global();
    if !config.should_log(category, level) {
        return;
    }

    let (allowed, dropped_count) = config.rate_limiter.should_allow(category);

    if let Some(count) = dropped_count {
        if count > 0 {
            config.write_message(&format!(
                "[{:?}] WARNING: Rate limit exceeded, {} log message(s) dropped in the last second",
                category, count
            ));
        }
    }

    if allowed {
        config.write_message(&message_fn());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from_str("OFF"), Some(LogLevel::Off));
        assert_eq!(LogLevel::from_str("err"), Some(LogLevel::Error));
        assert_eq!(LogLevel::from_str("Warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_str("3"), Some(LogLevel::Info));
        assert_eq!(LogLevel::from_str("debug"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_str("TRACE"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::from_str("loud"), None);
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!(LogCategory::from_str("TIA"), Some(LogCategory::Tia));
        assert_eq!(LogCategory::from_str("video"), Some(LogCategory::Tia));
        assert_eq!(LogCategory::from_str("sched"), Some(LogCategory::Scheduler));
        assert_eq!(LogCategory::from_str("apu"), None);
    }

    #[test]
    fn test_category_indices_are_distinct() {
        let mut seen = [false; CATEGORY_COUNT];
        for category in LogCategory::ALL {
            assert!(!seen[category.index()]);
            seen[category.index()] = true;
        }
    }

    #[test]
    fn test_category_level_overrides_global() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Error);
        config.set_level(LogCategory::Tia, LogLevel::Debug);

        assert!(config.should_log(LogCategory::Tia, LogLevel::Debug));
        assert!(!config.should_log(LogCategory::Tia, LogLevel::Trace));
        assert!(!config.should_log(LogCategory::Bus, LogLevel::Warn));
        assert!(config.should_log(LogCategory::Bus, LogLevel::Error));
    }

    #[test]
    fn test_reset() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Trace);
        config.set_level(LogCategory::Scheduler, LogLevel::Info);

        config.reset();

        assert_eq!(config.get_global_level(), LogLevel::Off);
        assert_eq!(config.get_level(LogCategory::Scheduler), LogLevel::Off);
    }

    #[test]
    fn test_rate_limiter_is_per_category() {
        let limiter = RateLimiter::new(3);
        for _ in 0..3 {
            assert!(limiter.should_allow(LogCategory::Bus).0);
        }

        assert!(!limiter.should_allow(LogCategory::Bus).0);
        assert!(limiter.should_allow(LogCategory::Tia).0);
    }

    #[test]
    fn test_rate_limiter_reports_dropped_count() {
        let limiter = RateLimiter::new(2);
        limiter.should_allow(LogCategory::Stubs);
        limiter.should_allow(LogCategory::Stubs);

        // First drop reports immediately, the rest accumulate
        let (allowed, dropped) = limiter.should_allow(LogCategory::Stubs);
        assert!(!allowed);
        assert_eq!(dropped, Some(1));

        for _ in 0..4 {
            let (allowed, dropped) = limiter.should_allow(LogCategory::Stubs);
            assert!(!allowed);
            assert_eq!(dropped, None);
        }
    }
}
