//! Real-time frame pacing
//!
//! [`FrameScheduler`] runs one [`System`] frame at a time and paces output to
//! roughly 60 Hz. It never sleeps on its own: it hands the host a
//! [`ScheduledFrame`] token saying when the next frame is due, and the host
//! calls [`FrameScheduler::fire`] with that token once the time has come.
//! This keeps the host's event loop in charge of waiting.
//!
//! Every lifecycle transition (play, pause, stop, restart) bumps a generation
//! counter. A token issued before the transition no longer matches and `fire`
//! rejects it, so a stale wake-up can never run a frame against freshly reset
//! state.
//!
//! Time comes from a [`Clock`]. [`SystemClock`] follows the host's monotonic
//! clock; [`VirtualClock`] only moves when told to, which makes pacing fully
//! deterministic in tests and headless runs.
//!
//! ```text
//!  Stopped --play--> Running --pause--> Paused --play--> Running
//!     ^                 |                  |
//!     +------stop-------+-------stop-------+
//!  restart (any state): reset system, clear history -> Running
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::display::FrameSink;
use crate::logging::{log, LogCategory, LogLevel};
use crate::System;

/// Monotonic time source used for pacing.
pub trait Clock {
    /// Time elapsed since the clock's origin
    fn now(&self) -> Duration;

    /// Wait (or advance) until `deadline`. Returns immediately when the
    /// deadline has already passed.
    fn sleep_until(&mut self, deadline: Duration);
}

/// Host wall clock
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep_until(&mut self, deadline: Duration) {
        let now = self.now();
        if deadline > now {
            thread::sleep(deadline - now);
        }
    }
}

/// Manually driven clock. Clones share the same time, so a test system can
/// hold one and advance it to simulate slow frames.
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    nanos: Arc<AtomicU64>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }

    fn sleep_until(&mut self, deadline: Duration) {
        self.nanos
            .fetch_max(deadline.as_nanos() as u64, Ordering::SeqCst);
    }
}

/// Pacing parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Target time between frame starts
    pub frame_budget_ms: u64,
    /// Floor for the delay before the next frame, also applied on overrun
    pub min_delay_ms: u64,
    /// Number of frame intervals averaged for FPS
    pub history_len: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            frame_budget_ms: 16,
            min_delay_ms: 1,
            history_len: 16,
        }
    }
}

impl SchedulerConfig {
    pub fn frame_budget(&self) -> Duration {
        Duration::from_millis(self.frame_budget_ms)
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    /// Delay before the next frame: `max(min_delay, budget - work)`
    pub fn delay_after(&self, work: Duration) -> Duration {
        self.frame_budget()
            .saturating_sub(work)
            .max(self.min_delay())
    }
}

/// Circular window of recent frame intervals.
#[derive(Debug, Clone)]
pub struct FrameHistory {
    samples: Vec<Duration>,
    cursor: usize,
    filled: usize,
}

impl FrameHistory {
    pub fn new(len: usize) -> Self {
        Self {
            samples: vec![Duration::ZERO; len.max(1)],
            cursor: 0,
            filled: 0,
        }
    }

    pub fn record(&mut self, sample: Duration) {
        self.samples[self.cursor] = sample;
        self.cursor = (self.cursor + 1) % self.samples.len();
        self.filled = (self.filled + 1).min(self.samples.len());
    }

    pub fn clear(&mut self) {
        self.samples.fill(Duration::ZERO);
        self.cursor = 0;
        self.filled = 0;
    }

    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    pub fn mean(&self) -> Option<Duration> {
        if self.filled == 0 {
            return None;
        }
        // Unfilled slots are zero, so summing the whole ring is exact
        let total: Duration = self.samples.iter().sum();
        Some(total / self.filled as u32)
    }

    /// `1000 / mean_ms`, or 0.0 while there is nothing to average
    pub fn fps(&self) -> f64 {
        match self.mean() {
            Some(mean) if !mean.is_zero() => 1.0 / mean.as_secs_f64(),
            _ => 0.0,
        }
    }
}

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    Running,
    Paused,
}

/// When the next frame should run, tagged with the lifecycle generation it
/// was issued in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledFrame {
    pub due: Duration,
    generation: u64,
}

impl ScheduledFrame {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Measurements for one delivered frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    /// 1-based count of frames delivered since construction
    pub frame: u64,
    /// Time spent emulating and presenting
    pub work: Duration,
    /// Start-to-start distance from the previous frame, if there was one in
    /// this run
    pub interval: Option<Duration>,
    pub fps: f64,
    /// The frame took at least the whole budget
    pub overrun: bool,
    pub next: ScheduledFrame,
}

/// Result of [`FrameScheduler::fire`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FireOutcome {
    Ran(FrameStats),
    /// Token from an earlier generation, or the scheduler is not running
    Stale,
    /// Token is current but its time has not come yet
    NotDue(ScheduledFrame),
}

/// Drives a [`System`] one frame per wake-up at a fixed cadence.
pub struct FrameScheduler<S: System, C: Clock> {
    system: S,
    clock: C,
    config: SchedulerConfig,
    state: RunState,
    history: FrameHistory,
    generation: u64,
    pending: Option<ScheduledFrame>,
    last_start: Option<Duration>,
    frames_delivered: u64,
    fps: f64,
}

impl<S: System, C: Clock> FrameScheduler<S, C> {
    /// Create a stopped scheduler
    pub fn new(system: S, clock: C, config: SchedulerConfig) -> Self {
        let history = FrameHistory::new(config.history_len);
        Self {
            system,
            clock,
            config,
            state: RunState::Stopped,
            history,
            generation: 0,
            pending: None,
            last_start: None,
            frames_delivered: 0,
            fps: 0.0,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn frames_delivered(&self) -> u64 {
        self.frames_delivered
    }

    pub fn history(&self) -> &FrameHistory {
        &self.history
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn system(&self) -> &S {
        &self.system
    }

    pub fn system_mut(&mut self) -> &mut S {
        &mut self.system
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn into_system(self) -> S {
        self.system
    }

    /// The currently valid wake-up, if running
    pub fn next_frame(&self) -> Option<ScheduledFrame> {
        self.pending
    }

    /// Start or resume. The first frame is due immediately.
    pub fn play(&mut self) {
        match self.state {
            RunState::Running => {}
            RunState::Stopped | RunState::Paused => {
                log(LogCategory::Scheduler, LogLevel::Info, || {
                    format!("Scheduler: {:?} -> Running", self.state)
                });
                self.state = RunState::Running;
                self.last_start = None;
                self.schedule_now();
            }
        }
    }

    /// Pause at the next frame boundary. Frames always run to completion, so
    /// by the time this is callable no frame is in progress.
    pub fn pause(&mut self) {
        if self.state == RunState::Running {
            log(LogCategory::Scheduler, LogLevel::Info, || {
                "Scheduler: Running -> Paused".to_string()
            });
            self.state = RunState::Paused;
            self.invalidate();
        }
    }

    pub fn stop(&mut self) {
        if self.state != RunState::Stopped {
            log(LogCategory::Scheduler, LogLevel::Info, || {
                format!("Scheduler: {:?} -> Stopped", self.state)
            });
        }
        self.state = RunState::Stopped;
        self.invalidate();
    }

    /// Reset the system (mounted media is kept), forget pacing history and
    /// start running.
    pub fn restart(&mut self) {
        log(LogCategory::Scheduler, LogLevel::Info, || {
            format!("Scheduler: restart from {:?}", self.state)
        });
        self.system.reset();
        self.history.clear();
        self.fps = 0.0;
        self.last_start = None;
        self.state = RunState::Running;
        self.schedule_now();
    }

    fn invalidate(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.pending = None;
    }

    fn schedule_now(&mut self) {
        self.invalidate();
        self.pending = Some(ScheduledFrame {
            due: self.clock.now(),
            generation: self.generation,
        });
    }

    /// Run the frame `token` refers to and deliver it to `sink`.
    pub fn fire(
        &mut self,
        token: ScheduledFrame,
        sink: &mut dyn FrameSink,
    ) -> Result<FireOutcome, S::Error> {
        if self.state != RunState::Running || self.pending != Some(token) {
            log(LogCategory::Scheduler, LogLevel::Trace, || {
                format!(
                    "Scheduler: ignoring stale wake-up (generation {} vs {})",
                    token.generation, self.generation
                )
            });
            return Ok(FireOutcome::Stale);
        }

        let start = self.clock.now();
        if start < token.due {
            return Ok(FireOutcome::NotDue(token));
        }
        self.pending = None;

        let frame = self.system.step_frame()?;
        sink.present(frame);

        let end = self.clock.now();
        let work = end.saturating_sub(start);
        let interval = self.last_start.map(|prev| start.saturating_sub(prev));
        self.last_start = Some(start);

        if let Some(interval) = interval {
            self.history.record(interval);
            self.fps = self.history.fps();
        }

        let overrun = work >= self.config.frame_budget();
        if overrun {
            log(LogCategory::Scheduler, LogLevel::Debug, || {
                format!(
                    "Scheduler: frame {} overran budget ({:?} >= {:?})",
                    self.frames_delivered + 1,
                    work,
                    self.config.frame_budget()
                )
            });
        }

        let next = ScheduledFrame {
            due: end + self.config.delay_after(work),
            generation: self.generation,
        };
        self.pending = Some(next);
        self.frames_delivered += 1;

        log(LogCategory::Scheduler, LogLevel::Trace, || {
            format!("Scheduler: frame {} fps {:.1}", self.frames_delivered, self.fps)
        });

        Ok(FireOutcome::Ran(FrameStats {
            frame: self.frames_delivered,
            work,
            interval,
            fps: self.fps,
            overrun,
            next,
        }))
    }

    /// Host loop: wait for each wake-up through the clock and fire it, until
    /// `count` frames ran or the scheduler stops running. Returns the number
    /// of frames delivered.
    pub fn run_frames(&mut self, count: u64, sink: &mut dyn FrameSink) -> Result<u64, S::Error> {
        let mut delivered = 0;
        while delivered < count {
            let Some(token) = self.pending else {
                break;
            };
            self.clock.sleep_until(token.due);
            if let FireOutcome::Ran(_) = self.fire(token, sink)? {
                delivered += 1;
            }
        }
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Frame;
    use crate::MountPointInfo;
    use serde_json::Value;

    /// Counts frames and optionally burns virtual time per frame
    struct CountingSystem {
        frame: Frame,
        frames: u64,
        resets: u32,
        clock: VirtualClock,
        cost: Duration,
    }

    impl CountingSystem {
        fn new(clock: VirtualClock, cost: Duration) -> Self {
            Self {
                frame: Frame::new(1, 1),
                frames: 0,
                resets: 0,
                clock,
                cost,
            }
        }
    }

    impl System for CountingSystem {
        type Error = std::convert::Infallible;

        fn reset(&mut self) {
            self.frames = 0;
            self.resets += 1;
        }

        fn step_frame(&mut self) -> Result<&Frame, Self::Error> {
            self.clock.advance(self.cost);
            self.frames += 1;
            Ok(&self.frame)
        }

        fn save_state(&self) -> Value {
            Value::Null
        }

        fn load_state(&mut self, _v: &Value) -> Result<(), serde_json::Error> {
            Ok(())
        }

        fn mount_points(&self) -> Vec<MountPointInfo> {
            Vec::new()
        }

        fn mount(&mut self, _id: &str, _data: &[u8]) -> Result<(), Self::Error> {
            Ok(())
        }

        fn unmount(&mut self, _id: &str) -> Result<(), Self::Error> {
            Ok(())
        }

        fn is_mounted(&self, _id: &str) -> bool {
            false
        }
    }

    fn scheduler(cost: Duration) -> FrameScheduler<CountingSystem, VirtualClock> {
        let clock = VirtualClock::new();
        let system = CountingSystem::new(clock.clone(), cost);
        FrameScheduler::new(system, clock, SchedulerConfig::default())
    }

    #[test]
    fn test_starts_stopped_with_nothing_scheduled() {
        let sched = scheduler(Duration::ZERO);
        assert_eq!(sched.state(), RunState::Stopped);
        assert!(sched.next_frame().is_none());
    }

    #[test]
    fn test_play_schedules_immediately() {
        let mut sched = scheduler(Duration::ZERO);
        sched.play();
        assert_eq!(sched.state(), RunState::Running);
        assert_eq!(sched.next_frame().map(|t| t.due), Some(Duration::ZERO));
    }

    #[test]
    fn test_paced_at_budget_when_work_is_free() {
        let mut sched = scheduler(Duration::ZERO);
        sched.play();

        assert_eq!(sched.run_frames(3, &mut crate::display::NullSink).unwrap(), 3);
        assert_eq!(sched.clock().now(), Duration::from_millis(32));
        assert_eq!(sched.history().len(), 2);
        assert!((sched.fps() - 62.5).abs() < 1e-9);
        assert_eq!(
            sched.next_frame().map(|t| t.due),
            Some(Duration::from_millis(48))
        );
    }

    #[test]
    fn test_overrun_uses_floor_delay_and_never_skips() {
        let mut sched = scheduler(Duration::from_millis(20));
        sched.play();

        let token = sched.next_frame().unwrap();
        let outcome = sched.fire(token, &mut crate::display::NullSink).unwrap();
        let FireOutcome::Ran(stats) = outcome else {
            panic!("expected frame to run, got {:?}", outcome);
        };
        assert!(stats.overrun);
        assert_eq!(stats.work, Duration::from_millis(20));
        assert_eq!(stats.next.due, Duration::from_millis(21));

        sched.run_frames(4, &mut crate::display::NullSink).unwrap();
        assert_eq!(sched.system().frames, 5);
        // 20ms of work plus the 1ms floor between starts
        assert!((sched.fps() - 1000.0 / 21.0).abs() < 1e-9);
    }

    #[test]
    fn test_not_due_token_is_not_run() {
        let mut sched = scheduler(Duration::ZERO);
        sched.play();
        sched.run_frames(1, &mut crate::display::NullSink).unwrap();

        let token = sched.next_frame().unwrap();
        let outcome = sched.fire(token, &mut crate::display::NullSink).unwrap();
        assert_eq!(outcome, FireOutcome::NotDue(token));
        assert_eq!(sched.system().frames, 1);
    }

    #[test]
    fn test_pause_invalidates_pending_frame() {
        let mut sched = scheduler(Duration::ZERO);
        sched.play();
        let token = sched.next_frame().unwrap();

        sched.pause();
        assert_eq!(sched.state(), RunState::Paused);
        assert!(sched.next_frame().is_none());
        assert_eq!(
            sched.fire(token, &mut crate::display::NullSink).unwrap(),
            FireOutcome::Stale
        );

        // Resuming issues a fresh token; the old one stays dead
        sched.play();
        assert_eq!(
            sched.fire(token, &mut crate::display::NullSink).unwrap(),
            FireOutcome::Stale
        );
        let fresh = sched.next_frame().unwrap();
        assert_ne!(fresh.generation(), token.generation());
        assert!(matches!(
            sched.fire(fresh, &mut crate::display::NullSink).unwrap(),
            FireOutcome::Ran(_)
        ));
    }

    #[test]
    fn test_restart_resets_system_and_history() {
        let mut sched = scheduler(Duration::ZERO);
        sched.play();
        sched.run_frames(4, &mut crate::display::NullSink).unwrap();
        let before = sched.next_frame().unwrap();

        sched.restart();
        assert_eq!(sched.state(), RunState::Running);
        assert_eq!(sched.system().resets, 1);
        assert_eq!(sched.system().frames, 0);
        assert!(sched.history().is_empty());
        assert_eq!(sched.fps(), 0.0);
        assert_eq!(
            sched.fire(before, &mut crate::display::NullSink).unwrap(),
            FireOutcome::Stale
        );
    }

    #[test]
    fn test_stop_ends_run_loop() {
        let mut sched = scheduler(Duration::ZERO);
        assert_eq!(sched.run_frames(5, &mut crate::display::NullSink).unwrap(), 0);

        sched.play();
        sched.stop();
        assert_eq!(sched.state(), RunState::Stopped);
        assert_eq!(sched.run_frames(5, &mut crate::display::NullSink).unwrap(), 0);
    }

    #[test]
    fn test_frames_reach_sink() {
        let mut sched = scheduler(Duration::ZERO);
        let mut presented = 0;
        let mut sink = |_: &Frame| presented += 1;
        sched.play();
        sched.run_frames(2, &mut sink).unwrap();
        assert_eq!(presented, 2);
        assert_eq!(sched.frames_delivered(), 2);
    }

    #[test]
    fn test_history_wraps_at_capacity() {
        let mut history = FrameHistory::new(4);
        for ms in [10, 10, 10, 10, 30, 30] {
            history.record(Duration::from_millis(ms));
        }
        assert_eq!(history.len(), 4);
        assert_eq!(history.mean(), Some(Duration::from_millis(20)));
        assert!((history.fps() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_delay_floor() {
        let config = SchedulerConfig::default();
        assert_eq!(config.delay_after(Duration::from_millis(4)), Duration::from_millis(12));
        assert_eq!(config.delay_after(Duration::from_millis(16)), Duration::from_millis(1));
        assert_eq!(config.delay_after(Duration::from_millis(40)), Duration::from_millis(1));
    }

    #[test]
    fn test_config_fields_default_when_missing() {
        let config: SchedulerConfig = serde_json::from_str(r#"{"frame_budget_ms": 20}"#).unwrap();
        assert_eq!(config.frame_budget_ms, 20);
        assert_eq!(config.min_delay_ms, 1);
        assert_eq!(config.history_len, 16);
    }
}
