use std::time::{Duration, Instant};

use crate::sim::SimEventCounts;

/// What the loop has done so far. Totals cover the loop's whole life; `tps`
/// and `frame_time_ms` describe the most recent measurement window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub tick: u64,
    pub ticks_run: u64,
    pub sim_seconds: f64,
    pub tasks_completed: u64,
    pub tiles_changed: u64,
    /// Wall-clock ticks per second.
    pub tps: f32,
    /// `None` when no wall-clock frames were fed, as in batch runs.
    pub frame_time_ms: Option<f32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct WindowRates {
    tps: f32,
    frame_time_ms: Option<f32>,
}

#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval: Duration,
    window_start: Instant,
    window_ticks: u32,
    window_frames: u32,
    window_frame_time: Duration,
    last_rates: WindowRates,
    totals: LoopMetricsSnapshot,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            window_start: now,
            window_ticks: 0,
            window_frames: 0,
            window_frame_time: Duration::ZERO,
            last_rates: WindowRates::default(),
            totals: LoopMetricsSnapshot::default(),
        }
    }

    pub(crate) fn record_frame(&mut self, frame_dt: Duration) {
        self.window_frames = self.window_frames.saturating_add(1);
        self.window_frame_time = self.window_frame_time.saturating_add(frame_dt);
    }

    pub(crate) fn record_tick(&mut self, tick: u64, counts: SimEventCounts, dt: Duration) {
        self.window_ticks = self.window_ticks.saturating_add(1);
        self.totals.tick = tick;
        self.totals.ticks_run = self.totals.ticks_run.saturating_add(1);
        self.totals.sim_seconds += dt.as_secs_f64();
        self.totals.tasks_completed = self
            .totals
            .tasks_completed
            .saturating_add(u64::from(counts.task_completed));
        self.totals.tiles_changed = self
            .totals
            .tiles_changed
            .saturating_add(u64::from(counts.terrain_changed));
    }

    /// A restored session starts its own tick count; totals keep accumulating.
    pub(crate) fn rebase_tick(&mut self, tick: u64) {
        self.totals.tick = tick;
    }

    /// Current totals with rates from the open window, or from the last closed
    /// window while the open one has no ticks yet.
    pub(crate) fn snapshot(&self, now: Instant) -> LoopMetricsSnapshot {
        let rates = if self.window_ticks == 0 && self.window_frames == 0 {
            self.last_rates
        } else {
            self.window_rates(now)
        };
        LoopMetricsSnapshot {
            tps: rates.tps,
            frame_time_ms: rates.frame_time_ms,
            ..self.totals
        }
    }

    /// Closes the window once `interval` has passed and returns what it saw.
    pub(crate) fn maybe_roll(&mut self, now: Instant) -> Option<LoopMetricsSnapshot> {
        if now.saturating_duration_since(self.window_start) < self.interval {
            return None;
        }
        let snapshot = self.snapshot(now);
        self.last_rates = WindowRates {
            tps: snapshot.tps,
            frame_time_ms: snapshot.frame_time_ms,
        };
        self.window_start = now;
        self.window_ticks = 0;
        self.window_frames = 0;
        self.window_frame_time = Duration::ZERO;
        Some(snapshot)
    }

    fn window_rates(&self, now: Instant) -> WindowRates {
        let elapsed_seconds = now
            .saturating_duration_since(self.window_start)
            .as_secs_f32()
            .max(f32::EPSILON);
        let frame_time_ms = (self.window_frames > 0).then(|| {
            self.window_frame_time.as_secs_f32() / self.window_frames as f32 * 1000.0
        });
        WindowRates {
            tps: self.window_ticks as f32 / elapsed_seconds,
            frame_time_ms,
        }
    }
}
