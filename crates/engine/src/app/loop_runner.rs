use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::sim::{FrameView, Session, SimEvent};

use super::metrics::{LoopMetricsSnapshot, MetricsAccumulator};

const DEFAULT_TARGET_TPS: u32 = 60;
const DEFAULT_MAX_FRAME_DELTA: Duration = Duration::from_millis(250);
const DEFAULT_MAX_TICKS_PER_FRAME: u32 = 5;
const DEFAULT_METRICS_LOG_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_OBSERVE_EVERY_TICKS: u32 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub target_tps: u32,
    #[serde(with = "duration_ms")]
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    #[serde(with = "duration_ms")]
    pub metrics_log_interval: Duration,
    pub observe_every_ticks: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: DEFAULT_TARGET_TPS,
            max_frame_delta: DEFAULT_MAX_FRAME_DELTA,
            max_ticks_per_frame: DEFAULT_MAX_TICKS_PER_FRAME,
            metrics_log_interval: DEFAULT_METRICS_LOG_INTERVAL,
            observe_every_ticks: DEFAULT_OBSERVE_EVERY_TICKS,
        }
    }
}

/// Durations are written as whole milliseconds in config files.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis().min(u64::MAX as u128) as u64)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Presentation side of the loop. Receives a read-only view plus every event
/// raised since the previous observation.
pub trait FrameObserver {
    fn on_frame(&mut self, view: &FrameView<'_>, events: &[SimEvent]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOutcome {
    pub ticks_run: u32,
    pub dropped_backlog: Duration,
    pub observed: bool,
}

/// Fixed-step clock around a session. Wall-clock frames feed the accumulator
/// and each whole `fixed_dt` becomes one tick.
#[derive(Debug)]
pub struct SimLoop {
    fixed_dt: Duration,
    max_frame_delta: Duration,
    max_ticks_per_frame: u32,
    observe_every_ticks: u32,
    accumulator: Duration,
    ticks_since_observe: u32,
    unobserved_events: Vec<SimEvent>,
    metrics: MetricsAccumulator,
}

impl SimLoop {
    pub fn new(config: &LoopConfig) -> Self {
        let target_tps = config.target_tps.max(1);
        let max_frame_delta =
            normalize_non_zero_duration(config.max_frame_delta, DEFAULT_MAX_FRAME_DELTA);
        let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
        let metrics_log_interval =
            normalize_non_zero_duration(config.metrics_log_interval, DEFAULT_METRICS_LOG_INTERVAL);
        let observe_every_ticks = config.observe_every_ticks.max(1);
        info!(
            target_tps,
            max_frame_delta_ms = max_frame_delta.as_millis() as u64,
            max_ticks_per_frame,
            metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
            observe_every_ticks,
            "loop_config"
        );

        Self {
            fixed_dt: Duration::from_secs_f64(1.0 / target_tps as f64),
            max_frame_delta,
            max_ticks_per_frame,
            observe_every_ticks,
            accumulator: Duration::ZERO,
            ticks_since_observe: 0,
            unobserved_events: Vec::new(),
            metrics: MetricsAccumulator::new(metrics_log_interval, Instant::now()),
        }
    }

    pub fn fixed_dt(&self) -> Duration {
        self.fixed_dt
    }

    pub fn metrics(&self) -> LoopMetricsSnapshot {
        self.metrics.snapshot(Instant::now())
    }

    /// Feeds one wall-clock frame. Large frames are clamped and backlog beyond
    /// `max_ticks_per_frame` is dropped rather than replayed.
    pub fn advance_frame(
        &mut self,
        session: &mut Session,
        frame_dt: Duration,
        observer: &mut dyn FrameObserver,
    ) -> FrameOutcome {
        let clamped_frame_dt = clamp_frame_delta(frame_dt, self.max_frame_delta);
        self.accumulator = self.accumulator.saturating_add(clamped_frame_dt);

        let step_plan = plan_sim_steps(self.accumulator, self.fixed_dt, self.max_ticks_per_frame);
        let mut observed = false;
        for _ in 0..step_plan.ticks_to_run {
            observed |= self.step(session, observer);
        }
        self.accumulator = step_plan.remaining_accumulator;

        if step_plan.dropped_backlog > Duration::ZERO {
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame = self.max_ticks_per_frame,
                "sim_clamp_triggered"
            );
        }

        self.metrics.record_frame(frame_dt);
        self.maybe_log_metrics(session, Instant::now());

        FrameOutcome {
            ticks_run: step_plan.ticks_to_run,
            dropped_backlog: step_plan.dropped_backlog,
            observed,
        }
    }

    /// Runs exactly `ticks` fixed steps with no wall-clock pacing.
    pub fn run_ticks(
        &mut self,
        session: &mut Session,
        ticks: u32,
        observer: &mut dyn FrameObserver,
    ) {
        for _ in 0..ticks {
            self.step(session, observer);
        }
        self.maybe_log_metrics(session, Instant::now());
    }

    /// Hands the observer the current view immediately, together with any
    /// events it has not seen yet.
    pub fn observe_now(&mut self, session: &Session, observer: &mut dyn FrameObserver) {
        observer.on_frame(&session.view(), &self.unobserved_events);
        self.unobserved_events.clear();
        self.ticks_since_observe = 0;
    }

    /// Drops state tied to the previous session, e.g. after a load.
    pub fn reset(&mut self, session: &Session) {
        self.accumulator = Duration::ZERO;
        self.ticks_since_observe = 0;
        self.unobserved_events.clear();
        self.metrics.rebase_tick(session.tick_count());
    }

    fn step(&mut self, session: &mut Session, observer: &mut dyn FrameObserver) -> bool {
        let report = session.tick(self.fixed_dt.as_secs_f32());
        self.metrics.record_tick(report.tick, report.counts, self.fixed_dt);
        self.unobserved_events.extend_from_slice(report.events);

        self.ticks_since_observe = self.ticks_since_observe.saturating_add(1);
        if self.ticks_since_observe < self.observe_every_ticks {
            return false;
        }
        self.observe_now(session, observer);
        true
    }

    fn maybe_log_metrics(&mut self, session: &Session, now: Instant) {
        if let Some(snapshot) = self.metrics.maybe_roll(now) {
            info!(
                tps = snapshot.tps,
                frame_time_ms = ?snapshot.frame_time_ms,
                tick = snapshot.tick,
                ticks_run = snapshot.ticks_run,
                tasks_completed = snapshot.tasks_completed,
                agent_count = session.agents().len(),
                queued_tasks = session.tasks().len(),
                "loop_metrics"
            );
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    let dropped_backlog = if accumulator >= fixed_dt {
        std::mem::take(&mut accumulator)
    } else {
        Duration::ZERO
    };
    StepPlan {
        ticks_to_run,
        remaining_accumulator: accumulator,
        dropped_backlog,
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::TaskKind;
    use crate::world::{WorldConfig, WorldSeed};

    struct Discard;

    impl FrameObserver for Discard {
        fn on_frame(&mut self, _view: &FrameView<'_>, _events: &[SimEvent]) {}
    }

    #[derive(Default)]
    struct Recorder {
        frames: Vec<(u64, Vec<SimEvent>)>,
    }

    impl FrameObserver for Recorder {
        fn on_frame(&mut self, view: &FrameView<'_>, events: &[SimEvent]) {
            self.frames.push((view.tick(), events.to_vec()));
        }
    }

    fn small_session() -> Session {
        let config = WorldConfig {
            width: 12,
            height: 8,
            ..WorldConfig::default()
        };
        Session::new(config, WorldSeed(0.42)).expect("session")
    }

    fn loop_config(observe_every_ticks: u32) -> LoopConfig {
        LoopConfig {
            target_tps: 50,
            max_ticks_per_frame: 3,
            observe_every_ticks,
            ..LoopConfig::default()
        }
    }

    #[test]
    fn clamp_frame_delta_caps_large_frame() {
        let max_frame_delta = Duration::from_millis(250);
        let raw_frame_dt = Duration::from_millis(600);

        assert_eq!(
            clamp_frame_delta(raw_frame_dt, max_frame_delta),
            max_frame_delta
        );
    }

    #[test]
    fn plan_sim_steps_runs_expected_ticks_without_drop() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(48), fixed_dt, 5);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::ZERO);
    }

    #[test]
    fn plan_sim_steps_keeps_partial_step() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(40), fixed_dt, 5);

        assert_eq!(result.ticks_to_run, 2);
        assert_eq!(result.remaining_accumulator, Duration::from_millis(8));
        assert_eq!(result.dropped_backlog, Duration::ZERO);
    }

    #[test]
    fn plan_sim_steps_drops_backlog_when_tick_cap_hit() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(120), fixed_dt, 3);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::from_millis(72));
    }

    #[test]
    fn advance_frame_ticks_session_by_whole_steps() {
        let mut session = small_session();
        let mut sim_loop = SimLoop::new(&loop_config(100));
        let mut observer = Discard;

        let outcome = sim_loop.advance_frame(&mut session, Duration::from_millis(50), &mut observer);
        assert_eq!(outcome.ticks_run, 2);
        assert_eq!(session.tick_count(), 2);

        let outcome = sim_loop.advance_frame(&mut session, Duration::from_millis(10), &mut observer);
        assert_eq!(outcome.ticks_run, 1);
        assert_eq!(session.tick_count(), 3);
    }

    #[test]
    fn advance_frame_clamps_long_stall() {
        let mut session = small_session();
        let mut sim_loop = SimLoop::new(&loop_config(100));
        let mut observer = Discard;

        let outcome = sim_loop.advance_frame(&mut session, Duration::from_secs(5), &mut observer);
        assert_eq!(outcome.ticks_run, 3);
        assert!(outcome.dropped_backlog > Duration::ZERO);
        assert_eq!(session.tick_count(), 3);
    }

    #[test]
    fn observer_runs_on_configured_cadence_with_buffered_events() {
        let mut session = Session::new(WorldConfig::default(), WorldSeed(0.42)).expect("session");
        let (index, kind) = (0..session.tilemap().len())
            .find_map(|index| {
                let tile = session.effective_tile(index)?;
                TaskKind::ALL
                    .into_iter()
                    .find(|kind| kind.accepts_tile(tile))
                    .map(|kind| (index, kind))
            })
            .expect("taskable tile");
        session.issue_task(index, kind).expect("task accepted");

        let mut sim_loop = SimLoop::new(&loop_config(4));
        let mut recorder = Recorder::default();
        sim_loop.run_ticks(&mut session, 9, &mut recorder);

        assert_eq!(
            recorder.frames.iter().map(|(tick, _)| *tick).collect::<Vec<_>>(),
            vec![4, 8]
        );
        assert!(recorder.frames[0]
            .1
            .iter()
            .any(|event| matches!(event, SimEvent::TaskSubmitted { .. })));
    }

    #[test]
    fn batch_ticks_show_up_in_metrics() {
        let mut session = small_session();
        let mut sim_loop = SimLoop::new(&loop_config(100));
        sim_loop.run_ticks(&mut session, 30, &mut Discard);

        let metrics = sim_loop.metrics();
        assert_eq!(metrics.tick, 30);
        assert_eq!(metrics.ticks_run, 30);
        assert!((metrics.sim_seconds - 30.0 * sim_loop.fixed_dt().as_secs_f64()).abs() < 1e-9);
        assert!(metrics.tps > 0.0);
        assert_eq!(metrics.frame_time_ms, None);
    }

    #[test]
    fn reset_follows_replacement_session_tick() {
        let mut session = small_session();
        let mut sim_loop = SimLoop::new(&loop_config(100));
        sim_loop.run_ticks(&mut session, 12, &mut Discard);

        let replacement = small_session();
        sim_loop.reset(&replacement);
        let metrics = sim_loop.metrics();
        assert_eq!(metrics.tick, 0);
        assert_eq!(metrics.ticks_run, 12);
    }

    #[test]
    fn loop_config_reads_millisecond_durations() {
        let config: LoopConfig =
            serde_json::from_str(r#"{"max_frame_delta": 100, "observe_every_ticks": 5}"#)
                .expect("config");
        assert_eq!(config.max_frame_delta, Duration::from_millis(100));
        assert_eq!(config.observe_every_ticks, 5);
        assert_eq!(config.target_tps, DEFAULT_TARGET_TPS);
    }
}
