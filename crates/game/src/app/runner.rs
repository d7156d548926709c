use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::thread;
use std::time::Instant;

use engine::{
    load_session, save_session, Session, SimLoop, SimTuning, SnapshotStore, TaskKind,
    WorldConfig,
};
use tracing::{info, warn};

use super::bootstrap::{self, RunnerSettings, ScriptSource};
use super::commands::{CommandRegistry, OrderTarget, ScriptCommand};
use super::frame_log::{render_ascii_map, render_loop_metrics, render_status, FrameLog};
use super::persistence::FileSnapshotStore;
use super::AppError;

pub(crate) fn run() -> Result<(), AppError> {
    let settings = bootstrap::settings_from_env()?;
    let session = Session::new_with_tuning(settings.world, settings.seed, settings.tuning)?;
    let store = FileSnapshotStore::new(settings.save_dir.clone());
    let input: Box<dyn BufRead> = match &settings.script {
        ScriptSource::Stdin => Box::new(io::stdin().lock()),
        ScriptSource::File(path) => {
            let file = File::open(path).map_err(|source| AppError::ReadFile {
                path: path.clone(),
                source,
            })?;
            Box::new(BufReader::new(file))
        }
    };

    let stdout = io::stdout();
    let mut runner = Runner::new(session, &settings, Box::new(store), stdout.lock());
    let summary = runner.run_script(input)?;
    info!(
        lines = summary.lines,
        orders_accepted = summary.orders_accepted,
        orders_rejected = summary.orders_rejected,
        parse_errors = summary.parse_errors,
        final_tick = runner.session.tick_count(),
        frames_observed = runner.frame_log.frames_observed(),
        tiles_redrawn = runner.frame_log.redraw_total(),
        "script_finished"
    );
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ScriptSummary {
    pub(crate) lines: u32,
    pub(crate) orders_accepted: u32,
    pub(crate) orders_rejected: u32,
    pub(crate) parse_errors: u32,
}

enum Flow {
    Continue,
    Stop,
}

/// Drives one session from a command script. Player-facing notices go to
/// `out`; diagnostics go through `tracing`.
pub(crate) struct Runner<W: Write> {
    session: Session,
    sim_loop: SimLoop,
    frame_log: FrameLog,
    registry: CommandRegistry,
    store: Box<dyn SnapshotStore>,
    world: WorldConfig,
    tuning: SimTuning,
    realtime: bool,
    out: W,
}

impl<W: Write> Runner<W> {
    pub(crate) fn new(
        session: Session,
        settings: &RunnerSettings,
        store: Box<dyn SnapshotStore>,
        out: W,
    ) -> Self {
        Self {
            session,
            sim_loop: SimLoop::new(&settings.loop_config),
            frame_log: FrameLog::new(),
            registry: CommandRegistry::with_builtins(),
            store,
            world: settings.world,
            tuning: settings.tuning,
            realtime: settings.realtime,
            out,
        }
    }

    pub(crate) fn run_script(&mut self, input: impl BufRead) -> Result<ScriptSummary, AppError> {
        let mut summary = ScriptSummary::default();
        for (line_index, line) in input.lines().enumerate() {
            let line = line.map_err(AppError::ReadScript)?;
            summary.lines = summary.lines.saturating_add(1);
            let command = match self.registry.parse_line(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(error) => {
                    summary.parse_errors = summary.parse_errors.saturating_add(1);
                    warn!(line = line_index + 1, error = %error, "command_rejected");
                    self.say(format_args!("error: {error}"))?;
                    continue;
                }
            };
            if let Flow::Stop = self.execute(command, &mut summary)? {
                info!(line = line_index + 1, "quit_requested");
                break;
            }
        }
        self.out.flush().map_err(AppError::Output)?;
        Ok(summary)
    }

    fn execute(
        &mut self,
        command: ScriptCommand,
        summary: &mut ScriptSummary,
    ) -> Result<Flow, AppError> {
        match command {
            ScriptCommand::Help => {
                for line in self.registry.help_lines() {
                    self.say(format_args!("{line}"))?;
                }
            }
            ScriptCommand::Order { kind, target } => {
                if self.order(kind, target)? {
                    summary.orders_accepted = summary.orders_accepted.saturating_add(1);
                } else {
                    summary.orders_rejected = summary.orders_rejected.saturating_add(1);
                }
            }
            ScriptCommand::Wait { ticks } => self.wait(ticks),
            ScriptCommand::Status => {
                let status = render_status(&self.session.view());
                self.say(format_args!("{}", status.trim_end()))?;
                let metrics = render_loop_metrics(&self.sim_loop.metrics());
                self.say(format_args!("{metrics}"))?;
            }
            ScriptCommand::Map => {
                let map = render_ascii_map(&self.session.view());
                self.say(format_args!("{}", map.trim_end()))?;
            }
            ScriptCommand::Save { slot } => {
                let outcome = save_session(self.store.as_mut(), slot, &self.session);
                self.notify(outcome.success, &outcome.message)?;
            }
            ScriptCommand::Load { slot } => {
                let (outcome, restored) =
                    load_session(self.store.as_ref(), slot, self.world, self.tuning);
                if let Some(session) = restored {
                    self.session = session;
                    self.sim_loop.reset(&self.session);
                    self.frame_log.reset();
                }
                self.notify(outcome.success, &outcome.message)?;
            }
            ScriptCommand::Quit => return Ok(Flow::Stop),
        }
        Ok(Flow::Continue)
    }

    fn order(&mut self, kind: TaskKind, target: OrderTarget) -> Result<bool, AppError> {
        let result = match target {
            OrderTarget::Coords { x, y } => self.session.issue_task_at(x, y, kind),
            OrderTarget::Index(index) => self.session.issue_task(index, kind),
        };
        match result {
            Ok(task_id) => {
                let index = self
                    .session
                    .tasks()
                    .get(task_id)
                    .map(|task| task.index)
                    .unwrap_or_default();
                let resources = self.session.resources();
                self.say(format_args!(
                    "ok: {kind} order #{} queued at tile {index} (wood {} stone {})",
                    task_id.0, resources.wood, resources.stone
                ))?;
                Ok(true)
            }
            Err(rejection) => {
                warn!(kind = %kind, reason = %rejection, "order_rejected");
                self.say(format_args!("rejected: {rejection}"))?;
                Ok(false)
            }
        }
    }

    fn wait(&mut self, ticks: u32) {
        if !self.realtime {
            self.sim_loop
                .run_ticks(&mut self.session, ticks, &mut self.frame_log);
            return;
        }

        let target_tick = self.session.tick_count().saturating_add(u64::from(ticks));
        let frame_budget = self.sim_loop.fixed_dt();
        let mut last_frame = Instant::now();
        while self.session.tick_count() < target_tick {
            thread::sleep(frame_budget);
            let now = Instant::now();
            let frame_dt = now.saturating_duration_since(last_frame);
            last_frame = now;
            self.sim_loop
                .advance_frame(&mut self.session, frame_dt, &mut self.frame_log);
        }
    }

    fn notify(&mut self, success: bool, message: &str) -> Result<(), AppError> {
        if success {
            self.say(format_args!("ok: {message}"))
        } else {
            self.say(format_args!("error: {message}"))
        }
    }

    fn say(&mut self, line: std::fmt::Arguments<'_>) -> Result<(), AppError> {
        writeln!(self.out, "{line}").map_err(AppError::Output)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use engine::{LoopConfig, TileType, WorldSeed};
    use tempfile::TempDir;

    use super::*;

    fn settings(save_dir: &std::path::Path) -> RunnerSettings {
        RunnerSettings {
            seed: WorldSeed(0.42),
            world: WorldConfig {
                width: 20,
                height: 15,
                ..WorldConfig::default()
            },
            tuning: SimTuning::default(),
            loop_config: LoopConfig {
                observe_every_ticks: 10,
                ..LoopConfig::default()
            },
            script: ScriptSource::Stdin,
            save_dir: save_dir.to_path_buf(),
            realtime: false,
        }
    }

    fn runner(dir: &TempDir) -> Runner<Vec<u8>> {
        let settings = settings(dir.path());
        let session = Session::new(settings.world, settings.seed).expect("session");
        Runner::new(
            session,
            &settings,
            Box::new(FileSnapshotStore::new(dir.path())),
            Vec::new(),
        )
    }

    fn output(runner: &Runner<Vec<u8>>) -> String {
        String::from_utf8(runner.out.clone()).expect("utf8 output")
    }

    fn first_tile(runner: &Runner<Vec<u8>>, wanted: impl Fn(TileType) -> bool) -> Option<(u32, u32)> {
        let tilemap = runner.session.tilemap();
        (0..tilemap.len())
            .find(|index| runner.session.effective_tile(*index).is_some_and(&wanted))
            .and_then(|index| tilemap.coords_of(index))
    }

    #[test]
    fn help_lists_every_command() {
        let dir = TempDir::new().expect("temp dir");
        let mut runner = runner(&dir);
        runner.run_script(Cursor::new("help\n")).expect("script");
        let text = output(&runner);
        for name in ["chop", "mine", "build_wood", "build_stone", "task", "wait", "save", "load"] {
            assert!(text.contains(name), "{text}");
        }
    }

    #[test]
    fn bad_lines_are_reported_and_skipped() {
        let dir = TempDir::new().expect("temp dir");
        let mut runner = runner(&dir);
        let summary = runner
            .run_script(Cursor::new("dance\nwait lots\n# fine\n\nwait 3\n"))
            .expect("script");

        assert_eq!(summary.parse_errors, 2);
        assert_eq!(summary.lines, 5);
        assert_eq!(runner.session.tick_count(), 3);
        let text = output(&runner);
        assert!(text.contains("error: unknown command 'dance'. usage: help"), "{text}");
        assert!(text.contains("usage: wait <ticks>"), "{text}");
    }

    #[test]
    fn rejected_orders_do_not_stop_the_script() {
        let dir = TempDir::new().expect("temp dir");
        let mut runner = runner(&dir);
        let summary = runner
            .run_script(Cursor::new("chop 500 500\ntask mine 9999\nwait 2\n"))
            .expect("script");

        assert_eq!(summary.orders_rejected, 2);
        assert_eq!(summary.orders_accepted, 0);
        assert_eq!(runner.session.tick_count(), 2);
        assert!(output(&runner).contains("rejected: tile"));
    }

    #[test]
    fn accepted_order_is_worked_to_completion() {
        let dir = TempDir::new().expect("temp dir");
        let mut runner = runner(&dir);
        let (x, y) =
            first_tile(&runner, TileType::is_buildable).expect("seed 0.42 map has open ground");
        let script = format!("build_wood {x} {y}\nwait 1200\nstatus\n");
        let summary = runner.run_script(Cursor::new(script)).expect("script");

        assert_eq!(summary.orders_accepted, 1);
        let index = runner.session.tilemap().index_of(x, y).expect("index");
        assert_eq!(runner.session.effective_tile(index), Some(TileType::WoodWall));
        assert_eq!(runner.session.resources().wood, 5);
        assert!(runner.frame_log.frames_observed() >= 100);
        assert!(runner.frame_log.redraw_total() >= 1);
        let text = output(&runner);
        assert!(text.contains("loop | ran 1200 ticks"), "{text}");
        assert!(text.contains("1 tasks completed, 1 tiles changed"), "{text}");
    }

    #[test]
    fn save_then_load_restores_earlier_state() {
        let dir = TempDir::new().expect("temp dir");
        let mut runner = runner(&dir);
        runner
            .run_script(Cursor::new("wait 5\nsave 1\nwait 20\nload 1\n"))
            .expect("script");

        assert_eq!(runner.session.tick_count(), 5);
        assert!(dir.path().join("slot_1.save.json").is_file());
        let text = output(&runner);
        assert!(text.contains("ok: saved slot 1 at tick 5"), "{text}");
        assert!(text.contains("ok: loaded slot 1 at tick 5"), "{text}");
    }

    #[test]
    fn loading_empty_slot_keeps_current_session() {
        let dir = TempDir::new().expect("temp dir");
        let mut runner = runner(&dir);
        runner
            .run_script(Cursor::new("wait 4\nload 9\n"))
            .expect("script");

        assert_eq!(runner.session.tick_count(), 4);
        assert!(output(&runner).contains("error: slot 9 is empty"));
    }

    #[test]
    fn quit_stops_reading() {
        let dir = TempDir::new().expect("temp dir");
        let mut runner = runner(&dir);
        let summary = runner
            .run_script(Cursor::new("wait 1\nquit\nwait 50\n"))
            .expect("script");

        assert_eq!(summary.lines, 2);
        assert_eq!(runner.session.tick_count(), 1);
    }

    #[test]
    fn map_prints_every_row() {
        let dir = TempDir::new().expect("temp dir");
        let mut runner = runner(&dir);
        runner.run_script(Cursor::new("map\n")).expect("script");
        assert_eq!(output(&runner).lines().count(), 15);
    }
}
