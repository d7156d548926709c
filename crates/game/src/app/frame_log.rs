use std::collections::BTreeSet;
use std::fmt::Write as _;

use engine::{AgentState, FrameObserver, FrameView, LoopMetricsSnapshot, SimEvent};
use tracing::{debug, info};

/// Headless stand-in for a renderer. Tracks which tiles need redrawing and
/// logs a one-line summary per observed frame.
#[derive(Debug, Default)]
pub(crate) struct FrameLog {
    frames_observed: u64,
    redraw_total: u64,
    dirty_tiles: BTreeSet<usize>,
}

impl FrameLog {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn frames_observed(&self) -> u64 {
        self.frames_observed
    }

    pub(crate) fn redraw_total(&self) -> u64 {
        self.redraw_total
    }

    /// A freshly loaded world gets a full redraw; nothing pending carries over.
    pub(crate) fn reset(&mut self) {
        self.dirty_tiles.clear();
    }
}

impl FrameObserver for FrameLog {
    fn on_frame(&mut self, view: &FrameView<'_>, events: &[SimEvent]) {
        self.frames_observed = self.frames_observed.saturating_add(1);
        for event in events {
            if let SimEvent::TerrainChanged { index, .. } = event {
                self.dirty_tiles.insert(*index);
            }
        }
        if !self.dirty_tiles.is_empty() {
            let redrawn = self.dirty_tiles.len();
            self.redraw_total = self.redraw_total.saturating_add(redrawn as u64);
            debug!(tick = view.tick(), tiles = redrawn, "terrain_redraw");
            self.dirty_tiles.clear();
        }

        let resources = view.resources();
        let (mut idle, mut moving, mut working, mut sleeping) = (0, 0, 0, 0);
        for agent in view.agents() {
            match agent.state {
                AgentState::Idle => idle += 1,
                AgentState::Moving => moving += 1,
                AgentState::Working => working += 1,
                AgentState::Sleeping => sleeping += 1,
            }
        }
        info!(
            tick = view.tick(),
            wood = resources.wood,
            stone = resources.stone,
            gold = resources.gold,
            queued_tasks = view.tasks().count(),
            idle,
            moving,
            working,
            sleeping,
            events = events.len(),
            "frame"
        );
    }
}

/// One glyph per tile, agents drawn over the terrain by the first letter of
/// their name. Tiles with a pending order are marked `!`.
pub(crate) fn render_ascii_map(view: &FrameView<'_>) -> String {
    let width = view.width() as usize;
    let height = view.height() as usize;
    let mut cells = view
        .effective_tiles()
        .map(|tile| tile.glyph())
        .collect::<Vec<_>>();
    for task in view.tasks() {
        if let Some(cell) = cells.get_mut(task.index) {
            *cell = '!';
        }
    }

    let tile_size = view.tile_size_px();
    for agent in view.agents() {
        let column = ((agent.position.x / tile_size).floor() as usize).min(width.saturating_sub(1));
        let row = ((agent.position.y / tile_size).floor() as usize).min(height.saturating_sub(1));
        let glyph = agent
            .name
            .chars()
            .next()
            .map(|first| first.to_ascii_uppercase())
            .unwrap_or('@');
        if let Some(cell) = cells.get_mut(row * width + column) {
            *cell = glyph;
        }
    }

    let mut out = String::with_capacity((width + 1) * height);
    for row in cells.chunks(width.max(1)) {
        out.extend(row.iter());
        out.push('\n');
    }
    out
}

pub(crate) fn render_status(view: &FrameView<'_>) -> String {
    let resources = view.resources();
    let mut out = String::new();
    let _ = writeln!(
        out,
        "tick {} | wood {} stone {} food {} gold {}",
        view.tick(),
        resources.wood,
        resources.stone,
        resources.food,
        resources.gold
    );
    for agent in view.agents() {
        let _ = writeln!(
            out,
            "  {} [{}] at ({:.1}, {:.1}) energy {:.0}",
            agent.name,
            agent.state.as_token(),
            agent.position.x,
            agent.position.y,
            agent.energy
        );
    }
    let width = view.width() as usize;
    for task in view.tasks() {
        let claimant = match task.claimed_by {
            Some(agent_id) => view
                .agents()
                .iter()
                .find(|agent| agent.id == agent_id)
                .map(|agent| agent.name.as_str())
                .unwrap_or("?"),
            None => "unclaimed",
        };
        let _ = writeln!(
            out,
            "  order #{} {} at ({}, {}) - {}",
            task.id.0,
            task.kind,
            task.index % width.max(1),
            task.index / width.max(1),
            claimant
        );
    }
    out
}

pub(crate) fn render_loop_metrics(metrics: &LoopMetricsSnapshot) -> String {
    let mut out = format!(
        "loop | ran {} ticks ({:.1} sim s) at {:.0} tps | {} tasks completed, {} tiles changed",
        metrics.ticks_run,
        metrics.sim_seconds,
        metrics.tps,
        metrics.tasks_completed,
        metrics.tiles_changed
    );
    if let Some(frame_time_ms) = metrics.frame_time_ms {
        let _ = write!(out, " | frame {frame_time_ms:.1} ms");
    }
    out
}
