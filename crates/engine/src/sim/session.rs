use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::save::{SavedAgent, SavedTask, SessionSnapshot, SnapshotError, SAVE_VERSION};
use crate::world::{
    generate, ConfigError, TileOverlay, TileType, Tilemap, Vec2, WorldConfig, WorldSeed,
};

use super::agents::{default_roster, Agent, AgentId, AgentTickContext, RosterEntry};
use super::events::{SimEvent, SimEventBus, SimEventCounts};
use super::resources::Resources;
use super::tasks::{Task, TaskId, TaskKind, TaskQueue, TaskRejected};
use super::SimTuning;

/// One running world. Owns every piece of mutable simulation state; all
/// mutation goes through `&mut self`, so ticks and submissions never interleave.
#[derive(Debug)]
pub struct Session {
    config: WorldConfig,
    tuning: SimTuning,
    seed: WorldSeed,
    tilemap: Tilemap,
    spawn_point: Vec2,
    overlay: TileOverlay,
    agents: Vec<Agent>,
    tasks: TaskQueue,
    resources: Resources,
    rng: StdRng,
    tick: u64,
    events: SimEventBus,
}

#[derive(Debug, Clone, Copy)]
pub struct TickReport<'a> {
    pub tick: u64,
    pub events: &'a [SimEvent],
    pub counts: SimEventCounts,
}

impl TickReport<'_> {
    pub fn terrain_changed(&self) -> bool {
        self.counts.terrain_changed > 0
    }
}

fn validate_seed(seed: WorldSeed) -> Result<(), ConfigError> {
    if seed.0.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::InvalidSeed(seed.0))
    }
}

impl Session {
    pub fn new(config: WorldConfig, seed: WorldSeed) -> Result<Self, ConfigError> {
        Self::with_tuning_and_roster(config, seed, SimTuning::default(), default_roster())
    }

    pub fn new_with_tuning(
        config: WorldConfig,
        seed: WorldSeed,
        tuning: SimTuning,
    ) -> Result<Self, ConfigError> {
        Self::with_tuning_and_roster(config, seed, tuning, default_roster())
    }

    pub fn with_roster(
        config: WorldConfig,
        seed: WorldSeed,
        roster: Vec<RosterEntry>,
    ) -> Result<Self, ConfigError> {
        Self::with_tuning_and_roster(config, seed, SimTuning::default(), roster)
    }

    /// Roster entries without a position are laid out from the spawn point,
    /// `tuning.roster_spacing_px` apart along x.
    pub fn with_tuning_and_roster(
        config: WorldConfig,
        seed: WorldSeed,
        tuning: SimTuning,
        roster: Vec<RosterEntry>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        validate_seed(seed)?;
        tuning.validate()?;
        let terrain = generate(&config, seed);
        let spawn_point = terrain.spawn_point;
        let agents = roster
            .into_iter()
            .enumerate()
            .map(|(slot, entry)| {
                let fallback = spawn_point
                    + Vec2::new(slot as f32 * tuning.roster_spacing_px, 0.0);
                let position = terrain
                    .tilemap
                    .clamp_to_bounds(entry.position.unwrap_or(fallback));
                Agent::new(AgentId(slot as u32), entry.name, entry.color, position)
            })
            .collect::<Vec<_>>();

        info!(
            %seed,
            width = config.width,
            height = config.height,
            agent_count = agents.len(),
            spawn_x = spawn_point.x,
            spawn_y = spawn_point.y,
            "session_created"
        );

        Ok(Self {
            config,
            tuning,
            seed,
            tilemap: terrain.tilemap,
            spawn_point,
            overlay: TileOverlay::new(),
            agents,
            tasks: TaskQueue::new(),
            resources: Resources::starting(),
            rng: StdRng::seed_from_u64(seed.rng_seed()),
            tick: 0,
            events: SimEventBus::default(),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_tuning(mut self, tuning: SimTuning) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn with_resources(mut self, resources: Resources) -> Self {
        self.resources = resources;
        self
    }

    /// Rebuilds a session from a snapshot. The base grid is regenerated from
    /// the saved seed; everything else comes from the snapshot.
    pub fn restore(
        config: WorldConfig,
        tuning: SimTuning,
        snapshot: &SessionSnapshot,
    ) -> Result<Self, SnapshotError> {
        config.validate()?;
        tuning.validate()?;
        validate_seed(snapshot.seed)?;
        snapshot.validate(&config)?;

        let terrain = generate(&config, snapshot.seed);
        let next_task_id = snapshot.effective_next_task_id();
        let tasks = TaskQueue::from_parts(
            snapshot.tasks.iter().map(SavedTask::to_task),
            next_task_id,
        );
        let agents = snapshot
            .dwarves
            .iter()
            .map(SavedAgent::to_agent)
            .collect::<Vec<_>>();
        let overlay = snapshot
            .modified_tiles
            .iter()
            .map(|(index, tile)| (*index, *tile))
            .collect::<TileOverlay>();

        info!(
            seed = %snapshot.seed,
            tick = snapshot.tick,
            agent_count = agents.len(),
            task_count = tasks.len(),
            modified_tiles = overlay.len(),
            "session_restored"
        );

        Ok(Self {
            config,
            tuning,
            seed: snapshot.seed,
            tilemap: terrain.tilemap,
            spawn_point: terrain.spawn_point,
            overlay,
            agents,
            tasks,
            resources: snapshot.resources,
            rng: StdRng::seed_from_u64(snapshot.seed.rng_seed() ^ snapshot.tick),
            tick: snapshot.tick,
            events: SimEventBus::default(),
        })
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            save_version: SAVE_VERSION,
            seed: self.seed,
            width: self.config.width,
            height: self.config.height,
            tick: self.tick,
            resources: self.resources,
            dwarves: self.agents.iter().map(SavedAgent::from_agent).collect(),
            modified_tiles: self.overlay.iter().collect(),
            tasks: self.tasks.tasks().map(SavedTask::from_task).collect(),
            next_task_id: Some(self.tasks.next_task_id()),
        }
    }

    pub fn issue_task(&mut self, index: usize, kind: TaskKind) -> Result<TaskId, TaskRejected> {
        let Some(tile) = self.effective_tile(index) else {
            return Err(TaskRejected::OutOfBounds { index });
        };
        match self.tasks.submit(index, kind, tile, &mut self.resources) {
            Ok(task_id) => {
                self.events.emit(SimEvent::TaskSubmitted {
                    task_id,
                    index,
                    kind,
                });
                Ok(task_id)
            }
            Err(rejection) => {
                debug!(index, kind = %kind, reason = %rejection, "task_rejected");
                Err(rejection)
            }
        }
    }

    pub fn issue_task_at(
        &mut self,
        x: u32,
        y: u32,
        kind: TaskKind,
    ) -> Result<TaskId, TaskRejected> {
        match self.tilemap.index_of(x, y) {
            Some(index) => self.issue_task(index, kind),
            None => Err(TaskRejected::OutOfBounds {
                index: (y as usize)
                    .saturating_mul(self.config.width as usize)
                    .saturating_add(x as usize),
            }),
        }
    }

    pub fn tick(&mut self, dt_seconds: f32) -> TickReport<'_> {
        let dt = if dt_seconds.is_finite() {
            dt_seconds.max(0.0)
        } else {
            0.0
        };
        self.tick = self.tick.saturating_add(1);

        let neighbors = self
            .agents
            .iter()
            .map(|agent| (agent.id, agent.position))
            .collect::<Vec<_>>();
        let mut ctx = AgentTickContext {
            dt,
            tuning: &self.tuning,
            tilemap: &self.tilemap,
            overlay: &mut self.overlay,
            tasks: &mut self.tasks,
            resources: &mut self.resources,
            rng: &mut self.rng,
            events: &mut self.events,
            base: Some(self.spawn_point),
            neighbors: &neighbors,
        };
        for agent in &mut self.agents {
            agent.drain_energy(&self.tuning, dt);
            agent.step(&mut ctx);
        }

        self.events.finish_tick_rollover();
        TickReport {
            tick: self.tick,
            events: self.events.last_tick_events(),
            counts: self.events.last_tick_counts(),
        }
    }

    pub fn view(&self) -> FrameView<'_> {
        FrameView { session: self }
    }

    pub fn effective_tile(&self, index: usize) -> Option<TileType> {
        self.overlay.effective(&self.tilemap, index)
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn tuning(&self) -> &SimTuning {
        &self.tuning
    }

    pub fn seed(&self) -> WorldSeed {
        self.seed
    }

    pub fn tilemap(&self) -> &Tilemap {
        &self.tilemap
    }

    pub fn overlay(&self) -> &TileOverlay {
        &self.overlay
    }

    pub fn spawn_point(&self) -> Vec2 {
        self.spawn_point
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.iter().find(|agent| agent.id == id)
    }

    pub fn tasks(&self) -> &TaskQueue {
        &self.tasks
    }

    pub fn resources(&self) -> Resources {
        self.resources
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    #[cfg(test)]
    pub(crate) fn agents_mut(&mut self) -> &mut [Agent] {
        &mut self.agents
    }

    #[cfg(test)]
    pub(crate) fn overlay_mut(&mut self) -> &mut TileOverlay {
        &mut self.overlay
    }
}

/// Read-only view handed to the presentation layer after a tick.
#[derive(Clone, Copy)]
pub struct FrameView<'a> {
    session: &'a Session,
}

impl<'a> FrameView<'a> {
    pub fn tick(&self) -> u64 {
        self.session.tick
    }

    pub fn width(&self) -> u32 {
        self.session.tilemap.width()
    }

    pub fn height(&self) -> u32 {
        self.session.tilemap.height()
    }

    pub fn tile_size_px(&self) -> f32 {
        self.session.tilemap.tile_size_px()
    }

    pub fn effective_tile(&self, index: usize) -> Option<TileType> {
        self.session.effective_tile(index)
    }

    pub fn effective_tiles(&self) -> impl Iterator<Item = TileType> + 'a {
        let session = self.session;
        (0..session.tilemap.len()).filter_map(move |index| session.effective_tile(index))
    }

    pub fn overlay(&self) -> &'a TileOverlay {
        &self.session.overlay
    }

    pub fn agents(&self) -> &'a [Agent] {
        &self.session.agents
    }

    pub fn tasks(&self) -> impl Iterator<Item = &'a Task> + 'a {
        self.session.tasks.tasks()
    }

    pub fn task_at(&self, index: usize) -> Option<&'a Task> {
        self.session.tasks.task_at(index)
    }

    pub fn resources(&self) -> Resources {
        self.session.resources
    }

    pub fn spawn_point(&self) -> Vec2 {
        self.session.spawn_point
    }

    pub fn seed(&self) -> WorldSeed {
        self.session.seed
    }
}
