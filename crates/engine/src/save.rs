use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::sim::{
    Agent, AgentId, AgentState, AgentTarget, Resources, Session, SimTuning, Task, TaskId,
    TaskKind, TargetPurpose, MAX_ENERGY,
};
use crate::world::{ConfigError, TileType, Vec2, WorldConfig, WorldSeed};

pub const SAVE_VERSION: u32 = 1;

fn default_save_version() -> u32 {
    SAVE_VERSION
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedAgent {
    pub id: AgentId,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub color: u32,
    pub state: AgentState,
    #[serde(default)]
    pub target: Option<AgentTarget>,
    #[serde(default)]
    pub work_timer: f32,
    #[serde(default = "full_energy")]
    pub energy: f32,
}

fn full_energy() -> f32 {
    MAX_ENERGY
}

impl SavedAgent {
    pub fn from_agent(agent: &Agent) -> Self {
        Self {
            id: agent.id,
            name: agent.name.clone(),
            x: agent.position.x,
            y: agent.position.y,
            color: agent.color,
            state: agent.state,
            target: agent.target,
            work_timer: agent.work_timer,
            energy: agent.energy,
        }
    }

    pub fn to_agent(&self) -> Agent {
        Agent {
            id: self.id,
            name: self.name.clone(),
            position: Vec2::new(self.x, self.y),
            color: self.color,
            state: self.state,
            target: self.target,
            work_timer: self.work_timer,
            energy: self.energy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedTask {
    pub id: TaskId,
    pub index: usize,
    pub kind: TaskKind,
    #[serde(default)]
    pub claimed_by: Option<AgentId>,
}

impl SavedTask {
    pub fn from_task(task: &Task) -> Self {
        Self {
            id: task.id,
            index: task.index,
            kind: task.kind,
            claimed_by: task.claimed_by,
        }
    }

    pub fn to_task(&self) -> Task {
        Task {
            id: self.id,
            index: self.index,
            kind: self.kind,
            claimed_by: self.claimed_by,
        }
    }
}

/// The unit of save/load. The base grid is not stored: it is regenerated
/// from `seed` and the world dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    #[serde(default = "default_save_version")]
    pub save_version: u32,
    pub seed: WorldSeed,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub tick: u64,
    pub resources: Resources,
    pub dwarves: Vec<SavedAgent>,
    #[serde(default)]
    pub modified_tiles: BTreeMap<usize, TileType>,
    #[serde(default)]
    pub tasks: Vec<SavedTask>,
    #[serde(default)]
    pub next_task_id: Option<u64>,
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("encode snapshot json: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("parse snapshot json: {source}")]
    Parse {
        #[source]
        source: serde_json::Error,
    },
    #[error("parse snapshot json at {path}: {source}")]
    ParseAt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("validation failed at {path}: {message}")]
    Invalid { path: String, message: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

fn invalid(path: impl Into<String>, message: impl Into<String>) -> SnapshotError {
    SnapshotError::Invalid {
        path: path.into(),
        message: message.into(),
    }
}

fn expected_actual(path: impl Into<String>, expected: impl Display, actual: impl Display) -> SnapshotError {
    invalid(path, format!("expected {expected}, got {actual}"))
}

fn require_finite(path: String, value: f32) -> Result<(), SnapshotError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(expected_actual(path, "finite number", value))
    }
}

impl SessionSnapshot {
    pub fn to_json_pretty(&self) -> Result<String, SnapshotError> {
        serde_json::to_string_pretty(self).map_err(SnapshotError::Encode)
    }

    pub fn from_json(raw: &str) -> Result<Self, SnapshotError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        serde_path_to_error::deserialize::<_, SessionSnapshot>(&mut deserializer).map_err(
            |error| {
                let path = error.path().to_string();
                let source = error.into_inner();
                if path.is_empty() || path == "." {
                    SnapshotError::Parse { source }
                } else {
                    SnapshotError::ParseAt { path, source }
                }
            },
        )
    }

    pub fn effective_next_task_id(&self) -> u64 {
        self.next_task_id.unwrap_or_else(|| {
            self.tasks
                .iter()
                .map(|task| task.id.0.saturating_add(1))
                .max()
                .unwrap_or(0)
        })
    }

    pub fn validate(&self, config: &WorldConfig) -> Result<(), SnapshotError> {
        if self.save_version != SAVE_VERSION {
            return Err(expected_actual("saveVersion", SAVE_VERSION, self.save_version));
        }
        if !self.seed.0.is_finite() {
            return Err(expected_actual("seed", "finite number", self.seed));
        }
        if self.width != config.width {
            return Err(expected_actual("width", config.width, self.width));
        }
        if self.height != config.height {
            return Err(expected_actual("height", config.height, self.height));
        }
        let tile_count = config.tile_count();

        let mut known_agents = HashMap::with_capacity(self.dwarves.len());
        for (slot, agent) in self.dwarves.iter().enumerate() {
            if let Some(first_slot) = known_agents.insert(agent.id, slot) {
                return Err(invalid(
                    format!("dwarves[{slot}].id"),
                    format!(
                        "duplicate agent id {} (first seen at dwarves[{first_slot}].id)",
                        agent.id.0
                    ),
                ));
            }
            validate_agent(slot, agent, tile_count)?;
        }

        for index in self.modified_tiles.keys() {
            if *index >= tile_count {
                return Err(invalid(
                    format!("modifiedTiles.{index}"),
                    format!("index out of bounds for {tile_count} tiles"),
                ));
            }
        }

        let mut task_ids = HashSet::with_capacity(self.tasks.len());
        let mut task_indices = HashMap::with_capacity(self.tasks.len());
        for (slot, task) in self.tasks.iter().enumerate() {
            if !task_ids.insert(task.id) {
                return Err(invalid(
                    format!("tasks[{slot}].id"),
                    format!("duplicate task id {}", task.id.0),
                ));
            }
            if task.index >= tile_count {
                return Err(invalid(
                    format!("tasks[{slot}].index"),
                    format!("index {} out of bounds for {tile_count} tiles", task.index),
                ));
            }
            if let Some(first_slot) = task_indices.insert(task.index, slot) {
                return Err(invalid(
                    format!("tasks[{slot}].index"),
                    format!(
                        "tile {} already tasked by tasks[{first_slot}]",
                        task.index
                    ),
                ));
            }
            if let Some(agent_id) = task.claimed_by {
                let Some(agent_slot) = known_agents.get(&agent_id).copied() else {
                    return Err(invalid(
                        format!("tasks[{slot}].claimedBy"),
                        format!("unknown agent id {}", agent_id.0),
                    ));
                };
                let claimant = &self.dwarves[agent_slot];
                if !is_headed_for(claimant, task.index) {
                    return Err(invalid(
                        format!("tasks[{slot}].claimedBy"),
                        format!(
                            "claimant dwarves[{agent_slot}] is {} and not working tile {}",
                            claimant.state.as_token(),
                            task.index
                        ),
                    ));
                }
            }
        }

        if let (Some(next_task_id), Some(max_id)) =
            (self.next_task_id, self.tasks.iter().map(|task| task.id.0).max())
        {
            if next_task_id <= max_id {
                return Err(invalid(
                    "nextTaskId",
                    format!("{next_task_id} must be greater than max task id {max_id}"),
                ));
            }
        }

        Ok(())
    }
}

/// A claimed task stays claimed until its worker finishes, so the claimant
/// must be moving to or working on that tile.
fn is_headed_for(agent: &SavedAgent, index: usize) -> bool {
    matches!(agent.state, AgentState::Moving | AgentState::Working)
        && matches!(
            agent.target,
            Some(AgentTarget {
                purpose: TargetPurpose::Task { index: target },
                ..
            }) if target == index
        )
}

fn validate_agent(slot: usize, agent: &SavedAgent, tile_count: usize) -> Result<(), SnapshotError> {
    require_finite(format!("dwarves[{slot}].x"), agent.x)?;
    require_finite(format!("dwarves[{slot}].y"), agent.y)?;
    require_finite(format!("dwarves[{slot}].workTimer"), agent.work_timer)?;
    if !agent.energy.is_finite() || !(0.0..=MAX_ENERGY).contains(&agent.energy) {
        return Err(expected_actual(
            format!("dwarves[{slot}].energy"),
            format!("value in [0, {MAX_ENERGY}]"),
            agent.energy,
        ));
    }

    if let Some(target) = agent.target {
        if !target.point.is_finite() {
            return Err(invalid(
                format!("dwarves[{slot}].target.point"),
                "target point must be finite",
            ));
        }
        if let TargetPurpose::Task { index } = target.purpose {
            if index >= tile_count {
                return Err(invalid(
                    format!("dwarves[{slot}].target.purpose.index"),
                    format!("index {index} out of bounds for {tile_count} tiles"),
                ));
            }
        }
    }

    let has_task_target = matches!(
        agent.target,
        Some(AgentTarget {
            purpose: TargetPurpose::Task { .. },
            ..
        })
    );
    match agent.state {
        AgentState::Moving if agent.target.is_none() => Err(invalid(
            format!("dwarves[{slot}].target"),
            "moving agent requires a target",
        )),
        AgentState::Working if !has_task_target => Err(invalid(
            format!("dwarves[{slot}].target"),
            "working agent requires a task target",
        )),
        _ => Ok(()),
    }
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("{operation} '{path}': {source}")]
    Io {
        operation: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Storage for numbered save slots. Saving a slot replaces whatever it held.
pub trait SnapshotStore {
    fn save_slot(&mut self, slot: u32, snapshot: &SessionSnapshot) -> Result<(), PersistenceError>;
    fn load_slot(&self, slot: u32) -> Result<Option<SessionSnapshot>, PersistenceError>;
}

/// Player-facing result of a save or load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistOutcome {
    pub success: bool,
    pub message: String,
}

impl PersistOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

pub fn save_session(
    store: &mut dyn SnapshotStore,
    slot: u32,
    session: &Session,
) -> PersistOutcome {
    let snapshot = session.snapshot();
    match store.save_slot(slot, &snapshot) {
        Ok(()) => {
            info!(slot, tick = snapshot.tick, "save_completed");
            PersistOutcome::ok(format!("saved slot {slot} at tick {}", snapshot.tick))
        }
        Err(error) => {
            warn!(slot, error = %error, "save_failed");
            PersistOutcome::failed(format!("save to slot {slot} failed: {error}"))
        }
    }
}

/// Loads and restores a slot. The caller keeps its current session unless a
/// session is returned.
pub fn load_session(
    store: &dyn SnapshotStore,
    slot: u32,
    config: WorldConfig,
    tuning: SimTuning,
) -> (PersistOutcome, Option<Session>) {
    let snapshot = match store.load_slot(slot) {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => {
            info!(slot, "load_slot_empty");
            return (PersistOutcome::failed(format!("slot {slot} is empty")), None);
        }
        Err(error) => {
            warn!(slot, error = %error, "load_failed");
            return (
                PersistOutcome::failed(format!("load from slot {slot} failed: {error}")),
                None,
            );
        }
    };

    match Session::restore(config, tuning, &snapshot) {
        Ok(session) => (
            PersistOutcome::ok(format!("loaded slot {slot} at tick {}", snapshot.tick)),
            Some(session),
        ),
        Err(error) => {
            warn!(slot, error = %error, "load_failed");
            (
                PersistOutcome::failed(format!("load from slot {slot} failed: {error}")),
                None,
            )
        }
    }
}
