use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::world::TileType;

use super::agents::AgentId;
use super::resources::{Cost, ResourceKind, Resources};

pub const BUILD_WOOD_COST: Cost = Cost {
    resource: ResourceKind::Wood,
    amount: 5,
};
pub const BUILD_STONE_COST: Cost = Cost {
    resource: ResourceKind::Stone,
    amount: 3,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Chop,
    Mine,
    BuildWood,
    BuildStone,
}

impl TaskKind {
    pub const ALL: [TaskKind; 4] = [Self::Chop, Self::Mine, Self::BuildWood, Self::BuildStone];

    pub fn as_token(self) -> &'static str {
        match self {
            Self::Chop => "chop",
            Self::Mine => "mine",
            Self::BuildWood => "build_wood",
            Self::BuildStone => "build_stone",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_token().eq_ignore_ascii_case(token))
    }

    pub fn accepts_tile(self, tile: TileType) -> bool {
        match self {
            Self::Chop => tile == TileType::Forest,
            Self::Mine => tile == TileType::Mountain,
            Self::BuildWood | Self::BuildStone => tile.is_buildable(),
        }
    }

    /// Reserved from the stockpile when the order is placed.
    pub fn cost(self) -> Option<Cost> {
        match self {
            Self::Chop | Self::Mine => None,
            Self::BuildWood => Some(BUILD_WOOD_COST),
            Self::BuildStone => Some(BUILD_STONE_COST),
        }
    }

    /// Overlay value written when the work completes.
    pub fn completed_tile(self) -> TileType {
        match self {
            Self::Chop => TileType::Stump,
            Self::Mine => TileType::Floor,
            Self::BuildWood => TileType::WoodWall,
            Self::BuildStone => TileType::StoneWall,
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_token())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub index: usize,
    pub kind: TaskKind,
    pub claimed_by: Option<AgentId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskRejected {
    #[error("tile {index} is outside the map")]
    OutOfBounds { index: usize },
    #[error("tile {index} already has a {existing} order")]
    AlreadyTasked { index: usize, existing: TaskKind },
    #[error("cannot {kind} on {tile} (tile {index})")]
    InvalidTile {
        index: usize,
        kind: TaskKind,
        tile: TileType,
    },
    #[error("not enough {resource} to {kind}: need {needed}, have {available}")]
    InsufficientResources {
        kind: TaskKind,
        resource: ResourceKind,
        needed: u32,
        available: u32,
    },
}

/// Pending work orders. Ids are handed out in increasing order, so iterating
/// `tasks_by_id` yields submission order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskQueue {
    next_task_id: u64,
    tasks_by_id: BTreeMap<TaskId, Task>,
    task_by_index: HashMap<usize, TaskId>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a queue from saved parts. Callers validate uniqueness first.
    pub(crate) fn from_parts(tasks: impl IntoIterator<Item = Task>, next_task_id: u64) -> Self {
        let mut queue = Self {
            next_task_id,
            ..Self::default()
        };
        for task in tasks {
            queue.task_by_index.insert(task.index, task.id);
            queue.tasks_by_id.insert(task.id, task);
        }
        queue
    }

    pub fn submit(
        &mut self,
        index: usize,
        kind: TaskKind,
        effective_tile: TileType,
        resources: &mut Resources,
    ) -> Result<TaskId, TaskRejected> {
        if let Some(existing) = self.task_at(index) {
            return Err(TaskRejected::AlreadyTasked {
                index,
                existing: existing.kind,
            });
        }
        if !kind.accepts_tile(effective_tile) {
            return Err(TaskRejected::InvalidTile {
                index,
                kind,
                tile: effective_tile,
            });
        }
        if let Some(cost) = kind.cost() {
            resources
                .try_debit(cost)
                .map_err(|shortfall| TaskRejected::InsufficientResources {
                    kind,
                    resource: shortfall.resource,
                    needed: shortfall.needed,
                    available: shortfall.available,
                })?;
        }

        let id = TaskId(self.next_task_id);
        self.next_task_id = self.next_task_id.saturating_add(1);
        self.tasks_by_id.insert(
            id,
            Task {
                id,
                index,
                kind,
                claimed_by: None,
            },
        );
        self.task_by_index.insert(index, id);
        debug!(task_id = id.0, index, kind = %kind, "task_submitted");
        Ok(id)
    }

    /// Claims the oldest unclaimed task. No proximity preference.
    pub fn claim_next(&mut self, agent_id: AgentId) -> Option<Task> {
        let task = self
            .tasks_by_id
            .values_mut()
            .find(|task| task.claimed_by.is_none())?;
        task.claimed_by = Some(agent_id);
        Some(*task)
    }

    pub fn complete(&mut self, task_id: TaskId) -> Option<Task> {
        let task = self.tasks_by_id.remove(&task_id)?;
        self.task_by_index.remove(&task.index);
        Some(task)
    }

    pub fn get(&self, task_id: TaskId) -> Option<&Task> {
        self.tasks_by_id.get(&task_id)
    }

    pub fn task_at(&self, index: usize) -> Option<&Task> {
        self.task_by_index
            .get(&index)
            .and_then(|task_id| self.tasks_by_id.get(task_id))
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks_by_id.values()
    }

    pub fn next_task_id(&self) -> u64 {
        self.next_task_id
    }

    pub fn len(&self) -> usize {
        self.tasks_by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks_by_id.is_empty()
    }
}
