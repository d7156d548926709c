use crate::world::TileType;

use super::agents::AgentId;
use super::resources::ResourceKind;
use super::tasks::{TaskId, TaskKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    TaskSubmitted {
        task_id: TaskId,
        index: usize,
        kind: TaskKind,
    },
    TaskClaimed {
        task_id: TaskId,
        agent_id: AgentId,
    },
    WorkStarted {
        agent_id: AgentId,
        index: usize,
    },
    TaskCompleted {
        task_id: TaskId,
        agent_id: AgentId,
        index: usize,
        kind: TaskKind,
    },
    /// The render layer should redraw this tile.
    TerrainChanged {
        index: usize,
        tile: TileType,
    },
    WorkTargetMissing {
        agent_id: AgentId,
        index: usize,
    },
    ResourcesCredited {
        resource: ResourceKind,
        amount: u32,
    },
    AgentSleeping {
        agent_id: AgentId,
    },
    AgentRested {
        agent_id: AgentId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEventKind {
    TaskSubmitted,
    TaskClaimed,
    WorkStarted,
    TaskCompleted,
    TerrainChanged,
    WorkTargetMissing,
    ResourcesCredited,
    AgentSleeping,
    AgentRested,
}

impl SimEvent {
    pub fn kind(self) -> SimEventKind {
        match self {
            Self::TaskSubmitted { .. } => SimEventKind::TaskSubmitted,
            Self::TaskClaimed { .. } => SimEventKind::TaskClaimed,
            Self::WorkStarted { .. } => SimEventKind::WorkStarted,
            Self::TaskCompleted { .. } => SimEventKind::TaskCompleted,
            Self::TerrainChanged { .. } => SimEventKind::TerrainChanged,
            Self::WorkTargetMissing { .. } => SimEventKind::WorkTargetMissing,
            Self::ResourcesCredited { .. } => SimEventKind::ResourcesCredited,
            Self::AgentSleeping { .. } => SimEventKind::AgentSleeping,
            Self::AgentRested { .. } => SimEventKind::AgentRested,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimEventCounts {
    pub total: u32,
    pub task_submitted: u32,
    pub task_claimed: u32,
    pub work_started: u32,
    pub task_completed: u32,
    pub terrain_changed: u32,
    pub work_target_missing: u32,
    pub resources_credited: u32,
    pub agent_sleeping: u32,
    pub agent_rested: u32,
}

impl SimEventCounts {
    fn record(&mut self, kind: SimEventKind) {
        self.total = self.total.saturating_add(1);
        let slot = match kind {
            SimEventKind::TaskSubmitted => &mut self.task_submitted,
            SimEventKind::TaskClaimed => &mut self.task_claimed,
            SimEventKind::WorkStarted => &mut self.work_started,
            SimEventKind::TaskCompleted => &mut self.task_completed,
            SimEventKind::TerrainChanged => &mut self.terrain_changed,
            SimEventKind::WorkTargetMissing => &mut self.work_target_missing,
            SimEventKind::ResourcesCredited => &mut self.resources_credited,
            SimEventKind::AgentSleeping => &mut self.agent_sleeping,
            SimEventKind::AgentRested => &mut self.agent_rested,
        };
        *slot = slot.saturating_add(1);
    }
}

/// Events raised between two rollovers. Submissions made between ticks land
/// in the pending buffer and are reported with the next tick.
#[derive(Debug, Default)]
pub(crate) struct SimEventBus {
    pending: Vec<SimEvent>,
    last_tick_events: Vec<SimEvent>,
    last_tick_counts: SimEventCounts,
}

impl SimEventBus {
    pub(crate) fn emit(&mut self, event: SimEvent) {
        self.pending.push(event);
    }

    pub(crate) fn finish_tick_rollover(&mut self) {
        let mut counts = SimEventCounts::default();
        for event in &self.pending {
            counts.record(event.kind());
        }
        self.last_tick_counts = counts;
        self.last_tick_events.clear();
        self.last_tick_events.append(&mut self.pending);
    }

    pub(crate) fn last_tick_events(&self) -> &[SimEvent] {
        &self.last_tick_events
    }

    pub(crate) fn last_tick_counts(&self) -> SimEventCounts {
        self.last_tick_counts
    }
}
