use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::world::{TileOverlay, Tilemap, Vec2};

use super::events::{SimEvent, SimEventBus};
use super::resources::{ResourceKind, Resources};
use super::tasks::{TaskKind, TaskQueue};
use super::{SimTuning, MAX_ENERGY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Idle,
    Moving,
    Working,
    Sleeping,
}

impl AgentState {
    pub fn as_token(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Moving => "moving",
            Self::Working => "working",
            Self::Sleeping => "sleeping",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetPurpose {
    Task { index: usize },
    Base,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentTarget {
    pub point: Vec2,
    pub purpose: TargetPurpose,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub position: Vec2,
    pub color: u32,
    pub state: AgentState,
    pub target: Option<AgentTarget>,
    pub work_timer: f32,
    pub energy: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RosterEntry {
    pub name: String,
    pub color: u32,
    /// `None` places the agent next to the spawn point.
    pub position: Option<Vec2>,
}

impl RosterEntry {
    pub fn new(name: impl Into<String>, color: u32) -> Self {
        Self {
            name: name.into(),
            color,
            position: None,
        }
    }

    pub fn at(mut self, position: Vec2) -> Self {
        self.position = Some(position);
        self
    }
}

pub fn default_roster() -> Vec<RosterEntry> {
    vec![
        RosterEntry::new("Urist", 0xe74c3c),
        RosterEntry::new("Bomrek", 0x3498db),
        RosterEntry::new("Kadol", 0xf1c40f),
    ]
}

/// Everything an agent may touch during its step. Neighbour positions are
/// captured at the start of the tick so every agent sees the same picture.
pub(crate) struct AgentTickContext<'a> {
    pub(crate) dt: f32,
    pub(crate) tuning: &'a SimTuning,
    pub(crate) tilemap: &'a Tilemap,
    pub(crate) overlay: &'a mut TileOverlay,
    pub(crate) tasks: &'a mut TaskQueue,
    pub(crate) resources: &'a mut Resources,
    pub(crate) rng: &'a mut StdRng,
    pub(crate) events: &'a mut SimEventBus,
    pub(crate) base: Option<Vec2>,
    pub(crate) neighbors: &'a [(AgentId, Vec2)],
}

fn jitter(rng: &mut StdRng, amount: f32) -> f32 {
    if amount > 0.0 && amount.is_finite() {
        rng.gen_range(-amount..=amount)
    } else {
        0.0
    }
}

impl Agent {
    pub fn new(id: AgentId, name: impl Into<String>, color: u32, position: Vec2) -> Self {
        Self {
            id,
            name: name.into(),
            position,
            color,
            state: AgentState::Idle,
            target: None,
            work_timer: 0.0,
            energy: MAX_ENERGY,
        }
    }

    pub fn is_low_on_energy(&self, tuning: &SimTuning) -> bool {
        tuning.energy_enabled && self.energy < tuning.low_energy_threshold
    }

    pub(crate) fn drain_energy(&mut self, tuning: &SimTuning, dt: f32) {
        if !tuning.energy_enabled || self.state == AgentState::Sleeping {
            return;
        }
        self.energy = (self.energy - tuning.energy_drain_per_second * dt).max(0.0);
    }

    pub(crate) fn step(&mut self, ctx: &mut AgentTickContext<'_>) {
        match self.state {
            AgentState::Idle => self.step_idle(ctx),
            AgentState::Moving => self.step_moving(ctx),
            AgentState::Working => self.step_working(ctx),
            AgentState::Sleeping => self.step_sleeping(ctx),
        }
    }

    fn set_state(&mut self, next: AgentState) {
        if self.state != next {
            debug!(
                agent_id = self.id.0,
                from = self.state.as_token(),
                to = next.as_token(),
                "agent_state_changed"
            );
            self.state = next;
        }
    }

    fn return_to_idle(&mut self) {
        self.target = None;
        self.work_timer = 0.0;
        self.set_state(AgentState::Idle);
    }

    fn step_idle(&mut self, ctx: &mut AgentTickContext<'_>) {
        if self.is_low_on_energy(ctx.tuning) {
            if let Some(base) = ctx.base {
                self.target = Some(AgentTarget {
                    point: base,
                    purpose: TargetPurpose::Base,
                });
                self.set_state(AgentState::Moving);
                return;
            }
        }

        if let Some(task) = ctx.tasks.claim_next(self.id) {
            // Submission bounds-checks indices; a restored bad index works in place.
            let center = ctx
                .tilemap
                .tile_center_px(task.index)
                .unwrap_or(self.position);
            let offset = Vec2 {
                x: jitter(ctx.rng, ctx.tuning.target_jitter_px),
                y: jitter(ctx.rng, ctx.tuning.target_jitter_px),
            };
            self.target = Some(AgentTarget {
                point: center + offset,
                purpose: TargetPurpose::Task { index: task.index },
            });
            ctx.events.emit(SimEvent::TaskClaimed {
                task_id: task.id,
                agent_id: self.id,
            });
            debug!(
                agent_id = self.id.0,
                task_id = task.id.0,
                index = task.index,
                "task_claimed"
            );
            self.set_state(AgentState::Moving);
            return;
        }

        let wander_chance = ctx.tuning.wander_chance.clamp(0.0, 1.0);
        if wander_chance > 0.0 && ctx.rng.gen_bool(wander_chance) {
            let step = Vec2 {
                x: jitter(ctx.rng, ctx.tuning.wander_step_px),
                y: jitter(ctx.rng, ctx.tuning.wander_step_px),
            };
            self.position = ctx.tilemap.clamp_to_bounds(self.position + step);
        }
    }

    fn step_moving(&mut self, ctx: &mut AgentTickContext<'_>) {
        let Some(target) = self.target else {
            self.return_to_idle();
            return;
        };

        let to_target = target.point - self.position;
        let distance = to_target.length();
        if distance < ctx.tuning.arrival_threshold_px {
            self.arrive(target, ctx);
            return;
        }

        let travel = (ctx.tuning.speed_px_per_second * ctx.dt).min(distance);
        let push = self.repulsion(ctx);
        let next = self.position + to_target.scale(travel / distance) + push;
        self.position = ctx.tilemap.clamp_to_bounds(next);
    }

    fn arrive(&mut self, target: AgentTarget, ctx: &mut AgentTickContext<'_>) {
        match target.purpose {
            TargetPurpose::Task { index } => {
                self.work_timer = ctx.tuning.work_duration_seconds;
                ctx.events.emit(SimEvent::WorkStarted {
                    agent_id: self.id,
                    index,
                });
                self.set_state(AgentState::Working);
            }
            TargetPurpose::Base => {
                if self.is_low_on_energy(ctx.tuning) {
                    ctx.events
                        .emit(SimEvent::AgentSleeping { agent_id: self.id });
                    self.set_state(AgentState::Sleeping);
                } else {
                    self.return_to_idle();
                }
            }
        }
    }

    /// Pairwise push away from every neighbour inside the repulsion radius,
    /// measured from where this agent stood at the start of the tick.
    /// Quadratic in roster size.
    fn repulsion(&self, ctx: &AgentTickContext<'_>) -> Vec2 {
        let radius = ctx.tuning.repulsion_radius_px;
        let mut push = Vec2::ZERO;
        for (other_id, other_position) in ctx.neighbors {
            if *other_id == self.id {
                continue;
            }
            let offset = self.position - *other_position;
            let distance = offset.length();
            if distance >= radius {
                continue;
            }
            let direction = if distance > f32::EPSILON {
                offset.scale(distance.recip())
            } else if self.id < *other_id {
                Vec2::new(-1.0, 0.0)
            } else {
                Vec2::new(1.0, 0.0)
            };
            let strength = (radius - distance) * ctx.tuning.repulsion_gain_per_second * ctx.dt;
            push += direction.scale(strength);
        }
        push
    }

    fn step_working(&mut self, ctx: &mut AgentTickContext<'_>) {
        self.work_timer -= ctx.dt;
        let wobble = Vec2 {
            x: jitter(ctx.rng, ctx.tuning.work_jitter_px),
            y: jitter(ctx.rng, ctx.tuning.work_jitter_px),
        };
        self.position = ctx.tilemap.clamp_to_bounds(self.position + wobble);
        if self.work_timer > 0.0 {
            return;
        }

        if let Some(AgentTarget {
            purpose: TargetPurpose::Task { index },
            ..
        }) = self.target
        {
            self.finish_work(index, ctx);
        }
        self.return_to_idle();
    }

    fn finish_work(&mut self, index: usize, ctx: &mut AgentTickContext<'_>) {
        let Some(task) = ctx.tasks.task_at(index).copied() else {
            ctx.events.emit(SimEvent::WorkTargetMissing {
                agent_id: self.id,
                index,
            });
            debug!(agent_id = self.id.0, index, "work_target_missing");
            return;
        };

        let tile = task.kind.completed_tile();
        ctx.overlay.set(index, tile);
        match task.kind {
            TaskKind::Chop => {
                let amount = ctx.tuning.chop_wood_yield;
                credit(ctx, ResourceKind::Wood, amount);
            }
            TaskKind::Mine => {
                let amount = ctx.tuning.mine_stone_yield;
                credit(ctx, ResourceKind::Stone, amount);
                let bonus_chance = ctx.tuning.mine_bonus_chance.clamp(0.0, 1.0);
                if bonus_chance > 0.0 && ctx.rng.gen_bool(bonus_chance) {
                    credit(ctx, ResourceKind::Gold, 1);
                }
            }
            TaskKind::BuildWood | TaskKind::BuildStone => {}
        }
        ctx.tasks.complete(task.id);

        ctx.events.emit(SimEvent::TaskCompleted {
            task_id: task.id,
            agent_id: self.id,
            index,
            kind: task.kind,
        });
        ctx.events.emit(SimEvent::TerrainChanged { index, tile });
        debug!(
            agent_id = self.id.0,
            task_id = task.id.0,
            index,
            kind = %task.kind,
            tile = %tile,
            "task_completed"
        );
    }

    fn step_sleeping(&mut self, ctx: &mut AgentTickContext<'_>) {
        self.energy = (self.energy + ctx.tuning.sleep_regen_per_second * ctx.dt).min(MAX_ENERGY);
        if self.energy >= MAX_ENERGY {
            ctx.events.emit(SimEvent::AgentRested { agent_id: self.id });
            self.return_to_idle();
        }
    }
}

fn credit(ctx: &mut AgentTickContext<'_>, resource: ResourceKind, amount: u32) {
    if amount == 0 {
        return;
    }
    ctx.resources.credit(resource, amount);
    ctx.events
        .emit(SimEvent::ResourcesCredited { resource, amount });
}
