mod agents;
mod events;
mod resources;
mod session;
mod tasks;

use serde::{Deserialize, Serialize};

use crate::world::ConfigError;

pub use agents::{
    default_roster, Agent, AgentId, AgentState, AgentTarget, RosterEntry, TargetPurpose,
};
pub use events::{SimEvent, SimEventCounts, SimEventKind};
pub use resources::{
    Cost, ResourceKind, Resources, Shortfall, STARTING_FOOD, STARTING_STONE, STARTING_WOOD,
};
pub use session::{FrameView, Session, TickReport};
pub use tasks::{
    Task, TaskId, TaskKind, TaskQueue, TaskRejected, BUILD_STONE_COST, BUILD_WOOD_COST,
};

pub const MAX_ENERGY: f32 = 100.0;
const LOW_ENERGY_THRESHOLD: f32 = 20.0;
const ENERGY_DRAIN_PER_SECOND: f32 = 0.5;
const SLEEP_REGEN_PER_SECOND: f32 = 10.0;
const SPEED_PX_PER_SECOND: f32 = 64.0;
const ARRIVAL_THRESHOLD_PX: f32 = 6.0;
const WORK_DURATION_SECONDS: f32 = 2.0;
const REPULSION_RADIUS_PX: f32 = 16.0;
const REPULSION_GAIN_PER_SECOND: f32 = 4.0;
const TARGET_JITTER_PX: f32 = 4.0;
const WANDER_CHANCE_PER_TICK: f64 = 0.02;
const WANDER_STEP_PX: f32 = 1.5;
const WORK_JITTER_PX: f32 = 0.5;
const CHOP_WOOD_YIELD: u32 = 5;
const MINE_STONE_YIELD: u32 = 1;
const MINE_BONUS_CHANCE: f64 = 0.1;
const ROSTER_SPACING_PX: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimTuning {
    pub energy_enabled: bool,
    pub low_energy_threshold: f32,
    pub energy_drain_per_second: f32,
    pub sleep_regen_per_second: f32,
    pub speed_px_per_second: f32,
    /// Kept above a single tick's travel so agents never orbit the target.
    pub arrival_threshold_px: f32,
    pub work_duration_seconds: f32,
    pub repulsion_radius_px: f32,
    pub repulsion_gain_per_second: f32,
    pub target_jitter_px: f32,
    pub wander_chance: f64,
    pub wander_step_px: f32,
    pub work_jitter_px: f32,
    pub chop_wood_yield: u32,
    pub mine_stone_yield: u32,
    pub mine_bonus_chance: f64,
    pub roster_spacing_px: f32,
}

impl Default for SimTuning {
    fn default() -> Self {
        Self {
            energy_enabled: true,
            low_energy_threshold: LOW_ENERGY_THRESHOLD,
            energy_drain_per_second: ENERGY_DRAIN_PER_SECOND,
            sleep_regen_per_second: SLEEP_REGEN_PER_SECOND,
            speed_px_per_second: SPEED_PX_PER_SECOND,
            arrival_threshold_px: ARRIVAL_THRESHOLD_PX,
            work_duration_seconds: WORK_DURATION_SECONDS,
            repulsion_radius_px: REPULSION_RADIUS_PX,
            repulsion_gain_per_second: REPULSION_GAIN_PER_SECOND,
            target_jitter_px: TARGET_JITTER_PX,
            wander_chance: WANDER_CHANCE_PER_TICK,
            wander_step_px: WANDER_STEP_PX,
            work_jitter_px: WORK_JITTER_PX,
            chop_wood_yield: CHOP_WOOD_YIELD,
            mine_stone_yield: MINE_STONE_YIELD,
            mine_bonus_chance: MINE_BONUS_CHANCE,
            roster_spacing_px: ROSTER_SPACING_PX,
        }
    }
}

const POSITIVE: &str = "a positive finite number";
const NON_NEGATIVE: &str = "a non-negative finite number";
const PROBABILITY: &str = "a probability in [0, 1]";

fn require(
    field: &'static str,
    value: f64,
    expected: &'static str,
    holds: bool,
) -> Result<(), ConfigError> {
    if value.is_finite() && holds {
        Ok(())
    } else {
        Err(ConfigError::InvalidTuning {
            field,
            value,
            expected,
        })
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    require(field, f64::from(value), POSITIVE, value > 0.0)
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    require(field, f64::from(value), NON_NEGATIVE, value >= 0.0)
}

fn probability(field: &'static str, value: f64) -> Result<(), ConfigError> {
    require(field, value, PROBABILITY, (0.0..=1.0).contains(&value))
}

impl SimTuning {
    /// Rejects values that would stall or destabilise an agent: a zero arrival
    /// threshold never registers arrival, a zero speed never moves.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("speed_px_per_second", self.speed_px_per_second)?;
        positive("arrival_threshold_px", self.arrival_threshold_px)?;
        positive("work_duration_seconds", self.work_duration_seconds)?;
        positive("sleep_regen_per_second", self.sleep_regen_per_second)?;
        require(
            "low_energy_threshold",
            f64::from(self.low_energy_threshold),
            "a number in [0, 100]",
            (0.0..=MAX_ENERGY).contains(&self.low_energy_threshold),
        )?;
        non_negative("energy_drain_per_second", self.energy_drain_per_second)?;
        non_negative("repulsion_radius_px", self.repulsion_radius_px)?;
        non_negative("repulsion_gain_per_second", self.repulsion_gain_per_second)?;
        non_negative("target_jitter_px", self.target_jitter_px)?;
        non_negative("wander_step_px", self.wander_step_px)?;
        non_negative("work_jitter_px", self.work_jitter_px)?;
        non_negative("roster_spacing_px", self.roster_spacing_px)?;
        probability("wander_chance", self.wander_chance)?;
        probability("mine_bonus_chance", self.mine_bonus_chance)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests;
