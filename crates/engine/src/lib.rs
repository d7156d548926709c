pub mod app;
pub mod save;
pub mod sim;
pub mod world;

pub use app::{FrameObserver, FrameOutcome, LoopConfig, LoopMetricsSnapshot, SimLoop};
pub use save::{
    load_session, save_session, PersistOutcome, PersistenceError, SavedAgent, SavedTask,
    SessionSnapshot, SnapshotError, SnapshotStore, SAVE_VERSION,
};
pub use sim::{
    Agent, AgentId, AgentState, FrameView, ResourceKind, Resources, Session, SimEvent,
    SimTuning, Task, TaskId, TaskKind, TaskRejected, TickReport,
};
pub use world::{ConfigError, TileOverlay, TileType, Tilemap, Vec2, WorldConfig, WorldSeed};
