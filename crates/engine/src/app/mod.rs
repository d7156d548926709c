mod loop_runner;
mod metrics;

pub use loop_runner::{FrameObserver, FrameOutcome, LoopConfig, SimLoop};
pub use metrics::LoopMetricsSnapshot;
