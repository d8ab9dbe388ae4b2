//! # fb_core - Find-Ball Experiment Controller
//!
//! Runs an unattended ball-finding experiment against a simulated SPL soccer
//! match. The ball is placed at a repeatable sequence of spots, agents are
//! released to search for it, and each trial's duration and finders are
//! written to CSV for offline analysis.
//!
//! ## Features
//! - Tick-driven state machine, one tick per driver loop iteration
//! - Deterministic spawn points (same spawn index = same spot, every run)
//! - Tolerates agents joining and leaving at any time
//! - Two-phase trial rows so an interrupted run still leaves placements on disk

pub mod clock;
pub mod config;
pub mod controller;
pub mod detection;
pub mod error;
pub mod links;
pub mod placement;
pub mod recorder;
pub mod spawn;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ExperimentConfig, FieldGeometry, FieldPoint};
pub use controller::{ExperimentController, ExperimentState, OpenTrial, TrialOutcome};
pub use error::{ConfigError, LinkError, PlacementError, RecorderError};
pub use links::{
    AgentId, AgentPool, AgentStatus, AgentTelemetry, PlayMode, PlayerId, SimPlayer,
    SimulatorLink, SimulatorSnapshot,
};
pub use recorder::{CsvRecorder, MemoryRecorder, TrialSink};
pub use spawn::{SpawnPlan, SpawnPoint};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
