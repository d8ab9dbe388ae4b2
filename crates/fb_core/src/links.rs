//! Contracts of the collaborators the controller drives.
//!
//! The simulator connection and the agent server own their own network
//! sessions. The controller only sees the latest cached snapshot of each and
//! issues fire-and-forget commands; nothing here blocks on I/O.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Simulator-side identity of a player on the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "player#{}", self.0)
    }
}

/// Agent-server identity of one connected agent session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub u32);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "agent#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayMode {
    BeforeKickOff,
    KickOffLeft,
    KickOffRight,
    PlayOn,
    GoalLeft,
    GoalRight,
    GameOver,
}

impl PlayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayMode::BeforeKickOff => "BeforeKickOff",
            PlayMode::KickOffLeft => "KickOff_Left",
            PlayMode::KickOffRight => "KickOff_Right",
            PlayMode::PlayOn => "PlayOn",
            PlayMode::GoalLeft => "Goal_Left",
            PlayMode::GoalRight => "Goal_Right",
            PlayMode::GameOver => "GameOver",
        }
    }
}

impl fmt::Display for PlayMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimPlayer {
    pub id: PlayerId,
    /// Shirt number reported by the simulator (1-5 for a full SPL team).
    pub number: u8,
}

/// Latest state the simulator connection has cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorSnapshot {
    pub players: Vec<SimPlayer>,
    pub play_mode: PlayMode,
}

impl Default for SimulatorSnapshot {
    fn default() -> Self {
        Self {
            players: Vec::new(),
            play_mode: PlayMode::BeforeKickOff,
        }
    }
}

/// Most recent report from one agent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentTelemetry {
    pub player_number: u8,
    /// Self-localised position, field meters.
    pub x: f64,
    pub y: f64,
    /// Degrees.
    pub orientation: f64,
    /// Consecutive vision frames that contained the ball.
    pub ball_seen_streak: u32,
    pub ball_visible: bool,
    /// Millimeters.
    pub distance_to_ball: f64,
}

/// Control status broadcast to every agent each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentStatus {
    /// In active play.
    Active,
    /// Held out of play (penalised) while the field is being set up.
    Held,
}

impl AgentStatus {
    /// SPL game-controller `gameState` value carried to the agent.
    pub fn game_state(&self) -> u8 {
        match self {
            AgentStatus::Active => 3,
            AgentStatus::Held => 5,
        }
    }

    /// SPL game-controller penalty code carried to the agent.
    pub fn penalty(&self) -> u8 {
        match self {
            AgentStatus::Active => 0,
            AgentStatus::Held => 1,
        }
    }
}

pub trait SimulatorLink {
    /// Drain pending updates from the simulator. Called by the driver once per
    /// loop iteration, before the controller tick.
    fn poll(&mut self) -> Result<()> {
        Ok(())
    }

    fn latest_snapshot(&self) -> SimulatorSnapshot;

    fn send_move_ball(&mut self, x: f64, y: f64, z: f64) -> Result<()>;

    fn send_move_player(
        &mut self,
        player: PlayerId,
        x: f64,
        y: f64,
        z: f64,
        orientation: f64,
    ) -> Result<()>;

    fn send_select_player(&mut self, player: PlayerId) -> Result<()>;

    fn send_set_play_mode(&mut self, mode: PlayMode) -> Result<()>;
}

pub trait AgentPool {
    /// Accept new sessions and drain incoming reports.
    fn poll(&mut self) -> Result<()> {
        Ok(())
    }

    fn connected_agents(&self) -> Vec<AgentId>;

    /// `None` when the agent has not reported yet or its session is gone.
    fn latest_telemetry(&self, agent: AgentId) -> Option<AgentTelemetry>;

    fn broadcast(&mut self, status: AgentStatus) -> Result<()>;
}
