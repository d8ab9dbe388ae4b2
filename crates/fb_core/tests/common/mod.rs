//! Scripted simulator and agent pool for driving the controller tick by tick.

#![allow(dead_code)]

use std::collections::BTreeMap;

use fb_core::error::Result;
use fb_core::{
    AgentId, AgentPool, AgentStatus, AgentTelemetry, ExperimentConfig, ExperimentController,
    LinkError, ManualClock, MemoryRecorder, PlayMode, PlayerId, SimPlayer, SimulatorLink,
    SimulatorSnapshot,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    MoveBall { x: f64, y: f64, z: f64 },
    MovePlayer {
        player: PlayerId,
        x: f64,
        y: f64,
        z: f64,
        orientation: f64,
    },
    SelectPlayer(PlayerId),
    SetPlayMode(PlayMode),
}

#[derive(Debug, Default)]
pub struct FakeSimulator {
    pub snapshot: SimulatorSnapshot,
    pub commands: Vec<Command>,
    pub reject_moves: bool,
}

impl FakeSimulator {
    pub fn with_players(numbers: &[u8]) -> Self {
        let players = numbers
            .iter()
            .enumerate()
            .map(|(i, n)| SimPlayer {
                id: PlayerId(100 + i as u32),
                number: *n,
            })
            .collect();
        Self {
            snapshot: SimulatorSnapshot {
                players,
                play_mode: PlayMode::BeforeKickOff,
            },
            ..Default::default()
        }
    }

    pub fn ball_moves(&self) -> Vec<(f64, f64, f64)> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::MoveBall { x, y, z } => Some((*x, *y, *z)),
                _ => None,
            })
            .collect()
    }

    pub fn player_moves(&self) -> Vec<Command> {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::MovePlayer { .. }))
            .cloned()
            .collect()
    }
}

impl SimulatorLink for FakeSimulator {
    fn latest_snapshot(&self) -> SimulatorSnapshot {
        self.snapshot.clone()
    }

    fn send_move_ball(&mut self, x: f64, y: f64, z: f64) -> Result<()> {
        self.commands.push(Command::MoveBall { x, y, z });
        if self.reject_moves {
            return Err(LinkError::Rejected("ball".into()));
        }
        Ok(())
    }

    fn send_move_player(
        &mut self,
        player: PlayerId,
        x: f64,
        y: f64,
        z: f64,
        orientation: f64,
    ) -> Result<()> {
        self.commands.push(Command::MovePlayer {
            player,
            x,
            y,
            z,
            orientation,
        });
        if self.reject_moves {
            return Err(LinkError::Rejected("player".into()));
        }
        Ok(())
    }

    fn send_select_player(&mut self, player: PlayerId) -> Result<()> {
        self.commands.push(Command::SelectPlayer(player));
        Ok(())
    }

    fn send_set_play_mode(&mut self, mode: PlayMode) -> Result<()> {
        self.commands.push(Command::SetPlayMode(mode));
        self.snapshot.play_mode = mode;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FakeAgents {
    pub agents: BTreeMap<AgentId, Option<AgentTelemetry>>,
    pub broadcasts: Vec<AgentStatus>,
}

impl FakeAgents {
    pub fn connect(&mut self, id: u32, number: u8) {
        self.agents.insert(
            AgentId(id),
            Some(AgentTelemetry {
                player_number: number,
                ..Default::default()
            }),
        );
    }

    pub fn connect_silent(&mut self, id: u32) {
        self.agents.insert(AgentId(id), None);
    }

    pub fn disconnect(&mut self, id: u32) {
        self.agents.remove(&AgentId(id));
    }

    pub fn report(&mut self, id: u32, update: impl FnOnce(&mut AgentTelemetry)) {
        if let Some(Some(t)) = self.agents.get_mut(&AgentId(id)) {
            update(t);
        }
    }

    /// Report a settled close-range sighting of the ball.
    pub fn sees_ball(&mut self, id: u32) {
        self.report(id, |t| {
            t.ball_seen_streak = 5;
            t.ball_visible = true;
            t.distance_to_ball = 250.0;
        });
    }
}

impl AgentPool for FakeAgents {
    fn connected_agents(&self) -> Vec<AgentId> {
        self.agents.keys().copied().collect()
    }

    fn latest_telemetry(&self, agent: AgentId) -> Option<AgentTelemetry> {
        self.agents.get(&agent).copied().flatten()
    }

    fn broadcast(&mut self, status: AgentStatus) -> Result<()> {
        self.broadcasts.push(status);
        Ok(())
    }
}

pub struct Rig {
    pub sim: FakeSimulator,
    pub agents: FakeAgents,
    pub clock: ManualClock,
    pub controller: ExperimentController<MemoryRecorder, ManualClock>,
}

impl Rig {
    pub fn new(config: ExperimentConfig) -> Self {
        let clock = ManualClock::new();
        let controller =
            ExperimentController::new(config, MemoryRecorder::new(), clock.clone()).unwrap();
        Self {
            sim: FakeSimulator::with_players(&[1, 2]),
            agents: FakeAgents::default(),
            clock,
            controller,
        }
    }

    pub fn reference() -> Self {
        Self::new(ExperimentConfig::default())
    }

    pub fn tick(&mut self) {
        self.controller.tick(&mut self.sim, &mut self.agents);
    }

    pub fn tick_n(&mut self, n: usize) {
        for _ in 0..n {
            self.tick();
        }
    }

    pub fn recorder(&self) -> &MemoryRecorder {
        self.controller.recorder()
    }

    /// From an entered pre-roll, run the 151 ticks it takes to go live.
    pub fn run_pre_roll(&mut self) {
        self.tick_n(151);
    }

    /// Connect agent 1 (player 1) and run until its first trial is live.
    pub fn start_first_trial(&mut self) {
        self.agents.connect(1, 1);
        self.tick();
        self.run_pre_roll();
    }
}
