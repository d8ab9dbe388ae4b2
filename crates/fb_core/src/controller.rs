//! Find-ball experiment controller
//!
//! A tick-driven state machine that turns a live simulator, a changing pool
//! of agents and the wall clock into a sequence of timed trials:
//!
//! ```text
//! NotStarted --(roster grows)--> Starting --(countdown hits 0)--> Started
//!                                  ^   ^                             |  |
//!                                  |   +------(roster grows)---------+  |
//!                                  |                                    |
//!                                  +----(cooldown mark)---- Finished <--+
//!                                                       (found / timeout)
//! ```
//!
//! Every tick runs, in order: play-mode reconciliation, the current state's
//! handler, the agent status broadcast, and position logging. Nothing inside
//! a tick waits on the network; collaborators hand back cached snapshots and
//! accept fire-and-forget commands.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::clock::{whole_seconds_between, Clock};
use crate::config::ExperimentConfig;
use crate::detection::collect_finders;
use crate::error::{ConfigError, RecorderError};
use crate::links::{AgentPool, AgentStatus, PlayMode, SimulatorLink, SimulatorSnapshot};
use crate::placement::{Pose, StartingPositions};
use crate::recorder::{PositionRow, TrialClosed, TrialOpened, TrialSink, POSITION_SLOTS};
use crate::spawn::{SpawnPlan, SpawnPoint};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExperimentState {
    /// Waiting for the first agent.
    NotStarted,
    /// Pre-roll before a trial goes live. Players and ball are placed once
    /// the countdown reaches the placement mark.
    Starting {
        remaining: u32,
        placed: bool,
    },
    /// Trial is live; agents are searching.
    Started { started_at: Duration },
    /// Cooldown after a trial. The ball is parked off the field part way
    /// through, then the next pre-roll begins.
    Finished {
        remaining: u32,
        ball_stashed: bool,
    },
}

impl ExperimentState {
    pub fn name(&self) -> &'static str {
        match self {
            ExperimentState::NotStarted => "NOT_STARTED",
            ExperimentState::Starting { .. } => "TEST_STARTING",
            ExperimentState::Started { .. } => "TEST_STARTED",
            ExperimentState::Finished { .. } => "TEST_FINISHED",
        }
    }

    /// Status broadcast to agents while in this state.
    pub fn agent_status(&self) -> AgentStatus {
        match self {
            ExperimentState::Started { .. } | ExperimentState::Finished { .. } => {
                AgentStatus::Active
            }
            ExperimentState::NotStarted | ExperimentState::Starting { .. } => AgentStatus::Held,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialOutcome {
    Found,
    TimedOut,
    Cancelled,
}

/// A trial whose summary row has been opened but not closed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpenTrial {
    /// 0-based sequence index.
    pub sequence: u32,
    pub spawn: SpawnPoint,
    pub agent_count: usize,
}

pub struct ExperimentController<R: TrialSink, C: Clock> {
    config: ExperimentConfig,
    spawn: SpawnPlan,
    positions: StartingPositions,
    recorder: R,
    clock: C,
    state: ExperimentState,
    /// 0-based index of the trial being prepared or run.
    sequence: u32,
    start_index: u32,
    known_agents: usize,
    open_trial: Option<OpenTrial>,
    last_logged_second: Option<u64>,
}

impl<R: TrialSink, C: Clock> ExperimentController<R, C> {
    pub fn new(config: ExperimentConfig, recorder: R, clock: C) -> Result<Self, ConfigError> {
        config.validate()?;

        let spawn = SpawnPlan::new(&config.spawn, config.field);
        let positions = StartingPositions::new(&config.starting_positions);
        let start_index = config.start_index();

        info!(
            start_sequence = config.start_sequence,
            spawn_pool = spawn.pool_size(),
            "Waiting for agents to connect"
        );

        Ok(Self {
            config,
            spawn,
            positions,
            recorder,
            clock,
            state: ExperimentState::NotStarted,
            sequence: start_index,
            start_index,
            known_agents: 0,
            open_trial: None,
            last_logged_second: None,
        })
    }

    pub fn state(&self) -> ExperimentState {
        self.state
    }

    /// 0-based index of the current trial.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// 1-based trial number as written to the trial table.
    pub fn trial_number(&self) -> u32 {
        self.sequence + 1
    }

    pub fn open_trial(&self) -> Option<&OpenTrial> {
        self.open_trial.as_ref()
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn recorder(&self) -> &R {
        &self.recorder
    }

    /// Whole seconds since the live trial started, 0 outside a live trial.
    pub fn elapsed_secs(&self) -> u64 {
        match self.state {
            ExperimentState::Started { started_at } => {
                whole_seconds_between(started_at, self.clock.now())
            }
            _ => 0,
        }
    }

    /// Advance the experiment by one tick.
    pub fn tick<S, A>(&mut self, simulator: &mut S, agents: &mut A)
    where
        S: SimulatorLink + ?Sized,
        A: AgentPool + ?Sized,
    {
        let snapshot = simulator.latest_snapshot();
        self.reconcile_play_mode(&snapshot, simulator);

        let state = self.state;
        match state {
            ExperimentState::NotStarted => self.handle_not_started(agents),
            ExperimentState::Starting { remaining, placed } => {
                self.handle_starting(remaining, placed, &snapshot, simulator)
            }
            ExperimentState::Started { started_at } => self.handle_started(started_at, agents),
            ExperimentState::Finished {
                remaining,
                ball_stashed,
            } => self.handle_finished(remaining, ball_stashed, simulator),
        }

        let status = self.state.agent_status();
        if let Err(e) = agents.broadcast(status) {
            error!(error = %e, ?status, "Error broadcasting agent status");
        }

        if let ExperimentState::Started { started_at } = self.state {
            self.log_agent_positions(started_at, agents);
        }
    }

    /// Close any open trial as cancelled and flush every sink. Called once on
    /// shutdown.
    pub fn finish(&mut self) -> Result<(), RecorderError> {
        if self.open_trial.is_some() {
            let elapsed = self.elapsed_secs();
            self.close_trial(elapsed, Vec::new(), TrialOutcome::Cancelled);
        }
        info!(trial = self.trial_number(), "Shutting down experiment");
        self.recorder.flush()
    }

    fn transition(&mut self, next: ExperimentState) {
        info!(
            from = self.state.name(),
            to = next.name(),
            "Changing experiment state"
        );
        self.state = next;
    }

    fn enter_starting(&mut self) {
        self.transition(ExperimentState::Starting {
            remaining: self.config.timings.pre_roll_ticks,
            placed: false,
        });
    }

    fn reconcile_play_mode<S: SimulatorLink + ?Sized>(
        &self,
        snapshot: &SimulatorSnapshot,
        simulator: &mut S,
    ) {
        if snapshot.play_mode == PlayMode::BeforeKickOff {
            debug!("Simulator is before kickoff, forcing game over");
            if let Err(e) = simulator.send_set_play_mode(PlayMode::GameOver) {
                error!(error = %e, "Error sending play mode command");
            }
        }
    }

    /// Growth since the previous check. Shrinking only lowers the baseline.
    fn roster_grew<A: AgentPool + ?Sized>(&mut self, agents: &A) -> bool {
        let count = agents.connected_agents().len();
        let grew = count > self.known_agents;
        self.known_agents = count;
        grew
    }

    fn handle_not_started<A: AgentPool + ?Sized>(&mut self, agents: &A) {
        if self.roster_grew(agents) {
            info!(agents = self.known_agents, "Starting experiment");
            self.enter_starting();
        }
    }

    fn handle_starting<S: SimulatorLink + ?Sized>(
        &mut self,
        remaining: u32,
        placed: bool,
        snapshot: &SimulatorSnapshot,
        simulator: &mut S,
    ) {
        if remaining == 0 {
            self.start_trial(snapshot, simulator);
            return;
        }

        let mut placed = placed;
        if remaining == self.config.timings.placement_at_remaining && !placed {
            self.prepare_trial(snapshot, simulator);
            placed = true;
        }

        self.state = ExperimentState::Starting {
            remaining: remaining - 1,
            placed,
        };
    }

    fn handle_started<A: AgentPool + ?Sized>(&mut self, started_at: Duration, agents: &A) {
        if self.roster_grew(agents) {
            info!(agents = self.known_agents, "New agent detected. Restarting experiment");
            let elapsed = whole_seconds_between(started_at, self.clock.now());
            self.close_trial(elapsed, Vec::new(), TrialOutcome::Cancelled);
            self.sequence = self.start_index;
            self.enter_starting();
            return;
        }

        let elapsed = whole_seconds_between(started_at, self.clock.now());
        if elapsed > self.config.trial_timeout_secs {
            self.close_trial(elapsed, Vec::new(), TrialOutcome::TimedOut);
            self.enter_finished();
            return;
        }

        let thresholds = &self.config.found_ball;
        let finders = collect_finders(agents, thresholds);
        if !finders.is_empty() && elapsed > thresholds.min_elapsed_secs {
            let found_by = finders.iter().map(|(_, t)| t.player_number).collect();
            self.close_trial(elapsed, found_by, TrialOutcome::Found);
            self.enter_finished();
        }
    }

    fn handle_finished<S: SimulatorLink + ?Sized>(
        &mut self,
        remaining: u32,
        ball_stashed: bool,
        simulator: &mut S,
    ) {
        let timings = self.config.timings;
        let mut ball_stashed = ball_stashed;

        if remaining == timings.stash_at_remaining && !ball_stashed {
            // Out of bounds so nobody sees it during teardown.
            let stash = self.config.ball_stash;
            if let Err(e) = simulator.send_move_ball(stash.x, stash.y, stash.z) {
                error!(error = %e, "Error sending move ball command");
            }
            ball_stashed = true;
        } else if remaining == timings.restart_at_remaining {
            self.enter_starting();
            return;
        }

        self.state = ExperimentState::Finished {
            remaining: remaining.saturating_sub(1),
            ball_stashed,
        };
    }

    fn enter_finished(&mut self) {
        self.transition(ExperimentState::Finished {
            remaining: self.config.timings.cooldown_ticks,
            ball_stashed: false,
        });
    }

    /// Move players to their starting poses, place the ball and open the
    /// trial row.
    fn prepare_trial<S: SimulatorLink + ?Sized>(
        &mut self,
        snapshot: &SimulatorSnapshot,
        simulator: &mut S,
    ) {
        info!(trial = self.trial_number(), "Preparing trial");

        for player in &snapshot.players {
            match self.positions.pose_for(player.number) {
                Ok(pose) => {
                    if let Err(e) = simulator.send_move_player(
                        player.id,
                        pose.x,
                        pose.y,
                        self.config.player_height,
                        pose.orientation,
                    ) {
                        error!(
                            player = %player.id,
                            error = %e,
                            "Error sending move player command"
                        );
                    }
                }
                Err(e) => {
                    error!(player = %player.id, error = %e, "Skipping player placement");
                }
            }
        }

        let spawn = self.spawn.point_for(self.sequence);
        if let Err(e) = simulator.send_move_ball(spawn.point.x, spawn.point.y, 0.0) {
            error!(error = %e, "Error sending move ball command");
        }

        let (ball_x_mm, ball_y_mm) = spawn.point.to_mm();
        let row = TrialOpened {
            sequence: self.trial_number(),
            ball_x_mm,
            ball_y_mm,
            agent_count: snapshot.players.len(),
        };
        if let Err(e) = self.recorder.open_trial(&row) {
            error!(trial = row.sequence, error = %e, "Error recording trial placement");
        }

        debug!(
            trial = row.sequence,
            spawn_index = spawn.index,
            x = spawn.point.x,
            y = spawn.point.y,
            predetermined = spawn.predetermined,
            "Ball placed"
        );

        self.open_trial = Some(OpenTrial {
            sequence: self.sequence,
            spawn,
            agent_count: snapshot.players.len(),
        });
    }

    fn start_trial<S: SimulatorLink + ?Sized>(
        &mut self,
        snapshot: &SimulatorSnapshot,
        simulator: &mut S,
    ) {
        // The simulator needs a selected player before it accepts play;
        // which one does not matter.
        match snapshot.players.first() {
            Some(player) => {
                if let Err(e) = simulator.send_select_player(player.id) {
                    error!(player = %player.id, error = %e, "Error sending select player command");
                }
            }
            None => warn!("No players on the field to select"),
        }

        self.last_logged_second = None;
        self.transition(ExperimentState::Started {
            started_at: self.clock.now(),
        });
        info!(trial = self.trial_number(), "New trial started");
    }

    fn close_trial(&mut self, elapsed_secs: u64, found_by: Vec<u8>, outcome: TrialOutcome) {
        let row = TrialClosed {
            sequence: self.trial_number(),
            elapsed_secs,
            found_by,
        };

        match self.open_trial.take() {
            Some(open) => {
                debug!(
                    trial = row.sequence,
                    spawn_index = open.spawn.index,
                    agents = open.agent_count,
                    "Closing trial row"
                );
                if let Err(e) = self.recorder.close_trial(&row) {
                    error!(trial = row.sequence, error = %e, "Error recording trial result");
                }
            }
            None => warn!(trial = row.sequence, "Trial closed without an open row"),
        }

        let found_by = if row.found_by.is_empty() {
            "nobody".to_string()
        } else {
            row.found_by_field()
        };
        info!(
            trial = row.sequence,
            ?outcome,
            found_by = %found_by,
            seconds = elapsed_secs,
            "Trial completed"
        );

        self.sequence += 1;
    }

    fn log_agent_positions<A: AgentPool + ?Sized>(&mut self, started_at: Duration, agents: &A) {
        let elapsed = whole_seconds_between(started_at, self.clock.now());
        if self.last_logged_second == Some(elapsed) {
            return;
        }
        self.last_logged_second = Some(elapsed);

        let mut slots: [Option<Pose>; POSITION_SLOTS] = [None; POSITION_SLOTS];
        for id in agents.connected_agents().into_iter().take(POSITION_SLOTS) {
            let Some(t) = agents.latest_telemetry(id) else {
                continue;
            };
            match (t.player_number as usize).checked_sub(1) {
                Some(slot) if slot < POSITION_SLOTS => {
                    slots[slot] = Some(Pose {
                        x: t.x,
                        y: t.y,
                        orientation: t.orientation,
                    });
                }
                _ => debug!(agent = %id, number = t.player_number, "No position slot for player"),
            }
        }

        let row = PositionRow {
            sequence: self.trial_number(),
            elapsed_secs: elapsed,
            slots,
        };
        if let Err(e) = self.recorder.log_positions(&row) {
            error!(trial = row.sequence, error = %e, "Error recording agent positions");
        }
    }
}
