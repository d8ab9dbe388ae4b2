//! Headless rehearsal collaborators
//!
//! Stand-ins for the simulator connection and the agent server that live in
//! the same process. The simulator applies commands straight to a shared
//! field model; synthetic agents join on a schedule, spin until the ball is
//! in view, then walk up to it. Good enough to run the whole experiment loop
//! end to end without a simulator or robots.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use fb_core::error::Result;
use fb_core::{
    AgentId, AgentPool, AgentStatus, AgentTelemetry, FieldGeometry, LinkError, PlayMode, PlayerId,
    SimPlayer, SimulatorLink, SimulatorSnapshot,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;

/// Closest a walking agent gets to the ball, meters.
const STOP_SHORT_M: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Robot {
    pub number: u8,
    pub x: f64,
    pub y: f64,
    /// Degrees, 0 = facing the opponent goal.
    pub orientation: f64,
}

#[derive(Debug)]
pub struct Field {
    pub geometry: FieldGeometry,
    pub ball: (f64, f64, f64),
    pub robots: BTreeMap<PlayerId, Robot>,
    pub play_mode: PlayMode,
    pub selected: Option<PlayerId>,
    next_player: u32,
}

pub type SharedField = Rc<RefCell<Field>>;

impl Field {
    pub fn shared(geometry: FieldGeometry) -> SharedField {
        Rc::new(RefCell::new(Self {
            geometry,
            ball: (0.0, 0.0, 0.0),
            robots: BTreeMap::new(),
            play_mode: PlayMode::BeforeKickOff,
            selected: None,
            next_player: 1,
        }))
    }

    /// Drop a robot on the touchline and return its simulator identity.
    pub fn add_robot(&mut self, number: u8) -> PlayerId {
        let id = PlayerId(self.next_player);
        self.next_player += 1;
        let x = -self.geometry.half_length + f64::from(number);
        self.robots.insert(
            id,
            Robot {
                number,
                x,
                y: -self.geometry.half_width,
                orientation: 90.0,
            },
        );
        id
    }

    fn clamp_to_field(&self, x: f64, y: f64) -> (f64, f64) {
        (
            x.clamp(-self.geometry.half_length, self.geometry.half_length),
            y.clamp(-self.geometry.half_width, self.geometry.half_width),
        )
    }
}

pub struct HeadlessSimulator {
    field: SharedField,
}

impl HeadlessSimulator {
    pub fn new(field: SharedField) -> Self {
        Self { field }
    }
}

impl SimulatorLink for HeadlessSimulator {
    fn latest_snapshot(&self) -> SimulatorSnapshot {
        let field = self.field.borrow();
        SimulatorSnapshot {
            players: field
                .robots
                .iter()
                .map(|(id, robot)| SimPlayer {
                    id: *id,
                    number: robot.number,
                })
                .collect(),
            play_mode: field.play_mode,
        }
    }

    fn send_move_ball(&mut self, x: f64, y: f64, z: f64) -> Result<()> {
        self.field.borrow_mut().ball = (x, y, z);
        Ok(())
    }

    fn send_move_player(
        &mut self,
        player: PlayerId,
        x: f64,
        y: f64,
        _z: f64,
        orientation: f64,
    ) -> Result<()> {
        let mut field = self.field.borrow_mut();
        let robot = field
            .robots
            .get_mut(&player)
            .ok_or(LinkError::UnknownPlayer(player.0))?;
        robot.x = x;
        robot.y = y;
        robot.orientation = orientation;
        Ok(())
    }

    fn send_select_player(&mut self, player: PlayerId) -> Result<()> {
        let mut field = self.field.borrow_mut();
        if !field.robots.contains_key(&player) {
            return Err(LinkError::UnknownPlayer(player.0));
        }
        field.selected = Some(player);
        Ok(())
    }

    fn send_set_play_mode(&mut self, mode: PlayMode) -> Result<()> {
        self.field.borrow_mut().play_mode = mode;
        Ok(())
    }
}

/// How the synthetic agents behave.
#[derive(Debug, Clone, Copy)]
pub struct AgentScript {
    /// Agents that will eventually join (at most 5).
    pub agents: u8,
    /// Poll interval between joins; the first agent joins on the first poll.
    pub join_every: u64,
    /// Meters walked per poll.
    pub speed: f64,
    /// Degrees turned per poll while searching.
    pub turn_rate: f64,
    /// Meters.
    pub view_range: f64,
    /// Full camera cone, degrees.
    pub field_of_view: f64,
}

impl Default for AgentScript {
    fn default() -> Self {
        Self {
            agents: 1,
            join_every: 500,
            speed: 0.01,
            turn_rate: 3.0,
            view_range: 3.0,
            field_of_view: 60.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SyntheticAgent {
    player: PlayerId,
    telemetry: AgentTelemetry,
}

pub struct SyntheticAgents {
    field: SharedField,
    script: AgentScript,
    rng: ChaCha8Rng,
    agents: BTreeMap<AgentId, SyntheticAgent>,
    status: AgentStatus,
    polls: u64,
}

impl SyntheticAgents {
    pub fn new(field: SharedField, script: AgentScript, seed: u64) -> Self {
        Self {
            field,
            script,
            rng: ChaCha8Rng::seed_from_u64(seed),
            agents: BTreeMap::new(),
            status: AgentStatus::Held,
            polls: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn status(&self) -> AgentStatus {
        self.status
    }

    fn join(&mut self) {
        let number = self.agents.len() as u8 + 1;
        let player = self.field.borrow_mut().add_robot(number);
        let id = AgentId(u32::from(number));
        self.agents.insert(
            id,
            SyntheticAgent {
                player,
                telemetry: AgentTelemetry {
                    player_number: number,
                    ..Default::default()
                },
            },
        );
        info!(agent = %id, player = %player, number, "Synthetic agent joined");
    }

    fn step_all(&mut self) {
        let Self {
            field,
            script,
            rng,
            agents,
            status,
            ..
        } = self;
        let mut field = field.borrow_mut();

        for agent in agents.values_mut() {
            let ball = field.ball;
            let Some(mut robot) = field.robots.get(&agent.player).copied() else {
                continue;
            };

            if *status == AgentStatus::Active {
                if agent.telemetry.ball_visible {
                    let (dx, dy) = (ball.0 - robot.x, ball.1 - robot.y);
                    let distance = dx.hypot(dy);
                    robot.orientation = dy.atan2(dx).to_degrees();
                    let stride = script.speed.min((distance - STOP_SHORT_M).max(0.0));
                    if distance > 0.0 {
                        robot.x += dx / distance * stride;
                        robot.y += dy / distance * stride;
                    }
                } else {
                    let jitter: f64 = rng.gen_range(-1.0..1.0);
                    robot.orientation =
                        normalize_degrees(robot.orientation + script.turn_rate + jitter);
                    if rng.gen_bool(0.3) {
                        let heading = robot.orientation.to_radians();
                        robot.x += heading.cos() * script.speed;
                        robot.y += heading.sin() * script.speed;
                    }
                }
                let (x, y) = field.clamp_to_field(robot.x, robot.y);
                robot.x = x;
                robot.y = y;
                field.robots.insert(agent.player, robot);
            }

            let (dx, dy) = (ball.0 - robot.x, ball.1 - robot.y);
            let distance = dx.hypot(dy);
            let off_axis = normalize_degrees(dy.atan2(dx).to_degrees() - robot.orientation);
            let visible =
                distance <= script.view_range && off_axis.abs() <= script.field_of_view / 2.0;

            let t = &mut agent.telemetry;
            t.x = robot.x;
            t.y = robot.y;
            t.orientation = robot.orientation;
            t.ball_visible = visible;
            t.ball_seen_streak = if visible { t.ball_seen_streak + 1 } else { 0 };
            t.distance_to_ball = distance * 1000.0;
        }
    }
}

impl AgentPool for SyntheticAgents {
    fn poll(&mut self) -> Result<()> {
        let room = self.agents.len() < usize::from(self.script.agents.min(5));
        if room && self.polls % self.script.join_every.max(1) == 0 {
            self.join();
        }
        self.polls += 1;
        self.step_all();
        Ok(())
    }

    fn connected_agents(&self) -> Vec<AgentId> {
        self.agents.keys().copied().collect()
    }

    fn latest_telemetry(&self, agent: AgentId) -> Option<AgentTelemetry> {
        self.agents.get(&agent).map(|a| a.telemetry)
    }

    fn broadcast(&mut self, status: AgentStatus) -> Result<()> {
        self.status = status;
        Ok(())
    }
}

/// Wrap to (-180, 180].
fn normalize_degrees(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}
