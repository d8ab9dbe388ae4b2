//! Experiment configuration
//!
//! Every constant the controller depends on lives here so that alternate
//! field geometries and timings can be injected by tests and config files.
//! `ExperimentConfig::default()` is the reference configuration used for the
//! SPL field (9m x 6m).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

/// A point on the field, meters from the centre spot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldPoint {
    pub x: f64,
    pub y: f64,
}

impl FieldPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Coordinates converted to millimeters, as written to the trial table.
    pub fn to_mm(self) -> (f64, f64) {
        (self.x * 1000.0, self.y * 1000.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldGeometry {
    pub half_length: f64,
    pub half_width: f64,
}

impl Default for FieldGeometry {
    fn default() -> Self {
        Self {
            half_length: 4.5,
            half_width: 3.0,
        }
    }
}

/// Where a given shirt number is placed before each trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StartingPosition {
    pub number: u8,
    pub x: f64,
    pub y: f64,
    /// Degrees.
    pub orientation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    /// Number of distinct spawn indices (P).
    pub pool_size: u32,
    /// Fixed points used for the first N spawn indices (N <= P).
    pub predetermined: Vec<FieldPoint>,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            pool_size: 10,
            predetermined: vec![
                FieldPoint::new(2.25, 0.0),  // right middle
                FieldPoint::new(4.0, -2.5),  // bottom right corner
                FieldPoint::new(4.0, 2.5),   // top right corner
                FieldPoint::new(4.5, 3.0),   // top right corner, on line
                FieldPoint::new(2.25, -3.0), // right middle bottom, on line
                FieldPoint::new(-4.5, 3.0),  // top left corner, on line
                FieldPoint::new(4.5, 0.0),   // right goal box
                FieldPoint::new(-3.5, 0.0),  // left goal box line
                FieldPoint::new(4.5, -3.0),  // bottom right corner, on line
                FieldPoint::new(-4.5, -1.0), // left boundary next to goal
            ],
        }
    }
}

/// Countdown lengths, in ticks. Marks are "remaining" values of the
/// countdown at which the action fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    pub pre_roll_ticks: u32,
    pub placement_at_remaining: u32,
    pub cooldown_ticks: u32,
    pub stash_at_remaining: u32,
    pub restart_at_remaining: u32,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            pre_roll_ticks: 150,
            placement_at_remaining: 50,
            cooldown_ticks: 300,
            stash_at_remaining: 200,
            restart_at_remaining: 150,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoundBallThresholds {
    pub min_seen_streak: u32,
    pub max_distance_mm: f64,
    /// A trial cannot succeed until this many whole seconds have passed.
    /// Telemetry from the previous trial can still claim the ball right
    /// after a restart.
    pub min_elapsed_secs: u64,
}

impl Default for FoundBallThresholds {
    fn default() -> Self {
        Self {
            min_seen_streak: 5,
            max_distance_mm: 300.0,
            min_elapsed_secs: 1,
        }
    }
}

/// Where the ball is parked between trials.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallStash {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for BallStash {
    fn default() -> Self {
        Self {
            x: 10000.0,
            y: 10000.0,
            z: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub field: FieldGeometry,
    pub spawn: SpawnConfig,
    pub starting_positions: Vec<StartingPosition>,
    pub timings: Timings,
    pub found_ball: FoundBallThresholds,
    pub trial_timeout_secs: u64,
    pub ball_stash: BallStash,
    /// Height players are dropped at when moved.
    pub player_height: f64,
    /// 1-based trial number to start (or resume) from.
    pub start_sequence: u32,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            field: FieldGeometry::default(),
            spawn: SpawnConfig::default(),
            starting_positions: default_starting_positions(),
            timings: Timings::default(),
            found_ball: FoundBallThresholds::default(),
            trial_timeout_secs: 300,
            ball_stash: BallStash::default(),
            player_height: 0.4,
            start_sequence: 1,
        }
    }
}

fn default_starting_positions() -> Vec<StartingPosition> {
    [
        (1, -3.0, -3.0, 0.0),
        (2, -3.25, 3.0, 180.0),
        (3, -2.0, -3.0, 0.0),
        (4, -1.75, 3.0, 180.0),
        (5, -1.0, -3.0, 0.0),
    ]
    .into_iter()
    .map(|(number, x, y, orientation)| StartingPosition {
        number,
        x,
        y,
        orientation,
    })
    .collect()
}

impl ExperimentConfig {
    /// Load a config file. The format is picked from the extension
    /// (`.yaml`/`.yml` or `.json`); absent fields keep their defaults.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        let config: ExperimentConfig = match ext.as_deref() {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&text)?,
            Some("json") => serde_json::from_str(&text)?,
            _ => {
                return Err(ConfigError::UnsupportedFormat {
                    path: path.display().to_string(),
                })
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// 0-based sequence index the trial counter starts from.
    pub fn start_index(&self) -> u32 {
        self.start_sequence.saturating_sub(1)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start_sequence == 0 {
            return Err(ConfigError::Invalid(
                "start_sequence is 1-based and must be at least 1".into(),
            ));
        }
        if self.field.half_length <= 0.0 || self.field.half_width <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "field dimensions must be positive, got {}x{}",
                self.field.half_length, self.field.half_width
            )));
        }
        if self.spawn.pool_size == 0 {
            return Err(ConfigError::Invalid("spawn pool_size must be at least 1".into()));
        }
        if self.spawn.predetermined.len() > self.spawn.pool_size as usize {
            return Err(ConfigError::Invalid(format!(
                "{} predetermined points exceed pool_size {}",
                self.spawn.predetermined.len(),
                self.spawn.pool_size
            )));
        }

        let t = &self.timings;
        if t.placement_at_remaining == 0 || t.placement_at_remaining > t.pre_roll_ticks {
            return Err(ConfigError::Invalid(format!(
                "placement_at_remaining must be within 1..={}, got {}",
                t.pre_roll_ticks, t.placement_at_remaining
            )));
        }
        if t.stash_at_remaining > t.cooldown_ticks || t.stash_at_remaining <= t.restart_at_remaining
        {
            return Err(ConfigError::Invalid(format!(
                "cooldown marks must satisfy restart ({}) < stash ({}) <= cooldown ({})",
                t.restart_at_remaining, t.stash_at_remaining, t.cooldown_ticks
            )));
        }

        let mut numbers: Vec<u8> = self.starting_positions.iter().map(|p| p.number).collect();
        numbers.sort_unstable();
        if numbers.windows(2).any(|w| w[0] == w[1]) {
            return Err(ConfigError::Invalid(
                "starting_positions contains duplicate player numbers".into(),
            ));
        }

        Ok(())
    }
}
