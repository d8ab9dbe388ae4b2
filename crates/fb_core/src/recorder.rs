//! Trial data sinks
//!
//! Two append-only tables come out of an experiment run:
//!
//! - trial summary: `Test,BallX,BallY,Robots,Seconds,FoundBy`, one row per
//!   trial. The row is written in two halves: the placement fields when the
//!   ball is placed, the outcome fields when the trial closes.
//! - positions: `Test,Seconds,Robot1Pos..Robot5Pos`, at most one row per
//!   second of a live trial. Each slot is `x;y;orientation` or blank.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::RecorderError;
use crate::placement::Pose;

pub const TRIAL_HEADER: [&str; 6] = ["Test", "BallX", "BallY", "Robots", "Seconds", "FoundBy"];
pub const POSITION_HEADER: [&str; 7] = [
    "Test",
    "Seconds",
    "Robot1Pos",
    "Robot2Pos",
    "Robot3Pos",
    "Robot4Pos",
    "Robot5Pos",
];

/// Number of per-player slots in a position row.
pub const POSITION_SLOTS: usize = 5;

/// Ball coordinates go to the table at 0.1 mm; integral values print bare.
fn mm_field(mm: f64) -> String {
    ((mm * 10.0).round() / 10.0).to_string()
}

/// First half of a trial-summary row.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialOpened {
    /// 1-based trial number.
    pub sequence: u32,
    pub ball_x_mm: f64,
    pub ball_y_mm: f64,
    pub agent_count: usize,
}

/// Second half of a trial-summary row.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialClosed {
    pub sequence: u32,
    pub elapsed_secs: u64,
    /// Player numbers of the agents credited with the find.
    pub found_by: Vec<u8>,
}

impl TrialClosed {
    /// `1;3` style list, or `-1` when nobody found the ball.
    pub fn found_by_field(&self) -> String {
        if self.found_by.is_empty() {
            return "-1".to_string();
        }
        self.found_by
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(";")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionRow {
    pub sequence: u32,
    pub elapsed_secs: u64,
    /// Slot `i` holds the pose reported by player number `i + 1`.
    pub slots: [Option<Pose>; POSITION_SLOTS],
}

impl PositionRow {
    pub fn slot_fields(&self) -> Vec<String> {
        self.slots
            .iter()
            .map(|slot| match slot {
                Some(p) => format!("{};{};{}", p.x, p.y, p.orientation),
                None => String::new(),
            })
            .collect()
    }
}

pub trait TrialSink {
    fn open_trial(&mut self, row: &TrialOpened) -> Result<(), RecorderError>;

    fn close_trial(&mut self, row: &TrialClosed) -> Result<(), RecorderError>;

    fn log_positions(&mut self, row: &PositionRow) -> Result<(), RecorderError>;

    fn flush(&mut self) -> Result<(), RecorderError>;
}

/// CSV-backed sink. Each half of a trial row is flushed as soon as it is
/// written so an interrupted run still leaves the placement on disk.
pub struct CsvRecorder<W: Write> {
    trials: csv::Writer<W>,
    positions: csv::Writer<W>,
    open: Option<u32>,
}

impl<W: Write> CsvRecorder<W> {
    pub fn new(trials: W, positions: W) -> Result<Self, RecorderError> {
        let mut trials = csv::WriterBuilder::new().flexible(true).from_writer(trials);
        let mut positions = csv::Writer::from_writer(positions);

        trials.write_record(TRIAL_HEADER)?;
        positions.write_record(POSITION_HEADER)?;
        trials.flush()?;
        positions.flush()?;

        Ok(Self {
            trials,
            positions,
            open: None,
        })
    }

    /// Flush and hand back the underlying writers.
    pub fn into_inner(self) -> Result<(W, W), RecorderError> {
        let trials = self
            .trials
            .into_inner()
            .map_err(|e| RecorderError::Io(e.into_error()))?;
        let positions = self
            .positions
            .into_inner()
            .map_err(|e| RecorderError::Io(e.into_error()))?;
        Ok((trials, positions))
    }
}

/// Paths of the files opened by [`CsvRecorder::create_in`].
#[derive(Debug, Clone)]
pub struct RecorderPaths {
    pub trials: PathBuf,
    pub positions: PathBuf,
}

impl RecorderPaths {
    pub fn for_stamp(dir: &Path, stamp: &str) -> Self {
        Self {
            trials: dir.join(format!("{}_test.csv", stamp)),
            positions: dir.join(format!("{}_pos.csv", stamp)),
        }
    }
}

impl CsvRecorder<File> {
    /// Create `<stamp>_test.csv` and `<stamp>_pos.csv` in `dir`.
    pub fn create_in(dir: &Path, stamp: &str) -> Result<(Self, RecorderPaths), RecorderError> {
        std::fs::create_dir_all(dir)?;
        let paths = RecorderPaths::for_stamp(dir, stamp);
        let trials = File::create(&paths.trials)?;
        let positions = File::create(&paths.positions)?;
        let recorder = Self::new(trials, positions)?;
        Ok((recorder, paths))
    }
}

impl<W: Write> TrialSink for CsvRecorder<W> {
    fn open_trial(&mut self, row: &TrialOpened) -> Result<(), RecorderError> {
        self.trials.write_field(row.sequence.to_string())?;
        self.trials.write_field(mm_field(row.ball_x_mm))?;
        self.trials.write_field(mm_field(row.ball_y_mm))?;
        self.trials.write_field(row.agent_count.to_string())?;
        self.trials.flush()?;
        self.open = Some(row.sequence);
        Ok(())
    }

    fn close_trial(&mut self, row: &TrialClosed) -> Result<(), RecorderError> {
        if self.open != Some(row.sequence) {
            return Err(RecorderError::NotOpen {
                sequence: row.sequence,
            });
        }
        self.trials.write_field(row.elapsed_secs.to_string())?;
        self.trials.write_field(row.found_by_field())?;
        self.trials.write_record(None::<&[u8]>)?;
        self.trials.flush()?;
        self.positions.flush()?;
        self.open = None;
        Ok(())
    }

    fn log_positions(&mut self, row: &PositionRow) -> Result<(), RecorderError> {
        let mut record = vec![row.sequence.to_string(), row.elapsed_secs.to_string()];
        record.extend(row.slot_fields());
        self.positions.write_record(&record)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), RecorderError> {
        self.trials.flush()?;
        self.positions.flush()?;
        Ok(())
    }
}

/// One trial-summary row as held by [`MemoryRecorder`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrialRecord {
    pub opened: TrialOpened,
    pub closed: Option<TrialClosed>,
}

/// Keeps every row in memory. Used by tests and headless rehearsals.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecorder {
    pub trials: Vec<TrialRecord>,
    pub positions: Vec<PositionRow>,
    pub flushes: usize,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn closed_trials(&self) -> impl Iterator<Item = &TrialClosed> {
        self.trials.iter().filter_map(|t| t.closed.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty() && self.positions.is_empty()
    }
}

impl TrialSink for MemoryRecorder {
    fn open_trial(&mut self, row: &TrialOpened) -> Result<(), RecorderError> {
        self.trials.push(TrialRecord {
            opened: row.clone(),
            closed: None,
        });
        Ok(())
    }

    fn close_trial(&mut self, row: &TrialClosed) -> Result<(), RecorderError> {
        match self.trials.last_mut() {
            Some(last) if last.closed.is_none() && last.opened.sequence == row.sequence => {
                last.closed = Some(row.clone());
                Ok(())
            }
            _ => Err(RecorderError::NotOpen {
                sequence: row.sequence,
            }),
        }
    }

    fn log_positions(&mut self, row: &PositionRow) -> Result<(), RecorderError> {
        self.positions.push(row.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), RecorderError> {
        self.flushes += 1;
        Ok(())
    }
}
