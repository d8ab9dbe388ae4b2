use thiserror::Error;

/// Failure reported by a simulator or agent-server command.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinkError {
    #[error("Not connected: {0}")]
    Disconnected(String),

    #[error("Command rejected: {0}")]
    Rejected(String),

    #[error("Unknown player: {0}")]
    UnknownPlayer(u32),
}

impl LinkError {
    /// A rejected command or a stale player id only costs one placement; a
    /// dropped connection leaves nothing to drive.
    pub fn is_recoverable(&self) -> bool {
        match self {
            LinkError::Disconnected(_) => false,
            LinkError::Rejected(_) | LinkError::UnknownPlayer(_) => true,
        }
    }
}

/// Raised by the starting-position policy for a player it has no slot for.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlacementError {
    #[error("No starting position for player number {0}")]
    UnknownPlayerNumber(u8),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported config format: {path}")]
    UnsupportedFormat { path: String },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Trial {sequence} closed without being opened")]
    NotOpen { sequence: u32 },
}

pub type Result<T> = std::result::Result<T, LinkError>;
