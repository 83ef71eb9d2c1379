use thiserror::Error;

#[derive(Error, Debug)]
pub enum KickoffError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Spawn error: {0}")]
    SpawnError(String),

    #[error("No terminal emulator found: {0}")]
    TerminalNotFound(String),

    #[error("Readiness probe error: {0}")]
    ProbeError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, KickoffError>;
