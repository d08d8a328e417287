use thiserror::Error;

/// Errors of the combination engine.
#[derive(Debug, Error, PartialEq)]
pub enum StackError {
    /// No frame contributed usable data.
    #[error("No usable frames to combine")]
    EmptyInput,

    #[error("Missing or invalid calibration keyword {key}")]
    MissingCalibration { key: &'static str },
}
