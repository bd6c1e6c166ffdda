// Sequencer error types
// Precondition violations surfaced at the engine's API boundary

/// Result type for sequencer operations
pub type SequencerResult<T> = Result<T, SequencerError>;

/// Errors returned by boundary-facing sequencer, step and registry calls
///
/// Value-range problems never show up here: editor input is clamped to the
/// declared parameter range instead. These variants cover references that
/// cannot be clamped into anything meaningful.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SequencerError {
    #[error("Sequence index {index} out of range ({count} sequences)")]
    SequenceOutOfRange { index: usize, count: usize },

    #[error("Step index {index} out of range ({count} steps)")]
    StepOutOfRange { index: usize, count: usize },

    #[error("Row index {index} out of range ({count} rows)")]
    RowOutOfRange { index: usize, count: usize },

    #[error("Column index {index} out of range (row width {width})")]
    ColumnOutOfRange { index: usize, width: usize },

    #[error("Unknown command id {0}")]
    UnknownCommand(usize),

    #[error("Unknown command name '{0}'")]
    UnknownCommandName(String),

    #[error("Invalid step data: {0}")]
    InvalidData(String),
}
