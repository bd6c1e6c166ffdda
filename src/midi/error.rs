// MIDI output errors

/// Failures opening or writing to a MIDI destination
#[derive(Debug, thiserror::Error)]
pub enum MidiError {
    #[error("MIDI backend unavailable: {0}")]
    Init(String),

    #[error("No MIDI output port matches '{0}'")]
    PortNotFound(String),

    #[error("No MIDI output ports available")]
    NoPorts,

    #[error("Failed to connect to MIDI port: {0}")]
    Connect(String),

    #[error("Failed to send MIDI message: {0}")]
    Send(String),
}
