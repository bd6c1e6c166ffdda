// steptracker - Library exports for the runner, tests and benchmarks

pub mod command;
pub mod config;
pub mod midi;
pub mod project;
pub mod sequencer;

// Re-export commonly used types for convenience
pub use command::{CommandContext, CommandKind, CommandRegistry, Parameter};
pub use config::{Config, ConfigError};
pub use midi::{DelayedMessageQueue, MidiEvent, MidiOutputSink, OutputSink, RecordingOutput};
pub use project::{Project, ProjectError, ProjectManager, SequencerSnapshot};
pub use sequencer::{
    ManualClock, Sequence, SequenceType, Sequencer, SequencerError, SimpleClock, Step, Tempo,
    TickSource,
};
