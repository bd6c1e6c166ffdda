// Command module
//
// Rows of step data are interpreted at playback time through a registry of
// commands. Each command declares one Parameter per data column (range, step,
// default) and a behaviour from a closed set of kinds.
//
// - Parameter: column metadata used for clamping and editor increments
// - Command / CommandRegistry: id and name lookup, built once, shared by Arc
// - CommandKind: note output or a cross-sequence adjustment posted to the
//   sequencer's mailbox through CommandContext

pub mod kinds;
pub mod parameter;
pub mod registry;

pub use kinds::{Adjustment, AdjustmentKind, CommandContext, CommandKind};
pub use parameter::{
    CHANNEL_COL, CMD_COL, DURATION_COL, NOTE_COL, PROBABILITY_COL, Parameter, ROW_WIDTH,
    VELOCITY_COL,
};
pub use registry::{Command, CommandRegistry, MIDI_NOTE_COMMAND};
