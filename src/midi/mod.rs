// MIDI module
// Message encoding, delayed note-off scheduling and output sinks

pub mod device;
pub mod error;
pub mod event;
pub mod output;
pub mod queue;

pub use device::{MidiDeviceInfo, MidirPortWriter, list_output_ports};
pub use error::MidiError;
pub use event::MidiEvent;
pub use output::{
    LogWriter, MessageWriter, MidiOutputSink, OutputSink, PlayedNote, RecordingOutput,
};
pub use queue::DelayedMessageQueue;
