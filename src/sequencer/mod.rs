// Sequencer module
// Clock, steps, sequences and the multi-track engine that ties them together

pub mod clock;
pub mod engine;
pub mod error;
pub mod grid;
pub mod sequence;
pub mod step;
pub mod tempo;

pub use clock::{ManualClock, SimpleClock, TickCallback, TickSource};
pub use engine::Sequencer;
pub use error::{SequencerError, SequencerResult};
pub use grid::{ColumnState, Cursor, GridCell};
pub use sequence::{MAX_SEQUENCE_LENGTH, Sequence, SequenceType, StepFire};
pub use step::{Step, StepCallback};
pub use tempo::{TICKS_PER_BEAT, Tempo};
