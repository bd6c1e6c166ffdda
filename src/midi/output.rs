// MIDI output sink
// Immediate note-ons, tick-scheduled note-offs, and all-notes-off panic

use crate::midi::error::MidiError;
use crate::midi::event::{MIDI_CHANNELS, MidiEvent};
use crate::midi::queue::DelayedMessageQueue;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Destination the engine plays into
///
/// Commands call `play_note` while a step fires; the clock callback calls
/// `send_due` once per tick to flush the note-offs scheduled for that tick.
pub trait OutputSink: Send + Sync {
    /// Send a note-on now and schedule its note-off for `off_tick`
    fn play_note(&self, channel: u8, note: u8, velocity: u8, off_tick: u64);

    /// Emit every message scheduled for exactly `tick`
    fn send_due(&self, tick: u64);

    /// Drop pending note-offs and silence every channel
    fn all_off(&self);
}

/// Raw byte destination behind a `MidiOutputSink`
pub trait MessageWriter: Send {
    fn send(&mut self, bytes: &[u8]) -> Result<(), MidiError>;
}

/// Writer that logs messages instead of sending them (dry run)
#[derive(Debug, Default)]
pub struct LogWriter;

impl MessageWriter for LogWriter {
    fn send(&mut self, bytes: &[u8]) -> Result<(), MidiError> {
        match MidiEvent::from_bytes(bytes) {
            Some(event) => log::info!("midi out: {:?}", event),
            None => log::info!("midi out: {:02X?}", bytes),
        }
        Ok(())
    }
}

/// Output sink writing encoded messages through a `MessageWriter`
pub struct MidiOutputSink<W: MessageWriter> {
    writer: Mutex<W>,
    queue: Mutex<DelayedMessageQueue>,
    panicking: AtomicBool,
}

impl<W: MessageWriter> MidiOutputSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            queue: Mutex::new(DelayedMessageQueue::new()),
            panicking: AtomicBool::new(false),
        }
    }

    /// Number of note-offs still waiting to be sent
    pub fn pending_messages(&self) -> usize {
        self.queue.lock().len()
    }

    fn write(&self, event: MidiEvent) {
        if let Err(e) = self.writer.lock().send(&event.to_bytes()) {
            log::warn!("Dropping {:?}: {}", event, e);
        }
    }
}

impl<W: MessageWriter> OutputSink for MidiOutputSink<W> {
    fn play_note(&self, channel: u8, note: u8, velocity: u8, off_tick: u64) {
        if self.panicking.load(Ordering::Acquire) {
            log::debug!("Ignoring note {} on channel {} during panic", note, channel);
            return;
        }

        self.write(MidiEvent::NoteOn {
            channel,
            note,
            velocity,
        });
        self.queue
            .lock()
            .schedule(off_tick, MidiEvent::NoteOff { channel, note });
    }

    fn send_due(&self, tick: u64) {
        // Release the queue before touching the writer
        let due = self.queue.lock().drain_and_remove(tick);
        for event in due {
            self.write(event);
        }
    }

    fn all_off(&self) {
        self.panicking.store(true, Ordering::Release);
        self.queue.lock().clear_all();
        for channel in 0..MIDI_CHANNELS {
            self.write(MidiEvent::all_notes_off(channel));
        }
        self.panicking.store(false, Ordering::Release);
        log::info!("All notes off sent on {} channels", MIDI_CHANNELS);
    }
}

/// A note-on as seen by `RecordingOutput`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayedNote {
    pub channel: u8,
    pub note: u8,
    pub velocity: u8,
    pub off_tick: u64,
}

/// Sink that records everything it is asked to play, for tests and dry runs
#[derive(Default)]
pub struct RecordingOutput {
    played: Mutex<Vec<PlayedNote>>,
    sent: Mutex<Vec<(u64, MidiEvent)>>,
    events: Mutex<Vec<MidiEvent>>,
    queue: Mutex<DelayedMessageQueue>,
    all_off_calls: Mutex<usize>,
}

impl RecordingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every note-on received, in order
    pub fn played(&self) -> Vec<PlayedNote> {
        self.played.lock().clone()
    }

    /// Note numbers of every note-on received, in order
    pub fn played_notes(&self) -> Vec<u8> {
        self.played.lock().iter().map(|p| p.note).collect()
    }

    /// Messages released by `send_due`, paired with the tick they went out on
    pub fn sent(&self) -> Vec<(u64, MidiEvent)> {
        self.sent.lock().clone()
    }

    /// Note-ons and released note-offs interleaved in the order they arrived
    pub fn events(&self) -> Vec<MidiEvent> {
        self.events.lock().clone()
    }

    pub fn pending_messages(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn all_off_calls(&self) -> usize {
        *self.all_off_calls.lock()
    }

    /// Forget everything recorded so far (pending note-offs are kept)
    pub fn clear(&self) {
        self.played.lock().clear();
        self.sent.lock().clear();
        self.events.lock().clear();
    }
}

impl OutputSink for RecordingOutput {
    fn play_note(&self, channel: u8, note: u8, velocity: u8, off_tick: u64) {
        self.played.lock().push(PlayedNote {
            channel,
            note,
            velocity,
            off_tick,
        });
        self.events.lock().push(MidiEvent::NoteOn {
            channel,
            note,
            velocity,
        });
        self.queue
            .lock()
            .schedule(off_tick, MidiEvent::NoteOff { channel, note });
    }

    fn send_due(&self, tick: u64) {
        let due = self.queue.lock().drain_and_remove(tick);
        self.events.lock().extend(due.iter().copied());
        self.sent
            .lock()
            .extend(due.into_iter().map(|event| (tick, event)));
    }

    fn all_off(&self) {
        self.queue.lock().clear_all();
        *self.all_off_calls.lock() += 1;
    }
}
