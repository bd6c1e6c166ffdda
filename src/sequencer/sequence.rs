// Sequence - an ordered list of steps with a playback cursor
// Handles step timing, per-type dispatch and transient modifiers

use crate::command::kinds::{Adjustment, AdjustmentKind, CommandContext, CommandKind};
use crate::command::parameter::{CHANNEL_COL, NOTE_COL};
use crate::command::registry::CommandRegistry;
use crate::project::types::{SequenceSnapshot, StepSnapshot};
use crate::sequencer::error::{SequencerError, SequencerResult};
use crate::sequencer::step::{Step, StepCallback, validate_table};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_TICKS_PER_STEP: usize = 4;
pub const MAX_TICKS_PER_STEP: usize = 16;
pub const MAX_SEQUENCE_LENGTH: usize = 256;
/// Largest transient length change a modifier may apply, either way
pub const MAX_LENGTH_ADJUSTMENT: i32 = 15;
/// Most steps a sequence ever allocates
pub const MAX_STEP_CAPACITY: usize = MAX_SEQUENCE_LENGTH + MAX_LENGTH_ADJUSTMENT as usize;

/// Scale degrees 48..=59 mapped to general MIDI percussion
pub const SCALE_TO_DRUM: [u8; 12] = [36, 38, 40, 37, 42, 46, 50, 45, 39, 51, 57, 75];
const DRUM_SCALE_ROOT: u8 = 48;

/// Behavioural role of a sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SequenceType {
    #[default]
    MidiNote,
    DrumMidi,
    Transposer,
    LengthChanger,
    TickChanger,
    ChordMidi,
    SamplePlayer,
}

impl SequenceType {
    pub const ALL: [SequenceType; 7] = [
        SequenceType::MidiNote,
        SequenceType::DrumMidi,
        SequenceType::Transposer,
        SequenceType::LengthChanger,
        SequenceType::TickChanger,
        SequenceType::ChordMidi,
        SequenceType::SamplePlayer,
    ];

    /// Types that adjust another sequence instead of producing notes
    pub fn is_modifier(&self) -> bool {
        matches!(
            self,
            SequenceType::Transposer | SequenceType::LengthChanger | SequenceType::TickChanger
        )
    }

    /// Type after this one in `ALL`, wrapping
    pub fn next(&self) -> SequenceType {
        let index = Self::ALL.iter().position(|t| t == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            SequenceType::MidiNote => "midi",
            SequenceType::DrumMidi => "drum",
            SequenceType::Transposer => "tran",
            SequenceType::LengthChanger => "len",
            SequenceType::TickChanger => "tick",
            SequenceType::ChordMidi => "chrd",
            SequenceType::SamplePlayer => "samp",
        }
    }
}

impl fmt::Display for SequenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

/// Map a note in the drum scale octave onto a percussion note
///
/// Notes outside 48..=59 pass through unchanged.
pub fn scale_to_drum(note: f64) -> f64 {
    let rounded = note.round();
    if rounded >= DRUM_SCALE_ROOT as f64 && rounded < (DRUM_SCALE_ROOT + 12) as f64 {
        SCALE_TO_DRUM[(rounded as u8 - DRUM_SCALE_ROOT) as usize] as f64
    } else {
        note
    }
}

struct SequenceState {
    steps: Vec<Step>,
    current_step: usize,
    current_length: usize,
    seq_type: SequenceType,
    muted: bool,
    transpose: u32,
    length_adjustment: i32,
    /// Ticks per step in effect right now (may be a transient override)
    ticks_per_step: usize,
    /// Permanent ticks per step restored on wrap
    original_ticks_per_step: usize,
    ticks_elapsed: usize,
    default_row: Vec<f64>,
}

impl SequenceState {
    fn effective_length(&self) -> usize {
        (self.current_length as i64 + self.length_adjustment as i64).max(1) as usize
    }

    fn deactivate_processors(&mut self) {
        self.transpose = 0;
        self.length_adjustment = 0;
        self.ticks_per_step = self.original_ticks_per_step;
        self.ticks_elapsed = 0;
    }

    fn ensure_enough_steps(&mut self, length: usize) {
        let length = length.min(MAX_STEP_CAPACITY);
        if self.steps.len() >= length {
            return;
        }
        let (callback, channel) = match self.steps.first() {
            Some(first) => (
                first.callback(),
                first.data_at(0, CHANNEL_COL).unwrap_or(0.0),
            ),
            None => (None, 0.0),
        };
        while self.steps.len() < length {
            let mut row = self.default_row.clone();
            row[CHANNEL_COL] = channel;
            let step = Step::new(row);
            step.set_callback(callback.clone());
            self.steps.push(step);
        }
    }

    fn step(&self, index: usize) -> SequencerResult<&Step> {
        self.steps.get(index).ok_or(SequencerError::StepOutOfRange {
            index,
            count: self.steps.len(),
        })
    }

    fn wrap_cursor(&mut self) {
        let effective = self.effective_length().min(self.steps.len()).max(1);
        if self.current_step >= effective {
            self.current_step %= effective;
        }
    }
}

/// Work a step boundary leaves for the caller
///
/// Built while the sequence is locked and run after the lock is released,
/// so output I/O and user callbacks never block editors or other ticks.
pub enum StepFire {
    /// Rows to execute (already transposed or drum-mapped) and the step's callback
    Rows {
        rows: Vec<Vec<f64>>,
        callback: Option<StepCallback>,
    },
    /// Change posted by a modifier sequence to another sequence
    Adjust { target: usize, kind: AdjustmentKind },
}

impl StepFire {
    /// Play rows through the registry, or post the adjustment to `ctx.mailbox`
    pub fn run(self, registry: &CommandRegistry, ctx: &mut CommandContext<'_>) {
        match self {
            StepFire::Rows { rows, callback } => {
                for row in &rows {
                    if let Err(e) = registry.execute_row(row, ctx) {
                        log::warn!("Sequence {}: skipping row: {}", ctx.source, e);
                    }
                }
                if let Some(callback) = callback {
                    callback(&rows);
                }
            }
            StepFire::Adjust { target, kind } => ctx.mailbox.push(Adjustment {
                source: ctx.source,
                target,
                kind,
            }),
        }
    }
}

/// One track of the sequencer
///
/// All state sits behind a single reader/writer lock. Step locks are only
/// ever taken while this lock is held, never the other way round.
pub struct Sequence {
    inner: RwLock<SequenceState>,
}

impl Sequence {
    /// Sequence of `length` steps, each starting with a copy of `default_row`
    pub fn new(length: usize, default_row: Vec<f64>) -> Self {
        let length = length.clamp(1, MAX_SEQUENCE_LENGTH);
        let steps = (0..length).map(|_| Step::new(default_row.clone())).collect();
        Self {
            inner: RwLock::new(SequenceState {
                steps,
                current_step: 0,
                current_length: length,
                seq_type: SequenceType::MidiNote,
                muted: false,
                transpose: 0,
                length_adjustment: 0,
                ticks_per_step: DEFAULT_TICKS_PER_STEP,
                original_ticks_per_step: DEFAULT_TICKS_PER_STEP,
                ticks_elapsed: 0,
                default_row,
            }),
        }
    }

    /// Advance one clock tick
    ///
    /// On a step boundary the cursor moves on. When `trigger` is set and the
    /// sequence is not muted, the step it left is returned as a `StepFire`
    /// for the caller to run once this call has returned.
    pub fn tick(&self, trigger: bool, registry: &CommandRegistry) -> Option<StepFire> {
        let mut state = self.inner.write();
        state.ticks_elapsed += 1;
        if state.ticks_elapsed < state.ticks_per_step {
            return None;
        }
        state.ticks_elapsed = 0;

        let fire = if trigger && !state.muted {
            plan_step(&state, registry)
        } else {
            None
        };

        let effective = state.effective_length();
        state.current_step = (state.current_step + 1) % effective;
        if state.current_step >= state.steps.len() {
            state.current_step = 0;
        }
        if state.current_step == 0 {
            state.deactivate_processors();
        }
        fire
    }

    /// Apply an adjustment posted by another sequence
    pub fn apply_adjustment(&self, kind: AdjustmentKind) {
        match kind {
            AdjustmentKind::Transpose(semitones) => self.set_transpose(semitones),
            AdjustmentKind::LengthDelta(delta) => self.set_length_adjustment(delta),
            AdjustmentKind::TicksPerStep(tps) => {
                self.set_ticks_per_step_adjustment(tps as usize);
            }
        }
    }

    pub fn current_step(&self) -> usize {
        self.inner.read().current_step
    }

    /// Length in steps, excluding any transient adjustment
    pub fn length(&self) -> usize {
        self.inner.read().current_length
    }

    /// `length + length_adjustment`, never below 1
    pub fn effective_length(&self) -> usize {
        self.inner.read().effective_length()
    }

    /// Number of allocated steps (at least `length`)
    pub fn how_many_steps(&self) -> usize {
        self.inner.read().steps.len()
    }

    pub fn sequence_type(&self) -> SequenceType {
        self.inner.read().seq_type
    }

    pub fn set_type(&self, seq_type: SequenceType) {
        self.inner.write().seq_type = seq_type;
    }

    pub fn is_muted(&self) -> bool {
        self.inner.read().muted
    }

    pub fn set_muted(&self, muted: bool) {
        self.inner.write().muted = muted;
    }

    pub fn toggle_mute(&self) {
        let mut state = self.inner.write();
        state.muted = !state.muted;
    }

    pub fn transpose(&self) -> u32 {
        self.inner.read().transpose
    }

    /// Transient transpose, cleared on wrap
    pub fn set_transpose(&self, semitones: u32) {
        self.inner.write().transpose = semitones;
    }

    pub fn length_adjustment(&self) -> i32 {
        self.inner.read().length_adjustment
    }

    /// Transient length change, cleared on wrap
    ///
    /// `delta` is clamped to `MAX_LENGTH_ADJUSTMENT` either way. Allocates
    /// steps if the adjusted length exceeds capacity.
    pub fn set_length_adjustment(&self, delta: i32) {
        let delta = delta.clamp(-MAX_LENGTH_ADJUSTMENT, MAX_LENGTH_ADJUSTMENT);
        let mut state = self.inner.write();
        let target = (state.current_length as i64 + delta as i64).max(1) as usize;
        state.ensure_enough_steps(target);
        state.length_adjustment = delta;
        state.wrap_cursor();
    }

    /// Permanent ticks per step
    pub fn ticks_per_step(&self) -> usize {
        self.inner.read().original_ticks_per_step
    }

    /// Ticks per step currently in effect
    pub fn current_ticks_per_step(&self) -> usize {
        self.inner.read().ticks_per_step
    }

    pub fn ticks_elapsed(&self) -> usize {
        self.inner.read().ticks_elapsed
    }

    /// Set the permanent rate; values outside 1..=16 are ignored
    pub fn set_ticks_per_step(&self, tps: usize) -> bool {
        if !(1..=MAX_TICKS_PER_STEP).contains(&tps) {
            return false;
        }
        let mut state = self.inner.write();
        state.original_ticks_per_step = tps;
        state.ticks_per_step = tps;
        state.ticks_elapsed = 0;
        true
    }

    /// Override the rate until the next wrap; values outside 1..=16 are ignored
    pub fn set_ticks_per_step_adjustment(&self, tps: usize) -> bool {
        if !(1..=MAX_TICKS_PER_STEP).contains(&tps) {
            return false;
        }
        self.inner.write().ticks_per_step = tps;
        true
    }

    /// Clear transpose, length adjustment and tick override
    pub fn deactivate_processors(&self) {
        self.inner.write().deactivate_processors();
    }

    /// Cursor back to step 0 with transients cleared
    pub fn rewind(&self) {
        let mut state = self.inner.write();
        state.current_step = 0;
        state.deactivate_processors();
    }

    /// Grow capacity to at least `length` steps, up to `MAX_STEP_CAPACITY`
    ///
    /// New steps copy step 0's callback and channel. Capacity never shrinks.
    pub fn ensure_enough_steps_for_length(&self, length: usize) {
        self.inner.write().ensure_enough_steps(length);
    }

    /// Set the playing length; ignored unless `1 <= length <= capacity`
    pub fn set_length(&self, length: usize) -> bool {
        let mut state = self.inner.write();
        if length < 1 || length > state.steps.len() {
            return false;
        }
        state.current_length = length;
        state.wrap_cursor();
        true
    }

    /// Run `f` against step `index` while the sequence is read-locked
    pub fn with_step<R>(&self, index: usize, f: impl FnOnce(&Step) -> R) -> SequencerResult<R> {
        let state = self.inner.read();
        state.step(index).map(f)
    }

    pub fn step_data(&self, index: usize) -> SequencerResult<Vec<Vec<f64>>> {
        self.with_step(index, |step| step.data())
    }

    pub fn set_step_data(
        &self,
        index: usize,
        data: Vec<Vec<f64>>,
        registry: &CommandRegistry,
    ) -> SequencerResult<()> {
        self.with_step(index, |step| step.set_data(data, registry))?
    }

    pub fn is_step_active(&self, index: usize) -> SequencerResult<bool> {
        self.with_step(index, |step| step.is_active())
    }

    pub fn toggle_step_active(&self, index: usize) -> SequencerResult<()> {
        self.with_step(index, |step| step.toggle_active())
    }

    /// Copy of every step's rows, in step order
    pub fn all_step_data(&self) -> Vec<Vec<Vec<f64>>> {
        self.inner.read().steps.iter().map(|s| s.data()).collect()
    }

    /// Active flags of every allocated step
    pub fn active_flags(&self) -> Vec<bool> {
        self.inner.read().steps.iter().map(|s| s.is_active()).collect()
    }

    pub fn set_step_callback(&self, index: usize, callback: Option<StepCallback>) -> SequencerResult<()> {
        self.with_step(index, |step| step.set_callback(callback))
    }

    pub fn set_all_callbacks(&self, callback: Option<StepCallback>) {
        let state = self.inner.read();
        for step in &state.steps {
            step.set_callback(callback.clone());
        }
    }

    /// Channel of step 0's first row
    pub fn channel(&self) -> f64 {
        self.with_step(0, |step| step.data_at(0, CHANNEL_COL).unwrap_or(0.0))
            .unwrap_or(0.0)
    }

    /// Write `channel` into every row of every step
    pub fn set_channel(&self, channel: f64, registry: &CommandRegistry) {
        let state = self.inner.read();
        for step in &state.steps {
            let mut data = step.data();
            data.iter_mut().for_each(|row| row[CHANNEL_COL] = channel);
            if let Err(e) = step.set_data(data, registry) {
                log::warn!("Failed to set channel: {}", e);
            }
        }
    }

    /// Zero every row and reactivate every step; callbacks are kept
    pub fn reset(&self) {
        let state = self.inner.read();
        for step in &state.steps {
            step.reset();
        }
    }

    /// Persistable state: all allocated steps, no transients
    pub fn to_snapshot(&self) -> SequenceSnapshot {
        let state = self.inner.read();
        SequenceSnapshot {
            sequence_type: state.seq_type,
            length: state.current_length,
            ticks_per_step: state.original_ticks_per_step,
            muted: state.muted,
            steps: state
                .steps
                .iter()
                .map(|step| StepSnapshot {
                    active: step.is_active(),
                    data: step.data(),
                })
                .collect(),
        }
    }

    /// Replace contents from a snapshot
    ///
    /// Every cell is clamped through `registry`. The cursor rewinds and
    /// transients are cleared. Existing steps keep their callbacks; steps
    /// beyond the current capacity are created.
    pub fn apply_snapshot(
        &self,
        snapshot: &SequenceSnapshot,
        registry: &CommandRegistry,
    ) -> SequencerResult<()> {
        let snapshot = prepare_snapshot(snapshot, registry)?;

        let mut state = self.inner.write();
        state.ensure_enough_steps(snapshot.steps.len());
        // Capacity never shrinks; surplus steps are cleared
        for (index, step) in state.steps.iter().enumerate() {
            match snapshot.steps.get(index) {
                Some(saved) => {
                    step.set_data(saved.data.clone(), registry)?;
                    step.set_active(saved.active);
                }
                None => {
                    step.set_data(vec![state.default_row.clone()], registry)?;
                    step.set_active(true);
                }
            }
        }
        state.seq_type = snapshot.sequence_type;
        state.current_length = snapshot.length;
        state.original_ticks_per_step = snapshot.ticks_per_step;
        state.muted = snapshot.muted;
        state.current_step = 0;
        state.deactivate_processors();
        Ok(())
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.read();
        f.debug_struct("Sequence")
            .field("type", &state.seq_type)
            .field("current_step", &state.current_step)
            .field("length", &state.current_length)
            .field("capacity", &state.steps.len())
            .field("ticks_per_step", &state.ticks_per_step)
            .finish()
    }
}

/// Copy of `snapshot` with every cell clamped, or an error if a sequence
/// cannot hold it
pub(crate) fn prepare_snapshot(
    snapshot: &SequenceSnapshot,
    registry: &CommandRegistry,
) -> SequencerResult<SequenceSnapshot> {
    if snapshot.steps.is_empty() {
        return Err(SequencerError::InvalidData("sequence has no steps".to_string()));
    }
    if snapshot.steps.len() > MAX_STEP_CAPACITY {
        return Err(SequencerError::InvalidData(format!(
            "{} steps exceed the capacity of {}",
            snapshot.steps.len(),
            MAX_STEP_CAPACITY
        )));
    }
    let max_length = snapshot.steps.len().min(MAX_SEQUENCE_LENGTH);
    if snapshot.length < 1 || snapshot.length > max_length {
        return Err(SequencerError::InvalidData(format!(
            "length {} outside 1..={}",
            snapshot.length, max_length
        )));
    }
    if !(1..=MAX_TICKS_PER_STEP).contains(&snapshot.ticks_per_step) {
        return Err(SequencerError::InvalidData(format!(
            "ticks per step {} outside 1..={}",
            snapshot.ticks_per_step, MAX_TICKS_PER_STEP
        )));
    }

    let mut prepared = snapshot.clone();
    for step in prepared.steps.iter_mut() {
        validate_table(&step.data)?;
        for row in step.data.iter_mut() {
            registry.clamp_row(row)?;
        }
    }
    Ok(prepared)
}

/// Work out what the current step does, according to the sequence type
///
/// Only copies and lookups happen here; nothing is played or posted.
fn plan_step(state: &SequenceState, registry: &CommandRegistry) -> Option<StepFire> {
    let step = state.steps.get(state.current_step)?;
    if !step.is_active() {
        return None;
    }

    match state.seq_type {
        SequenceType::MidiNote | SequenceType::DrumMidi => {
            let drum = state.seq_type == SequenceType::DrumMidi;
            let mut rows = step.data();
            for row in rows.iter_mut() {
                if !plays_notes(registry, row) {
                    continue;
                }
                if drum {
                    row[NOTE_COL] = scale_to_drum(row[NOTE_COL]);
                }
                // Rests stay rests
                if state.transpose > 0 && row[NOTE_COL] > 0.0 {
                    row[NOTE_COL] = (row[NOTE_COL] + state.transpose as f64) % 127.0;
                }
            }
            Some(StepFire::Rows {
                rows,
                callback: step.callback(),
            })
        }
        SequenceType::Transposer | SequenceType::LengthChanger | SequenceType::TickChanger => {
            let row = step.row(0).ok()?;
            let amount = row[NOTE_COL].round();
            if amount <= 0.0 {
                return None;
            }
            let target = row[CHANNEL_COL].round().max(0.0) as usize;
            let amount = amount as u32;
            let kind = match state.seq_type {
                SequenceType::Transposer => AdjustmentKind::Transpose(amount % 12),
                SequenceType::LengthChanger => AdjustmentKind::LengthDelta((amount % 12) as i32),
                _ => {
                    let tps = amount % 6;
                    if tps == 0 {
                        return None;
                    }
                    AdjustmentKind::TicksPerStep(tps)
                }
            };
            Some(StepFire::Adjust { target, kind })
        }
        // Advance only
        SequenceType::ChordMidi | SequenceType::SamplePlayer => None,
    }
}

/// Whether a row's command produces notes (and so takes transpose / drum map)
fn plays_notes(registry: &CommandRegistry, row: &[f64]) -> bool {
    let Ok(id) = registry.command_id_of(row) else {
        return false;
    };
    registry
        .get_command(id)
        .map(|cmd| matches!(cmd.kind, CommandKind::MidiNote | CommandKind::Log))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::registry::MIDI_NOTE_COMMAND;
    use crate::midi::output::RecordingOutput;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn note_sequence(registry: &CommandRegistry, notes: &[f64], tps: usize) -> Sequence {
        let seq = Sequence::new(notes.len(), registry.default_row(MIDI_NOTE_COMMAND).unwrap());
        seq.set_ticks_per_step(tps);
        for (i, note) in notes.iter().enumerate() {
            seq.with_step(i, |s| s.set_data_at(0, NOTE_COL, *note, registry))
                .unwrap()
                .unwrap();
        }
        seq
    }

    fn run(seq: &Sequence, registry: &CommandRegistry, output: &RecordingOutput, ticks: u64) -> Vec<Adjustment> {
        let mut mailbox = Vec::new();
        for tick in 0..ticks {
            if let Some(fire) = seq.tick(true, registry) {
                let mut ctx = CommandContext::new(output, tick, 0, &mut mailbox);
                fire.run(registry, &mut ctx);
            }
        }
        mailbox
    }

    #[test]
    fn test_wrap_idempotence() {
        let registry = CommandRegistry::standard();
        let output = RecordingOutput::new();
        let seq = note_sequence(&registry, &[60.0, 62.0, 64.0], 3);

        run(&seq, &registry, &output, 4);
        let start = seq.current_step();
        run(&seq, &registry, &output, 3 * 3);
        assert_eq!(seq.current_step(), start);
    }

    #[test]
    fn test_transients_reset_exactly_at_wrap() {
        let registry = CommandRegistry::standard();
        let output = RecordingOutput::new();
        let seq = note_sequence(&registry, &[60.0, 62.0, 64.0, 65.0], 1);

        seq.set_transpose(5);
        seq.set_length_adjustment(-1);
        assert_eq!(seq.effective_length(), 3);

        run(&seq, &registry, &output, 2);
        assert_eq!(seq.current_step(), 2);
        assert_eq!(seq.transpose(), 5);

        run(&seq, &registry, &output, 1);
        assert_eq!(seq.current_step(), 0);
        assert_eq!(seq.transpose(), 0);
        assert_eq!(seq.length_adjustment(), 0);
        assert_eq!(output.played_notes(), vec![65, 67, 69]);
    }

    #[test]
    fn test_drum_mapping() {
        let registry = CommandRegistry::standard();
        let output = RecordingOutput::new();
        let seq = note_sequence(&registry, &[48.0, 59.0, 70.0], 1);
        seq.set_type(SequenceType::DrumMidi);

        run(&seq, &registry, &output, 3);
        assert_eq!(output.played_notes(), vec![36, 75, 70]);
    }

    #[test]
    fn test_muted_sequence_advances_silently() {
        let registry = CommandRegistry::standard();
        let output = RecordingOutput::new();
        let seq = note_sequence(&registry, &[60.0, 62.0], 1);
        seq.set_muted(true);

        run(&seq, &registry, &output, 1);
        assert_eq!(seq.current_step(), 1);
        assert!(output.played().is_empty());
    }

    #[test]
    fn test_modifier_types_post_adjustments() {
        let registry = CommandRegistry::standard();
        let output = RecordingOutput::new();
        let seq = note_sequence(&registry, &[14.0, 0.0], 1);
        seq.with_step(0, |s| s.set_data_at(0, CHANNEL_COL, 3.0, &registry))
            .unwrap()
            .unwrap();

        seq.set_type(SequenceType::Transposer);
        let mailbox = run(&seq, &registry, &output, 2);
        assert_eq!(
            mailbox,
            vec![Adjustment { source: 0, target: 3, kind: AdjustmentKind::Transpose(2) }]
        );

        seq.set_type(SequenceType::TickChanger);
        let mailbox = run(&seq, &registry, &output, 2);
        assert_eq!(mailbox[0].kind, AdjustmentKind::TicksPerStep(2));
        assert!(output.played().is_empty());
    }

    #[test]
    fn test_length_and_capacity() {
        let registry = CommandRegistry::standard();
        let seq = Sequence::new(4, registry.default_row(MIDI_NOTE_COMMAND).unwrap());
        seq.with_step(0, |s| s.set_data_at(0, CHANNEL_COL, 9.0, &registry))
            .unwrap()
            .unwrap();

        assert!(!seq.set_length(0));
        assert!(!seq.set_length(5));

        seq.ensure_enough_steps_for_length(6);
        assert_eq!(seq.how_many_steps(), 6);
        assert_eq!(seq.step_data(5).unwrap()[0][CHANNEL_COL], 9.0);
        assert!(seq.set_length(6));

        // Capacity never shrinks
        seq.ensure_enough_steps_for_length(2);
        assert_eq!(seq.how_many_steps(), 6);
    }

    #[test]
    fn test_tick_override_reverts_on_wrap() {
        let registry = CommandRegistry::standard();
        let output = RecordingOutput::new();
        let seq = note_sequence(&registry, &[60.0, 62.0], 4);

        assert!(seq.set_ticks_per_step_adjustment(1));
        assert!(!seq.set_ticks_per_step_adjustment(0));
        run(&seq, &registry, &output, 2);
        assert_eq!(seq.current_step(), 0);
        assert_eq!(seq.current_ticks_per_step(), 4);
    }

    #[test]
    fn test_reset_and_snapshot() {
        let registry = CommandRegistry::standard();
        let seq = note_sequence(&registry, &[60.0, 62.0], 2);
        seq.toggle_step_active(1).unwrap();

        let snapshot = seq.to_snapshot();
        assert_eq!(snapshot.steps.len(), 2);
        assert!(!snapshot.steps[1].active);

        seq.reset();
        assert!(seq.is_step_active(1).unwrap());
        assert_eq!(seq.step_data(0).unwrap()[0][NOTE_COL], 0.0);

        seq.apply_snapshot(&snapshot, &registry).unwrap();
        assert_eq!(seq.to_snapshot(), snapshot);
    }

    #[test]
    fn test_callback_can_read_its_sequence() {
        let registry = CommandRegistry::standard();
        let output = RecordingOutput::new();
        let seq = Arc::new(note_sequence(&registry, &[60.0, 62.0], 1));

        let seen = Arc::new(AtomicUsize::new(usize::MAX));
        let weak = Arc::downgrade(&seq);
        let sink = Arc::clone(&seen);
        seq.set_all_callbacks(Some(Arc::new(move |_: &[Vec<f64>]| {
            if let Some(seq) = weak.upgrade() {
                sink.store(seq.current_step(), Ordering::SeqCst);
            }
        })));

        run(&seq, &registry, &output, 1);

        // The lock is free by the time the callback runs, and the cursor has moved
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(output.played_notes(), vec![60]);
    }

    #[test]
    fn test_length_growth_is_bounded() {
        let registry = CommandRegistry::standard();
        let seq = Sequence::new(4, registry.default_row(MIDI_NOTE_COMMAND).unwrap());

        seq.set_length_adjustment(i32::MAX);
        assert_eq!(seq.length_adjustment(), MAX_LENGTH_ADJUSTMENT);
        assert_eq!(seq.how_many_steps(), 4 + MAX_LENGTH_ADJUSTMENT as usize);

        seq.ensure_enough_steps_for_length(usize::MAX);
        assert_eq!(seq.how_many_steps(), MAX_STEP_CAPACITY);

        let big = Sequence::new(100_000, registry.default_row(MIDI_NOTE_COMMAND).unwrap());
        assert_eq!(big.length(), MAX_SEQUENCE_LENGTH);
    }

    #[test]
    fn test_snapshot_values_are_clamped_on_apply() {
        let registry = CommandRegistry::standard();
        let seq = note_sequence(&registry, &[60.0], 1);

        let mut snapshot = seq.to_snapshot();
        // LengthChange row with an absurd delta
        snapshot.steps[0].data = vec![vec![2.0, 1.0, 1e12, 0.0, 0.0, 1.0]];
        seq.apply_snapshot(&snapshot, &registry).unwrap();
        assert_eq!(seq.step_data(0).unwrap()[0][NOTE_COL], MAX_LENGTH_ADJUSTMENT as f64);

        snapshot.length = MAX_SEQUENCE_LENGTH + 1;
        assert!(seq.apply_snapshot(&snapshot, &registry).is_err());
    }
}
