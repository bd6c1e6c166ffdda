// Sequencer - the set of sequences driven by the clock
// Tick dispatch, adjustment mailbox, editor accessors and grid projections

use crate::command::kinds::{Adjustment, CommandContext};
use crate::command::parameter::{CHANNEL_COL, CMD_COL, Parameter, ROW_WIDTH};
use crate::command::registry::{CommandRegistry, MIDI_NOTE_COMMAND};
use crate::midi::output::OutputSink;
use crate::project::types::SequencerSnapshot;
use crate::sequencer::error::{SequencerError, SequencerResult};
use crate::sequencer::grid::{self, ColumnState, Cursor, GridCell};
use crate::sequencer::sequence::{
    MAX_SEQUENCE_LENGTH, MAX_TICKS_PER_STEP, Sequence, SequenceType, prepare_snapshot,
};
use crate::sequencer::step::StepCallback;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A fixed set of sequences sharing one command registry and output sink
///
/// The number of sequences never changes after construction. Every
/// index-taking method returns `SequencerError` for out-of-range indices;
/// out-of-range values are clamped.
pub struct Sequencer {
    sequences: Vec<Sequence>,
    registry: Arc<CommandRegistry>,
    output: Arc<dyn OutputSink>,
    playing: AtomicBool,
    trigger_on_tick: AtomicBool,
    /// Cached `[sequence][step]` labels, rebuilt by every mutator
    grid: RwLock<Vec<Vec<String>>>,
    default_row: Vec<f64>,
}

impl Sequencer {
    /// `count` sequences of `length` steps, every step holding a default note row
    pub fn new(
        count: usize,
        length: usize,
        registry: Arc<CommandRegistry>,
        output: Arc<dyn OutputSink>,
    ) -> Self {
        let default_row = registry
            .default_row(MIDI_NOTE_COMMAND)
            .unwrap_or_else(|_| vec![0.0; ROW_WIDTH]);
        let sequences = (0..count.max(1))
            .map(|_| Sequence::new(length, default_row.clone()))
            .collect();

        let sequencer = Self {
            sequences,
            registry,
            output,
            playing: AtomicBool::new(true),
            trigger_on_tick: AtomicBool::new(true),
            grid: RwLock::new(Vec::new()),
            default_row,
        };
        sequencer.update_grid_of_strings();
        sequencer
    }

    /// Advance every sequence by one tick
    ///
    /// Sequences tick in registration order. Each one's step fires after its
    /// lock is released, so output and callbacks may read the sequencer.
    /// Adjustments posted while they fire are applied afterwards in the order
    /// they were posted, so when two modifiers hit the same target in one
    /// tick the later sequence wins.
    pub fn tick(&self, current_tick: u64) {
        let trigger = self.is_playing() && self.trigger_on_tick.load(Ordering::Acquire);
        let mut mailbox: Vec<Adjustment> = Vec::new();

        for (index, sequence) in self.sequences.iter().enumerate() {
            if let Some(fire) = sequence.tick(trigger, &self.registry) {
                let mut ctx =
                    CommandContext::new(self.output.as_ref(), current_tick, index, &mut mailbox);
                fire.run(&self.registry, &mut ctx);
            }
        }

        if !mailbox.is_empty() {
            self.apply_adjustments(&mailbox);
        }
    }

    fn apply_adjustments(&self, mailbox: &[Adjustment]) {
        for adjustment in mailbox {
            match self.sequences.get(adjustment.target) {
                Some(target) => {
                    log::debug!(
                        "Sequence {} adjusts sequence {}: {:?}",
                        adjustment.source,
                        adjustment.target,
                        adjustment.kind
                    );
                    target.apply_adjustment(adjustment.kind);
                }
                None => log::warn!(
                    "Sequence {} targets missing sequence {}; adjustment dropped",
                    adjustment.source,
                    adjustment.target
                ),
            }
        }
        // Length adjustments can allocate steps
        self.update_grid_of_strings();
    }

    fn sequence(&self, index: usize) -> SequencerResult<&Sequence> {
        self.sequences
            .get(index)
            .ok_or(SequencerError::SequenceOutOfRange {
                index,
                count: self.sequences.len(),
            })
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    pub fn output(&self) -> &Arc<dyn OutputSink> {
        &self.output
    }

    // --- Transport ---

    pub fn play(&self) {
        self.playing.store(true, Ordering::Release);
    }

    /// Suppress triggering; sequences keep advancing while the clock runs
    pub fn stop(&self) {
        self.playing.store(false, Ordering::Release);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    /// When false, ticks advance cursors without firing anything
    pub fn set_trigger_on_tick(&self, trigger: bool) {
        self.trigger_on_tick.store(trigger, Ordering::Release);
    }

    pub fn trigger_on_tick(&self) -> bool {
        self.trigger_on_tick.load(Ordering::Acquire)
    }

    /// Every cursor to step 0 with transient modifiers cleared
    pub fn rewind(&self) {
        for sequence in &self.sequences {
            sequence.rewind();
        }
    }

    /// Drop pending note-offs and send all-notes-off
    pub fn panic(&self) {
        log::info!("Panic: all notes off");
        self.output.all_off();
    }

    // --- Shape ---

    pub fn how_many_sequences(&self) -> usize {
        self.sequences.len()
    }

    /// Allocated steps in `seq` (at least its length)
    pub fn how_many_steps(&self, seq: usize) -> SequencerResult<usize> {
        Ok(self.sequence(seq)?.how_many_steps())
    }

    pub fn how_many_rows(&self, seq: usize, step: usize) -> SequencerResult<usize> {
        self.sequence(seq)?.with_step(step, |s| s.row_count())
    }

    pub fn sequence_length(&self, seq: usize) -> SequencerResult<usize> {
        Ok(self.sequence(seq)?.length())
    }

    pub fn current_step(&self, seq: usize) -> SequencerResult<usize> {
        Ok(self.sequence(seq)?.current_step())
    }

    pub fn sequence_ticks_per_step(&self, seq: usize) -> SequencerResult<usize> {
        Ok(self.sequence(seq)?.ticks_per_step())
    }

    /// Grow `seq` by `amount` steps, allocating capacity as needed
    ///
    /// The length stops at `MAX_SEQUENCE_LENGTH`. New steps copy step 0's
    /// callback and channel. Returns the new length.
    pub fn extend_sequence(&self, seq: usize, amount: usize) -> SequencerResult<usize> {
        let sequence = self.sequence(seq)?;
        let length = sequence
            .length()
            .saturating_add(amount)
            .min(MAX_SEQUENCE_LENGTH);
        sequence.ensure_enough_steps_for_length(length);
        sequence.set_length(length);
        self.update_grid_of_strings();
        Ok(sequence.length())
    }

    /// Shorten `seq` by `amount` steps, never below 1
    ///
    /// Capacity is kept, so steps past the new length keep their data.
    pub fn shrink_sequence(&self, seq: usize, amount: usize) -> SequencerResult<usize> {
        let sequence = self.sequence(seq)?;
        let length = sequence.length().saturating_sub(amount).max(1);
        sequence.set_length(length);
        self.update_grid_of_strings();
        Ok(sequence.length())
    }

    /// Set the length directly, clamped to `1..=MAX_SEQUENCE_LENGTH`
    pub fn set_sequence_length(&self, seq: usize, length: usize) -> SequencerResult<usize> {
        let sequence = self.sequence(seq)?;
        let length = length.clamp(1, MAX_SEQUENCE_LENGTH);
        sequence.ensure_enough_steps_for_length(length);
        sequence.set_length(length);
        self.update_grid_of_strings();
        Ok(sequence.length())
    }

    /// Set the permanent rate, clamped to 1..=16
    pub fn set_sequence_ticks_per_step(&self, seq: usize, tps: usize) -> SequencerResult<usize> {
        let sequence = self.sequence(seq)?;
        sequence.set_ticks_per_step(tps.clamp(1, MAX_TICKS_PER_STEP));
        self.update_grid_of_strings();
        Ok(sequence.ticks_per_step())
    }

    pub fn sequence_type(&self, seq: usize) -> SequencerResult<SequenceType> {
        Ok(self.sequence(seq)?.sequence_type())
    }

    pub fn set_sequence_type(&self, seq: usize, seq_type: SequenceType) -> SequencerResult<()> {
        self.sequence(seq)?.set_type(seq_type);
        self.update_grid_of_strings();
        Ok(())
    }

    pub fn is_sequence_muted(&self, seq: usize) -> SequencerResult<bool> {
        Ok(self.sequence(seq)?.is_muted())
    }

    pub fn set_sequence_muted(&self, seq: usize, muted: bool) -> SequencerResult<()> {
        self.sequence(seq)?.set_muted(muted);
        Ok(())
    }

    pub fn toggle_sequence_mute(&self, seq: usize) -> SequencerResult<()> {
        self.sequence(seq)?.toggle_mute();
        Ok(())
    }

    /// Give `to` the type and channel of `from`
    pub fn copy_channel_and_type_settings(&self, from: usize, to: usize) -> SequencerResult<()> {
        let source = self.sequence(from)?;
        let target = self.sequence(to)?;
        target.set_type(source.sequence_type());
        target.set_channel(source.channel(), &self.registry);
        self.update_grid_of_strings();
        Ok(())
    }

    /// Zero every row of every step in `seq` and reactivate them
    pub fn reset_sequence(&self, seq: usize) -> SequencerResult<()> {
        self.sequence(seq)?.reset();
        self.update_grid_of_strings();
        Ok(())
    }

    // --- Step data ---

    pub fn step_data(&self, seq: usize, step: usize) -> SequencerResult<Vec<Vec<f64>>> {
        self.sequence(seq)?.step_data(step)
    }

    /// Replace a step's table; every cell is clamped
    pub fn set_step_data(
        &self,
        seq: usize,
        step: usize,
        data: Vec<Vec<f64>>,
    ) -> SequencerResult<()> {
        self.sequence(seq)?
            .set_step_data(step, data, &self.registry)?;
        self.update_grid_of_strings();
        Ok(())
    }

    pub fn step_data_at(
        &self,
        seq: usize,
        step: usize,
        row: usize,
        col: usize,
    ) -> SequencerResult<f64> {
        self.sequence(seq)?.with_step(step, |s| s.data_at(row, col))?
    }

    /// Store a clamped value; returns what was stored
    pub fn set_step_data_at(
        &self,
        seq: usize,
        step: usize,
        row: usize,
        col: usize,
        value: f64,
    ) -> SequencerResult<f64> {
        let stored = self
            .sequence(seq)?
            .with_step(step, |s| s.set_data_at(row, col, value, &self.registry))??;
        self.update_grid_of_strings();
        Ok(stored)
    }

    /// Parameter governing one cell, resolved through the row's command
    pub fn step_parameter(
        &self,
        seq: usize,
        step: usize,
        row: usize,
        col: usize,
    ) -> SequencerResult<Parameter> {
        let values = self.sequence(seq)?.with_step(step, |s| s.row(row))??;
        self.registry.parameter_for(&values, col).cloned()
    }

    /// Write the governing parameter's default into one cell
    pub fn set_step_data_to_default(
        &self,
        seq: usize,
        step: usize,
        row: usize,
        col: usize,
    ) -> SequencerResult<f64> {
        let value = if col == CMD_COL {
            MIDI_NOTE_COMMAND as f64
        } else {
            self.step_parameter(seq, step, row, col)?.default_value
        };
        self.set_step_data_at(seq, step, row, col, value)
    }

    /// Move one cell up by its parameter's step size, clamped
    pub fn increment_step_data_at(
        &self,
        seq: usize,
        step: usize,
        row: usize,
        col: usize,
    ) -> SequencerResult<f64> {
        self.nudge_step_data_at(seq, step, row, col, true)
    }

    /// Move one cell down by its parameter's step size, clamped
    pub fn decrement_step_data_at(
        &self,
        seq: usize,
        step: usize,
        row: usize,
        col: usize,
    ) -> SequencerResult<f64> {
        self.nudge_step_data_at(seq, step, row, col, false)
    }

    fn nudge_step_data_at(
        &self,
        seq: usize,
        step: usize,
        row: usize,
        col: usize,
        up: bool,
    ) -> SequencerResult<f64> {
        let current = self.step_data_at(seq, step, row, col)?;
        let value = if col == CMD_COL {
            // Command ids step by one; set_step_data_at clamps to the registered range
            if up { current + 1.0 } else { current - 1.0 }
        } else {
            let param = self.step_parameter(seq, step, row, col)?;
            if up {
                param.increment(current)
            } else {
                param.decrement(current)
            }
        };
        self.set_step_data_at(seq, step, row, col, value)
    }

    pub fn is_step_active(&self, seq: usize, step: usize) -> SequencerResult<bool> {
        self.sequence(seq)?.is_step_active(step)
    }

    pub fn toggle_step_active(&self, seq: usize, step: usize) -> SequencerResult<()> {
        self.sequence(seq)?.toggle_step_active(step)?;
        self.update_grid_of_strings();
        Ok(())
    }

    /// Append a default note row on the step's current channel
    pub fn add_step_row(&self, seq: usize, step: usize) -> SequencerResult<usize> {
        let rows = self.sequence(seq)?.with_step(step, |s| {
            let mut row = self.default_row.clone();
            row[CHANNEL_COL] = s.data_at(0, CHANNEL_COL).unwrap_or(0.0);
            s.add_row(row, &self.registry).map(|_| s.row_count())
        })??;
        self.update_grid_of_strings();
        Ok(rows)
    }

    /// Remove a row; returns false when it was the last one
    pub fn remove_step_row(&self, seq: usize, step: usize, row: usize) -> SequencerResult<bool> {
        let removed = self
            .sequence(seq)?
            .with_step(step, |s| s.remove_row(row))??;
        self.update_grid_of_strings();
        Ok(removed)
    }

    /// Zero one row
    pub fn reset_step_row(&self, seq: usize, step: usize, row: usize) -> SequencerResult<()> {
        self.sequence(seq)?.with_step(step, |s| s.reset_row(row))??;
        self.update_grid_of_strings();
        Ok(())
    }

    // --- Callbacks ---

    pub fn set_all_callbacks(&self, callback: Option<StepCallback>) {
        for sequence in &self.sequences {
            sequence.set_all_callbacks(callback.clone());
        }
    }

    pub fn set_sequence_callback(
        &self,
        seq: usize,
        callback: Option<StepCallback>,
    ) -> SequencerResult<()> {
        self.sequence(seq)?.set_all_callbacks(callback);
        Ok(())
    }

    pub fn set_step_callback(
        &self,
        seq: usize,
        step: usize,
        callback: Option<StepCallback>,
    ) -> SequencerResult<()> {
        self.sequence(seq)?.set_step_callback(step, callback)
    }

    // --- Persistence ---

    /// Order-preserving copy of every sequence, without transient state
    pub fn export_snapshot(&self) -> SequencerSnapshot {
        SequencerSnapshot::new(self.sequences.iter().map(Sequence::to_snapshot).collect())
    }

    /// Replace every sequence from a snapshot
    ///
    /// The snapshot must hold exactly one entry per sequence. Everything is
    /// validated and clamped before anything is written.
    pub fn import_snapshot(&self, snapshot: &SequencerSnapshot) -> SequencerResult<()> {
        if snapshot.sequences.len() != self.sequences.len() {
            return Err(SequencerError::InvalidData(format!(
                "snapshot has {} sequences, sequencer has {}",
                snapshot.sequences.len(),
                self.sequences.len()
            )));
        }
        let prepared = snapshot
            .sequences
            .iter()
            .map(|saved| prepare_snapshot(saved, &self.registry))
            .collect::<SequencerResult<Vec<_>>>()?;

        for (sequence, saved) in self.sequences.iter().zip(&prepared) {
            sequence.apply_snapshot(saved, &self.registry)?;
        }
        self.update_grid_of_strings();
        log::info!("Imported {} sequences", snapshot.sequences.len());
        Ok(())
    }

    // --- Projections ---

    /// Rebuild the cached sequence grid
    pub fn update_grid_of_strings(&self) {
        let grid = grid::build_grid(&self.sequences);
        *self.grid.write() = grid;
    }

    /// Cached `[sequence][step]` labels
    pub fn grid_of_strings(&self) -> Vec<Vec<String>> {
        self.grid.read().clone()
    }

    /// `[row][col]` view of one step
    pub fn step_as_grid_of_strings(&self, seq: usize, step: usize) -> SequencerResult<Vec<Vec<String>>> {
        let rows = self.step_data(seq, step)?;
        Ok(grid::step_grid(&rows, &self.registry))
    }

    pub fn sequence_configs_as_grid_of_strings(&self) -> Vec<Vec<String>> {
        grid::sequence_configs(&self.sequences)
    }

    /// Cached labels decorated with live playheads and the editor cursor
    pub fn render_cells(&self, cursor: Option<Cursor>) -> Vec<Vec<GridCell>> {
        let columns: Vec<ColumnState> = self
            .sequences
            .iter()
            .map(|sequence| ColumnState {
                playhead: sequence.current_step(),
                length: sequence.effective_length(),
                active: sequence.active_flags(),
            })
            .collect();
        grid::render_cells(&self.grid.read(), &columns, cursor)
    }
}

impl fmt::Display for Sequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&grid::grid_to_string(&self.grid.read()))
    }
}

impl fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequencer")
            .field("sequences", &self.sequences)
            .field("playing", &self.is_playing())
            .field("trigger_on_tick", &self.trigger_on_tick())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::parameter::{NOTE_COL, PROBABILITY_COL, VELOCITY_COL};
    use crate::midi::output::RecordingOutput;
    use std::sync::atomic::AtomicUsize;

    fn make(count: usize, length: usize) -> (Sequencer, Arc<RecordingOutput>) {
        let output = Arc::new(RecordingOutput::new());
        let sequencer = Sequencer::new(
            count,
            length,
            Arc::new(CommandRegistry::standard()),
            output.clone(),
        );
        (sequencer, output)
    }

    fn run(sequencer: &Sequencer, from: u64, ticks: u64) {
        for tick in from..from + ticks {
            sequencer.tick(tick);
        }
    }

    #[test]
    fn test_clamping_at_both_ends() {
        let (sequencer, _) = make(1, 4);

        assert_eq!(sequencer.set_step_data_at(0, 0, 0, VELOCITY_COL, -5.0).unwrap(), 0.0);
        assert_eq!(sequencer.set_step_data_at(0, 0, 0, VELOCITY_COL, 500.0).unwrap(), 127.0);
        assert_eq!(sequencer.set_step_data_at(0, 0, 0, VELOCITY_COL, 127.0).unwrap(), 127.0);
        assert_eq!(sequencer.step_data_at(0, 0, 0, VELOCITY_COL).unwrap(), 127.0);

        // Command column clamps to registered ids
        let max_id = (sequencer.registry().count_commands() - 1) as f64;
        assert_eq!(sequencer.set_step_data_at(0, 0, 0, CMD_COL, 99.0).unwrap(), max_id);
    }

    #[test]
    fn test_out_of_range_indices_are_errors() {
        let (sequencer, _) = make(2, 4);
        assert!(matches!(
            sequencer.step_data(2, 0),
            Err(SequencerError::SequenceOutOfRange { index: 2, count: 2 })
        ));
        assert!(matches!(
            sequencer.step_data(0, 4),
            Err(SequencerError::StepOutOfRange { .. })
        ));
        assert!(sequencer.set_step_data_at(0, 0, 1, NOTE_COL, 60.0).is_err());
    }

    #[test]
    fn test_increment_follows_parameter_step() {
        let (sequencer, _) = make(1, 1);
        sequencer.set_step_data_at(0, 0, 0, PROBABILITY_COL, 0.5).unwrap();

        let up = sequencer.increment_step_data_at(0, 0, 0, PROBABILITY_COL).unwrap();
        assert!((up - 0.6).abs() < 1e-9);

        sequencer.set_step_data_at(0, 0, 0, NOTE_COL, 127.0).unwrap();
        assert_eq!(sequencer.increment_step_data_at(0, 0, 0, NOTE_COL).unwrap(), 127.0);
        assert_eq!(sequencer.decrement_step_data_at(0, 0, 0, NOTE_COL).unwrap(), 126.0);

        assert_eq!(sequencer.set_step_data_to_default(0, 0, 0, NOTE_COL).unwrap(), 0.0);
    }

    #[test]
    fn test_notes_dispatch_in_order() {
        let (sequencer, output) = make(1, 4);
        sequencer.set_sequence_ticks_per_step(0, 1).unwrap();
        for (step, note) in [1.0, 2.0, 3.0, 4.0].into_iter().enumerate() {
            sequencer.set_step_data_at(0, step, 0, NOTE_COL, note).unwrap();
        }

        run(&sequencer, 0, 4);

        assert_eq!(output.played_notes(), vec![1, 2, 3, 4]);
        assert_eq!(sequencer.current_step(0).unwrap(), 0);
    }

    #[test]
    fn test_stopped_sequencer_advances_silently() {
        let (sequencer, output) = make(1, 4);
        sequencer.set_sequence_ticks_per_step(0, 1).unwrap();
        sequencer.set_step_data_at(0, 0, 0, NOTE_COL, 60.0).unwrap();
        sequencer.stop();

        run(&sequencer, 0, 2);
        assert!(output.played().is_empty());
        assert_eq!(sequencer.current_step(0).unwrap(), 2);

        sequencer.play();
        sequencer.set_trigger_on_tick(false);
        run(&sequencer, 2, 2);
        assert!(output.played().is_empty());
    }

    #[test]
    fn test_extend_then_shrink_preserves_data() {
        let (sequencer, _) = make(1, 4);
        sequencer.set_step_data_at(0, 0, 0, CHANNEL_COL, 5.0).unwrap();
        sequencer.set_step_data_at(0, 3, 0, NOTE_COL, 64.0).unwrap();

        assert_eq!(sequencer.extend_sequence(0, 4).unwrap(), 8);
        assert_eq!(sequencer.how_many_steps(0).unwrap(), 8);
        assert_eq!(sequencer.step_data_at(0, 7, 0, CHANNEL_COL).unwrap(), 5.0);
        sequencer.set_step_data_at(0, 6, 0, NOTE_COL, 70.0).unwrap();

        assert_eq!(sequencer.shrink_sequence(0, 4).unwrap(), 4);
        assert_eq!(sequencer.how_many_steps(0).unwrap(), 8);
        assert_eq!(sequencer.step_data_at(0, 3, 0, NOTE_COL).unwrap(), 64.0);
        assert_eq!(sequencer.step_data_at(0, 6, 0, NOTE_COL).unwrap(), 70.0);

        assert_eq!(sequencer.shrink_sequence(0, 10).unwrap(), 1);
    }

    #[test]
    fn test_extend_saturates_at_max_length() {
        let (sequencer, _) = make(1, 4);
        assert_eq!(sequencer.extend_sequence(0, usize::MAX).unwrap(), MAX_SEQUENCE_LENGTH);
        assert_eq!(sequencer.how_many_steps(0).unwrap(), MAX_SEQUENCE_LENGTH);
        assert_eq!(sequencer.set_sequence_length(0, 100_000).unwrap(), MAX_SEQUENCE_LENGTH);
        assert_eq!(sequencer.set_sequence_length(0, 0).unwrap(), 1);
    }

    #[test]
    fn test_command_change_bounds_length_change() {
        let (sequencer, _) = make(2, 2);
        sequencer.set_sequence_ticks_per_step(0, 1).unwrap();
        sequencer.set_step_data_at(0, 0, 0, CHANNEL_COL, 1.0).unwrap();
        sequencer.set_step_data_at(0, 0, 0, NOTE_COL, 60.0).unwrap();

        // Switching the row to LengthChange pulls the note into -15..=15
        sequencer.set_step_data_at(0, 0, 0, CMD_COL, 2.0).unwrap();
        assert_eq!(sequencer.step_data_at(0, 0, 0, NOTE_COL).unwrap(), 15.0);

        run(&sequencer, 0, 1);
        assert_eq!(sequencer.how_many_steps(1).unwrap(), 2 + 15);
    }

    #[test]
    fn test_whole_table_write_is_clamped() {
        let (sequencer, _) = make(2, 2);
        sequencer.set_sequence_ticks_per_step(0, 1).unwrap();
        sequencer
            .set_step_data(0, 0, vec![vec![2.0, 1.0, 200_000.0, 0.0, 0.0, 1.0]])
            .unwrap();
        assert_eq!(sequencer.step_data_at(0, 0, 0, NOTE_COL).unwrap(), 15.0);

        run(&sequencer, 0, 1);
        assert_eq!(sequencer.how_many_steps(1).unwrap(), 2 + 15);
    }

    #[test]
    fn test_step_rows() {
        let (sequencer, _) = make(1, 2);
        sequencer.set_step_data_at(0, 1, 0, CHANNEL_COL, 3.0).unwrap();

        assert_eq!(sequencer.add_step_row(0, 1).unwrap(), 2);
        assert_eq!(sequencer.step_data_at(0, 1, 1, CHANNEL_COL).unwrap(), 3.0);
        assert!(sequencer.remove_step_row(0, 1, 0).unwrap());
        assert!(!sequencer.remove_step_row(0, 1, 0).unwrap());

        sequencer.set_step_data_at(0, 0, 0, NOTE_COL, 60.0).unwrap();
        sequencer.reset_step_row(0, 0, 0).unwrap();
        assert!(sequencer.step_data(0, 0).unwrap()[0].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_later_modifier_wins_tie() {
        let (sequencer, output) = make(3, 2);
        for seq in 0..3 {
            sequencer.set_sequence_ticks_per_step(seq, 1).unwrap();
        }
        // Sequences 0 and 1 both transpose sequence 2
        sequencer.set_sequence_type(0, SequenceType::Transposer).unwrap();
        sequencer.set_sequence_type(1, SequenceType::Transposer).unwrap();
        for (seq, amount) in [(0, 3.0), (1, 7.0)] {
            sequencer.set_step_data_at(seq, 0, 0, CHANNEL_COL, 2.0).unwrap();
            sequencer.set_step_data_at(seq, 0, 0, NOTE_COL, amount).unwrap();
        }
        sequencer.set_step_data_at(2, 1, 0, NOTE_COL, 60.0).unwrap();

        run(&sequencer, 0, 2);
        assert_eq!(output.played_notes(), vec![67]);
    }

    #[test]
    fn test_adjustment_to_missing_sequence_is_dropped() {
        let (sequencer, _) = make(1, 2);
        sequencer.set_sequence_ticks_per_step(0, 1).unwrap();
        sequencer.set_sequence_type(0, SequenceType::LengthChanger).unwrap();
        sequencer.set_step_data_at(0, 0, 0, CHANNEL_COL, 9.0).unwrap();
        sequencer.set_step_data_at(0, 0, 0, NOTE_COL, 2.0).unwrap();

        run(&sequencer, 0, 4);
        assert_eq!(sequencer.sequence_length(0).unwrap(), 2);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let (source, _) = make(2, 4);
        source.set_step_data_at(1, 2, 0, NOTE_COL, 67.0).unwrap();
        source.set_sequence_type(1, SequenceType::DrumMidi).unwrap();
        source.set_sequence_ticks_per_step(0, 2).unwrap();
        source.extend_sequence(0, 2).unwrap();
        source.toggle_step_active(0, 1).unwrap();

        let (target, _) = make(2, 4);
        target.import_snapshot(&source.export_snapshot()).unwrap();
        assert_eq!(target.export_snapshot(), source.export_snapshot());
        assert_eq!(target.grid_of_strings(), source.grid_of_strings());

        let (wrong, _) = make(3, 4);
        assert!(wrong.import_snapshot(&source.export_snapshot()).is_err());
    }

    #[test]
    fn test_callbacks_receive_rows() {
        let (sequencer, _) = make(2, 1);
        sequencer.set_sequence_ticks_per_step(1, 1).unwrap();
        sequencer.set_step_data_at(1, 0, 0, NOTE_COL, 60.0).unwrap();

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        sequencer
            .set_sequence_callback(
                1,
                Some(Arc::new(move |rows: &[Vec<f64>]| {
                    assert_eq!(rows[0][NOTE_COL], 60.0);
                    counter.fetch_add(1, Ordering::SeqCst);
                })),
            )
            .unwrap();

        run(&sequencer, 0, 3);
        assert_eq!(fired.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_callback_can_query_sequencer() {
        let (sequencer, output) = make(2, 2);
        let sequencer = Arc::new(sequencer);
        sequencer.set_sequence_ticks_per_step(0, 1).unwrap();
        sequencer.set_step_data_at(0, 0, 0, NOTE_COL, 60.0).unwrap();

        let seen = Arc::new(AtomicUsize::new(usize::MAX));
        let weak = Arc::downgrade(&sequencer);
        let sink = seen.clone();
        sequencer
            .set_sequence_callback(
                0,
                Some(Arc::new(move |_: &[Vec<f64>]| {
                    if let Some(sequencer) = weak.upgrade() {
                        let step = sequencer.current_step(0).unwrap_or(usize::MAX);
                        let _ = sequencer.render_cells(None);
                        sink.store(step, Ordering::SeqCst);
                    }
                })),
            )
            .unwrap();

        sequencer.tick(1);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(output.played_notes(), vec![60]);
    }

    #[test]
    fn test_copy_settings_and_projections() {
        let (sequencer, _) = make(2, 2);
        sequencer.set_sequence_type(0, SequenceType::DrumMidi).unwrap();
        sequencer.set_step_data_at(0, 0, 0, CHANNEL_COL, 9.0).unwrap();
        sequencer.set_step_data_at(0, 0, 0, NOTE_COL, 48.0).unwrap();

        sequencer.copy_channel_and_type_settings(0, 1).unwrap();
        assert_eq!(sequencer.sequence_type(1).unwrap(), SequenceType::DrumMidi);
        assert_eq!(sequencer.step_data_at(1, 1, 0, CHANNEL_COL).unwrap(), 9.0);

        let configs = sequencer.sequence_configs_as_grid_of_strings();
        assert_eq!(configs[1], vec!["drum", "2", "4", "9", "on"]);

        assert_eq!(sequencer.grid_of_strings()[0], vec!["B", "--"]);
        assert_eq!(sequencer.to_string(), "  0 : B     --\n  1 : --    --\n");

        let cells = sequencer.render_cells(Some(Cursor { sequence: 1, step: 1 }));
        assert!(cells[0][0].is_playhead);
        assert!(cells[1][1].is_cursor);

        let detail = sequencer.step_as_grid_of_strings(0, 0).unwrap();
        assert_eq!(detail[0][NOTE_COL], "48");
    }

    #[test]
    fn test_panic_reaches_output() {
        let (sequencer, output) = make(1, 1);
        sequencer.set_sequence_ticks_per_step(0, 1).unwrap();
        sequencer.set_step_data_at(0, 0, 0, NOTE_COL, 60.0).unwrap();
        run(&sequencer, 0, 1);
        assert_eq!(output.pending_messages(), 1);

        sequencer.panic();
        assert_eq!(output.pending_messages(), 0);
        assert_eq!(output.all_off_calls(), 1);
    }
}
