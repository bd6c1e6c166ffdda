// Command behaviours
// The closed set of things a row can do when its step fires

use crate::command::parameter::{
    CHANNEL_COL, DURATION_COL, NOTE_COL, PROBABILITY_COL, ROW_WIDTH, VELOCITY_COL,
};
use crate::midi::event::{to_channel, to_data_byte};
use crate::midi::output::OutputSink;
use rand::Rng;

/// Behaviour attached to a registered command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Note-on now, note-off after `duration` ticks
    MidiNote,
    /// Post a transpose to the sequence named in the channel column
    Transpose,
    /// Post a length adjustment to the target sequence
    LengthChange,
    /// Post a transient ticks-per-step override to the target sequence
    TickChange,
    /// Write the row to the log
    Log,
}

/// Cross-sequence change posted while a step fires
///
/// Collected in the sequencer's mailbox during a tick and applied once every
/// sequence has ticked, so effects show up on the following tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustmentKind {
    Transpose(u32),
    LengthDelta(i32),
    TicksPerStep(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adjustment {
    /// Index of the sequence that posted it
    pub source: usize,
    /// Index of the sequence it applies to
    pub target: usize,
    pub kind: AdjustmentKind,
}

/// Everything a behaviour may touch, passed explicitly per call
pub struct CommandContext<'a> {
    pub output: &'a dyn OutputSink,
    pub current_tick: u64,
    /// Sequence whose step is firing
    pub source: usize,
    pub mailbox: &'a mut Vec<Adjustment>,
}

impl<'a> CommandContext<'a> {
    pub fn new(
        output: &'a dyn OutputSink,
        current_tick: u64,
        source: usize,
        mailbox: &'a mut Vec<Adjustment>,
    ) -> Self {
        Self {
            output,
            current_tick,
            source,
            mailbox,
        }
    }

    fn post(&mut self, target: usize, kind: AdjustmentKind) {
        self.mailbox.push(Adjustment {
            source: self.source,
            target,
            kind,
        });
    }
}

impl CommandKind {
    /// Run the behaviour against one row
    ///
    /// Returns true when the row passed its probability gate and produced
    /// an effect.
    pub fn execute(&self, row: &[f64], ctx: &mut CommandContext<'_>) -> bool {
        if row.len() < ROW_WIDTH {
            log::warn!("Skipping short row ({} columns)", row.len());
            return false;
        }
        if !passes_probability(row[PROBABILITY_COL]) {
            return false;
        }

        match self {
            CommandKind::MidiNote => {
                let note = to_data_byte(row[NOTE_COL]);
                // Note 0 is a rest
                if note == 0 {
                    return false;
                }
                let duration = row[DURATION_COL].round().max(1.0) as u64;
                ctx.output.play_note(
                    to_channel(row[CHANNEL_COL]),
                    note,
                    to_data_byte(row[VELOCITY_COL]),
                    ctx.current_tick + duration,
                );
                true
            }
            CommandKind::Transpose => {
                let semitones = row[NOTE_COL].round().max(0.0) as u32 % 12;
                ctx.post(target_of(row), AdjustmentKind::Transpose(semitones));
                true
            }
            CommandKind::LengthChange => {
                let delta = row[NOTE_COL].round() as i32;
                ctx.post(target_of(row), AdjustmentKind::LengthDelta(delta));
                true
            }
            CommandKind::TickChange => {
                let tps = row[NOTE_COL].round();
                if tps < 1.0 {
                    return false;
                }
                ctx.post(target_of(row), AdjustmentKind::TicksPerStep(tps as u32));
                true
            }
            CommandKind::Log => {
                log::info!(
                    "step fired: seq {} tick {} ch {} note {} vel {} dur {} prob {}",
                    ctx.source,
                    ctx.current_tick,
                    row[CHANNEL_COL],
                    row[NOTE_COL],
                    row[VELOCITY_COL],
                    row[DURATION_COL],
                    row[PROBABILITY_COL]
                );
                true
            }
        }
    }
}

fn target_of(row: &[f64]) -> usize {
    row[CHANNEL_COL].round().max(0.0) as usize
}

/// Uniform draw in [0, 1) compared against `probability`
///
/// 1.0 always fires and 0.0 never does.
pub fn passes_probability(probability: f64) -> bool {
    if probability >= 1.0 {
        return true;
    }
    if probability <= 0.0 || probability.is_nan() {
        return false;
    }
    rand::thread_rng().r#gen::<f64>() < probability
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::output::RecordingOutput;

    fn row(cmd: f64, channel: f64, note: f64, vel: f64, dur: f64, prob: f64) -> Vec<f64> {
        vec![cmd, channel, note, vel, dur, prob]
    }

    #[test]
    fn test_midi_note_schedules_off_at_duration() {
        let output = RecordingOutput::new();
        let mut mailbox = Vec::new();
        let mut ctx = CommandContext::new(&output, 10, 0, &mut mailbox);

        assert!(CommandKind::MidiNote.execute(&row(0.0, 3.0, 60.0, 100.0, 4.0, 1.0), &mut ctx));

        let played = output.played();
        assert_eq!(played.len(), 1);
        assert_eq!(played[0].channel, 3);
        assert_eq!(played[0].off_tick, 14);
    }

    #[test]
    fn test_rest_and_zero_probability_do_not_fire() {
        let output = RecordingOutput::new();
        let mut mailbox = Vec::new();
        let mut ctx = CommandContext::new(&output, 0, 0, &mut mailbox);

        assert!(!CommandKind::MidiNote.execute(&row(0.0, 0.0, 0.0, 100.0, 1.0, 1.0), &mut ctx));
        assert!(!CommandKind::MidiNote.execute(&row(0.0, 0.0, 60.0, 100.0, 1.0, 0.0), &mut ctx));
        assert!(output.played().is_empty());
    }

    #[test]
    fn test_modifier_commands_post_adjustments() {
        let output = RecordingOutput::new();
        let mut mailbox = Vec::new();
        {
            let mut ctx = CommandContext::new(&output, 0, 2, &mut mailbox);
            CommandKind::Transpose.execute(&row(1.0, 1.0, 14.0, 0.0, 0.0, 1.0), &mut ctx);
            CommandKind::LengthChange.execute(&row(2.0, 0.0, -3.0, 0.0, 0.0, 1.0), &mut ctx);
            CommandKind::TickChange.execute(&row(3.0, 0.0, 2.0, 0.0, 0.0, 1.0), &mut ctx);
            // tps below 1 is ignored
            CommandKind::TickChange.execute(&row(3.0, 0.0, 0.0, 0.0, 0.0, 1.0), &mut ctx);
        }

        assert_eq!(
            mailbox,
            vec![
                Adjustment { source: 2, target: 1, kind: AdjustmentKind::Transpose(2) },
                Adjustment { source: 2, target: 0, kind: AdjustmentKind::LengthDelta(-3) },
                Adjustment { source: 2, target: 0, kind: AdjustmentKind::TicksPerStep(2) },
            ]
        );
    }

    #[test]
    fn test_probability_boundaries() {
        assert!((0..100).all(|_| passes_probability(1.0)));
        assert!((0..100).all(|_| !passes_probability(0.0)));
    }
}
