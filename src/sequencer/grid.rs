// Grid projections
// String and cell views of sequencer state for renderers

use crate::command::parameter::{CMD_COL, NOTE_COL};
use crate::command::registry::CommandRegistry;
use crate::midi::event::midi_note_name;
use crate::sequencer::sequence::{Sequence, SequenceType};
use std::fmt::Write;

/// Shown for a step whose active flag is off
pub const INACTIVE_CELL: &str = "xx";
/// Shown for a step whose first row is a rest
pub const REST_CELL: &str = "--";

/// One-character drum names for scale degrees 0..12
const DRUM_NAMES: [char; 12] = ['B', 's', 'S', 'r', 'H', 'h', 't', 'T', 'c', 'R', 'C', 'p'];

/// Editor cursor position in the sequence grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub sequence: usize,
    pub step: usize,
}

/// Live per-sequence state the cell view needs beyond the cached strings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnState {
    pub playhead: usize,
    pub length: usize,
    pub active: Vec<bool>,
}

/// A rendered grid cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridCell {
    pub text: String,
    pub is_playhead: bool,
    pub is_cursor: bool,
    pub active: bool,
    /// Step lies inside the sequence's playing length
    pub in_length: bool,
}

/// Short label for a step as shown in the sequence grid
pub fn step_to_string(rows: &[Vec<f64>], active: bool, seq_type: SequenceType) -> String {
    if !active {
        return INACTIVE_CELL.to_string();
    }
    let Some(first) = rows.first() else {
        return REST_CELL.to_string();
    };

    let note = first.get(NOTE_COL).copied().unwrap_or(0.0).round();
    let mut text = if note <= 0.0 {
        REST_CELL.to_string()
    } else if seq_type == SequenceType::DrumMidi {
        DRUM_NAMES[note as usize % 12].to_string()
    } else if seq_type.is_modifier() {
        format!("{}", note as i64)
    } else {
        midi_note_name(note.min(127.0) as u8)
    };

    if rows.len() > 1 {
        let _ = write!(text, "+{}", rows.len() - 1);
    }
    text
}

/// Sequence grid: outer index is the sequence, inner the step (all allocated steps)
pub fn build_grid(sequences: &[Sequence]) -> Vec<Vec<String>> {
    sequences
        .iter()
        .map(|sequence| {
            let seq_type = sequence.sequence_type();
            sequence
                .all_step_data()
                .iter()
                .zip(sequence.active_flags())
                .map(|(rows, active)| step_to_string(rows, active, seq_type))
                .collect()
        })
        .collect()
}

/// Step detail: outer index is the row, inner the column
///
/// The command column shows the command's short name, every other column
/// is formatted with its parameter's precision.
pub fn step_grid(rows: &[Vec<f64>], registry: &CommandRegistry) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| {
            let command = registry
                .command_id_of(row)
                .and_then(|id| registry.get_command(id))
                .ok();
            row.iter()
                .enumerate()
                .map(|(col, value)| match command {
                    Some(cmd) if col == CMD_COL => cmd.short_name.clone(),
                    Some(cmd) => cmd
                        .parameter_for(col)
                        .map(|param| param.format(*value))
                        .unwrap_or_else(|| format!("{}", value)),
                    None => "??".to_string(),
                })
                .collect()
        })
        .collect()
}

/// Per-sequence settings: type, length, ticks per step, channel, mute
pub fn sequence_configs(sequences: &[Sequence]) -> Vec<Vec<String>> {
    sequences
        .iter()
        .map(|sequence| {
            vec![
                sequence.sequence_type().short_name().to_string(),
                sequence.length().to_string(),
                sequence.ticks_per_step().to_string(),
                format!("{}", sequence.channel().round() as i64),
                if sequence.is_muted() { "mute" } else { "on" }.to_string(),
            ]
        })
        .collect()
}

/// Decorate a cached string grid with playheads, cursor and step flags
pub fn render_cells(
    grid: &[Vec<String>],
    columns: &[ColumnState],
    cursor: Option<Cursor>,
) -> Vec<Vec<GridCell>> {
    grid.iter()
        .enumerate()
        .map(|(seq, cells)| {
            let column = columns.get(seq);
            cells
                .iter()
                .enumerate()
                .map(|(step, text)| GridCell {
                    text: text.clone(),
                    is_playhead: column.is_some_and(|c| c.playhead == step),
                    is_cursor: cursor == Some(Cursor { sequence: seq, step }),
                    active: column
                        .and_then(|c| c.active.get(step).copied())
                        .unwrap_or(true),
                    in_length: column.is_some_and(|c| step < c.length),
                })
                .collect()
        })
        .collect()
}

/// Tracker-style text view: one line per step, one column per sequence
pub fn grid_to_string(grid: &[Vec<String>]) -> String {
    let steps = grid.iter().map(Vec::len).max().unwrap_or(0);
    let mut out = String::new();
    for step in 0..steps {
        let _ = write!(out, "{:>3} :", step);
        for column in grid {
            let cell = column.get(step).map(String::as_str).unwrap_or("");
            let _ = write!(out, " {:<5}", cell);
        }
        out.truncate(out.trim_end().len());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::registry::MIDI_NOTE_COMMAND;

    #[test]
    fn test_step_labels() {
        let row = |note: f64| vec![0.0, 0.0, note, 64.0, 2.0, 1.0];

        assert_eq!(step_to_string(&[row(60.0)], true, SequenceType::MidiNote), "C4");
        assert_eq!(step_to_string(&[row(0.0)], true, SequenceType::MidiNote), REST_CELL);
        assert_eq!(step_to_string(&[row(60.0)], false, SequenceType::MidiNote), INACTIVE_CELL);
        assert_eq!(step_to_string(&[row(48.0)], true, SequenceType::DrumMidi), "B");
        assert_eq!(step_to_string(&[row(3.0)], true, SequenceType::Transposer), "3");
        assert_eq!(
            step_to_string(&[row(62.0), row(65.0)], true, SequenceType::MidiNote),
            "D4+1"
        );
    }

    #[test]
    fn test_step_grid_formats_by_parameter() {
        let registry = CommandRegistry::standard();
        let row = registry.default_row(MIDI_NOTE_COMMAND).unwrap();
        let grid = step_grid(&[row], &registry);
        assert_eq!(grid, vec![vec!["Note", "0", "0", "64", "2", "1.0"]]);
    }

    #[test]
    fn test_render_cells_marks_playhead_and_cursor() {
        let grid = vec![
            vec!["C4".to_string(), "--".to_string(), "xx".to_string()],
            vec!["B".to_string()],
        ];
        let columns = vec![
            ColumnState {
                playhead: 1,
                length: 2,
                active: vec![true, true, false],
            },
            ColumnState {
                playhead: 0,
                length: 1,
                active: vec![true],
            },
        ];

        let cells = render_cells(&grid, &columns, Some(Cursor { sequence: 0, step: 2 }));
        assert!(cells[0][1].is_playhead);
        assert!(!cells[0][0].is_playhead);
        assert!(cells[0][2].is_cursor);
        assert!(!cells[0][2].active);
        assert!(!cells[0][2].in_length);
        assert!(cells[1][0].is_playhead && cells[1][0].in_length);
    }

    #[test]
    fn test_grid_to_string() {
        let grid = vec![
            vec!["C4".to_string(), "--".to_string()],
            vec!["B".to_string()],
        ];
        assert_eq!(grid_to_string(&grid), "  0 : C4    B\n  1 : --\n");
    }
}
