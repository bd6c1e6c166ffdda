// Command registry
// Id- and name-indexed table of command descriptors, built once at startup

use crate::command::kinds::{CommandContext, CommandKind};
use crate::command::parameter::{
    CHANNEL_COL, CMD_COL, DURATION_COL, NOTE_COL, PARAMETER_COUNT, PROBABILITY_COL, Parameter,
    ROW_WIDTH, VELOCITY_COL,
};
use crate::sequencer::error::{SequencerError, SequencerResult};
use crate::sequencer::sequence::MAX_LENGTH_ADJUSTMENT;
use std::collections::HashMap;

/// Id of the note command, the default for freshly created rows
pub const MIDI_NOTE_COMMAND: usize = 0;

/// A registered, parameterised behaviour
#[derive(Debug, Clone)]
pub struct Command {
    pub kind: CommandKind,
    pub name: String,
    pub short_name: String,
    pub description: String,
    /// One parameter per row column after the command column, in column order
    pub parameters: Vec<Parameter>,
    /// Column the editor's note-entry keys write to
    pub note_edit_target: Option<usize>,
    /// Column the editor's number keys write to
    pub number_edit_target: Option<usize>,
    /// Column the editor's length keys write to
    pub length_edit_target: Option<usize>,
}

impl Command {
    /// Parameter stored in `column`, if the command declares one there
    pub fn parameter_for(&self, column: usize) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.column_index == column)
    }

    /// Row filled with each parameter's default, command column set to `id`
    pub fn default_row(&self, id: usize) -> Vec<f64> {
        let mut row = vec![0.0; ROW_WIDTH];
        row[CMD_COL] = id as f64;
        for param in &self.parameters {
            row[param.column_index] = param.default_value;
        }
        row
    }
}

/// Table of commands looked up by id during playback and by name when authoring
///
/// Built once and shared behind an `Arc`; read-only after construction.
#[derive(Debug, Clone)]
pub struct CommandRegistry {
    commands: Vec<Command>,
    by_name: HashMap<String, usize>,
}

impl CommandRegistry {
    /// Empty registry; use `register` to populate it
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Registry holding the built-in command set
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for command in standard_commands() {
            // Built-ins are well formed; a failure here is a programming error
            if let Err(e) = registry.register(command) {
                log::error!("Failed to register built-in command: {}", e);
            }
        }
        registry
    }

    /// Add a command, returning its id
    ///
    /// Rejects duplicate names and parameter lists that do not cover every
    /// data column exactly once.
    pub fn register(&mut self, command: Command) -> SequencerResult<usize> {
        if self.by_name.contains_key(&command.name) {
            return Err(SequencerError::InvalidData(format!(
                "command '{}' already registered",
                command.name
            )));
        }
        if command.parameters.len() != PARAMETER_COUNT {
            return Err(SequencerError::InvalidData(format!(
                "command '{}' declares {} parameters, rows need {}",
                command.name,
                command.parameters.len(),
                PARAMETER_COUNT
            )));
        }
        for column in 1..ROW_WIDTH {
            if command.parameter_for(column).is_none() {
                return Err(SequencerError::InvalidData(format!(
                    "command '{}' has no parameter for column {}",
                    command.name, column
                )));
            }
        }

        let id = self.commands.len();
        self.by_name.insert(command.name.clone(), id);
        self.commands.push(command);
        Ok(id)
    }

    pub fn get_command(&self, id: usize) -> SequencerResult<&Command> {
        self.commands
            .get(id)
            .ok_or(SequencerError::UnknownCommand(id))
    }

    pub fn get_command_by_name(&self, name: &str) -> SequencerResult<&Command> {
        let id = self.command_id(name)?;
        self.get_command(id)
    }

    pub fn command_id(&self, name: &str) -> SequencerResult<usize> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| SequencerError::UnknownCommandName(name.to_string()))
    }

    pub fn count_commands(&self) -> usize {
        self.commands.len()
    }

    /// Registered commands in id order
    pub fn commands(&self) -> impl Iterator<Item = (usize, &Command)> {
        self.commands.iter().enumerate()
    }

    /// Command id stored in a row's command column
    pub fn command_id_of(&self, row: &[f64]) -> SequencerResult<usize> {
        let raw = row.get(CMD_COL).copied().unwrap_or(0.0);
        if raw.is_nan() || raw < 0.0 {
            return Err(SequencerError::InvalidData(format!(
                "command column holds {}",
                raw
            )));
        }
        let id = raw.round() as usize;
        if id >= self.commands.len() {
            return Err(SequencerError::UnknownCommand(id));
        }
        Ok(id)
    }

    /// Run command `id` against `row`
    pub fn execute_command(
        &self,
        id: usize,
        row: &[f64],
        ctx: &mut CommandContext<'_>,
    ) -> SequencerResult<bool> {
        let command = self.get_command(id)?;
        Ok(command.kind.execute(row, ctx))
    }

    /// Run a row through whatever command its command column names
    pub fn execute_row(&self, row: &[f64], ctx: &mut CommandContext<'_>) -> SequencerResult<bool> {
        let id = self.command_id_of(row)?;
        self.execute_command(id, row, ctx)
    }

    /// Parameter governing `column` of `row`, resolved through its command
    pub fn parameter_for(&self, row: &[f64], column: usize) -> SequencerResult<&Parameter> {
        let command = self.get_command(self.command_id_of(row)?)?;
        command
            .parameter_for(column)
            .ok_or(SequencerError::ColumnOutOfRange {
                index: column,
                width: ROW_WIDTH,
            })
    }

    /// Clamp `value` for `column` of `row`
    ///
    /// The command column clamps to the registered id range; every other
    /// column clamps to the governing parameter's range.
    pub fn clamp_value(&self, row: &[f64], column: usize, value: f64) -> SequencerResult<f64> {
        if column >= ROW_WIDTH {
            return Err(SequencerError::ColumnOutOfRange {
                index: column,
                width: ROW_WIDTH,
            });
        }
        if column == CMD_COL {
            let max = self.commands.len().saturating_sub(1) as f64;
            let value = if value.is_nan() { 0.0 } else { value.round() };
            return Ok(value.clamp(0.0, max));
        }
        Ok(self.parameter_for(row, column)?.clamp(value))
    }

    /// Clamp every cell of `row` in place, the command column first
    ///
    /// The remaining columns then follow whichever command the row names.
    pub fn clamp_row(&self, row: &mut [f64]) -> SequencerResult<()> {
        if row.len() != ROW_WIDTH {
            return Err(SequencerError::InvalidData(format!(
                "row has {} columns, expected {}",
                row.len(),
                ROW_WIDTH
            )));
        }
        for column in 0..ROW_WIDTH {
            let value = self.clamp_value(row, column, row[column])?;
            row[column] = value;
        }
        Ok(())
    }

    /// Fresh row for command `id` with every parameter at its default
    pub fn default_row(&self, id: usize) -> SequencerResult<Vec<f64>> {
        Ok(self.get_command(id)?.default_row(id))
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn probability(column: usize) -> Parameter {
    Parameter::new("Probability", "Prob", 0.0, 1.0, 0.1, 1.0, column, 1)
}

fn target(column: usize) -> Parameter {
    Parameter::integer("Target sequence", "Seq", 0.0, 15.0, 0.0, column)
}

fn note_parameters() -> Vec<Parameter> {
    vec![
        Parameter::integer("Channel", "Ch", 0.0, 15.0, 0.0, CHANNEL_COL),
        Parameter::integer("Note", "Note", 0.0, 127.0, 0.0, NOTE_COL),
        Parameter::integer("Velocity", "Vel", 0.0, 127.0, 64.0, VELOCITY_COL),
        Parameter::integer("Duration", "Dur", 1.0, 32.0, 2.0, DURATION_COL),
        probability(PROBABILITY_COL),
    ]
}

fn modifier_parameters(amount: Parameter) -> Vec<Parameter> {
    vec![
        target(CHANNEL_COL),
        amount,
        Parameter::unused(VELOCITY_COL),
        Parameter::unused(DURATION_COL),
        probability(PROBABILITY_COL),
    ]
}

fn standard_commands() -> Vec<Command> {
    vec![
        Command {
            kind: CommandKind::MidiNote,
            name: "MIDINote".to_string(),
            short_name: "Note".to_string(),
            description: "Play a MIDI note for a number of ticks".to_string(),
            parameters: note_parameters(),
            note_edit_target: Some(NOTE_COL),
            number_edit_target: Some(VELOCITY_COL),
            length_edit_target: Some(DURATION_COL),
        },
        Command {
            kind: CommandKind::Transpose,
            name: "Transpose".to_string(),
            short_name: "Tran".to_string(),
            description: "Transpose the target sequence until it wraps".to_string(),
            parameters: modifier_parameters(Parameter::integer(
                "Semitones", "Semi", 0.0, 11.0, 0.0, NOTE_COL,
            )),
            note_edit_target: Some(NOTE_COL),
            number_edit_target: Some(CHANNEL_COL),
            length_edit_target: None,
        },
        Command {
            kind: CommandKind::LengthChange,
            name: "LengthChange".to_string(),
            short_name: "Len".to_string(),
            description: "Lengthen or shorten the target sequence until it wraps".to_string(),
            parameters: modifier_parameters(Parameter::integer(
                "Length delta",
                "Dlt",
                -(MAX_LENGTH_ADJUSTMENT as f64),
                MAX_LENGTH_ADJUSTMENT as f64,
                0.0,
                NOTE_COL,
            )),
            note_edit_target: Some(NOTE_COL),
            number_edit_target: Some(CHANNEL_COL),
            length_edit_target: None,
        },
        Command {
            kind: CommandKind::TickChange,
            name: "TickChange".to_string(),
            short_name: "Tick".to_string(),
            description: "Override the target's ticks per step until it wraps".to_string(),
            parameters: modifier_parameters(Parameter::integer(
                "Ticks per step", "TPS", 1.0, 16.0, 4.0, NOTE_COL,
            )),
            note_edit_target: Some(NOTE_COL),
            number_edit_target: Some(CHANNEL_COL),
            length_edit_target: None,
        },
        Command {
            kind: CommandKind::Log,
            name: "Log".to_string(),
            short_name: "Log".to_string(),
            description: "Write the row to the log".to_string(),
            parameters: note_parameters(),
            note_edit_target: Some(NOTE_COL),
            number_edit_target: Some(VELOCITY_COL),
            length_edit_target: Some(DURATION_COL),
        },
    ]
}
