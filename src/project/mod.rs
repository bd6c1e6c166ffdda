// Project persistence
// Versioned sequencer snapshots saved as RON or JSON files

pub mod manager;
pub mod migration;
pub mod serialization;
pub mod types;

pub use manager::{ProjectError, ProjectLoadOptions, ProjectManager};
pub use serialization::ProjectFormat;
pub use types::{
    Project, ProjectMetadata, ProjectVersion, SequenceSnapshot, SequencerSnapshot, StepSnapshot,
};

use crate::command::parameter::ROW_WIDTH;
use crate::sequencer::sequence::{MAX_SEQUENCE_LENGTH, MAX_STEP_CAPACITY, MAX_TICKS_PER_STEP};
use crate::sequencer::tempo::{MAX_BPM, MIN_BPM};

/// Helper function to validate project structure
pub fn validate_project_structure(project: &Project) -> Result<(), ProjectError> {
    if project.metadata.name.trim().is_empty() {
        return Err(ProjectError::InvalidStructure(
            "Project name cannot be empty".to_string(),
        ));
    }

    if project.metadata.name.len() > 255 {
        return Err(ProjectError::InvalidStructure(
            "Project name cannot exceed 255 characters".to_string(),
        ));
    }

    if !(MIN_BPM..=MAX_BPM).contains(&project.metadata.tempo) {
        return Err(ProjectError::InvalidStructure(format!(
            "Tempo must be between {} and {} BPM",
            MIN_BPM, MAX_BPM
        )));
    }

    validate_snapshot(&project.sequencer)
}

/// Check a snapshot's shape without touching a sequencer
pub fn validate_snapshot(snapshot: &SequencerSnapshot) -> Result<(), ProjectError> {
    for (seq_index, sequence) in snapshot.sequences.iter().enumerate() {
        if sequence.steps.is_empty() {
            return Err(ProjectError::InvalidStructure(format!(
                "Sequence {} has no steps",
                seq_index
            )));
        }

        if sequence.steps.len() > MAX_STEP_CAPACITY {
            return Err(ProjectError::InvalidStructure(format!(
                "Sequence {} has {} steps, at most {} are allowed",
                seq_index,
                sequence.steps.len(),
                MAX_STEP_CAPACITY
            )));
        }

        let max_length = sequence.steps.len().min(MAX_SEQUENCE_LENGTH);
        if sequence.length == 0 || sequence.length > max_length {
            return Err(ProjectError::InvalidStructure(format!(
                "Sequence {} length {} outside 1..={}",
                seq_index, sequence.length, max_length
            )));
        }

        if sequence.ticks_per_step == 0 || sequence.ticks_per_step > MAX_TICKS_PER_STEP {
            return Err(ProjectError::InvalidStructure(format!(
                "Sequence {} ticks per step must be between 1 and {}",
                seq_index, MAX_TICKS_PER_STEP
            )));
        }

        for (step_index, step) in sequence.steps.iter().enumerate() {
            if step.data.is_empty() {
                return Err(ProjectError::InvalidStructure(format!(
                    "Sequence {} step {} has no rows",
                    seq_index, step_index
                )));
            }
            if step.data.iter().any(|row| row.len() != ROW_WIDTH) {
                return Err(ProjectError::InvalidStructure(format!(
                    "Sequence {} step {} has a row that is not {} wide",
                    seq_index, step_index, ROW_WIDTH
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::sequence::SequenceType;

    fn valid_sequence() -> SequenceSnapshot {
        SequenceSnapshot {
            sequence_type: SequenceType::MidiNote,
            length: 2,
            ticks_per_step: 4,
            muted: false,
            steps: vec![
                StepSnapshot {
                    active: true,
                    data: vec![vec![0.0; ROW_WIDTH]],
                };
                2
            ],
        }
    }

    #[test]
    fn test_project_validation() {
        let mut project = Project::new("Valid", 120.0, SequencerSnapshot::new(vec![valid_sequence()]));
        assert!(validate_project_structure(&project).is_ok());

        project.metadata.name = "  ".to_string();
        assert!(validate_project_structure(&project).is_err());

        project.metadata.name = "Valid".to_string();
        project.metadata.tempo = 5.0;
        assert!(validate_project_structure(&project).is_err());
    }

    #[test]
    fn test_snapshot_validation() {
        let mut sequence = valid_sequence();
        sequence.length = 3;
        assert!(validate_snapshot(&SequencerSnapshot::new(vec![sequence])).is_err());

        let mut sequence = valid_sequence();
        sequence.ticks_per_step = 17;
        assert!(validate_snapshot(&SequencerSnapshot::new(vec![sequence])).is_err());

        let mut sequence = valid_sequence();
        sequence.steps[1].data[0].push(1.0);
        assert!(validate_snapshot(&SequencerSnapshot::new(vec![sequence])).is_err());

        let mut sequence = valid_sequence();
        sequence.steps = vec![sequence.steps[0].clone(); MAX_STEP_CAPACITY + 1];
        sequence.length = MAX_SEQUENCE_LENGTH;
        assert!(validate_snapshot(&SequencerSnapshot::new(vec![sequence])).is_err());
    }
}
