// Types for project persistence

use serde::{Deserialize, Serialize};

use crate::sequencer::sequence::SequenceType;

/// Snapshot format version
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ProjectVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// 1.1 added the probability column to every row
    pub fn current() -> Self {
        Self::new(1, 1, 0)
    }
}

impl Default for ProjectVersion {
    fn default() -> Self {
        Self::current()
    }
}

impl std::fmt::Display for ProjectVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// One step: its rows and active flag
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepSnapshot {
    pub active: bool,
    pub data: Vec<Vec<f64>>,
}

/// One sequence without transient state
///
/// `steps` holds every allocated step, so data beyond `length` survives
/// a round trip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SequenceSnapshot {
    pub sequence_type: SequenceType,
    pub length: usize,
    pub ticks_per_step: usize,
    #[serde(default)]
    pub muted: bool,
    pub steps: Vec<StepSnapshot>,
}

/// Whole sequencer state, in sequence order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SequencerSnapshot {
    #[serde(default)]
    pub version: ProjectVersion,
    pub sequences: Vec<SequenceSnapshot>,
}

impl SequencerSnapshot {
    pub fn new(sequences: Vec<SequenceSnapshot>) -> Self {
        Self {
            version: ProjectVersion::current(),
            sequences,
        }
    }
}

/// Project metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectMetadata {
    /// Project name
    pub name: String,
    /// Creation timestamp (RFC 3339)
    pub created: String,
    /// Last modification timestamp (RFC 3339)
    pub modified: String,
    /// Tempo (BPM)
    pub tempo: f64,
    /// Author/creator information
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Project description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A saved project: metadata plus the sequencer snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub metadata: ProjectMetadata,
    pub sequencer: SequencerSnapshot,
}

impl Project {
    pub fn new(name: &str, tempo: f64, sequencer: SequencerSnapshot) -> Self {
        let mut project = Self::default();
        project.metadata.name = name.to_string();
        project.metadata.tempo = tempo;
        project.sequencer = sequencer;
        project
    }

    pub fn version(&self) -> &ProjectVersion {
        &self.sequencer.version
    }

    /// Stamp the modification time with now
    pub fn touch(&mut self) {
        self.metadata.modified = chrono::Utc::now().to_rfc3339();
    }
}

impl Default for Project {
    fn default() -> Self {
        let now = chrono::Utc::now();

        Self {
            metadata: ProjectMetadata {
                name: "Untitled Project".to_string(),
                created: now.to_rfc3339(),
                modified: now.to_rfc3339(),
                tempo: 120.0,
                author: None,
                description: None,
            },
            sequencer: SequencerSnapshot::new(Vec::new()),
        }
    }
}
