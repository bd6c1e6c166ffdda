// Serialization utilities for project persistence

use crate::project::manager::ProjectError;
use crate::project::types::*;
use ron::ser::PrettyConfig;
use std::path::Path;

/// On-disk encoding of a project file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectFormat {
    Ron,
    Json,
}

impl ProjectFormat {
    /// Pick the format from a file extension; anything but `.json` is RON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ProjectFormat::Json,
            _ => ProjectFormat::Ron,
        }
    }
}

/// Serialize project state to RON format
pub fn serialize_to_ron(project: &Project) -> Result<String, ProjectError> {
    ron::ser::to_string_pretty(project, PrettyConfig::default()).map_err(|e| {
        ProjectError::SerializationError(format!("Failed to serialize to RON: {}", e))
    })
}

/// Deserialize project state from RON format
pub fn deserialize_from_ron(ron_data: &str) -> Result<Project, ProjectError> {
    ron::from_str(ron_data).map_err(|e| {
        ProjectError::SerializationError(format!("Failed to deserialize from RON: {}", e))
    })
}

/// Serialize project state to JSON format
pub fn serialize_to_json(project: &Project) -> Result<String, ProjectError> {
    serde_json::to_string_pretty(project).map_err(|e| {
        ProjectError::SerializationError(format!("Failed to serialize to JSON: {}", e))
    })
}

/// Deserialize project state from JSON format
pub fn deserialize_from_json(json_data: &str) -> Result<Project, ProjectError> {
    serde_json::from_str(json_data).map_err(|e| {
        ProjectError::SerializationError(format!("Failed to deserialize from JSON: {}", e))
    })
}

pub fn serialize(project: &Project, format: ProjectFormat) -> Result<String, ProjectError> {
    match format {
        ProjectFormat::Ron => serialize_to_ron(project),
        ProjectFormat::Json => serialize_to_json(project),
    }
}

pub fn deserialize(data: &str, format: ProjectFormat) -> Result<Project, ProjectError> {
    match format {
        ProjectFormat::Ron => deserialize_from_ron(data),
        ProjectFormat::Json => deserialize_from_json(data),
    }
}

/// Serialize a bare sequencer snapshot to JSON
pub fn snapshot_to_json(snapshot: &SequencerSnapshot) -> Result<String, ProjectError> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

pub fn snapshot_from_json(json_data: &str) -> Result<SequencerSnapshot, ProjectError> {
    Ok(serde_json::from_str(json_data)?)
}
