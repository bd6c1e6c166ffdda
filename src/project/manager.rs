// Project manager for loading and saving projects

use crate::project::migration::{MigrationResult, ProjectMigrator};
use crate::project::serialization::{ProjectFormat, deserialize, serialize};
use crate::project::types::*;
use crate::sequencer::engine::Sequencer;
use crate::sequencer::error::SequencerError;
use std::path::Path;

/// Project error types
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("File system error: {0}")]
    FileSystemError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid project structure: {0}")]
    InvalidStructure(String),

    #[error("Invalid project format version")]
    InvalidVersion,

    #[error("Project validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RON error: {0}")]
    Ron(#[from] ron::Error),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Sequencer rejected project: {0}")]
    Sequencer(#[from] SequencerError),
}

/// Options for loading a project
#[derive(Debug, Clone)]
pub struct ProjectLoadOptions {
    /// Whether to validate the project structure
    pub validate: bool,
    /// Whether to copy the file aside before migrating it
    pub backup_before_migration: bool,
}

impl Default for ProjectLoadOptions {
    fn default() -> Self {
        Self {
            validate: true,
            backup_before_migration: true,
        }
    }
}

/// Project manager - handles saving/loading projects
#[derive(Debug, Default)]
pub struct ProjectManager;

impl ProjectManager {
    /// Create a new project manager
    pub fn new() -> Self {
        Self
    }

    /// Capture the sequencer's current state as a project
    pub fn create_project(&self, name: &str, sequencer: &Sequencer, tempo: f64) -> Project {
        Project::new(name, tempo, sequencer.export_snapshot())
    }

    /// Save project; `.json` paths are written as JSON, anything else as RON
    ///
    /// The file is written beside the target and renamed into place.
    pub fn save_project<P: AsRef<Path>>(
        &self,
        project: &Project,
        project_path: P,
    ) -> Result<(), ProjectError> {
        let project_path = project_path.as_ref();

        if let Some(project_dir) = project_path.parent() {
            if !project_dir.as_os_str().is_empty() {
                std::fs::create_dir_all(project_dir).map_err(|e| {
                    ProjectError::FileSystemError(format!(
                        "Failed to create project directory: {}",
                        e
                    ))
                })?;
            }
        }

        let contents = serialize(project, ProjectFormat::from_path(project_path))?;

        let temp_path = project_path.with_extension("tmp");
        std::fs::write(&temp_path, contents).map_err(|e| {
            ProjectError::FileSystemError(format!("Failed to write project: {}", e))
        })?;
        std::fs::rename(&temp_path, project_path).map_err(|e| {
            ProjectError::FileSystemError(format!("Failed to move project into place: {}", e))
        })?;

        log::info!("Saved project '{}' to {:?}", project.metadata.name, project_path);
        Ok(())
    }

    /// Load project, migrating older formats
    pub fn load_project<P: AsRef<Path>>(
        &self,
        project_path: P,
        options: &ProjectLoadOptions,
    ) -> Result<Project, ProjectError> {
        let project_path = project_path.as_ref();

        let contents = std::fs::read_to_string(project_path).map_err(|e| {
            ProjectError::FileSystemError(format!("Failed to open project file: {}", e))
        })?;
        let project = deserialize(&contents, ProjectFormat::from_path(project_path))?;

        // Check version compatibility and migrate if needed
        let compatibility = ProjectMigrator::check_compatibility(project.version());
        if !compatibility.can_load {
            if let Some(warning) = &compatibility.warning {
                log::warn!("{}", warning);
            }
            return Err(ProjectError::InvalidVersion);
        }

        let migration_result = if compatibility.needs_migration {
            if options.backup_before_migration {
                let backup_path = ProjectMigrator::create_backup(project_path)?;
                log::info!("Created backup at: {:?}", backup_path);
            }
            ProjectMigrator::migrate_to_current(project)?
        } else {
            MigrationResult {
                project,
                migrated: false,
                messages: vec!["No migration needed".to_string()],
            }
        };

        if migration_result.migrated {
            for message in &migration_result.messages {
                log::info!("Migration: {}", message);
            }
        }
        let project = migration_result.project;

        if options.validate {
            crate::project::validate_project_structure(&project)
                .map_err(|e| ProjectError::ValidationFailed(e.to_string()))?;
        }

        Ok(project)
    }

    /// Load a project's snapshot into `sequencer`, returning its tempo
    pub fn apply_project(&self, project: &Project, sequencer: &Sequencer) -> Result<f64, ProjectError> {
        sequencer.import_snapshot(&project.sequencer)?;
        Ok(project.metadata.tempo)
    }
}
