// Project format migration system
// Handles version upgrades and backward compatibility

use crate::command::parameter::ROW_WIDTH;
use crate::project::manager::ProjectError;
use crate::project::types::{Project, ProjectVersion};

/// Probability written into rows saved before the probability column existed
const LEGACY_PROBABILITY: f64 = 1.0;

/// Migration result
#[derive(Debug, Clone)]
pub struct MigrationResult {
    /// Migrated project
    pub project: Project,
    /// Whether migration was performed
    pub migrated: bool,
    /// Migration messages/warnings
    pub messages: Vec<String>,
}

/// Project format migrator
pub struct ProjectMigrator;

impl ProjectMigrator {
    /// Migrate project to current version
    pub fn migrate_to_current(mut project: Project) -> Result<MigrationResult, ProjectError> {
        let mut messages = Vec::new();
        let mut migrated = false;

        let current_version = ProjectVersion::current();
        let project_version = project.version().clone();

        if project_version == current_version {
            return Ok(MigrationResult {
                project,
                migrated: false,
                messages: vec!["Project is already at current version".to_string()],
            });
        }

        if project_version.major != current_version.major {
            return Err(ProjectError::InvalidVersion);
        }

        if project_version.minor < 1 {
            messages.push("Migrating from v1.0 to v1.1...".to_string());
            project = Self::migrate_1_0_to_1_1(project)?;
            migrated = true;
        }

        project.sequencer.version = current_version.clone();

        if migrated {
            messages.push(format!("Successfully migrated to v{}", current_version));
        }

        Ok(MigrationResult {
            project,
            migrated,
            messages,
        })
    }

    /// Check if project can be loaded (compatibility check)
    pub fn check_compatibility(version: &ProjectVersion) -> CompatibilityInfo {
        let current = ProjectVersion::current();

        if version.major != current.major || version.minor > current.minor {
            return CompatibilityInfo {
                can_load: false,
                needs_migration: false,
                warning: Some(format!(
                    "Project version v{} is not supported by v{}",
                    version, current
                )),
            };
        }

        if *version == current {
            return CompatibilityInfo {
                can_load: true,
                needs_migration: false,
                warning: None,
            };
        }

        // Older minor, or a newer patch of the same minor
        let needs_migration = version.minor < current.minor;
        CompatibilityInfo {
            can_load: true,
            needs_migration,
            warning: needs_migration
                .then(|| format!("Project version v{} will be migrated to v{}", version, current)),
        }
    }

    /// v1.0 rows had no probability column; append one that always fires
    fn migrate_1_0_to_1_1(mut project: Project) -> Result<Project, ProjectError> {
        for (seq_index, sequence) in project.sequencer.sequences.iter_mut().enumerate() {
            for step in sequence.steps.iter_mut() {
                for row in step.data.iter_mut() {
                    match row.len() {
                        len if len == ROW_WIDTH - 1 => row.push(LEGACY_PROBABILITY),
                        len if len == ROW_WIDTH => {}
                        len => {
                            return Err(ProjectError::MigrationError(format!(
                                "sequence {} has a row of width {}",
                                seq_index, len
                            )));
                        }
                    }
                }
            }
        }
        Ok(project)
    }

    /// Copy the project file next to itself before migrating
    pub fn create_backup(path: &std::path::Path) -> Result<std::path::PathBuf, ProjectError> {
        let backup_path = path.with_extension("backup");

        std::fs::copy(path, &backup_path).map_err(|e| {
            ProjectError::FileSystemError(format!("Failed to create backup: {}", e))
        })?;

        Ok(backup_path)
    }
}

/// Compatibility information for project versions
#[derive(Debug, Clone)]
pub struct CompatibilityInfo {
    /// Whether the project can be loaded
    pub can_load: bool,
    /// Whether migration is needed
    pub needs_migration: bool,
    /// Optional warning message
    pub warning: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::types::{SequenceSnapshot, SequencerSnapshot, StepSnapshot};
    use crate::sequencer::sequence::SequenceType;

    fn legacy_project(row: Vec<f64>) -> Project {
        let mut snapshot = SequencerSnapshot::new(vec![SequenceSnapshot {
            sequence_type: SequenceType::MidiNote,
            length: 1,
            ticks_per_step: 4,
            muted: false,
            steps: vec![StepSnapshot {
                active: true,
                data: vec![row],
            }],
        }]);
        snapshot.version = ProjectVersion::new(1, 0, 0);
        Project::new("Legacy", 120.0, snapshot)
    }

    #[test]
    fn test_version_compatibility_check() {
        let current = ProjectVersion::current();

        let info = ProjectMigrator::check_compatibility(&current);
        assert!(info.can_load);
        assert!(!info.needs_migration);
        assert!(info.warning.is_none());

        let info = ProjectMigrator::check_compatibility(&ProjectVersion::new(1, 0, 0));
        assert!(info.can_load);
        assert!(info.needs_migration);
        assert!(info.warning.is_some());

        let info = ProjectMigrator::check_compatibility(&ProjectVersion::new(current.major + 1, 0, 0));
        assert!(!info.can_load);
        assert!(info.warning.is_some());

        let info = ProjectMigrator::check_compatibility(&ProjectVersion::new(
            current.major,
            current.minor + 1,
            0,
        ));
        assert!(!info.can_load);
    }

    #[test]
    fn test_migration_1_0_to_1_1_adds_probability() {
        let project = legacy_project(vec![0.0, 0.0, 60.0, 100.0, 2.0]);

        let result = ProjectMigrator::migrate_to_current(project).unwrap();

        assert!(result.migrated);
        assert_eq!(result.project.version(), &ProjectVersion::current());
        assert_eq!(
            result.project.sequencer.sequences[0].steps[0].data[0],
            vec![0.0, 0.0, 60.0, 100.0, 2.0, 1.0]
        );
    }

    #[test]
    fn test_migration_rejects_malformed_rows() {
        let project = legacy_project(vec![0.0, 1.0]);
        assert!(matches!(
            ProjectMigrator::migrate_to_current(project),
            Err(ProjectError::MigrationError(_))
        ));
    }

    #[test]
    fn test_no_migration_needed() {
        let project = Project::default();
        let result = ProjectMigrator::migrate_to_current(project).unwrap();
        assert!(!result.migrated);
        assert_eq!(result.project.version(), &ProjectVersion::current());
    }
}
