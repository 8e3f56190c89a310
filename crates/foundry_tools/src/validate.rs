//! Data validation utilities.

use std::path::Path;

use foundry_core::automation::AutomationRegistry;
use foundry_core::config::GameConfig;

use crate::error::{Result, ToolError};

/// Load and validate a balance configuration file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed or validated.
pub fn load_config(path: &Path) -> Result<GameConfig> {
    let text = std::fs::read_to_string(path).map_err(ToolError::io(path))?;
    let config = GameConfig::from_ron(&text)?;
    tracing::debug!(path = %path.display(), lines = config.lines.len(), "Loaded configuration");
    Ok(config)
}

/// Load a configuration file, or the built-in defaults when none is given.
///
/// # Errors
///
/// Returns an error if a path is given and fails to load.
pub fn load_config_or_default(path: Option<&Path>) -> Result<GameConfig> {
    path.map_or_else(|| Ok(GameConfig::default()), load_config)
}

/// Load and validate an automation definition file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed or validated.
pub fn load_automations(path: &Path) -> Result<AutomationRegistry> {
    let text = std::fs::read_to_string(path).map_err(ToolError::io(path))?;
    Ok(AutomationRegistry::from_ron(&text)?)
}

/// What a validation run checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// Lines configured explicitly (others use built-ins).
    pub configured_lines: usize,
    /// Automation roles checked, if a file was given.
    pub automation_roles: Option<usize>,
}

/// Validate a configuration file and, optionally, an automation file.
///
/// # Errors
///
/// Returns the first file that fails to load or validate.
pub fn validate_files(config: &Path, automations: Option<&Path>) -> Result<ValidationReport> {
    let game_config = load_config(config)?;
    let automation_roles = automations
        .map(load_automations)
        .transpose()?
        .map(|registry| registry.len());

    Ok(ValidationReport {
        configured_lines: game_config.lines.len(),
        automation_roles,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundry_core::error::GameError;
    use std::io::Write;

    fn write_temp(dir: &tempfile::TempDir, name: &str, text: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).expect("create");
        file.write_all(text.as_bytes()).expect("write");
        path
    }

    #[test]
    fn test_default_config_file_validates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let text = GameConfig::default().to_ron().expect("ron");
        let path = write_temp(&dir, "game.ron", &text);

        let report = validate_files(&path, None).expect("valid");
        assert_eq!(report.configured_lines, 5);
        assert_eq!(report.automation_roles, None);
    }

    #[test]
    fn test_invalid_config_lists_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_temp(
            &dir,
            "bad.ron",
            "GameConfig(energy: EnergyConfig(max: 0.0), tap_value: -1.0)",
        );

        let Err(ToolError::Game(GameError::InvalidConfig(errors))) = load_config(&path) else {
            panic!("expected invalid config");
        };
        assert_eq!(errors.len(), 2, "{errors:?}");
    }

    #[test]
    fn test_automation_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = write_temp(&dir, "game.ron", "GameConfig()");
        let automations = write_temp(
            &dir,
            "automations.ron",
            r#"[AutomationDef(role_id: "mine_foreman", target: Mining)]"#,
        );

        let report = validate_files(&config, Some(&automations)).expect("valid");
        assert_eq!(report.automation_roles, Some(1));
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = load_config(Path::new("/nonexistent/game.ron")).expect_err("missing");
        assert!(err.to_string().contains("/nonexistent/game.ron"));
    }

    #[test]
    fn test_no_path_uses_defaults() {
        assert_eq!(
            load_config_or_default(None).expect("defaults"),
            GameConfig::default()
        );
    }
}
