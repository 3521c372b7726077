//! Configuration file support for FlightRisk
//!
//! Loads deployment-specific configuration from JSON files.
//!
//! Search order:
//! 1. Explicit path (--config CLI flag)
//! 2. `.flightriskrc.json` in project root
//! 3. `flightrisk.config.json` in project root
//!
//! All fields are optional. CLI flags take precedence over config file values.

use crate::crosswind::{normalize_code, RunwayTable};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Local airport when none is configured
pub const DEFAULT_LOCAL_AIRPORT: &str = "PUW";

/// Database file name used under `$DATA_DIR` or the working directory
pub const DEFAULT_DATABASE_FILE: &str = "history.db";

/// FlightRisk configuration loaded from a JSON config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlightRiskConfig {
    /// Airport whose flights are scored (default: PUW)
    #[serde(default)]
    pub local_airport: Option<String>,

    /// Path to the SQLite outcome database
    #[serde(default)]
    pub database: Option<PathBuf>,

    /// Runway headings per airport, merged over the built-in table
    #[serde(default)]
    pub runways: BTreeMap<String, Vec<f64>>,
}

/// Resolved configuration ready for use
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Normalized 3-letter code
    pub local_airport: String,
    pub runways: RunwayTable,
    pub database: PathBuf,
    /// Path the config was loaded from (None if defaults)
    pub config_path: Option<PathBuf>,
}

impl FlightRiskConfig {
    /// Validate the configuration for logical errors
    pub fn validate(&self) -> Result<()> {
        if let Some(ref code) = self.local_airport {
            if code.trim().is_empty() {
                anyhow::bail!("local_airport must not be empty");
            }
        }

        if let Some(ref db) = self.database {
            if db.as_os_str().is_empty() {
                anyhow::bail!("database must not be an empty path");
            }
        }

        for (code, headings) in &self.runways {
            if code.trim().is_empty() {
                anyhow::bail!("runways: airport code must not be empty");
            }
            if !(2..=4).contains(&headings.len()) {
                anyhow::bail!(
                    "runways.{} must list 2 to 4 headings (got {})",
                    code,
                    headings.len()
                );
            }
            for h in headings {
                if !(0.0..=360.0).contains(h) {
                    anyhow::bail!(
                        "runways.{} heading must be within 0-360 degrees (got {})",
                        code,
                        h
                    );
                }
            }
        }

        Ok(())
    }

    /// Resolve config into compiled form, reading `$DATA_DIR` for the default database
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        let data_dir = std::env::var_os("DATA_DIR").map(PathBuf::from);
        self.resolve_with_data_dir(data_dir.as_deref())
    }

    /// Resolve with an explicit data directory
    pub fn resolve_with_data_dir(&self, data_dir: Option<&Path>) -> Result<ResolvedConfig> {
        self.validate()?;

        let mut runways = RunwayTable::default();
        for (code, headings) in &self.runways {
            runways.insert(code, headings.clone());
        }

        let database = match (&self.database, data_dir) {
            (Some(path), _) => path.clone(),
            (None, Some(dir)) => dir.join(DEFAULT_DATABASE_FILE),
            (None, None) => PathBuf::from(DEFAULT_DATABASE_FILE),
        };

        Ok(ResolvedConfig {
            local_airport: normalize_code(
                self.local_airport.as_deref().unwrap_or(DEFAULT_LOCAL_AIRPORT),
            ),
            runways,
            database,
            config_path: None,
        })
    }
}

/// Discover and load a config file from the project root
///
/// Returns `None` if no config file is found (use defaults).
pub fn discover_config(project_root: &Path) -> Result<Option<(FlightRiskConfig, PathBuf)>> {
    for name in [".flightriskrc.json", "flightrisk.config.json"] {
        let path = project_root.join(name);
        if path.exists() {
            let config = load_config_file(&path)?;
            return Ok(Some((config, path)));
        }
    }
    Ok(None)
}

/// Load config from an explicit file path
pub fn load_config_file(path: &Path) -> Result<FlightRiskConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config: FlightRiskConfig = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("invalid config in: {}", path.display()))?;

    Ok(config)
}

/// Load and resolve config for a project
///
/// If `config_path` is provided, loads from that file.
/// Otherwise, discovers config from the project root.
/// Returns default config if nothing is found.
pub fn load_and_resolve(project_root: &Path, config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let (config, source_path) = if let Some(path) = config_path {
        let config = load_config_file(path)?;
        (config, Some(path.to_path_buf()))
    } else {
        match discover_config(project_root)? {
            Some((config, path)) => (config, Some(path)),
            None => (FlightRiskConfig::default(), None),
        }
    };

    let mut resolved = config.resolve()?;
    resolved.config_path = source_path;
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_config_is_valid() {
        let config = FlightRiskConfig::default();
        config.validate().expect("default config should be valid");
        let resolved = config
            .resolve_with_data_dir(None)
            .expect("default config should resolve");
        assert_eq!(resolved.local_airport, "PUW");
        assert_eq!(resolved.database, PathBuf::from("history.db"));
        assert_eq!(resolved.runways.headings_for("SEA"), &[160.0, 340.0]);
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            "local_airport": "KLWS",
            "database": "/var/lib/flightrisk/history.db",
            "runways": {
                "LWS": [80.0, 260.0, 120.0, 300.0],
                "SEA": [170.0, 350.0]
            }
        }"#;
        let config: FlightRiskConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();
        let resolved = config.resolve_with_data_dir(None).unwrap();
        assert_eq!(resolved.local_airport, "LWS");
        assert_eq!(
            resolved.database,
            PathBuf::from("/var/lib/flightrisk/history.db")
        );
        assert_eq!(resolved.runways.headings_for("KLWS").len(), 4);
        assert_eq!(resolved.runways.headings_for("SEA"), &[170.0, 350.0]);
        // Built-in entries survive
        assert_eq!(resolved.runways.headings_for("BOI"), &[100.0, 280.0]);
    }

    #[test]
    fn test_data_dir_database() {
        let resolved = FlightRiskConfig::default()
            .resolve_with_data_dir(Some(Path::new("/data")))
            .unwrap();
        assert_eq!(resolved.database, PathBuf::from("/data/history.db"));
    }

    #[test]
    fn test_reject_unknown_fields() {
        let json = r#"{"unknown_field": true}"#;
        let result: Result<FlightRiskConfig, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_reject_bad_runways() {
        let json = r#"{"runways": {"PUW": [50.0]}}"#;
        let config: FlightRiskConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());

        let json = r#"{"runways": {"PUW": [50.0, 400.0]}}"#;
        let config: FlightRiskConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());

        let json = r#"{"runways": {"": [50.0, 230.0]}}"#;
        let config: FlightRiskConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reject_empty_local_airport() {
        let json = r#"{"local_airport": "  "}"#;
        let config: FlightRiskConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_discover_rc_file_first() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(".flightriskrc.json"),
            r#"{"local_airport": "BOI"}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("flightrisk.config.json"),
            r#"{"local_airport": "SEA"}"#,
        )
        .unwrap();

        let (config, path) = discover_config(dir.path()).unwrap().unwrap();
        assert_eq!(config.local_airport.as_deref(), Some("BOI"));
        assert!(path.ends_with(".flightriskrc.json"));
    }

    #[test]
    fn test_discover_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_config(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_explicit_path_reports_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.json");
        fs::write(&path, r#"{"database": "custom.db"}"#).unwrap();

        let resolved = load_and_resolve(dir.path(), Some(&path)).unwrap();
        assert_eq!(resolved.config_path.as_deref(), Some(path.as_path()));
        assert_eq!(resolved.database, PathBuf::from("custom.db"));
    }

    #[test]
    fn test_invalid_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();
        let err = load_config_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse config file"));
    }
}
