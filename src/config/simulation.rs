use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_tick_rate")]
    pub tick_rate_hz: f32,
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval: u32,
    #[serde(default = "default_max_snapshots")]
    pub max_snapshots: u32,
    #[serde(default = "default_snapshot_directory")]
    pub snapshot_directory: String,
    #[serde(default = "default_websocket_port")]
    pub websocket_port: u16,
    #[serde(default = "default_websocket_bind")]
    pub websocket_bind: String,
    #[serde(default = "default_sample_directory")]
    pub sample_directory: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Stop after this many ticks; 0 runs until interrupted.
    #[serde(default)]
    pub max_ticks: u64,
}

fn default_tick_rate() -> f32 {
    30.0
}
fn default_snapshot_interval() -> u32 {
    1000
}
fn default_max_snapshots() -> u32 {
    10
}
fn default_snapshot_directory() -> String {
    "./snapshots".to_string()
}
fn default_websocket_port() -> u16 {
    8118
}
fn default_websocket_bind() -> String {
    "127.0.0.1".to_string()
}
fn default_sample_directory() -> String {
    "./samples".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            tick_rate_hz: default_tick_rate(),
            snapshot_interval: default_snapshot_interval(),
            max_snapshots: default_max_snapshots(),
            snapshot_directory: default_snapshot_directory(),
            sample_directory: default_sample_directory(),
            websocket_port: default_websocket_port(),
            websocket_bind: default_websocket_bind(),
            log_level: default_log_level(),
            max_ticks: 0,
        }
    }
}

impl SimulationConfig {
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        Self::from_toml_str(&content, path)
    }

    pub fn from_toml_str(content: &str, source_path: &Path) -> Result<Self, String> {
        let config: SimulationConfig =
            toml::from_str(content).map_err(|e| format!("{}: {}", source_path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();

        if self.tick_rate_hz <= 0.0 {
            errors.push(format!(
                "tick_rate_hz must be > 0.0, got {}. Example: tick_rate_hz = 30.0",
                self.tick_rate_hz
            ));
        }

        if self.snapshot_interval == 0 {
            errors.push(format!(
                "snapshot_interval must be > 0, got {}. Example: snapshot_interval = 1000",
                self.snapshot_interval
            ));
        }

        if self.max_snapshots == 0 {
            errors.push(format!(
                "max_snapshots must be > 0, got {}. Example: max_snapshots = 10",
                self.max_snapshots
            ));
        }

        if !(1024..=65535).contains(&self.websocket_port) {
            errors.push(format!(
                "websocket_port must be 1024-65535, got {}. Example: websocket_port = 8118",
                self.websocket_port
            ));
        }

        if self.snapshot_directory.trim().is_empty() {
            errors.push(
                "snapshot_directory must not be empty. Example: snapshot_directory = \"./snapshots\""
                    .to_string(),
            );
        }

        if self.sample_directory.trim().is_empty() {
            errors.push(
                "sample_directory must not be empty. Example: sample_directory = \"./samples\""
                    .to_string(),
            );
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            errors.push(format!(
                "log_level must be one of {:?}, got '{}'. Example: log_level = \"info\"",
                valid_levels, self.log_level
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    fn test_path() -> PathBuf {
        PathBuf::from("test-config.toml")
    }

    #[test]
    fn valid_config_loads_all_fields() {
        let toml = r#"
            tick_rate_hz = 2.0
            snapshot_interval = 50
            max_snapshots = 5
            snapshot_directory = "./data/snapshots"
            websocket_port = 9090
            websocket_bind = "0.0.0.0"
            sample_directory = "./my-samples"
            log_level = "debug"
            max_ticks = 5000
        "#;
        let config = SimulationConfig::from_toml_str(toml, &test_path()).unwrap();
        assert_eq!(config.tick_rate_hz, 2.0);
        assert_eq!(config.snapshot_interval, 50);
        assert_eq!(config.max_snapshots, 5);
        assert_eq!(config.snapshot_directory, "./data/snapshots");
        assert_eq!(config.websocket_port, 9090);
        assert_eq!(config.websocket_bind, "0.0.0.0");
        assert_eq!(config.sample_directory, "./my-samples");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.max_ticks, 5000);
    }

    #[test]
    fn defaults_applied_for_empty_config() {
        let config = SimulationConfig::from_toml_str("", &test_path()).unwrap();
        assert_eq!(config.tick_rate_hz, 30.0);
        assert_eq!(config.snapshot_interval, 1000);
        assert_eq!(config.max_snapshots, 10);
        assert_eq!(config.snapshot_directory, "./snapshots");
        assert_eq!(config.websocket_port, 8118);
        assert_eq!(config.websocket_bind, "127.0.0.1");
        assert_eq!(config.sample_directory, "./samples");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.max_ticks, 0);
    }

    #[test]
    fn invalid_tick_rate_rejected() {
        let err = SimulationConfig::from_toml_str("tick_rate_hz = -1.0", &test_path()).unwrap_err();
        assert!(err.contains("tick_rate_hz"));
        assert!(err.contains("> 0.0"));
    }

    #[test]
    fn invalid_snapshot_interval_rejected() {
        let err =
            SimulationConfig::from_toml_str("snapshot_interval = 0", &test_path()).unwrap_err();
        assert!(err.contains("snapshot_interval"));
    }

    #[test]
    fn invalid_websocket_port_rejected() {
        let err =
            SimulationConfig::from_toml_str("websocket_port = 80", &test_path()).unwrap_err();
        assert!(err.contains("websocket_port"));
        assert!(err.contains("1024-65535"));
    }

    #[test]
    fn invalid_log_level_rejected() {
        let err =
            SimulationConfig::from_toml_str(r#"log_level = "verbose""#, &test_path()).unwrap_err();
        assert!(err.contains("log_level"));
    }

    #[test]
    fn empty_sample_directory_rejected() {
        let err =
            SimulationConfig::from_toml_str(r#"sample_directory = " ""#, &test_path()).unwrap_err();
        assert!(err.contains("sample_directory"));
    }

    #[test]
    fn default_matches_empty_file() {
        let parsed = SimulationConfig::from_toml_str("", &test_path()).unwrap();
        let built = SimulationConfig::default();
        assert_eq!(parsed.tick_rate_hz, built.tick_rate_hz);
        assert_eq!(parsed.snapshot_directory, built.snapshot_directory);
        assert_eq!(parsed.websocket_port, built.websocket_port);
        assert!(built.validate().is_ok());
    }

    #[test]
    fn multiple_errors_reported_together() {
        let toml = "tick_rate_hz = 0.0\nsnapshot_interval = 0\nmax_snapshots = 0";
        let err = SimulationConfig::from_toml_str(toml, &test_path()).unwrap_err();
        assert!(err.contains("tick_rate_hz"));
        assert!(err.contains("snapshot_interval"));
        assert!(err.contains("max_snapshots"));
        assert_eq!(err.lines().count(), 3);
    }

    #[test]
    fn malformed_toml_includes_source_path() {
        let err =
            SimulationConfig::from_toml_str("tick_rate_hz = [invalid", &test_path()).unwrap_err();
        assert!(err.contains("test-config.toml"));
    }

    #[test]
    fn from_file_loads_valid_config() {
        let mut tmp = NamedTempFile::new().unwrap();
        use std::io::Write;
        writeln!(tmp, "tick_rate_hz = 5.0").unwrap();
        let config = SimulationConfig::from_file(tmp.path()).unwrap();
        assert_eq!(config.tick_rate_hz, 5.0);
    }

    #[test]
    fn from_file_missing_file_error() {
        let err = SimulationConfig::from_file(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(err.contains("Cannot read"));
    }
}
