//! Harness configuration: TOML file, then environment, then CLI flags.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

pub const ENV_SEED: &str = "QIMPLANT_SEED";
pub const ENV_LOG_LEVEL: &str = "QIMPLANT_LOG_LEVEL";

const LOG_FORMATS: [&str; 3] = ["pretty", "compact", "json"];

/// Effective configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub generate: GenerateConfig,
    pub validate: ValidateConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateConfig {
    /// Parent of the per-case fixture directories.
    pub output_dir: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Extra `[[case]]` definitions registered after the built-in cases.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cases_file: Option<PathBuf>,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self { output_dir: PathBuf::from("fixtures"), seed: None, cases_file: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidateConfig {
    /// YAML tolerance policy; the built-in rules apply when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<PathBuf>,
    pub policy_key: String,
}

impl Default for ValidateConfig {
    fn default() -> Self {
        Self { policy: None, policy_key: "default".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty`, `compact` or `json`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

/// Layers configuration sources; later calls take precedence.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: CliConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current configuration with the contents of a TOML file.
    pub fn from_file(mut self, path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        self.config = toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(self)
    }

    /// Apply `QIMPLANT_*` overrides from the process environment.
    pub fn from_env(self) -> Result<Self> {
        self.apply_env(|key| std::env::var(key).ok())
    }

    /// Apply `QIMPLANT_*` overrides read through `lookup`.
    pub fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(seed) = lookup(ENV_SEED) {
            let seed = seed
                .trim()
                .parse()
                .with_context(|| format!("{ENV_SEED} must be an unsigned integer, got '{seed}'"))?;
            self.config.generate.seed = Some(seed);
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.config.logging.level = level;
        }
        Ok(self)
    }

    pub fn log_level(mut self, level: Option<String>) -> Self {
        if let Some(level) = level {
            self.config.logging.level = level;
        }
        self
    }

    pub fn log_format(mut self, format: Option<String>) -> Self {
        if let Some(format) = format {
            self.config.logging.format = format;
        }
        self
    }

    pub fn seed(mut self, seed: Option<u64>) -> Self {
        if seed.is_some() {
            self.config.generate.seed = seed;
        }
        self
    }

    pub fn output_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.config.generate.output_dir = dir;
        }
        self
    }

    pub fn build(self) -> Result<CliConfig> {
        let config = self.config;
        if !LOG_FORMATS.contains(&config.logging.format.as_str()) {
            bail!(
                "Invalid log format '{}'. Must be one of: {}.",
                config.logging.format,
                LOG_FORMATS.join(", ")
            );
        }
        if config.generate.output_dir.as_os_str().is_empty() {
            bail!("generate.output_dir cannot be empty");
        }
        Ok(config)
    }
}

impl CliConfig {
    /// Render as the TOML accepted by `--config`.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = ConfigBuilder::new().build().unwrap();
        assert_eq!(config.generate.output_dir, PathBuf::from("fixtures"));
        assert_eq!(config.generate.seed, None);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[generate]\nseed = 7\n\n[logging]\nformat = \"json\"\n").unwrap();
        let config = ConfigBuilder::new().from_file(tmp.path()).unwrap().build().unwrap();
        assert_eq!(config.generate.seed, Some(7));
        assert_eq!(config.generate.output_dir, PathBuf::from("fixtures"));
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.validate.policy_key, "default");
    }

    #[test]
    fn env_then_flags_take_precedence() {
        let config = ConfigBuilder::new()
            .apply_env(env(&[(ENV_SEED, "11"), (ENV_LOG_LEVEL, "debug")]))
            .unwrap()
            .seed(Some(12))
            .build()
            .unwrap();
        assert_eq!(config.generate.seed, Some(12));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn bad_env_seed_is_an_error() {
        let err = ConfigBuilder::new().apply_env(env(&[(ENV_SEED, "abc")])).unwrap_err();
        assert!(err.to_string().contains(ENV_SEED));
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        assert!(ConfigBuilder::new().log_format(Some("xml".into())).build().is_err());
    }

    #[test]
    fn toml_roundtrip() {
        let mut config = CliConfig::default();
        config.generate.seed = Some(3);
        config.validate.policy = Some(PathBuf::from("policy.yaml"));
        let text = config.to_toml().unwrap();
        let back: CliConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }

    /// Restores a process environment variable on drop.
    struct EnvGuard {
        key: &'static str,
        previous: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let previous = std::env::var(key).ok();
            unsafe { std::env::set_var(key, value) };
            Self { key, previous }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.previous {
                Some(v) => unsafe { std::env::set_var(self.key, v) },
                None => unsafe { std::env::remove_var(self.key) },
            }
        }
    }

    #[test]
    #[serial_test::serial(qimplant_env)]
    fn process_env_overrides_file() {
        let _seed = EnvGuard::set(ENV_SEED, "21");
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[generate]\nseed = 7\n").unwrap();
        let config = ConfigBuilder::new()
            .from_file(tmp.path())
            .unwrap()
            .from_env()
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(config.generate.seed, Some(21));
    }
}
