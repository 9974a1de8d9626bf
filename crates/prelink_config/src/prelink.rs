use config::{builder::DefaultState, ConfigBuilder, Environment, File, FileFormat};
use serde::Deserialize;

use crate::validation::{validate, ConfigReport};
use crate::{CorrelatorConfig, GlobalConfig, ReplayConfig};

/// Prefix for environment overrides, e.g. `PRELINK__CORRELATOR__REQUEST_TIMEOUT_MS`.
const ENV_PREFIX: &str = "PRELINK";

// =======================================================
// PRELINK CONFIG — main config
// =======================================================
#[derive(Debug, Clone, Deserialize)]
pub struct PrelinkConfig {
    #[serde(default)]
    pub global: GlobalConfig,

    #[serde(default)]
    pub correlator: CorrelatorConfig,

    #[serde(default)]
    pub replay: ReplayConfig,
}

impl Default for PrelinkConfig {
    fn default() -> Self {
        let mut cfg = Self {
            global: GlobalConfig::default(),
            correlator: CorrelatorConfig::default(),
            replay: ReplayConfig::default(),
        };
        cfg.apply_defaults();
        cfg
    }
}

impl PrelinkConfig {
    pub fn global(&self) -> &GlobalConfig {
        &self.global
    }

    pub fn correlator(&self) -> &CorrelatorConfig {
        &self.correlator
    }

    pub fn replay(&self) -> &ReplayConfig {
        &self.replay
    }

    /// Validate the configuration and return a report of warnings and errors.
    pub fn validate(&self) -> ConfigReport {
        validate(self)
    }

    /// Load a TOML config file (optional) layered under `PRELINK__*` env vars.
    pub fn from_file(file_name: &str) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(File::new(file_name, FileFormat::Toml).required(false));
        Self::build(builder)
    }

    /// Parse a TOML document, still honoring env overrides.
    pub fn from_toml_str(contents: &str) -> Result<Self, config::ConfigError> {
        let builder =
            config::Config::builder().add_source(File::from_str(contents, FileFormat::Toml));
        Self::build(builder)
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, config::ConfigError> {
        let built = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut cfg: PrelinkConfig = built.try_deserialize()?;

        cfg.apply_defaults();
        Ok(cfg)
    }

    pub fn from_file_or_default(file_name: &str) -> Self {
        match Self::from_file(file_name) {
            Ok(cfg) => {
                let report = cfg.validate();
                if report.has_errors() {
                    eprintln!("Invalid config in '{file_name}':");
                    eprintln!("{}", report.format());
                    eprintln!("Using default config (in-memory)...");
                    PrelinkConfig::default()
                } else {
                    if !report.warnings().is_empty() {
                        eprintln!("Config warnings in '{file_name}':");
                        eprintln!("{}", report.format());
                    }
                    cfg
                }
            }
            Err(e) => {
                eprintln!("Error reading config '{file_name}': {e}");
                eprintln!("Using default config (in-memory)...");
                PrelinkConfig::default()
            }
        }
    }

    fn apply_defaults(&mut self) {
        let def_global = GlobalConfig::default();
        self.global.apply_defaults_from(&def_global);

        let def_correlator = CorrelatorConfig::default();
        self.correlator.apply_defaults_from(&def_correlator);
    }

    pub fn print(&self) {
        println!("================ PRELINK CONFIG ================");

        println!("\n[global]");
        println!("  log_level            = {}", self.global.log_level);

        println!("\n[correlator]");
        println!(
            "  request_timeout_ms   = {}",
            self.correlator.request_timeout_ms
        );
        println!("  max_cache_age_ms     = {}", self.correlator.max_cache_age_ms);
        println!(
            "  sweep_interval_ms    = {}",
            self.correlator.sweep_interval_ms
        );

        println!("\n[replay]");
        println!("  input                = {:?}", self.replay.input);
        println!("  drain_grace_ms       = {}", self.replay.drain_grace_ms);

        println!("================================================");
    }
}
