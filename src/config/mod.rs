pub mod cli;
pub mod toml_config;

use crate::adapters::http::DEFAULT_BASE_URL;
use crate::core::engine::ImportOptions;
use crate::core::orchestrator::RetryPolicy;
use crate::utils::error::{ImportError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use toml_config::TomlConfig;

/// Effective settings of one import run after TOML and CLI have been merged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSettings {
    pub base_url: String,
    pub api_token: Option<String>,
    pub timeout_seconds: u64,
    pub retry_delay_ms: u64,
    pub delimiter: char,
    pub dry_run: bool,
    pub output_dir: String,
    pub progress_every: usize,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_token: None,
            timeout_seconds: 30,
            retry_delay_ms: 1000,
            delimiter: ',',
            dry_run: false,
            output_dir: "./import-report".to_string(),
            progress_every: 25,
        }
    }
}

impl ImportSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(Duration::from_millis(self.retry_delay_ms))
    }

    /// Delimiter as the single byte the csv crate expects. Only valid after
    /// `validate()` has accepted an ASCII delimiter.
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter as u8
    }

    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            dry_run: self.dry_run,
            delimiter: self.delimiter_byte(),
            retry: self.retry_policy(),
        }
    }

    /// Token for the gateway; dry runs never call the API so they may go without.
    pub fn token_or_empty(&self) -> &str {
        self.api_token.as_deref().unwrap_or_default()
    }
}

impl Validate for ImportSettings {
    fn validate(&self) -> Result<()> {
        validation::validate_url("base_url", &self.base_url)?;
        validation::validate_delimiter("delimiter", self.delimiter)?;
        validation::validate_range("timeout_seconds", self.timeout_seconds, 1, 600)?;
        validation::validate_path("output_dir", &self.output_dir)?;

        if !self.dry_run {
            let token = validation::validate_required_field("api_token", &self.api_token)?;
            validation::validate_non_empty_string("api_token", token)?;
        }

        // 環境變數未展開
        if let Some(token) = &self.api_token {
            if token.contains("${") {
                return Err(ImportError::InvalidConfigValueError {
                    field: "api_token".to_string(),
                    value: "<redacted>".to_string(),
                    reason: "Token still contains an unresolved ${...} placeholder".to_string(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "tms-bulk-import")]
#[command(about = "Bulk-create domains, subdomains, clients and business units from a CSV file")]
pub struct CliConfig {
    /// CSV file with one entity per row
    pub file: String,

    #[arg(long, help = "TOML configuration file")]
    pub config: Option<String>,

    #[arg(long, help = "Field delimiter of the input file")]
    pub delimiter: Option<char>,

    #[arg(long, help = "Validate and plan without calling the API")]
    pub dry_run: bool,

    #[arg(long, env = "PHRASE_BASE_URL")]
    pub base_url: Option<String>,

    #[arg(long, env = "PHRASE_API_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[arg(long)]
    pub timeout_seconds: Option<u64>,

    #[arg(long, help = "Delay before the single retry of a failed request")]
    pub retry_delay_ms: Option<u64>,

    #[arg(long, help = "Directory for outcomes.csv, failures.csv and summary.json")]
    pub output_dir: Option<String>,

    #[arg(long, help = "Log progress every N rows")]
    pub progress_every: Option<usize>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// TOML first (when given), then command-line overrides.
    pub fn resolve_settings(&self) -> Result<ImportSettings> {
        let mut settings = ImportSettings::default();

        if let Some(path) = &self.config {
            tracing::debug!("📋 Loading configuration from {}", path);
            TomlConfig::from_file(path)?.apply_to(&mut settings);
        }

        if let Some(base_url) = &self.base_url {
            settings.base_url = base_url.clone();
        }
        if let Some(token) = &self.token {
            settings.api_token = Some(token.clone());
        }
        if let Some(timeout) = self.timeout_seconds {
            settings.timeout_seconds = timeout;
        }
        if let Some(delay) = self.retry_delay_ms {
            settings.retry_delay_ms = delay;
        }
        if let Some(delimiter) = self.delimiter {
            settings.delimiter = delimiter;
        }
        if let Some(output_dir) = &self.output_dir {
            settings.output_dir = output_dir.clone();
        }
        if let Some(every) = self.progress_every {
            settings.progress_every = every;
        }
        if self.dry_run {
            settings.dry_run = true;
        }

        Ok(settings)
    }
}
